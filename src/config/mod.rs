//! Validated runtime configuration built from the command line / environment.

use chrono::Utc;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::cli::Args;
use crate::models::device::{ BatteryInfo, ConnectionInfo, Coordinates, DeviceStatus };
use crate::models::user::{ ParsePlatformError, SessionCredential, UserProfile };

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid chat endpoint URL '{url}': {source}")]
    EndpointUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Chat endpoint must use http or https, got '{0}'")]
    EndpointScheme(String),

    #[error("Request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Connections per second must be greater than zero")]
    ZeroConnectionRate,

    #[error(transparent)]
    Platform(#[from] ParsePlatformError),

    #[error("{0}")]
    Mode(String),

    #[error("Latitude and longitude must be given together")]
    PartialLocation,

    #[error("Location {latitude}, {longitude} is out of range")]
    LocationOutOfRange {
        latitude: f64,
        longitude: f64,
    },

    #[error("Battery level {0} is outside 0-100")]
    BatteryLevel(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Server,
    Repl,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Server => f.write_str("server"),
            Mode::Repl => f.write_str("repl"),
        }
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "server" => Ok(Mode::Server),
            "repl" => Ok(Mode::Repl),
            _ => Err(ConfigError::Mode(format!("Unsupported mode: {}", s))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: String,
    pub api_key: Option<String>,
    pub connections_per_second: NonZeroU32,
    pub max_message_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: Mode,
    pub endpoint: Url,
    pub request_timeout: Duration,
    pub profile: UserProfile,
    pub initial_status: DeviceStatus,
    pub location: Option<Coordinates>,
    pub server: ServerSettings,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let endpoint = Url::parse(&args.chat_endpoint).map_err(|source| ConfigError::EndpointUrl {
            url: args.chat_endpoint.clone(),
            source,
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::EndpointScheme(endpoint.scheme().to_string()));
        }
        if args.request_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        let connections_per_second = NonZeroU32::new(args.connections_per_second).ok_or(
            ConfigError::ZeroConnectionRate
        )?;

        let now = Utc::now();
        let profile = UserProfile {
            user_id: args.user_id.clone(),
            username: args.username.clone(),
            credential: SessionCredential::new(args.session_token.clone()),
            logged_in: args.logged_in,
            phone_number: args.phone_number.clone(),
            platform: args.platform.parse()?,
            created_at: now,
            updated_at: now,
        };

        Ok(Self {
            mode: args.mode.parse()?,
            endpoint,
            request_timeout: Duration::from_millis(args.request_timeout_ms),
            profile,
            initial_status: initial_status(args)?,
            location: location(args)?,
            server: ServerSettings {
                addr: args.server_addr.clone(),
                api_key: args.server_api_key.clone().filter(|k| !k.trim().is_empty()),
                connections_per_second,
                max_message_bytes: args.max_message_bytes,
            },
        })
    }
}

fn location(args: &Args) -> Result<Option<Coordinates>, ConfigError> {
    match (args.latitude, args.longitude) {
        (None, None) => Ok(None),
        (Some(latitude), Some(longitude)) => {
            let coords = Coordinates::new(latitude, longitude);
            if coords.in_range() {
                Ok(Some(coords))
            } else {
                Err(ConfigError::LocationOutOfRange { latitude, longitude })
            }
        }
        _ => Err(ConfigError::PartialLocation),
    }
}

fn initial_status(args: &Args) -> Result<DeviceStatus, ConfigError> {
    if let Some(level) = args.battery_level {
        if !(0.0..=100.0).contains(&level) {
            return Err(ConfigError::BatteryLevel(level));
        }
    }

    let connection = (
        args.downlink.is_some() ||
        args.effective_type.is_some() ||
        args.rtt_ms.is_some()
    ).then(|| ConnectionInfo {
        downlink: args.downlink,
        effective_type: args.effective_type.clone(),
        rtt: args.rtt_ms,
    });
    let battery = (args.battery_level.is_some() || args.battery_charging.is_some()).then(
        || BatteryInfo {
            level: args.battery_level,
            charging: args.battery_charging,
        }
    );

    Ok(DeviceStatus { online: true, connection, battery })
}
