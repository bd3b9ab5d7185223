//! Wire body of the outbound chat request.
//!
//! The remote endpoint validates every field strictly, so the raw device context is
//! normalized here: missing numbers get fixed defaults and fractional values are rounded.

use chrono::SecondsFormat;
use serde::{ Serialize, Deserialize };

use super::device::{ BatteryInfo, ConnectionInfo, Coordinates, DeviceStatus };
use super::user::{ Platform, UserProfile };

pub const UNKNOWN_EFFECTIVE_TYPE: &str = "unknown";
pub const DEFAULT_BATTERY_LEVEL: u8 = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user: UserPayload,
    pub message: String,
    pub status: StatusPayload,
    pub coordinates: CoordinatesPayload,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserPayload {
    pub userid: String,
    pub username: String,
    pub password: String,
    pub is_loggedin: bool,
    pub phone_number: String,
    pub platform: Platform,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub connection: ConnectionPayload,
    pub battery: BatteryPayload,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPayload {
    pub downlink: f64,
    #[serde(rename = "effectiveType")]
    pub effective_type: String,
    pub rtt: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatteryPayload {
    pub level: u8,
    pub charging: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinatesPayload {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_coordinates: String,
}

impl ChatRequest {
    pub fn build(
        message: &str,
        profile: &UserProfile,
        status: &DeviceStatus,
        coordinates: Option<&Coordinates>
    ) -> Self {
        Self {
            user: UserPayload::from(profile),
            message: message.to_string(),
            status: StatusPayload {
                connection: ConnectionPayload::normalize(status.connection.as_ref()),
                battery: BatteryPayload::normalize(status.battery.as_ref()),
            },
            coordinates: CoordinatesPayload::normalize(coordinates),
        }
    }
}

impl From<&UserProfile> for UserPayload {
    fn from(profile: &UserProfile) -> Self {
        Self {
            userid: profile.user_id.clone(),
            username: profile.username.clone(),
            password: profile.credential.expose().to_string(),
            is_loggedin: profile.logged_in,
            phone_number: profile.phone_number.clone(),
            platform: profile.platform,
            created_at: profile.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            updated_at: profile.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

impl ConnectionPayload {
    pub fn normalize(connection: Option<&ConnectionInfo>) -> Self {
        let Some(connection) = connection else {
            return Self {
                downlink: 0.0,
                effective_type: UNKNOWN_EFFECTIVE_TYPE.to_string(),
                rtt: 0,
            };
        };
        let effective_type = connection.effective_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN_EFFECTIVE_TYPE);

        Self {
            downlink: finite(connection.downlink).unwrap_or(0.0),
            effective_type: effective_type.to_string(),
            rtt: finite(connection.rtt).map_or(0, |rtt| rtt.round() as i64),
        }
    }
}

impl BatteryPayload {
    pub fn normalize(battery: Option<&BatteryInfo>) -> Self {
        let Some(battery) = battery else {
            return Self { level: DEFAULT_BATTERY_LEVEL, charging: false };
        };
        let level = finite(battery.level).map_or(DEFAULT_BATTERY_LEVEL, |level|
            level.round().clamp(0.0, 100.0) as u8
        );

        Self {
            level,
            charging: battery.charging.unwrap_or(false),
        }
    }
}

impl CoordinatesPayload {
    pub fn normalize(coordinates: Option<&Coordinates>) -> Self {
        let coords = coordinates.copied().unwrap_or(Coordinates::new(0.0, 0.0));
        Self {
            latitude: coords.latitude,
            longitude: coords.longitude,
            formatted_coordinates: coords.formatted(),
        }
    }
}
