use serde::{ Serialize, Deserialize };

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Both axes fixed to six decimals, e.g. "37.774900, -122.419400".
    pub fn formatted(&self) -> String {
        format!("{:.6}, {:.6}", self.latitude, self.longitude)
    }

    pub fn in_range(&self) -> bool {
        self.latitude.is_finite() &&
            self.longitude.is_finite() &&
            (-90.0..=90.0).contains(&self.latitude) &&
            (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Network metadata as reported by the device. Any field may be missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(default)]
    pub downlink: Option<f64>,
    #[serde(default, rename = "effectiveType")]
    pub effective_type: Option<String>,
    #[serde(default)]
    pub rtt: Option<f64>,
}

/// Battery state, `level` in percent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryInfo {
    #[serde(default)]
    pub level: Option<f64>,
    #[serde(default)]
    pub charging: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub online: bool,
    #[serde(default)]
    pub connection: Option<ConnectionInfo>,
    #[serde(default)]
    pub battery: Option<BatteryInfo>,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            online: true,
            connection: None,
            battery: None,
        }
    }
}

/// Partial status change pushed by a provider; absent fields keep their last value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(default)]
    pub online: Option<bool>,
    #[serde(default)]
    pub connection: Option<ConnectionInfo>,
    #[serde(default)]
    pub battery: Option<BatteryInfo>,
}

impl DeviceStatus {
    pub fn apply(&mut self, update: StatusUpdate) {
        if let Some(online) = update.online {
            self.online = online;
        }
        if let Some(connection) = update.connection {
            self.connection = Some(connection);
        }
        if let Some(battery) = update.battery {
            self.battery = Some(battery);
        }
    }
}
