use serde::{ Serialize, Deserialize };

use super::chat::ChatMessage;
use super::device::{ BatteryInfo, ConnectionInfo };
use crate::session::SessionState;

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "location")] Location {
        latitude: f64,
        longitude: f64,
    },
    #[serde(rename = "location_error")] LocationError {
        message: String,
    },
    #[serde(rename = "status")] Status {
        #[serde(default)]
        online: Option<bool>,
        #[serde(default)]
        connection: Option<ConnectionInfo>,
        #[serde(default)]
        battery: Option<BatteryInfo>,
    },
    #[serde(rename = "history")]
    History,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "transcript")] Transcript {
        messages: Vec<ChatMessage>,
    },
    #[serde(rename = "message")] Message {
        message: ChatMessage,
    },
    #[serde(rename = "state")] State {
        state: SessionState,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}
