use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Front-end Args ---
    /// How users reach the chat session (server, repl)
    #[arg(long, env = "CHAT_MODE", default_value = "server")]
    pub mode: String,

    // --- Chat Endpoint Args ---
    /// URL of the remote chat endpoint that receives every message.
    #[arg(long, env = "CHAT_ENDPOINT", default_value = "http://localhost:8000/chat")]
    pub chat_endpoint: String,

    /// Hard limit for one chat request, in milliseconds. Late replies are discarded.
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "40000")]
    pub request_timeout_ms: u64,

    // --- User Profile Args ---
    /// Identifier of the signed-in user.
    #[arg(long, env = "USER_ID", default_value = "guest")]
    pub user_id: String,

    /// Display name of the signed-in user.
    #[arg(long, env = "USER_NAME", default_value = "Guest")]
    pub username: String,

    /// Opaque session credential issued by the identity provider.
    #[arg(long, env = "SESSION_TOKEN", default_value = "", hide_env_values = true)]
    pub session_token: String,

    /// Whether the user is signed in.
    #[arg(long, env = "USER_LOGGED_IN", default_value = "false")]
    pub logged_in: bool,

    /// Contact phone number forwarded with each message.
    #[arg(long, env = "USER_PHONE", default_value = "")]
    pub phone_number: String,

    /// Platform tag reported to the endpoint (website, mobile, desktop, whatsapp)
    #[arg(long, env = "USER_PLATFORM", default_value = "website")]
    pub platform: String,

    // --- Device Context Args (repl mode) ---
    /// Latitude of a fixed location. Requires --longitude.
    #[arg(long, env = "LATITUDE", allow_hyphen_values = true)]
    pub latitude: Option<f64>,

    /// Longitude of a fixed location. Requires --latitude.
    #[arg(long, env = "LONGITUDE", allow_hyphen_values = true)]
    pub longitude: Option<f64>,

    /// Reported downlink bandwidth in Mbps.
    #[arg(long, env = "DOWNLINK")]
    pub downlink: Option<f64>,

    /// Reported connection class (e.g. 4g, 3g, slow-2g).
    #[arg(long, env = "EFFECTIVE_TYPE")]
    pub effective_type: Option<String>,

    /// Reported round-trip time in milliseconds.
    #[arg(long, env = "RTT_MS")]
    pub rtt_ms: Option<f64>,

    /// Reported battery level in percent (0-100).
    #[arg(long, env = "BATTERY_LEVEL")]
    pub battery_level: Option<f64>,

    /// Whether the device is charging.
    #[arg(long, env = "BATTERY_CHARGING")]
    pub battery_charging: Option<bool>,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional API Key required for clients to connect to the WebSocket server. If set, clients must provide this key.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Maximum accepted WebSocket connections per second, across all peers.
    #[arg(long, env = "CONNECTIONS_PER_SECOND", default_value = "10")]
    pub connections_per_second: u32,

    /// Largest accepted WebSocket message in bytes.
    #[arg(long, env = "MAX_MESSAGE_BYTES", default_value = "1048576")]
    pub max_message_bytes: usize,

    // --- General App Args ---
    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}
