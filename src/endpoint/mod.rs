pub mod http;

use async_trait::async_trait;

use crate::error::ChatError;
use crate::models::payload::ChatRequest;

pub use self::http::HttpChatEndpoint;

/// Raw reply of the chat server, before it is mapped to transcript text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointReply {
    pub status: u16,
    pub body: String,
}

impl EndpointReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Remote chat server. Implementations report transport failures as `ChatError`
/// and hand back any HTTP reply untouched, whatever its status.
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    async fn post(&self, request: &ChatRequest) -> Result<EndpointReply, ChatError>;

    fn describe(&self) -> String;
}
