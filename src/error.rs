use thiserror::Error;

pub const EMPTY_REPLY_FALLBACK: &str = "I received your message. How else can I assist you?";

/// Every way a chat turn can fail. `Display` is the text the user sees in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Request timed out. Please check your connection.")]
    Timeout,

    #[error("Unable to reach the server. Please check your connection.")]
    NetworkUnreachable,

    #[error("{}", server_error_message(.status, .detail))]
    ServerError {
        status: u16,
        detail: Option<String>,
    },

    #[error("Request error: {0}")]
    ClientError(String),

    #[error(
        "Sorry, I encountered an error processing your request. Please try again or contact emergency services directly if this is urgent."
    )]
    Unknown,
}

fn server_error_message(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!("Error: {}", detail),
        None => format!("Server error: {}", status),
    }
}

impl ChatError {
    /// Client-side failure; one without a usable message collapses to `Unknown`.
    pub fn client(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            ChatError::Unknown
        } else {
            ChatError::ClientError(message)
        }
    }

    /// Non-success reply. `body` is scanned for a JSON `detail` string.
    pub fn from_server_reply(status: u16, body: &str) -> Self {
        let detail = serde_json
            ::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| value.get("detail").and_then(|d| d.as_str()).map(str::to_owned))
            .filter(|d| !d.is_empty());
        ChatError::ServerError { status, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_with_detail() {
        let err = ChatError::from_server_reply(500, r#"{"detail":"db down"}"#);
        assert_eq!(err.to_string(), "Error: db down");
    }

    #[test]
    fn server_error_without_parseable_body() {
        assert_eq!(ChatError::from_server_reply(500, "").to_string(), "Server error: 500");
        assert_eq!(
            ChatError::from_server_reply(502, "<html>bad gateway</html>").to_string(),
            "Server error: 502"
        );
    }

    #[test]
    fn non_string_detail_is_ignored() {
        let body = r#"{"detail":[{"loc":["body","user"],"msg":"field required"}]}"#;
        assert_eq!(ChatError::from_server_reply(422, body).to_string(), "Server error: 422");
    }

    #[test]
    fn client_error_without_message_is_unknown() {
        assert_eq!(ChatError::client("  "), ChatError::Unknown);
        assert_eq!(ChatError::client("bad header").to_string(), "Request error: bad header");
        assert!(ChatError::Unknown.to_string().contains("contact emergency services"));
    }

    #[test]
    fn fixed_messages() {
        assert_eq!(
            ChatError::Timeout.to_string(),
            "Request timed out. Please check your connection."
        );
        assert_eq!(
            ChatError::NetworkUnreachable.to_string(),
            "Unable to reach the server. Please check your connection."
        );
    }
}
