use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };

pub const GREETING: &str = "Hello! I'm your Emergency AI Assistant. How can I help you today?";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: Sender,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Short wall-clock label shown next to the message, e.g. "09:41 PM".
    pub fn display_time(&self) -> String {
        self.sent_at.with_timezone(&chrono::Local).format("%I:%M %p").to_string()
    }
}

/// Append-only conversation history of one chat session.
#[derive(Clone, Debug)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        let mut transcript = Self { messages: Vec::new() };
        transcript.append(Sender::Bot, GREETING);
        transcript
    }

    /// Appends a message stamped with the current time and returns a copy of it.
    /// Ids are `len + 1`, so they stay unique and increasing as long as nothing is removed.
    pub fn append(&mut self, sender: Sender, text: impl Into<String>) -> ChatMessage {
        let message = ChatMessage {
            id: (self.messages.len() as u64) + 1,
            sender,
            text: text.into(),
            sent_at: Utc::now(),
        };
        self.messages.push(message.clone());
        message
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}
