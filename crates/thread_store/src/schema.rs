use perplexity_api::{Message, Role};
use serde::{Deserialize, Serialize};

use crate::id::new_thread_id;

/// One persisted conversation: an immutable id and its messages in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Thread {
    /// Starts a new thread whose first message is `query`.
    pub fn start(query: impl Into<String>) -> Self {
        let messages = vec![Message::user(query)];
        Self {
            id: new_thread_id(&messages),
            messages,
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// First user message, used by listings.
    pub fn first_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
