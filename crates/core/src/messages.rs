use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A conversation split the way the backend wants it: system instruction
/// out of band, the rest in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translated {
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

/// Pull system messages out of the history.
///
/// When several system messages are present the last one wins and earlier
/// ones are dropped.
pub fn translate(messages: &[ChatMessage]) -> Translated {
    let mut translated = Translated::default();
    for message in messages {
        match message.role {
            Role::System => translated.system = message.content.clone(),
            Role::User | Role::Assistant => translated.messages.push(message.clone()),
        }
    }
    translated
}
