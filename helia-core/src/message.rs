use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One persisted entry in the (user, bot) message log
///
/// Messages are immutable once appended. Within a partition they are ordered
/// by `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub user_id: String,
    pub bot_name: String,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, user_id: &str, bot_name: &str, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            bot_name: bot_name.to_string(),
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// Creates a user message stamped with a fresh id and the current time
    pub fn user(user_id: &str, bot_name: &str, text: impl Into<String>) -> Self {
        Self::new(Role::User, user_id, bot_name, text)
    }

    /// Creates an assistant message stamped with a fresh id and the current time
    pub fn assistant(user_id: &str, bot_name: &str, text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, user_id, bot_name, text)
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}
