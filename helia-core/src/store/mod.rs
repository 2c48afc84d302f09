//! Gateways to the externally hosted message log and user records.
//!
//! The core never talks to a database directly. Whatever backs these traits
//! (a hosted relational service in production, [`memory`] in tests and the
//! local runtime) is constructed by the process entry point and injected into
//! the session controller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::Message;

pub mod memory;

/// Billing state of one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub credits: i64,
    pub is_subscribed: bool,
}

impl UserRecord {
    pub fn new(id: impl Into<String>, credits: i64) -> Self {
        Self {
            id: id.into(),
            credits,
            is_subscribed: false,
        }
    }

    #[must_use]
    pub fn subscribed(mut self) -> Self {
        self.is_subscribed = true;
        self
    }
}

/// Partial update of a [`UserRecord`]; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_subscribed: Option<bool>,
}

impl UserPatch {
    pub fn credits(credits: i64) -> Self {
        Self {
            credits: Some(credits),
            ..Self::default()
        }
    }

    pub fn subscription(is_subscribed: bool) -> Self {
        Self {
            is_subscribed: Some(is_subscribed),
            ..Self::default()
        }
    }

    /// Applies the patch in place
    pub fn apply(&self, record: &mut UserRecord) {
        if let Some(credits) = self.credits {
            record.credits = credits;
        }
        if let Some(is_subscribed) = self.is_subscribed {
            record.is_subscribed = is_subscribed;
        }
    }
}

/// Append-only log of messages partitioned by (user, bot)
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persists a message and returns the stored row
    async fn append(&self, message: Message) -> Result<Message, StoreError>;

    /// Returns the partition ordered by `created_at` ascending
    async fn query(&self, user_id: &str, bot_name: &str) -> Result<Vec<Message>, StoreError>;
}

/// Read/update access to user records
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn read(&self, user_id: &str) -> Result<UserRecord, StoreError>;

    /// Unconditionally applies `patch`
    async fn update(&self, user_id: &str, patch: UserPatch) -> Result<UserRecord, StoreError>;

    /// Applies `patch` only if the stored balance still equals `expected_credits`
    ///
    /// Returns `Ok(None)` when another writer changed the balance first. This
    /// is the per-row serializability the credit ledger relies on.
    async fn update_if_credits(
        &self,
        user_id: &str,
        expected_credits: i64,
        patch: UserPatch,
    ) -> Result<Option<UserRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_only_touches_set_fields() {
        let mut record = UserRecord::new("u1", 10);

        UserPatch::credits(4).apply(&mut record);
        assert_eq!(record.credits, 4);
        assert!(!record.is_subscribed);

        UserPatch::subscription(true).apply(&mut record);
        assert_eq!(record.credits, 4);
        assert!(record.is_subscribed);
    }

    #[test]
    fn test_patch_serializes_sparse() {
        let json = serde_json::to_string(&UserPatch::credits(7)).unwrap();
        assert_eq!(json, r#"{"credits":7}"#);
    }
}
