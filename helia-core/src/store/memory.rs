use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, trace};

use super::{MessageStore, UserPatch, UserRecord, UserStore};
use crate::error::StoreError;
use crate::message::Message;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-local message log
///
/// Clones share the same rows, so a test can keep a handle while the session
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMessageStore {
    rows: Arc<Mutex<Vec<Message>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row in insertion order, across partitions
    pub fn all(&self) -> Vec<Message> {
        lock(&self.rows).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.rows).is_empty()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: Message) -> Result<Message, StoreError> {
        let mut rows = lock(&self.rows);
        if rows.iter().any(|row| row.id == message.id) {
            return Err(StoreError::Conflict(format!(
                "message {} already exists",
                message.id
            )));
        }
        trace!(id = %message.id, role = message.role.as_str(), "appending message");
        rows.push(message.clone());
        Ok(message)
    }

    async fn query(&self, user_id: &str, bot_name: &str) -> Result<Vec<Message>, StoreError> {
        let mut partition: Vec<Message> = lock(&self.rows)
            .iter()
            .filter(|row| row.user_id == user_id && row.bot_name == bot_name)
            .cloned()
            .collect();
        partition.sort_by_key(|row| row.created_at);
        debug!(user_id, bot_name, rows = partition.len(), "queried messages");
        Ok(partition)
    }
}

/// Process-local user table with compare-and-set on the balance
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<Mutex<HashMap<String, UserRecord>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding a single record
    pub fn with_user(record: UserRecord) -> Self {
        let store = Self::default();
        store.insert(record);
        store
    }

    /// Inserts or replaces a record
    pub fn insert(&self, record: UserRecord) {
        lock(&self.users).insert(record.id.clone(), record);
    }

    pub fn get(&self, user_id: &str) -> Option<UserRecord> {
        lock(&self.users).get(user_id).cloned()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn read(&self, user_id: &str) -> Result<UserRecord, StoreError> {
        self.get(user_id)
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))
    }

    async fn update(&self, user_id: &str, patch: UserPatch) -> Result<UserRecord, StoreError> {
        let mut users = lock(&self.users);
        let record = users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))?;
        patch.apply(record);
        Ok(record.clone())
    }

    async fn update_if_credits(
        &self,
        user_id: &str,
        expected_credits: i64,
        patch: UserPatch,
    ) -> Result<Option<UserRecord>, StoreError> {
        let mut users = lock(&self.users);
        let record = users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(user_id.to_string()))?;
        if record.credits != expected_credits {
            debug!(
                user_id,
                expected_credits,
                actual = record.credits,
                "conditional update lost"
            );
            return Ok(None);
        }
        patch.apply(record);
        Ok(Some(record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_query_filters_and_orders() {
        tokio_test::block_on(async {
            let store = InMemoryMessageStore::new();
            let mut late = Message::user("u1", "helia-sunbeam", "second");
            late.created_at += Duration::seconds(5);
            let early = Message::user("u1", "helia-sunbeam", "first");
            let other_bot = Message::user("u1", "helia-sun-shield", "elsewhere");

            store.append(late).await.unwrap();
            store.append(early).await.unwrap();
            store.append(other_bot).await.unwrap();

            let rows = store.query("u1", "helia-sunbeam").await.unwrap();
            let texts: Vec<_> = rows.iter().map(|m| m.text.as_str()).collect();
            assert_eq!(texts, vec!["first", "second"]);
            assert_eq!(store.len(), 3);
        });
    }

    #[test]
    fn test_duplicate_append_is_rejected() {
        tokio_test::block_on(async {
            let store = InMemoryMessageStore::new();
            let msg = Message::user("u1", "helia-sunbeam", "hi");
            store.append(msg.clone()).await.unwrap();
            let err = store.append(msg).await.unwrap_err();
            assert!(matches!(err, StoreError::Conflict(_)));
        });
    }

    #[test]
    fn test_conditional_update() {
        tokio_test::block_on(async {
            let store = InMemoryUserStore::with_user(UserRecord::new("u1", 10));

            let lost = store
                .update_if_credits("u1", 9, UserPatch::credits(5))
                .await
                .unwrap();
            assert!(lost.is_none());
            assert_eq!(store.get("u1").unwrap().credits, 10);

            let won = store
                .update_if_credits("u1", 10, UserPatch::credits(5))
                .await
                .unwrap();
            assert_eq!(won.unwrap().credits, 5);
        });
    }

    #[test]
    fn test_missing_user() {
        tokio_test::block_on(async {
            let store = InMemoryUserStore::new();
            let err = store.read("ghost").await.unwrap_err();
            assert_eq!(err, StoreError::NotFound("ghost".into()));
        });
    }
}
