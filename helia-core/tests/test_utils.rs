#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use helia_core::generation::mock::{ScriptedAttempt, ScriptedGenerator};
use helia_core::store::memory::{InMemoryMessageStore, InMemoryUserStore};
use helia_core::{
    ChatSession, GenerationClient, Message, MessageStore, StoreError, UserPatch, UserRecord,
    UserStore,
};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, registry};

/// Helper function to set up tracing for tests
pub fn setup_tracing(level: Level) {
    let subscriber = registry()
        .with(
            fmt::layer()
                .with_test_writer()
                .with_ansi(false) // Better for CI logs
                .with_file(true) // Include source code location
                .with_line_number(true),
        )
        .with(
            EnvFilter::from_default_env()
                .add_directive(level.into())
                .add_directive("hyper=info".parse().unwrap()),
        );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// User store that counts conditional writes
#[derive(Debug, Default)]
pub struct CountingUserStore {
    pub inner: InMemoryUserStore,
    pub conditional_writes: AtomicUsize,
}

impl CountingUserStore {
    pub fn with_user(record: UserRecord) -> Self {
        Self {
            inner: InMemoryUserStore::with_user(record),
            conditional_writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.conditional_writes.load(Ordering::SeqCst)
    }

    pub fn credits(&self, user_id: &str) -> i64 {
        self.inner.get(user_id).unwrap().credits
    }
}

#[async_trait]
impl UserStore for CountingUserStore {
    async fn read(&self, user_id: &str) -> Result<UserRecord, StoreError> {
        self.inner.read(user_id).await
    }

    async fn update(&self, user_id: &str, patch: UserPatch) -> Result<UserRecord, StoreError> {
        self.inner.update(user_id, patch).await
    }

    async fn update_if_credits(
        &self,
        user_id: &str,
        expected_credits: i64,
        patch: UserPatch,
    ) -> Result<Option<UserRecord>, StoreError> {
        self.conditional_writes.fetch_add(1, Ordering::SeqCst);
        self.inner
            .update_if_credits(user_id, expected_credits, patch)
            .await
    }
}

/// Message store whose backend is down
#[derive(Debug, Default)]
pub struct UnavailableMessageStore;

#[async_trait]
impl MessageStore for UnavailableMessageStore {
    async fn append(&self, _message: Message) -> Result<Message, StoreError> {
        Err(StoreError::Backend("connection reset by peer".to_string()))
    }

    async fn query(&self, _user_id: &str, _bot_name: &str) -> Result<Vec<Message>, StoreError> {
        Err(StoreError::Backend("connection reset by peer".to_string()))
    }
}

/// What a [`LimitedMessageStore`] does once its successful appends are used up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterLimit {
    Fail,
    Hang,
}

/// Message store that accepts `successes` appends, then fails or never answers
#[derive(Debug)]
pub struct LimitedMessageStore {
    pub inner: InMemoryMessageStore,
    successes: AtomicUsize,
    after: AfterLimit,
}

impl LimitedMessageStore {
    pub fn new(successes: usize, after: AfterLimit) -> Self {
        Self {
            inner: InMemoryMessageStore::new(),
            successes: AtomicUsize::new(successes),
            after,
        }
    }
}

#[async_trait]
impl MessageStore for LimitedMessageStore {
    async fn append(&self, message: Message) -> Result<Message, StoreError> {
        let allowed = self
            .successes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if allowed {
            return self.inner.append(message).await;
        }
        match self.after {
            AfterLimit::Fail => Err(StoreError::Backend("write timed out".to_string())),
            AfterLimit::Hang => std::future::pending().await,
        }
    }

    async fn query(&self, user_id: &str, bot_name: &str) -> Result<Vec<Message>, StoreError> {
        self.inner.query(user_id, bot_name).await
    }
}

/// Opens a Helia Sunbeam session for `u1` over any message store
pub fn open_with_store<M: MessageStore>(
    messages: Arc<M>,
    record: UserRecord,
    script: Vec<ScriptedAttempt>,
) -> (
    ChatSession<M, CountingUserStore, ScriptedGenerator>,
    Arc<CountingUserStore>,
) {
    let users = Arc::new(CountingUserStore::with_user(record));
    let chat = ChatSession::open(
        "helia-sunbeam",
        messages,
        Arc::clone(&users),
        GenerationClient::new(ScriptedGenerator::new(script)),
    )
    .unwrap();
    (chat, users)
}

pub type TestChat = ChatSession<InMemoryMessageStore, CountingUserStore, ScriptedGenerator>;

/// A session for `u1` talking to Helia Sunbeam, plus handles on its collaborators
pub struct Fixture {
    pub chat: TestChat,
    pub messages: InMemoryMessageStore,
    pub users: Arc<CountingUserStore>,
    pub generator: ScriptedGenerator,
}

pub fn fixture(record: UserRecord, script: Vec<ScriptedAttempt>) -> Fixture {
    let messages = InMemoryMessageStore::new();
    let users = Arc::new(CountingUserStore::with_user(record));
    let generator = ScriptedGenerator::new(script);
    let chat = ChatSession::open(
        "helia-sunbeam",
        Arc::new(messages.clone()),
        Arc::clone(&users),
        GenerationClient::new(generator.clone()),
    )
    .unwrap();

    Fixture {
        chat,
        messages,
        users,
        generator,
    }
}
