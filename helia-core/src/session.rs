//! One conversation between a signed-in user and one bot.
//!
//! [`ChatSession`] runs a user turn end to end: precondition checks, the
//! credit pre-check, persisting the user message, streaming the reply,
//! billing it and persisting it. At most one turn is in flight per session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, instrument};

use crate::credits::{CreditLedger, check_credits};
use crate::error::{Error, Result};
use crate::generation::{GenerationClient, TextGenerator};
use crate::message::Message;
use crate::persona::Persona;
use crate::store::{MessageStore, UserRecord, UserStore};
use crate::token::TokenCounter;
use crate::view::ConversationView;

/// The signed-in identity as reported by the auth layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub is_valid: bool,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_valid: true,
        }
    }

    /// A session the auth layer no longer accepts
    pub fn expired(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_valid: false,
        }
    }
}

/// Where the in-flight turn currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Validating,
    PersistingUser,
    Streaming,
    Debiting,
    PersistingAssistant,
}

/// Result of a completed turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub user_message: Message,
    pub assistant_message: Message,
    /// Estimated tokens of the response
    pub tokens: u64,
    /// Balance after the debit; `None` for subscribed users
    pub balance: Option<i64>,
}

#[derive(Debug, Default)]
struct LocalState {
    view: ConversationView,
    draft: String,
    state: TurnState,
    account: Option<UserRecord>,
    tokens: TokenCounter,
}

/// Clears the transient turn state however the turn ends, including when the
/// turn future is dropped half way
struct TurnGuard<'a> {
    in_flight: &'a AtomicBool,
    local: &'a Mutex<LocalState>,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        {
            let mut local = self.local.lock().unwrap_or_else(PoisonError::into_inner);
            local.draft.clear();
            local.state = TurnState::Idle;
        }
        self.in_flight.store(false, Ordering::Release);
    }
}

/// Turn controller bound to one bot
///
/// Gateways and the generator are injected by the caller, which owns their
/// lifecycle.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use helia_core::generation::mock::{ScriptedAttempt, ScriptedGenerator};
/// use helia_core::store::memory::{InMemoryMessageStore, InMemoryUserStore};
/// use helia_core::{ChatSession, GenerationClient, Session, UserRecord};
///
/// # tokio_test::block_on(async {
/// let users = Arc::new(InMemoryUserStore::with_user(UserRecord::new("u1", 5)));
/// let generator = ScriptedGenerator::new(vec![ScriptedAttempt::fragments(["Hi", " there"])]);
/// let chat = ChatSession::open(
///     "helia-sunbeam",
///     Arc::new(InMemoryMessageStore::new()),
///     users,
///     GenerationClient::new(generator),
/// )
/// .unwrap();
///
/// let session = Session::new("u1");
/// let outcome = chat.submit_turn(Some(&session), "hello", |_| {}).await.unwrap();
/// assert_eq!(outcome.assistant_message.text, "Hi there");
/// assert_eq!(chat.messages().len(), 2);
/// # });
/// ```
pub struct ChatSession<M: MessageStore, U: UserStore, G: TextGenerator> {
    persona: &'static Persona,
    messages: Arc<M>,
    ledger: CreditLedger<U>,
    generator: GenerationClient<G>,
    in_flight: AtomicBool,
    local: Mutex<LocalState>,
}

impl<M, U, G> ChatSession<M, U, G>
where
    M: MessageStore,
    U: UserStore,
    G: TextGenerator,
{
    /// Opens a session for the bot `bot_id`
    pub fn open(
        bot_id: &str,
        messages: Arc<M>,
        users: Arc<U>,
        generator: GenerationClient<G>,
    ) -> Result<Self> {
        let persona = Persona::find(bot_id)?;
        Ok(Self {
            persona,
            messages,
            ledger: CreditLedger::new(users),
            generator,
            in_flight: AtomicBool::new(false),
            local: Mutex::new(LocalState::default()),
        })
    }

    pub fn persona(&self) -> &'static Persona {
        self.persona
    }

    pub fn ledger(&self) -> &CreditLedger<U> {
        &self.ledger
    }

    fn local(&self) -> MutexGuard<'_, LocalState> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: TurnState) {
        debug!(?state, "turn state");
        self.local().state = state;
    }

    fn begin_turn(&self) -> Result<TurnGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::TurnInFlight)?;
        Ok(TurnGuard {
            in_flight: &self.in_flight,
            local: &self.local,
        })
    }

    /// Runs one user turn
    ///
    /// Each response fragment is appended to [`draft`](Self::draft) and then
    /// handed to `on_fragment`, in arrival order. Whatever happens, the draft
    /// is cleared and the session is idle again when this returns. A failure
    /// after the user message was persisted keeps that message.
    ///
    /// Dropping the returned future cancels the turn. Before the debit that
    /// commits nothing beyond the user message. Once `Debiting` has started,
    /// the charge may already be written while the assistant message is not;
    /// there is no refund.
    #[instrument(skip_all, fields(bot = self.persona.id))]
    pub async fn submit_turn<F>(
        &self,
        session: Option<&Session>,
        user_text: &str,
        mut on_fragment: F,
    ) -> Result<TurnOutcome>
    where
        F: FnMut(&str) + Send,
    {
        let text = user_text.trim();
        if text.is_empty() {
            return Err(Error::Validation("Message cannot be empty".to_string()));
        }
        let _guard = self.begin_turn()?;

        let result = self.run_turn(session, text, &mut on_fragment).await;
        if let Err(err) = &result {
            error!(kind = ?err.kind(), "turn failed: {}", err);
        }
        result
    }

    async fn run_turn<F>(
        &self,
        session: Option<&Session>,
        text: &str,
        on_fragment: &mut F,
    ) -> Result<TurnOutcome>
    where
        F: FnMut(&str) + Send,
    {
        self.set_state(TurnState::Validating);
        let user_id = valid_user(session)?;

        let account = self.ledger.account(user_id).await?;
        self.local().account = Some(account.clone());
        check_credits(&account, text)?;

        self.set_state(TurnState::PersistingUser);
        let user_message = self
            .messages
            .append(Message::user(user_id, self.persona.id, text))
            .await?;
        self.local().view.apply_local(user_message.clone());

        self.set_state(TurnState::Streaming);
        let prompt = self.persona.prompt_for(text);
        self.local().tokens.observe(&prompt);
        let generation = self
            .generator
            .generate(&prompt, |fragment| {
                self.local().draft.push_str(fragment);
                on_fragment(fragment);
            })
            .await?;
        self.local().tokens.add(generation.tokens);

        let balance = if account.is_subscribed {
            None
        } else {
            self.set_state(TurnState::Debiting);
            let balance = self.ledger.debit(user_id, generation.tokens).await?;
            if let Some(account) = self.local().account.as_mut() {
                account.credits = balance;
            }
            Some(balance)
        };

        self.set_state(TurnState::PersistingAssistant);
        let assistant_message = self
            .messages
            .append(Message::assistant(
                user_id,
                self.persona.id,
                generation.full_text.trim(),
            ))
            .await?;
        self.local().view.apply_local(assistant_message.clone());

        info!(tokens = generation.tokens, ?balance, "turn complete");
        Ok(TurnOutcome {
            user_message,
            assistant_message,
            tokens: generation.tokens,
            balance,
        })
    }

    /// Reloads the account and the authoritative history
    ///
    /// Locally applied messages the store does not return yet stay visible.
    #[instrument(skip_all, fields(bot = self.persona.id))]
    pub async fn refresh(&self, session: Option<&Session>) -> Result<Vec<Message>> {
        let user_id = valid_user(session)?;
        let account = self.ledger.account(user_id).await?;
        let history = self.messages.query(user_id, self.persona.id).await?;
        debug!(rows = history.len(), "history loaded");

        let mut local = self.local();
        local.account = Some(account);
        local.view.reconcile(history);
        Ok(local.view.messages())
    }

    /// Confirmed and locally applied messages, oldest first
    pub fn messages(&self) -> Vec<Message> {
        self.local().view.messages()
    }

    /// Text streamed so far for the in-flight turn
    pub fn draft(&self) -> String {
        self.local().draft.clone()
    }

    pub fn state(&self) -> TurnState {
        self.local().state
    }

    /// Last known account record, if one was read
    pub fn account(&self) -> Option<UserRecord> {
        self.local().account.clone()
    }

    /// Estimated tokens of every prompt and response in this session
    pub fn tokens_used(&self) -> u64 {
        self.local().tokens.total()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

fn valid_user(session: Option<&Session>) -> Result<&str> {
    match session {
        Some(session) if session.is_valid && !session.user_id.is_empty() => {
            Ok(session.user_id.as_str())
        }
        _ => Err(Error::NoSession),
    }
}
