//! Credit metering for non-subscribed users.
//!
//! One credit buys roughly ten estimated tokens, and any non-zero usage costs
//! at least one credit. Two token bases are used on purpose: the pre-check
//! before generation estimates from the outgoing user text, while the debit
//! after generation uses the response tokens.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result, StoreError};
use crate::store::{UserPatch, UserRecord, UserStore};
use crate::token::estimate_tokens;

/// Tokens bought by one credit
pub const TOKENS_PER_CREDIT: u64 = 10;

/// Attempts at the conditional write before a debit gives up
const MAX_DEBIT_ATTEMPTS: usize = 5;

/// Credits charged for `tokens` of usage: `max(1, floor(tokens * 0.1))`
///
/// Zero usage is free.
///
/// ```
/// use helia_core::credits::cost;
///
/// assert_eq!(cost(0), 0);
/// assert_eq!(cost(9), 1);
/// assert_eq!(cost(25), 2);
/// ```
pub fn cost(tokens: u64) -> i64 {
    if tokens == 0 {
        return 0;
    }
    let credits = i64::try_from(tokens / TOKENS_PER_CREDIT).unwrap_or(i64::MAX);
    credits.max(1)
}

/// Pessimistic pre-check from the outgoing text alone
///
/// Subscribed users always pass.
pub fn check_credits(record: &UserRecord, user_text: &str) -> Result<()> {
    if record.is_subscribed {
        return Ok(());
    }
    let required = cost(estimate_tokens(user_text));
    if record.credits < required {
        return Err(Error::InsufficientCredits {
            required,
            available: record.credits,
        });
    }
    Ok(())
}

/// Reads and debits balances through a [`UserStore`]
pub struct CreditLedger<U: UserStore> {
    users: Arc<U>,
}

impl<U: UserStore> Clone for CreditLedger<U> {
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
        }
    }
}

impl<U: UserStore> CreditLedger<U> {
    pub fn new(users: Arc<U>) -> Self {
        Self { users }
    }

    async fn read(&self, user_id: &str) -> Result<UserRecord> {
        self.users.read(user_id).await.map_err(|err| match err {
            StoreError::NotFound(_) => Error::AccountNotFound(user_id.to_string()),
            other => Error::Persistence(other),
        })
    }

    /// Reads the user's record, clamping a negative balance back to zero
    #[instrument(skip(self), level = "debug")]
    pub async fn account(&self, user_id: &str) -> Result<UserRecord> {
        let record = self.read(user_id).await?;
        if record.credits >= 0 {
            return Ok(record);
        }

        warn!(credits = record.credits, "negative balance found, clamping to zero");
        let healed = self
            .users
            .update_if_credits(user_id, record.credits, UserPatch::credits(0))
            .await?;
        match healed {
            Some(record) => Ok(record),
            // someone else wrote in between; their value wins
            None => self.read(user_id).await,
        }
    }

    /// Current balance, self-healed
    pub async fn balance(&self, user_id: &str) -> Result<i64> {
        Ok(self.account(user_id).await?.credits)
    }

    /// Charges `cost(tokens)` and returns the new balance
    ///
    /// Fails with [`Error::InsufficientCredits`] without writing anything when
    /// the balance does not cover the cost. The write is conditional on the
    /// balance that was read, so concurrent debits for the same user cannot
    /// both spend the same credits.
    #[instrument(skip(self), level = "debug")]
    pub async fn debit(&self, user_id: &str, tokens: u64) -> Result<i64> {
        let required = cost(tokens);

        for attempt in 1..=MAX_DEBIT_ATTEMPTS {
            let current = self.read(user_id).await?.credits;
            if current < required {
                info!(current, required, "debit rejected");
                return Err(Error::InsufficientCredits {
                    required,
                    available: current,
                });
            }

            let new_balance = (current - required).max(0);
            let written = self
                .users
                .update_if_credits(user_id, current, UserPatch::credits(new_balance))
                .await?;
            if let Some(record) = written {
                debug!(required, balance = record.credits, "debited credits");
                return Ok(record.credits);
            }
            debug!(attempt, "balance changed during debit, retrying");
        }

        Err(Error::Persistence(StoreError::Conflict(format!(
            "could not debit {user_id} after {MAX_DEBIT_ATTEMPTS} attempts"
        ))))
    }

    /// Turns the subscription flag on or off
    #[instrument(skip(self), level = "debug")]
    pub async fn set_subscription(&self, user_id: &str, is_subscribed: bool) -> Result<UserRecord> {
        self.users
            .update(user_id, UserPatch::subscription(is_subscribed))
            .await
            .map_err(|err| match err {
                StoreError::NotFound(_) => Error::AccountNotFound(user_id.to_string()),
                other => Error::Persistence(other),
            })
    }
}
