//! Streaming text generation with retry.
//!
//! [`TextGenerator`] is the seam to the hosted model: one call opens one
//! streaming request and hands back a finite, lazy [`FragmentStream`].
//! [`GenerationClient`] drives that stream, forwards every fragment to the
//! caller in arrival order, and retries transient failures.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::error::GenerationError;
use crate::token::estimate_tokens;

mod http;
pub mod mock;

pub use http::HttpGenerator;

/// Lazily produced fragments of one response, ending with the stream
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

/// Anything that can stream a completion for a prompt
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Opens a streaming request for `prompt`
    ///
    /// Errors returned here happen before any fragment was produced; errors
    /// inside the stream are terminal for that stream.
    async fn stream(&self, prompt: &str) -> Result<FragmentStream, GenerationError>;
}

/// How often and how patiently transient failures are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, including the first
    pub max_attempts: u32,
    /// Delay unit; the wait after attempt `n` is `n * base_delay`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Wait before the attempt following attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// A completed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// Concatenation of every delivered fragment, untrimmed
    pub full_text: String,
    /// `estimate_tokens(full_text)`, the usage figure used for billing
    pub tokens: u64,
}

/// One failed attempt, remembering whether the caller already saw output
struct AttemptFailure {
    error: GenerationError,
    delivered: bool,
}

/// Drives a [`TextGenerator`] with retry and fragment forwarding
pub struct GenerationClient<G: TextGenerator> {
    generator: G,
    policy: RetryPolicy,
}

impl<G: TextGenerator> GenerationClient<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Generates a response for `prompt`, forwarding fragments as they arrive
    ///
    /// `on_fragment` is called once per fragment, in arrival order, before the
    /// next fragment is awaited; the fragments concatenate to
    /// [`Generation::full_text`].
    ///
    /// Transient failures are retried while attempts remain, unless the
    /// failing attempt had already delivered fragments. An empty or
    /// whitespace-only response is [`GenerationError::EmptyResponse`].
    #[instrument(skip_all, fields(prompt_len = prompt.len()))]
    pub async fn generate<F>(
        &self,
        prompt: &str,
        mut on_fragment: F,
    ) -> Result<Generation, GenerationError>
    where
        F: FnMut(&str) + Send,
    {
        let mut attempt = 1;
        loop {
            match self.attempt(prompt, &mut on_fragment).await {
                Ok(full_text) => {
                    if full_text.trim().is_empty() {
                        error!(attempt, "stream completed without text");
                        return Err(GenerationError::EmptyResponse);
                    }
                    let tokens = estimate_tokens(&full_text);
                    info!(attempt, tokens, "generation complete");
                    return Ok(Generation { full_text, tokens });
                }
                Err(AttemptFailure { error, delivered }) => {
                    let retryable = error.is_transient() && !delivered;
                    if retryable && attempt < self.policy.max_attempts {
                        let delay = self.policy.delay_after(attempt);
                        warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            %error,
                            "attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    error!(attempt, %error, "generation failed");
                    return Err(error.with_attempts(attempt));
                }
            }
        }
    }

    async fn attempt<F>(&self, prompt: &str, on_fragment: &mut F) -> Result<String, AttemptFailure>
    where
        F: FnMut(&str) + Send,
    {
        let mut stream = self
            .generator
            .stream(prompt)
            .await
            .map_err(|error| AttemptFailure {
                error,
                delivered: false,
            })?;

        let mut full_text = String::new();
        let mut fragments = 0usize;
        while let Some(item) = stream.next().await {
            match item {
                Ok(fragment) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    full_text.push_str(&fragment);
                    fragments += 1;
                    on_fragment(&fragment);
                }
                Err(error) => {
                    return Err(AttemptFailure {
                        error,
                        delivered: fragments > 0,
                    });
                }
            }
        }
        debug!(fragments, chars = full_text.len(), "stream finished");
        Ok(full_text)
    }
}
