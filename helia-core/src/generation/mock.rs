use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio::sync::Notify;

use super::{FragmentStream, TextGenerator};
use crate::error::GenerationError;

/// What one call to [`ScriptedGenerator::stream`] does
#[derive(Debug, Clone)]
pub enum ScriptedAttempt {
    /// Fail before any fragment is produced
    Fail(GenerationError),
    /// Yield these items, then end
    Stream(Vec<Result<String, GenerationError>>),
    /// Yield the items, then wait for the gate before ending
    Gated {
        items: Vec<Result<String, GenerationError>>,
        gate: Arc<Notify>,
    },
    /// Yield the items, then never end
    Hang(Vec<Result<String, GenerationError>>),
}

impl ScriptedAttempt {
    /// A successful attempt producing `fragments`
    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedAttempt::Stream(fragments.into_iter().map(|f| Ok(f.into())).collect())
    }
}

/// Generator that replays a script, one entry per attempt
///
/// Clones share the script and the counters, so a test can keep one handle
/// while a session owns another. Once the script is exhausted every further
/// attempt fails with [`GenerationError::Unknown`].
///
/// # Examples
///
/// ```
/// use helia_core::generation::mock::{ScriptedAttempt, ScriptedGenerator};
///
/// let generator = ScriptedGenerator::new(vec![ScriptedAttempt::fragments(["Hi", "!"])]);
/// assert_eq!(generator.attempts(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerator {
    script: Arc<Mutex<VecDeque<ScriptedAttempt>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    attempts: Arc<AtomicU32>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedGenerator {
    pub fn new(script: Vec<ScriptedAttempt>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Self::default()
        }
    }

    /// Appends an entry to the end of the script
    pub fn push(&self, attempt: ScriptedAttempt) {
        lock(&self.script).push_back(attempt);
    }

    /// Number of times `stream` has been called
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Every prompt received, in call order
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn stream(&self, prompt: &str) -> Result<FragmentStream, GenerationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        lock(&self.prompts).push(prompt.to_string());
        let next = lock(&self.script).pop_front();

        match next {
            None => Err(GenerationError::Unknown("script exhausted".to_string())),
            Some(ScriptedAttempt::Fail(error)) => Err(error),
            Some(ScriptedAttempt::Stream(items)) => Ok(Box::pin(stream::iter(items))),
            Some(ScriptedAttempt::Gated { items, gate }) => {
                let wait = stream::once(async move {
                    gate.notified().await;
                    None::<Result<String, GenerationError>>
                })
                .filter_map(|item| async move { item });
                Ok(Box::pin(stream::iter(items).chain(wait)))
            }
            Some(ScriptedAttempt::Hang(items)) => {
                Ok(Box::pin(stream::iter(items).chain(stream::pending())))
            }
        }
    }
}
