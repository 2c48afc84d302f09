use thiserror::Error;

/// Failures produced while generating a response from the model endpoint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// API key or endpoint is missing, malformed, or rejected by the service
    #[error("Missing or invalid configuration: {0}")]
    MissingConfiguration(String),

    /// Network or timeout class failure, still failing after `attempts` tries
    #[error("Network failure after {attempts} attempt(s): {message}")]
    NetworkFailure { attempts: u32, message: String },

    /// The safety filter rejected the prompt or the response
    #[error("Blocked by content safety filter: {0}")]
    ContentSafetyBlocked(String),

    /// The stream completed without producing any text
    #[error("No response generated from the model")]
    EmptyResponse,

    /// Anything the classifier does not recognise
    #[error("Failed to generate response: {0}")]
    Unknown(String),
}

impl GenerationError {
    /// Builds a single-attempt network failure
    pub fn network(message: impl Into<String>) -> Self {
        GenerationError::NetworkFailure {
            attempts: 1,
            message: message.into(),
        }
    }

    /// Whether another attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::NetworkFailure { .. })
    }

    /// Stamps the number of attempts made onto a network failure
    #[must_use]
    pub fn with_attempts(self, attempts: u32) -> Self {
        match self {
            GenerationError::NetworkFailure { message, .. } => {
                GenerationError::NetworkFailure { attempts, message }
            }
            other => other,
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
            GenerationError::network(err.to_string())
        } else {
            GenerationError::Unknown(err.to_string())
        }
    }
}

impl From<url::ParseError> for GenerationError {
    fn from(err: url::ParseError) -> Self {
        GenerationError::MissingConfiguration(format!("invalid base url: {err}"))
    }
}

/// Failures reported by the message and user record gateways
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with the given key
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A conditional update kept losing against concurrent writers
    #[error("Conflicting concurrent update: {0}")]
    Conflict(String),

    /// The backing service failed
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Represents errors that can occur while running a chat turn
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected locally before any network call
    #[error("Invalid input: {0}")]
    Validation(String),

    /// No session, or the session is no longer valid
    #[error("Please sign in to continue")]
    NoSession,

    /// Another turn is already streaming for this session
    #[error("A message is already being processed")]
    TurnInFlight,

    /// Bot id is not in the persona catalog
    #[error("Bot not found: {0}")]
    UnknownBot(String),

    /// Balance does not cover the cost of the turn
    #[error("You need {required} credits for this message, but you only have {available} credits")]
    InsufficientCredits { required: i64, available: i64 },

    /// The user has no account record
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Either gateway failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// The generation client failed
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Process configuration could not be loaded
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification of an [`Error`] for presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InsufficientCredits,
    Connection,
    ContentSafety,
    Persistence,
    EmptyResponse,
    Configuration,
    Unknown,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::NoSession | Error::TurnInFlight | Error::UnknownBot(_) => {
                ErrorKind::Validation
            }
            Error::InsufficientCredits { .. } => ErrorKind::InsufficientCredits,
            Error::AccountNotFound(_) | Error::Persistence(_) => ErrorKind::Persistence,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Generation(err) => match err {
                GenerationError::NetworkFailure { .. } => ErrorKind::Connection,
                GenerationError::ContentSafetyBlocked(_) => ErrorKind::ContentSafety,
                GenerationError::EmptyResponse => ErrorKind::EmptyResponse,
                GenerationError::MissingConfiguration(_) => ErrorKind::Configuration,
                GenerationError::Unknown(_) => ErrorKind::Unknown,
            },
        }
    }
}

/// A Result type that uses our Error type
pub type Result<T> = std::result::Result<T, Error>;
