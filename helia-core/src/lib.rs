// This is the main library file that re-exports the public API
// and defines the module structure.

pub mod credits;
pub mod error;
pub mod generation;
pub mod message;
pub mod notice;
pub mod persona;
pub mod provider;
pub mod secret;
pub mod session;
pub mod sse;
pub mod store;
pub mod token;
pub mod view;

// Re-export the main types for convenient usage
pub use credits::{CreditLedger, check_credits, cost};
pub use error::{Error, ErrorKind, GenerationError, Result, StoreError};
pub use generation::{
    FragmentStream, Generation, GenerationClient, HttpGenerator, RetryPolicy, TextGenerator,
};
pub use message::{Message, Role};
pub use notice::{Notice, NoticeAction};
pub use persona::{PERSONAS, Persona};
pub use secret::Secret;
pub use session::{ChatSession, Session, TurnOutcome, TurnState};
pub use store::{MessageStore, UserPatch, UserRecord, UserStore};
pub use token::{TokenCounter, estimate_tokens};
pub use view::ConversationView;
