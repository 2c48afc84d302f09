//! Helia Runtime
//!
//! Process entry point pieces for a local, terminal-based Helia chat: the
//! environment-driven configuration, the console rendering and the error type
//! of the binary.

pub mod config;
pub mod console;

// Re-export core types for convenience
pub use helia_core;

/// Failures surfaced by the terminal chat
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] helia_core::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
