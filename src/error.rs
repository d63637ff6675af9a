//! Error types for the mood pipeline.
//!
//! Most failure families deliberately do *not* live here: a rejected update
//! gate check is a normal negative result ([`crate::gate::GateDecision`]),
//! profile host failures stay in [`crate::profile::ProfileError`] where the
//! retry logic consumes them, stats persistence is best-effort and only
//! logged, and the channel layer reports through `anyhow` at the adapter
//! seam.

/// Top-level error type for the mood bot.
#[derive(Debug, thiserror::Error)]
pub enum MoodError {
    /// Sentiment scorer failure (unreachable analyzer, invalid output).
    #[error("sentiment error: {0}")]
    Sentiment(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, MoodError>;
