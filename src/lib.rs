//! Moodring: a chat companion that mirrors group-chat mood onto an
//! external profile picture.
//!
//! # Architecture
//!
//! Messages flow through a single pipeline owned by [`manager::MoodManager`]:
//! chat text → mood inference → rate gate → external profile update →
//! history. The stages are:
//! - **Channels**: inbound chat adapters (Discord gateway + REST)
//! - **Classifier**: keyword table first, VADER sentiment second
//! - **Gate**: daily quota, cooldown, and jittered pacing per actor
//! - **Profile**: the external avatar host behind a trait seam
//! - **History**: append-only event log with derived statistics
//!
//! On top of the log sit the suggestion and forecast helpers and a small
//! daily scheduler for routine transitions (sleep, meals).

pub mod channels;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod error;
pub mod gate;
pub mod history;
pub mod manager;
pub mod mood;
pub mod predict;
pub mod profile;
pub mod scheduler;
pub mod sentiment;
pub mod suggest;

pub use config::MoodConfig;
pub use error::{MoodError, Result};
pub use manager::{MoodManager, MoodUpdateOutcome};
pub use mood::MoodLabel;
