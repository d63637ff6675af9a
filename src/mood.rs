//! The closed set of mood labels the bot can express.
//!
//! Every mood has a profile-picture asset configured for it, so the set is
//! fixed at build time. [`MoodLabel::ALL`] is the canonical declaration
//! order used for deterministic tie-breaks in stats and suggestions.

use serde::{Deserialize, Serialize};

/// One inferred emotional/activity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodLabel {
    Happy,
    Normal,
    Tired,
    Confused,
    Awkward,
    Working,
    Celebration,
    Birthday,
    /// Spending time with the companion/partner.
    Companion,
    Eating,
    Sleeping,
}

impl MoodLabel {
    /// All labels in canonical declaration order.
    pub const ALL: &'static [MoodLabel] = &[
        Self::Happy,
        Self::Normal,
        Self::Tired,
        Self::Confused,
        Self::Awkward,
        Self::Working,
        Self::Celebration,
        Self::Birthday,
        Self::Companion,
        Self::Eating,
        Self::Sleeping,
    ];

    /// Stable lowercase name, matching the serde representation and the
    /// keys of the per-mood image table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Normal => "normal",
            Self::Tired => "tired",
            Self::Confused => "confused",
            Self::Awkward => "awkward",
            Self::Working => "working",
            Self::Celebration => "celebration",
            Self::Birthday => "birthday",
            Self::Companion => "companion",
            Self::Eating => "eating",
            Self::Sleeping => "sleeping",
        }
    }
}

impl std::fmt::Display for MoodLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MoodLabel {
    type Err = UnknownMood;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == needle)
            .ok_or_else(|| UnknownMood(needle))
    }
}

/// Parse error for mood names outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mood `{0}`")]
pub struct UnknownMood(pub String);
