//! Mood classification: keyword priority first, sentiment bands second.
//!
//! Two layers:
//!
//! 1. **Keyword table** — an ordered scan of trigger substrings. The first
//!    rule with any hit wins outright at a fixed high confidence; there is
//!    no partial scoring among keyword matches.
//! 2. **Threshold bands** — when no keyword matches, the compound sentiment
//!    score is mapped through ordered bands; confidence is `|compound|`.
//!
//! Classification always produces a mood. Scorer failures degrade to
//! `normal` with zero confidence rather than propagating.

use crate::config::ClassifierConfig;
use crate::mood::MoodLabel;
use crate::sentiment::{SentimentScore, SentimentScorer};
use std::sync::Arc;

/// Confidence reported for an explicit keyword match.
pub const KEYWORD_CONFIDENCE: f64 = 0.9;

/// Result of one classification call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoodReading {
    /// The inferred mood.
    pub mood: MoodLabel,
    /// Classification confidence in `[0, 1]`.
    pub confidence: f64,
    /// The sentiment score consulted (neutral when a keyword decided).
    pub score: SentimentScore,
}

/// Keyword-then-threshold mood classifier.
pub struct MoodClassifier {
    scorer: Arc<dyn SentimentScorer>,
    keywords: Vec<(MoodLabel, Vec<String>)>,
    thresholds: crate::config::ThresholdBands,
}

impl MoodClassifier {
    #[must_use]
    pub fn new(config: &ClassifierConfig, scorer: Arc<dyn SentimentScorer>) -> Self {
        Self {
            scorer,
            keywords: config
                .keywords
                .iter()
                .map(|rule| {
                    (
                        rule.mood,
                        rule.triggers
                            .iter()
                            .map(|t| t.to_lowercase())
                            .collect::<Vec<_>>(),
                    )
                })
                .collect(),
            thresholds: config.thresholds,
        }
    }

    /// Classify free text into a mood.
    ///
    /// Pure over its inputs plus the scorer call; no side effects.
    #[must_use]
    pub fn classify(&self, text: &str) -> MoodReading {
        let lower = text.to_lowercase();

        for (mood, triggers) in &self.keywords {
            if triggers.iter().any(|trigger| lower.contains(trigger)) {
                return MoodReading {
                    mood: *mood,
                    confidence: KEYWORD_CONFIDENCE,
                    score: SentimentScore::NEUTRAL,
                };
            }
        }

        let score = match self.scorer.score(text) {
            Ok(score) => score,
            Err(err) => {
                tracing::warn!("sentiment scorer failed, defaulting to normal: {err}");
                return MoodReading {
                    mood: MoodLabel::Normal,
                    confidence: 0.0,
                    score: SentimentScore::NEUTRAL,
                };
            }
        };

        let bands = &self.thresholds;
        let mood = if score.compound >= bands.high_positive {
            MoodLabel::Happy
        } else if score.compound <= bands.high_negative {
            MoodLabel::Tired
        } else if score.compound > bands.mild_positive {
            MoodLabel::Celebration
        } else if score.compound < bands.mild_negative {
            MoodLabel::Confused
        } else {
            MoodLabel::Normal
        };

        MoodReading {
            mood,
            confidence: score.compound.abs(),
            score,
        }
    }
}
