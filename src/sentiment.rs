//! Sentiment intensity scoring.
//!
//! The classifier only needs a polarity summary of a text; producing it is
//! delegated to the VADER analyzer via the [`SentimentScorer`] trait so
//! tests can substitute a deterministic stub.

use crate::error::{MoodError, Result};

/// Polarity summary of one text, produced fresh per classification call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentScore {
    /// Overall polarity in `[-1, 1]`.
    pub compound: f64,
    /// Positive component in `[0, 1]`.
    pub positive: f64,
    /// Negative component in `[0, 1]`.
    pub negative: f64,
    /// Neutral component in `[0, 1]`.
    pub neutral: f64,
}

impl SentimentScore {
    /// The all-neutral score used when no signal is available.
    pub const NEUTRAL: SentimentScore = SentimentScore {
        compound: 0.0,
        positive: 0.0,
        negative: 0.0,
        neutral: 1.0,
    };
}

/// Black-box sentiment scorer: pure function of the input text.
pub trait SentimentScorer: Send + Sync {
    /// Score the text. Errors are recovered by the caller, never fatal.
    fn score(&self, text: &str) -> Result<SentimentScore>;
}

/// Default scorer backed by the `vader_sentiment` analyzer.
pub struct VaderScorer {
    analyzer: vader_sentiment::SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            analyzer: vader_sentiment::SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer for VaderScorer {
    fn score(&self, text: &str) -> Result<SentimentScore> {
        let scores = self.analyzer.polarity_scores(text);
        let get = |key: &str| -> Result<f64> {
            scores
                .get(key)
                .copied()
                .ok_or_else(|| MoodError::Sentiment(format!("analyzer output missing `{key}`")))
        };
        Ok(SentimentScore {
            compound: get("compound")?,
            positive: get("pos")?,
            negative: get("neg")?,
            neutral: get("neu")?,
        })
    }
}
