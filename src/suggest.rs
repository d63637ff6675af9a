//! Mood suggestions: a light weighting over time of day and history.
//!
//! Not a predictor of truth, just a ranked shortlist for the suggestion
//! buttons. Always returns exactly three distinct labels and never fails.

use crate::history::MoodStatsSnapshot;
use crate::mood::MoodLabel;

/// Coarse period of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Bucket an hour (0-23) into a period.
    #[must_use]
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

/// Plausible moods per period, in precedence order.
const TIME_PATTERNS: &[(TimeOfDay, &[MoodLabel])] = &[
    (
        TimeOfDay::Morning,
        &[MoodLabel::Normal, MoodLabel::Working, MoodLabel::Happy],
    ),
    (
        TimeOfDay::Afternoon,
        &[MoodLabel::Working, MoodLabel::Eating, MoodLabel::Normal],
    ),
    (
        TimeOfDay::Evening,
        &[MoodLabel::Normal, MoodLabel::Eating, MoodLabel::Happy],
    ),
    (
        TimeOfDay::Night,
        &[MoodLabel::Normal, MoodLabel::Sleeping, MoodLabel::Tired],
    ),
];

/// Padding used when fewer than three labels accumulate weight.
const DEFAULT_FILL: [MoodLabel; 3] = [MoodLabel::Normal, MoodLabel::Happy, MoodLabel::Working];

/// Fixed fallback if suggestion assembly ever comes up short.
const FALLBACK: [MoodLabel; 3] = [MoodLabel::Normal, MoodLabel::Happy, MoodLabel::Tired];

/// Ranked mood suggestions.
pub struct MoodSuggester {
    /// Bonus weight for the actor's last recorded mood.
    last_mood_bonus: f64,
}

impl Default for MoodSuggester {
    fn default() -> Self {
        Self {
            last_mood_bonus: 2.0,
        }
    }
}

impl MoodSuggester {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_last_mood_bonus(bonus: f64) -> Self {
        Self {
            last_mood_bonus: bonus,
        }
    }

    /// Top-3 distinct suggestions for the given hour and history snapshot.
    ///
    /// Weights: 1 per time-pattern hit, `last_mood_bonus` for the last
    /// recorded mood, plus `percentage / 20` from history. Sorted
    /// descending with ties broken by pattern-table order.
    #[must_use]
    pub fn suggest(&self, snapshot: &MoodStatsSnapshot, hour: u32) -> [MoodLabel; 3] {
        let ranked = self.rank(snapshot, hour);
        match <[MoodLabel; 3]>::try_from(ranked) {
            Ok(suggestions) => suggestions,
            Err(_) => FALLBACK,
        }
    }

    fn rank(&self, snapshot: &MoodStatsSnapshot, hour: u32) -> Vec<MoodLabel> {
        let period = TimeOfDay::from_hour(hour);
        let pattern = TIME_PATTERNS
            .iter()
            .find(|(p, _)| *p == period)
            .map_or(&[][..], |(_, moods)| *moods);

        // Candidates in tie-break order: pattern labels first, then the
        // remaining labels in canonical order.
        let mut candidates: Vec<MoodLabel> = pattern.to_vec();
        for &mood in MoodLabel::ALL {
            if !candidates.contains(&mood) {
                candidates.push(mood);
            }
        }

        let mut weighted: Vec<(MoodLabel, f64)> = candidates
            .into_iter()
            .map(|mood| {
                let mut weight = 0.0;
                if pattern.contains(&mood) {
                    weight += 1.0;
                }
                if snapshot.last_mood == Some(mood) {
                    weight += self.last_mood_bonus;
                }
                if let Some(pct) = snapshot.percentages.get(&mood) {
                    weight += pct / 20.0;
                }
                (mood, weight)
            })
            .collect();

        weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut suggestions: Vec<MoodLabel> = weighted
            .into_iter()
            .filter(|(_, weight)| *weight > 0.0)
            .take(3)
            .map(|(mood, _)| mood)
            .collect();

        for mood in DEFAULT_FILL {
            if suggestions.len() >= 3 {
                break;
            }
            if !suggestions.contains(&mood) {
                suggestions.push(mood);
            }
        }
        suggestions.truncate(3);
        suggestions
    }
}
