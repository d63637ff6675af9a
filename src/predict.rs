//! Tomorrow's mood forecast from recorded patterns.
//!
//! Three signals are folded over the history: what the actor tends to feel
//! at each time of day, what they tend to feel on weekdays versus
//! weekends, and which mood typically follows the current one. Candidate
//! moods come from fixed per-period tables; history only re-ranks them.

use crate::history::MoodEvent;
use crate::mood::MoodLabel;
use crate::suggest::TimeOfDay;
use chrono::{Datelike, NaiveDate, Timelike, Weekday};
use std::collections::HashMap;

/// Weekday or weekend routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => Self::Weekend,
            _ => Self::Weekday,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Weekday => "weekday",
            Self::Weekend => "weekend",
        }
    }
}

const PERIODS: [TimeOfDay; 4] = [
    TimeOfDay::Morning,
    TimeOfDay::Afternoon,
    TimeOfDay::Evening,
    TimeOfDay::Night,
];

/// Candidate moods per period for a weekday routine.
fn weekday_candidates(period: TimeOfDay) -> &'static [MoodLabel] {
    match period {
        TimeOfDay::Morning => &[MoodLabel::Working, MoodLabel::Normal, MoodLabel::Tired],
        TimeOfDay::Afternoon => &[MoodLabel::Working, MoodLabel::Eating, MoodLabel::Normal],
        TimeOfDay::Evening => &[MoodLabel::Tired, MoodLabel::Eating, MoodLabel::Companion],
        TimeOfDay::Night => &[MoodLabel::Sleeping, MoodLabel::Tired, MoodLabel::Normal],
    }
}

/// Candidate moods per period for a weekend routine.
fn weekend_candidates(period: TimeOfDay) -> &'static [MoodLabel] {
    match period {
        TimeOfDay::Morning => &[MoodLabel::Sleeping, MoodLabel::Normal, MoodLabel::Happy],
        TimeOfDay::Afternoon => &[
            MoodLabel::Eating,
            MoodLabel::Celebration,
            MoodLabel::Companion,
        ],
        TimeOfDay::Evening => &[MoodLabel::Celebration, MoodLabel::Eating, MoodLabel::Happy],
        TimeOfDay::Night => &[MoodLabel::Tired, MoodLabel::Sleeping, MoodLabel::Normal],
    }
}

/// Per-period forecast for one day.
#[derive(Debug, Clone, PartialEq)]
pub struct MoodForecast {
    /// The forecast day.
    pub date: NaiveDate,
    /// Routine the tables were drawn from.
    pub day_type: DayType,
    /// Top predictions per period, most likely first.
    pub periods: Vec<(TimeOfDay, Vec<MoodLabel>)>,
}

/// Counted patterns extracted from the event log.
#[derive(Default)]
struct MoodPatterns {
    by_period: HashMap<(TimeOfDay, MoodLabel), u64>,
    by_day_type: HashMap<(DayType, MoodLabel), u64>,
    /// How often `next` followed `prev` in record order.
    sequential: HashMap<(MoodLabel, MoodLabel), u64>,
}

impl MoodPatterns {
    fn from_events(events: &[MoodEvent]) -> Self {
        let mut patterns = Self::default();
        for (index, event) in events.iter().enumerate() {
            let local = event.timestamp.naive_utc();
            let period = TimeOfDay::from_hour(local.hour());
            let day_type = DayType::of(local.date());

            *patterns.by_period.entry((period, event.mood)).or_insert(0) += 1;
            *patterns
                .by_day_type
                .entry((day_type, event.mood))
                .or_insert(0) += 1;

            if index > 0 {
                let prev = events[index - 1].mood;
                *patterns.sequential.entry((prev, event.mood)).or_insert(0) += 1;
            }
        }
        patterns
    }
}

/// Forecast the given day from the event log.
///
/// `last_mood` feeds the sequential signal (what tends to follow it).
#[must_use]
pub fn forecast(
    events: &[MoodEvent],
    last_mood: Option<MoodLabel>,
    date: NaiveDate,
) -> MoodForecast {
    let day_type = DayType::of(date);
    let patterns = MoodPatterns::from_events(events);

    let periods = PERIODS
        .iter()
        .map(|&period| {
            let candidates = match day_type {
                DayType::Weekday => weekday_candidates(period),
                DayType::Weekend => weekend_candidates(period),
            };

            let mut weighted: Vec<(MoodLabel, f64)> = candidates
                .iter()
                .map(|&mood| {
                    let mut weight = 1.0;
                    if let Some(&count) = patterns.by_period.get(&(period, mood)) {
                        weight += count as f64 * 2.0;
                    }
                    if let Some(&count) = patterns.by_day_type.get(&(day_type, mood)) {
                        weight += count as f64;
                    }
                    if let Some(last) = last_mood
                        && let Some(&count) = patterns.sequential.get(&(last, mood))
                    {
                        weight += count as f64 * 1.5;
                    }
                    (mood, weight)
                })
                .collect();

            // Stable sort keeps candidate-table order on ties.
            weighted
                .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            let top: Vec<MoodLabel> = weighted
                .into_iter()
                .take(2)
                .map(|(mood, _)| mood)
                .collect();
            (period, top)
        })
        .collect();

    MoodForecast {
        date,
        day_type,
        periods,
    }
}
