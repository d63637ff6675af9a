//! Mood history: append-only event log plus derived statistics.
//!
//! Events are never mutated or deleted once recorded. Aggregates are
//! maintained incrementally and mirrored to a JSON file whose shape matches
//! the stats file of the bot this replaces, so existing data files load
//! unchanged. Persistence is best-effort: a failed read or write is logged
//! and never blocks in-memory operation.

use crate::mood::MoodLabel;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// One recorded mood change. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodEvent {
    /// The committed mood.
    pub mood: MoodLabel,
    /// Who triggered the change.
    pub actor_id: String,
    /// When the change was committed.
    pub timestamp: DateTime<Utc>,
}

/// Per-day aggregate bucket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DailyStats {
    mood_counts: HashMap<MoodLabel, u64>,
    total_changes: u64,
}

/// Persisted aggregate state (camelCase keys for data-file compatibility).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MoodAggregates {
    total_mood_changes: u64,
    mood_counts: HashMap<MoodLabel, u64>,
    daily_stats: BTreeMap<NaiveDate, DailyStats>,
    last_mood: Option<MoodLabel>,
    last_mood_time: Option<DateTime<Utc>>,
}

/// Derived statistics, recomputed on demand and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct MoodStatsSnapshot {
    /// Total recorded mood changes.
    pub total: u64,
    /// Mood changes recorded today.
    pub today_count: u64,
    /// Share of each recorded mood, percent rounded to one decimal.
    pub percentages: HashMap<MoodLabel, f64>,
    /// The most recorded mood; ties go to the earlier label in
    /// [`MoodLabel::ALL`] order.
    pub most_common: Option<MoodLabel>,
    /// Last recorded mood across all actors.
    pub last_mood: Option<MoodLabel>,
    /// When the last mood was recorded.
    pub last_mood_time: Option<DateTime<Utc>>,
}

/// Append-only mood history store.
pub struct MoodHistoryStore {
    events: Vec<MoodEvent>,
    aggregates: MoodAggregates,
    path: Option<PathBuf>,
}

impl MoodHistoryStore {
    /// Store with no persistence.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            events: Vec::new(),
            aggregates: MoodAggregates::default(),
            path: None,
        }
    }

    /// Store mirrored to a JSON file.
    ///
    /// Loads existing aggregates when the file parses; a missing or
    /// corrupt file starts fresh with a warning.
    #[must_use]
    pub fn with_persistence(path: PathBuf) -> Self {
        let aggregates = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(aggregates) => aggregates,
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        "stats file unreadable, starting fresh: {err}"
                    );
                    MoodAggregates::default()
                }
            },
            Err(_) => MoodAggregates::default(),
        };
        Self {
            events: Vec::new(),
            aggregates,
            path: Some(path),
        }
    }

    /// Append one mood event and fold it into the aggregates.
    pub fn record(&mut self, mood: MoodLabel, actor_id: &str, timestamp: DateTime<Utc>) {
        self.events.push(MoodEvent {
            mood,
            actor_id: actor_id.to_owned(),
            timestamp,
        });

        let aggregates = &mut self.aggregates;
        aggregates.total_mood_changes += 1;
        *aggregates.mood_counts.entry(mood).or_insert(0) += 1;

        let day = aggregates.daily_stats.entry(timestamp.date_naive()).or_default();
        *day.mood_counts.entry(mood).or_insert(0) += 1;
        day.total_changes += 1;

        aggregates.last_mood = Some(mood);
        aggregates.last_mood_time = Some(timestamp);

        self.save();
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(&self.aggregates)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            std::fs::write(path, content)
        })();
        if let Err(err) = result {
            tracing::warn!(path = %path.display(), "failed to persist mood stats: {err}");
        }
    }

    /// Statistics as of now.
    #[must_use]
    pub fn snapshot(&self) -> MoodStatsSnapshot {
        self.snapshot_at(Utc::now().date_naive())
    }

    /// Statistics with an explicit "today" (deterministic for tests).
    #[must_use]
    pub fn snapshot_at(&self, today: NaiveDate) -> MoodStatsSnapshot {
        let aggregates = &self.aggregates;
        let total = aggregates.total_mood_changes;

        let mut percentages = HashMap::new();
        if total > 0 {
            for (&mood, &count) in &aggregates.mood_counts {
                let share = count as f64 / total as f64 * 100.0;
                percentages.insert(mood, (share * 10.0).round() / 10.0);
            }
        }

        // Scan in canonical label order so ties resolve deterministically.
        let mut most_common: Option<(MoodLabel, u64)> = None;
        for &mood in MoodLabel::ALL {
            let count = aggregates.mood_counts.get(&mood).copied().unwrap_or(0);
            if count > 0 && most_common.is_none_or(|(_, best)| count > best) {
                most_common = Some((mood, count));
            }
        }

        MoodStatsSnapshot {
            total,
            today_count: aggregates
                .daily_stats
                .get(&today)
                .map_or(0, |day| day.total_changes),
            percentages,
            most_common: most_common.map(|(mood, _)| mood),
            last_mood: aggregates.last_mood,
            last_mood_time: aggregates.last_mood_time,
        }
    }

    /// Recorded events, most recent first, optionally filtered by actor.
    #[must_use]
    pub fn recent(&self, actor_id: Option<&str>, limit: usize) -> Vec<MoodEvent> {
        self.events
            .iter()
            .rev()
            .filter(|event| actor_id.is_none_or(|actor| event.actor_id == actor))
            .take(limit)
            .cloned()
            .collect()
    }

    /// All events in record order (oldest first), for pattern analysis.
    #[must_use]
    pub fn events(&self) -> &[MoodEvent] {
        &self.events
    }

    /// Last recorded mood for one actor in this process's lifetime.
    #[must_use]
    pub fn last_mood_of(&self, actor_id: &str) -> Option<MoodLabel> {
        self.events
            .iter()
            .rev()
            .find(|event| event.actor_id == actor_id)
            .map(|event| event.mood)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn record_grows_total_by_exactly_n() {
        let mut store = MoodHistoryStore::in_memory();
        let before = store.snapshot_at(at(30, 12).date_naive());

        for hour in 0..5 {
            store.record(MoodLabel::Happy, "mira", at(30, hour));
        }

        let after = store.snapshot_at(at(30, 12).date_naive());
        assert_eq!(after.total, before.total + 5);
        assert_eq!(after.today_count, 5);
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let mut store = MoodHistoryStore::in_memory();
        store.record(MoodLabel::Happy, "mira", at(30, 1));
        store.record(MoodLabel::Happy, "mira", at(30, 2));
        store.record(MoodLabel::Tired, "rowan", at(30, 3));

        let snapshot = store.snapshot_at(at(30, 12).date_naive());
        let sum: f64 = snapshot.percentages.values().sum();
        assert!((sum - 100.0).abs() < 0.2, "sum = {sum}");
        assert_eq!(snapshot.percentages[&MoodLabel::Happy], 66.7);
        assert_eq!(snapshot.percentages[&MoodLabel::Tired], 33.3);
    }

    #[test]
    fn empty_store_snapshot_is_empty() {
        let store = MoodHistoryStore::in_memory();
        let snapshot = store.snapshot_at(at(30, 12).date_naive());
        assert_eq!(snapshot.total, 0);
        assert!(snapshot.percentages.is_empty());
        assert!(snapshot.most_common.is_none());
        assert!(snapshot.last_mood.is_none());
    }

    #[test]
    fn most_common_ties_resolve_by_label_order() {
        let mut store = MoodHistoryStore::in_memory();
        // Sleeping recorded first, but Happy precedes it in MoodLabel::ALL.
        store.record(MoodLabel::Sleeping, "mira", at(30, 1));
        store.record(MoodLabel::Happy, "mira", at(30, 2));

        let snapshot = store.snapshot_at(at(30, 12).date_naive());
        assert_eq!(snapshot.most_common, Some(MoodLabel::Happy));
    }

    #[test]
    fn today_count_excludes_other_days() {
        let mut store = MoodHistoryStore::in_memory();
        store.record(MoodLabel::Working, "mira", at(29, 10));
        store.record(MoodLabel::Eating, "mira", at(30, 12));

        let snapshot = store.snapshot_at(at(30, 13).date_naive());
        assert_eq!(snapshot.total, 2);
        assert_eq!(snapshot.today_count, 1);
    }

    #[test]
    fn recent_is_most_recent_first_and_filtered() {
        let mut store = MoodHistoryStore::in_memory();
        store.record(MoodLabel::Happy, "mira", at(30, 1));
        store.record(MoodLabel::Working, "rowan", at(30, 2));
        store.record(MoodLabel::Tired, "mira", at(30, 3));

        let all = store.recent(None, 10);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].mood, MoodLabel::Tired);
        assert_eq!(all[2].mood, MoodLabel::Happy);

        let mira = store.recent(Some("mira"), 10);
        assert_eq!(mira.len(), 2);
        assert_eq!(mira[0].mood, MoodLabel::Tired);

        let limited = store.recent(None, 1);
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn last_mood_of_tracks_per_actor() {
        let mut store = MoodHistoryStore::in_memory();
        store.record(MoodLabel::Happy, "mira", at(30, 1));
        store.record(MoodLabel::Working, "rowan", at(30, 2));

        assert_eq!(store.last_mood_of("mira"), Some(MoodLabel::Happy));
        assert_eq!(store.last_mood_of("rowan"), Some(MoodLabel::Working));
        assert_eq!(store.last_mood_of("nobody"), None);
    }

    #[test]
    fn earlier_events_are_never_rewritten() {
        let mut store = MoodHistoryStore::in_memory();
        store.record(MoodLabel::Happy, "mira", at(30, 1));
        let first = store.events()[0].clone();

        store.record(MoodLabel::Tired, "mira", at(30, 2));
        store.record(MoodLabel::Eating, "rowan", at(30, 3));

        assert_eq!(store.events()[0], first);
        assert_eq!(store.events().len(), 3);
    }

    #[test]
    fn aggregates_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mood_stats.json");

        {
            let mut store = MoodHistoryStore::with_persistence(path.clone());
            store.record(MoodLabel::Happy, "mira", at(30, 1));
            store.record(MoodLabel::Happy, "mira", at(30, 2));
            store.record(MoodLabel::Tired, "rowan", at(30, 3));
        }

        let reloaded = MoodHistoryStore::with_persistence(path);
        let snapshot = reloaded.snapshot_at(at(30, 12).date_naive());
        assert_eq!(snapshot.total, 3);
        assert_eq!(snapshot.most_common, Some(MoodLabel::Happy));
        assert_eq!(snapshot.last_mood, Some(MoodLabel::Tired));
        assert_eq!(snapshot.today_count, 3);
    }

    #[test]
    fn persisted_file_uses_the_legacy_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mood_stats.json");

        let mut store = MoodHistoryStore::with_persistence(path.clone());
        store.record(MoodLabel::Celebration, "mira", at(30, 1));

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["totalMoodChanges"], 1);
        assert_eq!(raw["moodCounts"]["celebration"], 1);
        assert_eq!(raw["lastMood"], "celebration");
        assert!(raw["dailyStats"]["2026-08-30"]["totalChanges"].is_number());
    }

    #[test]
    fn corrupt_stats_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mood_stats.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = MoodHistoryStore::with_persistence(path);
        assert_eq!(store.snapshot_at(at(30, 12).date_naive()).total, 0);
    }
}
