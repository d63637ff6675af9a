//! Scheduled mood transitions.
//!
//! A small daily schedule drives routine moods without anyone typing a
//! message: the sleep window start flips to `sleeping`, its end back to
//! `normal`, and each meal time to `eating`. Transitions go through the
//! same pipeline as chat-triggered updates under the reserved actor id
//! [`SCHEDULE_ACTOR`], so the rate gate and history treat them like any
//! other actor.

use crate::config::{ClockTime, ScheduleConfig};
use crate::gate::{Clock, SystemClock};
use crate::manager::{MoodManager, MoodUpdateOutcome};
use crate::mood::MoodLabel;
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Actor id used for schedule-driven updates.
pub const SCHEDULE_ACTOR: &str = "schedule";

/// Seconds between scheduler ticks.
const TICK_INTERVAL_SECS: u64 = 60;

/// One daily mood transition.
#[derive(Debug, Clone)]
pub struct ScheduledTransition {
    /// Identifier for logs (e.g. `"sleep_start"`).
    pub id: String,
    /// Mood to switch to.
    pub mood: MoodLabel,
    /// Time of day (UTC) the transition fires.
    pub at: ClockTime,
    /// When this transition last fired, if ever.
    last_run: Option<DateTime<Utc>>,
}

impl ScheduledTransition {
    #[must_use]
    pub fn new(id: impl Into<String>, mood: MoodLabel, at: ClockTime) -> Self {
        Self {
            id: id.into(),
            mood,
            at,
            last_run: None,
        }
    }

    fn scheduled_for(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(u32::from(self.at.hour), u32::from(self.at.min), 0)
            .unwrap_or(NaiveTime::MIN);
        now.date_naive().and_time(time).and_utc()
    }

    /// Due when today's scheduled time has passed and the transition has
    /// not fired since.
    fn is_due(&self, now: DateTime<Utc>) -> bool {
        let scheduled = self.scheduled_for(now);
        match self.last_run {
            None => now >= scheduled,
            Some(last) => last < scheduled && now >= scheduled,
        }
    }

    fn mark_run(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
    }
}

/// Background driver for the daily transitions.
pub struct MoodScheduler {
    transitions: Vec<ScheduledTransition>,
    manager: Arc<MoodManager>,
    clock: Arc<dyn Clock>,
}

impl MoodScheduler {
    #[must_use]
    pub fn new(config: &ScheduleConfig, manager: Arc<MoodManager>) -> Self {
        Self::with_clock(config, manager, Arc::new(SystemClock))
    }

    /// Constructor with an explicit clock (test seam).
    #[must_use]
    pub fn with_clock(
        config: &ScheduleConfig,
        manager: Arc<MoodManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transitions: Self::transitions_from(config),
            manager,
            clock,
        }
    }

    fn transitions_from(config: &ScheduleConfig) -> Vec<ScheduledTransition> {
        if !config.enabled {
            return Vec::new();
        }
        let mut transitions = vec![
            ScheduledTransition::new("sleep_start", MoodLabel::Sleeping, config.sleep_start),
            ScheduledTransition::new("wake", MoodLabel::Normal, config.sleep_end),
        ];
        for meal in &config.meal_times {
            transitions.push(ScheduledTransition::new(
                format!("meal_{:02}_{:02}", meal.hour, meal.min),
                MoodLabel::Eating,
                *meal,
            ));
        }
        transitions
    }

    /// Registered transitions.
    #[must_use]
    pub fn transitions(&self) -> &[ScheduledTransition] {
        &self.transitions
    }

    /// Run one tick: fire every due transition through the pipeline.
    pub async fn tick(&mut self) {
        let now = self.clock.now();
        for transition in &mut self.transitions {
            if !transition.is_due(now) {
                continue;
            }
            transition.mark_run(now);
            let outcome = self.manager.set_mood(SCHEDULE_ACTOR, transition.mood).await;
            match outcome {
                MoodUpdateOutcome::Updated { mood, updates_left } => {
                    info!(
                        transition = transition.id.as_str(),
                        mood = %mood,
                        updates_left,
                        "scheduled transition applied"
                    );
                }
                MoodUpdateOutcome::SameMood { mood } => {
                    debug!(
                        transition = transition.id.as_str(),
                        mood = %mood,
                        "scheduled transition skipped, mood unchanged"
                    );
                }
                MoodUpdateOutcome::RateLimited {
                    reason,
                    wait_minutes,
                    ..
                } => {
                    info!(
                        transition = transition.id.as_str(),
                        %reason,
                        wait_minutes,
                        "scheduled transition rate limited"
                    );
                }
                MoodUpdateOutcome::UpdateFailed { message, .. } => {
                    warn!(
                        transition = transition.id.as_str(),
                        "scheduled transition failed: {message}"
                    );
                }
            }
        }
    }

    /// Start the background loop.
    pub fn run(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                transitions = self.transitions.len(),
                "mood scheduler started"
            );
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(TICK_INTERVAL_SECS));
            loop {
                interval.tick().await;
                self.tick().await;
            }
        })
    }
}
