//! The mood pipeline: classify, gate, apply, record.
//!
//! [`MoodManager`] owns the end-to-end flow for one message or command:
//! infer a mood (or take an explicit one), skip when nothing would change,
//! reserve a rate-gate slot, run the external profile action with a
//! timeout and a single re-auth retry, then commit the slot and record the
//! event. History records only committed updates, so the audit trail never
//! claims a change the outside world didn't see.

use crate::classifier::{MoodClassifier, MoodReading};
use crate::gate::{ActorStateView, Clock, GateDecision, RejectReason, SystemClock, UpdateGate};
use crate::history::{MoodEvent, MoodHistoryStore, MoodStatsSnapshot};
use crate::mood::MoodLabel;
use crate::profile::{ProfileError, ProfileUpdater};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// What happened to one update attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum MoodUpdateOutcome {
    /// The profile changed and the event was recorded.
    Updated { mood: MoodLabel, updates_left: u32 },
    /// The actor is already in this mood; nothing was done and no gate
    /// slot was consumed.
    SameMood { mood: MoodLabel },
    /// The gate rejected the attempt. `wait_minutes` is rounded up.
    RateLimited {
        mood: MoodLabel,
        reason: RejectReason,
        wait_minutes: i64,
    },
    /// The external action failed; the gate slot was released unconsumed
    /// and nothing was recorded.
    UpdateFailed { mood: MoodLabel, message: String },
}

/// Orchestrates mood inference and profile updates.
pub struct MoodManager {
    classifier: MoodClassifier,
    gate: Arc<UpdateGate>,
    updater: Arc<dyn ProfileUpdater>,
    history: Mutex<MoodHistoryStore>,
    clock: Arc<dyn Clock>,
    action_timeout: Duration,
}

impl MoodManager {
    #[must_use]
    pub fn new(
        classifier: MoodClassifier,
        gate: Arc<UpdateGate>,
        updater: Arc<dyn ProfileUpdater>,
        history: MoodHistoryStore,
        action_timeout: Duration,
    ) -> Self {
        Self::with_clock(
            classifier,
            gate,
            updater,
            history,
            action_timeout,
            Arc::new(SystemClock),
        )
    }

    /// Constructor with an explicit clock (test seam).
    #[must_use]
    pub fn with_clock(
        classifier: MoodClassifier,
        gate: Arc<UpdateGate>,
        updater: Arc<dyn ProfileUpdater>,
        history: MoodHistoryStore,
        action_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            classifier,
            gate,
            updater,
            history: Mutex::new(history),
            clock,
            action_timeout,
        }
    }

    /// Infer a mood from free text and run the update pipeline.
    pub async fn process_text(&self, actor: &str, text: &str) -> (MoodReading, MoodUpdateOutcome) {
        let reading = self.classifier.classify(text);
        tracing::debug!(
            actor,
            mood = %reading.mood,
            confidence = reading.confidence,
            "classified message"
        );
        let outcome = self.set_mood(actor, reading.mood).await;
        (reading, outcome)
    }

    /// Run the update pipeline for an explicitly chosen mood.
    pub async fn set_mood(&self, actor: &str, mood: MoodLabel) -> MoodUpdateOutcome {
        if self.last_mood_of(actor) == Some(mood) {
            tracing::debug!(actor, mood = %mood, "mood unchanged, skipping");
            return MoodUpdateOutcome::SameMood { mood };
        }

        let reservation = match self.gate.check_and_reserve(actor).await {
            GateDecision::Allowed(reservation) => reservation,
            GateDecision::Rejected {
                reason,
                wait_minutes,
                ..
            } => {
                tracing::info!(actor, mood = %mood, %reason, wait_minutes, "update rate limited");
                return MoodUpdateOutcome::RateLimited {
                    mood,
                    reason,
                    wait_minutes,
                };
            }
        };

        if let Err(message) = self.apply_with_reauth(mood).await {
            tracing::warn!(actor, mood = %mood, "profile update failed: {message}");
            drop(reservation);
            return MoodUpdateOutcome::UpdateFailed { mood, message };
        }

        let view = self.gate.commit(reservation).await;
        self.history()
            .record(mood, actor, self.clock.now());
        tracing::info!(
            actor,
            mood = %mood,
            updates_left = view.updates_left,
            "mood updated"
        );
        MoodUpdateOutcome::Updated {
            mood,
            updates_left: view.updates_left,
        }
    }

    /// External action with one transparent re-auth retry.
    ///
    /// The gate reservation stays held across the retry, so the pair still
    /// counts as a single update attempt.
    async fn apply_with_reauth(&self, mood: MoodLabel) -> Result<(), String> {
        match self.apply_once(mood).await {
            Ok(()) => Ok(()),
            Err(ProfileError::NeedsReauth) => {
                tracing::info!("profile session expired, re-authenticating");
                self.updater.reauth().await.map_err(|e| e.to_string())?;
                self.apply_once(mood).await.map_err(|e| e.to_string())
            }
            Err(err) => Err(err.to_string()),
        }
    }

    async fn apply_once(&self, mood: MoodLabel) -> Result<(), ProfileError> {
        match tokio::time::timeout(self.action_timeout, self.updater.apply(mood)).await {
            Ok(result) => result,
            Err(_) => Err(ProfileError::Other(format!(
                "profile update timed out after {}s",
                self.action_timeout.as_secs()
            ))),
        }
    }

    fn history(&self) -> MutexGuard<'_, MoodHistoryStore> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Statistics over everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> MoodStatsSnapshot {
        self.history().snapshot()
    }

    /// Recent recorded events, most recent first.
    #[must_use]
    pub fn recent(&self, actor_id: Option<&str>, limit: usize) -> Vec<MoodEvent> {
        self.history().recent(actor_id, limit)
    }

    /// All recorded events in record order.
    #[must_use]
    pub fn events(&self) -> Vec<MoodEvent> {
        self.history().events().to_vec()
    }

    /// Last committed mood for an actor.
    #[must_use]
    pub fn last_mood_of(&self, actor_id: &str) -> Option<MoodLabel> {
        self.history().last_mood_of(actor_id)
    }

    /// Gate state for an actor, day rollover applied.
    pub async fn gate_status(&self, actor: &str) -> ActorStateView {
        self.gate.status(actor).await
    }
}
