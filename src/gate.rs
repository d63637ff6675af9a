//! Rate gate for external profile updates.
//!
//! Every side-effecting profile change passes through [`UpdateGate`], which
//! layers three policies per actor:
//!
//! - a daily quota (calendar-day scoped, reset at midnight),
//! - a minimum cooldown between permitted updates,
//! - a randomized delay before an update is finalized, so the image host
//!   never observes machine-regular pacing.
//!
//! [`UpdateGate::check_and_reserve`] hands out a [`Reservation`] that holds
//! the actor's state lock until [`UpdateGate::commit`] finishes (or the
//! reservation is dropped). Interleaved handlers for the same actor
//! therefore serialize on the check+commit pair: a second caller cannot
//! observe `allowed` for the same slot, it waits and then sees the
//! committed state. Dropping a reservation without committing releases the
//! slot unconsumed.
//!
//! Gate state is in-memory only; a restart forgets the day's counters.

use crate::config::GateConfig;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

/// Time source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Pre-commit delay, injectable so tests don't wait in real time.
#[async_trait]
pub trait DelayProvider: Send + Sync {
    /// Suspend the calling flow for one delay period.
    async fn pause(&self);
}

/// Uniform random delay within a configured window.
pub struct JitterDelay {
    min: Duration,
    max: Duration,
}

impl JitterDelay {
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self { min, max }
    }
}

#[async_trait]
impl DelayProvider for JitterDelay {
    async fn pause(&self) {
        let span_ms = self.max.saturating_sub(self.min).as_millis() as u64;
        let extra_ms = if span_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=span_ms)
        };
        tokio::time::sleep(self.min + Duration::from_millis(extra_ms)).await;
    }
}

/// Zero delay, for tests and dry runs.
pub struct NoDelay;

#[async_trait]
impl DelayProvider for NoDelay {
    async fn pause(&self) {}
}

/// Per-actor gate state. Mutated only by the gate itself.
#[derive(Debug, Clone, Copy)]
struct ActorUpdateState {
    last_update_at: Option<DateTime<Utc>>,
    updates_today: u32,
    day_boundary: NaiveDate,
}

/// Read-only snapshot of one actor's gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorStateView {
    /// Timestamp of the last committed update, if any.
    pub last_update_at: Option<DateTime<Utc>>,
    /// Committed updates so far in the current day.
    pub updates_today: u32,
    /// Updates remaining under the daily cap.
    pub updates_left: u32,
    /// The calendar day the counter belongs to.
    pub day_boundary: NaiveDate,
}

/// Why a check was rejected. Not an error: a normal negative result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Daily quota exhausted.
    DailyLimit,
    /// Minimum inter-update cooldown still running.
    Cooldown,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DailyLimit => f.write_str("daily limit reached"),
            Self::Cooldown => f.write_str("cooldown active"),
        }
    }
}

/// Outcome of [`UpdateGate::check_and_reserve`].
pub enum GateDecision {
    /// Update permitted. Perform the external action, then commit.
    Allowed(Reservation),
    /// Update rejected with a machine-readable reason and wait estimate.
    Rejected {
        reason: RejectReason,
        /// Minutes until the guard would clear, rounded up.
        wait_minutes: i64,
        state: ActorStateView,
    },
}

/// A granted update slot.
///
/// Holds the actor's state lock; no other reservation for the same actor
/// can be granted until this one is committed or dropped.
pub struct Reservation {
    actor: String,
    guard: OwnedMutexGuard<ActorUpdateState>,
}

impl Reservation {
    /// The actor this reservation belongs to.
    #[must_use]
    pub fn actor(&self) -> &str {
        &self.actor
    }
}

/// Layered per-actor rate limiter for external updates.
pub struct UpdateGate {
    max_updates_per_day: u32,
    cooldown_secs: i64,
    clock: Arc<dyn Clock>,
    delay: Arc<dyn DelayProvider>,
    actors: Mutex<HashMap<String, Arc<tokio::sync::Mutex<ActorUpdateState>>>>,
}

impl UpdateGate {
    /// Gate with the wall clock and the configured jitter window.
    #[must_use]
    pub fn new(config: &GateConfig) -> Self {
        let jitter = JitterDelay::new(
            Duration::from_secs(config.jitter_min_secs),
            Duration::from_secs(config.jitter_max_secs),
        );
        Self::with_parts(config, Arc::new(SystemClock), Arc::new(jitter))
    }

    /// Gate with explicit clock and delay provider (test seam).
    #[must_use]
    pub fn with_parts(
        config: &GateConfig,
        clock: Arc<dyn Clock>,
        delay: Arc<dyn DelayProvider>,
    ) -> Self {
        Self {
            max_updates_per_day: config.max_updates_per_day,
            cooldown_secs: config.min_cooldown_secs as i64,
            clock,
            delay,
            actors: Mutex::new(HashMap::new()),
        }
    }

    fn actor_cell(&self, actor: &str) -> Arc<tokio::sync::Mutex<ActorUpdateState>> {
        let mut map = self.actors.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(actor.to_owned())
            .or_insert_with(|| {
                Arc::new(tokio::sync::Mutex::new(ActorUpdateState {
                    last_update_at: None,
                    updates_today: 0,
                    day_boundary: self.clock.now().date_naive(),
                }))
            })
            .clone()
    }

    fn view_of(&self, state: &ActorUpdateState) -> ActorStateView {
        ActorStateView {
            last_update_at: state.last_update_at,
            updates_today: state.updates_today,
            updates_left: self.max_updates_per_day.saturating_sub(state.updates_today),
            day_boundary: state.day_boundary,
        }
    }

    /// Roll the day counter forward if the calendar day advanced.
    ///
    /// Runs on every evaluation, including ones that go on to be rejected.
    /// The boundary only moves forward, never back.
    fn roll_day(state: &mut ActorUpdateState, today: NaiveDate) {
        if today > state.day_boundary {
            state.updates_today = 0;
            state.day_boundary = today;
        }
    }

    /// Evaluate the gate for an actor and reserve a slot when permitted.
    ///
    /// Waits for any in-flight reservation for the same actor to resolve
    /// first, then evaluates day rollover, daily cap, and cooldown in that
    /// order.
    pub async fn check_and_reserve(&self, actor: &str) -> GateDecision {
        let cell = self.actor_cell(actor);
        let mut guard = cell.lock_owned().await;
        let now = self.clock.now();
        let today = now.date_naive();
        Self::roll_day(&mut guard, today);

        if guard.updates_today >= self.max_updates_per_day {
            let next_midnight = today
                .succ_opt()
                .unwrap_or(today)
                .and_time(NaiveTime::MIN)
                .and_utc();
            let secs = (next_midnight - now).num_seconds().max(0);
            return GateDecision::Rejected {
                reason: RejectReason::DailyLimit,
                wait_minutes: (secs + 59) / 60,
                state: self.view_of(&guard),
            };
        }

        if let Some(last) = guard.last_update_at {
            let elapsed = (now - last).num_seconds();
            if elapsed < self.cooldown_secs {
                let remaining = self.cooldown_secs - elapsed;
                return GateDecision::Rejected {
                    reason: RejectReason::Cooldown,
                    wait_minutes: (remaining + 59) / 60,
                    state: self.view_of(&guard),
                };
            }
        }

        GateDecision::Allowed(Reservation {
            actor: actor.to_owned(),
            guard,
        })
    }

    /// Finalize a reservation after the external action succeeded.
    ///
    /// Suspends for the jittered delay first; the update is not complete,
    /// and no other reservation for this actor can be granted, until the
    /// delay elapses and the counters are stamped.
    pub async fn commit(&self, mut reservation: Reservation) -> ActorStateView {
        self.delay.pause().await;
        let now = self.clock.now();
        let state = &mut *reservation.guard;

        // last_update_at never decreases, even with a clock stepping back.
        state.last_update_at = Some(match state.last_update_at {
            Some(prev) if prev > now => prev,
            _ => now,
        });
        state.updates_today += 1;
        tracing::debug!(
            actor = reservation.actor.as_str(),
            updates_today = state.updates_today,
            "update committed"
        );
        self.view_of(state)
    }

    /// Current state for an actor, with day rollover applied.
    ///
    /// Waits for any in-flight reservation to resolve, so the view always
    /// reflects committed slots.
    pub async fn status(&self, actor: &str) -> ActorStateView {
        let cell = self.actor_cell(actor);
        let mut guard = cell.lock().await;
        Self::roll_day(&mut guard, self.clock.now().date_naive());
        self.view_of(&guard)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use chrono::TimeZone;

    /// Manually advanced clock.
    struct FakeClock(Mutex<DateTime<Utc>>);

    impl FakeClock {
        fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(now)))
        }

        fn advance_secs(&self, secs: i64) {
            let mut now = self.0.lock().unwrap();
            *now += chrono::Duration::seconds(secs);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap()
    }

    fn gate_with(config: GateConfig, clock: Arc<FakeClock>) -> UpdateGate {
        UpdateGate::with_parts(&config, clock, Arc::new(NoDelay))
    }

    fn default_policy() -> GateConfig {
        GateConfig {
            max_updates_per_day: 8,
            min_cooldown_secs: 3600,
            jitter_min_secs: 0,
            jitter_max_secs: 0,
        }
    }

    #[tokio::test]
    async fn first_check_is_allowed() {
        let gate = gate_with(default_policy(), FakeClock::at(noon()));
        match gate.check_and_reserve("mira").await {
            GateDecision::Allowed(reservation) => assert_eq!(reservation.actor(), "mira"),
            GateDecision::Rejected { .. } => panic!("fresh actor should be allowed"),
        }
    }

    #[tokio::test]
    async fn cooldown_rejects_immediately_after_commit() {
        let clock = FakeClock::at(noon());
        let gate = gate_with(default_policy(), clock);

        let GateDecision::Allowed(reservation) = gate.check_and_reserve("mira").await else {
            panic!("expected allowed");
        };
        gate.commit(reservation).await;

        match gate.check_and_reserve("mira").await {
            GateDecision::Rejected {
                reason,
                wait_minutes,
                state,
            } => {
                assert_eq!(reason, RejectReason::Cooldown);
                assert_eq!(wait_minutes, 60);
                assert_eq!(state.updates_today, 1);
            }
            GateDecision::Allowed(_) => panic!("cooldown should reject"),
        }
    }

    #[tokio::test]
    async fn daily_cap_rejects_ninth_update_despite_elapsed_cooldown() {
        let clock = FakeClock::at(noon());
        let gate = gate_with(default_policy(), Arc::clone(&clock));

        for _ in 0..8 {
            let GateDecision::Allowed(reservation) = gate.check_and_reserve("mira").await else {
                panic!("expected allowed within cap");
            };
            gate.commit(reservation).await;
            // Step past the cooldown but stay inside the same day.
            clock.advance_secs(3601);
        }

        match gate.check_and_reserve("mira").await {
            GateDecision::Rejected { reason, .. } => {
                assert_eq!(reason, RejectReason::DailyLimit);
            }
            GateDecision::Allowed(_) => panic!("ninth update should hit the daily cap"),
        }
    }

    #[tokio::test]
    async fn daily_limit_wait_counts_minutes_to_midnight() {
        let clock = FakeClock::at(Utc.with_ymd_and_hms(2026, 8, 30, 23, 0, 0).unwrap());
        let mut policy = default_policy();
        policy.max_updates_per_day = 1;
        policy.min_cooldown_secs = 0;
        let gate = gate_with(policy, clock);

        let GateDecision::Allowed(reservation) = gate.check_and_reserve("mira").await else {
            panic!("expected allowed");
        };
        gate.commit(reservation).await;

        match gate.check_and_reserve("mira").await {
            GateDecision::Rejected {
                reason,
                wait_minutes,
                ..
            } => {
                assert_eq!(reason, RejectReason::DailyLimit);
                assert_eq!(wait_minutes, 60);
            }
            GateDecision::Allowed(_) => panic!("cap of one should reject"),
        }
    }

    #[tokio::test]
    async fn day_rollover_resets_counter_without_an_update() {
        let clock = FakeClock::at(noon());
        let mut policy = default_policy();
        policy.max_updates_per_day = 1;
        policy.min_cooldown_secs = 0;
        let gate = gate_with(policy, Arc::clone(&clock));

        let GateDecision::Allowed(reservation) = gate.check_and_reserve("mira").await else {
            panic!("expected allowed");
        };
        gate.commit(reservation).await;
        assert_eq!(gate.status("mira").await.updates_today, 1);

        // Next day: status alone observes the reset.
        clock.advance_secs(24 * 3600);
        let view = gate.status("mira").await;
        assert_eq!(view.updates_today, 0);
        assert_eq!(view.updates_left, 1);
    }

    #[tokio::test]
    async fn dropped_reservation_does_not_consume_the_slot() {
        let gate = gate_with(default_policy(), FakeClock::at(noon()));

        {
            let GateDecision::Allowed(reservation) = gate.check_and_reserve("mira").await else {
                panic!("expected allowed");
            };
            drop(reservation); // external action failed; no commit
        }

        match gate.check_and_reserve("mira").await {
            GateDecision::Allowed(_) => {}
            GateDecision::Rejected { .. } => panic!("uncommitted slot must stay free"),
        }
        assert_eq!(gate.status("mira").await.updates_today, 0);
    }

    #[tokio::test]
    async fn concurrent_checks_grant_at_most_one_slot() {
        let clock = FakeClock::at(noon());
        let gate = Arc::new(gate_with(default_policy(), clock));

        let GateDecision::Allowed(reservation) = gate.check_and_reserve("mira").await else {
            panic!("expected allowed");
        };

        // Second handler races in before the first commits; it must block
        // on the reservation and then observe the committed cooldown.
        let contender = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.check_and_reserve("mira").await })
        };
        tokio::task::yield_now().await;

        gate.commit(reservation).await;

        match contender.await.unwrap() {
            GateDecision::Rejected { reason, .. } => {
                assert_eq!(reason, RejectReason::Cooldown);
            }
            GateDecision::Allowed(_) => panic!("second check must not see a free slot"),
        }
    }

    #[tokio::test]
    async fn last_update_at_never_decreases() {
        let clock = FakeClock::at(noon());
        let mut policy = default_policy();
        policy.min_cooldown_secs = 0;
        let gate = gate_with(policy, Arc::clone(&clock));

        let GateDecision::Allowed(reservation) = gate.check_and_reserve("mira").await else {
            panic!("expected allowed");
        };
        let first = gate.commit(reservation).await.last_update_at.unwrap();

        // Clock steps backwards; the stamp must hold.
        clock.advance_secs(-300);
        let GateDecision::Allowed(reservation) = gate.check_and_reserve("mira").await else {
            panic!("expected allowed with zero cooldown");
        };
        let second = gate.commit(reservation).await.last_update_at.unwrap();
        assert!(second >= first);
    }

    #[tokio::test]
    async fn actors_are_isolated() {
        let gate = gate_with(default_policy(), FakeClock::at(noon()));

        let GateDecision::Allowed(reservation) = gate.check_and_reserve("mira").await else {
            panic!("expected allowed");
        };
        gate.commit(reservation).await;

        // A different actor is unaffected by mira's cooldown.
        match gate.check_and_reserve("rowan").await {
            GateDecision::Allowed(_) => {}
            GateDecision::Rejected { .. } => panic!("actors must have independent state"),
        }
    }
}
