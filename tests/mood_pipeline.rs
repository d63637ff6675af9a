//! End-to-end pipeline tests: chat text in, gated profile updates and
//! recorded history out. Uses the real VADER scorer and a scripted
//! profile updater.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use moodring::channels::{respond_to, traits::ChannelInboundMessage};
use moodring::classifier::MoodClassifier;
use moodring::commands::CommandRegistry;
use moodring::config::{ClassifierConfig, GateConfig};
use moodring::gate::{Clock, NoDelay, RejectReason, UpdateGate};
use moodring::history::MoodHistoryStore;
use moodring::manager::{MoodManager, MoodUpdateOutcome};
use moodring::mood::MoodLabel;
use moodring::profile::{ProfileError, ProfileUpdater};
use moodring::scheduler::{MoodScheduler, SCHEDULE_ACTOR};
use moodring::sentiment::VaderScorer;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct FakeClock(Mutex<DateTime<Utc>>);

impl FakeClock {
    fn at_noon() -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap(),
        )))
    }

    fn advance_secs(&self, secs: i64) {
        *self.0.lock().unwrap() += chrono::Duration::seconds(secs);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Updater that plays back scripted results (default `Ok`) and counts calls.
struct ScriptedUpdater {
    script: Mutex<VecDeque<Result<(), ProfileError>>>,
    apply_count: AtomicUsize,
    reauth_count: AtomicUsize,
}

impl ScriptedUpdater {
    fn always_ok() -> Arc<Self> {
        Self::with_script(vec![])
    }

    fn with_script(script: Vec<Result<(), ProfileError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            apply_count: AtomicUsize::new(0),
            reauth_count: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ProfileUpdater for ScriptedUpdater {
    async fn apply(&self, _mood: MoodLabel) -> Result<(), ProfileError> {
        self.apply_count.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn reauth(&self) -> Result<(), ProfileError> {
        self.reauth_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn pipeline(
    updater: Arc<ScriptedUpdater>,
    clock: Arc<FakeClock>,
) -> Arc<MoodManager> {
    let gate = Arc::new(UpdateGate::with_parts(
        &GateConfig::default(),
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(NoDelay),
    ));
    let classifier = MoodClassifier::new(&ClassifierConfig::default(), Arc::new(VaderScorer::new()));
    Arc::new(MoodManager::with_clock(
        classifier,
        gate,
        updater,
        MoodHistoryStore::in_memory(),
        Duration::from_secs(5),
        clock,
    ))
}

#[tokio::test]
async fn enthusiastic_text_becomes_a_happy_update() {
    let updater = ScriptedUpdater::always_ok();
    let manager = pipeline(Arc::clone(&updater), FakeClock::at_noon());

    let (reading, outcome) = manager
        .process_text("mira", "This is amazing, I love it so much!!")
        .await;

    assert_eq!(reading.mood, MoodLabel::Happy);
    assert!(matches!(
        outcome,
        MoodUpdateOutcome::Updated {
            mood: MoodLabel::Happy,
            updates_left: 7,
        }
    ));
    assert_eq!(updater.apply_count.load(Ordering::SeqCst), 1);
    assert_eq!(manager.snapshot().last_mood, Some(MoodLabel::Happy));
}

#[tokio::test]
async fn keywords_beat_sentiment() {
    let updater = ScriptedUpdater::always_ok();
    let manager = pipeline(updater, FakeClock::at_noon());

    // Clearly negative sentence, but the party keyword wins.
    let (reading, _) = manager
        .process_text("mira", "I feel awful about this party")
        .await;
    assert_eq!(reading.mood, MoodLabel::Celebration);
    assert!((reading.confidence - 0.9).abs() < f64::EPSILON);
}

#[tokio::test]
async fn cooldown_blocks_the_second_update_until_it_elapses() {
    let updater = ScriptedUpdater::always_ok();
    let clock = FakeClock::at_noon();
    let manager = pipeline(Arc::clone(&updater), Arc::clone(&clock));

    manager.set_mood("mira", MoodLabel::Happy).await;

    let blocked = manager.set_mood("mira", MoodLabel::Tired).await;
    assert!(matches!(
        blocked,
        MoodUpdateOutcome::RateLimited {
            reason: RejectReason::Cooldown,
            wait_minutes: 60,
            ..
        }
    ));

    clock.advance_secs(3601);
    let allowed = manager.set_mood("mira", MoodLabel::Tired).await;
    assert!(matches!(allowed, MoodUpdateOutcome::Updated { .. }));
    assert_eq!(manager.snapshot().total, 2);
}

#[tokio::test]
async fn daily_cap_applies_per_actor() {
    let updater = ScriptedUpdater::always_ok();
    let clock = FakeClock::at_noon();
    let manager = pipeline(Arc::clone(&updater), Arc::clone(&clock));

    // Exhaust mira's quota by alternating moods past the cooldown.
    let moods = [MoodLabel::Happy, MoodLabel::Tired];
    for i in 0..8 {
        let outcome = manager.set_mood("mira", moods[i % 2]).await;
        assert!(matches!(outcome, MoodUpdateOutcome::Updated { .. }), "update {i}");
        clock.advance_secs(3601);
    }

    let blocked = manager.set_mood("mira", MoodLabel::Working).await;
    assert!(matches!(
        blocked,
        MoodUpdateOutcome::RateLimited {
            reason: RejectReason::DailyLimit,
            ..
        }
    ));

    // A different actor still has a full quota.
    let other = manager.set_mood("rowan", MoodLabel::Working).await;
    assert!(matches!(other, MoodUpdateOutcome::Updated { .. }));
}

#[tokio::test]
async fn expired_session_is_retried_within_one_gate_slot() {
    let updater = ScriptedUpdater::with_script(vec![Err(ProfileError::NeedsReauth), Ok(())]);
    let manager = pipeline(Arc::clone(&updater), FakeClock::at_noon());

    let outcome = manager.set_mood("mira", MoodLabel::Working).await;
    assert!(matches!(outcome, MoodUpdateOutcome::Updated { .. }));
    assert_eq!(updater.apply_count.load(Ordering::SeqCst), 2);
    assert_eq!(updater.reauth_count.load(Ordering::SeqCst), 1);
    assert_eq!(manager.gate_status("mira").await.updates_today, 1);
}

#[tokio::test]
async fn failed_update_leaves_no_trace() {
    let updater =
        ScriptedUpdater::with_script(vec![Err(ProfileError::Other("host down".to_owned()))]);
    let manager = pipeline(Arc::clone(&updater), FakeClock::at_noon());

    let outcome = manager.set_mood("mira", MoodLabel::Happy).await;
    assert!(matches!(outcome, MoodUpdateOutcome::UpdateFailed { .. }));
    assert_eq!(manager.snapshot().total, 0);
    assert_eq!(manager.gate_status("mira").await.updates_today, 0);
    assert_eq!(manager.last_mood_of("mira"), None);
}

#[tokio::test]
async fn concurrent_messages_consume_at_most_one_slot() {
    let updater = ScriptedUpdater::always_ok();
    let manager = pipeline(Arc::clone(&updater), FakeClock::at_noon());

    let first = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.set_mood("mira", MoodLabel::Happy).await })
    };
    let second = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.set_mood("mira", MoodLabel::Tired).await })
    };

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    let updated = outcomes
        .iter()
        .filter(|o| matches!(o, MoodUpdateOutcome::Updated { .. }))
        .count();
    assert_eq!(updated, 1, "{outcomes:?}");
    assert_eq!(manager.snapshot().total, 1);
    assert_eq!(updater.apply_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn chat_surface_routes_commands_statements_and_free_text() {
    let updater = ScriptedUpdater::always_ok();
    let clock = FakeClock::at_noon();
    let manager = pipeline(Arc::clone(&updater), Arc::clone(&clock));
    let registry = CommandRegistry::with_builtins();

    let message = |text: &str| ChannelInboundMessage {
        channel: "discord".to_owned(),
        sender: "100".to_owned(),
        reply_target: "chan-1".to_owned(),
        text: text.to_owned(),
    };
    let now = clock.now();

    let stated = respond_to(&manager, &registry, "!", &message("i am working"), now)
        .await
        .unwrap();
    assert!(stated.contains("Mood set to working"), "{stated}");
    assert_eq!(manager.last_mood_of("discord:100"), Some(MoodLabel::Working));

    let stats = respond_to(&manager, &registry, "!", &message("!moodstats"), now)
        .await
        .unwrap();
    assert!(stats.contains("1 total"), "{stats}");

    clock.advance_secs(3601);
    let free = respond_to(
        &manager,
        &registry,
        "!",
        &message("pizza for dinner tonight"),
        clock.now(),
    )
    .await
    .unwrap();
    assert!(free.contains("eating"), "{free}");
}

#[tokio::test]
async fn scheduled_transitions_share_the_pipeline() {
    let updater = ScriptedUpdater::always_ok();
    let clock = FakeClock::at_noon();
    let manager = pipeline(Arc::clone(&updater), Arc::clone(&clock));

    let mut scheduler = MoodScheduler::with_clock(
        &moodring::config::ScheduleConfig::default(),
        Arc::clone(&manager),
        Arc::clone(&clock) as Arc<dyn Clock>,
    );

    // Noon: the 07:00 wake transition is overdue and fires; the 12:30 meal
    // is still ahead.
    scheduler.tick().await;
    assert_eq!(manager.last_mood_of(SCHEDULE_ACTOR), Some(MoodLabel::Normal));
    assert_eq!(manager.snapshot().today_count, 1);

    // Scheduled updates obey the same cooldown as everyone else.
    clock.advance_secs(31 * 60);
    scheduler.tick().await;
    assert_eq!(manager.last_mood_of(SCHEDULE_ACTOR), Some(MoodLabel::Normal));
}
