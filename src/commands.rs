//! Chat commands over the mood system.
//!
//! Channels strip their prefix and hand the bare command name here. Every
//! command renders a plain-text reply; the registry owns the built-ins and
//! the help text.

use crate::gate::RejectReason;
use crate::manager::{MoodManager, MoodUpdateOutcome};
use crate::mood::MoodLabel;
use crate::predict::forecast;
use crate::suggest::{MoodSuggester, TimeOfDay};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use std::sync::Arc;

/// Everything a command may consult while rendering its reply.
pub struct CommandContext<'a> {
    pub manager: &'a MoodManager,
    /// Who issued the command.
    pub actor_id: &'a str,
    pub now: DateTime<Utc>,
}

/// One chat command.
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// `args` is the trimmed remainder of the message after the name.
    async fn run(&self, ctx: &CommandContext<'_>, args: &str) -> String;
}

/// Name-indexed command set.
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Registry with the built-in commands.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self {
            commands: vec![
                Arc::new(MoodStatsCommand),
                Arc::new(LimitsCommand),
                Arc::new(SuggestCommand),
                Arc::new(PredictCommand),
                Arc::new(JournalCommand),
                Arc::new(MoodCommand),
            ],
        }
    }

    /// Run a command by name. `None` means the name is unknown.
    pub async fn dispatch(
        &self,
        name: &str,
        args: &str,
        ctx: &CommandContext<'_>,
    ) -> Option<String> {
        if name == "help" {
            return Some(self.help_text());
        }
        let command = self.commands.iter().find(|c| c.name() == name)?;
        Some(command.run(ctx, args.trim()).await)
    }

    fn help_text(&self) -> String {
        let mut lines = vec!["Commands:".to_owned()];
        for command in &self.commands {
            lines.push(format!("  {} - {}", command.name(), command.description()));
        }
        lines.push("  help - this list".to_owned());
        lines.push("You can also just say \"i am <mood>\" or chat freely.".to_owned());
        lines.join("\n")
    }
}

/// Usage and distribution statistics.
struct MoodStatsCommand;

#[async_trait]
impl Command for MoodStatsCommand {
    fn name(&self) -> &'static str {
        "moodstats"
    }

    fn description(&self) -> &'static str {
        "mood change totals and distribution"
    }

    async fn run(&self, ctx: &CommandContext<'_>, _args: &str) -> String {
        let snapshot = ctx.manager.snapshot();
        if snapshot.total == 0 {
            return "No moods recorded yet.".to_owned();
        }

        let mut reply = format!(
            "Mood changes: {} total, {} today.",
            snapshot.total, snapshot.today_count
        );
        if let Some(most_common) = snapshot.most_common {
            let share = snapshot
                .percentages
                .get(&most_common)
                .copied()
                .unwrap_or(0.0);
            reply.push_str(&format!(" Most common: {most_common} ({share}%)."));
        }
        if let (Some(mood), Some(time)) = (snapshot.last_mood, snapshot.last_mood_time) {
            reply.push_str(&format!(
                " Last: {mood} at {}.",
                time.format("%Y-%m-%d %H:%M UTC")
            ));
        }
        reply
    }
}

/// Rate-gate state for the calling actor.
struct LimitsCommand;

#[async_trait]
impl Command for LimitsCommand {
    fn name(&self) -> &'static str {
        "limits"
    }

    fn description(&self) -> &'static str {
        "profile update quota for today"
    }

    async fn run(&self, ctx: &CommandContext<'_>, _args: &str) -> String {
        let state = ctx.manager.gate_status(ctx.actor_id).await;
        let mut reply = format!(
            "Profile updates today: {} used, {} left.",
            state.updates_today, state.updates_left
        );
        match state.last_update_at {
            Some(at) => {
                reply.push_str(&format!(" Last update {}.", at.format("%H:%M UTC")));
            }
            None => reply.push_str(" No updates yet today."),
        }
        reply
    }
}

/// Mood suggestions for the current time of day.
struct SuggestCommand;

#[async_trait]
impl Command for SuggestCommand {
    fn name(&self) -> &'static str {
        "suggest"
    }

    fn description(&self) -> &'static str {
        "three moods that fit right now"
    }

    async fn run(&self, ctx: &CommandContext<'_>, _args: &str) -> String {
        let snapshot = ctx.manager.snapshot();
        let hour = ctx.now.hour();
        let suggestions = MoodSuggester::new().suggest(&snapshot, hour);
        format!(
            "This {} you could go with: {}, {} or {}.",
            TimeOfDay::from_hour(hour).label(),
            suggestions[0],
            suggestions[1],
            suggestions[2]
        )
    }
}

/// Tomorrow's forecast from recorded patterns.
struct PredictCommand;

#[async_trait]
impl Command for PredictCommand {
    fn name(&self) -> &'static str {
        "predict"
    }

    fn description(&self) -> &'static str {
        "mood forecast for tomorrow"
    }

    async fn run(&self, ctx: &CommandContext<'_>, _args: &str) -> String {
        let events = ctx.manager.events();
        let last_mood = ctx.manager.snapshot().last_mood;
        let tomorrow = (ctx.now + Duration::days(1)).date_naive();
        let result = forecast(&events, last_mood, tomorrow);

        let mut lines = vec![format!(
            "Forecast for {} ({}, {}):",
            result.date,
            result.date.weekday(),
            result.day_type.label()
        )];
        for (period, moods) in &result.periods {
            let rendered: Vec<String> = moods.iter().map(ToString::to_string).collect();
            lines.push(format!("  {}: {}", period.label(), rendered.join(" or ")));
        }
        lines.join("\n")
    }
}

/// Today's mood changes, in the order they happened.
struct JournalCommand;

#[async_trait]
impl Command for JournalCommand {
    fn name(&self) -> &'static str {
        "journal"
    }

    fn description(&self) -> &'static str {
        "today's mood changes in order"
    }

    async fn run(&self, ctx: &CommandContext<'_>, _args: &str) -> String {
        let today = ctx.now.date_naive();
        let entries: Vec<String> = ctx
            .manager
            .events()
            .iter()
            .filter(|event| event.timestamp.date_naive() == today)
            .map(|event| {
                format!(
                    "  {} {} ({})",
                    event.timestamp.format("%H:%M"),
                    event.mood,
                    event.actor_id
                )
            })
            .collect();
        if entries.is_empty() {
            return "No mood changes recorded today.".to_owned();
        }

        let mut lines = vec![format!("Mood journal for {today}:")];
        lines.extend(entries);
        lines.join("\n")
    }
}

/// Explicit mood change: `mood <label>`.
struct MoodCommand;

#[async_trait]
impl Command for MoodCommand {
    fn name(&self) -> &'static str {
        "mood"
    }

    fn description(&self) -> &'static str {
        "current mood, or `mood <label>` to change it"
    }

    async fn run(&self, ctx: &CommandContext<'_>, args: &str) -> String {
        if args.is_empty() {
            return match ctx.manager.last_mood_of(ctx.actor_id) {
                Some(mood) => format!("You are currently {mood}."),
                None => "No mood recorded for you yet.".to_owned(),
            };
        }
        let Some(mood) = parse_mood_argument(args) else {
            let known: Vec<&str> = MoodLabel::ALL.iter().map(|m| m.as_str()).collect();
            return format!("I don't know the mood `{args}`. Try one of: {}.", known.join(", "));
        };
        describe_outcome(&ctx.manager.set_mood(ctx.actor_id, mood).await)
    }
}

/// Render an update outcome as a chat reply. Shared by the command path
/// and the free-text path.
#[must_use]
pub fn describe_outcome(outcome: &MoodUpdateOutcome) -> String {
    match outcome {
        MoodUpdateOutcome::Updated { mood, updates_left } => {
            format!("Mood set to {mood}. {updates_left} profile updates left today.")
        }
        MoodUpdateOutcome::SameMood { mood } => {
            format!("Already {mood}, nothing to change.")
        }
        MoodUpdateOutcome::RateLimited {
            mood,
            reason,
            wait_minutes,
        } => {
            let why = match reason {
                RejectReason::DailyLimit => "the daily update limit is reached",
                RejectReason::Cooldown => "the cooldown is still running",
            };
            format!("Noted {mood}, but {why}. Try again in about {wait_minutes} min.")
        }
        MoodUpdateOutcome::UpdateFailed { mood, .. } => {
            format!("Tried to switch to {mood}, but the profile update failed.")
        }
    }
}

/// Parse an explicit mood argument (`mood happy`, `i am happy`).
#[must_use]
pub fn parse_mood_argument(argument: &str) -> Option<MoodLabel> {
    argument.trim().parse().ok()
}
