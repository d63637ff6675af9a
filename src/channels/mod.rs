//! Chat channels: where mood messages come from.
//!
//! Channel-specific adapters are pluggable behind [`traits::ChannelAdapter`];
//! the runtime owns routing. Every inbound message takes one of three paths:
//! a prefixed command (`!moodstats`), an explicit statement (`i am happy`),
//! or free text handed to the classifier. Each message is handled on its own
//! task, and replies are paced per channel so a burst of messages never
//! floods the platform.

pub mod discord;
pub mod rate_limit;
pub mod traits;

use crate::channels::discord::DiscordAdapter;
use crate::channels::rate_limit::ReplyLimiters;
use crate::channels::traits::{ChannelAdapter, ChannelInboundMessage, ChannelOutboundMessage};
use crate::commands::{describe_outcome, parse_mood_argument, CommandContext, CommandRegistry};
use crate::config::MoodConfig;
use crate::manager::{MoodManager, MoodUpdateOutcome};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;

/// Runtime event emitted by the channel runtime.
#[derive(Debug, Clone)]
pub enum ChannelRuntimeEvent {
    Started { active_channels: Vec<String> },
    Stopped,
    Inbound { channel: String, sender: String },
    Outbound { channel: String, reply_target: String },
    Warning(String),
    Error(String),
}

/// Configuration validation issue for channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelValidationSeverity {
    Warning,
    Error,
}

/// Validation issue surfaced at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelValidationIssue {
    pub id: String,
    pub severity: ChannelValidationSeverity,
    pub summary: String,
}

/// Validate channel configuration without network calls.
#[must_use]
pub fn validate_config(config: &MoodConfig) -> Vec<ChannelValidationIssue> {
    let mut issues = Vec::new();
    if !config.channels.enabled {
        return issues;
    }

    let Some(discord) = &config.channels.discord else {
        issues.push(ChannelValidationIssue {
            id: "channels-enabled-without-adapters".to_owned(),
            severity: ChannelValidationSeverity::Warning,
            summary: "Channels are enabled but no adapter is configured.".to_owned(),
        });
        return issues;
    };

    if discord.bot_token.trim().is_empty() {
        issues.push(ChannelValidationIssue {
            id: "discord-missing-token".to_owned(),
            severity: ChannelValidationSeverity::Error,
            summary: "Discord is enabled but the bot token is empty.".to_owned(),
        });
    }
    if discord.allowed_user_ids.is_empty() {
        issues.push(ChannelValidationIssue {
            id: "discord-empty-allowlist".to_owned(),
            severity: ChannelValidationSeverity::Warning,
            summary: "Inbound Discord messages will be denied until allowed user IDs are set."
                .to_owned(),
        });
    }

    issues
}

/// Decide the reply (if any) for one inbound message.
///
/// Returns `None` when the message should pass silently, e.g. free text
/// that doesn't change the mood.
pub async fn respond_to(
    manager: &MoodManager,
    registry: &CommandRegistry,
    prefix: &str,
    message: &ChannelInboundMessage,
    now: DateTime<Utc>,
) -> Option<String> {
    let actor = message.actor_id();
    let ctx = CommandContext {
        manager,
        actor_id: &actor,
        now,
    };
    let text = message.text.trim();

    if !prefix.is_empty()
        && let Some(rest) = text.strip_prefix(prefix)
    {
        let mut parts = rest.trim().splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default().to_lowercase();
        let args = parts.next().unwrap_or_default();
        return match registry.dispatch(&name, args, &ctx).await {
            Some(reply) => Some(reply),
            None => Some(format!("Unknown command `{name}`. Try {prefix}help.")),
        };
    }

    // "i am happy" / "i'm tired" set the mood directly, no classifier.
    let lower = text.to_lowercase();
    let stated = if lower.starts_with("i am ") {
        Some(&text[5..])
    } else if lower.starts_with("i'm ") {
        Some(&text[4..])
    } else {
        None
    };
    if let Some(rest) = stated
        && let Some(mood) = parse_mood_argument(rest.trim_end_matches(['.', '!', '?']))
    {
        return Some(describe_outcome(&manager.set_mood(&actor, mood).await));
    }

    let (reading, outcome) = manager.process_text(&actor, text).await;
    match outcome {
        MoodUpdateOutcome::SameMood { .. } => None,
        MoodUpdateOutcome::Updated { .. } => Some(format!(
            "You sound {} ({:.0}% sure). {}",
            reading.mood,
            reading.confidence * 100.0,
            describe_outcome(&outcome)
        )),
        other => Some(describe_outcome(&other)),
    }
}

/// Runtime handle; dropping it leaves the runtime running.
pub struct ChannelRuntimeHandle {
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl ChannelRuntimeHandle {
    /// Request runtime shutdown.
    pub fn abort(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

/// Launch the channel runtime when channels are enabled.
pub fn start_runtime(
    config: &MoodConfig,
    manager: Arc<MoodManager>,
) -> Option<(
    ChannelRuntimeHandle,
    tokio::sync::mpsc::UnboundedReceiver<ChannelRuntimeEvent>,
)> {
    if !config.channels.enabled {
        return None;
    }

    let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let config = config.clone();

    tokio::spawn(async move {
        tokio::select! {
            result = run_runtime(config, manager, event_tx.clone()) => {
                if let Err(err) = result {
                    let _ = event_tx.send(ChannelRuntimeEvent::Error(err.to_string()));
                    tracing::error!("channels runtime failed: {err}");
                }
            }
            _ = stop_rx => {}
        }
        let _ = event_tx.send(ChannelRuntimeEvent::Stopped);
    });

    Some((
        ChannelRuntimeHandle {
            stop_tx: Some(stop_tx),
        },
        event_rx,
    ))
}

async fn run_runtime(
    config: MoodConfig,
    manager: Arc<MoodManager>,
    event_tx: tokio::sync::mpsc::UnboundedSender<ChannelRuntimeEvent>,
) -> anyhow::Result<()> {
    let validation = validate_config(&config);
    let has_error = validation
        .iter()
        .any(|issue| issue.severity == ChannelValidationSeverity::Error);
    for issue in validation {
        match issue.severity {
            ChannelValidationSeverity::Warning => {
                let _ = event_tx.send(ChannelRuntimeEvent::Warning(issue.summary.clone()));
                tracing::warn!("{}: {}", issue.id, issue.summary);
            }
            ChannelValidationSeverity::Error => {
                let _ = event_tx.send(ChannelRuntimeEvent::Error(issue.summary.clone()));
                tracing::error!("{}: {}", issue.id, issue.summary);
            }
        }
    }
    if has_error {
        anyhow::bail!("channel configuration has blocking errors");
    }

    let mut adapters: HashMap<String, Arc<dyn ChannelAdapter>> = HashMap::new();
    if let Some(discord) = &config.channels.discord {
        let adapter = Arc::new(DiscordAdapter::new(discord));
        adapters.insert(adapter.id().to_owned(), adapter);
    }
    if adapters.is_empty() {
        anyhow::bail!("channels are enabled but no adapters are active");
    }
    let active_channels: Vec<String> = adapters.keys().cloned().collect();

    let shared = Arc::new(RuntimeShared {
        manager,
        registry: CommandRegistry::with_builtins(),
        adapters,
        limiters: Mutex::new(ReplyLimiters::new(&config.channels.reply_rate_limits)),
        command_prefix: config.channels.command_prefix.clone(),
        event_tx: event_tx.clone(),
    });

    let queue_size = config.channels.inbound_queue_size.max(8);
    let (inbound_tx, inbound_rx) =
        tokio::sync::mpsc::channel::<ChannelInboundMessage>(queue_size);

    let _ = event_tx.send(ChannelRuntimeEvent::Started {
        active_channels: active_channels.clone(),
    });
    tracing::info!(
        "channel runtime started with [{}]",
        active_channels.join(", ")
    );

    let mut workers = JoinSet::new();
    for adapter in shared.adapters.values() {
        let adapter = Arc::clone(adapter);
        let tx = inbound_tx.clone();
        let event_tx = event_tx.clone();
        workers.spawn(async move {
            let mut backoff_secs = RESTART_BACKOFF_BASE_SECS;
            loop {
                match adapter.run(tx.clone()).await {
                    Ok(()) => {
                        let warning = format!("channel {} stopped; restarting", adapter.id());
                        let _ = event_tx.send(ChannelRuntimeEvent::Warning(warning.clone()));
                        tracing::warn!("{warning}");
                    }
                    Err(err) => {
                        let warning = format!(
                            "channel {} failed: {err}; retrying in {backoff_secs}s",
                            adapter.id()
                        );
                        let _ = event_tx.send(ChannelRuntimeEvent::Warning(warning.clone()));
                        tracing::warn!("{warning}");
                    }
                }
                tokio::time::sleep(std::time::Duration::from_secs(backoff_secs)).await;
                backoff_secs = next_backoff_secs(adapter.as_ref(), backoff_secs).await;
            }
        });
    }

    dispatch_inbound(Arc::clone(&shared), inbound_rx).await;

    workers.abort_all();
    while workers.join_next().await.is_some() {}
    Ok(())
}

const RESTART_BACKOFF_BASE_SECS: u64 = 2;
const RESTART_BACKOFF_MAX_SECS: u64 = 60;

/// Reconnect pacing after an adapter exits: a passing health probe resets
/// the delay, anything else keeps doubling it up to the cap.
async fn next_backoff_secs(adapter: &dyn ChannelAdapter, current_secs: u64) -> u64 {
    match adapter.health_check().await {
        Ok(true) => RESTART_BACKOFF_BASE_SECS,
        Ok(false) | Err(_) => current_secs.saturating_mul(2).min(RESTART_BACKOFF_MAX_SECS),
    }
}

/// State shared by the inbound message handlers.
struct RuntimeShared {
    manager: Arc<MoodManager>,
    registry: CommandRegistry,
    adapters: HashMap<String, Arc<dyn ChannelAdapter>>,
    limiters: Mutex<ReplyLimiters>,
    command_prefix: String,
    event_tx: tokio::sync::mpsc::UnboundedSender<ChannelRuntimeEvent>,
}

/// Fan inbound messages out to per-message handler tasks.
///
/// Handlers run concurrently: an update waiting out its jitter delay or a
/// slow profile host only holds up that one message. Per-actor ordering
/// comes from the gate's reservation lock, not from this loop.
async fn dispatch_inbound(
    shared: Arc<RuntimeShared>,
    mut inbound_rx: tokio::sync::mpsc::Receiver<ChannelInboundMessage>,
) {
    let mut handlers = JoinSet::new();
    while let Some(message) = inbound_rx.recv().await {
        let _ = shared.event_tx.send(ChannelRuntimeEvent::Inbound {
            channel: message.channel.clone(),
            sender: message.sender.clone(),
        });
        let shared = Arc::clone(&shared);
        handlers.spawn(async move { handle_inbound(&shared, message).await });
        while handlers.try_join_next().is_some() {}
    }
    while handlers.join_next().await.is_some() {}
}

/// One inbound message end to end: decide the reply, pace it, send it.
async fn handle_inbound(shared: &RuntimeShared, message: ChannelInboundMessage) {
    let reply = respond_to(
        &shared.manager,
        &shared.registry,
        &shared.command_prefix,
        &message,
        Utc::now(),
    )
    .await;
    let Some(reply) = reply else {
        return;
    };

    let Some(adapter) = shared.adapters.get(&message.channel) else {
        let warning = format!("no adapter found for channel `{}`", message.channel);
        let _ = shared
            .event_tx
            .send(ChannelRuntimeEvent::Warning(warning.clone()));
        tracing::warn!("{warning}");
        return;
    };

    let pacing = shared
        .limiters
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .try_send(&message.channel);
    if let Err(err) = pacing {
        let warning = format!("reply suppressed on {}: {err}", message.channel);
        let _ = shared
            .event_tx
            .send(ChannelRuntimeEvent::Warning(warning.clone()));
        tracing::warn!("{warning}");
        return;
    }

    match adapter
        .send(ChannelOutboundMessage {
            reply_target: message.reply_target.clone(),
            text: reply,
        })
        .await
    {
        Ok(()) => {
            let _ = shared.event_tx.send(ChannelRuntimeEvent::Outbound {
                channel: message.channel.clone(),
                reply_target: message.reply_target,
            });
        }
        Err(err) => {
            let warning = format!("failed to send {} reply: {err}", adapter.id());
            let _ = shared
                .event_tx
                .send(ChannelRuntimeEvent::Warning(warning.clone()));
            tracing::warn!("{warning}");
        }
    }
}
