//! Moodring daemon: wires channels and the daily scheduler to the
//! mood pipeline.

use moodring::channels::{self, ChannelRuntimeEvent};
use moodring::classifier::MoodClassifier;
use moodring::config::MoodConfig;
use moodring::gate::UpdateGate;
use moodring::history::MoodHistoryStore;
use moodring::manager::MoodManager;
use moodring::profile::HttpProfileUpdater;
use moodring::scheduler::MoodScheduler;
use moodring::sentiment::VaderScorer;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Suppress noisy dependency logs by default; RUST_LOG overrides.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("moodring=info,tungstenite=warn")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(MoodConfig::default_config_path);
    let config = if config_path.exists() {
        info!(path = %config_path.display(), "loading configuration");
        MoodConfig::from_file(&config_path)?
    } else {
        info!(
            path = %config_path.display(),
            "no configuration file found, using defaults"
        );
        MoodConfig::default()
    };

    let classifier = MoodClassifier::new(&config.classifier, Arc::new(VaderScorer::new()));
    let gate = Arc::new(UpdateGate::new(&config.gate));
    let updater = Arc::new(HttpProfileUpdater::new(&config.profile));
    let history = match &config.stats.path {
        Some(path) => MoodHistoryStore::with_persistence(path.clone()),
        None => MoodHistoryStore::in_memory(),
    };
    let manager = Arc::new(MoodManager::new(
        classifier,
        gate,
        updater,
        history,
        Duration::from_secs(config.profile.action_timeout_secs),
    ));

    let scheduler_handle = MoodScheduler::new(&config.schedule, Arc::clone(&manager)).run();

    match channels::start_runtime(&config, Arc::clone(&manager)) {
        Some((mut runtime, mut events)) => loop {
            tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(ChannelRuntimeEvent::Stopped) | None => break,
                    Some(event) => tracing::debug!(?event, "channel event"),
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    runtime.abort();
                }
            }
        },
        None => {
            warn!("channels disabled; running the schedule only");
            tokio::signal::ctrl_c().await?;
            info!("shutting down");
        }
    }

    scheduler_handle.abort();
    Ok(())
}
