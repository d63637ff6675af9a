//! Configuration types for the mood bot.
//!
//! Everything the decision core consults — keyword tables, threshold bands,
//! rate-gate policy, jitter window, schedule, image assets — is overridable
//! from the TOML file without code changes.

use crate::mood::MoodLabel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MoodConfig {
    /// Mood classification settings (keyword table, threshold bands).
    pub classifier: ClassifierConfig,
    /// Update gate policy (daily cap, cooldown, jitter window).
    pub gate: GateConfig,
    /// External profile-picture API settings and per-mood image assets.
    pub profile: ProfileConfig,
    /// Scheduled automatic mood transitions.
    pub schedule: ScheduleConfig,
    /// Chat channel settings.
    pub channels: ChannelsConfig,
    /// Mood statistics persistence.
    pub stats: StatsConfig,
}

/// One ordered keyword rule: any trigger substring selects the mood.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Mood selected when a trigger matches.
    pub mood: MoodLabel,
    /// Trigger substrings, matched case-insensitively.
    pub triggers: Vec<String>,
}

impl KeywordRule {
    fn new(mood: MoodLabel, triggers: &[&str]) -> Self {
        Self {
            mood,
            triggers: triggers.iter().map(|t| (*t).to_owned()).collect(),
        }
    }
}

/// Compound-score bands applied when no keyword matches.
///
/// Evaluated in order: `>= high_positive` → happy, `<= high_negative` →
/// tired, `> mild_positive` → celebration, `< mild_negative` → confused,
/// otherwise normal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdBands {
    pub high_positive: f64,
    pub mild_positive: f64,
    pub mild_negative: f64,
    pub high_negative: f64,
}

impl Default for ThresholdBands {
    fn default() -> Self {
        Self {
            high_positive: 0.5,
            mild_positive: 0.2,
            mild_negative: -0.2,
            high_negative: -0.5,
        }
    }
}

/// Mood classification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Ordered keyword table. The first rule with any matching trigger
    /// wins outright; order is the whole precedence model.
    pub keywords: Vec<KeywordRule>,
    /// Sentiment threshold bands for texts with no keyword hit.
    pub thresholds: ThresholdBands,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            keywords: vec![
                KeywordRule::new(
                    MoodLabel::Celebration,
                    &["party", "celebrate", "congratulations", "achievement"],
                ),
                KeywordRule::new(
                    MoodLabel::Happy,
                    &["happy", "joy", "excited", "great", "wonderful"],
                ),
                KeywordRule::new(MoodLabel::Companion, &["love", "date", "romantic"]),
                KeywordRule::new(MoodLabel::Birthday, &["birthday", "cake", "anniversary"]),
                KeywordRule::new(
                    MoodLabel::Eating,
                    &[
                        "eating",
                        "food",
                        "hungry",
                        "lunch",
                        "dinner",
                        "breakfast",
                        "snack",
                        "meal",
                        "yummy",
                    ],
                ),
                KeywordRule::new(MoodLabel::Working, &["work", "busy", "coding", "studying"]),
                KeywordRule::new(MoodLabel::Normal, &["okay", "fine", "normal", "alright"]),
                KeywordRule::new(
                    MoodLabel::Confused,
                    &["confused", "unsure", "what", "why", "how"],
                ),
                KeywordRule::new(
                    MoodLabel::Tired,
                    &["tired", "exhausted", "sleepy", "fatigue"],
                ),
                KeywordRule::new(
                    MoodLabel::Awkward,
                    &["awkward", "uncomfortable", "weird"],
                ),
                KeywordRule::new(MoodLabel::Sleeping, &["sleep", "goodnight", "night", "bed"]),
            ],
            thresholds: ThresholdBands::default(),
        }
    }
}

/// Update gate policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Maximum permitted external updates per actor per calendar day.
    pub max_updates_per_day: u32,
    /// Minimum elapsed time between two permitted updates, in seconds.
    pub min_cooldown_secs: u64,
    /// Lower bound of the randomized pre-commit delay, in seconds.
    pub jitter_min_secs: u64,
    /// Upper bound of the randomized pre-commit delay, in seconds.
    pub jitter_max_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        // Conservative pacing so the image host never sees a burst of
        // profile changes: 8/day, an hour apart, 1-3 minutes of jitter.
        Self {
            max_updates_per_day: 8,
            min_cooldown_secs: 3600,
            jitter_min_secs: 60,
            jitter_max_secs: 180,
        }
    }
}

/// External profile-picture API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Base URL of the image-hosting API.
    pub base_url: String,
    /// Account username for session login.
    pub username: String,
    /// Account password for session login.
    pub password: String,
    /// Per-mood image asset paths.
    pub images: HashMap<MoodLabel, PathBuf>,
    /// Timeout for one upload attempt, in seconds.
    pub action_timeout_secs: u64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        let images = MoodLabel::ALL
            .iter()
            .map(|&mood| (mood, PathBuf::from(format!("assets/{mood}.png"))))
            .collect();
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            images,
            action_timeout_secs: 30,
        }
    }
}

/// A clock time in `HH:MM` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    pub hour: u8,
    pub min: u8,
}

impl TryFrom<String> for ClockTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (hour, min) = value
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got `{value}`"))?;
        let hour: u8 = hour.parse().map_err(|_| format!("bad hour in `{value}`"))?;
        let min: u8 = min.parse().map_err(|_| format!("bad minute in `{value}`"))?;
        if hour > 23 || min > 59 {
            return Err(format!("time `{value}` out of range"));
        }
        Ok(Self { hour, min })
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        format!("{:02}:{:02}", time.hour, time.min)
    }
}

/// Scheduled automatic transitions (sleep window, meal times).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Whether scheduled transitions run at all.
    pub enabled: bool,
    /// Start of the sleeping window (switches to `sleeping`).
    pub sleep_start: ClockTime,
    /// End of the sleeping window (switches back to `normal`).
    pub sleep_end: ClockTime,
    /// Meal times (each switches to `eating`).
    pub meal_times: Vec<ClockTime>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sleep_start: ClockTime { hour: 23, min: 30 },
            sleep_end: ClockTime { hour: 7, min: 0 },
            meal_times: vec![
                ClockTime { hour: 12, min: 30 },
                ClockTime { hour: 19, min: 30 },
            ],
        }
    }
}

/// Discord channel adapter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordChannelConfig {
    /// Bot token.
    pub bot_token: String,
    /// Restrict to one guild when set.
    pub guild_id: Option<String>,
    /// Allowed sender user IDs (`*` allows everyone).
    pub allowed_user_ids: Vec<String>,
    /// Allowed channel IDs (empty allows all).
    pub allowed_channel_ids: Vec<String>,
}

/// Outbound reply rate limits per channel (messages per minute).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyRateLimits {
    pub discord: u32,
}

impl Default for ReplyRateLimits {
    fn default() -> Self {
        Self { discord: 2 }
    }
}

/// Chat channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    /// Master switch for the channel runtime.
    pub enabled: bool,
    /// Inbound message queue depth.
    pub inbound_queue_size: usize,
    /// Discord adapter settings (absent = adapter disabled).
    pub discord: Option<DiscordChannelConfig>,
    /// Outbound reply pacing.
    pub reply_rate_limits: ReplyRateLimits,
    /// Command prefix for registry commands.
    pub command_prefix: String,
}

impl Default for ChannelsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            inbound_queue_size: 128,
            discord: None,
            reply_rate_limits: ReplyRateLimits::default(),
            command_prefix: "!".to_owned(),
        }
    }
}

/// Mood statistics persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// JSON file for aggregate stats. `None` keeps stats in memory only.
    pub path: Option<PathBuf>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            path: Some(default_data_dir().join("mood_stats.json")),
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(data) = std::env::var_os("XDG_DATA_HOME") {
        PathBuf::from(data).join("moodring")
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("moodring")
    } else {
        PathBuf::from("/tmp/moodring-data")
    }
}

impl MoodConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::MoodError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::MoodError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/moodring/config.toml`.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("moodring").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("moodring")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/moodring-config/config.toml")
        }
    }
}
