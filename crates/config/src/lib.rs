//! Configuration loading, validation, and management for Listkeeper.
//!
//! Loads configuration from `~/.listkeeper/config.toml` with environment
//! variable overrides. Validates all settings at startup: an unknown timezone
//! or a malformed `HH:MM` time is fatal.

use chrono::{Duration, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.listkeeper/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Telegram bot token from @BotFather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// SQLite database location
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// IANA timezone used for every scheduled time (e.g. "Europe/Moscow")
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Chat that receives scheduled messages. When unset, the most recent
    /// chat to contact the bot is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_chat_id: Option<i64>,

    /// Topic session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Fixed daily trigger times
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Telegram transport settings
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Morning digest calendar source
    #[serde(default)]
    pub calendar: CalendarConfig,
}

fn default_db_path() -> String {
    "listkeeper.db".into()
}
fn default_timezone() -> String {
    "Europe/Moscow".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("db_path", &self.db_path)
            .field("timezone", &self.timezone)
            .field("target_chat_id", &self.target_chat_id)
            .field("session", &self.session)
            .field("schedule", &self.schedule)
            .field("telegram", &self.telegram)
            .field("calendar", &self.calendar)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Minutes of inactivity after which an explicit topic falls back to the inbox
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u32,
}

fn default_ttl_minutes() -> u32 {
    10
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::minutes(i64::from(self.ttl_minutes))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Local times (`HH:MM`) at which active reminders are re-sent
    #[serde(default = "default_reminder_times")]
    pub reminder_times: Vec<String>,

    /// Local time of the morning agenda digest
    #[serde(default = "default_morning_digest")]
    pub morning_digest: String,

    /// Local time at which all reminders are wiped
    #[serde(default = "default_nightly_wipe")]
    pub nightly_wipe: String,

    /// Seconds between scheduler polls. Must not exceed 60, or a trigger
    /// minute could be skipped entirely.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_reminder_times() -> Vec<String> {
    ["08:00", "10:00", "14:00", "19:00", "23:00"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_morning_digest() -> String {
    "08:00".into()
}
fn default_nightly_wipe() -> String {
    "03:00".into()
}
fn default_poll_interval_secs() -> u64 {
    15
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            reminder_times: default_reminder_times(),
            morning_digest: default_morning_digest(),
            nightly_wipe: default_nightly_wipe(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl ScheduleConfig {
    pub fn reminder_times(&self) -> Result<Vec<NaiveTime>, ConfigError> {
        self.reminder_times.iter().map(|t| parse_hhmm(t)).collect()
    }

    pub fn morning_digest_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_hhmm(&self.morning_digest)
    }

    pub fn nightly_wipe_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_hhmm(&self.nightly_wipe)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Allowlist of sender IDs. Empty = deny all. ["*"] = allow all.
    #[serde(default = "default_allowed_users")]
    pub allowed_users: Vec<String>,

    /// Long-polling timeout passed to `getUpdates`
    #[serde(default = "default_long_poll_secs")]
    pub long_poll_secs: u32,

    /// Bot API base URL (overridable for self-hosted API servers)
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_allowed_users() -> Vec<String> {
    vec!["*".into()]
}
fn default_long_poll_secs() -> u32 {
    60
}
fn default_api_url() -> String {
    "https://api.telegram.org".into()
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            allowed_users: default_allowed_users(),
            long_poll_secs: default_long_poll_secs(),
            api_url: default_api_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Set to false to always send the "not configured" placeholder
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Public or secret iCalendar feed URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ics_url: Option<String>,

    /// Request timeout for the feed
    #[serde(default = "default_calendar_timeout")]
    pub timeout_secs: u64,
}

fn default_calendar_timeout() -> u64 {
    20
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ics_url: None,
            timeout_secs: default_calendar_timeout(),
        }
    }
}

/// Parse a 24-hour `HH:MM` time.
pub fn parse_hhmm(s: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| ConfigError::ValidationError(format!("invalid time {s:?} (expected HH:MM): {e}")))
}

impl AppConfig {
    /// Load configuration from the default path (~/.listkeeper/config.toml),
    /// then apply environment overrides and validate.
    ///
    /// Recognised variables: `BOT_TOKEN`, `DB_PATH`, `TZ`, `CHAT_ID`,
    /// `MORNING_TIME`, `GCAL_DISABLED`, `CALENDAR_ICS_URL`,
    /// `LISTKEEPER_TTL_MINUTES`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(&Self::config_path())
    }

    /// Like [`load`](Self::load), but from an explicit file.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (highest priority).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(token) = non_empty("BOT_TOKEN") {
            self.bot_token = Some(token);
        }
        if let Some(path) = non_empty("DB_PATH") {
            self.db_path = path;
        }
        if let Some(tz) = non_empty("TZ") {
            self.timezone = tz;
        }
        if let Some(raw) = non_empty("CHAT_ID") {
            match raw.parse::<i64>() {
                Ok(id) => self.target_chat_id = Some(id),
                Err(_) => tracing::warn!(value = %raw, "Ignoring CHAT_ID: not a number"),
            }
        }
        if let Some(time) = non_empty("MORNING_TIME") {
            self.schedule.morning_digest = time;
        }
        if non_empty("GCAL_DISABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            self.calendar.enabled = false;
        }
        if let Some(url) = non_empty("CALENDAR_ICS_URL") {
            self.calendar.ics_url = Some(url);
        }
        if let Some(raw) = non_empty("LISTKEEPER_TTL_MINUTES") {
            match raw.parse::<u32>() {
                Ok(ttl) => self.session.ttl_minutes = ttl,
                Err(_) => tracing::warn!(value = %raw, "Ignoring LISTKEEPER_TTL_MINUTES: not a number"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".listkeeper")
    }

    /// Default config file location.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// The configured timezone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::ValidationError(format!("unknown timezone {:?}", self.timezone)))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;

        if self.session.ttl_minutes == 0 {
            return Err(ConfigError::ValidationError(
                "session.ttl_minutes must be greater than 0".into(),
            ));
        }

        self.schedule.reminder_times()?;
        self.schedule.morning_digest_time()?;
        self.schedule.nightly_wipe_time()?;

        if !(1..=60).contains(&self.schedule.poll_interval_secs) {
            return Err(ConfigError::ValidationError(
                "schedule.poll_interval_secs must be between 1 and 60".into(),
            ));
        }

        if let Some(url) = &self.calendar.ics_url
            && !url.starts_with("http://")
            && !url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(
                "calendar.ics_url must start with http:// or https://".into(),
            ));
        }

        Ok(())
    }

    /// The bot token, or a configuration error when running without one.
    pub fn require_bot_token(&self) -> Result<&str, ConfigError> {
        self.bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConfigError::ValidationError("BOT_TOKEN is not set".into()))
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            db_path: default_db_path(),
            timezone: default_timezone(),
            target_chat_id: None,
            session: SessionConfig::default(),
            schedule: ScheduleConfig::default(),
            telegram: TelegramSettings::default(),
            calendar: CalendarConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for listkeeper_core::Error {
    fn from(e: ConfigError) -> Self {
        listkeeper_core::Error::Config {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timezone, "Europe/Moscow");
        assert_eq!(config.session.ttl_minutes, 10);
        assert_eq!(config.schedule.reminder_times.len(), 5);
        assert_eq!(config.schedule.nightly_wipe, "03:00");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.timezone, config.timezone);
        assert_eq!(parsed.schedule.reminder_times, config.schedule.reminder_times);
    }

    #[test]
    fn invalid_timezone_rejected() {
        let config = AppConfig {
            timezone: "Mars/Olympus_Mons".into(),
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus_Mons"));
    }

    #[test]
    fn invalid_time_rejected() {
        let mut config = AppConfig::default();
        config.schedule.reminder_times.push("25:00".into());
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.schedule.nightly_wipe = "3am".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn coarse_poll_interval_rejected() {
        let mut config = AppConfig::default();
        config.schedule.poll_interval_secs = 120;
        assert!(config.validate().is_err());
        config.schedule.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_ttl_rejected() {
        let mut config = AppConfig::default();
        config.session.ttl_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_hhmm_accepts_24h_times() {
        assert_eq!(parse_hhmm("08:00").unwrap(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(parse_hhmm(" 23:59 ").unwrap(), NaiveTime::from_hms_opt(23, 59, 0).unwrap());
        assert!(parse_hhmm("24:00").is_err());
        assert!(parse_hhmm("8").is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[
            ("BOT_TOKEN", "123:abc"),
            ("DB_PATH", "/var/lib/listkeeper/items.db"),
            ("TZ", "UTC"),
            ("CHAT_ID", "-100500"),
            ("MORNING_TIME", "07:30"),
            ("GCAL_DISABLED", "TRUE"),
            ("LISTKEEPER_TTL_MINUTES", "5"),
        ]));
        assert_eq!(config.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.db_path, "/var/lib/listkeeper/items.db");
        assert_eq!(config.timezone, "UTC");
        assert_eq!(config.target_chat_id, Some(-100500));
        assert_eq!(config.schedule.morning_digest, "07:30");
        assert!(!config.calendar.enabled);
        assert_eq!(config.session.ttl_minutes, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_chat_id_env_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("CHAT_ID", "me"), ("BOT_TOKEN", "  ")]));
        assert_eq!(config.target_chat_id, None);
        assert_eq!(config.bot_token, None);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().db_path, "listkeeper.db");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
timezone = "Asia/Tokyo"
target_chat_id = 4242

[session]
ttl_minutes = 30

[schedule]
reminder_times = ["09:15", "18:45"]
nightly_wipe = "02:30"

[calendar]
ics_url = "https://calendar.example.com/me.ics"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.tz().unwrap(), chrono_tz::Asia::Tokyo);
        assert_eq!(config.target_chat_id, Some(4242));
        assert_eq!(config.session.ttl(), Duration::minutes(30));
        assert_eq!(config.schedule.reminder_times().unwrap().len(), 2);
        assert_eq!(config.schedule.morning_digest, "08:00");
        assert_eq!(
            config.calendar.ics_url.as_deref(),
            Some("https://calendar.example.com/me.ics")
        );
    }

    #[test]
    fn load_from_rejects_bad_timezone_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timezone = \"Nowhere/Land\"\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn debug_redacts_token() {
        let config = AppConfig {
            bot_token: Some("123:secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn require_bot_token() {
        assert!(AppConfig::default().require_bot_token().is_err());
        let config = AppConfig {
            bot_token: Some("t".into()),
            ..AppConfig::default()
        };
        assert_eq!(config.require_bot_token().unwrap(), "t");
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("Europe/Moscow"));
        assert!(toml_str.contains("reminder_times"));
    }
}
