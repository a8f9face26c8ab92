//! Relay configuration
//!
//! Loaded once at startup from a JSON file. Required fields are checked
//! up front so a bad file fails with the name of the missing key instead
//! of somewhere inside the first sync cycle.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::format::{DEFAULT_REPLY_MARKER, DEFAULT_REPOST_MARKER};

/// Environment variable overriding the database location
pub const DATABASE_PATH_ENV: &str = "DRASTA_DATABASE_PATH";
/// Default database filename inside the data directory
pub const DEFAULT_DATABASE_FILE: &str = "drasta.sqlite";

/// Validated relay settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub twitter_username: String,
    pub twitter_api_key: String,
    pub twitter_api_secret: String,
    /// Channel username without the leading `@`
    pub telegram_channel: String,
    pub telegram_bot_token: String,
    /// Reply sent to users who `/start` the bot
    pub welcome_text: String,
    pub max_rollback: usize,
    pub rate_limit_wait: Duration,
    pub seek_rate: Duration,
    pub send_delay: Duration,
    pub repost_marker: char,
    pub reply_marker: char,
    /// Database file; `None` means the default location
    pub database_path: Option<PathBuf>,
}

/// A number that may also be written as a string in the file
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(u64),
    Text(String),
}

/// Config file as written by the user
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    twitter_username: Option<String>,
    twitter_apikey: Option<String>,
    twitter_api_secret: Option<String>,
    telegram_channel: Option<String>,
    telegram_bot_apikey: Option<String>,
    welcome_text: Option<String>,
    max_rollback: Option<NumberOrText>,
    ratelimit_wait: Option<NumberOrText>,
    seek_rate: Option<NumberOrText>,
    send_delay: Option<NumberOrText>,
    retweet_emoji: Option<NumberOrText>,
    reply_emoji: Option<NumberOrText>,
    database_path: Option<PathBuf>,
}

impl RelayConfig {
    /// Load the config file at `path`
    ///
    /// `DRASTA_DATABASE_PATH` takes precedence over `database_path` from
    /// the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = config::load_json_file(path).map_err(|source| ConfigError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::from_raw(raw)?;
        if let Some(db) = std::env::var_os(DATABASE_PATH_ENV).filter(|v| !v.is_empty()) {
            cfg.database_path = Some(PathBuf::from(db));
        }
        Ok(cfg)
    }

    /// Parse and validate a config from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json).map_err(|e| ConfigError::Load {
            path: PathBuf::from("<inline>"),
            source: e.into(),
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let telegram_channel = required(raw.telegram_channel, "telegram_channel")?
            .trim_start_matches('@')
            .to_string();
        let welcome_text = raw
            .welcome_text
            .unwrap_or_else(|| format!("Hi! Join @{}", telegram_channel));

        Ok(Self {
            twitter_username: required(raw.twitter_username, "twitter_username")?,
            twitter_api_key: required(raw.twitter_apikey, "twitter_apikey")?,
            twitter_api_secret: required(raw.twitter_api_secret, "twitter_api_secret")?,
            telegram_bot_token: required(raw.telegram_bot_apikey, "telegram_bot_apikey")?,
            telegram_channel,
            welcome_text,
            max_rollback: number(raw.max_rollback, "max_rollback", 50)? as usize,
            rate_limit_wait: minutes(raw.ratelimit_wait, "ratelimit_wait", 15)?,
            seek_rate: minutes(raw.seek_rate, "seek_rate", 1)?,
            send_delay: Duration::from_secs(number(raw.send_delay, "send_delay", 3)?),
            repost_marker: marker(raw.retweet_emoji, "retweet_emoji", DEFAULT_REPOST_MARKER)?,
            reply_marker: marker(raw.reply_emoji, "reply_emoji", DEFAULT_REPLY_MARKER)?,
            database_path: raw.database_path,
        })
    }

    /// Where the database lives: the configured path or the data directory
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => config::data_path(DEFAULT_DATABASE_FILE)
                .context("Could not determine data directory"),
        }
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingField(field))
}

fn number(value: Option<NumberOrText>, field: &'static str, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(NumberOrText::Number(n)) => Ok(n),
        Some(NumberOrText::Text(s)) => s.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field,
            reason: format!("expected a whole number, got {:?}", s),
        }),
    }
}

fn minutes(value: Option<NumberOrText>, field: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let minutes = number(value, field, default)?;
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::InvalidValue {
            field,
            reason: format!("{} minutes is out of range", minutes),
        })
}

/// Parse a code point given as `"0x1F501"` or as a decimal number
fn marker(value: Option<NumberOrText>, field: &'static str, default: char) -> Result<char, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue { field, reason };

    let code = match value {
        None => return Ok(default),
        Some(NumberOrText::Number(n)) => n,
        Some(NumberOrText::Text(s)) => {
            let s = s.trim();
            let parsed = match s.get(..2) {
                Some(prefix) if prefix.eq_ignore_ascii_case("0x") => u64::from_str_radix(&s[2..], 16),
                _ => s.parse(),
            };
            parsed.map_err(|_| invalid(format!("{:?} is not a code point", s)))?
        }
    };

    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| invalid(format!("{:#X} is not a valid character", code)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MINIMAL: &str = r#"{
        "twitter_username": "nasa",
        "twitter_apikey": "key",
        "twitter_api_secret": "secret",
        "telegram_channel": "@nasa_feed",
        "telegram_bot_apikey": "123:abc"
    }"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = RelayConfig::from_json(MINIMAL).unwrap();

        assert_eq!(cfg.twitter_username, "nasa");
        assert_eq!(cfg.telegram_channel, "nasa_feed");
        assert_eq!(cfg.welcome_text, "Hi! Join @nasa_feed");
        assert_eq!(cfg.max_rollback, 50);
        assert_eq!(cfg.rate_limit_wait, Duration::from_secs(900));
        assert_eq!(cfg.seek_rate, Duration::from_secs(60));
        assert_eq!(cfg.send_delay, Duration::from_secs(3));
        assert_eq!(cfg.repost_marker, '\u{1F501}');
        assert_eq!(cfg.reply_marker, '\u{21AA}');
        assert_eq!(cfg.database_path, None);
    }

    #[test]
    fn test_optional_fields() {
        let json = r#"{
            "twitter_username": "nasa",
            "twitter_apikey": "key",
            "twitter_api_secret": "secret",
            "telegram_channel": "nasa_feed",
            "telegram_bot_apikey": "123:abc",
            "welcome_text": "Welcome aboard",
            "max_rollback": 10,
            "ratelimit_wait": "5",
            "seek_rate": 2,
            "send_delay": 0,
            "retweet_emoji": "0x1F504",
            "reply_emoji": 9166,
            "database_path": "/tmp/relay.sqlite"
        }"#;

        let cfg = RelayConfig::from_json(json).unwrap();
        assert_eq!(cfg.welcome_text, "Welcome aboard");
        assert_eq!(cfg.max_rollback, 10);
        assert_eq!(cfg.rate_limit_wait, Duration::from_secs(300));
        assert_eq!(cfg.seek_rate, Duration::from_secs(120));
        assert_eq!(cfg.send_delay, Duration::ZERO);
        assert_eq!(cfg.repost_marker, '\u{1F504}');
        assert_eq!(cfg.reply_marker, '\u{23CE}');
        assert_eq!(
            cfg.resolved_database_path().unwrap(),
            PathBuf::from("/tmp/relay.sqlite")
        );
    }

    #[test]
    fn test_missing_field_is_named() {
        let json = r#"{
            "twitter_username": "nasa",
            "twitter_apikey": "key",
            "telegram_channel": "nasa_feed",
            "telegram_bot_apikey": "123:abc"
        }"#;

        let err = RelayConfig::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("twitter_api_secret")));
        assert_eq!(err.to_string(), "'twitter_api_secret' not present in config");
    }

    #[test]
    fn test_invalid_values() {
        let bad_emoji = MINIMAL.replace(
            r#""telegram_bot_apikey": "123:abc""#,
            r#""telegram_bot_apikey": "123:abc", "retweet_emoji": "0xZZ""#,
        );
        assert!(matches!(
            RelayConfig::from_json(&bad_emoji),
            Err(ConfigError::InvalidValue { field: "retweet_emoji", .. })
        ));

        let surrogate = MINIMAL.replace(
            r#""telegram_bot_apikey": "123:abc""#,
            r#""telegram_bot_apikey": "123:abc", "reply_emoji": "0xD800""#,
        );
        assert!(matches!(
            RelayConfig::from_json(&surrogate),
            Err(ConfigError::InvalidValue { field: "reply_emoji", .. })
        ));

        let bad_number = MINIMAL.replace(
            r#""telegram_bot_apikey": "123:abc""#,
            r#""telegram_bot_apikey": "123:abc", "seek_rate": "soon""#,
        );
        assert!(matches!(
            RelayConfig::from_json(&bad_number),
            Err(ConfigError::InvalidValue { field: "seek_rate", .. })
        ));
    }

    #[test]
    fn test_minutes_out_of_range() {
        let huge_wait = MINIMAL.replace(
            r#""telegram_bot_apikey": "123:abc""#,
            r#""telegram_bot_apikey": "123:abc", "ratelimit_wait": 18446744073709551615"#,
        );
        assert!(matches!(
            RelayConfig::from_json(&huge_wait),
            Err(ConfigError::InvalidValue { field: "ratelimit_wait", .. })
        ));

        let huge_seek = MINIMAL.replace(
            r#""telegram_bot_apikey": "123:abc""#,
            r#""telegram_bot_apikey": "123:abc", "seek_rate": "307445734561825861""#,
        );
        assert!(matches!(
            RelayConfig::from_json(&huge_seek),
            Err(ConfigError::InvalidValue { field: "seek_rate", .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, MINIMAL).unwrap();

        let cfg = RelayConfig::load(&path).unwrap();
        assert_eq!(cfg.twitter_username, "nasa");

        let missing = RelayConfig::load(&dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigError::Load { .. })));
    }
}
