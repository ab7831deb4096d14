//! Typed configuration loader: TOML file plus environment overrides.
//!
//! Load order: defaults → optional TOML file → environment variables.
//! Environment always wins, so deployments can keep a checked-in base file
//! and override secrets (`DATABASE_URL`, `BOT_TOKEN`) per host.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Postgres connection string. Absent means the caller wires an
    /// in-memory store (development / tests).
    pub database_url: Option<String>,

    /// Bind address of the REST API backend.
    pub api_bind_addr: String,

    /// Bind address of the bot backend's HTTP surface.
    pub bot_bind_addr: String,

    /// Base URL the API backend uses to reach the bot backend.
    pub bot_backend_url: String,

    /// Telegram bot token. Only required by the bot backend.
    pub bot_token: Option<String>,

    /// Bot handle used to build referral and activation deep links.
    pub bot_username: String,

    /// Mini-App URL attached to the bot's welcome button, if any.
    pub webapp_url: Option<String>,

    /// Telegram ids allowed to call admin operations. A set, not a single
    /// principal.
    pub admin_ids: Vec<i64>,

    /// Business minimum for withdrawal requests, in stars.
    pub min_withdrawal: i64,

    /// Referral bonus as an integer percentage of the task reward.
    pub referral_bonus_percent: u32,

    /// Timeout for outbound verification calls, in milliseconds. Timeouts
    /// count as "not verified".
    pub verify_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: None,
            api_bind_addr: "127.0.0.1:3000".to_string(),
            bot_bind_addr: "127.0.0.1:3001".to_string(),
            bot_backend_url: "http://localhost:3001".to_string(),
            bot_token: None,
            bot_username: "StardropBot".to_string(),
            webapp_url: None,
            admin_ids: Vec::new(),
            min_withdrawal: 100,
            referral_bonus_percent: 5,
            verify_timeout_ms: 5000,
        }
    }
}

/// Load config from a TOML file path. Missing file or parse failure is an
/// error; use [`Config::load`] for the lenient combined path.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path.as_ref())?;
    let cfg: Config = toml::from_str(&s)?;
    Ok(cfg)
}

impl Config {
    /// Defaults, overlaid with `stardrop.toml` (or `$STARDROP_CONFIG`) when
    /// present, overlaid with environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("STARDROP_CONFIG").unwrap_or_else(|_| "stardrop.toml".to_string());
        let mut cfg = if Path::new(&path).exists() {
            load_from_file(&path)?
        } else {
            Config::default()
        };
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Overlay recognized environment variables onto `self`.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.database_url = Some(v);
        }
        if let Ok(v) = std::env::var("API_BIND_ADDR") {
            self.api_bind_addr = v;
        }
        if let Ok(v) = std::env::var("BOT_BIND_ADDR") {
            self.bot_bind_addr = v;
        }
        if let Ok(v) = std::env::var("BOT_BACKEND_URL") {
            self.bot_backend_url = v;
        }
        if let Ok(v) = std::env::var("BOT_TOKEN") {
            self.bot_token = Some(v);
        }
        if let Ok(v) = std::env::var("BOT_USERNAME") {
            self.bot_username = v;
        }
        if let Ok(v) = std::env::var("WEBAPP_URL") {
            self.webapp_url = Some(v);
        }
        if let Ok(v) = std::env::var("ADMIN_IDS") {
            self.admin_ids = parse_id_list("ADMIN_IDS", &v)?;
        }
        if let Ok(v) = std::env::var("MIN_WITHDRAWAL") {
            self.min_withdrawal = parse_num("MIN_WITHDRAWAL", &v)?;
        }
        if let Ok(v) = std::env::var("REFERRAL_BONUS_PERCENT") {
            self.referral_bonus_percent = parse_num("REFERRAL_BONUS_PERCENT", &v)?;
        }
        if let Ok(v) = std::env::var("VERIFY_TIMEOUT_MS") {
            self.verify_timeout_ms = parse_num("VERIFY_TIMEOUT_MS", &v)?;
        }
        Ok(())
    }

    /// Whether the given Telegram id is an authorized admin principal.
    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.admin_ids.contains(&telegram_id)
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_id_list(key: &str, value: &str) -> Result<Vec<i64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_num(key, s))
        .collect()
}
