use std::{net::SocketAddr, str::FromStr};

use crate::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Shared secret that turns a login into the master login.
    pub master_code: String,
    pub chat_log_limit: i64,
    pub dice_history_limit: i64,
    pub channel_buffer: usize,
    pub session_idle_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite://rpgsession.db".to_owned(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            master_code: "master123".to_owned(),
            chat_log_limit: 100,
            dice_history_limit: 3,
            channel_buffer: 256,
            session_idle_minutes: 60,
        }
    }
}

impl Config {
    /// Reads the process environment, after loading `.env` if one is present.
    pub fn from_env() -> AppResult<Config> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Config> {
        let defaults = Config::default();

        let config = Config {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_addr: parsed(&lookup, "BIND_ADDR", defaults.bind_addr)?,
            master_code: lookup("MASTER_CODE").unwrap_or(defaults.master_code),
            chat_log_limit: parsed(&lookup, "CHAT_LOG_LIMIT", defaults.chat_log_limit)?,
            dice_history_limit: parsed(&lookup, "DICE_HISTORY_LIMIT", defaults.dice_history_limit)?,
            channel_buffer: parsed(&lookup, "CHANNEL_BUFFER", defaults.channel_buffer)?,
            session_idle_minutes: parsed(&lookup, "SESSION_IDLE_MINUTES", defaults.session_idle_minutes)?,
        };

        at_least_one("CHANNEL_BUFFER", i64::try_from(config.channel_buffer).unwrap_or(i64::MAX))?;
        at_least_one("CHAT_LOG_LIMIT", config.chat_log_limit)?;
        at_least_one("DICE_HISTORY_LIMIT", config.dice_history_limit)?;
        Ok(config)
    }

    /// In-memory store and an ephemeral port.
    pub fn ephemeral() -> Config {
        Config {
            database_url: "sqlite::memory:".to_owned(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..Config::default()
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> AppResult<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Validation(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}

// A zero-capacity channel panics and SQLite reads a negative LIMIT as unbounded.
fn at_least_one(key: &str, value: i64) -> AppResult<()> {
    if value < 1 {
        return Err(AppError::Validation(format!("{key} must be at least 1, got {value}")));
    }
    Ok(())
}
