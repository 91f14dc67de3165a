//! Server configuration.

use std::time::Duration;

use buzzline_game::RoundSettings;
use serde::{Deserialize, Serialize};

use crate::BuzzlineError;

/// Bind address for the WebSocket listener.
pub const ENV_BIND: &str = "BUZZLINE_BIND";
/// Reading time of new lobbies, in whole seconds.
pub const ENV_READING_SECS: &str = "BUZZLINE_READING_SECS";
/// Answer time of new lobbies, in whole seconds.
pub const ENV_ANSWER_SECS: &str = "BUZZLINE_ANSWER_SECS";

/// Settings for one server process.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `bind_addr` | `127.0.0.1:8080` |
/// | `round.reading_time` | 5 s |
/// | `round.answer_time` | 30 s |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Round timing for lobbies created by this server.
    pub round: RoundSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            round: RoundSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `BUZZLINE_*` environment variables.
    pub fn from_env() -> Result<Self, BuzzlineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BuzzlineError> {
        let mut config = Self::default();
        if let Some(addr) = lookup(ENV_BIND) {
            config.bind_addr = addr;
        }
        if let Some(secs) = lookup(ENV_READING_SECS) {
            config.round.reading_time = parse_secs(ENV_READING_SECS, &secs)?;
        }
        if let Some(secs) = lookup(ENV_ANSWER_SECS) {
            config.round.answer_time = parse_secs(ENV_ANSWER_SECS, &secs)?;
        }
        config
            .round
            .validate()
            .map_err(|e| BuzzlineError::Config(format!("{ENV_READING_SECS}/{ENV_ANSWER_SECS}: {e}")))?;
        Ok(config)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, BuzzlineError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| BuzzlineError::Config(format!("{key}={value:?}: {e}")))
}
