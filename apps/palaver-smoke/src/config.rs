//! Environment-backed runtime configuration for the smoke app.

use std::{env, error::Error, fmt};

use palaver_core::DEFAULT_PAGE_SIZE;

const DEFAULT_CHAT_ID: &str = "demo-chat";
const DEFAULT_SELF_USER_ID: &str = "ada";
const DEFAULT_PEER_USER_ID: &str = "grace";

/// Runtime configuration used by the smoke script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
    /// Conversation id the script joins.
    pub chat_id: String,
    /// Local participant id.
    pub self_user_id: String,
    /// Scripted peer id.
    pub peer_user_id: String,
    /// Server batch size fed to the engine.
    pub page_size: usize,
}

impl SmokeConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let chat_id = trimmed_or_default("PALAVER_CHAT_ID", DEFAULT_CHAT_ID, &mut lookup);
        let self_user_id =
            trimmed_or_default("PALAVER_SELF_USER_ID", DEFAULT_SELF_USER_ID, &mut lookup);
        let peer_user_id =
            trimmed_or_default("PALAVER_PEER_USER_ID", DEFAULT_PEER_USER_ID, &mut lookup);
        let page_size = parse_optional_usize("PALAVER_PAGE_SIZE", DEFAULT_PAGE_SIZE, &mut lookup)?;

        if page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PALAVER_PAGE_SIZE",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if self_user_id == peer_user_id {
            return Err(ConfigError::InvalidValue {
                key: "PALAVER_PEER_USER_ID",
                value: peer_user_id,
                reason: "peer must differ from the local user".to_owned(),
            });
        }

        Ok(Self {
            chat_id,
            self_user_id,
            peer_user_id,
            page_size,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn trimmed_or_default<F>(key: &'static str, default: &str, lookup: &mut F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn parse_optional_usize<F>(
    key: &'static str,
    default: usize,
    lookup: &mut F,
) -> Result<usize, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<usize>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}
