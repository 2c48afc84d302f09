use std::env;

use helia_core::{Error, Persona, Result};

pub const DEFAULT_USER_ID: &str = "local-user";
pub const DEFAULT_BOT: &str = "helia-sunbeam";
pub const DEFAULT_CREDITS: i64 = 10;

/// How log lines are written to stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Settings of the terminal chat, read from `HELIA_*` variables
///
/// Gemini settings are read separately by
/// [`GeminiConfig`](helia_core::provider::gemini::GeminiConfig).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Identity of the locally signed-in user
    pub user_id: String,
    /// Bot id, one of the catalog entries
    pub bot: String,
    /// Starting balance of the local account
    pub credits: i64,
    pub subscribed: bool,
    pub log_format: LogFormat,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.to_string(),
            bot: DEFAULT_BOT.to_string(),
            credits: DEFAULT_CREDITS,
            subscribed: false,
            log_format: LogFormat::default(),
        }
    }
}

impl RuntimeConfig {
    /// Reads the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through `lookup`; missing or blank values fall back to
    /// the defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let bot = get("HELIA_BOT").unwrap_or(defaults.bot);
        Persona::find(&bot)?;

        let credits = match get("HELIA_CREDITS") {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                Error::Configuration(format!("HELIA_CREDITS must be a whole number, got {raw:?}"))
            })?,
            None => defaults.credits,
        };

        let subscribed = match get("HELIA_SUBSCRIBED") {
            Some(raw) => parse_flag("HELIA_SUBSCRIBED", &raw)?,
            None => defaults.subscribed,
        };

        let log_format = match get("HELIA_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(Error::Configuration(format!(
                    "HELIA_LOG_FORMAT must be \"pretty\" or \"json\", got {other:?}"
                )));
            }
        };

        Ok(Self {
            user_id: get("HELIA_USER_ID").unwrap_or(defaults.user_id),
            bot,
            credits,
            subscribed,
            log_format,
        })
    }
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Configuration(format!(
            "{key} must be true or false, got {raw:?}"
        ))),
    }
}
