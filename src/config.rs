use anyhow::{anyhow, Result};
use std::env;
use std::ffi::OsString;

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
pub const MODEL_VAR: &str = "TUTOR_RELAY_MODEL";

pub const DEFAULT_API: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Turns the raw process arguments (program name already skipped) into the
/// message words. Every word is kept as-is, including `--` and flag-like
/// words; bytes that are not valid UTF-8 are replaced rather than rejected.
pub fn message_words<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

/// Settings for the completion endpoint, taken from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    // The API endpoint base URL
    pub api: String,

    pub api_key: String,

    pub model_id: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable lookup. The credential is the only
    /// required value; an empty one counts as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("{} environment variable is not set.", API_KEY_VAR))?;

        let api = lookup(BASE_URL_VAR)
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_API.to_string());

        let model_id = lookup(MODEL_VAR)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(Config {
            api,
            api_key,
            model_id,
        })
    }
}
