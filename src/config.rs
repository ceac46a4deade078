//! Startup configuration loaded from the environment.
//!
//! All credentials are required; missing variables abort startup with a
//! named diagnostic instead of proceeding with null clients.

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Vision model used when `VISION_MODEL` is not set.
pub const DEFAULT_VISION_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// Upper bound on a single vision-extraction call. Without it the workflow
/// would block indefinitely on a stalled upstream service.
pub const DEFAULT_VISION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub database_url: String,
    pub groq_api_key: String,
    pub vision_model: String,
    pub vision_timeout: Duration,
}

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        let timeout_secs = match env::var("VISION_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("VISION_TIMEOUT_SECS is not a number: {raw}"))?,
            Err(_) => DEFAULT_VISION_TIMEOUT_SECS,
        };

        Ok(Self {
            telegram_bot_token: require("TELEGRAM_BOT_TOKEN")?,
            database_url: require("DATABASE_URL")?,
            groq_api_key: require("GROQ_API_KEY")?,
            vision_model: env::var("VISION_MODEL")
                .unwrap_or_else(|_| DEFAULT_VISION_MODEL.to_string()),
            vision_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn require(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_missing_variable_names_the_key() {
        let err = require("RECEIPTS_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(err.to_string().contains("RECEIPTS_TEST_UNSET_VARIABLE"));
        assert!(err.to_string().contains("must be set"));
    }

    #[test]
    fn test_default_timeout_is_bounded() {
        assert!(DEFAULT_VISION_TIMEOUT_SECS > 0);
        assert!(DEFAULT_VISION_TIMEOUT_SECS <= 300);
    }

    #[test]
    fn test_default_model_is_vision_capable() {
        assert!(!DEFAULT_VISION_MODEL.is_empty());
        assert!(DEFAULT_VISION_MODEL.contains('/'));
    }
}
