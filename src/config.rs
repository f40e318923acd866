//! Runtime configuration — environment-driven capability toggles.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default model for parsing, card reading, and dossier synthesis.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Default local database path.
pub const DEFAULT_DB_PATH: &str = "./data/contacts.db";

/// Timeout applied to every outbound provider request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Capture tool configuration.
///
/// Required keys are a fatal startup error when absent. Each optional key
/// enables one pipeline stage; absence means that stage is skipped with a
/// sentinel implementation, never a per-message failure.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Anthropic API key — parsing, vision, and synthesis. Required.
    pub anthropic_api_key: SecretString,
    /// Model ID used for all Anthropic calls.
    pub model: String,
    /// Telegram bot token. Required.
    pub telegram_bot_token: SecretString,
    /// Restrict processing to this chat ID. `None` accepts any chat.
    pub allowed_chat: Option<String>,
    /// Local database path.
    pub db_path: String,
    /// OpenAI API key — enables voice note transcription.
    pub openai_api_key: Option<SecretString>,
    /// Apollo API key — enables contact enrichment.
    pub apollo_api_key: Option<SecretString>,
    /// Exa API key — enables web research for the dossier.
    pub exa_api_key: Option<SecretString>,
}

impl CaptureConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let anthropic_api_key = required_env(
            "ANTHROPIC_API_KEY",
            "Get one at https://console.anthropic.com and export ANTHROPIC_API_KEY=sk-ant-...",
        )?;
        let telegram_bot_token = required_env(
            "TELEGRAM_BOT_TOKEN",
            "Create a bot with @BotFather and export TELEGRAM_BOT_TOKEN=123:ABC...",
        )?;

        Ok(Self {
            anthropic_api_key: SecretString::from(anthropic_api_key),
            model: optional_env("CONTACT_CAPTURE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            telegram_bot_token: SecretString::from(telegram_bot_token),
            allowed_chat: optional_env("TELEGRAM_CHAT_ID"),
            db_path: optional_env("CONTACT_CAPTURE_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            openai_api_key: optional_env("OPENAI_API_KEY").map(SecretString::from),
            apollo_api_key: optional_env("APOLLO_API_KEY").map(SecretString::from),
            exa_api_key: optional_env("EXA_API_KEY").map(SecretString::from),
        })
    }

    /// One-line summary of which optional capabilities are enabled.
    pub fn capability_summary(&self) -> String {
        format!(
            "transcription: {}, enrichment: {}, research: {}",
            on_off(self.openai_api_key.is_some()),
            on_off(self.apollo_api_key.is_some()),
            on_off(self.exa_api_key.is_some()),
        )
    }
}

fn required_env(key: &str, hint: &str) -> Result<String, ConfigError> {
    match optional_env(key) {
        Some(value) => Ok(value),
        None => Err(ConfigError::MissingRequired {
            key: key.to_string(),
            hint: hint.to_string(),
        }),
    }
}

/// Read an environment variable, treating empty/whitespace values as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CaptureConfig {
        CaptureConfig {
            anthropic_api_key: SecretString::from("sk-ant-test"),
            model: DEFAULT_MODEL.to_string(),
            telegram_bot_token: SecretString::from("123:ABC"),
            allowed_chat: None,
            db_path: DEFAULT_DB_PATH.to_string(),
            openai_api_key: None,
            apollo_api_key: None,
            exa_api_key: None,
        }
    }

    #[test]
    fn capability_summary_all_off() {
        let config = test_config();
        assert_eq!(
            config.capability_summary(),
            "transcription: off, enrichment: off, research: off"
        );
    }

    #[test]
    fn capability_summary_mixed() {
        let config = CaptureConfig {
            openai_api_key: Some(SecretString::from("sk-test")),
            exa_api_key: Some(SecretString::from("exa-test")),
            ..test_config()
        };
        assert_eq!(
            config.capability_summary(),
            "transcription: on, enrichment: off, research: on"
        );
    }
}
