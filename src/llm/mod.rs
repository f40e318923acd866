//! LLM integration — the Anthropic Messages API over reqwest.
//!
//! The language-understanding capability is the one required external
//! service: it backs contact parsing, business card reading, and dossier
//! synthesis. Everything downstream talks to the `LlmProvider` trait so
//! tests can substitute mocks.

pub mod anthropic;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use provider::*;

use std::sync::Arc;

use secrecy::SecretString;

/// Create the Anthropic-backed provider.
pub fn create_provider(
    api_key: SecretString,
    model: &str,
    client: reqwest::Client,
) -> Arc<dyn LlmProvider> {
    tracing::info!("Using Anthropic (model: {})", model);
    Arc::new(AnthropicProvider::new(api_key, model, client))
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
pub(crate) fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in a markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Try to find object bounds
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}
