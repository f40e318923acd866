//! Anthropic Messages API provider.

use async_trait::async_trait;
use base64::Engine;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::{ExposeSecret, SecretString};

use crate::error::LlmError;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role, VisionRequest,
};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Fallback max_tokens when a request doesn't set one.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API provider — used for contact parsing, business card
/// reading, and dossier synthesis.
pub struct AnthropicProvider {
    api_key: SecretString,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: SecretString, model: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            api_key,
            model: model.into(),
            client,
        }
    }

    async fn post(&self, body: serde_json::Value) -> Result<CompletionResponse, LlmError> {
        let resp = self
            .client
            .post(API_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: "anthropic".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::AuthFailed {
                provider: "anthropic".into(),
            });
        }
        if !status.is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                provider: "anthropic".into(),
                reason: format!("{status}: {}", err.chars().take(200).collect::<String>()),
            });
        }

        let data: serde_json::Value = resp.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: "anthropic".into(),
            reason: e.to_string(),
        })?;

        parse_response(&data)
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        model_rates(&self.model)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.post(completion_body(&self.model, &request)).await
    }

    async fn complete_vision(
        &self,
        request: VisionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.post(vision_body(&self.model, &request)).await
    }
}

/// Per-token (input, output) USD rates by model family.
fn model_rates(model: &str) -> (Decimal, Decimal) {
    if model.contains("haiku") {
        (dec!(0.0000008), dec!(0.000004))
    } else if model.contains("opus") {
        (dec!(0.000015), dec!(0.000075))
    } else {
        // sonnet and anything unrecognized
        (dec!(0.000003), dec!(0.000015))
    }
}

/// Build a Messages API body from a completion request.
///
/// System messages go into the top-level `system` field; the rest keep
/// their order in `messages`.
fn completion_body(model: &str, request: &CompletionRequest) -> serde_json::Value {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let messages: Vec<serde_json::Value> = request
        .messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| {
            serde_json::json!({
                "role": match m.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                },
                "content": m.content,
            })
        })
        .collect();

    let mut body = serde_json::json!({
        "model": model,
        "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": messages,
    });
    if !system.is_empty() {
        body["system"] = serde_json::Value::String(system.join("\n\n"));
    }
    if let Some(t) = request.temperature {
        body["temperature"] = serde_json::json!(t);
    }
    body
}

/// Build a Messages API body carrying one base64 image block plus a prompt.
fn vision_body(model: &str, request: &VisionRequest) -> serde_json::Value {
    let image_data = base64::engine::general_purpose::STANDARD.encode(&request.image);
    serde_json::json!({
        "model": model,
        "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": [{
            "role": "user",
            "content": [
                {
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": request.media_type,
                        "data": image_data,
                    },
                },
                { "type": "text", "text": request.prompt },
            ],
        }],
    })
}

/// Parse a Messages API response into a `CompletionResponse`.
fn parse_response(data: &serde_json::Value) -> Result<CompletionResponse, LlmError> {
    let content = data
        .get("content")
        .and_then(serde_json::Value::as_array)
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b.get("type").and_then(serde_json::Value::as_str) == Some("text"))
        })
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: "anthropic".into(),
            reason: "no text content block in response".into(),
        })?;

    let usage = data.get("usage");
    let input_tokens = usage
        .and_then(|u| u.get("input_tokens"))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0) as u32;
    let output_tokens = usage
        .and_then(|u| u.get("output_tokens"))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0) as u32;

    let finish_reason = match data.get("stop_reason").and_then(serde_json::Value::as_str) {
        Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::MaxTokens,
        _ => FinishReason::Other,
    };

    Ok(CompletionResponse {
        content: content.to_string(),
        input_tokens,
        output_tokens,
        finish_reason,
    })
}
