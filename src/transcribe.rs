//! Voice transcription adapters.
//!
//! `WhisperTranscriber` posts audio to the OpenAI transcription endpoint.
//! When no OpenAI key is configured the pipeline is wired with
//! `UnavailableTranscriber`, whose `MissingCapability` result the
//! orchestrator turns into a degraded draft instead of an abort.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};

use crate::error::CaptureError;

const TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const TRANSCRIPTION_MODEL: &str = "whisper-1";

/// Voice-to-text capability.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, CaptureError>;
}

/// OpenAI Whisper-backed transcriber.
pub struct WhisperTranscriber {
    api_key: SecretString,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(api_key: SecretString, client: reqwest::Client) -> Self {
        Self { api_key, client }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, CaptureError> {
        let part = Part::bytes(audio.to_vec())
            .file_name("voice.ogg")
            .mime_str("audio/ogg")
            .map_err(|e| CaptureError::Transcription(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("model", TRANSCRIPTION_MODEL);

        let resp = self
            .client
            .post(TRANSCRIPTION_URL)
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| CaptureError::Transcription(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(CaptureError::Transcription(format!(
                "{status}: {}",
                err.chars().take(200).collect::<String>()
            )));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CaptureError::Transcription(e.to_string()))?;

        parse_transcription_response(&data)
    }
}

/// Sentinel for the unconfigured voice capability.
pub struct UnavailableTranscriber;

#[async_trait]
impl Transcriber for UnavailableTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String, CaptureError> {
        Err(CaptureError::MissingCapability("voice"))
    }
}

fn parse_transcription_response(data: &serde_json::Value) -> Result<String, CaptureError> {
    let text = data
        .get("text")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| CaptureError::Transcription("no text field in response".into()))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(CaptureError::Transcription("empty transcript".into()));
    }
    Ok(text.to_string())
}
