//! Telegram transport — batch-polls the Bot API for updates.
//!
//! One `fetch_batch` call retrieves everything pending, downloads any
//! media payloads, and classifies each update into an `InboundMessage`.
//! The runner confirms the batch offset after processing so updates are
//! not re-delivered; the store's idempotency covers accidental re-runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::error::TransportError;
use crate::pipeline::types::{InboundMessage, Notify};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Reply for /start and /help.
const HELP_TEXT: &str = "*Contact Capture*\n\n\
    Send me any of these:\n\
    - A *text message* about someone you met\n\
    - A *voice note* describing the person\n\
    - A *photo of a business card*\n\n\
    I'll research them and file an enriched contact record.\n\n\
    _Example: Just met Joe Blogs from Kellogg's, VP Marketing. \
    Talked about their digital transformation program._";

/// One fetched batch of pending updates.
#[derive(Debug, Default)]
pub struct UpdateBatch {
    pub messages: Vec<InboundMessage>,
    /// Highest update_id seen, for offset confirmation.
    pub last_update_id: Option<i64>,
}

/// Telegram transport — connects to the Bot API.
pub struct TelegramTransport {
    bot_token: SecretString,
    /// Restrict processing to this chat. `None` accepts any chat.
    allowed_chat: Option<String>,
    client: reqwest::Client,
}

impl TelegramTransport {
    pub fn new(
        bot_token: SecretString,
        allowed_chat: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            bot_token,
            allowed_chat,
            client,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "https://api.telegram.org/file/bot{}/{file_path}",
            self.bot_token.expose_secret()
        )
    }

    /// Check whether a chat is allowed to use the bot.
    pub fn is_chat_allowed(&self, chat_id: &str) -> bool {
        match &self.allowed_chat {
            Some(allowed) => allowed == chat_id,
            None => true,
        }
    }

    /// Fetch all pending updates and classify them into inbound messages.
    ///
    /// Media payloads are downloaded here so the pipeline never touches
    /// the Bot API. Service updates (joins, edits) and unauthorized chats
    /// are skipped; `/start` and `/help` are answered immediately.
    pub async fn fetch_batch(&self) -> Result<UpdateBatch, TransportError> {
        let resp = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[("timeout", "0")])
            .send()
            .await
            .map_err(|e| TransportError::PollFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(TransportError::PollFailed(format!(
                "getUpdates returned {}",
                resp.status()
            )));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| TransportError::PollFailed(e.to_string()))?;

        let updates = data
            .get("result")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut batch = UpdateBatch::default();

        for update in &updates {
            if let Some(update_id) = update.get("update_id").and_then(serde_json::Value::as_i64) {
                batch.last_update_id = Some(
                    batch
                        .last_update_id
                        .map_or(update_id, |prev| prev.max(update_id)),
                );
            }

            let Some(message) = update.get("message") else {
                continue;
            };
            let Some(chat_id) = message
                .get("chat")
                .and_then(|c| c.get("id"))
                .and_then(serde_json::Value::as_i64)
                .map(|id| id.to_string())
            else {
                continue;
            };

            if !self.is_chat_allowed(&chat_id) {
                tracing::warn!(chat_id = %chat_id, "Ignoring message from unauthorized chat");
                continue;
            }
            if self.allowed_chat.is_none() {
                tracing::info!(
                    chat_id = %chat_id,
                    "No TELEGRAM_CHAT_ID configured — set it to this value to lock the bot down"
                );
            }

            let source_id = update
                .get("update_id")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or_default()
                .to_string();
            let received_at = message
                .get("date")
                .and_then(serde_json::Value::as_i64)
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .unwrap_or_else(Utc::now);

            match classify_message(message) {
                MessageClass::Command(command) => {
                    if command == "/start" || command == "/help" {
                        if let Err(e) = self.send_message(&chat_id, HELP_TEXT).await {
                            tracing::warn!(error = %e, "Failed to send help message");
                        }
                    }
                }
                MessageClass::Text(body) => {
                    batch.messages.push(InboundMessage {
                        source_id,
                        chat_id,
                        kind: "text".into(),
                        payload: body.into_bytes(),
                        caption: None,
                        received_at,
                    });
                }
                MessageClass::Voice { file_id } => match self.download_file(&file_id).await {
                    Ok(payload) => batch.messages.push(InboundMessage {
                        source_id,
                        chat_id,
                        kind: "voice".into(),
                        payload,
                        caption: None,
                        received_at,
                    }),
                    Err(e) => self.report_download_failure(&chat_id, &e).await,
                },
                MessageClass::Photo { file_id, caption } => {
                    match self.download_file(&file_id).await {
                        Ok(payload) => batch.messages.push(InboundMessage {
                            source_id,
                            chat_id,
                            kind: "photo".into(),
                            payload,
                            caption,
                            received_at,
                        }),
                        Err(e) => self.report_download_failure(&chat_id, &e).await,
                    }
                }
                MessageClass::Unsupported(kind) => {
                    // Forward with the native tag; the pipeline rejects it
                    // and the user gets a proper failure notification.
                    batch.messages.push(InboundMessage {
                        source_id,
                        chat_id,
                        kind,
                        payload: Vec::new(),
                        caption: None,
                        received_at,
                    });
                }
                MessageClass::Empty => {}
            }
        }

        tracing::info!(
            updates = updates.len(),
            messages = batch.messages.len(),
            "Fetched pending updates"
        );
        Ok(batch)
    }

    async fn report_download_failure(&self, chat_id: &str, error: &TransportError) {
        tracing::warn!(error = %error, "Media download failed — message skipped");
        let _ = self
            .send_message(chat_id, "Couldn't download that file from Telegram. Please resend it.")
            .await;
    }

    /// Confirm updates up to and including `last_update_id` so they are
    /// not delivered again on the next run.
    pub async fn confirm_up_to(&self, last_update_id: i64) -> Result<(), TransportError> {
        self.client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", (last_update_id + 1).to_string()),
                ("timeout", "0".to_string()),
            ])
            .send()
            .await
            .map_err(|e| TransportError::PollFailed(e.to_string()))?;
        Ok(())
    }

    /// Download any Telegram file by file_id.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TransportError> {
        let resp = self
            .client
            .get(self.api_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await
            .map_err(|e| TransportError::DownloadFailed {
                file_id: file_id.to_string(),
                reason: e.to_string(),
            })?;

        let data: serde_json::Value =
            resp.json().await.map_err(|e| TransportError::DownloadFailed {
                file_id: file_id.to_string(),
                reason: e.to_string(),
            })?;

        let file_path = data
            .get("result")
            .and_then(|r| r.get("file_path"))
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| TransportError::DownloadFailed {
                file_id: file_id.to_string(),
                reason: "no file_path in getFile response".into(),
            })?;

        let file_resp = self
            .client
            .get(self.file_url(file_path))
            .send()
            .await
            .map_err(|e| TransportError::DownloadFailed {
                file_id: file_id.to_string(),
                reason: e.to_string(),
            })?;

        if !file_resp.status().is_success() {
            return Err(TransportError::DownloadFailed {
                file_id: file_id.to_string(),
                reason: format!("file fetch returned {}", file_resp.status()),
            });
        }

        file_resp
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| TransportError::DownloadFailed {
                file_id: file_id.to_string(),
                reason: e.to_string(),
            })
    }

    /// Send a text message, trying Markdown first with plain text fallback.
    /// Splits long messages that exceed Telegram's 4096 char limit.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_message_chunk(chat_id, &chunk).await?;
        }
        Ok(())
    }

    async fn send_message_chunk(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        let markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown"
        });

        let markdown_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&markdown_body)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        if markdown_resp.status().is_success() {
            return Ok(());
        }

        let markdown_status = markdown_resp.status();
        tracing::warn!(
            status = ?markdown_status,
            "sendMessage with Markdown failed; retrying without parse_mode"
        );

        let plain_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        let plain_resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&plain_body)
            .send()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        if !plain_resp.status().is_success() {
            let plain_err = plain_resp.text().await.unwrap_or_default();
            return Err(TransportError::SendFailed(format!(
                "sendMessage failed (markdown: {markdown_status}, plain: {plain_err})"
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Notify for TelegramTransport {
    async fn notify(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        self.send_message(chat_id, text).await
    }
}

// ── Update classification ───────────────────────────────────────────

/// What one Telegram message contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageClass {
    /// Bot command ("/start", "/help", ...).
    Command(String),
    Text(String),
    Voice {
        file_id: String,
    },
    Photo {
        file_id: String,
        caption: Option<String>,
    },
    /// Media the pipeline doesn't handle, tagged with its native name.
    Unsupported(String),
    /// Nothing processable (service messages, join notifications).
    Empty,
}

/// Classify one message object from a Telegram update.
pub fn classify_message(message: &serde_json::Value) -> MessageClass {
    // Photo: Telegram sends multiple sizes, the last is the largest
    if let Some(photos) = message.get("photo").and_then(serde_json::Value::as_array)
        && let Some(best) = photos.last()
        && let Some(file_id) = best.get("file_id").and_then(serde_json::Value::as_str)
    {
        let caption = message
            .get("caption")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from);
        return MessageClass::Photo {
            file_id: file_id.to_string(),
            caption,
        };
    }

    // Voice note or audio file
    if let Some(voice) = message.get("voice").or_else(|| message.get("audio"))
        && let Some(file_id) = voice.get("file_id").and_then(serde_json::Value::as_str)
    {
        return MessageClass::Voice {
            file_id: file_id.to_string(),
        };
    }

    if let Some(text) = message.get("text").and_then(serde_json::Value::as_str) {
        if text.starts_with('/') {
            return MessageClass::Command(text.trim().to_string());
        }
        return MessageClass::Text(text.to_string());
    }

    for tag in ["document", "sticker", "video", "video_note", "animation", "location", "contact"] {
        if message.get(tag).is_some() {
            return MessageClass::Unsupported(tag.to_string());
        }
    }

    MessageClass::Empty
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let chunk = &remaining[..max_len];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(max_len);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { max_len } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
