//! Shared types for the capture pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::TransportError;

// ── Inbound message ─────────────────────────────────────────────────

/// One raw inbound message from the transport.
///
/// The transport tags each update with a `kind` and downloads any media
/// payload up front; the Normalizer validates the tag. Consumed exactly
/// once by the pipeline and never persisted.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Unique per-update ID, used as the idempotency key.
    pub source_id: String,
    /// Originating chat, used to route notifications back.
    pub chat_id: String,
    /// Transport-assigned kind tag: "text", "voice", "photo", or the native
    /// media name for anything the pipeline doesn't handle.
    pub kind: String,
    /// UTF-8 text bytes or downloaded media bytes.
    pub payload: Vec<u8>,
    /// Photo caption, when present.
    pub caption: Option<String>,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
}

/// A classified inbound payload, ready for the stage sequence.
#[derive(Debug, Clone)]
pub enum NormalizedInput {
    Text(String),
    Voice(Vec<u8>),
    Photo {
        image: Vec<u8>,
        caption: Option<String>,
    },
}

/// Where a capture came from. Stored on the record and shown in
/// notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Text,
    VoiceNote,
    BusinessCard,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::VoiceNote => "Voice Note",
            Self::BusinessCard => "Business Card",
        }
    }
}

// ── Contact draft ───────────────────────────────────────────────────

/// The working contact representation, built by the Entity Parser and
/// filled (never overwritten) by Enrichment.
///
/// Every field except `raw_note` is optional; absence is a valid state.
#[derive(Debug, Clone, Serialize)]
pub struct ContactDraft {
    /// Verbatim note text: the typed message, the transcript, or the
    /// card-derived text plus caption.
    pub raw_note: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Event or location where they met.
    pub event: Option<String>,
    /// Key topics discussed, interests, notable details.
    pub meeting_context: Option<String>,
    /// One concrete suggested follow-up action.
    pub follow_up: Option<String>,
    /// Best-guess company website domain, used as the enrichment
    /// disambiguator.
    pub company_domain: Option<String>,
}

impl ContactDraft {
    pub fn new(raw_note: impl Into<String>) -> Self {
        Self {
            raw_note: raw_note.into(),
            name: None,
            company: None,
            title: None,
            email: None,
            phone: None,
            event: None,
            meeting_context: None,
            follow_up: None,
            company_domain: None,
        }
    }

    /// Whether the draft has a usable name.
    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}

/// Structured fields read off a business card by the Vision Extractor.
/// Only fields the model could confidently read are present.
#[derive(Debug, Clone, Default)]
pub struct ContactFields {
    pub name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

// ── Enrichment & research ───────────────────────────────────────────

/// Provider data merged into the draft under the fill-if-empty rule.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentResult {
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub linkedin_url: Option<String>,
    pub company: Option<String>,
    pub company_website: Option<String>,
    pub location: Option<String>,
    pub confidence_note: String,
}

/// One web research finding. Purely additive context for synthesis.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

// ── Pipeline output ─────────────────────────────────────────────────

/// Successful pipeline output for one message.
#[derive(Debug, Clone)]
pub struct CapturedContact {
    /// Reference to the created (or pre-existing) record.
    pub record: crate::store::ContactRef,
    pub draft: ContactDraft,
    pub enrichment: Option<EnrichmentResult>,
    pub dossier: String,
    /// Human-readable notes about degraded stages (e.g. transcription
    /// unavailable), surfaced in the success notification.
    pub degradations: Vec<String>,
    /// Set when no usable name was parsed — the record is kept but flagged.
    pub needs_review: bool,
    pub source: SourceKind,
}

/// Outcome counters for one batch run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

// ── Notifier contract ───────────────────────────────────────────────

/// Outbound notification sink — implemented by the transport.
///
/// The pipeline sends exactly one terminal notification per message.
/// Send failures are logged by the caller and never fail the batch.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn notify(&self, chat_id: &str, text: &str) -> Result<(), TransportError>;
}

/// Treat empty/whitespace strings as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
