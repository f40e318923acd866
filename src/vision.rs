//! Business card extraction via the vision-capable model.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::CaptureError;
use crate::llm::{extract_json_object, LlmProvider, VisionRequest};
use crate::pipeline::types::{non_empty, ContactFields};

const EXTRACT_MAX_TOKENS: u32 = 1024;

/// Structured output of a card read: confidently-read fields plus the
/// full text visible on the card.
#[derive(Debug, Clone, Default)]
pub struct CardExtraction {
    pub fields: ContactFields,
    pub raw_text: String,
}

/// Reads business card photos with the vision-capable model.
pub struct VisionExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl VisionExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Extract contact fields and raw text from a card photo.
    ///
    /// An unreadable card (no fields, no text) is not an error here — the
    /// pipeline persists an empty draft flagged for review. Only provider
    /// failure aborts the message.
    pub async fn extract(&self, image: &[u8]) -> Result<CardExtraction, CaptureError> {
        let request = VisionRequest::new(
            image.to_vec(),
            detect_media_type(image),
            extraction_prompt(),
        )
        .with_max_tokens(EXTRACT_MAX_TOKENS);

        let response = self
            .llm
            .complete_vision(request)
            .await
            .map_err(|e| CaptureError::VisionExtraction(e.to_string()))?;

        tracing::debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Business card read"
        );

        parse_extraction_response(&response.content)
            .map_err(CaptureError::VisionExtraction)
    }
}

/// Sniff PNG vs JPEG from magic bytes. Telegram photos are JPEG; PNG shows
/// up when cards arrive as uncompressed documents.
fn detect_media_type(image: &[u8]) -> &'static str {
    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47];
    if image.starts_with(PNG_MAGIC) {
        "image/png"
    } else {
        "image/jpeg"
    }
}

fn extraction_prompt() -> &'static str {
    "This is a photo of a business card. Extract the contact details.\n\n\
     Return ONLY a JSON object with these fields:\n\
     {\n\
       \"name\": \"Full name, only if clearly readable\",\n\
       \"title\": \"Job title, only if clearly readable\",\n\
       \"company\": \"Company name, only if clearly readable\",\n\
       \"email\": \"Email address, only if clearly readable\",\n\
       \"phone\": \"Phone number, only if clearly readable\",\n\
       \"raw_text\": \"Every piece of text visible on the card, as one string\"\n\
     }\n\n\
     Use null for any field you cannot read with confidence. Do NOT guess \
     or infer values that are not printed on the card. No markdown, no \
     explanation."
}

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    raw_text: Option<String>,
}

fn parse_extraction_response(raw: &str) -> Result<CardExtraction, String> {
    let json_str = extract_json_object(raw);
    let response: ExtractionResponse =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;

    Ok(CardExtraction {
        fields: ContactFields {
            name: non_empty(response.name),
            company: non_empty(response.company),
            title: non_empty(response.title),
            email: non_empty(response.email),
            phone: non_empty(response.phone),
        },
        raw_text: non_empty(response.raw_text).unwrap_or_default(),
    })
}
