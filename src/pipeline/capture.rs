//! Capture pipeline — orchestrates the stage sequence for one message.
//!
//! Normalize → (transcribe | read card) → parse → enrich → research →
//! synthesize → persist. Stages after the parser are individually
//! skippable; a failure before the Record Writer aborts only the current
//! message and leaves no persisted trace.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dossier::DossierSynthesizer;
use crate::enrich::Enricher;
use crate::error::CaptureError;
use crate::llm::LlmProvider;
use crate::parser::EntityParser;
use crate::pipeline::merge;
use crate::pipeline::normalize::normalize;
use crate::pipeline::types::{
    BatchSummary, CapturedContact, ContactDraft, InboundMessage, NormalizedInput, Notify,
    SourceKind,
};
use crate::research::Researcher;
use crate::store::{ContactStore, NewContact};
use crate::transcribe::Transcriber;
use crate::vision::VisionExtractor;

/// Raw note used when a voice message arrives without transcription
/// configured. The record is still created, flagged for review.
const VOICE_PLACEHOLDER: &str =
    "Voice note received, but transcription is not configured. The audio was not transcribed.";

/// Raw note used when a card photo yields no readable text and no caption.
const CARD_UNREADABLE_PLACEHOLDER: &str =
    "Business card photo received, but no text could be read from it.";

/// Preview length for the processing acknowledgement.
const PREVIEW_CHARS: usize = 80;

/// The capture pipeline. Holds one instance of every stage; capability
/// gating happens through the sentinel implementations wired in at
/// startup, so the control flow here is capability-agnostic.
pub struct CapturePipeline {
    parser: EntityParser,
    vision: VisionExtractor,
    synthesizer: DossierSynthesizer,
    transcriber: Arc<dyn Transcriber>,
    enricher: Arc<dyn Enricher>,
    researcher: Arc<dyn Researcher>,
    store: Arc<dyn ContactStore>,
}

impl CapturePipeline {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        transcriber: Arc<dyn Transcriber>,
        enricher: Arc<dyn Enricher>,
        researcher: Arc<dyn Researcher>,
        store: Arc<dyn ContactStore>,
    ) -> Self {
        Self {
            parser: EntityParser::new(Arc::clone(&llm)),
            vision: VisionExtractor::new(Arc::clone(&llm)),
            synthesizer: DossierSynthesizer::new(llm),
            transcriber,
            enricher,
            researcher,
            store,
        }
    }

    /// Run one message through the full stage sequence.
    ///
    /// Errors abort only this message; the caller reports them and moves
    /// on. Nothing is persisted unless the Record Writer runs.
    pub async fn process(&self, message: InboundMessage) -> Result<CapturedContact, CaptureError> {
        let source_id = message.source_id.clone();
        info!(source_id = %source_id, kind = %message.kind, "Processing inbound message");

        let mut degradations = Vec::new();

        // Stage 1: normalize
        let normalized = normalize(message)?;

        // Stage 2: obtain the raw note (transcribe / read card)
        let (raw_note, vision_fields, source) = match normalized {
            NormalizedInput::Text(body) => (body, None, SourceKind::Text),
            NormalizedInput::Voice(audio) => match self.transcriber.transcribe(&audio).await {
                Ok(transcript) => (transcript, None, SourceKind::VoiceNote),
                Err(CaptureError::MissingCapability(capability)) => {
                    warn!(capability, "Transcription unavailable — degrading to placeholder note");
                    degradations.push(
                        "Transcription is not configured; the voice note was saved untranscribed."
                            .to_string(),
                    );
                    (VOICE_PLACEHOLDER.to_string(), None, SourceKind::VoiceNote)
                }
                Err(e) => return Err(e),
            },
            NormalizedInput::Photo { image, caption } => {
                let extraction = self.vision.extract(&image).await?;
                let note = card_note(&extraction.raw_text, caption.as_deref());
                (note, Some(extraction.fields), SourceKind::BusinessCard)
            }
        };

        // Stage 3: entity parse, then overlay card fields
        let mut draft = self.parser.parse(&raw_note).await?;
        if let Some(fields) = &vision_fields {
            merge::apply_vision(&mut draft, fields);
        }

        // Stage 4: enrichment — fill-if-empty, never an error
        let enrichment = if draft.has_name() {
            let name = draft.name.clone().unwrap_or_default();
            match self
                .enricher
                .lookup(&name, draft.company_domain.as_deref())
                .await
            {
                Ok(Some(result)) => {
                    debug!(note = %result.confidence_note, "Enrichment match");
                    merge::apply_enrichment(&mut draft, &result);
                    Some(result)
                }
                Ok(None) => {
                    debug!(name = %name, "Enrichment: no match");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Enrichment failed (non-fatal)");
                    None
                }
            }
        } else {
            debug!("Skipping enrichment — draft has no name");
            None
        };

        // Stage 5: research — skipped without any identity to query
        let findings = if draft.has_name() || draft.company.is_some() {
            self.researcher.research(&draft).await
        } else {
            debug!("Skipping research — no name or company to query");
            Vec::new()
        };

        // Stage 6: dossier — always produced, degrades internally
        let dossier = self
            .synthesizer
            .synthesize(&draft, enrichment.as_ref(), &findings)
            .await;

        // Stage 7: record write — atomic create-if-absent on source_id
        let needs_review = !draft.has_name();
        let record = self
            .store
            .create_if_absent(&build_record(
                &source_id,
                &draft,
                enrichment.as_ref(),
                &dossier,
                source,
                needs_review,
            ))
            .await?;

        if record.created {
            info!(source_id = %source_id, record_id = %record.id, "Contact record created");
        } else {
            info!(
                source_id = %source_id,
                record_id = %record.id,
                "Duplicate source_id — returning existing record"
            );
        }

        Ok(CapturedContact {
            record,
            draft,
            enrichment,
            dossier,
            degradations,
            needs_review,
            source,
        })
    }

    /// Process a batch sequentially, sending exactly one terminal
    /// notification per message. Notification failures are logged and
    /// never fail the batch.
    pub async fn process_batch(
        &self,
        messages: Vec<InboundMessage>,
        notifier: &dyn Notify,
    ) -> BatchSummary {
        let mut summary = BatchSummary::default();
        info!(count = messages.len(), "Processing message batch");

        for message in messages {
            let chat_id = message.chat_id.clone();
            summary.processed += 1;

            if let Err(e) = notifier.notify(&chat_id, &processing_ack(&message)).await {
                warn!(error = %e, "Failed to send processing acknowledgement");
            }

            match self.process(message).await {
                Ok(captured) => {
                    summary.succeeded += 1;
                    if let Err(e) = notifier.notify(&chat_id, &success_message(&captured)).await {
                        warn!(error = %e, "Failed to send success notification");
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(stage = e.stage(), error = %e, "Message capture failed");
                    if let Err(send_err) = notifier.notify(&chat_id, &failure_message(&e)).await {
                        warn!(error = %send_err, "Failed to send failure notification");
                    }
                }
            }
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Batch complete"
        );
        summary
    }
}

/// Assemble the card-derived raw note from extracted text and caption.
fn card_note(raw_text: &str, caption: Option<&str>) -> String {
    let text = raw_text.trim();
    let caption = caption.map(str::trim).filter(|c| !c.is_empty());
    match (text.is_empty(), caption) {
        (false, Some(c)) => format!("{text}\nAdditional context: {c}"),
        (false, None) => text.to_string(),
        (true, Some(c)) => c.to_string(),
        (true, None) => CARD_UNREADABLE_PLACEHOLDER.to_string(),
    }
}

/// Build the persisted record from everything the pipeline produced.
fn build_record(
    source_id: &str,
    draft: &ContactDraft,
    enrichment: Option<&crate::pipeline::types::EnrichmentResult>,
    dossier: &str,
    source: SourceKind,
    needs_review: bool,
) -> NewContact {
    NewContact {
        source_id: source_id.to_string(),
        name: draft.name.clone(),
        company: draft.company.clone(),
        title: draft.title.clone(),
        email: draft.email.clone(),
        phone: draft.phone.clone(),
        linkedin_url: enrichment.and_then(|e| e.linkedin_url.clone()),
        company_website: enrichment.and_then(|e| e.company_website.clone()),
        location: enrichment.and_then(|e| e.location.clone()),
        raw_note: draft.raw_note.clone(),
        event: draft.event.clone(),
        meeting_notes: draft.meeting_context.clone(),
        follow_up: draft.follow_up.clone(),
        dossier: dossier.to_string(),
        source: source.label().to_string(),
        enriched: enrichment.is_some(),
        needs_review,
    }
}

/// Short acknowledgement sent before processing starts.
fn processing_ack(message: &InboundMessage) -> String {
    let preview = match message.kind.as_str() {
        "text" => {
            let body = String::from_utf8_lossy(&message.payload);
            let truncated: String = body.chars().take(PREVIEW_CHARS).collect();
            if body.chars().count() > PREVIEW_CHARS {
                format!("{truncated}...")
            } else {
                truncated
            }
        }
        "voice" => "voice note".to_string(),
        "photo" => message
            .caption
            .clone()
            .unwrap_or_else(|| "business card photo".to_string()),
        other => other.to_string(),
    };
    format!("Processing: _{preview}_")
}

/// Success notification: contact summary, degradations, and the record
/// reference.
fn success_message(captured: &CapturedContact) -> String {
    let draft = &captured.draft;
    let mut lines = Vec::new();

    let mut headline = format!("*{}*", draft.name.as_deref().unwrap_or("Unknown contact"));
    if let Some(title) = &draft.title {
        headline.push_str(&format!(" — {title}"));
    }
    lines.push(headline);

    if let Some(company) = &draft.company {
        lines.push(format!("_{company}_"));
    }
    if let Some(email) = &draft.email {
        lines.push(format!("Email: {email}"));
    }
    if let Some(url) = captured
        .enrichment
        .as_ref()
        .and_then(|e| e.linkedin_url.as_ref())
    {
        lines.push(format!("[LinkedIn]({url})"));
    }

    for degradation in &captured.degradations {
        lines.push(format!("⚠️ {degradation}"));
    }
    if captured.needs_review {
        lines.push("Flagged for manual review — no name could be parsed.".to_string());
    } else if captured.enrichment.is_none() {
        lines.push("(no enrichment match — manual lookup may be needed)".to_string());
    }

    if let Some(follow_up) = &draft.follow_up {
        lines.push(format!("\n_{follow_up}_"));
    }

    if captured.record.created {
        lines.push(format!("\nSaved to contacts (record {})", captured.record.id));
    } else {
        lines.push(format!(
            "\nAlready captured earlier (record {})",
            captured.record.id
        ));
    }

    lines.join("\n")
}

/// Failure notification: a human-readable reason plus the failing stage.
fn failure_message(error: &CaptureError) -> String {
    let reason = match error {
        CaptureError::UnsupportedInputKind(kind) => format!(
            "I can only handle text, voice notes, and business card photos (got: {kind})."
        ),
        CaptureError::MissingCapability(capability) => {
            format!("The {capability} capability is not configured.")
        }
        CaptureError::Transcription(_) => {
            "Couldn't transcribe that voice note. Try again, or send the details as text."
                .to_string()
        }
        CaptureError::VisionExtraction(_) => {
            "Couldn't read that business card. Try a clearer photo, or send the details as text."
                .to_string()
        }
        CaptureError::Parsing(_) => {
            "Couldn't parse contact info from that. Try including a name and company.".to_string()
        }
        CaptureError::StoreWrite(e) => format!("Parsed the contact but saving failed: {e}"),
    };
    format!("{reason}\n(failed at: {} stage)", error.stage())
}
