//! End-to-end pipeline tests: batch runs with mock capabilities and an
//! in-memory store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use contact_capture::enrich::{Enricher, UnconfiguredEnricher};
use contact_capture::error::{LlmError, TransportError};
use contact_capture::llm::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, VisionRequest,
};
use contact_capture::pipeline::{CapturePipeline, ContactDraft, EnrichmentResult, Finding, InboundMessage, Notify};
use contact_capture::research::Researcher;
use contact_capture::store::{ContactStore, LibSqlStore};
use contact_capture::transcribe::{Transcriber, UnavailableTranscriber};

// ── Mocks ───────────────────────────────────────────────────────────

/// LLM with queued completion and vision responses.
struct ScriptedLlm {
    completions: Mutex<VecDeque<String>>,
    vision: Mutex<VecDeque<String>>,
}

impl ScriptedLlm {
    fn new(completions: Vec<&str>, vision: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            completions: Mutex::new(completions.into_iter().map(String::from).collect()),
            vision: Mutex::new(vision.into_iter().map(String::from).collect()),
        })
    }

    fn respond(queue: &Mutex<VecDeque<String>>) -> Result<CompletionResponse, LlmError> {
        let content = queue.lock().unwrap().pop_front().unwrap_or_default();
        Ok(CompletionResponse {
            content,
            input_tokens: 200,
            output_tokens: 80,
            finish_reason: FinishReason::Stop,
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn cost_per_token(&self) -> (Decimal, Decimal) {
        (Decimal::ZERO, Decimal::ZERO)
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Self::respond(&self.completions)
    }

    async fn complete_vision(
        &self,
        _request: VisionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        Self::respond(&self.vision)
    }
}

/// Transcriber returning a fixed transcript.
struct FixedTranscriber(&'static str);

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String, contact_capture::error::CaptureError> {
        Ok(self.0.to_string())
    }
}

/// Enricher returning a fixed result.
struct FixedEnricher(EnrichmentResult);

#[async_trait]
impl Enricher for FixedEnricher {
    async fn lookup(
        &self,
        _name: &str,
        _company_domain: Option<&str>,
    ) -> anyhow::Result<Option<EnrichmentResult>> {
        Ok(Some(self.0.clone()))
    }
}

/// Researcher returning fixed findings.
struct FixedResearcher(Vec<Finding>);

#[async_trait]
impl Researcher for FixedResearcher {
    async fn research(&self, _draft: &ContactDraft) -> Vec<Finding> {
        self.0.clone()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notify for RecordingNotifier {
    async fn notify(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

impl RecordingNotifier {
    fn terminal_for_chat(&self, chat_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, text)| c == chat_id && !text.starts_with("Processing:"))
            .map(|(_, text)| text.clone())
            .collect()
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

const SARAH_PARSE: &str = r#"{
    "name": "Sarah Chen",
    "company": "General Mills",
    "title": "VP Brand Strategy",
    "context": "Talked about organic line.",
    "follow_up": "Send the organic category report",
    "search_company_domain": "generalmills.com"
}"#;

const DOSSIER_TEXT: &str =
    "**Background:** 12 years in CPG brand management.\n\n\
     **Suggested Approach:** Reference the organic line conversation and share the category report.";

async fn memory_store() -> Arc<LibSqlStore> {
    let store = LibSqlStore::new_memory().await.unwrap();
    store.run_migrations().await.unwrap();
    Arc::new(store)
}

fn text_message(source_id: &str, chat_id: &str, body: &str) -> InboundMessage {
    InboundMessage {
        source_id: source_id.into(),
        chat_id: chat_id.into(),
        kind: "text".into(),
        payload: body.as_bytes().to_vec(),
        caption: None,
        received_at: Utc::now(),
    }
}

fn enrichment() -> EnrichmentResult {
    EnrichmentResult {
        name: Some("Sarah Chen".into()),
        title: Some("VP Brand Strategy".into()),
        email: Some("sarah.chen@genmills.com".into()),
        linkedin_url: Some("https://linkedin.com/in/sarahchen".into()),
        company: Some("General Mills".into()),
        company_website: Some("https://generalmills.com".into()),
        location: Some("Minneapolis, MN, US".into()),
        confidence_note: "Apollo match: Sarah Chen — VP Brand Strategy".into(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn fully_enriched_capture_end_to_end() {
    let store = memory_store().await;
    let pipeline = CapturePipeline::new(
        ScriptedLlm::new(vec![SARAH_PARSE, DOSSIER_TEXT], vec![]),
        Arc::new(UnavailableTranscriber),
        Arc::new(FixedEnricher(enrichment())),
        Arc::new(FixedResearcher(vec![Finding {
            title: "Keynote at FoodTech 2026".into(),
            url: "https://example.com/keynote".into(),
            snippet: "Sarah Chen on organic brand growth".into(),
        }])),
        Arc::clone(&store) as Arc<dyn ContactStore>,
    );
    let notifier = RecordingNotifier::default();

    let note = "Just met Sarah Chen from General Mills, VP Brand Strategy. Talked about organic line.";
    let summary = pipeline
        .process_batch(vec![text_message("it-1", "chat-9", note)], &notifier)
        .await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);

    let record = store.get_by_source_id("it-1").await.unwrap().unwrap();
    assert_eq!(record.name.as_deref(), Some("Sarah Chen"));
    assert_eq!(record.email.as_deref(), Some("sarah.chen@genmills.com"));
    assert_eq!(
        record.linkedin_url.as_deref(),
        Some("https://linkedin.com/in/sarahchen")
    );
    assert_eq!(record.location.as_deref(), Some("Minneapolis, MN, US"));
    assert!(record.enriched);
    assert_eq!(record.raw_note, note);
    assert!(record.dossier.contains("Suggested Approach"));

    let terminal = notifier.terminal_for_chat("chat-9");
    assert_eq!(terminal.len(), 1);
    assert!(terminal[0].contains("Sarah Chen"));
    assert!(terminal[0].contains("LinkedIn"));
    assert!(terminal[0].contains("Saved to contacts"));
}

#[tokio::test]
async fn voice_note_transcribed_and_captured() {
    let store = memory_store().await;
    let pipeline = CapturePipeline::new(
        ScriptedLlm::new(vec![SARAH_PARSE, DOSSIER_TEXT], vec![]),
        Arc::new(FixedTranscriber("Just met Sarah Chen from General Mills")),
        Arc::new(UnconfiguredEnricher),
        Arc::new(FixedResearcher(vec![])),
        Arc::clone(&store) as Arc<dyn ContactStore>,
    );
    let notifier = RecordingNotifier::default();

    let message = InboundMessage {
        source_id: "it-2".into(),
        chat_id: "chat-9".into(),
        kind: "voice".into(),
        payload: vec![0x4F, 0x67, 0x67, 0x53],
        caption: None,
        received_at: Utc::now(),
    };

    let summary = pipeline.process_batch(vec![message], &notifier).await;
    assert_eq!(summary.succeeded, 1);

    let record = store.get_by_source_id("it-2").await.unwrap().unwrap();
    assert_eq!(record.source, "Voice Note");
    assert_eq!(record.raw_note, "Just met Sarah Chen from General Mills");
    assert!(!record.needs_review);
}

#[tokio::test]
async fn rerunning_a_batch_never_duplicates_records() {
    let store = memory_store().await;
    let llm = ScriptedLlm::new(vec![SARAH_PARSE, DOSSIER_TEXT, SARAH_PARSE, DOSSIER_TEXT], vec![]);
    let pipeline = CapturePipeline::new(
        llm,
        Arc::new(UnavailableTranscriber),
        Arc::new(UnconfiguredEnricher),
        Arc::new(FixedResearcher(vec![])),
        Arc::clone(&store) as Arc<dyn ContactStore>,
    );
    let notifier = RecordingNotifier::default();

    let note = "met Sarah Chen from General Mills";
    // Simulated transport re-delivery: the same source_id arrives twice
    pipeline
        .process_batch(vec![text_message("it-3", "chat-9", note)], &notifier)
        .await;
    pipeline
        .process_batch(vec![text_message("it-3", "chat-9", note)], &notifier)
        .await;

    assert_eq!(store.count().await.unwrap(), 1);

    let terminal = notifier.terminal_for_chat("chat-9");
    assert_eq!(terminal.len(), 2);
    assert!(terminal[0].contains("Saved to contacts"));
    assert!(terminal[1].contains("Already captured earlier"));

    // Both runs reference the same record
    let record = store.get_by_source_id("it-3").await.unwrap().unwrap();
    assert!(terminal[0].contains(&record.id));
    assert!(terminal[1].contains(&record.id));
}

#[tokio::test]
async fn mixed_batch_reports_each_message_once() {
    let store = memory_store().await;
    let pipeline = CapturePipeline::new(
        ScriptedLlm::new(
            vec![SARAH_PARSE, DOSSIER_TEXT, r#"{"name": null}"#, DOSSIER_TEXT],
            vec![],
        ),
        Arc::new(UnavailableTranscriber),
        Arc::new(UnconfiguredEnricher),
        Arc::new(FixedResearcher(vec![])),
        Arc::clone(&store) as Arc<dyn ContactStore>,
    );
    let notifier = RecordingNotifier::default();

    let mut sticker = text_message("it-4a", "chat-9", "");
    sticker.kind = "sticker".into();

    let batch = vec![
        text_message("it-4b", "chat-9", "met Sarah Chen from General Mills"),
        sticker,
        text_message("it-4c", "chat-9", "met someone at the booth, no name"),
    ];

    let summary = pipeline.process_batch(batch, &notifier).await;
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    // Two records persisted; the unnamed one is flagged
    assert_eq!(store.count().await.unwrap(), 2);
    let anonymous = store.get_by_source_id("it-4c").await.unwrap().unwrap();
    assert!(anonymous.needs_review);

    // One terminal notification per message, in order
    let terminal = notifier.terminal_for_chat("chat-9");
    assert_eq!(terminal.len(), 3);
    assert!(terminal[0].contains("Saved to contacts"));
    assert!(terminal[1].contains("failed at: input stage"));
    assert!(terminal[2].contains("manual review"));
}
