use std::path::Path;
use std::sync::Arc;

use contact_capture::channels::TelegramTransport;
use contact_capture::config::{CaptureConfig, REQUEST_TIMEOUT};
use contact_capture::enrich::{ApolloEnricher, Enricher, UnconfiguredEnricher};
use contact_capture::llm::create_provider;
use contact_capture::pipeline::CapturePipeline;
use contact_capture::research::{ExaResearcher, Researcher, UnconfiguredResearcher};
use contact_capture::store::{ContactStore, LibSqlStore};
use contact_capture::transcribe::{Transcriber, UnavailableTranscriber, WhisperTranscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = CaptureConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    eprintln!("📇 Contact Capture v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Database: {}", config.db_path);
    eprintln!("   Capabilities: {}", config.capability_summary());
    eprintln!(
        "   Chat restriction: {}\n",
        config.allowed_chat.as_deref().unwrap_or("none (any chat)")
    );

    // Shared HTTP client with a bounded per-request timeout
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    // Required capability: the language model
    let llm = create_provider(
        config.anthropic_api_key.clone(),
        &config.model,
        client.clone(),
    );

    // ── Store ───────────────────────────────────────────────────────
    let store: Arc<dyn ContactStore> = Arc::new(
        LibSqlStore::new_local(Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
                std::process::exit(1);
            }),
    );
    store.run_migrations().await?;

    // ── Optional capabilities — sentinel when unconfigured ──────────
    let transcriber: Arc<dyn Transcriber> = match config.openai_api_key.clone() {
        Some(key) => Arc::new(WhisperTranscriber::new(key, client.clone())),
        None => Arc::new(UnavailableTranscriber),
    };
    let enricher: Arc<dyn Enricher> = match config.apollo_api_key.clone() {
        Some(key) => Arc::new(ApolloEnricher::new(key, client.clone())),
        None => Arc::new(UnconfiguredEnricher),
    };
    let researcher: Arc<dyn Researcher> = match config.exa_api_key.clone() {
        Some(key) => Arc::new(ExaResearcher::new(key, client.clone())),
        None => Arc::new(UnconfiguredResearcher),
    };

    // ── Transport & pipeline ────────────────────────────────────────
    let transport = TelegramTransport::new(
        config.telegram_bot_token.clone(),
        config.allowed_chat.clone(),
        client,
    );
    let pipeline = CapturePipeline::new(llm, transcriber, enricher, researcher, store);

    // One batch per run: fetch, process sequentially, confirm the offset.
    let batch = transport.fetch_batch().await?;
    if batch.messages.is_empty() && batch.last_update_id.is_none() {
        tracing::info!("Nothing to process");
        return Ok(());
    }

    let summary = pipeline.process_batch(batch.messages, &transport).await;

    if let Some(last_update_id) = batch.last_update_id {
        transport.confirm_up_to(last_update_id).await?;
    }

    tracing::info!(
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Run complete"
    );
    Ok(())
}
