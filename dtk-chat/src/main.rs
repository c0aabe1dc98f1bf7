//! dtk-chat - conversational dataset discovery service
//!
//! Classifies each chat message into an intent, dispatches it to the matching
//! route and streams the reply back as server-sent events.

use anyhow::{Context, Result};
use clap::Parser;
use dtk_chat::llm::ChatCompletionClient;
use dtk_chat::pipeline::{HttpSearchIndex, ResourcePipeline};
use dtk_chat::records::OgdRecordSource;
use dtk_chat::AppState;
use dtk_common::config::{resolve_secret, ConfigResolver, TomlConfig};
use dtk_fetch::ogd::OgdClient;
use dtk_fetch::{PaginatedCollector, RemoteFetcher, RetryPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

const OGD_API_KEY_ENV: &str = "DATATALKER_OGD_API_KEY";
const LLM_API_KEY_ENV: &str = "DATATALKER_LLM_API_KEY";

/// Completion calls are interactive; keep their retry budget short
const LLM_MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Parser)]
#[command(name = "dtk-chat", version, about = "Conversational open-data discovery service")]
struct Args {
    /// Path to config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long, env = "DATATALKER_HOST")]
    host: Option<String>,

    /// Bind port
    #[arg(long, env = "DATATALKER_PORT")]
    port: Option<u16>,

    /// Minimum classifier confidence for a route match
    #[arg(long)]
    confidence_threshold: Option<f64>,

    /// OGD platform API key
    #[arg(long)]
    ogd_api_key: Option<String>,

    /// API key for the chat-completion endpoint
    #[arg(long)]
    llm_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = ConfigResolver::new(args.config.clone()).resolve_path();
    let (mut config, load_error) = match config_path.as_deref().map(TomlConfig::load) {
        Some(Ok(config)) => (config, None),
        Some(Err(e)) => (TomlConfig::default(), Some(e)),
        None => (TomlConfig::default(), None),
    };

    dtk_common::logging::init_logging(&config.logging)?;

    info!("Starting dtk-chat");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    match (&config_path, &load_error) {
        (Some(path), None) => info!("Configuration: {}", path.display()),
        (Some(path), Some(e)) => warn!(
            "Failed to load {} ({}), using default configuration",
            path.display(),
            e
        ),
        (None, _) => info!("No config file found, using default configuration"),
    }

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(threshold) = args.confidence_threshold {
        config.dispatcher.confidence_threshold = threshold;
    }
    config.validate()?;

    let fetcher = RemoteFetcher::from_config(&config.fetch).context("Failed to build HTTP client")?;

    let llm_key = resolve_secret(
        args.llm_api_key.as_deref(),
        LLM_API_KEY_ENV,
        config.llm.api_key.as_deref(),
    );
    let llm_policy = RetryPolicy::from_config(&config.fetch).with_max_attempts(LLM_MAX_ATTEMPTS);
    let llm = Arc::new(ChatCompletionClient::new(
        fetcher.with_policy(llm_policy),
        &config.llm,
        llm_key,
    ));
    info!("LLM endpoint: {} (model {})", config.llm.base_url, llm.model());

    let index = Arc::new(HttpSearchIndex::new(fetcher.clone(), &config.index));
    let pipeline = ResourcePipeline::new(index, llm.clone());

    let ogd_key = resolve_secret(
        args.ogd_api_key.as_deref(),
        OGD_API_KEY_ENV,
        config.ogd.api_key.as_deref(),
    );
    let ogd = OgdClient::new(fetcher, &config.ogd, ogd_key);
    if !ogd.has_api_key() {
        warn!("No OGD API key configured; fetch_data requests will fail");
    }
    let records = Arc::new(OgdRecordSource::new(
        ogd,
        PaginatedCollector::from_config(&config.fetch),
        config.fetch.page_size,
    ));

    let dispatcher = dtk_chat::build_dispatcher(
        llm.clone(),
        config.dispatcher.confidence_threshold,
        pipeline,
        llm,
        config.retrieval.top_k,
        records,
    )?;
    info!("Routes: {}", dispatcher.registered_intents().join(", "));

    let state = AppState::new(dispatcher);
    let app = dtk_chat::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
