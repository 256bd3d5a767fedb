//! Cadence Engine: multi-step outreach cadence service.
//!
//! Main entry point that wires the collaborators and starts the server.

use cadence_api::ApiServer;
use cadence_cache::CachedDirectory;
use cadence_core::config::AppConfig;
use cadence_core::event_bus::LogSink;
use cadence_core::{ContactDirectory, InMemoryDirectory};
use cadence_engine::{
    CadenceEngine, DraftGenerator, HttpContactDirectory, HttpDraftGenerator, InMemoryRepository,
    TemplateDraftGenerator,
};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "cadence-server")]
#[command(about = "Multi-step outreach cadence engine")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "CADENCE_ENGINE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "CADENCE_ENGINE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Draft service URL (overrides config)
    #[arg(long, env = "CADENCE_ENGINE__DRAFT__URL")]
    draft_url: Option<String>,

    /// Contact directory URL (overrides config)
    #[arg(long, env = "CADENCE_ENGINE__DIRECTORY__URL")]
    directory_url: Option<String>,
}

fn draft_generator(config: &AppConfig) -> Arc<dyn DraftGenerator> {
    let Some(url) = config.draft.url.as_deref() else {
        info!("No draft service configured, using template renderer");
        return Arc::new(TemplateDraftGenerator::new());
    };
    match HttpDraftGenerator::new(url, Duration::from_millis(config.draft.timeout_ms)) {
        Ok(generator) => {
            info!(url, "Using draft service");
            Arc::new(generator)
        }
        Err(e) => {
            error!(error = %e, "Draft service client failed, using template renderer");
            Arc::new(TemplateDraftGenerator::new())
        }
    }
}

fn contact_directory(config: &AppConfig) -> anyhow::Result<Arc<dyn ContactDirectory>> {
    match config.directory.url.as_deref() {
        Some(url) => {
            let directory =
                HttpContactDirectory::new(url, Duration::from_millis(config.directory.timeout_ms))?;
            info!(url, "Using contact directory");
            Ok(Arc::new(directory))
        }
        None => {
            warn!("No contact directory configured, every contact lookup is unknown");
            Ok(Arc::new(InMemoryDirectory::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cadence_server=info,cadence_engine=info,tower_http=info".into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Cadence Engine starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if cli.draft_url.is_some() {
        config.draft.url = cli.draft_url;
    }
    if cli.directory_url.is_some() {
        config.directory.url = cli.directory_url;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        draft_service = config.draft.url.is_some(),
        directory = config.directory.url.is_some(),
        "Configuration loaded"
    );

    // Contact/company lookups go through the read-through cache
    let directory = Arc::new(CachedDirectory::new(
        contact_directory(&config)?,
        &config.cache,
    ));

    let engine = CadenceEngine::new(
        Arc::new(InMemoryRepository::new()),
        directory.clone(),
        draft_generator(&config),
    )
    .with_event_sink(Arc::new(LogSink))
    .with_crm(config.crm.clone())
    .with_default_tone(config.draft.default_tone.clone());

    let api_server = ApiServer::new(config.clone(), engine);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    // Spawn cache maintenance task
    let interval_secs = config.cache.maintenance_interval_secs.max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            directory.maintenance();
        }
    });

    info!("Cadence Engine is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
