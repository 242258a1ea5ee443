//! Audience segmentation server.
//!
//! Loads configuration, optionally seeds the in-memory contact store from
//! a JSON file and serves the segmentation API.

use anyhow::Context;
use audience_api::ApiServer;
use audience_core::config::AppConfig;
use audience_core::Contact;
use audience_segmentation::{
    FieldRegistry, InMemoryContactStore, InMemorySegmentRepository, SegmentationEngine,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "audience-server")]
#[command(about = "Dynamic contact segmentation service")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "AUDIENCE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP host (overrides config)
    #[arg(long, env = "AUDIENCE__API__HOST")]
    host: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "AUDIENCE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// JSON array of contacts to load at startup
    #[arg(long)]
    contacts: Option<PathBuf>,
}

fn load_contacts(path: &Path) -> anyhow::Result<Vec<Contact>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading contacts from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing contacts in {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "audience_server=info,audience_segmentation=info,audience_api=info,tower_http=info"
                    .into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Audience server starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(host) = cli.host {
        config.api.host = host;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        max_page_size = config.segments.max_page_size,
        tenants = config.tenants.api_keys.len(),
        "Configuration loaded"
    );

    let contacts = Arc::new(InMemoryContactStore::new());
    if let Some(path) = &cli.contacts {
        let seed = load_contacts(path)?;
        info!(count = seed.len(), path = %path.display(), "Seeding contacts");
        contacts.extend(seed);
    }

    let registry = Arc::new(FieldRegistry::contacts());
    info!(fields = registry.len(), "Field registry ready");

    let engine = Arc::new(SegmentationEngine::new(
        &config.segments,
        registry,
        contacts,
        Arc::new(InMemorySegmentRepository::new()),
    ));

    let api_server = ApiServer::new(config.clone(), engine);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Audience server is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
