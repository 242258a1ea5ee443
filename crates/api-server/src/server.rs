//! API server — HTTP listener plus the Prometheus metrics exporter.

use crate::rest::{self, AppState};
use audience_core::config::AppConfig;
use audience_segmentation::SegmentationEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tracing::info;

use crate::tenant::TenantResolver;

pub struct ApiServer {
    config: AppConfig,
    engine: Arc<SegmentationEngine>,
}

impl ApiServer {
    pub fn new(config: AppConfig, engine: Arc<SegmentationEngine>) -> Self {
        Self { config, engine }
    }

    fn state(&self) -> AppState {
        AppState {
            engine: self.engine.clone(),
            tenants: Arc::new(TenantResolver::from_config(&self.config.tenants)),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = rest::router(self.state()).layer(CompressionLayer::new());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
