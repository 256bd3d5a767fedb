//! API server: REST routes, Swagger UI and the Prometheus exporter.

use crate::enrollment_rest;
use crate::rest::{self, AppState};
use crate::sequence_rest;
use crate::swagger::ApiDoc;
use axum::routing::{get, post};
use axum::Router;
use cadence_core::config::AppConfig;
use cadence_engine::CadenceEngine;
use std::net::SocketAddr;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the full HTTP router around an engine.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Sequences
        .route(
            "/sequences",
            get(sequence_rest::list_sequences).post(sequence_rest::create_sequence),
        )
        .route(
            "/sequences/:id",
            get(sequence_rest::get_sequence)
                .put(sequence_rest::update_sequence)
                .delete(sequence_rest::delete_sequence),
        )
        // Enrollments
        .route(
            "/enrollments",
            get(enrollment_rest::list_enrollments).post(enrollment_rest::create_enrollment),
        )
        .route(
            "/enrollments/execute-due",
            post(enrollment_rest::execute_due),
        )
        .route(
            "/enrollments/:id",
            get(enrollment_rest::get_enrollment).put(enrollment_rest::transition_enrollment),
        )
        .route(
            "/enrollments/:id/execute",
            post(enrollment_rest::execute_enrollment),
        )
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Main API server.
pub struct ApiServer {
    config: AppConfig,
    engine: CadenceEngine,
}

impl ApiServer {
    pub fn new(config: AppConfig, engine: CadenceEngine) -> Self {
        Self { config, engine }
    }

    fn state(&self) -> AppState {
        AppState {
            engine: self.engine.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
            execute_due_limit: self.config.scheduler.execute_due_limit,
        }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(self.state());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics exporter on a separate port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }

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
