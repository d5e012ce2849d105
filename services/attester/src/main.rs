//! Privacy Pass Attester
//!
//! Single-binary service that:
//! 1. Accepts token requests at `POST /token-request?issuer=<name>`
//! 2. Verifies rate-limited requests before they leave the Attester
//! 3. Forwards them to the named Issuer
//! 4. Enforces the Issuer's per-client, per-origin issuance limit

mod config;
mod error;
mod forward;
mod issuance;
mod metrics;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use issuance_quota::QuotaLedger;
use metrics_exporter_prometheus::PrometheusHandle;
use privacypass::{TOKEN_REQUEST_PATH, TOKEN_RESPONSE_MEDIA_TYPE, TokenType};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};

use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::forward::IssuerClient;
use crate::issuance::Attester;
use crate::metrics::ServiceMetrics;

/// Time allowed for in-flight requests to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    attester: Attester,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
}

#[derive(Debug, Deserialize)]
struct TokenRequestQuery {
    issuer: Option<String>,
}

/// Build the axum router with all routes and shared state.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(TOKEN_REQUEST_PATH, post(token_request_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    common::init_tracing();
    info!("starting privacypass-attester");

    // Install Prometheus metrics recorder before any metrics are emitted
    let prometheus_handle = metrics::install_recorder();

    let cli_config_path = common::cli_config_arg();
    let config_path = common::resolve_path(cli_config_path.as_deref(), DEFAULT_CONFIG_FILE);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        issuer_scheme = %config.issuer.scheme,
        issuer_timeout_secs = config.issuer.timeout_secs,
        "configuration loaded"
    );

    let issuer = IssuerClient::new(
        reqwest::Client::new(),
        config.issuer.scheme.clone(),
        Duration::from_secs(config.issuer.timeout_secs),
    );
    let app_state = AppState {
        attester: Attester::new(issuer, Arc::new(QuotaLedger::new())),
        metrics: ServiceMetrics::new(),
        prometheus: prometheus_handle,
    };

    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting token requests");

    // The drain timer starts when the shutdown signal fires, not when the
    // server starts.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Health endpoint: status, uptime, request counters and ledger size.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "requests_served": state.metrics.requests_total.load(Ordering::Relaxed),
        "errors_total": state.metrics.errors_total.load(Ordering::Relaxed),
        "clients_tracked": state.attester.ledger.len().await,
    });

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint: returns metrics in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

async fn token_request_handler(
    State(state): State<AppState>,
    Query(query): Query<TokenRequestQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    handle_token_request(&state, query, headers, body, request_id).await
}

#[instrument(skip_all, fields(request_id = %request_id, issuer = ?query.issuer))]
async fn handle_token_request(
    state: &AppState,
    query: TokenRequestQuery,
    headers: HeaderMap,
    body: Bytes,
    request_id: String,
) -> Response {
    let started = Instant::now();
    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);
    let token_type = TokenType::peek(&body)
        .map(TokenType::label)
        .unwrap_or("unknown");

    let issuer = query.issuer.as_deref().filter(|name| !name.is_empty());
    let result = state.attester.handle(&headers, issuer, body).await;
    let elapsed = started.elapsed().as_secs_f64();

    match result {
        Ok(issued) => {
            metrics::record_request(issued.token_type.label(), "issued", elapsed);
            (
                StatusCode::OK,
                [(axum::http::header::CONTENT_TYPE, TOKEN_RESPONSE_MEDIA_TYPE)],
                issued.blind_signature,
            )
                .into_response()
        }
        Err(e) => {
            state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
            match &e {
                error::Error::IndexMismatch => {
                    warn!(error = %e, "rejecting token request: client/origin binding violated")
                }
                _ => info!(error = %e, kind = e.kind(), "rejecting token request"),
            }
            metrics::record_request(token_type, e.kind(), elapsed);
            e.into_response_with_id(&request_id)
        }
    }
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
