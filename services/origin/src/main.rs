//! Privacy Pass Origin
//!
//! Single-binary service that:
//! 1. Answers unauthenticated requests with `PrivateToken` challenges
//! 2. Redeems tokens presented in `Authorization: PrivateToken token=...`
//! 3. Serves the configured resource once a token verifies

mod challenges;
mod config;
mod directory;
mod error;
mod metrics;
mod origin;

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{error, info, instrument, warn};

use crate::challenges::{ChallengeOptions, ChallengeQuery};
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::directory::IssuerKeys;
use crate::metrics::ServiceMetrics;
use crate::origin::{Origin, ResourceClient};

/// Time allowed for in-flight requests to finish after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    origin: Origin,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
}

/// Build the axum router. Every path other than `/health` and `/metrics` is
/// protected.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .fallback(protected_handler)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    common::init_tracing();
    info!("starting privacypass-origin");

    let prometheus_handle = metrics::install_recorder();

    let cli_config_path = common::cli_config_arg();
    let config_path = common::resolve_path(cli_config_path.as_deref(), DEFAULT_CONFIG_FILE);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        listen_addr = %config.server.listen_addr,
        issuer = %config.issuer.name,
        origin = %config.origin.name,
        resource_url = %config.origin.resource_url,
        "configuration loaded"
    );

    let client = reqwest::Client::new();
    let timeout = Duration::from_secs(config.issuer.timeout_secs);
    let issuer_base_url = format!("{}://{}", config.issuer.scheme, config.issuer.name);
    let keys = IssuerKeys::fetch(&client, &issuer_base_url, timeout)
        .await
        .with_context(|| format!("failed to load keys from issuer {}", config.issuer.name))?;
    info!("issuer keys loaded");

    let mut origin_info = vec![config.origin.name.clone()];
    origin_info.extend(config.origin.origin_info.iter().cloned());
    let resource = ResourceClient::new(client, config.origin.resource_url.clone(), timeout);
    let origin = Origin::new(config.issuer.name.clone(), origin_info, keys, resource)
        .context("issuer and origin names do not fit in a token challenge")?;

    let app_state = AppState {
        origin,
        metrics: ServiceMetrics::new(),
        prometheus: prometheus_handle,
    };
    let app = build_router(app_state, config.server.max_connections);

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "origin listening");

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

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "requests_served": state.metrics.requests_total.load(Ordering::Relaxed),
        "errors_total": state.metrics.errors_total.load(Ordering::Relaxed),
        "outstanding_challenges": state.origin.challenges.outstanding().await,
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Challenge or redeem, depending on whether the request carries a token.
async fn protected_handler(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    state.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

    match headers.get(header::AUTHORIZATION) {
        Some(value) if !value.is_empty() => {
            let authorization = value.to_str().unwrap_or_default();
            redeem(&state, authorization, request_id).await
        }
        _ => {
            let query: ChallengeQuery = pairs.into_iter().collect();
            let options = ChallengeOptions::from_request(&headers, &query);
            challenge(&state, options, request_id).await
        }
    }
}

#[instrument(skip_all, fields(request_id = %request_id, token_type = options.token_type.label(), count = options.count))]
async fn challenge(state: &AppState, options: ChallengeOptions, request_id: String) -> Response {
    match state.origin.challenge(options).await {
        Ok(www_authenticate) => (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, www_authenticate)],
            "Unauthorized",
        )
            .into_response(),
        Err(e) => {
            state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "failed to build challenge");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[instrument(skip_all, fields(request_id = %request_id))]
async fn redeem(state: &AppState, authorization: &str, request_id: String) -> Response {
    match state.origin.redeem(authorization).await {
        Ok(resource) => {
            metrics::record_redemption("granted");
            (StatusCode::OK, resource).into_response()
        }
        Err(e) => {
            state.metrics.errors_total.fetch_add(1, Ordering::Relaxed);
            metrics::record_redemption(e.kind());
            info!(error = %e, kind = e.kind(), "redemption rejected");
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
