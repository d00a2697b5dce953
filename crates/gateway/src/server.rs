use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::State,
        response::{IntoResponse, Json},
        routing::get,
    },
    bytes::Bytes,
    murmur_config::MurmurConfig,
    serde_json::{Value, json},
    tower_http::{
        cors::{Any, CorsLayer},
        limit::RequestBodyLimitLayer,
        trace::TraceLayer,
    },
    tracing::{debug, info, warn},
};

use crate::{ingest::ingest_event, state::GatewayState};

/// Largest webhook body accepted.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const SERVICE_NAME: &str = "murmur";

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/whatsapp/webhook",
            get(webhook_verify_handler).post(webhook_handler),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the webhook server and run until Ctrl-C.
pub async fn start_gateway(config: MurmurConfig) -> anyhow::Result<()> {
    let report = murmur_config::validate(&config);
    for d in &report.diagnostics {
        warn!(severity = %d.severity, path = d.path, "{}", d.message);
    }
    if report.has_errors() {
        anyhow::bail!("invalid configuration; run `murmur doctor` for details");
    }

    let state = GatewayState::from_config(&config)?;
    let app = build_gateway_app(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let lines = [
        format!("murmur gateway v{}", state.version),
        format!("listening on http://{addr}"),
        "webhook: POST /api/whatsapp/webhook".to_string(),
        format!(
            "debounce: {}ms, sender prefix: {}",
            config.auto_reply.debounce_ms, config.whatsapp.country_prefix
        ),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": SERVICE_NAME,
        "version": state.version,
    }))
}

async fn webhook_verify_handler() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

/// Answers `{"ok":true}` for every body, malformed ones included. Media
/// conversion runs on the sender's lane after the response is sent.
async fn webhook_handler(State(state): State<Arc<GatewayState>>, body: Bytes) -> impl IntoResponse {
    match serde_json::from_slice::<Value>(&body) {
        Ok(event) => {
            ingest_event(&state, &event).await;
        },
        Err(e) => debug!(error = %e, bytes = body.len(), "ignoring malformed webhook body"),
    }
    Json(json!({ "ok": true }))
}
