use std::convert::Infallible;
use std::net::SocketAddr;

use anyhow::Result;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use compgen_pipeline::{AppConfig, GenerationRequest, Generator, relay};
use futures::StreamExt as _;
use tracing::info;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

pub async fn serve(config: &AppConfig, addr: SocketAddr) -> Result<()> {
    let app = build_router(Generator::from_config(config));
    info!(%addr, model = %config.model, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(generator: Generator) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/generate", post(generate))
        .with_state(generator)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Streams relay frames for one generation.
///
/// The body owns the relay, so a client disconnect drops it and cancels
/// the upstream call.
async fn generate(
    State(generator): State<Generator>,
    Json(request): Json<GenerationRequest>,
) -> impl IntoResponse {
    let frames = relay(generator.generate(request)).map(Ok::<_, Infallible>);
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Body::from_stream(frames),
    )
}
