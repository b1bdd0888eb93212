// src/server.rs
use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::pipeline::PredictionVerifier;
use crate::types::{PredictionInput, PredictionVerification};

#[derive(Deserialize)]
pub struct BatchReq {
    pub predictions: Vec<PredictionInput>,
}

#[derive(Serialize)]
pub struct BatchResp {
    pub results: Vec<PredictionVerification>,
}

// Every stage is total, so these handlers have no error path.
pub async fn verify_one(
    State(verifier): State<Arc<PredictionVerifier>>,
    Json(input): Json<PredictionInput>,
) -> Json<PredictionVerification> {
    Json(verifier.verify(&input).await)
}

pub async fn verify_batch(
    State(verifier): State<Arc<PredictionVerifier>>,
    Json(req): Json<BatchReq>,
) -> Json<BatchResp> {
    let results = verifier.verify_batch(&req.predictions).await;
    Json(BatchResp { results })
}

async fn health() -> &'static str {
    "ok"
}

pub fn router(verifier: Arc<PredictionVerifier>) -> Router {
    Router::new()
        .route("/verify", post(verify_one))
        .route("/verify/batch", post(verify_batch))
        .route("/health", get(health))
        .with_state(verifier)
}

pub async fn run_server(verifier: PredictionVerifier, addr: &str) -> anyhow::Result<()> {
    let app = router(Arc::new(verifier));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
