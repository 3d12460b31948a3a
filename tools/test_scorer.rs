//! Test Scoring Service
//!
//! Serves `POST /predict` with the scoring service's wire contract so the
//! client can be exercised without a real model. Each record gets a
//! deterministic probability derived from a few risk-related attributes,
//! or a fixed value with `--fixed`.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use clap::Parser;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "test-scorer", about = "Stub scoring service for local testing")]
struct Args {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:5000")]
    addr: String,

    /// Request path to serve
    #[arg(long, default_value = "/predict")]
    path: String,

    /// Return this probability for every record
    #[arg(long)]
    fixed: Option<f64>,
}

struct ScorerState {
    fixed: Option<f64>,
    requests: AtomicU64,
}

fn flag(record: &Value, name: &str) -> f64 {
    match record.get(name) {
        Some(Value::Bool(true)) => 1.0,
        Some(v) if v.as_f64() == Some(1.0) => 1.0,
        _ => 0.0,
    }
}

fn number(record: &Value, name: &str) -> f64 {
    record.get(name).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Toy logistic score; higher for foreign requests, dropped sessions and risky profiles
fn heuristic_probability(record: &Value) -> f64 {
    let z = -2.0
        + 1.4 * flag(record, "foreign_request")
        + 0.9 * (1.0 - flag(record, "keep_alive_session"))
        + 0.6 * (1.0 - flag(record, "phone_home_valid"))
        + 0.004 * number(record, "credit_risk_score")
        + 1.5 * number(record, "income")
        - 1.2 * number(record, "name_email_similarity")
        + 0.2 * number(record, "device_distinct_emails_8w");
    1.0 / (1.0 + (-z).exp())
}

async fn predict(
    State(state): State<Arc<ScorerState>>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let records = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            warn!("Request without a 'data' array");
            (StatusCode::BAD_REQUEST, "expected {\"data\": [...]}".to_string())
        })?;

    let probabilities: Vec<f64> = records
        .iter()
        .map(|record| state.fixed.unwrap_or_else(|| heuristic_probability(record)))
        .collect();

    let count = state.requests.fetch_add(1, Ordering::Relaxed) + 1;
    info!(request = count, records = records.len(), "Scored request");

    Ok(Json(json!({ "probability": probabilities })))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_scorer=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let state = Arc::new(ScorerState {
        fixed: args.fixed,
        requests: AtomicU64::new(0),
    });

    let app = Router::new()
        .route(&args.path, post(predict))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    info!(addr = %listener.local_addr()?, path = %args.path, fixed = ?args.fixed, "Test scorer listening");

    axum::serve(listener, app).await?;
    Ok(())
}
