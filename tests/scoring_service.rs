//! End-to-end tests against an in-process stub scoring service

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use credit_default_client::{
    config::ServerConfig,
    loader::{BatchLoader, ContentType},
    models::{PredictionClient, RequestCache},
    pipeline::InferencePipeline,
    schema::FormState,
    types::{Label, RequestPayload},
    PipelineError,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What the stub answers to every request
#[derive(Clone)]
enum Reply {
    /// Fixed status and body
    Raw(StatusCode, String),
    /// `{"probability": [p; N]}` for N submitted records
    PerRecord(f64),
    /// Wait before answering with a valid body
    Slow(Duration),
}

struct StubState {
    reply: Reply,
    calls: AtomicU64,
    last_body: Mutex<Option<Value>>,
    last_content_type: Mutex<Option<String>>,
}

struct Stub {
    state: Arc<StubState>,
    port: u16,
}

impl Stub {
    fn calls(&self) -> u64 {
        self.state.calls.load(Ordering::SeqCst)
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: "http://127.0.0.1".to_string(),
            port: self.port,
            endpoint: "/predict".to_string(),
            timeout_ms: 5_000,
        }
    }

    fn client(&self) -> PredictionClient {
        PredictionClient::new(&self.server_config()).unwrap()
    }
}

async fn handle(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    state.calls.fetch_add(1, Ordering::SeqCst);
    let parsed: Option<Value> = serde_json::from_slice(&body).ok();
    *state.last_content_type.lock() = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let records = parsed
        .as_ref()
        .and_then(|v| v.get("data"))
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    *state.last_body.lock() = parsed;

    match &state.reply {
        Reply::Raw(status, body) => (*status, body.clone()),
        Reply::PerRecord(p) => (
            StatusCode::OK,
            serde_json::json!({ "probability": vec![*p; records] }).to_string(),
        ),
        Reply::Slow(delay) => {
            tokio::time::sleep(*delay).await;
            (
                StatusCode::OK,
                serde_json::json!({ "probability": vec![0.5; records] }).to_string(),
            )
        }
    }
}

async fn spawn_stub(reply: Reply) -> Stub {
    let state = Arc::new(StubState {
        reply,
        calls: AtomicU64::new(0),
        last_body: Mutex::new(None),
        last_content_type: Mutex::new(None),
    });

    let app = Router::new()
        .route("/predict", post(handle))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Stub { state, port }
}

fn batch_csv(rows: usize) -> String {
    let header = "device_os,source,housing_status,employment_status,payment_type,\
date_of_birth_distinct_emails_4w,name_email_similarity,credit_risk_score,customer_age,month,\
has_other_cards,proposed_credit_limit,prev_address_months_count,zip_count_4w,income,\
device_distinct_emails_8w,bank_months_count,phone_home_valid,foreign_request,\
keep_alive_session,email_is_free,applicant_ref";
    let mut csv = format!("{}\n", header);
    for i in 0..rows {
        csv.push_str(&format!(
            "linux,INTERNET,BA,CA,AA,0,0.5,{},30,1,0,500,0,10,0.3,0,12,True,False,True,False,A-{}\n",
            100 + i,
            i
        ));
    }
    csv
}

#[tokio::test]
async fn test_manual_record_end_to_end() {
    let stub = spawn_stub(Reply::Raw(StatusCode::OK, r#"{"probability": [0.73]}"#.into())).await;
    let mut pipeline = InferencePipeline::new(RequestCache::new(stub.client()), 0.8);
    let form = FormState::with_defaults();

    let scored = pipeline.score(&form).await.unwrap();
    assert_eq!(scored.probabilities, vec![0.73]);
    assert_eq!(scored.labels, vec![Label::Normal]);

    pipeline.set_threshold(0.7);
    let scored = pipeline.score(&form).await.unwrap();
    assert_eq!(scored.labels, vec![Label::PotentialFraud]);

    // The threshold change did not alter the payload
    assert_eq!(stub.calls(), 1);

    let relabeled = scored.reclassify(0.8);
    assert_eq!(relabeled.labels, vec![Label::Normal]);
    assert_eq!(relabeled.probabilities, vec![0.73]);
    assert_eq!(pipeline.scorer().stats().lookups, 2);
}

#[tokio::test]
async fn test_request_wire_format() {
    let stub = spawn_stub(Reply::PerRecord(0.2)).await;
    let pipeline = InferencePipeline::new(stub.client(), 0.5);

    pipeline.score(&FormState::with_defaults()).await.unwrap();

    assert_eq!(
        stub.state.last_content_type.lock().as_deref(),
        Some("application/json")
    );

    let body = stub.state.last_body.lock().clone().unwrap();
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);

    let record = data[0].as_object().unwrap();
    assert_eq!(record.len(), 21);
    assert_eq!(record["device_os"], "linux");
    assert_eq!(record["customer_age"], 18);
    assert_eq!(record["phone_home_valid"], true);
}

#[tokio::test]
async fn test_batch_upload_scores_every_row_in_order() {
    let stub = spawn_stub(Reply::PerRecord(0.9)).await;
    let pipeline = InferencePipeline::new(RequestCache::new(stub.client()), 0.5);

    let batch = BatchLoader::new()
        .load_bytes(batch_csv(3).as_bytes(), ContentType::Csv)
        .unwrap();
    let scored = pipeline.score(&batch).await.unwrap();

    assert_eq!(scored.probabilities.len(), 3);
    assert_eq!(scored.counts().potential_fraud, 3);

    let body = stub.state.last_body.lock().clone().unwrap();
    let refs: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["applicant_ref"].as_str().unwrap())
        .collect();
    assert_eq!(refs, vec!["A-0", "A-1", "A-2"]);
}

#[tokio::test]
async fn test_different_payloads_each_call_service() {
    let stub = spawn_stub(Reply::PerRecord(0.4)).await;
    let pipeline = InferencePipeline::new(RequestCache::new(stub.client()), 0.5);

    let mut form = FormState::with_defaults();
    pipeline.score(&form).await.unwrap();
    form.set_raw("income", "0.2").unwrap();
    pipeline.score(&form).await.unwrap();
    pipeline.score(&form).await.unwrap();

    assert_eq!(stub.calls(), 2);
    assert_eq!(pipeline.scorer().stats().hits(), 1);
}

#[tokio::test]
async fn test_error_status_is_transport_error() {
    let stub = spawn_stub(Reply::Raw(
        StatusCode::INTERNAL_SERVER_ERROR,
        "model not loaded".into(),
    ))
    .await;

    let err = stub
        .client()
        .predict(&RequestPayload::new(vec![Default::default()]))
        .await
        .unwrap_err();

    match err {
        PipelineError::Transport { status, message } => {
            assert_eq!(status, Some(500));
            assert_eq!(message, "model not loaded");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_call_is_retried_only_by_new_submission() {
    let stub = spawn_stub(Reply::Raw(StatusCode::BAD_GATEWAY, "upstream down".into())).await;
    let pipeline = InferencePipeline::new(RequestCache::new(stub.client()), 0.5);
    let form = FormState::with_defaults();

    assert!(pipeline.score(&form).await.is_err());
    assert_eq!(stub.calls(), 1);
    assert!(pipeline.scorer().is_empty());

    assert!(pipeline.score(&form).await.is_err());
    assert_eq!(stub.calls(), 2);
}

#[tokio::test]
async fn test_length_mismatch_is_protocol_error() {
    let stub = spawn_stub(Reply::Raw(StatusCode::OK, r#"{"probability": [0.1, 0.2]}"#.into())).await;

    let err = stub
        .client()
        .predict(&RequestPayload::new(vec![Default::default()]))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Protocol(_)));
}

#[tokio::test]
async fn test_missing_probability_is_protocol_error() {
    let stub = spawn_stub(Reply::Raw(StatusCode::OK, r#"{"score": [0.1]}"#.into())).await;

    let err = stub
        .client()
        .predict(&RequestPayload::new(vec![Default::default()]))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Protocol(_)));
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let stub = spawn_stub(Reply::Slow(Duration::from_secs(3))).await;
    let mut config = stub.server_config();
    config.timeout_ms = 200;
    let client = PredictionClient::new(&config).unwrap();

    let err = client
        .predict(&RequestPayload::new(vec![Default::default()]))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Transport { status: None, .. }));
}

#[tokio::test]
async fn test_wrong_path_is_transport_error() {
    let stub = spawn_stub(Reply::PerRecord(0.5)).await;
    let mut config = stub.server_config();
    config.endpoint = "/score".to_string();
    let client = PredictionClient::new(&config).unwrap();

    let err = client
        .predict(&RequestPayload::new(vec![Default::default()]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Transport {
            status: Some(404),
            ..
        }
    ));
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_identical_submissions_share_one_call() {
    let stub = spawn_stub(Reply::Slow(Duration::from_millis(100))).await;
    let cache = Arc::new(RequestCache::new(stub.client()));
    let payload = FormState::with_defaults();

    let pipelines: Vec<_> = (0..4)
        .map(|_| InferencePipeline::new(cache.clone(), 0.5))
        .collect();
    let results =
        futures::future::join_all(pipelines.iter().map(|p| p.score(&payload))).await;

    for scored in results {
        assert_eq!(scored.unwrap().probabilities, vec![0.5]);
    }
    assert_eq!(stub.calls(), 1);
    assert_eq!(cache.stats().scorer_calls, 1);
}
