use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use safeinterview_session::error::{ApiError, LoadError};
use safeinterview_session::models::answer::{SubmissionPayload, SubmissionResult};
use safeinterview_session::models::anticheat::{ViolationEvent, ViolationKind};
use safeinterview_session::models::task::TaskKind;
use safeinterview_session::services::api_client::{HttpSessionApi, SessionApi};
use safeinterview_session::services::catalog::TaskCatalog;

mod common;

#[derive(Clone, Default)]
struct Backend {
    received: Arc<Mutex<Vec<(String, String, Value)>>>,
}

impl Backend {
    fn received(&self) -> Vec<(String, String, Value)> {
        self.received.lock().unwrap().clone()
    }
}

async fn fetch_session(Path(token): Path<String>) -> Response {
    match token.as_str() {
        "missing" => StatusCode::NOT_FOUND.into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "database offline").into_response(),
        "garbled" => "not json".into_response(),
        _ => Json(json!({
            "coding_tasks": [
                {"level": "easy", "statement": format!("task for {}", token), "samples": [{"input": "1", "output": "1"}]},
                {"level": "hard", "description": "fallback prompt", "samples": null}
            ],
            "theory_tasks": null
        }))
        .into_response(),
    }
}

async fn submit_session(
    State(backend): State<Backend>,
    Path(token): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    backend
        .received
        .lock()
        .unwrap()
        .push(("submit".to_string(), token.clone(), body));
    match token.as_str() {
        "silent" => StatusCode::OK.into_response(),
        "rejected" => (StatusCode::UNPROCESSABLE_ENTITY, "late submission").into_response(),
        _ => Json(json!({"score": 42, "token": token})).into_response(),
    }
}

async fn cheat_event(
    State(backend): State<Backend>,
    Path(token): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    backend
        .received
        .lock()
        .unwrap()
        .push(("cheat-event".to_string(), token, body));
    StatusCode::NO_CONTENT
}

async fn spawn_backend() -> (HttpSessionApi, Backend) {
    common::init_tracing();
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/interview/{token}", get(fetch_session))
        .route("/api/interview/{token}/submit", post(submit_session))
        .route("/api/interview/{token}/cheat-event", post(cheat_event))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let api = HttpSessionApi::new(&format!("http://{}/", addr), Duration::from_secs(5)).unwrap();
    (api, backend)
}

#[tokio::test]
async fn test_fetch_normalizes_record() {
    let (api, _backend) = spawn_backend().await;

    let record = api.fetch_session("abc").await.unwrap();
    let catalog = TaskCatalog::from_record(record);

    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.theory_count(), 0);
    let first = catalog.get(0).unwrap();
    assert_eq!(first.kind, TaskKind::Coding);
    assert_eq!(first.record.prompt(), "task for abc");
    assert_eq!(first.record.samples.len(), 1);
    let second = catalog.get(1).unwrap();
    assert_eq!(second.record.prompt(), "fallback prompt");
    assert!(second.record.samples.is_empty());
}

#[tokio::test]
async fn test_token_is_encoded_as_one_segment() {
    let (api, backend) = spawn_backend().await;

    let record = api.fetch_session("two words/slash").await.unwrap();
    assert_eq!(record.coding_tasks[0].prompt(), "task for two words/slash");

    api.submit_session("two words/slash", &SubmissionPayload::default())
        .await
        .unwrap();
    assert_eq!(backend.received()[0].1, "two words/slash");
}

#[tokio::test]
async fn test_fetch_error_mapping() {
    let (api, _backend) = spawn_backend().await;

    let missing = api.fetch_session("missing").await.unwrap_err();
    assert!(missing.is_not_found());
    assert_eq!(LoadError::from(&missing), LoadError::NotFound);

    let broken = api.fetch_session("broken").await.unwrap_err();
    match &broken {
        ApiError::Status { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "database offline");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(LoadError::from(&broken), LoadError::Generic);

    let garbled = api.fetch_session("garbled").await.unwrap_err();
    assert!(matches!(garbled, ApiError::Decode(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_generic_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = HttpSessionApi::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let err = api.fetch_session("abc").await.unwrap_err();

    assert!(matches!(err, ApiError::Request(_)));
    assert_eq!(LoadError::from(&err), LoadError::Generic);
}

#[tokio::test]
async fn test_submit_posts_payload_and_returns_result() {
    let (api, backend) = spawn_backend().await;

    let mut payload = SubmissionPayload::default();
    payload.coding_solutions.easy = "print(1)".to_string();
    payload.theory_solutions.hard = "my approach".to_string();

    let result = api.submit_session("abc", &payload).await.unwrap();
    assert_eq!(result, SubmissionResult(json!({"score": 42, "token": "abc"})));

    let received = backend.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, "submit");
    assert_eq!(
        received[0].2,
        json!({
            "coding_solutions": {"easy": "print(1)", "medium": "", "hard": ""},
            "theory_solutions": {"easy": "", "hard": "my approach"}
        })
    );
}

#[tokio::test]
async fn test_submit_with_empty_body_and_rejection() {
    let (api, _backend) = spawn_backend().await;

    let result = api
        .submit_session("silent", &SubmissionPayload::default())
        .await
        .unwrap();
    assert_eq!(result, SubmissionResult(Value::Null));

    let err = api
        .submit_session("rejected", &SubmissionPayload::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Status { .. }));
}

#[tokio::test]
async fn test_report_violation_sends_type_and_time() {
    let (api, backend) = spawn_backend().await;
    let event = ViolationEvent::new(ViolationKind::TabHidden, Utc::now());

    api.report_violation("abc", &event).await.unwrap();

    let received = backend.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].0, "cheat-event");
    assert_eq!(received[0].2["type"], "tab_hidden");
    let sent_time: chrono::DateTime<Utc> =
        serde_json::from_value(received[0].2["time"].clone()).unwrap();
    assert_eq!(sent_time, event.time);
}
