#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use safeinterview_session::error::ApiError;
use safeinterview_session::models::answer::{SubmissionPayload, SubmissionResult};
use safeinterview_session::models::anticheat::ViolationEvent;
use safeinterview_session::models::task::{Sample, SessionRecord, TaskRecord};
use safeinterview_session::services::api_client::SessionApi;
use safeinterview_session::services::session_service::{SessionController, SessionSettings};
use safeinterview_session::services::start_time_store::{MemoryStartTimeStore, StartTimeStore};
use safeinterview_session::utils::time::{ms_to_datetime, Clock};

pub const T0: i64 = 1_700_000_000_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// What the fake backend answers to `fetch_session`.
#[derive(Debug, Clone)]
pub enum FetchReply {
    Record(SessionRecord),
    NotFound,
    ServerError,
    Hang,
}

fn unavailable(body: &str) -> ApiError {
    ApiError::Status {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: body.to_string(),
    }
}

/// In-memory backend that records every call.
#[derive(Debug)]
pub struct FakeSessionApi {
    fetch: FetchReply,
    submit_result: serde_json::Value,
    fail_submit: AtomicBool,
    fail_reports: AtomicBool,
    pub fetch_calls: AtomicUsize,
    pub report_calls: AtomicUsize,
    submissions: Mutex<Vec<(String, SubmissionPayload)>>,
    reports: Mutex<Vec<(String, ViolationEvent)>>,
}

impl FakeSessionApi {
    pub fn new(fetch: FetchReply) -> Self {
        Self {
            fetch,
            submit_result: serde_json::json!({"score": 87, "verdict": "pass"}),
            fail_submit: AtomicBool::new(false),
            fail_reports: AtomicBool::new(false),
            fetch_calls: AtomicUsize::new(0),
            report_calls: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn with_record(record: SessionRecord) -> Self {
        Self::new(FetchReply::Record(record))
    }

    pub fn failing_submit(self) -> Self {
        self.fail_submit.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_reports(self) -> Self {
        self.fail_reports.store(true, Ordering::SeqCst);
        self
    }

    pub fn submissions(&self) -> Vec<(String, SubmissionPayload)> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn reports(&self) -> Vec<(String, ViolationEvent)> {
        self.reports.lock().unwrap().clone()
    }

    pub fn submit_result(&self) -> SubmissionResult {
        SubmissionResult(self.submit_result.clone())
    }
}

#[async_trait]
impl SessionApi for FakeSessionApi {
    async fn fetch_session(&self, _token: &str) -> Result<SessionRecord, ApiError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match &self.fetch {
            FetchReply::Record(record) => Ok(record.clone()),
            FetchReply::NotFound => Err(ApiError::NotFound),
            FetchReply::ServerError => Err(unavailable("connection reset")),
            FetchReply::Hang => std::future::pending().await,
        }
    }

    async fn submit_session(
        &self,
        token: &str,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionResult, ApiError> {
        self.submissions
            .lock()
            .unwrap()
            .push((token.to_string(), payload.clone()));
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(unavailable("submit endpoint down"));
        }
        Ok(self.submit_result())
    }

    async fn report_violation(&self, token: &str, event: &ViolationEvent) -> Result<(), ApiError> {
        self.report_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reports.load(Ordering::SeqCst) {
            return Err(unavailable("cheat-event endpoint down"));
        }
        self.reports
            .lock()
            .unwrap()
            .push((token.to_string(), event.clone()));
        Ok(())
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set_ms(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        ms_to_datetime(self.now_ms())
    }

    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Wall clock driven by tokio's (pausable) time, anchored at `T0`.
#[derive(Debug)]
pub struct PausedClock {
    base_ms: i64,
    started: tokio::time::Instant,
}

impl PausedClock {
    pub fn new(base_ms: i64) -> Self {
        Self {
            base_ms,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for PausedClock {
    fn now(&self) -> DateTime<Utc> {
        ms_to_datetime(self.now_ms())
    }

    fn now_ms(&self) -> i64 {
        self.base_ms + self.started.elapsed().as_millis() as i64
    }
}

pub fn coding(level: &str, statement: &str) -> TaskRecord {
    TaskRecord {
        samples: vec![Sample {
            input: Some("2 3".to_string()),
            output: Some("5".to_string()),
        }],
        vacancy: Some("Backend developer".to_string()),
        ..TaskRecord::with_level(level, statement)
    }
}

pub fn theory(level: &str, question: &str) -> TaskRecord {
    TaskRecord {
        level: Some(level.to_string()),
        question: Some(question.to_string()),
        ..TaskRecord::default()
    }
}

/// One easy coding task and one hard theory task.
pub fn two_task_record() -> SessionRecord {
    SessionRecord {
        coding_tasks: vec![coding("easy", "Add two numbers")],
        theory_tasks: vec![theory("hard", "Explain your approach")],
    }
}

pub fn full_record() -> SessionRecord {
    SessionRecord {
        coding_tasks: vec![
            coding("easy", "Add two numbers"),
            coding("medium", "Reverse a list"),
            coding("hard", "Shortest path"),
        ],
        theory_tasks: vec![
            theory("easy", "What is a hash map?"),
            theory("hard", "Explain consistent hashing"),
        ],
    }
}

pub fn settings(duration_seconds: u64) -> SessionSettings {
    SessionSettings {
        duration_seconds,
        tick_interval: Duration::from_secs(1),
        submit_on_timeout: true,
        report_attempts: 2,
    }
}

pub struct Harness {
    pub api: Arc<FakeSessionApi>,
    pub store: Arc<MemoryStartTimeStore>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new(api: FakeSessionApi) -> Self {
        init_tracing();
        Self {
            api: Arc::new(api),
            store: Arc::new(MemoryStartTimeStore::new()),
            clock: Arc::new(ManualClock::new(T0)),
        }
    }

    pub fn controller(&self, token: &str, settings: SessionSettings) -> SessionController {
        let store: Arc<dyn StartTimeStore> = self.store.clone();
        SessionController::new(token, self.api.clone(), store, self.clock.clone(), settings)
    }

    pub async fn loaded(&self, token: &str, settings: SessionSettings) -> SessionController {
        let mut controller = self.controller(token, settings);
        controller.load().await;
        controller
    }
}
