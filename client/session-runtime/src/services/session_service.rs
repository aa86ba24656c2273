use futures::future::{AbortHandle, AbortRegistration, Abortable, Aborted};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{LoadError, SubmitRejection};
use crate::metrics::{
    track_remote_call, SESSIONS_ACTIVE, SESSIONS_FINISHED_TOTAL, SESSION_LOADS_TOTAL,
    SUBMISSIONS_TOTAL,
};
use crate::models::answer::{SubmissionPayload, SubmissionTrigger};
use crate::models::anticheat::ViolationEvent;
use crate::models::task::{CodingLevel, Sample, SessionRecord, Task, TaskKind, TheoryLevel};
use crate::models::timer::TimerEvent;
use crate::models::{Route, SessionState};
use crate::services::anticheat_service::{
    report_violation, IntegrityWatchdog, SignalHandle, STOP_REASON,
};
use crate::services::answer_store::AnswerStore;
use crate::services::api_client::SessionApi;
use crate::services::catalog::TaskCatalog;
use crate::services::start_time_store::StartTimeStore;
use crate::services::timer_service::{CountdownTimer, DEFAULT_DURATION_SECONDS};
use crate::utils::time::{format_time, Clock};

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub duration_seconds: u64,
    pub tick_interval: Duration,
    pub submit_on_timeout: bool,
    pub report_attempts: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            duration_seconds: DEFAULT_DURATION_SECONDS,
            tick_interval: Duration::from_secs(1),
            submit_on_timeout: false,
            report_attempts: 3,
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            duration_seconds: config.duration_seconds,
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            submit_on_timeout: config.submit_on_timeout,
            report_attempts: config.report_attempts,
        }
    }
}

/// Projects answer slots onto the fixed level keys. Tasks with a level outside
/// the expected set are dropped.
pub fn build_submission_payload(catalog: &TaskCatalog, answers: &AnswerStore) -> SubmissionPayload {
    let mut payload = SubmissionPayload::default();

    for (index, task) in catalog.coding_tasks() {
        match CodingLevel::parse(task.record.level()) {
            Some(level) => payload
                .coding_solutions
                .set(level, answers.submitted_code(index)),
            None => tracing::warn!(
                "Dropping coding answer at index {}: unexpected level {:?}",
                index,
                task.record.level()
            ),
        }
    }

    for (index, task) in catalog.theory_tasks() {
        match TheoryLevel::parse(task.record.level()) {
            Some(level) => payload.theory_solutions.set(level, answers.text_at(index)),
            None => tracing::warn!(
                "Dropping theory answer at index {}: unexpected level {:?}",
                index,
                task.record.level()
            ),
        }
    }

    payload
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Next,
    Previous,
    Edit(String),
    Submit,
    DismissWarning,
    Teardown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Not the last task: the answer stays in the store and the index moves on.
    Advanced { index: usize },
    Finished(Route),
}

/// Cancels an in-flight load when the hosting view goes away.
#[derive(Debug, Clone)]
pub struct TeardownHandle(AbortHandle);

impl TeardownHandle {
    pub fn teardown(&self) {
        self.0.abort();
    }

    pub fn is_torn_down(&self) -> bool {
        self.0.is_aborted()
    }
}

/// Everything the interview screen renders for the current task.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub position: usize,
    pub total: usize,
    pub kind: TaskKind,
    pub level: String,
    pub title: String,
    pub prompt: String,
    pub samples: Vec<Sample>,
    pub vacancy: Option<String>,
    pub answer: String,
    pub remaining: String,
    pub is_time_over: bool,
    pub stop_reason: Option<String>,
    pub show_cheat_warning: bool,
    pub can_go_previous: bool,
    pub can_go_next: bool,
    pub can_submit: bool,
    pub submit_label: &'static str,
}

enum LoopInput {
    Violation(ViolationEvent),
    Tick,
    Command(Option<SessionCommand>),
}

pub struct SessionController {
    token: String,
    attempt_id: Uuid,
    api: Arc<dyn SessionApi>,
    store: Arc<dyn StartTimeStore>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    state: SessionState,
    catalog: TaskCatalog,
    answers: AnswerStore,
    current_index: usize,
    timer: Option<CountdownTimer>,
    watchdog: IntegrityWatchdog,
    stop_reason: Option<String>,
    route: Option<Route>,
    teardown: AbortHandle,
    registration: Option<AbortRegistration>,
    counted_active: bool,
}

impl SessionController {
    pub fn new(
        token: impl Into<String>,
        api: Arc<dyn SessionApi>,
        store: Arc<dyn StartTimeStore>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        let (teardown, registration) = AbortHandle::new_pair();
        Self {
            token: token.into(),
            attempt_id: Uuid::new_v4(),
            api,
            store,
            clock,
            settings,
            state: SessionState::Loading,
            catalog: TaskCatalog::default(),
            answers: AnswerStore::new(),
            current_index: 0,
            timer: None,
            watchdog: IntegrityWatchdog::new(),
            stop_reason: None,
            route: None,
            teardown,
            registration: Some(registration),
            counted_active: false,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn load_error(&self) -> Option<&LoadError> {
        match &self.state {
            SessionState::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state == SessionState::Stopped
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_task(&self) -> Option<&Task> {
        match self.state {
            SessionState::Loading | SessionState::Error(_) => None,
            _ => self.catalog.current(self.current_index),
        }
    }

    pub fn current_answer(&self) -> &str {
        if self.catalog.is_text_task(self.current_index) {
            self.answers.text_at(self.current_index)
        } else {
            self.answers.code_at(self.current_index)
        }
    }

    pub fn timer(&self) -> Option<&CountdownTimer> {
        self.timer.as_ref()
    }

    pub fn remaining_seconds(&self) -> Option<u64> {
        self.timer.as_ref().map(CountdownTimer::remaining_seconds)
    }

    /// Every violation seen so far, including signals dispatched after the
    /// session finished.
    pub fn violations(&self) -> Vec<ViolationEvent> {
        self.watchdog.events()
    }

    pub fn watchdog(&self) -> &IntegrityWatchdog {
        &self.watchdog
    }

    /// Where the session handed over to, once it did.
    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn signal_handle(&self) -> SignalHandle {
        self.watchdog.handle()
    }

    pub fn teardown_handle(&self) -> TeardownHandle {
        TeardownHandle(self.teardown.clone())
    }

    /// Single fetch of the session. A teardown before the response arrives
    /// leaves the state untouched.
    pub async fn load(&mut self) -> &SessionState {
        let Some(registration) = self.registration.take() else {
            tracing::warn!("Session {} was already loaded", self.token);
            return &self.state;
        };

        self.state = SessionState::Loading;
        tracing::info!(
            "Loading interview session: token={}, attempt={}",
            self.token,
            self.attempt_id
        );

        let api = Arc::clone(&self.api);
        let token = self.token.clone();
        let fetch =
            async move { track_remote_call("fetch_session", api.fetch_session(&token)).await };

        match Abortable::new(fetch, registration).await {
            Err(Aborted) => {
                SESSION_LOADS_TOTAL.with_label_values(&["cancelled"]).inc();
                tracing::info!("Session load cancelled by teardown: token={}", self.token);
            }
            Ok(Ok(record)) => self.apply_record(record).await,
            Ok(Err(e)) => {
                let error = LoadError::from(&e);
                let outcome = if error == LoadError::NotFound {
                    "not_found"
                } else {
                    "failed"
                };
                SESSION_LOADS_TOTAL.with_label_values(&[outcome]).inc();
                tracing::error!("Failed to load interview {}: {}", self.token, e);
                self.state = SessionState::Error(error);
            }
        }

        &self.state
    }

    async fn apply_record(&mut self, record: SessionRecord) {
        self.catalog = TaskCatalog::from_record(record);
        self.answers.resize(self.catalog.len());
        self.current_index = 0;

        if self.catalog.is_empty() {
            SESSION_LOADS_TOTAL.with_label_values(&["empty"]).inc();
            tracing::warn!("Interview {} has no tasks", self.token);
            self.state = SessionState::Error(LoadError::Unavailable);
            return;
        }

        let timer = CountdownTimer::mount(
            self.store.as_ref(),
            &self.token,
            self.settings.duration_seconds,
            self.clock.now_ms(),
        )
        .await;
        self.timer = Some(timer);

        // signals from before activation stay in the log but never stop the session
        let early = self.watchdog.drain_pending();
        if early > 0 {
            tracing::debug!("{} violation(s) seen before activation", early);
        }
        self.state = SessionState::Active;

        SESSION_LOADS_TOTAL.with_label_values(&["loaded"]).inc();
        SESSIONS_ACTIVE.inc();
        self.counted_active = true;

        tracing::info!(
            "Interview loaded: token={}, coding_tasks={}, theory_tasks={}",
            self.token,
            self.catalog.coding_count(),
            self.catalog.theory_count()
        );
    }

    pub fn next(&mut self) -> bool {
        if self.state != SessionState::Active || self.catalog.is_empty() {
            return false;
        }
        if self.catalog.is_last(self.current_index) {
            return false;
        }
        self.current_index += 1;
        true
    }

    pub fn previous(&mut self) -> bool {
        if self.state != SessionState::Active || self.current_index == 0 {
            return false;
        }
        self.current_index -= 1;
        true
    }

    /// Replaces the answer of the current task (code or text by task kind).
    pub fn edit_answer(&mut self, value: impl Into<String>) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        let index = self.current_index;
        match self.catalog.get(index).map(|task| task.kind) {
            Some(TaskKind::Coding) => self.answers.set_code(index, value),
            Some(TaskKind::Theory) => self.answers.set_text(index, value),
            None => false,
        }
    }

    pub fn dismiss_warning(&self) {
        self.watchdog.dismiss_warning();
    }

    /// Save-and-advance on intermediate tasks; the single remote submission on
    /// the last one.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, SubmitRejection> {
        match self.state {
            SessionState::Active => {}
            SessionState::Stopped => return Err(SubmitRejection::Stopped),
            SessionState::Submitting => return Err(SubmitRejection::InProgress),
            _ => return Err(SubmitRejection::NotActive),
        }

        let index = self.current_index;
        let is_text = self
            .catalog
            .current(index)
            .map(Task::is_text)
            .ok_or(SubmitRejection::NoTask)?;
        if is_text && self.answers.text_at(index).trim().is_empty() {
            return Err(SubmitRejection::BlankAnswer);
        }

        if !self.catalog.is_last(index) {
            self.current_index += 1;
            tracing::debug!(
                "Answer {} saved, moving to task {}",
                index,
                self.current_index
            );
            return Ok(SubmitOutcome::Advanced {
                index: self.current_index,
            });
        }

        let payload = build_submission_payload(&self.catalog, &self.answers);
        let route = self.deliver(payload, SubmissionTrigger::Manual).await;
        Ok(SubmitOutcome::Finished(route))
    }

    /// Logs the event and, for the first violation of an active session, runs
    /// the stop sequence. Returns true when this call stopped the session.
    pub async fn handle_violation(&mut self, event: ViolationEvent) -> bool {
        self.watchdog.record(event.clone());
        self.react_to_violation(event).await
    }

    /// Stop decision for an event that is already in the log.
    async fn react_to_violation(&mut self, event: ViolationEvent) -> bool {
        if self.state != SessionState::Active {
            tracing::debug!(
                "Violation {} recorded while session is {}",
                event.kind,
                self.state.as_str()
            );
            return false;
        }
        if !self.watchdog.try_trip() {
            return false;
        }

        self.state = SessionState::Stopped;
        self.stop_reason = Some(STOP_REASON.to_string());
        if let Some(timer) = self.timer.as_mut() {
            timer.disarm();
        }
        tracing::warn!(
            "Interview stopped: token={}, violation={}, at={}",
            self.token,
            event.kind,
            event.time
        );

        report_violation(
            self.api.as_ref(),
            &self.token,
            &event,
            self.settings.report_attempts,
        )
        .await;

        // the violation forfeits whatever was typed so far
        self.deliver(SubmissionPayload::default(), SubmissionTrigger::Violation)
            .await;
        true
    }

    /// One countdown refresh against the wall clock.
    pub async fn tick(&mut self) -> Option<TimerEvent> {
        let now = self.clock.now();
        let event = self.timer.as_mut()?.tick(now)?;

        if event.is_expired() {
            self.on_time_expired().await;
        } else {
            tracing::debug!("{}", event.to_json());
        }
        Some(event)
    }

    async fn on_time_expired(&mut self) {
        match self.state {
            SessionState::Active => {}
            SessionState::Stopped => {
                tracing::debug!("Ignoring expiry of stopped session {}", self.token);
                return;
            }
            _ => return,
        }

        tracing::info!("Time is up for interview {}", self.token);
        if self.settings.submit_on_timeout {
            let payload = build_submission_payload(&self.catalog, &self.answers);
            self.deliver(payload, SubmissionTrigger::Timeout).await;
        } else {
            self.state = SessionState::Completed;
            self.finish(Route::Report { result: None }, SubmissionTrigger::Timeout);
        }
    }

    async fn deliver(&mut self, payload: SubmissionPayload, trigger: SubmissionTrigger) -> Route {
        let stopped = self.state == SessionState::Stopped;
        if !stopped {
            self.state = SessionState::Submitting;
        }

        let result = track_remote_call(
            "submit_session",
            self.api.submit_session(&self.token, &payload),
        )
        .await;

        let route = match result {
            Ok(result) => {
                SUBMISSIONS_TOTAL
                    .with_label_values(&[trigger.as_str(), "success"])
                    .inc();
                Route::Report {
                    result: Some(result),
                }
            }
            Err(e) => {
                SUBMISSIONS_TOTAL
                    .with_label_values(&[trigger.as_str(), "failed"])
                    .inc();
                tracing::error!(
                    "Submission ({}) failed for interview {}: {}",
                    trigger.as_str(),
                    self.token,
                    e
                );
                Route::Report { result: None }
            }
        };

        if !stopped {
            self.state = SessionState::Completed;
        }
        self.finish(route.clone(), trigger);
        route
    }

    fn finish(&mut self, route: Route, trigger: SubmissionTrigger) {
        if let Some(timer) = self.timer.as_mut() {
            timer.disarm();
        }
        self.release_active_gauge();
        SESSIONS_FINISHED_TOTAL
            .with_label_values(&[trigger.as_str()])
            .inc();

        tracing::info!(
            "Handing interview {} over to the report view (trigger={}, with_result={})",
            self.token,
            trigger.as_str(),
            route.submission_result().is_some()
        );
        self.route = Some(route);
    }

    pub fn teardown(&mut self) {
        self.teardown.abort();
        if let Some(timer) = self.timer.as_mut() {
            timer.disarm();
        }
        self.release_active_gauge();
        tracing::info!("Session torn down: token={}", self.token);
    }

    fn release_active_gauge(&mut self) {
        if self.counted_active {
            SESSIONS_ACTIVE.dec();
            self.counted_active = false;
        }
    }

    pub async fn apply(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Next => {
                self.next();
            }
            SessionCommand::Previous => {
                self.previous();
            }
            SessionCommand::Edit(value) => {
                self.edit_answer(value);
            }
            SessionCommand::Submit => {
                if let Err(reason) = self.submit().await {
                    tracing::debug!("Submit refused: {}", reason);
                }
            }
            SessionCommand::DismissWarning => self.dismiss_warning(),
            SessionCommand::Teardown => self.teardown(),
        }
    }

    /// Cooperative event loop over violations, countdown ticks and commands.
    /// Violations are polled first so a stop sequence always completes before
    /// any other path can submit. Returns the hand-over route, or `None` when
    /// the session was torn down.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) -> Option<Route> {
        if self.state != SessionState::Active {
            return self.route.clone();
        }

        let period = self.settings.tick_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if let Some(route) = self.route.clone() {
                self.watchdog.drain_pending();
                return Some(route);
            }

            let ticking = self.timer.as_ref().is_some_and(CountdownTimer::is_running);
            let input = tokio::select! {
                biased;
                Some(event) = self.watchdog.next_event() => LoopInput::Violation(event),
                _ = ticker.tick(), if ticking => LoopInput::Tick,
                command = commands.recv() => LoopInput::Command(command),
            };

            match input {
                LoopInput::Violation(event) => {
                    self.react_to_violation(event).await;
                }
                LoopInput::Tick => {
                    self.tick().await;
                }
                LoopInput::Command(None) | LoopInput::Command(Some(SessionCommand::Teardown)) => {
                    self.teardown();
                    return None;
                }
                LoopInput::Command(Some(command)) => self.apply(command).await,
            }
        }
    }

    pub fn view(&self) -> Option<SessionView> {
        let task = self.current_task()?;
        let index = self.catalog.clamp_index(self.current_index);
        let active = self.state == SessionState::Active;
        let is_text = task.is_text();
        let is_last = self.catalog.is_last(index);

        let answer = self.current_answer().to_string();
        let can_submit = active && !(is_text && answer.trim().is_empty());
        let remaining = self
            .remaining_seconds()
            .unwrap_or(self.settings.duration_seconds);

        let submit_label = if self.state == SessionState::Submitting {
            "Submitting..."
        } else if !is_last {
            "Submit and continue"
        } else if is_text {
            "Submit answer"
        } else {
            "Submit solution"
        };

        Some(SessionView {
            position: index + 1,
            total: self.catalog.len(),
            kind: task.kind,
            level: task.record.level().to_string(),
            title: task.title().to_string(),
            prompt: task.record.prompt().to_string(),
            samples: task.record.samples.clone(),
            vacancy: task.record.vacancy.clone(),
            answer,
            remaining: format_time(remaining as i64),
            is_time_over: remaining == 0,
            stop_reason: self.stop_reason.clone(),
            show_cheat_warning: self.watchdog.warning_visible()
                && self.state != SessionState::Stopped,
            can_go_previous: active && !self.catalog.is_first(index),
            can_go_next: active && !is_last,
            can_submit,
            submit_label,
        })
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.release_active_gauge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::TaskRecord;

    fn catalog(coding: &[&str], theory: &[&str]) -> TaskCatalog {
        TaskCatalog::from_record(SessionRecord {
            coding_tasks: coding
                .iter()
                .map(|level| TaskRecord::with_level(level, "solve"))
                .collect(),
            theory_tasks: theory
                .iter()
                .map(|level| TaskRecord::with_level(level, "explain"))
                .collect(),
        })
    }

    #[test]
    fn test_payload_projects_answers_by_level() {
        let catalog = catalog(&["easy"], &["hard"]);
        let mut answers = AnswerStore::new();
        answers.resize(catalog.len());
        answers.set_code(0, "print(1)");
        answers.set_text(1, "my approach");

        let payload = build_submission_payload(&catalog, &answers);

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({
                "coding_solutions": {"easy": "print(1)", "medium": "", "hard": ""},
                "theory_solutions": {"easy": "", "hard": "my approach"}
            })
        );
    }

    #[test]
    fn test_payload_drops_unknown_levels() {
        let catalog = catalog(&["Hard", "expert"], &["medium", "EASY"]);
        let mut answers = AnswerStore::new();
        answers.resize(catalog.len());
        answers.set_code(0, "a");
        answers.set_code(1, "b");
        answers.set_text(2, "c");
        answers.set_text(3, "d");

        let payload = build_submission_payload(&catalog, &answers);

        assert_eq!(payload.coding_solutions.hard, "a");
        assert_eq!(payload.coding_solutions.easy, "");
        assert_eq!(payload.coding_solutions.medium, "");
        assert_eq!(payload.theory_solutions.easy, "d");
        assert_eq!(payload.theory_solutions.hard, "");
    }

    #[test]
    fn test_untouched_code_is_submitted_empty() {
        let catalog = catalog(&["easy", "medium"], &[]);
        let mut answers = AnswerStore::new();
        answers.resize(catalog.len());
        answers.set_code(1, "done");

        let payload = build_submission_payload(&catalog, &answers);

        assert_eq!(payload.coding_solutions.easy, "");
        assert_eq!(payload.coding_solutions.medium, "done");
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config {
            duration_seconds: 90,
            tick_interval_ms: 250,
            submit_on_timeout: false,
            report_attempts: 5,
            ..Config::default()
        };
        let settings = SessionSettings::from(&config);
        assert_eq!(settings.duration_seconds, 90);
        assert_eq!(settings.tick_interval, Duration::from_millis(250));
        assert!(!settings.submit_on_timeout);
        assert_eq!(settings.report_attempts, 5);
    }
}
