use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::metrics::{track_remote_call, ANTICHEAT_VIOLATIONS_TOTAL, VIOLATION_REPORTS_TOTAL};
use crate::models::anticheat::{
    BrowserSignal, DefaultAction, ViolationEvent, ViolationKind, WatchdogState,
};
use crate::services::api_client::SessionApi;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

pub const STOP_REASON: &str =
    "Interview stopped due to a rules violation (suspicious activity detected).";

/// Maps a raw browser signal to the violation it represents, if any.
pub fn classify(signal: &BrowserSignal) -> Option<ViolationKind> {
    match signal {
        BrowserSignal::VisibilityChange { hidden: true } => Some(ViolationKind::TabHidden),
        BrowserSignal::VisibilityChange { hidden: false } => None,
        BrowserSignal::WindowBlur => Some(ViolationKind::WindowBlur),
        BrowserSignal::ContextMenu => Some(ViolationKind::ContextMenu),
        BrowserSignal::Copy => Some(ViolationKind::CopyAttempt),
        BrowserSignal::Paste => Some(ViolationKind::PasteAttempt),
        BrowserSignal::KeyDown(key) if key.opens_devtools() => Some(ViolationKind::DevtoolsAttempt),
        BrowserSignal::KeyDown(_) => None,
    }
}

/// Append-only violation log shared by the watchdog and every signal source.
#[derive(Debug, Default)]
struct ViolationLog {
    events: Mutex<Vec<ViolationEvent>>,
    warning_visible: AtomicBool,
}

impl ViolationLog {
    fn push(&self, event: ViolationEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(_) => tracing::error!("Violation log lock poisoned, dropping {} event", event.kind),
        }
        self.warning_visible.store(true, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Vec<ViolationEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

/// Sending side given to every signal source.
#[derive(Debug, Clone)]
pub struct SignalHandle {
    log: Arc<ViolationLog>,
    tx: mpsc::UnboundedSender<ViolationEvent>,
}

impl SignalHandle {
    /// Classifies and posts a signal. The returned action has to be applied by
    /// the caller before its handler returns.
    pub fn dispatch(&self, signal: BrowserSignal) -> DefaultAction {
        self.dispatch_at(signal, Utc::now())
    }

    /// Logs the violation right away; the queued copy only feeds the stop
    /// decision.
    pub fn dispatch_at(&self, signal: BrowserSignal, at: DateTime<Utc>) -> DefaultAction {
        let Some(kind) = classify(&signal) else {
            return DefaultAction::Allow;
        };

        ANTICHEAT_VIOLATIONS_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
        tracing::debug!("Violation signal: {}", kind);

        let event = ViolationEvent::new(kind, at);
        self.log.push(event.clone());
        if self.tx.send(event).is_err() {
            tracing::debug!("Watchdog is gone, {} event only logged", kind);
        }

        if kind.suppresses_default() {
            DefaultAction::Prevent
        } else {
            DefaultAction::Allow
        }
    }
}

/// Violation log plus the one-shot Armed -> Tripped guard.
#[derive(Debug)]
pub struct IntegrityWatchdog {
    state: WatchdogState,
    log: Arc<ViolationLog>,
    tx: mpsc::UnboundedSender<ViolationEvent>,
    rx: mpsc::UnboundedReceiver<ViolationEvent>,
}

impl Default for IntegrityWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrityWatchdog {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: WatchdogState::Armed,
            log: Arc::new(ViolationLog::default()),
            tx,
            rx,
        }
    }

    pub fn handle(&self) -> SignalHandle {
        SignalHandle {
            log: Arc::clone(&self.log),
            tx: self.tx.clone(),
        }
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn is_tripped(&self) -> bool {
        self.state == WatchdogState::Tripped
    }

    pub fn events(&self) -> Vec<ViolationEvent> {
        self.log.snapshot()
    }

    pub fn warning_visible(&self) -> bool {
        self.log.warning_visible.load(Ordering::SeqCst)
    }

    pub fn dismiss_warning(&self) {
        self.log.warning_visible.store(false, Ordering::SeqCst);
    }

    /// Appends an event that did not come through a `SignalHandle`.
    pub fn record(&self, event: ViolationEvent) {
        self.log.push(event);
    }

    /// Armed -> Tripped. True only for the call that performs the transition.
    pub fn try_trip(&mut self) -> bool {
        match self.state {
            WatchdogState::Armed => {
                self.state = WatchdogState::Tripped;
                true
            }
            WatchdogState::Tripped => false,
        }
    }

    /// Next queued event; it is already in the log.
    pub async fn next_event(&mut self) -> Option<ViolationEvent> {
        self.rx.recv().await
    }

    /// Discards queued events without acting on them.
    pub fn drain_pending(&mut self) -> usize {
        let mut drained = 0;
        while self.rx.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }
}

/// Best-effort delivery of a violation; failures are logged and swallowed.
pub async fn report_violation(
    api: &dyn SessionApi,
    token: &str,
    event: &ViolationEvent,
    attempts: usize,
) -> bool {
    let result = track_remote_call(
        "report_violation",
        retry_async_with_config(RetryConfig::best_effort(attempts), || {
            api.report_violation(token, event)
        }),
    )
    .await;

    match result {
        Ok(()) => {
            VIOLATION_REPORTS_TOTAL.with_label_values(&["delivered"]).inc();
            tracing::info!("Violation reported: token={}, type={}", token, event.kind);
            true
        }
        Err(e) => {
            VIOLATION_REPORTS_TOTAL.with_label_values(&["failed"]).inc();
            tracing::warn!(
                "Failed to report violation {} for token {}: {}",
                event.kind,
                token,
                e
            );
            false
        }
    }
}
