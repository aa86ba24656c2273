use chrono::{DateTime, Utc};

use crate::models::timer::{TimeExpired, TimerEvent, TimerTick};
use crate::services::start_time_store::StartTimeStore;

pub const DEFAULT_DURATION_SECONDS: u64 = 60 * 60;

/// Remaining whole seconds for a countdown anchored at `started_at_ms`.
pub fn remaining_at(started_at_ms: i64, duration_seconds: u64, now_ms: i64) -> u64 {
    let elapsed_ms = now_ms.saturating_sub(started_at_ms).max(0);
    let elapsed_seconds = (elapsed_ms / 1000) as u64;
    duration_seconds.saturating_sub(elapsed_seconds)
}

/// Session countdown. The persisted start timestamp is the source of truth;
/// ticks only refresh the derived value.
#[derive(Debug, Clone)]
pub struct CountdownTimer {
    token: String,
    started_at_ms: i64,
    duration_seconds: u64,
    remaining_seconds: u64,
    persisted: bool,
    finished: bool,
}

impl CountdownTimer {
    /// Reads (or initializes) the start time for `token`. Storage failures
    /// fall back to an in-memory anchor at `now_ms`.
    pub async fn mount(
        store: &dyn StartTimeStore,
        token: &str,
        duration_seconds: u64,
        now_ms: i64,
    ) -> Self {
        let (started_at_ms, persisted) = match store.read_or_init(token, now_ms).await {
            Ok(started_at_ms) => (started_at_ms, true),
            Err(e) => {
                tracing::warn!(
                    "Start time storage unavailable for token {} ({:#}); countdown will not survive a reload",
                    token,
                    e
                );
                (now_ms, false)
            }
        };

        let remaining_seconds = remaining_at(started_at_ms, duration_seconds, now_ms);
        tracing::info!(
            "Countdown mounted: token={}, started_at_ms={}, remaining={}s of {}s",
            token,
            started_at_ms,
            remaining_seconds,
            duration_seconds
        );

        Self {
            token: token.to_string(),
            started_at_ms,
            duration_seconds,
            remaining_seconds,
            persisted,
            finished: false,
        }
    }

    pub fn started_at_ms(&self) -> i64 {
        self.started_at_ms
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.duration_seconds - self.remaining_seconds
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn is_time_over(&self) -> bool {
        self.remaining_seconds == 0
    }

    /// False once expiry was reported or the timer was disarmed; no further
    /// ticks should be scheduled.
    pub fn is_running(&self) -> bool {
        !self.finished
    }

    /// Stops the countdown without ever reporting expiry.
    pub fn disarm(&mut self) {
        self.finished = true;
    }

    /// One refresh. Yields `TimeExpired` exactly once, then `None` forever.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<TimerEvent> {
        if self.finished {
            return None;
        }

        let derived = remaining_at(
            self.started_at_ms,
            self.duration_seconds,
            now.timestamp_millis(),
        );
        // a clock stepping backwards must not add time
        self.remaining_seconds = self.remaining_seconds.min(derived);

        if self.remaining_seconds == 0 {
            self.finished = true;
            tracing::info!("Timer expired: token={}", self.token);
            return Some(TimerEvent::TimeExpired(TimeExpired {
                token: self.token.clone(),
                timestamp: now,
                message: "Time limit exceeded".to_string(),
            }));
        }

        Some(TimerEvent::TimerTick(TimerTick {
            token: self.token.clone(),
            remaining_seconds: self.remaining_seconds,
            elapsed_seconds: self.elapsed_seconds(),
            total_seconds: self.duration_seconds,
            timestamp: now,
        }))
    }
}
