use chrono::{DateTime, TimeZone, Utc};

/// Wall-clock source for the countdown and violation timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// `mm:ss`, zero padded; negative input renders as `00:00`.
pub fn format_time(total_seconds: i64) -> String {
    let safe = total_seconds.max(0);
    format!("{:02}:{:02}", safe / 60, safe % 60)
}
