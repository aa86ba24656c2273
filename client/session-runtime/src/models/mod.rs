use crate::error::LoadError;
use crate::utils::path::encode_segment;

pub mod answer;
pub mod anticheat;
pub mod task;
pub mod timer;

pub use answer::{SubmissionPayload, SubmissionResult};
pub use anticheat::{BrowserSignal, DefaultAction, ViolationEvent, ViolationKind};
pub use task::{SessionRecord, Task, TaskKind, TaskRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    Error(LoadError),
    Active,
    Stopped,
    Submitting,
    Completed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Error(_) => "error",
            SessionState::Active => "active",
            SessionState::Stopped => "stopped",
            SessionState::Submitting => "submitting",
            SessionState::Completed => "completed",
        }
    }
}

/// Outbound navigation target, owned by the hosting router.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Consent,
    Interview,
    Declined,
    Report { result: Option<SubmissionResult> },
}

impl Route {
    pub fn path(&self, token: &str) -> String {
        let token = encode_segment(token);
        match self {
            Route::Consent => format!("/session/{}", token),
            Route::Interview => format!("/session/{}/interview", token),
            Route::Declined => format!("/session/{}/declined", token),
            Route::Report { .. } => format!("/session/{}/report", token),
        }
    }

    pub fn submission_result(&self) -> Option<&SubmissionResult> {
        match self {
            Route::Report { result } => result.as_ref(),
            _ => None,
        }
    }
}
