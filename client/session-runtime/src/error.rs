use reqwest::StatusCode;
use thiserror::Error;

/// Failure of one of the remote interview endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("interview not found")]
    NotFound,

    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid base url {0}")]
    InvalidBaseUrl(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }
}

/// Blocking load failure. The `Display` text is what the candidate sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Interview not found for this token.")]
    NotFound,

    #[error("Failed to load interview. Try refreshing the page.")]
    Generic,

    #[error("Interview data is unavailable.")]
    Unavailable,
}

impl LoadError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<&ApiError> for LoadError {
    fn from(err: &ApiError) -> Self {
        if err.is_not_found() {
            LoadError::NotFound
        } else {
            LoadError::Generic
        }
    }
}

/// Reason a submit request was refused without touching the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitRejection {
    #[error("interview is stopped")]
    Stopped,

    #[error("submission already in progress")]
    InProgress,

    #[error("interview is not active")]
    NotActive,

    #[error("no task to submit")]
    NoTask,

    #[error("answer is empty")]
    BlankAnswer,
}
