pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{ApiError, LoadError, SubmitRejection};
pub use models::{Route, SessionState};
pub use services::session_service::{SessionCommand, SessionController, SessionSettings};
pub use services::SessionRuntime;
