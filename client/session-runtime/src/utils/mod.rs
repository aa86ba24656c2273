pub mod path;
pub mod retry;
pub mod time;
