//! Core layer: status classification, success policy and progress accounting.

mod progress;
mod status;
mod success;

pub use progress::ProgressTracker;
pub use status::is_successful;
pub use success::ensure_success;
