//! Immutable data types shared by the bridges and the network client.
//!
//! Requests, progress snapshots and client configuration. None of these
//! types perform I/O.

pub mod options;
pub mod progress;
pub mod request;

pub use options::ClientOptions;
pub use progress::{Progress, ProgressListener};
pub use request::{CacheMode, JSON_MIME, Method, Request};
