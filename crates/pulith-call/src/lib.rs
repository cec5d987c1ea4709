//! Single-value stream and async bridges over one-shot HTTP calls.
//!
//! A [`Call`] is one prepared request that runs at most once, either blocking
//! on the calling thread or on the network client's own worker context. This
//! crate adapts it to two consumption models:
//!
//! - **Stream**: [`CallExt::as_stream`] gives a lazy [`ResponseStream`] that
//!   executes on the first demand signal and emits one response, or one error.
//! - **Await**: [`CallExt::await_response`] gives a [`ResponseFuture`] that
//!   enqueues the call and resolves with its outcome. Dropping the future
//!   cancels the call.
//!
//! Both have a success-checking form that closes non-2xx responses and reports
//! them as [`Error::Http`]. [`CallFactoryExt::new_cacheless_call_with_progress`]
//! builds calls whose bodies report read progress.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - `data` - Immutable requests, progress snapshots and client options
//! - `core` - Pure transformations: status classification, success policy, progress accounting
//! - `effects` - Calls, bodies, the bridges and the `reqwest` client
//!
//! # Example
//!
//! ```no_run
//! use pulith_call::{CallExt, CallFactory, ReqwestClient, Request};
//!
//! # async fn run() -> pulith_call::Result<()> {
//! #[derive(serde::Deserialize)]
//! struct Release {
//!     tag_name: String,
//! }
//!
//! let client = ReqwestClient::new()?;
//! let call = client.new_call(Request::get("https://api.github.com/repos/rust-lang/rust/releases/latest"));
//! let release: Release = call.await_success().await?.parse_as()?;
//! println!("{}", release.tag_name);
//! # Ok(())
//! # }
//! ```

mod core;
mod data;
mod effects;
mod error;

pub use core::{ProgressTracker, ensure_success, is_successful};
pub use data::{CacheMode, ClientOptions, JSON_MIME, Method, Progress, ProgressListener, Request};
pub use effects::mock;
pub use effects::{
    Body, BoxRead, Call, CallExt, CallFactory, CallFactoryExt, Completion, ProgressCall, ProgressReader,
    Response, ResponseFuture, ResponseStream, Subscriber, Subscription, Subscriptions, parse_as,
};

#[cfg(feature = "reqwest")]
pub use effects::{ReqwestCall, ReqwestClient};

pub use error::{CallSite, Error, Result};
