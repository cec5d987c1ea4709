//! Error types for pulith-call.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::io;
use std::panic::Location;

use thiserror::Error;

/// Where an awaited call was issued.
///
/// Completion callbacks fire on the network client's worker threads, so a
/// stack captured there says nothing about who asked for the request. The
/// await bridge records this marker before enqueueing and stamps it onto any
/// error produced on the response path.
pub struct CallSite {
    location: &'static Location<'static>,
    stack: Backtrace,
}

impl CallSite {
    /// Capture the caller's location. Propagates through `#[track_caller]` frames.
    #[track_caller]
    pub fn capture() -> Self {
        Self {
            location: Location::caller(),
            stack: Backtrace::capture(),
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Stack at the moment the await began. Empty unless `RUST_BACKTRACE` is set.
    pub fn stack(&self) -> &Backtrace {
        &self.stack
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location)
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("CallSite");
        dbg.field("location", &format_args!("{}", self.location));
        if self.stack.status() == BacktraceStatus::Captured {
            dbg.field("stack", &format_args!("\n{}", self.stack));
        }
        dbg.finish()
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The network client failed to produce a response.
    #[error("transport error: {source}")]
    Transport {
        #[source]
        source: io::Error,
        call_site: Option<CallSite>,
    },

    /// The server answered with a non-2xx status. The body has already been closed.
    #[error("HTTP error {code}")]
    Http {
        code: u16,
        call_site: Option<CallSite>,
    },

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn transport(source: io::Error) -> Self {
        Error::Transport {
            source,
            call_site: None,
        }
    }

    /// Status code carried by an [`Error::Http`].
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Http { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    pub fn is_http(&self) -> bool {
        matches!(self, Error::Http { .. })
    }

    pub fn call_site(&self) -> Option<&CallSite> {
        match self {
            Error::Transport { call_site, .. } | Error::Http { call_site, .. } => call_site.as_ref(),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::transport(e)
    }
}
