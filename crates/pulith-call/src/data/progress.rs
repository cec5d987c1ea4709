use std::sync::Arc;

/// Observer invoked on every read from a progress-decorated body.
///
/// The listener receives a reference to avoid cloning on every invocation.
/// It runs on whichever thread reads the body, so it must be cheap.
pub type ProgressListener = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Read progress of a single response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Cumulative bytes handed to the reader so far.
    pub bytes_read: u64,

    /// Declared body length, if the server sent one.
    ///
    /// This may be `None` when the response uses chunked transfer encoding.
    pub total_bytes: Option<u64>,

    /// Set on the read that finishes the body.
    pub done: bool,
}

impl Progress {
    /// Calculate the percentage of completion.
    ///
    /// Returns `None` if `total_bytes` is unknown.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                if self.done { 100.0 } else { 0.0 }
            } else {
                (self.bytes_read as f64 / total as f64) * 100.0
            }
        })
    }
}
