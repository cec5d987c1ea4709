use std::fmt;
use std::io::{self, Read};

use crate::core::ProgressTracker;
use crate::data::{ProgressListener, Request};
use crate::effects::body::{Body, BoxRead};
use crate::effects::call::{Call, Completion};
use crate::effects::response::Response;

/// Reader that reports cumulative progress to a listener.
///
/// Content passes through unmodified. Reads into an empty buffer are not
/// reported, since a zero return there does not mean end of stream.
pub struct ProgressReader {
    inner: BoxRead,
    tracker: ProgressTracker,
    listener: ProgressListener,
}

impl ProgressReader {
    pub fn new(inner: BoxRead, total_bytes: Option<u64>, listener: ProgressListener) -> Self {
        Self {
            inner,
            tracker: ProgressTracker::new(total_bytes),
            listener,
        }
    }
}

impl Read for ProgressReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if buf.is_empty() {
            return Ok(n);
        }
        if let Some(progress) = self.tracker.record(n) {
            (self.listener)(&progress);
        }
        Ok(n)
    }
}

/// Decorate `body` so every read is reported to `listener`.
pub(crate) fn track_body(body: Body, listener: ProgressListener) -> Body {
    let total = body.content_length();
    body.map_reader(|reader| Box::new(ProgressReader::new(reader, total, listener)))
}

/// Call decorator produced by
/// [`CallFactoryExt::new_cacheless_call_with_progress`](crate::CallFactoryExt::new_cacheless_call_with_progress).
///
/// Every response it produces, through either `execute` or `enqueue`, carries
/// a progress-reporting body. Everything else is delegated.
pub struct ProgressCall<C> {
    inner: C,
    listener: ProgressListener,
}

impl<C: Call> ProgressCall<C> {
    pub fn new(inner: C, listener: ProgressListener) -> Self {
        Self { inner, listener }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: Call> Call for ProgressCall<C> {
    fn request(&self) -> &Request {
        self.inner.request()
    }

    fn clone_call(&self) -> Self {
        Self::new(self.inner.clone_call(), self.listener.clone())
    }

    fn execute(&self) -> io::Result<Response> {
        let listener = self.listener.clone();
        self.inner
            .execute()
            .map(|response| response.map_body(|body| track_body(body, listener)))
    }

    fn enqueue(&self, completion: Completion) {
        let listener = self.listener.clone();
        self.inner.enqueue(Box::new(move |outcome| {
            completion(outcome.map(|response| response.map_body(|body| track_body(body, listener))))
        }));
    }

    fn cancel(&self) {
        self.inner.cancel();
    }

    fn is_canceled(&self) -> bool {
        self.inner.is_canceled()
    }
}

impl<C> fmt::Debug for ProgressCall<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressCall").finish_non_exhaustive()
    }
}
