use std::io;

use crate::data::{CacheMode, ProgressListener, Request};
use crate::effects::future::ResponseFuture;
use crate::effects::progress::ProgressCall;
use crate::effects::response::Response;
use crate::effects::stream::ResponseStream;
use crate::error::CallSite;

/// Completion handler registered with [`Call::enqueue`].
///
/// Invoked at most once, on a context owned by the network client.
pub type Completion = Box<dyn FnOnce(io::Result<Response>) + Send + 'static>;

/// One prepared, not yet executed request.
///
/// A call instance runs at most once; a second `execute` or `enqueue` fails
/// with an "already executed" transport error. Use
/// [`clone_call`](Call::clone_call) to obtain an independent copy that can
/// run again.
///
/// # Implementations
///
/// - [`ReqwestCall`](crate::ReqwestCall): production implementation using `reqwest`
/// - [`MockCall`](crate::mock::MockCall): scripted implementation for tests
pub trait Call: Send + Sync + 'static {
    fn request(&self) -> &Request;

    /// Independent, not yet executed copy of this call.
    fn clone_call(&self) -> Self
    where
        Self: Sized;

    /// Run the request on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns the transport failure (connection error, timeout, cancellation).
    /// Non-2xx statuses are not errors at this level.
    fn execute(&self) -> io::Result<Response>;

    /// Run the request on the client's own worker context and hand the
    /// outcome to `completion`.
    fn enqueue(&self, completion: Completion);

    /// Cancel the call. Idempotent and safe to race with execution.
    fn cancel(&self);

    fn is_canceled(&self) -> bool;
}

/// Network client: turns requests into calls.
pub trait CallFactory {
    type Call: Call;

    fn new_call(&self, request: Request) -> Self::Call;
}

/// Consumption models for a [`Call`].
pub trait CallExt: Call + Sized {
    /// Lazy single-value stream. Each subscription runs its own copy of the
    /// call, and only once demand is signalled.
    fn as_stream(self) -> ResponseStream<Self> {
        ResponseStream::new(self, false)
    }

    /// Like [`as_stream`](CallExt::as_stream), but a non-2xx response is
    /// closed and delivered as [`Error::Http`](crate::Error::Http).
    fn as_success_stream(self) -> ResponseStream<Self> {
        ResponseStream::new(self, true)
    }

    /// Enqueue the call and await its response.
    ///
    /// Dropping the returned future before it resolves cancels the call.
    /// Transport errors carry the location of this method's caller.
    #[track_caller]
    fn await_response(self) -> ResponseFuture<Self> {
        ResponseFuture::new(self, CallSite::capture(), false)
    }

    /// Like [`await_response`](CallExt::await_response), but a non-2xx
    /// response is closed and reported as [`Error::Http`](crate::Error::Http).
    #[track_caller]
    fn await_success(self) -> ResponseFuture<Self> {
        ResponseFuture::new(self, CallSite::capture(), true)
    }
}

impl<C: Call> CallExt for C {}

pub trait CallFactoryExt: CallFactory {
    /// Build a call that skips any response cache and reports body read
    /// progress to `listener`.
    fn new_cacheless_call_with_progress(
        &self,
        request: Request,
        listener: ProgressListener,
    ) -> ProgressCall<Self::Call> {
        let call = self.new_call(request.cache(CacheMode::Bypass));
        ProgressCall::new(call, listener)
    }
}

impl<F: CallFactory> CallFactoryExt for F {}
