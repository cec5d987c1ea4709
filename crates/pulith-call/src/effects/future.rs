//! Await a [`Call`] from async code.
//!
//! The call is enqueued on the network client's worker context and its
//! completion handler fills a single-assignment slot the future waits on.
//! Dropping the future cancels the call. An outcome that arrives after the
//! future is gone is discarded, and if it was a response its body is closed.

use std::future::Future;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::future::FusedFuture;
use tokio::sync::oneshot;

use crate::core::ensure_success;
use crate::effects::call::Call;
use crate::effects::response::Response;
use crate::error::{CallSite, Error, Result};

type Slot = oneshot::Sender<io::Result<Response>>;

/// Future returned by [`CallExt::await_response`](crate::CallExt::await_response)
/// and [`CallExt::await_success`](crate::CallExt::await_success).
///
/// Resolves exactly once. Polling again after it resolved panics.
#[must_use = "futures do nothing unless polled; dropping this one cancels the call"]
pub struct ResponseFuture<C: Call> {
    rx: oneshot::Receiver<io::Result<Response>>,
    guard: CancelOnDrop<C>,
    call_site: Option<CallSite>,
    check_success: bool,
    terminated: bool,
}

impl<C: Call> ResponseFuture<C> {
    pub(crate) fn new(call: C, call_site: CallSite, check_success: bool) -> Self {
        let (tx, rx) = oneshot::channel();
        tracing::debug!(
            method = %call.request().method,
            url = %call.request().url,
            %call_site,
            "enqueueing call"
        );
        call.enqueue(Box::new(move |outcome| deliver(tx, outcome)));

        Self {
            rx,
            guard: CancelOnDrop::new(call),
            call_site: Some(call_site),
            check_success,
            terminated: false,
        }
    }

    /// The call being awaited.
    pub fn call(&self) -> &C {
        &self.guard.call
    }
}

/// Completion handler body. Runs on the network client's worker context.
fn deliver(tx: Slot, outcome: io::Result<Response>) {
    match outcome {
        Ok(response) => {
            if let Err(Ok(response)) = tx.send(Ok(response)) {
                tracing::debug!(status = response.status(), "awaiting task is gone, closing response");
                response.close();
            }
        }
        Err(e) => {
            if tx.is_closed() {
                tracing::debug!(error = %e, "awaiting task is gone, discarding failure");
                return;
            }
            let _ = tx.send(Err(e));
        }
    }
}

impl<C: Call> Future for ResponseFuture<C> {
    type Output = Result<Response>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = ready!(Pin::new(&mut this.rx).poll(cx));

        this.guard.disarm();
        this.terminated = true;
        let call_site = this.call_site.take();

        let result = match outcome {
            Ok(Ok(response)) if this.check_success => ensure_success(response, call_site),
            Ok(Ok(response)) => Ok(response),
            Ok(Err(source)) => Err(Error::Transport { source, call_site }),
            Err(_) => Err(Error::Transport {
                source: io::Error::other("call finished without reporting an outcome"),
                call_site,
            }),
        };
        Poll::Ready(result)
    }
}

impl<C: Call> FusedFuture for ResponseFuture<C> {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

// The call is never pinned; only the receiver is polled.
impl<C: Call> Unpin for ResponseFuture<C> {}

/// Cancels the call when the awaiting task goes away before completion.
struct CancelOnDrop<C: Call> {
    call: C,
    armed: bool,
}

impl<C: Call> CancelOnDrop<C> {
    fn new(call: C) -> Self {
        Self { call, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<C: Call> Drop for CancelOnDrop<C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!(url = %self.call.request().url, "awaiting task dropped, cancelling call");
        if panic::catch_unwind(AssertUnwindSafe(|| self.call.cancel())).is_err() {
            tracing::warn!(url = %self.call.request().url, "ignoring panic raised while cancelling call");
        }
    }
}
