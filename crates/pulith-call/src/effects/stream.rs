//! Lazy, single-value stream over a [`Call`].
//!
//! Subscribing does nothing on its own. The first non-zero
//! [`request`](Subscription::request) executes a fresh copy of the call
//! synchronously on the requesting thread and delivers either
//! `on_next` + `on_completed` or `on_error`. Later demand signals, concurrent
//! or not, are ignored.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::ensure_success;
use crate::effects::call::Call;
use crate::effects::response::Response;
use crate::error::Error;

/// Receiver of a stream's terminal outcome.
///
/// A subscriber sees either `on_next` followed by `on_completed`, or a single
/// `on_error`, or nothing at all if it unsubscribed first.
pub trait Subscriber: Send + 'static {
    fn on_next(&mut self, response: Response);
    fn on_error(&mut self, error: Error);
    fn on_completed(&mut self);
}

/// Single-value stream produced by [`CallExt::as_stream`](crate::CallExt::as_stream).
pub struct ResponseStream<C> {
    call: C,
    check_success: bool,
}

impl<C: Call> ResponseStream<C> {
    pub(crate) fn new(call: C, check_success: bool) -> Self {
        Self {
            call,
            check_success,
        }
    }

    /// Attach `subscriber` without signalling demand.
    ///
    /// The call is cloned here, so every subscription gets its own execution.
    pub fn subscribe<S: Subscriber>(&self, subscriber: S) -> Subscription {
        let subscriber: Box<dyn Subscriber> = if self.check_success {
            Box::new(SuccessCheck::new(subscriber))
        } else {
            Box::new(subscriber)
        };

        let arbiter = RequestArbiter {
            call: self.call.clone_call(),
            subscriber: Mutex::new(Some(subscriber)),
            requested: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
        };
        Subscription {
            producer: Arc::new(arbiter),
        }
    }

    /// Subscribe and immediately signal demand.
    ///
    /// Blocks the calling thread for the duration of the network call.
    pub fn run<S: Subscriber>(&self, subscriber: S) -> Subscription {
        let subscription = self.subscribe(subscriber);
        subscription.request(1);
        subscription
    }
}

trait Producer: Send + Sync {
    fn request(&self, n: u64);
    fn unsubscribe(&self);
    fn is_unsubscribed(&self) -> bool;
}

/// Demand gate for one subscription.
///
/// `requested` flips false to true exactly once, which is what keeps the call
/// from running twice when demand signals race each other or a cancel.
/// `terminated` is set once an outcome is handed to the subscriber; later
/// unsubscribes leave the call alone.
struct RequestArbiter<C> {
    call: C,
    subscriber: Mutex<Option<Box<dyn Subscriber>>>,
    requested: AtomicBool,
    terminated: AtomicBool,
}

impl<C> RequestArbiter<C> {
    fn take_subscriber(&self) -> Option<Box<dyn Subscriber>> {
        self.subscriber
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<C: Call> Producer for RequestArbiter<C> {
    fn request(&self, n: u64) {
        if n == 0
            || self
                .requested
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return;
        }

        let Some(mut subscriber) = self.take_subscriber() else {
            return;
        };

        if self.is_unsubscribed() {
            tracing::debug!(url = %self.call.request().url, "unsubscribed before demand, not executing");
            return;
        }

        match self.call.execute() {
            Ok(response) => {
                if self.is_unsubscribed() {
                    tracing::debug!(status = response.status(), "unsubscribed during execution, closing response");
                    response.close();
                    return;
                }
                self.terminated.store(true, Ordering::Release);
                subscriber.on_next(response);
                subscriber.on_completed();
            }
            Err(e) => {
                if self.is_unsubscribed() {
                    tracing::debug!(error = %e, "unsubscribed during execution, dropping failure");
                    return;
                }
                self.terminated.store(true, Ordering::Release);
                subscriber.on_error(Error::transport(e));
            }
        }
    }

    fn unsubscribe(&self) {
        if self.terminated.load(Ordering::Acquire) {
            return;
        }
        self.call.cancel();
        drop(self.take_subscriber());
    }

    fn is_unsubscribed(&self) -> bool {
        self.call.is_canceled()
    }
}

/// Handle to one subscription: signals demand and cancels.
///
/// Cheap to clone; demand and cancellation may come from different threads.
#[derive(Clone)]
pub struct Subscription {
    producer: Arc<dyn Producer>,
}

impl Subscription {
    /// Signal demand for `n` values. Only the first non-zero signal has an effect.
    pub fn request(&self, n: u64) {
        self.producer.request(n);
    }

    /// Cancel the underlying call. No effect after a terminal outcome.
    pub fn unsubscribe(&self) {
        self.producer.unsubscribe();
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.producer.is_unsubscribed()
    }

    /// Whether both handles refer to the same subscription.
    pub fn same_as(&self, other: &Subscription) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.producer), Arc::as_ptr(&other.producer))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("unsubscribed", &self.is_unsubscribed())
            .finish()
    }
}

/// Turns a non-2xx `on_next` into `on_error` and swallows the completion that follows.
struct SuccessCheck<S> {
    inner: S,
    rejected: bool,
}

impl<S> SuccessCheck<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            rejected: false,
        }
    }
}

impl<S: Subscriber> Subscriber for SuccessCheck<S> {
    fn on_next(&mut self, response: Response) {
        match ensure_success(response, None) {
            Ok(response) => self.inner.on_next(response),
            Err(e) => {
                self.rejected = true;
                self.inner.on_error(e);
            }
        }
    }

    fn on_error(&mut self, error: Error) {
        self.inner.on_error(error);
    }

    fn on_completed(&mut self) {
        if !self.rejected {
            self.inner.on_completed();
        }
    }
}
