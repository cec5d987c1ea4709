//! Scripted call implementation for tests.
//!
//! A [`MockScript`] describes the outcome every call built from it produces.
//! Calls built from one script share a [`MockHandle`], which counts
//! executions, cancellations and body closes across all clones, and lets a
//! test fire deferred completions or release held executions.

use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use bytes::Bytes;

use crate::data::Request;
use crate::effects::body::Body;
use crate::effects::call::{Call, CallFactory, Completion};
use crate::effects::response::Response;

/// What a scripted call produces.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Respond { status: u16, body: Bytes },
    Fail { kind: io::ErrorKind, message: String },
}

/// How `enqueue` hands the outcome to the completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// Complete on the enqueueing thread before `enqueue` returns.
    #[default]
    Inline,

    /// Hold the completion until [`MockHandle::complete_pending`]. The outcome
    /// is produced even if the call was cancelled meanwhile, like a response
    /// already on the wire when the cancel arrives.
    Deferred,

    /// Complete on a freshly spawned thread.
    Thread,

    /// Drop the completion without invoking it.
    Lost,
}

#[derive(Debug, Clone)]
pub struct MockScript {
    outcome: MockOutcome,
    headers: Vec<(String, String)>,
    dispatch: Dispatch,
    chunk_size: Option<usize>,
    declare_length: bool,
    held: bool,
    panic_on_cancel: bool,
}

impl MockScript {
    pub fn respond(status: u16, body: impl Into<Bytes>) -> Self {
        Self::new(MockOutcome::Respond {
            status,
            body: body.into(),
        })
    }

    pub fn fail(kind: io::ErrorKind, message: impl Into<String>) -> Self {
        Self::new(MockOutcome::Fail {
            kind,
            message: message.into(),
        })
    }

    fn new(outcome: MockOutcome) -> Self {
        Self {
            outcome,
            headers: Vec::new(),
            dispatch: Dispatch::Inline,
            chunk_size: None,
            declare_length: true,
            held: false,
            panic_on_cancel: false,
        }
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Cap every body read at `size` bytes.
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size.max(1));
        self
    }

    /// Omit the content length, as with chunked transfer encoding.
    #[must_use]
    pub fn without_length(mut self) -> Self {
        self.declare_length = false;
        self
    }

    /// Block executions until [`MockHandle::release`].
    #[must_use]
    pub fn held(mut self) -> Self {
        self.held = true;
        self
    }

    #[must_use]
    pub fn panic_on_cancel(mut self) -> Self {
        self.panic_on_cancel = true;
        self
    }

    pub fn call(self, request: Request) -> MockCall {
        let handle = MockHandle::new(self);
        handle.record(&request);
        MockCall::with_handle(request, handle)
    }

    pub fn client(self) -> MockClient {
        MockClient {
            handle: MockHandle::new(self),
        }
    }
}

struct Shared {
    script: MockScript,
    executions: AtomicUsize,
    cancels: AtomicUsize,
    bodies_opened: AtomicUsize,
    bodies_closed: Arc<AtomicUsize>,
    in_flight: AtomicUsize,
    pending: Mutex<Vec<Completion>>,
    held: Mutex<bool>,
    released: Condvar,
    requests: Mutex<Vec<Request>>,
}

/// Observation and control handle shared by every call from one script.
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<Shared>,
}

impl MockHandle {
    fn new(script: MockScript) -> Self {
        let held = script.held;
        Self {
            shared: Arc::new(Shared {
                script,
                executions: AtomicUsize::new(0),
                cancels: AtomicUsize::new(0),
                bodies_opened: AtomicUsize::new(0),
                bodies_closed: Arc::new(AtomicUsize::new(0)),
                in_flight: AtomicUsize::new(0),
                pending: Mutex::new(Vec::new()),
                held: Mutex::new(held),
                released: Condvar::new(),
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Number of calls that started running.
    pub fn executions(&self) -> usize {
        self.shared.executions.load(Ordering::SeqCst)
    }

    /// Number of `cancel` invocations, repeated ones included.
    pub fn cancels(&self) -> usize {
        self.shared.cancels.load(Ordering::SeqCst)
    }

    pub fn bodies_opened(&self) -> usize {
        self.shared.bodies_opened.load(Ordering::SeqCst)
    }

    pub fn bodies_closed(&self) -> usize {
        self.shared.bodies_closed.load(Ordering::SeqCst)
    }

    /// Requests of every call built from this script, in creation order.
    pub fn requests(&self) -> Vec<Request> {
        lock(&self.shared.requests).clone()
    }

    /// Fire all deferred completions; returns how many fired.
    pub fn complete_pending(&self) -> usize {
        let pending = std::mem::take(&mut *lock(&self.shared.pending));
        let fired = pending.len();
        for completion in pending {
            completion(self.produce());
            self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        fired
    }

    /// Let held executions proceed.
    pub fn release(&self) {
        *lock(&self.shared.held) = false;
        self.shared.released.notify_all();
    }

    /// Wait until no threaded completion is still running.
    pub fn wait_idle(&self) {
        while self.shared.in_flight.load(Ordering::SeqCst) > 0 {
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn record(&self, request: &Request) {
        lock(&self.shared.requests).push(request.clone());
    }

    fn wait_released(&self) {
        let mut held = lock(&self.shared.held);
        while *held {
            held = self
                .shared
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn produce(&self) -> io::Result<Response> {
        let script = &self.shared.script;
        match &script.outcome {
            MockOutcome::Respond { status, body } => {
                self.shared.bodies_opened.fetch_add(1, Ordering::SeqCst);
                let length = script.declare_length.then_some(body.len() as u64);
                let reader = ScriptedBody {
                    inner: Cursor::new(body.clone()),
                    chunk_size: script.chunk_size,
                    closed: Arc::clone(&self.shared.bodies_closed),
                };
                Ok(Response::new(
                    *status,
                    script.headers.clone(),
                    Body::new(reader, length),
                ))
            }
            MockOutcome::Fail { kind, message } => Err(io::Error::new(*kind, message.clone())),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn canceled() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "Canceled")
}

fn already_executed() -> io::Error {
    io::Error::other("Already Executed")
}

/// Reader that counts its own release.
struct ScriptedBody {
    inner: Cursor<Bytes>,
    chunk_size: Option<usize>,
    closed: Arc<AtomicUsize>,
}

impl Read for ScriptedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let limit = self.chunk_size.map_or(buf.len(), |size| size.min(buf.len()));
        self.inner.read(&mut buf[..limit])
    }
}

impl Drop for ScriptedBody {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scripted [`Call`].
pub struct MockCall {
    request: Request,
    handle: MockHandle,
    canceled: Arc<AtomicBool>,
    executed: AtomicBool,
}

impl MockCall {
    fn with_handle(request: Request, handle: MockHandle) -> Self {
        Self {
            request,
            handle,
            canceled: Arc::new(AtomicBool::new(false)),
            executed: AtomicBool::new(false),
        }
    }

    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }

    fn start(&self) -> io::Result<()> {
        if self.executed.swap(true, Ordering::SeqCst) {
            return Err(already_executed());
        }
        if self.is_canceled() {
            return Err(canceled());
        }
        self.handle.shared.executions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Call for MockCall {
    fn request(&self) -> &Request {
        &self.request
    }

    fn clone_call(&self) -> Self {
        Self::with_handle(self.request.clone(), self.handle.clone())
    }

    fn execute(&self) -> io::Result<Response> {
        self.start()?;
        self.handle.wait_released();
        self.handle.produce()
    }

    fn enqueue(&self, completion: Completion) {
        if let Err(e) = self.start() {
            completion(Err(e));
            return;
        }

        let shared = &self.handle.shared;
        match shared.script.dispatch {
            Dispatch::Inline => {
                self.handle.wait_released();
                completion(self.handle.produce());
            }
            Dispatch::Deferred => {
                shared.in_flight.fetch_add(1, Ordering::SeqCst);
                lock(&shared.pending).push(completion);
            }
            Dispatch::Thread => {
                shared.in_flight.fetch_add(1, Ordering::SeqCst);
                let handle = self.handle.clone();
                let cancel_flag = Arc::clone(&self.canceled);
                thread::spawn(move || {
                    handle.wait_released();
                    let outcome = if cancel_flag.load(Ordering::SeqCst) {
                        Err(canceled())
                    } else {
                        handle.produce()
                    };
                    completion(outcome);
                    handle.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
                });
            }
            Dispatch::Lost => drop(completion),
        }
    }

    fn cancel(&self) {
        self.handle.shared.cancels.fetch_add(1, Ordering::SeqCst);
        self.canceled.store(true, Ordering::SeqCst);
        if self.handle.shared.script.panic_on_cancel {
            panic!("scripted cancel failure");
        }
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

/// Scripted [`CallFactory`]; every call shares one [`MockHandle`].
pub struct MockClient {
    handle: MockHandle,
}

impl MockClient {
    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }
}

impl CallFactory for MockClient {
    type Call = MockCall;

    fn new_call(&self, request: Request) -> MockCall {
        self.handle.record(&request);
        MockCall::with_handle(request, self.handle.clone())
    }
}
