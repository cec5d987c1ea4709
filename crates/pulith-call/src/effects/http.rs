//! Network client backed by async `reqwest`.
//!
//! Every client owns a small tokio runtime on its own threads, and all
//! network I/O runs there. `enqueue` spawns the transfer on it; `execute`
//! spawns it and blocks the calling thread until the response head arrives.
//! Neither needs, nor interferes with, a runtime on the caller's side.
//!
//! Response bodies are pulled from the runtime one chunk per demand, so
//! reading a [`Body`](crate::Body) is a plain blocking read wherever it happens.

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::io::{self, Read};
    use std::sync::{Arc, mpsc as std_mpsc};
    use std::thread;

    use bytes::{Buf, Bytes};
    use futures_util::StreamExt;
    use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::runtime::{self, Handle};
    use tokio::sync::{mpsc, oneshot};
    use tokio_util::sync::CancellationToken;

    use crate::data::{CacheMode, ClientOptions, Method, Request};
    use crate::effects::body::Body;
    use crate::effects::call::{Call, CallFactory, Completion};
    use crate::effects::response::Response;
    use crate::error::{Error, Result};

    const DISPATCH_THREAD: &str = "pulith-call-dispatch";
    const WORKER_THREAD: &str = "pulith-call-worker";
    const WORKER_THREADS: usize = 2;

    fn canceled() -> io::Error {
        io::Error::new(io::ErrorKind::Interrupted, "Canceled")
    }

    fn already_executed() -> io::Error {
        io::Error::other("Already Executed")
    }

    fn dispatcher_gone() -> io::Error {
        io::Error::other("network dispatcher shut down")
    }

    /// Runtime owned by a client and its clones.
    ///
    /// The runtime is built and dropped on its own thread, so the client can
    /// be created and dropped from async code. Dropping the last owner stops it.
    struct Dispatcher {
        handle: Handle,
        _shutdown: oneshot::Sender<()>,
    }

    impl Dispatcher {
        fn start() -> io::Result<Self> {
            let (ready_tx, ready_rx) = std_mpsc::channel();
            let (shutdown, stopped) = oneshot::channel::<()>();

            thread::Builder::new()
                .name(DISPATCH_THREAD.to_string())
                .spawn(move || {
                    let built = runtime::Builder::new_multi_thread()
                        .worker_threads(WORKER_THREADS)
                        .thread_name(WORKER_THREAD)
                        .enable_all()
                        .build();
                    match built {
                        Ok(rt) => {
                            let _ = ready_tx.send(Ok(rt.handle().clone()));
                            rt.block_on(async {
                                let _ = stopped.await;
                            });
                            tracing::debug!("network dispatcher stopped");
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                        }
                    }
                })?;

            let handle = ready_rx.recv().map_err(|_| dispatcher_gone())??;
            Ok(Self {
                handle,
                _shutdown: shutdown,
            })
        }
    }

    /// Production [`CallFactory`] using `reqwest`.
    ///
    /// Cheap to clone; clones share the connection pool and the runtime.
    #[derive(Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
        dispatcher: Arc<Dispatcher>,
    }

    impl ReqwestClient {
        /// Create a client with default [`ClientOptions`].
        pub fn new() -> Result<Self> {
            Self::with_options(&ClientOptions::default())
        }

        pub fn with_options(options: &ClientOptions) -> Result<Self> {
            let mut headers = HeaderMap::new();
            for (key, value) in options.headers.iter() {
                let name = HeaderName::from_bytes(key.as_bytes())
                    .map_err(|e| Error::InvalidRequest(format!("header name {key:?}: {e}")))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|e| Error::InvalidRequest(format!("header {key:?}: {e}")))?;
                headers.append(name, value);
            }

            let client = reqwest::Client::builder()
                .user_agent(options.user_agent.as_str())
                .connect_timeout(options.connect_timeout)
                .timeout(options.request_timeout)
                .default_headers(headers)
                .build()
                .map_err(|e| Error::InvalidRequest(format!("failed to build client: {e}")))?;

            let dispatcher = Dispatcher::start()
                .map_err(|e| Error::InvalidRequest(format!("failed to start dispatcher: {e}")))?;

            Ok(Self {
                client,
                dispatcher: Arc::new(dispatcher),
            })
        }
    }

    impl CallFactory for ReqwestClient {
        type Call = ReqwestCall;

        fn new_call(&self, request: Request) -> ReqwestCall {
            ReqwestCall::new(self.client.clone(), Arc::clone(&self.dispatcher), request)
        }
    }

    /// One request bound to a [`ReqwestClient`].
    ///
    /// Cancelling aborts the transfer: a request still waiting for its
    /// response head fails with a "Canceled" transport error at once.
    pub struct ReqwestCall {
        client: reqwest::Client,
        dispatcher: Arc<Dispatcher>,
        request: Request,
        cancel: CancellationToken,
        executed: AtomicBool,
    }

    impl ReqwestCall {
        fn new(client: reqwest::Client, dispatcher: Arc<Dispatcher>, request: Request) -> Self {
            Self {
                client,
                dispatcher,
                request,
                cancel: CancellationToken::new(),
                executed: AtomicBool::new(false),
            }
        }

        fn start(&self) -> io::Result<()> {
            if self.executed.swap(true, Ordering::SeqCst) {
                return Err(already_executed());
            }
            Ok(())
        }

        fn transfer(&self) -> impl Future<Output = io::Result<Response>> + Send + 'static {
            transfer(
                self.client.clone(),
                self.request.clone(),
                self.cancel.clone(),
                Arc::clone(&self.dispatcher),
            )
        }
    }

    impl Call for ReqwestCall {
        fn request(&self) -> &Request {
            &self.request
        }

        fn clone_call(&self) -> Self {
            Self::new(self.client.clone(), Arc::clone(&self.dispatcher), self.request.clone())
        }

        fn execute(&self) -> io::Result<Response> {
            self.start()?;
            let (tx, rx) = std_mpsc::sync_channel(1);
            let transfer = self.transfer();
            self.dispatcher.handle.spawn(async move {
                let _ = tx.send(transfer.await);
            });
            rx.recv().unwrap_or_else(|_| Err(dispatcher_gone()))
        }

        fn enqueue(&self, completion: Completion) {
            if let Err(e) = self.start() {
                completion(Err(e));
                return;
            }
            let transfer = self.transfer();
            self.dispatcher.handle.spawn(async move {
                completion(transfer.await);
            });
        }

        fn cancel(&self) {
            if !self.cancel.is_cancelled() {
                tracing::debug!(url = %self.request.url, "call canceled");
            }
            self.cancel.cancel();
        }

        fn is_canceled(&self) -> bool {
            self.cancel.is_cancelled()
        }
    }

    async fn transfer(
        client: reqwest::Client,
        request: Request,
        cancel: CancellationToken,
        dispatcher: Arc<Dispatcher>,
    ) -> io::Result<Response> {
        if cancel.is_cancelled() {
            return Err(canceled());
        }

        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(url = %request.url, "canceled while waiting for response head");
                return Err(canceled());
            }
            sent = build(&client, &request).send() => sent.map_err(into_io)?,
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let length = response.content_length();
        tracing::debug!(status, url = %request.url, "received response");

        let body = StreamingBody::spawn(response, dispatcher);
        Ok(Response::new(status, headers, Body::new(body, length)))
    }

    /// Blocking reader over a body streamed on the dispatcher.
    ///
    /// Each refill asks the pump task for one chunk and waits for it. Dropping
    /// the reader drops the demand channel, which ends the pump and releases
    /// the connection. The reader keeps the dispatcher alive while it exists.
    struct StreamingBody {
        _dispatcher: Arc<Dispatcher>,
        demand: mpsc::UnboundedSender<()>,
        chunks: std_mpsc::Receiver<io::Result<Option<Bytes>>>,
        current: Bytes,
        finished: bool,
    }

    impl StreamingBody {
        fn spawn(response: reqwest::Response, dispatcher: Arc<Dispatcher>) -> Self {
            let (demand, mut wanted) = mpsc::unbounded_channel::<()>();
            let (chunk_tx, chunks) = std_mpsc::channel();

            dispatcher.handle.spawn(async move {
                let mut stream = response.bytes_stream();
                while wanted.recv().await.is_some() {
                    let next = match stream.next().await {
                        Some(Ok(chunk)) => Ok(Some(chunk)),
                        Some(Err(e)) => Err(into_io(e)),
                        None => Ok(None),
                    };
                    let last = !matches!(next, Ok(Some(_)));
                    if chunk_tx.send(next).is_err() || last {
                        break;
                    }
                }
                tracing::trace!("body pump finished");
            });

            Self {
                _dispatcher: dispatcher,
                demand,
                chunks,
                current: Bytes::new(),
                finished: false,
            }
        }
    }

    impl Read for StreamingBody {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            loop {
                if !self.current.is_empty() {
                    let n = buf.len().min(self.current.len());
                    self.current.copy_to_slice(&mut buf[..n]);
                    return Ok(n);
                }
                if self.finished || buf.is_empty() {
                    return Ok(0);
                }

                self.demand.send(()).map_err(|_| dispatcher_gone())?;
                match self.chunks.recv() {
                    Ok(Ok(Some(chunk))) => self.current = chunk,
                    Ok(Ok(None)) => self.finished = true,
                    Ok(Err(e)) => {
                        self.finished = true;
                        return Err(e);
                    }
                    Err(_) => {
                        self.finished = true;
                        return Err(dispatcher_gone());
                    }
                }
            }
        }
    }

    fn build(client: &reqwest::Client, request: &Request) -> reqwest::RequestBuilder {
        let mut builder = client.request(method(request.method), request.url.as_str());
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if request.cache == CacheMode::Bypass && request.header_value("cache-control").is_none() {
            builder = builder.header(CACHE_CONTROL, "no-cache");
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        builder
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    fn into_io(e: reqwest::Error) -> io::Error {
        let kind = if e.is_timeout() {
            io::ErrorKind::TimedOut
        } else if e.is_connect() {
            io::ErrorKind::ConnectionRefused
        } else {
            io::ErrorKind::Other
        };
        io::Error::new(kind, e)
    }

}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::{ReqwestCall, ReqwestClient};
