use std::sync::Arc;
use std::time::Duration;

/// Default user agent sent by the bundled network client.
pub const USER_AGENT: &str = concat!("pulith-call/", env!("CARGO_PKG_VERSION"));

/// Default connection timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for the bundled network client.
///
/// Timeouts live here and nowhere else: the stream and await bridges never
/// time a call out on their own.
///
/// # Examples
///
/// ```
/// use pulith_call::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::default()
///     .request_timeout(Duration::from_secs(30))
///     .header("Accept-Language", "en");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Value of the `User-Agent` header.
    ///
    /// Default: `pulith-call/<version>`
    pub user_agent: String,

    /// Time allowed to establish a connection.
    ///
    /// Default: 10s
    pub connect_timeout: Duration,

    /// Time allowed for the whole request, body included.
    ///
    /// Default: 300s
    pub request_timeout: Duration,

    /// Headers added to every request before the request's own headers.
    ///
    /// Default: empty
    pub headers: Arc<[(String, String)]>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
            headers: Arc::new([]),
        }
    }
}

impl ClientOptions {
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Add a single default header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers: Vec<_> = self.headers.iter().cloned().collect();
        headers.push((key.into(), value.into()));
        self.headers = Arc::from(headers);
        self
    }

    /// Replace all default headers.
    #[must_use]
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = Arc::from(headers);
        self
    }
}
