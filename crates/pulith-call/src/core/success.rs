use crate::effects::Response;
use crate::error::{CallSite, Error, Result};

/// Reclassify a non-2xx response as [`Error::Http`].
///
/// A successful response passes through untouched with its body still open
/// and unread. Any other status closes the body before the error is returned,
/// so a rejected response never leaks its connection.
pub fn ensure_success(response: Response, call_site: Option<CallSite>) -> Result<Response> {
    if response.is_successful() {
        return Ok(response);
    }

    let code = response.status();
    response.close();
    tracing::debug!(code, "rejecting unsuccessful response");
    Err(Error::Http { code, call_site })
}
