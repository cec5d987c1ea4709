use crate::core::is_successful;
use crate::effects::body::Body;

/// Status, headers and the owned streaming body of an executed call.
///
/// Whoever holds the response owns the body; passing the response along
/// passes the obligation to close it.
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Body,
}

impl Response {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// `true` for status codes in `200..=299`.
    pub fn is_successful(&self) -> bool {
        is_successful(self.status)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Case-insensitive lookup of the first header named `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn into_body(self) -> Body {
        self.body
    }

    /// Replace the body, e.g. with a decorated one.
    pub fn map_body<F>(self, f: F) -> Self
    where
        F: FnOnce(Body) -> Body,
    {
        Self {
            status: self.status,
            headers: self.headers,
            body: f(self.body),
        }
    }

    /// Close the body without reading it.
    pub fn close(self) {
        self.body.close();
    }
}
