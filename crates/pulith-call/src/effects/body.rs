use std::fmt;
use std::io::{self, Cursor, Read};

use bytes::Bytes;

/// Boxed reader type backing a [`Body`].
pub type BoxRead = Box<dyn Read + Send>;

/// Owned, lazily-read response body.
///
/// The body holds the underlying connection resource and releases it exactly
/// once: on [`close`](Body::close), after a consuming read such as
/// [`bytes`](Body::bytes), or when dropped. Every consuming method takes
/// `self`, so nothing can read a body after it has been closed.
pub struct Body {
    reader: Option<BoxRead>,
    content_length: Option<u64>,
}

impl Body {
    pub fn new<R>(reader: R, content_length: Option<u64>) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            reader: Some(Box::new(reader)),
            content_length,
        }
    }

    /// In-memory body with a known length.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Self::new(Cursor::new(bytes), Some(len))
    }

    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    /// Declared length of the body, if known.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Wrap the underlying reader without closing it.
    ///
    /// Used by decorators that observe the byte stream, e.g. progress reporting.
    pub fn map_reader<F>(mut self, f: F) -> Self
    where
        F: FnOnce(BoxRead) -> BoxRead,
    {
        let content_length = self.content_length;
        match self.reader.take() {
            Some(reader) => Self {
                reader: Some(f(reader)),
                content_length,
            },
            None => self,
        }
    }

    /// Read the remaining bytes and close the body.
    pub fn bytes(mut self) -> io::Result<Bytes> {
        let mut buf = Vec::with_capacity(self.content_length.unwrap_or(0).min(1 << 20) as usize);
        let result = self.read_to_end(&mut buf);
        self.release();
        result.map(|_| Bytes::from(buf))
    }

    /// Read the remaining bytes as UTF-8 and close the body.
    pub fn string(self) -> io::Result<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Release the underlying resource without reading.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(reader) = self.reader.take() {
            drop(reader);
            tracing::trace!("response body closed");
        }
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read(buf),
            None => Err(io::Error::other("response body already closed")),
        }
    }
}

impl Drop for Body {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("content_length", &self.content_length)
            .field("open", &self.reader.is_some())
            .finish()
    }
}
