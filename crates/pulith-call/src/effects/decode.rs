use std::io::BufReader;

use serde::de::DeserializeOwned;

use crate::effects::response::Response;
use crate::error::Result;

/// Decode a JSON response body into `T`.
///
/// The body is streamed into the decoder and closed exactly once, whether
/// decoding succeeds or not. The status code is not inspected; combine with
/// [`CallExt::await_success`](crate::CallExt::await_success) to reject
/// non-2xx responses first.
///
/// # Errors
///
/// Returns [`Error::Decode`](crate::Error::Decode) if the body is not valid
/// JSON for `T` or cannot be read.
pub fn parse_as<T: DeserializeOwned>(response: Response) -> Result<T> {
    let mut body = response.into_body();
    let decoded = serde_json::from_reader(BufReader::new(&mut body));
    body.close();
    if let Err(e) = &decoded {
        tracing::debug!(error = %e, "failed to decode response body");
    }
    Ok(decoded?)
}

impl Response {
    /// Method form of [`parse_as`].
    pub fn parse_as<T: DeserializeOwned>(self) -> Result<T> {
        parse_as(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Request;
    use crate::data::{Progress, ProgressListener};
    use crate::effects::call::{Call, CallFactoryExt};
    use crate::effects::mock::MockScript;
    use serde::Deserialize;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        a: i64,
    }

    #[test]
    fn decodes_json_and_closes() {
        let call = MockScript::respond(200, r#"{"a":1}"#).call(Request::get("http://mock.local/item"));
        let handle = call.handle();
        let item: Item = call.execute().unwrap().parse_as().unwrap();
        assert_eq!(item, Item { a: 1 });
        assert_eq!(handle.bodies_closed(), 1);
    }

    #[test]
    fn decode_failure_still_closes() {
        let call = MockScript::respond(200, "not json").call(Request::get("http://mock.local/item"));
        let handle = call.handle();
        let err = parse_as::<Item>(call.execute().unwrap()).unwrap_err();
        assert!(matches!(err, crate::Error::Decode(_)));
        assert_eq!(handle.bodies_closed(), 1);
    }

    #[test]
    fn progress_is_reported_per_chunk() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: ProgressListener = Arc::new(move |p: &Progress| sink.lock().unwrap().push(*p));
        let client = MockScript::respond(200, r#"{"a":123456789}"#).chunk_size(4).client();

        let call = client.new_cacheless_call_with_progress(Request::get("http://mock.local/item"), listener);
        let item: Item = call.execute().unwrap().parse_as().unwrap();
        assert_eq!(item, Item { a: 123456789 });

        let reads: Vec<_> = seen.lock().unwrap().iter().map(|p| (p.bytes_read, p.done)).collect();
        assert_eq!(reads, [(4, false), (8, false), (12, false), (15, true)]);
    }

    #[test]
    fn decodes_sequences() {
        let call = MockScript::respond(200, r#"[{"a":1},{"a":2}]"#).call(Request::get("http://mock.local/items"));
        let items: Vec<Item> = call.execute().unwrap().parse_as().unwrap();
        assert_eq!(items, [Item { a: 1 }, Item { a: 2 }]);
    }
}
