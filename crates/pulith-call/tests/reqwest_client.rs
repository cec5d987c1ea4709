#![cfg(feature = "reqwest")]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use pulith_call::{
    Call, CallExt, CallFactory, CallFactoryExt, ClientOptions, Error, Progress, ProgressListener, ReqwestClient, Request,
    Response, Subscriber,
};
use serde::Deserialize;

/// Serve one canned response per connection and hand back each request head.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for (status, body) in responses {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = Vec::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 || line == "\r\n" {
                    break;
                }
                head.push(line.trim_end().to_string());
            }
            let length = head
                .iter()
                .find_map(|line| {
                    let (k, v) = line.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            let mut request_body = vec![0u8; length];
            reader.read_exact(&mut request_body).unwrap();
            let _ = tx.send(head);

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();
        }
    });

    (base, rx)
}

/// Accept one connection, read the request head, then stall without answering.
fn serve_stalled() -> (String, mpsc::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap_or(0) > 0 && line != "\r\n" {
            line.clear();
        }
        let _ = tx.send(());
        thread::sleep(Duration::from_secs(5));
    });

    (base, rx)
}

fn has_header(head: &[String], name: &str, value: &str) -> bool {
    head.iter().any(|line| {
        line.split_once(':')
            .is_some_and(|(k, v)| k.eq_ignore_ascii_case(name) && v.trim() == value)
    })
}

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    a: i64,
}

struct Once(mpsc::Sender<Result<Response, Error>>);

impl Subscriber for Once {
    fn on_next(&mut self, response: Response) {
        let _ = self.0.send(Ok(response));
    }

    fn on_error(&mut self, error: Error) {
        let _ = self.0.send(Err(error));
    }

    fn on_completed(&mut self) {}
}

#[test]
fn stream_fetches_and_decodes() {
    let (base, heads) = serve(vec![(200, r#"{"a":1}"#)]);
    let client = ReqwestClient::with_options(&ClientOptions::default().header("X-Client", "test")).unwrap();
    let (tx, rx) = mpsc::channel();

    client
        .new_call(Request::get(format!("{base}/item")))
        .as_success_stream()
        .run(Once(tx));

    let response = rx.recv().unwrap().unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.parse_as::<Item>().unwrap(), Item { a: 1 });

    let head = heads.recv().unwrap();
    assert!(head[0].starts_with("GET /item "));
    assert!(has_header(&head, "x-client", "test"));
    assert!(has_header(&head, "user-agent", concat!("pulith-call/", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn stream_rejects_server_error() {
    let (base, _heads) = serve(vec![(500, "{}")]);
    let client = ReqwestClient::new().unwrap();
    let (tx, rx) = mpsc::channel();

    client
        .new_call(Request::get(format!("{base}/boom")))
        .as_success_stream()
        .run(Once(tx));

    let err = rx.recv().unwrap().unwrap_err();
    assert_eq!(err.status_code(), Some(500));
}

#[test]
fn progress_call_bypasses_cache() {
    let (base, heads) = serve(vec![(200, r#"{"a":42}"#)]);
    let client = ReqwestClient::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: ProgressListener = Arc::new(move |p: &Progress| sink.lock().unwrap().push(*p));

    let (tx, rx) = mpsc::channel();
    client
        .new_cacheless_call_with_progress(Request::get(format!("{base}/blob")), listener)
        .as_stream()
        .run(Once(tx));

    let item: Item = rx.recv().unwrap().unwrap().parse_as().unwrap();
    assert_eq!(item, Item { a: 42 });

    let head = heads.recv().unwrap();
    assert!(has_header(&head, "cache-control", "no-cache"));

    let seen = seen.lock().unwrap();
    let last = seen.last().unwrap();
    assert_eq!(last.bytes_read, 8);
    assert_eq!(last.total_bytes, Some(8));
    assert!(last.done);
    assert_eq!(seen.iter().filter(|p| p.done).count(), 1);
}

#[test]
fn await_and_decode_on_current_thread_runtime() {
    let (base, _heads) = serve(vec![(201, r#"{"a":7}"#)]);
    let client = ReqwestClient::new().unwrap();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let call = client.new_call(Request::post(format!("{base}/items"), "{}"));
    let item = runtime
        .block_on(async {
            let response = call.await_success().await?;
            assert_eq!(response.status(), 201);
            response.parse_as::<Item>()
        })
        .unwrap();
    assert_eq!(item, Item { a: 7 });
}

#[tokio::test]
async fn client_built_awaited_and_decoded_inside_a_task() {
    let (base, _heads) = serve(vec![(200, r#"{"a":9}"#)]);

    let item = tokio::spawn(async move {
        let client = ReqwestClient::new()?;
        let call = client.new_call(Request::get(format!("{base}/item")));
        let item: Item = call.await_success().await?.parse_as()?;
        drop(client);
        Ok::<_, Error>(item)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(item, Item { a: 9 });
}

#[test]
fn unsubscribe_aborts_stalled_transfer() {
    let (base, accepted) = serve_stalled();
    let client = ReqwestClient::new().unwrap();
    let (tx, rx) = mpsc::channel();

    let subscription = client.new_call(Request::get(format!("{base}/slow"))).as_stream().subscribe(Once(tx));
    let requester = {
        let s = subscription.clone();
        thread::spawn(move || s.request(1))
    };

    accepted.recv_timeout(Duration::from_secs(2)).unwrap();
    let started = Instant::now();
    subscription.unsubscribe();
    requester.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(subscription.is_unsubscribed());
    assert!(rx.try_recv().is_err());
}

#[test]
fn cancel_interrupts_blocking_execute() {
    let (base, accepted) = serve_stalled();
    let client = ReqwestClient::new().unwrap();
    let call = Arc::new(client.new_call(Request::get(format!("{base}/slow"))));

    let executor = {
        let call = Arc::clone(&call);
        thread::spawn(move || call.execute().map(|r| r.status()))
    };

    accepted.recv_timeout(Duration::from_secs(2)).unwrap();
    let started = Instant::now();
    call.cancel();
    let err = executor.join().unwrap().unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(err.kind(), std::io::ErrorKind::Interrupted);
    assert!(call.is_canceled());
}

#[test]
fn connection_refused_is_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = ReqwestClient::new().unwrap();
    let (tx, rx) = mpsc::channel();

    client
        .new_call(Request::get(format!("http://127.0.0.1:{port}/")))
        .as_stream()
        .run(Once(tx));

    let err = rx.recv().unwrap().unwrap_err();
    assert!(err.is_transport());
}
