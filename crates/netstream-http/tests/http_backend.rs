use std::{io::Read as _, thread, time::Duration};

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use bytes::Bytes;
use futures::StreamExt;
use netstream::{
    BackendError, ControlRequest, ICY_TITLE, Mode, NetConfig, NetStream, Opened, Opener, StreamError,
    StreamResult,
};
use netstream_http::{HttpBackend, HttpOptions};
use rstest::*;
use tokio::{net::TcpListener, runtime::Runtime};
use tokio_util::sync::CancellationToken;

const CONTENT: &[u8] = b"0123456789abcdefghij";
const METAINT: usize = 4;

// ============================================================================
// Test server infrastructure
// ============================================================================

/// Axum server on its own runtime; the backend under test blocks the test
/// thread, so the server cannot share it.
struct TestServer {
    base_url: String,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    _runtime: Runtime,
}

impl TestServer {
    fn start(router: Router) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let addr = runtime.block_on(async {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let server = axum::serve(listener, router).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            tokio::spawn(async move {
                server.await.unwrap();
            });
            addr
        });

        Self {
            base_url: format!("http://{addr}"),
            shutdown_tx: Some(shutdown_tx),
            _runtime: runtime,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
    }
}

// ============================================================================
// Test endpoints
// ============================================================================

async fn plain_endpoint() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "audio/mpeg")], CONTENT)
}

async fn range_endpoint(headers: HeaderMap) -> impl IntoResponse {
    let start = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .and_then(|v| v.strip_suffix('-'))
        .and_then(|v| v.parse::<usize>().ok());

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::ACCEPT_RANGES, "bytes".parse().unwrap());
    response_headers.insert(header::CONTENT_TYPE, "audio/ogg".parse().unwrap());

    match start {
        Some(start) if start < CONTENT.len() => {
            response_headers.insert(
                header::CONTENT_RANGE,
                format!("bytes {start}-{}/{}", CONTENT.len() - 1, CONTENT.len())
                    .parse()
                    .unwrap(),
            );
            (
                StatusCode::PARTIAL_CONTENT,
                response_headers,
                CONTENT[start..].to_vec(),
            )
        }
        Some(_) => (
            StatusCode::RANGE_NOT_SATISFIABLE,
            response_headers,
            Vec::new(),
        ),
        None => (StatusCode::OK, response_headers, CONTENT.to_vec()),
    }
}

fn meta_block(text: &str) -> Vec<u8> {
    let blocks = text.len().div_ceil(16);
    let mut out = vec![u8::try_from(blocks).unwrap()];
    out.extend_from_slice(text.as_bytes());
    out.resize(1 + blocks * 16, 0);
    out
}

async fn radio_endpoint(headers: HeaderMap) -> impl IntoResponse {
    let wants_icy = headers
        .get("icy-metadata")
        .is_some_and(|v| v.as_bytes() == b"1");

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::CONTENT_TYPE, "audio/mpeg".parse().unwrap());
    response_headers.insert(header::ACCEPT_RANGES, "bytes".parse().unwrap());
    if !wants_icy {
        return (response_headers, b"abcdefghijkl".to_vec());
    }

    response_headers.insert("icy-name", "Test Radio".parse().unwrap());
    response_headers.insert("icy-metaint", METAINT.to_string().parse().unwrap());
    let mut body = b"abcd".to_vec();
    body.extend(meta_block("StreamTitle='Song A';"));
    body.extend_from_slice(b"efgh");
    body.push(0);
    body.extend_from_slice(b"ijkl");
    (response_headers, body)
}

async fn echo_endpoint(headers: HeaderMap) -> String {
    let get = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string()
    };
    format!(
        "{}|{}|{}",
        get("user-agent"),
        get("referer"),
        get("x-custom")
    )
}

async fn slow_endpoint() -> impl IntoResponse {
    let first = futures::stream::once(async { Ok::<_, std::io::Error>(Bytes::from_static(b"first")) });
    Body::from_stream(first.chain(futures::stream::pending()))
}

/// Serves the full body, but never answers a ranged request.
async fn stalled_range_endpoint(headers: HeaderMap) -> impl IntoResponse {
    if headers.contains_key(header::RANGE) {
        futures::future::pending::<()>().await;
    }
    ([(header::ACCEPT_RANGES, "bytes")], CONTENT)
}

fn router() -> Router {
    Router::new()
        .route("/plain", get(plain_endpoint))
        .route("/range", get(range_endpoint))
        .route("/radio", get(radio_endpoint))
        .route("/echo", get(echo_endpoint))
        .route("/slow", get(slow_endpoint))
        .route("/stalled-range", get(stalled_range_endpoint))
}

// ============================================================================
// Fixtures
// ============================================================================

#[fixture]
fn server() -> TestServer {
    TestServer::start(router())
}

fn backend() -> HttpBackend {
    HttpBackend::with_options(
        HttpOptions::default().with_interrupt_poll(Duration::from_millis(10)),
    )
    .unwrap()
}

fn open(url: &str, config: NetConfig) -> StreamResult<NetStream> {
    Opener::new(backend())
        .with_config(config)
        .open(url, Mode::Read)
        .map(|opened| match opened {
            Opened::Stream(stream) => stream,
            Opened::Delegate(hint) => panic!("unexpected delegate: {hint:?}"),
        })
}

fn read_all(stream: &mut NetStream) -> Vec<u8> {
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    out
}

// ============================================================================
// Tests
// ============================================================================

#[rstest]
#[test]
fn test_plain_read(server: TestServer) {
    let mut stream = open(&server.url("/plain"), NetConfig::new()).unwrap();

    assert_eq!(read_all(&mut stream), CONTENT);
    assert!(matches!(stream.read(&mut [0u8; 8]), Err(StreamError::Eof)));
    assert_eq!(stream.mime_type(), Some("audio/mpeg"));
    assert!(stream.is_streaming());
}

#[rstest]
#[test]
fn test_size_and_seekability(server: TestServer) {
    let mut plain = open(&server.url("/plain"), NetConfig::new()).unwrap();
    assert!(!plain.is_seekable());
    assert_eq!(
        plain.control(ControlRequest::GetSize).into_size(),
        Some(CONTENT.len() as u64)
    );

    let ranged = open(&server.url("/range"), NetConfig::new()).unwrap();
    assert!(ranged.is_seekable());
    assert_eq!(ranged.mime_type(), Some("audio/ogg"));
}

#[rstest]
#[test]
fn test_range_seek(server: TestServer) {
    let mut stream = open(&server.url("/range"), NetConfig::new()).unwrap();
    let mut head = [0u8; 4];
    let n = stream.read(&mut head).unwrap();
    assert_eq!(&head[..n], &CONTENT[..n]);

    stream.seek(10).unwrap();
    assert_eq!(read_all(&mut stream), &CONTENT[10..]);

    stream.seek(0).unwrap();
    assert_eq!(read_all(&mut stream), CONTENT);
}

#[rstest]
#[test]
fn test_seek_to_end_reports_eof(server: TestServer) {
    let mut stream = open(&server.url("/range"), NetConfig::new()).unwrap();
    let size = stream.control(ControlRequest::GetSize).into_size().unwrap();

    stream.seek(size).unwrap();
    assert!(matches!(stream.read(&mut [0u8; 8]), Err(StreamError::Eof)));

    stream.seek(16).unwrap();
    assert_eq!(read_all(&mut stream), &CONTENT[16..]);
}

#[rstest]
#[test]
fn test_seek_past_end_fails(server: TestServer) {
    let mut stream = open(&server.url("/range"), NetConfig::new()).unwrap();
    assert!(matches!(
        stream.seek(CONTENT.len() as u64 + 1),
        Err(StreamError::Io { .. })
    ));
}

#[rstest]
#[test]
fn test_seek_on_unseekable_stream(server: TestServer) {
    let mut stream = open(&server.url("/plain"), NetConfig::new()).unwrap();
    assert!(matches!(
        stream.seek(3),
        Err(StreamError::Unsupported { .. })
    ));
}

#[rstest]
#[test]
fn test_icy_metadata_is_stripped_and_reported(server: TestServer) {
    let mut stream = open(&server.url("/radio"), NetConfig::new()).unwrap();

    // In-band metadata disables seeking even though ranges are advertised.
    assert!(!stream.is_seekable());

    let tags = stream
        .control(ControlRequest::GetMetadataTags)
        .into_tags()
        .unwrap();
    assert_eq!(tags.get("icy-name"), Some("Test Radio"));
    assert_eq!(tags.get(ICY_TITLE), None);

    assert_eq!(read_all(&mut stream), b"abcdefghijkl");

    let tags = stream
        .control(ControlRequest::GetMetadataTags)
        .into_tags()
        .unwrap();
    assert_eq!(tags.get(ICY_TITLE), Some("Song A"));
    assert_eq!(tags.get("icy-metaint"), Some("4"));

    assert!(stream
        .control(ControlRequest::GetMetadataTags)
        .is_unsupported());
}

#[rstest]
#[test]
fn test_reconnect_reopens(server: TestServer) {
    let mut stream = open(&server.url("/plain"), NetConfig::new()).unwrap();
    let _ = read_all(&mut stream);

    assert!(stream.control(ControlRequest::Reconnect).is_success());
    assert_eq!(read_all(&mut stream), CONTENT);
}

#[rstest]
#[test]
fn test_request_headers_are_forwarded(server: TestServer) {
    let config = NetConfig::new()
        .with_user_agent("netstream-test/1.0")
        .with_referrer("http://referrer.example/")
        .with_header_field("X-Custom: yes");
    let mut stream = open(&server.url("/echo"), config).unwrap();

    let body = String::from_utf8(read_all(&mut stream)).unwrap();
    assert_eq!(body, "netstream-test/1.0|http://referrer.example/|yes");
}

#[rstest]
#[test]
fn test_http_error_status_fails_open(server: TestServer) {
    let result = open(&server.url("/missing"), NetConfig::new());
    assert!(matches!(result, Err(StreamError::Connect { .. })));
}

#[test]
fn test_unknown_scheme_is_protocol_unavailable() {
    let result = open("udp://127.0.0.1:1234", NetConfig::new());
    assert!(matches!(
        result,
        Err(StreamError::ProtocolUnavailable { .. })
    ));
}

#[test]
fn test_mms_is_rewritten_before_backend_rejects_it() {
    let result = open("mms://radio.example/live", NetConfig::new());
    match result {
        Err(StreamError::ProtocolUnavailable { url }) => assert_eq!(url, "mmsh://radio.example/live"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[rstest]
#[test]
fn test_write_mode_is_refused(server: TestServer) {
    let result = Opener::new(backend()).open(&server.url("/plain"), Mode::Write);
    assert!(matches!(
        result,
        Err(StreamError::Connect {
            source: BackendError::Unsupported,
            ..
        })
    ));
}

#[rstest]
#[test]
fn test_cancel_interrupts_blocked_read(server: TestServer) {
    let cancel = CancellationToken::new();
    let mut stream = open(
        &server.url("/slow"),
        NetConfig::new().with_cancel(cancel.clone()),
    )
    .unwrap();

    let mut buf = [0u8; 16];
    let n = stream.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"first");

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();
    });
    let result = stream.read(&mut buf);
    canceller.join().unwrap();

    assert!(matches!(result, Err(StreamError::Interrupted { .. })));
}

#[rstest]
#[test]
fn test_cancel_interrupts_stalled_seek(server: TestServer) {
    let cancel = CancellationToken::new();
    let mut stream = open(
        &server.url("/stalled-range"),
        NetConfig::new().with_cancel(cancel.clone()),
    )
    .unwrap();
    assert!(stream.is_seekable());

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        cancel.cancel();
    });
    let result = stream.seek(5);
    canceller.join().unwrap();

    assert!(matches!(result, Err(StreamError::Interrupted { .. })));
}

#[rstest]
#[test]
fn test_cancel_before_open(server: TestServer) {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = open(&server.url("/plain"), NetConfig::new().with_cancel(cancel));
    assert!(matches!(result, Err(StreamError::Interrupted { .. })));
}
