//! Minimal HTTP/1.1 servers for exercising the worker over real sockets.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::types::UploadTarget;

pub(crate) const TEST_TOKEN: &str = "secret-token";

/// Request as seen by the mock server.
#[derive(Debug, Clone)]
pub(crate) struct CapturedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }
}

pub(crate) fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub(crate) fn target(url: &str) -> UploadTarget {
    UploadTarget::new(url, TEST_TOKEN)
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, format!("http://127.0.0.1:{port}"))
}

/// Reads one full request (head plus `Content-Length` or chunked body).
async fn read_request(stream: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut tmp = vec![0u8; 64 * 1024];

    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut rest = buf[head_end..].to_vec();
    let mut captured = CapturedRequest {
        head,
        body: Vec::new(),
    };

    let chunked = captured
        .header("transfer-encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));

    if chunked {
        while !rest.ends_with(b"0\r\n\r\n") {
            let n = stream.read(&mut tmp).await.ok()?;
            if n == 0 {
                return None;
            }
            rest.extend_from_slice(&tmp[..n]);
        }
        captured.body = dechunk(&rest);
    } else {
        let len: usize = captured
            .header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        while rest.len() < len {
            let n = stream.read(&mut tmp).await.ok()?;
            if n == 0 {
                return None;
            }
            rest.extend_from_slice(&tmp[..n]);
        }
        captured.body = rest;
    }

    Some(captured)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn dechunk(mut data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(line_end) = find(data, b"\r\n") {
        let size_str = String::from_utf8_lossy(&data[..line_end]);
        let size = usize::from_str_radix(size_str.trim(), 16).unwrap_or(0);
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        out.extend_from_slice(&data[start..start + size]);
        data = &data[start + size + 2..];
    }
    out
}

/// Accepts one request and answers with `status` and `body`.
pub(crate) async fn respond(
    status: u16,
    body: &str,
) -> (String, oneshot::Receiver<CapturedRequest>) {
    let (listener, url) = bind().await;
    let (tx, rx) = oneshot::channel();
    let body = body.to_string();

    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let Some(request) = read_request(&mut stream).await else {
                return;
            };
            let _ = tx.send(request);

            let resp = format!(
                "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(resp.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (url, rx)
}

/// Reads the whole request and never answers.
pub(crate) async fn silent() -> (String, JoinHandle<()>) {
    let (listener, url) = bind().await;
    let handle = tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let _ = read_request(&mut stream).await;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            drop(stream);
        }
    });
    (url, handle)
}

/// Accepts a connection and never reads from it, so a large body stalls
/// once the socket buffers fill.
pub(crate) async fn holding() -> (String, JoinHandle<()>) {
    let (listener, url) = bind().await;
    let handle = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            drop(stream);
        }
    });
    (url, handle)
}

/// Signals `first_bytes` once the request starts arriving, stops reading
/// for `pause`, then drains the connection without ever answering.
pub(crate) async fn pausing(
    first_bytes: oneshot::Sender<()>,
    pause: Duration,
) -> (String, JoinHandle<()>) {
    let (listener, url) = bind().await;
    let handle = tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let mut buf = vec![0u8; 64 * 1024];
            if !matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {
                return;
            }
            let _ = first_bytes.send(());
            tokio::time::sleep(pause).await;
            while let Ok(n) = stream.read(&mut buf).await {
                if n == 0 {
                    break;
                }
            }
        }
    });
    (url, handle)
}

/// URL of a port nothing is listening on.
pub(crate) async fn refused() -> String {
    let (listener, url) = bind().await;
    drop(listener);
    url
}
