//! Fixtures shared by unit tests.

use crate::backend::{BackoffConfig, MockBackend};
use crate::exec_ctx::ExecCtx;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A document that satisfies the `script` descriptor.
pub(crate) fn script_value(title: &str) -> Value {
    json!({
        "planning": {
            "hook": "Tides are the moon pulling on you",
            "targetAudience": "curious teens",
            "angle": "everyday physics",
            "keyPoints": ["gravity", "two bulges"]
        },
        "script": {
            "title": title,
            "sections": [
                {"heading": "Hook", "content": "Look at this beach.", "rehook": "But wait.", "durationSeconds": 5},
                {"heading": "Why", "content": "The moon pulls.", "rehook": "And there is more."}
            ],
            "callToAction": "Follow for part two"
        },
        "socialPosts": [
            {"platform": "TikTok", "caption": "The sea breathes", "hashtags": ["#science"]},
            {"platform": "YouTube Shorts", "caption": "Tides explained"}
        ],
        "videoPrompts": [{"scene": "beach", "prompt": "timelapse of a tide"}]
    })
}

pub(crate) fn script_json(title: &str) -> String {
    script_value(title).to_string()
}

/// Context over `mock` with millisecond backoff so retry tests stay fast.
pub(crate) fn mock_ctx(mock: &Arc<MockBackend>, max_retries: u32) -> ExecCtx {
    ExecCtx::builder("http://mock.invalid")
        .backend(mock.clone())
        .backoff(BackoffConfig::standard().with_retries(max_retries, Duration::from_millis(1)))
        .build()
        .unwrap()
}

/// Client for [`raw_http_server`]: no proxy, short timeout.
pub(crate) fn local_client() -> Client {
    Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Consume one HTTP/1.1 request, headers plus a `Content-Length` body.
async fn read_request(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return Ok(());
            }
        }
    }
}

/// Local listener answering every connection with the raw bytes in `reply`,
/// then closing. With `None` the connection is closed without a response.
///
/// Returns the base URL and a count of accepted connections.
pub(crate) async fn raw_http_server(reply: Option<&'static [u8]>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = read_request(&mut socket).await;
            if let Some(bytes) = reply {
                let _ = socket.write_all(bytes).await;
                let _ = socket.shutdown().await;
            }
        }
    });
    (base_url, accepted)
}
