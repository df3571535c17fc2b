//! HTTP Request Handler (§4.6). Owns the outbound call; does not
//! classify failures — it surfaces raw transport outcomes or HTTP status +
//! body, and leaves classification to the Error Classifier (§4.9).

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use std::collections::HashMap;
use std::time::Duration;

const KEEP_ALIVE_THRESHOLD_BYTES: usize = 10 * 1024;
const CHUNK_SIZE_BYTES: usize = 8 * 1024;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const USER_AGENT_VALUE: &str = "linkrelay/0.1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    ConnectionRefused,
    DnsFailure,
    ConnectionReset,
    SocketHangUp,
    Timeout,
    BufferError,
    Other,
}

#[derive(Debug, Clone)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct HttpOutcome {
    pub status: u16,
    pub body: Bytes,
}

pub struct RequestOptions<'a> {
    pub url: &'a str,
    pub api_key: &'a str,
    pub custom_headers: &'a HashMap<String, String>,
    pub timeout: Duration,
}

/// `Do(url, options) -> Response`.
pub async fn send(
    client: &reqwest::Client,
    body: Bytes,
    options: RequestOptions<'_>,
) -> Result<HttpOutcome, TransportError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", options.api_key))
            .unwrap_or_else(|_| HeaderValue::from_static("Bearer invalid")),
    );
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

    for (key, value) in options.custom_headers {
        if let (Ok(name), Ok(val)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, val);
        }
    }

    if body.len() > KEEP_ALIVE_THRESHOLD_BYTES {
        headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );
        if let Ok(v) = HeaderValue::from_str("timeout=300, max=10") {
            headers.insert(
                HeaderName::from_static("keep-alive"),
                v,
            );
        }
    }

    let request_body = if body.len() > KEEP_ALIVE_THRESHOLD_BYTES {
        chunked_body(body)
    } else {
        reqwest::Body::from(body)
    };

    let heartbeat = spawn_heartbeat(options.url.to_string());

    let result = client
        .post(options.url)
        .headers(headers)
        .timeout(options.timeout)
        .body(request_body)
        .send()
        .await;

    heartbeat.abort();

    let response = result.map_err(classify_transport_error)?;
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(|e| TransportError {
        kind: TransportErrorKind::BufferError,
        message: e.to_string(),
    })?;

    Ok(HttpOutcome { status, body })
}

/// Writes the body to the outbound stream in 8 KiB chunks, avoiding memory
/// spikes for large payloads (§4.6 "large-body write policy").
fn chunked_body(body: Bytes) -> reqwest::Body {
    let chunks: Vec<Result<Bytes, std::io::Error>> = body
        .chunks(CHUNK_SIZE_BYTES)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    reqwest::Body::wrap_stream(futures_util::stream::iter(chunks))
}

/// Logs a warning every 30s of silence from the peer, for large requests
/// only. Cancelled (aborted) once the call completes.
fn spawn_heartbeat(url: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            tracing::warn!(url = %url, "outbound request still in flight after 30s of silence");
        }
    })
}

fn classify_transport_error(err: reqwest::Error) -> TransportError {
    let message = err.to_string();
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        if message.contains("refused") {
            TransportErrorKind::ConnectionRefused
        } else if message.contains("dns") || message.contains("resolve") {
            TransportErrorKind::DnsFailure
        } else {
            TransportErrorKind::ConnectionRefused
        }
    } else if message.contains("reset") {
        TransportErrorKind::ConnectionReset
    } else if message.contains("hang up") || message.contains("broken pipe") {
        TransportErrorKind::SocketHangUp
    } else {
        TransportErrorKind::Other
    };
    TransportError { kind, message }
}
