//! Server layer (§4.7): performs the outbound HTTP call with a bounded
//! local retry policy for transient failures. Retries here are about
//! surviving flaky transport, not about choosing a different pipeline —
//! that decision belongs to the execution manager (`crate::execution`).

pub mod http;
pub mod json_recovery;

use http::{HttpOutcome, RequestOptions, TransportError, TransportErrorKind};
use std::collections::HashMap;
use std::time::Duration;

const BASE_BACKOFF: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];
const BACKOFF_CAP: Duration = Duration::from_secs(10);
const SOCKET_HANG_UP_FIRST_RETRY: Duration = Duration::from_secs(2);
const BUFFER_ERROR_BACKOFF: [Duration; 3] = [
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(30),
];

#[derive(Debug, Clone)]
pub enum ServerOutcome {
    Response(HttpOutcome),
    Transport(TransportError),
}

pub struct CallTarget {
    pub url: String,
    pub api_key: String,
    pub custom_headers: HashMap<String, String>,
    pub timeout: Duration,
}

/// Runs the call, retrying up to `max_retries` times on network errors and
/// on 5xx responses other than 502/504 (those are surfaced immediately —
/// the execution manager's error classifier treats them as skip-worthy,
/// not server-retryable).
pub async fn execute_with_retry(
    client: &reqwest::Client,
    body: bytes::Bytes,
    target: &CallTarget,
    max_retries: u32,
) -> ServerOutcome {
    let mut attempt = 0u32;
    loop {
        let options = RequestOptions {
            url: &target.url,
            api_key: &target.api_key,
            custom_headers: &target.custom_headers,
            timeout: target.timeout,
        };
        let outcome = http::send(client, body.clone(), options).await;
        match outcome {
            Ok(response) => {
                if !is_server_retryable_status(response.status) || attempt >= max_retries {
                    return ServerOutcome::Response(response);
                }
            }
            Err(ref err) => {
                if !is_server_retryable_transport(&err.kind) || attempt >= max_retries {
                    return ServerOutcome::Transport(err.clone());
                }
            }
        }

        let backoff = match &outcome {
            Ok(_) => capped_backoff(attempt),
            Err(err) => backoff_for_transport_error(err.kind.clone(), attempt),
        };
        tokio::time::sleep(backoff).await;
        attempt += 1;

        if let Err(err) = outcome {
            if attempt > max_retries {
                return ServerOutcome::Transport(err);
            }
        }
    }
}

fn is_server_retryable_status(status: u16) -> bool {
    matches!(status, 500..=599) && status != 502 && status != 504
}

/// Only the transient-connection kinds are worth a local retry here; a
/// refused connection or DNS failure won't resolve on the same pipeline
/// within the backoff window, so it should fall straight through to the
/// execution manager's skip-to-sibling logic instead of burning the local
/// retry budget.
fn is_server_retryable_transport(kind: &TransportErrorKind) -> bool {
    matches!(
        kind,
        TransportErrorKind::ConnectionReset | TransportErrorKind::SocketHangUp | TransportErrorKind::Timeout
    )
}

fn capped_backoff(attempt: u32) -> Duration {
    let idx = (attempt as usize).min(BASE_BACKOFF.len() - 1);
    BASE_BACKOFF[idx].min(BACKOFF_CAP)
}

fn backoff_for_transport_error(kind: TransportErrorKind, attempt: u32) -> Duration {
    match kind {
        TransportErrorKind::SocketHangUp if attempt == 0 => SOCKET_HANG_UP_FIRST_RETRY,
        TransportErrorKind::BufferError => {
            let idx = (attempt as usize).min(BUFFER_ERROR_BACKOFF.len() - 1);
            BUFFER_ERROR_BACKOFF[idx]
        }
        TransportErrorKind::Timeout => {
            let millis = 1000u64.saturating_mul(1u64 << attempt.min(4));
            Duration::from_millis(millis).min(BACKOFF_CAP)
        }
        _ => capped_backoff(attempt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses_exclude_502_and_504() {
        assert!(is_server_retryable_status(500));
        assert!(is_server_retryable_status(503));
        assert!(!is_server_retryable_status(502));
        assert!(!is_server_retryable_status(504));
        assert!(!is_server_retryable_status(404));
    }

    #[test]
    fn backoff_schedule_is_capped() {
        assert_eq!(capped_backoff(0), Duration::from_secs(1));
        assert_eq!(capped_backoff(1), Duration::from_secs(2));
        assert_eq!(capped_backoff(10), Duration::from_secs(4));
    }

    #[test]
    fn connection_refused_and_dns_failure_are_not_server_retryable() {
        assert!(!is_server_retryable_transport(&TransportErrorKind::ConnectionRefused));
        assert!(!is_server_retryable_transport(&TransportErrorKind::DnsFailure));
        assert!(!is_server_retryable_transport(&TransportErrorKind::BufferError));
        assert!(!is_server_retryable_transport(&TransportErrorKind::Other));
    }

    #[test]
    fn connection_reset_socket_hang_up_and_timeout_are_server_retryable() {
        assert!(is_server_retryable_transport(&TransportErrorKind::ConnectionReset));
        assert!(is_server_retryable_transport(&TransportErrorKind::SocketHangUp));
        assert!(is_server_retryable_transport(&TransportErrorKind::Timeout));
    }

    #[test]
    fn socket_hang_up_first_retry_is_two_seconds() {
        let d = backoff_for_transport_error(TransportErrorKind::SocketHangUp, 0);
        assert_eq!(d, Duration::from_secs(2));
    }

    #[test]
    fn buffer_error_uses_long_backoff_ladder() {
        assert_eq!(
            backoff_for_transport_error(TransportErrorKind::BufferError, 0),
            Duration::from_secs(5)
        );
        assert_eq!(
            backoff_for_transport_error(TransportErrorKind::BufferError, 2),
            Duration::from_secs(30)
        );
    }
}
