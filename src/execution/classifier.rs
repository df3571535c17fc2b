//! Error Classifier (§4.9): a pure function from failure shape to
//! `ErrorAction`. Takes no locks and performs no I/O.

use super::attempt::ErrorAction;
use crate::server::http::{TransportError, TransportErrorKind};
use std::time::Duration;

/// Everything the classifier needs to know about one failed attempt.
///
/// HTTP 429 is deliberately absent from `Http` — its ladder (1st/2nd
/// temporary block, 3rd-consecutive destroy) is stateful and owned by
/// `BlacklistManager::handle_429`, which the orchestrator consults before
/// ever reaching this function. Everything else here is a pure mapping.
pub enum FailureShape<'a> {
    Http { status: u16 },
    Transport(&'a TransportError),
    InvalidJson,
}

pub struct ClassifyContext {
    pub attempt_number: u32,
    pub max_retries: u32,
}

pub fn classify(failure: &FailureShape<'_>, ctx: &ClassifyContext) -> ErrorAction {
    match failure {
        FailureShape::Http { status } => classify_http(*status),
        FailureShape::Transport(err) => classify_transport(err, ctx),
        FailureShape::InvalidJson => ErrorAction::SkipPipeline {
            reason: "invalid_json_response".to_string(),
        },
    }
}

fn classify_http(status: u16) -> ErrorAction {
    match status {
        502 => ErrorAction::SkipPipeline {
            reason: "bad_gateway".to_string(),
        },
        503 => ErrorAction::BlacklistPipeline {
            duration: Duration::from_secs(30),
            reason: "service_unavailable".to_string(),
        },
        504 => ErrorAction::SkipPipeline {
            reason: "gateway_timeout".to_string(),
        },
        500..=599 => ErrorAction::BlacklistPipeline {
            duration: Duration::from_secs(60),
            reason: "server_error".to_string(),
        },
        400..=499 => ErrorAction::FatalError {
            reason: format!("client_error_{status}"),
        },
        _ => ErrorAction::FatalError {
            reason: "unknown_error".to_string(),
        },
    }
}

fn classify_transport(err: &TransportError, ctx: &ClassifyContext) -> ErrorAction {
    let has_budget = ctx.attempt_number < ctx.max_retries;
    match err.kind {
        TransportErrorKind::ConnectionRefused => ErrorAction::SkipPipeline {
            reason: "connection_refused".to_string(),
        },
        TransportErrorKind::DnsFailure => ErrorAction::SkipPipeline {
            reason: "dns_resolution_failed".to_string(),
        },
        TransportErrorKind::ConnectionReset => {
            if has_budget {
                ErrorAction::RetrySamePipeline {
                    retry_after: Duration::from_secs(1),
                    reason: "connection_reset".to_string(),
                }
            } else {
                ErrorAction::SkipPipeline {
                    reason: "connection_reset".to_string(),
                }
            }
        }
        TransportErrorKind::SocketHangUp => {
            if has_budget {
                ErrorAction::RetrySamePipeline {
                    retry_after: Duration::from_secs(2),
                    reason: "socket_hang_up".to_string(),
                }
            } else {
                ErrorAction::SkipPipeline {
                    reason: "socket_hang_up".to_string(),
                }
            }
        }
        TransportErrorKind::Timeout => {
            if has_budget {
                let millis = 1000u64.saturating_mul(1u64 << ctx.attempt_number.min(4));
                ErrorAction::RetrySamePipeline {
                    retry_after: Duration::from_millis(millis).min(Duration::from_secs(10)),
                    reason: "timeout".to_string(),
                }
            } else {
                ErrorAction::SkipPipeline {
                    reason: "timeout".to_string(),
                }
            }
        }
        TransportErrorKind::BufferError | TransportErrorKind::Other => ErrorAction::FatalError {
            reason: "unknown_error".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(attempt: u32) -> ClassifyContext {
        ClassifyContext {
            attempt_number: attempt,
            max_retries: 3,
        }
    }

    #[test]
    fn http_502_skips() {
        let action = classify_http(502);
        assert!(matches!(action, ErrorAction::SkipPipeline { .. }));
    }

    #[test]
    fn http_503_blacklists_30s() {
        match classify_http(503) {
            ErrorAction::BlacklistPipeline { duration, .. } => {
                assert_eq!(duration, Duration::from_secs(30))
            }
            _ => panic!("expected blacklist"),
        }
    }

    #[test]
    fn http_504_skips() {
        assert!(matches!(classify_http(504), ErrorAction::SkipPipeline { .. }));
    }

    #[test]
    fn other_5xx_blacklists_60s() {
        match classify_http(500) {
            ErrorAction::BlacklistPipeline { duration, .. } => {
                assert_eq!(duration, Duration::from_secs(60))
            }
            _ => panic!("expected blacklist"),
        }
    }

    #[test]
    fn non_429_4xx_is_fatal_with_code() {
        match classify_http(404) {
            ErrorAction::FatalError { reason } => assert_eq!(reason, "client_error_404"),
            _ => panic!("expected fatal"),
        }
    }

    #[test]
    fn timeout_backoff_doubles_until_cap() {
        let err = TransportError {
            kind: TransportErrorKind::Timeout,
            message: "timeout".to_string(),
        };
        match classify_transport(&err, &ctx(0)) {
            ErrorAction::RetrySamePipeline { retry_after, .. } => {
                assert_eq!(retry_after, Duration::from_secs(1))
            }
            _ => panic!("expected retry"),
        }
        match classify_transport(&err, &ctx(5)) {
            ErrorAction::RetrySamePipeline { retry_after, .. } => {
                assert_eq!(retry_after, Duration::from_secs(10))
            }
            _ => panic!("expected retry"),
        }
    }

    #[test]
    fn exhausted_retries_skip_instead_of_retry() {
        let err = TransportError {
            kind: TransportErrorKind::SocketHangUp,
            message: "hang up".to_string(),
        };
        assert!(matches!(
            classify_transport(&err, &ctx(3)),
            ErrorAction::SkipPipeline { .. }
        ));
    }

    #[test]
    fn connection_refused_and_dns_failure_skip() {
        let refused = TransportError {
            kind: TransportErrorKind::ConnectionRefused,
            message: String::new(),
        };
        let dns = TransportError {
            kind: TransportErrorKind::DnsFailure,
            message: String::new(),
        };
        assert!(matches!(
            classify_transport(&refused, &ctx(0)),
            ErrorAction::SkipPipeline { .. }
        ));
        assert!(matches!(
            classify_transport(&dns, &ctx(0)),
            ErrorAction::SkipPipeline { .. }
        ));
    }
}
