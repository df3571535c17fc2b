//! Field extraction helpers for structured logging.

use crate::execution::ExecutionResult;

/// Extract outcome/error fields from an [`ExecutionResult`] for a tracing
/// event, mirroring the shape the original field-extraction helpers gave
/// `ChatCompletionResponse`/`ApiError` pairs.
///
/// Returns (status, error_message): `("success", None)` on a successful
/// execution, `(error_kind, Some(message))` otherwise.
pub fn extract_status(result: &ExecutionResult) -> (String, Option<String>) {
    if result.success {
        ("success".to_string(), None)
    } else {
        match &result.error {
            Some(e) => (e.kind().to_string(), Some(e.message())),
            None => ("failure".to_string(), None),
        }
    }
}

/// Redact a header value for logging (`Authorization` -> `Bearer ***`).
pub fn redact_header(name: &str, value: &str) -> String {
    if name.eq_ignore_ascii_case("authorization") {
        "Bearer ***".to_string()
    } else {
        value.to_string()
    }
}

/// Truncate an upstream request/response body preview to its first 100
/// characters, for debug-level logging of otherwise-sensitive payloads.
pub fn redact_body_preview(body: &str) -> String {
    truncate_string(body, 100)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len).collect();
        format!("{truncated}...")
    }
}
