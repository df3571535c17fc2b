//! Permissive JSON repair for upstream bodies that are *almost* valid JSON
//! (§4.6): balances unterminated braces/brackets, strips control
//! characters outside of strings, and re-escapes raw newlines/quotes that
//! some providers leave unescaped inside tool-call argument strings.

/// Attempts a direct parse first; only falls back to repair on failure.
pub fn recover(raw: &str) -> Result<serde_json::Value, String> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
        return Ok(value);
    }

    let cleaned = strip_control_chars(raw);
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&cleaned) {
        return Ok(value);
    }

    let balanced = balance_braces(&cleaned);
    serde_json::from_str::<serde_json::Value>(&balanced)
        .map_err(|e| format!("json recovery failed: {e}"))
}

/// Removes ASCII control characters (other than `\t`, `\n`, `\r`, which are
/// legal whitespace between JSON tokens) that some providers leak into
/// otherwise well-formed bodies.
fn strip_control_chars(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

/// Appends the closing braces/brackets/quote needed to balance an
/// unterminated JSON document, as produced when a provider truncates a
/// streamed body mid-object.
fn balance_braces(raw: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in raw.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut result = raw.to_string();
    if in_string {
        result.push('"');
    }
    while let Some(closer) = stack.pop() {
        result.push(closer);
    }
    result
}

/// Outcome of sniffing a recovered JSON value's top-level shape, before the
/// untagged `WireResponse` deserialize ever sees it.
pub enum Shape {
    /// A value ready to deserialize as a known wire response (as-is, or
    /// wrapped into a synthetic OpenAI-shaped envelope).
    Value(serde_json::Value),
    /// The body was itself a provider error, not a response to decode.
    ProviderError { message: String },
}

/// Handles the top-level shapes a provider may send back instead of a
/// well-formed chat-completion/messages envelope: a bare `error`, an
/// already-Anthropic-shaped message, an OpenAI `choices[]` body, a bare
/// `content`/`message`/`text` string salvaged into a synthetic envelope, or
/// something unrecognized that still gets wrapped rather than rejected.
pub fn sniff_shape(value: serde_json::Value) -> Shape {
    let Some(obj) = value.as_object() else {
        tracing::warn!("provider response body was not a JSON object; wrapping as opaque content");
        return Shape::Value(wrap_as_openai_envelope(value.to_string()));
    };

    if let Some(error) = obj.get("error") {
        let message = match error {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(e) => e
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("provider returned an error")
                .to_string(),
            other => other.to_string(),
        };
        return Shape::ProviderError { message };
    }

    if obj.contains_key("choices") {
        return Shape::Value(value);
    }

    let looks_anthropic = obj.get("type").and_then(|t| t.as_str()) == Some("message")
        && obj.get("role").and_then(|r| r.as_str()) == Some("assistant")
        && obj.get("content").map(|c| c.is_array()).unwrap_or(false);
    if looks_anthropic {
        return Shape::Value(value);
    }

    for key in ["content", "message", "text"] {
        if let Some(salvaged) = obj.get(key) {
            let text = match salvaged {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Shape::Value(wrap_as_openai_envelope(text));
        }
    }

    tracing::warn!("provider response did not match a known shape; wrapping as opaque content");
    Shape::Value(wrap_as_openai_envelope(value.to_string()))
}

fn wrap_as_openai_envelope(content: String) -> serde_json::Value {
    serde_json::json!({
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}
