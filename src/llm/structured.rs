//! Decoding of JSON-only replies from secondary model calls

use serde::de::DeserializeOwned;

use super::client::LlmError;

/// Parse a model reply that should be a single JSON object.
///
/// Tolerates a surrounding markdown code fence and prose around the object;
/// anything else is `LlmError::InvalidResponse`.
pub fn parse_structured<T: DeserializeOwned>(reply: &str) -> Result<T, LlmError> {
    let body = strip_code_fence(reply.trim());

    if let Ok(value) = serde_json::from_str(body) {
        return Ok(value);
    }

    // Fall back to the outermost {...} span
    let object = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => {
            return Err(LlmError::InvalidResponse(format!(
                "expected a JSON object, got: {}",
                truncate_for_error(body, 100)
            )));
        }
    };

    serde_json::from_str(object).map_err(|e| {
        LlmError::InvalidResponse(format!("{}: {}", e, truncate_for_error(object, 100)))
    })
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`, `JSON`, ...) up to the first newline
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Truncate text for error messages.
fn truncate_for_error(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
