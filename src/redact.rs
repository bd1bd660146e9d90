//! Secret scrubbing for text shown to the user.
//!
//! Command stderr and API error bodies are the most useful diagnostics for
//! expired credentials or unreachable clusters, so they are shown, but header
//! values, bearer tokens, session cookies and JWTs are masked first.

use std::sync::OnceLock;

use regex::Regex;

const MASK: &str = "[REDACTED]";

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(authorization|proxy-authorization|cookie|set-cookie|x-api-key)\s*:\s*[^\r\n]+")
            .expect("header regex should compile")
    })
}

fn bearer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(bearer|basic)\s+[A-Za-z0-9._~+/=-]{8,}").expect("bearer regex should compile")
    })
}

fn key_value_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?ix)
            \b([a-z0-9_-]*(?:token|password|passwd|secret|session|api[_-]?key)[a-z0-9_-]*)
            "?\s*[=:]\s*
            ("[^"]*"|'[^']*'|[^\s&;,]+)
            "#,
        )
        .expect("key/value regex should compile")
    })
}

fn jwt_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+").expect("jwt regex should compile")
    })
}

/// Mask credentials in `text`, leaving the surrounding diagnostic intact.
pub fn redact_secrets(text: &str) -> String {
    let text = header_regex().replace_all(text, format!("${{1}}: {}", MASK).as_str());
    let text = bearer_regex().replace_all(&text, format!("${{1}} {}", MASK).as_str());
    let text = key_value_regex().replace_all(&text, format!("${{1}}={}", MASK).as_str());
    jwt_regex().replace_all(&text, MASK).into_owned()
}
