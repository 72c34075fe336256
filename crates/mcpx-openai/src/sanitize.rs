//! Scrubbing of provider error messages
//!
//! Provider messages can echo back keys or organization identifiers. They
//! are redacted and truncated before being shown to the user.

use regex::Regex;
use std::sync::OnceLock;

const MAX_MESSAGE_BYTES: usize = 256;

fn patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"sk-[A-Za-z0-9_-]{8,}", "sk-***"),             // OpenAI style
            (r"(?i)bearer\s+[A-Za-z0-9._~+/=-]+", "Bearer ***"), // Authorization echoes
            (r"gh[pousr]_[A-Za-z0-9_]{36,}", "ghp_***"),     // GitHub style
            (r"[A-Za-z0-9_-]{32,}", "***REDACTED***"),       // Long opaque strings
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
        .collect()
    })
}

/// Sanitize error messages to prevent information disclosure
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    for (re, replacement) in patterns() {
        sanitized = re.replace_all(&sanitized, *replacement).into_owned();
    }

    if sanitized.len() > MAX_MESSAGE_BYTES {
        let mut cut = MAX_MESSAGE_BYTES;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... [truncated]", &sanitized[..cut])
    } else {
        sanitized
    }
}
