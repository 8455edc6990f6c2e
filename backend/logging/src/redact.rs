//! Log Redaction
//!
//! Scrubs API keys and bearer tokens from text before it is logged. Oracle and
//! provider error bodies routinely echo the request, key included.

use once_cell::sync::Lazy;
use regex::Regex;

static BEARER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bearer\s+[a-z0-9\-._~+/]+=*").unwrap());
/// OpenAI/OpenRouter style `sk-...` and Google `AIza...` keys.
static API_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:sk-[A-Za-z0-9\-_]{16,}|AIza[0-9A-Za-z\-_]{20,})").unwrap());
/// `key=...` query parameters and `x-goog-api-key: ...` headers.
static KEY_PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)((?:[?&]key=)|(?:x-goog-api-key:\s*)|(?:api[_-]?key[\x22']?\s*[:=]\s*[\x22']?))[^\s&\x22',}]+").unwrap()
});

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = BEARER_RE.replace_all(input, "Bearer [REDACTED_TOKEN]");
    let redacted = KEY_PARAM_RE.replace_all(&redacted, "${1}[REDACTED_TOKEN]");
    API_KEY_RE
        .replace_all(&redacted, "[REDACTED_TOKEN]")
        .into_owned()
}
