//! Credential redaction for error messages and logs.
//!
//! Bearer tokens must never reach persisted job state or log output.
//! Redaction replaces exact occurrences of the literal token value; an
//! encoded or otherwise transformed token is not detected. That gap is
//! inherited behavior and is documented rather than papered over.

/// Marker substituted for a redacted credential.
pub const REDACTED: &str = "[REDACTED]";

/// Replace every exact occurrence of `token` in `message` with
/// [`REDACTED`]. Empty tokens leave the message untouched.
pub fn redact_secret(message: &str, token: &str) -> String {
    if token.is_empty() || !message.contains(token) {
        return message.to_string();
    }
    message.replace(token, REDACTED)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
