//! Handling for caller-supplied provider credentials.
//!
//! Keys live only inside an [`ApiKey`] for the duration of one request. Its
//! `Debug` and `Display` output is redacted so the value cannot reach a log
//! line through formatting.

use std::fmt;

use crate::errors::GenerationError;

pub const REDACTED: &str = "[REDACTED]";

/// Longest key we accept; real provider keys are well under this.
const MAX_KEY_LEN: usize = 512;

#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Validates and wraps a raw key taken from a request.
    pub fn new(raw: impl Into<String>) -> Result<Self, GenerationError> {
        let raw = raw.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(GenerationError::InvalidRequest(
                "API key is required".to_string(),
            ));
        }
        if trimmed.len() > MAX_KEY_LEN {
            return Err(GenerationError::InvalidRequest(format!(
                "API key exceeds maximum length of {MAX_KEY_LEN} characters"
            )));
        }
        // Keys end up in HTTP headers, so only visible ASCII is allowed.
        if !trimmed.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(GenerationError::InvalidRequest(
                "API key contains invalid characters".to_string(),
            ));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// The raw key. Only the HTTP client should call this.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(")?;
        f.write_str(REDACTED)?;
        f.write_str(")")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

/// Replaces every occurrence of the key in `text`.
///
/// Upstream error bodies sometimes echo the credential back, so all provider
/// messages pass through here before they become part of an error.
#[must_use]
pub fn redact(text: &str, key: &ApiKey) -> String {
    let secret = key.expose();
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, REDACTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_hide_value() {
        let key = ApiKey::new("sk-test-123456").unwrap();
        assert_eq!(format!("{key:?}"), "ApiKey([REDACTED])");
        assert_eq!(format!("{key}"), "[REDACTED]");
        assert_eq!(key.expose(), "sk-test-123456");
    }

    #[test]
    fn test_new_trims_and_rejects_blank() {
        assert_eq!(ApiKey::new("  abc  ").unwrap().expose(), "abc");
        assert!(ApiKey::new("   ").is_err());
        assert!(ApiKey::new("abc def").is_err());
        assert!(ApiKey::new("abc\ndef").is_err());
    }

    #[test]
    fn test_redact_replaces_all_occurrences() {
        let key = ApiKey::new("secret-key").unwrap();
        let text = "bad key secret-key (secret-key)";
        assert_eq!(redact(text, &key), "bad key [REDACTED] ([REDACTED])");
    }
}
