//! # Log Sanitization and Secret Handling
//!
//! Anything that flows into a log line or the escalation channel passes through
//! [`Sanitizer`]. Redaction is purely textual: substrings that look like key
//! material, passwords or tokens, and hex runs of 40+ characters, are replaced with
//! a marker. It is not semantic and will over-redact words such as "secretary".
//!
//! [`SecretHandle`] is the scoped alternative to best-effort cleanup of key material:
//! the bytes are zeroed when the handle is dropped, on every exit path.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Marker substituted for redacted secrets
pub const REDACTED: &str = "[REDACTED]";

/// Marker substituted for long hex strings (keys, signatures, hashes)
pub const REDACTED_HEX: &str = "[REDACTED_HEX]";

const SENSITIVE_WORDS: &str =
    r"private[_\-\s]?key|secret[_\-]?key|secret|password|passwd|api[_\-]?key|access[_\-]?token|token|mnemonic|seed[_\-\s]phrase";

static SENSITIVE_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#"(?i)(?:{SENSITIVE_WORDS})\s*[:=]\s*(?:"[^"]*"|'[^']*'|[^\s,;&]+)"#))
        .expect("sensitive assignment pattern is valid")
});

static SENSITIVE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(?i)(?:{SENSITIVE_WORDS})")).expect("sensitive word pattern is valid")
});

static LONG_HEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:0x)?[0-9a-f]{40,}\b").expect("hex pattern is valid")
});

/// Redact secrets from free text unconditionally
pub fn sanitize(text: &str) -> String {
    let stage = LONG_HEX.replace_all(text, REDACTED_HEX);
    let stage = SENSITIVE_ASSIGNMENT.replace_all(&stage, REDACTED);
    SENSITIVE_WORD.replace_all(&stage, REDACTED).into_owned()
}

/// Sanitize a JSON value in place
///
/// Values stored under sensitive-looking keys are replaced entirely; every other
/// string is run through [`sanitize`].
pub fn sanitize_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if SENSITIVE_WORD.is_match(key) {
                    *val = Value::String(REDACTED.to_string());
                } else {
                    sanitize_json(val);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sanitize_json),
        Value::String(s) => *s = sanitize(s),
        _ => {}
    }
}

/// Applies redaction only when secure-failure mode is enabled
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    enabled: bool,
}

impl Sanitizer {
    pub fn new(secure_failure_mode: bool) -> Self {
        Self {
            enabled: secure_failure_mode,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn text(&self, text: &str) -> String {
        if self.enabled {
            sanitize(text)
        } else {
            text.to_string()
        }
    }

    pub fn map(&self, data: &HashMap<String, Value>) -> HashMap<String, Value> {
        if !self.enabled {
            return data.clone();
        }
        data.iter()
            .map(|(key, value)| {
                if SENSITIVE_WORD.is_match(key) {
                    (key.clone(), Value::String(REDACTED.to_string()))
                } else {
                    let mut value = value.clone();
                    sanitize_json(&mut value);
                    (key.clone(), value)
                }
            })
            .collect()
    }
}

/// Key material that is zeroed when the handle goes out of scope
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretHandle {
    bytes: Vec<u8>,
}

impl SecretHandle {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn from_string(secret: String) -> Self {
        Self::new(secret.into_bytes())
    }

    /// Borrow the secret for the duration of a call
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Run `f` with the secret, consuming the handle so it is wiped afterwards
    pub fn with_secret<R>(self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.bytes)
    }
}

impl fmt::Debug for SecretHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretHandle")
            .field("bytes", &REDACTED)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_removes_sensitive_words() {
        let sanitized = sanitize("private_key abc123 password secret");
        let lower = sanitized.to_lowercase();
        assert!(!lower.contains("private_key"));
        assert!(!lower.contains("password"));
        assert!(sanitized.contains(REDACTED));
    }

    #[test]
    fn test_sanitize_removes_assigned_values() {
        let sanitized = sanitize("login failed: password=hunter2 user=alice");
        assert!(!sanitized.contains("hunter2"));
        assert!(sanitized.contains("user=alice"));
    }

    #[test]
    fn test_sanitize_redacts_long_hex() {
        let hex = "0x".to_string() + &"ab".repeat(32);
        let sanitized = sanitize(&format!("tx {hex} reverted"));
        assert!(!sanitized.contains(&hex));
        assert!(sanitized.contains(REDACTED_HEX));

        // 39 hex characters are below the cut-off
        let short = "a".repeat(39);
        assert_eq!(sanitize(&short), short);
    }

    #[test]
    fn test_sanitizer_disabled_passes_through() {
        let sanitizer = Sanitizer::new(false);
        assert_eq!(sanitizer.text("password=x"), "password=x");
        assert_eq!(Sanitizer::new(true).text("password=x"), REDACTED);
    }

    #[test]
    fn test_sanitize_json_masks_sensitive_keys() {
        let mut value = json!({
            "wallet": {"private_key": "5Kb8kLf9zgWQnogidDA76MzPL6TsZZY36hWXMssSzNydYXYB9KF"},
            "amount": 10,
            "note": "token=abc"
        });
        sanitize_json(&mut value);
        assert_eq!(value["wallet"]["private_key"], json!(REDACTED));
        assert_eq!(value["amount"], json!(10));
        assert_eq!(value["note"], json!(REDACTED));
    }

    #[test]
    fn test_secret_handle_debug_is_redacted() {
        let handle = SecretHandle::from_string("super-secret-seed".to_string());
        let debug = format!("{handle:?}");
        assert!(!debug.contains("super-secret-seed"));
        assert_eq!(handle.len(), 17);
        let first = handle.with_secret(|bytes| bytes[0]);
        assert_eq!(first, b's');
    }
}
