use regex::Regex;
use serde_json::Value;

const SENTINEL: &str = "[REDACTED]";

/// Compiled once per profile load (patterns are case-insensitive and rarely
/// change), then applied to every outbound text block and structured
/// payload. Idempotent: the sentinel itself never re-matches a pattern or a
/// sensitive-key check, so a second pass is a no-op.
pub struct Redactor {
    patterns: Vec<Regex>,
    sensitive_substrings: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RedactorError {
    #[error("invalid redaction pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl Redactor {
    pub fn new(patterns: &[String], sensitive_substrings: &[String]) -> Result<Self, RedactorError> {
        let compiled = patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| RedactorError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns: compiled,
            sensitive_substrings: sensitive_substrings.iter().map(|s| s.to_lowercase()).collect(),
        })
    }

    pub fn empty() -> Self {
        Self { patterns: Vec::new(), sensitive_substrings: Vec::new() }
    }

    /// Replaces the value captured by group 2 of any matching pattern
    /// (conventionally `key` in group 1, `value` in group 2) with the
    /// sentinel, leaving the key-like prefix untouched.
    pub fn redact_text(&self, text: &str) -> String {
        let mut result = text.to_string();
        for pattern in &self.patterns {
            result = pattern
                .replace_all(&result, |caps: &regex::Captures| {
                    if let Some(key) = caps.get(1) {
                        format!("{}{}", key.as_str(), SENTINEL)
                    } else {
                        SENTINEL.to_string()
                    }
                })
                .into_owned();
        }
        result
    }

    fn is_sensitive_key(&self, key: &str) -> bool {
        let lower = key.to_lowercase();
        self.sensitive_substrings.iter().any(|needle| lower.contains(needle.as_str()))
    }

    /// Recurses into a structured payload, replacing the entire value of any
    /// sensitive-named key and running [`Redactor::redact_text`] over every
    /// remaining string leaf.
    pub fn redact_value(&self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, inner) in map.iter_mut() {
                    if self.is_sensitive_key(key) {
                        *inner = Value::String(SENTINEL.to_string());
                    } else {
                        self.redact_value(inner);
                    }
                }
            }
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.redact_value(item);
                }
            }
            Value::String(s) => {
                *s = self.redact_text(s);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn redactor() -> Redactor {
        Redactor::new(
            &[r"(?i)(token\s*[:=]\s*)(\S+)".to_string()],
            &["token".to_string(), "password".to_string(), "secret".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn redacts_value_following_a_key_like_token() {
        let r = redactor();
        assert_eq!(r.redact_text("API_TOKEN: abc123\nok"), "API_TOKEN: [REDACTED]\nok");
    }

    #[test]
    fn text_redaction_is_idempotent() {
        let r = redactor();
        let once = r.redact_text("token: abc123");
        let twice = r.redact_text(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn redacts_sensitive_keys_in_structured_payloads() {
        let r = redactor();
        let mut value = json!({"password": "hunter2", "nested": {"secret_key": "xyz"}, "ok": "fine"});
        r.redact_value(&mut value);
        assert_eq!(value["password"], json!("[REDACTED]"));
        assert_eq!(value["nested"]["secret_key"], json!("[REDACTED]"));
        assert_eq!(value["ok"], json!("fine"));
    }

    #[test]
    fn structured_redaction_is_idempotent() {
        let r = redactor();
        let mut value = json!({"password": "hunter2"});
        r.redact_value(&mut value);
        let once = value.clone();
        r.redact_value(&mut value);
        assert_eq!(value, once);
    }
}
