//! Message validation and content sanitization.
//!
//! Text fields are sanitized first (script blocks, HTML tags and script
//! URL schemes removed) and the sanitized message is then checked against
//! the configured bounds.

use serde_json::Value;
use thiserror::Error;

use notifyhub_core::config::NotificationConfig;
use notifyhub_entity::{NotificationCategory, NotificationMessage};

/// Schemes removed from free text.
const SCRIPT_SCHEMES: [&str; 2] = ["javascript:", "vbscript:"];

/// Why a message was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("title is empty")]
    EmptyTitle,
    #[error("title has {len} characters, limit is {max}")]
    TitleTooLong { len: usize, max: usize },
    #[error("body has {len} characters, limit is {max}")]
    BodyTooLong { len: usize, max: usize },
    #[error("payload nesting depth {depth} exceeds {max}")]
    PayloadTooDeep { depth: usize, max: usize },
    #[error("action url scheme is not allowed: {0}")]
    DisallowedActionUrl(String),
    #[error("expiry must be after creation time")]
    ExpiryNotAfterCreation,
    #[error("variant '{variant}' cannot be used with category '{category}'")]
    VariantCategoryMismatch {
        variant: &'static str,
        category: NotificationCategory,
    },
}

/// Validates and sanitizes messages before authorization.
#[derive(Debug, Clone)]
pub struct MessageValidator {
    max_title_length: usize,
    max_body_length: usize,
    max_payload_depth: usize,
}

impl MessageValidator {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            max_title_length: config.max_title_length,
            max_body_length: config.max_body_length,
            max_payload_depth: config.max_payload_depth,
        }
    }

    /// Sanitize text fields in place, then check every bound.
    pub fn sanitize_and_validate(&self, message: &mut NotificationMessage) -> Result<(), ValidationIssue> {
        message.title = sanitize_text(&message.title).trim().to_string();
        message.body = sanitize_text(&message.body);
        if let Some(text) = message.action_text.take() {
            message.action_text = Some(sanitize_text(&text));
        }
        if let Some(payload) = message.payload.as_mut() {
            sanitize_value(payload);
        }
        self.validate(message)
    }

    /// Check bounds without modifying the message.
    pub fn validate(&self, message: &NotificationMessage) -> Result<(), ValidationIssue> {
        if message.title.is_empty() {
            return Err(ValidationIssue::EmptyTitle);
        }
        let title_len = message.title.chars().count();
        if title_len > self.max_title_length {
            return Err(ValidationIssue::TitleTooLong {
                len: title_len,
                max: self.max_title_length,
            });
        }
        let body_len = message.body.chars().count();
        if body_len > self.max_body_length {
            return Err(ValidationIssue::BodyTooLong {
                len: body_len,
                max: self.max_body_length,
            });
        }
        if let Some(payload) = &message.payload {
            let depth = value_depth(payload);
            if depth > self.max_payload_depth {
                return Err(ValidationIssue::PayloadTooDeep {
                    depth,
                    max: self.max_payload_depth,
                });
            }
        }
        if let Some(url) = &message.action_url {
            if !is_allowed_action_url(url) {
                return Err(ValidationIssue::DisallowedActionUrl(url.clone()));
            }
        }
        if message.expires_at.is_some_and(|exp| exp <= message.created_at) {
            return Err(ValidationIssue::ExpiryNotAfterCreation);
        }
        if !message.variant.accepts_category(message.category) {
            return Err(ValidationIssue::VariantCategoryMismatch {
                variant: message.variant.tag(),
                category: message.category,
            });
        }
        Ok(())
    }
}

/// Nesting depth of containers: scalars are 0, `{"a": 1}` is 1.
pub fn value_depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(value_depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(value_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Relative URLs and `http`/`https` URLs are allowed.
pub fn is_allowed_action_url(url: &str) -> bool {
    let url = url.trim();
    let scheme_end = url.find(':');
    let path_start = url.find(['/', '?', '#']);
    match (scheme_end, path_start) {
        (Some(colon), Some(path)) if path < colon => true,
        (Some(_), _) => {
            let lower = url.to_ascii_lowercase();
            lower.starts_with("http://") || lower.starts_with("https://")
        }
        (None, _) => true,
    }
}

/// Remove `<script>` blocks, every other HTML tag and script URL schemes.
pub fn sanitize_text(input: &str) -> String {
    let without_scripts = strip_script_blocks(input);
    let without_tags = strip_tags(&without_scripts);
    strip_script_schemes(&without_tags)
}

fn sanitize_value(value: &mut Value) {
    match value {
        Value::String(s) => *s = sanitize_text(s),
        Value::Array(items) => items.iter_mut().for_each(sanitize_value),
        Value::Object(map) => map.values_mut().for_each(sanitize_value),
        _ => {}
    }
}

fn strip_script_blocks(input: &str) -> String {
    let lower = input.to_ascii_lowercase();
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find("<script").map(|i| i + pos) {
        out.push_str(&input[pos..start]);
        pos = match lower[start..].find("</script").map(|i| i + start) {
            Some(close) => lower[close..].find('>').map_or(input.len(), |i| close + i + 1),
            None => input.len(),
        };
    }
    out.push_str(&input[pos..]);
    out
}

fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn strip_script_schemes(input: &str) -> String {
    let mut out = input.to_string();
    for scheme in SCRIPT_SCHEMES {
        loop {
            let lower = out.to_ascii_lowercase();
            let Some(idx) = lower.find(scheme) else {
                break;
            };
            out.replace_range(idx..idx + scheme.len(), "");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use notifyhub_entity::NotificationKind;
    use notifyhub_entity::notification::variant::{NotificationVariant, StorageUsage};
    use serde_json::json;

    use super::*;

    fn validator() -> MessageValidator {
        MessageValidator::new(&NotificationConfig::default())
    }

    fn message(title: &str, body: &str) -> NotificationMessage {
        NotificationMessage::new(NotificationCategory::User, NotificationKind::Info, title, body)
    }

    #[test]
    fn test_sanitizes_markup_and_script_schemes() {
        let mut msg = message(
            "<b>Hello</b>",
            "before<script>alert('x')</script>after <a href=\"JavaScript:run()\">link</a>",
        );
        validator().sanitize_and_validate(&mut msg).unwrap();
        assert_eq!(msg.title, "Hello");
        assert_eq!(msg.body, "beforeafter link");
    }

    #[test]
    fn test_payload_strings_are_sanitized() {
        let mut msg = message("t", "b").with_payload(json!({"note": "<i>hi</i>", "list": ["javascript:x"]}));
        validator().sanitize_and_validate(&mut msg).unwrap();
        assert_eq!(msg.payload.unwrap(), json!({"note": "hi", "list": ["x"]}));
    }

    #[test]
    fn test_length_limits_count_characters() {
        let v = validator();
        assert!(v.validate(&message(&"é".repeat(200), "")).is_ok());
        assert_eq!(
            v.validate(&message(&"a".repeat(201), "")),
            Err(ValidationIssue::TitleTooLong { len: 201, max: 200 })
        );
        assert!(matches!(
            v.validate(&message("t", &"b".repeat(2001))),
            Err(ValidationIssue::BodyTooLong { .. })
        ));
        let mut empty = message("<br>", "");
        assert_eq!(v.sanitize_and_validate(&mut empty), Err(ValidationIssue::EmptyTitle));
    }

    #[test]
    fn test_payload_depth() {
        let v = validator();
        let ok = message("t", "b").with_payload(json!({"a": {"b": {"c": 1}}}));
        assert!(v.validate(&ok).is_ok());
        let deep = message("t", "b").with_payload(json!({"a": {"b": {"c": {"d": 1}}}}));
        assert_eq!(
            v.validate(&deep),
            Err(ValidationIssue::PayloadTooDeep { depth: 4, max: 3 })
        );
    }

    #[test]
    fn test_action_url_schemes() {
        assert!(is_allowed_action_url("https://example.com/x"));
        assert!(is_allowed_action_url("HTTP://example.com"));
        assert!(is_allowed_action_url("/settings/storage"));
        assert!(is_allowed_action_url("reports/latest?from=10:00"));
        assert!(!is_allowed_action_url("javascript:alert(1)"));
        assert!(!is_allowed_action_url("data:text/html,hi"));
        assert!(!is_allowed_action_url("ftp://host/file"));

        let msg = message("t", "b").with_action("javascript:alert(1)", "Go");
        assert!(matches!(
            validator().validate(&msg),
            Err(ValidationIssue::DisallowedActionUrl(_))
        ));
    }

    #[test]
    fn test_expiry_and_variant_checks() {
        let v = validator();
        let mut msg = message("t", "b");
        msg.expires_at = Some(msg.created_at);
        assert_eq!(v.validate(&msg), Err(ValidationIssue::ExpiryNotAfterCreation));
        assert!(v.validate(&message("t", "b").expires_in(Duration::minutes(5))).is_ok());

        let mismatched = message("t", "b").with_variant(NotificationVariant::Storage(StorageUsage {
            used_gb: 1.0,
            limit_gb: 2.0,
            usage_percent: 50.0,
            blocked_at: None,
        }));
        assert!(matches!(
            v.validate(&mismatched),
            Err(ValidationIssue::VariantCategoryMismatch { variant: "storage", .. })
        ));
    }
}
