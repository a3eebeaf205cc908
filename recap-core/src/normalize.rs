//! Email payload normalization
//!
//! The upstream automation webhook returns email data in whatever shape its
//! workflow happens to produce: a bare array, an object wrapping an array
//! under one of several keys, or a single email object. Field names vary
//! too (`subject` / `title` / `Subject`, `sender` / `from` / `fromEmail`, ...).
//!
//! Normalization runs in two steps:
//! 1. [`classify`] maps the parsed JSON onto a closed [`PayloadShape`].
//! 2. Every item is mapped onto [`EmailSummary`] with the alias tables below,
//!    substituting placeholders for anything missing.
//!
//! Nothing here fails. Unusable input produces an empty list. The capture time
//! is a parameter so output is reproducible.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::models::EmailSummary;

/// Container keys probed on an object payload, highest priority first.
pub const CONTAINER_KEYS: [&str; 6] = ["summaries", "emails", "data", "items", "results", "messages"];

const ID_ALIASES: &[&str] = &["id", "messageId"];
const SUBJECT_ALIASES: &[&str] = &["subject", "title", "Subject"];
const SENDER_ALIASES: &[&str] = &["sender", "from", "From", "fromEmail"];
const SUMMARY_ALIASES: &[&str] = &["summary", "content", "body", "Summary", "emailSummary"];
const TIMESTAMP_ALIASES: &[&str] = &[
    "created_at",
    "createdAt",
    "timestamp",
    "date",
    "time",
    "receivedDate",
    "sent_at",
    "sentAt",
    "email_date",
    "emailDate",
];
const URL_ALIASES: &[&str] = &["url", "link", "emailUrl"];

pub const DEFAULT_SUBJECT: &str = "No Subject";
pub const DEFAULT_SENDER: &str = "Unknown Sender";
pub const DEFAULT_SUMMARY: &str = "No summary available";

/// Recognized layouts of an upstream payload.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadShape<'a> {
    /// The root value is an array of items.
    BareList(&'a [Value]),
    /// An object wrapping the items under one of [`CONTAINER_KEYS`].
    Container { key: &'static str, items: &'a [Value] },
    /// A lone email object.
    Single(&'a Map<String, Value>),
    Unrecognized,
}

impl PayloadShape<'_> {
    pub fn item_count(&self) -> usize {
        match self {
            PayloadShape::BareList(items) | PayloadShape::Container { items, .. } => items.len(),
            PayloadShape::Single(_) => 1,
            PayloadShape::Unrecognized => 0,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PayloadShape::BareList(_) => "array".to_string(),
            PayloadShape::Container { key, .. } => format!("'{}' container", key),
            PayloadShape::Single(_) => "single email object".to_string(),
            PayloadShape::Unrecognized => "unrecognized".to_string(),
        }
    }
}

/// Decide which layout a parsed payload uses. A root array always wins over
/// container keys; container keys are tried in [`CONTAINER_KEYS`] order and a
/// key whose value is not an array is skipped.
pub fn classify(value: &Value) -> PayloadShape<'_> {
    let map = match value {
        Value::Array(items) => return PayloadShape::BareList(items),
        Value::Object(map) => map,
        _ => return PayloadShape::Unrecognized,
    };

    let container = CONTAINER_KEYS.iter().find_map(|key| match map.get(*key) {
        Some(Value::Array(items)) => Some((*key, items.as_slice())),
        _ => None,
    });

    match container {
        Some((key, items)) => PayloadShape::Container { key, items },
        None if looks_like_single(map) => PayloadShape::Single(map),
        None => PayloadShape::Unrecognized,
    }
}

/// Parse and normalize a raw response body. Empty or malformed bodies mean
/// "no emails".
pub fn normalize_body(body: &str, now: DateTime<Utc>) -> Vec<EmailSummary> {
    if body.trim().is_empty() {
        tracing::info!("Empty upstream body, no emails to summarize");
        return Vec::new();
    }

    match serde_json::from_str::<Value>(body) {
        Ok(value) => normalize_value(&value, now),
        Err(e) => {
            tracing::info!(error = %e, "Upstream body is not valid JSON, treating as no emails");
            Vec::new()
        }
    }
}

/// Normalize an already parsed payload.
pub fn normalize_value(value: &Value, now: DateTime<Utc>) -> Vec<EmailSummary> {
    let shape = classify(value);
    tracing::debug!(
        shape = %shape.describe(),
        items = shape.item_count(),
        "Classified upstream payload"
    );

    let millis = now.timestamp_millis();
    let empty = Map::new();

    match shape {
        PayloadShape::BareList(items) | PayloadShape::Container { items, .. } => items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let fields = item.as_object().unwrap_or(&empty);
                map_fields(fields, || format!("email-{}-{}", index, millis), now)
            })
            .collect(),
        PayloadShape::Single(fields) => {
            vec![map_fields(fields, || format!("email-single-{}", millis), now)]
        }
        PayloadShape::Unrecognized => Vec::new(),
    }
}

fn map_fields(
    fields: &Map<String, Value>,
    fallback_id: impl FnOnce() -> String,
    now: DateTime<Utc>,
) -> EmailSummary {
    let or = |aliases: &[&str], default: &str| {
        first_usable(fields, aliases).unwrap_or_else(|| default.to_string())
    };

    EmailSummary {
        id: first_usable(fields, ID_ALIASES).unwrap_or_else(fallback_id),
        subject: or(SUBJECT_ALIASES, DEFAULT_SUBJECT),
        sender: or(SENDER_ALIASES, DEFAULT_SENDER),
        summary: or(SUMMARY_ALIASES, DEFAULT_SUMMARY),
        timestamp: first_usable(fields, TIMESTAMP_ALIASES)
            .unwrap_or_else(|| now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        url: first_usable(fields, URL_ALIASES),
    }
}

fn looks_like_single(fields: &Map<String, Value>) -> bool {
    first_usable(fields, SENDER_ALIASES).is_some() && first_usable(fields, SUBJECT_ALIASES).is_some()
}

fn first_usable(fields: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases.iter().find_map(|key| fields.get(*key).and_then(as_text))
}

/// Render a field value as text. `null` and `""` count as absent.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        // Mail clients often send addresses as `{ "text": ..., "value": [...] }`.
        Value::Object(map) => ["text", "address"]
            .iter()
            .find_map(|k| match map.get(*k) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                _ => None,
            })
            .or_else(|| Some(value.to_string())),
        Value::Array(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_717_243_200_123).unwrap()
    }

    const NOW_ISO: &str = "2024-06-01T12:00:00.123Z";

    #[test]
    fn test_single_item_array_fills_defaults() {
        let out = normalize_body(r#"[{"subject":"Hi","from":"a@b.com"}]"#, now());
        assert_eq!(
            out,
            vec![EmailSummary {
                id: "email-0-1717243200123".to_string(),
                subject: "Hi".to_string(),
                sender: "a@b.com".to_string(),
                summary: DEFAULT_SUMMARY.to_string(),
                timestamp: NOW_ISO.to_string(),
                url: None,
            }]
        );
    }

    #[test]
    fn test_url_omitted_from_json_when_absent() {
        let out = normalize_body(r#"[{"subject":"Hi"}]"#, now());
        let value = serde_json::to_value(&out[0]).unwrap();
        assert!(value.get("url").is_none(), "url key must be omitted");
    }

    #[test]
    fn test_array_length_preserved_in_order() {
        let input = json!([
            {"subject": "one"},
            {"title": "two"},
            {},
            "not an object",
            42
        ]);
        let out = normalize_value(&input, now());
        assert_eq!(out.len(), 5);
        assert_eq!(out[0].subject, "one");
        assert_eq!(out[1].subject, "two");
        for (i, item) in out.iter().enumerate() {
            assert_eq!(item.id, format!("email-{}-1717243200123", i));
        }
        assert_eq!(out[3].subject, DEFAULT_SUBJECT);
        assert_eq!(out[4].sender, DEFAULT_SENDER);
    }

    #[test]
    fn test_missing_fields_get_literal_defaults() {
        let out = normalize_value(&json!([{}]), now());
        let item = &out[0];
        assert_eq!(item.subject, "No Subject");
        assert_eq!(item.sender, "Unknown Sender");
        assert_eq!(item.summary, "No summary available");
        assert_eq!(item.timestamp, NOW_ISO);
        assert!(item.url.is_none());
    }

    #[test]
    fn test_earliest_alias_wins() {
        let input = json!([{
            "id": "primary",
            "messageId": "secondary",
            "subject": "s1",
            "title": "s2",
            "Subject": "s3",
            "sender": "x@y",
            "from": "ignored@y",
            "summary": "short",
            "body": "long body",
            "createdAt": "2024-01-02T00:00:00Z",
            "date": "2023-01-01",
            "link": "https://second",
            "url": "https://first"
        }]);
        let item = &normalize_value(&input, now())[0];
        assert_eq!(item.id, "primary");
        assert_eq!(item.subject, "s1");
        assert_eq!(item.sender, "x@y");
        assert_eq!(item.summary, "short");
        assert_eq!(item.timestamp, "2024-01-02T00:00:00Z");
        assert_eq!(item.url.as_deref(), Some("https://first"));
    }

    #[test]
    fn test_later_aliases_used_when_earlier_absent() {
        let input = json!([{
            "messageId": "m-1",
            "Subject": "Upper",
            "fromEmail": "f@e",
            "emailSummary": "es",
            "emailDate": "2024-05-05",
            "emailUrl": "https://mail/1"
        }]);
        let item = &normalize_value(&input, now())[0];
        assert_eq!(item.id, "m-1");
        assert_eq!(item.subject, "Upper");
        assert_eq!(item.sender, "f@e");
        assert_eq!(item.summary, "es");
        assert_eq!(item.timestamp, "2024-05-05");
        assert_eq!(item.url.as_deref(), Some("https://mail/1"));
    }

    #[test]
    fn test_null_and_empty_string_skip_to_next_alias() {
        let input = json!([{"subject": null, "title": "", "Subject": "third", "id": null}]);
        let item = &normalize_value(&input, now())[0];
        assert_eq!(item.subject, "third");
        assert_eq!(item.id, "email-0-1717243200123");
    }

    #[test]
    fn test_non_string_values_rendered_as_text() {
        let input = json!([{
            "id": 1234,
            "from": {"text": "Ann <ann@example.com>", "value": [{"address": "ann@example.com"}]},
            "timestamp": 1717243200
        }]);
        let item = &normalize_value(&input, now())[0];
        assert_eq!(item.id, "1234");
        assert_eq!(item.sender, "Ann <ann@example.com>");
        assert_eq!(item.timestamp, "1717243200");
    }

    #[test]
    fn test_root_array_beats_container_keys() {
        // An array cannot also carry keys, so the array wins by construction.
        let input = json!([{"summaries": [{"subject": "nested"}], "subject": "outer"}]);
        let shape = classify(&input);
        assert!(matches!(shape, PayloadShape::BareList(items) if items.len() == 1));
        assert_eq!(normalize_value(&input, now())[0].subject, "outer");
    }

    #[test]
    fn test_container_priority_order() {
        let input = json!({
            "emails": [{"subject": "from emails"}],
            "summaries": [{"subject": "from summaries"}, {"subject": "second"}]
        });
        assert!(matches!(
            classify(&input),
            PayloadShape::Container { key: "summaries", .. }
        ));
        let out = normalize_value(&input, now());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].subject, "from summaries");
    }

    #[test]
    fn test_each_container_key_recognized() {
        for key in CONTAINER_KEYS {
            let mut wrapper = Map::new();
            wrapper.insert(key.to_string(), json!([{ "subject": key }]));
            let input = Value::Object(wrapper);
            let out = normalize_value(&input, now());
            assert_eq!(out.len(), 1, "key {} not recognized", key);
            assert_eq!(out[0].subject, key);
        }
    }

    #[test]
    fn test_non_array_container_value_is_skipped() {
        let input = json!({"summaries": "nope", "data": {"x": 1}, "messages": [{"subject": "m"}]});
        assert!(matches!(
            classify(&input),
            PayloadShape::Container { key: "messages", .. }
        ));
    }

    #[test]
    fn test_empty_container_yields_empty_without_fallthrough() {
        assert!(normalize_body(r#"{"emails":[]}"#, now()).is_empty());
        // Even if the wrapper looks like a single email, the empty list wins.
        let input = json!({"emails": [], "from": "a@b.com", "subject": "Hi"});
        assert!(normalize_value(&input, now()).is_empty());
        assert!(normalize_body("[]", now()).is_empty());
    }

    #[test]
    fn test_single_object_wrapped() {
        let out = normalize_body(r#"{"from":"a@b.com","subject":"Hi"}"#, now());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "email-single-1717243200123");
        assert!(out[0].id.starts_with("email-single-"));
        assert_eq!(out[0].sender, "a@b.com");
        assert_eq!(out[0].subject, "Hi");
    }

    #[test]
    fn test_single_object_keeps_upstream_id() {
        let out = normalize_value(
            &json!({"messageId": "abc", "sender": "s@x", "title": "T"}),
            now(),
        );
        assert_eq!(out[0].id, "abc");
    }

    #[test]
    fn test_object_missing_sender_or_subject_unrecognized() {
        assert_eq!(classify(&json!({"subject": "only"})), PayloadShape::Unrecognized);
        assert_eq!(classify(&json!({"from": "only@x"})), PayloadShape::Unrecognized);
        assert!(normalize_value(&json!({"status": "ok"}), now()).is_empty());
    }

    #[test]
    fn test_scalar_roots_unrecognized() {
        for input in [json!("text"), json!(7), json!(true), Value::Null] {
            assert!(normalize_value(&input, now()).is_empty());
        }
    }

    #[test]
    fn test_empty_and_malformed_bodies() {
        assert!(normalize_body("", now()).is_empty());
        assert!(normalize_body("   \n", now()).is_empty());
        assert!(normalize_body("not json", now()).is_empty());
        assert!(normalize_body("{\"summaries\": [", now()).is_empty());
    }

    #[test]
    fn test_same_input_same_clock_identical_output() {
        let body = r#"{"items":[{"subject":"a"},{"from":"b@c","summary":"x"}]}"#;
        let first = serde_json::to_string(&normalize_body(body, now())).unwrap();
        let second = serde_json::to_string(&normalize_body(body, now())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_shape_item_count_and_description() {
        let value = json!({"results": [{}, {}, {}]});
        let shape = classify(&value);
        assert_eq!(shape.item_count(), 3);
        assert_eq!(shape.describe(), "'results' container");
    }
}
