//! JSON flattening helpers
//!
//! Small extraction functions shared by the row mappers: dot-path lookups,
//! list joins, tag flattening and timestamp parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeSet;

/// Placeholder for absent scalar fields
pub const PLACEHOLDER: &str = "N/A";

/// Delimiter for list-valued fields
pub const LIST_SEPARATOR: &str = ", ";

const SECONDS_PER_DAY: i64 = 86_400;

/// Look up a value using a dot-notation path. Numeric segments index arrays.
/// `null` is treated as absent.
pub fn lookup<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = item;

    for part in path.split('.') {
        current = match part.parse::<usize>() {
            Ok(idx) if current.is_array() => current.get(idx)?,
            _ => current.get(part)?,
        };
    }

    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Render a scalar as display text
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) => arr
            .iter()
            .map(render)
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR),
        Value::Object(_) => value.to_string(),
    }
}

/// Text at `path`, or empty
pub fn text(item: &Value, path: &str) -> String {
    text_or(item, path, "")
}

/// Text at `path`, or `default`
pub fn text_or(item: &Value, path: &str, default: &str) -> String {
    lookup(item, path)
        .map(render)
        .unwrap_or_else(|| default.to_string())
}

/// Elements of a list field. Accepts both plain arrays and the
/// `{"Quantity": n, "Items": [...]}` wrapper some APIs return.
pub fn items<'a>(item: &'a Value, path: &str) -> &'a [Value] {
    match lookup(item, path) {
        Some(Value::Array(arr)) => arr,
        Some(v @ Value::Object(_)) => v
            .get("Items")
            .and_then(|i| i.as_array())
            .map(|a| a.as_slice())
            .unwrap_or(&[]),
        _ => &[],
    }
}

/// Join a list of scalars found at `path`
pub fn join_strings(item: &Value, path: &str, sep: &str) -> String {
    items(item, path)
        .iter()
        .map(render)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Join one field of each object in the list at `path`
pub fn join_field(item: &Value, path: &str, field: &str, sep: &str) -> String {
    items(item, path)
        .iter()
        .map(|v| text(v, field))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Sort and de-duplicate, then join
pub fn join_distinct<I, S>(values: I, sep: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(Into::into)
        .filter(|s: &String| !s.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(sep)
}

/// Key/value pairs from either `[{"Key": k, "Value": v}]` or a plain map
pub fn tag_pairs(tags: Option<&Value>) -> Vec<(String, String)> {
    match tags {
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(|t| {
                let key = lookup(t, "Key")?;
                Some((render(key), text(t, "Value")))
            })
            .collect(),
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), render(v))).collect(),
        _ => Vec::new(),
    }
}

/// Value of one tag, or empty
pub fn tag(tags: Option<&Value>, key: &str) -> String {
    tag_pairs(tags)
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
        .unwrap_or_default()
}

pub fn name_tag(tags: Option<&Value>) -> String {
    tag(tags, "Name")
}

/// `k:v; k:v` rendering of all tags
pub fn tags_summary(tags: Option<&Value>) -> String {
    tag_pairs(tags)
        .into_iter()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Strip a path prefix from an identifier
/// e.g. "/hostedzone/Z123" -> "Z123"
pub fn strip_id_prefix(id: &str, prefix: &str) -> String {
    id.strip_prefix(prefix).unwrap_or(id).to_string()
}

/// Parse the timestamp shapes the AWS CLI emits: RFC 3339, ISO 8601 with a
/// `+0000` offset, naive date-times (taken as UTC) and epoch seconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => epoch_seconds(n.as_f64()?),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }

    s.parse::<f64>().ok().and_then(epoch_seconds)
}

fn epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    Utc.timestamp_opt(whole as i64, nanos).single()
}

/// Whole days from `earlier` to `later`, floored (negative spans round down)
pub fn days_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    (later - earlier).num_seconds().div_euclid(SECONDS_PER_DAY)
}
