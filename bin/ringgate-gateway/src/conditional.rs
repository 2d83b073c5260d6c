//! Conditional Engine (§4.6 `conditionalHandler`, §2 Conditional
//! Engine row): parses `If-*` headers and evaluates
//! `If-None-Match`/`If-Modified-Since` at the gateway, converting a
//! 200 into a 304. `If-Match`/`If-Unmodified-Since` are left on the
//! parsed `Conditions` for the metadata tier to enforce.

use chrono::NaiveDateTime;
use ringgate_shard::rpc::Conditions;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Split a comma-separated etag list, stripping the weak `W/` prefix
/// and surrounding quotes from each entry.
#[must_use]
pub fn parse_etag_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(strip_weak_and_quotes)
        .collect()
}

fn strip_weak_and_quotes(s: &str) -> String {
    let s = s.strip_prefix("W/").unwrap_or(s);
    let s = s.strip_prefix('"').unwrap_or(s);
    let s = s.strip_suffix('"').unwrap_or(s);
    s.to_string()
}

#[must_use]
pub fn parse_http_date(value: &str) -> Option<u64> {
    NaiveDateTime::parse_from_str(value.trim(), HTTP_DATE_FORMAT)
        .ok()
        .and_then(|naive| u64::try_from(naive.and_utc().timestamp_millis()).ok())
}

/// Parse every `If-*` header this gateway recognizes into a
/// `Conditions` value ready to hand to a shard RPC call.
#[must_use]
pub fn parse_conditions(headers: &axum::http::HeaderMap) -> Conditions {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    Conditions {
        if_match: header_str("if-match").map(parse_etag_list),
        if_none_match: header_str("if-none-match").map(parse_etag_list),
        if_modified_since_unix_ms: header_str("if-modified-since").and_then(parse_http_date),
        if_unmodified_since_unix_ms: header_str("if-unmodified-since").and_then(parse_http_date),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Pass,
    NotModified,
}

/// Evaluate the gateway-local half of a conditional read: does the
/// already-fetched object's etag/last-modified satisfy
/// `If-None-Match`/`If-Modified-Since`?
#[must_use]
pub fn evaluate_read(
    conditions: &Conditions,
    current_etag: &str,
    last_modified_unix_ms: u64,
) -> ReadOutcome {
    if let Some(none_match) = &conditions.if_none_match {
        if none_match.iter().any(|v| v == "*" || v == current_etag) {
            return ReadOutcome::NotModified;
        }
    }
    if let Some(since) = conditions.if_modified_since_unix_ms {
        if since > last_modified_unix_ms {
            return ReadOutcome::NotModified;
        }
    }
    ReadOutcome::Pass
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_weak_prefix_and_quotes_from_etag_list() {
        let parsed = parse_etag_list(r#"W/"abc", "def", ghi"#);
        assert_eq!(parsed, vec!["abc", "def", "ghi"]);
    }

    #[test]
    fn parses_http_date() {
        let ms = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert!(ms > 0);
    }

    #[test]
    fn wildcard_if_none_match_is_not_modified() {
        let conditions = Conditions {
            if_none_match: Some(vec!["*".to_string()]),
            ..Default::default()
        };
        assert_eq!(
            evaluate_read(&conditions, "any-etag", 0),
            ReadOutcome::NotModified
        );
    }

    #[test]
    fn matching_etag_in_if_none_match_is_not_modified() {
        let conditions = Conditions {
            if_none_match: Some(vec!["abc".to_string()]),
            ..Default::default()
        };
        assert_eq!(
            evaluate_read(&conditions, "abc", 0),
            ReadOutcome::NotModified
        );
        assert_eq!(
            evaluate_read(&conditions, "xyz", 0),
            ReadOutcome::Pass
        );
    }

    #[test]
    fn if_modified_since_strictly_after_last_modified_is_not_modified() {
        let conditions = Conditions {
            if_modified_since_unix_ms: Some(2_000),
            ..Default::default()
        };
        assert_eq!(evaluate_read(&conditions, "etag", 1_000), ReadOutcome::NotModified);
        assert_eq!(evaluate_read(&conditions, "etag", 3_000), ReadOutcome::Pass);
    }
}
