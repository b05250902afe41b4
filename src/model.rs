//! Document model shared by both clients.
//!
//! Remote payloads carry many more fields than the publishing pipeline reads;
//! the ones we do not name are preserved in `extra` maps so they survive the
//! checkpoint round trip and reach the caller untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key/value properties parsed from a document's front-matter preamble.
pub type DocProperties = BTreeMap<String, Value>;

/// Standard `{ data, meta }` envelope of the Yuque JSON API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Payload.
    pub data: T,
    /// Paging metadata, present on list endpoints.
    #[serde(default)]
    pub meta: Option<ListMeta>,
}

/// Paging metadata returned by list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListMeta {
    /// Total number of items the server holds.
    #[serde(default)]
    pub total: usize,
}

/// Error body returned alongside non-200 statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    /// Server message, e.g. `book not found`.
    #[serde(default)]
    pub message: Option<String>,
}

/// A node of the knowledge base table of contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Node kind (`DOC`, `TITLE`, `LINK`).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Unique node id.
    #[serde(default)]
    pub uuid: String,
    /// Parent node id; empty or absent for roots.
    #[serde(default)]
    pub parent_uuid: Option<String>,
    /// Document slug as it appears in page URLs.
    #[serde(default)]
    pub url: Option<String>,
    /// Document slug (API v2 payloads).
    #[serde(default)]
    pub slug: Option<String>,
    /// 1-based depth (API v2 payloads).
    #[serde(default)]
    pub depth: u32,
    /// 0-based level (web page state).
    #[serde(default)]
    pub level: u32,
    /// Numeric document id, when the node is a document.
    #[serde(default)]
    pub doc_id: Option<Value>,
}

/// One ancestor in a document's breadcrumb path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Ancestor title.
    pub title: String,
    /// Id of the document the breadcrumb belongs to.
    pub doc_id: String,
}

/// Listing entry used to drive the detail phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocSummary {
    /// Document slug; doubles as the document id.
    pub slug: String,
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Body format (`markdown`, `lake`, ...).
    #[serde(default)]
    pub format: Option<String>,
    /// Visibility flag (`1` = public).
    #[serde(default)]
    pub public: Option<Value>,
    /// Publication status (`1` = published).
    #[serde(default)]
    pub status: Option<Value>,
    /// Creation time as provided by the service.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Update time as provided by the service.
    #[serde(default)]
    pub updated_at: Option<String>,
    /// 1-based position in the current download batch; progress display only.
    #[serde(rename = "_index", default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Remaining service fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocSummary {
    /// Returns true when the service marks the document public.
    #[must_use]
    pub fn is_public(&self) -> bool {
        is_flag_set(self.public.as_ref())
    }

    /// Returns true when the service marks the document published.
    #[must_use]
    pub fn is_published(&self) -> bool {
        is_flag_set(self.status.as_ref())
    }
}

fn is_flag_set(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => s == "1",
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

/// Document detail as returned by the v2 API with `raw=1`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDocDetail {
    /// Slug.
    pub slug: String,
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Body format.
    #[serde(default)]
    pub format: Option<String>,
    /// Raw markdown body.
    #[serde(default)]
    pub body: Option<String>,
    /// Rendered HTML body.
    #[serde(default)]
    pub body_html: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Update time.
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Remaining service fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A fully fetched, normalized document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocDetail {
    /// Document id; equal to the slug.
    pub doc_id: String,
    /// Slug.
    pub slug: String,
    /// Title.
    pub title: String,
    /// Body format.
    pub format: Option<String>,
    /// Body with the properties preamble removed and transforms applied.
    pub body: String,
    /// Body as fetched, before any transform.
    pub body_original: String,
    /// Rendered HTML, token mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    /// Front-matter properties.
    pub properties: DocProperties,
    /// Ancestor titles, root first.
    pub catalog: Vec<Breadcrumb>,
    /// Update time in epoch milliseconds.
    pub updated: Option<i64>,
    /// Creation time as provided by the service.
    pub created_at: Option<String>,
    /// Update time as provided by the service.
    pub updated_at: Option<String>,
    /// Remaining service fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocDetail {
    /// Builds a detail from a v2 API payload.
    #[must_use]
    pub fn from_raw(raw: RawDocDetail) -> Self {
        let body = raw.body.unwrap_or_default();
        Self {
            doc_id: raw.slug.clone(),
            slug: raw.slug,
            title: raw.title,
            format: raw.format,
            body_original: body.clone(),
            body,
            body_html: raw.body_html,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            extra: raw.extra,
            ..Self::default()
        }
    }

    /// Builds a detail from a markdown export body and the known summary.
    #[must_use]
    pub fn from_markdown(slug: &str, body: String, summary: Option<&DocSummary>) -> Self {
        let mut detail = Self {
            doc_id: slug.to_string(),
            slug: slug.to_string(),
            title: slug.to_string(),
            body_original: body.clone(),
            body,
            ..Self::default()
        };
        if let Some(summary) = summary {
            detail.title.clone_from(&summary.title);
            detail.format.clone_from(&summary.format);
            detail.created_at.clone_from(&summary.created_at);
            detail.updated_at.clone_from(&summary.updated_at);
            detail.extra = summary.extra.clone();
            if let Some(public) = &summary.public {
                detail.extra.insert("public".to_string(), public.clone());
            }
            if let Some(status) = &summary.status {
                detail.extra.insert("status".to_string(), status.clone());
            }
        }
        detail
    }

    /// Stamps [`DocDetail::updated`] from the service update string.
    pub fn stamp_updated(&mut self) {
        self.updated = self.updated_at.as_deref().and_then(parse_timestamp_ms);
    }
}

/// Parses a service timestamp into epoch milliseconds.
///
/// Accepts RFC 3339 (`2023-05-01T08:00:00.000Z`) and the naive
/// `2023-05-01 08:00:00` form, which is read as UTC.
#[must_use]
pub fn parse_timestamp_ms(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_rfc3339() {
        assert_eq!(
            parse_timestamp_ms("2023-05-01T00:00:00.000Z"),
            Some(1_682_899_200_000)
        );
        assert_eq!(
            parse_timestamp_ms("2023-05-01T08:00:00+08:00"),
            Some(1_682_899_200_000)
        );
    }

    #[test]
    fn test_parse_timestamp_naive_is_utc() {
        assert_eq!(
            parse_timestamp_ms("2023-05-01 00:00:00"),
            Some(1_682_899_200_000)
        );
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert_eq!(parse_timestamp_ms("yesterday"), None);
    }

    #[test]
    fn test_summary_keeps_unknown_fields() {
        let json = r#"{"slug":"intro","title":"Intro","word_count":42,"public":1,"status":"1"}"#;
        let summary: DocSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.extra.get("word_count"), Some(&Value::from(42)));
        assert!(summary.is_public());
        assert!(summary.is_published());
        assert_eq!(summary.index, None);
    }

    #[test]
    fn test_catalog_entry_tolerates_null_url() {
        let json = r#"{"type":"TITLE","title":"Group","uuid":"u1","url":null,"parent_uuid":"","level":0}"#;
        let entry: CatalogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.kind, "TITLE");
        assert_eq!(entry.url, None);
    }

    #[test]
    fn test_from_markdown_merges_summary() {
        let summary: DocSummary = serde_json::from_str(
            r#"{"slug":"a","title":"Alpha","format":"lake","updated_at":"2023-05-01T00:00:00Z","id":7}"#,
        )
        .unwrap();
        let mut detail = DocDetail::from_markdown("a", "# Alpha".to_string(), Some(&summary));
        detail.stamp_updated();
        assert_eq!(detail.doc_id, "a");
        assert_eq!(detail.title, "Alpha");
        assert_eq!(detail.format.as_deref(), Some("lake"));
        assert_eq!(detail.extra.get("id"), Some(&Value::from(7)));
        assert_eq!(detail.updated, Some(1_682_899_200_000));
    }

    #[test]
    fn test_from_markdown_without_summary_uses_slug() {
        let detail = DocDetail::from_markdown("orphan", String::new(), None);
        assert_eq!(detail.title, "orphan");
        assert!(detail.catalog.is_empty());
    }
}
