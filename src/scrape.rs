//! Narrow extraction from Yuque web pages.
//!
//! Two things are read out of fetched HTML: the `window.appData` global that
//! the repository page embeds (book id and table of contents), and the
//! knowledge base password form shown when a repository is locked. Both sit
//! behind [`PageInspector`] so the extraction strategy can be swapped and
//! tested against fixture pages.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::model::CatalogEntry;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static APP_DATA_ENCODED_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?s)window\.appData\s*=\s*JSON\.parse\(\s*decodeURIComponent\(\s*"((?:[^"\\]|\\.)*)"\s*\)\s*\)"#,
    )
});
static APP_DATA_LITERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?s)window\.appData\s*=\s*(\{.*?\})\s*;?\s*</script>")
});
static INPUT_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<input\b[^>]*>"));
static FORM_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<form\b[^>]*>"));
static FORM_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?i)</form\s*>"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#,
    )
});

/// What the repository page reveals about the knowledge base.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookState {
    /// True when the page carries the `book` object, i.e. it is readable.
    pub has_book: bool,
    /// Table of contents from `book.toc`.
    pub catalog: Vec<CatalogEntry>,
    /// Internal numeric book id from `book.id`.
    pub book_id: Option<String>,
}

/// The knowledge base password form of a locked repository page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasswordForm {
    /// Raw `action` attribute, possibly relative.
    pub action: Option<String>,
    /// Raw `method` attribute.
    pub method: Option<String>,
    /// Hidden input name/value pairs in document order.
    pub hidden_fields: Vec<(String, String)>,
    /// `name` of the password input.
    pub password_field: Option<String>,
}

/// Reads the few pieces of state the password client needs from raw HTML.
pub trait PageInspector: Send + Sync {
    /// Extracts the embedded book state.
    fn inspect_book(&self, html: &str) -> BookState;

    /// Locates the password input and its enclosing form.
    fn find_password_form(&self, html: &str) -> Option<PasswordForm>;
}

/// Regex-based [`PageInspector`] for the current Yuque page layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexPageInspector;

#[derive(Debug, Deserialize)]
struct AppData {
    #[serde(default)]
    book: Option<BookData>,
}

#[derive(Debug, Deserialize)]
struct BookData {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    toc: Vec<CatalogEntry>,
}

impl PageInspector for RegexPageInspector {
    fn inspect_book(&self, html: &str) -> BookState {
        let Some(app_data) = extract_app_data(html) else {
            debug!("page carries no appData global");
            return BookState::default();
        };
        let Some(book) = app_data.book else {
            return BookState::default();
        };
        let book_id = book.id.and_then(|id| match id {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        });
        BookState {
            has_book: true,
            catalog: book.toc,
            book_id,
        }
    }

    fn find_password_form(&self, html: &str) -> Option<PasswordForm> {
        let password_input = INPUT_TAG_RE.find_iter(html).find(|tag| {
            attributes(tag.as_str())
                .get("type")
                .is_some_and(|kind| kind.eq_ignore_ascii_case("password"))
        })?;

        let form_open = FORM_OPEN_RE
            .find_iter(&html[..password_input.start()])
            .last()?;
        if FORM_CLOSE_RE.is_match(&html[form_open.end()..password_input.start()]) {
            return None;
        }
        let form_end = FORM_CLOSE_RE
            .find(&html[password_input.end()..])
            .map_or(html.len(), |close| password_input.end() + close.start());

        let form_attrs = attributes(form_open.as_str());
        let hidden_fields = INPUT_TAG_RE
            .find_iter(&html[form_open.end()..form_end])
            .filter_map(|tag| {
                let attrs = attributes(tag.as_str());
                let is_hidden = attrs
                    .get("type")
                    .is_some_and(|kind| kind.eq_ignore_ascii_case("hidden"));
                let name = attrs.get("name").filter(|name| !name.is_empty())?;
                is_hidden.then(|| {
                    (
                        name.clone(),
                        attrs.get("value").cloned().unwrap_or_default(),
                    )
                })
            })
            .collect();

        Some(PasswordForm {
            action: form_attrs.get("action").cloned().filter(|a| !a.is_empty()),
            method: form_attrs.get("method").cloned().filter(|m| !m.is_empty()),
            hidden_fields,
            password_field: attributes(password_input.as_str())
                .get("name")
                .cloned()
                .filter(|name| !name.is_empty()),
        })
    }
}

fn extract_app_data(html: &str) -> Option<AppData> {
    if let Some(caps) = APP_DATA_ENCODED_RE.captures(html) {
        let encoded = caps.get(1)?.as_str();
        let decoded = match urlencoding::decode(encoded) {
            Ok(decoded) => decoded,
            Err(error) => {
                warn!(%error, "appData is not valid percent-encoding");
                return None;
            }
        };
        return parse_app_data(&decoded);
    }
    let caps = APP_DATA_LITERAL_RE.captures(html)?;
    parse_app_data(caps.get(1)?.as_str())
}

fn parse_app_data(json: &str) -> Option<AppData> {
    match serde_json::from_str(json) {
        Ok(app_data) => Some(app_data),
        Err(error) => {
            warn!(%error, "appData is not valid JSON");
            None
        }
    }
}

/// Parses the attributes of a single start tag; names are lowercased.
fn attributes(tag: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(tag)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or("", |m| m.as_str());
            Some((name, decode_entities(value)))
        })
        .collect()
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
