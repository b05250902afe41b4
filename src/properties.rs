//! Front-matter properties extraction.
//!
//! Authors put a YAML preamble between `---` fences at the top of a document.
//! The Yuque editor frequently stores the line breaks inside that preamble as
//! `<br />` tags, so they are turned back into newlines before parsing.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::model::DocProperties;
use crate::scrape::compile_static_regex;

static BR_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?i)<br\s*/?>"));

/// Opening `---` fence followed by a line break.
static OPEN_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)\A---[ \t]*(?:\r?\n|<br\s*/?>)"));

/// Closing `---` fence on a line of its own; a `---` inside a value never matches.
static CLOSE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)(?:\r?\n|<br\s*/?>)---[ \t]*(?:\r?\n|<br\s*/?>|\z)")
});

/// A document body with its preamble separated out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitBody {
    /// Body content after the preamble.
    pub body: String,
    /// Parsed preamble; empty when there is none or it is not valid YAML.
    pub properties: DocProperties,
}

/// Separates the front-matter preamble from `raw`.
///
/// A body without a well-formed preamble is returned unchanged with no
/// properties.
#[must_use]
pub fn split_properties(raw: &str) -> SplitBody {
    let unchanged = || SplitBody {
        body: raw.to_string(),
        properties: DocProperties::new(),
    };

    let trimmed = raw.trim_start();
    let Some(open) = OPEN_FENCE_RE.find(trimmed) else {
        return unchanged();
    };
    let after_open = &trimmed[open.end()..];
    let Some(close) = CLOSE_FENCE_RE.find(after_open) else {
        return unchanged();
    };

    let preamble = BR_TAG_RE.replace_all(&after_open[..close.start()], "\n");
    let Some(properties) = parse_preamble(&preamble) else {
        return unchanged();
    };

    let rest = &after_open[close.end()..];
    SplitBody {
        body: rest.trim_start_matches(['\r', '\n']).to_string(),
        properties,
    }
}

fn parse_preamble(preamble: &str) -> Option<DocProperties> {
    if preamble.trim().is_empty() {
        return None;
    }
    let yaml: serde_yaml::Value = match serde_yaml::from_str(preamble) {
        Ok(value) => value,
        Err(error) => {
            debug!(%error, "preamble is not valid YAML");
            return None;
        }
    };
    match serde_json::to_value(yaml) {
        Ok(Value::Object(map)) => Some(map.into_iter().collect()),
        Ok(_) => None,
        Err(error) => {
            debug!(%error, "preamble is not a string-keyed mapping");
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_front_matter() {
        let raw = "---\ntitle: Hello\ntags:\n  - a\n  - b\n---\n\n# Body\n";
        let split = split_properties(raw);
        assert_eq!(split.properties["title"], Value::from("Hello"));
        assert_eq!(split.properties["tags"], serde_json::json!(["a", "b"]));
        assert_eq!(split.body, "# Body\n");
    }

    #[test]
    fn test_split_br_encoded_front_matter() {
        let raw = "---<br />title: Hello<br />date: 2023-05-01<br />---<br /># Body";
        let split = split_properties(raw);
        assert_eq!(split.properties["title"], Value::from("Hello"));
        assert_eq!(split.properties["date"], Value::from("2023-05-01"));
        assert_eq!(split.body, "# Body");
    }

    #[test]
    fn test_split_keeps_dashes_inside_values() {
        let raw = "---\ntitle: a---b\ntags: x\n---\n# Body\n";
        let split = split_properties(raw);
        assert_eq!(split.properties["title"], Value::from("a---b"));
        assert_eq!(split.properties["tags"], Value::from("x"));
        assert_eq!(split.body, "# Body\n");
    }

    #[test]
    fn test_split_keeps_dashes_inside_br_encoded_values() {
        let raw = "---<br />title: a---b<br />---<br />Body";
        let split = split_properties(raw);
        assert_eq!(split.properties["title"], Value::from("a---b"));
        assert_eq!(split.body, "Body");
    }

    #[test]
    fn test_split_crlf_front_matter() {
        let raw = "---\r\ntitle: Hello\r\n---\r\nBody";
        let split = split_properties(raw);
        assert_eq!(split.properties["title"], Value::from("Hello"));
        assert_eq!(split.body, "Body");
    }

    #[test]
    fn test_split_without_closing_fence_is_unchanged() {
        let raw = "---\ntitle: a---b\n# Body";
        let split = split_properties(raw);
        assert!(split.properties.is_empty());
        assert_eq!(split.body, raw);
    }

    #[test]
    fn test_split_without_preamble_is_unchanged() {
        let raw = "# Title\n\n--- a rule ---\n";
        let split = split_properties(raw);
        assert!(split.properties.is_empty());
        assert_eq!(split.body, raw);
    }

    #[test]
    fn test_split_invalid_yaml_is_unchanged() {
        let raw = "---\n: : :\n  - [\n---\nbody";
        let split = split_properties(raw);
        assert!(split.properties.is_empty());
        assert_eq!(split.body, raw);
    }

    #[test]
    fn test_split_scalar_preamble_is_unchanged() {
        let raw = "---\njust text\n---\nbody";
        let split = split_properties(raw);
        assert!(split.properties.is_empty());
        assert_eq!(split.body, raw);
    }
}
