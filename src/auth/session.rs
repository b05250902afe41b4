//! Additive cookie session for the password/cookie client.
//!
//! The session is a single `Cookie` header value. Every response along the
//! login, unlock and fetch path may carry `Set-Cookie` headers; their
//! `name=value` pairs are appended to the header and nothing is ever removed.

use std::fmt;

use chrono::Utc;
use reqwest::header::{HeaderMap, SET_COOKIE};
use tracing::debug;

/// Cookie state owned by one client instance.
#[derive(Clone, Default)]
pub struct Session {
    data: Option<String>,
    captured_at: Option<i64>,
}

impl Session {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopts a browser cookie string as-is.
    #[must_use]
    pub fn from_cookie(cookie: impl Into<String>) -> Self {
        Self {
            data: Some(cookie.into()),
            captured_at: Some(Utc::now().timestamp_millis()),
        }
    }

    /// Returns the `Cookie` header value, if any cookie has been captured.
    #[must_use]
    pub fn cookie_header(&self) -> Option<&str> {
        self.data.as_deref().filter(|data| !data.is_empty())
    }

    /// Returns when the session last changed, in epoch milliseconds.
    #[must_use]
    pub fn captured_at(&self) -> Option<i64> {
        self.captured_at
    }

    /// Appends the `name=value` part of each `Set-Cookie` value.
    ///
    /// Returns the number of cookies appended.
    pub fn merge_set_cookie<'a>(&mut self, values: impl IntoIterator<Item = &'a str>) -> usize {
        let pairs: Vec<&str> = values
            .into_iter()
            .filter_map(|value| value.split(';').next())
            .map(str::trim)
            .filter(|pair| pair.contains('=') && !pair.starts_with('='))
            .collect();
        if pairs.is_empty() {
            return 0;
        }

        let next = pairs.join("; ");
        self.data = Some(match self.cookie_header() {
            Some(existing) => format!("{existing}; {next}"),
            None => next,
        });
        self.captured_at = Some(Utc::now().timestamp_millis());
        debug!(count = pairs.len(), "merged response cookies into session");
        pairs.len()
    }

    /// Merges every `Set-Cookie` header of a response.
    pub fn merge_headers(&mut self, headers: &HeaderMap) -> usize {
        self.merge_set_cookie(
            headers
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok()),
        )
    }
}

// Cookie values are credentials; keep them out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("data", &self.data.as_ref().map(|_| "[REDACTED]"))
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn test_merge_into_empty_session() {
        let mut session = Session::new();
        let added = session.merge_set_cookie(["_yuque_session=abc; Path=/; HttpOnly"]);
        assert_eq!(added, 1);
        assert_eq!(session.cookie_header(), Some("_yuque_session=abc"));
        assert!(session.captured_at().is_some());
    }

    #[test]
    fn test_merge_is_additive() {
        let mut session = Session::from_cookie("a=1");
        session.merge_set_cookie(["b=2; Path=/", "c=3"]);
        session.merge_set_cookie(["a=4"]);
        assert_eq!(session.cookie_header(), Some("a=1; b=2; c=3; a=4"));
    }

    #[test]
    fn test_merge_ignores_empty_values() {
        let mut session = Session::from_cookie("a=1");
        assert_eq!(session.merge_set_cookie(["", "  ; Path=/", "=novalue"]), 0);
        assert_eq!(session.cookie_header(), Some("a=1"));
    }

    #[test]
    fn test_merge_headers_reads_all_set_cookie_values() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("x=1; Path=/"));
        headers.append(SET_COOKIE, HeaderValue::from_static("y=2; Secure"));
        let mut session = Session::new();
        assert_eq!(session.merge_headers(&headers), 2);
        assert_eq!(session.cookie_header(), Some("x=1; y=2"));
    }

    #[test]
    fn test_debug_redacts_cookie() {
        let session = Session::from_cookie("secret=value");
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret=value"));
        assert!(debug.contains("[REDACTED]"));
    }
}
