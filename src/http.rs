//! Shared HTTP client construction and response helpers.
//!
//! Both clients build their reqwest client here so timeouts, compression and
//! the User-Agent stay consistent. Cookies are not handled by reqwest: the
//! password client carries its own additive [`crate::auth::Session`].

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::YuqueError;
use crate::model::ApiErrorBody;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 60;

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/LetTTGACO/elog";

/// User-Agent the mobile app sends; the login endpoint expects it.
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6_1 like Mac OS X) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/20G81 YuqueMobileApp/1.0.2 \
    (AppBuild/650 Device/Phone Locale/zh-cn Theme/light YuqueType/public)";

/// Default User-Agent for API and page requests.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("yuque-sdk/{version} (+{PROJECT_UA_URL})")
}

/// Builds a client with the shared timeouts and User-Agent.
///
/// `follow_redirects = false` is used by the session client so `Set-Cookie`
/// headers on redirect responses are not lost.
///
/// # Errors
///
/// Returns [`YuqueError::ClientBuild`] when reqwest rejects the configuration.
pub fn build_http_client(follow_redirects: bool) -> Result<Client, YuqueError> {
    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
        .user_agent(default_user_agent())
        .gzip(true);
    if !follow_redirects {
        builder = builder.redirect(Policy::none());
    }
    builder.build().map_err(YuqueError::ClientBuild)
}

/// A fully read response.
#[derive(Debug)]
pub struct TextResponse {
    /// Status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Body decoded as text.
    pub body: String,
}

impl TextResponse {
    /// Reads status, headers and body of `response`.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::Network`] when the body cannot be read.
    pub async fn read(url: &str, response: Response) -> Result<Self, YuqueError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|error| YuqueError::network(url, error))?;
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::Decode`] when the body is not the expected shape.
    pub fn json<T: DeserializeOwned>(&self, url: &str) -> Result<T, YuqueError> {
        serde_json::from_str(&self.body).map_err(|error| YuqueError::decode(url, error))
    }

    /// Returns the server `message` field, or the raw body when there is none.
    #[must_use]
    pub fn error_message(&self) -> String {
        serde_json::from_str::<ApiErrorBody>(&self.body)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| self.body.clone())
    }
}

/// Maps a non-200 JSON API response to the matching fatal error.
///
/// A 404 whose message is `book not found` becomes
/// [`YuqueError::BookNotFound`]; everything else is [`YuqueError::Api`].
#[must_use]
pub fn api_error(url: &str, namespace: &str, response: &TextResponse) -> YuqueError {
    let message = response.error_message();
    if response.status == StatusCode::NOT_FOUND && message == "book not found" {
        return YuqueError::BookNotFound {
            namespace: namespace.to_string(),
        };
    }
    YuqueError::Api {
        url: url.to_string(),
        status: response.status.as_u16(),
        message,
    }
}
