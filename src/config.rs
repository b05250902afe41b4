//! Client configuration with environment fallback for credentials.
//!
//! Both configs are plain serde structs. Credential fields left empty are
//! filled from the environment by [`TokenConfig::with_env_fallback`] and
//! [`PasswordConfig::with_env_fallback`], which also validate that at least one
//! usable credential path exists.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::YuqueError;

/// Default v2 API root for token mode.
pub const DEFAULT_API_URL: &str = "https://www.yuque.com/api/v2";

/// Default web host for password/cookie mode.
pub const DEFAULT_HOST: &str = "https://www.yuque.com";

/// Default number of concurrent detail fetches.
pub const DEFAULT_LIMIT: usize = 3;

/// Document formats that can be fetched but not rendered faithfully.
pub const DEFAULT_ILLEGAL_FORMATS: &[&str] = &["lakesheet", "laketable", "lakeboard"];

/// Environment variable names consulted when a credential field is absent.
pub mod env {
    /// API token (token mode).
    pub const TOKEN: &str = "YUQUE_TOKEN";
    /// Account login name (password mode).
    pub const USERNAME: &str = "YUQUE_USERNAME";
    /// Account password (password mode).
    pub const PASSWORD: &str = "YUQUE_PASSWORD";
    /// Knowledge base access password (password mode).
    pub const REPO_PASSWORD: &str = "YUQUE_REPO_PASSWORD";
    /// Browser session cookie (password mode).
    pub const COOKIE: &str = "YUQUE_COOKIE";
    /// PEM public key used to encrypt the account password.
    pub const LOGIN_PUBLIC_KEY: &str = "YUQUE_LOGIN_PUBLIC_KEY";
}

/// Reads a process environment variable, treating empty values as absent.
#[must_use]
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn fill(field: &mut Option<String>, name: &str, lookup: &impl Fn(&str) -> Option<String>) {
    if field.as_deref().is_none_or(|value| value.trim().is_empty()) {
        *field = lookup(name);
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Settings for the API-token client.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenConfig {
    /// Owner login of the knowledge base.
    pub login: String,
    /// Knowledge base slug.
    pub repo: String,
    /// API token; falls back to `YUQUE_TOKEN`.
    pub token: Option<String>,
    /// API root; defaults to [`DEFAULT_API_URL`].
    pub base_url: Option<String>,
    /// Concurrent detail fetches; defaults to [`DEFAULT_LIMIT`].
    pub limit: Option<usize>,
    /// Publisher cache path; only its file stem feeds the checkpoint name.
    pub cache_path: Option<PathBuf>,
    /// Directory holding the list checkpoint; defaults to the working directory.
    pub checkpoint_dir: Option<PathBuf>,
    /// Formats that trigger an "unsupported format" warning.
    pub illegal_formats: Option<Vec<String>>,
}

impl TokenConfig {
    /// Creates a config for the given namespace with everything else defaulted.
    #[must_use]
    pub fn new(login: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            repo: repo.into(),
            ..Self::default()
        }
    }

    /// Fills absent credentials from `lookup` and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::MissingConfig`] when the token, login or repo is
    /// still missing.
    pub fn with_env_fallback(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, YuqueError> {
        fill(&mut self.token, env::TOKEN, &lookup);
        if self.token.is_none() || self.login.is_empty() || self.repo.is_empty() {
            return Err(YuqueError::missing_config(
                "token mode requires token, login and repo",
            ));
        }
        Ok(self)
    }

    /// Returns `login/repo`.
    #[must_use]
    pub fn namespace(&self) -> String {
        format!("{}/{}", self.login, self.repo)
    }

    /// Returns the API root without a trailing slash.
    #[must_use]
    pub fn api_url(&self) -> String {
        trim_base_url(self.base_url.as_deref().unwrap_or(DEFAULT_API_URL))
    }

    /// Returns the effective concurrency limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit.filter(|limit| *limit > 0).unwrap_or(DEFAULT_LIMIT)
    }

    /// Returns the effective illegal-format set.
    #[must_use]
    pub fn illegal_formats(&self) -> Vec<String> {
        illegal_formats_or_default(self.illegal_formats.as_ref())
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("login", &self.login)
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("limit", &self.limit)
            .field("cache_path", &self.cache_path)
            .field("checkpoint_dir", &self.checkpoint_dir)
            .finish_non_exhaustive()
    }
}

/// Settings for the password/cookie client.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordConfig {
    /// Owner login of the knowledge base.
    pub login: String,
    /// Knowledge base slug.
    pub repo: String,
    /// Account name (email, phone or login); falls back to `YUQUE_USERNAME`.
    pub username: Option<String>,
    /// Account password; falls back to `YUQUE_PASSWORD`.
    pub password: Option<String>,
    /// Knowledge base access password; falls back to `YUQUE_REPO_PASSWORD`.
    pub repo_password: Option<String>,
    /// Browser session cookie; falls back to `YUQUE_COOKIE`.
    pub cookie: Option<String>,
    /// PEM public key for password encryption; falls back to `YUQUE_LOGIN_PUBLIC_KEY`.
    pub login_public_key: Option<String>,
    /// Web host; defaults to [`DEFAULT_HOST`].
    pub host: Option<String>,
    /// Ask the markdown export to keep line breaks.
    pub linebreak: bool,
    /// Keep LaTeX source instead of rendered images.
    pub latex_code: bool,
    /// Keep only public documents.
    pub only_public: bool,
    /// Keep only published documents.
    pub only_published: bool,
    /// Concurrent detail fetches; defaults to [`DEFAULT_LIMIT`].
    pub limit: Option<usize>,
    /// Formats that trigger an "unsupported format" warning.
    pub illegal_formats: Option<Vec<String>>,
}

impl PasswordConfig {
    /// Creates a config for the given namespace with everything else defaulted.
    #[must_use]
    pub fn new(login: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            repo: repo.into(),
            ..Self::default()
        }
    }

    /// Fills absent credentials from `lookup` and validates the result.
    ///
    /// A cookie, a repository password, or a username/password pair must be
    /// available. Username/password login additionally needs the encryption key.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::MissingConfig`] when no credential path resolves.
    pub fn with_env_fallback(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, YuqueError> {
        fill(&mut self.username, env::USERNAME, &lookup);
        fill(&mut self.password, env::PASSWORD, &lookup);
        fill(&mut self.repo_password, env::REPO_PASSWORD, &lookup);
        fill(&mut self.cookie, env::COOKIE, &lookup);
        fill(&mut self.login_public_key, env::LOGIN_PUBLIC_KEY, &lookup);

        self.validate_credentials()?;
        if self.cookie.is_none() && self.has_account() && self.login_public_key.is_none() {
            return Err(YuqueError::missing_config(
                "username/password login requires the login public key",
            ));
        }
        Ok(self)
    }

    /// Checks that the namespace is set and at least one credential path exists.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::MissingConfig`] otherwise.
    pub fn validate_credentials(&self) -> Result<(), YuqueError> {
        if self.login.is_empty() || self.repo.is_empty() {
            return Err(YuqueError::missing_config("login and repo are required"));
        }
        if self.cookie.is_none() && self.repo_password.is_none() && !self.has_account() {
            return Err(YuqueError::missing_config(
                "one of username/password, repo password or browser cookie is required",
            ));
        }
        Ok(())
    }

    fn has_account(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Returns `login/repo`.
    #[must_use]
    pub fn namespace(&self) -> String {
        format!("{}/{}", self.login, self.repo)
    }

    /// Returns the web host without a trailing slash.
    #[must_use]
    pub fn host(&self) -> String {
        trim_base_url(self.host.as_deref().unwrap_or(DEFAULT_HOST))
    }

    /// Returns the effective concurrency limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit.filter(|limit| *limit > 0).unwrap_or(DEFAULT_LIMIT)
    }

    /// Returns the effective illegal-format set.
    #[must_use]
    pub fn illegal_formats(&self) -> Vec<String> {
        illegal_formats_or_default(self.illegal_formats.as_ref())
    }
}

impl fmt::Debug for PasswordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("PasswordConfig")
            .field("login", &self.login)
            .field("repo", &self.repo)
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .field("repo_password", &redact(&self.repo_password))
            .field("cookie", &redact(&self.cookie))
            .field("host", &self.host)
            .field("linebreak", &self.linebreak)
            .field("latex_code", &self.latex_code)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}

fn illegal_formats_or_default(configured: Option<&Vec<String>>) -> Vec<String> {
    configured.cloned().unwrap_or_else(|| {
        DEFAULT_ILLEGAL_FORMATS
            .iter()
            .map(|format| (*format).to_string())
            .collect()
    })
}
