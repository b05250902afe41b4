//! Error types for the Yuque clients.
//!
//! Errors fall into two severities. Fatal errors describe a prerequisite that
//! cannot be satisfied within a run (missing credentials, failed login, an
//! unreadable repository page); the binary turns them into an immediate
//! non-zero exit. Recoverable errors are transient transport failures that the
//! retry wrapper and checkpointing are built to absorb.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration documentation pointed at from fatal configuration errors.
pub const CONFIG_DOCS_URL: &str = "https://elog.1874.cool/notion/write-platform";

/// How the caller is expected to react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The run cannot continue; the top-level caller must exit non-zero.
    Fatal,
    /// The failure may succeed on retry or can be logged and skipped.
    Recoverable,
}

/// Errors produced by the token and password clients.
#[derive(Debug, Error)]
pub enum YuqueError {
    /// A required configuration value is absent after environment fallback.
    #[error("missing Yuque configuration: {detail} (see {CONFIG_DOCS_URL})")]
    MissingConfig {
        /// What is missing.
        detail: String,
    },

    /// The configured repository does not exist or is not visible.
    #[error("knowledge base {namespace} not found, check the login/repo settings (see {CONFIG_DOCS_URL})")]
    BookNotFound {
        /// The `login/repo` namespace that was requested.
        namespace: String,
    },

    /// A JSON API call outside the retry path returned a non-200 status.
    #[error("Yuque API returned HTTP {status} for {url}: {message}")]
    Api {
        /// The requested URL.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Server-provided message, or the raw body when none is present.
        message: String,
    },

    /// Account login was rejected.
    #[error("Yuque login failed (HTTP {status}): {body}")]
    LoginFailed {
        /// The HTTP status code.
        status: u16,
        /// The raw response body.
        body: String,
    },

    /// The repository password form could not be found or was rejected.
    #[error("knowledge base password unlock failed: {reason}")]
    RepoUnlockFailed {
        /// Human-readable reason.
        reason: String,
    },

    /// The repository page did not carry the embedded book state.
    #[error("could not read the knowledge base state from {url}, try again later")]
    StateNotFound {
        /// The page that was inspected.
        url: String,
    },

    /// The account password could not be encrypted for login.
    #[error("failed to encrypt the account password: {reason}")]
    Encryption {
        /// Human-readable reason.
        reason: String,
    },

    /// A cookie-authenticated request was attempted without a session.
    #[error("not logged in to Yuque")]
    NotLoggedIn,

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Network-level failure (DNS, connect, TLS, body read).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status on a request that is allowed to be retried.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that failed.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A response body could not be decoded.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// The URL whose body failed to decode.
        url: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Local filesystem failure.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl YuqueError {
    /// Creates a missing-configuration error.
    pub fn missing_config(detail: impl Into<String>) -> Self {
        Self::MissingConfig {
            detail: detail.into(),
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a retryable HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates a repository unlock error.
    pub fn repo_unlock(reason: impl Into<String>) -> Self {
        Self::RepoUnlockFailed {
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the severity of this error.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::MissingConfig { .. }
            | Self::BookNotFound { .. }
            | Self::Api { .. }
            | Self::LoginFailed { .. }
            | Self::RepoUnlockFailed { .. }
            | Self::StateNotFound { .. }
            | Self::Encryption { .. }
            | Self::ClientBuild(_)
            | Self::NotLoggedIn => Severity::Fatal,
            Self::Network { .. }
            | Self::HttpStatus { .. }
            | Self::Decode { .. }
            | Self::Io { .. } => Severity::Recoverable,
        }
    }

    /// Returns true if the caller must terminate the run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}
