//! Yuque SDK Library
//!
//! Client SDK for pulling documents and their directory structure out of the
//! Yuque documentation service, normalized for downstream publishing.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`client`] - Token and password/cookie clients
//! - [`pipeline`] - Bounded-concurrency detail fetch with per-document callback
//! - [`checkpoint`] - Resumable document-list progress on disk
//! - [`retry`] - Request pacing and exponential backoff
//! - [`catalog`] - Table of contents and breadcrumb resolution
//! - [`auth`] - Cookie session and password encryption
//! - [`scrape`] - Book state and password form extraction from web pages
//! - [`properties`] - Front-matter preamble parsing
//! - [`model`] - Document and catalog types
//! - [`config`] - Client configuration with environment fallback

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod catalog;
pub mod checkpoint;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod properties;
pub mod retry;
pub mod scrape;
pub mod transform;

// Re-export commonly used types
pub use auth::{PasswordEncryptor, RsaPasswordEncryptor, Session};
pub use catalog::{BreadcrumbMode, Catalog};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use client::{PAGE_SIZE, PasswordClient, TokenClient};
pub use config::{DEFAULT_LIMIT, PasswordConfig, TokenConfig};
pub use error::{Severity, YuqueError};
pub use model::{Breadcrumb, CatalogEntry, DocDetail, DocProperties, DocSummary};
pub use output::JsonDirSink;
pub use pipeline::{DetailFetcher, DocSink, PipelineOptions, fetch_details};
pub use retry::{DEFAULT_MAX_RETRIES, RequestPacer, RetryPolicy};
pub use scrape::{BookState, PageInspector, PasswordForm, RegexPageInspector};
pub use transform::{DocumentTransform, IdentityTransform};
