//! API-token client for the Yuque v2 JSON API.
//!
//! Every request carries the `X-Auth-Token` header. The document list is the
//! only paginated endpoint; it runs through a [`RequestPacer`] and persists
//! progress to a [`CheckpointStore`] after every page, so an interrupted run
//! resumes where it stopped.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{BreadcrumbMode, Catalog};
use crate::checkpoint::CheckpointStore;
use crate::config::TokenConfig;
use crate::error::YuqueError;
use crate::http::{TextResponse, api_error, build_http_client};
use crate::model::{ApiEnvelope, CatalogEntry, DocDetail, DocSummary, RawDocDetail};
use crate::pipeline::{DetailFetcher, DocSink, PipelineOptions, fetch_details};
use crate::properties::split_properties;
use crate::retry::{RequestPacer, RetryPolicy};
use crate::transform::{DocumentTransform, IdentityTransform};

/// Documents requested per list page.
pub const PAGE_SIZE: usize = 100;

const AUTH_HEADER: &str = "X-Auth-Token";

/// Client for one knowledge base, authenticated by API token.
pub struct TokenClient {
    config: TokenConfig,
    token: String,
    http: Client,
    api_url: String,
    namespace: String,
    catalog: Catalog,
    retry_policy: RetryPolicy,
    checkpoint: CheckpointStore,
    transform: Arc<dyn DocumentTransform>,
}

impl fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClient")
            .field("api_url", &self.api_url)
            .field("namespace", &self.namespace)
            .field("catalog_entries", &self.catalog.len())
            .field("checkpoint", &self.checkpoint.path())
            .finish_non_exhaustive()
    }
}

impl TokenClient {
    /// Creates a client from a resolved config.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::MissingConfig`] when the token, login or repo is
    /// absent, or [`YuqueError::ClientBuild`] when the HTTP client cannot be
    /// built.
    pub fn new(config: TokenConfig) -> Result<Self, YuqueError> {
        let token = config
            .token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| YuqueError::missing_config("token mode requires an API token"))?;
        if config.login.is_empty() || config.repo.is_empty() {
            return Err(YuqueError::missing_config("login and repo are required"));
        }

        Ok(Self {
            token,
            http: build_http_client(true)?,
            api_url: config.api_url(),
            namespace: config.namespace(),
            catalog: Catalog::default(),
            retry_policy: RetryPolicy::default(),
            checkpoint: CheckpointStore::for_config(&config),
            transform: Arc::new(IdentityTransform),
            config,
        })
    }

    /// Replaces the body transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn DocumentTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Replaces the list pagination retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Replaces the checkpoint location.
    #[must_use]
    pub fn with_checkpoint_store(mut self, store: CheckpointStore) -> Self {
        self.checkpoint = store;
        self
    }

    /// Returns `login/repo`.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the catalog loaded by the last [`TokenClient::toc`] call.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the checkpoint store in use.
    #[must_use]
    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_url)
    }

    async fn send(&self, url: &str, query: &[(&str, String)]) -> Result<TextResponse, YuqueError> {
        debug!(url, "GET");
        let response = self
            .http
            .get(url)
            .header(AUTH_HEADER, &self.token)
            .query(query)
            .send()
            .await
            .map_err(|error| YuqueError::network(url, error))?;
        TextResponse::read(url, response).await
    }

    /// Fetches an endpoint outside the retry path; any non-200 status is fatal.
    async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, YuqueError> {
        let url = self.url(path);
        let response = self.send(&url, query).await?;
        if response.status != StatusCode::OK {
            return Err(api_error(&url, &self.namespace, &response));
        }
        Ok(response.json::<ApiEnvelope<T>>(&url)?.data)
    }

    /// Fetches one list page; transport failures stay recoverable.
    async fn fetch_page(&self, offset: usize) -> Result<ApiEnvelope<Vec<DocSummary>>, YuqueError> {
        let url = self.url(&format!("repos/{}/docs", self.namespace));
        let query = [("offset", offset.to_string()), ("limit", PAGE_SIZE.to_string())];
        let response = self.send(&url, &query).await?;
        if !response.status.is_success() {
            let error = api_error(&url, &self.namespace, &response);
            if matches!(error, YuqueError::BookNotFound { .. }) {
                return Err(error);
            }
            return Err(YuqueError::http_status(url, response.status.as_u16()));
        }
        response.json(&url)
    }

    /// Fetches the table of contents and keeps it for breadcrumb resolution.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::BookNotFound`] or [`YuqueError::Api`] for non-200
    /// responses, and transport errors as-is.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn toc(&mut self) -> Result<Vec<CatalogEntry>, YuqueError> {
        let entries: Vec<CatalogEntry> = self
            .get_data(&format!("repos/{}/toc", self.namespace), &[])
            .await?;
        debug!(entries = entries.len(), "loaded catalog");
        self.catalog = Catalog::new(entries);
        Ok(self.catalog.entries().to_vec())
    }

    /// Fetches the full document list, resuming from a checkpoint if present.
    ///
    /// The catalog is refreshed first. Progress is saved after every page and
    /// once more on failure; the checkpoint is deleted after a complete fetch.
    ///
    /// # Errors
    ///
    /// Returns the error of a page whose retries were exhausted, or the first
    /// fatal error.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn doc_list(&mut self) -> Result<Vec<DocSummary>, YuqueError> {
        self.toc().await?;

        let (mut list, mut total) = match self.checkpoint.load() {
            Some(checkpoint) if checkpoint.is_complete() => {
                info!(
                    fetched = checkpoint.list.len(),
                    "checkpoint already holds the full document list"
                );
                self.checkpoint.clear();
                return Ok(checkpoint.list);
            }
            Some(checkpoint) => (checkpoint.list, checkpoint.total),
            None => (Vec::new(), 0),
        };

        let mut pacer = RequestPacer::new(self.retry_policy);
        loop {
            let offset = list.len();
            info!(from = offset + 1, to = offset + PAGE_SIZE, "fetching document list page");

            let page = match pacer.run(|| self.fetch_page(offset)).await {
                Ok(page) => page,
                Err(error) => {
                    self.checkpoint.save(&list, total);
                    warn!(
                        fetched = list.len(),
                        resume_from = list.len() + 1,
                        error = %error,
                        "document list fetch failed, progress saved"
                    );
                    return Err(error);
                }
            };

            let received = page.data.len();
            list.extend(page.data);
            total = page.meta.map_or(list.len(), |meta| meta.total);
            self.checkpoint.save(&list, total);
            info!(
                fetched = list.len(),
                total,
                requests = pacer.request_count(),
                "document list progress"
            );

            if received == 0 || list.len() >= total {
                break;
            }
        }

        self.checkpoint.clear();
        info!(
            documents = list.len(),
            requests = pacer.request_count(),
            retries = pacer.retries(),
            "document list complete"
        );
        Ok(list)
    }

    /// Fetches one document with breadcrumbs resolved and properties split.
    ///
    /// # Errors
    ///
    /// Returns [`YuqueError::Api`] for non-200 responses and transport errors
    /// as-is.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    pub async fn doc_detail(&self, slug: &str) -> Result<DocDetail, YuqueError> {
        let path = format!(
            "repos/{}/docs/{}",
            self.namespace,
            urlencoding::encode(slug)
        );
        let raw: RawDocDetail = self.get_data(&path, &[("raw", "1".to_string())]).await?;

        let mut detail = DocDetail::from_raw(raw);
        detail.catalog = self.catalog.breadcrumb(&detail.slug, BreadcrumbMode::Depth);
        detail.body_html = detail
            .body_html
            .map(|html| self.transform.process_html(&html));

        let split = split_properties(&detail.body);
        detail.properties = split.properties;
        detail.body = self.transform.process_markdown(&split.body);
        detail.stamp_updated();
        Ok(detail)
    }

    /// Fetches the details of `docs` (narrowed to `ids` when non-empty).
    ///
    /// # Errors
    ///
    /// Returns the first detail fetch error.
    pub async fn doc_detail_list(
        &self,
        docs: &[DocSummary],
        ids: &[String],
        sink: Option<&dyn DocSink>,
    ) -> Result<Vec<DocDetail>, YuqueError> {
        let options = PipelineOptions {
            limit: self.config.limit(),
            illegal_formats: self.config.illegal_formats(),
        };
        fetch_details(self, docs, ids, &options, sink).await
    }
}

#[async_trait]
impl DetailFetcher for TokenClient {
    async fn fetch_detail(&self, summary: &DocSummary) -> Result<DocDetail, YuqueError> {
        self.doc_detail(&summary.slug).await
    }
}
