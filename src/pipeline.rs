//! Bounded-concurrency detail fetch shared by both clients.
//!
//! [`fetch_details`] narrows the listing to the requested ids, then runs a
//! fixed set of workers that drain a shared queue. Each worker keeps its own
//! output buffer; the buffers are concatenated once every worker is done, so
//! the result order depends on scheduling and is not the listing order.
//!
//! # Concurrency Model
//!
//! - Workers are plain futures joined on the caller's task, never spawned
//! - The queue lock is held only to pop the next item, never across an await
//! - A detail fetch error stops every worker and is returned to the caller
//! - A [`DocSink`] error is logged and the run continues

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::future::try_join_all;
use tracing::{info, instrument, warn};

use crate::config::DEFAULT_LIMIT;
use crate::error::YuqueError;
use crate::model::{DocDetail, DocSummary};

/// Fetches one normalized document for a listing entry.
#[async_trait]
pub trait DetailFetcher: Send + Sync {
    /// Fetches the detail of `summary`, with properties split and breadcrumbs resolved.
    async fn fetch_detail(&self, summary: &DocSummary) -> Result<DocDetail, YuqueError>;
}

/// Receives each document as soon as it has been fetched.
#[async_trait]
pub trait DocSink: Send + Sync {
    /// Handles `doc`; `completed` counts finished documents including this one.
    ///
    /// # Errors
    ///
    /// Any error is logged by the pipeline and does not stop the run.
    async fn on_document(&self, doc: &DocDetail, completed: usize, total: usize)
    -> anyhow::Result<()>;
}

/// Tuning for [`fetch_details`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Number of concurrent workers.
    pub limit: usize,
    /// Formats that trigger an "unsupported format" warning.
    pub illegal_formats: Vec<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            illegal_formats: Vec::new(),
        }
    }
}

/// Counters for one [`fetch_details`] run.
#[derive(Debug, Default)]
pub struct PipelineStats {
    completed: AtomicUsize,
    sink_failures: AtomicUsize,
}

impl PipelineStats {
    /// Returns the number of fetched documents.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of documents the sink rejected.
    #[must_use]
    pub fn sink_failures(&self) -> usize {
        self.sink_failures.load(Ordering::SeqCst)
    }

    /// Increments the completed counter and returns the new count.
    fn increment_completed(&self) -> usize {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn increment_sink_failures(&self) {
        self.sink_failures.fetch_add(1, Ordering::SeqCst);
    }
}

/// Keeps the entries whose slug is in `ids`, or every entry when `ids` is empty.
///
/// Entries are stamped with their 1-based position in the result.
#[must_use]
pub fn select_documents(docs: &[DocSummary], ids: &[String]) -> Vec<DocSummary> {
    let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
    docs.iter()
        .filter(|doc| {
            let keep = wanted.is_empty() || wanted.contains(doc.slug.as_str());
            if !keep {
                info!(slug = %doc.slug, title = %doc.title, "skipping document not in id filter");
            }
            keep
        })
        .cloned()
        .enumerate()
        .map(|(idx, mut doc)| {
            doc.index = Some(idx + 1);
            doc
        })
        .collect()
}

/// True when the listing carried no format and the fetched one is unsupported.
fn is_unsupported_format(summary: &DocSummary, detail: &DocDetail, illegal: &[String]) -> bool {
    summary.format.is_none()
        && detail
            .format
            .as_ref()
            .is_some_and(|format| illegal.contains(format))
}

/// Fetches the details of `docs` with at most `options.limit` requests in flight.
///
/// # Errors
///
/// Returns the first detail fetch error; documents already handed to `sink`
/// stay delivered.
#[instrument(skip_all, fields(listed = docs.len(), ids = ids.len(), limit = options.limit))]
pub async fn fetch_details<F>(
    fetcher: &F,
    docs: &[DocSummary],
    ids: &[String],
    options: &PipelineOptions,
    sink: Option<&dyn DocSink>,
) -> Result<Vec<DocDetail>, YuqueError>
where
    F: DetailFetcher + ?Sized,
{
    let selected = select_documents(docs, ids);
    if selected.is_empty() {
        info!("no documents to download");
        return Ok(Vec::new());
    }

    let total = selected.len();
    info!(total, "downloading documents");

    let queue = Mutex::new(VecDeque::from(selected));
    let stats = PipelineStats::default();
    let workers = options.limit.max(1).min(total);

    let queue = &queue;
    let stats = &stats;
    let illegal_formats = options.illegal_formats.as_slice();

    let buffers = try_join_all((0..workers).map(|worker| async move {
        let mut buffer = Vec::new();
        loop {
            let next = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(summary) = next else {
                break;
            };

            info!(
                worker,
                index = summary.index.unwrap_or_default(),
                total,
                title = %summary.title,
                "downloading document"
            );
            let detail = fetcher.fetch_detail(&summary).await?;
            if is_unsupported_format(&summary, &detail, illegal_formats) {
                warn!(
                    title = %detail.title,
                    format = ?detail.format,
                    "document format is not supported, content may be incomplete"
                );
            }

            let completed = stats.increment_completed();
            if let Some(sink) = sink {
                info!(completed, total, "documents processed");
                if let Err(error) = sink.on_document(&detail, completed, total).await {
                    stats.increment_sink_failures();
                    warn!(title = %detail.title, error = %error, "document callback failed");
                }
            }
            buffer.push(detail);
        }
        Ok::<_, YuqueError>(buffer)
    }))
    .await?;

    let details: Vec<DocDetail> = buffers.into_iter().flatten().collect();
    info!(
        downloaded = details.len(),
        sink_failures = stats.sink_failures(),
        "document download complete"
    );
    Ok(details)
}
