//! Progress bar for detail downloads.

use std::time::Duration;

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use yuque_sdk::{DocDetail, DocSink};

/// Advances a progress bar for each document, then forwards to `inner`.
pub(crate) struct ProgressSink<'a> {
    bar: ProgressBar,
    inner: Option<&'a dyn DocSink>,
}

impl<'a> ProgressSink<'a> {
    /// Creates a visible bar; `enabled = false` yields a hidden one.
    pub(crate) fn new(enabled: bool, inner: Option<&'a dyn DocSink>) -> Self {
        let bar = if enabled {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::hidden()
        };
        Self { bar, inner }
    }

    pub(crate) fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[async_trait]
impl DocSink for ProgressSink<'_> {
    async fn on_document(
        &self,
        doc: &DocDetail,
        completed: usize,
        total: usize,
    ) -> anyhow::Result<()> {
        self.bar.set_length(total as u64);
        self.bar.set_position(completed as u64);
        self.bar.set_message(doc.title.clone());
        match self.inner {
            Some(inner) => inner.on_document(doc, completed, total).await,
            None => Ok(()),
        }
    }
}
