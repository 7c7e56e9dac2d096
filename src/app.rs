//! One collect → summarize → persist pass.
//!
//! Two stages run concurrently on the current task, joined by a bounded
//! channel: the [`Framework`] streams posts in, and the summarizing stage
//! skips anything the [`Storage`] already knows, resolves content only for
//! what is left, and accumulates results. The batch is persisted once both
//! stages have finished.

use crate::error::Result;
use crate::framework::Framework;
use crate::models::SummaryResult;
use crate::storage::Storage;
use crate::summarizer::Summarizer;
use crate::utils::truncate_for_log;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Counters for a single run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Posts received from the framework.
    pub collected: usize,
    /// Posts already summarized, in history or earlier in this run.
    pub skipped: usize,
    pub summarized: usize,
    pub failed: usize,
    /// Lines actually appended to the segment file.
    pub written: usize,
}

pub struct App<S> {
    framework: Framework,
    summarizer: S,
    storage: Storage,
    channel_capacity: usize,
}

impl<S: Summarizer> App<S> {
    pub fn new(framework: Framework, summarizer: S, storage: Storage) -> Self {
        Self {
            framework,
            summarizer,
            storage,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Run every collector once and persist summaries for unseen posts.
    ///
    /// Per-post failures are logged and counted, and those posts are left
    /// unrecorded so the next run retries them. Collector initialization
    /// and storage failures are returned.
    #[instrument(level = "info", skip_all)]
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<RunReport> {
        let Self {
            framework,
            summarizer,
            storage,
            channel_capacity,
        } = self;
        let (tx, mut rx) = mpsc::channel::<crate::models::Post>(*channel_capacity);
        let mut report = RunReport::default();

        let summarize = async {
            let mut results = Vec::new();
            let mut handled = HashSet::new();

            while let Some(post) = rx.recv().await {
                report.collected += 1;
                if storage.summary_exists(&post.domain, &post.path)
                    || !handled.insert((post.domain.clone(), post.path.clone()))
                {
                    debug!(domain = %post.domain, path = %post.path, "Summary exists; skipping");
                    report.skipped += 1;
                    continue;
                }

                match summarizer.summary(&post).await {
                    Ok(summary) => {
                        info!(
                            domain = %post.domain,
                            path = %post.path,
                            summary = %truncate_for_log(&summary, 120),
                            "Summarized post"
                        );
                        report.summarized += 1;
                        results.push(SummaryResult::from_post(&post, summary));
                    }
                    Err(e) => {
                        error!(
                            path = %post.path,
                            domain = %post.domain,
                            title = %post.title,
                            error = %e,
                            "summary post failed"
                        );
                        report.failed += 1;
                    }
                }
            }
            results
        };

        let (produced, results) = tokio::join!(framework.start(cancel.clone(), tx), summarize);
        if let Err(e) = produced {
            error!(error = %e, "start framework failed");
            return Err(e);
        }

        report.written = storage.put(&results).await?;
        info!(
            collected = report.collected,
            skipped = report.skipped,
            summarized = report.summarized,
            failed = report.failed,
            written = report.written,
            "process done"
        );
        Ok(report)
    }
}
