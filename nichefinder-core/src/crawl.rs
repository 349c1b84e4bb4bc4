use crate::config::CrawlConfig;
use crate::data::{CrawlNode, RunStatus};
use crate::error::Result;
use crate::state::CrawlState;
use nichefinder_scanner::{FetchError, SuggestionSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Something the scheduler did, reported as it happens
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    Fetching {
        query: String,
        depth: usize,
        attempt: u32,
        pending: usize,
    },
    Retrying {
        query: String,
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    Completed {
        query: String,
        suggestions: usize,
        enqueued: usize,
    },
    Failed {
        query: String,
        attempts: u32,
        reason: String,
    },
}

/// Callback for reporting crawl progress
pub type ProgressCallback = Arc<dyn Fn(&CrawlEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedQuery {
    pub query: String,
    pub depth: usize,
    pub attempts: u32,
    pub transient: bool,
    pub reason: String,
}

/// Totals for one scheduler run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub run_id: String,
    pub seeds: usize,
    pub seeds_enqueued: usize,
    pub children_restored: usize,
    pub requests: usize,
    pub retries: usize,
    pub completed: usize,
    pub failures: Vec<FailedQuery>,
    pub skipped_beyond_depth: usize,
    pub pending_remaining: usize,
    pub aborted: bool,
}

impl CrawlSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Drives bounded-depth, breadth-first expansion of queries over a
/// [`SuggestionSource`], one node at a time.
pub struct CrawlScheduler<S> {
    source: S,
    state: CrawlState,
    config: CrawlConfig,
    progress_callback: Option<ProgressCallback>,
}

impl<S: SuggestionSource> CrawlScheduler<S> {
    pub fn new(source: S, state: CrawlState, config: CrawlConfig) -> Self {
        Self {
            source,
            state,
            config,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn into_state(self) -> CrawlState {
        self.state
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(ref callback) = self.progress_callback {
            callback(&event);
        }
    }

    /// Crawl until the frontier is empty or the consecutive-failure limit
    /// trips. Per-node failures are recorded in the summary; only
    /// persistence failures end the run with an error.
    pub async fn run(&mut self, seeds: &[String]) -> Result<CrawlSummary> {
        let stale = self.state.database().abort_stale_runs()?;
        if stale > 0 {
            warn!("Marked {} interrupted run(s) as aborted", stale);
        }
        let run_id = self.state.database().create_run(seeds.len())?;
        let mut summary = CrawlSummary {
            run_id: run_id.clone(),
            seeds: seeds.len(),
            ..CrawlSummary::default()
        };

        match self.drive(seeds, &mut summary).await {
            Ok(()) => {
                let status = if summary.aborted {
                    RunStatus::Aborted
                } else {
                    RunStatus::Completed
                };
                let summary_json = serde_json::to_string(&summary)?;
                self.state
                    .database()
                    .finish_run(&run_id, status, Some(&summary_json))?;

                info!(
                    "Crawl {}: {} completed, {} failed, {} retries, {} pending",
                    status.as_str(),
                    summary.completed,
                    summary.failed(),
                    summary.retries,
                    summary.pending_remaining
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Crawl stopped: {}", e);
                if let Err(finish_err) =
                    self.state
                        .database()
                        .finish_run(&run_id, RunStatus::Failed, None)
                {
                    error!("Could not mark run {} failed: {}", run_id, finish_err);
                }
                Err(e)
            }
        }
    }

    async fn drive(&mut self, seeds: &[String], summary: &mut CrawlSummary) -> Result<()> {
        summary.seeds_enqueued = self.state.enqueue_seeds(seeds)?;
        summary.children_restored = self
            .state
            .restore_children(self.config.max_depth, self.config.branch_from)?;

        info!(
            "Starting crawl: {} seeds ({} new), {} already completed, {} pending, max depth {}",
            seeds.len(),
            summary.seeds_enqueued,
            self.state.completed_count(),
            self.state.pending_len(),
            self.config.max_depth
        );

        let mut consecutive_failures = 0;

        while let Some(node) = self.state.next_pending() {
            if node.depth > self.config.max_depth {
                debug!("Leaving '{}' pending: depth {} beyond limit", node.query, node.depth);
                summary.skipped_beyond_depth += 1;
                continue;
            }

            match self.fetch_with_retry(&node, summary).await {
                Ok((suggestions, attempts)) => {
                    let children = if node.depth < self.config.max_depth {
                        node.children(&suggestions, self.config.branch_from)
                    } else {
                        Vec::new()
                    };

                    let enqueued =
                        self.state
                            .record_success(&node, &suggestions, attempts, children)?;
                    consecutive_failures = 0;
                    summary.completed += 1;

                    debug!(
                        "'{}' (depth {}): {} suggestions, {} children queued",
                        node.query,
                        node.depth,
                        suggestions.len(),
                        enqueued
                    );
                    self.emit(CrawlEvent::Completed {
                        query: node.query.clone(),
                        suggestions: suggestions.len(),
                        enqueued,
                    });
                }
                Err((err, attempts)) => {
                    self.state.record_failure(&node, attempts, err.reason())?;
                    consecutive_failures += 1;

                    warn!("Giving up on '{}' after {} attempt(s): {}", node.query, attempts, err);
                    self.emit(CrawlEvent::Failed {
                        query: node.query.clone(),
                        attempts,
                        reason: err.reason().to_string(),
                    });
                    summary.failures.push(FailedQuery {
                        query: node.query.clone(),
                        depth: node.depth,
                        attempts,
                        transient: err.is_transient(),
                        reason: err.reason().to_string(),
                    });

                    if self.config.max_consecutive_failures > 0
                        && consecutive_failures >= self.config.max_consecutive_failures
                    {
                        error!(
                            "Aborting: {} consecutive failures. Progress is saved; rerun to resume.",
                            consecutive_failures
                        );
                        summary.aborted = true;
                        break;
                    }
                }
            }
        }

        summary.pending_remaining = self.state.pending_len() + summary.skipped_beyond_depth;
        Ok(())
    }

    /// Fetch one node, retrying transient failures with capped exponential
    /// backoff. On failure, returns the last error and the attempts used.
    async fn fetch_with_retry(
        &self,
        node: &CrawlNode,
        summary: &mut CrawlSummary,
    ) -> std::result::Result<(Vec<String>, u32), (FetchError, u32)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            summary.requests += 1;
            self.emit(CrawlEvent::Fetching {
                query: node.query.clone(),
                depth: node.depth,
                attempt,
                pending: self.state.pending_len(),
            });

            match self.source.fetch(&node.query).await {
                Ok(suggestions) => return Ok((suggestions, attempt)),
                Err(err) if err.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.backoff_delay(attempt - 1);
                    warn!(
                        "Attempt {}/{} for '{}' failed, retrying in {:.1?}: {}",
                        attempt,
                        self.config.max_attempts,
                        node.query,
                        delay,
                        err.reason()
                    );
                    summary.retries += 1;
                    self.emit(CrawlEvent::Retrying {
                        query: node.query.clone(),
                        attempt,
                        delay,
                        reason: err.reason().to_string(),
                    });
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => return Err((err, attempt)),
            }
        }
    }
}
