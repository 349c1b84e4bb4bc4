// Tests for the crawl scheduler against a scripted suggestion source

use nichefinder_core::config::{BranchSource, CrawlConfig};
use nichefinder_core::crawl::{CrawlEvent, CrawlScheduler, CrawlSummary};
use nichefinder_core::data::{CrawlNode, Database, NodeStatus};
use nichefinder_core::error::NicheError;
use nichefinder_core::normalize;
use nichefinder_core::state::CrawlState;
use nichefinder_scanner::{FetchError, SuggestionSource};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Answers from fixed tables and records every query it is asked.
#[derive(Clone, Default)]
struct ScriptedSource {
    suggestions: HashMap<String, Vec<String>>,
    /// Transient failures served before a query succeeds
    transient_failures: HashMap<String, u32>,
    permanent: HashSet<String>,
    /// Every call after this many fails transiently
    fail_after: Option<usize>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    fn with_suggestions(mut self, query: &str, suggestions: &[&str]) -> Self {
        self.suggestions.insert(
            query.to_string(),
            suggestions.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    fn failing_transiently(mut self, query: &str, times: u32) -> Self {
        self.transient_failures.insert(query.to_string(), times);
        self
    }

    fn failing_permanently(mut self, query: &str) -> Self {
        self.permanent.insert(query.to_string());
        self
    }

    fn failing_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SuggestionSource for ScriptedSource {
    async fn fetch(&self, query: &str) -> Result<Vec<String>, FetchError> {
        let (total, for_query) = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(query.to_string());
            let for_query = calls.iter().filter(|q| q.as_str() == query).count() as u32;
            (calls.len(), for_query)
        };

        if self.fail_after.is_some_and(|limit| total > limit) {
            return Err(FetchError::transient(query, "connection reset"));
        }
        if self.permanent.contains(query) {
            return Err(FetchError::permanent(query, "malformed response"));
        }
        if for_query <= self.transient_failures.get(query).copied().unwrap_or(0) {
            return Err(FetchError::transient(query, "HTTP 503 Service Unavailable"));
        }
        Ok(self.suggestions.get(query).cloned().unwrap_or_default())
    }
}

/// Drops the `queries` table from a second connection when asked for
/// `break_on`, then answers like the wrapped source.
#[derive(Clone)]
struct StoreBreakingSource {
    inner: ScriptedSource,
    path: PathBuf,
    break_on: String,
}

impl SuggestionSource for StoreBreakingSource {
    async fn fetch(&self, query: &str) -> Result<Vec<String>, FetchError> {
        if query == self.break_on {
            let conn = rusqlite::Connection::open(&self.path).unwrap();
            conn.execute_batch("DROP TABLE queries").unwrap();
        }
        self.inner.fetch(query).await
    }
}

fn crawl_config(max_depth: usize) -> CrawlConfig {
    CrawlConfig {
        max_depth,
        max_attempts: 3,
        backoff_base_secs: 0.0,
        backoff_cap_secs: 0.0,
        ..CrawlConfig::default()
    }
}

fn state_path(dir: &TempDir) -> PathBuf {
    dir.path().join("state.db")
}

fn seeds(queries: &[&str]) -> Vec<String> {
    queries.iter().map(|q| q.to_string()).collect()
}

async fn crawl(
    path: &Path,
    source: ScriptedSource,
    config: CrawlConfig,
    seed_queries: &[&str],
) -> (CrawlSummary, CrawlState) {
    let state = CrawlState::open(path).unwrap();
    let mut scheduler = CrawlScheduler::new(source, state, config);
    let summary = scheduler.run(&seeds(seed_queries)).await.unwrap();
    (summary, scheduler.into_state())
}

// ============================================================================
// Depth and Ordering Tests
// ============================================================================

#[tokio::test]
async fn test_depth_zero_fetches_seeds_only() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::default();

    let (summary, state) = crawl(&state_path(&dir), source.clone(), crawl_config(0), &["maze", "sudoku"]).await;

    assert_eq!(source.calls(), vec!["maze", "sudoku"]);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.seeds_enqueued, 2);
    assert_eq!(state.database().load_records().unwrap().len(), 2);
}

#[tokio::test]
async fn test_breadth_first_letter_expansion() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::default();

    let (summary, state) = crawl(&state_path(&dir), source.clone(), crawl_config(1), &["maze"]).await;

    let calls = source.calls();
    assert_eq!(calls.len(), 27);
    assert_eq!(calls[0], "maze");
    assert_eq!(calls[1], "maze a");
    assert_eq!(calls[26], "maze z");
    assert_eq!(summary.completed, 27);

    // Nodes at max depth never enqueue children
    let records = state.database().load_records().unwrap();
    assert_eq!(records.len(), 27);
    assert!(records.iter().all(|r| r.depth <= 1));
    assert!(records.iter().all(|r| r.status == NodeStatus::Completed));

    let child = state.database().get_record("maze q").unwrap().unwrap();
    assert_eq!(child.depth, 1);
    assert_eq!(child.parent.as_deref(), Some("maze"));
}

#[tokio::test]
async fn test_seeds_processed_before_children() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::default();

    crawl(&state_path(&dir), source.clone(), crawl_config(1), &["maze", "sudoku"]).await;

    let calls = source.calls();
    assert_eq!(&calls[..3], &["maze", "sudoku", "maze a"]);
    assert_eq!(calls[28], "sudoku a");
}

#[tokio::test]
async fn test_branch_from_suggestions() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::default().with_suggestions("maze", &["maze book", "maze for kids"]);
    let config = CrawlConfig {
        branch_from: BranchSource::Suggestions,
        ..crawl_config(1)
    };

    crawl(&state_path(&dir), source.clone(), config, &["maze"]).await;

    let calls = source.calls();
    assert_eq!(calls.len(), 53);
    assert_eq!(calls[1], "maze book a");
    assert_eq!(calls[27], "maze for kids a");
}

#[tokio::test]
async fn test_nodes_beyond_depth_stay_pending() {
    let dir = TempDir::new().unwrap();
    let path = state_path(&dir);
    {
        let db = Database::new(&path).unwrap();
        db.insert_pending(&CrawlNode {
            query: "maze b c".to_string(),
            depth: 2,
            parent: Some("maze b".to_string()),
        })
        .unwrap();
    }
    let source = ScriptedSource::default();

    let (summary, state) = crawl(&path, source.clone(), crawl_config(1), &[]).await;

    assert!(source.calls().is_empty());
    assert_eq!(summary.skipped_beyond_depth, 1);
    assert_eq!(summary.pending_remaining, 1);
    let record = state.database().get_record("maze b c").unwrap().unwrap();
    assert_eq!(record.status, NodeStatus::Pending);
}

// ============================================================================
// Resume Tests
// ============================================================================

#[tokio::test]
async fn test_resume_never_refetches_completed() {
    let dir = TempDir::new().unwrap();
    let path = state_path(&dir);

    let first = ScriptedSource::default();
    crawl(&path, first.clone(), crawl_config(1), &["maze"]).await;
    assert_eq!(first.calls().len(), 27);

    let second = ScriptedSource::default();
    let (summary, _) = crawl(&path, second.clone(), crawl_config(1), &["maze"]).await;

    assert!(second.calls().is_empty());
    assert_eq!(summary.requests, 0);
    assert_eq!(summary.seeds_enqueued, 0);
}

#[tokio::test]
async fn test_resume_after_abort_continues_frontier() {
    let dir = TempDir::new().unwrap();
    let path = state_path(&dir);
    let config = CrawlConfig {
        max_attempts: 1,
        max_consecutive_failures: 2,
        ..crawl_config(0)
    };
    let queries = ["alpha", "beta", "gamma", "delta"];

    let first = ScriptedSource::default().failing_after(1);
    let (summary, state) = crawl(&path, first.clone(), config.clone(), &queries).await;

    assert!(summary.aborted);
    assert_eq!(first.calls(), vec!["alpha", "beta", "gamma"]);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed(), 2);
    assert_eq!(summary.pending_remaining, 1);
    assert_eq!(
        state.database().run_status(&summary.run_id).unwrap().as_deref(),
        Some("aborted")
    );
    drop(state);

    let second = ScriptedSource::default();
    let (summary, state) = crawl(&path, second.clone(), config, &queries).await;

    // Completed and failed queries are both left alone
    assert_eq!(second.calls(), vec!["delta"]);
    assert!(!summary.aborted);
    assert_eq!(state.completed_count(), 2);
    assert_eq!(state.failed_count(), 2);
}

#[tokio::test]
async fn test_interrupted_run_marked_aborted() {
    let dir = TempDir::new().unwrap();
    let path = state_path(&dir);
    let interrupted = {
        let db = Database::new(&path).unwrap();
        db.create_run(1).unwrap()
    };

    let (summary, state) = crawl(&path, ScriptedSource::default(), crawl_config(0), &["maze"]).await;

    let db = state.database();
    assert_eq!(db.run_status(&interrupted).unwrap().as_deref(), Some("aborted"));
    assert_eq!(db.run_status(&summary.run_id).unwrap().as_deref(), Some("completed"));
}

#[tokio::test]
async fn test_raised_depth_restores_children() {
    let dir = TempDir::new().unwrap();
    let path = state_path(&dir);

    crawl(&path, ScriptedSource::default(), crawl_config(0), &["maze"]).await;

    let second = ScriptedSource::default();
    let (summary, _) = crawl(&path, second.clone(), crawl_config(1), &["maze"]).await;

    let calls = second.calls();
    assert_eq!(summary.children_restored, 26);
    assert_eq!(calls.len(), 26);
    assert!(!calls.contains(&"maze".to_string()));
}

// ============================================================================
// Failure Handling Tests
// ============================================================================

#[tokio::test]
async fn test_exhausted_transient_retries_fail_node() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::default()
        .failing_transiently("bad", 3)
        .with_suggestions("bad", &["bad puzzle"])
        .with_suggestions("good", &["good puzzle book"]);

    let (summary, state) = crawl(&state_path(&dir), source.clone(), crawl_config(0), &["bad", "good"]).await;

    assert_eq!(source.calls(), vec!["bad", "bad", "bad", "good"]);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.retries, 2);
    assert_eq!(summary.failed(), 1);

    let failure = &summary.failures[0];
    assert_eq!(failure.query, "bad");
    assert_eq!(failure.attempts, 3);
    assert!(failure.transient);

    let record = state.database().get_record("bad").unwrap().unwrap();
    assert_eq!(record.status, NodeStatus::Failed);
    assert_eq!(record.attempts, 3);
    assert!(record.error.is_some());

    // Failed nodes contribute nothing downstream
    let records = state.database().load_records().unwrap();
    let normalized = normalize::deduplicate(&records);
    let texts: Vec<&str> = normalized.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["good puzzle book"]);
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::default().failing_transiently("flaky", 1);

    let (summary, state) = crawl(&state_path(&dir), source.clone(), crawl_config(0), &["flaky"]).await;

    assert_eq!(source.calls().len(), 2);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.retries, 1);
    let record = state.database().get_record("flaky").unwrap().unwrap();
    assert_eq!(record.status, NodeStatus::Completed);
    assert_eq!(record.attempts, 2);
    assert!(record.fetched_at.is_some());
}

#[tokio::test]
async fn test_permanent_failure_not_retried() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::default().failing_permanently("broken");

    let (summary, _) = crawl(&state_path(&dir), source.clone(), crawl_config(1), &["broken", "fine"]).await;

    assert_eq!(source.calls().iter().filter(|q| *q == "broken").count(), 1);
    assert_eq!(summary.retries, 0);
    assert_eq!(summary.failures.len(), 1);
    assert!(!summary.failures[0].transient);
    assert_eq!(summary.failures[0].attempts, 1);
    // The sibling still expands
    assert_eq!(summary.completed, 27);
}

#[tokio::test]
async fn test_reset_failed_retries_on_next_run() {
    let dir = TempDir::new().unwrap();
    let path = state_path(&dir);

    let broken = ScriptedSource::default().failing_permanently("broken");
    crawl(&path, broken, crawl_config(0), &["broken"]).await;

    let mut state = CrawlState::open(&path).unwrap();
    assert_eq!(state.failed_count(), 1);
    assert_eq!(state.reset_failed().unwrap(), 1);
    assert_eq!(state.pending_len(), 1);

    let healthy = ScriptedSource::default();
    let mut scheduler = CrawlScheduler::new(healthy.clone(), state, crawl_config(0));
    let summary = scheduler.run(&seeds(&["broken"])).await.unwrap();

    assert_eq!(healthy.calls(), vec!["broken"]);
    assert_eq!(summary.completed, 1);
    let record = scheduler.state().database().get_record("broken").unwrap().unwrap();
    assert_eq!(record.status, NodeStatus::Completed);
}

#[tokio::test]
async fn test_consecutive_failure_limit_disabled() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::default().failing_after(0);
    let config = CrawlConfig {
        max_attempts: 1,
        max_consecutive_failures: 0,
        ..crawl_config(0)
    };

    let (summary, _) = crawl(&state_path(&dir), source, config, &["a", "b", "c"]).await;

    assert!(!summary.aborted);
    assert_eq!(summary.failed(), 3);
    assert_eq!(summary.pending_remaining, 0);
}

// ============================================================================
// Persistence Failure Tests
// ============================================================================

async fn crawl_with_broken_store(
    path: &Path,
    inner: ScriptedSource,
    break_on: &str,
) -> (nichefinder_core::error::Result<CrawlSummary>, Vec<String>) {
    let source = StoreBreakingSource {
        inner: inner.clone(),
        path: path.to_path_buf(),
        break_on: break_on.to_string(),
    };
    let state = CrawlState::open(path).unwrap();
    let mut scheduler = CrawlScheduler::new(source, state, crawl_config(1));
    let result = scheduler.run(&seeds(&["alpha", "beta"])).await;
    (result, inner.calls())
}

fn run_statuses(path: &Path) -> Vec<String> {
    let conn = rusqlite::Connection::open(path).unwrap();
    let mut stmt = conn.prepare("SELECT status FROM crawl_runs").unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<Vec<String>>>()
        .unwrap()
}

#[tokio::test]
async fn test_store_failure_on_success_stops_crawl() {
    let dir = TempDir::new().unwrap();
    let path = state_path(&dir);

    let (result, calls) = crawl_with_broken_store(&path, ScriptedSource::default(), "alpha").await;

    assert!(matches!(result, Err(NicheError::Persistence(_))));
    assert_eq!(calls, vec!["alpha"]);
    assert_eq!(run_statuses(&path), vec!["failed"]);
}

#[tokio::test]
async fn test_store_failure_on_failure_stops_crawl() {
    let dir = TempDir::new().unwrap();
    let path = state_path(&dir);
    let inner = ScriptedSource::default().failing_permanently("alpha");

    let (result, calls) = crawl_with_broken_store(&path, inner, "alpha").await;

    assert!(matches!(result, Err(NicheError::Persistence(_))));
    assert_eq!(calls, vec!["alpha"]);
    assert_eq!(run_statuses(&path), vec!["failed"]);
}

// ============================================================================
// Progress Reporting Tests
// ============================================================================

#[tokio::test]
async fn test_progress_events() {
    let dir = TempDir::new().unwrap();
    let source = ScriptedSource::default()
        .failing_transiently("maze", 1)
        .with_suggestions("maze", &["maze book"]);
    let events: Arc<Mutex<Vec<CrawlEvent>>> = Arc::default();
    let sink = events.clone();

    let state = CrawlState::open(&state_path(&dir)).unwrap();
    let mut scheduler = CrawlScheduler::new(source, state, crawl_config(0))
        .with_progress_callback(Arc::new(move |event: &CrawlEvent| sink.lock().unwrap().push(event.clone())));
    let summary = scheduler.run(&seeds(&["maze"])).await.unwrap();

    assert_eq!(
        scheduler.state().database().run_status(&summary.run_id).unwrap().as_deref(),
        Some("completed")
    );

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 4);
    assert!(matches!(&events[0], CrawlEvent::Fetching { attempt: 1, .. }));
    assert!(matches!(&events[1], CrawlEvent::Retrying { attempt: 1, .. }));
    assert!(matches!(&events[2], CrawlEvent::Fetching { attempt: 2, .. }));
    assert_eq!(
        events[3],
        CrawlEvent::Completed {
            query: "maze".to_string(),
            suggestions: 1,
            enqueued: 0,
        }
    );
}
