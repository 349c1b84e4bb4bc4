// Exclusively owned crawl progress, mirrored to the state database

use crate::config::BranchSource;
use crate::data::{CrawlNode, Database, NodeStatus, QueryRecord};
use crate::error::Result;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use tracing::{debug, info};

/// Durable crawl progress: which queries are done, what they returned, and
/// the frontier still to expand.
///
/// Every mutation is written through to the database before it is applied
/// in memory, so the in-memory view never runs ahead of what a restart
/// would load.
pub struct CrawlState {
    db: Database,
    frontier: VecDeque<CrawlNode>,
    known: HashSet<String>,
    completed: usize,
    failed: usize,
}

impl CrawlState {
    /// Open (or create) the state database at `path` and load it.
    pub fn open(path: &Path) -> Result<Self> {
        Self::load(Database::new(path)?)
    }

    pub fn load(db: Database) -> Result<Self> {
        let mut state = Self {
            db,
            frontier: VecDeque::new(),
            known: HashSet::new(),
            completed: 0,
            failed: 0,
        };

        for record in state.db.load_records()? {
            match record.status {
                NodeStatus::Pending => state.frontier.push_back(record.node()),
                NodeStatus::Completed => state.completed += 1,
                NodeStatus::Failed => state.failed += 1,
            }
            state.known.insert(record.query);
        }

        info!(
            "Loaded crawl state: {} completed, {} failed, {} pending",
            state.completed,
            state.failed,
            state.frontier.len()
        );
        Ok(state)
    }

    /// Enqueue seeds the state has never seen. Returns how many were added.
    pub fn enqueue_seeds(&mut self, seeds: &[String]) -> Result<usize> {
        let mut added = 0;
        for seed in seeds {
            if self.known.contains(seed) {
                continue;
            }
            let node = CrawlNode::seed(seed.clone());
            if self.db.insert_pending(&node)? {
                added += 1;
            }
            self.known.insert(node.query.clone());
            self.frontier.push_back(node);
        }
        Ok(added)
    }

    /// Re-derive the children of completed nodes and enqueue any the store
    /// is missing, e.g. after `max_depth` was raised between runs.
    pub fn restore_children(&mut self, max_depth: usize, branch_from: BranchSource) -> Result<usize> {
        let mut restored = 0;
        for record in self.db.records_with_status(NodeStatus::Completed)? {
            if record.depth >= max_depth {
                continue;
            }
            for child in record.node().children(&record.suggestions, branch_from) {
                if self.known.contains(&child.query) {
                    continue;
                }
                if self.db.insert_pending(&child)? {
                    restored += 1;
                }
                self.known.insert(child.query.clone());
                self.frontier.push_back(child);
            }
        }
        if restored > 0 {
            debug!("Restored {} children of completed queries", restored);
        }
        Ok(restored)
    }

    /// Next node in FIFO order
    pub fn next_pending(&mut self) -> Option<CrawlNode> {
        self.frontier.pop_front()
    }

    /// Persist a successful fetch with its children, then enqueue the
    /// children that were not already known. Returns how many were enqueued.
    pub fn record_success(
        &mut self,
        node: &CrawlNode,
        suggestions: &[String],
        attempts: u32,
        children: Vec<CrawlNode>,
    ) -> Result<usize> {
        let fresh: Vec<CrawlNode> = children
            .into_iter()
            .filter(|child| !self.known.contains(&child.query))
            .collect();

        let enqueued = self.db.record_success(node, suggestions, attempts, fresh)?;
        self.completed += 1;
        self.known.insert(node.query.clone());
        for child in &enqueued {
            self.known.insert(child.query.clone());
        }
        let count = enqueued.len();
        self.frontier.extend(enqueued);
        Ok(count)
    }

    pub fn record_failure(&mut self, node: &CrawlNode, attempts: u32, reason: &str) -> Result<()> {
        self.db.record_failure(node, attempts, reason)?;
        self.failed += 1;
        self.known.insert(node.query.clone());
        Ok(())
    }

    /// Move permanently failed queries back onto the frontier.
    pub fn reset_failed(&mut self) -> Result<usize> {
        let failed = self.db.records_with_status(NodeStatus::Failed)?;
        let reset = self.db.reset_failed()?;
        self.failed = 0;
        self.frontier.extend(failed.iter().map(QueryRecord::node));
        Ok(reset)
    }

    pub fn is_known(&self, query: &str) -> bool {
        self.known.contains(query)
    }

    pub fn pending_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed
    }

    pub fn failed_count(&self) -> usize {
        self.failed
    }

    pub fn completed_records(&self) -> Result<Vec<QueryRecord>> {
        self.db.records_with_status(NodeStatus::Completed)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn into_database(self) -> Database {
        self.db
    }
}
