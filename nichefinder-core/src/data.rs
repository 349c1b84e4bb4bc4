use crate::config::BranchSource;
use crate::error::{NicheError, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Letters appended to a query to form its children.
const BRANCH_LETTERS: std::ops::RangeInclusive<char> = 'a'..='z';

pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Completed,
    Failed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pending" => Some(NodeStatus::Pending),
            "completed" => Some(NodeStatus::Completed),
            "failed" => Some(NodeStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Aborted => "aborted",
            RunStatus::Failed => "failed",
        }
    }
}

/// A query waiting to be, or being, expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlNode {
    pub query: String,
    pub depth: usize,
    pub parent: Option<String>,
}

impl CrawlNode {
    pub fn seed(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            depth: 0,
            parent: None,
        }
    }

    /// One child per letter a-z for each branch base. With
    /// [`BranchSource::Query`] the only base is this node's query.
    pub fn children(&self, suggestions: &[String], branch_from: BranchSource) -> Vec<CrawlNode> {
        let bases: Vec<&str> = match branch_from {
            BranchSource::Query => vec![self.query.as_str()],
            BranchSource::Suggestions => suggestions.iter().map(String::as_str).collect(),
        };

        bases
            .into_iter()
            .flat_map(|base| {
                BRANCH_LETTERS.map(move |letter| CrawlNode {
                    query: format!("{} {}", base, letter),
                    depth: self.depth + 1,
                    parent: Some(self.query.clone()),
                })
            })
            .collect()
    }
}

/// One row of the durable crawl state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query: String,
    pub depth: usize,
    pub parent: Option<String>,
    pub status: NodeStatus,
    pub attempts: u32,
    pub suggestions: Vec<String>,
    pub error: Option<String>,
    pub fetched_at: Option<String>,
}

impl QueryRecord {
    pub fn node(&self) -> CrawlNode {
        CrawlNode {
            query: self.query.clone(),
            depth: self.depth,
            parent: self.parent.clone(),
        }
    }
}

struct RawRecord {
    query: String,
    depth: i64,
    parent: Option<String>,
    status: String,
    attempts: u32,
    suggestions: Option<String>,
    error: Option<String>,
    fetched_at: Option<String>,
}

impl RawRecord {
    fn decode(self) -> Result<QueryRecord> {
        let status = NodeStatus::from_name(&self.status).ok_or_else(|| {
            NicheError::CorruptState(format!("unknown status '{}' for '{}'", self.status, self.query))
        })?;
        let depth = usize::try_from(self.depth).map_err(|_| {
            NicheError::CorruptState(format!("negative depth for '{}'", self.query))
        })?;
        let suggestions = match self.suggestions {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                NicheError::CorruptState(format!("bad suggestion list for '{}': {}", self.query, e))
            })?,
            None => Vec::new(),
        };

        Ok(QueryRecord {
            query: self.query,
            depth,
            parent: self.parent,
            status,
            attempts: self.attempts,
            suggestions,
            error: self.error,
            fetched_at: self.fetched_at,
        })
    }
}

const RECORD_COLUMNS: &str =
    "query, depth, parent, status, attempts, suggestions, error, fetched_at";

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Database {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    /// Delete a state database together with its WAL side files.
    pub fn remove(path: &Path) -> io::Result<()> {
        fs::remove_file(path)?;
        for suffix in ["-wal", "-shm"] {
            let mut side = path.as_os_str().to_owned();
            side.push(suffix);
            match fs::remove_file(&side) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        // Every committed node must survive a kill or power loss
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA cache_size = -16000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an existing state database for analysis without writing to it.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Database { conn })
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            -- Scheduler runs against this state
            CREATE TABLE IF NOT EXISTS crawl_runs (
    id TEXT PRIMARY KEY,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL CHECK(status IN ('running', 'completed', 'aborted', 'failed')),
    seed_count INTEGER NOT NULL,
    summary TEXT              -- JSON crawl summary
);

-- One row per query ever enqueued
CREATE TABLE IF NOT EXISTS queries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,  -- frontier order
    query TEXT NOT NULL UNIQUE,
    depth INTEGER NOT NULL,
    parent TEXT,
    status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending', 'completed', 'failed')),
    attempts INTEGER NOT NULL DEFAULT 0,
    suggestions TEXT,         -- JSON array, in endpoint order
    error TEXT,
    enqueued_at INTEGER NOT NULL,
    fetched_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_queries_status ON queries(status);
CREATE INDEX IF NOT EXISTS idx_queries_depth ON queries(depth);
            ",
        )?;
        Ok(())
    }

    // Run bookkeeping
    pub fn create_run(&self, seed_count: usize) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO crawl_runs (id, start_time, status, seed_count) VALUES (?1, ?2, ?3, ?4)",
            params![&run_id, current_timestamp(), RunStatus::Running.as_str(), seed_count as i64],
        )?;
        Ok(run_id)
    }

    pub fn finish_run(&self, run_id: &str, status: RunStatus, summary: Option<&str>) -> Result<()> {
        self.conn.execute(
            "UPDATE crawl_runs SET status = ?1, end_time = ?2, summary = ?3 WHERE id = ?4",
            params![status.as_str(), current_timestamp(), summary, run_id],
        )?;
        Ok(())
    }

    /// Mark runs still recorded as running as aborted. A run that was
    /// killed never got to finish its row. Returns how many were closed.
    pub fn abort_stale_runs(&self) -> Result<usize> {
        let closed = self.conn.execute(
            "UPDATE crawl_runs SET status = ?1, end_time = ?2 WHERE status = ?3",
            params![
                RunStatus::Aborted.as_str(),
                current_timestamp(),
                RunStatus::Running.as_str()
            ],
        )?;
        Ok(closed)
    }

    pub fn run_status(&self, run_id: &str) -> Result<Option<String>> {
        let status = self
            .conn
            .query_row(
                "SELECT status FROM crawl_runs WHERE id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(status)
    }

    // Query operations

    /// Enqueue a node unless its query text is already known. Returns
    /// whether a row was inserted.
    pub fn insert_pending(&self, node: &CrawlNode) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO queries (query, depth, parent, status, enqueued_at)
             VALUES (?1, ?2, ?3, 'pending', ?4)",
            params![&node.query, node.depth as i64, &node.parent, current_timestamp()],
        )?;
        Ok(inserted == 1)
    }

    /// Mark a node completed and enqueue its children in one transaction.
    /// Returns the children that were new.
    pub fn record_success(
        &mut self,
        node: &CrawlNode,
        suggestions: &[String],
        attempts: u32,
        children: Vec<CrawlNode>,
    ) -> Result<Vec<CrawlNode>> {
        let suggestions_json = serde_json::to_string(suggestions)?;
        let fetched_at = chrono::Utc::now().to_rfc3339();
        let now = current_timestamp();

        let tx = self.conn.transaction()?;
        let updated = tx.execute(
            "UPDATE queries SET status = 'completed', attempts = ?1, suggestions = ?2,
                error = NULL, fetched_at = ?3
             WHERE query = ?4",
            params![attempts, &suggestions_json, &fetched_at, &node.query],
        )?;
        if updated == 0 {
            tx.execute(
                "INSERT INTO queries (query, depth, parent, status, attempts, suggestions, enqueued_at, fetched_at)
                 VALUES (?1, ?2, ?3, 'completed', ?4, ?5, ?6, ?7)",
                params![
                    &node.query,
                    node.depth as i64,
                    &node.parent,
                    attempts,
                    &suggestions_json,
                    now,
                    &fetched_at,
                ],
            )?;
        }

        let mut enqueued = Vec::new();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO queries (query, depth, parent, status, enqueued_at)
                 VALUES (?1, ?2, ?3, 'pending', ?4)",
            )?;
            for child in children {
                if stmt.execute(params![&child.query, child.depth as i64, &child.parent, now])? == 1 {
                    enqueued.push(child);
                }
            }
        }
        tx.commit()?;

        Ok(enqueued)
    }

    pub fn record_failure(&self, node: &CrawlNode, attempts: u32, error: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE queries SET status = 'failed', attempts = ?1, error = ?2 WHERE query = ?3",
            params![attempts, error, &node.query],
        )?;
        if updated == 0 {
            self.conn.execute(
                "INSERT INTO queries (query, depth, parent, status, attempts, error, enqueued_at)
                 VALUES (?1, ?2, ?3, 'failed', ?4, ?5, ?6)",
                params![
                    &node.query,
                    node.depth as i64,
                    &node.parent,
                    attempts,
                    error,
                    current_timestamp(),
                ],
            )?;
        }
        Ok(())
    }

    /// Return failed queries to the frontier with a fresh attempt budget.
    pub fn reset_failed(&self) -> Result<usize> {
        let reset = self.conn.execute(
            "UPDATE queries SET status = 'pending', attempts = 0, error = NULL WHERE status = 'failed'",
            [],
        )?;
        Ok(reset)
    }

    pub fn get_record(&self, query: &str) -> Result<Option<QueryRecord>> {
        let sql = format!("SELECT {} FROM queries WHERE query = ?1", RECORD_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let raw = stmt.query_row(params![query], read_raw).optional()?;
        raw.map(RawRecord::decode).transpose()
    }

    /// All records in frontier order
    pub fn load_records(&self) -> Result<Vec<QueryRecord>> {
        let sql = format!("SELECT {} FROM queries ORDER BY id", RECORD_COLUMNS);
        self.collect_records(&sql, params![])
    }

    pub fn records_with_status(&self, status: NodeStatus) -> Result<Vec<QueryRecord>> {
        let sql = format!(
            "SELECT {} FROM queries WHERE status = ?1 ORDER BY id",
            RECORD_COLUMNS
        );
        self.collect_records(&sql, params![status.as_str()])
    }

    fn collect_records<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<QueryRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raw = stmt
            .query_map(params, read_raw)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raw.into_iter().map(RawRecord::decode).collect()
    }

    pub fn status_counts(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM queries GROUP BY status ORDER BY status")?;

        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(counts)
    }

    pub fn get_connection(&self) -> &Connection {
        &self.conn
    }
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok(RawRecord {
        query: row.get(0)?,
        depth: row.get(1)?,
        parent: row.get(2)?,
        status: row.get(3)?,
        attempts: row.get(4)?,
        suggestions: row.get(5)?,
        error: row.get(6)?,
        fetched_at: row.get(7)?,
    })
}
