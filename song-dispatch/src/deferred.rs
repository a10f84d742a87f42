//! Durable holding area for requests that found no active device
//!
//! Entries are claimed with [`DeferredQueue::drain_all`], which returns and
//! removes them in one step. Two concurrent drains never receive the same
//! entry. Drains return entries oldest first.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, TransactionBehavior};

use crate::error::{DeferredError, DeferredResult};
use crate::model::{DeferredEntry, DeferredId, SongRequest};

/// Store of undelivered song requests
pub trait DeferredQueue: Send + Sync {
    /// Persist a request, returning its storage id
    fn enqueue(&self, request: SongRequest) -> DeferredResult<DeferredId>;

    /// Claim every stored entry, oldest first
    fn drain_all(&self) -> DeferredResult<Vec<DeferredEntry>>;

    fn len(&self) -> DeferredResult<usize>;

    fn is_empty(&self) -> DeferredResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    entries: VecDeque<DeferredEntry>,
}

/// Process-local [`DeferredQueue`]; contents are lost on exit
#[derive(Debug, Default)]
pub struct MemoryDeferredQueue {
    state: Mutex<MemoryState>,
}

impl MemoryDeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeferredQueue for MemoryDeferredQueue {
    fn enqueue(&self, request: SongRequest) -> DeferredResult<DeferredId> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = DeferredId(state.next_id);
        state.entries.push_back(DeferredEntry {
            id,
            request,
            enqueued_at: Utc::now(),
        });
        Ok(id)
    }

    fn drain_all(&self) -> DeferredResult<Vec<DeferredEntry>> {
        let entries = std::mem::take(&mut self.state.lock().entries);
        Ok(entries.into())
    }

    fn len(&self) -> DeferredResult<usize> {
        Ok(self.state.lock().entries.len())
    }
}

/// How long a connection waits for another writer before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// [`DeferredQueue`] stored in a SQLite file
///
/// Several processes may share the same file; the drain runs in an
/// `IMMEDIATE` transaction so only one of them claims each row.
#[derive(Debug)]
pub struct SqliteDeferredQueue {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteDeferredQueue {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> DeferredResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DeferredError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let conn = Connection::open(&path)?;
        Self::init(conn, path)
    }

    /// Private database that disappears with the queue
    pub fn open_in_memory() -> DeferredResult<Self> {
        Self::init(Connection::open_in_memory()?, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> DeferredResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS deferred_requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                artist TEXT NOT NULL,
                source_text TEXT NOT NULL,
                extractor_confident INTEGER NOT NULL,
                enqueued_at INTEGER NOT NULL
            )",
            [],
        )?;

        tracing::debug!("Deferred queue ready at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeferredQueue for SqliteDeferredQueue {
    fn enqueue(&self, request: SongRequest) -> DeferredResult<DeferredId> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO deferred_requests (artist, source_text, extractor_confident, enqueued_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                request.artist,
                request.source_text,
                request.extractor_confident,
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(DeferredId(conn.last_insert_rowid() as u64))
    }

    fn drain_all(&self) -> DeferredResult<Vec<DeferredEntry>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let entries = {
            let mut stmt = tx.prepare(
                "SELECT id, artist, source_text, extractor_confident, enqueued_at
                 FROM deferred_requests ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let millis: i64 = row.get(4)?;
                Ok(DeferredEntry {
                    id: DeferredId(row.get::<_, i64>(0)? as u64),
                    request: SongRequest {
                        artist: row.get(1)?,
                        source_text: row.get(2)?,
                        extractor_confident: row.get(3)?,
                    },
                    enqueued_at: DateTime::from_timestamp_millis(millis).unwrap_or_default(),
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        if let Some(last) = entries.last() {
            tx.execute(
                "DELETE FROM deferred_requests WHERE id <= ?1",
                params![last.id.0 as i64],
            )?;
        }
        tx.commit()?;

        Ok(entries)
    }

    fn len(&self) -> DeferredResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM deferred_requests", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
