//! Local persistence for planning runs.
//!
//! Each run lives in its own `SQLite` file under the storage root:
//!
//! ```text
//! <root>/<uuid>.sqlite
//!   run                # One row: id, fingerprint, settings
//!   allocation         # The ledger, in grant order
//!   epic_outcome       # Final state of every epic
//!   underutilization   # Unused hours per sprint and resource
//! ```

mod run;

use std::{fs, io, path::PathBuf};

use rusqlite::Connection;
use uuid::Uuid;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("run not found: {0}")]
    RunNotFound(Uuid),

    #[error("run already exists: {0}")]
    RunAlreadyExists(Uuid),

    #[error("no run matching '{0}'")]
    NoMatch(String),

    #[error("'{reference}' is ambiguous: matches {}", .candidates.join(", "))]
    Ambiguous {
        reference: String,
        candidates: Vec<String>,
    },

    #[error("corrupt run data: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

const SCHEMA: &str = "
    CREATE TABLE run (
        id                    TEXT PRIMARY KEY,
        created_at            TEXT NOT NULL,
        fingerprint           TEXT NOT NULL,
        initial_sprint_start  TEXT NOT NULL,
        sprint_days           INTEGER NOT NULL,
        max_sprint_count      INTEGER NOT NULL,
        initial_sprint_number INTEGER NOT NULL,
        only_development      INTEGER NOT NULL
    );
    CREATE TABLE allocation (
        seq          INTEGER PRIMARY KEY,
        epic         TEXT NOT NULL,
        sprint       INTEGER NOT NULL,
        resource     TEXT NOT NULL,
        hours        REAL NOT NULL,
        sprint_start TEXT NOT NULL
    );
    CREATE TABLE epic_outcome (
        seq        INTEGER PRIMARY KEY,
        epic       TEXT NOT NULL,
        state      TEXT NOT NULL,
        priority   TEXT NOT NULL,
        charge     REAL NOT NULL,
        remaining  REAL NOT NULL,
        start_date TEXT,
        end_date   TEXT
    );
    CREATE TABLE underutilization (
        seq          INTEGER PRIMARY KEY,
        sprint       INTEGER NOT NULL,
        resource     TEXT NOT NULL,
        unused_hours REAL NOT NULL,
        reason       TEXT NOT NULL
    );
";

/// Local file-based storage for planning runs.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Creates a new storage instance rooted at the given directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the default storage root: `~/.epic-planner/runs/`.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".epic-planner").join("runs"))
    }

    fn db_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.sqlite"))
    }

    /// Creates the database file for a new run and its schema.
    fn create_db(&self, id: Uuid) -> Result<Connection> {
        let path = self.db_path(id);
        if path.exists() {
            return Err(StorageError::RunAlreadyExists(id));
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    fn open_db(&self, id: Uuid) -> Result<Connection> {
        let path = self.db_path(id);
        if !path.exists() {
            return Err(StorageError::RunNotFound(id));
        }
        Ok(Connection::open(path)?)
    }
}
