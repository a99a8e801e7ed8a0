//! Local persistence for the hydraulic catalog.
//!
//! Everything lives in a single `SQLite` file:
//!
//! ```text
//! ~/.hydrolink/catalog.sqlite
//!   hydraulic_ports      # machine inputs and attachment hoses
//!   valves               # valve definitions per machine
//!   hose_couplings       # coupling instructions per machine (and attachment)
//!   installation_steps   # walk-through steps per machine
//!   installations        # installation runs and their outcome
//! ```
//!
//! Each operation opens its own connection. Writes that renumber an ordered
//! list run in one immediate transaction per ordering scope.

mod couplings;
mod installations;
mod ports;
mod slots;
mod steps;
mod valves;

use std::path::PathBuf;
use std::time::Duration;
use std::{fs, io};

use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use tracing::warn;
use uuid::Uuid;

use slots::OrderingScope;

/// How long a writer waits for another writer's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS hydraulic_ports (
    id              TEXT PRIMARY KEY,
    role            TEXT NOT NULL,
    owner_id        TEXT NOT NULL,
    sequence_number INTEGER NOT NULL,
    color           TEXT NOT NULL,
    slot            INTEGER NOT NULL,
    UNIQUE (role, owner_id, slot)
);

CREATE TABLE IF NOT EXISTS valves (
    id            TEXT PRIMARY KEY,
    machine_id    TEXT NOT NULL,
    number        TEXT NOT NULL,
    function_name TEXT NOT NULL,
    position      TEXT NOT NULL,
    kind          TEXT NOT NULL,
    description   TEXT,
    color         TEXT,
    port_a_label  TEXT NOT NULL,
    port_b_label  TEXT NOT NULL,
    slot          INTEGER NOT NULL,
    active        INTEGER NOT NULL,
    UNIQUE (machine_id, slot)
);

CREATE TABLE IF NOT EXISTS hose_couplings (
    id                   TEXT PRIMARY KEY,
    machine_id           TEXT NOT NULL,
    attachment_id        TEXT,
    hose_number          INTEGER NOT NULL,
    hose_color           TEXT NOT NULL,
    hose_label           TEXT NOT NULL,
    valve_id             TEXT REFERENCES valves (id) ON DELETE SET NULL,
    port                 TEXT NOT NULL,
    function_description TEXT NOT NULL,
    instruction          TEXT NOT NULL,
    connection_type      TEXT NOT NULL,
    pressure_rating_bar  INTEGER NOT NULL,
    flow_rating_lpm      INTEGER NOT NULL,
    slot                 INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS hose_couplings_slot
    ON hose_couplings (machine_id, IFNULL(attachment_id, ''), slot);

CREATE TABLE IF NOT EXISTS installation_steps (
    id              TEXT PRIMARY KEY,
    machine_id      TEXT NOT NULL,
    step_number     INTEGER NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT NOT NULL,
    image           TEXT,
    requires_signal INTEGER NOT NULL,
    signal_position TEXT,
    UNIQUE (machine_id, step_number)
);

CREATE TABLE IF NOT EXISTS installations (
    id            TEXT PRIMARY KEY,
    machine_id    TEXT NOT NULL,
    started_at    TEXT NOT NULL,
    status        TEXT NOT NULL,
    completed_at  TEXT,
    attachment_id TEXT
);
";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("slot {requested} is outside 1..={max}")]
    InvalidSlotRequest { requested: u32, max: u32 },

    #[error("concurrent edit of {0} did not settle, try again")]
    OrderingConflict(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },

    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("corrupt catalog data: {0}")]
    Corrupt(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// Catalog records that can be looked up by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Port,
    Valve,
    Coupling,
    Step,
    Installation,
}

impl RecordKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Port => "port",
            Self::Valve => "valve",
            Self::Coupling => "coupling",
            Self::Step => "step",
            Self::Installation => "installation",
        }
    }

    fn table(self) -> &'static str {
        match self {
            Self::Port => "hydraulic_ports",
            Self::Valve => "valves",
            Self::Coupling => "hose_couplings",
            Self::Step => "installation_steps",
            Self::Installation => "installations",
        }
    }
}

/// `SQLite`-backed catalog store.
pub struct Storage {
    path: PathBuf,
    busy_timeout: Duration,
}

impl Storage {
    /// Opens (creating if needed) the catalog database at `path`.
    ///
    /// The parent directory is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let storage = Self {
            path,
            busy_timeout: BUSY_TIMEOUT,
        };
        storage.open()?.execute_batch(SCHEMA)?;
        Ok(storage)
    }

    /// Returns the default database path: `~/.hydrolink/catalog.sqlite`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".hydrolink").join("catalog.sqlite"))
    }

    /// Ids of `kind` records whose textual form starts with `prefix`.
    pub fn ids_with_prefix(&self, kind: RecordKind, prefix: &str) -> Result<Vec<Uuid>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} WHERE substr(id, 1, length(?1)) = ?1 ORDER BY id",
            kind.table()
        ))?;
        let rows = stmt.query_map([prefix.to_ascii_lowercase()], |row| row.get::<_, String>(0))?;
        rows.map(|raw| parse_id(&raw?, "id")).collect()
    }

    /// How long a write waits on a locked database before giving up.
    #[cfg(test)]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn open(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Runs `op` inside one immediate transaction guarding `scope`.
    ///
    /// A lock that stays contended past the busy timeout is retried once,
    /// then reported as [`StorageError::OrderingConflict`].
    fn write_in_scope<T>(
        &self,
        scope: &OrderingScope,
        op: impl Fn(&Connection) -> Result<T>,
    ) -> Result<T> {
        match self.try_write(&op) {
            Err(StorageError::Sqlite(e)) if is_lock_contention(&e) => {
                warn!(%scope, "ordering scope is locked, retrying once");
                match self.try_write(&op) {
                    Err(StorageError::Sqlite(e)) if is_lock_contention(&e) => {
                        Err(StorageError::OrderingConflict(scope.to_string()))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    fn try_write<T>(&self, op: &impl Fn(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.open()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

fn is_lock_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// Parses a UUID column value.
fn parse_id(raw: &str, column: &str) -> Result<Uuid> {
    raw.parse::<Uuid>()
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}

/// Parses an enum column value through its `FromStr` impl.
fn parse_column<T>(raw: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>().map_err(StorageError::Corrupt)
}
