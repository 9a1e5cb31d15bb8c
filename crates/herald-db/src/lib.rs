pub mod connections;
pub mod error;
pub mod migrations;
pub mod query;
pub mod servers;

mod rows;

pub use connections::ConnectionStore;
pub use error::StoreError;
pub use query::{ConnectionFilter, ServerFilter};
pub use servers::ServerStore;

pub use rusqlite::Transaction;

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Default bound on how long a caller may wait for the store.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Single-writer SQLite store. Every call goes through one connection, so
/// transactions from concurrent requests run one after another.
pub struct Database {
    conn: Mutex<Connection>,
    timeout: Duration,
}

impl Database {
    pub fn open(path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn, timeout)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory(timeout: Duration) -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, timeout)
    }

    fn init(conn: Connection, timeout: Duration) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(timeout)?;

        migrations::run(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn with_conn<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<StoreError>,
    {
        let conn = self
            .conn
            .try_lock_for(self.timeout)
            .ok_or(StoreError::Timeout)?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self
            .conn
            .try_lock_for(self.timeout)
            .ok_or(StoreError::Timeout)?;
        f(&mut conn)
    }

    /// Run `f` inside one `BEGIN IMMEDIATE` transaction. Commits when `f`
    /// returns `Ok`; any error rolls every write back.
    pub fn transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(StoreError::from)?;
            let out = f(&tx)?;
            tx.commit().map_err(StoreError::from)?;
            Ok(out)
        })
    }
}

/// Fresh record id. UUIDv7 strings sort in creation order, which is what
/// the list cursors rely on.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// Current time at the precision the store keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Reject anything that is not a canonical lowercase hyphenated UUID.
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    match Uuid::parse_str(id) {
        Ok(parsed) if parsed.hyphenated().to_string() == id => Ok(()),
        _ => Err(StoreError::InvalidId(id.to_string())),
    }
}
