//! Store gateway: connection ownership and transaction discipline.
//!
//! Every command executes inside one transaction opened by the dispatcher.
//! Nested `begin_transaction` calls attach to the outer frame and commit as
//! no-ops; only the outermost frame performs the real COMMIT or ROLLBACK.

use std::cell::Cell;
use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, warn};

use ripplecut_core::{EngineError, Result};

use crate::schema;

/// Map a rusqlite result into the engine's store error, preserving the
/// human-readable SQL message.
pub trait SqlExt<T> {
    fn map_store(self) -> Result<T>;
}

impl<T> SqlExt<T> for rusqlite::Result<T> {
    fn map_store(self) -> Result<T> {
        self.map_err(|e| EngineError::Store(e.to_string()))
    }
}

/// Handle returned by [`Store::begin_transaction`]. `Nested` is the sentinel
/// for "already in a transaction": commit and rollback are no-ops at that
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnHandle {
    Root,
    Nested,
}

/// Owns the SQLite connection and the transaction depth for the engine's
/// single logical lane.
pub struct Store {
    conn: Connection,
    txn_depth: Cell<u32>,
}

impl Store {
    /// Open (or create) a project database at `path` and ensure the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).map_store()?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database with the full schema. Used by tests and
    /// scratch projects.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_store()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON").map_store()?;
        schema::ensure_schema(&conn)?;
        Ok(Self {
            conn,
            txn_depth: Cell::new(0),
        })
    }

    /// The underlying connection, for prepared statements.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Whether a transaction frame is currently open.
    pub fn in_transaction(&self) -> bool {
        self.txn_depth.get() > 0
    }

    /// Open a transaction frame. Returns [`TxnHandle::Nested`] when a frame
    /// is already open; the outermost frame controls the real commit.
    pub fn begin_transaction(&self) -> Result<TxnHandle> {
        if self.txn_depth.get() > 0 {
            self.txn_depth.set(self.txn_depth.get() + 1);
            return Ok(TxnHandle::Nested);
        }
        match self.conn.execute_batch("BEGIN") {
            Ok(()) => {
                self.txn_depth.set(1);
                Ok(TxnHandle::Root)
            }
            // The depth counter can miss a transaction opened behind our
            // back (e.g. by a raw statement); recognise SQLite's message and
            // degrade to attach.
            Err(e) if e.to_string().contains("within a transaction") => {
                warn!("begin_transaction: already in a transaction, attaching");
                self.txn_depth.set(self.txn_depth.get() + 2);
                Ok(TxnHandle::Nested)
            }
            Err(e) => Err(EngineError::Store(e.to_string())),
        }
    }

    /// Commit a frame. No-op for nested frames.
    pub fn commit(&self, handle: TxnHandle) -> Result<()> {
        let depth = self.txn_depth.get();
        if depth == 0 {
            return Err(EngineError::Store("commit outside a transaction".into()));
        }
        self.txn_depth.set(depth - 1);
        match handle {
            TxnHandle::Nested => Ok(()),
            TxnHandle::Root => {
                debug!("commit");
                self.conn.execute_batch("COMMIT").map_store()
            }
        }
    }

    /// Roll back a frame. Nested frames defer to the outermost, which
    /// discards the whole command's effects.
    pub fn rollback(&self, handle: TxnHandle) -> Result<()> {
        let depth = self.txn_depth.get();
        if depth == 0 {
            return Err(EngineError::Store("rollback outside a transaction".into()));
        }
        self.txn_depth.set(depth - 1);
        match handle {
            TxnHandle::Nested => Ok(()),
            TxnHandle::Root => {
                debug!("rollback");
                self.conn.execute_batch("ROLLBACK").map_store()
            }
        }
    }
}
