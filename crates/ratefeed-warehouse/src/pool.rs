//! Small in-process pool of `DuckDB` connections.
//!
//! Polling feeds write from the blocking thread pool, so each write borrows a
//! connection here instead of reopening the database file every cycle. All
//! connections are cloned from one root handle and share a single database
//! instance.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

struct PoolShared {
    db_path: PathBuf,
    max_idle: usize,
    root: Mutex<Option<Connection>>,
    idle: Mutex<Vec<Connection>>,
}

/// Cloneable handle to the connection pool of one database file.
#[derive(Clone)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
}

impl ConnectionPool {
    /// Create a pool that keeps at most `max_idle` idle connections.
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>, max_idle: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                db_path: db_path.into(),
                max_idle: max_idle.max(1),
                root: Mutex::new(None),
                idle: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Borrow a connection, opening a new one when none is idle.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    ///
    /// # Panics
    /// Panics if the pool mutex is poisoned.
    pub fn acquire(&self) -> Result<PooledConnection, ::duckdb::Error> {
        let reused = self
            .shared
            .idle
            .lock()
            .expect("duckdb pool mutex poisoned")
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => self.open_connection()?,
        };

        Ok(PooledConnection {
            shared: Arc::clone(&self.shared),
            connection: Some(connection),
        })
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.shared.db_path
    }

    fn open_connection(&self) -> Result<Connection, ::duckdb::Error> {
        let mut root = self.shared.root.lock().expect("duckdb pool mutex poisoned");
        let connection = match root.as_ref() {
            Some(root) => root.try_clone()?,
            None => {
                let opened = Connection::open(&self.shared.db_path)?;
                let connection = opened.try_clone()?;
                *root = Some(opened);
                connection
            }
        };
        drop(root);

        connection.execute_batch("PRAGMA disable_progress_bar;")?;
        Ok(connection)
    }
}

/// Connection borrowed from a [`ConnectionPool`]; returned on drop.
pub struct PooledConnection {
    shared: Arc<PoolShared>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection already returned")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let Ok(mut idle) = self.shared.idle.lock() else {
            return;
        };
        if idle.len() < self.shared.max_idle {
            idle.push(connection);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn released_connections_are_reused() {
        let temp = tempdir().expect("tempdir");
        let pool = ConnectionPool::new(temp.path().join("pool.duckdb"), 1);

        {
            let connection = pool.acquire().expect("acquire");
            connection
                .execute_batch("CREATE TEMP TABLE marker (id INTEGER)")
                .expect("create temp table");
        }

        let connection = pool.acquire().expect("reacquire");
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM duckdb_tables() WHERE table_name = 'marker'",
                [],
                |row| row.get(0),
            )
            .expect("count");
        assert_eq!(count, 1, "temp table is only visible on the reused connection");
    }

    #[test]
    fn concurrent_connections_see_each_others_writes() {
        let temp = tempdir().expect("tempdir");
        let pool = ConnectionPool::new(temp.path().join("pool.duckdb"), 2);

        let writer = pool.acquire().expect("writer");
        let reader = pool.acquire().expect("reader");
        writer
            .execute_batch("CREATE TABLE shared_rates (value DOUBLE); INSERT INTO shared_rates VALUES (81.5);")
            .expect("write");

        let value: f64 = reader
            .query_row("SELECT value FROM shared_rates", [], |row| row.get(0))
            .expect("read through second connection");
        assert_eq!(value, 81.5);
    }
}
