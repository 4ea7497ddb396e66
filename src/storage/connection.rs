//! Connection wrapper
//!
//! `Database` owns one SQLite connection and hides statement handles behind a
//! small set of helpers: `query`, `get`, `for_each_row`, `scalar`, `execute`
//! (returning the last row id), `execute_rowcount`, `execute_many`,
//! `transaction` and the manual `begin`/`commit`/`rollback`. Every connection
//! it opens has foreign keys enabled and a busy timeout set; file databases
//! use WAL journaling.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rusqlite::types::FromSql;
use rusqlite::{Connection, Params};

use super::row::Row;
use crate::{Error, Result};

/// Where a `Database` connects to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    File(PathBuf),
    /// Private in-memory database; its contents vanish on reconnect
    Memory,
}

impl Target {
    pub fn is_file(&self) -> bool {
        matches!(self, Target::File(_))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::File(path) => write!(f, "{}", path.display()),
            Target::Memory => write!(f, ":memory:"),
        }
    }
}

/// Per-connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// How long a write waits for a competing writer before failing
    pub busy_timeout: Duration,
    /// Idle time after which the connection is reopened before its next use
    pub max_idle_time: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            max_idle_time: Duration::from_secs(7 * 3600),
        }
    }
}

/// A lightweight wrapper around one SQLite connection
#[derive(Debug)]
pub struct Database {
    target: Target,
    options: ConnectOptions,
    conn: RefCell<Option<Connection>>,
    last_use: Cell<Instant>,
    tx_depth: Cell<usize>,
}

impl Database {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: impl AsRef<Path>, options: ConnectOptions) -> Result<Self> {
        Self::connect(Target::File(path.as_ref().to_path_buf()), options)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory(options: ConnectOptions) -> Result<Self> {
        Self::connect(Target::Memory, options)
    }

    pub fn connect(target: Target, options: ConnectOptions) -> Result<Self> {
        let db = Self {
            target,
            options,
            conn: RefCell::new(None),
            last_use: Cell::new(Instant::now()),
            tx_depth: Cell::new(0),
        };
        db.reconnect()?;
        Ok(db)
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    pub fn is_open(&self) -> bool {
        self.conn.try_borrow().map(|c| c.is_some()).unwrap_or(true)
    }

    /// Closes the existing connection and opens a new one
    pub fn reconnect(&self) -> Result<()> {
        let mut slot = self.conn.try_borrow_mut().map_err(|_| Error::ConnectionInUse)?;
        if let Some(old) = slot.take() {
            if let Err((_, e)) = old.close() {
                tracing::warn!("Error closing connection to {}: {}", self.target, e);
            }
        }

        let conn = open_connection(&self.target, &self.options).map_err(|e| {
            tracing::error!("Cannot connect to database at {}: {}", self.target, e);
            Error::from(e)
        })?;
        *slot = Some(conn);
        self.tx_depth.set(0);
        self.last_use.set(Instant::now());
        Ok(())
    }

    /// Closes this connection. The next query reopens it.
    pub fn close(&self) -> Result<()> {
        let mut slot = self.conn.try_borrow_mut().map_err(|_| Error::ConnectionInUse)?;
        if let Some(conn) = slot.take() {
            conn.close().map_err(|(_, e)| Error::from(e))?;
        }
        self.tx_depth.set(0);
        Ok(())
    }

    /// Check that the connection answers, reconnecting once if it doesn't
    pub fn ping(&self) -> Result<()> {
        match self.scalar::<i64, _>("SELECT 1", []) {
            Ok(_) => Ok(()),
            Err(Error::ConnectionInUse) => Err(Error::ConnectionInUse),
            Err(e) => {
                tracing::warn!("Ping to {} failed ({}), reconnecting", self.target, e);
                self.reconnect()?;
                self.scalar::<i64, _>("SELECT 1", []).map(|_| ())
            }
        }
    }

    /// Returns all rows for the given query and parameters
    pub fn query<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        self.for_each_row(sql, params, |row| {
            rows.push(row);
            Ok(())
        })?;
        Ok(rows)
    }

    /// Returns the single row for the given query, `None` if there is none.
    ///
    /// Fails with [`Error::MultipleRows`] when more than one row matches.
    pub fn get<P: Params>(&self, sql: &str, params: P) -> Result<Option<Row>> {
        let mut found = None;
        self.for_each_row(sql, params, |row| {
            if found.is_some() {
                return Err(Error::MultipleRows);
            }
            found = Some(row);
            Ok(())
        })?;
        Ok(found)
    }

    /// Streams rows to `f` one at a time, stopping at the first error
    pub fn for_each_row<P, F>(&self, sql: &str, params: P, mut f: F) -> Result<()>
    where
        P: Params,
        F: FnMut(Row) -> Result<()>,
    {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let mut rows = stmt.query(params)?;
            while let Some(row) = rows.next()? {
                f(Row::from_sqlite(&columns, row)?)?;
            }
            Ok(())
        })
    }

    /// First column of the single row returned by `sql`
    pub fn scalar<T: FromSql, P: Params>(&self, sql: &str, params: P) -> Result<T> {
        self.with_conn(|conn| {
            conn.query_row(sql, params, |row| row.get(0))
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Error::NotFound(sql.trim().to_string()),
                    other => other.into(),
                })
        })
    }

    /// Executes the given statement, returning the last inserted row id
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<i64> {
        self.with_conn(|conn| {
            conn.prepare_cached(sql)?.execute(params)?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Executes the given statement, returning the number of affected rows
    pub fn execute_rowcount<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.prepare_cached(sql)?.execute(params)?))
    }

    /// Executes `sql` once per parameter set inside one transaction,
    /// returning the total number of affected rows
    pub fn execute_many<P, I>(&self, sql: &str, param_sets: I) -> Result<usize>
    where
        P: Params,
        I: IntoIterator<Item = P>,
    {
        self.transaction(|db| {
            db.with_conn(|conn| {
                let mut stmt = conn.prepare_cached(sql)?;
                let mut total = 0;
                for params in param_sets {
                    total += stmt.execute(params)?;
                }
                Ok(total)
            })
        })
    }

    /// Like [`execute_many`](Self::execute_many), returning the row id of the
    /// last insert instead of a row count
    pub fn execute_many_lastrowid<P, I>(&self, sql: &str, param_sets: I) -> Result<i64>
    where
        P: Params,
        I: IntoIterator<Item = P>,
    {
        self.transaction(|db| {
            db.with_conn(|conn| {
                let mut stmt = conn.prepare_cached(sql)?;
                for params in param_sets {
                    stmt.execute(params)?;
                }
                Ok(conn.last_insert_rowid())
            })
        })
    }

    pub fn insert<P: Params>(&self, sql: &str, params: P) -> Result<i64> {
        self.execute(sql, params)
    }

    pub fn update<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        self.execute_rowcount(sql, params)
    }

    pub fn delete<P: Params>(&self, sql: &str, params: P) -> Result<usize> {
        self.execute_rowcount(sql, params)
    }

    /// Run `f` inside a transaction: commit if it returns `Ok`, roll back and
    /// hand back its error otherwise. Nested calls use savepoints.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T>,
    {
        let depth = self.tx_depth.get();
        let (begin, commit, rollback) = if depth == 0 {
            (
                "BEGIN IMMEDIATE".to_string(),
                "COMMIT".to_string(),
                "ROLLBACK".to_string(),
            )
        } else {
            let name = format!("blogstore_sp{depth}");
            (
                format!("SAVEPOINT {name}"),
                format!("RELEASE {name}"),
                format!("ROLLBACK TO {name}; RELEASE {name}"),
            )
        };

        self.batch(&begin)?;
        self.tx_depth.set(depth + 1);
        let result = f(self);
        self.tx_depth.set(depth);

        let outcome = match result {
            Ok(value) => self.batch(&commit).map(|_| value),
            Err(err) => Err(err),
        };
        if outcome.is_err() {
            if let Err(e) = self.batch(&rollback) {
                tracing::warn!("Rollback on {} failed: {}", self.target, e);
            }
        }
        outcome
    }

    /// Open a transaction by hand; end it with [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback)
    pub fn begin(&self) -> Result<()> {
        if self.tx_depth.get() > 0 {
            return Err(Error::TransactionOpen);
        }
        self.batch("BEGIN IMMEDIATE")?;
        self.tx_depth.set(1);
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        self.batch("COMMIT")?;
        self.tx_depth.set(0);
        Ok(())
    }

    pub fn rollback(&self) -> Result<()> {
        self.batch("ROLLBACK")?;
        self.tx_depth.set(0);
        Ok(())
    }

    /// Whether a transaction is open on this connection
    pub fn in_transaction(&self) -> bool {
        self.tx_depth.get() > 0
    }

    fn batch(&self, sql: &str) -> Result<()> {
        self.with_conn(|conn| Ok(conn.execute_batch(sql)?))
    }

    /// Borrow the live connection, reopening it first when needed
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        self.ensure_connected()?;
        let guard = self.conn.try_borrow().map_err(|_| Error::ConnectionInUse)?;
        let conn = guard.as_ref().ok_or(Error::Closed)?;
        f(conn)
    }

    // Reopens closed connections, and idle file connections outside a transaction.
    fn ensure_connected(&self) -> Result<()> {
        let needs_reconnect = {
            let guard = self.conn.try_borrow().map_err(|_| Error::ConnectionInUse)?;
            match guard.as_ref() {
                None => true,
                Some(conn) => {
                    self.target.is_file()
                        && conn.is_autocommit()
                        && self.last_use.get().elapsed() > self.options.max_idle_time
                }
            }
        };
        if needs_reconnect {
            tracing::debug!("Reopening connection to {}", self.target);
            self.reconnect()?;
        }
        self.last_use.set(Instant::now());
        Ok(())
    }
}

fn open_connection(target: &Target, options: &ConnectOptions) -> rusqlite::Result<Connection> {
    let conn = match target {
        Target::File(path) => Connection::open(path)?,
        Target::Memory => Connection::open_in_memory()?,
    };
    conn.busy_timeout(options.busy_timeout)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    if target.is_file() {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!("Opened {} (journal_mode={})", target, mode);
    }
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::named_params;

    fn memory_db() -> Database {
        let db = Database::open_in_memory(ConnectOptions::default()).unwrap();
        db.execute_rowcount(
            "CREATE TABLE tbl1 (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL UNIQUE)",
            [],
        )
        .unwrap();
        db
    }

    #[test]
    fn test_insert_returns_last_row_id() {
        let db = memory_db();
        assert_eq!(db.insert("INSERT INTO tbl1 (name) VALUES (?1)", ["a"]).unwrap(), 1);
        assert_eq!(db.insert("INSERT INTO tbl1 (name) VALUES (?1)", ["b"]).unwrap(), 2);
    }

    #[test]
    fn test_query_and_named_params() {
        let db = memory_db();
        db.insert("INSERT INTO tbl1 (name) VALUES (:name)", named_params! {":name": "haha"})
            .unwrap();
        let rows = db.query("SELECT id, name FROM tbl1 WHERE name = :name", named_params! {":name": "haha"})
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].columns(), &["id".to_string(), "name".to_string()]);
        assert_eq!(rows[0].get::<String>("name").unwrap(), "haha");
    }

    #[test]
    fn test_get_none_one_many() {
        let db = memory_db();
        assert!(db.get("SELECT * FROM tbl1", []).unwrap().is_none());

        db.insert("INSERT INTO tbl1 (name) VALUES (?1)", ["a"]).unwrap();
        assert!(db.get("SELECT * FROM tbl1", []).unwrap().is_some());

        db.insert("INSERT INTO tbl1 (name) VALUES (?1)", ["b"]).unwrap();
        assert!(matches!(db.get("SELECT * FROM tbl1", []), Err(Error::MultipleRows)));
    }

    #[test]
    fn test_rowcount_helpers() {
        let db = memory_db();
        let inserted = db
            .execute_many("INSERT INTO tbl1 (name) VALUES (?1)", [["a"], ["b"], ["c"]])
            .unwrap();
        assert_eq!(inserted, 3);
        assert_eq!(db.update("UPDATE tbl1 SET name = name || '!'", []).unwrap(), 3);
        assert_eq!(db.delete("DELETE FROM tbl1 WHERE name = ?1", ["a!"]).unwrap(), 1);
        assert_eq!(db.scalar::<i64, _>("SELECT COUNT(*) FROM tbl1", []).unwrap(), 2);
    }

    #[test]
    fn test_execute_many_is_all_or_nothing() {
        let db = memory_db();
        let err = db
            .execute_many("INSERT INTO tbl1 (name) VALUES (?1)", [["a"], ["b"], ["a"]])
            .unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
        assert_eq!(db.scalar::<i64, _>("SELECT COUNT(*) FROM tbl1", []).unwrap(), 0);
    }

    #[test]
    fn test_execute_many_lastrowid() {
        let db = memory_db();
        db.insert("INSERT INTO tbl1 (name) VALUES (?1)", ["first"]).unwrap();
        let last = db
            .execute_many_lastrowid("INSERT INTO tbl1 (name) VALUES (?1)", [["a"], ["b"], ["c"]])
            .unwrap();
        assert_eq!(last, 4);
    }

    #[test]
    fn test_manual_begin_commit_rollback() {
        let db = memory_db();

        db.begin().unwrap();
        assert!(db.in_transaction());
        assert!(matches!(db.begin(), Err(Error::TransactionOpen)));
        db.insert("INSERT INTO tbl1 (name) VALUES (?1)", ["dropped"]).unwrap();
        db.rollback().unwrap();
        assert!(!db.in_transaction());

        db.begin().unwrap();
        db.insert("INSERT INTO tbl1 (name) VALUES (?1)", ["kept"]).unwrap();
        // a nested helper call becomes a savepoint inside the open transaction
        let inner: Result<()> = db.transaction(|tx| {
            tx.insert("INSERT INTO tbl1 (name) VALUES (?1)", ["inner"])?;
            Err(Error::NotFound("forced".into()))
        });
        assert!(inner.is_err());
        db.commit().unwrap();

        let names: Vec<String> = db
            .query("SELECT name FROM tbl1 ORDER BY id", [])
            .unwrap()
            .iter()
            .map(|r| r.get("name").unwrap())
            .collect();
        assert_eq!(names, vec!["kept"]);
    }

    #[test]
    fn test_transaction_commit_and_rollback() {
        let db = memory_db();
        db.transaction(|tx| tx.insert("INSERT INTO tbl1 (name) VALUES (?1)", ["kept"]))
            .unwrap();

        let result: Result<()> = db.transaction(|tx| {
            tx.insert("INSERT INTO tbl1 (name) VALUES (?1)", ["dropped"])?;
            Err(Error::NotFound("forced".into()))
        });
        assert!(matches!(result, Err(Error::NotFound(_))));

        let names: Vec<String> = db
            .query("SELECT name FROM tbl1", [])
            .unwrap()
            .iter()
            .map(|r| r.get("name").unwrap())
            .collect();
        assert_eq!(names, vec!["kept"]);
    }

    #[test]
    fn test_nested_transaction_rolls_back_inner_only() {
        let db = memory_db();
        db.transaction(|tx| {
            tx.insert("INSERT INTO tbl1 (name) VALUES (?1)", ["outer"])?;
            let inner: Result<()> = tx.transaction(|inner| {
                inner.insert("INSERT INTO tbl1 (name) VALUES (?1)", ["inner"])?;
                Err(Error::NotFound("forced".into()))
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();
        assert_eq!(db.scalar::<i64, _>("SELECT COUNT(*) FROM tbl1", []).unwrap(), 1);
    }

    #[test]
    fn test_for_each_row_streams_and_stops_on_error() {
        let db = memory_db();
        db.execute_many("INSERT INTO tbl1 (name) VALUES (?1)", [["a"], ["b"], ["c"]])
            .unwrap();
        let mut seen = Vec::new();
        let result = db.for_each_row("SELECT name FROM tbl1 ORDER BY id", [], |row| {
            let name: String = row.get("name")?;
            if name == "b" {
                return Err(Error::NotFound("stop".into()));
            }
            seen.push(name);
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(seen, vec!["a"]);
    }

    #[test]
    fn test_close_and_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(&path, ConnectOptions::default()).unwrap();
        db.execute_rowcount("CREATE TABLE t (x INTEGER)", []).unwrap();
        db.insert("INSERT INTO t (x) VALUES (1)", []).unwrap();

        db.close().unwrap();
        assert!(!db.is_open());

        // next use reconnects transparently
        assert_eq!(db.scalar::<i64, _>("SELECT x FROM t", []).unwrap(), 1);
        assert!(db.is_open());
        db.ping().unwrap();
    }

    #[test]
    fn test_idle_connection_is_reopened() {
        let dir = tempfile::tempdir().unwrap();
        let options = ConnectOptions {
            max_idle_time: Duration::from_millis(0),
            ..ConnectOptions::default()
        };
        let db = Database::open(dir.path().join("idle.db"), options).unwrap();
        db.execute_rowcount("CREATE TABLE t (x INTEGER)", []).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(db.scalar::<i64, _>("SELECT COUNT(*) FROM t", []).unwrap(), 0);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let db = Database::open_in_memory(ConnectOptions::default()).unwrap();
        assert_eq!(db.scalar::<i64, _>("PRAGMA foreign_keys", []).unwrap(), 1);
    }
}
