//! Bounded connection pool
//!
//! Idle connections sit in a bounded crossbeam channel. `get()` never waits;
//! an empty pool is reported as exhausted. Checked-out connections return to
//! the pool when their [`PooledConnection`] guard drops.

use std::ops::Deref;
use std::sync::Mutex;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};

use super::connection::{ConnectOptions, Database, Target};
use crate::{Error, Result};

/// Upper bound on connections managed by one pool
pub const MAX_POOL_SIZE: usize = 32;

/// A fixed-size pool of [`Database`] connections to one target
#[derive(Debug)]
pub struct Pool {
    target: Target,
    options: ConnectOptions,
    size: usize,
    idle_tx: Sender<Database>,
    idle_rx: Receiver<Database>,
    // serializes refills against dispose so the queue bound is never raced
    refill: Mutex<()>,
}

impl Pool {
    /// Validate the configuration with a probe connection, then open `size`
    /// connections.
    pub fn new(size: usize, target: Target, options: ConnectOptions) -> Result<Self> {
        if size == 0 || size > MAX_POOL_SIZE {
            return Err(Error::Pool(format!(
                "pool size should be higher than 0 and lower or equal to {MAX_POOL_SIZE}"
            )));
        }
        if target == Target::Memory && size > 1 {
            return Err(Error::Pool(
                "in-memory databases are private to one connection; use size 1".to_string(),
            ));
        }

        let probe = Database::connect(target.clone(), options.clone())
            .and_then(|db| db.ping().map(|_| db))
            .map_err(|e| Error::Pool(format!("connection configuration not valid: {e}")))?;

        let (idle_tx, idle_rx) = channel::bounded(size);
        let pool = Self {
            target,
            options,
            size,
            idle_tx,
            idle_rx,
            refill: Mutex::new(()),
        };

        pool.add_connection(Some(probe))?;
        for _ in 1..size {
            pool.add_connection(None)?;
        }
        tracing::debug!("Pool ready: {} connections to {}", size, pool.target);
        Ok(pool)
    }

    /// Number of connections managed by the pool
    pub fn size(&self) -> usize {
        self.size
    }

    /// Connections currently waiting in the pool
    pub fn idle_count(&self) -> usize {
        self.idle_rx.len()
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Take a connection without waiting
    pub fn get(&self) -> Result<PooledConnection<'_>> {
        match self.idle_rx.try_recv() {
            Ok(db) => Ok(PooledConnection::new(self, db)),
            Err(TryRecvError::Empty) => Err(Error::Pool(
                "failed getting connection; pool exhausted".to_string(),
            )),
            Err(TryRecvError::Disconnected) => Err(Error::Pool("pool is closed".to_string())),
        }
    }

    /// Take a connection, waiting up to `timeout` for one to be returned
    pub fn get_timeout(&self, timeout: Duration) -> Result<PooledConnection<'_>> {
        match self.idle_rx.recv_timeout(timeout) {
            Ok(db) => Ok(PooledConnection::new(self, db)),
            Err(RecvTimeoutError::Timeout) => Err(Error::Pool(format!(
                "no connection returned within {timeout:?}"
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Pool("pool is closed".to_string())),
        }
    }

    /// Put a connection into the pool, opening a new one when `db` is `None`.
    ///
    /// Fails when the pool already holds `size` idle connections or `db`
    /// points at a different database.
    pub fn add_connection(&self, db: Option<Database>) -> Result<()> {
        let _guard = self.refill.lock().map_err(|_| Error::Pool("pool lock poisoned".to_string()))?;
        if self.idle_tx.is_full() {
            return Err(Error::Pool("failed adding connection; queue is full".to_string()));
        }

        let db = match db {
            Some(db) if db.target() != &self.target => {
                return Err(Error::Pool(format!(
                    "connection targets {} but pool targets {}",
                    db.target(),
                    self.target
                )));
            }
            Some(db) => db,
            None => Database::connect(self.target.clone(), self.options.clone())?,
        };

        self.idle_tx.try_send(db).map_err(|e| match e {
            TrySendError::Full(_) => Error::Pool("failed adding connection; queue is full".to_string()),
            TrySendError::Disconnected(_) => Error::Pool("pool is closed".to_string()),
        })
    }

    /// Close every idle connection, returning how many were closed
    pub fn dispose(&self) -> usize {
        let _guard = self.refill.lock();
        let mut closed = 0;
        while let Ok(db) = self.idle_rx.try_recv() {
            if let Err(e) = db.close() {
                tracing::warn!("Error closing pooled connection to {}: {}", self.target, e);
            }
            closed += 1;
        }
        tracing::debug!("Disposed {} pooled connections to {}", closed, self.target);
        closed
    }

    fn give_back(&self, db: Database) {
        if let Err(TrySendError::Full(db) | TrySendError::Disconnected(db)) = self.idle_tx.try_send(db) {
            tracing::warn!("Pool for {} is full; closing returned connection", self.target);
            if let Err(e) = db.close() {
                tracing::warn!("Error closing connection to {}: {}", self.target, e);
            }
        }
    }
}

/// A connection checked out of a [`Pool`]; returns itself on drop
#[derive(Debug)]
pub struct PooledConnection<'a> {
    pool: &'a Pool,
    db: Option<Database>,
}

impl<'a> PooledConnection<'a> {
    fn new(pool: &'a Pool, db: Database) -> Self {
        Self { pool, db: Some(db) }
    }

    /// Remove the connection from the pool for good
    pub fn detach(mut self) -> Database {
        // `db` is only taken here and in Drop, which runs after this
        self.db.take().unwrap_or_else(|| unreachable!("pooled connection already detached"))
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Database;

    fn deref(&self) -> &Database {
        self.db
            .as_ref()
            .unwrap_or_else(|| unreachable!("pooled connection already detached"))
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(db) = self.db.take() {
            self.pool.give_back(db);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn file_target(dir: &tempfile::TempDir) -> Target {
        Target::File(dir.path().join("pool.db"))
    }

    #[test]
    fn test_size_bounds() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Pool::new(0, file_target(&dir), ConnectOptions::default()),
            Err(Error::Pool(_))
        ));
        assert!(matches!(
            Pool::new(MAX_POOL_SIZE + 1, file_target(&dir), ConnectOptions::default()),
            Err(Error::Pool(_))
        ));
        let pool = Pool::new(MAX_POOL_SIZE, file_target(&dir), ConnectOptions::default()).unwrap();
        assert_eq!(pool.idle_count(), MAX_POOL_SIZE);
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let target = Target::File(dir.path().join("missing").join("nested").join("x.db"));
        let err = Pool::new(2, target, ConnectOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Pool(msg) if msg.contains("not valid")));
    }

    #[test]
    fn test_exhaustion_and_return_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Pool::new(2, file_target(&dir), ConnectOptions::default()).unwrap();

        let a = pool.get().unwrap();
        let b = pool.get().unwrap();
        assert!(matches!(pool.get(), Err(Error::Pool(msg)) if msg.contains("exhausted")));
        assert!(pool.get_timeout(Duration::from_millis(10)).is_err());

        drop(a);
        assert_eq!(pool.idle_count(), 1);
        let again = pool.get().unwrap();
        again.ping().unwrap();
        drop(b);
        drop(again);
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn test_detach_and_refill() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Pool::new(1, file_target(&dir), ConnectOptions::default()).unwrap();

        let db = pool.get().unwrap().detach();
        assert_eq!(pool.idle_count(), 0);

        pool.add_connection(Some(db)).unwrap();
        assert!(matches!(pool.add_connection(None), Err(Error::Pool(msg)) if msg.contains("full")));
    }

    #[test]
    fn test_foreign_connection_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Pool::new(1, file_target(&dir), ConnectOptions::default()).unwrap();
        let _held = pool.get().unwrap();
        let other = Database::open(dir.path().join("other.db"), ConnectOptions::default()).unwrap();
        assert!(matches!(pool.add_connection(Some(other)), Err(Error::Pool(_))));
    }

    #[test]
    fn test_dispose_closes_idle() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Pool::new(3, file_target(&dir), ConnectOptions::default()).unwrap();
        let held = pool.get().unwrap();
        assert_eq!(pool.dispose(), 2);
        assert_eq!(pool.idle_count(), 0);
        drop(held);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(Pool::new(4, file_target(&dir), ConnectOptions::default()).unwrap());
        pool.get()
            .unwrap()
            .execute_rowcount("CREATE TABLE hits (n INTEGER)", [])
            .unwrap();

        let done = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let pool = Arc::clone(&pool);
                let done = Arc::clone(&done);
                std::thread::spawn(move || {
                    let db = pool.get_timeout(Duration::from_secs(5)).unwrap();
                    db.insert("INSERT INTO hits (n) VALUES (?1)", [n]).unwrap();
                    done.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(done.load(Ordering::SeqCst), 4);
        let db = pool.get().unwrap();
        assert_eq!(db.scalar::<i64, _>("SELECT COUNT(*) FROM hits", []).unwrap(), 4);
    }
}
