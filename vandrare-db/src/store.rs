use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::error::StoreError;
use crate::migrations;
use vandrare_common::helpers::fs::secure_directory;

/// A point-in-time clock stamp shared by every write issued within one
/// `Ops` — mirrors the Go `txclock{ts, trid}` pair so that rows written in
/// the same transaction carry the same `clk_updated_at_unixms`/`clk_trid`.
#[derive(Clone, Copy, Debug)]
pub struct TxClock {
    pub ts_unixms: i64,
    pub trid: i64,
}

pub struct Store {
    pool: SqlitePool,
    trid: AtomicI64,
}

impl Store {
    /// Open (or create) the on-disk store under `dir/db/main.sqlite`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        let db_dir = dir.join("db");
        tokio::fs::create_dir_all(&db_dir).await?;
        secure_directory(&db_dir)?;
        let main_file = db_dir.join("main.sqlite");

        let options = SqliteConnectOptions::new()
            .filename(&main_file)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool, trid: AtomicI64::new(0) };
        migrations::run(&store.pool).await?;
        if main_file.exists() {
            vandrare_common::helpers::fs::secure_file(&main_file)?;
        }
        Ok(store)
    }

    /// Open an ephemeral in-memory store, used by tests.
    pub async fn open_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool, trid: AtomicI64::new(0) };
        migrations::run(&store.pool).await?;
        Ok(store)
    }

    /// Begin a new transaction-scoped handle. `autocommit` controls whether
    /// `Ops::close` commits (when no fault was recorded) or rolls back.
    pub async fn ops(&self, autocommit: bool) -> Result<Ops, StoreError> {
        let tx = self.pool.begin().await?;
        let trid = self.trid.fetch_add(1, Ordering::SeqCst);
        let ts_unixms = time_now_unixms();
        Ok(Ops {
            tx: Some(tx),
            err: None,
            autocommit,
            closed: false,
            clock: TxClock { ts_unixms, trid },
        })
    }
}

fn time_now_unixms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A transaction-scoped handle. Mirrors the Go `ops` struct: a fault slot
/// that, once set, short-circuits every subsequent write, and an
/// `autocommit` flag that decides what `close` does.
pub struct Ops {
    pub(crate) tx: Option<Transaction<'static, Sqlite>>,
    err: Option<StoreError>,
    autocommit: bool,
    closed: bool,
    pub(crate) clock: TxClock,
}

impl Ops {
    pub fn err(&self) -> Option<&StoreError> {
        self.err.as_ref()
    }

    /// Record a fault. Once set, it is never overwritten by a later error —
    /// the first failure wins, matching the Go `Fail` semantics.
    pub fn fail(&mut self, err: StoreError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    pub(crate) fn tx_mut(&mut self) -> Result<&mut Transaction<'static, Sqlite>, StoreError> {
        if let Some(e) = &self.err {
            return Err(StoreError::Failed(e.to_string()));
        }
        self.tx.as_mut().ok_or(StoreError::NotFound)
    }

    pub fn kv(&mut self) -> crate::kv::KvOps<'_> {
        crate::kv::KvOps::new(self)
    }

    pub fn tokens(&mut self) -> crate::tokens::TokenOps<'_> {
        crate::tokens::TokenOps::new(self)
    }

    pub fn keydb(&mut self) -> crate::keydb::KeyDbOps<'_> {
        crate::keydb::KeyDbOps::new(self)
    }

    pub async fn commit(mut self) -> Result<(), StoreError> {
        self.closed = true;
        if let Some(err) = self.err.take() {
            if let Some(tx) = self.tx.take() {
                let _ = tx.rollback().await;
            }
            return Err(err);
        }
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<(), StoreError> {
        self.closed = true;
        let err = self.err.take();
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        if let Some(err) = err {
            return Err(err);
        }
        Ok(())
    }

    /// Close the handle: commits iff `autocommit` and no fault was
    /// recorded, otherwise rolls back. Matches the Go `ops.Close` switch.
    pub async fn close(self) -> Result<(), StoreError> {
        if self.err.is_none() && self.autocommit {
            self.commit().await
        } else {
            self.rollback().await
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn open_memory_runs_migrations() {
        let store = Store::open_memory().await.expect("open");
        let ops = store.ops(true).await.expect("ops");
        ops.close().await.expect("close");
    }

    #[tokio::test]
    async fn fail_short_circuits_close_to_rollback() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        ops.fail(StoreError::NotFound);
        assert!(ops.close().await.is_err());
    }
}
