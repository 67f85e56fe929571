use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::{CachedStatement, Connection};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StoreMetricsSnapshot {
    pub prepare_count: u64,
    pub execute_count: u64,
    pub select_count: u64,
    pub tx_begin_count: u64,
    pub tx_commit_count: u64,
    pub tx_rollback_count: u64,
}

#[derive(Default)]
pub struct StoreMetrics {
    prepares: AtomicU64,
    executes: AtomicU64,
    selects: AtomicU64,
    tx_begin: AtomicU64,
    tx_commit: AtomicU64,
    tx_rollback: AtomicU64,
}

impl StoreMetrics {
    pub fn snapshot(&self) -> StoreMetricsSnapshot {
        StoreMetricsSnapshot {
            prepare_count: self.prepares.load(Ordering::Relaxed),
            execute_count: self.executes.load(Ordering::Relaxed),
            select_count: self.selects.load(Ordering::Relaxed),
            tx_begin_count: self.tx_begin.load(Ordering::Relaxed),
            tx_commit_count: self.tx_commit.load(Ordering::Relaxed),
            tx_rollback_count: self.tx_rollback.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.prepares.store(0, Ordering::Relaxed);
        self.executes.store(0, Ordering::Relaxed);
        self.selects.store(0, Ordering::Relaxed);
        self.tx_begin.store(0, Ordering::Relaxed);
        self.tx_commit.store(0, Ordering::Relaxed);
        self.tx_rollback.store(0, Ordering::Relaxed);
    }

    pub fn record_prepare(&self) {
        self.prepares.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_execute(&self, sql: &str) {
        self.executes.fetch_add(1, Ordering::Relaxed);
        let Some(keyword) = leading_keyword(sql) else {
            return;
        };
        let counter = if keyword.eq_ignore_ascii_case("SELECT")
            || keyword.eq_ignore_ascii_case("WITH")
        {
            &self.selects
        } else if keyword.eq_ignore_ascii_case("BEGIN") {
            &self.tx_begin
        } else if keyword.eq_ignore_ascii_case("COMMIT") {
            &self.tx_commit
        } else if keyword.eq_ignore_ascii_case("ROLLBACK") {
            &self.tx_rollback
        } else {
            return;
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Connection wrapper that counts every statement it runs.
#[derive(Copy, Clone)]
pub struct InstrumentedConnection<'a> {
    conn: &'a Connection,
    metrics: &'a StoreMetrics,
}

impl<'a> InstrumentedConnection<'a> {
    pub fn new(conn: &'a Connection, metrics: &'a StoreMetrics) -> Self {
        Self { conn, metrics }
    }

    pub fn execute<P>(&self, sql: &str, params: P) -> Result<usize, rusqlite::Error>
    where
        P: rusqlite::Params,
    {
        self.metrics.record_execute(sql);
        self.conn.execute(sql, params)
    }

    pub fn execute_batch(&self, sql: &str) -> Result<(), rusqlite::Error> {
        self.metrics.record_execute(sql);
        self.conn.execute_batch(sql)
    }

    pub fn prepare_cached<'b>(
        &'b self,
        sql: &str,
    ) -> Result<InstrumentedStatement<'b>, rusqlite::Error> {
        self.metrics.record_prepare();
        Ok(InstrumentedStatement {
            stmt: self.conn.prepare_cached(sql)?,
            metrics: self.metrics,
            sql: sql.to_string(),
        })
    }

    pub fn query_row<P, F, R>(&self, sql: &str, params: P, f: F) -> Result<R, rusqlite::Error>
    where
        P: rusqlite::Params,
        F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<R>,
    {
        self.metrics.record_prepare();
        self.metrics.record_execute(sql);
        self.conn.query_row(sql, params, f)
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    pub fn busy_timeout(&self, timeout: std::time::Duration) -> Result<(), rusqlite::Error> {
        self.conn.busy_timeout(timeout)
    }
}

pub struct InstrumentedStatement<'conn> {
    stmt: CachedStatement<'conn>,
    metrics: &'conn StoreMetrics,
    sql: String,
}

impl InstrumentedStatement<'_> {
    pub fn query_map<P, F, T>(
        &mut self,
        params: P,
        f: F,
    ) -> Result<rusqlite::MappedRows<'_, F>, rusqlite::Error>
    where
        P: rusqlite::Params,
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        self.metrics.record_execute(self.sql.as_str());
        self.stmt.query_map(params, f)
    }
}

fn leading_keyword(sql: &str) -> Option<&str> {
    let trimmed = sql.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    let end = trimmed
        .find(|c: char| c.is_ascii_whitespace() || c == ';')
        .unwrap_or(trimmed.len());
    Some(&trimmed[..end])
}
