use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rusqlite::types::ValueRef;

use crate::error::{Error, Result};
use crate::table::{Cell, Table};

/// The query-execution collaborator: hand it SQL text, get a [`Table`] back.
///
/// The metric computation layer never talks to a database directly — it only
/// ever sees already-fetched tables — so anything that can produce a table
/// (a local snapshot, a remote warehouse client, a test fixture) plugs in
/// here.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run_query(&self, sql: &str) -> Result<Table>;
}

/// A local SQLite warehouse snapshot.
///
/// Wraps two `tokio_rusqlite::Connection` instances (writer + reader) using
/// WAL mode for concurrent access. The writer serializes writes via
/// `tokio_rusqlite`'s internal channel; the reader can proceed without
/// blocking.
#[derive(Clone)]
pub struct Warehouse {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
}

impl Warehouse {
    /// Open the warehouse at the default path (`~/.shopmetrics/shopmetrics.db`).
    pub async fn open() -> Result<Self> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".shopmetrics");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Self::open_at(dir.join("shopmetrics.db")).await
    }

    /// Open the warehouse at the given path.
    pub async fn open_at(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let writer = tokio_rusqlite::Connection::open(&path).await?;
        Self::init(&writer).await?;

        let reader = tokio_rusqlite::Connection::open(&path).await?;
        Self::init(&reader).await?;

        Ok(Self { writer, reader })
    }

    /// Open an in-memory warehouse (for testing).
    pub async fn open_memory() -> Result<Self> {
        let writer = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init(&writer).await?;

        // In-memory databases are per-connection, so reader and writer share.
        Ok(Self {
            reader: writer.clone(),
            writer,
        })
    }

    async fn init(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;",
            )?;
            Ok::<(), rusqlite::Error>(())
        })
        .await?;
        Ok(())
    }

    /// Run DDL/DML statements — loading or refreshing a snapshot.
    pub async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.writer
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

#[async_trait]
impl QueryRunner for Warehouse {
    async fn run_query(&self, sql: &str) -> Result<Table> {
        let sql = sql.to_string();
        self.reader
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> =
                    stmt.column_names().iter().map(|c| c.to_string()).collect();
                let width = columns.len();
                let mut table = Table::new(columns);

                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    let mut cells = Vec::with_capacity(width);
                    for i in 0..width {
                        cells.push(match row.get_ref(i)? {
                            ValueRef::Null => Cell::Null,
                            ValueRef::Integer(v) => Cell::Number(v as f64),
                            ValueRef::Real(v) => Cell::Number(v),
                            ValueRef::Text(t) => {
                                Cell::Text(String::from_utf8_lossy(t).into_owned())
                            }
                            ValueRef::Blob(_) => Cell::Null,
                        });
                    }
                    table.push_row(cells);
                }
                Ok::<Table, rusqlite::Error>(table)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

/// Wraps any runner with a time-boxed result cache.
///
/// Dashboard views re-run the same query text on every render; a short TTL
/// (default one hour) keeps the warehouse round-trips down. Caching is a
/// caller policy, not part of the metric computation.
pub struct CachedRunner<R> {
    inner: R,
    ttl: Duration,
    cache: Mutex<HashMap<String, (Instant, Table)>>,
}

impl<R> CachedRunner<R> {
    pub fn new(inner: R) -> Self {
        Self::with_ttl(inner, Duration::from_secs(3600))
    }

    pub fn with_ttl(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn clear(&self) {
        self.cache.lock().unwrap().clear();
    }
}

#[async_trait]
impl<R: QueryRunner> QueryRunner for CachedRunner<R> {
    async fn run_query(&self, sql: &str) -> Result<Table> {
        if let Some((fetched_at, table)) = self.cache.lock().unwrap().get(sql) {
            if fetched_at.elapsed() < self.ttl {
                return Ok(table.clone());
            }
        }

        let table = self.inner.run_query(sql).await?;
        self.cache
            .lock()
            .unwrap()
            .insert(sql.to_string(), (Instant::now(), table.clone()));
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn seeded() -> Warehouse {
        let wh = Warehouse::open_memory().await.unwrap();
        wh.execute_batch(
            "CREATE TABLE weekly_installs (week TEXT, installs INTEGER, revenue REAL, note TEXT);
             INSERT INTO weekly_installs VALUES ('2024-01-01', 100, 12.5, 'ok');
             INSERT INTO weekly_installs VALUES ('2024-01-08', 140, NULL, NULL);",
        )
        .await
        .unwrap();
        wh
    }

    #[tokio::test]
    async fn test_run_query_maps_sqlite_types() {
        let wh = seeded().await;
        let t = wh
            .run_query("SELECT week, installs, revenue, note FROM weekly_installs ORDER BY week")
            .await
            .unwrap();

        assert_eq!(t.columns(), &["week", "installs", "revenue", "note"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.cell(0, 0), &Cell::Text("2024-01-01".into()));
        assert_eq!(t.cell(0, 1), &Cell::Number(100.0));
        assert_eq!(t.cell(0, 2), &Cell::Number(12.5));
        assert_eq!(t.cell(1, 2), &Cell::Null);
        assert_eq!(t.cell(1, 3), &Cell::Null);
    }

    #[tokio::test]
    async fn test_run_query_empty_result() {
        let wh = seeded().await;
        let t = wh
            .run_query("SELECT week FROM weekly_installs WHERE installs > 999")
            .await
            .unwrap();
        assert!(t.is_empty());
        assert_eq!(t.columns(), &["week"]);
    }

    #[tokio::test]
    async fn test_run_query_bad_sql_is_error() {
        let wh = seeded().await;
        assert!(wh.run_query("SELECT FROM nothing").await.is_err());
    }

    #[tokio::test]
    async fn test_open_at_file() {
        let dir = tempfile::tempdir().unwrap();
        let wh = Warehouse::open_at(dir.path().join("test.db")).await.unwrap();
        wh.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")
            .await
            .unwrap();
        let t = wh.run_query("SELECT x FROM t").await.unwrap();
        assert_eq!(t.cell(0, 0), &Cell::Number(1.0));
    }

    struct CountingRunner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueryRunner for CountingRunner {
        async fn run_query(&self, _sql: &str) -> Result<Table> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Table::from_rows(&["x"], vec![vec![Cell::from(1.0)]]))
        }
    }

    #[tokio::test]
    async fn test_cached_runner_hits_inner_once() {
        let runner = CachedRunner::new(CountingRunner {
            calls: AtomicUsize::new(0),
        });
        runner.run_query("SELECT 1").await.unwrap();
        runner.run_query("SELECT 1").await.unwrap();
        assert_eq!(runner.inner.calls.load(Ordering::SeqCst), 1);

        // a different query text is its own cache entry
        runner.run_query("SELECT 2").await.unwrap();
        assert_eq!(runner.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cached_runner_ttl_expiry() {
        let runner = CachedRunner::with_ttl(
            CountingRunner {
                calls: AtomicUsize::new(0),
            },
            Duration::from_secs(0),
        );
        runner.run_query("SELECT 1").await.unwrap();
        runner.run_query("SELECT 1").await.unwrap();
        assert_eq!(runner.inner.calls.load(Ordering::SeqCst), 2);
    }
}
