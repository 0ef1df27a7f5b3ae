//! SQLite implementation of the SyncService trait.
//!
//! This backend lets separately started processes on one host rendezvous
//! through a shared database file. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.
//!
//! SQLite has no change notification across processes, so barriers and
//! subscriptions poll at [`SqliteSyncConfig::poll_interval`].

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tokio::sync::mpsc;

use rendezvous_core::ParticipantKey;

use crate::error::{Result, SyncServiceError};
use crate::migration::{self, now_millis};
use crate::subscription::{Subscription, SUBSCRIPTION_BUFFER};
use crate::traits::SyncService;

/// Configuration for the SQLite backend.
#[derive(Debug, Clone)]
pub struct SqliteSyncConfig {
    /// Namespace for every row; instances of one run must agree on it.
    pub run_id: String,
    /// How often barriers and subscriptions re-check the database.
    pub poll_interval: Duration,
    /// How long a statement waits on a lock held by another process.
    pub busy_timeout: Duration,
}

impl Default for SqliteSyncConfig {
    fn default() -> Self {
        Self {
            run_id: "local".to_string(),
            poll_interval: Duration::from_millis(50),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// SQLite-based sync backend.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteSyncService {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
    config: SqliteSyncConfig,
}

impl SqliteSyncService {
    /// Open (or create) a database file shared by the cohort.
    pub fn open(path: impl AsRef<Path>, config: SqliteSyncConfig) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(config.busy_timeout)?;
        // WAL lets pollers read while another process writes.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Open an in-memory database.
    ///
    /// Only useful within one process, mostly for tests.
    pub fn open_memory(config: SqliteSyncConfig) -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// The active configuration.
    pub fn config(&self) -> &SqliteSyncConfig {
        &self.config
    }

    /// Delete every signal and topic entry of this backend's run.
    pub async fn purge_run(&self) -> Result<()> {
        let run = self.config.run_id.clone();
        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute("DELETE FROM signals WHERE run = ?1", params![run])?;
            tx.execute("DELETE FROM topic_entries WHERE run = ?1", params![run])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Run a closure against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = lock_conn(&conn)?;
            f(&mut *conn)
        })
        .await?
    }
}

fn lock_conn(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| SyncServiceError::Unavailable(format!("mutex poisoned: {}", e)))
}

fn count_signals(conn: &Connection, run: &str, state: &str) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM signals WHERE run = ?1 AND state = ?2",
        params![run, state],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

fn entries_after(
    conn: &Connection,
    run: &str,
    topic: &str,
    after: i64,
) -> Result<Vec<(i64, Vec<u8>)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT position, payload FROM topic_entries
         WHERE run = ?1 AND topic = ?2 AND position > ?3
         ORDER BY position",
    )?;
    let rows = stmt
        .query_map(params![run, topic, after], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[async_trait]
impl SyncService for SqliteSyncService {
    async fn signal_entry(&self, participant: &ParticipantKey, state: &str) -> Result<u64> {
        let run = self.config.run_id.clone();
        let state = state.to_string();
        let participant = *participant;

        let position = self
            .blocking(move |conn| {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

                let existing: Option<i64> = tx
                    .query_row(
                        "SELECT position FROM signals
                         WHERE run = ?1 AND state = ?2 AND participant = ?3",
                        params![run, state, participant.0.as_slice()],
                        |row| row.get(0),
                    )
                    .optional()?;

                if let Some(position) = existing {
                    return Ok(position as u64);
                }

                let position = count_signals(&tx, &run, &state)? + 1;
                tx.execute(
                    "INSERT INTO signals (run, state, participant, position, signaled_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        run,
                        state,
                        participant.0.as_slice(),
                        position as i64,
                        now_millis()
                    ],
                )?;
                tx.commit()?;

                Ok(position)
            })
            .await?;

        tracing::debug!(position, "signal entry");
        Ok(position)
    }

    async fn signal_count(&self, state: &str) -> Result<u64> {
        let run = self.config.run_id.clone();
        let state = state.to_string();
        self.blocking(move |conn| count_signals(conn, &run, &state))
            .await
    }

    async fn barrier(&self, state: &str, target: u64) -> Result<()> {
        loop {
            let count = self.signal_count(state).await?;
            if count >= target {
                tracing::debug!(state, target, "barrier released");
                return Ok(());
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<u64> {
        let run = self.config.run_id.clone();
        let topic = topic.to_string();

        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let last: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position), 0) FROM topic_entries
                 WHERE run = ?1 AND topic = ?2",
                params![run, topic],
                |row| row.get(0),
            )?;
            let position = last + 1;

            tx.execute(
                "INSERT INTO topic_entries (run, topic, position, payload, published_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![run, topic, position, payload.as_ref(), now_millis()],
            )?;
            tx.commit()?;

            tracing::debug!(topic = %topic, position, "published");
            Ok(position as u64)
        })
        .await
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let conn = Arc::clone(&self.conn);
        let run = self.config.run_id.clone();
        let topic_name = topic.to_string();
        let poll_interval = self.config.poll_interval;

        let task = tokio::spawn(async move {
            let mut cursor: i64 = 0;

            loop {
                let batch = {
                    let conn = Arc::clone(&conn);
                    let run = run.clone();
                    let topic = topic_name.clone();
                    tokio::task::spawn_blocking(move || {
                        let conn = lock_conn(&conn)?;
                        entries_after(&conn, &run, &topic, cursor)
                    })
                    .await
                    .map_err(SyncServiceError::from)
                    .and_then(|r| r)
                };

                match batch {
                    Ok(rows) if rows.is_empty() => tokio::time::sleep(poll_interval).await,
                    Ok(rows) => {
                        for (position, payload) in rows {
                            cursor = position;
                            if tx.send(Ok(Bytes::from(payload))).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        Ok(Subscription::new(topic, rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::SyncServiceExt;

    fn fast_config() -> SqliteSyncConfig {
        SqliteSyncConfig {
            poll_interval: Duration::from_millis(5),
            ..SqliteSyncConfig::default()
        }
    }

    #[tokio::test]
    async fn test_signal_positions_and_idempotence() {
        let backend = SqliteSyncService::open_memory(fast_config()).unwrap();
        let a = ParticipantKey::random();
        let b = ParticipantKey::random();

        assert_eq!(backend.signal_entry(&a, "enrolled").await.unwrap(), 1);
        assert_eq!(backend.signal_entry(&b, "enrolled").await.unwrap(), 2);
        assert_eq!(backend.signal_entry(&a, "enrolled").await.unwrap(), 1);
        assert_eq!(backend.signal_count("enrolled").await.unwrap(), 2);
        assert_eq!(backend.signal_count("done").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_barrier_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.db");

        let first = Arc::new(SqliteSyncService::open(&path, fast_config()).unwrap());
        let second = SqliteSyncService::open(&path, fast_config()).unwrap();

        let waiter = {
            let first = Arc::clone(&first);
            tokio::spawn(async move {
                first
                    .signal_and_wait(&ParticipantKey::random(), "nodeCreated", 2)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!waiter.is_finished());

        let position = second
            .signal_and_wait(&ParticipantKey::random(), "nodeCreated", 2)
            .await
            .unwrap();

        let first_position = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("barrier should release")
            .unwrap()
            .unwrap();

        let mut positions = vec![first_position, position];
        positions.sort();
        assert_eq!(positions, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_subscription_sees_earlier_and_later_publishes() {
        let backend = SqliteSyncService::open_memory(fast_config()).unwrap();
        assert_eq!(
            backend.publish("bootstrap", Bytes::from_static(b"a")).await.unwrap(),
            1
        );

        let mut sub = backend.subscribe("bootstrap").await.unwrap();
        assert_eq!(sub.recv().await.unwrap(), Bytes::from_static(b"a"));

        backend
            .publish("bootstrap", Bytes::from_static(b"b"))
            .await
            .unwrap();
        assert_eq!(sub.recv().await.unwrap(), Bytes::from_static(b"b"));
        sub.cancel().await;
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.db");

        let run_a = SqliteSyncService::open(
            &path,
            SqliteSyncConfig {
                run_id: "a".into(),
                ..fast_config()
            },
        )
        .unwrap();
        let run_b = SqliteSyncService::open(
            &path,
            SqliteSyncConfig {
                run_id: "b".into(),
                ..fast_config()
            },
        )
        .unwrap();

        run_a
            .signal_entry(&ParticipantKey::random(), "enrolled")
            .await
            .unwrap();
        assert_eq!(run_b.signal_count("enrolled").await.unwrap(), 0);

        run_a.purge_run().await.unwrap();
        assert_eq!(run_a.signal_count("enrolled").await.unwrap(), 0);
    }
}
