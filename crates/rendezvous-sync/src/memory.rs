//! In-memory implementation of the SyncService trait.
//!
//! This is primarily for testing and for cohorts whose instances all live in
//! one process. It has the same semantics as the SQLite backend but keeps
//! everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Notify};

use rendezvous_core::ParticipantKey;

use crate::error::{Result, SyncServiceError};
use crate::subscription::{Subscription, SUBSCRIPTION_BUFFER};
use crate::traits::SyncService;

/// In-memory sync backend.
///
/// Cheap to clone; clones share the same state. Waiters are woken through a
/// single `Notify` whenever any signal or publish lands.
#[derive(Clone, Default)]
pub struct MemorySyncService {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    inner: Mutex<MemorySyncInner>,
    changed: Notify,
}

#[derive(Default)]
struct MemorySyncInner {
    /// Participants per state, in signal order.
    states: HashMap<String, Vec<ParticipantKey>>,

    /// Published values per topic.
    topics: HashMap<String, TopicLog>,

    /// Set once the backend has been shut down.
    closed: bool,
}

#[derive(Default)]
struct TopicLog {
    entries: Vec<Bytes>,
    /// Forwarding tasks currently attached to this topic.
    subscribers: usize,
}

impl Shared {
    fn lock(&self) -> Result<MutexGuard<'_, MemorySyncInner>> {
        let inner = self
            .inner
            .lock()
            .map_err(|e| SyncServiceError::Unavailable(format!("mutex poisoned: {e}")))?;
        if inner.closed {
            return Err(SyncServiceError::Unavailable("backend shut down".into()));
        }
        Ok(inner)
    }

    fn entry_at(&self, topic: &str, index: usize) -> Result<Option<Bytes>> {
        let inner = self.lock()?;
        Ok(inner
            .topics
            .get(topic)
            .and_then(|log| log.entries.get(index))
            .cloned())
    }
}

/// Decrements the subscriber count when a forwarding task ends, however it ends.
struct SubscriberGuard {
    shared: Arc<Shared>,
    topic: String,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.shared.inner.lock() {
            if let Some(log) = inner.topics.get_mut(&self.topic) {
                log.subscribers = log.subscribers.saturating_sub(1);
            }
        }
    }
}

impl MemorySyncService {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shut the backend down.
    ///
    /// Every pending and future call fails with [`SyncServiceError::Unavailable`].
    pub fn shutdown(&self) {
        if let Ok(mut inner) = self.shared.inner.lock() {
            inner.closed = true;
        }
        self.shared.changed.notify_waiters();
    }

    /// Number of subscriptions currently attached to `topic`.
    pub fn active_subscriptions(&self, topic: &str) -> usize {
        self.shared
            .inner
            .lock()
            .map(|inner| inner.topics.get(topic).map_or(0, |log| log.subscribers))
            .unwrap_or(0)
    }

    /// Every value published on `topic`, in order.
    pub fn published(&self, topic: &str) -> Vec<Bytes> {
        self.shared
            .inner
            .lock()
            .map(|inner| {
                inner
                    .topics
                    .get(topic)
                    .map(|log| log.entries.clone())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl SyncService for MemorySyncService {
    async fn signal_entry(&self, participant: &ParticipantKey, state: &str) -> Result<u64> {
        let position = {
            let mut inner = self.shared.lock()?;
            let signaled = inner.states.entry(state.to_string()).or_default();

            match signaled.iter().position(|p| p == participant) {
                Some(index) => index as u64 + 1,
                None => {
                    signaled.push(*participant);
                    signaled.len() as u64
                }
            }
        };

        tracing::debug!(state, position, "signal entry");
        self.shared.changed.notify_waiters();
        Ok(position)
    }

    async fn signal_count(&self, state: &str) -> Result<u64> {
        let inner = self.shared.lock()?;
        Ok(inner.states.get(state).map_or(0, |s| s.len() as u64))
    }

    async fn barrier(&self, state: &str, target: u64) -> Result<()> {
        loop {
            // Register interest before checking so a signal in between is not missed.
            let notified = self.shared.changed.notified();

            let count = self.signal_count(state).await?;
            if count >= target {
                tracing::debug!(state, target, "barrier released");
                return Ok(());
            }

            notified.await;
        }
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<u64> {
        let position = {
            let mut inner = self.shared.lock()?;
            let log = inner.topics.entry(topic.to_string()).or_default();
            log.entries.push(payload);
            log.entries.len() as u64
        };

        tracing::debug!(topic, position, "published");
        self.shared.changed.notify_waiters();
        Ok(position)
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        {
            let mut inner = self.shared.lock()?;
            inner.topics.entry(topic.to_string()).or_default().subscribers += 1;
        }

        let guard = SubscriberGuard {
            shared: Arc::clone(&self.shared),
            topic: topic.to_string(),
        };
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        let task = tokio::spawn(async move {
            let shared = Arc::clone(&guard.shared);
            let mut cursor = 0usize;

            loop {
                let notified = shared.changed.notified();

                match shared.entry_at(&guard.topic, cursor) {
                    Ok(Some(payload)) => {
                        cursor += 1;
                        if tx.send(Ok(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => notified.await,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });

        Ok(Subscription::new(topic, rx, task))
    }
}
