//! Per-instance sync client.

use std::sync::Arc;

use bytes::Bytes;
use rendezvous_core::{ParticipantKey, SequenceNumber};

use crate::error::{Result, SyncServiceError};
use crate::subscription::Subscription;
use crate::traits::{SyncService, SyncServiceExt};

/// One instance's handle on the shared backend.
///
/// Carries the participant key that makes this instance's signals idempotent.
/// The key is generated once and never leaves the sync layer.
pub struct SyncClient<S: SyncService + ?Sized> {
    backend: Arc<S>,
    participant: ParticipantKey,
}

impl<S: SyncService + ?Sized> SyncClient<S> {
    /// Create a client with a fresh random participant key.
    pub fn new(backend: Arc<S>) -> Self {
        Self::with_participant(backend, ParticipantKey::random())
    }

    /// Create a client with a known participant key.
    ///
    /// A process restarting mid-run can reuse its key to get its original
    /// sequence number back.
    pub fn with_participant(backend: Arc<S>, participant: ParticipantKey) -> Self {
        Self {
            backend,
            participant,
        }
    }

    /// This client's participant key.
    pub fn participant(&self) -> &ParticipantKey {
        &self.participant
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<S> {
        &self.backend
    }

    /// Register arrival at `state` and obtain this instance's sequence number.
    pub async fn enroll(&self, state: &str) -> Result<SequenceNumber> {
        let position = self.backend.signal_entry(&self.participant, state).await?;
        let seq = SequenceNumber::new(position).map_err(|e| {
            SyncServiceError::InvalidData(format!("backend issued bad sequence number: {e}"))
        })?;

        tracing::debug!(state, seq = seq.get(), "enrolled");
        Ok(seq)
    }

    /// Signal `state` and suspend until `target` distinct instances have signaled it.
    pub async fn signal_and_wait(&self, state: &str, target: u64) -> Result<()> {
        self.backend
            .signal_and_wait(&self.participant, state, target)
            .await?;
        Ok(())
    }

    /// Publish a value on `topic`.
    pub async fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> Result<u64> {
        self.backend.publish(topic, payload.into()).await
    }

    /// Subscribe to `topic` from its first value.
    pub async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        self.backend.subscribe(topic).await
    }
}

impl<S: SyncService + ?Sized> Clone for SyncClient<S> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            participant: self.participant,
        }
    }
}

impl<S: SyncService + ?Sized> std::fmt::Debug for SyncClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("participant", &self.participant.to_hex())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySyncService;
    use std::collections::BTreeSet;
    use std::time::Duration;

    #[tokio::test]
    async fn test_enroll_issues_one_through_n() {
        let backend = Arc::new(MemorySyncService::new());
        let mut seqs = BTreeSet::new();

        for _ in 0..5 {
            let client = SyncClient::new(Arc::clone(&backend));
            seqs.insert(client.enroll("enrolled").await.unwrap().get());
        }

        assert_eq!(seqs, (1..=5).collect::<BTreeSet<u64>>());
    }

    #[tokio::test]
    async fn test_reenroll_returns_same_number() {
        let backend = Arc::new(MemorySyncService::new());
        let first = SyncClient::new(Arc::clone(&backend));
        let second = SyncClient::new(Arc::clone(&backend));

        let a = first.enroll("enrolled").await.unwrap();
        let b = second.enroll("enrolled").await.unwrap();
        assert_eq!(first.enroll("enrolled").await.unwrap(), a);
        assert_ne!(a, b);

        let restarted = SyncClient::with_participant(Arc::clone(&backend), *second.participant());
        assert_eq!(restarted.enroll("enrolled").await.unwrap(), b);
    }

    #[tokio::test]
    async fn test_signal_and_wait_with_dyn_backend() {
        let backend: Arc<dyn SyncService> = Arc::new(MemorySyncService::new());
        let a = SyncClient::new(Arc::clone(&backend));
        let b = SyncClient::new(Arc::clone(&backend));

        let waiter = tokio::spawn(async move { a.signal_and_wait("done", 2).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        b.signal_and_wait("done", 2).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("both waiters released")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_publish_then_subscribe() {
        let backend = Arc::new(MemorySyncService::new());
        let client = SyncClient::new(Arc::clone(&backend));

        client.publish("bootstrap", b"hello".to_vec()).await.unwrap();
        let mut sub = client.subscribe("bootstrap").await.unwrap();
        assert_eq!(sub.recv().await.unwrap(), Bytes::from_static(b"hello"));
        sub.cancel().await;
        assert_eq!(backend.active_subscriptions("bootstrap"), 0);
    }
}
