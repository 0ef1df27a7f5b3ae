//! SyncService trait: the abstract interface to the coordination backend.
//!
//! This trait allows the instance protocol to be backend-agnostic. Implementations
//! include SQLite (cross-process) and in-memory (for tests and local cohorts).

use async_trait::async_trait;
use bytes::Bytes;
use rendezvous_core::ParticipantKey;

use crate::error::Result;
use crate::subscription::Subscription;

/// The shared coordination backend.
///
/// Every instance of a cohort talks to the same backend. State names and
/// topics are plain strings; the backend attaches no meaning to them.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait SyncService: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Signals and Barriers
    // ─────────────────────────────────────────────────────────────────────────

    /// Record that `participant` has reached `state`.
    ///
    /// # Returns
    /// The 1-based position of this participant among everyone who has
    /// signaled `state`. Signaling again returns the original position and
    /// does not change the count.
    async fn signal_entry(&self, participant: &ParticipantKey, state: &str) -> Result<u64>;

    /// Number of distinct participants that have signaled `state`.
    async fn signal_count(&self, state: &str) -> Result<u64>;

    /// Suspend until at least `target` distinct participants have signaled `state`.
    ///
    /// Returns immediately when the target is already met (including a target of 0).
    /// There is no internal timeout; callers bound the wait if they need to.
    async fn barrier(&self, state: &str, target: u64) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Topics
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a value to `topic`.
    ///
    /// # Returns
    /// The 1-based position of the value within the topic.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<u64>;

    /// Open a subscription that yields every value of `topic` in publish order,
    /// starting from the first value ever published.
    async fn subscribe(&self, topic: &str) -> Result<Subscription>;
}

/// Extension trait for common sync patterns.
pub trait SyncServiceExt: SyncService {
    /// Signal `state` and wait until `target` participants have signaled it.
    ///
    /// Returns this participant's position for `state`.
    fn signal_and_wait(
        &self,
        participant: &ParticipantKey,
        state: &str,
        target: u64,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;
}

impl<S: SyncService + ?Sized> SyncServiceExt for S {
    async fn signal_and_wait(
        &self,
        participant: &ParticipantKey,
        state: &str,
        target: u64,
    ) -> Result<u64> {
        let position = self.signal_entry(participant, state).await?;

        // A zero target never blocks, even on a backend that is slow to answer.
        if target > 0 {
            self.barrier(state, target).await?;
        }

        Ok(position)
    }
}
