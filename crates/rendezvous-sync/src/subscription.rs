//! Subscription handles.
//!
//! A subscription is backed by a forwarding task owned by the backend. The task
//! pushes topic values into a bounded channel; the handle reads from it. Cancelling
//! the handle stops the task, which releases whatever the backend holds for it.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, SyncServiceError};

/// Channel capacity between a backend forwarding task and its handle.
pub const SUBSCRIPTION_BUFFER: usize = 16;

/// A lazy, unbounded sequence of values published on one topic.
///
/// Values arrive in publish order. The sequence cannot be rewound; open a new
/// subscription to start again from the beginning.
pub struct Subscription {
    topic: String,
    receiver: mpsc::Receiver<Result<Bytes>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a receiver fed by a backend forwarding task.
    pub fn new(
        topic: impl Into<String>,
        receiver: mpsc::Receiver<Result<Bytes>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            topic: topic.into(),
            receiver,
            task: Some(task),
        }
    }

    /// The topic this subscription reads.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next value.
    ///
    /// Returns `None` once the backend has stopped feeding this subscription.
    /// Suspends indefinitely if nothing is ever published.
    pub async fn next(&mut self) -> Option<Result<Bytes>> {
        self.receiver.recv().await
    }

    /// Wait for the next value, treating a closed subscription as an error.
    pub async fn recv(&mut self) -> Result<Bytes> {
        match self.next().await {
            Some(result) => result,
            None => Err(SyncServiceError::SubscriptionClosed(self.topic.clone())),
        }
    }

    /// Stop the forwarding task and wait until the backend has released it.
    pub async fn cancel(mut self) {
        self.receiver.close();
        if let Some(task) = self.task.take() {
            task.abort();
            // A cancelled JoinError is the expected outcome here.
            let _ = task.await;
        }
        tracing::debug!(topic = %self.topic, "subscription cancelled");
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("active", &self.task.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recv_reports_closed_topic() {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let task = tokio::spawn(async move {
            tx.send(Ok(Bytes::from_static(b"one"))).await.unwrap();
        });

        let mut sub = Subscription::new("t", rx, task);
        assert_eq!(sub.recv().await.unwrap(), Bytes::from_static(b"one"));
        assert!(matches!(
            sub.recv().await,
            Err(SyncServiceError::SubscriptionClosed(topic)) if topic == "t"
        ));
    }

    #[tokio::test]
    async fn test_cancel_stops_task() {
        let (tx, rx) = mpsc::channel::<Result<Bytes>>(SUBSCRIPTION_BUFFER);
        let task = tokio::spawn(async move {
            // Never sends; only cancellation ends this task.
            let _tx = tx;
            std::future::pending::<()>().await;
        });

        let sub = Subscription::new("t", rx, task);
        tokio::time::timeout(std::time::Duration::from_secs(1), sub.cancel())
            .await
            .expect("cancel should not hang");
    }
}
