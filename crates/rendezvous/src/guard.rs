//! Lifecycle guard for the local endpoint.
//!
//! The guard owns the endpoint from construction onward and stops it exactly
//! once. The normal path is [`EndpointGuard::release`], awaited after the
//! protocol finishes or fails. If the guard is dropped without being released
//! (the run future was cancelled), the stop is spawned onto the current
//! runtime instead.
//!
//! Teardown never fails the run. Problems are logged and recorded through the
//! run environment's message sink.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rendezvous_net::Endpoint;

use crate::runenv::MessageSink;

/// How teardown ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownStatus {
    /// The endpoint stopped cleanly.
    Stopped,
    /// The endpoint reported an error while stopping.
    Failed(String),
    /// Stopping did not finish within the stop timeout.
    TimedOut(Duration),
}

impl TeardownStatus {
    /// Whether the endpoint stopped cleanly.
    pub fn is_clean(&self) -> bool {
        matches!(self, TeardownStatus::Stopped)
    }
}

impl fmt::Display for TeardownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeardownStatus::Stopped => f.write_str("stopped"),
            TeardownStatus::Failed(reason) => write!(f, "failed: {reason}"),
            TeardownStatus::TimedOut(after) => write!(f, "timed out after {after:?}"),
        }
    }
}

/// Owns an endpoint and guarantees a single stop.
pub struct EndpointGuard<E: Endpoint + 'static> {
    endpoint: Arc<E>,
    stop_timeout: Duration,
    sink: Arc<dyn MessageSink>,
    released: bool,
}

impl<E: Endpoint + 'static> EndpointGuard<E> {
    /// Take ownership of `endpoint`.
    pub fn new(endpoint: E, stop_timeout: Duration, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
            stop_timeout,
            sink,
            released: false,
        }
    }

    /// The guarded endpoint.
    pub fn endpoint(&self) -> &E {
        &self.endpoint
    }

    /// Stop the endpoint and report how it went.
    pub async fn release(mut self) -> TeardownStatus {
        self.released = true;
        teardown(
            Arc::clone(&self.endpoint),
            self.stop_timeout,
            Arc::clone(&self.sink),
        )
        .await
    }
}

impl<E: Endpoint + 'static> Drop for EndpointGuard<E> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let endpoint = Arc::clone(&self.endpoint);
        let sink = Arc::clone(&self.sink);
        let stop_timeout = self.stop_timeout;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(peer_id = %endpoint.peer_id(), "guard dropped, spawning teardown");
                handle.spawn(async move {
                    teardown(endpoint, stop_timeout, sink).await;
                });
            }
            Err(_) => {
                let message = format!(
                    "teardown skipped for {}: no runtime to run it on",
                    endpoint.peer_id()
                );
                tracing::warn!("{message}");
                sink.record_message(&message);
            }
        }
    }
}

async fn teardown<E: Endpoint + ?Sized>(
    endpoint: Arc<E>,
    stop_timeout: Duration,
    sink: Arc<dyn MessageSink>,
) -> TeardownStatus {
    let peer_id = endpoint.peer_id();
    tracing::debug!(%peer_id, "stopping endpoint");
    sink.record_message("stopping node");

    let status = match tokio::time::timeout(stop_timeout, endpoint.stop()).await {
        Ok(Ok(())) => TeardownStatus::Stopped,
        Ok(Err(e)) => TeardownStatus::Failed(e.to_string()),
        Err(_) => TeardownStatus::TimedOut(stop_timeout),
    };

    if status.is_clean() {
        tracing::info!(%peer_id, "endpoint stopped");
    } else {
        tracing::warn!(%peer_id, %status, "teardown problem");
        sink.record_message(&format!("teardown of {peer_id} {status}"));
    }
    status
}
