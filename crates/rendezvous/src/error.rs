//! Error types for an instance run.

use std::time::Duration;

use rendezvous_core::{CoreError, PeerId, SyncState};
use rendezvous_net::NetError;
use rendezvous_sync::SyncServiceError;
use thiserror::Error;

/// Errors that abort the protocol of one instance.
///
/// Teardown problems are not represented here; see
/// [`TeardownStatus`](crate::guard::TeardownStatus).
#[derive(Debug, Error)]
pub enum InstanceError {
    /// No sequence number could be obtained.
    #[error("enrollment failed: {0}")]
    Enrollment(#[source] SyncServiceError),

    /// The local endpoint could not be constructed.
    #[error("endpoint creation failed: {0}")]
    EndpointCreation(#[source] NetError),

    /// Signaling or waiting on a barrier failed.
    #[error("barrier {state} failed: {source}")]
    Barrier {
        state: SyncState,
        #[source]
        source: SyncServiceError,
    },

    /// A configured deadline elapsed.
    #[error("deadline exceeded after {after:?} waiting on {phase}")]
    DeadlineExceeded { phase: String, after: Duration },

    /// Publishing or subscribing on the bootstrap topic failed.
    #[error("bootstrap exchange failed: {0}")]
    Exchange(#[source] SyncServiceError),

    /// The bootstrap announcement could not be built or understood.
    #[error("malformed announcement: {0}")]
    MalformedAnnouncement(#[source] CoreError),

    /// Connecting to the bootstrap failed.
    #[error("connection to bootstrap {peer} failed: {source}")]
    Connection {
        peer: PeerId,
        #[source]
        source: NetError,
    },

    /// A state with no barrier was used as one.
    #[error("{0} is not a barrier state")]
    NotABarrier(SyncState),

    /// Run parameters could not be read.
    #[error("configuration error: {0}")]
    Config(String),
}

impl InstanceError {
    /// Whether the error came from a configured deadline.
    pub fn is_deadline(&self) -> bool {
        matches!(self, InstanceError::DeadlineExceeded { .. })
    }
}

/// Result type for instance operations.
pub type Result<T> = std::result::Result<T, InstanceError>;
