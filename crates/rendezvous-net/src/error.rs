//! Error types for network endpoints.

use rendezvous_core::{CoreError, Multiaddr, PeerId};
use thiserror::Error;

/// Errors that can occur creating, dialing, or stopping an endpoint.
#[derive(Debug, Error)]
pub enum NetError {
    /// The address book has nothing for this peer.
    #[error("no known addresses for peer {0}")]
    UnknownPeer(PeerId),

    /// Every known address for the peer failed.
    #[error("dial to {peer} failed: {reason}")]
    DialFailed { peer: PeerId, reason: String },

    /// The address cannot be used by this endpoint type.
    #[error("unsupported address: {0}")]
    UnsupportedAddress(Multiaddr),

    /// The identity handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The endpoint has already been stopped.
    #[error("endpoint stopped")]
    Stopped,

    /// Releasing the endpoint's resources failed.
    #[error("stop failed: {0}")]
    StopFailed(String),

    /// I/O error from the socket layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A core value could not be parsed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for network operations.
pub type Result<T> = std::result::Result<T, NetError>;
