//! Endpoint traits: the narrow network surface the instance protocol consumes.
//!
//! The protocol never builds a network stack itself. It asks an
//! [`EndpointFactory`] for one endpoint, reads its identity and addresses,
//! fills its address book, dials one peer, and stops it.

use async_trait::async_trait;
use rendezvous_core::{Multiaddr, PeerId};

use crate::address_book::AddressBook;
use crate::error::Result;

/// A constructed local network endpoint.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Endpoint: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Identity
    // ─────────────────────────────────────────────────────────────────────────

    /// This endpoint's identity.
    fn peer_id(&self) -> PeerId;

    /// Addresses other endpoints can reach this one on, in preference order.
    fn addresses(&self) -> Vec<Multiaddr>;

    /// The address book consulted by [`Endpoint::dial`].
    fn address_book(&self) -> &AddressBook;

    // ─────────────────────────────────────────────────────────────────────────
    // Connections
    // ─────────────────────────────────────────────────────────────────────────

    /// Connect to `peer` using the addresses recorded in the address book.
    ///
    /// Succeeds once a connection to the claimed identity is established.
    async fn dial(&self, peer: &PeerId) -> Result<()>;

    /// Identities this endpoint currently holds connections to.
    async fn connected_peers(&self) -> Vec<PeerId>;

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Release every resource held by the endpoint.
    async fn stop(&self) -> Result<()>;
}

/// Constructs endpoints.
#[async_trait]
pub trait EndpointFactory: Send + Sync {
    /// The endpoint type produced.
    type Endpoint: Endpoint + 'static;

    /// Construct a new endpoint with a fresh identity, listening and ready to be dialed.
    async fn create(&self) -> Result<Self::Endpoint>;
}
