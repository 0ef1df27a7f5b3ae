//! # Rendezvous Net
//!
//! The network endpoint boundary. The instance protocol needs very little from
//! a peer-to-peer stack: an identity, a list of addresses, an address book, a
//! way to dial one identity, and a way to stop. This crate defines that surface
//! and ships two implementations.
//!
//! ## Key Types
//!
//! - [`Endpoint`] / [`EndpointFactory`] - The traits the protocol consumes
//! - [`AddressBook`] - Identity to address mapping consulted on dial
//! - [`MemoryNetwork`] - In-process network with fault injection and stop accounting
//! - [`TcpEndpointFactory`] - Real sockets, with a signed identity handshake
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rendezvous_net::{Endpoint, EndpointFactory, MemoryNetwork};
//!
//! async fn example() {
//!     let network = MemoryNetwork::new();
//!     let bootstrap = network.create().await.unwrap();
//!     let peer = network.create().await.unwrap();
//!
//!     peer.address_book().set(bootstrap.peer_id(), bootstrap.addresses());
//!     peer.dial(&bootstrap.peer_id()).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Identity-checked dials**: a dial succeeds only if the endpoint reached
//!   proves it owns the requested identity
//! - **Stop is not idempotent by contract**: callers own the exactly-once
//!   guarantee; the memory network counts calls so tests can check it

pub mod address_book;
pub mod error;
pub mod handshake;
pub mod memory;
pub mod tcp;
pub mod traits;

pub use address_book::AddressBook;
pub use error::{NetError, Result};
pub use memory::{FaultPlan, MemoryEndpoint, MemoryNetwork};
pub use tcp::{TcpConfig, TcpEndpoint, TcpEndpointFactory};
pub use traits::{Endpoint, EndpointFactory};
