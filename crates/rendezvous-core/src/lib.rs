//! # Rendezvous Core
//!
//! Pure primitives for coordinating a fixed-size cohort of test instances.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over the values that cross the coordination boundary.
//!
//! ## Key Types
//!
//! - [`SequenceNumber`] - Position issued to an instance at enrollment (1-based)
//! - [`Role`] - Bootstrap or peer, derived from the sequence number
//! - [`SyncState`] - The named synchronization points of the protocol
//! - [`CohortSize`] - The participant count `N` and the barrier targets derived from it
//! - [`PeerId`] - Content-addressed endpoint identity (Blake3 of an Ed25519 key)
//! - [`Multiaddr`] - Self-describing network address
//! - [`BootstrapAnnouncement`] - The one structured message on the wire
//!
//! ## Wire Format
//!
//! The bootstrap announcement is JSON. See [`announcement`] module.

pub mod announcement;
pub mod crypto;
pub mod error;
pub mod multiaddr;
pub mod role;
pub mod state;
pub mod types;

pub use announcement::{limits, BootstrapAnnouncement, BOOTSTRAP_TOPIC};
pub use crypto::{Ed25519PublicKey, Ed25519Signature, Keypair, PeerId};
pub use error::{CoreError, Result};
pub use multiaddr::{Multiaddr, Protocol};
pub use role::Role;
pub use state::{CohortSize, SyncState};
pub use types::{ParticipantKey, SequenceNumber};
