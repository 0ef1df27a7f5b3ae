//! Per-endpoint address book.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use rendezvous_core::{Multiaddr, PeerId};

/// Known addresses for remote identities.
///
/// Setting a peer's addresses replaces whatever was known before.
#[derive(Debug, Default)]
pub struct AddressBook {
    entries: RwLock<HashMap<PeerId, Vec<Multiaddr>>>,
}

impl AddressBook {
    /// Create an empty address book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the addresses for `peer`, replacing any previous entry.
    pub fn set(&self, peer: PeerId, addresses: Vec<Multiaddr>) {
        tracing::debug!(%peer, count = addresses.len(), "address book updated");
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(peer, addresses);
    }

    /// Known addresses for `peer`.
    pub fn get(&self, peer: &PeerId) -> Option<Vec<Multiaddr>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(peer)
            .cloned()
    }

    /// Forget `peer`.
    pub fn remove(&self, peer: &PeerId) -> Option<Vec<Multiaddr>> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(peer)
    }

    /// Number of peers with recorded addresses.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the book is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
