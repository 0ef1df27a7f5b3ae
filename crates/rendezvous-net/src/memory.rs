//! In-process network for tests and single-process cohorts.
//!
//! Endpoints listen on `/memory/<port>` addresses handed out by a shared
//! [`MemoryNetwork`]. Dialing resolves the address, checks that the identity
//! listening there is the one requested, and records the connection on both
//! sides. Faults can be injected per endpoint to exercise failure paths.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rendezvous_core::{Keypair, Multiaddr, PeerId};

use crate::address_book::AddressBook;
use crate::error::{NetError, Result};
use crate::traits::{Endpoint, EndpointFactory};

/// Failures to inject into an endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultPlan {
    /// Reject every inbound dial.
    pub refuse_inbound: bool,
    /// Make `stop` return an error.
    pub fail_stop: bool,
    /// Make `stop` never complete.
    pub stall_stop: bool,
}

/// Shared in-memory network.
///
/// Cheap to clone; clones share the same network. Statistics survive the
/// endpoints they describe, so tests can inspect them after a run.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<NetworkInner>>,
}

#[derive(Default)]
struct NetworkInner {
    next_port: u64,
    /// Listening endpoints by port.
    listeners: HashMap<u64, Listener>,
    /// Faults applied to endpoints created from now on.
    default_faults: FaultPlan,
    /// Faults for specific identities, consulted on every operation.
    faults: HashMap<PeerId, FaultPlan>,
    /// Identities in creation order.
    created: Vec<PeerId>,
    /// Established connections, per identity.
    connections: HashMap<PeerId, BTreeSet<PeerId>>,
    /// Calls to `stop`, per identity.
    stop_calls: HashMap<PeerId, usize>,
}

#[derive(Clone, Copy)]
struct Listener {
    peer_id: PeerId,
}

impl NetworkInner {
    fn faults_for(&self, peer: &PeerId) -> FaultPlan {
        self.faults.get(peer).copied().unwrap_or(self.default_faults)
    }
}

impl MemoryNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NetworkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `plan` to every endpoint created after this call.
    pub fn set_default_faults(&self, plan: FaultPlan) {
        self.lock().default_faults = plan;
    }

    /// Apply `plan` to one existing endpoint.
    pub fn set_faults(&self, peer: PeerId, plan: FaultPlan) {
        self.lock().faults.insert(peer, plan);
    }

    /// Identities of every endpoint created on this network, in creation order.
    pub fn created(&self) -> Vec<PeerId> {
        self.lock().created.clone()
    }

    /// Peers `peer` holds connections to.
    pub fn connections(&self, peer: &PeerId) -> Vec<PeerId> {
        self.lock()
            .connections
            .get(peer)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of times `stop` was called on `peer`'s endpoint.
    pub fn stop_calls(&self, peer: &PeerId) -> usize {
        self.lock().stop_calls.get(peer).copied().unwrap_or(0)
    }

    /// Number of endpoints still listening.
    pub fn listening(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Create an endpoint attached to this network.
    pub fn endpoint(&self) -> MemoryEndpoint {
        let keypair = Keypair::generate();
        let peer_id = keypair.peer_id();

        let port = {
            let mut inner = self.lock();
            inner.next_port += 1;
            let port = inner.next_port;
            inner.listeners.insert(port, Listener { peer_id });
            let plan = inner.default_faults;
            inner.faults.insert(peer_id, plan);
            inner.created.push(peer_id);
            port
        };

        tracing::debug!(%peer_id, port, "memory endpoint created");
        MemoryEndpoint {
            network: self.clone(),
            peer_id,
            port,
            book: AddressBook::new(),
        }
    }
}

#[async_trait]
impl EndpointFactory for MemoryNetwork {
    type Endpoint = MemoryEndpoint;

    async fn create(&self) -> Result<MemoryEndpoint> {
        Ok(self.endpoint())
    }
}

/// An endpoint on a [`MemoryNetwork`].
pub struct MemoryEndpoint {
    network: MemoryNetwork,
    peer_id: PeerId,
    port: u64,
    book: AddressBook,
}

impl MemoryEndpoint {
    /// The port this endpoint listens on.
    pub fn port(&self) -> u64 {
        self.port
    }

    fn try_address(&self, peer: &PeerId, addr: &Multiaddr) -> Result<()> {
        let port = addr
            .memory_port()
            .ok_or_else(|| NetError::UnsupportedAddress(addr.clone()))?;

        let mut inner = self.network.lock();
        if !inner.listeners.contains_key(&self.port) {
            return Err(NetError::Stopped);
        }

        let listener = inner.listeners.get(&port).copied().ok_or_else(|| {
            NetError::DialFailed {
                peer: *peer,
                reason: format!("nothing listening on {addr}"),
            }
        })?;

        if listener.peer_id != *peer {
            return Err(NetError::Handshake(format!(
                "{addr} is held by {}, expected {peer}",
                listener.peer_id
            )));
        }

        if inner.faults_for(peer).refuse_inbound {
            return Err(NetError::DialFailed {
                peer: *peer,
                reason: "connection refused".into(),
            });
        }

        inner
            .connections
            .entry(self.peer_id)
            .or_default()
            .insert(*peer);
        inner
            .connections
            .entry(*peer)
            .or_default()
            .insert(self.peer_id);
        Ok(())
    }
}

#[async_trait]
impl Endpoint for MemoryEndpoint {
    fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    fn addresses(&self) -> Vec<Multiaddr> {
        vec![Multiaddr::memory(self.port)]
    }

    fn address_book(&self) -> &AddressBook {
        &self.book
    }

    async fn dial(&self, peer: &PeerId) -> Result<()> {
        let addresses = self
            .book
            .get(peer)
            .filter(|addrs| !addrs.is_empty())
            .ok_or(NetError::UnknownPeer(*peer))?;

        let mut last_error = None;
        for addr in &addresses {
            match self.try_address(peer, addr) {
                Ok(()) => {
                    tracing::debug!(%peer, %addr, "dialed");
                    return Ok(());
                }
                Err(NetError::Stopped) => return Err(NetError::Stopped),
                Err(e) => {
                    tracing::debug!(%peer, %addr, error = %e, "dial attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(NetError::DialFailed {
            peer: *peer,
            reason: last_error.map_or_else(|| "no usable address".into(), |e| e.to_string()),
        })
    }

    async fn connected_peers(&self) -> Vec<PeerId> {
        self.network.connections(&self.peer_id)
    }

    async fn stop(&self) -> Result<()> {
        let plan = {
            let mut inner = self.network.lock();
            *inner.stop_calls.entry(self.peer_id).or_default() += 1;
            inner.faults_for(&self.peer_id)
        };

        if plan.stall_stop {
            std::future::pending::<()>().await;
        }
        if plan.fail_stop {
            return Err(NetError::StopFailed("injected stop failure".into()));
        }

        let mut inner = self.network.lock();
        inner.listeners.remove(&self.port);
        if let Some(peers) = inner.connections.remove(&self.peer_id) {
            for peer in peers {
                if let Some(set) = inner.connections.get_mut(&peer) {
                    set.remove(&self.peer_id);
                }
            }
        }

        tracing::debug!(peer_id = %self.peer_id, "memory endpoint stopped");
        Ok(())
    }
}
