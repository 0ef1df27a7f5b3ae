//! TCP endpoints for cohorts spread over separate processes.
//!
//! Each endpoint listens on an ephemeral port and advertises
//! `/ip4/<ip>/tcp/<port>` (or `/ip6/...`). Inbound connections are answered
//! with the identity handshake from [`crate::handshake`]; outbound dials run
//! the dialer side and keep the stream open as the connection.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rendezvous_core::{Keypair, Multiaddr, PeerId};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};

use crate::address_book::AddressBook;
use crate::error::{NetError, Result};
use crate::handshake;
use crate::traits::{Endpoint, EndpointFactory};

/// TCP endpoint configuration.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Address to listen on; also the address advertised to peers.
    pub listen_ip: IpAddr,
    /// Limit on connecting plus handshaking, per address.
    pub dial_timeout: Duration,
    /// Limit on answering an inbound handshake.
    pub handshake_timeout: Duration,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            listen_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            dial_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// Creates [`TcpEndpoint`]s.
#[derive(Debug, Clone, Default)]
pub struct TcpEndpointFactory {
    config: TcpConfig,
}

impl TcpEndpointFactory {
    /// Create a factory with the given configuration.
    pub fn new(config: TcpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EndpointFactory for TcpEndpointFactory {
    type Endpoint = TcpEndpoint;

    async fn create(&self) -> Result<TcpEndpoint> {
        TcpEndpoint::bind(self.config.clone(), Keypair::generate()).await
    }
}

type Connections = Arc<Mutex<HashMap<PeerId, TcpStream>>>;

fn lock(connections: &Connections) -> MutexGuard<'_, HashMap<PeerId, TcpStream>> {
    connections.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A listening TCP endpoint.
pub struct TcpEndpoint {
    peer_id: PeerId,
    local_addr: SocketAddr,
    config: TcpConfig,
    book: AddressBook,
    connections: Connections,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl TcpEndpoint {
    /// Bind a listener and start accepting connections.
    pub async fn bind(config: TcpConfig, keypair: Keypair) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(config.listen_ip, 0)).await?;
        let local_addr = listener.local_addr()?;
        let peer_id = keypair.peer_id();
        let connections: Connections = Arc::default();

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::new(keypair),
            Arc::clone(&connections),
            config.handshake_timeout,
        ));

        tracing::info!(%peer_id, %local_addr, "tcp endpoint listening");
        Ok(Self {
            peer_id,
            local_addr,
            config,
            book: AddressBook::new(),
            connections,
            accept_task: Mutex::new(Some(accept_task)),
            stopped: AtomicBool::new(false),
        })
    }

    /// The bound socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn try_address(&self, peer: &PeerId, addr: &Multiaddr) -> Result<TcpStream> {
        let socket = addr
            .to_socket_addr()
            .ok_or_else(|| NetError::UnsupportedAddress(addr.clone()))?;

        let attempt = async {
            let stream = TcpStream::connect(socket).await?;
            handshake::initiate(stream, self.peer_id, peer).await
        };

        tokio::time::timeout(self.config.dial_timeout, attempt)
            .await
            .map_err(|_| NetError::DialFailed {
                peer: *peer,
                reason: format!("timed out after {:?}", self.config.dial_timeout),
            })?
    }
}

async fn accept_loop(
    listener: TcpListener,
    keypair: Arc<Keypair>,
    connections: Connections,
    handshake_timeout: Duration,
) {
    let mut handshakes = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    let keypair = Arc::clone(&keypair);
                    let connections = Arc::clone(&connections);
                    handshakes.spawn(async move {
                        let answer = tokio::time::timeout(
                            handshake_timeout,
                            handshake::respond(stream, &keypair),
                        )
                        .await;

                        match answer {
                            Ok(Ok((stream, dialer))) => {
                                tracing::debug!(%dialer, %remote, "inbound connection");
                                lock(&connections).insert(dialer, stream);
                            }
                            Ok(Err(e)) => tracing::warn!(%remote, error = %e, "inbound handshake rejected"),
                            Err(_) => tracing::warn!(%remote, "inbound handshake timed out"),
                        }
                    });
                }
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            },
            Some(_) = handshakes.join_next(), if !handshakes.is_empty() => {}
        }
    }
}

#[async_trait]
impl Endpoint for TcpEndpoint {
    fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    fn addresses(&self) -> Vec<Multiaddr> {
        vec![Multiaddr::from_socket_addr(self.local_addr)]
    }

    fn address_book(&self) -> &AddressBook {
        &self.book
    }

    async fn dial(&self, peer: &PeerId) -> Result<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(NetError::Stopped);
        }

        let addresses = self
            .book
            .get(peer)
            .filter(|addrs| !addrs.is_empty())
            .ok_or(NetError::UnknownPeer(*peer))?;

        let mut last_error = None;
        for addr in &addresses {
            match self.try_address(peer, addr).await {
                Ok(stream) => {
                    tracing::debug!(%peer, %addr, "dialed");
                    lock(&self.connections).insert(*peer, stream);
                    return Ok(());
                }
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
        lock(&self.connections).keys().copied().collect()
    }

    async fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let task = self
            .accept_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            match task.await {
                Err(e) if e.is_panic() => {
                    return Err(NetError::StopFailed(format!("accept loop panicked: {e}")))
                }
                _ => {}
            }
        }

        lock(&self.connections).clear();
        tracing::info!(peer_id = %self.peer_id, "tcp endpoint stopped");
        Ok(())
    }
}

impl Drop for TcpEndpoint {
    fn drop(&mut self) {
        let task = self
            .accept_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn endpoint() -> TcpEndpoint {
        TcpEndpointFactory::default().create().await.unwrap()
    }

    #[tokio::test]
    async fn test_dial_over_loopback() {
        let a = endpoint().await;
        let b = endpoint().await;

        let addrs = b.addresses();
        assert_eq!(addrs[0].protocols().to_string(), "ip4/tcp");

        a.address_book().set(b.peer_id(), addrs);
        a.dial(&b.peer_id()).await.unwrap();
        assert_eq!(a.connected_peers().await, vec![b.peer_id()]);

        // The listener registers the dialer once its handshake completes.
        for _ in 0..50 {
            if !b.connected_peers().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(b.connected_peers().await, vec![a.peer_id()]);

        a.stop().await.unwrap();
        b.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_dial_wrong_identity_fails() {
        let a = endpoint().await;
        let b = endpoint().await;
        let impostor = Keypair::generate().peer_id();

        a.address_book().set(impostor, b.addresses());
        let err = a.dial(&impostor).await.unwrap_err();
        assert!(matches!(err, NetError::DialFailed { .. }));
        assert!(a.connected_peers().await.is_empty());
    }

    #[tokio::test]
    async fn test_dial_after_stop_fails() {
        let a = endpoint().await;
        let b = endpoint().await;
        a.address_book().set(b.peer_id(), b.addresses());

        a.stop().await.unwrap();
        a.stop().await.unwrap();
        assert!(matches!(a.dial(&b.peer_id()).await, Err(NetError::Stopped)));
    }

    #[tokio::test]
    async fn test_unsupported_address() {
        let a = endpoint().await;
        let peer = Keypair::generate().peer_id();
        a.address_book().set(peer, vec![Multiaddr::memory(1)]);

        let err = a.dial(&peer).await.unwrap_err();
        assert!(err.to_string().contains("unsupported address"));
    }
}
