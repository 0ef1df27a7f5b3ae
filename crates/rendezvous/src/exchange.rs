//! Bootstrap info exchange.
//!
//! The bootstrap publishes its identity and addresses once on
//! [`BOOTSTRAP_TOPIC`]. Every peer subscribes, takes the first value, cancels
//! the subscription, and connects to what it learned.

use std::time::Duration;

use rendezvous_core::{BootstrapAnnouncement, Multiaddr, PeerId, BOOTSTRAP_TOPIC};
use rendezvous_net::Endpoint;
use rendezvous_sync::{SyncClient, SyncService};

use crate::error::{InstanceError, Result};

/// Publish this endpoint's identity and addresses. Called by the bootstrap only.
pub async fn announce<S, E>(client: &SyncClient<S>, endpoint: &E) -> Result<BootstrapAnnouncement>
where
    S: SyncService + ?Sized,
    E: Endpoint + ?Sized,
{
    let announcement = BootstrapAnnouncement::new(&endpoint.peer_id(), &endpoint.addresses());
    let payload = announcement
        .encode()
        .map_err(InstanceError::MalformedAnnouncement)?;

    let position = client
        .publish(BOOTSTRAP_TOPIC, payload)
        .await
        .map_err(InstanceError::Exchange)?;

    if position > 1 {
        tracing::warn!(position, "bootstrap topic already had a value");
    }
    tracing::info!(addresses = announcement.addresses.len(), "bootstrap info published");
    Ok(announcement)
}

/// Wait for the bootstrap announcement.
///
/// Takes exactly one value and cancels the subscription whether or not that
/// value turns out to be usable. Without a deadline this waits for as long as
/// nothing is published.
pub async fn await_bootstrap<S>(
    client: &SyncClient<S>,
    deadline: Option<Duration>,
) -> Result<BootstrapAnnouncement>
where
    S: SyncService + ?Sized,
{
    let mut subscription = client
        .subscribe(BOOTSTRAP_TOPIC)
        .await
        .map_err(InstanceError::Exchange)?;

    let received = match deadline {
        Some(after) => tokio::time::timeout(after, subscription.recv())
            .await
            .map_err(|_| InstanceError::DeadlineExceeded {
                phase: BOOTSTRAP_TOPIC.to_string(),
                after,
            }),
        None => Ok(subscription.recv().await),
    };

    subscription.cancel().await;

    let payload = received?.map_err(InstanceError::Exchange)?;
    let announcement =
        BootstrapAnnouncement::decode(&payload).map_err(InstanceError::MalformedAnnouncement)?;

    tracing::info!(identity = %announcement.identity, "bootstrap info received");
    Ok(announcement)
}

/// Dial the announced bootstrap and let the overlay settle.
///
/// Returns the identity that was dialed.
pub async fn connect<E>(
    endpoint: &E,
    announcement: &BootstrapAnnouncement,
    settle_delay: Duration,
) -> Result<PeerId>
where
    E: Endpoint + ?Sized,
{
    let peer: PeerId = announcement
        .parse_identity()
        .map_err(InstanceError::MalformedAnnouncement)?;
    let addresses: Vec<Multiaddr> = announcement
        .parse_addresses()
        .map_err(InstanceError::MalformedAnnouncement)?;

    endpoint.address_book().set(peer, addresses);
    endpoint
        .dial(&peer)
        .await
        .map_err(|source| InstanceError::Connection { peer, source })?;

    tracing::info!(%peer, "connected to bootstrap");

    if !settle_delay.is_zero() {
        tokio::time::sleep(settle_delay).await;
    }
    Ok(peer)
}
