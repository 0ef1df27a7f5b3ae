//! Proptest generators for property-based testing.

use std::net::{Ipv4Addr, Ipv6Addr};

use proptest::prelude::*;

use rendezvous_core::{BootstrapAnnouncement, CohortSize, Keypair, Multiaddr, PeerId, Protocol};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random PeerId.
pub fn peer_id() -> impl Strategy<Value = PeerId> {
    any::<[u8; 32]>().prop_map(PeerId::from_bytes)
}

/// Generate a cohort size in `1..=max`.
pub fn cohort_size(max: u64) -> impl Strategy<Value = CohortSize> {
    (1..=max.max(1)).prop_filter_map("non-empty cohort", |n| CohortSize::new(n).ok())
}

/// Generate a transport address: ip4 or ip6 plus tcp, dns plus tcp, or memory.
pub fn multiaddr() -> impl Strategy<Value = Multiaddr> {
    let tcp = any::<u16>();
    prop_oneof![
        (any::<[u8; 4]>(), tcp).prop_map(|(ip, port)| {
            Multiaddr::empty()
                .with(Protocol::Ip4(Ipv4Addr::from(ip)))
                .with(Protocol::Tcp(port))
        }),
        (any::<[u8; 16]>(), tcp).prop_map(|(ip, port)| {
            Multiaddr::empty()
                .with(Protocol::Ip6(Ipv6Addr::from(ip)))
                .with(Protocol::Tcp(port))
        }),
        ("[a-z][a-z0-9-]{0,15}(\\.[a-z]{2,6})?", 0..3u8, tcp).prop_map(|(host, family, port)| {
            let dns = match family {
                0 => Protocol::Dns(host),
                1 => Protocol::Dns4(host),
                _ => Protocol::Dns6(host),
            };
            Multiaddr::empty().with(dns).with(Protocol::Tcp(port))
        }),
        any::<u64>().prop_map(Multiaddr::memory),
    ]
}

/// Generate an announcement with up to `max_addresses` addresses.
pub fn announcement(max_addresses: usize) -> impl Strategy<Value = BootstrapAnnouncement> {
    (
        peer_id(),
        prop::collection::vec(multiaddr(), 0..=max_addresses),
    )
        .prop_map(|(peer, addrs)| BootstrapAnnouncement::new(&peer, &addrs))
}
