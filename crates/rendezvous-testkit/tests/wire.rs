//! Wire format and role resolution properties.

use proptest::prelude::*;

use rendezvous_core::{limits, BootstrapAnnouncement, Multiaddr, PeerId, Role, SequenceNumber};
use rendezvous_testkit::generators::{announcement, cohort_size};
use rendezvous_testkit::vectors::{all_vectors, malformed_payloads, verify_all_vectors};

#[test]
fn golden_vectors_hold() {
    assert!(all_vectors().len() >= 5);
    verify_all_vectors().unwrap();
}

#[test]
fn malformed_payloads_are_rejected() {
    for (name, payload) in malformed_payloads() {
        assert!(
            BootstrapAnnouncement::decode(payload).is_err(),
            "{name} should be rejected"
        );
    }
}

#[test]
fn oversized_payload_is_rejected_before_parsing() {
    let mut payload = br#"{"identity":"A","addresses":[""#.to_vec();
    payload.extend(std::iter::repeat(b'x').take(limits::MAX_ANNOUNCEMENT_BYTES));
    payload.extend_from_slice(br#""]}"#);

    assert!(BootstrapAnnouncement::decode(&payload).is_err());
}

proptest! {
    #[test]
    fn announcement_survives_the_wire(sent in announcement(8)) {
        let received = BootstrapAnnouncement::decode(&sent.encode().unwrap()).unwrap();
        prop_assert_eq!(&received, &sent);

        let identity: PeerId = received.parse_identity().unwrap();
        prop_assert_eq!(identity.to_string(), sent.identity);

        let addresses: Vec<Multiaddr> = received.parse_addresses().unwrap();
        let rendered: Vec<String> = addresses.iter().map(ToString::to_string).collect();
        prop_assert_eq!(rendered, received.addresses);
    }

    #[test]
    fn exactly_one_bootstrap_per_cohort(size in cohort_size(256)) {
        let bootstraps = (1..=size.get())
            .filter_map(|n| SequenceNumber::new(n).ok())
            .filter(|seq| Role::resolve(*seq) == Role::Bootstrap)
            .count();
        prop_assert_eq!(bootstraps, 1);
    }
}
