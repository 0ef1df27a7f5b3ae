//! Golden wire vectors for the bootstrap announcement.
//!
//! Every instance of a cohort must produce and accept exactly these bytes,
//! whatever build it came from.

use rendezvous_core::{BootstrapAnnouncement, CoreError, Multiaddr, PeerId};

/// A golden announcement vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Identity field.
    pub identity: &'static str,
    /// Address fields, in order.
    pub addresses: &'static [&'static str],
    /// Exact encoded JSON.
    pub json: &'static str,
    /// Whether the identity parses as a [`PeerId`] and every address as a [`Multiaddr`].
    pub native: bool,
}

impl GoldenVector {
    /// The announcement this vector describes.
    pub fn announcement(&self) -> BootstrapAnnouncement {
        BootstrapAnnouncement {
            identity: self.identity.to_string(),
            addresses: self.addresses.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Get all golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "opaque identity, single tcp address",
            identity: "A",
            addresses: &["/ip4/1.2.3.4/tcp/1"],
            json: r#"{"identity":"A","addresses":["/ip4/1.2.3.4/tcp/1"]}"#,
            native: false,
        },
        GoldenVector {
            name: "no addresses",
            identity: "solo",
            addresses: &[],
            json: r#"{"identity":"solo","addresses":[]}"#,
            native: false,
        },
        GoldenVector {
            name: "peer id with mixed addresses, order preserved",
            identity: "0000000000000000000000000000000000000000000000000000000000000000",
            addresses: &["/ip6/::1/tcp/4001", "/ip4/10.0.0.7/tcp/4001", "/memory/3"],
            json: concat!(
                r#"{"identity":"0000000000000000000000000000000000000000000000000000000000000000","#,
                r#""addresses":["/ip6/::1/tcp/4001","/ip4/10.0.0.7/tcp/4001","/memory/3"]}"#
            ),
            native: true,
        },
        GoldenVector {
            name: "dns address",
            identity: "ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00",
            addresses: &["/dns/bootstrap.local/tcp/443"],
            json: concat!(
                r#"{"identity":"ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00ff00","#,
                r#""addresses":["/dns/bootstrap.local/tcp/443"]}"#
            ),
            native: true,
        },
        GoldenVector {
            name: "characters that need escaping",
            identity: "quote\"slash\\",
            addresses: &["/memory/1"],
            json: r#"{"identity":"quote\"slash\\","addresses":["/memory/1"]}"#,
            native: false,
        },
    ]
}

/// Payloads every decoder must reject.
pub fn malformed_payloads() -> Vec<(&'static str, &'static [u8])> {
    vec![
        ("not json", &b"bootstrap"[..]),
        ("empty object", &b"{}"[..]),
        ("missing addresses", &br#"{"identity":"A"}"#[..]),
        ("numeric identity", &br#"{"identity":1,"addresses":[]}"#[..]),
        ("addresses not an array", &br#"{"identity":"A","addresses":"/memory/1"}"#[..]),
        ("unknown field", &br#"{"identity":"A","addresses":[],"extra":true}"#[..]),
        ("empty identity", &br#"{"identity":"","addresses":[]}"#[..]),
        ("array instead of object", &br#"["A",[]]"#[..]),
    ]
}

/// Check one vector: exact encoding, decoding, and native parsing where expected.
pub fn verify_vector(vector: &GoldenVector) -> Result<(), String> {
    let fail = |what: &str, e: &dyn std::fmt::Display| format!("{}: {what}: {e}", vector.name);
    let announcement = vector.announcement();

    let encoded = announcement.encode().map_err(|e| fail("encode", &e))?;
    if encoded != vector.json.as_bytes() {
        return Err(format!(
            "{}: encoded {} but expected {}",
            vector.name,
            String::from_utf8_lossy(&encoded),
            vector.json
        ));
    }

    let decoded =
        BootstrapAnnouncement::decode(vector.json.as_bytes()).map_err(|e| fail("decode", &e))?;
    if decoded != announcement {
        return Err(format!("{}: decoded {decoded:?}", vector.name));
    }

    // Any JSON reader sees the same two fields.
    let value: serde_json::Value =
        serde_json::from_str(vector.json).map_err(|e| fail("generic parse", &e))?;
    let fields = value.as_object().map(|o| o.len());
    if fields != Some(2) {
        return Err(format!("{}: expected exactly two fields", vector.name));
    }

    if vector.native {
        let identity: Result<PeerId, CoreError> = decoded.parse_identity();
        let identity = identity.map_err(|e| fail("identity", &e))?;
        if identity.to_string() != vector.identity {
            return Err(format!("{}: identity not canonical", vector.name));
        }

        let addresses: Result<Vec<Multiaddr>, CoreError> = decoded.parse_addresses();
        let addresses = addresses.map_err(|e| fail("addresses", &e))?;
        let rendered: Vec<String> = addresses.iter().map(ToString::to_string).collect();
        if rendered != decoded.addresses {
            return Err(format!("{}: addresses not canonical: {rendered:?}", vector.name));
        }
    }

    Ok(())
}

/// Verify all golden vectors.
pub fn verify_all_vectors() -> Result<(), String> {
    all_vectors().iter().try_for_each(verify_vector)
}
