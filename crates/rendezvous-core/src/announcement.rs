//! The bootstrap announcement: the only structured message this protocol
//! puts on the wire.
//!
//! ## Wire Format
//!
//! A JSON object with exactly two fields, in this order:
//!
//! ```json
//! {"identity":"<canonical peer id>","addresses":["/ip4/1.2.3.4/tcp/1"]}
//! ```
//!
//! `identity` is the canonical string form of the endpoint identity and
//! `addresses` is the ordered list of multiaddr strings. The record keeps the
//! values as strings so that it can be carried, compared, and recorded without
//! knowing which endpoint implementation produced it. Decoding into native
//! types is a separate, fallible step.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Topic the bootstrap instance publishes its announcement on.
pub const BOOTSTRAP_TOPIC: &str = "bootstrap";

/// Size limits enforced when decoding an announcement.
pub mod limits {
    /// Max encoded size of an announcement in bytes.
    pub const MAX_ANNOUNCEMENT_BYTES: usize = 16 * 1024;
    /// Max addresses in one announcement.
    pub const MAX_ADDRESSES: usize = 64;
}

/// `{identity, addresses}` published by the bootstrap instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapAnnouncement {
    /// Canonical textual encoding of the endpoint identity.
    pub identity: String,
    /// Textual encodings of the endpoint's addresses, in order.
    pub addresses: Vec<String>,
}

impl BootstrapAnnouncement {
    /// Build an announcement from native identity and address values.
    pub fn new<I, A>(identity: &I, addresses: &[A]) -> Self
    where
        I: Display,
        A: Display,
    {
        Self {
            identity: identity.to_string(),
            addresses: addresses.iter().map(ToString::to_string).collect(),
        }
    }

    /// Encode to the JSON wire form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// Decode from the JSON wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > limits::MAX_ANNOUNCEMENT_BYTES {
            return Err(CoreError::MalformedAnnouncement(format!(
                "{} bytes exceeds limit of {}",
                bytes.len(),
                limits::MAX_ANNOUNCEMENT_BYTES
            )));
        }

        let announcement: Self = serde_json::from_slice(bytes)
            .map_err(|e| CoreError::MalformedAnnouncement(e.to_string()))?;
        announcement.validate_limits()?;
        Ok(announcement)
    }

    /// Check structural limits.
    pub fn validate_limits(&self) -> Result<()> {
        if self.identity.is_empty() {
            return Err(CoreError::MalformedAnnouncement("empty identity".into()));
        }
        if self.addresses.len() > limits::MAX_ADDRESSES {
            return Err(CoreError::MalformedAnnouncement(format!(
                "too many addresses: {}",
                self.addresses.len()
            )));
        }
        Ok(())
    }

    /// Parse the identity into its native representation.
    pub fn parse_identity<I>(&self) -> Result<I>
    where
        I: FromStr,
        I::Err: Display,
    {
        self.identity.parse().map_err(|e: I::Err| {
            CoreError::MalformedAnnouncement(format!("identity {:?}: {e}", self.identity))
        })
    }

    /// Parse every address into its native representation, preserving order.
    pub fn parse_addresses<A>(&self) -> Result<Vec<A>>
    where
        A: FromStr,
        A::Err: Display,
    {
        self.addresses
            .iter()
            .map(|addr| {
                addr.parse().map_err(|e: A::Err| {
                    CoreError::MalformedAnnouncement(format!("address {addr:?}: {e}"))
                })
            })
            .collect()
    }
}
