//! Strong type definitions for the Rendezvous Core.
//!
//! Identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;

use crate::error::{CoreError, Result};

/// The position issued to an instance when it enrolls.
///
/// Sequence numbers are 1-based, unique within a run, and totally ordered
/// across the cohort. A zero sequence number cannot be represented.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct SequenceNumber(NonZeroU64);

impl SequenceNumber {
    /// The first sequence number issued in a run.
    pub const FIRST: Self = Self(NonZeroU64::MIN);

    /// Create from a raw value, rejecting zero.
    pub fn new(value: u64) -> Result<Self> {
        NonZeroU64::new(value)
            .map(Self)
            .ok_or(CoreError::InvalidSequenceNumber(value))
    }

    /// Get the raw value.
    pub const fn get(&self) -> u64 {
        self.0.get()
    }

    /// Whether this is the first sequence number of the run.
    pub const fn is_first(&self) -> bool {
        self.0.get() == 1
    }
}

impl fmt::Debug for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for SequenceNumber {
    type Error = CoreError;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SequenceNumber> for u64 {
    fn from(seq: SequenceNumber) -> Self {
        seq.get()
    }
}

/// Opaque key identifying one client of the sync backend.
///
/// The backend uses it to count each instance at most once per state.
/// It is generated locally and never interpreted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantKey(pub [u8; 16]);

impl ParticipantKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Generate a random participant key.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for ParticipantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Participant({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for ParticipantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_number_rejects_zero() {
        assert!(SequenceNumber::new(0).is_err());
        assert_eq!(SequenceNumber::new(1).unwrap(), SequenceNumber::FIRST);
        assert!(SequenceNumber::FIRST.is_first());
        assert!(!SequenceNumber::new(2).unwrap().is_first());
    }

    #[test]
    fn test_sequence_number_serde_as_integer() {
        let seq = SequenceNumber::new(7).unwrap();
        let json = serde_json::to_string(&seq).unwrap();
        assert_eq!(json, "7");

        let back: SequenceNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, seq);

        assert!(serde_json::from_str::<SequenceNumber>("0").is_err());
    }

    #[test]
    fn test_participant_key_hex_roundtrip() {
        let key = ParticipantKey::random();
        let recovered = ParticipantKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key, recovered);
        assert!(ParticipantKey::from_hex("abcd").is_err());
    }
}
