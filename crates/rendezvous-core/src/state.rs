//! Synchronization states and the barrier targets derived from the cohort size.
//!
//! ## Protocol States
//!
//! | State          | Kind     | Target |
//! |----------------|----------|--------|
//! | `enrolled`     | enroll   | -      |
//! | `nodeCreated`  | barrier  | N      |
//! | `bootstrap`    | topic    | -      |
//! | `connected`    | barrier  | N - 1  |
//! | `done`         | barrier  | N      |
//!
//! The string names are part of the wire contract with the sync backend and
//! must not change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// A named synchronization point of the rendezvous protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    /// Sequence number issued.
    #[serde(rename = "enrolled")]
    Enrolled,
    /// Local endpoint constructed.
    #[serde(rename = "nodeCreated")]
    NodeCreated,
    /// Bootstrap info published (a topic, not a barrier).
    #[serde(rename = "bootstrap")]
    Bootstrap,
    /// Peer has dialed the bootstrap node.
    #[serde(rename = "connected")]
    Connected,
    /// Instance finished its work.
    #[serde(rename = "done")]
    Done,
}

impl SyncState {
    /// All states in protocol order.
    pub const ALL: [SyncState; 5] = [
        SyncState::Enrolled,
        SyncState::NodeCreated,
        SyncState::Bootstrap,
        SyncState::Connected,
        SyncState::Done,
    ];

    /// The wire name of this state.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncState::Enrolled => "enrolled",
            SyncState::NodeCreated => "nodeCreated",
            SyncState::Bootstrap => "bootstrap",
            SyncState::Connected => "connected",
            SyncState::Done => "done",
        }
    }

    /// Whether instances block on this state until a target is met.
    pub const fn is_barrier(&self) -> bool {
        matches!(
            self,
            SyncState::NodeCreated | SyncState::Connected | SyncState::Done
        )
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        SyncState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| CoreError::UnknownState(s.to_string()))
    }
}

/// The number of instances in the cohort (`N`).
///
/// Supplied by the run environment and identical for every instance.
/// A cohort always has at least one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct CohortSize(u64);

impl CohortSize {
    /// Create a cohort size, rejecting zero.
    pub fn new(n: u64) -> Result<Self> {
        if n == 0 {
            return Err(CoreError::EmptyCohort);
        }
        Ok(Self(n))
    }

    /// Get the participant count.
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Number of peer-role instances (everyone except the bootstrap).
    pub const fn peer_count(&self) -> u64 {
        self.0 - 1
    }

    /// Barrier target for a state, or `None` if the state is not a barrier.
    ///
    /// `connected` is only signaled by peers, so its target is `N - 1`,
    /// which is 0 for a cohort of one.
    pub const fn barrier_target(&self, state: SyncState) -> Option<u64> {
        match state {
            SyncState::NodeCreated | SyncState::Done => Some(self.0),
            SyncState::Connected => Some(self.peer_count()),
            SyncState::Enrolled | SyncState::Bootstrap => None,
        }
    }
}

impl fmt::Display for CohortSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u64> for CohortSize {
    type Error = CoreError;

    fn try_from(n: u64) -> Result<Self> {
        Self::new(n)
    }
}

impl From<CohortSize> for u64 {
    fn from(size: CohortSize) -> Self {
        size.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names_are_stable() {
        let names: Vec<&str> = SyncState::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec!["enrolled", "nodeCreated", "bootstrap", "connected", "done"]
        );
    }

    #[test]
    fn test_state_from_str_roundtrip() {
        for state in SyncState::ALL {
            assert_eq!(state.as_str().parse::<SyncState>().unwrap(), state);
        }
        assert!("NodeCreated".parse::<SyncState>().is_err());
    }

    #[test]
    fn test_state_serde_uses_wire_names() {
        let json = serde_json::to_string(&SyncState::NodeCreated).unwrap();
        assert_eq!(json, "\"nodeCreated\"");
    }

    #[test]
    fn test_barrier_targets() {
        let n = CohortSize::new(3).unwrap();
        assert_eq!(n.barrier_target(SyncState::Enrolled), None);
        assert_eq!(n.barrier_target(SyncState::NodeCreated), Some(3));
        assert_eq!(n.barrier_target(SyncState::Bootstrap), None);
        assert_eq!(n.barrier_target(SyncState::Connected), Some(2));
        assert_eq!(n.barrier_target(SyncState::Done), Some(3));
    }

    #[test]
    fn test_single_member_cohort_has_zero_peer_target() {
        let n = CohortSize::new(1).unwrap();
        assert_eq!(n.peer_count(), 0);
        assert_eq!(n.barrier_target(SyncState::Connected), Some(0));
    }

    #[test]
    fn test_empty_cohort_rejected() {
        assert!(matches!(CohortSize::new(0), Err(CoreError::EmptyCohort)));
    }

    #[test]
    fn test_barrier_states_match_targets() {
        let n = CohortSize::new(4).unwrap();
        for state in SyncState::ALL {
            assert_eq!(state.is_barrier(), n.barrier_target(state).is_some());
        }
    }
}
