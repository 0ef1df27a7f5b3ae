//! Role resolution.
//!
//! The role of an instance is a pure function of its sequence number: the
//! first instance to enroll becomes the bootstrap node, everyone else is a
//! peer. The role is never stored separately from the sequence number.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::SequenceNumber;

/// What an instance does between the `nodeCreated` and `done` barriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Publishes its identity and addresses for everyone else.
    Bootstrap,
    /// Consumes the bootstrap announcement and dials the bootstrap node.
    Peer,
}

impl Role {
    /// Resolve the role for a sequence number.
    pub const fn resolve(seq: SequenceNumber) -> Self {
        if seq.is_first() {
            Role::Bootstrap
        } else {
            Role::Peer
        }
    }

    /// Whether this is the bootstrap role.
    pub const fn is_bootstrap(&self) -> bool {
        matches!(self, Role::Bootstrap)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Bootstrap => f.write_str("bootstrap"),
            Role::Peer => f.write_str("peer"),
        }
    }
}
