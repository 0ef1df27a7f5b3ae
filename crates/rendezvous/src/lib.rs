//! # Rendezvous
//!
//! Cohort rendezvous for peer-to-peer test instances.
//!
//! ## Overview
//!
//! A fixed number of independently started instances need to form one overlay
//! network without knowing anything about each other up front. Each instance:
//!
//! 1. Enrolls with the shared sync service and receives a sequence number
//! 2. Constructs its local network endpoint
//! 3. Waits until every instance has done the same (`nodeCreated`, N)
//! 4. Resolves its role: sequence number 1 is the bootstrap, everyone else a peer
//! 5. The bootstrap publishes its identity and addresses; peers take that one
//!    value, dial the bootstrap, and wait for each other (`connected`, N-1)
//! 6. Waits for the whole cohort to finish (`done`, N)
//! 7. Stops its endpoint, exactly once, however the run ended
//!
//! ## Key Types
//!
//! - [`Instance`] - One participant; [`Instance::run`] drives the whole protocol
//! - [`InstanceConfig`] - Settle delay and optional deadlines
//! - [`RunEnv`] - Cohort size and the progress message sink
//! - [`EndpointGuard`] - Owns the endpoint and stops it once
//! - [`RunOutcome`] - Protocol result and teardown status, kept apart
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rendezvous::{Instance, InstanceConfig, RunEnv, TracingSink};
//! use rendezvous::core::CohortSize;
//! use rendezvous::net::MemoryNetwork;
//! use rendezvous::sync::{MemorySyncService, SyncClient};
//!
//! async fn example() {
//!     let backend = Arc::new(MemorySyncService::new());
//!     let network = MemoryNetwork::new();
//!     let env = RunEnv::new(CohortSize::new(1).unwrap(), Arc::new(TracingSink));
//!
//!     let instance = Instance::new(
//!         SyncClient::new(backend),
//!         network,
//!         env,
//!         InstanceConfig::default(),
//!     );
//!     let report = instance.run().await.into_result().unwrap();
//!     assert!(report.role.is_bootstrap());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `rendezvous::core` - Sequence numbers, roles, states, identities, announcements
//! - `rendezvous::sync` - The sync service and its backends
//! - `rendezvous::net` - Endpoints and address books

pub mod config;
pub mod error;
pub mod exchange;
pub mod guard;
pub mod protocol;
pub mod runenv;

pub use config::{InstanceConfig, DEFAULT_SETTLE_DELAY, DEFAULT_STOP_TIMEOUT};
pub use error::{InstanceError, Result};
pub use guard::{EndpointGuard, TeardownStatus};
pub use protocol::{Instance, RunOutcome, RunReport};
pub use runenv::{MemorySink, MessageSink, RunEnv, RunParams, TracingSink};

// Re-export component crates
pub use rendezvous_core as core;
pub use rendezvous_net as net;
pub use rendezvous_sync as sync;

// Re-export commonly used core types
pub use rendezvous_core::{CohortSize, Role, SequenceNumber, SyncState};
