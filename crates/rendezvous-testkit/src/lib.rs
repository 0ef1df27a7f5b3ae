//! # Rendezvous Testkit
//!
//! Testing utilities for rendezvous.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: An in-process cohort harness sharing one sync backend and one network
//! - **Generators**: Proptest strategies for identities, addresses, and announcements
//! - **Golden vectors**: The exact JSON bytes of bootstrap announcements
//!
//! ## Golden Vectors
//!
//! ```rust
//! use rendezvous_testkit::vectors::{all_vectors, verify_all_vectors};
//!
//! assert!(!all_vectors().is_empty());
//! verify_all_vectors().unwrap();
//! ```
//!
//! ## Cohort Fixture
//!
//! ```rust,no_run
//! use rendezvous_testkit::fixtures::CohortFixture;
//!
//! async fn example() {
//!     let cohort = CohortFixture::new(3);
//!     let outcomes = cohort.run().await;
//!     assert!(outcomes.iter().all(|o| o.is_clean()));
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{CohortFixture, InstanceHandle};
pub use generators::{announcement, multiaddr, peer_id};
pub use vectors::{all_vectors, malformed_payloads, verify_all_vectors, GoldenVector};
