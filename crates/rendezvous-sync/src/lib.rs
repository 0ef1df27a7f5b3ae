//! # Rendezvous Sync
//!
//! The coordination backend shared by every instance of a cohort. Provides
//! sequence-number issuance, named barriers, and topic-based publish/subscribe
//! behind the [`SyncService`] trait, with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`SyncService`] - The async trait every backend implements
//! - [`SyncClient`] - Per-instance handle carrying the participant key
//! - [`Subscription`] - Lazy stream of values published on a topic
//! - [`MemorySyncService`] - In-process backend for tests and local cohorts
//! - [`SqliteSyncService`] - File-backed backend for separate processes on one host
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rendezvous_core::SyncState;
//! use rendezvous_sync::{MemorySyncService, SyncClient};
//!
//! async fn example() {
//!     let backend = Arc::new(MemorySyncService::new());
//!     let client = SyncClient::new(backend);
//!
//!     let seq = client.enroll(SyncState::Enrolled.as_str()).await.unwrap();
//!     client.signal_and_wait(SyncState::NodeCreated.as_str(), 1).await.unwrap();
//!     # let _ = seq;
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent signals**: a participant signaling the same state twice counts once
//!   and keeps its original position
//! - **Monotonic barriers**: counts never decrease within a run
//! - **Replaying topics**: subscribers see every value ever published on the topic, in order
//! - **Explicit release**: cancelling (or dropping) a [`Subscription`] stops its backend task

pub mod client;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod subscription;
pub mod traits;

pub use client::SyncClient;
pub use error::{Result, SyncServiceError};
pub use memory::MemorySyncService;
pub use sqlite::{SqliteSyncConfig, SqliteSyncService};
pub use subscription::Subscription;
pub use traits::{SyncService, SyncServiceExt};
