//! Test fixtures and helpers.
//!
//! An in-process cohort: every instance shares one [`MemorySyncService`] and
//! one [`MemoryNetwork`], and runs as its own tokio task.

use std::sync::Arc;
use std::time::Duration;

use rendezvous::{Instance, InstanceConfig, MemorySink, RunEnv, RunOutcome};
use rendezvous_core::{CohortSize, PeerId};
use rendezvous_net::MemoryNetwork;
use rendezvous_sync::{MemorySyncService, SyncClient};
use tokio::task::JoinHandle;

/// A cohort of instances sharing an in-memory backend and network.
pub struct CohortFixture {
    pub backend: Arc<MemorySyncService>,
    pub network: MemoryNetwork,
    pub size: CohortSize,
    pub config: InstanceConfig,
}

/// A spawned instance.
pub struct InstanceHandle {
    /// Messages the instance recorded through its run environment.
    pub sink: Arc<MemorySink>,
    /// The running instance.
    pub task: JoinHandle<RunOutcome>,
}

impl CohortFixture {
    /// Create a fixture for a cohort of `n`, with a short settle delay.
    ///
    /// # Panics
    /// If `n` is zero.
    pub fn new(n: u64) -> Self {
        let size = CohortSize::new(n).unwrap_or_else(|e| panic!("cohort of {n}: {e}"));
        Self {
            backend: Arc::new(MemorySyncService::new()),
            network: MemoryNetwork::new(),
            size,
            config: InstanceConfig::default().with_settle_delay(Duration::from_millis(10)),
        }
    }

    /// Replace the instance configuration.
    pub fn with_config(mut self, config: InstanceConfig) -> Self {
        self.config = config;
        self
    }

    /// Build one instance without starting it.
    pub fn instance(&self) -> (Instance<MemorySyncService, MemoryNetwork>, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let instance = Instance::new(
            SyncClient::new(Arc::clone(&self.backend)),
            self.network.clone(),
            RunEnv::new(self.size, sink.clone()),
            self.config.clone(),
        );
        (instance, sink)
    }

    /// Start one instance on its own task.
    pub fn spawn(&self) -> InstanceHandle {
        let (instance, sink) = self.instance();
        InstanceHandle {
            sink,
            task: tokio::spawn(instance.run()),
        }
    }

    /// Start the whole cohort.
    pub fn spawn_all(&self) -> Vec<InstanceHandle> {
        (0..self.size.get()).map(|_| self.spawn()).collect()
    }

    /// Run the whole cohort to completion.
    ///
    /// # Panics
    /// If an instance task panics.
    pub async fn run(&self) -> Vec<RunOutcome> {
        let mut outcomes = Vec::new();
        for handle in self.spawn_all() {
            let outcome = handle
                .task
                .await
                .unwrap_or_else(|e| panic!("instance task failed: {e}"));
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Identities of every endpoint created so far.
    pub fn endpoints(&self) -> Vec<PeerId> {
        self.network.created()
    }

    /// How often `stop` was called on each endpoint, in creation order.
    pub fn stop_calls(&self) -> Vec<usize> {
        self.endpoints()
            .iter()
            .map(|peer| self.network.stop_calls(peer))
            .collect()
    }

    /// Wait until every created endpoint has been stopped at least once.
    ///
    /// Returns `false` if that did not happen within `within`.
    pub async fn wait_for_teardown(&self, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if self.stop_calls().iter().all(|calls| *calls > 0) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
