//! The per-instance synchronization state machine.
//!
//! ```text
//! enroll ──► create endpoint ──► wait(nodeCreated, N)
//!                                     │
//!                 ┌───── bootstrap ───┴──── peer ──────────┐
//!                 │                                        │
//!          publish(bootstrap)                 subscribe, take one, cancel
//!                 │                           address book, dial, settle
//!                 │                             wait(connected, N-1)
//!                 └──────────────┬─────────────────────────┘
//!                          wait(done, N)
//!                                │
//!                            teardown
//! ```
//!
//! Any failure before teardown aborts the remaining steps. Teardown always runs.

use std::time::Duration;

use rendezvous_core::{BootstrapAnnouncement, PeerId, Role, SequenceNumber, SyncState};
use rendezvous_net::{Endpoint, EndpointFactory};
use rendezvous_sync::{SyncClient, SyncService};
use tracing::Instrument;

use crate::config::InstanceConfig;
use crate::error::{InstanceError, Result};
use crate::exchange;
use crate::guard::{EndpointGuard, TeardownStatus};
use crate::runenv::RunEnv;

/// What a successful run established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Sequence number issued at enrollment.
    pub seq: SequenceNumber,
    /// Role derived from the sequence number.
    pub role: Role,
    /// This instance's endpoint identity.
    pub peer_id: PeerId,
    /// The announcement published (bootstrap) or received (peer).
    pub announcement: BootstrapAnnouncement,
    /// The bootstrap identity this instance dialed, for peers.
    pub dialed: Option<PeerId>,
}

/// The full result of a run: protocol outcome and teardown outcome, kept apart.
#[derive(Debug)]
pub struct RunOutcome {
    /// Whether the protocol completed.
    pub protocol: Result<RunReport>,
    /// How teardown went; `None` if no endpoint was ever created.
    pub teardown: Option<TeardownStatus>,
}

impl RunOutcome {
    /// The protocol result. Teardown problems never turn into an error here.
    pub fn into_result(self) -> Result<RunReport> {
        self.protocol
    }

    /// Whether both the protocol and teardown went cleanly.
    pub fn is_clean(&self) -> bool {
        self.protocol.is_ok() && self.teardown.as_ref().map_or(true, TeardownStatus::is_clean)
    }
}

/// One participant of a cohort.
pub struct Instance<S: SyncService + ?Sized, F: EndpointFactory> {
    client: SyncClient<S>,
    factory: F,
    env: RunEnv,
    config: InstanceConfig,
}

impl<S, F> Instance<S, F>
where
    S: SyncService + ?Sized,
    F: EndpointFactory,
{
    /// Create an instance.
    pub fn new(client: SyncClient<S>, factory: F, env: RunEnv, config: InstanceConfig) -> Self {
        Self {
            client,
            factory,
            env,
            config,
        }
    }

    /// Run the protocol to completion, then tear down.
    ///
    /// Dropping the returned future before it completes still stops the
    /// endpoint, on a spawned task.
    pub async fn run(self) -> RunOutcome {
        let span = tracing::info_span!(
            "instance",
            n = self.env.participant_count().get(),
            seq = tracing::field::Empty
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) -> RunOutcome {
        let seq = match self.client.enroll(SyncState::Enrolled.as_str()).await {
            Ok(seq) => seq,
            Err(e) => return self.failed_before_endpoint(InstanceError::Enrollment(e)),
        };
        tracing::Span::current().record("seq", seq.get());
        self.env.record_message(format!("enrolled with sequence number {seq}"));

        let endpoint = match self.factory.create().await {
            Ok(endpoint) => endpoint,
            Err(e) => return self.failed_before_endpoint(InstanceError::EndpointCreation(e)),
        };
        self.env.record_message(format!("peer id: {}", endpoint.peer_id()));

        let guard = EndpointGuard::new(
            endpoint,
            self.config.stop_timeout,
            self.env.sink().clone(),
        );

        let protocol = self.drive(seq, guard.endpoint()).await;
        if let Err(e) = &protocol {
            tracing::error!(error = %e, "protocol aborted");
            self.env.record_message(format!("protocol aborted: {e}"));
        }

        let teardown = guard.release().await;
        RunOutcome {
            protocol,
            teardown: Some(teardown),
        }
    }

    fn failed_before_endpoint(&self, error: InstanceError) -> RunOutcome {
        tracing::error!(error = %error, "protocol aborted before endpoint creation");
        self.env.record_message(format!("protocol aborted: {error}"));
        RunOutcome {
            protocol: Err(error),
            teardown: None,
        }
    }

    async fn drive(&self, seq: SequenceNumber, endpoint: &F::Endpoint) -> Result<RunReport> {
        let peer_id = endpoint.peer_id();

        self.wait(SyncState::NodeCreated).await?;

        let role = Role::resolve(seq);
        self.env
            .record_message(format!("resolved role {role} for sequence number {seq}"));
        tracing::info!(%role, %peer_id, "all endpoints created");

        let (announcement, dialed) = match role {
            Role::Bootstrap => {
                let announcement = exchange::announce(&self.client, endpoint).await?;
                (announcement, None)
            }
            Role::Peer => {
                let announcement =
                    exchange::await_bootstrap(&self.client, self.config.subscribe_timeout).await?;
                let dialed =
                    exchange::connect(endpoint, &announcement, self.config.settle_delay).await?;
                self.env.record_message(format!("connected to bootstrap {dialed}"));

                self.wait(SyncState::Connected).await?;
                (announcement, Some(dialed))
            }
        };

        self.wait(SyncState::Done).await?;
        self.env.record_message("all instances done");

        Ok(RunReport {
            seq,
            role,
            peer_id,
            announcement,
            dialed,
        })
    }

    /// Signal `state` and wait for its cohort-derived target.
    async fn wait(&self, state: SyncState) -> Result<()> {
        let target = self
            .env
            .participant_count()
            .barrier_target(state)
            .ok_or(InstanceError::NotABarrier(state))?;

        tracing::debug!(%state, target, "waiting on barrier");
        let signal = self.client.signal_and_wait(state.as_str(), target);

        let signaled = match self.config.barrier_timeout {
            Some(after) => tokio::time::timeout(after, signal)
                .await
                .map_err(|_| deadline(state, after))?,
            None => signal.await,
        };
        signaled.map_err(|source| InstanceError::Barrier { state, source })?;

        tracing::info!(%state, target, "barrier released");
        Ok(())
    }
}

fn deadline(state: SyncState, after: Duration) -> InstanceError {
    InstanceError::DeadlineExceeded {
        phase: state.to_string(),
        after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runenv::MemorySink;
    use rendezvous_core::CohortSize;
    use rendezvous_net::MemoryNetwork;
    use rendezvous_sync::MemorySyncService;
    use std::sync::Arc;

    fn instance(
        backend: &Arc<MemorySyncService>,
        network: &MemoryNetwork,
        n: u64,
        config: InstanceConfig,
    ) -> Instance<MemorySyncService, MemoryNetwork> {
        Instance::new(
            SyncClient::new(Arc::clone(backend)),
            network.clone(),
            RunEnv::new(CohortSize::new(n).unwrap(), Arc::new(MemorySink::new())),
            config,
        )
    }

    #[tokio::test]
    async fn test_single_instance_completes_alone() {
        let backend = Arc::new(MemorySyncService::new());
        let network = MemoryNetwork::new();

        let outcome = instance(&backend, &network, 1, InstanceConfig::default())
            .run()
            .await;

        assert!(outcome.is_clean());
        let report = outcome.into_result().unwrap();
        assert_eq!(report.role, Role::Bootstrap);
        assert_eq!(report.dialed, None);
        assert_eq!(network.stop_calls(&report.peer_id), 1);
        assert_eq!(backend.published("bootstrap").len(), 1);
    }

    #[tokio::test]
    async fn test_message_trail_names_endpoint_and_teardown() {
        let backend = Arc::new(MemorySyncService::new());
        let network = MemoryNetwork::new();
        let sink = Arc::new(MemorySink::new());

        let outcome = Instance::new(
            SyncClient::new(Arc::clone(&backend)),
            network.clone(),
            RunEnv::new(CohortSize::new(1).unwrap(), sink.clone()),
            InstanceConfig::default(),
        )
        .run()
        .await;
        let report = outcome.into_result().unwrap();

        let messages = sink.messages();
        let position = |wanted: &str| {
            messages
                .iter()
                .position(|m| m == wanted)
                .unwrap_or_else(|| panic!("missing {wanted:?} in {messages:?}"))
        };
        let enrolled = position("enrolled with sequence number 1");
        let created = position(&format!("peer id: {}", report.peer_id));
        let done = position("all instances done");
        let stopping = position("stopping node");
        assert!(enrolled < created && created < done && done < stopping);
    }

    #[tokio::test]
    async fn test_pair_connects() {
        let backend = Arc::new(MemorySyncService::new());
        let network = MemoryNetwork::new();
        let config = InstanceConfig::default().with_settle_delay(Duration::ZERO);

        let a = tokio::spawn(instance(&backend, &network, 2, config.clone()).run());
        let b = tokio::spawn(instance(&backend, &network, 2, config).run());

        let a = a.await.unwrap().into_result().unwrap();
        let b = b.await.unwrap().into_result().unwrap();

        let (bootstrap, peer) = if a.role == Role::Bootstrap { (a, b) } else { (b, a) };
        assert_eq!(peer.dialed, Some(bootstrap.peer_id));
        assert_eq!(peer.announcement, bootstrap.announcement);
    }

    #[tokio::test]
    async fn test_barrier_deadline() {
        let backend = Arc::new(MemorySyncService::new());
        let network = MemoryNetwork::new();
        let config = InstanceConfig::default().with_barrier_timeout(Duration::from_millis(30));

        let outcome = instance(&backend, &network, 2, config).run().await;

        let err = outcome.protocol.as_ref().unwrap_err();
        assert!(err.is_deadline());
        assert!(err.to_string().contains("nodeCreated"));
        assert_eq!(outcome.teardown, Some(TeardownStatus::Stopped));
    }

    #[tokio::test]
    async fn test_enrollment_failure_has_no_teardown() {
        let backend = Arc::new(MemorySyncService::new());
        backend.shutdown();
        let network = MemoryNetwork::new();

        let outcome = instance(&backend, &network, 1, InstanceConfig::default())
            .run()
            .await;

        assert!(matches!(outcome.protocol, Err(InstanceError::Enrollment(_))));
        assert!(outcome.teardown.is_none());
        assert!(network.created().is_empty());
    }
}
