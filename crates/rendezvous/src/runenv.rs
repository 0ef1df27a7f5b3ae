//! Run environment: what the harness tells an instance, and where it reports back.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rendezvous_core::CohortSize;

use crate::error::{InstanceError, Result};

/// Receives human-readable progress messages from an instance.
///
/// Used only for observability; nothing reads these back.
pub trait MessageSink: Send + Sync {
    /// Record one message.
    fn record_message(&self, message: &str);
}

/// Forwards messages to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn record_message(&self, message: &str) {
        tracing::info!(target: "rendezvous::runenv", "{message}");
    }
}

/// Keeps messages in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message recorded so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MessageSink for MemorySink {
    fn record_message(&self, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}

/// The environment one instance runs in.
#[derive(Clone)]
pub struct RunEnv {
    participant_count: CohortSize,
    sink: Arc<dyn MessageSink>,
}

impl RunEnv {
    /// Create an environment for a cohort of `participant_count`.
    pub fn new(participant_count: CohortSize, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            participant_count,
            sink,
        }
    }

    /// The cohort size `N`.
    pub fn participant_count(&self) -> CohortSize {
        self.participant_count
    }

    /// Report a progress message.
    pub fn record_message(&self, message: impl AsRef<str>) {
        self.sink.record_message(message.as_ref());
    }

    /// The sink messages go to.
    pub fn sink(&self) -> &Arc<dyn MessageSink> {
        &self.sink
    }
}

impl std::fmt::Debug for RunEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunEnv")
            .field("participant_count", &self.participant_count)
            .finish_non_exhaustive()
    }
}

/// Parameters for a standalone instance process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParams {
    /// Cohort size (`TEST_INSTANCE_COUNT`).
    pub participant_count: CohortSize,
    /// Run namespace in the sync database (`TEST_RUN`).
    pub run_id: String,
    /// SQLite file shared by the cohort (`RENDEZVOUS_SYNC_DB`).
    pub sync_db: PathBuf,
    /// Address to listen on (`RENDEZVOUS_LISTEN_IP`).
    pub listen_ip: IpAddr,
    /// Override of the settle delay (`RENDEZVOUS_SETTLE_MS`).
    pub settle_delay: Option<Duration>,
    /// Whole-run watchdog (`RENDEZVOUS_TIMEOUT_SECS`).
    pub timeout: Duration,
}

/// Default whole-run watchdog.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

impl RunParams {
    /// Read parameters from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read parameters through an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let count = lookup("TEST_INSTANCE_COUNT")
            .ok_or_else(|| InstanceError::Config("TEST_INSTANCE_COUNT is not set".into()))?;
        let count: u64 = parse("TEST_INSTANCE_COUNT", &count)?;
        let participant_count = CohortSize::new(count)
            .map_err(|e| InstanceError::Config(format!("TEST_INSTANCE_COUNT: {e}")))?;

        let run_id = lookup("TEST_RUN").unwrap_or_else(|| "local".to_string());

        let sync_db = lookup("RENDEZVOUS_SYNC_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(format!("rendezvous-{run_id}.db")));

        let listen_ip = match lookup("RENDEZVOUS_LISTEN_IP") {
            Some(ip) => parse("RENDEZVOUS_LISTEN_IP", &ip)?,
            None => IpAddr::V4(Ipv4Addr::LOCALHOST),
        };

        let settle_delay = lookup("RENDEZVOUS_SETTLE_MS")
            .map(|ms| parse("RENDEZVOUS_SETTLE_MS", &ms).map(Duration::from_millis))
            .transpose()?;

        let timeout = lookup("RENDEZVOUS_TIMEOUT_SECS")
            .map(|secs| parse("RENDEZVOUS_TIMEOUT_SECS", &secs).map(Duration::from_secs))
            .transpose()?
            .unwrap_or(DEFAULT_RUN_TIMEOUT);

        Ok(Self {
            participant_count,
            run_id,
            sync_db,
            listen_ip,
            settle_delay,
            timeout,
        })
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| InstanceError::Config(format!("{key}={value:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let params = RunParams::from_lookup(lookup(&[("TEST_INSTANCE_COUNT", "3")])).unwrap();

        assert_eq!(params.participant_count.get(), 3);
        assert_eq!(params.run_id, "local");
        assert_eq!(params.listen_ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(params.settle_delay, None);
        assert_eq!(params.timeout, DEFAULT_RUN_TIMEOUT);
        assert!(params.sync_db.ends_with("rendezvous-local.db"));
    }

    #[test]
    fn test_overrides() {
        let params = RunParams::from_lookup(lookup(&[
            ("TEST_INSTANCE_COUNT", "5"),
            ("TEST_RUN", "r42"),
            ("RENDEZVOUS_SYNC_DB", "/tmp/x.db"),
            ("RENDEZVOUS_LISTEN_IP", "0.0.0.0"),
            ("RENDEZVOUS_SETTLE_MS", "250"),
            ("RENDEZVOUS_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(params.run_id, "r42");
        assert_eq!(params.sync_db, PathBuf::from("/tmp/x.db"));
        assert_eq!(params.listen_ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(params.settle_delay, Some(Duration::from_millis(250)));
        assert_eq!(params.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_or_bad_count() {
        assert!(RunParams::from_lookup(lookup(&[])).is_err());
        assert!(RunParams::from_lookup(lookup(&[("TEST_INSTANCE_COUNT", "0")])).is_err());
        assert!(RunParams::from_lookup(lookup(&[("TEST_INSTANCE_COUNT", "three")])).is_err());
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = Arc::new(MemorySink::new());
        let env = RunEnv::new(CohortSize::new(2).unwrap(), sink.clone());

        env.record_message("first");
        env.record_message(String::from("second"));
        assert_eq!(sink.messages(), vec!["first", "second"]);
    }
}
