//! Convergence Poller
//!
//! After a mutation has been submitted, re-reads the resource at a fixed
//! interval until the operator reports a settled status, the status carries
//! the error marker, or the timeout elapses. A settled status only counts as
//! deployed once the generated connection profile can be fetched.

use crate::config::ConvergenceConfig;
use crate::crd::ComponentStatus;
use crate::domain::{ArtifactStore, ResourceRef, ResourceStore};
use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

// =============================================================================
// Outcome
// =============================================================================

/// Terminal classification of a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollOutcome {
    Deployed,
    Error,
    Timeout,
}

impl PollOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PollOutcome::Deployed)
    }
}

impl std::fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollOutcome::Deployed => write!(f, "deployed"),
            PollOutcome::Error => write!(f, "error"),
            PollOutcome::Timeout => write!(f, "timeout"),
        }
    }
}

/// Outcome plus the last observed state
#[derive(Debug, Clone)]
pub struct ConvergenceResult {
    pub outcome: PollOutcome,
    /// Last status snapshot read from the backend
    pub status: Option<ComponentStatus>,
    /// Connection profile bytes when deployed
    pub artifact: Option<Bytes>,
    /// Number of resource reads performed
    pub reads: u32,
    pub elapsed: Duration,
}

// =============================================================================
// Node Position
// =============================================================================

/// Where a resource sits in a (possibly multi-node) component; decides how
/// read failures are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePosition {
    /// Single-node component: read failures are retried until the timeout
    Single,
    /// First node of a multi-node component: a bounded number of
    /// consecutive read failures is tolerated
    First,
    /// Any later node: a read failure is fatal
    Subsequent,
}

impl NodePosition {
    /// Position of node `index` (zero based) in a component of `total` nodes
    pub fn of(index: usize, total: usize) -> Self {
        match (total, index) {
            (0..=1, _) => NodePosition::Single,
            (_, 0) => NodePosition::First,
            _ => NodePosition::Subsequent,
        }
    }
}

// =============================================================================
// Poll Settings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub first_node_read_failures: u32,
}

impl PollSettings {
    pub fn for_create(config: &ConvergenceConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            timeout: config.create_timeout(),
            first_node_read_failures: config.first_node_read_failures,
        }
    }

    pub fn for_update(config: &ConvergenceConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            timeout: config.update_timeout(),
            first_node_read_failures: config.first_node_read_failures,
        }
    }
}

// =============================================================================
// Convergence Poller
// =============================================================================

/// Waits for one backend resource to converge
pub struct ConvergencePoller<'a> {
    store: &'a dyn ResourceStore,
    artifacts: &'a dyn ArtifactStore,
    settings: PollSettings,
}

impl<'a> ConvergencePoller<'a> {
    pub fn new(
        store: &'a dyn ResourceStore,
        artifacts: &'a dyn ArtifactStore,
        settings: PollSettings,
    ) -> Self {
        Self {
            store,
            artifacts,
            settings,
        }
    }

    /// Poll `target` until it reaches a terminal state.
    ///
    /// Returns `Err` only when a read failure is fatal for the node position.
    pub async fn await_convergence(
        &self,
        target: &ResourceRef,
        position: NodePosition,
    ) -> Result<ConvergenceResult> {
        let start = Instant::now();
        let artifact_name = target.artifact_name();
        let mut last_status: Option<ComponentStatus> = None;
        let mut consecutive_failures = 0u32;
        let mut reads = 0u32;

        info!(
            target = %target,
            interval_ms = self.settings.interval.as_millis() as u64,
            timeout_secs = self.settings.timeout.as_secs(),
            "Waiting for component to converge"
        );

        loop {
            reads += 1;

            match self.store.get(target).await {
                Ok(obj) => {
                    consecutive_failures = 0;
                    last_status = obj.status;

                    if let Some(status) = &last_status {
                        debug!(
                            target = %target,
                            status_type = %status.status_type,
                            settled = status.is_settled(),
                            "Read component status"
                        );

                        if status.is_error() {
                            warn!(
                                target = %target,
                                reason = %status.reason,
                                message = %status.message,
                                "Component reported error status"
                            );
                            return Ok(self.finish(PollOutcome::Error, last_status, None, reads, start));
                        }

                        if status.is_settled() {
                            match self.artifacts.get_artifact(&target.namespace, &artifact_name).await {
                                Ok(Some(artifact)) => {
                                    info!(target = %target, reads, "Component deployed");
                                    return Ok(self.finish(
                                        PollOutcome::Deployed,
                                        last_status,
                                        Some(artifact),
                                        reads,
                                        start,
                                    ));
                                }
                                Ok(None) => {
                                    debug!(artifact = %artifact_name, "Connection profile not generated yet");
                                }
                                Err(e) => {
                                    debug!(artifact = %artifact_name, "Connection profile read failed (retrying): {}", e);
                                }
                            }
                        }
                    }
                }
                Err(e) => match position {
                    NodePosition::Single if e.is_transient() => {
                        debug!(target = %target, "Status read failed (retrying): {}", e);
                    }
                    NodePosition::Single => {
                        // Not expected to clear by itself, but the timeout
                        // still bounds the wait
                        warn!(target = %target, "Status read failed (retrying): {}", e);
                    }
                    NodePosition::First => {
                        consecutive_failures += 1;
                        if consecutive_failures > self.settings.first_node_read_failures {
                            error!(
                                target = %target,
                                failures = consecutive_failures,
                                "Giving up on first node after repeated read failures: {}",
                                e
                            );
                            return Err(e);
                        }
                        debug!(
                            target = %target,
                            failures = consecutive_failures,
                            "Status read failed on first node (retrying): {}",
                            e
                        );
                    }
                    NodePosition::Subsequent => {
                        error!(target = %target, "Status read failed: {}", e);
                        return Err(e);
                    }
                },
            }

            if start.elapsed() >= self.settings.timeout {
                warn!(
                    target = %target,
                    reads,
                    "Timed out waiting for component to converge"
                );
                return Ok(self.finish(PollOutcome::Timeout, last_status, None, reads, start));
            }

            tokio::time::sleep(self.settings.interval).await;
        }
    }

    fn finish(
        &self,
        outcome: PollOutcome,
        status: Option<ComponentStatus>,
        artifact: Option<Bytes>,
        reads: u32,
        start: Instant,
    ) -> ConvergenceResult {
        ConvergenceResult {
            outcome,
            status,
            artifact,
            reads,
            elapsed: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ComponentKind, ComponentObject, ComponentSpec, StatusType};
    use crate::error::Error;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Store that replays a scripted sequence of reads, repeating the last
    enum Read {
        Status(Option<ComponentStatus>),
        Fail,
        Denied,
        Malformed,
    }

    struct ScriptedStore {
        script: Mutex<VecDeque<Read>>,
        gets: AtomicU32,
    }

    impl ScriptedStore {
        fn new(script: Vec<Read>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                gets: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ResourceStore for ScriptedStore {
        async fn create(&self, obj: &ComponentObject) -> Result<ComponentObject> {
            Ok(obj.clone())
        }

        async fn get(&self, target: &ResourceRef) -> Result<ComponentObject> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let read = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().map(|r| match r {
                    Read::Status(s) => Read::Status(s.clone()),
                    Read::Fail => Read::Fail,
                    Read::Denied => Read::Denied,
                    Read::Malformed => Read::Malformed,
                })
            };
            match read {
                Some(Read::Status(status)) => {
                    let mut obj = ComponentObject::new(
                        target.kind,
                        target.namespace.clone(),
                        target.name.clone(),
                        ComponentSpec::default(),
                    );
                    obj.status = status;
                    Ok(obj)
                }
                Some(Read::Denied) => Err(Error::Backend("forbidden: cannot get resource".into())),
                Some(Read::Malformed) => {
                    Err(serde_json::from_str::<ComponentStatus>("{\"type\": 7}").unwrap_err().into())
                }
                _ => Err(Error::Backend("connection refused".into())),
            }
        }

        async fn update(&self, obj: &ComponentObject) -> Result<ComponentObject> {
            Ok(obj.clone())
        }

        async fn patch(&self, target: &ResourceRef, _: serde_json::Value) -> Result<ComponentObject> {
            self.get(target).await
        }

        async fn delete(&self, _: &ResourceRef) -> Result<()> {
            Ok(())
        }

        async fn list(
            &self,
            _: ComponentKind,
            _: &str,
            _: &BTreeMap<String, String>,
        ) -> Result<Vec<ComponentObject>> {
            Ok(vec![])
        }
    }

    struct FixedArtifacts(Option<Bytes>);

    #[async_trait]
    impl ArtifactStore for FixedArtifacts {
        async fn get_artifact(&self, _: &str, _: &str) -> Result<Option<Bytes>> {
            Ok(self.0.clone())
        }
    }

    fn settled(status_type: StatusType) -> Option<ComponentStatus> {
        Some(ComponentStatus {
            status_type,
            status: "True".into(),
            ..Default::default()
        })
    }

    fn settings(timeout_ms: u64, failures: u32) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(timeout_ms),
            first_node_read_failures: failures,
        }
    }

    fn target() -> ResourceRef {
        ResourceRef::new(ComponentKind::Orderer, "org1", "os1node1")
    }

    #[tokio::test]
    async fn test_deployed_after_deploying() {
        let store = ScriptedStore::new(vec![
            Read::Status(None),
            Read::Status(Some(ComponentStatus::default())),
            Read::Status(settled(StatusType::Deployed)),
        ]);
        let artifacts = FixedArtifacts(Some(Bytes::from_static(b"{}")));
        let poller = ConvergencePoller::new(&store, &artifacts, settings(2_000, 3));

        let result = poller.await_convergence(&target(), NodePosition::Single).await.unwrap();
        assert_eq!(result.outcome, PollOutcome::Deployed);
        assert_eq!(result.reads, 3);
        assert!(result.artifact.is_some());
    }

    #[tokio::test]
    async fn test_settled_without_artifact_times_out() {
        let store = ScriptedStore::new(vec![Read::Status(settled(StatusType::Deployed))]);
        let artifacts = FixedArtifacts(None);
        let poller = ConvergencePoller::new(&store, &artifacts, settings(40, 3));

        let result = poller.await_convergence(&target(), NodePosition::Single).await.unwrap();
        assert_eq!(result.outcome, PollOutcome::Timeout);
        assert_eq!(result.status, settled(StatusType::Deployed));
    }

    #[tokio::test]
    async fn test_error_status_stops_immediately() {
        let store = ScriptedStore::new(vec![Read::Status(settled(StatusType::Error))]);
        let artifacts = FixedArtifacts(Some(Bytes::from_static(b"{}")));
        let poller = ConvergencePoller::new(&store, &artifacts, settings(2_000, 3));

        let result = poller.await_convergence(&target(), NodePosition::Single).await.unwrap();
        assert_eq!(result.outcome, PollOutcome::Error);
        assert_eq!(result.reads, 1);
        assert_eq!(store.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_node_retries_read_failures() {
        let store = ScriptedStore::new(vec![
            Read::Fail,
            Read::Fail,
            Read::Fail,
            Read::Fail,
            Read::Status(settled(StatusType::Deployed)),
        ]);
        let artifacts = FixedArtifacts(Some(Bytes::from_static(b"{}")));
        let poller = ConvergencePoller::new(&store, &artifacts, settings(2_000, 0));

        let result = poller.await_convergence(&target(), NodePosition::Single).await.unwrap();
        assert_eq!(result.outcome, PollOutcome::Deployed);
        assert_eq!(result.reads, 5);
    }

    #[tokio::test]
    async fn test_first_node_bounded_failures() {
        let artifacts = FixedArtifacts(Some(Bytes::from_static(b"{}")));

        // Two failures are tolerated when two are allowed
        let store = ScriptedStore::new(vec![
            Read::Fail,
            Read::Fail,
            Read::Status(settled(StatusType::Deployed)),
        ]);
        let poller = ConvergencePoller::new(&store, &artifacts, settings(2_000, 2));
        let result = poller.await_convergence(&target(), NodePosition::First).await.unwrap();
        assert_eq!(result.outcome, PollOutcome::Deployed);

        // The third consecutive failure is fatal
        let store = ScriptedStore::new(vec![Read::Fail]);
        let poller = ConvergencePoller::new(&store, &artifacts, settings(2_000, 2));
        let result = poller.await_convergence(&target(), NodePosition::First).await;
        assert_matches!(result, Err(Error::Backend(_)));
        assert_eq!(store.gets.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_subsequent_node_failure_is_fatal() {
        let store = ScriptedStore::new(vec![Read::Fail, Read::Status(settled(StatusType::Deployed))]);
        let artifacts = FixedArtifacts(Some(Bytes::from_static(b"{}")));
        let poller = ConvergencePoller::new(&store, &artifacts, settings(2_000, 10));

        let result = poller.await_convergence(&target(), NodePosition::Subsequent).await;
        assert!(result.is_err());
        assert_eq!(store.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_node_retries_every_read_error() {
        let artifacts = FixedArtifacts(Some(Bytes::from_static(b"{}")));

        let store = ScriptedStore::new(vec![
            Read::Denied,
            Read::Malformed,
            Read::Status(settled(StatusType::Deployed)),
        ]);
        let poller = ConvergencePoller::new(&store, &artifacts, settings(2_000, 0));
        let result = poller.await_convergence(&target(), NodePosition::Single).await.unwrap();
        assert_eq!(result.outcome, PollOutcome::Deployed);
        assert_eq!(result.reads, 3);

        // A status the store cannot decode ends in a timeout, not an error
        let store = ScriptedStore::new(vec![Read::Malformed]);
        let poller = ConvergencePoller::new(&store, &artifacts, settings(40, 0));
        let result = poller.await_convergence(&target(), NodePosition::Single).await.unwrap();
        assert_eq!(result.outcome, PollOutcome::Timeout);
        assert!(result.reads > 1);
    }

    #[tokio::test]
    async fn test_first_node_budget_covers_permission_errors() {
        let artifacts = FixedArtifacts(Some(Bytes::from_static(b"{}")));
        let store = ScriptedStore::new(vec![Read::Denied, Read::Status(settled(StatusType::Deployed))]);
        let poller = ConvergencePoller::new(&store, &artifacts, settings(2_000, 1));

        let result = poller.await_convergence(&target(), NodePosition::First).await.unwrap();
        assert_eq!(result.outcome, PollOutcome::Deployed);
        assert_eq!(store.gets.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_node_position() {
        assert_eq!(NodePosition::of(0, 1), NodePosition::Single);
        assert_eq!(NodePosition::of(0, 3), NodePosition::First);
        assert_eq!(NodePosition::of(2, 3), NodePosition::Subsequent);
    }
}
