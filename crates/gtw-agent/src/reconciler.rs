//! Reconciler: sync → validate-and-apply → report.
//!
//! One cycle attempts to bring the local config in line with the
//! source and the proxy's active state, then unconditionally attempts
//! to report status. The steps are strictly ordered and failure in an
//! earlier step never skips a later one; the one thing a cycle must
//! never do is promote a config that failed validation.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::applier::ConfigApplier;
use crate::heartbeat::{Heartbeat, HeartbeatSink};
use crate::source::{count_changed_files, ConfigSource, SyncOutcome};

/// Mutable per-node reconciliation state. Owned exclusively by the
/// reconciler; nothing else reads or writes it.
#[derive(Debug, Default)]
struct CycleState {
    /// Whether the most recent validate-and-apply step succeeded.
    last_reload_ok: bool,
}

/// Observable summary of one reconciliation cycle. Informational only;
/// no control flow depends on it.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Sync-step outcome, `None` when the pull failed.
    pub sync: Option<SyncOutcome>,
    /// Health flag value at the end of the cycle.
    pub reload_ok: bool,
    /// Whether the heartbeat was delivered.
    pub heartbeat_sent: bool,
    /// True when the cycle was skipped because another was in flight.
    pub skipped: bool,
}

/// Runs reconciliation cycles against the node's config source,
/// applier, and heartbeat sink.
pub struct Reconciler {
    node_id: String,
    caddyfile: PathBuf,
    source: Arc<dyn ConfigSource>,
    applier: Arc<dyn ConfigApplier>,
    sink: Arc<dyn HeartbeatSink>,
    /// Holds the health flag and doubles as the single-flight guard:
    /// a cycle owns the lock for its full sync→apply→report window.
    state: Mutex<CycleState>,
}

impl Reconciler {
    /// Creates a reconciler for the given node.
    pub fn new(
        node_id: String,
        caddyfile: PathBuf,
        source: Arc<dyn ConfigSource>,
        applier: Arc<dyn ConfigApplier>,
        sink: Arc<dyn HeartbeatSink>,
    ) -> Self {
        Self {
            node_id,
            caddyfile,
            source,
            applier,
            sink,
            state: Mutex::new(CycleState::default()),
        }
    }

    /// Returns the current health flag.
    pub async fn last_reload_ok(&self) -> bool {
        self.state.lock().await.last_reload_ok
    }

    /// Runs one reconciliation cycle.
    ///
    /// Skips (without an error) when another cycle is already in
    /// flight: two simultaneous reload invocations could race against
    /// each other and against the proxy's own state.
    pub async fn cycle(&self) -> CycleReport {
        let mut state = match self.state.try_lock() {
            Ok(state) => state,
            Err(_) => {
                info!("Cycle skipped: another cycle is already in progress");
                return CycleReport {
                    sync: None,
                    reload_ok: false,
                    heartbeat_sent: false,
                    skipped: true,
                };
            }
        };

        // Step 1: sync. A failed pull never aborts the cycle; the
        // existing on-disk config is still worth validating.
        let sync = match self.source.pull().await {
            Ok(outcome) => {
                if outcome.changed {
                    info!(
                        "Config updated via pull ({} files changed)",
                        count_changed_files(&outcome.message)
                    );
                } else {
                    debug!("Config already up to date");
                }
                Some(outcome)
            }
            Err(e) => {
                warn!("Pull failed, continuing with local config: {}", e);
                None
            }
        };

        // Step 2: validate, then apply only if valid.
        state.last_reload_ok = self.validate_and_apply().await;

        // Step 3: report, regardless of everything above.
        let heartbeat_sent = self.report(state.last_reload_ok).await;

        CycleReport {
            sync,
            reload_ok: state.last_reload_ok,
            heartbeat_sent,
            skipped: false,
        }
    }

    /// Validates the local config and reloads the proxy when valid.
    /// Returns the new health flag value.
    async fn validate_and_apply(&self) -> bool {
        if let Err(e) = self.applier.validate(&self.caddyfile).await {
            warn!("Validation failed, reload not attempted: {}", e);
            return false;
        }

        if let Err(e) = self.applier.apply(&self.caddyfile).await {
            warn!("Reload failed: {}", e);
            return false;
        }

        info!("Config validated and reloaded");
        true
    }

    /// Builds and sends one heartbeat. Delivery failure is logged and
    /// swallowed; it never affects reconciliation state.
    async fn report(&self, last_reload_ok: bool) -> bool {
        let git_sha = match self.source.revision().await {
            Ok(sha) => sha,
            Err(e) => {
                debug!("Revision lookup failed: {}", e);
                String::new()
            }
        };

        let caddy_version = match self.applier.version().await {
            Ok(version) => version,
            Err(e) => {
                debug!("Applier version lookup failed: {}", e);
                String::new()
            }
        };

        let heartbeat = Heartbeat::now(&self.node_id, git_sha, caddy_version, last_reload_ok);

        match self.sink.send(&heartbeat).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Heartbeat delivery failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::testing::{MockApplier, MockSink, MockSource};
    use std::time::Duration;

    fn reconciler(
        source: Arc<MockSource>,
        applier: Arc<MockApplier>,
        sink: Arc<MockSink>,
    ) -> Reconciler {
        Reconciler::new(
            "nd1".to_string(),
            PathBuf::from("/etc/caddy/Caddyfile"),
            source,
            applier,
            sink,
        )
    }

    #[tokio::test]
    async fn test_initial_health_flag_is_false() {
        let r = reconciler(
            Arc::new(MockSource::default()),
            Arc::new(MockApplier::default()),
            Arc::new(MockSink::default()),
        );
        assert!(!r.last_reload_ok().await);
    }

    #[tokio::test]
    async fn test_cycle_sets_health_flag_on_success() {
        let r = reconciler(
            Arc::new(MockSource::default()),
            Arc::new(MockApplier::default()),
            Arc::new(MockSink::default()),
        );

        let report = r.cycle().await;
        assert!(!report.skipped);
        assert!(report.reload_ok);
        assert!(r.last_reload_ok().await);
    }

    #[tokio::test]
    async fn test_validation_failure_skips_apply() {
        let applier = Arc::new(MockApplier::default());
        applier.fail_validate(AgentError::ConfigInvalid("syntax error".into()));

        let r = reconciler(
            Arc::new(MockSource::default()),
            applier.clone(),
            Arc::new(MockSink::default()),
        );

        let report = r.cycle().await;
        assert!(!report.reload_ok);
        assert_eq!(applier.apply_calls(), 0);
        assert!(!r.last_reload_ok().await);
    }

    #[tokio::test]
    async fn test_concurrent_cycles_single_flight() {
        // Slow apply stretches the first cycle's window so the second
        // cycle observes the in-flight guard.
        let applier = Arc::new(MockApplier::default());
        applier.set_apply_delay(Duration::from_millis(200));

        let r = Arc::new(reconciler(
            Arc::new(MockSource::default()),
            applier.clone(),
            Arc::new(MockSink::default()),
        ));

        let r1 = r.clone();
        let first = tokio::spawn(async move { r1.cycle().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = r.cycle().await;
        assert!(second.skipped);
        assert!(!second.heartbeat_sent);

        let first = first.await.unwrap();
        assert!(!first.skipped);
        assert_eq!(applier.apply_calls(), 1);
    }
}
