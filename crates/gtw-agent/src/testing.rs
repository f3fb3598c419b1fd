//! Test doubles for the capability traits.
//!
//! Used by the crate's own unit and integration tests to script
//! per-step outcomes without subprocesses or a network.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::applier::ConfigApplier;
use crate::error::{AgentError, Result};
use crate::heartbeat::{Heartbeat, HeartbeatSink};
use crate::source::{ConfigSource, SyncOutcome};

fn clone_error(err: &AgentError) -> AgentError {
    match err {
        AgentError::SourceUnreachable(m) => AgentError::SourceUnreachable(m.clone()),
        AgentError::SourceDiverged(m) => AgentError::SourceDiverged(m.clone()),
        AgentError::SourceOperation(m) => AgentError::SourceOperation(m.clone()),
        AgentError::SourceNotInitialized => AgentError::SourceNotInitialized,
        AgentError::ConfigInvalid(m) => AgentError::ConfigInvalid(m.clone()),
        AgentError::ApplyFailed(m) => AgentError::ApplyFailed(m.clone()),
        AgentError::ReportUnreachable(m) => AgentError::ReportUnreachable(m.clone()),
    }
}

/// Scripted config source.
#[derive(Default)]
pub struct MockSource {
    pull_error: Mutex<Option<AgentError>>,
    revision_error: Mutex<Option<AgentError>>,
    changed: Mutex<bool>,
    pull_calls: AtomicUsize,
}

impl MockSource {
    /// Makes the next pulls report new commits.
    pub fn set_changed(&self, changed: bool) {
        *self.changed.lock().unwrap() = changed;
    }

    /// Makes pulls fail with the given error.
    pub fn fail_pull(&self, err: AgentError) {
        *self.pull_error.lock().unwrap() = Some(err);
    }

    /// Clears a scripted pull failure.
    pub fn recover_pull(&self) {
        *self.pull_error.lock().unwrap() = None;
    }

    /// Makes revision lookups fail.
    pub fn fail_revision(&self, err: AgentError) {
        *self.revision_error.lock().unwrap() = Some(err);
    }

    /// Number of pulls attempted.
    pub fn pull_calls(&self) -> usize {
        self.pull_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigSource for MockSource {
    async fn pull(&self) -> Result<SyncOutcome> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.pull_error.lock().unwrap().as_ref() {
            return Err(clone_error(err));
        }

        let changed = *self.changed.lock().unwrap();
        Ok(SyncOutcome {
            changed,
            message: if changed {
                "Fast-forward".to_string()
            } else {
                "Already up to date.".to_string()
            },
        })
    }

    async fn revision(&self) -> Result<String> {
        if let Some(err) = self.revision_error.lock().unwrap().as_ref() {
            return Err(clone_error(err));
        }
        Ok("0123456789abcdef0123456789abcdef01234567".to_string())
    }
}

/// Scripted config applier.
#[derive(Default)]
pub struct MockApplier {
    validate_error: Mutex<Option<AgentError>>,
    apply_error: Mutex<Option<AgentError>>,
    version_error: Mutex<Option<AgentError>>,
    apply_delay: Mutex<Option<Duration>>,
    validate_calls: AtomicUsize,
    apply_calls: AtomicUsize,
}

impl MockApplier {
    /// Makes validation fail with the given error.
    pub fn fail_validate(&self, err: AgentError) {
        *self.validate_error.lock().unwrap() = Some(err);
    }

    /// Clears a scripted validation failure.
    pub fn recover_validate(&self) {
        *self.validate_error.lock().unwrap() = None;
    }

    /// Makes apply fail with the given error.
    pub fn fail_apply(&self, err: AgentError) {
        *self.apply_error.lock().unwrap() = Some(err);
    }

    /// Makes version lookups fail.
    pub fn fail_version(&self, err: AgentError) {
        *self.version_error.lock().unwrap() = Some(err);
    }

    /// Stretches each apply call by `delay`.
    pub fn set_apply_delay(&self, delay: Duration) {
        *self.apply_delay.lock().unwrap() = Some(delay);
    }

    /// Number of validate calls observed.
    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    /// Number of apply calls observed.
    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigApplier for MockApplier {
    async fn validate(&self, _path: &Path) -> Result<()> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);

        match self.validate_error.lock().unwrap().as_ref() {
            Some(err) => Err(clone_error(err)),
            None => Ok(()),
        }
    }

    async fn apply(&self, _path: &Path) -> Result<()> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.apply_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.apply_error.lock().unwrap().as_ref() {
            Some(err) => Err(clone_error(err)),
            None => Ok(()),
        }
    }

    async fn version(&self) -> Result<String> {
        match self.version_error.lock().unwrap().as_ref() {
            Some(err) => Err(clone_error(err)),
            None => Ok("v2.8.4".to_string()),
        }
    }
}

/// Recording heartbeat sink.
#[derive(Default)]
pub struct MockSink {
    send_error: Mutex<Option<AgentError>>,
    sent: Mutex<Vec<Heartbeat>>,
    attempts: AtomicUsize,
}

impl MockSink {
    /// Makes sends fail with the given error.
    pub fn fail_send(&self, err: AgentError) {
        *self.send_error.lock().unwrap() = Some(err);
    }

    /// Heartbeats delivered so far. Failed sends are not recorded.
    pub fn sent(&self) -> Vec<Heartbeat> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of successful deliveries.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Number of delivery attempts, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HeartbeatSink for MockSink {
    async fn send(&self, heartbeat: &Heartbeat) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.send_error.lock().unwrap().as_ref() {
            return Err(clone_error(err));
        }
        self.sent.lock().unwrap().push(heartbeat.clone());
        Ok(())
    }
}
