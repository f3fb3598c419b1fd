//! Config applier capability.
//!
//! Wraps the proxy's own `validate` and `reload` subcommands. The
//! split matters: validate has no side effects, reload swaps the
//! active serving config. The reconciler relies on that contract to
//! guarantee an invalid config is never promoted.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{AgentError, Result};

/// External capability that validates and activates configuration.
#[async_trait]
pub trait ConfigApplier: Send + Sync {
    /// Validates the config at `path` without side effects.
    async fn validate(&self, path: &Path) -> Result<()>;

    /// Applies (reloads) the config at `path` into the running proxy.
    async fn apply(&self, path: &Path) -> Result<()>;

    /// Returns the applier's version string. Best-effort: callers use
    /// an empty string when this fails.
    async fn version(&self) -> Result<String>;
}

/// Caddy-backed applier driving the `caddy` binary.
pub struct CaddyApplier {
    binary: PathBuf,
}

impl CaddyApplier {
    /// Creates an applier using `caddy` from `PATH`.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("caddy"),
        }
    }

    /// Creates an applier using an explicit caddy binary path.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for CaddyApplier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigApplier for CaddyApplier {
    async fn validate(&self, path: &Path) -> Result<()> {
        let output = Command::new(&self.binary)
            .args(["validate", "--config"])
            .arg(path)
            .output()
            .await
            .map_err(|e| AgentError::ConfigInvalid(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(AgentError::ConfigInvalid(stderr))
        }
    }

    async fn apply(&self, path: &Path) -> Result<()> {
        let output = Command::new(&self.binary)
            .args(["reload", "--config"])
            .arg(path)
            .output()
            .await
            .map_err(|e| AgentError::ApplyFailed(e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(AgentError::ApplyFailed(stderr))
        }
    }

    async fn version(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("version")
            .output()
            .await
            .map_err(|e| AgentError::ApplyFailed(e.to_string()))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(AgentError::ApplyFailed(stderr))
        }
    }
}
