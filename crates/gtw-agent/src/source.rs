//! Config source capability.
//!
//! The authoritative desired configuration lives in a git remote. The
//! agent only needs two operations from it: "pull the latest into the
//! local checkout" and "what revision is checked out" (best-effort,
//! for reporting only). Both are expressed through the [`ConfigSource`]
//! trait so the reconciler never touches git directly.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{classify_git_error, AgentError, Result};

/// Outcome of a successful sync-step pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Whether the pull brought in new commits.
    pub changed: bool,
    /// Trimmed pull output, for logging.
    pub message: String,
}

/// External capability holding the desired configuration.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Pulls the latest configuration into the local working copy.
    async fn pull(&self) -> Result<SyncOutcome>;

    /// Returns the current revision identifier. Best-effort: callers
    /// use an empty string when this fails.
    async fn revision(&self) -> Result<String>;
}

/// Git-backed config source driving a `git` subprocess.
pub struct GitSource {
    /// Path to the local checkout.
    repo_path: PathBuf,
}

impl GitSource {
    /// Creates a source for the checkout at `repo_path`.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Returns the checkout path.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Checks if the directory is a git repository.
    pub fn is_git_repo(&self) -> bool {
        self.repo_path.join(".git").exists()
    }

    /// Runs a git command in the checkout directory.
    async fn run_git(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .current_dir(&self.repo_path)
            .args(args)
            .output()
            .await
            .map_err(|e| AgentError::SourceOperation(e.to_string()))
    }
}

#[async_trait]
impl ConfigSource for GitSource {
    async fn pull(&self) -> Result<SyncOutcome> {
        if !self.is_git_repo() {
            return Err(AgentError::SourceNotInitialized);
        }

        let output = self.run_git(&["pull", "--ff-only"]).await?;

        if !output.status.success() {
            return Err(classify_git_error(&format_git_error(&output)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = stdout.trim().to_string();
        let changed = !already_up_to_date(&stdout);

        Ok(SyncOutcome { changed, message })
    }

    async fn revision(&self) -> Result<String> {
        let output = self.run_git(&["rev-parse", "HEAD"]).await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(AgentError::SourceOperation(format_git_error(&output)))
        }
    }
}

/// Formats a git error with both stdout and stderr for better debugging.
pub(crate) fn format_git_error(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

    match (stderr.is_empty(), stdout.is_empty()) {
        (true, true) => format!(
            "Command failed with exit code {}",
            output.status.code().unwrap_or(-1)
        ),
        (true, false) => stdout,
        (false, true) => stderr,
        (false, false) => format!("{}\n{}", stderr, stdout),
    }
}

/// Detects the "nothing to pull" case from git pull output.
fn already_up_to_date(output: &str) -> bool {
    // Older git prints "Already up-to-date."
    output.contains("Already up to date") || output.contains("Already up-to-date")
}

/// Counts changed files from git pull output, for logging.
pub fn count_changed_files(output: &str) -> u32 {
    for line in output.lines() {
        if line.contains("file") && line.contains("changed") {
            for word in line.split_whitespace() {
                if let Ok(n) = word.parse::<u32>() {
                    return n;
                }
            }
        }
    }
    0
}
