//! Agent-specific error types.

use thiserror::Error;

/// Errors that can occur during a reconciliation cycle.
///
/// None of these are fatal to the process: sync and apply failures are
/// contained within the cycle and surfaced through the health flag,
/// report failures are logged and dropped. The only fatal condition in
/// the agent is a missing node identity at startup, which is handled
/// before any of these can occur.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Config source unreachable: {0}")]
    SourceUnreachable(String),

    #[error("Config source diverged from upstream: {0}")]
    SourceDiverged(String),

    #[error("Config source operation failed: {0}")]
    SourceOperation(String),

    #[error("Config source not initialized (not a git repository)")]
    SourceNotInitialized,

    #[error("Configuration failed validation: {0}")]
    ConfigInvalid(String),

    #[error("Applying configuration failed: {0}")]
    ApplyFailed(String),

    #[error("Heartbeat delivery failed: {0}")]
    ReportUnreachable(String),
}

impl AgentError {
    /// Returns true if the error originated in the sync step, meaning
    /// the cycle continues on whatever config is currently on disk.
    pub fn is_sync_failure(&self) -> bool {
        matches!(
            self,
            AgentError::SourceUnreachable(_)
                | AgentError::SourceDiverged(_)
                | AgentError::SourceOperation(_)
                | AgentError::SourceNotInitialized
        )
    }
}

/// Classifies a git stderr string into a more specific error variant.
pub fn classify_git_error(stderr: &str) -> AgentError {
    let lower = stderr.to_lowercase();

    if lower.contains("could not resolve host")
        || lower.contains("connection refused")
        || lower.contains("connection timed out")
        || lower.contains("network is unreachable")
        || lower.contains("unable to access")
        || lower.contains("failed to connect")
        || lower.contains("couldn't connect to server")
        || lower.contains("the remote end hung up unexpectedly")
    {
        return AgentError::SourceUnreachable(stderr.trim().to_string());
    }

    if lower.contains("not possible to fast-forward")
        || lower.contains("non-fast-forward")
        || lower.contains("divergent branches")
        || lower.contains("merge conflict")
        || (lower.contains("conflict") && lower.contains("merge"))
    {
        return AgentError::SourceDiverged(stderr.trim().to_string());
    }

    AgentError::SourceOperation(stderr.trim().to_string())
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_network_error() {
        let err = classify_git_error("fatal: unable to access 'https://example.com/': Could not resolve host: example.com");
        assert!(matches!(err, AgentError::SourceUnreachable(_)));
        assert!(err.is_sync_failure());
    }

    #[test]
    fn test_classify_diverged() {
        let err = classify_git_error("fatal: Not possible to fast-forward, aborting.");
        assert!(matches!(err, AgentError::SourceDiverged(_)));

        let err = classify_git_error("hint: You have divergent branches and need to specify how to reconcile them.");
        assert!(matches!(err, AgentError::SourceDiverged(_)));
    }

    #[test]
    fn test_classify_fallback() {
        let err = classify_git_error("fatal: bad object HEAD");
        assert!(matches!(err, AgentError::SourceOperation(_)));
    }

    #[test]
    fn test_apply_errors_are_not_sync_failures() {
        assert!(!AgentError::ConfigInvalid("bad".into()).is_sync_failure());
        assert!(!AgentError::ApplyFailed("bad".into()).is_sync_failure());
        assert!(!AgentError::ReportUnreachable("bad".into()).is_sync_failure());
    }
}
