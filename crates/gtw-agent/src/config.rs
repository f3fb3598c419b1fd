//! Process configuration surface.
//!
//! All options can be supplied as flags or environment variables. The
//! node identity is the only hard requirement: without it no heartbeat
//! can be attributed to this node, so startup fails fast.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command-line and environment configuration for the agent.
#[derive(Parser, Debug, Clone)]
#[command(name = "gtw-agent", version, about = "GitOps agent for Caddy gateway nodes")]
pub struct AgentConfig {
    /// Node identifier reported in every heartbeat (e.g. svr-gtw-nd1.uvrs.xyz).
    #[arg(long, env = "NODE_ID", default_value = "")]
    pub node_id: String,

    /// Directory holding the git-managed configuration checkout.
    #[arg(long, env = "GTW_CONFIG_DIR", default_value = "/etc/caddy")]
    pub config_dir: PathBuf,

    /// Path to the Caddyfile passed to validate and reload.
    #[arg(long, env = "GTW_CADDYFILE", default_value = "/etc/caddy/Caddyfile")]
    pub caddyfile: PathBuf,

    /// Base URL of the control plane receiving heartbeats.
    #[arg(long, env = "GTW_CONTROL_URL", default_value = "https://control.gtw.uvrs.xyz")]
    pub control_url: String,

    /// Seconds between reconciliation cycles.
    #[arg(long, env = "GTW_INTERVAL_SECS", default_value_t = 10)]
    pub interval_secs: u64,
}

impl AgentConfig {
    /// Returns the reconciliation interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Checks the startup precondition: a non-empty node identity.
    pub fn has_node_id(&self) -> bool {
        !self.node_id.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> AgentConfig {
        AgentConfig::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["gtw-agent", "--node-id", "nd1"]);
        assert_eq!(config.node_id, "nd1");
        assert_eq!(config.config_dir, PathBuf::from("/etc/caddy"));
        assert_eq!(config.caddyfile, PathBuf::from("/etc/caddy/Caddyfile"));
        assert_eq!(config.interval_secs, 10);
        assert_eq!(config.interval(), Duration::from_secs(10));
        assert!(config.has_node_id());
    }

    #[test]
    fn test_missing_node_id_detected() {
        let config = parse(&["gtw-agent"]);
        assert!(!config.has_node_id());
    }

    #[test]
    fn test_whitespace_node_id_rejected() {
        let config = parse(&["gtw-agent", "--node-id", "   "]);
        assert!(!config.has_node_id());
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "gtw-agent",
            "--node-id",
            "nd2",
            "--config-dir",
            "/srv/gateway",
            "--caddyfile",
            "/srv/gateway/Caddyfile",
            "--control-url",
            "https://control.example.com",
            "--interval-secs",
            "30",
        ]);
        assert_eq!(config.config_dir, PathBuf::from("/srv/gateway"));
        assert_eq!(config.control_url, "https://control.example.com");
        assert_eq!(config.interval(), Duration::from_secs(30));
    }
}
