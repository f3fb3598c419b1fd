//! Node-local GitOps agent for Caddy gateway nodes.
//!
//! Keeps the node's reverse-proxy configuration synchronized with a
//! git-backed source and reports health to a control plane:
//! - pull the latest config into the local checkout
//! - validate it, and reload the proxy only when valid
//! - send a best-effort heartbeat regardless of how the cycle went

pub mod applier;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod reconciler;
pub mod scheduler;
pub mod source;
pub mod testing;

pub use applier::{CaddyApplier, ConfigApplier};
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use heartbeat::{Heartbeat, HeartbeatSink, HttpSink, AGENT_VERSION};
pub use reconciler::{CycleReport, Reconciler};
pub use scheduler::Scheduler;
pub use source::{ConfigSource, GitSource, SyncOutcome};
