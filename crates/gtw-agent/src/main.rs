use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use tokio::sync::broadcast;

use gtw_agent::{
    AgentConfig, CaddyApplier, GitSource, HttpSink, Reconciler, Scheduler, AGENT_VERSION,
};

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = AgentConfig::parse();

    if !config.has_node_id() {
        error!("NODE_ID not set. Use --node-id or NODE_ID env var");
        std::process::exit(1);
    }

    info!(
        "gtw-agent {} starting (node: {})",
        AGENT_VERSION, config.node_id
    );

    let sink = match HttpSink::new(&config.control_url) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Failed to build heartbeat client: {}", e);
            std::process::exit(1);
        }
    };

    let reconciler = Arc::new(Reconciler::new(
        config.node_id.clone(),
        config.caddyfile.clone(),
        Arc::new(GitSource::new(&config.config_dir)),
        Arc::new(CaddyApplier::new()),
        Arc::new(sink),
    ));

    let scheduler = Arc::new(Scheduler::new(reconciler, config.interval()));
    let (trigger_tx, trigger_rx) = broadcast::channel(16);

    let runner = scheduler.clone();
    let loop_handle = tokio::spawn(async move { runner.run(trigger_rx).await });

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    scheduler.stop();
    // Wake the select loop so it observes the shutdown flag
    let _ = trigger_tx.send(());
    let _ = loop_handle.await;
}
