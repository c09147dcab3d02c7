//! Traffic Sentinel service
//!
//! This is the main entry point for the traffic analysis service. It
//! initializes logging and configuration, wires the in-memory store and
//! the logging collaborators, and runs the periodic scheduler until
//! interrupted.

use std::sync::Arc;

use dotenv::dotenv;
use log::info;

use traffic_sentinel::audit::{AuditSink, LogAuditSink};
use traffic_sentinel::config;
use traffic_sentinel::core::scheduler::schedule_core_tasks;
use traffic_sentinel::core::{AlertEngine, Scheduler};
use traffic_sentinel::notify::{LogNotifier, Notifier};
use traffic_sentinel::store::memory::MemoryStore;
use traffic_sentinel::store::{RuleStore, TrafficStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    info!("Starting Traffic Sentinel...");

    // Load and validate configuration
    let config = config::load_config()?;

    // Wire the store and collaborators
    let store = Arc::new(MemoryStore::new());
    let traffic_store: Arc<dyn TrafficStore> = store.clone();
    let rule_store: Arc<dyn RuleStore> = store;
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let audit: Arc<dyn AuditSink> = Arc::new(LogAuditSink);

    let alert_engine = Arc::new(AlertEngine::new(
        rule_store,
        notifier.clone(),
        audit.clone(),
        config.alerts.clone(),
    ));

    // Start the periodic task set
    let mut scheduler = Scheduler::new();
    schedule_core_tasks(
        &mut scheduler,
        &config.scheduler,
        &config.alerts.admin_email,
        alert_engine,
        traffic_store,
        notifier,
        audit,
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    scheduler.shutdown().await;

    Ok(())
}
