use crate::pipeline::FetchOrchestrator;
use crate::types::{FetchAdapter, PassError};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Run a pass every `interval`, starting immediately.
///
/// Ticks that land on a running pass are skipped. The interval is at least
/// 1ms. The loop runs until the returned handle is aborted.
pub fn spawn_periodic<A>(orchestrator: Arc<FetchOrchestrator<A>>, interval: Duration) -> JoinHandle<()>
where
    A: FetchAdapter + 'static,
{
    let interval = interval.max(MIN_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Scheduled fetch every {:?}", interval);

        loop {
            ticker.tick().await;
            match orchestrator.run_pass().await {
                Ok(report) => debug!("Scheduled pass added {} articles", report.new_count),
                Err(PassError::AlreadyRunning) => debug!("Skipping scheduled pass, one is already running"),
                Err(e) => error!("Scheduled pass failed: {}", e),
            }
        }
    })
}
