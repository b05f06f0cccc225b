use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use super::executor::MonitoringExecutor;

/// Monitoring scheduler - drives the executor on a fixed interval.
///
/// Each cycle is awaited before the next tick is taken and ticks missed in
/// the meantime are skipped, so cycles never overlap.
pub struct MonitoringScheduler {
    executor: Arc<MonitoringExecutor>,
    interval: Duration,
    run_on_start: bool,
}

impl MonitoringScheduler {
    pub fn new(executor: Arc<MonitoringExecutor>, interval: Duration) -> Self {
        Self { executor, interval, run_on_start: false }
    }

    /// Run the first cycle immediately instead of one interval after launch
    pub fn run_on_start(mut self, enabled: bool) -> Self {
        self.run_on_start = enabled;
        self
    }

    /// Spawn the scheduling loop onto the runtime
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Loop forever, one cycle per tick
    pub async fn run(self) {
        let first = if self.run_on_start { Instant::now() } else { Instant::now() + self.interval };
        let mut timer = interval_at(first, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            run_on_start = self.run_on_start,
            "Monitoring scheduler started"
        );

        loop {
            timer.tick().await;
            self.executor.run_cycle().await;
        }
    }
}
