use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::db::IndexStore;
use crate::ingestion::{Orchestrator, ScanMode};
use crate::rpc::LogSource;

/// Pass cadence.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub index_interval: Duration,
    pub repair_interval: Duration,
}

impl Schedule {
    pub fn from_secs(index_interval_secs: u64, repair_interval_secs: u64) -> Self {
        Self {
            index_interval: Duration::from_secs(index_interval_secs.max(1)),
            repair_interval: Duration::from_secs(repair_interval_secs.max(1)),
        }
    }
}

/// Run normal and repair passes on their intervals until `shutdown`
/// resolves. Passes never overlap: a tick that fires during a pass is
/// delayed until the pass finishes, and shutdown is only observed between
/// passes.
///
/// Returns the number of passes run.
pub async fn run_scheduler<S, L, F>(
    orchestrator: &Orchestrator<S, L>,
    schedule: Schedule,
    shutdown: F,
) -> usize
where
    S: IndexStore,
    L: LogSource + Clone,
    F: Future<Output = ()>,
{
    tracing::info!(
        index_interval_secs = schedule.index_interval.as_secs(),
        repair_interval_secs = schedule.repair_interval.as_secs(),
        "Scheduler started"
    );

    let mut index_tick = interval(schedule.index_interval);
    index_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first repair runs one full interval after startup.
    let mut repair_tick = tokio::time::interval_at(
        tokio::time::Instant::now() + schedule.repair_interval,
        schedule.repair_interval,
    );
    repair_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tokio::pin!(shutdown);
    let mut passes = 0;

    loop {
        let mode = tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!(passes, "Scheduler stopping");
                return passes;
            }
            _ = repair_tick.tick() => ScanMode::Repair,
            _ = index_tick.tick() => ScanMode::Normal,
        };

        orchestrator.run_pass(mode).await;
        passes += 1;
    }
}
