//! Fixed-interval driver for [`PollCycle`].

use crate::cycle::PollCycle;
use crate::seen::SeenPosts;
use askbot_core::{AnswerBackend, Platform};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct SchedulerHandle {
    cancel: CancellationToken,
    cycles_completed: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals shutdown and waits for the current cycle, if any, to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }
}

/// Starts running `cycle` now and then every `period`, one cycle at a time.
pub fn spawn<P, B>(
    cycle: PollCycle<P, B>,
    period: Duration,
    seen: SeenPosts,
    cancel: CancellationToken,
) -> SchedulerHandle
where
    P: Platform + 'static,
    B: AnswerBackend + 'static,
{
    let cycles_completed = Arc::new(AtomicU64::new(0));
    let task = tokio::spawn(run_loop(
        cycle,
        period,
        seen,
        cancel.clone(),
        Arc::clone(&cycles_completed),
    ));

    SchedulerHandle {
        cancel,
        cycles_completed,
        task,
    }
}

async fn run_loop<P, B>(
    cycle: PollCycle<P, B>,
    period: Duration,
    mut seen: SeenPosts,
    cancel: CancellationToken,
    cycles_completed: Arc<AtomicU64>,
) where
    P: Platform,
    B: AnswerBackend,
{
    info!(
        "Scheduler started: r/{} every {:?}",
        cycle.settings().community,
        period
    );

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let report = cycle.run(&mut seen).await;
        cycles_completed.fetch_add(1, Ordering::Relaxed);
        info!("{}", report.summary());

        if cancel.is_cancelled() {
            break;
        }
    }

    info!(
        "Scheduler stopped after {} cycles",
        cycles_completed.load(Ordering::Relaxed)
    );
}
