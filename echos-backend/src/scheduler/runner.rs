use chrono::{DateTime, Utc};
use std::sync::Arc;
use strum::AsRefStr;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::config::{Config, ReplyGuyMode};
use crate::twitter::{run_followers_cycle, run_mentions_cycle, ReplyGuyAgent};

/// The two ingestion cycles, each on its own interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum CycleKind {
    Mentions,
    Followers,
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub mode: ReplyGuyMode,
    /// Seconds between cycle starts, per kind
    pub interval_secs: u64,
    /// Lag of the followers cycle behind the mentions cycle
    pub followers_start_delay_secs: u64,
}

impl SchedulerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.mode,
            interval_secs: config.interval_secs,
            followers_start_delay_secs: config.followers_start_delay_secs,
        }
    }

    /// Enabled cycles with their initial delay.
    pub fn cycles(&self) -> Vec<(CycleKind, Duration)> {
        let mut cycles = Vec::new();
        if self.mode.runs_mentions() {
            cycles.push((CycleKind::Mentions, Duration::ZERO));
        }
        if self.mode.runs_followers() {
            let delay = if self.mode == ReplyGuyMode::Followers {
                Duration::ZERO
            } else {
                Duration::from_secs(self.followers_start_delay_secs)
            };
            cycles.push((CycleKind::Followers, delay));
        }
        cycles
    }
}

/// Runs the reply-guy cycles for one agent.
///
/// Each cycle kind gets its own task. A cycle is awaited inside its task, so
/// a slow cycle delays (and with skipped ticks, coalesces) the next one of the
/// same kind instead of overlapping it.
pub struct ReplyGuyScheduler {
    agent: Arc<ReplyGuyAgent>,
    config: SchedulerConfig,
    start_time: DateTime<Utc>,
}

impl ReplyGuyScheduler {
    pub fn new(agent: Arc<ReplyGuyAgent>, config: SchedulerConfig) -> Self {
        Self {
            agent,
            config,
            start_time: Utc::now(),
        }
    }

    /// Start the cycle tasks and wait for them to stop.
    ///
    /// Shutdown is only observed between ticks; an in-flight cycle finishes first.
    pub async fn start(self: Arc<Self>, shutdown_rx: oneshot::Receiver<()>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let cycles = self.config.cycles();
        log::info!(
            "Reply guy scheduler started for {} (mode: {}, interval: {}s)",
            self.agent.name(),
            self.config.mode.as_ref(),
            self.config.interval_secs
        );

        let handles: Vec<JoinHandle<()>> = cycles
            .into_iter()
            .map(|(kind, delay)| {
                let scheduler = Arc::clone(&self);
                let stop_rx = stop_rx.clone();
                tokio::spawn(async move { scheduler.run_cycle_loop(kind, delay, stop_rx).await })
            })
            .collect();

        if shutdown_rx.await.is_ok() {
            log::info!("Reply guy scheduler received shutdown signal");
        }
        let _ = stop_tx.send(true);

        for handle in handles {
            if let Err(e) = handle.await {
                log::error!("Reply guy cycle task panicked: {}", e);
            }
        }
        log::info!("Reply guy scheduler stopped");
    }

    async fn run_cycle_loop(&self, kind: CycleKind, delay: Duration, mut stop_rx: watch::Receiver<bool>) {
        let period = Duration::from_secs(self.config.interval_secs);
        let mut ticker = interval_at(Instant::now() + delay, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    log::info!("Stopping {} cycle", kind.as_ref());
                    break;
                }
                _ = ticker.tick() => {
                    self.run_cycle(kind).await;
                }
            }
        }
    }

    /// Run one cycle to completion, logging its outcome.
    pub async fn run_cycle(&self, kind: CycleKind) {
        log::debug!("Running {} cycle for {}", kind.as_ref(), self.agent.name());
        let result = match kind {
            CycleKind::Mentions => run_mentions_cycle(&self.agent, self.start_time).await,
            CycleKind::Followers => run_followers_cycle(&self.agent, self.start_time).await,
        };
        match result {
            Ok(0) => {}
            Ok(posted) => log::info!("{} cycle posted {} responses", kind.as_ref(), posted),
            Err(e) => log::error!("Error in {} cycle: {}", kind.as_ref(), e),
        }
    }
}
