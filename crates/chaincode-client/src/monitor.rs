//! Block height monitor: adaptive polling of `/chain` with two cadences.
//!
//! A background tokio task wakes on the fast cadence. Each tick either
//! polls because the slow cadence elapsed since the last poll, or polls
//! once per fresh unresolved action in the [`ActionQueue`]. Expired
//! actions are dropped. When a poll reports a height different from the
//! last one observed, one action is resolved and the user callback fires.
//!
//! Poll failures are logged and swallowed; the loop only exits when its
//! [`MonitorHandle`] is stopped or dropped.

use crate::actions::ActionQueue;
use crate::client::ChaincodeClient;
use chaincode_types::chain::ChainStats;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Fast cadence: how often the loop wakes.
pub const DEFAULT_TICK: Duration = Duration::from_millis(500);

/// Slow cadence: maximum time between polls regardless of queue state.
pub const DEFAULT_SLOW_INTERVAL: Duration = Duration::from_millis(10_000);

/// Age after which an unresolved action stops driving fast polls.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_millis(3_000);

/// Callback invoked with the raw stats whenever the height changes.
pub type MonitorCallback = Arc<dyn Fn(&ChainStats) + Send + Sync>;

/// Monitor cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Fast cadence.
    pub tick: Duration,
    /// Slow cadence.
    pub slow_interval: Duration,
    /// Freshness window for unresolved actions.
    pub freshness: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            slow_interval: DEFAULT_SLOW_INTERVAL,
            freshness: DEFAULT_FRESHNESS,
        }
    }
}

/// Process-local polling state. Heights are compared, never persisted.
#[derive(Debug, Default)]
pub struct MonitorState {
    /// When the last poll was issued; `None` before the first.
    pub last_polled_at: Option<Instant>,
    /// Most recent height that differed from its predecessor.
    pub last_observed_height: u64,
    /// Unresolved invokes.
    pub pending: ActionQueue,
}

impl MonitorState {
    /// Decide how many polls this tick issues, marking the poll time.
    ///
    /// Slow catch-up yields one poll. Otherwise every fresh action yields a
    /// poll of its own; polls are idempotent reads so they are not deduped.
    pub fn plan_tick(&mut self, now: Instant, config: &MonitorConfig) -> usize {
        let slow_due = self
            .last_polled_at
            .map(|at| now.saturating_duration_since(at) > config.slow_interval)
            .unwrap_or(true);
        if slow_due {
            self.last_polled_at = Some(now);
            return 1;
        }

        let fresh = self.pending.retain_fresh(now, config.freshness);
        if fresh > 0 {
            debug!(fresh, "Unresolved actions, polling chain height");
            self.last_polled_at = Some(now);
        }
        fresh
    }

    /// Feed a poll result. Returns `true` if the height changed, in which
    /// case one pending action has been resolved.
    pub fn observe(&mut self, stats: &ChainStats) -> bool {
        if stats.height == 0 || stats.height == self.last_observed_height {
            return false;
        }
        self.last_observed_height = stats.height;
        self.pending.resolve_one();
        true
    }
}

/// Owner of a running monitor loop. Dropping it stops the loop.
pub struct MonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Ask the loop to exit at its next wake-up.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    pub async fn join(self) {
        self.stop();
        let _ = self.task.await;
    }
}

impl ChaincodeClient {
    /// Start polling chain height; `callback` fires on every height change.
    ///
    /// Must be called from within a tokio runtime.
    pub fn monitor_blockheight<F>(&self, callback: F) -> MonitorHandle
    where
        F: Fn(&ChainStats) + Send + Sync + 'static,
    {
        let callback: MonitorCallback = Arc::new(callback);
        let config = self.config().monitor;
        let (shutdown_tx, mut shutdown) = watch::channel(false);
        let client = self.clone();

        info!(
            tick_ms = config.tick.as_millis() as u64,
            slow_ms = config.slow_interval.as_millis() as u64,
            "Starting block height monitor"
        );

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(config.tick) => {}
                    _ = shutdown.changed() => {
                        info!("Block height monitor: shutdown signal received");
                        break;
                    }
                }
                if *shutdown.borrow() {
                    break;
                }

                let polls = client.with_monitor(|m| m.plan_tick(Instant::now(), &config));
                for _ in 0..polls {
                    client.poll_height(&callback).await;
                }
            }
        });

        MonitorHandle { shutdown_tx, task }
    }

    async fn poll_height(&self, callback: &MonitorCallback) {
        match self.chain_stats().await {
            Ok(stats) => {
                let changed = self.with_monitor(|m| m.observe(&stats));
                if changed {
                    info!(height = stats.height, "New block");
                    callback(&stats);
                }
            }
            Err(e) => {
                warn!(error = %e, "Block height poll failed, retrying next tick");
            }
        }
    }
}
