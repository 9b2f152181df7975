use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use crate::core::{SessionLock, SimulationBackend};
use crate::utils::{bounded, FeeForkError, Result};

/// Blocks the fork trails the live chain tip by.
pub const DEFAULT_RESET_LAG: u64 = 10;

#[derive(Debug, Clone)]
pub struct ResetConfig {
    /// Upstream node the session is re-forked from
    pub fork_url: String,
    /// Time between resets
    pub period: Duration,
    /// Blocks behind the tip to fork at
    pub lag: u64,
    /// Bound for the height lookup and for the re-fork, each
    pub call_timeout: Option<Duration>,
}

impl ResetConfig {
    pub fn new(fork_url: impl Into<String>, period: Duration) -> Self {
        Self {
            fork_url: fork_url.into(),
            period,
            lag: DEFAULT_RESET_LAG,
            call_timeout: None,
        }
    }
}

/// Periodically replaces the session with a fresh fork near the chain tip.
pub struct ResetScheduler<B> {
    lock: Arc<SessionLock<B>>,
    config: ResetConfig,
}

impl<B: SimulationBackend> ResetScheduler<B> {
    pub fn new(lock: Arc<SessionLock<B>>, config: ResetConfig) -> Self {
        Self { lock, config }
    }

    pub fn config(&self) -> &ResetConfig {
        &self.config
    }

    /// Height to fork at for a given chain tip.
    pub fn target_height(&self, tip: u64) -> u64 {
        tip.saturating_sub(self.config.lag)
    }

    /// Run one reset under the lock and return the new fork height.
    ///
    /// On error the previous session stays in place. The lock is released on
    /// every path.
    pub async fn tick(&self) -> Result<u64> {
        tracing::trace!("reset: acquiring session lock");
        let session = self.lock.acquire("fork-reset").await;

        let limit = self.config.call_timeout;
        let outcome = async {
            let tip = bounded("chain_height", limit, session.chain_height()).await?;
            let height = self.target_height(tip);
            tracing::info!("resetting to block {}", height);
            bounded(
                "recreate_session",
                limit,
                session.recreate_session(&self.config.fork_url, height),
            )
            .await?;
            Ok::<u64, FeeForkError>(height)
        }
        .await;

        tracing::trace!("reset: releasing session lock");
        drop(session);
        outcome
    }

    /// Tick every period until `shutdown` flips to `true` or its sender is gone.
    /// The first reset happens one period after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.period,
            self.config.period,
        );
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "🔁 Fork reset every {:?}, {} blocks behind tip",
            self.config.period,
            self.config.lag
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::warn!("{} from fork reset", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("fork reset scheduler stopped");
    }
}
