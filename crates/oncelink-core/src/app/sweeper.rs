//! SweepLoop - 期限切れグラントの回収
//!
//! # フロー
//! 1. `interval` ごとに LifecycleManager::reclaim_expired() を呼ぶ
//!    （レコードを削除し、参照していたメディアも解放する）
//! 2. 失敗はログに残して次の周期へ（ループは止めない）
//! 3. shutdown future が完了したら終了

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::app::LifecycleManager;
use crate::domain::GrantError;

const MIN_INTERVAL: Duration = Duration::from_millis(10);

pub struct SweepLoop {
    manager: LifecycleManager,
    interval: Duration,
}

impl SweepLoop {
    pub fn new(manager: LifecycleManager, interval: Duration) -> Self {
        Self {
            manager,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub async fn sweep_once(&self) -> Result<usize, GrantError> {
        self.manager.reclaim_expired().await
    }

    /// Sweeps immediately, then once per interval until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "sweeper started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => match self.sweep_once().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!(purged, "expired grants reclaimed"),
                    Err(e) => tracing::warn!(error = %e, "sweep failed"),
                },
            }
        }
        tracing::info!("sweeper stopped");
    }
}
