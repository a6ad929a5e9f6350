use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use gpuwatch_common::{ServerAddress, ServerStatus};
use gpuwatch_poller::StatusAggregator;
use tokio::time::MissedTickBehavior;

/// Poll on a fixed interval until `shutdown` resolves. Each cycle is
/// independent; a cycle still in flight is abandoned on shutdown.
pub async fn watch_until<S, F>(
    aggregator: &StatusAggregator,
    servers: &[ServerAddress],
    interval: Duration,
    shutdown: S,
    mut on_cycle: F,
) -> Result<()>
where
    S: Future<Output = std::io::Result<()>>,
    F: FnMut(&[ServerStatus]) -> Result<()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        let cycle = async {
            ticker.tick().await;
            aggregator.poll(servers).await
        };
        tokio::select! {
            statuses = cycle => on_cycle(&statuses)?,
            res = &mut shutdown => {
                res.context("failed to listen for Ctrl-C")?;
                tracing::info!("interrupted, stopping watch");
                return Ok(());
            }
        }
    }
}
