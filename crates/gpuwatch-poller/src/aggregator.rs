use std::time::Instant;

use chrono::Utc;
use futures_util::future::join_all;
use gpuwatch_common::{ServerAddress, ServerSnapshot, ServerStatus};

use crate::config::PollConfig;
use crate::error::PollError;
use crate::normalize::normalize;
use crate::payload::{QueueState, SystemStats, QUEUE, SYSTEM_STATS};
use crate::scrape::fetch_json;

/// Polls worker servers concurrently and normalizes their replies.
///
/// Holds only the shared connection pool and the limits; every call to
/// [`StatusAggregator::poll`] builds a fresh set of records.
#[derive(Debug, Clone)]
pub struct StatusAggregator {
    http: reqwest::Client,
    config: PollConfig,
}

impl StatusAggregator {
    /// Workers are reached directly; `HTTP_PROXY`/`ALL_PROXY` are ignored.
    pub fn new(config: PollConfig) -> Result<Self, PollError> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .connect_timeout(config.effective_connect_timeout())
            .timeout(config.timeout)
            .build()
            .map_err(PollError::Client)?;
        Ok(Self::with_client(http, config))
    }

    /// Use a caller-owned client. Its own timeouts still apply on top of
    /// `config.timeout`.
    pub fn with_client(http: reqwest::Client, config: PollConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// One record per address, in input order. Never fails: a server that
    /// cannot be polled yields an unreachable record.
    #[tracing::instrument(skip_all, fields(servers = addresses.len()))]
    pub async fn poll(&self, addresses: &[ServerAddress]) -> Vec<ServerStatus> {
        if addresses.is_empty() {
            return Vec::new();
        }

        let started = Instant::now();
        let statuses = join_all(addresses.iter().map(|address| self.poll_one(address))).await;

        let online = statuses.iter().filter(|s| s.is_reachable()).count();
        tracing::info!(
            online,
            offline = statuses.len() - online,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "poll cycle finished"
        );
        statuses
    }

    pub async fn poll_one(&self, address: &ServerAddress) -> ServerStatus {
        let outcome = tokio::time::timeout(self.config.timeout, self.fetch_snapshot(address))
            .await
            .unwrap_or(Err(PollError::Timeout(self.config.timeout)));
        let observed_at = Utc::now();

        match outcome {
            Ok(snapshot) => {
                tracing::debug!(%address, device = %snapshot.device_name, "server online");
                ServerStatus::online(address.clone(), observed_at, snapshot)
            }
            Err(e) => {
                tracing::warn!(%address, error = %e, "server unreachable");
                ServerStatus::unreachable(address.clone(), observed_at, e.to_string())
            }
        }
    }

    /// Both endpoints are required; the first failure wins and drops the other
    /// request.
    async fn fetch_snapshot(&self, address: &ServerAddress) -> Result<ServerSnapshot, PollError> {
        let (stats, queue) = tokio::try_join!(
            fetch_json::<SystemStats>(&self.http, address, SYSTEM_STATS),
            fetch_json::<QueueState>(&self.http, address, QUEUE),
        )?;
        normalize(&stats, &queue)
    }
}

/// Single-shot poll with a throwaway connection pool.
///
/// The only error is failing to set up the HTTP client; per-server failures
/// are reported in the returned records.
pub async fn poll(addresses: &[ServerAddress], config: PollConfig) -> Result<Vec<ServerStatus>, PollError> {
    let aggregator = StatusAggregator::new(config)?;
    Ok(aggregator.poll(addresses).await)
}
