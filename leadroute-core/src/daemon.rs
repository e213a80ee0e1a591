//! Periodic processing loop
//!
//! Runs one tick immediately, then one per interval. A tick optionally sweeps
//! failed deliveries, then scans the source. Sweeping first keeps leads that
//! fail on intake to one attempt per tick. Ticks never overlap: the loop
//! waits for a tick to finish before sleeping.

use crate::ingest::{IngestSummary, SourceProcessor};
use crate::retry::{RetryRequest, RetryService, RetrySummary};
use crate::source::SourceError;
use leadroute_common::config::DaemonConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Retry sweep failed: {0}")]
    Retry(#[from] leadroute_common::Error),
}

#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub ingest: Option<IngestSummary>,
    pub retry: Option<RetrySummary>,
}

pub struct Daemon {
    processor: Option<SourceProcessor>,
    retry: Arc<RetryService>,
    interval: Duration,
    failure_cooldown: Duration,
    retry_sweep: bool,
    max_attempts: i64,
}

impl Daemon {
    pub fn new(processor: Option<SourceProcessor>, retry: Arc<RetryService>, config: &DaemonConfig) -> Self {
        if processor.is_none() {
            warn!("No lead source configured; daemon will only sweep retries");
        }
        Self {
            processor,
            retry,
            interval: Duration::from_secs(config.interval_minutes.max(1) * 60),
            failure_cooldown: Duration::from_secs(config.failure_cooldown_secs),
            retry_sweep: config.retry_sweep,
            max_attempts: config.max_attempts,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Optional retry sweep followed by one scan
    pub async fn tick(&self) -> Result<TickReport, TickError> {
        let mut report = TickReport::default();

        if self.retry_sweep {
            report.retry = Some(self.retry.retry(&RetryRequest::sweep(self.max_attempts)).await?);
        }

        if let Some(processor) = &self.processor {
            report.ingest = Some(processor.process(false).await?);
        }

        Ok(report)
    }

    /// Loop until `shutdown` completes; returns the number of ticks run
    pub async fn run_until<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticks = 0u64;

        info!(interval_secs = self.interval.as_secs(), "Daemon started");
        loop {
            ticks += 1;
            let pause = match self.tick().await {
                Ok(_) => self.interval,
                Err(e) => {
                    error!(tick = ticks, error = %e, "Daemon tick failed");
                    self.failure_cooldown
                }
            };

            tokio::select! {
                _ = &mut shutdown => {
                    info!(ticks, "Daemon stopping");
                    return ticks;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }
}
