//! CPU sampler.
//!
//! Runs in a Tokio background task: every interval it asks the `CpuSource`
//! for per-core utilization measured over that window and publishes the
//! result into the shared `SnapshotCell`. Failed samples are retried with
//! exponential backoff instead of ending the task.

use std::sync::Arc;
use std::time::Duration;

use sysinfo::System;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::SamplingError;
use crate::snapshot::{Snapshot, SnapshotCell};

/// Upper bound for the retry delay after repeated failures.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Per-core CPU utilization provided by the operating system.
pub trait CpuSource: Send {
    fn logical_core_count(&self) -> usize;

    /// Utilization of each logical core, in percent, averaged over the time
    /// since the previous call.
    fn sample(&mut self) -> Result<Vec<f32>, SamplingError>;
}

/// `CpuSource` backed by `sysinfo`.
pub struct SysinfoSource {
    system: System,
    cores: usize,
}

impl SysinfoSource {
    /// Create the source and start the first measurement window.
    pub fn new() -> Result<Self, SamplingError> {
        let mut system = System::new();
        system.refresh_cpu_usage();
        let cores = system.cpus().len();
        if cores == 0 {
            return Err(SamplingError::NoCores);
        }
        Ok(Self { system, cores })
    }
}

impl CpuSource for SysinfoSource {
    fn logical_core_count(&self) -> usize {
        self.cores
    }

    fn sample(&mut self) -> Result<Vec<f32>, SamplingError> {
        self.system.refresh_cpu_usage();
        let values: Vec<f32> = self.system.cpus().iter().map(|c| c.cpu_usage()).collect();
        if values.is_empty() {
            return Err(SamplingError::NoCores);
        }
        Ok(values)
    }
}

/// Delay before the next attempt after `failures` consecutive failures.
pub fn backoff(interval: Duration, failures: u32) -> Duration {
    if failures == 0 {
        return interval;
    }
    interval
        .saturating_mul(1u32 << failures.min(16))
        .min(MAX_BACKOFF.max(interval))
}

pub struct Sampler<S> {
    source: S,
    cell: Arc<SnapshotCell>,
    interval: Duration,
}

impl<S: CpuSource> Sampler<S> {
    pub fn new(source: S, cell: Arc<SnapshotCell>, interval: Duration) -> Self {
        Self {
            source,
            cell,
            interval,
        }
    }

    fn sample_once(&mut self) -> Result<(), SamplingError> {
        let values = self.source.sample()?;
        self.cell.publish(Snapshot::new(values))
    }

    /// Sample until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(target: "sampler", interval_ms = self.interval.as_millis() as u64, "Sampler started");
        let mut failures: u32 = 0;

        loop {
            let delay = backoff(self.interval, failures);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            match self.sample_once() {
                Ok(()) => {
                    if failures > 0 {
                        info!(target: "sampler", failures, "Sampling recovered");
                    }
                    failures = 0;
                    trace!(target: "sampler", "Snapshot published");
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    warn!(
                        target: "sampler",
                        failures,
                        "Sampling failed: {}, retrying in {:?}",
                        e,
                        backoff(self.interval, failures)
                    );
                }
            }
        }

        debug!(target: "sampler", "Sampler stopped");
    }
}
