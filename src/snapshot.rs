//! Per-core utilization snapshots and the cell they are published through.
//!
//! The sampler replaces the snapshot wholesale with one atomic pointer swap;
//! the redraw loop only ever reads whole snapshots.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};

use crate::error::SamplingError;

/// One utilization value per logical core, in core order.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    values: Vec<f32>,
    taken_at: DateTime<Utc>,
}

impl Snapshot {
    /// Values are clamped into `[0, 100]`; NaN becomes 0.
    pub fn new(values: Vec<f32>) -> Self {
        let values = values
            .into_iter()
            .map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) })
            .collect();
        Self {
            values,
            taken_at: Utc::now(),
        }
    }

    #[cfg(test)]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Values rounded half to even to whole percentages.
    pub fn percents(&self) -> impl Iterator<Item = u8> + '_ {
        self.values.iter().map(|v| v.round_ties_even() as u8)
    }

    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }
}

/// Latest snapshot, shared between the sampler and the dashboard.
#[derive(Debug)]
pub struct SnapshotCell {
    core_count: usize,
    current: ArcSwapOption<Snapshot>,
}

impl SnapshotCell {
    pub fn new(core_count: usize) -> Self {
        Self {
            core_count,
            current: ArcSwapOption::empty(),
        }
    }

    pub fn core_count(&self) -> usize {
        self.core_count
    }

    /// Replace the current snapshot. Snapshots that do not carry exactly one
    /// value per core are rejected and the previous one stays visible.
    pub fn publish(&self, snapshot: Snapshot) -> Result<(), SamplingError> {
        if snapshot.len() != self.core_count {
            return Err(SamplingError::CoreCountMismatch {
                expected: self.core_count,
                actual: snapshot.len(),
            });
        }
        self.current.store(Some(Arc::new(snapshot)));
        Ok(())
    }

    /// The most recent snapshot, or `None` before the first publish.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }
}
