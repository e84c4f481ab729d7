//! Dashboard controller: one load meter per logical core.
//!
//! Meters are stacked one row apart starting at (`ORIGIN_X`, `ORIGIN_Y`) and
//! labeled "1".."N". On every tick the latest snapshot, if any, is pushed
//! into the meters. The redraw loop owns the dashboard, so the meters are
//! only ever drawn from one task.
//!
//! ```text
//! sampler ──publish──► SnapshotCell ──latest──► Dashboard::tick ──► LoadMeter × N
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::context::Context;
use crate::error::{DisplayError, MeterError};
use crate::meter::LoadMeter;
use crate::snapshot::SnapshotCell;

// --- Layout constants ---

pub const ORIGIN_X: u16 = 1;
pub const ORIGIN_Y: u16 = 1;
pub const BAR_WIDTH: u16 = 80;

pub struct Dashboard {
    meters: Vec<LoadMeter>,
    snapshots: Arc<SnapshotCell>,
}

impl Dashboard {
    /// Minimum terminal size `(cols, rows)` for `core_count` meters.
    pub fn required_size(core_count: usize) -> (u16, u16) {
        let rows = u16::try_from(core_count)
            .ok()
            .and_then(|n| n.checked_add(ORIGIN_Y))
            .unwrap_or(u16::MAX);
        (ORIGIN_X + BAR_WIDTH, rows)
    }

    /// Create one meter per core tracked by `ctx.snapshots`.
    pub fn build(ctx: &Context) -> Result<Self, MeterError> {
        let core_count = ctx.snapshots.core_count();
        let mut meters = Vec::with_capacity(core_count);
        for index in 0..core_count {
            let row = u16::try_from(index)
                .ok()
                .and_then(|i| i.checked_add(ORIGIN_Y))
                .unwrap_or(u16::MAX);
            meters.push(LoadMeter::new(
                &ctx.screen,
                Arc::clone(&ctx.palette),
                ORIGIN_X,
                row,
                BAR_WIDTH,
                (index + 1).to_string(),
            )?);
        }
        debug!(target: "dashboard", meters = meters.len(), "Dashboard built");

        Ok(Self {
            meters,
            snapshots: Arc::clone(&ctx.snapshots),
        })
    }

    #[cfg(test)]
    pub fn meters(&self) -> &[LoadMeter] {
        &self.meters
    }

    /// Push the latest snapshot into every meter. Returns `false` without
    /// drawing when nothing has been published yet.
    pub fn tick(&mut self) -> Result<bool, DisplayError> {
        let Some(snapshot) = self.snapshots.latest() else {
            return Ok(false);
        };

        for (meter, percent) in self.meters.iter_mut().zip(snapshot.percents()) {
            meter.set_value(percent)?;
        }

        let age = Utc::now() - snapshot.taken_at();
        debug!(target: "dashboard", age_ms = age.num_milliseconds(), "Snapshot drawn");
        Ok(true)
    }

    /// Blank every meter.
    pub fn clear(&mut self) -> Result<(), DisplayError> {
        for meter in &mut self.meters {
            meter.clear()?;
        }
        Ok(())
    }

    /// Redraw every `interval` until `shutdown` is cancelled, then blank the
    /// meters.
    ///
    /// A drawing failure cancels `shutdown` so the rest of the process winds
    /// down, and is returned.
    pub async fn run(
        mut self,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Result<(), DisplayError> {
        info!(target: "dashboard", interval_ms = interval.as_millis() as u64, "Redraw loop started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.tick() {
                error!(target: "dashboard", "Redraw failed: {}", e);
                shutdown.cancel();
                return Err(e);
            }
        }

        self.clear()?;
        debug!(target: "dashboard", "Redraw loop stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meter::{bar_area_len, filled_cells};
    use crate::palette::SemanticColor;
    use crate::screen::testing::MemoryScreen;
    use crate::snapshot::Snapshot;

    fn context(cores: usize) -> (MemoryScreen, Context) {
        let (cols, rows) = Dashboard::required_size(cores);
        let mem = MemoryScreen::new(cols, rows);
        let ctx = Context::new(Box::new(mem.clone()), cores);
        (mem, ctx)
    }

    #[test]
    fn required_size_covers_all_rows() {
        assert_eq!(Dashboard::required_size(4), (81, 5));
        assert_eq!(Dashboard::required_size(usize::MAX), (81, u16::MAX));
    }

    #[test]
    fn builds_one_labeled_meter_per_core() {
        let (mem, ctx) = context(12);
        let dashboard = Dashboard::build(&ctx).unwrap();

        let labels: Vec<&str> = dashboard.meters().iter().map(|m| m.label()).collect();
        assert_eq!(labels, ["1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12"]);
        assert_eq!(mem.row_text(0), "");
        assert!(mem.row_text(1).starts_with(" 1 ["));
        assert!(mem.row_text(12).starts_with(" 12 ["));
        assert!(mem.row_text(12).ends_with("] 0%"));
    }

    #[test]
    fn too_many_cores_for_screen_fails() {
        let mem = MemoryScreen::new(81, 3);
        let ctx = Context::new(Box::new(mem), 4);
        let err = Dashboard::build(&ctx).err().unwrap();
        assert!(matches!(err, MeterError::Display(DisplayError::Geometry { .. })));
    }

    #[test]
    fn tick_before_first_snapshot_is_noop() {
        let (mem, ctx) = context(2);
        let mut dashboard = Dashboard::build(&ctx).unwrap();
        let flushes = mem.flushes();

        assert!(!dashboard.tick().unwrap());
        assert!(dashboard.meters().iter().all(|m| m.value() == 0));
        assert_eq!(mem.flushes(), flushes);
    }

    #[test]
    fn tick_pushes_snapshot_into_meters() {
        let (mem, ctx) = context(4);
        let mut dashboard = Dashboard::build(&ctx).unwrap();
        ctx.snapshots
            .publish(Snapshot::new(vec![10.0, 50.0, 96.0, 100.0]))
            .unwrap();

        assert!(dashboard.tick().unwrap());

        let bar_len = bar_area_len(BAR_WIDTH, 1).unwrap();
        let expected = [
            (10, SemanticColor::Normal),
            (50, SemanticColor::Normal),
            (96, SemanticColor::Critical),
            (100, SemanticColor::Critical),
        ];
        for (i, (meter, (percent, color))) in dashboard.meters().iter().zip(expected).enumerate() {
            assert_eq!(meter.value(), percent);
            let bar = &meter.fragments()[1];
            assert_eq!(bar.color, color);
            assert_eq!(bar.text.chars().filter(|c| *c == '|').count(), filled_cells(percent, bar_len));

            let row = ORIGIN_Y + i as u16;
            let first_bar_cell = ORIGIN_X + 3;
            assert_eq!(mem.pair_at(first_bar_cell, row), ctx.palette.pair(color));
            assert!(mem.row_text(row).ends_with(&format!("] {percent}%")));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_redraws_until_cancelled() {
        let (mem, ctx) = context(1);
        let dashboard = Dashboard::build(&ctx).unwrap();
        let task = tokio::spawn(dashboard.run(Duration::from_secs(1), ctx.shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(mem.row_text(1), format!(" 1 [{}] 0%", " ".repeat(70)));

        ctx.snapshots.publish(Snapshot::new(vec![100.0])).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(mem.row_text(1).ends_with("|] 100%"));

        ctx.shutdown.cancel();
        task.await.unwrap().unwrap();
        assert_eq!(mem.row_text(1), "");
    }

    #[tokio::test(start_paused = true)]
    async fn released_screen_ignores_redraws() {
        let (mem, ctx) = context(1);
        let dashboard = Dashboard::build(&ctx).unwrap();
        let task = tokio::spawn(dashboard.run(Duration::from_secs(1), ctx.shutdown.clone()));

        crate::screen::lock(&ctx.screen).restore().unwrap();
        ctx.snapshots.publish(Snapshot::new(vec![77.0])).unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(mem.row_text(1).ends_with("] 0%"));
        ctx.shutdown.cancel();
        task.await.unwrap().unwrap();
    }
}
