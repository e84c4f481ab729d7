//! coremeter: live per-core CPU load meters in the terminal.
//!
//! Samples per-core utilization once a second and draws each core as a
//! labeled horizontal bar, refreshing until Ctrl-C.
//!
//! Uses crossterm for the terminal, sysinfo for CPU sampling and a Tokio
//! runtime for the sampling and redraw loops.

mod context;
mod dashboard;
mod error;
mod event_loop;
mod logging;
mod meter;
mod palette;
mod sampler;
mod screen;
mod snapshot;
mod state_machine;
mod surface;

use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{info, warn};

use crate::context::Context;
use crate::dashboard::Dashboard;
use crate::event_loop::{CrosstermKeys, EventLoop};
use crate::sampler::{CpuSource, Sampler, SysinfoSource};
use crate::screen::CrosstermScreen;

/// How often a new per-core sample is taken.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
/// How often the meters are redrawn from the latest sample.
const REDRAW_INTERVAL: Duration = Duration::from_secs(1);

/// Live per-core CPU load meters
#[derive(Parser, Debug)]
#[command(name = "coremeter", version, about = "Live per-core CPU load meters")]
struct Args {}

fn main() -> Result<()> {
    let _args = Args::parse();
    let log = logging::init();

    // Create the Tokio runtime for the sampling and redraw loops
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("coremeter-worker")
        .build()
        .context("failed to create Tokio runtime")?;

    let source = SysinfoSource::new().context("failed to read CPU utilization")?;
    let core_count = source.logical_core_count();
    let (min_cols, min_rows) = Dashboard::required_size(core_count);
    info!(core_count, "coremeter v{}", env!("CARGO_PKG_VERSION"));

    log.mute_stderr();
    let screen = match CrosstermScreen::init(min_cols, min_rows) {
        Ok(screen) => screen,
        Err(e) => {
            log.unmute_stderr();
            return Err(e).context("failed to initialise the terminal");
        }
    };

    let ctx = Context::new(Box::new(screen), core_count);
    crate::screen::install_panic_hook(ctx.shutdown.clone());
    let dashboard = match Dashboard::build(&ctx) {
        Ok(dashboard) => dashboard,
        Err(e) => {
            crate::screen::lock(&ctx.screen).restore().ok();
            log.unmute_stderr();
            return Err(e).context("failed to build the dashboard");
        }
    };

    // Spawn the background loops
    let interval = SAMPLE_INTERVAL.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    let sampler = runtime.spawn(
        Sampler::new(source, ctx.snapshots.clone(), interval).run(ctx.shutdown.clone()),
    );
    let redraw = runtime.spawn(dashboard.run(REDRAW_INTERVAL, ctx.shutdown.clone()));

    // On close: join both loops, then give the terminal back.
    let teardown = ctx.teardown(runtime.handle().clone(), sampler, redraw);

    let result = EventLoop::new(CrosstermKeys, ctx.shutdown.clone(), teardown).run();
    log.unmute_stderr();

    // Clean shutdown of the Tokio runtime
    runtime.shutdown_timeout(Duration::from_secs(1));

    match &result {
        Ok(()) => info!("coremeter exited"),
        Err(e) => warn!("coremeter exited with error: {:#}", e),
    }
    result
}
