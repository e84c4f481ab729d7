//! Handles shared by the sampler, the dashboard and the event loop.

use std::sync::Arc;

use anyhow::Context as _;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::DisplayError;
use crate::palette::Palette;
use crate::screen::{self, Screen, SharedScreen};
use crate::snapshot::SnapshotCell;
use crate::state_machine::session_sm::Teardown;

/// Built once at startup and handed to every long-running part by reference.
pub struct Context {
    pub screen: SharedScreen,
    pub palette: Arc<Palette>,
    pub snapshots: Arc<SnapshotCell>,
    pub shutdown: CancellationToken,
}

impl Context {
    /// Register the palette with `screen` and create an empty snapshot cell
    /// sized for `core_count` cores.
    pub fn new(mut screen: Box<dyn Screen>, core_count: usize) -> Self {
        let palette = Arc::new(Palette::initialize(screen.as_mut()));
        Self {
            screen: screen::shared(screen),
            palette,
            snapshots: Arc::new(SnapshotCell::new(core_count)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Session teardown: wait for both background loops on `runtime`, then
    /// give the terminal back. The screen is restored even if a loop failed.
    ///
    /// Must be called from outside the runtime, after `shutdown` has fired.
    pub fn teardown(
        &self,
        runtime: Handle,
        sampler: JoinHandle<()>,
        redraw: JoinHandle<Result<(), DisplayError>>,
    ) -> Teardown {
        let screen = Arc::clone(&self.screen);
        Box::new(move || {
            let joined = runtime.block_on(async {
                sampler.await.context("sampler task panicked")?;
                redraw
                    .await
                    .context("redraw task panicked")?
                    .context("redraw loop failed")
            });
            let restored = screen::lock(&screen)
                .restore()
                .context("failed to restore the terminal");
            joined.and(restored)
        })
    }
}
