//! Session lifecycle state machine.
//!
//! Models how long the dashboard owns the terminal:
//! ```text
//! Running → Closed  [entry: cancel background loops, run teardown once]
//! ```

use std::sync::{Arc, Mutex};

use anyhow::Result;
use crossterm::event::KeyEvent;
use statig::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::event_loop::is_interrupt;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events dispatched to the session state machine.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A key was pressed.
    Key(KeyEvent),
    /// Something other than the user asked the session to end.
    Cancelled,
}

// ---------------------------------------------------------------------------
// Shared storage
// ---------------------------------------------------------------------------

/// Work to run once when the session closes: stop the background loops and
/// give the terminal back.
pub type Teardown = Box<dyn FnOnce() -> Result<()> + Send>;

/// Where the teardown result is left for the event loop to return.
pub type TeardownSlot = Arc<Mutex<Option<Result<()>>>>;

/// Shared storage for the session state machine.
pub struct SessionMachine {
    pub shutdown: CancellationToken,
    pub teardown: Option<Teardown>,
    pub outcome: TeardownSlot,
}

impl SessionMachine {
    pub fn new(shutdown: CancellationToken, teardown: Teardown, outcome: TeardownSlot) -> Self {
        Self {
            shutdown,
            teardown: Some(teardown),
            outcome,
        }
    }
}

// ---------------------------------------------------------------------------
// State machine implementation
// ---------------------------------------------------------------------------

#[state_machine(
    initial = "State::running()",
    state(derive(Debug, Clone, PartialEq))
)]
impl SessionMachine {
    /// The dashboard owns the terminal. Only the interrupt key ends it.
    #[state]
    fn running(&mut self, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::Key(key) if is_interrupt(key) => {
                info!(target: "session", "Interrupt key pressed");
                Transition(State::closed())
            }
            SessionEvent::Cancelled => {
                info!(target: "session", "Session cancelled");
                Transition(State::closed())
            }
            SessionEvent::Key(_) => Handled,
        }
    }

    /// Terminal released. Further events are ignored.
    #[state(entry_action = "close")]
    fn closed(&mut self, event: &SessionEvent) -> Outcome<State> {
        let _ = event;
        Handled
    }

    /// Stop the background loops and run the teardown. Called on entry to
    /// `Closed`, which is entered at most once.
    #[action]
    fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(teardown) = self.teardown.take() {
            let result = teardown();
            *self.outcome.lock().unwrap_or_else(|e| e.into_inner()) = Some(result);
        }
        info!(target: "session", "Session closed");
    }
}
