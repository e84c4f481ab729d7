//! Event loop: the process's main blocking call.
//!
//! Reads one key event at a time and feeds it to the session state machine
//! until the session closes, either because the interrupt key (Ctrl-C, as an
//! in-band key in raw mode) was pressed or because a background loop
//! cancelled the shared token. Closing runs the teardown exactly once.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context as _, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use statig::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::state_machine::session_sm::{SessionEvent, SessionMachine, State, Teardown, TeardownSlot};

/// How long one input poll may block before the loop re-checks cancellation.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Source of key presses.
pub trait KeySource {
    /// Wait up to `timeout` for a key press; `None` if none arrived.
    fn next_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>>;
}

/// Key presses from the process terminal.
pub struct CrosstermKeys;

impl KeySource for CrosstermKeys {
    fn next_key(&mut self, timeout: Duration) -> io::Result<Option<KeyEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
            _ => Ok(None),
        }
    }
}

/// Ctrl-C as delivered in raw mode.
pub fn is_interrupt(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
        && key.modifiers.contains(KeyModifiers::CONTROL)
}

pub struct EventLoop<K> {
    keys: K,
    shutdown: CancellationToken,
    machine: StateMachine<SessionMachine>,
    outcome: TeardownSlot,
}

impl<K: KeySource> EventLoop<K> {
    pub fn new(keys: K, shutdown: CancellationToken, teardown: Teardown) -> Self {
        let outcome: TeardownSlot = Arc::new(Mutex::new(None));
        let machine =
            SessionMachine::new(shutdown.clone(), teardown, Arc::clone(&outcome)).state_machine();
        Self {
            keys,
            shutdown,
            machine,
            outcome,
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.machine.state() == State::Closed {}
    }

    /// Block until the session closes and return the teardown's result.
    pub fn run(mut self) -> Result<()> {
        let mut input_error = None;

        while !self.is_closed() {
            let event = if self.shutdown.is_cancelled() {
                SessionEvent::Cancelled
            } else {
                match self.keys.next_key(POLL_INTERVAL) {
                    Ok(Some(key)) => SessionEvent::Key(key),
                    Ok(None) => continue,
                    Err(e) => {
                        error!(target: "session", "Failed to read input: {}", e);
                        input_error = Some(e);
                        SessionEvent::Cancelled
                    }
                }
            };
            self.machine.handle(&event);
        }

        let teardown = self
            .outcome
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .unwrap_or(Ok(()));

        match input_error {
            Some(e) => {
                teardown?;
                Err(e).context("failed to read terminal input")
            }
            None => teardown,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct ScriptedKeys {
        script: VecDeque<io::Result<Option<KeyEvent>>>,
    }

    impl ScriptedKeys {
        fn new(script: Vec<io::Result<Option<KeyEvent>>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl KeySource for ScriptedKeys {
        fn next_key(&mut self, _timeout: Duration) -> io::Result<Option<KeyEvent>> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(io::Error::other("key script exhausted")))
        }
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn ctrl_c() -> KeyEvent {
        KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)
    }

    fn counting_teardown(count: &Arc<AtomicUsize>) -> Teardown {
        let count = Arc::clone(count);
        Box::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn interrupt_key_is_ctrl_c_only() {
        assert!(is_interrupt(&ctrl_c()));
        assert!(is_interrupt(&KeyEvent::new(
            KeyCode::Char('C'),
            KeyModifiers::CONTROL | KeyModifiers::SHIFT
        )));
        assert!(!is_interrupt(&key('c')));
        assert!(!is_interrupt(&KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL)));
        assert!(!is_interrupt(&KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
    }

    #[test]
    fn other_keys_do_not_stop_the_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let keys = ScriptedKeys::new(vec![
            Ok(Some(key('q'))),
            Ok(None),
            Ok(Some(key('c'))),
            Ok(Some(ctrl_c())),
        ]);

        EventLoop::new(keys, shutdown.clone(), counting_teardown(&count))
            .run()
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(shutdown.is_cancelled());
    }

    #[test]
    fn external_cancel_closes_session() {
        let count = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        EventLoop::new(ScriptedKeys::new(vec![]), shutdown, counting_teardown(&count))
            .run()
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn teardown_error_is_returned() {
        let shutdown = CancellationToken::new();
        let keys = ScriptedKeys::new(vec![Ok(Some(ctrl_c()))]);
        let teardown: Teardown = Box::new(|| Err(anyhow::anyhow!("redraw task failed")));

        let err = EventLoop::new(keys, shutdown, teardown).run().unwrap_err();
        assert_eq!(err.to_string(), "redraw task failed");
    }

    #[test]
    fn input_error_still_tears_down() {
        let count = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let keys = ScriptedKeys::new(vec![Err(io::Error::other("tty gone"))]);

        let err = EventLoop::new(keys, shutdown.clone(), counting_teardown(&count))
            .run()
            .unwrap_err();

        assert_eq!(err.to_string(), "failed to read terminal input");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(shutdown.is_cancelled());
    }

    #[test]
    fn repeated_interrupts_tear_down_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let slot: TeardownSlot = Arc::new(Mutex::new(None));
        let mut machine =
            SessionMachine::new(CancellationToken::new(), counting_teardown(&count), slot)
                .state_machine();

        machine.handle(&SessionEvent::Key(key('x')));
        assert_eq!(*machine.state(), State::Running {});

        machine.handle(&SessionEvent::Key(ctrl_c()));
        machine.handle(&SessionEvent::Key(ctrl_c()));
        machine.handle(&SessionEvent::Cancelled);

        assert_eq!(*machine.state(), State::Closed {});
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
