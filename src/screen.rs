//! Terminal control facility.
//!
//! `Screen` is the narrow surface the dashboard draws through: color-pair
//! registration, positioned attributed text, clearing, box drawing, flushing
//! and releasing the terminal. Two backends implement it:
//!
//! - `CrosstermScreen`: the real terminal (raw mode + alternate screen)
//! - `testing::MemoryScreen`: an in-memory character grid for tests
//!
//! All drawing goes through one `SharedScreen` lock, since terminal output is
//! not safe to interleave across threads.

use std::collections::HashMap;
use std::io::{self, IsTerminal, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::style::{Color, Colors, Print, ResetColor, SetColors};
use crossterm::terminal::{
    self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode,
    enable_raw_mode,
};
use crossterm::{execute, queue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::DisplayError;

/// Identifier of a registered foreground/background color pair.
pub type PairId = u8;

/// A rectangular, cell-addressed region of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The region shrunk by one cell on every side.
    pub fn inset(&self) -> Self {
        Self {
            x: self.x + 1,
            y: self.y + 1,
            width: self.width.saturating_sub(2),
            height: self.height.saturating_sub(2),
        }
    }

    /// Whether the region lies entirely inside a `cols` x `rows` screen.
    pub fn fits(&self, cols: u16, rows: u16) -> bool {
        u32::from(self.x) + u32::from(self.width) <= u32::from(cols)
            && u32::from(self.y) + u32::from(self.height) <= u32::from(rows)
    }
}

/// Raw screen control consumed by surfaces.
pub trait Screen: Send {
    /// Screen size as `(cols, rows)`.
    fn size(&self) -> (u16, u16);
    fn init_pair(&mut self, pair: PairId, fg: Color, bg: Color);
    fn put_str(&mut self, x: u16, y: u16, pair: PairId, text: &str) -> io::Result<()>;
    fn clear_rect(&mut self, rect: Rect) -> io::Result<()>;
    fn draw_box(&mut self, rect: Rect) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// Give the terminal back to the user. Calling it more than once is a no-op.
    fn restore(&mut self) -> io::Result<()>;
}

pub type SharedScreen = Arc<Mutex<Box<dyn Screen>>>;

pub fn shared(screen: Box<dyn Screen>) -> SharedScreen {
    Arc::new(Mutex::new(screen))
}

/// Lock the shared screen. Every redraw rewrites its region completely, so a
/// poisoned lock is still safe to draw through.
pub fn lock(screen: &SharedScreen) -> MutexGuard<'_, Box<dyn Screen>> {
    screen.lock().unwrap_or_else(PoisonError::into_inner)
}

// --- Box drawing glyphs ------------------------------------------------------

const TOP_LEFT: char = '┌';
const TOP_RIGHT: char = '┐';
const BOTTOM_LEFT: char = '└';
const BOTTOM_RIGHT: char = '┘';
const HORIZONTAL: char = '─';
const VERTICAL: char = '│';

/// Rows of a single-line box outline, top to bottom, as `(row offset, text)`.
fn box_rows(rect: Rect) -> Vec<(u16, String)> {
    if rect.width < 2 || rect.height < 2 {
        return Vec::new();
    }
    let inner = usize::from(rect.width - 2);
    let mut rows = Vec::with_capacity(usize::from(rect.height));

    let mut top = String::with_capacity(inner + 2);
    top.push(TOP_LEFT);
    top.extend(std::iter::repeat_n(HORIZONTAL, inner));
    top.push(TOP_RIGHT);
    rows.push((0, top));

    for dy in 1..rect.height - 1 {
        let mut side = String::with_capacity(inner + 2);
        side.push(VERTICAL);
        side.extend(std::iter::repeat_n(' ', inner));
        side.push(VERTICAL);
        rows.push((dy, side));
    }

    let mut bottom = String::with_capacity(inner + 2);
    bottom.push(BOTTOM_LEFT);
    bottom.extend(std::iter::repeat_n(HORIZONTAL, inner));
    bottom.push(BOTTOM_RIGHT);
    rows.push((rect.height - 1, bottom));

    rows
}

// --- CrosstermScreen ---------------------------------------------------------

/// Set while the terminal is in raw mode on the alternate screen. Whoever
/// clears it first (restore or the panic hook) gives the terminal back.
static TERMINAL_OWNED: AtomicBool = AtomicBool::new(false);

fn terminal_owned() -> bool {
    TERMINAL_OWNED.load(Ordering::SeqCst)
}

/// Restore the terminal before a panic message is printed, and cancel
/// `shutdown` so the session closes.
///
/// The stderr log mute does not cover panic output; with the terminal
/// already released the message lands on the normal screen.
pub fn install_panic_hook(shutdown: CancellationToken) {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            shutdown.cancel();
            if TERMINAL_OWNED.swap(false, Ordering::SeqCst) {
                release_terminal();
            }
            previous(info);
        }));
    });
}

fn release_terminal() {
    let mut out = io::stdout();
    let _ = execute!(out, ResetColor, Show, LeaveAlternateScreen);
    let _ = disable_raw_mode();
    let _ = out.flush();
}

/// The process terminal, driven through crossterm. Drawing becomes a no-op
/// once the terminal has been released.
pub struct CrosstermScreen {
    out: Stdout,
    pairs: HashMap<PairId, Colors>,
    cols: u16,
    rows: u16,
}

impl CrosstermScreen {
    /// Take over the terminal: raw mode, alternate screen, hidden cursor.
    ///
    /// The terminal is checked before anything is changed, so a failure here
    /// leaves it untouched.
    pub fn init(min_cols: u16, min_rows: u16) -> Result<Self, DisplayError> {
        let mut out = io::stdout();
        if !out.is_terminal() {
            return Err(DisplayError::Unavailable(io::Error::other(
                "stdout is not a terminal",
            )));
        }

        let (cols, rows) = terminal::size().map_err(DisplayError::Unavailable)?;
        let needed = Rect::new(0, 0, min_cols, min_rows);
        if !needed.fits(cols, rows) {
            return Err(DisplayError::Geometry {
                rect: needed,
                cols,
                rows,
            });
        }

        enable_raw_mode().map_err(DisplayError::Unavailable)?;
        if let Err(e) = execute!(out, EnterAlternateScreen, Hide, Clear(ClearType::All)) {
            let _ = disable_raw_mode();
            return Err(DisplayError::Unavailable(e));
        }
        TERMINAL_OWNED.store(true, Ordering::SeqCst);
        debug!(target: "screen", cols, rows, "terminal initialised");

        Ok(Self {
            out,
            pairs: HashMap::new(),
            cols,
            rows,
        })
    }

    fn colors(&self, pair: PairId) -> Colors {
        self.pairs
            .get(&pair)
            .copied()
            .unwrap_or(Colors::new(Color::Reset, Color::Reset))
    }
}

impl Screen for CrosstermScreen {
    fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    fn init_pair(&mut self, pair: PairId, fg: Color, bg: Color) {
        self.pairs.insert(pair, Colors::new(fg, bg));
    }

    fn put_str(&mut self, x: u16, y: u16, pair: PairId, text: &str) -> io::Result<()> {
        if !terminal_owned() {
            return Ok(());
        }
        let colors = self.colors(pair);
        queue!(self.out, MoveTo(x, y), SetColors(colors), Print(text), ResetColor)
    }

    fn clear_rect(&mut self, rect: Rect) -> io::Result<()> {
        if !terminal_owned() {
            return Ok(());
        }
        let blank = " ".repeat(usize::from(rect.width));
        for dy in 0..rect.height {
            queue!(self.out, MoveTo(rect.x, rect.y + dy), Print(&blank))?;
        }
        Ok(())
    }

    fn draw_box(&mut self, rect: Rect) -> io::Result<()> {
        if !terminal_owned() {
            return Ok(());
        }
        for (dy, line) in box_rows(rect) {
            queue!(self.out, MoveTo(rect.x, rect.y + dy), Print(line))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !terminal_owned() {
            return Ok(());
        }
        self.out.flush()
    }

    fn restore(&mut self) -> io::Result<()> {
        if !TERMINAL_OWNED.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let screen = execute!(self.out, ResetColor, Show, LeaveAlternateScreen);
        let mode = disable_raw_mode();
        debug!(target: "screen", "terminal restored");
        screen.and(mode)
    }
}

impl Drop for CrosstermScreen {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!(target: "screen", "Failed to restore terminal: {}", e);
        }
    }
}

// --- In-memory backend -------------------------------------------------------
