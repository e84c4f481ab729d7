//! Error types for the display, the load meters and CPU sampling.
//!
//! Startup failures (`DisplayError::Unavailable`, `DisplayError::Geometry`,
//! `MeterError::WidthTooSmall`) abort before the dashboard loop starts.
//! Steady-state drawing failures (`DisplayError::Io`) are fatal as well;
//! sampling failures are retried by the sampler.

use std::fmt;
use std::io;

use crate::screen::Rect;

// ---------------------------------------------------------------------------
// DisplayError
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum DisplayError {
    /// The terminal could not be initialised (not a TTY, raw mode refused, ...).
    Unavailable(io::Error),
    /// A region is degenerate or does not fit on the screen.
    Geometry { rect: Rect, cols: u16, rows: u16 },
    /// Writing to or flushing the terminal failed.
    Io(io::Error),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(e) => write!(f, "terminal unavailable: {e}"),
            Self::Geometry { rect, cols, rows } => write!(
                f,
                "region {}x{} at ({}, {}) does not fit a {cols}x{rows} screen",
                rect.width, rect.height, rect.x, rect.y
            ),
            Self::Io(e) => write!(f, "terminal write failed: {e}"),
        }
    }
}

impl std::error::Error for DisplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unavailable(e) | Self::Io(e) => Some(e),
            Self::Geometry { .. } => None,
        }
    }
}

impl From<io::Error> for DisplayError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// MeterError
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum MeterError {
    /// The width leaves no room for the bar after the label and brackets.
    WidthTooSmall {
        label: String,
        width: u16,
        minimum: u16,
    },
    Display(DisplayError),
}

impl fmt::Display for MeterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WidthTooSmall {
                label,
                width,
                minimum,
            } => write!(
                f,
                "load meter {label:?} needs a width of at least {minimum}, got {width}"
            ),
            Self::Display(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MeterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::WidthTooSmall { .. } => None,
            Self::Display(e) => Some(e),
        }
    }
}

impl From<DisplayError> for MeterError {
    fn from(e: DisplayError) -> Self {
        Self::Display(e)
    }
}

// ---------------------------------------------------------------------------
// SamplingError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamplingError {
    /// The OS reported no logical CPUs.
    NoCores,
    /// A sample did not carry one value per core.
    CoreCountMismatch { expected: usize, actual: usize },
}

impl fmt::Display for SamplingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCores => write!(f, "no logical CPUs reported"),
            Self::CoreCountMismatch { expected, actual } => {
                write!(f, "expected {expected} per-core values, got {actual}")
            }
        }
    }
}

impl std::error::Error for SamplingError {}
