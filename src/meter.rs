//! Load meter widget: one percentage rendered as `<label> [||||    ] <n>%`.
//!
//! The bar length depends only on the widget width and the label length,
//! so the layout math lives in free functions that never touch a screen.

use std::sync::Arc;

use tracing::trace;

use crate::error::{DisplayError, MeterError};
use crate::palette::{Palette, SemanticColor};
use crate::screen::SharedScreen;
use crate::surface::{Fragment, Surface};

/// Cells reserved around the bar: `" ["`, `"] "` and the widest suffix.
const RESERVED: usize = 8;
/// Values strictly above this are drawn in the critical color.
pub const CRITICAL_ABOVE: u8 = 95;

const FILL: char = '|';
const EMPTY: char = ' ';

/// Number of cells available to the bar, or `None` if the width leaves none.
pub fn bar_area_len(width: u16, label_len: usize) -> Option<usize> {
    usize::from(width)
        .checked_sub(label_len + RESERVED + 1)
        .filter(|len| *len > 0)
}

/// Smallest width that still leaves a one-cell bar for `label_len`.
pub fn min_width(label_len: usize) -> usize {
    label_len + RESERVED + 2
}

/// Filled cells for `percent` on a bar of `bar_len` cells, rounding half to
/// even.
pub fn filled_cells(percent: u8, bar_len: usize) -> usize {
    let fraction = f64::from(percent) / 100.0;
    let filled = (fraction * bar_len as f64).round_ties_even() as usize;
    filled.min(bar_len)
}

pub fn bar_color(percent: u8) -> SemanticColor {
    if percent > CRITICAL_ABOVE {
        SemanticColor::Critical
    } else {
        SemanticColor::Normal
    }
}

/// The three fragments for `percent`: label and open bracket, bar, suffix.
pub fn render(label: &str, bar_len: usize, percent: u8) -> Vec<Fragment> {
    let filled = filled_cells(percent, bar_len);
    let mut bar = String::with_capacity(bar_len);
    bar.extend(std::iter::repeat_n(FILL, filled));
    bar.extend(std::iter::repeat_n(EMPTY, bar_len - filled));

    vec![
        Fragment::new(SemanticColor::Neutral, format!("{label} [")),
        Fragment::new(bar_color(percent), bar),
        Fragment::new(SemanticColor::Neutral, format!("] {percent}%")),
    ]
}

pub struct LoadMeter {
    label: String,
    bar_len: usize,
    surface: Surface,
    value: u8,
}

impl LoadMeter {
    /// Create a one-row meter at `(x, y)` and draw it at 0%.
    pub fn new(
        screen: &SharedScreen,
        palette: Arc<Palette>,
        x: u16,
        y: u16,
        width: u16,
        label: impl Into<String>,
    ) -> Result<Self, MeterError> {
        let label = label.into();
        let label_len = label.chars().count();
        let Some(bar_len) = bar_area_len(width, label_len) else {
            return Err(MeterError::WidthTooSmall {
                label,
                width,
                minimum: u16::try_from(min_width(label_len)).unwrap_or(u16::MAX),
            });
        };

        let surface = Surface::create(screen, palette, x, y, width, 1, false)?;
        let mut meter = Self {
            label,
            bar_len,
            surface,
            value: 0,
        };
        meter.set_value(0)?;
        Ok(meter)
    }

    /// Redraw the meter at `percent`, clamped to 100.
    pub fn set_value(&mut self, percent: u8) -> Result<(), DisplayError> {
        let percent = percent.min(100);
        let fragments = render(&self.label, self.bar_len, percent);
        self.surface.set_text(fragments, 0, 0)?;
        trace!(target: "meter", label = %self.label, from = self.value, to = percent, "Meter updated");
        self.value = percent;
        Ok(())
    }

    /// Blank the meter's row. The value is kept.
    pub fn clear(&mut self) -> Result<(), DisplayError> {
        self.surface.clear()?;
        self.surface.refresh()
    }

    #[cfg(test)]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[cfg(test)]
    pub fn value(&self) -> u8 {
        self.value
    }

    #[cfg(test)]
    pub fn bar_len(&self) -> usize {
        self.bar_len
    }

    /// Fragments currently on screen.
    #[cfg(test)]
    pub fn fragments(&self) -> &[Fragment] {
        self.surface.fragments()
    }
}
