//! Terminal surface: one rectangular screen region owned by one widget.
//!
//! A surface redraws itself wholesale. `set_text` clears the region, redraws
//! the optional border, writes each fragment in its color and flushes, all
//! under a single screen lock.

use std::io;
use std::sync::Arc;

use tracing::trace;

use crate::error::DisplayError;
use crate::palette::{Palette, SemanticColor};
use crate::screen::{self, Rect, Screen, SharedScreen};

/// A run of text drawn in one semantic color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub color: SemanticColor,
    pub text: String,
}

impl Fragment {
    pub fn new(color: SemanticColor, text: impl Into<String>) -> Self {
        Self {
            color,
            text: text.into(),
        }
    }
}

pub struct Surface {
    screen: SharedScreen,
    palette: Arc<Palette>,
    region: Rect,
    border: bool,
    fragments: Vec<Fragment>,
}

impl Surface {
    /// Allocate the region `(x, y, width, height)`.
    ///
    /// With `border`, the outline takes the outermost cells and the drawable
    /// area is the region inset by one on each side.
    pub fn create(
        screen: &SharedScreen,
        palette: Arc<Palette>,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        border: bool,
    ) -> Result<Self, DisplayError> {
        let region = Rect::new(x, y, width, height);
        let (cols, rows) = screen::lock(screen).size();
        let min = if border { 3 } else { 1 };
        if width < min || height < min || !region.fits(cols, rows) {
            return Err(DisplayError::Geometry {
                rect: region,
                cols,
                rows,
            });
        }

        Ok(Self {
            screen: Arc::clone(screen),
            palette,
            region,
            border,
            fragments: Vec::new(),
        })
    }

    /// The cells text may be written to.
    pub fn drawable(&self) -> Rect {
        if self.border {
            self.region.inset()
        } else {
            self.region
        }
    }

    /// Fragments written by the last `set_text`.
    #[cfg(test)]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Replace the region's contents with `fragments`, laid out left to right
    /// from `(origin_x, origin_y)` relative to the drawable area. Text past
    /// the right edge is dropped.
    pub fn set_text(
        &mut self,
        fragments: Vec<Fragment>,
        origin_x: u16,
        origin_y: u16,
    ) -> Result<(), DisplayError> {
        let area = self.drawable();
        let mut screen = screen::lock(&self.screen);

        self.erase(&mut **screen)?;
        if self.border {
            screen.draw_box(self.region)?;
        }

        if origin_y < area.height {
            let y = area.y + origin_y;
            let mut offset = usize::from(origin_x);
            let limit = usize::from(area.width);
            for fragment in &fragments {
                if offset >= limit {
                    break;
                }
                let visible: String = fragment.text.chars().take(limit - offset).collect();
                let x = area.x + offset as u16;
                screen.put_str(x, y, self.palette.pair(fragment.color), &visible)?;
                offset += fragment.text.chars().count();
            }
        }

        present(&mut **screen)?;
        trace!(
            target: "surface",
            region = ?self.region,
            replaced = self.fragments.len(),
            fragments = fragments.len(),
            "Surface redrawn"
        );
        self.fragments = fragments;
        Ok(())
    }

    /// Blank every cell of the region, border included.
    pub fn clear(&mut self) -> Result<(), DisplayError> {
        self.erase(&mut **screen::lock(&self.screen))?;
        self.fragments.clear();
        Ok(())
    }

    pub fn refresh(&mut self) -> Result<(), DisplayError> {
        present(&mut **screen::lock(&self.screen))?;
        Ok(())
    }

    fn erase(&self, screen: &mut dyn Screen) -> io::Result<()> {
        screen.clear_rect(self.region)
    }
}

fn present(screen: &mut dyn Screen) -> io::Result<()> {
    screen.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::testing::{MemoryScreen, NO_PAIR};

    fn setup(cols: u16, rows: u16) -> (MemoryScreen, SharedScreen, Arc<Palette>) {
        let mut mem = MemoryScreen::new(cols, rows);
        let palette = Arc::new(Palette::initialize(&mut mem));
        let screen = mem.shared();
        (mem, screen, palette)
    }

    #[test]
    fn fragments_are_laid_out_cumulatively() {
        let (mem, screen, palette) = setup(20, 2);
        let mut surface = Surface::create(&screen, Arc::clone(&palette), 1, 0, 15, 1, false).unwrap();

        surface
            .set_text(
                vec![
                    Fragment::new(SemanticColor::Neutral, "ab"),
                    Fragment::new(SemanticColor::Critical, "cde"),
                    Fragment::new(SemanticColor::Neutral, "f"),
                ],
                0,
                0,
            )
            .unwrap();

        assert_eq!(mem.row_text(0), " abcdef");
        assert_eq!(mem.pair_at(2, 0), palette.pair(SemanticColor::Neutral));
        assert_eq!(mem.pair_at(3, 0), palette.pair(SemanticColor::Critical));
        assert_eq!(mem.pair_at(5, 0), palette.pair(SemanticColor::Critical));
        assert_eq!(mem.pair_at(6, 0), palette.pair(SemanticColor::Neutral));
        assert_eq!(mem.flushes(), 1);
        assert_eq!(surface.fragments().len(), 3);
    }

    #[test]
    fn overflow_is_clipped_to_region() {
        let (mem, screen, palette) = setup(20, 1);
        let mut surface = Surface::create(&screen, palette, 0, 0, 5, 1, false).unwrap();

        surface
            .set_text(
                vec![
                    Fragment::new(SemanticColor::Neutral, "abc"),
                    Fragment::new(SemanticColor::Normal, "defgh"),
                    Fragment::new(SemanticColor::Neutral, "ijk"),
                ],
                0,
                0,
            )
            .unwrap();

        assert_eq!(mem.row_text(0), "abcde");
    }

    #[test]
    fn redraw_clears_previous_text() {
        let (mem, screen, palette) = setup(20, 1);
        let mut surface = Surface::create(&screen, palette, 0, 0, 10, 1, false).unwrap();

        surface
            .set_text(vec![Fragment::new(SemanticColor::Neutral, "long text")], 0, 0)
            .unwrap();
        surface
            .set_text(vec![Fragment::new(SemanticColor::Neutral, "ok")], 0, 0)
            .unwrap();

        assert_eq!(mem.row_text(0), "ok");
        assert_eq!(mem.pair_at(5, 0), NO_PAIR);
    }

    #[test]
    fn border_insets_drawable_area() {
        let (mem, screen, palette) = setup(10, 4);
        let mut surface = Surface::create(&screen, palette, 0, 0, 6, 3, true).unwrap();
        assert_eq!(surface.drawable(), Rect::new(1, 1, 4, 1));

        surface
            .set_text(vec![Fragment::new(SemanticColor::Info, "hello")], 0, 0)
            .unwrap();

        assert_eq!(mem.row_text(0), "┌────┐");
        assert_eq!(mem.row_text(1), "│hell│");
        assert_eq!(mem.row_text(2), "└────┘");
    }

    #[test]
    fn origin_offsets_within_drawable_area() {
        let (mem, screen, palette) = setup(10, 3);
        let mut surface = Surface::create(&screen, palette, 2, 0, 6, 3, false).unwrap();

        surface
            .set_text(vec![Fragment::new(SemanticColor::Neutral, "xy")], 3, 2)
            .unwrap();

        assert_eq!(mem.row_text(0), "");
        assert_eq!(mem.row_text(2), "     xy");
    }

    #[test]
    fn rejects_regions_outside_screen() {
        let (_mem, screen, palette) = setup(80, 4);

        let err = Surface::create(&screen, Arc::clone(&palette), 1, 0, 80, 1, false)
            .err()
            .unwrap();
        assert!(matches!(err, DisplayError::Geometry { cols: 80, rows: 4, .. }));

        assert!(Surface::create(&screen, Arc::clone(&palette), 0, 4, 10, 1, false).is_err());
        assert!(Surface::create(&screen, Arc::clone(&palette), 0, 0, 0, 1, false).is_err());
        assert!(Surface::create(&screen, palette, 0, 0, 2, 2, true).is_err());
    }

    #[test]
    fn clear_blanks_region_only() {
        let (mem, screen, palette) = setup(10, 2);
        let mut left = Surface::create(&screen, Arc::clone(&palette), 0, 0, 3, 1, false).unwrap();
        let mut right = Surface::create(&screen, palette, 3, 0, 3, 1, false).unwrap();

        left.set_text(vec![Fragment::new(SemanticColor::Neutral, "aaa")], 0, 0)
            .unwrap();
        right
            .set_text(vec![Fragment::new(SemanticColor::Neutral, "bbb")], 0, 0)
            .unwrap();
        left.clear().unwrap();
        left.refresh().unwrap();

        assert_eq!(mem.row_text(0), "   bbb");
        assert!(left.fragments().is_empty());
        assert_eq!(mem.flushes(), 3);
    }
}
