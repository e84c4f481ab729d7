//! Style palette: semantic color roles mapped to registered color pairs.
//!
//! Every role is a foreground color on black. The palette is registered
//! once, before any widget exists, and is read-only afterwards.

use crossterm::style::Color;

use crate::screen::{PairId, Screen};

/// Background shared by every pair.
const BACKGROUND: Color = Color::Black;

/// A named color role, decoupled from terminal color identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticColor {
    Neutral,
    Normal,
    Warning,
    Critical,
    Info,
    Accent,
    Highlight,
}

impl SemanticColor {
    pub const ALL: [SemanticColor; 7] = [
        SemanticColor::Neutral,
        SemanticColor::Normal,
        SemanticColor::Warning,
        SemanticColor::Critical,
        SemanticColor::Info,
        SemanticColor::Accent,
        SemanticColor::Highlight,
    ];

    pub fn foreground(self) -> Color {
        match self {
            SemanticColor::Neutral => Color::White,
            SemanticColor::Normal => Color::Green,
            SemanticColor::Warning => Color::Yellow,
            SemanticColor::Critical => Color::Red,
            SemanticColor::Info => Color::Cyan,
            SemanticColor::Accent => Color::Magenta,
            SemanticColor::Highlight => Color::Blue,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Registered pair ids, indexed by role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pairs: [PairId; 7],
}

impl Palette {
    /// Register one pair per role (ids 1..=7) with the screen.
    pub fn initialize(screen: &mut dyn Screen) -> Self {
        let mut pairs = [0; 7];
        for color in SemanticColor::ALL {
            let pair = color.index() as PairId + 1;
            screen.init_pair(pair, color.foreground(), BACKGROUND);
            pairs[color.index()] = pair;
        }
        Self { pairs }
    }

    pub fn pair(&self, color: SemanticColor) -> PairId {
        self.pairs[color.index()]
    }
}
