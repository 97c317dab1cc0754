//! Cell model: glyph, colors, and style flags.

use std::fmt;

/// 24-bit RGB color as the editor reports it (0xRRGGBB).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self((r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    pub fn r(&self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn g(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn b(&self) -> u8 {
        self.0 as u8
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0 & 0xff_ff_ff)
    }
}

bitflags::bitflags! {
    /// Style attributes a cell can carry. Mirrors the highlight attributes
    /// the editor sends; renderers translate these to their own backends.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CellFlags: u8 {
        const BOLD      = 0b0000_0001;
        const ITALIC    = 0b0000_0010;
        const UNDERLINE = 0b0000_0100;
        const REVERSE   = 0b0000_1000;
        const UNDERCURL = 0b0001_0000;
    }
}

/// One grid cell.
///
/// The empty-cell sentinel glyph is the empty string. An empty string and a
/// single space are distinct contents (they compare unequal and both occur on
/// the wire) but identical for foreground painting: neither has a visible
/// glyph. Renderers must use `has_foreground_glyph` rather than re-deriving
/// that equivalence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub glyph: String,
    /// `None` means "use the grid default" at render time.
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub flags: CellFlags,
}

impl Cell {
    /// True when there is a visible foreground glyph to draw. Empty string
    /// and single space are both background-only by contract.
    pub fn has_foreground_glyph(&self) -> bool {
        !(self.glyph.is_empty() || self.glyph == " ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_space_are_background_only() {
        let empty = Cell::default();
        let space = Cell {
            glyph: " ".into(),
            ..Cell::default()
        };
        assert!(!empty.has_foreground_glyph());
        assert!(!space.has_foreground_glyph());
        assert_ne!(empty, space, "contents stay distinct, only painting folds them");
    }

    #[test]
    fn visible_glyph_detected() {
        let cell = Cell {
            glyph: "월".into(),
            ..Cell::default()
        };
        assert!(cell.has_foreground_glyph());
    }

    #[test]
    fn color_channels() {
        let c = Color::rgb(0x12, 0x34, 0x56);
        assert_eq!((c.r(), c.g(), c.b()), (0x12, 0x34, 0x56));
        assert_eq!(c.to_string(), "#123456");
    }
}
