//! Terminal cell representation
//!
//! Each cell in the terminal grid contains:
//! - A single codepoint (space when empty)
//! - Foreground and background colors
//! - An attribute bitset covering SGR rendition, line size, protection,
//!   wide-character bookkeeping and the dirty marker

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::color::Color;

bitflags! {
    /// Per-cell attribute flags.
    ///
    /// The low bits map to SGR renditions; the rest is bookkeeping owned by the
    /// screen model (line size, DECSCA protection, wide-character halves).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CellFlags: u32 {
        const BOLD              = 1 << 0;
        const FAINT             = 1 << 1;
        const ITALIC            = 1 << 2;
        const UNDERLINE         = 1 << 3;
        const DOUBLE_UNDERLINE  = 1 << 4;
        const BLINK             = 1 << 5;
        const REVERSE           = 1 << 6;
        const STRIKE            = 1 << 7;
        const CONCEAL           = 1 << 8;
        const OVERLINE          = 1 << 9;
        /// DECDWL line
        const DOUBLE_WIDTH      = 1 << 10;
        /// DECDHL top half
        const DOUBLE_HEIGHT_TOP = 1 << 11;
        /// DECDHL bottom half
        const DOUBLE_HEIGHT_BOTTOM = 1 << 12;
        /// DECSCA protected; survives selective erase
        const PROTECTED         = 1 << 13;
        const DIRTY             = 1 << 14;
        /// Cell carries a combining mark appended to the previous glyph
        const COMBINING         = 1 << 15;
        /// Leading half of a 2-column character
        const WIDE              = 1 << 16;
        /// Trailing half of a 2-column character
        const WIDE_SPACER       = 1 << 17;

        /// Renditions settable through SGR (and DECCARA)
        const SGR_MASK = Self::BOLD.bits()
            | Self::FAINT.bits()
            | Self::ITALIC.bits()
            | Self::UNDERLINE.bits()
            | Self::DOUBLE_UNDERLINE.bits()
            | Self::BLINK.bits()
            | Self::REVERSE.bits()
            | Self::STRIKE.bits()
            | Self::CONCEAL.bits()
            | Self::OVERLINE.bits();

        const LINE_SIZE_MASK = Self::DOUBLE_WIDTH.bits()
            | Self::DOUBLE_HEIGHT_TOP.bits()
            | Self::DOUBLE_HEIGHT_BOTTOM.bits();
    }
}

/// Attributes that affect how a cell is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAttributes {
    /// Foreground color
    pub fg: Color,
    /// Background color
    pub bg: Color,
    /// Rendition and bookkeeping flags
    pub flags: CellFlags,
}

impl Default for CellAttributes {
    fn default() -> Self {
        Self {
            fg: Color::DEFAULT_FG,
            bg: Color::DEFAULT_BG,
            flags: CellFlags::empty(),
        }
    }
}

impl CellAttributes {
    /// Create new default attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all attributes to default
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Check a flag
    pub fn has(&self, flag: CellFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Set or clear a flag
    pub fn set(&mut self, flag: CellFlags, on: bool) {
        self.flags.set(flag, on);
    }

    /// Get effective foreground color (accounting for reverse video)
    pub fn effective_fg(&self) -> Color {
        if self.has(CellFlags::REVERSE) {
            self.bg
        } else {
            self.fg
        }
    }

    /// Get effective background color (accounting for reverse video)
    pub fn effective_bg(&self) -> Color {
        if self.has(CellFlags::REVERSE) {
            self.fg
        } else {
            self.bg
        }
    }

    /// Attributes used to fill erased cells: colors only, no rendition.
    pub fn erase_attrs(&self) -> Self {
        Self {
            fg: self.fg,
            bg: self.bg,
            flags: CellFlags::empty(),
        }
    }
}

/// A single cell in the terminal grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// The codepoint stored in this cell
    pub ch: char,
    /// Display attributes
    pub attrs: CellAttributes,
}

impl Cell {
    /// Create a new empty cell
    pub fn new() -> Self {
        Self {
            ch: ' ',
            attrs: CellAttributes::default(),
        }
    }

    /// Create a cell with a character
    pub fn with_char(c: char) -> Self {
        Self::with_char_and_attrs(c, CellAttributes::default())
    }

    /// Create a cell with a character and attributes
    pub fn with_char_and_attrs(c: char, attrs: CellAttributes) -> Self {
        Self { ch: c, attrs }
    }

    /// Create a blank cell carrying the given attributes
    pub fn blank(attrs: CellAttributes) -> Self {
        Self { ch: ' ', attrs }
    }

    /// Set the character content
    pub fn set_char(&mut self, c: char) {
        self.ch = c;
    }

    /// Get the display character
    pub fn display_char(&self) -> char {
        self.ch
    }

    /// Check if cell is empty (just space)
    pub fn is_empty(&self) -> bool {
        self.ch == ' ' || self.ch == '\0'
    }

    /// Get the display width of this cell
    pub fn width(&self) -> u8 {
        if self.attrs.has(CellFlags::WIDE_SPACER) {
            0
        } else if self.attrs.has(CellFlags::WIDE) {
            2
        } else {
            1
        }
    }

    /// Check if this is the trailing half of a wide character
    pub fn is_continuation(&self) -> bool {
        self.attrs.has(CellFlags::WIDE_SPACER)
    }

    /// Check if selective erase must skip this cell
    pub fn is_protected(&self) -> bool {
        self.attrs.has(CellFlags::PROTECTED)
    }

    /// Clear the cell (reset to blank with given attributes)
    pub fn clear(&mut self, attrs: CellAttributes) {
        self.ch = ' ';
        self.attrs = attrs;
    }

    /// Reset cell to default state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Contribution to DECRQCRA / DSR 63 checksums
    pub fn checksum(&self) -> u32 {
        (self.ch as u32)
            .wrapping_add(self.attrs.fg.checksum_value())
            .wrapping_add(self.attrs.bg.checksum_value())
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculate the display width of a Unicode character
/// Returns 2 for wide characters (CJK, etc.), 1 for normal, 0 for combining marks
pub fn char_width(c: char) -> u8 {
    use unicode_width::UnicodeWidthChar;
    match c.width() {
        Some(0) => 0,
        Some(2) => 2,
        Some(_) => 1,
        None => 1, // Control characters - treat as 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_new() {
        let cell = Cell::new();
        assert!(cell.is_empty());
        assert_eq!(cell.width(), 1);
    }

    #[test]
    fn test_cell_with_char() {
        let cell = Cell::with_char('A');
        assert_eq!(cell.display_char(), 'A');
        assert_eq!(cell.width(), 1);
        assert!(!cell.is_empty());
    }

    #[test]
    fn test_char_width() {
        assert_eq!(char_width('A'), 1);
        assert_eq!(char_width('中'), 2);
        assert_eq!(char_width('\u{0301}'), 0);
    }

    #[test]
    fn test_wide_flags() {
        let mut cell = Cell::with_char('中');
        cell.attrs.set(CellFlags::WIDE, true);
        assert_eq!(cell.width(), 2);
        let mut spacer = Cell::new();
        spacer.attrs.set(CellFlags::WIDE_SPACER, true);
        assert!(spacer.is_continuation());
        assert_eq!(spacer.width(), 0);
    }

    #[test]
    fn test_cell_clear() {
        let mut cell = Cell::with_char('X');
        cell.clear(CellAttributes::default());
        assert!(cell.is_empty());
    }

    #[test]
    fn test_attributes_reverse() {
        let mut attrs = CellAttributes::new();
        attrs.fg = Color::Indexed(1);
        attrs.bg = Color::Indexed(0);
        attrs.set(CellFlags::REVERSE, true);

        assert_eq!(attrs.effective_fg(), Color::Indexed(0));
        assert_eq!(attrs.effective_bg(), Color::Indexed(1));
    }

    #[test]
    fn test_attributes_reset() {
        let mut attrs = CellAttributes::new();
        attrs.set(CellFlags::BOLD | CellFlags::ITALIC, true);
        attrs.fg = Color::Indexed(1);

        attrs.reset();

        assert!(!attrs.has(CellFlags::BOLD));
        assert!(!attrs.has(CellFlags::ITALIC));
        assert_eq!(attrs.fg, Color::DEFAULT_FG);
    }

    #[test]
    fn test_erase_attrs_keep_colors() {
        let mut attrs = CellAttributes::new();
        attrs.bg = Color::Indexed(4);
        attrs.set(CellFlags::UNDERLINE | CellFlags::PROTECTED, true);
        let erased = attrs.erase_attrs();
        assert_eq!(erased.bg, Color::Indexed(4));
        assert!(erased.flags.is_empty());
    }

    #[test]
    fn test_cell_checksum() {
        let cell = Cell::with_char('A');
        assert_eq!(cell.checksum(), 65 + 7);
    }
}
