//! Cursor state management
//!
//! Handles cursor position, style, visibility, and saved state.
//! Bounds and margin clamping live in the screen, which knows the
//! scroll region and origin mode.

use serde::{Deserialize, Serialize};

use crate::cell::CellAttributes;
use crate::charset::CharsetState;
use crate::color::Rgb;

/// Cursor visual style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CursorStyle {
    /// Block cursor (filled rectangle)
    #[default]
    Block,
    /// Underline cursor
    Underline,
    /// Vertical bar cursor
    Bar,
}

impl CursorStyle {
    /// Style and blink selected by DECSCUSR `CSI Ps SP q`
    pub fn from_decscusr(ps: u16) -> Option<(CursorStyle, bool)> {
        match ps {
            0 | 1 => Some((CursorStyle::Block, true)),
            2 => Some((CursorStyle::Block, false)),
            3 => Some((CursorStyle::Underline, true)),
            4 => Some((CursorStyle::Underline, false)),
            5 => Some((CursorStyle::Bar, true)),
            6 => Some((CursorStyle::Bar, false)),
            _ => None,
        }
    }

    /// Inverse of [`CursorStyle::from_decscusr`], used by DECRQSS
    pub fn to_decscusr(self, blinking: bool) -> u16 {
        let base = match self {
            CursorStyle::Block => 1,
            CursorStyle::Underline => 3,
            CursorStyle::Bar => 5,
        };
        if blinking {
            base
        } else {
            base + 1
        }
    }
}

/// Cursor state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Column position (0-indexed)
    pub col: usize,
    /// Row position (0-indexed)
    pub row: usize,
    /// Visual style
    pub style: CursorStyle,
    /// Whether cursor is visible
    pub visible: bool,
    /// Whether cursor should blink
    pub blinking: bool,
    /// Explicit cursor color (OSC 12); `None` uses the cell colors
    pub color: Option<Rgb>,
    /// Current cell attributes (used for new characters)
    pub attrs: CellAttributes,
    /// Pending wrap: cursor is at the right margin and next char should wrap
    pub pending_wrap: bool,
}

impl Cursor {
    /// Create a new cursor at position (0, 0)
    pub fn new() -> Self {
        Self {
            col: 0,
            row: 0,
            style: CursorStyle::Block,
            visible: true,
            blinking: true,
            color: None,
            attrs: CellAttributes::default(),
            pending_wrap: false,
        }
    }

    /// Move cursor to a position that the caller already clamped
    pub fn set_position(&mut self, col: usize, row: usize) {
        self.col = col;
        self.row = row;
        self.pending_wrap = false;
    }

    /// Move cursor to beginning of line
    pub fn carriage_return(&mut self, left_margin: usize) {
        self.col = left_margin;
        self.pending_wrap = false;
    }

    /// Reset cursor to default state
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Saved cursor state for DECSC/DECRC
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavedCursor {
    pub col: usize,
    pub row: usize,
    pub attrs: CellAttributes,
    pub origin_mode: bool,
    pub autowrap: bool,
    pub pending_wrap: bool,
    pub charset: CharsetState,
}

impl SavedCursor {
    /// Capture the cursor together with the modes and charsets DECSC preserves
    pub fn save(cursor: &Cursor, origin_mode: bool, autowrap: bool, charset: &CharsetState) -> Self {
        Self {
            col: cursor.col,
            row: cursor.row,
            attrs: cursor.attrs,
            origin_mode,
            autowrap,
            pending_wrap: cursor.pending_wrap,
            charset: *charset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellFlags;

    #[test]
    fn test_cursor_new() {
        let cursor = Cursor::new();
        assert_eq!(cursor.col, 0);
        assert_eq!(cursor.row, 0);
        assert!(cursor.visible);
        assert_eq!(cursor.style, CursorStyle::Block);
    }

    #[test]
    fn test_set_position_clears_wrap() {
        let mut cursor = Cursor::new();
        cursor.pending_wrap = true;
        cursor.set_position(5, 3);
        assert_eq!((cursor.col, cursor.row), (5, 3));
        assert!(!cursor.pending_wrap);
    }

    #[test]
    fn test_carriage_return_to_margin() {
        let mut cursor = Cursor::new();
        cursor.col = 40;
        cursor.carriage_return(10);
        assert_eq!(cursor.col, 10);
    }

    #[test]
    fn test_decscusr_mapping() {
        assert_eq!(CursorStyle::from_decscusr(4), Some((CursorStyle::Underline, false)));
        assert_eq!(CursorStyle::from_decscusr(9), None);
        assert_eq!(CursorStyle::Bar.to_decscusr(true), 5);
        assert_eq!(CursorStyle::Block.to_decscusr(false), 2);
    }

    #[test]
    fn test_saved_cursor() {
        let mut cursor = Cursor::new();
        cursor.set_position(10, 5);
        cursor.attrs.set(CellFlags::BOLD, true);
        let charset = CharsetState::new();

        let saved = SavedCursor::save(&cursor, true, false, &charset);
        assert_eq!(saved.col, 10);
        assert_eq!(saved.row, 5);
        assert!(saved.attrs.has(CellFlags::BOLD));
        assert!(saved.origin_mode);
        assert!(!saved.autowrap);
    }
}
