//! Render handoff
//!
//! A flattened, serializable view of a screen: one entry per viewport cell
//! with resolved colors, the attribute bits and an optional glyph slot, plus
//! the dirty-row bitmap. Renderers consume this instead of the live grid.

use serde::{Deserialize, Serialize};

use crate::bidi;
use crate::cell::{Cell, CellFlags};
use crate::cursor::CursorStyle;
use crate::modes::{AnsiModes, DecModes};
use crate::screen::Screen;

/// One rendered cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderCell {
    pub codepoint: u32,
    /// 0xRRGGBBAA after reverse video
    pub fg_packed: u32,
    pub bg_packed: u32,
    pub attr_bits: u32,
    /// Atlas slot for codepoints outside the base set
    pub glyph_slot: Option<u32>,
}

impl Default for RenderCell {
    fn default() -> Self {
        Self {
            codepoint: ' ' as u32,
            fg_packed: 0,
            bg_packed: 0,
            attr_bits: 0,
            glyph_slot: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderCursor {
    pub col: usize,
    pub row: usize,
    pub visible: bool,
    pub style: CursorStyle,
    pub blinking: bool,
}

/// A full frame of cells ready for drawing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderFrame {
    pub cols: usize,
    pub rows: usize,
    /// Row-major cells, `rows * cols` entries
    pub cells: Vec<RenderCell>,
    /// Dirty-row bitmap, bit `r % 64` of word `r / 64`
    pub dirty: Vec<u64>,
    pub cursor: RenderCursor,
}

impl RenderFrame {
    /// Capture the visible part of a screen.
    ///
    /// `glyph_slot` maps codepoints above U+00FF to atlas slots; it is only
    /// consulted for those.
    pub fn from_screen<F>(screen: &Screen, mut glyph_slot: F) -> Self
    where
        F: FnMut(char) -> Option<u32>,
    {
        let grid = screen.grid();
        let cols = grid.cols();
        let rows = grid.rows();
        let palette = screen.palette();
        let screen_reverse = screen.modes().dec(DecModes::REVERSE_VIDEO);
        let bidi = screen.modes().ansi(AnsiModes::BIDI);

        let mut cells = Vec::with_capacity(rows * cols);
        let mut line: Vec<Cell> = Vec::with_capacity(cols);
        for row in 0..rows {
            line.clear();
            line.extend_from_slice(grid.display_row(row));
            if bidi {
                bidi::reorder_row(&mut line);
            }
            for cell in &line {
                let mut fg = cell.attrs.effective_fg().packed(palette);
                let mut bg = cell.attrs.effective_bg().packed(palette);
                if screen_reverse {
                    std::mem::swap(&mut fg, &mut bg);
                }
                let codepoint = cell.ch as u32;
                let slot = if codepoint > 0xFF {
                    glyph_slot(cell.ch)
                } else {
                    None
                };
                cells.push(RenderCell {
                    codepoint,
                    fg_packed: fg,
                    bg_packed: bg,
                    attr_bits: (cell.attrs.flags - CellFlags::DIRTY).bits(),
                    glyph_slot: slot,
                });
            }
        }

        let mut dirty = vec![0u64; rows.div_ceil(64)];
        for (row, &d) in grid.dirty_rows().iter().enumerate() {
            if d {
                dirty[row / 64] |= 1 << (row % 64);
            }
        }

        let cursor = screen.cursor();
        Self {
            cols,
            rows,
            cells,
            dirty,
            cursor: RenderCursor {
                col: cursor.col,
                row: cursor.row,
                visible: screen.modes().dec(DecModes::CURSOR_VISIBLE) && grid.view_offset() == 0,
                style: cursor.style,
                blinking: cursor.blinking,
            },
        }
    }

    /// Empty frame of the given size
    pub fn blank(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![RenderCell::default(); cols * rows],
            dirty: vec![0; rows.div_ceil(64)],
            cursor: RenderCursor {
                col: 0,
                row: 0,
                visible: false,
                style: CursorStyle::Block,
                blinking: false,
            },
        }
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&RenderCell> {
        if row < self.rows && col < self.cols {
            self.cells.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> &[RenderCell] {
        let start = (row * self.cols).min(self.cells.len());
        let end = (start + self.cols).min(self.cells.len());
        &self.cells[start..end]
    }

    pub fn is_dirty(&self, row: usize) -> bool {
        self.dirty
            .get(row / 64)
            .is_some_and(|w| w & (1 << (row % 64)) != 0)
    }

    pub fn mark_dirty(&mut self, row: usize) {
        if let Some(w) = self.dirty.get_mut(row / 64) {
            *w |= 1 << (row % 64);
        }
    }

    /// Copy `count` rows of `src` starting at `src_row` into this frame at `dst_row`.
    ///
    /// Columns are truncated or blank-padded to this frame's width.
    pub fn splice_rows(&mut self, src: &RenderFrame, src_row: usize, dst_row: usize, count: usize) {
        for i in 0..count {
            let (s, d) = (src_row + i, dst_row + i);
            if s >= src.rows || d >= self.rows {
                break;
            }
            let src_line = src.row(s);
            let base = d * self.cols;
            for col in 0..self.cols {
                self.cells[base + col] = src_line.get(col).copied().unwrap_or_default();
            }
            if src.is_dirty(s) {
                self.mark_dirty(d);
            }
        }
    }

    /// Row text, trailing blanks trimmed
    pub fn row_text(&self, row: usize) -> String {
        let s: String = self
            .row(row)
            .iter()
            .filter(|c| c.attr_bits & CellFlags::WIDE_SPACER.bits() == 0)
            .map(|c| char::from_u32(c.codepoint).unwrap_or(' '))
            .collect();
        s.trim_end().to_string()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::Dimensions;

    #[test]
    fn test_frame_from_screen() {
        let mut screen = Screen::new(Dimensions::new(4, 2), 0);
        screen.cursor_mut().attrs.fg = Color::Indexed(1);
        screen.print('a');
        let frame = RenderFrame::from_screen(&screen, |_| None);
        let cell = frame.cell(0, 0).copied().unwrap_or_default();
        assert_eq!(cell.codepoint, 'a' as u32);
        assert_eq!(cell.fg_packed, 0xAA0000FF);
        assert_eq!(frame.row_text(0), "a");
        assert!(frame.is_dirty(0));
        assert_eq!(frame.cursor.col, 1);
    }

    #[test]
    fn test_glyph_slot_only_above_latin1() {
        let mut screen = Screen::new(Dimensions::new(4, 1), 0);
        screen.print('é');
        screen.print('Ж');
        let mut asked = Vec::new();
        let frame = RenderFrame::from_screen(&screen, |c| {
            asked.push(c);
            Some(7)
        });
        assert_eq!(asked, vec!['Ж']);
        assert_eq!(frame.row(0)[0].glyph_slot, None);
        assert_eq!(frame.row(0)[1].glyph_slot, Some(7));
    }

    #[test]
    fn test_bidi_applies_with_mode() {
        let mut screen = Screen::new(Dimensions::new(4, 1), 0);
        for c in "\u{5D0}\u{5D1}".chars() {
            screen.print(c);
        }
        let plain = RenderFrame::from_screen(&screen, |_| None);
        assert_eq!(plain.row(0)[0].codepoint, 0x5D0);

        screen.modes_mut().set_mode(8, true);
        let frame = RenderFrame::from_screen(&screen, |_| None);
        assert_eq!(frame.row(0)[0].codepoint, 0x5D1);
    }

    #[test]
    fn test_splice_rows() {
        let mut top = Screen::new(Dimensions::new(3, 2), 0);
        top.print('t');
        let mut bottom = Screen::new(Dimensions::new(3, 2), 0);
        bottom.print('b');
        let mut frame = RenderFrame::from_screen(&top, |_| None);
        let other = RenderFrame::from_screen(&bottom, |_| None);
        frame.splice_rows(&other, 0, 1, 1);
        assert_eq!(frame.row_text(0), "t");
        assert_eq!(frame.row_text(1), "b");
    }

    #[test]
    fn test_json_roundtrip() {
        let screen = Screen::new(Dimensions::new(2, 1), 0);
        let frame = RenderFrame::from_screen(&screen, |_| None);
        let json = frame.to_json().unwrap();
        let back: RenderFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }
}
