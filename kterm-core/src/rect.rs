//! Rectangular area operations (VT420 DECCRA, DECFRA, DECERA, DECSERA,
//! DECCARA, DECRARA, DECRQCRA)
//!
//! Rectangles are inclusive and 0-based once they reach this module; the
//! session converts the 1-based wire parameters and applies origin mode.

use crate::cell::{Cell, CellAttributes, CellFlags};
use crate::color::Color;
use crate::grid::Grid;

/// Inclusive rectangle in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

impl Rect {
    pub fn new(top: usize, left: usize, bottom: usize, right: usize) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Build from 1-based wire parameters where 0 means "default".
    ///
    /// Defaults are the full page. Values past the page are clamped; an
    /// inverted rectangle yields `None`.
    pub fn from_params(top: u16, left: u16, bottom: u16, right: u16, rows: usize, cols: usize) -> Option<Rect> {
        Self::extent_from_params([top, left, bottom, right], rows, cols, false)
    }

    /// [`Rect::from_params`] for DECCARA / DECRARA, where a stream extent
    /// spanning rows may end left of where it starts
    pub fn extent_from_params(params: [u16; 4], rows: usize, cols: usize, stream: bool) -> Option<Rect> {
        let [top, left, bottom, right] = params;
        let pick = |v: u16, default: usize, max: usize| -> usize {
            if v == 0 {
                default
            } else {
                (v as usize).min(max)
            }
        };
        let top = pick(top, 1, rows) - 1;
        let left = pick(left, 1, cols) - 1;
        let bottom = pick(bottom, rows, rows) - 1;
        let right = pick(right, cols, cols) - 1;
        let columns_ok = left <= right || (stream && top < bottom);
        if top > bottom || !columns_ok {
            return None;
        }
        Some(Rect::new(top, left, bottom, right))
    }

    /// Clamp to a grid
    pub fn clamp(self, rows: usize, cols: usize) -> Option<Rect> {
        self.clamp_extent(rows, cols, false)
    }

    /// Clamp to a grid; a stream extent spanning rows may have `left > right`
    pub fn clamp_extent(self, rows: usize, cols: usize, stream: bool) -> Option<Rect> {
        if rows == 0 || cols == 0 {
            return None;
        }
        let r = Rect::new(
            self.top.min(rows - 1),
            self.left.min(cols - 1),
            self.bottom.min(rows - 1),
            self.right.min(cols - 1),
        );
        let columns_ok = r.left <= r.right || (stream && r.top < r.bottom);
        if r.top > r.bottom || !columns_ok {
            None
        } else {
            Some(r)
        }
    }

    pub fn width(&self) -> usize {
        self.right - self.left + 1
    }

    pub fn height(&self) -> usize {
        self.bottom - self.top + 1
    }

    /// Column span touched on `row`; stream extent covers whole inner rows
    fn span(&self, row: usize, stream: bool, cols: usize) -> (usize, usize) {
        if !stream || self.top == self.bottom {
            return (self.left, self.right);
        }
        if row == self.top {
            (self.left, cols - 1)
        } else if row == self.bottom {
            (0, self.right)
        } else {
            (0, cols - 1)
        }
    }
}

/// Attribute change requested by DECCARA
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttrChange {
    pub set: CellFlags,
    pub clear: CellFlags,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
}

impl AttrChange {
    /// Build from SGR parameters (0, 1, 4, 5, 7, 8, 22, 24, 25, 27, 28 and colors 30-47)
    pub fn from_sgr(params: &[u16]) -> Self {
        let mut change = AttrChange::default();
        let params: &[u16] = if params.is_empty() { &[0] } else { params };
        for &p in params {
            match p {
                0 => {
                    change.set = CellFlags::empty();
                    change.clear = CellFlags::SGR_MASK;
                    change.fg = Some(Color::DEFAULT_FG);
                    change.bg = Some(Color::DEFAULT_BG);
                }
                1 => change.add(CellFlags::BOLD),
                4 => change.add(CellFlags::UNDERLINE),
                5 => change.add(CellFlags::BLINK),
                7 => change.add(CellFlags::REVERSE),
                8 => change.add(CellFlags::CONCEAL),
                22 => change.remove(CellFlags::BOLD),
                24 => change.remove(CellFlags::UNDERLINE),
                25 => change.remove(CellFlags::BLINK),
                27 => change.remove(CellFlags::REVERSE),
                28 => change.remove(CellFlags::CONCEAL),
                30..=37 => change.fg = Some(Color::Indexed((p - 30) as u8)),
                39 => change.fg = Some(Color::DEFAULT_FG),
                40..=47 => change.bg = Some(Color::Indexed((p - 40) as u8)),
                49 => change.bg = Some(Color::DEFAULT_BG),
                _ => log::debug!("DECCARA: ignoring attribute {}", p),
            }
        }
        change
    }

    fn add(&mut self, flag: CellFlags) {
        self.set |= flag;
        self.clear &= !flag;
    }

    fn remove(&mut self, flag: CellFlags) {
        self.clear |= flag;
        self.set &= !flag;
    }

    fn apply(&self, attrs: &mut CellAttributes) {
        attrs.flags &= !self.clear;
        attrs.flags |= self.set;
        if let Some(fg) = self.fg {
            attrs.fg = fg;
        }
        if let Some(bg) = self.bg {
            attrs.bg = bg;
        }
    }
}

/// Flags toggled by DECRARA for the given SGR parameters
pub fn reverse_mask(params: &[u16]) -> CellFlags {
    let mut mask = CellFlags::empty();
    let params: &[u16] = if params.is_empty() { &[0] } else { params };
    for &p in params {
        match p {
            0 => mask |= CellFlags::BOLD | CellFlags::UNDERLINE | CellFlags::BLINK | CellFlags::REVERSE,
            1 => mask |= CellFlags::BOLD,
            4 => mask |= CellFlags::UNDERLINE,
            5 => mask |= CellFlags::BLINK,
            7 => mask |= CellFlags::REVERSE,
            8 => mask |= CellFlags::CONCEAL,
            _ => log::debug!("DECRARA: ignoring attribute {}", p),
        }
    }
    mask
}

/// DECCRA: copy `src` so its top-left lands at (`dst_top`, `dst_left`).
///
/// The source is buffered first so overlapping copies behave.
pub fn copy_rect(grid: &mut Grid, src: Rect, dst_top: usize, dst_left: usize) {
    let rows = grid.rows();
    let cols = grid.cols();
    let Some(src) = src.clamp(rows, cols) else {
        return;
    };
    if dst_top >= rows || dst_left >= cols {
        return;
    }
    let height = src.height().min(rows - dst_top);
    let width = src.width().min(cols - dst_left);
    let buffer: Vec<Vec<Cell>> = (0..height)
        .map(|i| grid.row(src.top + i)[src.left..src.left + width].to_vec())
        .collect();
    for (i, line) in buffer.iter().enumerate() {
        grid.row_mut(dst_top + i)[dst_left..dst_left + width].copy_from_slice(line);
    }
}

/// DECFRA: fill with a character using the given attributes
pub fn fill_rect(grid: &mut Grid, rect: Rect, ch: char, attrs: CellAttributes) {
    let Some(rect) = rect.clamp(grid.rows(), grid.cols()) else {
        return;
    };
    let cell = Cell::with_char_and_attrs(ch, attrs);
    for row in rect.top..=rect.bottom {
        grid.row_mut(row)[rect.left..=rect.right].fill(cell);
    }
}

/// DECERA: erase to blanks
pub fn erase_rect(grid: &mut Grid, rect: Rect, attrs: CellAttributes) {
    let Some(rect) = rect.clamp(grid.rows(), grid.cols()) else {
        return;
    };
    for row in rect.top..=rect.bottom {
        grid.clear_row_range(row, rect.left, rect.right + 1, attrs);
    }
}

/// DECSERA: erase unprotected cells
pub fn selective_erase_rect(grid: &mut Grid, rect: Rect, attrs: CellAttributes) {
    let Some(rect) = rect.clamp(grid.rows(), grid.cols()) else {
        return;
    };
    for row in rect.top..=rect.bottom {
        grid.selective_clear_row_range(row, rect.left, rect.right + 1, attrs);
    }
}

/// DECCARA: change attributes in a rectangle or stream extent
pub fn change_attrs(grid: &mut Grid, rect: Rect, change: &AttrChange, stream: bool) {
    let cols = grid.cols();
    let Some(rect) = rect.clamp_extent(grid.rows(), cols, stream) else {
        return;
    };
    for row in rect.top..=rect.bottom {
        let (l, r) = rect.span(row, stream, cols);
        for cell in &mut grid.row_mut(row)[l..=r] {
            change.apply(&mut cell.attrs);
        }
    }
}

/// DECRARA: toggle attributes in a rectangle or stream extent
pub fn reverse_attrs(grid: &mut Grid, rect: Rect, mask: CellFlags, stream: bool) {
    let cols = grid.cols();
    let Some(rect) = rect.clamp_extent(grid.rows(), cols, stream) else {
        return;
    };
    for row in rect.top..=rect.bottom {
        let (l, r) = rect.span(row, stream, cols);
        for cell in &mut grid.row_mut(row)[l..=r] {
            cell.attrs.flags.toggle(mask);
        }
    }
}

/// Fold the carry of a 32-bit accumulator back into its low 16 bits
pub fn fold_checksum(sum: u32) -> u32 {
    (sum >> 16) + (sum & 0xFFFF)
}

/// DECRQCRA checksum of a rectangle
pub fn checksum_rect(grid: &Grid, rect: Rect) -> u16 {
    let Some(rect) = rect.clamp(grid.rows(), grid.cols()) else {
        return 0;
    };
    let mut sum: u32 = 0;
    for row in rect.top..=rect.bottom {
        for cell in &grid.row(row)[rect.left..=rect.right] {
            sum = fold_checksum(sum.wrapping_add(cell.checksum()));
        }
    }
    (sum & 0xFFFF) as u16
}
