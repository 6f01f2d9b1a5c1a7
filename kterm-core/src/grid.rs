//! Terminal grid - ring buffer of cell rows
//!
//! The grid stores `capacity` rows of `cols` cells in one flat vector.
//! Viewport row `r` lives at physical row `(head + r) % capacity`; rows
//! before `head` are scrollback. A full-screen scroll only advances `head`
//! and clears the recycled row. Regions narrower than the screen fall back
//! to row copies.
//!
//! The alternate screen is a grid whose capacity equals its row count.

use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellAttributes};
use crate::Dimensions;

/// The terminal grid (viewport plus scrollback)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    cells: Vec<Cell>,
    cols: usize,
    rows: usize,
    /// Total rows held (viewport + scrollback)
    capacity: usize,
    /// Physical row of viewport row 0
    head: usize,
    /// Scrollback rows holding history
    filled: usize,
    /// Rows the display is scrolled back into history
    view_offset: usize,
    /// Per viewport row dirty markers
    dirty: Vec<bool>,
}

impl Grid {
    /// Create a new grid with the specified dimensions and scrollback rows
    pub fn new(dims: Dimensions, scrollback: usize) -> Self {
        let cols = dims.cols.max(1);
        let rows = dims.rows.max(1);
        let capacity = rows + scrollback;
        Self {
            cells: vec![Cell::default(); capacity * cols],
            cols,
            rows,
            capacity,
            head: 0,
            filled: 0,
            view_offset: 0,
            dirty: vec![true; rows],
        }
    }

    /// Get grid dimensions
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            cols: self.cols,
            rows: self.rows,
        }
    }

    /// Get number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Get number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Total rows in the ring
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Physical index of viewport row 0
    pub fn head(&self) -> usize {
        self.head
    }

    /// Number of scrollback rows available
    pub fn scrollback_len(&self) -> usize {
        self.filled
    }

    fn phys(&self, row: usize) -> usize {
        (self.head + row) % self.capacity
    }

    fn offset(&self, row: usize) -> usize {
        self.phys(row) * self.cols
    }

    /// Get a viewport row
    pub fn row(&self, row: usize) -> &[Cell] {
        let start = self.offset(row);
        &self.cells[start..start + self.cols]
    }

    /// Get a mutable viewport row; marks it dirty
    pub fn row_mut(&mut self, row: usize) -> &mut [Cell] {
        self.dirty[row] = true;
        let start = self.offset(row);
        &mut self.cells[start..start + self.cols]
    }

    /// Get a cell in the viewport
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.row(row)[col]
    }

    /// Get a mutable cell in the viewport; marks the row dirty
    pub fn cell_mut(&mut self, row: usize, col: usize) -> &mut Cell {
        &mut self.row_mut(row)[col]
    }

    /// Scrollback row, 1 being the most recently scrolled off
    pub fn scrollback_row(&self, back: usize) -> Option<&[Cell]> {
        if back == 0 || back > self.filled {
            return None;
        }
        let start = ((self.head + self.capacity - back) % self.capacity) * self.cols;
        Some(&self.cells[start..start + self.cols])
    }

    /// Row shown at display position `row`, accounting for the view offset
    pub fn display_row(&self, row: usize) -> &[Cell] {
        let phys = (self.head + self.capacity + row - self.view_offset) % self.capacity;
        let start = phys * self.cols;
        &self.cells[start..start + self.cols]
    }

    /// Current scrollback view offset
    pub fn view_offset(&self) -> usize {
        self.view_offset
    }

    /// Scroll the display into history; clamped to the stored scrollback
    pub fn set_view_offset(&mut self, offset: usize) {
        let max = self.filled.min(self.capacity - self.rows);
        let clamped = offset.min(max);
        if clamped != self.view_offset {
            self.view_offset = clamped;
            self.mark_all_dirty();
        }
    }

    /// Fill part of a row with blank cells
    pub fn clear_row_range(&mut self, row: usize, start: usize, end: usize, attrs: CellAttributes) {
        let end = end.min(self.cols);
        if start >= end || row >= self.rows {
            return;
        }
        let blank = Cell::blank(attrs);
        self.row_mut(row)[start..end].fill(blank);
    }

    /// Fill part of a row with blanks, leaving protected cells alone
    pub fn selective_clear_row_range(&mut self, row: usize, start: usize, end: usize, attrs: CellAttributes) {
        let end = end.min(self.cols);
        if start >= end || row >= self.rows {
            return;
        }
        for cell in &mut self.row_mut(row)[start..end] {
            if !cell.is_protected() {
                cell.clear(attrs);
            }
        }
    }

    /// Clear the entire viewport
    pub fn clear(&mut self, attrs: CellAttributes) {
        for row in 0..self.rows {
            self.clear_row_range(row, 0, self.cols, attrs);
        }
    }

    /// Drop all scrollback history
    pub fn clear_scrollback(&mut self) {
        self.filled = 0;
        self.view_offset = 0;
    }

    /// Copy the column span `left..=right` of viewport row `src` onto `dst`
    fn copy_row_span(&mut self, src: usize, dst: usize, left: usize, right: usize) {
        let s = self.offset(src) + left;
        let d = self.offset(dst) + left;
        let len = right + 1 - left;
        self.cells.copy_within(s..s + len, d);
        self.dirty[dst] = true;
    }

    /// Scroll up within rows `top..=bottom` and columns `left..=right`.
    ///
    /// When the region covers the whole viewport the ring head advances and
    /// the departing rows become scrollback (if `keep_history`).
    #[allow(clippy::too_many_arguments)]
    pub fn scroll_up(
        &mut self,
        top: usize,
        bottom: usize,
        left: usize,
        right: usize,
        n: usize,
        attrs: CellAttributes,
        keep_history: bool,
    ) {
        if top >= self.rows || bottom >= self.rows || top > bottom || left > right || right >= self.cols {
            return;
        }
        let height = bottom - top + 1;
        let n = n.min(height);
        if n == 0 {
            return;
        }

        let full = top == 0 && bottom == self.rows - 1 && left == 0 && right == self.cols - 1;
        // Rotating without keeping history would expose stale rows as scrollback
        if full && (keep_history || self.filled == 0) {
            for _ in 0..n {
                self.head = (self.head + 1) % self.capacity;
                if keep_history {
                    self.filled = (self.filled + 1).min(self.capacity - self.rows);
                }
                let last = self.rows - 1;
                self.clear_row_range(last, 0, self.cols, attrs);
            }
            self.view_offset = self.view_offset.min(self.filled);
            self.mark_all_dirty();
            return;
        }

        for dst in top..bottom + 1 - n {
            self.copy_row_span(dst + n, dst, left, right);
        }
        for row in bottom + 1 - n..=bottom {
            self.clear_row_range(row, left, right + 1, attrs);
        }
    }

    /// Scroll down within rows `top..=bottom` and columns `left..=right`
    pub fn scroll_down(
        &mut self,
        top: usize,
        bottom: usize,
        left: usize,
        right: usize,
        n: usize,
        attrs: CellAttributes,
    ) {
        if top >= self.rows || bottom >= self.rows || top > bottom || left > right || right >= self.cols {
            return;
        }
        let height = bottom - top + 1;
        let n = n.min(height);
        if n == 0 {
            return;
        }
        for dst in (top + n..=bottom).rev() {
            self.copy_row_span(dst - n, dst, left, right);
        }
        for row in top..top + n {
            self.clear_row_range(row, left, right + 1, attrs);
        }
    }

    /// Insert n blank cells at (row, col), shifting right up to `right`
    pub fn insert_cells(&mut self, row: usize, col: usize, right: usize, n: usize, attrs: CellAttributes) {
        if row >= self.rows || col > right || right >= self.cols {
            return;
        }
        let n = n.min(right + 1 - col);
        let line = self.row_mut(row);
        line[col..=right].rotate_right(n);
        line[col..col + n].fill(Cell::blank(attrs));
    }

    /// Delete n cells at (row, col), shifting left; blanks enter at `right`
    pub fn delete_cells(&mut self, row: usize, col: usize, right: usize, n: usize, attrs: CellAttributes) {
        if row >= self.rows || col > right || right >= self.cols {
            return;
        }
        let n = n.min(right + 1 - col);
        let line = self.row_mut(row);
        line[col..=right].rotate_left(n);
        line[right + 1 - n..=right].fill(Cell::blank(attrs));
    }

    /// Resize the grid.
    ///
    /// `push_top` viewport rows are moved into scrollback before the new
    /// height is applied, so the cursor row can stay on screen when shrinking.
    pub fn resize(&mut self, dims: Dimensions, scrollback: usize, push_top: usize, attrs: CellAttributes) {
        let cols = dims.cols.max(1);
        let rows = dims.rows.max(1);

        // Collect logical rows oldest first
        let mut logical: Vec<Vec<Cell>> = Vec::with_capacity(self.filled + self.rows);
        for back in (1..=self.filled).rev() {
            if let Some(r) = self.scrollback_row(back) {
                logical.push(r.to_vec());
            }
        }
        let history = logical.len();
        for row in 0..self.rows {
            logical.push(self.row(row).to_vec());
        }

        let push_top = push_top.min(self.rows);
        let viewport_start = history + push_top;
        let capacity = rows + scrollback;
        let mut grid = Grid::new(Dimensions { cols, rows }, scrollback);

        let kept_history = viewport_start.min(scrollback);
        let history_start = viewport_start - kept_history;
        // Lay out history ending just before physical row 0
        for (i, line) in logical[history_start..viewport_start].iter().enumerate() {
            let phys = (capacity - kept_history + i) % capacity;
            Self::copy_into(&mut grid.cells[phys * cols..(phys + 1) * cols], line, attrs);
        }
        grid.filled = kept_history;
        for row in 0..rows {
            let dst = &mut grid.cells[row * cols..(row + 1) * cols];
            match logical.get(viewport_start + row) {
                Some(line) => Self::copy_into(dst, line, attrs),
                None => dst.fill(Cell::blank(attrs)),
            }
        }
        *self = grid;
    }

    fn copy_into(dst: &mut [Cell], src: &[Cell], attrs: CellAttributes) {
        let n = dst.len().min(src.len());
        dst[..n].copy_from_slice(&src[..n]);
        dst[n..].fill(Cell::blank(attrs));
    }

    /// Is viewport row dirty
    pub fn is_dirty(&self, row: usize) -> bool {
        self.dirty.get(row).copied().unwrap_or(false)
    }

    /// Dirty bitmap of the viewport
    pub fn dirty_rows(&self) -> &[bool] {
        &self.dirty
    }

    /// Mark a row dirty
    pub fn mark_dirty(&mut self, row: usize) {
        if let Some(d) = self.dirty.get_mut(row) {
            *d = true;
        }
    }

    /// Mark every row dirty
    pub fn mark_all_dirty(&mut self) {
        self.dirty.fill(true);
    }

    /// Clear dirty markers, returning the previous bitmap
    pub fn take_dirty(&mut self) -> Vec<bool> {
        std::mem::replace(&mut self.dirty, vec![false; self.rows])
    }

    /// Iterate over viewport rows
    pub fn iter(&self) -> impl Iterator<Item = &[Cell]> {
        (0..self.rows).map(move |r| self.row(r))
    }

    /// Viewport row as a string with trailing blanks trimmed
    pub fn row_text(&self, row: usize) -> String {
        let s: String = self
            .row(row)
            .iter()
            .filter(|c| !c.is_continuation())
            .map(|c| c.display_char())
            .collect();
        s.trim_end().to_string()
    }
}
