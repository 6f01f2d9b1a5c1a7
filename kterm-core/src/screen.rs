//! Terminal screen - the main interface for terminal state
//!
//! The Screen struct ties together the primary and alternate grids, the
//! cursor, margins, tab stops, modes, charsets and palette, and provides the
//! editing primitives the escape sequence executors are built from.

use crate::cell::{char_width, CellAttributes, CellFlags};
use crate::charset::CharsetState;
use crate::color::Palette;
use crate::cursor::{Cursor, SavedCursor};
use crate::grid::Grid;
use crate::modes::{AnsiModes, DecModes, Modes};
use crate::rect;
use crate::tabs::TabStops;
use crate::Dimensions;

/// Maximum depth of the XTWINOPS title stack
const TITLE_STACK_DEPTH: usize = 10;

/// The complete terminal screen state
#[derive(Debug, Clone)]
pub struct Screen {
    /// Primary screen grid (with scrollback)
    primary_grid: Grid,
    /// Alternate screen grid (no scrollback)
    alternate_grid: Grid,
    /// Whether we're using the alternate screen
    using_alternate: bool,
    /// Scrollback rows kept by the primary grid
    scrollback_limit: usize,
    /// Cursor state
    cursor: Cursor,
    /// Saved cursor for primary screen (DECSC/DECRC)
    saved_cursor_primary: Option<SavedCursor>,
    /// Saved cursor for alternate screen
    saved_cursor_alternate: Option<SavedCursor>,
    /// Terminal modes
    modes: Modes,
    /// Scroll region, 0-indexed inclusive
    scroll_top: usize,
    scroll_bottom: usize,
    /// Left/right margins, 0-indexed inclusive; effective only with DECLRMM
    left_margin: usize,
    right_margin: usize,
    /// Tab stops
    tabs: TabStops,
    /// Character set state
    charset: CharsetState,
    /// Session palette
    palette: Palette,
    /// Window title
    title: String,
    /// Icon title
    icon_title: String,
    /// Saved titles (XTWINOPS 22/23)
    title_stack: Vec<(String, String)>,
    /// Last printed graphic character, for REP
    last_printed: Option<char>,
}

impl Screen {
    /// Create a new screen with the specified dimensions
    pub fn new(dims: Dimensions, scrollback: usize) -> Self {
        let dims = Dimensions::new(dims.cols.max(1), dims.rows.max(1));
        Self {
            primary_grid: Grid::new(dims, scrollback),
            alternate_grid: Grid::new(dims, 0),
            using_alternate: false,
            scrollback_limit: scrollback,
            cursor: Cursor::new(),
            saved_cursor_primary: None,
            saved_cursor_alternate: None,
            modes: Modes::new(),
            scroll_top: 0,
            scroll_bottom: dims.rows - 1,
            left_margin: 0,
            right_margin: dims.cols - 1,
            tabs: TabStops::new(dims.cols),
            charset: CharsetState::new(),
            palette: Palette::new(),
            title: String::new(),
            icon_title: String::new(),
            title_stack: Vec::new(),
            last_printed: None,
        }
    }

    /// Get the current grid (primary or alternate)
    pub fn grid(&self) -> &Grid {
        if self.using_alternate {
            &self.alternate_grid
        } else {
            &self.primary_grid
        }
    }

    /// Get the current grid mutably
    pub fn grid_mut(&mut self) -> &mut Grid {
        if self.using_alternate {
            &mut self.alternate_grid
        } else {
            &mut self.primary_grid
        }
    }

    /// The primary grid regardless of which buffer is active
    pub fn primary_grid(&self) -> &Grid {
        &self.primary_grid
    }

    /// Whether the alternate screen is active
    pub fn is_alternate(&self) -> bool {
        self.using_alternate
    }

    /// Get screen dimensions
    pub fn dimensions(&self) -> Dimensions {
        self.grid().dimensions()
    }

    /// Get number of columns
    pub fn cols(&self) -> usize {
        self.grid().cols()
    }

    /// Get number of rows
    pub fn rows(&self) -> usize {
        self.grid().rows()
    }

    /// Get cursor reference
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Get cursor mutably
    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    /// Get modes reference
    pub fn modes(&self) -> &Modes {
        &self.modes
    }

    /// Get modes mutably
    pub fn modes_mut(&mut self) -> &mut Modes {
        &mut self.modes
    }

    /// Get charset state reference
    pub fn charset(&self) -> &CharsetState {
        &self.charset
    }

    /// Get charset state mutably
    pub fn charset_mut(&mut self) -> &mut CharsetState {
        &mut self.charset
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    pub fn tabs(&self) -> &TabStops {
        &self.tabs
    }

    pub fn tabs_mut(&mut self) -> &mut TabStops {
        &mut self.tabs
    }

    /// Get the window title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Set the window title
    pub fn set_title(&mut self, title: &str) {
        self.title = title.to_string();
    }

    pub fn icon_title(&self) -> &str {
        &self.icon_title
    }

    pub fn set_icon_title(&mut self, title: &str) {
        self.icon_title = title.to_string();
    }

    /// Push titles (XTWINOPS 22)
    pub fn push_title(&mut self) {
        if self.title_stack.len() >= TITLE_STACK_DEPTH {
            self.title_stack.remove(0);
        }
        self.title_stack.push((self.title.clone(), self.icon_title.clone()));
    }

    /// Pop titles (XTWINOPS 23)
    pub fn pop_title(&mut self) -> bool {
        match self.title_stack.pop() {
            Some((title, icon)) => {
                self.title = title;
                self.icon_title = icon;
                true
            }
            None => false,
        }
    }

    /// Last graphic character printed (REP source)
    pub fn last_printed(&self) -> Option<char> {
        self.last_printed
    }

    /// Get scroll region bounds (top, bottom), 0-indexed inclusive
    pub fn scroll_region(&self) -> (usize, usize) {
        (self.scroll_top, self.scroll_bottom)
    }

    /// Effective left/right margins
    pub fn horizontal_margins(&self) -> (usize, usize) {
        if self.modes.dec(DecModes::LEFT_RIGHT_MARGIN) {
            (self.left_margin, self.right_margin)
        } else {
            (0, self.cols() - 1)
        }
    }

    /// Stored left/right margins regardless of DECLRMM
    pub fn stored_margins(&self) -> (usize, usize) {
        (self.left_margin, self.right_margin)
    }

    /// Set scroll region (DECSTBM, 1-indexed, 0 selects the default).
    ///
    /// Invalid regions leave the current one unchanged and return false.
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) -> bool {
        let rows = self.rows();
        let top = if top == 0 { 1 } else { top };
        let bottom = if bottom == 0 { rows } else { bottom };
        if top >= bottom || bottom > rows {
            log::debug!("DECSTBM: rejecting region {}..{} for {} rows", top, bottom, rows);
            return false;
        }
        self.scroll_top = top - 1;
        self.scroll_bottom = bottom - 1;
        self.home_cursor();
        true
    }

    /// Set left/right margins (DECSLRM, 1-indexed, 0 selects the default)
    pub fn set_left_right_margins(&mut self, left: usize, right: usize) -> bool {
        let cols = self.cols();
        let left = if left == 0 { 1 } else { left };
        let right = if right == 0 { cols } else { right };
        if left >= right || right > cols {
            log::debug!("DECSLRM: rejecting margins {}..{} for {} cols", left, right, cols);
            return false;
        }
        self.left_margin = left - 1;
        self.right_margin = right - 1;
        self.home_cursor();
        true
    }

    /// Reset scroll region and margins to the full screen
    pub fn reset_margins(&mut self) {
        self.scroll_top = 0;
        self.scroll_bottom = self.rows() - 1;
        self.left_margin = 0;
        self.right_margin = self.cols() - 1;
    }

    fn origin(&self) -> bool {
        self.modes.dec(DecModes::ORIGIN)
    }

    fn autowrap(&self) -> bool {
        self.modes.dec(DecModes::AUTOWRAP)
    }

    /// Attributes for erased cells: current colors, no rendition
    fn erase_attrs(&self) -> CellAttributes {
        self.cursor.attrs.erase_attrs()
    }

    /// Right edge for printing: the right margin when the cursor is inside it
    fn print_right_edge(&self) -> usize {
        let (left, right) = self.horizontal_margins();
        if self.cursor.col >= left && self.cursor.col <= right {
            right
        } else {
            self.cols() - 1
        }
    }

    /// Print a character at the current cursor position
    pub fn print(&mut self, c: char) {
        let c = self.charset.translate(c);
        self.put_glyph(c);
    }

    /// Place an already translated character at the cursor
    fn put_glyph(&mut self, c: char) {
        let width = char_width(c) as usize;

        if width == 0 {
            // Combining mark: flag the previous cell, no advance
            let row = self.cursor.row;
            let col = if self.cursor.pending_wrap {
                self.cursor.col
            } else {
                self.cursor.col.saturating_sub(1)
            };
            self.grid_mut()
                .cell_mut(row, col)
                .attrs
                .set(CellFlags::COMBINING, true);
            return;
        }

        if self.cursor.pending_wrap && self.autowrap() {
            self.wrap_line();
        }

        let mut right = self.print_right_edge();
        if width == 2 && self.cursor.col + 1 > right {
            if self.autowrap() {
                self.wrap_line();
                right = self.print_right_edge();
            } else {
                self.cursor.col = right.saturating_sub(1);
            }
        }

        let row = self.cursor.row;
        let col = self.cursor.col;
        let erase = self.erase_attrs();

        if self.modes.ansi(AnsiModes::INSERT) {
            self.grid_mut().insert_cells(row, col, right, width, erase);
        }

        self.clear_wide_pair(row, col, erase);
        if width == 2 && col + 1 < self.cols() {
            self.clear_wide_pair(row, col + 1, erase);
        }

        let mut attrs = self.cursor.attrs;
        attrs.flags &= !(CellFlags::WIDE | CellFlags::WIDE_SPACER | CellFlags::COMBINING | CellFlags::DIRTY);
        {
            let cell = self.grid_mut().cell_mut(row, col);
            let line_size = cell.attrs.flags & CellFlags::LINE_SIZE_MASK;
            cell.set_char(c);
            cell.attrs = attrs;
            cell.attrs.flags |= line_size;
            if width == 2 {
                cell.attrs.set(CellFlags::WIDE, true);
            }
        }
        if width == 2 && col + 1 < self.cols() {
            let spacer = self.grid_mut().cell_mut(row, col + 1);
            let line_size = spacer.attrs.flags & CellFlags::LINE_SIZE_MASK;
            spacer.set_char(' ');
            spacer.attrs = attrs;
            spacer.attrs.flags |= line_size | CellFlags::WIDE_SPACER;
        }

        let new_col = col + width;
        if new_col > right {
            self.cursor.col = right;
            self.cursor.pending_wrap = self.autowrap();
        } else {
            self.cursor.col = new_col;
            self.cursor.pending_wrap = false;
        }
        self.last_printed = Some(c);
    }

    /// Blank the other half of a wide character overlapping (row, col)
    fn clear_wide_pair(&mut self, row: usize, col: usize, attrs: CellAttributes) {
        let cols = self.cols();
        let flags = self.grid().cell(row, col).attrs.flags;
        if flags.contains(CellFlags::WIDE_SPACER) && col > 0 {
            self.grid_mut().cell_mut(row, col - 1).clear(attrs);
        } else if flags.contains(CellFlags::WIDE) && col + 1 < cols {
            self.grid_mut().cell_mut(row, col + 1).clear(attrs);
        }
    }

    /// Autowrap: return to the left margin and move down a line
    fn wrap_line(&mut self) {
        let (left, _) = self.horizontal_margins();
        self.cursor.pending_wrap = false;
        self.cursor.col = left;
        self.index();
    }

    /// Repeat the last printed character (REP)
    pub fn repeat_last(&mut self, n: usize) {
        if let Some(c) = self.last_printed {
            for _ in 0..n {
                self.put_glyph(c);
            }
        }
    }

    /// Handle backspace (BS)
    pub fn backspace(&mut self) {
        let (left, _) = self.horizontal_margins();
        if self.cursor.col > left || (self.cursor.col > 0 && self.cursor.col < left) {
            self.cursor.col -= 1;
        }
        self.cursor.pending_wrap = false;
    }

    /// Handle horizontal tab (HT / CHT)
    pub fn tab(&mut self, n: usize) {
        let right = self.print_right_edge();
        let mut col = self.cursor.col;
        for _ in 0..n.max(1) {
            col = self.tabs.next(col, right);
        }
        self.cursor.col = col.min(right);
        self.cursor.pending_wrap = false;
    }

    /// Backward tab (CBT)
    pub fn back_tab(&mut self, n: usize) {
        let (left, _) = self.horizontal_margins();
        let floor = if self.cursor.col >= left { left } else { 0 };
        let mut col = self.cursor.col;
        for _ in 0..n.max(1) {
            col = self.tabs.prev(col, floor);
        }
        self.cursor.col = col;
        self.cursor.pending_wrap = false;
    }

    /// Handle carriage return (CR)
    pub fn carriage_return(&mut self) {
        let (left, _) = self.horizontal_margins();
        let target = if self.cursor.col >= left { left } else { 0 };
        self.cursor.carriage_return(target);
    }

    /// Handle line feed (LF), vertical tab (VT), form feed (FF)
    pub fn linefeed(&mut self) {
        self.index();
        // In linefeed mode, LF also does CR
        if self.modes.ansi(AnsiModes::LINEFEED_NEWLINE) {
            self.carriage_return();
        }
    }

    /// Handle index (IND) - move cursor down, scroll if at bottom
    pub fn index(&mut self) {
        if self.cursor.row == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.rows() {
            self.cursor.row += 1;
        }
        self.cursor.pending_wrap = false;
    }

    /// Handle reverse index (RI) - move cursor up, scroll if at top
    pub fn reverse_index(&mut self) {
        if self.cursor.row == self.scroll_top {
            self.scroll_down(1);
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
        }
        self.cursor.pending_wrap = false;
    }

    /// Handle next line (NEL) - move to start of next line
    pub fn next_line(&mut self) {
        self.index();
        self.carriage_return();
    }

    /// Back index (DECBI): move left, or shift the margin area right
    pub fn back_index(&mut self) {
        let (left, right) = self.horizontal_margins();
        if self.cursor.col == left {
            let (top, bottom) = self.scroll_region();
            let erase = self.erase_attrs();
            for row in top..=bottom {
                self.grid_mut().insert_cells(row, left, right, 1, erase);
            }
        } else if self.cursor.col > 0 {
            self.cursor.col -= 1;
        }
        self.cursor.pending_wrap = false;
    }

    /// Forward index (DECFI): move right, or shift the margin area left
    pub fn forward_index(&mut self) {
        let (left, right) = self.horizontal_margins();
        if self.cursor.col == right {
            let (top, bottom) = self.scroll_region();
            let erase = self.erase_attrs();
            for row in top..=bottom {
                self.grid_mut().delete_cells(row, left, right, 1, erase);
            }
        } else if self.cursor.col + 1 < self.cols() {
            self.cursor.col += 1;
        }
        self.cursor.pending_wrap = false;
    }

    /// Scroll up by n lines within scroll region
    pub fn scroll_up(&mut self, n: usize) {
        let (top, bottom) = self.scroll_region();
        let (left, right) = self.horizontal_margins();
        let erase = self.erase_attrs();
        let keep_history = !self.using_alternate;
        self.grid_mut()
            .scroll_up(top, bottom, left, right, n, erase, keep_history);
    }

    /// Scroll down by n lines within scroll region
    pub fn scroll_down(&mut self, n: usize) {
        let (top, bottom) = self.scroll_region();
        let (left, right) = self.horizontal_margins();
        let erase = self.erase_attrs();
        self.grid_mut().scroll_down(top, bottom, left, right, n, erase);
    }

    fn home_cursor(&mut self) {
        let (row, col) = if self.origin() {
            (self.scroll_top, self.horizontal_margins().0)
        } else {
            (0, 0)
        };
        self.cursor.set_position(col, row);
    }

    /// Move cursor to position (1-indexed as per VT spec)
    pub fn move_cursor_to(&mut self, row: usize, col: usize) {
        let row = row.saturating_sub(1);
        let col = col.saturating_sub(1);
        let (new_row, new_col) = if self.origin() {
            let (left, right) = self.horizontal_margins();
            (
                (self.scroll_top + row).min(self.scroll_bottom),
                (left + col).min(right),
            )
        } else {
            (row.min(self.rows() - 1), col.min(self.cols() - 1))
        };
        self.cursor.set_position(new_col, new_row);
    }

    /// Cursor position as reported by CPR (1-indexed, origin relative)
    pub fn cursor_report_position(&self) -> (usize, usize) {
        if self.origin() {
            let (left, _) = self.horizontal_margins();
            (
                self.cursor.row.saturating_sub(self.scroll_top) + 1,
                self.cursor.col.saturating_sub(left) + 1,
            )
        } else {
            (self.cursor.row + 1, self.cursor.col + 1)
        }
    }

    /// Move cursor up by n rows
    pub fn move_cursor_up(&mut self, n: usize) {
        let min_row = if self.cursor.row >= self.scroll_top {
            self.scroll_top
        } else {
            0
        };
        let row = self.cursor.row.saturating_sub(n).max(min_row);
        self.cursor.set_position(self.cursor.col, row);
    }

    /// Move cursor down by n rows
    pub fn move_cursor_down(&mut self, n: usize) {
        let max_row = if self.cursor.row <= self.scroll_bottom {
            self.scroll_bottom
        } else {
            self.rows() - 1
        };
        let row = (self.cursor.row + n).min(max_row);
        self.cursor.set_position(self.cursor.col, row);
    }

    /// Move cursor left by n columns
    pub fn move_cursor_left(&mut self, n: usize) {
        let (left, _) = self.horizontal_margins();
        let floor = if self.cursor.col >= left { left } else { 0 };
        let col = self.cursor.col.saturating_sub(n).max(floor);
        self.cursor.set_position(col, self.cursor.row);
    }

    /// Move cursor right by n columns
    pub fn move_cursor_right(&mut self, n: usize) {
        let right = self.print_right_edge();
        let col = (self.cursor.col + n).min(right);
        self.cursor.set_position(col, self.cursor.row);
    }

    /// Set cursor column (1-indexed)
    pub fn set_cursor_col(&mut self, col: usize) {
        let col = col.saturating_sub(1);
        let new_col = if self.origin() {
            let (left, right) = self.horizontal_margins();
            (left + col).min(right)
        } else {
            col.min(self.cols() - 1)
        };
        self.cursor.set_position(new_col, self.cursor.row);
    }

    /// Set cursor row (1-indexed)
    pub fn set_cursor_row(&mut self, row: usize) {
        let row = row.saturating_sub(1);
        let new_row = if self.origin() {
            (self.scroll_top + row).min(self.scroll_bottom)
        } else {
            row.min(self.rows() - 1)
        };
        self.cursor.set_position(self.cursor.col, new_row);
    }

    /// Save cursor state (DECSC)
    pub fn save_cursor(&mut self) {
        let saved = SavedCursor::save(&self.cursor, self.origin(), self.autowrap(), &self.charset);
        if self.using_alternate {
            self.saved_cursor_alternate = Some(saved);
        } else {
            self.saved_cursor_primary = Some(saved);
        }
    }

    /// Restore cursor state (DECRC); without a save, home and reset attributes
    pub fn restore_cursor(&mut self) {
        let saved = if self.using_alternate {
            self.saved_cursor_alternate.clone()
        } else {
            self.saved_cursor_primary.clone()
        };
        match saved {
            Some(saved) => {
                self.cursor.col = saved.col.min(self.cols() - 1);
                self.cursor.row = saved.row.min(self.rows() - 1);
                self.cursor.attrs = saved.attrs;
                self.cursor.pending_wrap = saved.pending_wrap;
                self.modes.dec.set(DecModes::ORIGIN, saved.origin_mode);
                self.modes.dec.set(DecModes::AUTOWRAP, saved.autowrap);
                let utf8 = self.charset.utf8;
                self.charset = saved.charset;
                self.charset.utf8 = utf8;
            }
            None => {
                self.cursor.set_position(0, 0);
                self.cursor.attrs.reset();
                self.modes.dec.remove(DecModes::ORIGIN);
                self.charset.reset();
            }
        }
    }

    /// Erase display (ED / DECSED)
    pub fn erase_display(&mut self, mode: u16, selective: bool) {
        let erase = self.erase_attrs();
        let row = self.cursor.row;
        let col = self.cursor.col;
        let rows = self.rows();
        let cols = self.cols();

        match mode {
            0 => {
                self.erase_span(row, col, cols, erase, selective);
                for r in row + 1..rows {
                    self.erase_span(r, 0, cols, erase, selective);
                }
            }
            1 => {
                for r in 0..row {
                    self.erase_span(r, 0, cols, erase, selective);
                }
                self.erase_span(row, 0, col + 1, erase, selective);
            }
            2 => {
                for r in 0..rows {
                    self.erase_span(r, 0, cols, erase, selective);
                }
            }
            3 => {
                self.primary_grid.clear_scrollback();
            }
            _ => log::debug!("Unknown ED mode: {}", mode),
        }
    }

    /// Erase line (EL / DECSEL)
    pub fn erase_line(&mut self, mode: u16, selective: bool) {
        let erase = self.erase_attrs();
        let row = self.cursor.row;
        let col = self.cursor.col;
        let cols = self.cols();

        match mode {
            0 => self.erase_span(row, col, cols, erase, selective),
            1 => self.erase_span(row, 0, col + 1, erase, selective),
            2 => self.erase_span(row, 0, cols, erase, selective),
            _ => log::debug!("Unknown EL mode: {}", mode),
        }
    }

    fn erase_span(&mut self, row: usize, start: usize, end: usize, attrs: CellAttributes, selective: bool) {
        if selective {
            self.grid_mut().selective_clear_row_range(row, start, end, attrs);
        } else {
            self.grid_mut().clear_row_range(row, start, end, attrs);
        }
    }

    /// Erase characters (ECH)
    pub fn erase_chars(&mut self, n: usize) {
        let erase = self.erase_attrs();
        let row = self.cursor.row;
        let col = self.cursor.col;
        self.grid_mut().clear_row_range(row, col, col + n.max(1), erase);
        self.cursor.pending_wrap = false;
    }

    fn cursor_in_margins(&self) -> bool {
        let (left, right) = self.horizontal_margins();
        let (top, bottom) = self.scroll_region();
        self.cursor.row >= top && self.cursor.row <= bottom && self.cursor.col >= left && self.cursor.col <= right
    }

    /// Insert lines (IL)
    pub fn insert_lines(&mut self, n: usize) {
        if !self.cursor_in_margins() {
            return;
        }
        let (_, bottom) = self.scroll_region();
        let (left, right) = self.horizontal_margins();
        let row = self.cursor.row;
        let erase = self.erase_attrs();
        self.grid_mut().scroll_down(row, bottom, left, right, n, erase);
        self.cursor.carriage_return(left);
    }

    /// Delete lines (DL)
    pub fn delete_lines(&mut self, n: usize) {
        if !self.cursor_in_margins() {
            return;
        }
        let (_, bottom) = self.scroll_region();
        let (left, right) = self.horizontal_margins();
        let row = self.cursor.row;
        let erase = self.erase_attrs();
        self.grid_mut()
            .scroll_up(row, bottom, left, right, n, erase, false);
        self.cursor.carriage_return(left);
    }

    /// Insert characters (ICH)
    pub fn insert_chars(&mut self, n: usize) {
        let right = self.print_right_edge();
        let row = self.cursor.row;
        let col = self.cursor.col;
        let erase = self.erase_attrs();
        self.grid_mut().insert_cells(row, col, right, n.max(1), erase);
        self.cursor.pending_wrap = false;
    }

    /// Delete characters (DCH)
    pub fn delete_chars(&mut self, n: usize) {
        let right = self.print_right_edge();
        let row = self.cursor.row;
        let col = self.cursor.col;
        let erase = self.erase_attrs();
        self.grid_mut().delete_cells(row, col, right, n.max(1), erase);
        self.cursor.pending_wrap = false;
    }

    /// Insert columns (DECIC)
    pub fn insert_columns(&mut self, n: usize) {
        if !self.cursor_in_margins() {
            return;
        }
        let (top, bottom) = self.scroll_region();
        let (_, right) = self.horizontal_margins();
        let col = self.cursor.col;
        let erase = self.erase_attrs();
        for row in top..=bottom {
            self.grid_mut().insert_cells(row, col, right, n.max(1), erase);
        }
    }

    /// Delete columns (DECDC)
    pub fn delete_columns(&mut self, n: usize) {
        if !self.cursor_in_margins() {
            return;
        }
        let (top, bottom) = self.scroll_region();
        let (_, right) = self.horizontal_margins();
        let col = self.cursor.col;
        let erase = self.erase_attrs();
        for row in top..=bottom {
            self.grid_mut().delete_cells(row, col, right, n.max(1), erase);
        }
    }

    /// Set tab stop at current column (HTS)
    pub fn set_tab_stop(&mut self) {
        let col = self.cursor.col;
        self.tabs.set(col);
    }

    /// Clear tab stops (TBC)
    pub fn clear_tab_stop(&mut self, mode: u16) {
        match mode {
            0 => {
                let col = self.cursor.col;
                self.tabs.clear(col);
            }
            3 | 5 => self.tabs.clear_all(),
            _ => log::debug!("Unknown TBC mode: {}", mode),
        }
    }

    /// Switch to the alternate screen, optionally clearing it
    pub fn enter_alternate_screen(&mut self, clear: bool) {
        if !self.using_alternate {
            self.using_alternate = true;
            self.modes.dec.insert(DecModes::ALT_SCREEN);
        }
        if clear {
            let erase = self.erase_attrs();
            self.alternate_grid.clear(erase);
        }
        self.alternate_grid.mark_all_dirty();
    }

    /// Switch back to the primary screen, optionally clearing the alternate first
    pub fn exit_alternate_screen(&mut self, clear: bool) {
        if self.using_alternate {
            if clear {
                let erase = self.erase_attrs();
                self.alternate_grid.clear(erase);
            }
            self.using_alternate = false;
            self.modes.dec.remove(DecModes::ALT_SCREEN);
            self.primary_grid.mark_all_dirty();
        }
    }

    /// Apply a line size (DECDHL top/bottom, DECSWL, DECDWL) to the cursor row
    pub fn set_line_size(&mut self, size: CellFlags) {
        let row = self.cursor.row;
        let size = size & CellFlags::LINE_SIZE_MASK;
        for cell in self.grid_mut().row_mut(row) {
            cell.attrs.flags &= !CellFlags::LINE_SIZE_MASK;
            cell.attrs.flags |= size;
        }
    }

    /// Screen alignment pattern (DECALN)
    pub fn alignment_test(&mut self) {
        self.reset_margins();
        let rows = self.rows();
        let attrs = CellAttributes::default();
        let grid = self.grid_mut();
        for row in 0..rows {
            for cell in grid.row_mut(row) {
                cell.set_char('E');
                cell.attrs = attrs;
            }
        }
        self.cursor.set_position(0, 0);
    }

    /// Switch between 80 and 132 columns (DECCOLM)
    pub fn set_columns(&mut self, cols: usize) {
        let rows = self.rows();
        self.resize(Dimensions::new(cols, rows));
        if !self.modes.dec(DecModes::NO_CLEAR_ON_COLUMN) {
            let erase = self.erase_attrs();
            self.grid_mut().clear(erase);
        }
        self.reset_margins();
        self.cursor.set_position(0, 0);
        self.modes.dec.set(DecModes::COLUMN_132, cols >= 132);
    }

    /// Resize the screen
    pub fn resize(&mut self, dims: Dimensions) {
        let dims = Dimensions::new(dims.cols.max(1), dims.rows.max(1));
        let erase = self.erase_attrs();

        // keep the cursor row on screen when shrinking
        let push_top = (self.cursor.row + 1).saturating_sub(dims.rows);
        let (primary_push, alternate_push) = if self.using_alternate {
            (0, push_top)
        } else {
            (push_top, 0)
        };
        self.primary_grid
            .resize(dims, self.scrollback_limit, primary_push, erase);
        self.alternate_grid.resize(dims, 0, alternate_push, erase);
        self.tabs.resize(dims.cols);

        self.cursor.row = self.cursor.row.saturating_sub(push_top).min(dims.rows - 1);
        self.cursor.col = self.cursor.col.min(dims.cols - 1);
        self.cursor.pending_wrap = false;
        self.reset_margins();
    }

    /// Reset terminal to initial state (RIS)
    pub fn reset(&mut self) {
        let dims = self.dimensions();
        let utf8 = self.charset.utf8;
        *self = Self::new(dims, self.scrollback_limit);
        self.charset.utf8 = utf8;
    }

    /// Soft terminal reset (DECSTR)
    pub fn soft_reset(&mut self) {
        self.cursor.visible = true;
        self.cursor.attrs.reset();
        self.cursor.pending_wrap = false;
        self.modes.dec.insert(DecModes::CURSOR_VISIBLE | DecModes::AUTOWRAP);
        self.modes
            .dec
            .remove(DecModes::ORIGIN | DecModes::CURSOR_KEYS_APPLICATION | DecModes::APPLICATION_KEYPAD);
        self.modes.ansi.remove(AnsiModes::INSERT | AnsiModes::KEYBOARD_LOCK);
        self.reset_margins();
        self.charset.reset();
        self.saved_cursor_primary = None;
        self.saved_cursor_alternate = None;
    }

    /// Checksum of the whole viewport (DSR 63)
    pub fn checksum(&self) -> u16 {
        let rect = rect::Rect::new(0, 0, self.rows() - 1, self.cols() - 1);
        rect::checksum_rect(self.grid(), rect)
    }

    /// Text of a viewport row with trailing blanks trimmed
    pub fn row_text(&self, row: usize) -> String {
        self.grid().row_text(row)
    }

    /// Viewport text, one line per row
    pub fn text(&self) -> String {
        (0..self.rows())
            .map(|r| self.row_text(r))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charset::{Charset, GSlot};
    use crate::color::Color;

    fn screen(cols: usize, rows: usize) -> Screen {
        Screen::new(Dimensions::new(cols, rows), 100)
    }

    fn ch(screen: &Screen, row: usize, col: usize) -> char {
        screen.grid().cell(row, col).display_char()
    }

    #[test]
    fn test_screen_new() {
        let screen = screen(80, 24);
        assert_eq!(screen.cols(), 80);
        assert_eq!(screen.rows(), 24);
        assert_eq!(screen.cursor().col, 0);
        assert_eq!(screen.cursor().row, 0);
        assert_eq!(screen.scroll_region(), (0, 23));
    }

    #[test]
    fn test_screen_print() {
        let mut screen = screen(80, 24);
        screen.print('H');
        screen.print('i');

        assert_eq!(screen.cursor().col, 2);
        assert_eq!(ch(&screen, 0, 0), 'H');
        assert_eq!(ch(&screen, 0, 1), 'i');
    }

    #[test]
    fn test_screen_wrap() {
        let mut screen = screen(5, 3);
        for c in "Hello World".chars() {
            screen.print(c);
        }

        assert_eq!(screen.row_text(0), "Hello");
        assert_eq!(screen.row_text(1), " Worl");
        assert_eq!(screen.row_text(2), "d");
    }

    #[test]
    fn test_no_autowrap_overwrites_last_column() {
        let mut screen = screen(3, 2);
        screen.modes_mut().set_dec_mode(7, false);
        for c in "abcd".chars() {
            screen.print(c);
        }
        assert_eq!(screen.row_text(0), "abd");
        assert_eq!(screen.row_text(1), "");
    }

    #[test]
    fn test_wide_char_occupies_two_cells() {
        let mut screen = screen(10, 2);
        screen.print('中');
        assert_eq!(screen.cursor().col, 2);
        assert!(screen.grid().cell(0, 0).attrs.has(CellFlags::WIDE));
        assert!(screen.grid().cell(0, 1).is_continuation());

        // overwriting the spacer blanks the lead cell
        screen.move_cursor_to(1, 2);
        screen.print('x');
        assert_eq!(ch(&screen, 0, 0), ' ');
        assert!(!screen.grid().cell(0, 0).attrs.has(CellFlags::WIDE));
    }

    #[test]
    fn test_screen_linefeed_scrolls_into_history() {
        let mut screen = screen(80, 3);
        for c in ['A', 'B', 'C', 'D'] {
            screen.print(c);
            screen.linefeed();
            screen.carriage_return();
        }
        assert_eq!(ch(&screen, 0, 0), 'C');
        assert_eq!(ch(&screen, 1, 0), 'D');
        assert_eq!(screen.primary_grid().scrollback_len(), 2);
    }

    #[test]
    fn test_screen_cursor_movement() {
        let mut screen = screen(80, 24);

        screen.move_cursor_to(5, 10);
        assert_eq!(screen.cursor().row, 4);
        assert_eq!(screen.cursor().col, 9);

        screen.move_cursor_up(2);
        assert_eq!(screen.cursor().row, 2);

        screen.move_cursor_down(5);
        assert_eq!(screen.cursor().row, 7);

        screen.move_cursor_left(3);
        assert_eq!(screen.cursor().col, 6);

        screen.move_cursor_right(100);
        assert_eq!(screen.cursor().col, 79);
    }

    #[test]
    fn test_origin_mode_positions() {
        let mut screen = screen(80, 24);
        assert!(screen.set_scroll_region(5, 10));
        screen.modes_mut().set_dec_mode(6, true);
        screen.move_cursor_to(1, 1);
        assert_eq!(screen.cursor().row, 4);
        screen.move_cursor_to(50, 1);
        assert_eq!(screen.cursor().row, 9);
        assert_eq!(screen.cursor_report_position(), (6, 1));
    }

    #[test]
    fn test_invalid_scroll_region_unchanged() {
        let mut screen = screen(10, 10);
        assert!(screen.set_scroll_region(2, 8));
        assert!(!screen.set_scroll_region(8, 2));
        assert!(!screen.set_scroll_region(1, 50));
        assert_eq!(screen.scroll_region(), (1, 7));
    }

    #[test]
    fn test_screen_erase_display() {
        let mut screen = screen(10, 3);
        for row in 0..3 {
            for col in 0..10 {
                screen.move_cursor_to(row + 1, col + 1);
                screen.print('X');
            }
        }

        screen.move_cursor_to(2, 5);
        screen.erase_display(0, false);

        assert_eq!(screen.row_text(0), "XXXXXXXXXX");
        assert_eq!(screen.row_text(1), "XXXX");
        assert_eq!(screen.row_text(2), "");
    }

    #[test]
    fn test_selective_erase_line() {
        let mut screen = screen(6, 1);
        screen.print('a');
        screen.cursor_mut().attrs.set(CellFlags::PROTECTED, true);
        screen.print('b');
        screen.cursor_mut().attrs.set(CellFlags::PROTECTED, false);
        screen.print('c');
        screen.erase_line(2, true);
        assert_eq!(screen.row_text(0), " b");
    }

    #[test]
    fn test_erase_uses_current_background() {
        let mut screen = screen(4, 1);
        screen.cursor_mut().attrs.bg = Color::Indexed(4);
        screen.erase_line(2, false);
        assert_eq!(screen.grid().cell(0, 3).attrs.bg, Color::Indexed(4));
    }

    #[test]
    fn test_screen_scroll_region() {
        let mut screen = screen(10, 5);
        for row in 0..5 {
            screen.move_cursor_to(row + 1, 1);
            screen.print((b'A' + row as u8) as char);
        }

        screen.set_scroll_region(2, 4);
        screen.move_cursor_to(4, 1);
        screen.linefeed();

        assert_eq!(ch(&screen, 0, 0), 'A');
        assert_eq!(ch(&screen, 1, 0), 'C');
        assert_eq!(ch(&screen, 2, 0), 'D');
        assert!(screen.grid().cell(3, 0).is_empty());
        assert_eq!(ch(&screen, 4, 0), 'E');
        assert_eq!(screen.primary_grid().scrollback_len(), 0);
    }

    #[test]
    fn test_left_right_margins_scroll() {
        let mut screen = screen(6, 2);
        for c in "abcdef".chars() {
            screen.print(c);
        }
        screen.carriage_return();
        screen.linefeed();
        for c in "ghijkl".chars() {
            screen.print(c);
        }
        screen.modes_mut().set_dec_mode(69, true);
        assert!(screen.set_left_right_margins(2, 4));
        screen.scroll_up(1);
        assert_eq!(screen.row_text(0), "ahijef");
        assert_eq!(screen.row_text(1), "g   kl");
    }

    #[test]
    fn test_screen_alternate() {
        let mut screen = screen(80, 24);
        screen.print('A');

        screen.enter_alternate_screen(true);
        assert!(screen.modes().dec(DecModes::ALT_SCREEN));
        assert!(screen.grid().cell(0, 0).is_empty());

        screen.move_cursor_to(1, 1);
        screen.print('B');
        assert_eq!(ch(&screen, 0, 0), 'B');

        screen.exit_alternate_screen(false);
        assert!(!screen.modes().dec(DecModes::ALT_SCREEN));
        assert_eq!(ch(&screen, 0, 0), 'A');
    }

    #[test]
    fn test_screen_tab() {
        let mut screen = screen(80, 24);
        screen.print('A');
        screen.tab(1);
        assert_eq!(screen.cursor().col, 8);

        screen.tab(2);
        assert_eq!(screen.cursor().col, 24);

        screen.back_tab(1);
        assert_eq!(screen.cursor().col, 16);
    }

    #[test]
    fn test_screen_insert_delete_lines() {
        let mut screen = screen(10, 5);
        for row in 0..5 {
            screen.move_cursor_to(row + 1, 1);
            screen.print((b'A' + row as u8) as char);
        }

        screen.move_cursor_to(2, 1);
        screen.insert_lines(2);

        assert_eq!(ch(&screen, 0, 0), 'A');
        assert!(screen.grid().cell(1, 0).is_empty());
        assert!(screen.grid().cell(2, 0).is_empty());
        assert_eq!(ch(&screen, 3, 0), 'B');
        assert_eq!(ch(&screen, 4, 0), 'C');

        screen.delete_lines(2);
        assert_eq!(ch(&screen, 1, 0), 'B');
        assert_eq!(ch(&screen, 2, 0), 'C');
        assert!(screen.grid().cell(4, 0).is_empty());
    }

    #[test]
    fn test_screen_save_restore_cursor() {
        let mut screen = screen(80, 24);
        screen.move_cursor_to(10, 20);
        screen.cursor_mut().attrs.set(CellFlags::BOLD, true);
        screen.charset_mut().designate(GSlot::G0, Charset::DecSpecialGraphics);

        screen.save_cursor();

        screen.move_cursor_to(1, 1);
        screen.cursor_mut().attrs.set(CellFlags::BOLD, false);
        screen.charset_mut().designate(GSlot::G0, Charset::Ascii);

        screen.restore_cursor();

        assert_eq!(screen.cursor().row, 9);
        assert_eq!(screen.cursor().col, 19);
        assert!(screen.cursor().attrs.has(CellFlags::BOLD));
        assert_eq!(screen.charset().slot(GSlot::G0), Charset::DecSpecialGraphics);
    }

    #[test]
    fn test_repeat_last() {
        let mut screen = screen(10, 1);
        screen.print('x');
        screen.repeat_last(3);
        assert_eq!(screen.row_text(0), "xxxx");
    }

    #[test]
    fn test_alignment_test() {
        let mut screen = screen(3, 2);
        screen.alignment_test();
        assert_eq!(screen.text(), "EEE\nEEE");
    }

    #[test]
    fn test_set_columns_clears() {
        let mut screen = screen(80, 4);
        screen.print('A');
        screen.set_columns(132);
        assert_eq!(screen.cols(), 132);
        assert!(screen.grid().cell(0, 0).is_empty());
        assert!(screen.modes().dec(DecModes::COLUMN_132));
    }

    #[test]
    fn test_resize_keeps_cursor_row_visible() {
        let mut screen = screen(10, 10);
        screen.move_cursor_to(9, 1);
        screen.print('Z');
        screen.resize(Dimensions::new(10, 5));
        assert_eq!(screen.cursor().row, 4);
        assert_eq!(ch(&screen, 4, 0), 'Z');
    }

    #[test]
    fn test_title_stack() {
        let mut screen = screen(10, 2);
        screen.set_title("one");
        screen.push_title();
        screen.set_title("two");
        assert!(screen.pop_title());
        assert_eq!(screen.title(), "one");
        assert!(!screen.pop_title());
    }
}
