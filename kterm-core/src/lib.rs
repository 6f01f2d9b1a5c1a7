//! Terminal Core - Platform-independent terminal screen model
//!
//! This crate provides the core data structures and logic for terminal emulation:
//! - Screen grid on a ring buffer, with scrollback and an alternate buffer
//! - Cells with indexed or RGB colors and attribute flags
//! - Cursor state, margins, tab stops and rectangular-area operations
//! - ISO 2022 / NRCS character set translation
//! - DEC and ANSI mode flags, VT conformance levels and their feature sets
//! - The render handoff consumed by drawing code
//!
//! This crate is designed to be deterministic: given the same sequence of operations,
//! it will always produce the same screen state.

pub mod bidi;
mod cell;
pub mod charset;
pub mod color;
pub mod conformance;
mod cursor;
mod grid;
pub mod modes;
pub mod rect;
pub mod render;
mod screen;
mod tabs;

pub use cell::{char_width, Cell, CellAttributes, CellFlags};
pub use charset::{Charset, CharsetState, GSlot, SOFT_FONT_BASE};
pub use color::{parse_color_spec, Color, Palette, Rgb};
pub use conformance::{Conformance, Features, UnknownLevel, VtLevel};
pub use cursor::{Cursor, CursorStyle, SavedCursor};
pub use grid::Grid;
pub use modes::{AnsiModes, DecModes, ModeStatus, Modes, MouseEncoding, MouseMode};
pub use rect::{AttrChange, Rect};
pub use render::{RenderCell, RenderCursor, RenderFrame};
pub use screen::Screen;
pub use tabs::TabStops;

/// Terminal dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Dimensions {
    pub cols: usize,
    pub rows: usize,
}

impl Dimensions {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}
