//! Tab stop bitmap
//!
//! Up to 256 columns of tab stops, defaulting to every 8th column.

use serde::{Deserialize, Serialize};

/// Highest column that can carry a tab stop
pub const MAX_TAB_STOPS: usize = 256;

const WORDS: usize = MAX_TAB_STOPS / 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabStops {
    bits: [u64; WORDS],
    cols: usize,
}

impl TabStops {
    /// Stops every 8 columns
    pub fn new(cols: usize) -> Self {
        let mut tabs = Self {
            bits: [0; WORDS],
            cols: cols.min(MAX_TAB_STOPS),
        };
        tabs.reset_default(8);
        tabs
    }

    /// Clear and set a stop every `width` columns (DECST8C uses 8)
    pub fn reset_default(&mut self, width: usize) {
        self.bits = [0; WORDS];
        let width = width.max(1);
        let mut col = width;
        while col < self.cols {
            self.set(col);
            col += width;
        }
    }

    /// Track a column count change; stops past the new width are kept
    pub fn resize(&mut self, cols: usize) {
        let old = self.cols;
        self.cols = cols.min(MAX_TAB_STOPS);
        let mut col = ((old + 7) / 8 * 8).max(8);
        while col < self.cols {
            self.set(col);
            col += 8;
        }
    }

    pub fn set(&mut self, col: usize) {
        if col < MAX_TAB_STOPS {
            self.bits[col / 64] |= 1 << (col % 64);
        }
    }

    pub fn clear(&mut self, col: usize) {
        if col < MAX_TAB_STOPS {
            self.bits[col / 64] &= !(1 << (col % 64));
        }
    }

    pub fn clear_all(&mut self) {
        self.bits = [0; WORDS];
    }

    pub fn is_set(&self, col: usize) -> bool {
        col < MAX_TAB_STOPS && self.bits[col / 64] & (1 << (col % 64)) != 0
    }

    /// Next stop strictly right of `col`, or `limit` if none
    pub fn next(&self, col: usize, limit: usize) -> usize {
        ((col + 1)..limit.min(MAX_TAB_STOPS))
            .find(|&c| self.is_set(c))
            .unwrap_or(limit)
    }

    /// Previous stop strictly left of `col`, or `floor` if none
    pub fn prev(&self, col: usize, floor: usize) -> usize {
        (floor..col.min(MAX_TAB_STOPS))
            .rev()
            .find(|&c| self.is_set(c))
            .unwrap_or(floor)
    }

    /// Stops within the current width, 0-based
    pub fn list(&self) -> Vec<usize> {
        (0..self.cols).filter(|&c| self.is_set(c)).collect()
    }

    /// DECTABSR payload: 1-based columns separated by `/`
    pub fn report(&self) -> String {
        self.list()
            .iter()
            .map(|c| (c + 1).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stops() {
        let tabs = TabStops::new(80);
        assert!(tabs.is_set(8));
        assert!(tabs.is_set(72));
        assert!(!tabs.is_set(0));
        assert_eq!(tabs.next(0, 79), 8);
        assert_eq!(tabs.next(75, 79), 79);
    }

    #[test]
    fn test_set_clear() {
        let mut tabs = TabStops::new(80);
        tabs.set(3);
        assert_eq!(tabs.next(0, 79), 3);
        tabs.clear(3);
        assert_eq!(tabs.next(0, 79), 8);
        tabs.clear_all();
        assert_eq!(tabs.next(0, 79), 79);
    }

    #[test]
    fn test_prev() {
        let tabs = TabStops::new(80);
        assert_eq!(tabs.prev(20, 0), 16);
        assert_eq!(tabs.prev(5, 0), 0);
    }

    #[test]
    fn test_report() {
        let tabs = TabStops::new(20);
        assert_eq!(tabs.report(), "9/17");
    }
}
