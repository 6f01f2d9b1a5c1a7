//! Minimal right-to-left run reversal
//!
//! Not the Unicode bidi algorithm. Maximal runs of strong RTL codepoints
//! (Hebrew, Arabic and their presentation forms) are reversed in place;
//! neutrals sandwiched between two RTL characters join the run, neutrals at
//! a run boundary stay in logical order.

use crate::cell::Cell;

/// Strong right-to-left codepoint
pub fn is_rtl(c: char) -> bool {
    matches!(c as u32, 0x0590..=0x08FF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF)
}

/// Direction-neutral codepoint (spaces, punctuation, digits)
fn is_neutral(c: char) -> bool {
    c == ' ' || c.is_ascii_punctuation() || c.is_ascii_digit()
}

/// Reverse RTL runs of a row in place
pub fn reorder_row(row: &mut [Cell]) {
    let n = row.len();
    let mut i = 0;
    while i < n {
        if !is_rtl(row[i].ch) {
            i += 1;
            continue;
        }
        // extend the run while characters are RTL or neutrals followed by more RTL
        let start = i;
        let mut end = i;
        let mut j = i + 1;
        while j < n {
            let c = row[j].ch;
            if is_rtl(c) {
                end = j;
                j += 1;
            } else if is_neutral(c) {
                j += 1;
            } else {
                break;
            }
        }
        row[start..=end].reverse();
        i = end + 1;
    }
}
