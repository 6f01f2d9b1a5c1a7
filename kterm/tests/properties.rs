//! Property tests for the engine as a whole

use kterm::{NullHost, Session, SessionConfig};
use proptest::prelude::*;

fn session(cols: usize, rows: usize) -> Session {
    Session::new(0, SessionConfig::with_size(cols, rows))
}

/// Write one line of text per row, addressed absolutely
fn fill(session: &mut Session, lines: &[String]) {
    let mut bytes = Vec::new();
    for (row, line) in lines.iter().enumerate() {
        bytes.extend_from_slice(format!("\x1b[{};1H{}", row + 1, line).as_bytes());
    }
    session.process(&bytes, &mut NullHost);
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let mut s = session(20, 6);
        s.process(&data, &mut NullHost);
        s.process(b"\x18\x1b\\\x1b[0m\x1b[Hok", &mut NullHost);
        prop_assert!(s.screen().cursor().row < 6);
        prop_assert!(s.screen().cursor().col < 20);
    }

    #[test]
    fn scroll_up_shifts_rows(
        lines in proptest::collection::vec("[a-z]{1,12}", 8),
        n in 1usize..8,
    ) {
        let mut s = session(12, 8);
        fill(&mut s, &lines);
        s.screen_mut().scroll_up(n);
        for row in 0..8 - n {
            prop_assert_eq!(s.screen().row_text(row), lines[row + n].clone());
        }
        for row in 8 - n..8 {
            prop_assert_eq!(s.screen().row_text(row), "");
        }
    }

    #[test]
    fn scroll_down_then_up_keeps_surviving_rows(
        lines in proptest::collection::vec("[a-z]{1,12}", 8),
        n in 1usize..8,
    ) {
        let mut s = session(12, 8);
        fill(&mut s, &lines);
        s.screen_mut().scroll_down(n);
        for row in 0..n {
            prop_assert_eq!(s.screen().row_text(row), "");
        }
        s.screen_mut().scroll_up(n);
        for row in 0..8 - n {
            prop_assert_eq!(s.screen().row_text(row), lines[row].clone());
        }
    }

    #[test]
    fn copy_onto_itself_keeps_checksum(lines in proptest::collection::vec("[ -~]{0,16}", 6)) {
        let mut s = session(16, 6);
        fill(&mut s, &lines);
        let before = s.screen().checksum();
        s.process(b"\x1b[1;1;6;16;1;1;1;1$v", &mut NullHost);
        prop_assert_eq!(s.screen().checksum(), before);
    }

    #[test]
    fn view_offset_stays_within_scrollback(
        pushed in 0usize..200,
        offset in any::<usize>(),
    ) {
        let mut s = session(10, 4);
        let text = "line\r\n".repeat(pushed);
        s.process(text.as_bytes(), &mut NullHost);
        let grid = s.screen_mut().grid_mut();
        grid.set_view_offset(offset);
        prop_assert!(grid.view_offset() <= grid.scrollback_len());
        prop_assert!(grid.view_offset() <= offset);
    }
}
