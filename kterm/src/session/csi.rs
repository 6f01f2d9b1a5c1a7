//! CSI dispatch
//!
//! Plain sequences are matched on the final byte; sequences carrying a
//! private marker or intermediates are split off first.

use kterm_core::rect::{self, AttrChange, Rect};
use kterm_core::{CellFlags, CursorStyle, DecModes, VtLevel};
use kterm_parser::CsiAction;

use super::Session;
use crate::host::TerminalHost;

impl Session {
    /// Handle a CSI sequence
    pub(super) fn handle_csi(&mut self, csi: &CsiAction, host: &mut dyn TerminalHost) {
        match csi.marker {
            b'?' => return self.handle_csi_private(csi, host),
            b'>' => return self.handle_csi_secondary(csi, host),
            b'=' => return self.handle_csi_tertiary(csi, host),
            0 => {}
            _ => return self.unsupported_csi(csi),
        }

        // Handle sequences with intermediates
        if !csi.intermediates.is_empty() {
            self.handle_csi_intermediate(csi, host);
            return;
        }

        match csi.final_byte {
            b'@' => {
                // ICH - Insert Character
                let n = csi.param(0, 1) as usize;
                self.screen.insert_chars(n);
            }
            b'A' => {
                // CUU - Cursor Up
                let n = csi.param(0, 1) as usize;
                self.screen.move_cursor_up(n);
            }
            b'B' => {
                // CUD - Cursor Down
                let n = csi.param(0, 1) as usize;
                self.screen.move_cursor_down(n);
            }
            b'C' => {
                // CUF - Cursor Forward
                let n = csi.param(0, 1) as usize;
                self.screen.move_cursor_right(n);
            }
            b'D' => {
                // CUB - Cursor Back
                let n = csi.param(0, 1) as usize;
                self.screen.move_cursor_left(n);
            }
            b'E' => {
                // CNL - Cursor Next Line
                let n = csi.param(0, 1) as usize;
                self.screen.move_cursor_down(n);
                self.screen.carriage_return();
            }
            b'F' => {
                // CPL - Cursor Previous Line
                let n = csi.param(0, 1) as usize;
                self.screen.move_cursor_up(n);
                self.screen.carriage_return();
            }
            b'G' | b'`' => {
                // CHA / HPA - Cursor Horizontal Absolute
                let col = csi.param(0, 1) as usize;
                self.screen.set_cursor_col(col);
            }
            b'a' => {
                // HPR - Horizontal Position Relative
                let n = csi.param(0, 1) as usize;
                self.screen.move_cursor_right(n);
            }
            b'j' => {
                // HPB - Horizontal Position Backward
                let n = csi.param(0, 1) as usize;
                self.screen.move_cursor_left(n);
            }
            b'H' | b'f' => {
                // CUP/HVP - Cursor Position
                let row = csi.param(0, 1) as usize;
                let col = csi.param(1, 1) as usize;
                self.screen.move_cursor_to(row, col);
            }
            b'I' => {
                // CHT - Cursor Horizontal Tab
                let n = csi.param(0, 1) as usize;
                self.screen.tab(n);
            }
            b'Z' => {
                // CBT - Cursor Backward Tab
                let n = csi.param(0, 1) as usize;
                self.screen.back_tab(n);
            }
            b'J' => {
                // ED - Erase in Display
                let mode = csi.param(0, 0);
                self.screen.erase_display(mode, false);
            }
            b'K' => {
                // EL - Erase in Line
                let mode = csi.param(0, 0);
                self.screen.erase_line(mode, false);
            }
            b'L' => {
                // IL - Insert Line
                let n = csi.param(0, 1) as usize;
                self.screen.insert_lines(n);
            }
            b'M' => {
                // DL - Delete Line
                let n = csi.param(0, 1) as usize;
                self.screen.delete_lines(n);
            }
            b'P' => {
                // DCH - Delete Character
                let n = csi.param(0, 1) as usize;
                self.screen.delete_chars(n);
            }
            b'S' => {
                // SU - Scroll Up
                let n = csi.param(0, 1) as usize;
                self.screen.scroll_up(n);
            }
            b'T' => {
                // SD - Scroll Down; the five parameter form is mouse highlight tracking
                if csi.params.len() > 1 {
                    return self.unsupported_csi(csi);
                }
                let n = csi.param(0, 1) as usize;
                self.screen.scroll_down(n);
            }
            b'X' => {
                // ECH - Erase Character
                let n = csi.param(0, 1) as usize;
                self.screen.erase_chars(n);
            }
            b'b' => {
                // REP - Repeat preceding graphic character
                let n = csi.param(0, 1) as usize;
                self.screen.repeat_last(n);
            }
            b'c' => {
                // DA1 - Primary Device Attributes
                if csi.param(0, 0) == 0 {
                    self.send_primary_da(host);
                }
            }
            b'd' => {
                // VPA - Vertical Position Absolute
                let row = csi.param(0, 1) as usize;
                self.screen.set_cursor_row(row);
            }
            b'e' => {
                // VPR - Vertical Position Relative
                let n = csi.param(0, 1) as usize;
                self.screen.move_cursor_down(n);
            }
            b'k' => {
                // VPB - Vertical Position Backward
                let n = csi.param(0, 1) as usize;
                self.screen.move_cursor_up(n);
            }
            b'g' => {
                // TBC - Tab Clear
                let mode = csi.param(0, 0);
                self.screen.clear_tab_stop(mode);
            }
            b'W' => {
                // CTC - Cursor Tabulation Control
                match csi.param(0, 0) {
                    0 => self.screen.set_tab_stop(),
                    2 => self.screen.clear_tab_stop(0),
                    5 => self.screen.clear_tab_stop(5),
                    other => log::debug!("CTC: ignoring {}", other),
                }
            }
            b'h' => {
                // SM - Set Mode
                self.set_ansi_modes(csi, true);
            }
            b'l' => {
                // RM - Reset Mode
                self.set_ansi_modes(csi, false);
            }
            b'i' => {
                // MC - Media Copy
                self.media_copy(csi.param(0, 0), false, host);
            }
            b'm' => {
                // SGR - Select Graphic Rendition
                self.handle_sgr(csi);
            }
            b'n' => {
                // DSR - Device Status Report
                self.device_status(csi.param(0, 0), host);
            }
            b'q' => {
                // DECLL - Load LEDs
                log::debug!("DECLL {:?}", csi.params.as_slice());
            }
            b'r' => {
                // DECSTBM - Set Top and Bottom Margins
                let top = csi.params.raw(0) as usize;
                let bottom = csi.params.raw(1) as usize;
                self.screen.set_scroll_region(top, bottom);
            }
            b's' => {
                if self.screen.modes().dec(DecModes::LEFT_RIGHT_MARGIN) {
                    // DECSLRM - Set Left and Right Margins
                    let left = csi.params.raw(0) as usize;
                    let right = csi.params.raw(1) as usize;
                    self.screen.set_left_right_margins(left, right);
                } else {
                    // SCOSC - Save Cursor
                    self.screen.save_cursor();
                }
            }
            b'u' => {
                // SCORC - Restore Cursor
                self.screen.restore_cursor();
            }
            b't' => {
                // XTWINOPS / DECSLPP
                self.window_op(csi, host);
            }
            b'x' => {
                // DECREQTPARM - Request Terminal Parameters
                self.request_terminal_parameters(csi.param(0, 0), host);
            }
            b'y' => {
                // DECTST - Invoke Confidence Test
                log::debug!("DECTST {:?} ignored", csi.params.as_slice());
            }
            _ => self.unsupported_csi(csi),
        }
    }

    /// `CSI ? ...`
    fn handle_csi_private(&mut self, csi: &CsiAction, host: &mut dyn TerminalHost) {
        if csi.with_intermediate(b'$', b'p') {
            // DECRQM - Request DEC private mode
            return self.request_mode(csi.param(0, 0), true, host);
        }
        if !csi.intermediates.is_empty() {
            return self.unsupported_csi(csi);
        }
        match csi.final_byte {
            b'h' => self.set_dec_modes(csi, true),
            b'l' => self.set_dec_modes(csi, false),
            b'n' => {
                // DECDSR
                self.device_status_private(csi, host);
            }
            b'J' => {
                // DECSED - Selective Erase in Display
                let mode = csi.param(0, 0);
                self.screen.erase_display(mode, true);
            }
            b'K' => {
                // DECSEL - Selective Erase in Line
                let mode = csi.param(0, 0);
                self.screen.erase_line(mode, true);
            }
            b'i' => {
                // DEC media copy (printer controller)
                self.media_copy(csi.param(0, 0), true, host);
            }
            b'W' if csi.param(0, 0) == 5 => {
                // DECST8C - Set tab stops every 8 columns
                self.screen.tabs_mut().reset_default(8);
            }
            b'z' => {
                // DECVERP - Enable Vertical Split Screen
                log::debug!("DECVERP {:?} ignored", csi.params.as_slice());
            }
            _ => self.unsupported_csi(csi),
        }
    }

    /// `CSI > ...`
    fn handle_csi_secondary(&mut self, csi: &CsiAction, host: &mut dyn TerminalHost) {
        if csi.final_byte == b'c' && csi.intermediates.is_empty() && csi.param(0, 0) == 0 {
            // DA2 - Secondary Device Attributes
            self.send_secondary_da(host);
        } else {
            self.unsupported_csi(csi);
        }
    }

    /// `CSI = ...`
    fn handle_csi_tertiary(&mut self, csi: &CsiAction, host: &mut dyn TerminalHost) {
        if csi.final_byte == b'c' && csi.intermediates.is_empty() && csi.param(0, 0) == 0 {
            // DA3 - Tertiary Device Attributes
            self.send_tertiary_da(host);
        } else {
            self.unsupported_csi(csi);
        }
    }

    fn handle_csi_intermediate(&mut self, csi: &CsiAction, host: &mut dyn TerminalHost) {
        let Some(&intermediate) = csi.intermediates.first() else {
            return;
        };
        if csi.intermediates.len() > 1 {
            return self.unsupported_csi(csi);
        }
        match (intermediate, csi.final_byte) {
            (b' ', b'q') => {
                // DECSCUSR - Set Cursor Style
                match CursorStyle::from_decscusr(csi.param(0, 0)) {
                    Some((style, blinking)) => {
                        let cursor = self.screen.cursor_mut();
                        cursor.style = style;
                        cursor.blinking = blinking;
                    }
                    None => log::debug!("DECSCUSR: unknown style {}", csi.param(0, 0)),
                }
            }
            (b'!', b'p') => {
                // DECSTR - Soft Terminal Reset
                self.soft_reset();
            }
            (b'"', b'p') => {
                // DECSCL - Select Conformance Level
                self.select_conformance_level(csi);
            }
            (b'"', b'q') => {
                // DECSCA - Select Character Protection Attribute
                let protect = csi.param(0, 0) == 1;
                self.screen
                    .cursor_mut()
                    .attrs
                    .set(CellFlags::PROTECTED, protect);
            }
            (b'$', b'p') => {
                // DECRQM - Request ANSI mode
                self.request_mode(csi.param(0, 0), false, host);
            }
            (b'$', b'w') => {
                // DECRQPSR - Request Presentation State Report
                self.presentation_state(csi.param(0, 0), host);
            }
            (b'$', b'|') => {
                // DECSCPP - Select 80 or 132 Columns per Page
                let cols = if csi.param(0, 80) >= 132 { 132 } else { 80 };
                self.screen.set_columns(cols);
                self.config.cols = self.screen.cols();
            }
            (b'$', b'}') | (b'$', b'~') => {
                // DECSASD / DECSSDT - status line
                log::debug!("status line control {:?} ignored", csi.params.as_slice());
            }
            (b'$', b'v' | b'x' | b'z' | b'{' | b'r' | b't') | (b'*', b'x') => {
                self.rectangle_op(csi);
            }
            (b'*', b'y') => {
                // DECRQCRA - Request Checksum of Rectangular Area
                self.report_rect_checksum(csi, host);
            }
            (b'*', b'|') => {
                // DECSNLS - Set Number of Lines per Screen
                let rows = csi.param(0, self.screen.rows() as u16) as usize;
                self.resize(self.screen.cols(), rows);
            }
            (b'\'', b'}') | (b'\'', b'~') => {
                if !self.conformance.features.vt420 {
                    return self.unsupported_csi(csi);
                }
                let n = csi.param(0, 1) as usize;
                if csi.final_byte == b'}' {
                    // DECIC - Insert Column
                    self.screen.insert_columns(n);
                } else {
                    // DECDC - Delete Column
                    self.screen.delete_columns(n);
                }
            }
            (b'\'', b'w' | b'z' | b'{' | b'|') => {
                if !self.conformance.features.locator {
                    return self.unsupported_csi(csi);
                }
                match csi.final_byte {
                    b'w' => self.set_locator_filter(csi),
                    b'z' => self.enable_locator(csi),
                    b'{' => self.select_locator_events(csi),
                    _ => self.request_locator_position(host),
                }
            }
            _ => self.unsupported_csi(csi),
        }
    }

    /// DECSTR
    pub(crate) fn soft_reset(&mut self) {
        self.screen.soft_reset();
        self.rect_stream = true;
        log::debug!("session {}: soft reset", self.index);
    }

    /// DECSCL `CSI Pl ; Pc " p`
    fn select_conformance_level(&mut self, csi: &CsiAction) {
        let Some(level) = VtLevel::from_decscl(csi.param(0, 0)) else {
            return self.unsupported_csi(csi);
        };
        if level.id() > self.config.level.id() {
            log::debug!(
                "DECSCL {} above the configured level {}, ignored",
                level,
                self.config.level
            );
            return;
        }
        self.set_level(level);
        self.soft_reset();
        let eight_bit = csi.param(0, 0) > 61 && matches!(csi.params.raw(1), 0 | 2);
        self.responses.set_eight_bit(eight_bit);
    }

    /// MC / DEC MC
    fn media_copy(&mut self, ps: u16, private: bool, host: &mut dyn TerminalHost) {
        if !self.conformance.features.printer {
            self.diagnostics
                .unsupported(format_args!("media copy at level {}", self.conformance.level));
            return;
        }
        match (private, ps) {
            (false, 0) | (true, 0) => self.print_page(host),
            (false, 1) | (true, 1) => self.print_cursor_line(host),
            (false, 5) => self.parser.set_printer_controller(true),
            (false, 4) => self.parser.set_printer_controller(false),
            (true, 5) => self.auto_print = true,
            (true, 4) => self.auto_print = false,
            _ => log::debug!("MC {}{} ignored", if private { "?" } else { "" }, ps),
        }
    }

    /// MC 0: the scroll region, or the whole page under DECPEX
    fn print_page(&mut self, host: &mut dyn TerminalHost) {
        let (top, bottom) = if self.screen.modes().dec(DecModes::PRINT_EXTENT) {
            (0, self.screen.rows() - 1)
        } else {
            self.screen.scroll_region()
        };
        let mut out = Vec::new();
        for row in top..=bottom {
            out.extend_from_slice(self.screen.row_text(row).as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        if self.screen.modes().dec(DecModes::PRINT_FORM_FEED) {
            out.push(0x0C);
        }
        host.print(&out);
    }

    /// Rectangle from four 1-based parameters starting at `first`.
    ///
    /// Under DECOM the coordinates are relative to the margins.
    pub(super) fn rect_param(&self, csi: &CsiAction, first: usize) -> Option<Rect> {
        self.extent_param(csi, first, false)
    }

    fn extent_param(&self, csi: &CsiAction, first: usize, stream: bool) -> Option<Rect> {
        let (top_off, bottom, left_off, right) = self.page_bounds();
        let r = Rect::extent_from_params(
            [
                csi.params.raw(first),
                csi.params.raw(first + 1),
                csi.params.raw(first + 2),
                csi.params.raw(first + 3),
            ],
            bottom - top_off + 1,
            right - left_off + 1,
            stream,
        )?;
        Some(Rect::new(
            r.top + top_off,
            r.left + left_off,
            r.bottom + top_off,
            r.right + left_off,
        ))
    }

    /// (top, bottom, left, right) addressable by rectangle commands
    fn page_bounds(&self) -> (usize, usize, usize, usize) {
        if self.screen.modes().dec(DecModes::ORIGIN) {
            let (top, bottom) = self.screen.scroll_region();
            let (left, right) = self.screen.horizontal_margins();
            (top, bottom, left, right)
        } else {
            (0, self.screen.rows() - 1, 0, self.screen.cols() - 1)
        }
    }

    /// DECCRA, DECFRA, DECERA, DECSERA, DECCARA, DECRARA, DECSACE
    fn rectangle_op(&mut self, csi: &CsiAction) {
        if !self.conformance.features.rect_ops {
            return self.unsupported_csi(csi);
        }
        let erase = self.screen.cursor().attrs.erase_attrs();
        let params = csi.params.as_slice();
        match (csi.intermediates[0], csi.final_byte) {
            (b'$', b'v') => {
                // DECCRA - Copy Rectangular Area
                let Some(src) = self.rect_param(csi, 0) else {
                    return;
                };
                let (top_off, bottom, left_off, right) = self.page_bounds();
                let dst_top = (top_off + csi.param(5, 1) as usize - 1).min(bottom);
                let dst_left = (left_off + csi.param(6, 1) as usize - 1).min(right);
                rect::copy_rect(self.screen.grid_mut(), src, dst_top, dst_left);
            }
            (b'$', b'x') => {
                // DECFRA - Fill Rectangular Area
                let ch = csi.params.raw(0) as u32;
                let valid = (0x20..=0x7E).contains(&ch) || (0xA0..=0xFF).contains(&ch);
                let Some(ch) = char::from_u32(ch).filter(|_| valid) else {
                    log::debug!("DECFRA: invalid fill character {}", ch);
                    return;
                };
                let ch = self.screen.charset_mut().translate(ch);
                let attrs = self.screen.cursor().attrs;
                if let Some(r) = self.rect_param(csi, 1) {
                    rect::fill_rect(self.screen.grid_mut(), r, ch, attrs);
                }
            }
            (b'$', b'z') => {
                // DECERA - Erase Rectangular Area
                if let Some(r) = self.rect_param(csi, 0) {
                    rect::erase_rect(self.screen.grid_mut(), r, erase);
                }
            }
            (b'$', b'{') => {
                // DECSERA - Selective Erase Rectangular Area
                if let Some(r) = self.rect_param(csi, 0) {
                    rect::selective_erase_rect(self.screen.grid_mut(), r, erase);
                }
            }
            (b'$', b'r') => {
                // DECCARA - Change Attributes in Rectangular Area
                let change = AttrChange::from_sgr(params.get(4..).unwrap_or(&[]));
                if let Some(r) = self.extent_param(csi, 0, self.rect_stream) {
                    rect::change_attrs(self.screen.grid_mut(), r, &change, self.rect_stream);
                }
            }
            (b'$', b't') => {
                // DECRARA - Reverse Attributes in Rectangular Area
                let mask = rect::reverse_mask(params.get(4..).unwrap_or(&[]));
                if let Some(r) = self.extent_param(csi, 0, self.rect_stream) {
                    rect::reverse_attrs(self.screen.grid_mut(), r, mask, self.rect_stream);
                }
            }
            (b'*', b'x') => {
                // DECSACE - Select Attribute Change Extent
                self.rect_stream = csi.param(0, 0) != 2;
            }
            _ => self.unsupported_csi(csi),
        }
    }

    pub(super) fn unsupported_csi(&mut self, csi: &CsiAction) {
        let marker = if csi.marker == 0 { String::new() } else { (csi.marker as char).to_string() };
        self.diagnostics.unsupported(format_args!(
            "CSI {}{:?}{}{}",
            marker,
            csi.params.as_slice(),
            String::from_utf8_lossy(&csi.intermediates),
            csi.final_byte as char
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{feed, session, session_at};
    use crate::host::RecordingHost;
    use kterm_core::{CellFlags, CursorStyle, VtLevel};

    #[test]
    fn test_cursor_movement() {
        let mut s = session(80, 24);
        feed(&mut s, b"\x1b[10;20H");
        assert_eq!((s.screen().cursor().row, s.screen().cursor().col), (9, 19));
        feed(&mut s, b"\x1b[5A\x1b[3D");
        assert_eq!((s.screen().cursor().row, s.screen().cursor().col), (4, 16));
        feed(&mut s, b"\x1b[2E");
        assert_eq!((s.screen().cursor().row, s.screen().cursor().col), (6, 0));
        feed(&mut s, b"\x1b[30`\x1b[3d");
        assert_eq!((s.screen().cursor().row, s.screen().cursor().col), (2, 29));
        feed(&mut s, b"\x1b[2a\x1b[2e\x1b[j\x1b[k");
        assert_eq!((s.screen().cursor().row, s.screen().cursor().col), (3, 30));
    }

    #[test]
    fn test_erase_and_edit() {
        let mut s = session(10, 3);
        feed(&mut s, b"0123456789\x1b[1;4H\x1b[2P");
        assert_eq!(s.screen().row_text(0), "01256789");
        feed(&mut s, b"\x1b[2@");
        assert_eq!(s.screen().row_text(0), "012  56789");
        feed(&mut s, b"\x1b[1;8H\x1b[K");
        assert_eq!(s.screen().row_text(0), "012  56");
        feed(&mut s, b"\x1b[1;1H\x1b[2X");
        assert_eq!(s.screen().row_text(0), "  2  56");
    }

    #[test]
    fn test_repeat_last_character() {
        let mut s = session(10, 2);
        feed(&mut s, b"x\x1b[3b");
        assert_eq!(s.screen().row_text(0), "xxxx");
    }

    #[test]
    fn test_invalid_scroll_region_is_ignored() {
        let mut s = session(10, 10);
        feed(&mut s, b"\x1b[2;5r");
        assert_eq!(s.screen().scroll_region(), (1, 4));
        feed(&mut s, b"\x1b[6;3r\x1b[1;50r");
        assert_eq!(s.screen().scroll_region(), (1, 4));
    }

    #[test]
    fn test_tab_controls() {
        let mut s = session(40, 2);
        feed(&mut s, b"\x1b[3g\x1b[1;5H\x1b[W\x1b[1;1H\t");
        assert_eq!(s.screen().cursor().col, 4);
        feed(&mut s, b"\x1b[2W\x1b[1;1H\t");
        assert_eq!(s.screen().cursor().col, 39);
        feed(&mut s, b"\x1b[?5W\x1b[1;1H\x1b[2I");
        assert_eq!(s.screen().cursor().col, 16);
        feed(&mut s, b"\x1b[Z");
        assert_eq!(s.screen().cursor().col, 8);
    }

    #[test]
    fn test_left_right_margins_and_scosc() {
        let mut s = session(20, 5);
        feed(&mut s, b"\x1b[1;3H\x1b[s\x1b[5;5H\x1b[u");
        assert_eq!((s.screen().cursor().row, s.screen().cursor().col), (0, 2));
        feed(&mut s, b"\x1b[?69h\x1b[5;10s");
        assert_eq!(s.screen().horizontal_margins(), (4, 9));
    }

    #[test]
    fn test_decscusr() {
        let mut s = session(10, 2);
        feed(&mut s, b"\x1b[6 q");
        assert_eq!(s.screen().cursor().style, CursorStyle::Bar);
        assert!(!s.screen().cursor().blinking);
    }

    #[test]
    fn test_selective_erase_respects_protection() {
        let mut s = session(10, 2);
        feed(&mut s, b"\x1b[1\"qAB\x1b[0\"qCD\x1b[?2K");
        assert_eq!(s.screen().row_text(0), "AB");
        feed(&mut s, b"\x1b[2K");
        assert_eq!(s.screen().row_text(0), "");
    }

    #[test]
    fn test_decstr_resets_modes_keeps_screen() {
        let mut s = session(10, 3);
        feed(&mut s, b"text\x1b[4h\x1b[?6h\x1b[2;3r\x1b[!p");
        assert_eq!(s.screen().row_text(0), "text");
        assert!(!s.screen().modes().ansi(kterm_core::AnsiModes::INSERT));
        assert!(!s.screen().modes().dec(kterm_core::DecModes::ORIGIN));
        assert_eq!(s.screen().scroll_region(), (0, 2));
    }

    #[test]
    fn test_decscl_lowers_level_and_selects_8bit() {
        let mut s = session(10, 3);
        let mut host = RecordingHost::new();
        s.process(b"\x1b[62;0\"p", &mut host);
        assert_eq!(s.conformance().level, VtLevel::Vt220);
        assert!(s.responses().eight_bit());
        s.process(b"\x1b[64\"p", &mut host);
        assert_eq!(s.conformance().level, VtLevel::Vt420);
        s.process(b"\x1b[61\"p", &mut host);
        assert_eq!(s.conformance().level, VtLevel::Vt100);
        assert!(!s.responses().eight_bit());

        let mut capped = session_at(VtLevel::Vt220);
        feed(&mut capped, b"\x1b[64\"p");
        assert_eq!(capped.conformance().level, VtLevel::Vt220);
    }

    #[test]
    fn test_rectangle_fill_copy_erase() {
        let mut s = session(10, 5);
        feed(&mut s, b"\x1b[88;1;1;2;3$x");
        assert_eq!(s.screen().row_text(0), "XXX");
        assert_eq!(s.screen().row_text(1), "XXX");
        feed(&mut s, b"\x1b[1;1;2;3;1;4;5;1$v");
        assert_eq!(s.screen().row_text(3), "    XXX");
        feed(&mut s, b"\x1b[1;2;5;2$z");
        assert_eq!(s.screen().row_text(0), "X X");
        assert_eq!(s.screen().row_text(3), "    XXX");
    }

    #[test]
    fn test_rectangle_attributes_stream_and_box() {
        let mut s = session(5, 3);
        feed(&mut s, b"aaaaa\r\nbbbbb\r\nccccc");
        feed(&mut s, b"\x1b[1;4;2;2;1$r");
        let bold = |s: &super::Session, r: usize, c: usize| {
            s.screen().grid().cell(r, c).attrs.has(CellFlags::BOLD)
        };
        assert!(bold(&s, 0, 3) && bold(&s, 0, 4) && bold(&s, 1, 0) && bold(&s, 1, 1));
        assert!(!bold(&s, 0, 0) && !bold(&s, 1, 2));

        feed(&mut s, b"\x1b[2*x\x1b[2;4;3;5;7$t");
        let rev = |s: &super::Session, r: usize, c: usize| {
            s.screen().grid().cell(r, c).attrs.has(CellFlags::REVERSE)
        };
        assert!(rev(&s, 1, 3) && rev(&s, 2, 4));
        assert!(!rev(&s, 1, 0) && !rev(&s, 2, 0));
    }

    #[test]
    fn test_rectangles_gated_by_level() {
        let mut s = session_at(VtLevel::Vt220);
        feed(&mut s, b"\x1b[88;1;1;2;3$x");
        assert_eq!(s.screen().row_text(0), "");
        assert_eq!(s.diagnostics().unsupported, 1);
    }

    #[test]
    fn test_insert_delete_columns() {
        let mut s = session(6, 2);
        feed(&mut s, b"abcdef\r\nghijkl\x1b[1;2H\x1b[2'}");
        assert_eq!(s.screen().row_text(0), "a  bcd");
        assert_eq!(s.screen().row_text(1), "g  hij");
        feed(&mut s, b"\x1b[3'~");
        assert_eq!(s.screen().row_text(0), "acd");
    }

    #[test]
    fn test_media_copy_prints_region() {
        let mut s = session(10, 3);
        let mut host = RecordingHost::new();
        s.process(b"one\r\ntwo\r\nthree\x1b[i", &mut host);
        assert_eq!(host.printed, b"one\r\ntwo\r\nthree\r\n");
    }

    #[test]
    fn test_printer_controller_passthrough() {
        let mut s = session(10, 3);
        let mut host = RecordingHost::new();
        s.process(b"\x1b[5ihidden\x1b[4ishown", &mut host);
        assert_eq!(host.printed, b"hidden");
        assert_eq!(s.screen().row_text(0), "shown");
    }

    #[test]
    fn test_unknown_csi_is_recorded() {
        let mut s = session(10, 3);
        feed(&mut s, b"\x1b[5;6}");
        assert_eq!(s.diagnostics().unsupported, 1);
        assert!(s.diagnostics().last_sequence.starts_with("CSI [5, 6]"));
    }
}
