//! SM/RM and DECSET/DECRST with their side effects

use kterm_core::DecModes;
use kterm_parser::CsiAction;

use super::Session;

impl Session {
    /// SM / RM
    pub(super) fn set_ansi_modes(&mut self, csi: &CsiAction, value: bool) {
        for mode in csi.params.iter() {
            if !self.screen.modes_mut().set_mode(mode, value) {
                self.diagnostics
                    .unsupported(format_args!("{} {}", if value { "SM" } else { "RM" }, mode));
            }
        }
    }

    /// DECSET / DECRST
    pub(super) fn set_dec_modes(&mut self, csi: &CsiAction, value: bool) {
        for mode in csi.params.iter() {
            self.set_dec_mode(mode, value);
        }
    }

    fn set_dec_mode(&mut self, mode: u16, value: bool) {
        let features = self.conformance.features;
        match mode {
            2 => {
                // DECANM - reset enters VT52 mode
                if !value {
                    if features.vt52 {
                        self.enter_vt52();
                    } else {
                        self.diagnostics
                            .unsupported(format_args!("DECANM at level {}", self.conformance.level));
                    }
                }
            }
            3 => {
                // DECCOLM
                if self.screen.modes().dec(DecModes::ALLOW_132) {
                    self.screen.set_columns(if value { 132 } else { 80 });
                    self.config.cols = self.screen.cols();
                } else {
                    log::debug!("DECCOLM ignored, 80/132 switching not allowed");
                }
            }
            5 => {
                // DECSCNM
                self.screen.modes_mut().dec.set(DecModes::REVERSE_VIDEO, value);
                self.screen.grid_mut().mark_all_dirty();
            }
            6 => {
                // DECOM - cursor homes to the new origin
                self.screen.modes_mut().dec.set(DecModes::ORIGIN, value);
                self.screen.move_cursor_to(1, 1);
            }
            12 => {
                self.screen.modes_mut().dec.set(DecModes::CURSOR_BLINK, value);
                self.screen.cursor_mut().blinking = value;
            }
            25 => {
                // DECTCEM
                self.screen.modes_mut().dec.set(DecModes::CURSOR_VISIBLE, value);
                self.screen.cursor_mut().visible = value;
            }
            38 => {
                // DECTEK
                if features.tektronix {
                    self.screen.modes_mut().dec.set(DecModes::TEKTRONIX, value);
                    self.parser.set_tektronix(value);
                } else {
                    self.diagnostics
                        .unsupported(format_args!("Tektronix mode at level {}", self.conformance.level));
                }
            }
            69 => {
                // DECLRMM
                if features.left_right_margins {
                    self.screen
                        .modes_mut()
                        .dec
                        .set(DecModes::LEFT_RIGHT_MARGIN, value);
                } else {
                    self.diagnostics
                        .unsupported(format_args!("DECLRMM at level {}", self.conformance.level));
                }
            }
            47 => {
                if value {
                    self.screen.enter_alternate_screen(false);
                } else {
                    self.screen.exit_alternate_screen(false);
                }
            }
            1047 => {
                if value {
                    self.screen.enter_alternate_screen(false);
                } else {
                    self.screen.exit_alternate_screen(true);
                }
            }
            1048 => {
                if value {
                    self.screen.save_cursor();
                } else {
                    self.screen.restore_cursor();
                }
            }
            1049 => {
                if value {
                    self.screen.save_cursor();
                    self.screen.enter_alternate_screen(true);
                } else {
                    self.screen.exit_alternate_screen(false);
                    self.screen.restore_cursor();
                }
            }
            9 | 1000..=1003 | 1005 | 1006 | 1015 | 1016 if !features.mouse => {
                self.diagnostics
                    .unsupported(format_args!("mouse mode {} at level {}", mode, self.conformance.level));
            }
            _ => {
                if !self.screen.modes_mut().set_dec_mode(mode, value) {
                    self.diagnostics.unsupported(format_args!(
                        "{} {}",
                        if value { "DECSET" } else { "DECRST" },
                        mode
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{feed, session, session_at};
    use kterm_core::{AnsiModes, DecModes, MouseMode, VtLevel};

    #[test]
    fn test_insert_mode() {
        let mut s = session(10, 2);
        feed(&mut s, b"abc\x1b[1G\x1b[4hX");
        assert_eq!(s.screen().row_text(0), "Xabc");
        feed(&mut s, b"\x1b[4lY");
        assert_eq!(s.screen().row_text(0), "XYbc");
    }

    #[test]
    fn test_linefeed_newline_mode() {
        let mut s = session(10, 3);
        feed(&mut s, b"\x1b[20hab\ncd");
        assert!(s.screen().modes().ansi(AnsiModes::LINEFEED_NEWLINE));
        assert_eq!(s.screen().row_text(1), "cd");
    }

    #[test]
    fn test_autowrap_off_overwrites_last_column() {
        let mut s = session(5, 2);
        feed(&mut s, b"\x1b[?7labcdefg");
        assert_eq!(s.screen().row_text(0), "abcdg");
        assert_eq!(s.screen().row_text(1), "");
    }

    #[test]
    fn test_cursor_visibility() {
        let mut s = session(10, 2);
        feed(&mut s, b"\x1b[?25l");
        assert!(!s.screen().cursor().visible);
        assert!(!s.render().cursor.visible);
        feed(&mut s, b"\x1b[?25h");
        assert!(s.screen().cursor().visible);
    }

    #[test]
    fn test_alternate_screen_1049_restores_cursor() {
        let mut s = session(10, 4);
        feed(&mut s, b"main\x1b[2;3H\x1b[?1049h");
        assert!(s.screen().is_alternate());
        assert_eq!(s.screen().row_text(0), "");
        feed(&mut s, b"\x1b[4;1Halt\x1b[?1049l");
        assert!(!s.screen().is_alternate());
        assert_eq!(s.screen().row_text(0), "main");
        assert_eq!((s.screen().cursor().row, s.screen().cursor().col), (1, 2));
    }

    #[test]
    fn test_origin_mode_homes_to_region() {
        let mut s = session(10, 10);
        feed(&mut s, b"\x1b[3;6r\x1b[?6h");
        assert_eq!(s.screen().cursor().row, 2);
        feed(&mut s, b"\x1b[10;1H");
        assert_eq!(s.screen().cursor().row, 5);
    }

    #[test]
    fn test_deccolm_switches_width() {
        let mut s = session(80, 5);
        feed(&mut s, b"text\x1b[?3h");
        assert_eq!(s.screen().cols(), 132);
        assert!(s.screen().modes().dec(DecModes::COLUMN_132));
        assert_eq!(s.screen().row_text(0), "");
        feed(&mut s, b"\x1b[?40l\x1b[?3l");
        assert_eq!(s.screen().cols(), 132);
    }

    #[test]
    fn test_mouse_modes_need_mouse_feature() {
        let mut s = session(10, 2);
        feed(&mut s, b"\x1b[?1002h");
        assert_eq!(s.screen().modes().mouse, MouseMode::ButtonEvent);

        let mut vt = session_at(VtLevel::Vt420);
        feed(&mut vt, b"\x1b[?1002h");
        assert_eq!(vt.screen().modes().mouse, MouseMode::Off);
        assert_eq!(vt.diagnostics().unsupported, 1);
    }

    #[test]
    fn test_tektronix_mode_routes_bytes() {
        let mut s = session(10, 2);
        feed(&mut s, b"\x1b[?38hA");
        assert!(s.parser().is_tektronix());
        assert_eq!(s.screen().row_text(0), "");
        assert_eq!(s.graphics().layer.tektronix.texts.len(), 1);
    }

    #[test]
    fn test_left_right_margin_mode_gated() {
        let mut s = session_at(VtLevel::Vt220);
        feed(&mut s, b"\x1b[?69h");
        assert!(!s.screen().modes().dec(DecModes::LEFT_RIGHT_MARGIN));
    }

    #[test]
    fn test_unknown_private_mode_is_counted() {
        let mut s = session(10, 2);
        feed(&mut s, b"\x1b[?31337h");
        assert_eq!(s.diagnostics().unsupported, 1);
        assert!(s.diagnostics().last_sequence.contains("31337"));
    }
}
