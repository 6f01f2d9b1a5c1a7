//! C0 controls, ESC sequences and VT52 mode

use kterm_core::{CellFlags, Charset, DecModes, GSlot, Modes};
use kterm_parser::{EscAction, Vt52Action};

use super::Session;
use crate::host::TerminalHost;

impl Session {
    /// Handle a control character
    pub(super) fn handle_control(&mut self, byte: u8, host: &mut dyn TerminalHost) {
        match byte {
            0x05 => {
                // ENQ
                let answerback = self.config.answerback.clone();
                self.respond(answerback.as_bytes(), host);
            }
            0x07 => {
                // BEL
                host.bell();
            }
            0x08 => {
                // BS
                self.screen.backspace();
            }
            0x09 => {
                // HT
                self.screen.tab(1);
            }
            0x0A..=0x0C => {
                // LF, VT, FF
                if self.auto_print {
                    self.print_cursor_line(host);
                }
                self.screen.linefeed();
            }
            0x0D => {
                // CR
                self.screen.carriage_return();
            }
            0x0E => {
                // SO
                self.screen.charset_mut().shift_out();
            }
            0x0F => {
                // SI
                self.screen.charset_mut().shift_in();
            }
            _ => {
                log::trace!("Unhandled control character: 0x{:02x}", byte);
            }
        }
    }

    /// Handle an ESC sequence
    pub(super) fn handle_esc(&mut self, esc: EscAction, host: &mut dyn TerminalHost) {
        match esc {
            EscAction::SaveCursor => self.screen.save_cursor(),
            EscAction::RestoreCursor => self.screen.restore_cursor(),
            EscAction::Index => self.screen.index(),
            EscAction::ReverseIndex => self.screen.reverse_index(),
            EscAction::NextLine => self.screen.next_line(),
            EscAction::HorizontalTabSet => self.screen.set_tab_stop(),
            EscAction::FullReset => {
                log::debug!("session {}: RIS", self.index);
                self.reset();
            }
            EscAction::ApplicationKeypad => {
                self.screen.modes_mut().dec.insert(DecModes::APPLICATION_KEYPAD);
            }
            EscAction::NormalKeypad => {
                self.screen.modes_mut().dec.remove(DecModes::APPLICATION_KEYPAD);
            }
            EscAction::Designate {
                slot,
                extra,
                final_byte,
            } => self.designate(slot, extra, final_byte),
            EscAction::SingleShift2 => self.screen.charset_mut().single_shift_2(),
            EscAction::SingleShift3 => self.screen.charset_mut().single_shift_3(),
            EscAction::LockingShift2 => self.screen.charset_mut().lock_gl(GSlot::G2),
            EscAction::LockingShift3 => self.screen.charset_mut().lock_gl(GSlot::G3),
            EscAction::LockingShift1Right => self.screen.charset_mut().lock_gr(GSlot::G1),
            EscAction::LockingShift2Right => self.screen.charset_mut().lock_gr(GSlot::G2),
            EscAction::LockingShift3Right => self.screen.charset_mut().lock_gr(GSlot::G3),
            EscAction::BackIndex => self.screen.back_index(),
            EscAction::ForwardIndex => self.screen.forward_index(),
            EscAction::DoubleHeightTop => self.screen.set_line_size(CellFlags::DOUBLE_HEIGHT_TOP),
            EscAction::DoubleHeightBottom => {
                self.screen.set_line_size(CellFlags::DOUBLE_HEIGHT_BOTTOM)
            }
            EscAction::SingleWidth => self.screen.set_line_size(CellFlags::empty()),
            EscAction::DoubleWidth => self.screen.set_line_size(CellFlags::DOUBLE_WIDTH),
            EscAction::DecAlignmentTest => self.screen.alignment_test(),
            EscAction::Utf8On => {
                self.parser.set_utf8(true);
                self.screen.charset_mut().utf8 = true;
            }
            EscAction::Utf8Off => {
                self.parser.set_utf8(false);
                self.screen.charset_mut().utf8 = false;
            }
            EscAction::Select7Bit => self.responses.set_eight_bit(false),
            EscAction::Select8Bit => {
                if self.conformance.features.vt220 {
                    self.responses.set_eight_bit(true);
                } else {
                    self.diagnostics
                        .unsupported(format_args!("S8C1T at level {}", self.conformance.level));
                }
            }
            EscAction::Identify => {
                // DECID answers like DA1
                self.send_primary_da(host);
            }
            EscAction::Unknown(bytes) => {
                self.diagnostics
                    .unsupported(format_args!("ESC {:?}", String::from_utf8_lossy(&bytes)));
            }
        }
    }

    /// SCS: designate a character set into G0..G3
    fn designate(&mut self, designator: u8, extra: Option<u8>, final_byte: u8) {
        let Some(slot) = GSlot::from_designator(designator) else {
            self.diagnostics
                .malformed(format_args!("SCS with designator {:?}", designator as char));
            return;
        };
        if let Some(font) = &self.soft_font {
            if font.matches(extra, final_byte) {
                self.screen.charset_mut().designate(slot, Charset::SoftFont);
                return;
            }
        }
        let ninety_six = matches!(designator, b'-' | b'.' | b'/');
        match Charset::from_designation(extra, final_byte, ninety_six) {
            Some(charset) if charset.is_nrcs() && !self.conformance.features.nrcs => {
                self.diagnostics.unsupported(format_args!(
                    "NRCS {:?} at level {}",
                    charset, self.conformance.level
                ));
            }
            Some(charset) => self.screen.charset_mut().designate(slot, charset),
            None => {
                self.diagnostics.unsupported(format_args!(
                    "SCS ESC {}{}{}",
                    designator as char,
                    extra.map(|b| b as char).unwrap_or_default(),
                    final_byte as char
                ));
            }
        }
    }

    /// Handle a VT52 mode sequence
    pub(super) fn handle_vt52(&mut self, action: Vt52Action, host: &mut dyn TerminalHost) {
        match action {
            Vt52Action::CursorUp => self.screen.move_cursor_up(1),
            Vt52Action::CursorDown => self.screen.move_cursor_down(1),
            Vt52Action::CursorRight => self.screen.move_cursor_right(1),
            Vt52Action::CursorLeft => self.screen.move_cursor_left(1),
            Vt52Action::GraphicsOn => {
                self.screen
                    .charset_mut()
                    .designate(GSlot::G0, Charset::DecSpecialGraphics);
            }
            Vt52Action::GraphicsOff => {
                self.screen.charset_mut().designate(GSlot::G0, Charset::Ascii);
            }
            Vt52Action::Home => self.screen.move_cursor_to(1, 1),
            Vt52Action::ReverseLineFeed => self.screen.reverse_index(),
            Vt52Action::EraseToEndOfScreen => self.screen.erase_display(0, false),
            Vt52Action::EraseToEndOfLine => self.screen.erase_line(0, false),
            Vt52Action::CursorAddress { row, col } => {
                let row = (row as usize).min(self.screen.rows() - 1);
                let col = (col as usize).min(self.screen.cols() - 1);
                let cursor = self.screen.cursor_mut();
                cursor.set_position(col, row);
            }
            Vt52Action::Identify => self.respond(b"\x1b/Z", host),
            Vt52Action::KeypadApplication => {
                self.screen.modes_mut().dec.insert(DecModes::APPLICATION_KEYPAD);
            }
            Vt52Action::KeypadNumeric => {
                self.screen.modes_mut().dec.remove(DecModes::APPLICATION_KEYPAD);
            }
            Vt52Action::ExitVt52 => {
                if self.conformance.level == kterm_core::VtLevel::Vt52 {
                    log::debug!("session {}: ESC < ignored at level VT52", self.index);
                    self.enter_vt52();
                } else {
                    self.exit_vt52();
                }
            }
        }
    }

    /// Send the current line to the printer (auto print, MC 1)
    pub(super) fn print_cursor_line(&mut self, host: &mut dyn TerminalHost) {
        let row = self.screen.cursor().row;
        let mut line = self.screen.row_text(row).into_bytes();
        line.extend_from_slice(b"\r\n");
        host.print(&line);
    }

    /// Whether a mode set is in its power-on state
    #[cfg(test)]
    pub(super) fn modes_are_default(&self) -> bool {
        *self.screen.modes() == Modes::new()
    }
}
