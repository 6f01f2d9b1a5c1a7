//! Replies to the application: device attributes, status reports,
//! mode and presentation state reports, window reports and the DEC locator

use kterm_core::rect;
use kterm_core::{CellFlags, DecModes, GSlot, ModeStatus};
use kterm_parser::CsiAction;
use serde::Serialize;

use super::Session;
use crate::host::TerminalHost;

/// Nominal character cell used for pixel-size reports
const CELL_WIDTH_PX: usize = 8;
const CELL_HEIGHT_PX: usize = 16;

/// DEC locator state (DECELR, DECSLE, DECEFR, DECRQLP)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Locator {
    pub enabled: bool,
    /// Disable again after the next report
    pub one_shot: bool,
    /// Coordinates reported in pixels instead of cells
    pub pixels: bool,
    pub report_button_down: bool,
    pub report_button_up: bool,
    /// Filter rectangle `[top, left, bottom, right]`, 1-based; leaving it
    /// sends one report
    pub filter: Option<[usize; 4]>,
    /// Last known position, 1-based `(row, col)`
    pub position: Option<(usize, usize)>,
}

impl Locator {
    fn outside_filter(&self, row: usize, col: usize) -> bool {
        match self.filter {
            Some([top, left, bottom, right]) => row < top || row > bottom || col < left || col > right,
            None => false,
        }
    }
}

impl Session {
    /// DA1
    pub(super) fn send_primary_da(&mut self, host: &mut dyn TerminalHost) {
        let (da1, _, _) = self.conformance.device_attributes();
        self.send_attributes("DA1", da1, host);
    }

    /// DA2
    pub(super) fn send_secondary_da(&mut self, host: &mut dyn TerminalHost) {
        let (_, da2, _) = self.conformance.device_attributes();
        self.send_attributes("DA2", da2, host);
    }

    /// DA3
    pub(super) fn send_tertiary_da(&mut self, host: &mut dyn TerminalHost) {
        let (_, _, da3) = self.conformance.device_attributes();
        self.send_attributes("DA3", da3, host);
    }

    fn send_attributes(&mut self, which: &str, reply: &str, host: &mut dyn TerminalHost) {
        if reply.is_empty() {
            log::debug!("{} not answered at level {}", which, self.conformance.level);
            return;
        }
        self.respond(reply.as_bytes(), host);
    }

    /// DSR `CSI Ps n`
    pub(super) fn device_status(&mut self, ps: u16, host: &mut dyn TerminalHost) {
        match ps {
            5 => self.respond(b"\x1b[0n", host),
            6 => {
                // CPR
                let (row, col) = self.screen.cursor_report_position();
                self.respond(format!("\x1b[{};{}R", row, col).as_bytes(), host);
            }
            _ => self.diagnostics.unsupported(format_args!("DSR {}", ps)),
        }
    }

    /// DEC DSR `CSI ? Ps n`
    pub(super) fn device_status_private(&mut self, csi: &CsiAction, host: &mut dyn TerminalHost) {
        let features = self.conformance.features;
        let reply = match csi.param(0, 0) {
            6 => {
                // DECXCPR
                let (row, col) = self.screen.cursor_report_position();
                format!("\x1b[?{};{};1R", row, col)
            }
            15 => {
                if features.printer {
                    "\x1b[?10n".to_string()
                } else {
                    "\x1b[?13n".to_string()
                }
            }
            25 => {
                if self.user_keys.locked() {
                    "\x1b[?21n".to_string()
                } else {
                    "\x1b[?20n".to_string()
                }
            }
            26 => {
                let dialect = self
                    .screen
                    .charset()
                    .national_set()
                    .map(|cs| cs.dialect_code())
                    .unwrap_or(1);
                format!("\x1b[?27;{}n", dialect)
            }
            53 | 55 => {
                if features.locator {
                    "\x1b[?53n".to_string()
                } else {
                    "\x1b[?50n".to_string()
                }
            }
            56 => format!("\x1b[?57;{}n", u8::from(features.locator)),
            62 => {
                // DECMSR: no macro space
                "\x1b[0*{".to_string()
            }
            63 => {
                // DECCKSR
                let id = csi.param(1, 0);
                format!("\x1bP{}!~{:04X}\x1b\\", id, self.screen.checksum())
            }
            75 => "\x1b[?70n".to_string(),
            other => {
                self.diagnostics.unsupported(format_args!("DSR ?{}", other));
                return;
            }
        };
        self.respond(reply.as_bytes(), host);
    }

    /// DECRQM
    pub(super) fn request_mode(&mut self, mode: u16, private: bool, host: &mut dyn TerminalHost) {
        let mouse_mode = matches!(mode, 9 | 1000..=1003 | 1005 | 1006 | 1015 | 1016);
        let status = if private && mouse_mode && !self.conformance.features.mouse {
            ModeStatus::PermanentlyReset
        } else {
            self.screen.modes().report(mode, private)
        };
        let reply = format!(
            "\x1b[{}{};{}$y",
            if private { "?" } else { "" },
            mode,
            status as u8
        );
        self.respond(reply.as_bytes(), host);
    }

    /// DECREQTPARM
    pub(super) fn request_terminal_parameters(&mut self, ps: u16, host: &mut dyn TerminalHost) {
        if ps > 1 {
            log::debug!("DECREQTPARM {} ignored", ps);
            return;
        }
        let reply = format!("\x1b[{};1;1;120;120;1;0x", ps + 2);
        self.respond(reply.as_bytes(), host);
    }

    /// DECRQPSR: 1 cursor information (DECCIR), 2 tab stops (DECTABSR)
    pub(super) fn presentation_state(&mut self, ps: u16, host: &mut dyn TerminalHost) {
        let reply = match ps {
            1 => self.cursor_information(),
            2 => format!("\x1bP2$u{}\x1b\\", self.screen.tabs().report()),
            _ => {
                self.diagnostics.unsupported(format_args!("DECRQPSR {}", ps));
                return;
            }
        };
        self.respond(reply.as_bytes(), host);
    }

    fn cursor_information(&self) -> String {
        let cursor = self.screen.cursor();
        let charset = self.screen.charset();
        let (row, col) = self.screen.cursor_report_position();

        let mut rendition = 0x40u8;
        for (flag, bit) in [
            (CellFlags::BOLD, 1),
            (CellFlags::UNDERLINE, 2),
            (CellFlags::BLINK, 4),
            (CellFlags::REVERSE, 8),
        ] {
            if cursor.attrs.has(flag) {
                rendition |= bit;
            }
        }
        let protection = 0x40u8 | u8::from(cursor.attrs.has(CellFlags::PROTECTED));

        let mut flags = 0x40u8;
        if self.screen.modes().dec(DecModes::ORIGIN) {
            flags |= 1;
        }
        match charset.single_shift {
            Some(GSlot::G2) => flags |= 2,
            Some(GSlot::G3) => flags |= 4,
            _ => {}
        }
        if cursor.pending_wrap {
            flags |= 8;
        }

        let mut sizes = 0x40u8;
        for (i, set) in charset.slots.iter().enumerate() {
            if set.is_ninety_six() {
                sizes |= 1 << i;
            }
        }
        let designations: String = charset.slots.iter().map(|set| set.designator()).collect();

        format!(
            "\x1bP1$u{};{};1;{};{};{};{};{};{};{}\x1b\\",
            row,
            col,
            rendition as char,
            protection as char,
            flags as char,
            charset.gl as u8,
            charset.gr as u8,
            sizes as char,
            designations
        )
    }

    /// XTWINOPS reports and the title stack; 24 and above is DECSLPP
    pub(super) fn window_op(&mut self, csi: &CsiAction, host: &mut dyn TerminalHost) {
        let ps = csi.param(0, 0);
        let (rows, cols) = (self.screen.rows(), self.screen.cols());
        let reply = match ps {
            11 => "\x1b[1t".to_string(),
            13 => "\x1b[3;0;0t".to_string(),
            14 => format!("\x1b[4;{};{}t", rows * CELL_HEIGHT_PX, cols * CELL_WIDTH_PX),
            18 => format!("\x1b[8;{};{}t", rows, cols),
            19 => format!("\x1b[9;{};{}t", rows, cols),
            20 => format!("\x1b]L{}\x1b\\", self.screen.icon_title()),
            21 => format!("\x1b]l{}\x1b\\", self.screen.title()),
            22 => {
                self.screen.push_title();
                return;
            }
            23 => {
                if self.screen.pop_title() {
                    host.title(self.screen.title(), false);
                    host.title(self.screen.icon_title(), true);
                }
                return;
            }
            24.. => {
                // DECSLPP
                self.resize(cols, ps as usize);
                return;
            }
            1..=10 => {
                log::debug!("window operation {} ignored", ps);
                return;
            }
            _ => {
                self.unsupported_csi(csi);
                return;
            }
        };
        self.respond(reply.as_bytes(), host);
    }

    /// DECRQCRA `CSI Pid ; Pp ; Pt ; Pl ; Pb ; Pr * y`
    pub(super) fn report_rect_checksum(&mut self, csi: &CsiAction, host: &mut dyn TerminalHost) {
        if !self.conformance.features.rect_ops {
            return self.unsupported_csi(csi);
        }
        let id = csi.param(0, 0);
        let sum = self
            .rect_param(csi, 2)
            .map(|r| rect::checksum_rect(self.screen.grid(), r))
            .unwrap_or(0);
        self.respond(format!("\x1bP{}!~{:04X}\x1b\\", id, sum).as_bytes(), host);
    }

    /// DECEFR `CSI Pt ; Pl ; Pb ; Pr ' w`
    pub(super) fn set_locator_filter(&mut self, csi: &CsiAction) {
        let Some((row, col)) = self.locator.position else {
            self.locator.filter = None;
            return;
        };
        // Omitted edges default to the current position
        let edge = |i: usize, current: usize| match csi.params.raw(i) {
            0 => current,
            v => v as usize,
        };
        self.locator.filter = Some([edge(0, row), edge(1, col), edge(2, row), edge(3, col)]);
    }

    /// DECELR `CSI Ps ; Pu ' z`
    pub(super) fn enable_locator(&mut self, csi: &CsiAction) {
        let locator = &mut self.locator;
        match csi.param(0, 0) {
            0 => {
                locator.enabled = false;
                locator.one_shot = false;
            }
            1 => {
                locator.enabled = true;
                locator.one_shot = false;
            }
            2 => {
                locator.enabled = true;
                locator.one_shot = true;
            }
            other => log::debug!("DECELR: unknown mode {}", other),
        }
        locator.pixels = csi.param(1, 0) == 1;
        if !locator.enabled {
            locator.filter = None;
        }
    }

    /// DECSLE `CSI Ps ; ... ' {`
    pub(super) fn select_locator_events(&mut self, csi: &CsiAction) {
        let locator = &mut self.locator;
        let params = csi.params.as_slice();
        let params: &[u16] = if params.is_empty() { &[0] } else { params };
        for &p in params {
            match p {
                0 => {
                    locator.report_button_down = false;
                    locator.report_button_up = false;
                }
                1 => locator.report_button_down = true,
                2 => locator.report_button_down = false,
                3 => locator.report_button_up = true,
                4 => locator.report_button_up = false,
                other => log::debug!("DECSLE: unknown event {}", other),
            }
        }
    }

    /// DECRQLP `CSI Ps ' |`
    pub(super) fn request_locator_position(&mut self, host: &mut dyn TerminalHost) {
        self.send_locator_report(1, 0, host);
    }

    /// Report the locator with event code `event` and button mask `buttons`;
    /// `CSI 0 & w` when there is nothing to report
    fn send_locator_report(&mut self, event: u8, buttons: u8, host: &mut dyn TerminalHost) {
        let reply = match (self.locator.enabled, self.locator.position) {
            (true, Some((row, col))) => {
                let (row, col) = if self.locator.pixels {
                    ((row - 1) * CELL_HEIGHT_PX + 1, (col - 1) * CELL_WIDTH_PX + 1)
                } else {
                    (row, col)
                };
                format!("\x1b[{};{};{};{};1&w", event, buttons, row, col)
            }
            _ => "\x1b[0&w".to_string(),
        };
        self.respond(reply.as_bytes(), host);
        if self.locator.one_shot {
            self.locator.enabled = false;
            self.locator.one_shot = false;
        }
    }

    /// The host pointer moved to a 1-based cell.
    ///
    /// Leaving an armed filter rectangle sends one report and disarms it.
    pub fn locator_moved(&mut self, row: usize, col: usize, host: &mut dyn TerminalHost) {
        let row = row.clamp(1, self.screen.rows());
        let col = col.clamp(1, self.screen.cols());
        self.locator.position = Some((row, col));
        if self.locator.enabled && self.locator.outside_filter(row, col) {
            self.locator.filter = None;
            self.send_locator_report(10, 0, host);
            self.responses.flush(self.index, host);
        }
    }

    /// A host pointer button changed state; `button` 0 is left, 1 middle,
    /// 2 right
    pub fn locator_button(&mut self, button: u8, pressed: bool, host: &mut dyn TerminalHost) {
        let button = button.min(3);
        let wanted = if pressed {
            self.locator.report_button_down
        } else {
            self.locator.report_button_up
        };
        if !self.locator.enabled || !wanted {
            return;
        }
        let event = 2 + button * 2 + u8::from(!pressed);
        let mask = if pressed { 1 << button } else { 0 };
        self.send_locator_report(event, mask, host);
        self.responses.flush(self.index, host);
    }
}
