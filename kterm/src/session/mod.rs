//! Session state management
//!
//! A session is one virtual terminal: a [`Screen`], the [`Parser`] feeding
//! it, the conformance level gating what it accepts, and the protocol state
//! the escape sequence executors keep between calls (soft fonts, user keys,
//! the ReGIS interpreter, locator, printer).
//!
//! The executors live in submodules, one per sequence family, all as
//! `impl Session` blocks.

mod control;
mod csi;
mod dcs;
pub mod graphics;
mod modes;
mod osc;
mod report;
pub mod response;
mod sgr;

use std::collections::HashMap;

use kterm_core::{Conformance, Dimensions, RenderFrame, Screen, VtLevel};
use kterm_parser::{Action, Parser, RegisInterpreter};

pub use dcs::{SoftFont, UserKeys};
pub use graphics::{GraphicsBatch, GraphicsKind, GraphicsLayer, GraphicsState, PlacedSixel, VectorLayer, VectorText};
pub use report::Locator;
pub use response::ResponseBuffer;

use crate::config::{Config, MAX_DIMENSION};
use crate::diagnostics::Diagnostics;
use crate::gateway::{self, GatewayRequest};
use crate::host::TerminalHost;

/// Per-session settings derived from [`Config`]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub cols: usize,
    pub rows: usize,
    pub scrollback: usize,
    pub level: VtLevel,
    /// Reply to ENQ
    pub answerback: String,
    pub output_capacity: usize,
    pub viewport_aspect: f32,
    pub sixel_max_strips: usize,
    pub osc52_clipboard: bool,
    pub osc52_max_size: usize,
    pub max_title_len: usize,
    pub debug: bool,
}

impl SessionConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cols: config.columns,
            rows: config.rows,
            scrollback: config.scrollback_rows,
            level: config.level(),
            answerback: config.answerback.clone(),
            output_capacity: config.pipeline.output_capacity,
            viewport_aspect: config.graphics.viewport_aspect,
            sixel_max_strips: config.graphics.sixel_max_strips,
            osc52_clipboard: config.security.osc52_clipboard,
            osc52_max_size: config.security.osc52_max_size,
            max_title_len: config.security.max_title_len,
            debug: config.debug,
        }
    }

    /// Settings for a bare session of the given size
    pub fn with_size(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            ..Self::from_config(&Config::default())
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::with_size(80, 24)
    }
}

/// One virtual terminal
pub struct Session {
    index: usize,
    screen: Screen,
    parser: Parser,
    conformance: Conformance,
    config: SessionConfig,
    responses: ResponseBuffer,
    diagnostics: Diagnostics,
    /// Actions produced by the byte being processed; reused between bytes
    pending: Vec<Action>,
    regis: RegisInterpreter,
    graphics: GraphicsState,
    soft_font: Option<SoftFont>,
    user_keys: UserKeys,
    locator: Locator,
    /// DEC MC ?5: print each line as the cursor leaves it
    auto_print: bool,
    /// DECSACE: rectangle attribute changes apply as a character stream
    rect_stream: bool,
    /// Glyph slots handed out by the host
    glyphs: HashMap<u32, u32>,
    /// KTERM gateway commands awaiting terminal-level dispatch
    gateway_queue: Vec<GatewayRequest>,
}

impl Session {
    /// Create a session with the given index and settings
    pub fn new(index: usize, config: SessionConfig) -> Self {
        let dims = Dimensions::new(config.cols.max(1), config.rows.max(1));
        let mut parser = Parser::new();
        parser.set_sixel_max_strips(config.sixel_max_strips);
        let mut session = Self {
            index,
            screen: Screen::new(dims, config.scrollback),
            parser,
            conformance: Conformance::new(config.level),
            responses: ResponseBuffer::new(config.output_capacity),
            diagnostics: Diagnostics::new(config.debug),
            pending: Vec::with_capacity(4),
            regis: RegisInterpreter::new(),
            graphics: GraphicsState::new(config.viewport_aspect),
            soft_font: None,
            user_keys: UserKeys::default(),
            locator: Locator::default(),
            auto_print: false,
            rect_stream: true,
            glyphs: HashMap::new(),
            gateway_queue: Vec::new(),
            config,
        };
        if session.conformance.level == VtLevel::Vt52 {
            session.enter_vt52();
        }
        session
    }

    /// Feed a chunk of bytes, dispatching everything it completes.
    ///
    /// Gateway commands and graphics are applied to this session itself;
    /// a [`crate::Terminal`] routes them across sessions instead.
    pub fn process(&mut self, data: &[u8], host: &mut dyn TerminalHost) {
        for &byte in data {
            self.process_byte(byte, host);
            if !self.gateway_queue.is_empty() {
                self.apply_gateway_locally(host);
            }
        }
        self.finish_batch(host);
        self.graphics.deliver_local();
    }

    /// Advance the parser by one byte and execute the resulting actions
    pub fn process_byte(&mut self, byte: u8, host: &mut dyn TerminalHost) {
        let mut actions = std::mem::take(&mut self.pending);
        self.parser.advance(byte, &mut |action| actions.push(action));
        for action in actions.drain(..) {
            self.handle_action(action, host);
        }
        self.pending = actions;
    }

    /// End of a batch: release held printer bytes and flush responses
    pub fn finish_batch(&mut self, host: &mut dyn TerminalHost) {
        let mut actions = std::mem::take(&mut self.pending);
        self.parser.flush(&mut |action| actions.push(action));
        for action in actions.drain(..) {
            self.handle_action(action, host);
        }
        self.pending = actions;
        self.responses.flush(self.index, host);
    }

    fn apply_gateway_locally(&mut self, host: &mut dyn TerminalHost) {
        for request in std::mem::take(&mut self.gateway_queue) {
            if let Some(report) = gateway::apply_to_session(self, &request) {
                self.respond(report.as_bytes(), host);
            }
        }
    }

    /// Handle a parsed action
    fn handle_action(&mut self, action: Action, host: &mut dyn TerminalHost) {
        match action {
            Action::Print(c) => self.print(c, host),
            Action::Control(byte) => self.handle_control(byte, host),
            Action::Esc(esc) => self.handle_esc(esc, host),
            Action::Csi(csi) => self.handle_csi(&csi, host),
            Action::Osc(osc) => self.handle_osc(osc, host),
            Action::Dcs {
                params,
                intermediates,
                final_byte,
                data,
            } => self.handle_dcs(&params, &intermediates, final_byte, &data, host),
            Action::Vt52(vt52) => self.handle_vt52(vt52, host),
            Action::Sixel(image) => self.handle_sixel(image),
            Action::Regis(data) => self.handle_regis(&data, host),
            Action::Tek(event) => self.graphics.push_tek(&event),
            Action::Printer(bytes) => host.print(&bytes),
            Action::Apc(data) => {
                self.diagnostics
                    .unsupported(format_args!("APC ({} bytes)", data.len()));
            }
            Action::Pm(_) | Action::Sos(_) => {}
            Action::Invalid(data) => {
                self.diagnostics.malformed(format_args!(
                    "CSI overflow after {} bytes: {:?}",
                    data.len(),
                    String::from_utf8_lossy(&data[..data.len().min(32)])
                ));
            }
        }
    }

    fn print(&mut self, c: char, host: &mut dyn TerminalHost) {
        if c == char::REPLACEMENT_CHARACTER && self.parser.is_utf8() {
            self.diagnostics
                .record(crate::diagnostics::DiagnosticKind::Decode, format_args!("invalid UTF-8"));
        }
        self.screen.print(c);
        if let Some(printed) = self.screen.last_printed() {
            self.note_glyph(printed, host);
        }
    }

    /// Ask the host for an atlas slot the first time a codepoint appears
    fn note_glyph(&mut self, c: char, host: &mut dyn TerminalHost) {
        let code = c as u32;
        if code > 0xFF && !self.glyphs.contains_key(&code) {
            if let Some(slot) = host.allocate_glyph(code) {
                self.glyphs.insert(code, slot);
            }
        }
    }

    fn handle_sixel(&mut self, image: kterm_parser::SixelImage) {
        if !self.conformance.features.sixel {
            self.diagnostics
                .unsupported(format_args!("sixel image at level {}", self.conformance.level));
            return;
        }
        if image.truncated {
            self.diagnostics.overflow(format_args!(
                "sixel image truncated at {} strips",
                image.strips.len()
            ));
        }
        let cursor = self.screen.cursor();
        let (col, row) = (cursor.col, cursor.row);
        self.graphics.push_sixel(col, row, image);
    }

    fn handle_regis(&mut self, data: &[u8], host: &mut dyn TerminalHost) {
        if !self.conformance.features.regis {
            self.diagnostics
                .unsupported(format_args!("ReGIS at level {}", self.conformance.level));
            return;
        }
        let output = self.regis.execute(data);
        for err in &output.errors {
            self.diagnostics.malformed(format_args!("ReGIS: {}", err));
        }
        for report in &output.reports {
            self.respond(report.as_bytes(), host);
        }
        self.graphics.push_regis(&output);
    }

    /// Queue a reply to the application
    pub(crate) fn respond(&mut self, reply: &[u8], host: &mut dyn TerminalHost) {
        self.responses
            .push(reply, self.index, host, &mut self.diagnostics);
    }

    /// Render the visible screen
    pub fn render(&self) -> RenderFrame {
        RenderFrame::from_screen(&self.screen, |c| self.glyphs.get(&(c as u32)).copied())
    }

    /// Full reset (RIS): every piece of per-session state
    pub fn reset(&mut self) {
        self.screen.reset();
        self.parser.reset();
        self.parser.set_tektronix(false);
        self.parser.set_printer_controller(false);
        self.parser.set_vt52(false);
        self.responses.set_eight_bit(false);
        self.responses.clear();
        self.regis = RegisInterpreter::new();
        self.graphics.reset();
        self.soft_font = None;
        self.user_keys = UserKeys::default();
        self.locator = Locator::default();
        self.auto_print = false;
        self.rect_stream = true;
        if self.conformance.level == VtLevel::Vt52 {
            self.enter_vt52();
        }
    }

    /// Change the conformance level
    pub fn set_level(&mut self, level: VtLevel) {
        self.conformance.set_level(level);
        log::debug!("session {}: conformance level {}", self.index, level);
        if level == VtLevel::Vt52 {
            self.enter_vt52();
        } else if self.parser.is_vt52() {
            self.exit_vt52();
        }
    }

    /// Resize the screen
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let cols = cols.clamp(1, MAX_DIMENSION);
        let rows = rows.clamp(1, MAX_DIMENSION);
        self.screen.resize(Dimensions::new(cols, rows));
        self.config.cols = self.screen.cols();
        self.config.rows = self.screen.rows();
    }

    /// Bytes programmed for a function key by DECUDK
    pub fn user_defined_key(&self, key: u16) -> Option<&[u8]> {
        self.user_keys.get(key)
    }

    pub(crate) fn enter_vt52(&mut self) {
        self.parser.set_vt52(true);
        self.screen.modes_mut().dec.remove(kterm_core::DecModes::ANSI);
    }

    pub(crate) fn exit_vt52(&mut self) {
        self.parser.set_vt52(false);
        self.screen.modes_mut().dec.insert(kterm_core::DecModes::ANSI);
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn conformance(&self) -> &Conformance {
        &self.conformance
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    pub fn set_debug(&mut self, debug: bool) {
        self.config.debug = debug;
        self.diagnostics.debug = debug;
    }

    pub fn responses(&self) -> &ResponseBuffer {
        &self.responses
    }

    pub fn responses_mut(&mut self) -> &mut ResponseBuffer {
        &mut self.responses
    }

    pub fn graphics(&self) -> &GraphicsState {
        &self.graphics
    }

    pub fn graphics_mut(&mut self) -> &mut GraphicsState {
        &mut self.graphics
    }

    pub fn regis(&self) -> &RegisInterpreter {
        &self.regis
    }

    /// Forget ReGIS position, macros and alphabets
    pub fn reset_regis(&mut self) {
        self.regis = RegisInterpreter::new();
    }

    pub fn soft_font(&self) -> Option<&SoftFont> {
        self.soft_font.as_ref()
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn auto_print(&self) -> bool {
        self.auto_print
    }

    /// Slot recorded for a codepoint
    pub fn glyph_slot(&self, codepoint: u32) -> Option<u32> {
        self.glyphs.get(&codepoint).copied()
    }

    /// Take KTERM gateway commands queued since the last call
    pub fn take_gateway_requests(&mut self) -> Vec<GatewayRequest> {
        std::mem::take(&mut self.gateway_queue)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("index", &self.index)
            .field("level", &self.conformance.level)
            .field("cols", &self.screen.cols())
            .field("rows", &self.screen.rows())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;

    pub(super) fn session(cols: usize, rows: usize) -> Session {
        Session::new(0, SessionConfig::with_size(cols, rows))
    }

    pub(super) fn session_at(level: VtLevel) -> Session {
        Session::new(
            0,
            SessionConfig {
                level,
                ..SessionConfig::with_size(80, 24)
            },
        )
    }

    /// Feed bytes and return the text of everything the session replied
    pub(super) fn feed(session: &mut Session, bytes: &[u8]) -> String {
        let mut host = RecordingHost::new();
        session.process(bytes, &mut host);
        host.response_text(session.index())
    }

    #[test]
    fn test_print_and_text() {
        let mut s = session(10, 3);
        feed(&mut s, b"Hello\r\nWorld");
        assert_eq!(s.screen().row_text(0), "Hello");
        assert_eq!(s.screen().row_text(1), "World");
    }

    #[test]
    fn test_split_sequence_across_calls() {
        let mut s = session(20, 5);
        feed(&mut s, b"\x1b[");
        feed(&mut s, b"3;");
        feed(&mut s, b"4H");
        assert_eq!(s.screen().cursor().row, 2);
        assert_eq!(s.screen().cursor().col, 3);
    }

    #[test]
    fn test_glyph_slots_recorded_for_wide_codepoints() {
        let mut s = session(10, 2);
        let mut host = RecordingHost::new();
        s.process("a中中文".as_bytes(), &mut host);
        assert_eq!(s.glyph_slot('中' as u32), Some(0));
        assert_eq!(s.glyph_slot('文' as u32), Some(1));
        assert_eq!(s.glyph_slot('a' as u32), None);
        let frame = s.render();
        assert_eq!(frame.cell(0, 1).and_then(|c| c.glyph_slot), Some(0));
    }

    #[test]
    fn test_invalid_utf8_counts_decode_error() {
        let mut s = session(10, 2);
        feed(&mut s, b"a\xC3(b");
        assert_eq!(s.diagnostics().decode, 1);
        assert_eq!(s.screen().row_text(0), "a\u{FFFD}(b");
    }

    #[test]
    fn test_overlong_csi_is_malformed_and_stream_recovers() {
        let mut s = session(10, 2);
        let mut bytes = b"\x1b[".to_vec();
        bytes.extend(std::iter::repeat(b'1').take(kterm_parser::MAX_CSI_LEN + 4));
        bytes.extend_from_slice(b"\x1b[2;2HX");
        feed(&mut s, &bytes);
        assert_eq!(s.diagnostics().malformed, 1);
        assert_eq!(s.screen().grid().cell(1, 1).display_char(), 'X');
    }

    #[test]
    fn test_reset_clears_protocol_state() {
        let mut s = session(20, 5);
        feed(&mut s, b"\x1b[?5i\x1b[?1000h");
        assert!(s.auto_print());
        feed(&mut s, b"\x1bc");
        assert!(!s.auto_print());
        assert!(!s.screen().modes().mouse_tracking_enabled());
    }

    #[test]
    fn test_vt52_level_starts_in_vt52_mode() {
        let s = session_at(VtLevel::Vt52);
        assert!(s.parser().is_vt52());
    }
}
