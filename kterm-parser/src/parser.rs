//! Terminal escape sequence parser
//!
//! Implements a state machine parser based on the VT500 series parser model.
//! Reference: https://vt100.net/emu/dec_ansi_parser
//!
//! The parser handles:
//! - C0 and C1 control characters
//! - ESC sequences, including the VT52 compatibility set
//! - CSI (Control Sequence Introducer) sequences
//! - OSC (Operating System Command) sequences
//! - DCS (Device Control String) sequences, with sixel and ReGIS payloads
//!   decoded or collected in place
//! - APC, PM, SOS strings
//! - Tektronix 4014 ground bytes and printer controller passthrough
//!
//! All state lives in the parser, so input may be split at any byte.

use crate::action::{Action, CsiAction, EscAction, OscAction, Vt52Action};
use crate::params::Params;
use crate::sixel::{SixelDecoder, DEFAULT_MAX_STRIPS};
use crate::tektronix::TekParser;
use crate::utf8::{Utf8Decoder, Utf8Result};

/// Maximum length for OSC/DCS/APC/ReGIS data
pub const MAX_STRING_LEN: usize = 65536;
/// Maximum length of collected CSI parameter bytes
pub const MAX_CSI_LEN: usize = 512;
/// Maximum length for intermediate bytes
const MAX_INTERMEDIATES: usize = 4;
/// Printer bytes held before they are handed out
const PRINTER_CHUNK: usize = 4096;

const PRINTER_EXIT_7BIT: &[u8] = b"\x1b[4i";
const PRINTER_EXIT_8BIT: &[u8] = b"\x9b4i";

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Normal text processing
    Ground,
    /// After ESC
    Escape,
    /// Escape intermediate (ESC followed by intermediate byte)
    EscapeIntermediate,
    /// After ESC [
    CsiEntry,
    /// Collecting CSI parameters
    CsiParam,
    /// Collecting CSI intermediate bytes
    CsiIntermediate,
    /// CSI sequence is invalid, consume until final byte
    CsiIgnore,
    /// After ESC ]
    OscString,
    /// After ESC P
    DcsEntry,
    /// Collecting DCS parameters
    DcsParam,
    /// Collecting DCS intermediate bytes
    DcsIntermediate,
    /// DCS passthrough mode
    DcsPassthrough,
    /// DCS sequence is invalid, consume until ST
    DcsIgnore,
    /// After ESC _ (APC)
    ApcString,
    /// After ESC ^ (PM)
    PmString,
    /// After ESC X (SOS)
    SosString,
    /// After ESC in VT52 mode
    Vt52Escape,
    /// After ESC Y, waiting for the row byte
    Vt52Row,
    /// After ESC Y row, waiting for the column byte
    Vt52Col,
    /// Inside a sixel payload
    Sixel,
    /// ESC seen inside a sixel payload
    SixelEscape,
    /// Inside a ReGIS payload
    Regis,
    /// ESC seen inside a ReGIS payload
    RegisEscape,
}

/// The terminal parser
#[derive(Debug, Clone)]
pub struct Parser {
    /// Current state
    state: ParserState,
    /// UTF-8 decoder
    utf8: Utf8Decoder,
    /// Decode input as UTF-8 (otherwise ISO 8859-1)
    utf8_mode: bool,
    /// CSI parameters being collected
    params_buf: Vec<u8>,
    /// CSI intermediate bytes
    intermediates: Vec<u8>,
    /// Whether CSI sequence starts with ?
    private_marker: bool,
    /// The actual marker byte (b'?', b'>', b'<', b'=', or 0 for none)
    marker_byte: u8,
    /// OSC/DCS/APC/PM/SOS/ReGIS string data
    string_data: Vec<u8>,
    /// Tracks multi-byte characters inside strings so 0x9C is not taken for ST
    string_utf8: Utf8Decoder,
    /// A string overflowed and was truncated
    string_truncated: bool,
    /// DCS parameters
    dcs_params: Vec<u8>,
    /// DCS intermediate bytes
    dcs_intermediates: Vec<u8>,
    /// DCS final byte
    dcs_final: u8,
    /// Escape intermediate bytes
    esc_intermediates: Vec<u8>,
    /// Active sixel image
    sixel: Option<SixelDecoder>,
    sixel_max_strips: usize,
    /// VT52 compatibility mode
    vt52: bool,
    vt52_row: u16,
    /// Tektronix 4014 mode
    tektronix: bool,
    tek: TekParser,
    /// Printer controller mode
    printer_controller: bool,
    /// Bytes that may still be the start of the exit sequence
    printer_window: Vec<u8>,
    /// Bytes waiting to be handed to the printer
    printer_out: Vec<u8>,
}

impl Parser {
    /// Create a new parser
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            utf8: Utf8Decoder::new(),
            utf8_mode: true,
            params_buf: Vec::with_capacity(64),
            intermediates: Vec::with_capacity(MAX_INTERMEDIATES),
            private_marker: false,
            marker_byte: 0,
            string_data: Vec::with_capacity(256),
            string_utf8: Utf8Decoder::new(),
            string_truncated: false,
            dcs_params: Vec::with_capacity(64),
            dcs_intermediates: Vec::with_capacity(MAX_INTERMEDIATES),
            dcs_final: 0,
            esc_intermediates: Vec::with_capacity(MAX_INTERMEDIATES),
            sixel: None,
            sixel_max_strips: DEFAULT_MAX_STRIPS,
            vt52: false,
            vt52_row: 0,
            tektronix: false,
            tek: TekParser::new(),
            printer_controller: false,
            printer_window: Vec::with_capacity(PRINTER_EXIT_7BIT.len()),
            printer_out: Vec::new(),
        }
    }

    /// Get current parser state
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Reset parser to ground state
    ///
    /// Sub-modes (VT52, Tektronix, printer controller) and the UTF-8 flag
    /// are left alone; the owner turns those off explicitly.
    pub fn reset(&mut self) {
        self.state = ParserState::Ground;
        self.utf8.reset();
        self.clear_sequence();
        self.sixel = None;
        self.tek.reset();
    }

    fn clear_sequence(&mut self) {
        self.params_buf.clear();
        self.intermediates.clear();
        self.private_marker = false;
        self.marker_byte = 0;
        self.string_data.clear();
        self.string_utf8.reset();
        self.string_truncated = false;
        self.dcs_params.clear();
        self.dcs_intermediates.clear();
        self.dcs_final = 0;
        self.esc_intermediates.clear();
    }

    pub fn set_utf8(&mut self, enabled: bool) {
        self.utf8_mode = enabled;
        self.utf8.reset();
    }

    pub fn is_utf8(&self) -> bool {
        self.utf8_mode
    }

    pub fn set_vt52(&mut self, enabled: bool) {
        self.vt52 = enabled;
        if matches!(
            self.state,
            ParserState::Vt52Escape | ParserState::Vt52Row | ParserState::Vt52Col
        ) {
            self.state = ParserState::Ground;
        }
    }

    pub fn is_vt52(&self) -> bool {
        self.vt52
    }

    pub fn set_tektronix(&mut self, enabled: bool) {
        if enabled && !self.tektronix {
            self.tek.reset();
        }
        self.tektronix = enabled;
    }

    pub fn is_tektronix(&self) -> bool {
        self.tektronix
    }

    /// Tektronix decoder, for resets requested by the host
    pub fn tek_mut(&mut self) -> &mut TekParser {
        &mut self.tek
    }

    /// Enter or leave printer controller mode
    ///
    /// Leaving releases any bytes held for exit-sequence matching; they go
    /// out on the next [`Parser::flush`].
    pub fn set_printer_controller(&mut self, enabled: bool) {
        if !enabled {
            let held = std::mem::take(&mut self.printer_window);
            self.printer_out.extend_from_slice(&held);
        }
        self.printer_controller = enabled;
    }

    pub fn printer_controller(&self) -> bool {
        self.printer_controller
    }

    /// Strip cap for sixel images
    pub fn set_sixel_max_strips(&mut self, max: usize) {
        self.sixel_max_strips = max;
    }

    /// Parse a chunk of bytes, calling the callback for each action
    pub fn parse<F>(&mut self, data: &[u8], mut callback: F)
    where
        F: FnMut(Action),
    {
        for &byte in data {
            self.advance(byte, &mut callback);
        }
        self.flush(&mut callback);
    }

    /// Parse a chunk and collect actions into a vector
    pub fn parse_collect(&mut self, data: &[u8]) -> Vec<Action> {
        let mut actions = Vec::new();
        self.parse(data, |action| actions.push(action));
        actions
    }

    /// Hand out printer bytes buffered by [`Parser::advance`]
    pub fn flush<F>(&mut self, callback: &mut F)
    where
        F: FnMut(Action),
    {
        if !self.printer_out.is_empty() {
            callback(Action::Printer(std::mem::take(&mut self.printer_out)));
        }
    }

    /// Advance the parser by one byte
    ///
    /// Printer bytes are buffered; call [`Parser::flush`] once the caller
    /// is done feeding a batch.
    pub fn advance<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        if self.printer_controller {
            self.printer_byte(byte, callback);
            return;
        }

        match self.state {
            ParserState::OscString
            | ParserState::DcsPassthrough
            | ParserState::DcsIgnore
            | ParserState::ApcString
            | ParserState::PmString
            | ParserState::SosString => {
                self.string_byte(byte, callback);
                return;
            }
            ParserState::Sixel | ParserState::SixelEscape => {
                self.sixel_byte(byte, callback);
                return;
            }
            ParserState::Regis | ParserState::RegisEscape => {
                self.regis_byte(byte, callback);
                return;
            }
            _ => {}
        }

        if self.tektronix
            && self.state == ParserState::Ground
            && !matches!(byte, 0x1B | 0x18 | 0x1A | 0x07)
        {
            if let Some(event) = self.tek.feed(byte) {
                callback(Action::Tek(event));
            }
            return;
        }

        // C0 controls (0x00-0x1F) - always execute except in string states
        if byte < 0x20 {
            if self.utf8.is_pending() {
                self.utf8.reset();
                callback(Action::Print(Utf8Decoder::replacement_char()));
            }
            match byte {
                0x1B => self.enter_escape(),
                0x18 | 0x1A => self.abort(),
                0x05 | 0x07..=0x0F => callback(Action::Control(byte)),
                _ => {}
            }
            return;
        }

        // C1 controls (0x80-0x9F) - 8-bit equivalents
        // But only if we're not in the middle of a UTF-8 sequence
        if (0x80..=0x9F).contains(&byte) && !self.utf8.is_pending() && !self.vt52 {
            self.c1_control(byte, callback);
            return;
        }

        match self.state {
            ParserState::Ground => self.handle_ground(byte, callback),
            ParserState::Escape => self.handle_escape(byte, callback),
            ParserState::EscapeIntermediate => self.handle_escape_intermediate(byte, callback),
            ParserState::CsiEntry => self.handle_csi_entry(byte, callback),
            ParserState::CsiParam => self.handle_csi_param(byte, callback),
            ParserState::CsiIntermediate => self.handle_csi_intermediate(byte, callback),
            ParserState::CsiIgnore => self.handle_csi_ignore(byte),
            ParserState::DcsEntry => self.handle_dcs_entry(byte),
            ParserState::DcsParam => self.handle_dcs_param(byte),
            ParserState::DcsIntermediate => self.handle_dcs_intermediate(byte),
            ParserState::Vt52Escape => self.handle_vt52_escape(byte, callback),
            ParserState::Vt52Row => {
                self.vt52_row = byte.saturating_sub(0x20) as u16;
                self.state = ParserState::Vt52Col;
            }
            ParserState::Vt52Col => {
                callback(Action::Vt52(Vt52Action::CursorAddress {
                    row: self.vt52_row,
                    col: byte.saturating_sub(0x20) as u16,
                }));
                self.state = ParserState::Ground;
            }
            // string and graphics states handled above
            ParserState::OscString
            | ParserState::DcsPassthrough
            | ParserState::DcsIgnore
            | ParserState::ApcString
            | ParserState::PmString
            | ParserState::SosString
            | ParserState::Sixel
            | ParserState::SixelEscape
            | ParserState::Regis
            | ParserState::RegisEscape => {}
        }
    }

    /// CAN / SUB: drop whatever sequence is in progress
    fn abort(&mut self) {
        if self.state != ParserState::Ground {
            log::debug!("sequence aborted in {:?}", self.state);
        }
        self.state = ParserState::Ground;
        self.sixel = None;
        self.clear_sequence();
    }

    fn c1_control<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            0x84 => self.esc_to_ground(EscAction::Index, callback),
            0x85 => self.esc_to_ground(EscAction::NextLine, callback),
            0x88 => self.esc_to_ground(EscAction::HorizontalTabSet, callback),
            0x8D => self.esc_to_ground(EscAction::ReverseIndex, callback),
            0x8E => self.esc_to_ground(EscAction::SingleShift2, callback),
            0x8F => self.esc_to_ground(EscAction::SingleShift3, callback),
            0x90 => self.enter_dcs(),
            0x98 => self.enter_string(ParserState::SosString),
            0x9B => self.enter_csi(),
            0x9C => self.state = ParserState::Ground,
            0x9D => self.enter_string(ParserState::OscString),
            0x9E => self.enter_string(ParserState::PmString),
            0x9F => self.enter_string(ParserState::ApcString),
            _ => log::trace!("ignoring C1 control {:#04x}", byte),
        }
    }

    fn esc_to_ground<F>(&mut self, action: EscAction, callback: &mut F)
    where
        F: FnMut(Action),
    {
        callback(Action::Esc(action));
        self.state = ParserState::Ground;
    }

    fn handle_ground<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        if (0x20..0x7F).contains(&byte) && !self.utf8.is_pending() {
            callback(Action::Print(byte as char));
            return;
        }
        if byte == 0x7F {
            return;
        }
        if !self.utf8_mode {
            if byte >= 0xA0 {
                callback(Action::Print(char::from(byte)));
            }
            return;
        }
        match self.utf8.feed(byte) {
            Utf8Result::Char(c) => callback(Action::Print(c)),
            Utf8Result::Invalid => callback(Action::Print(Utf8Decoder::replacement_char())),
            Utf8Result::InvalidReprocess(b) => {
                callback(Action::Print(Utf8Decoder::replacement_char()));
                self.advance(b, callback);
            }
            Utf8Result::Pending => {}
        }
    }

    fn enter_escape(&mut self) {
        self.state = if self.vt52 {
            ParserState::Vt52Escape
        } else {
            ParserState::Escape
        };
        self.esc_intermediates.clear();
    }

    fn handle_escape<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        let action = match byte {
            b'[' => return self.enter_csi(),
            b']' => return self.enter_string(ParserState::OscString),
            b'P' => return self.enter_dcs(),
            b'_' => return self.enter_string(ParserState::ApcString),
            b'^' => return self.enter_string(ParserState::PmString),
            b'X' => return self.enter_string(ParserState::SosString),
            b'\\' => {
                // ST (String Terminator) - ignore if not in string
                self.state = ParserState::Ground;
                return;
            }
            0x20..=0x2F => {
                self.esc_intermediates.push(byte);
                self.state = ParserState::EscapeIntermediate;
                return;
            }
            0x7F => return,
            b'7' => EscAction::SaveCursor,
            b'8' => EscAction::RestoreCursor,
            b'D' => EscAction::Index,
            b'M' => EscAction::ReverseIndex,
            b'E' => EscAction::NextLine,
            b'H' => EscAction::HorizontalTabSet,
            b'c' => EscAction::FullReset,
            b'=' => EscAction::ApplicationKeypad,
            b'>' => EscAction::NormalKeypad,
            b'N' => EscAction::SingleShift2,
            b'O' => EscAction::SingleShift3,
            b'n' => EscAction::LockingShift2,
            b'o' => EscAction::LockingShift3,
            b'~' => EscAction::LockingShift1Right,
            b'}' => EscAction::LockingShift2Right,
            b'|' => EscAction::LockingShift3Right,
            b'6' => EscAction::BackIndex,
            b'9' => EscAction::ForwardIndex,
            b'Z' => EscAction::Identify,
            0x30..=0x7E => EscAction::Unknown(vec![byte]),
            _ => {
                self.state = ParserState::Ground;
                return;
            }
        };
        self.esc_to_ground(action, callback);
    }

    fn handle_escape_intermediate<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            0x20..=0x2F => {
                if self.esc_intermediates.len() < MAX_INTERMEDIATES {
                    self.esc_intermediates.push(byte);
                }
            }
            0x30..=0x7E => {
                self.dispatch_esc(byte, callback);
                self.state = ParserState::Ground;
            }
            0x7F => {}
            _ => self.state = ParserState::Ground,
        }
    }

    fn dispatch_esc<F>(&mut self, final_byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        let is_slot = |b: u8| matches!(b, b'(' | b')' | b'*' | b'+' | b'-' | b'.' | b'/');
        let action = match (self.esc_intermediates.as_slice(), final_byte) {
            (&[slot], f) if is_slot(slot) => EscAction::Designate {
                slot,
                extra: None,
                final_byte: f,
            },
            (&[slot, extra], f) if is_slot(slot) => EscAction::Designate {
                slot,
                extra: Some(extra),
                final_byte: f,
            },
            ([b'#'], b'3') => EscAction::DoubleHeightTop,
            ([b'#'], b'4') => EscAction::DoubleHeightBottom,
            ([b'#'], b'5') => EscAction::SingleWidth,
            ([b'#'], b'6') => EscAction::DoubleWidth,
            ([b'#'], b'8') => EscAction::DecAlignmentTest,
            ([b'%'], b'G') => EscAction::Utf8On,
            ([b'%'], b'@') => EscAction::Utf8Off,
            ([b' '], b'F') => EscAction::Select7Bit,
            ([b' '], b'G') => EscAction::Select8Bit,
            _ => {
                let mut data = self.esc_intermediates.clone();
                data.push(final_byte);
                EscAction::Unknown(data)
            }
        };
        callback(Action::Esc(action));
    }

    fn handle_vt52_escape<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        let action = match byte {
            b'A' => Vt52Action::CursorUp,
            b'B' => Vt52Action::CursorDown,
            b'C' => Vt52Action::CursorRight,
            b'D' => Vt52Action::CursorLeft,
            b'F' => Vt52Action::GraphicsOn,
            b'G' => Vt52Action::GraphicsOff,
            b'H' => Vt52Action::Home,
            b'I' => Vt52Action::ReverseLineFeed,
            b'J' => Vt52Action::EraseToEndOfScreen,
            b'K' => Vt52Action::EraseToEndOfLine,
            b'Y' => {
                self.state = ParserState::Vt52Row;
                return;
            }
            b'Z' => Vt52Action::Identify,
            b'=' => Vt52Action::KeypadApplication,
            b'>' => Vt52Action::KeypadNumeric,
            b'<' => {
                self.vt52 = false;
                Vt52Action::ExitVt52
            }
            _ => {
                log::debug!("unknown VT52 sequence ESC {:?}", byte as char);
                self.state = ParserState::Ground;
                return;
            }
        };
        callback(Action::Vt52(action));
        self.state = ParserState::Ground;
    }

    fn enter_csi(&mut self) {
        self.state = ParserState::CsiEntry;
        self.params_buf.clear();
        self.intermediates.clear();
        self.private_marker = false;
        self.marker_byte = 0;
    }

    /// Collect a parameter byte; overflowing the buffer abandons the sequence
    fn push_param<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        if self.params_buf.len() >= MAX_CSI_LEN {
            log::warn!("CSI parameters exceed {} bytes, sequence dropped", MAX_CSI_LEN);
            callback(Action::Invalid(std::mem::take(&mut self.params_buf)));
            self.state = ParserState::Ground;
            return;
        }
        self.params_buf.push(byte);
        self.state = ParserState::CsiParam;
    }

    fn handle_csi_entry<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            b'?' | b'>' | b'<' | b'=' => {
                self.private_marker = byte == b'?';
                self.marker_byte = byte;
                self.state = ParserState::CsiParam;
            }
            b'0'..=b'9' | b';' | b':' => self.push_param(byte, callback),
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => {
                self.dispatch_csi(byte, callback);
                self.state = ParserState::Ground;
            }
            0x7F => {}
            _ => self.state = ParserState::CsiIgnore,
        }
    }

    fn handle_csi_param<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            b'0'..=b'9' | b';' | b':' => self.push_param(byte, callback),
            0x20..=0x2F => {
                self.intermediates.push(byte);
                self.state = ParserState::CsiIntermediate;
            }
            0x40..=0x7E => {
                self.dispatch_csi(byte, callback);
                self.state = ParserState::Ground;
            }
            0x7F => {}
            // private marker in wrong position - ignore sequence
            _ => self.state = ParserState::CsiIgnore,
        }
    }

    fn handle_csi_intermediate<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            0x20..=0x2F => {
                if self.intermediates.len() < MAX_INTERMEDIATES {
                    self.intermediates.push(byte);
                } else {
                    self.state = ParserState::CsiIgnore;
                }
            }
            0x40..=0x7E => {
                self.dispatch_csi(byte, callback);
                self.state = ParserState::Ground;
            }
            0x7F => {}
            _ => self.state = ParserState::CsiIgnore,
        }
    }

    fn handle_csi_ignore(&mut self, byte: u8) {
        if (0x40..=0x7E).contains(&byte) {
            self.state = ParserState::Ground;
        }
    }

    fn dispatch_csi<F>(&mut self, final_byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        let action = CsiAction {
            params: Params::parse(&self.params_buf),
            intermediates: self.intermediates.clone(),
            final_byte,
            private: self.private_marker,
            marker: self.marker_byte,
        };
        self.params_buf.clear();
        callback(Action::Csi(action));
    }

    fn enter_string(&mut self, state: ParserState) {
        self.state = state;
        self.string_data.clear();
        self.string_utf8.reset();
        self.string_truncated = false;
    }

    fn enter_dcs(&mut self) {
        self.enter_string(ParserState::DcsEntry);
        self.dcs_params.clear();
        self.dcs_intermediates.clear();
        self.dcs_final = 0;
    }

    fn push_dcs_param(&mut self, byte: u8) {
        if self.dcs_params.len() >= MAX_CSI_LEN {
            log::warn!("DCS parameters exceed {} bytes, string ignored", MAX_CSI_LEN);
            self.state = ParserState::DcsIgnore;
            return;
        }
        self.dcs_params.push(byte);
        self.state = ParserState::DcsParam;
    }

    fn handle_dcs_entry(&mut self, byte: u8) {
        match byte {
            b'0'..=b'9' | b';' | b':' => self.push_dcs_param(byte),
            // private markers are accepted and dropped
            b'<'..=b'?' => self.state = ParserState::DcsParam,
            0x20..=0x2F => {
                self.dcs_intermediates.push(byte);
                self.state = ParserState::DcsIntermediate;
            }
            0x40..=0x7E => self.dcs_hook(byte),
            0x7F => {}
            _ => self.state = ParserState::DcsIgnore,
        }
    }

    fn handle_dcs_param(&mut self, byte: u8) {
        match byte {
            b'0'..=b'9' | b';' | b':' => self.push_dcs_param(byte),
            0x20..=0x2F => {
                self.dcs_intermediates.push(byte);
                self.state = ParserState::DcsIntermediate;
            }
            0x40..=0x7E => self.dcs_hook(byte),
            0x7F => {}
            _ => self.state = ParserState::DcsIgnore,
        }
    }

    fn handle_dcs_intermediate(&mut self, byte: u8) {
        match byte {
            0x20..=0x2F => {
                if self.dcs_intermediates.len() < MAX_INTERMEDIATES {
                    self.dcs_intermediates.push(byte);
                } else {
                    self.state = ParserState::DcsIgnore;
                }
            }
            0x40..=0x7E => self.dcs_hook(byte),
            0x7F => {}
            _ => self.state = ParserState::DcsIgnore,
        }
    }

    /// Final byte of a DCS header: pick the payload handler
    fn dcs_hook(&mut self, final_byte: u8) {
        self.dcs_final = final_byte;
        match (final_byte, self.dcs_intermediates.is_empty()) {
            (b'q', true) => {
                let params = Params::parse(&self.dcs_params);
                self.sixel = Some(SixelDecoder::with_limit(
                    params.as_slice(),
                    self.sixel_max_strips,
                ));
                self.state = ParserState::Sixel;
            }
            (b'p', true) => {
                self.string_data.clear();
                self.state = ParserState::Regis;
            }
            _ => self.state = ParserState::DcsPassthrough,
        }
    }

    fn sixel_byte<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match (self.state, byte) {
            (_, 0x18 | 0x1A) => self.abort(),
            (_, 0x9C) | (ParserState::SixelEscape, b'\\') => self.finish_sixel(callback),
            (_, 0x1B) => self.state = ParserState::SixelEscape,
            _ => {
                if let Some(decoder) = self.sixel.as_mut() {
                    decoder.feed(byte);
                }
                self.state = ParserState::Sixel;
            }
        }
    }

    fn finish_sixel<F>(&mut self, callback: &mut F)
    where
        F: FnMut(Action),
    {
        self.state = ParserState::Ground;
        if let Some(decoder) = self.sixel.take() {
            if let Some(err) = decoder.error() {
                log::warn!("{}", err);
            }
            callback(Action::Sixel(decoder.finish()));
        }
    }

    fn regis_byte<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match (self.state, byte) {
            (_, 0x18 | 0x1A) => self.abort(),
            (_, 0x9C) | (ParserState::RegisEscape, b'\\') => {
                self.state = ParserState::Ground;
                callback(Action::Regis(std::mem::take(&mut self.string_data)));
            }
            (_, 0x1B) => self.state = ParserState::RegisEscape,
            _ => {
                self.collect_string_byte(byte);
                self.state = ParserState::Regis;
            }
        }
    }

    fn string_byte<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        match byte {
            // ESC - likely the start of ST; the string ends either way
            0x1B => self.finish_string(ParserState::Escape, callback),
            // BEL terminates OSC (xterm extension)
            0x07 if self.state == ParserState::OscString => {
                self.finish_string(ParserState::Ground, callback)
            }
            0x9C if !(self.utf8_mode && self.string_utf8.is_pending()) => {
                self.finish_string(ParserState::Ground, callback)
            }
            0x18 | 0x1A => self.abort(),
            _ => self.collect_string_byte(byte),
        }
    }

    fn collect_string_byte(&mut self, byte: u8) {
        if self.utf8_mode {
            if let Utf8Result::InvalidReprocess(b) = self.string_utf8.feed(byte) {
                self.string_utf8.feed(b);
            }
        }
        if self.string_data.len() < MAX_STRING_LEN {
            self.string_data.push(byte);
        } else if !self.string_truncated {
            self.string_truncated = true;
            log::warn!("string exceeds {} bytes in {:?}, truncated", MAX_STRING_LEN, self.state);
        }
    }

    fn finish_string<F>(&mut self, next: ParserState, callback: &mut F)
    where
        F: FnMut(Action),
    {
        let data = std::mem::take(&mut self.string_data);
        match self.state {
            ParserState::OscString => callback(Action::Osc(OscAction::parse(&data))),
            ParserState::DcsPassthrough => callback(Action::Dcs {
                params: Params::parse(&self.dcs_params),
                intermediates: self.dcs_intermediates.clone(),
                final_byte: self.dcs_final,
                data,
            }),
            ParserState::ApcString => callback(Action::Apc(data)),
            ParserState::PmString => callback(Action::Pm(data)),
            ParserState::SosString => callback(Action::Sos(data)),
            _ => {}
        }
        // Escape rather than Ground so the '\' of ESC \ completes the ST
        self.state = next;
        self.esc_intermediates.clear();
        self.string_utf8.reset();
        self.string_truncated = false;
    }

    fn printer_byte<F>(&mut self, byte: u8, callback: &mut F)
    where
        F: FnMut(Action),
    {
        self.printer_window.push(byte);
        loop {
            let window = self.printer_window.as_slice();
            if window == PRINTER_EXIT_7BIT || window == PRINTER_EXIT_8BIT {
                self.printer_window.clear();
                self.printer_controller = false;
                log::debug!("printer controller mode off");
                self.flush(callback);
                return;
            }
            if window.is_empty()
                || PRINTER_EXIT_7BIT.starts_with(window)
                || PRINTER_EXIT_8BIT.starts_with(window)
            {
                break;
            }
            let oldest = self.printer_window.remove(0);
            self.printer_out.push(oldest);
        }
        if self.printer_out.len() >= PRINTER_CHUNK {
            self.flush(callback);
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tektronix::TekEvent;

    #[test]
    fn test_parser_print() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"Hello");

        assert_eq!(actions.len(), 5);
        assert_eq!(actions[0], Action::Print('H'));
        assert_eq!(actions[4], Action::Print('o'));
    }

    #[test]
    fn test_parser_control() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x05\x07\x08\x09\x0A\x0D\x0E\x0F");

        assert_eq!(
            actions,
            [0x05, 0x07, 0x08, 0x09, 0x0A, 0x0D, 0x0E, 0x0F]
                .into_iter()
                .map(Action::Control)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_parser_csi_cursor() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1b[10;20H");

        assert_eq!(actions.len(), 1);
        if let Action::Csi(csi) = &actions[0] {
            assert_eq!(csi.final_byte, b'H');
            assert_eq!(csi.param(0, 1), 10);
            assert_eq!(csi.param(1, 1), 20);
            assert!(!csi.private);
        } else {
            panic!("Expected CSI action");
        }
    }

    #[test]
    fn test_parser_csi_private() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1b[?25h");

        assert_eq!(actions.len(), 1);
        if let Action::Csi(csi) = &actions[0] {
            assert_eq!(csi.final_byte, b'h');
            assert_eq!(csi.param(0, 0), 25);
            assert!(csi.private);
        } else {
            panic!("Expected CSI action");
        }
    }

    #[test]
    fn test_parser_csi_sgr() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1b[1;31;42m");

        assert_eq!(actions.len(), 1);
        if let Action::Csi(csi) = &actions[0] {
            assert_eq!(csi.final_byte, b'm');
            assert_eq!(csi.params.len(), 3);
            assert_eq!(csi.param(0, 0), 1);
            assert_eq!(csi.param(1, 0), 31);
            assert_eq!(csi.param(2, 0), 42);
        } else {
            panic!("Expected CSI action");
        }
    }

    #[test]
    fn test_parser_csi_intermediate() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1b[2 q\x1b[1;1;5;5$z");

        assert_eq!(actions.len(), 2);
        match (&actions[0], &actions[1]) {
            (Action::Csi(a), Action::Csi(b)) => {
                assert!(a.with_intermediate(b' ', b'q'));
                assert_eq!(a.param(0, 0), 2);
                assert!(b.with_intermediate(b'$', b'z'));
                assert_eq!(b.params.len(), 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_csi_overflow_returns_to_ground() {
        let mut parser = Parser::new();
        let mut input = b"\x1b[".to_vec();
        input.extend(std::iter::repeat(b'1').take(MAX_CSI_LEN + 1));
        input.extend_from_slice(b"\x1b[2JA");
        let actions = parser.parse_collect(&input);

        assert!(matches!(&actions[0], Action::Invalid(buf) if buf.len() == MAX_CSI_LEN));
        assert!(matches!(&actions[1], Action::Csi(csi) if csi.is(b'J') && csi.param(0, 0) == 2));
        assert_eq!(actions[2], Action::Print('A'));
        assert_eq!(parser.state(), ParserState::Ground);
    }

    #[test]
    fn test_control_inside_csi_executes() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1b[1\x0d;2H");
        assert_eq!(actions[0], Action::Control(0x0D));
        assert!(matches!(&actions[1], Action::Csi(csi) if csi.param(1, 0) == 2));
    }

    #[test]
    fn test_can_aborts_sequences() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1b[12\x18X\x1b]0;title\x1aY");
        assert_eq!(actions, vec![Action::Print('X'), Action::Print('Y')]);
    }

    #[test]
    fn test_parser_esc_save_restore() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1b7\x1b8");

        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], Action::Esc(EscAction::SaveCursor));
        assert_eq!(actions[1], Action::Esc(EscAction::RestoreCursor));
    }

    #[test]
    fn test_parser_esc_index() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1bD\x1bM\x1bE\x1b6\x1b9");

        assert_eq!(
            actions,
            vec![
                Action::Esc(EscAction::Index),
                Action::Esc(EscAction::ReverseIndex),
                Action::Esc(EscAction::NextLine),
                Action::Esc(EscAction::BackIndex),
                Action::Esc(EscAction::ForwardIndex),
            ]
        );
    }

    #[test]
    fn test_parser_esc_shifts_and_line_size() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1bN\x1bn\x1b}\x1b#3\x1b#6\x1b%G\x1b G");
        assert_eq!(
            actions,
            vec![
                Action::Esc(EscAction::SingleShift2),
                Action::Esc(EscAction::LockingShift2),
                Action::Esc(EscAction::LockingShift2Right),
                Action::Esc(EscAction::DoubleHeightTop),
                Action::Esc(EscAction::DoubleWidth),
                Action::Esc(EscAction::Utf8On),
                Action::Esc(EscAction::Select8Bit),
            ]
        );
    }

    #[test]
    fn test_parser_designate_charset() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1b(B\x1b)0\x1b-A\x1b(%5");

        assert_eq!(
            actions,
            vec![
                Action::Esc(EscAction::Designate {
                    slot: b'(',
                    extra: None,
                    final_byte: b'B'
                }),
                Action::Esc(EscAction::Designate {
                    slot: b')',
                    extra: None,
                    final_byte: b'0'
                }),
                Action::Esc(EscAction::Designate {
                    slot: b'-',
                    extra: None,
                    final_byte: b'A'
                }),
                Action::Esc(EscAction::Designate {
                    slot: b'(',
                    extra: Some(b'%'),
                    final_byte: b'5'
                }),
            ]
        );
    }

    #[test]
    fn test_parser_osc_title() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1b]0;My Title\x07");

        assert_eq!(
            actions,
            vec![Action::Osc(OscAction::SetIconAndTitle("My Title".to_string()))]
        );
    }

    #[test]
    fn test_osc_with_st_does_not_print_backslash() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1b]2;t\x1b\\A");
        assert_eq!(
            actions,
            vec![
                Action::Osc(OscAction::SetTitle("t".to_string())),
                Action::Print('A')
            ]
        );
    }

    #[test]
    fn test_osc_utf8_title_with_9c_continuation() {
        // U+2713 is E2 9C 93; the 0x9C must not end the string
        let mut parser = Parser::new();
        let mut input = b"\x1b]2;".to_vec();
        input.extend_from_slice("✓ok".as_bytes());
        input.push(0x9C);
        let actions = parser.parse_collect(&input);
        assert_eq!(
            actions,
            vec![Action::Osc(OscAction::SetTitle("✓ok".to_string()))]
        );
    }

    #[test]
    fn test_long_string_truncated_but_dispatched() {
        let mut parser = Parser::new();
        let mut input = b"\x1b]2;".to_vec();
        input.extend(std::iter::repeat(b'x').take(MAX_STRING_LEN + 100));
        input.push(0x07);
        let actions = parser.parse_collect(&input);
        match &actions[..] {
            [Action::Osc(OscAction::SetTitle(title))] => {
                assert_eq!(title.len(), MAX_STRING_LEN - 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_c1_controls() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x9b5n\x84\x9d2;x\x9c");
        assert!(matches!(&actions[0], Action::Csi(csi) if csi.is(b'n') && csi.param(0, 0) == 5));
        assert_eq!(actions[1], Action::Esc(EscAction::Index));
        assert_eq!(actions[2], Action::Osc(OscAction::SetTitle("x".to_string())));
    }

    #[test]
    fn test_latin1_when_utf8_off() {
        let mut parser = Parser::new();
        parser.set_utf8(false);
        let actions = parser.parse_collect(&[0xE9, b'a']);
        assert_eq!(actions, vec![Action::Print('é'), Action::Print('a')]);
    }

    #[test]
    fn test_parser_utf8() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect("Hello 世界 🎉".as_bytes());

        let chars: Vec<char> = actions
            .iter()
            .filter_map(|a| match a {
                Action::Print(c) => Some(*c),
                _ => None,
            })
            .collect();

        assert_eq!(
            chars,
            vec!['H', 'e', 'l', 'l', 'o', ' ', '世', '界', ' ', '🎉']
        );
    }

    #[test]
    fn test_utf8_resync_on_broken_sequence() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(&[0xE4, b'A', 0xC3, 0xA9]);
        assert_eq!(
            actions,
            vec![Action::Print('\u{FFFD}'), Action::Print('A'), Action::Print('é')]
        );

        // a control byte also breaks the sequence and still executes
        let actions = parser.parse_collect(&[0xE4, 0xB8, 0x0A]);
        assert_eq!(actions, vec![Action::Print('\u{FFFD}'), Action::Control(0x0A)]);
    }

    #[test]
    fn test_parser_streaming() {
        // Test that parsing works correctly across chunk boundaries
        let mut parser = Parser::new();

        let actions1 = parser.parse_collect(b"\x1b[10");
        assert!(actions1.is_empty());

        let actions2 = parser.parse_collect(b";20H");
        assert_eq!(actions2.len(), 1);
        if let Action::Csi(csi) = &actions2[0] {
            assert_eq!(csi.param(0, 1), 10);
            assert_eq!(csi.param(1, 1), 20);
        }
    }

    #[test]
    fn test_parser_streaming_utf8() {
        let mut parser = Parser::new();

        // '中' = 0xE4 0xB8 0xAD
        assert!(parser.parse_collect(&[0xE4]).is_empty());
        assert!(parser.parse_collect(&[0xB8]).is_empty());
        assert_eq!(parser.parse_collect(&[0xAD]), vec![Action::Print('中')]);
    }

    #[test]
    fn test_dcs_passthrough() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1bP$qm\x1b\\");
        assert_eq!(
            actions,
            vec![Action::Dcs {
                params: Params::new(),
                intermediates: vec![b'$'],
                final_byte: b'q',
                data: b"m".to_vec(),
            }]
        );
    }

    #[test]
    fn test_dcs_sixel_decoded() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1bPq#0;2;100;0;0!3~\x1b\\B");
        assert_eq!(actions.len(), 2);
        match &actions[0] {
            Action::Sixel(image) => {
                assert_eq!(image.strips.len(), 3);
                assert_eq!(image.width, 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(actions[1], Action::Print('B'));
    }

    #[test]
    fn test_dcs_regis_collected() {
        let mut parser = Parser::new();
        let actions = parser.parse_collect(b"\x1bP0pP[0,0]V[100,0]\x1b\\");
        assert_eq!(actions, vec![Action::Regis(b"P[0,0]V[100,0]".to_vec())]);
    }

    #[test]
    fn test_vt52_sequences() {
        let mut parser = Parser::new();
        parser.set_vt52(true);
        let actions = parser.parse_collect(b"\x1bA\x1bY\x25\x30x\x1b<\x1b[1m");
        assert_eq!(actions[0], Action::Vt52(Vt52Action::CursorUp));
        assert_eq!(
            actions[1],
            Action::Vt52(Vt52Action::CursorAddress { row: 5, col: 16 })
        );
        assert_eq!(actions[2], Action::Print('x'));
        assert_eq!(actions[3], Action::Vt52(Vt52Action::ExitVt52));
        assert!(!parser.is_vt52());
        assert!(matches!(&actions[4], Action::Csi(csi) if csi.is(b'm')));
    }

    #[test]
    fn test_printer_controller_passthrough() {
        let mut parser = Parser::new();
        parser.set_printer_controller(true);
        let actions = parser.parse_collect(b"ab\x1b[3xy\x1b[4iZ");
        assert_eq!(
            actions,
            vec![Action::Printer(b"ab\x1b[3xy".to_vec()), Action::Print('Z')]
        );
        assert!(!parser.printer_controller());
    }

    #[test]
    fn test_printer_controller_8bit_exit() {
        let mut parser = Parser::new();
        parser.set_printer_controller(true);
        let actions = parser.parse_collect(b"q\x9b4i");
        assert_eq!(actions, vec![Action::Printer(b"q".to_vec())]);
    }

    #[test]
    fn test_tektronix_ground_bytes() {
        let mut parser = Parser::new();
        parser.set_tektronix(true);
        let actions = parser.parse_collect(b"\x1fA\x1b[?38l");
        assert!(matches!(actions[0], Action::Tek(TekEvent::Text { ch: 'A', .. })));
        assert!(matches!(&actions[1], Action::Csi(csi) if csi.is_private(b'l')));
    }

    #[test]
    fn test_parser_reset() {
        let mut parser = Parser::new();

        parser.parse_collect(b"\x1b[10");
        assert_eq!(parser.state(), ParserState::CsiParam);

        parser.reset();
        assert_eq!(parser.state(), ParserState::Ground);

        let actions = parser.parse_collect(b"A");
        assert_eq!(actions[0], Action::Print('A'));
    }
}
