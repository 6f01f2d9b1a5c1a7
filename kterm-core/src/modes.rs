//! Terminal mode flags
//!
//! DEC private modes (DECSET/DECRST) and ANSI modes (SM/RM) are kept as two
//! flag sets. Mouse tracking is collapsed into a single enum since the
//! tracking modes are mutually exclusive.
//!
//! This is pure state; side effects of switching a mode (screen swap,
//! column change, VT52 entry) are applied by the session.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// DEC private mode flags (`CSI ? Pm h` / `CSI ? Pm l`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct DecModes: u64 {
        /// DECCKM (1): application cursor keys
        const CURSOR_KEYS_APPLICATION = 1 << 0;
        /// DECANM (2): ANSI mode; cleared means VT52
        const ANSI = 1 << 1;
        /// DECCOLM (3): 132 columns
        const COLUMN_132 = 1 << 2;
        /// DECSCLM (4): smooth scroll
        const SMOOTH_SCROLL = 1 << 3;
        /// DECSCNM (5): reverse video screen
        const REVERSE_VIDEO = 1 << 4;
        /// DECOM (6): origin mode
        const ORIGIN = 1 << 5;
        /// DECAWM (7): auto-wrap
        const AUTOWRAP = 1 << 6;
        /// DECARM (8): auto-repeat
        const AUTO_REPEAT = 1 << 7;
        /// 12: cursor blink
        const CURSOR_BLINK = 1 << 8;
        /// DECPFF (18): print form feed
        const PRINT_FORM_FEED = 1 << 9;
        /// DECPEX (19): print extent is full screen
        const PRINT_EXTENT = 1 << 10;
        /// DECTCEM (25): cursor visible
        const CURSOR_VISIBLE = 1 << 11;
        /// 38: Tektronix 4014 mode
        const TEKTRONIX = 1 << 12;
        /// 40: allow 80/132 switching
        const ALLOW_132 = 1 << 13;
        /// 45: reverse wraparound
        const REVERSE_WRAP = 1 << 14;
        /// DECNKM (66): application keypad
        const APPLICATION_KEYPAD = 1 << 15;
        /// DECBKM (67): backarrow sends BS
        const BACKARROW_BS = 1 << 16;
        /// DECLRMM (69): left/right margins enabled
        const LEFT_RIGHT_MARGIN = 1 << 17;
        /// DECNCSM (95): no clear on column change
        const NO_CLEAR_ON_COLUMN = 1 << 18;
        /// 1004: focus events
        const FOCUS_EVENTS = 1 << 19;
        /// 1007: alternate scroll
        const ALTERNATE_SCROLL = 1 << 20;
        /// 47 / 1047 / 1049: alternate screen buffer active
        const ALT_SCREEN = 1 << 21;
        /// 2004: bracketed paste
        const BRACKETED_PASTE = 1 << 22;
        /// 2026: synchronized output
        const SYNC_OUTPUT = 1 << 23;
    }
}

bitflags! {
    /// ANSI mode flags (`CSI Pm h` / `CSI Pm l`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct AnsiModes: u8 {
        /// KAM (2): keyboard locked
        const KEYBOARD_LOCK = 1 << 0;
        /// IRM (4): insert mode
        const INSERT = 1 << 1;
        /// BDSM (8): bidirectional support; enables RTL run reversal
        const BIDI = 1 << 2;
        /// SRM (12): send/receive; set means local echo off
        const SEND_RECEIVE = 1 << 3;
        /// LNM (20): linefeed implies carriage return
        const LINEFEED_NEWLINE = 1 << 4;
    }
}

/// Mouse tracking protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MouseMode {
    #[default]
    Off,
    /// 9: press only
    X10,
    /// 1000: press and release
    Vt200,
    /// 1001: highlight tracking
    Highlight,
    /// 1002: motion while a button is held
    ButtonEvent,
    /// 1003: all motion
    AnyEvent,
}

/// Mouse report coordinate encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MouseEncoding {
    #[default]
    Default,
    /// 1005
    Utf8,
    /// 1006
    Sgr,
    /// 1015
    Urxvt,
    /// 1016
    SgrPixels,
}

/// DECRQM status values (`CSI ? Ps ; Pm $ y`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeStatus {
    NotRecognized = 0,
    Set = 1,
    Reset = 2,
    PermanentlySet = 3,
    PermanentlyReset = 4,
}

/// Terminal mode flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modes {
    pub dec: DecModes,
    pub ansi: AnsiModes,
    pub mouse: MouseMode,
    pub mouse_encoding: MouseEncoding,
}

fn dec_flag(mode: u16) -> Option<DecModes> {
    let flag = match mode {
        1 => DecModes::CURSOR_KEYS_APPLICATION,
        2 => DecModes::ANSI,
        3 => DecModes::COLUMN_132,
        4 => DecModes::SMOOTH_SCROLL,
        5 => DecModes::REVERSE_VIDEO,
        6 => DecModes::ORIGIN,
        7 => DecModes::AUTOWRAP,
        8 => DecModes::AUTO_REPEAT,
        12 => DecModes::CURSOR_BLINK,
        18 => DecModes::PRINT_FORM_FEED,
        19 => DecModes::PRINT_EXTENT,
        25 => DecModes::CURSOR_VISIBLE,
        38 => DecModes::TEKTRONIX,
        40 => DecModes::ALLOW_132,
        45 => DecModes::REVERSE_WRAP,
        66 => DecModes::APPLICATION_KEYPAD,
        67 => DecModes::BACKARROW_BS,
        69 => DecModes::LEFT_RIGHT_MARGIN,
        95 => DecModes::NO_CLEAR_ON_COLUMN,
        1004 => DecModes::FOCUS_EVENTS,
        1007 => DecModes::ALTERNATE_SCROLL,
        47 | 1047 | 1049 => DecModes::ALT_SCREEN,
        2004 => DecModes::BRACKETED_PASTE,
        2026 => DecModes::SYNC_OUTPUT,
        _ => return None,
    };
    Some(flag)
}

fn ansi_flag(mode: u16) -> Option<AnsiModes> {
    let flag = match mode {
        2 => AnsiModes::KEYBOARD_LOCK,
        4 => AnsiModes::INSERT,
        8 => AnsiModes::BIDI,
        12 => AnsiModes::SEND_RECEIVE,
        20 => AnsiModes::LINEFEED_NEWLINE,
        _ => return None,
    };
    Some(flag)
}

impl Modes {
    /// Create new modes with default values
    pub fn new() -> Self {
        Self {
            dec: DecModes::ANSI
                | DecModes::AUTOWRAP
                | DecModes::AUTO_REPEAT
                | DecModes::CURSOR_VISIBLE
                | DecModes::CURSOR_BLINK
                | DecModes::ALLOW_132,
            ansi: AnsiModes::SEND_RECEIVE,
            mouse: MouseMode::Off,
            mouse_encoding: MouseEncoding::Default,
        }
    }

    /// Reset all modes to default
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Set a DEC private mode by number. Returns false for unknown modes.
    pub fn set_dec_mode(&mut self, mode: u16, value: bool) -> bool {
        let mouse = match mode {
            9 => Some(MouseMode::X10),
            1000 => Some(MouseMode::Vt200),
            1001 => Some(MouseMode::Highlight),
            1002 => Some(MouseMode::ButtonEvent),
            1003 => Some(MouseMode::AnyEvent),
            _ => None,
        };
        if let Some(m) = mouse {
            if value {
                self.mouse = m;
            } else if self.mouse == m {
                self.mouse = MouseMode::Off;
            }
            return true;
        }
        let encoding = match mode {
            1005 => Some(MouseEncoding::Utf8),
            1006 => Some(MouseEncoding::Sgr),
            1015 => Some(MouseEncoding::Urxvt),
            1016 => Some(MouseEncoding::SgrPixels),
            _ => None,
        };
        if let Some(e) = encoding {
            if value {
                self.mouse_encoding = e;
            } else if self.mouse_encoding == e {
                self.mouse_encoding = MouseEncoding::Default;
            }
            return true;
        }
        match dec_flag(mode) {
            Some(flag) => {
                self.dec.set(flag, value);
                true
            }
            None => {
                log::debug!("Unknown DEC private mode: {}", mode);
                false
            }
        }
    }

    /// Get a DEC private mode by number; `None` when the mode is unknown
    pub fn get_dec_mode(&self, mode: u16) -> Option<bool> {
        match mode {
            9 => Some(self.mouse == MouseMode::X10),
            1000 => Some(self.mouse == MouseMode::Vt200),
            1001 => Some(self.mouse == MouseMode::Highlight),
            1002 => Some(self.mouse == MouseMode::ButtonEvent),
            1003 => Some(self.mouse == MouseMode::AnyEvent),
            1005 => Some(self.mouse_encoding == MouseEncoding::Utf8),
            1006 => Some(self.mouse_encoding == MouseEncoding::Sgr),
            1015 => Some(self.mouse_encoding == MouseEncoding::Urxvt),
            1016 => Some(self.mouse_encoding == MouseEncoding::SgrPixels),
            1048 => Some(false),
            _ => dec_flag(mode).map(|f| self.dec.contains(f)),
        }
    }

    /// Set a standard (ANSI) mode by number. Returns false for unknown modes.
    pub fn set_mode(&mut self, mode: u16, value: bool) -> bool {
        match ansi_flag(mode) {
            Some(flag) => {
                self.ansi.set(flag, value);
                true
            }
            None => {
                log::debug!("Unknown standard mode: {}", mode);
                false
            }
        }
    }

    /// Get a standard (ANSI) mode by number
    pub fn get_mode(&self, mode: u16) -> Option<bool> {
        ansi_flag(mode).map(|f| self.ansi.contains(f))
    }

    /// DECRQM status for a mode
    pub fn report(&self, mode: u16, private: bool) -> ModeStatus {
        let state = if private {
            self.get_dec_mode(mode)
        } else {
            self.get_mode(mode)
        };
        match state {
            Some(true) => ModeStatus::Set,
            Some(false) => ModeStatus::Reset,
            None => ModeStatus::NotRecognized,
        }
    }

    pub fn dec(&self, flag: DecModes) -> bool {
        self.dec.contains(flag)
    }

    pub fn ansi(&self, flag: AnsiModes) -> bool {
        self.ansi.contains(flag)
    }

    /// Check if any mouse mode is active
    pub fn mouse_tracking_enabled(&self) -> bool {
        self.mouse != MouseMode::Off
    }
}

impl Default for Modes {
    fn default() -> Self {
        Self::new()
    }
}
