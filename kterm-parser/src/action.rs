//! Terminal actions produced by the parser
//!
//! These represent the semantic meaning of parsed escape sequences.

use crate::params::Params;
use crate::sixel::SixelImage;
use crate::tektronix::TekEvent;

/// Actions produced by the parser
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Print a character to the screen
    Print(char),

    /// Execute a control character
    /// C0: ENQ, BEL, BS, HT, LF, VT, FF, CR, SO, SI
    Control(u8),

    /// ESC sequence (non-CSI)
    Esc(EscAction),

    /// CSI (Control Sequence Introducer) sequence
    Csi(CsiAction),

    /// OSC (Operating System Command) sequence
    Osc(OscAction),

    /// DCS (Device Control String) other than sixel and ReGIS
    Dcs {
        params: Params,
        intermediates: Vec<u8>,
        final_byte: u8,
        data: Vec<u8>,
    },

    /// APC (Application Program Command)
    Apc(Vec<u8>),

    /// PM (Privacy Message) - consumed and ignored
    Pm(Vec<u8>),

    /// SOS (Start of String) - consumed and ignored
    Sos(Vec<u8>),

    /// VT52 compatibility mode sequence
    Vt52(Vt52Action),

    /// Completed sixel image (`DCS ... q`)
    Sixel(SixelImage),

    /// ReGIS payload (`DCS ... p`), executed by the session
    Regis(Vec<u8>),

    /// Tektronix 4014 output
    Tek(TekEvent),

    /// Bytes passed through to the printer in printer controller mode
    Printer(Vec<u8>),

    /// Invalid/unrecognized sequence (for debugging)
    Invalid(Vec<u8>),
}

/// ESC sequence actions (non-CSI)
#[derive(Debug, Clone, PartialEq)]
pub enum EscAction {
    /// ESC 7 - Save cursor (DECSC)
    SaveCursor,
    /// ESC 8 - Restore cursor (DECRC)
    RestoreCursor,
    /// ESC D - Index (IND) - move cursor down, scroll if at bottom
    Index,
    /// ESC M - Reverse Index (RI) - move cursor up, scroll if at top
    ReverseIndex,
    /// ESC E - Next Line (NEL) - move to start of next line
    NextLine,
    /// ESC H - Horizontal Tab Set (HTS)
    HorizontalTabSet,
    /// ESC c - Full Reset (RIS)
    FullReset,
    /// ESC = - Application Keypad Mode (DECKPAM)
    ApplicationKeypad,
    /// ESC > - Normal Keypad Mode (DECKPNM)
    NormalKeypad,
    /// ESC ( ) * + (94-set) or - . / (96-set) followed by the set's final.
    /// `extra` holds a second intermediate such as the `%` of `ESC ( % 5`.
    Designate {
        slot: u8,
        extra: Option<u8>,
        final_byte: u8,
    },
    /// ESC N - Single Shift 2 (SS2)
    SingleShift2,
    /// ESC O - Single Shift 3 (SS3)
    SingleShift3,
    /// ESC n - Locking Shift 2 (LS2)
    LockingShift2,
    /// ESC o - Locking Shift 3 (LS3)
    LockingShift3,
    /// ESC ~ - LS1R
    LockingShift1Right,
    /// ESC } - LS2R
    LockingShift2Right,
    /// ESC | - LS3R
    LockingShift3Right,
    /// ESC 6 - Back Index (DECBI)
    BackIndex,
    /// ESC 9 - Forward Index (DECFI)
    ForwardIndex,
    /// ESC # 3 - Double-height line, top half (DECDHL)
    DoubleHeightTop,
    /// ESC # 4 - Double-height line, bottom half (DECDHL)
    DoubleHeightBottom,
    /// ESC # 5 - Single-width line (DECSWL)
    SingleWidth,
    /// ESC # 6 - Double-width line (DECDWL)
    DoubleWidth,
    /// ESC # 8 - DEC Screen Alignment Test (DECALN)
    DecAlignmentTest,
    /// ESC % G - Select UTF-8
    Utf8On,
    /// ESC % @ - Select the default (ISO 8859-1) coding
    Utf8Off,
    /// ESC SP F - Send 7-bit C1 controls (S7C1T)
    Select7Bit,
    /// ESC SP G - Send 8-bit C1 controls (S8C1T)
    Select8Bit,
    /// ESC Z - Identify terminal (DECID)
    Identify,
    /// Unknown ESC sequence
    Unknown(Vec<u8>),
}

/// VT52 mode sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vt52Action {
    /// ESC A
    CursorUp,
    /// ESC B
    CursorDown,
    /// ESC C
    CursorRight,
    /// ESC D
    CursorLeft,
    /// ESC F - enter graphics character set
    GraphicsOn,
    /// ESC G - exit graphics character set
    GraphicsOff,
    /// ESC H
    Home,
    /// ESC I
    ReverseLineFeed,
    /// ESC J
    EraseToEndOfScreen,
    /// ESC K
    EraseToEndOfLine,
    /// ESC Y row col, both 0-based
    CursorAddress { row: u16, col: u16 },
    /// ESC Z
    Identify,
    /// ESC =
    KeypadApplication,
    /// ESC >
    KeypadNumeric,
    /// ESC < - return to ANSI mode
    ExitVt52,
}

/// CSI sequence actions
#[derive(Debug, Clone, PartialEq)]
pub struct CsiAction {
    /// Parameters (semicolon-separated numbers)
    pub params: Params,
    /// Intermediate bytes (0x20-0x2F)
    pub intermediates: Vec<u8>,
    /// Final byte (0x40-0x7E)
    pub final_byte: u8,
    /// Whether this is a private sequence (starts with ?)
    pub private: bool,
    /// Raw marker byte: 0=none, b'?'=private, b'>'=DA2, b'<', b'='=DA3
    pub marker: u8,
}

impl CsiAction {
    /// Get a parameter with a default value
    pub fn param(&self, index: usize, default: u16) -> u16 {
        self.params.get(index).unwrap_or(default)
    }

    /// Check if this is a specific CSI sequence
    pub fn is(&self, final_byte: u8) -> bool {
        self.final_byte == final_byte && self.intermediates.is_empty() && self.marker == 0
    }

    /// Check if this is a specific private CSI sequence
    pub fn is_private(&self, final_byte: u8) -> bool {
        self.final_byte == final_byte && self.intermediates.is_empty() && self.private
    }

    /// Check for a sequence with exactly one intermediate, e.g. `SP q`
    pub fn with_intermediate(&self, intermediate: u8, final_byte: u8) -> bool {
        self.final_byte == final_byte && self.intermediates == [intermediate]
    }
}

/// OSC sequence actions
#[derive(Debug, Clone, PartialEq)]
pub enum OscAction {
    /// OSC 0 - Set icon name and window title
    SetIconAndTitle(String),
    /// OSC 1 - Set icon name
    SetIconName(String),
    /// OSC 2 - Set window title
    SetTitle(String),
    /// OSC 4 - Set/query palette entries, `(index, spec)` pairs; spec `?` queries
    SetColor(Vec<(u8, String)>),
    /// OSC 10 - Set foreground color
    SetForegroundColor(String),
    /// OSC 11 - Set background color
    SetBackgroundColor(String),
    /// OSC 12 - Set cursor color
    SetCursorColor(String),
    /// OSC 50 - Set font
    SetFont(String),
    /// OSC 52 - Clipboard operation
    Clipboard { clipboard: String, data: String },
    /// OSC 104 - Reset palette entries; empty resets all
    ResetColor(Vec<u8>),
    /// OSC 110 - Reset foreground color
    ResetForegroundColor,
    /// OSC 111 - Reset background color
    ResetBackgroundColor,
    /// OSC 112 - Reset cursor color
    ResetCursorColor,
    /// OSC 9 / OSC 777;notify - Desktop notification
    Notify { title: String, body: String },
    /// Unknown OSC sequence
    Unknown { command: u16, data: String },
}

impl OscAction {
    /// Interpret a complete OSC payload (without introducer and terminator)
    pub fn parse(data: &[u8]) -> Self {
        let s = String::from_utf8_lossy(data);
        let (cmd, rest) = match s.find(';') {
            Some(pos) => (&s[..pos], &s[pos + 1..]),
            None => (&s[..], ""),
        };
        let Ok(command) = cmd.parse::<u16>() else {
            return OscAction::Unknown {
                command: 0,
                data: s.into_owned(),
            };
        };

        match command {
            0 => OscAction::SetIconAndTitle(rest.to_string()),
            1 => OscAction::SetIconName(rest.to_string()),
            2 => OscAction::SetTitle(rest.to_string()),
            4 => {
                let mut pairs = Vec::new();
                let mut parts = rest.split(';');
                while let (Some(index), Some(spec)) = (parts.next(), parts.next()) {
                    if let Ok(index) = index.trim().parse::<u8>() {
                        pairs.push((index, spec.to_string()));
                    }
                }
                OscAction::SetColor(pairs)
            }
            9 => OscAction::Notify {
                title: String::new(),
                body: rest.to_string(),
            },
            10 => OscAction::SetForegroundColor(rest.to_string()),
            11 => OscAction::SetBackgroundColor(rest.to_string()),
            12 => OscAction::SetCursorColor(rest.to_string()),
            50 => OscAction::SetFont(rest.to_string()),
            52 => {
                let (clipboard, data) = rest.split_once(';').unwrap_or(("c", rest));
                OscAction::Clipboard {
                    clipboard: clipboard.to_string(),
                    data: data.to_string(),
                }
            }
            104 => OscAction::ResetColor(
                rest.split(';')
                    .filter_map(|i| i.trim().parse::<u8>().ok())
                    .collect(),
            ),
            110 => OscAction::ResetForegroundColor,
            111 => OscAction::ResetBackgroundColor,
            112 => OscAction::ResetCursorColor,
            777 => {
                let mut parts = rest.splitn(3, ';');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some("notify"), title, body) => OscAction::Notify {
                        title: title.unwrap_or_default().to_string(),
                        body: body.unwrap_or_default().to_string(),
                    },
                    _ => OscAction::Unknown {
                        command,
                        data: rest.to_string(),
                    },
                }
            }
            _ => OscAction::Unknown {
                command,
                data: rest.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csi(final_byte: u8, marker: u8) -> CsiAction {
        CsiAction {
            params: Params::from_slice(&[10, 20, 30]),
            intermediates: vec![],
            final_byte,
            private: marker == b'?',
            marker,
        }
    }

    #[test]
    fn test_csi_action_param() {
        let csi = csi(b'H', 0);
        assert_eq!(csi.param(0, 1), 10);
        assert_eq!(csi.param(1, 1), 20);
        assert_eq!(csi.param(5, 99), 99);
    }

    #[test]
    fn test_csi_action_is() {
        let csi = csi(b'H', 0);
        assert!(csi.is(b'H'));
        assert!(!csi.is(b'J'));
        assert!(!csi.is_private(b'H'));
    }

    #[test]
    fn test_csi_action_is_private() {
        let csi = csi(b'h', b'?');
        assert!(csi.is_private(b'h'));
        assert!(!csi.is(b'h'));
    }

    #[test]
    fn test_marker_excludes_plain_match() {
        assert!(!csi(b'c', b'>').is(b'c'));
        assert!(!csi(b'c', b'=').is(b'c'));
    }

    #[test]
    fn test_with_intermediate() {
        let mut csi = csi(b'q', 0);
        csi.intermediates = vec![b' '];
        assert!(csi.with_intermediate(b' ', b'q'));
        assert!(!csi.with_intermediate(b'"', b'q'));
        assert!(!csi.is(b'q'));
    }

    #[test]
    fn test_osc_titles() {
        assert_eq!(
            OscAction::parse(b"0;My Title"),
            OscAction::SetIconAndTitle("My Title".to_string())
        );
        assert_eq!(OscAction::parse(b"2;a;b"), OscAction::SetTitle("a;b".to_string()));
    }

    #[test]
    fn test_osc_palette_pairs() {
        assert_eq!(
            OscAction::parse(b"4;1;rgb:ff/00/00;2;?"),
            OscAction::SetColor(vec![
                (1, "rgb:ff/00/00".to_string()),
                (2, "?".to_string())
            ])
        );
        assert_eq!(OscAction::parse(b"104"), OscAction::ResetColor(vec![]));
        assert_eq!(OscAction::parse(b"104;3;5"), OscAction::ResetColor(vec![3, 5]));
    }

    #[test]
    fn test_osc_clipboard_and_notify() {
        assert_eq!(
            OscAction::parse(b"52;c;aGVsbG8="),
            OscAction::Clipboard {
                clipboard: "c".to_string(),
                data: "aGVsbG8=".to_string()
            }
        );
        assert_eq!(
            OscAction::parse(b"777;notify;Build;done"),
            OscAction::Notify {
                title: "Build".to_string(),
                body: "done".to_string()
            }
        );
        assert_eq!(
            OscAction::parse(b"9;hello"),
            OscAction::Notify {
                title: String::new(),
                body: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_osc_unknown() {
        assert_eq!(
            OscAction::parse(b"7;file:///tmp"),
            OscAction::Unknown {
                command: 7,
                data: "file:///tmp".to_string()
            }
        );
        assert!(matches!(OscAction::parse(b"abc"), OscAction::Unknown { command: 0, .. }));
    }
}
