//! Character set handling for terminal emulation
//!
//! Implements the ISO-2022 model used by DEC terminals:
//! - four designation slots G0-G3
//! - GL / GR invocation through locking shifts (SI, SO, LS2, LS3, LS1R-LS3R)
//! - single shifts SS2 / SS3 that apply to one character only
//! - DEC Special Graphics, DEC Multinational, ISO Latin-1, UK and the
//!   national replacement character sets (NRCS)
//!
//! Translation goes through a compile-time lookup table of 32 sets by 128
//! positions. The UTF-8 flag disables GR translation; multi-byte decoding
//! happens in the parser.

use serde::{Deserialize, Serialize};

/// Character set designations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Charset {
    /// ASCII (US) - default
    #[default]
    Ascii = 0,
    /// DEC Special Graphics (line drawing characters)
    DecSpecialGraphics = 1,
    /// UK character set
    Uk = 2,
    /// DEC Multinational Character Set
    DecMultinational = 3,
    /// ISO 8859-1 supplemental set (96-character)
    Latin1 = 4,
    Dutch = 5,
    Finnish = 6,
    French = 7,
    FrenchCanadian = 8,
    German = 9,
    Italian = 10,
    NorwegianDanish = 11,
    Spanish = 12,
    Swedish = 13,
    Swiss = 14,
    /// Downloadable soft font (DECDLD), mapped into the private use area
    SoftFont = 15,
}

/// Base of the private use range where soft font glyphs are placed
pub const SOFT_FONT_BASE: u32 = 0xF000;

impl Charset {
    /// Whether this is one of the national replacement sets
    pub fn is_nrcs(self) -> bool {
        matches!(
            self,
            Charset::Uk
                | Charset::Dutch
                | Charset::Finnish
                | Charset::French
                | Charset::FrenchCanadian
                | Charset::German
                | Charset::Italian
                | Charset::NorwegianDanish
                | Charset::Spanish
                | Charset::Swedish
                | Charset::Swiss
        )
    }

    /// Resolve an SCS designation.
    ///
    /// `intermediate` is the optional second intermediate byte (e.g. `%` in
    /// `ESC ( % 5`), `ninety_six` is set for the `-` `.` `/` designators.
    pub fn from_designation(intermediate: Option<u8>, final_byte: u8, ninety_six: bool) -> Option<Charset> {
        if ninety_six {
            return match (intermediate, final_byte) {
                (None, b'A') => Some(Charset::Latin1),
                (None, b'<') => Some(Charset::DecMultinational),
                _ => None,
            };
        }
        match (intermediate, final_byte) {
            (Some(b'%'), b'5') => Some(Charset::DecMultinational),
            (Some(_), _) => None,
            (None, b) => match b {
                b'B' | b'1' => Some(Charset::Ascii),
                b'0' | b'2' => Some(Charset::DecSpecialGraphics),
                b'A' => Some(Charset::Uk),
                b'<' => Some(Charset::DecMultinational),
                b'4' => Some(Charset::Dutch),
                b'C' | b'5' => Some(Charset::Finnish),
                b'R' | b'f' => Some(Charset::French),
                b'Q' | b'9' => Some(Charset::FrenchCanadian),
                b'K' => Some(Charset::German),
                b'Y' => Some(Charset::Italian),
                b'E' | b'6' | b'`' => Some(Charset::NorwegianDanish),
                b'Z' => Some(Charset::Spanish),
                b'H' | b'7' => Some(Charset::Swedish),
                b'=' => Some(Charset::Swiss),
                _ => None,
            },
        }
    }

    /// Designator final bytes, as reported in DECCIR
    pub fn designator(self) -> &'static str {
        match self {
            Charset::Ascii => "B",
            Charset::DecSpecialGraphics => "0",
            Charset::Uk | Charset::Latin1 => "A",
            Charset::DecMultinational => "<",
            Charset::Dutch => "4",
            Charset::Finnish => "5",
            Charset::French => "R",
            Charset::FrenchCanadian => "Q",
            Charset::German => "K",
            Charset::Italian => "Y",
            Charset::NorwegianDanish => "E",
            Charset::Spanish => "Z",
            Charset::Swedish => "7",
            Charset::Swiss => "=",
            Charset::SoftFont => " @",
        }
    }

    /// 96-character set
    pub fn is_ninety_six(self) -> bool {
        self == Charset::Latin1
    }

    /// Keyboard dialect number reported by DSR 26
    pub fn dialect_code(self) -> u16 {
        match self {
            Charset::Uk => 2,
            Charset::Dutch => 18,
            Charset::Finnish => 5,
            Charset::French => 6,
            Charset::FrenchCanadian => 14,
            Charset::German => 7,
            Charset::Italian => 9,
            Charset::NorwegianDanish => 8,
            Charset::Spanish => 10,
            Charset::Swedish => 13,
            Charset::Swiss => 15,
            _ => 1,
        }
    }
}

/// One of the four designation slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GSlot {
    #[default]
    G0,
    G1,
    G2,
    G3,
}

impl GSlot {
    fn index(self) -> usize {
        self as usize
    }

    /// Slot targeted by a designator intermediate (`(`, `)`, `*`, `+`, `-`, `.`, `/`)
    pub fn from_designator(byte: u8) -> Option<GSlot> {
        match byte {
            b'(' => Some(GSlot::G0),
            b')' | b'-' => Some(GSlot::G1),
            b'*' | b'.' => Some(GSlot::G2),
            b'+' | b'/' => Some(GSlot::G3),
            _ => None,
        }
    }
}

const SET_COUNT: usize = 32;

/// Compile-time translation table: 32 sets by 128 positions
static LUT: [[u16; 128]; SET_COUNT] = build_lut();

const fn identity() -> [u16; 128] {
    let mut t = [0u16; 128];
    let mut i = 0;
    while i < 128 {
        t[i] = i as u16;
        i += 1;
    }
    t
}

/// Apply NRCS replacements in the order `# @ [ \ ] ^ _ ` { | } ~`; 0 keeps ASCII
const fn nrcs(repl: [u16; 12]) -> [u16; 128] {
    let positions: [usize; 12] = [0x23, 0x40, 0x5B, 0x5C, 0x5D, 0x5E, 0x5F, 0x60, 0x7B, 0x7C, 0x7D, 0x7E];
    let mut t = identity();
    let mut i = 0;
    while i < 12 {
        if repl[i] != 0 {
            t[positions[i]] = repl[i];
        }
        i += 1;
    }
    t
}

const fn dec_special() -> [u16; 128] {
    let mut t = identity();
    let glyphs: [u16; 32] = [
        0x00A0, // _ blank
        0x25C6, // ` diamond
        0x2592, // a checkerboard
        0x2409, // b HT
        0x240C, // c FF
        0x240D, // d CR
        0x240A, // e LF
        0x00B0, // f degree
        0x00B1, // g plus/minus
        0x2424, // h NL
        0x240B, // i VT
        0x2518, // j lower right corner
        0x2510, // k upper right corner
        0x250C, // l upper left corner
        0x2514, // m lower left corner
        0x253C, // n crossing lines
        0x23BA, // o scan line 1
        0x23BB, // p scan line 3
        0x2500, // q horizontal line
        0x23BC, // r scan line 7
        0x23BD, // s scan line 9
        0x251C, // t left tee
        0x2524, // u right tee
        0x2534, // v bottom tee
        0x252C, // w top tee
        0x2502, // x vertical line
        0x2264, // y less or equal
        0x2265, // z greater or equal
        0x03C0, // { pi
        0x2260, // | not equal
        0x00A3, // } pound
        0x00B7, // ~ centered dot
    ];
    let mut i = 0;
    while i < 32 {
        t[0x5F + i] = glyphs[i];
        i += 1;
    }
    t
}

const fn latin1() -> [u16; 128] {
    let mut t = identity();
    let mut i = 0x20;
    while i < 128 {
        t[i] = (0x80 + i) as u16;
        i += 1;
    }
    t
}

const fn dec_multinational() -> [u16; 128] {
    let mut t = latin1();
    t[0x28] = 0x00A4; // currency sign
    t[0x57] = 0x0152; // OE ligature
    t[0x5D] = 0x0178; // Y diaeresis
    t[0x77] = 0x0153; // oe ligature
    t[0x7D] = 0x00FF; // y diaeresis
    t
}

const fn soft_font() -> [u16; 128] {
    let mut t = identity();
    let mut i = 0x20;
    while i < 0x80 {
        t[i] = (SOFT_FONT_BASE as usize + i) as u16;
        i += 1;
    }
    t
}

const fn build_lut() -> [[u16; 128]; SET_COUNT] {
    let mut lut = [identity(); SET_COUNT];
    lut[Charset::DecSpecialGraphics as usize] = dec_special();
    lut[Charset::Uk as usize] = nrcs([0xA3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    lut[Charset::DecMultinational as usize] = dec_multinational();
    lut[Charset::Latin1 as usize] = latin1();
    lut[Charset::Dutch as usize] = nrcs([
        0xA3, 0xBE, 0x0133, 0xBD, 0x7C, 0, 0, 0, 0xA8, 0x0192, 0xBC, 0xB4,
    ]);
    lut[Charset::Finnish as usize] = nrcs([
        0, 0, 0xC4, 0xD6, 0xC5, 0xDC, 0, 0xE9, 0xE4, 0xF6, 0xE5, 0xFC,
    ]);
    lut[Charset::French as usize] = nrcs([
        0xA3, 0xE0, 0xB0, 0xE7, 0xA7, 0, 0, 0, 0xE9, 0xF9, 0xE8, 0xA8,
    ]);
    lut[Charset::FrenchCanadian as usize] = nrcs([
        0, 0xE0, 0xE2, 0xE7, 0xEA, 0xEE, 0, 0xF4, 0xE9, 0xF9, 0xE8, 0xFB,
    ]);
    lut[Charset::German as usize] = nrcs([
        0, 0xA7, 0xC4, 0xD6, 0xDC, 0, 0, 0, 0xE4, 0xF6, 0xFC, 0xDF,
    ]);
    lut[Charset::Italian as usize] = nrcs([
        0xA3, 0xA7, 0xB0, 0xE7, 0xE9, 0, 0, 0xF9, 0xE0, 0xF2, 0xE8, 0xEC,
    ]);
    lut[Charset::NorwegianDanish as usize] = nrcs([
        0, 0xC4, 0xC6, 0xD8, 0xC5, 0xDC, 0, 0xE4, 0xE6, 0xF8, 0xE5, 0xFC,
    ]);
    lut[Charset::Spanish as usize] = nrcs([
        0xA3, 0xA7, 0xA1, 0xD1, 0xBF, 0, 0, 0, 0xB0, 0xF1, 0xE7, 0,
    ]);
    lut[Charset::Swedish as usize] = nrcs([
        0, 0xC9, 0xC4, 0xD6, 0xC5, 0xDC, 0, 0xE9, 0xE4, 0xF6, 0xE5, 0xFC,
    ]);
    lut[Charset::Swiss as usize] = nrcs([
        0xF9, 0xE0, 0xE9, 0xE7, 0xEA, 0xEE, 0xE8, 0xF4, 0xE4, 0xF6, 0xFC, 0xFB,
    ]);
    lut[Charset::SoftFont as usize] = soft_font();
    lut
}

/// Translate a 7-bit position through a specific charset
pub fn translate_char(c: char, charset: Charset) -> char {
    let code = c as u32;
    if code >= 0x80 {
        return c;
    }
    let mapped = LUT[charset as usize][code as usize] as u32;
    char::from_u32(mapped).unwrap_or(c)
}

/// Character set state for G0-G3 slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharsetState {
    /// Designations of G0..G3
    pub slots: [Charset; 4],
    /// Slot invoked into GL (0x20-0x7F)
    pub gl: GSlot,
    /// Slot invoked into GR (0xA0-0xFF)
    pub gr: GSlot,
    /// Pending single shift (SS2 / SS3)
    pub single_shift: Option<GSlot>,
    /// UTF-8 mode (ESC % G); GR translation is bypassed while set
    pub utf8: bool,
}

impl Default for CharsetState {
    fn default() -> Self {
        Self {
            slots: [
                Charset::Ascii,
                Charset::DecSpecialGraphics,
                Charset::Ascii,
                Charset::Ascii,
            ],
            gl: GSlot::G0,
            gr: GSlot::G1,
            single_shift: None,
            utf8: true,
        }
    }
}

impl CharsetState {
    /// Create new charset state with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to default state, keeping the UTF-8 flag
    pub fn reset(&mut self) {
        let utf8 = self.utf8;
        *self = Self::default();
        self.utf8 = utf8;
    }

    /// Charset designated into a slot
    pub fn slot(&self, slot: GSlot) -> Charset {
        self.slots[slot.index()]
    }

    /// Designate a charset into a slot
    pub fn designate(&mut self, slot: GSlot, charset: Charset) {
        self.slots[slot.index()] = charset;
    }

    /// Get the charset currently invoked into GL (ignoring single shifts)
    pub fn current(&self) -> Charset {
        self.slot(self.gl)
    }

    /// Shift In (SI, LS0) - select G0 into GL
    pub fn shift_in(&mut self) {
        self.gl = GSlot::G0;
    }

    /// Shift Out (SO, LS1) - select G1 into GL
    pub fn shift_out(&mut self) {
        self.gl = GSlot::G1;
    }

    /// Locking shift of a slot into GL (LS2 / LS3)
    pub fn lock_gl(&mut self, slot: GSlot) {
        self.gl = slot;
    }

    /// Locking shift of a slot into GR (LS1R / LS2R / LS3R)
    pub fn lock_gr(&mut self, slot: GSlot) {
        self.gr = slot;
    }

    /// Single Shift 2 (SS2) - use G2 for next character only
    pub fn single_shift_2(&mut self) {
        self.single_shift = Some(GSlot::G2);
    }

    /// Single Shift 3 (SS3) - use G3 for next character only
    pub fn single_shift_3(&mut self) {
        self.single_shift = Some(GSlot::G3);
    }

    /// Translate a character through the active sets.
    ///
    /// Consumes a pending single shift.
    pub fn translate(&mut self, c: char) -> char {
        let code = c as u32;
        let shift = self.single_shift.take();
        if code < 0x80 {
            let set = self.slot(shift.unwrap_or(self.gl));
            return translate_char(c, set);
        }
        if !self.utf8 && (0xA0..=0xFF).contains(&code) {
            let set = self.slot(shift.unwrap_or(self.gr));
            let low = code - 0x80;
            let mapped = LUT[set as usize][low as usize] as u32;
            if mapped == low {
                // position not remapped by the set; keep the Latin-1 byte
                return c;
            }
            return char::from_u32(mapped).unwrap_or(c);
        }
        c
    }

    /// First national replacement set designated into any slot
    pub fn national_set(&self) -> Option<Charset> {
        self.slots.iter().copied().find(|cs| cs.is_nrcs())
    }
}
