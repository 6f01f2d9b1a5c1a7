//! DCS dispatch: status strings, user keys, soft fonts, termcap queries and
//! the `GATE` gateway

use std::collections::{BTreeMap, HashMap};

use kterm_core::{CellAttributes, CellFlags, Color, SOFT_FONT_BASE};
use kterm_parser::{decode_soft_glyphs, Params};
use serde::Serialize;

use super::Session;
use crate::gateway::{GatewayRequest, GATEWAY_CLASS};
use crate::host::TerminalHost;

const DEFAULT_GLYPH_WIDTH: usize = 8;
const DEFAULT_GLYPH_HEIGHT: usize = 16;

/// A DECDLD downloadable character set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoftFont {
    /// `Dscs` intermediate, if the name had one
    pub intermediate: Option<u8>,
    /// `Dscs` final byte
    pub final_byte: u8,
    pub cell_width: usize,
    pub cell_height: usize,
    /// 96-character set (Pcss = 1)
    pub ninety_six: bool,
    /// Bitmaps keyed by character code; each row has bit 0 leftmost
    pub glyphs: BTreeMap<u8, Vec<u16>>,
}

impl SoftFont {
    /// Whether an SCS designation names this font
    pub fn matches(&self, extra: Option<u8>, final_byte: u8) -> bool {
        self.intermediate == extra && self.final_byte == final_byte
    }

    /// Bitmap for a character produced by the soft-font charset
    pub fn glyph(&self, c: char) -> Option<&[u16]> {
        let code = (c as u32).checked_sub(SOFT_FONT_BASE)?;
        let code = u8::try_from(code).ok()?;
        self.glyphs.get(&code).map(Vec::as_slice)
    }
}

/// DECUDK key definitions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserKeys {
    keys: HashMap<u16, Vec<u8>>,
    locked: bool,
}

impl UserKeys {
    pub fn get(&self, key: u16) -> Option<&[u8]> {
        self.keys.get(&key).map(Vec::as_slice)
    }

    /// Further DECUDK definitions are refused
    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Session {
    pub(super) fn handle_dcs(
        &mut self,
        params: &Params,
        intermediates: &[u8],
        final_byte: u8,
        data: &[u8],
        host: &mut dyn TerminalHost,
    ) {
        match (intermediates, final_byte) {
            (b"$", b'q') => self.request_status_string(data, host),
            (b"+", b'q') => self.request_termcap(data, host),
            ([], b'|') => self.define_user_keys(params, data),
            ([], b'{') => self.download_soft_font(params, data),
            (b"$", b'p') | (b"$", b't') => {
                self.diagnostics.unsupported(format_args!(
                    "DCS {}{} (restore state)",
                    String::from_utf8_lossy(intermediates),
                    final_byte as char
                ));
            }
            ([], b'G') if data.starts_with(b"ATE;") => self.gateway(&data[4..], host),
            _ => {
                self.diagnostics.unsupported(format_args!(
                    "DCS {:?}{}{} ({} bytes)",
                    params.as_slice(),
                    String::from_utf8_lossy(intermediates),
                    final_byte as char,
                    data.len()
                ));
            }
        }
    }

    /// DECRQSS `DCS $ q Pt ST`
    fn request_status_string(&mut self, data: &[u8], host: &mut dyn TerminalHost) {
        let setting = match data {
            b"m" => Some(format!("{}m", sgr_string(&self.screen.cursor().attrs))),
            b"r" => {
                let (top, bottom) = self.screen.scroll_region();
                Some(format!("{};{}r", top + 1, bottom + 1))
            }
            b"s" => {
                let (left, right) = self.screen.stored_margins();
                Some(format!("{};{}s", left + 1, right + 1))
            }
            b"\"p" => {
                let controls = if self.responses.eight_bit() { 0 } else { 1 };
                Some(format!(
                    "{};{}\"p",
                    self.conformance.level.decscl_value(),
                    controls
                ))
            }
            b" q" => {
                let cursor = self.screen.cursor();
                Some(format!("{} q", cursor.style.to_decscusr(cursor.blinking)))
            }
            b"\"q" => {
                let protected = self.screen.cursor().attrs.has(CellFlags::PROTECTED);
                Some(format!("{}\"q", u8::from(protected)))
            }
            b"t" => Some(format!("{}t", self.screen.rows())),
            _ => None,
        };
        match setting {
            Some(setting) => {
                let reply = format!("\x1bP1$r{}\x1b\\", setting);
                self.respond(reply.as_bytes(), host);
            }
            None => {
                log::debug!("DECRQSS for {:?} not answered", String::from_utf8_lossy(data));
                self.respond(b"\x1bP0$r\x1b\\", host);
            }
        }
    }

    /// XTGETTCAP `DCS + q Pt ST`, one reply per requested name
    fn request_termcap(&mut self, data: &[u8], host: &mut dyn TerminalHost) {
        for hex_name in data.split(|&b| b == b';') {
            let hex_name = String::from_utf8_lossy(hex_name).to_string();
            let value = decode_hex(&hex_name)
                .and_then(|name| String::from_utf8(name).ok())
                .and_then(|name| self.termcap(&name));
            let reply = match value {
                Some(value) => format!("\x1bP1+r{}={}\x1b\\", hex_name, encode_hex(value.as_bytes())),
                None => format!("\x1bP0+r{}\x1b\\", hex_name),
            };
            self.respond(reply.as_bytes(), host);
        }
    }

    fn termcap(&self, name: &str) -> Option<String> {
        match name {
            "Co" | "colors" => Some("256".to_string()),
            "TN" | "name" => Some("xterm-256color".to_string()),
            "lines" => Some(self.screen.rows().to_string()),
            "cols" => Some(self.screen.cols().to_string()),
            "RGB" if self.conformance.features.true_color => Some("8".to_string()),
            _ => None,
        }
    }

    /// DECUDK `DCS Pc ; Pl | Ky1/St1;Ky2/St2 ST`
    fn define_user_keys(&mut self, params: &Params, data: &[u8]) {
        if !self.conformance.features.udk {
            self.diagnostics
                .unsupported(format_args!("DECUDK at level {}", self.conformance.level));
            return;
        }
        if self.user_keys.locked {
            log::debug!("DECUDK ignored, keys are locked");
            return;
        }
        if params.raw(0) == 0 {
            self.user_keys.keys.clear();
        }
        for definition in data.split(|&b| b == b';').filter(|d| !d.is_empty()) {
            let text = String::from_utf8_lossy(definition);
            let parsed = text.split_once('/').and_then(|(key, value)| {
                let key = key.parse::<u16>().ok()?;
                Some((key, decode_hex(value)?))
            });
            match parsed {
                Some((key, value)) => {
                    self.user_keys.keys.insert(key, value);
                }
                None => {
                    self.diagnostics
                        .malformed(format_args!("DECUDK definition {:?}", text));
                }
            }
        }
        if params.raw(1) == 0 {
            self.user_keys.locked = true;
        }
    }

    /// DECDLD `DCS Pfn;Pcn;Pe;Pcmw;Pss;Pt;Pcmh;Pcss { Dscs Sxbp1;Sxbp2;... ST`
    fn download_soft_font(&mut self, params: &Params, data: &[u8]) {
        if !self.conformance.features.soft_fonts {
            self.diagnostics
                .unsupported(format_args!("DECDLD at level {}", self.conformance.level));
            return;
        }
        let Some((intermediate, final_byte, glyph_data)) = split_dscs(data) else {
            self.diagnostics
                .malformed(format_args!("DECDLD without a Dscs name"));
            return;
        };
        let first = 0x20u16.saturating_add(params.raw(1));
        let erase = params.raw(2);
        let cell_width = match params.raw(3) {
            0 => DEFAULT_GLYPH_WIDTH,
            w => w as usize,
        };
        let cell_height = match params.raw(6) {
            0 => DEFAULT_GLYPH_HEIGHT,
            h => h as usize,
        };
        let glyphs = decode_soft_glyphs(glyph_data, cell_width, cell_height);

        let mut font = match self.soft_font.take() {
            Some(mut font) if erase == 1 && font.matches(intermediate, final_byte) => {
                font.cell_width = cell_width.min(16);
                font.cell_height = cell_height.min(32);
                font
            }
            _ => SoftFont {
                intermediate,
                final_byte,
                cell_width: cell_width.min(16),
                cell_height: cell_height.min(32),
                ninety_six: params.raw(7) == 1,
                glyphs: BTreeMap::new(),
            },
        };
        let mut loaded = 0;
        for (i, bitmap) in glyphs.into_iter().enumerate() {
            let Ok(code) = u8::try_from(first as usize + i) else {
                self.diagnostics.overflow(format_args!(
                    "DECDLD glyphs past 0xFF dropped from index {}",
                    i
                ));
                break;
            };
            font.glyphs.insert(code, bitmap);
            loaded += 1;
        }
        log::debug!(
            "DECDLD: {} glyphs from 0x{:02X}, {}x{} cells",
            loaded,
            first,
            font.cell_width,
            font.cell_height
        );
        self.soft_font = Some(font);
        self.screen.grid_mut().mark_all_dirty();
    }

    /// `DCS GATE;Class;ID;Command;Params ST`
    fn gateway(&mut self, payload: &[u8], host: &mut dyn TerminalHost) {
        let payload = String::from_utf8_lossy(payload);
        let Some(request) = GatewayRequest::parse(&payload) else {
            self.diagnostics
                .malformed(format_args!("gateway payload {:?}", payload));
            return;
        };
        if request.class == GATEWAY_CLASS {
            self.gateway_queue.push(request);
        } else {
            host.gateway(&request.class, &request.id, &request.command, &request.params);
        }
    }
}

/// `0;...` SGR parameters selecting `attrs` from a reset state
fn sgr_string(attrs: &CellAttributes) -> String {
    let mut out = String::from("0");
    let flags = [
        (CellFlags::BOLD, "1"),
        (CellFlags::FAINT, "2"),
        (CellFlags::ITALIC, "3"),
        (CellFlags::UNDERLINE, "4"),
        (CellFlags::BLINK, "5"),
        (CellFlags::REVERSE, "7"),
        (CellFlags::CONCEAL, "8"),
        (CellFlags::STRIKE, "9"),
        (CellFlags::DOUBLE_UNDERLINE, "21"),
        (CellFlags::OVERLINE, "53"),
    ];
    for (flag, code) in flags {
        if attrs.has(flag) {
            out.push(';');
            out.push_str(code);
        }
    }
    if attrs.fg != Color::DEFAULT_FG {
        push_color(&mut out, attrs.fg, 30, 90, 38);
    }
    if attrs.bg != Color::DEFAULT_BG {
        push_color(&mut out, attrs.bg, 40, 100, 48);
    }
    out
}

fn push_color(out: &mut String, color: Color, base: u16, bright: u16, extended: u16) {
    let param = match color {
        Color::Indexed(n @ 0..=7) => format!(";{}", base + n as u16),
        Color::Indexed(n @ 8..=15) => format!(";{}", bright + n as u16 - 8),
        Color::Indexed(n) => format!(";{};5;{}", extended, n),
        Color::Rgb { r, g, b } => format!(";{};2;{};{};{}", extended, r, g, b),
    };
    out.push_str(&param);
}

/// Split the `Dscs` name off the front of DECDLD data
fn split_dscs(data: &[u8]) -> Option<(Option<u8>, u8, &[u8])> {
    let mut intermediate = None;
    for (i, &byte) in data.iter().enumerate().take(3) {
        match byte {
            0x20..=0x2F => intermediate = Some(byte),
            0x30..=0x7E => return Some((intermediate, byte, &data[i + 1..])),
            _ => return None,
        }
    }
    None
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
