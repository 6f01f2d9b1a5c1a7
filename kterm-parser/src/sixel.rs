//! Sixel graphics decoder
//!
//! A streaming decoder fed one byte at a time between `DCS ... q` and ST.
//! Rather than rasterizing, every non-empty sixel column becomes a
//! [`SixelStrip`]: an x/y position, the 6-bit vertical pattern and the
//! palette index it was drawn with. The renderer owns rasterization.

use kterm_core::{Palette, Rgb};

use crate::error::ParseError;

const COLOR_REGISTERS: usize = 256;
const MAX_SIXEL_WIDTH: u32 = 4096;
const MAX_SIXEL_HEIGHT: u32 = 4096;
/// Default cap on strips kept per image
pub const DEFAULT_MAX_STRIPS: usize = 1 << 20;

/// VT340 default color map, in percent
const VT340_COLORS: [(u32, u32, u32); 16] = [
    (0, 0, 0),
    (20, 20, 80),
    (80, 13, 13),
    (20, 80, 20),
    (80, 20, 80),
    (20, 80, 80),
    (80, 80, 20),
    (53, 53, 53),
    (26, 26, 26),
    (33, 33, 60),
    (60, 26, 26),
    (33, 60, 33),
    (60, 33, 60),
    (33, 60, 60),
    (60, 60, 33),
    (80, 80, 80),
];

/// One column of six vertical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SixelStrip {
    pub x: u32,
    pub y: u32,
    /// Bit 0 is the top pixel
    pub pattern: u8,
    pub color_index: u8,
}

/// Raster attributes from `" Pan ; Pad ; Ph ; Pv`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RasterAttributes {
    pub pan: u32,
    pub pad: u32,
    pub width: u32,
    pub height: u32,
}

/// A decoded sixel image
#[derive(Debug, Clone, PartialEq)]
pub struct SixelImage {
    pub strips: Vec<SixelStrip>,
    pub palette: [Rgb; COLOR_REGISTERS],
    /// Furthest x reached
    pub width: u32,
    /// Furthest y reached (bottom of the lowest sixel row drawn)
    pub height: u32,
    /// DCS P1
    pub aspect: u16,
    /// DCS P2: 1 leaves unset pixels transparent
    pub background: u16,
    pub raster: Option<RasterAttributes>,
    /// Set when strips were dropped at the cap
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    Repeat,
    Color,
    Raster,
}

/// Streaming sixel decoder
#[derive(Debug, Clone)]
pub struct SixelDecoder {
    state: State,
    /// Numeric arguments of the current `!`, `#` or `"` introducer
    args: Vec<u32>,
    current: Option<u32>,
    x: u32,
    y: u32,
    color: u8,
    image: SixelImage,
    max_strips: usize,
}

fn percent_to_u8(v: u32) -> u8 {
    (v.min(100) * 255 / 100) as u8
}

fn default_palette() -> [Rgb; COLOR_REGISTERS] {
    let mut palette = *Palette::new().entries();
    for (slot, &(r, g, b)) in palette.iter_mut().zip(VT340_COLORS.iter()) {
        *slot = Rgb::new(percent_to_u8(r), percent_to_u8(g), percent_to_u8(b));
    }
    palette
}

impl SixelDecoder {
    /// Start an image with the DCS parameters `P1;P2;P3`
    pub fn new(params: &[u16]) -> Self {
        Self::with_limit(params, DEFAULT_MAX_STRIPS)
    }

    pub fn with_limit(params: &[u16], max_strips: usize) -> Self {
        Self {
            state: State::Normal,
            args: Vec::with_capacity(5),
            current: None,
            x: 0,
            y: 0,
            color: 0,
            image: SixelImage {
                strips: Vec::new(),
                palette: default_palette(),
                width: 0,
                height: 0,
                aspect: params.first().copied().unwrap_or(0),
                background: params.get(1).copied().unwrap_or(0),
                raster: None,
                truncated: false,
            },
            max_strips,
        }
    }

    /// Feed one byte of sixel data
    pub fn feed(&mut self, byte: u8) {
        match self.state {
            State::Normal => self.normal(byte),
            State::Repeat | State::Color | State::Raster => {
                match byte {
                    b'0'..=b'9' => {
                        let d = (byte - b'0') as u32;
                        self.current = Some(self.current.unwrap_or(0).saturating_mul(10).saturating_add(d));
                    }
                    b';' => {
                        self.args.push(self.current.take().unwrap_or(0));
                    }
                    _ => {
                        if let Some(v) = self.current.take() {
                            self.args.push(v);
                        }
                        self.finish_introducer(byte);
                    }
                }
            }
        }
    }

    fn normal(&mut self, byte: u8) {
        match byte {
            b'!' => self.begin(State::Repeat),
            b'#' => self.begin(State::Color),
            b'"' => self.begin(State::Raster),
            b'$' => self.x = 0,
            b'-' => {
                self.x = 0;
                self.y = self.y.saturating_add(6);
            }
            0x3F..=0x7E => self.emit(byte - 0x3F, 1),
            _ => {}
        }
    }

    fn begin(&mut self, state: State) {
        self.state = state;
        self.args.clear();
        self.current = None;
    }

    /// Apply the collected introducer, then handle the byte that ended it
    fn finish_introducer(&mut self, byte: u8) {
        let state = self.state;
        self.state = State::Normal;
        match state {
            State::Repeat => {
                if (0x3F..=0x7E).contains(&byte) {
                    let count = self.args.first().copied().unwrap_or(1).max(1);
                    self.emit(byte - 0x3F, count);
                    return;
                }
            }
            State::Color => self.apply_color(),
            State::Raster => {
                let arg = |i: usize| self.args.get(i).copied().unwrap_or(0);
                self.image.raster = Some(RasterAttributes {
                    pan: arg(0),
                    pad: arg(1),
                    width: arg(2).min(MAX_SIXEL_WIDTH),
                    height: arg(3).min(MAX_SIXEL_HEIGHT),
                });
            }
            State::Normal => {}
        }
        self.normal(byte);
    }

    fn apply_color(&mut self) {
        let Some(&index) = self.args.first() else {
            return;
        };
        let index = (index as usize % COLOR_REGISTERS) as u8;
        if self.args.len() >= 5 {
            let (space, a, b, c) = (self.args[1], self.args[2], self.args[3], self.args[4]);
            let rgb = match space {
                1 => {
                    let (r, g, b) = hls_to_rgb(a, b, c);
                    Some(Rgb::new(r, g, b))
                }
                2 => Some(Rgb::new(percent_to_u8(a), percent_to_u8(b), percent_to_u8(c))),
                _ => {
                    log::debug!("sixel: unknown color space {}", space);
                    None
                }
            };
            if let Some(rgb) = rgb {
                self.image.palette[index as usize] = rgb;
            }
        }
        self.color = index;
    }

    fn emit(&mut self, pattern: u8, count: u32) {
        for _ in 0..count {
            if self.x >= MAX_SIXEL_WIDTH || self.y >= MAX_SIXEL_HEIGHT {
                break;
            }
            if pattern != 0 {
                if self.image.strips.len() < self.max_strips {
                    self.image.strips.push(SixelStrip {
                        x: self.x,
                        y: self.y,
                        pattern,
                        color_index: self.color,
                    });
                    self.image.height = self.image.height.max(self.y + 6);
                } else if !self.image.truncated {
                    log::warn!("sixel: image truncated at {} strips", self.max_strips);
                    self.image.truncated = true;
                }
            }
            self.x += 1;
            self.image.width = self.image.width.max(self.x);
        }
    }

    /// Finish at ST and return the image
    pub fn finish(mut self) -> SixelImage {
        if self.state != State::Normal {
            if let Some(v) = self.current.take() {
                self.args.push(v);
            }
            // a trailing introducer with no data byte still takes effect
            if self.state == State::Color {
                self.apply_color();
            }
        }
        self.image
    }

    /// Payload error to report for this image, if any
    pub fn error(&self) -> Option<ParseError> {
        self.image
            .truncated
            .then_some(ParseError::SixelTruncated(self.max_strips))
    }
}

fn hls_to_rgb(h: u32, l: u32, s: u32) -> (u8, u8, u8) {
    let h = (h % 360) as f64;
    let l = (l.min(100) as f64) / 100.0;
    let s = (s.min(100) as f64) / 100.0;

    if s == 0.0 {
        let v = (l * 255.0) as u8;
        return (v, v, v);
    }

    let m2 = if l <= 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let m1 = 2.0 * l - m2;

    // DEC hue circle: blue at 0, red at 120, green at 240
    let r = hue_to_rgb(m1, m2, h);
    let g = hue_to_rgb(m1, m2, h - 120.0);
    let b = hue_to_rgb(m1, m2, h + 120.0);

    ((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

fn hue_to_rgb(m1: f64, m2: f64, mut h: f64) -> f64 {
    if h < 0.0 {
        h += 360.0;
    }
    if h > 360.0 {
        h -= 360.0;
    }

    if h < 60.0 {
        m1 + (m2 - m1) * h / 60.0
    } else if h < 180.0 {
        m2
    } else if h < 240.0 {
        m1 + (m2 - m1) * (240.0 - h) / 60.0
    } else {
        m1
    }
}

/// Decode DECDLD glyph data: glyphs separated by `;`, sixel rows by `/`.
///
/// Each glyph becomes `cell_height` rows of `cell_width` bits (bit 0 is the
/// leftmost column).
pub fn decode_soft_glyphs(data: &[u8], cell_width: usize, cell_height: usize) -> Vec<Vec<u16>> {
    let cell_width = cell_width.clamp(1, 16);
    let cell_height = cell_height.clamp(1, 32);
    data.split(|&b| b == b';')
        .map(|glyph| {
            let mut rows = vec![0u16; cell_height];
            for (band, sixels) in glyph.split(|&b| b == b'/').enumerate() {
                for (col, &byte) in sixels
                    .iter()
                    .filter(|b| (0x3F..=0x7E).contains(*b))
                    .take(cell_width)
                    .enumerate()
                {
                    let bits = byte - 0x3F;
                    for bit in 0..6 {
                        let row = band * 6 + bit;
                        if row < cell_height && bits & (1 << bit) != 0 {
                            rows[row] |= 1 << col;
                        }
                    }
                }
            }
            rows
        })
        .collect()
}
