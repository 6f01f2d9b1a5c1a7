//! Color representation for terminal cells
//!
//! Supports:
//! - 16 standard ANSI colors (0-15, CGA palette)
//! - 256-color palette (0-255), mutable through OSC 4 / OSC 104
//! - 24-bit true color (RGB)
//!
//! A cell color is either an index into the session palette or a literal RGB
//! triple. Default foreground is index 7, default background index 0.

use serde::{Deserialize, Serialize};

/// Color representation supporting all terminal color modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    /// Indexed color (0-255)
    /// 0-7: standard colors
    /// 8-15: bright colors
    /// 16-231: 6x6x6 color cube
    /// 232-255: grayscale
    Indexed(u8),
    /// 24-bit RGB color
    Rgb { r: u8, g: u8, b: u8 },
}

impl Color {
    /// Standard ANSI color indices
    pub const BLACK: u8 = 0;
    pub const RED: u8 = 1;
    pub const GREEN: u8 = 2;
    pub const YELLOW: u8 = 3;
    pub const BLUE: u8 = 4;
    pub const MAGENTA: u8 = 5;
    pub const CYAN: u8 = 6;
    pub const WHITE: u8 = 7;

    /// Default foreground (SGR 39)
    pub const DEFAULT_FG: Color = Color::Indexed(Self::WHITE);
    /// Default background (SGR 49)
    pub const DEFAULT_BG: Color = Color::Indexed(Self::BLACK);

    /// Create a new indexed color
    pub fn indexed(index: u8) -> Self {
        Color::Indexed(index)
    }

    /// Create a new RGB color
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::Rgb { r, g, b }
    }

    /// Resolve to RGB through a palette
    pub fn resolve(&self, palette: &Palette) -> Rgb {
        match *self {
            Color::Indexed(idx) => palette.get(idx),
            Color::Rgb { r, g, b } => Rgb::new(r, g, b),
        }
    }

    /// Value contributed to rectangle / memory checksums.
    ///
    /// Indexed colors contribute their index, RGB colors `(r << 16) | (g << 8) | b`.
    pub fn checksum_value(&self) -> u32 {
        match *self {
            Color::Indexed(idx) => idx as u32,
            Color::Rgb { r, g, b } => ((r as u32) << 16) | ((g as u32) << 8) | b as u32,
        }
    }

    /// Packed RGBA (0xRRGGBBAA) for the render handoff
    pub fn packed(&self, palette: &Palette) -> u32 {
        self.resolve(palette).packed()
    }
}

/// A plain RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pack as 0xRRGGBBAA with full alpha
    pub fn packed(&self) -> u32 {
        ((self.r as u32) << 24) | ((self.g as u32) << 16) | ((self.b as u32) << 8) | 0xFF
    }

    /// Format as an X11 `rgb:rrrr/gggg/bbbb` spec (used in OSC color reports)
    pub fn to_x11_spec(&self) -> String {
        format!(
            "rgb:{:02x}{:02x}/{:02x}{:02x}/{:02x}{:02x}",
            self.r, self.r, self.g, self.g, self.b, self.b
        )
    }
}

/// CGA-style 16 color ANSI palette
pub const ANSI_PALETTE: [Rgb; 16] = [
    Rgb::new(0x00, 0x00, 0x00), // Black
    Rgb::new(0xAA, 0x00, 0x00), // Red
    Rgb::new(0x00, 0xAA, 0x00), // Green
    Rgb::new(0xAA, 0x55, 0x00), // Brown
    Rgb::new(0x00, 0x00, 0xAA), // Blue
    Rgb::new(0xAA, 0x00, 0xAA), // Magenta
    Rgb::new(0x00, 0xAA, 0xAA), // Cyan
    Rgb::new(0xAA, 0xAA, 0xAA), // Light gray
    Rgb::new(0x55, 0x55, 0x55), // Dark gray
    Rgb::new(0xFF, 0x55, 0x55), // Bright red
    Rgb::new(0x55, 0xFF, 0x55), // Bright green
    Rgb::new(0xFF, 0xFF, 0x55), // Yellow
    Rgb::new(0x55, 0x55, 0xFF), // Bright blue
    Rgb::new(0xFF, 0x55, 0xFF), // Bright magenta
    Rgb::new(0x55, 0xFF, 0xFF), // Bright cyan
    Rgb::new(0xFF, 0xFF, 0xFF), // White
];

/// 256-color xterm palette (compile-time generated)
pub const DEFAULT_PALETTE: [Rgb; 256] = generate_palette();

const fn generate_palette() -> [Rgb; 256] {
    let mut palette = [Rgb::new(0, 0, 0); 256];

    // 0-15: ANSI colors
    let mut i = 0;
    while i < 16 {
        palette[i] = ANSI_PALETTE[i];
        i += 1;
    }

    // 16-231: 6x6x6 color cube
    let mut i = 16;
    while i < 232 {
        let idx = (i - 16) as u8;
        let r = idx / 36;
        let g = (idx % 36) / 6;
        let b = idx % 6;
        palette[i] = Rgb::new(cube_level(r), cube_level(g), cube_level(b));
        i += 1;
    }

    // 232-255: grayscale
    let mut i = 232;
    while i < 256 {
        let gray = 8 + ((i - 232) as u8) * 10;
        palette[i] = Rgb::new(gray, gray, gray);
        i += 1;
    }

    palette
}

const fn cube_level(v: u8) -> u8 {
    if v == 0 {
        0
    } else {
        55 + v * 40
    }
}

/// Mutable per-session palette plus the dynamic colors (OSC 10/11/12)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    #[serde(with = "palette_serde")]
    entries: [Rgb; 256],
    /// Dynamic default foreground (OSC 10)
    pub foreground: Rgb,
    /// Dynamic default background (OSC 11)
    pub background: Rgb,
    /// Dynamic cursor color (OSC 12)
    pub cursor: Rgb,
}

impl Palette {
    pub fn new() -> Self {
        Self {
            entries: DEFAULT_PALETTE,
            foreground: DEFAULT_PALETTE[7],
            background: DEFAULT_PALETTE[0],
            cursor: DEFAULT_PALETTE[7],
        }
    }

    /// Look up an entry
    pub fn get(&self, index: u8) -> Rgb {
        self.entries[index as usize]
    }

    /// Overwrite an entry (OSC 4)
    pub fn set(&mut self, index: u8, rgb: Rgb) {
        self.entries[index as usize] = rgb;
    }

    /// Restore a single entry (OSC 104;n)
    pub fn reset_entry(&mut self, index: u8) {
        self.entries[index as usize] = DEFAULT_PALETTE[index as usize];
    }

    /// Restore the full table (OSC 104 without arguments)
    pub fn reset(&mut self) {
        self.entries = DEFAULT_PALETTE;
    }

    /// Restore the dynamic colors
    pub fn reset_dynamic(&mut self) {
        self.foreground = DEFAULT_PALETTE[7];
        self.background = DEFAULT_PALETTE[0];
        self.cursor = DEFAULT_PALETTE[7];
    }

    pub fn entries(&self) -> &[Rgb; 256] {
        &self.entries
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

mod palette_serde {
    use super::Rgb;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(entries: &[Rgb; 256], s: S) -> Result<S::Ok, S::Error> {
        entries.as_slice().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[Rgb; 256], D::Error> {
        let v = Vec::<Rgb>::deserialize(d)?;
        let mut out = super::DEFAULT_PALETTE;
        for (slot, rgb) in out.iter_mut().zip(v) {
            *slot = rgb;
        }
        Ok(out)
    }
}

/// Parse an X11 color spec as used by OSC 4/10/11/12.
///
/// Accepts `rgb:r/g/b` with 1-4 hex digits per channel and `#rrggbb`.
pub fn parse_color_spec(spec: &str) -> Option<Rgb> {
    let spec = spec.trim();
    if let Some(rest) = spec.strip_prefix("rgb:") {
        let mut parts = rest.split('/');
        let r = parse_channel(parts.next()?)?;
        let g = parse_channel(parts.next()?)?;
        let b = parse_channel(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        return Some(Rgb::new(r, g, b));
    }
    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        return Some(Rgb::new(r, g, b));
    }
    None
}

/// Scale a 1-4 digit hex channel to 8 bits
fn parse_channel(s: &str) -> Option<u8> {
    if s.is_empty() || s.len() > 4 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let v = u32::from_str_radix(s, 16).ok()?;
    let max = (1u32 << (4 * s.len())) - 1;
    Some(((v * 255 + max / 2) / max) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_indexed() {
        let color = Color::indexed(1);
        assert_eq!(color, Color::Indexed(1));
    }

    #[test]
    fn test_color_rgb() {
        let color = Color::rgb(255, 128, 64);
        assert_eq!(
            color,
            Color::Rgb {
                r: 255,
                g: 128,
                b: 64
            }
        );
    }

    #[test]
    fn test_standard_colors_resolve() {
        let palette = Palette::new();
        assert_eq!(Color::Indexed(0).resolve(&palette), Rgb::new(0, 0, 0));
        assert_eq!(Color::Indexed(1).resolve(&palette), Rgb::new(0xAA, 0, 0));
        assert_eq!(Color::Indexed(15).resolve(&palette), Rgb::new(255, 255, 255));
    }

    #[test]
    fn test_color_cube_resolve() {
        let palette = Palette::new();
        assert_eq!(Color::Indexed(16).resolve(&palette), Rgb::new(0, 0, 0));
        assert_eq!(Color::Indexed(196).resolve(&palette), Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_grayscale_resolve() {
        let palette = Palette::new();
        assert_eq!(Color::Indexed(232).resolve(&palette), Rgb::new(8, 8, 8));
        assert_eq!(Color::Indexed(255).resolve(&palette), Rgb::new(238, 238, 238));
    }

    #[test]
    fn test_checksum_value() {
        assert_eq!(Color::Indexed(7).checksum_value(), 7);
        assert_eq!(Color::rgb(1, 2, 3).checksum_value(), 0x010203);
    }

    #[test]
    fn test_palette_set_and_reset() {
        let mut palette = Palette::new();
        palette.set(3, Rgb::new(1, 2, 3));
        assert_eq!(palette.get(3), Rgb::new(1, 2, 3));
        palette.reset_entry(3);
        assert_eq!(palette.get(3), ANSI_PALETTE[3]);
    }

    #[test]
    fn test_parse_color_spec() {
        assert_eq!(parse_color_spec("rgb:ff/00/80"), Some(Rgb::new(255, 0, 128)));
        assert_eq!(parse_color_spec("rgb:ffff/0000/0000"), Some(Rgb::new(255, 0, 0)));
        assert_eq!(parse_color_spec("#102030"), Some(Rgb::new(0x10, 0x20, 0x30)));
        assert_eq!(parse_color_spec("rgb:ff/00"), None);
        assert_eq!(parse_color_spec("blue"), None);
    }

    #[test]
    fn test_x11_spec_format() {
        assert_eq!(Rgb::new(0xAB, 0, 0xFF).to_x11_spec(), "rgb:abab/0000/ffff");
    }
}
