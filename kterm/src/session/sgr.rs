//! SGR - Select Graphic Rendition

use kterm_core::{CellAttributes, CellFlags, Color};
use kterm_parser::CsiAction;

use super::Session;

/// Color selected by an extended `38` / `48` parameter
enum Extended {
    Color(Color),
    Invalid,
}

impl Session {
    pub(super) fn handle_sgr(&mut self, csi: &CsiAction) {
        let true_color = self.conformance.features.true_color;
        let attrs = &mut self.screen.cursor_mut().attrs;

        if csi.params.is_empty() {
            reset_rendition(attrs);
            return;
        }

        let params: Vec<(u16, &[u16])> = csi.params.iter_with_subparams().collect();
        let mut i = 0;
        while i < params.len() {
            let (param, sub) = params[i];
            match param {
                0 => reset_rendition(attrs),
                1 => attrs.set(CellFlags::BOLD, true),
                2 => attrs.set(CellFlags::FAINT, true),
                3 => attrs.set(CellFlags::ITALIC, true),
                4 => {
                    // 4:0 off, 4:2 double, other styles draw as single
                    attrs.set(CellFlags::UNDERLINE | CellFlags::DOUBLE_UNDERLINE, false);
                    match sub.first() {
                        Some(0) => {}
                        Some(2) => attrs.set(CellFlags::DOUBLE_UNDERLINE, true),
                        _ => attrs.set(CellFlags::UNDERLINE, true),
                    }
                }
                5 | 6 => attrs.set(CellFlags::BLINK, true),
                7 => attrs.set(CellFlags::REVERSE, true),
                8 => attrs.set(CellFlags::CONCEAL, true),
                9 => attrs.set(CellFlags::STRIKE, true),
                21 => attrs.set(CellFlags::DOUBLE_UNDERLINE, true),
                22 => attrs.set(CellFlags::BOLD | CellFlags::FAINT, false),
                23 => attrs.set(CellFlags::ITALIC, false),
                24 => attrs.set(CellFlags::UNDERLINE | CellFlags::DOUBLE_UNDERLINE, false),
                25 => attrs.set(CellFlags::BLINK, false),
                27 => attrs.set(CellFlags::REVERSE, false),
                28 => attrs.set(CellFlags::CONCEAL, false),
                29 => attrs.set(CellFlags::STRIKE, false),
                30..=37 => attrs.fg = Color::Indexed((param - 30) as u8),
                38 | 48 => {
                    let (color, consumed) = if sub.is_empty() {
                        let rest: Vec<u16> = params[i + 1..].iter().map(|(p, _)| *p).collect();
                        extended_color(&rest)
                    } else {
                        (extended_color_colon(sub), 0)
                    };
                    i += consumed;
                    match color {
                        Extended::Color(color) => {
                            let color = if true_color { color } else { downgrade(color) };
                            if param == 38 {
                                attrs.fg = color;
                            } else {
                                attrs.bg = color;
                            }
                        }
                        Extended::Invalid => {
                            log::debug!("SGR {}: malformed extended color", param);
                        }
                    }
                }
                39 => attrs.fg = Color::DEFAULT_FG,
                40..=47 => attrs.bg = Color::Indexed((param - 40) as u8),
                49 => attrs.bg = Color::DEFAULT_BG,
                53 => attrs.set(CellFlags::OVERLINE, true),
                55 => attrs.set(CellFlags::OVERLINE, false),
                90..=97 => {
                    // Bright foreground colors
                    attrs.fg = Color::Indexed((param - 90 + 8) as u8);
                }
                100..=107 => {
                    // Bright background colors
                    attrs.bg = Color::Indexed((param - 100 + 8) as u8);
                }
                _ => {
                    log::debug!("Unknown SGR parameter: {}", param);
                }
            }
            i += 1;
        }
    }
}

/// SGR 0: drop rendition and colors, keep DECSCA protection
fn reset_rendition(attrs: &mut CellAttributes) {
    let protected = attrs.has(CellFlags::PROTECTED);
    attrs.reset();
    attrs.set(CellFlags::PROTECTED, protected);
}

/// `5;n` or `2;r;g;b` following a 38/48; returns the color and the
/// number of parameters consumed
fn extended_color(rest: &[u16]) -> (Extended, usize) {
    match rest.first() {
        Some(5) => match rest.get(1) {
            Some(&n) if n <= 255 => (Extended::Color(Color::Indexed(n as u8)), 2),
            Some(_) => (Extended::Invalid, 2),
            None => (Extended::Invalid, 1),
        },
        Some(2) if rest.len() >= 4 => (rgb(rest[1], rest[2], rest[3]), 4),
        Some(2) => (Extended::Invalid, rest.len()),
        Some(_) => (Extended::Invalid, 1),
        None => (Extended::Invalid, 0),
    }
}

/// Colon form: `38:5:n`, `38:2:r:g:b` or `38:2:cs:r:g:b`
fn extended_color_colon(sub: &[u16]) -> Extended {
    match sub {
        [5, n, ..] if *n <= 255 => Extended::Color(Color::Indexed(*n as u8)),
        [2, _, r, g, b, ..] => rgb(*r, *g, *b),
        [2, r, g, b] => rgb(*r, *g, *b),
        _ => Extended::Invalid,
    }
}

fn rgb(r: u16, g: u16, b: u16) -> Extended {
    if r > 255 || g > 255 || b > 255 {
        return Extended::Invalid;
    }
    Extended::Color(Color::rgb(r as u8, g as u8, b as u8))
}

/// Map a direct color to the nearest entry of the 256-color palette
fn downgrade(color: Color) -> Color {
    match color {
        Color::Rgb { r, g, b } => Color::Indexed(nearest_indexed(r, g, b)),
        indexed => indexed,
    }
}

const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

fn nearest_indexed(r: u8, g: u8, b: u8) -> u8 {
    let level = |v: u8| -> usize {
        CUBE_LEVELS
            .iter()
            .enumerate()
            .min_by_key(|(_, &l)| (l as i32 - v as i32).abs())
            .map(|(i, _)| i)
            .unwrap_or(0)
    };
    let (ri, gi, bi) = (level(r), level(g), level(b));
    let cube = (CUBE_LEVELS[ri], CUBE_LEVELS[gi], CUBE_LEVELS[bi]);
    let cube_index = 16 + 36 * ri + 6 * gi + bi;

    let avg = (r as u32 + g as u32 + b as u32) / 3;
    let gray_step = (avg.saturating_sub(8) / 10).min(23);
    let gray = (8 + gray_step * 10) as u8;
    let gray_index = 232 + gray_step as usize;

    let dist = |(cr, cg, cb): (u8, u8, u8)| -> i32 {
        let d = |a: u8, b: u8| (a as i32 - b as i32).pow(2);
        d(r, cr) + d(g, cg) + d(b, cb)
    };
    if dist((gray, gray, gray)) < dist(cube) {
        gray_index as u8
    } else {
        cube_index as u8
    }
}
