//! Tektronix 4014 vector mode
//!
//! While the session is in Tektronix mode the parser routes ground-state
//! bytes here instead of printing them. Graph mode packs each point into up
//! to five bytes (Hi-Y, Extra, Lo-Y, Hi-X, Lo-X); Lo-X completes the point.

use kterm_core::Rgb;

use crate::vector::{Canvas, Segment, WriteMode};

/// Horizontal advance of one alpha-mode character
pub const CHAR_ADVANCE: i32 = 56;
/// Line height in alpha mode
pub const LINE_HEIGHT: i32 = 88;

const BEAM: Rgb = Rgb::new(0, 255, 0);

/// Output of the Tektronix decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TekEvent {
    /// Vector drawn in graph mode
    Line(Segment),
    /// Character drawn in alpha mode at the beam position
    Text { ch: char, x: i32, y: i32 },
    /// Page erase (FF)
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Alpha,
    Graph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastByte {
    None,
    HiY,
    LoY,
    HiX,
    LoX,
}

#[derive(Debug, Clone)]
pub struct TekParser {
    mode: Mode,
    /// False until the first point after GS; that point only moves the beam
    pen_down: bool,
    hi_x: i32,
    lo_x: i32,
    hi_y: i32,
    lo_y: i32,
    extra: i32,
    last: LastByte,
    x: i32,
    y: i32,
}

impl Default for TekParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TekParser {
    pub fn new() -> Self {
        Self {
            mode: Mode::Alpha,
            pen_down: false,
            hi_x: 0,
            lo_x: 0,
            hi_y: 0,
            lo_y: 0,
            extra: 0,
            last: LastByte::None,
            x: 0,
            y: Self::top_line(),
        }
    }

    fn top_line() -> i32 {
        Canvas::TEKTRONIX.height as i32 - LINE_HEIGHT
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Beam position in Tektronix coordinates (origin bottom-left)
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn is_graph_mode(&self) -> bool {
        self.mode == Mode::Graph
    }

    pub fn feed(&mut self, byte: u8) -> Option<TekEvent> {
        match byte {
            0x1D => {
                // GS: graph mode, next point is a move
                self.mode = Mode::Graph;
                self.pen_down = false;
                self.last = LastByte::None;
                None
            }
            0x1F => {
                self.mode = Mode::Alpha;
                None
            }
            0x0D => {
                self.mode = Mode::Alpha;
                self.x = 0;
                None
            }
            0x0C => {
                self.mode = Mode::Alpha;
                self.x = 0;
                self.y = Self::top_line();
                Some(TekEvent::Clear)
            }
            _ => match self.mode {
                Mode::Graph => self.graph_byte(byte),
                Mode::Alpha => self.alpha_byte(byte),
            },
        }
    }

    fn graph_byte(&mut self, byte: u8) -> Option<TekEvent> {
        let value = (byte & 0x1F) as i32;
        match byte {
            0x20..=0x3F => {
                if self.last == LastByte::LoY {
                    self.hi_x = value;
                    self.last = LastByte::HiX;
                } else {
                    self.hi_y = value;
                    self.last = LastByte::HiY;
                }
                None
            }
            0x60..=0x7F => {
                // two Lo-Y bytes in a row: the first was the Extra byte
                if self.last == LastByte::LoY {
                    self.extra = self.lo_y;
                }
                self.lo_y = value;
                self.last = LastByte::LoY;
                None
            }
            0x40..=0x5F => {
                self.lo_x = value;
                self.last = LastByte::LoX;
                self.complete_point()
            }
            _ => None,
        }
    }

    fn complete_point(&mut self) -> Option<TekEvent> {
        let x = (self.hi_x << 7) | (self.lo_x << 2) | (self.extra & 3);
        let y = (self.hi_y << 7) | (self.lo_y << 2) | ((self.extra >> 2) & 3);
        let (x, y) = Canvas::TEKTRONIX.clamp(x, y);
        let event = if self.pen_down {
            Some(TekEvent::Line(Segment {
                x0: self.x,
                y0: self.y,
                x1: x,
                y1: y,
                color: BEAM,
                mode: WriteMode::Overlay,
            }))
        } else {
            self.pen_down = true;
            None
        };
        self.x = x;
        self.y = y;
        event
    }

    fn alpha_byte(&mut self, byte: u8) -> Option<TekEvent> {
        match byte {
            0x08 => {
                self.x = (self.x - CHAR_ADVANCE).max(0);
                None
            }
            0x09 => {
                self.advance();
                None
            }
            0x0A => {
                self.line_down();
                None
            }
            0x0B => {
                self.y = (self.y + LINE_HEIGHT).min(Self::top_line());
                None
            }
            0x20..=0x7E => {
                let event = TekEvent::Text {
                    ch: byte as char,
                    x: self.x,
                    y: self.y,
                };
                self.advance();
                Some(event)
            }
            _ => None,
        }
    }

    fn advance(&mut self) {
        self.x += CHAR_ADVANCE;
        if self.x + CHAR_ADVANCE > Canvas::TEKTRONIX.width as i32 {
            self.x = 0;
            self.line_down();
        }
    }

    fn line_down(&mut self) {
        self.y -= LINE_HEIGHT;
        if self.y < 0 {
            self.y = Self::top_line();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(x: i32, y: i32) -> [u8; 5] {
        [
            0x20 | ((y >> 7) & 0x1F) as u8,
            0x60 | (((y & 3) << 2) | (x & 3)) as u8,
            0x60 | ((y >> 2) & 0x1F) as u8,
            0x20 | ((x >> 7) & 0x1F) as u8,
            0x40 | ((x >> 2) & 0x1F) as u8,
        ]
    }

    fn feed_all(tek: &mut TekParser, bytes: &[u8]) -> Vec<TekEvent> {
        bytes.iter().filter_map(|&b| tek.feed(b)).collect()
    }

    #[test]
    fn test_first_point_moves_second_draws() {
        let mut tek = TekParser::new();
        let mut bytes = vec![0x1D];
        bytes.extend_from_slice(&encode(100, 200));
        bytes.extend_from_slice(&encode(301, 402));
        let events = feed_all(&mut tek, &bytes);
        assert_eq!(events.len(), 1);
        match events[0] {
            TekEvent::Line(seg) => {
                assert_eq!((seg.x0, seg.y0), (100, 200));
                assert_eq!((seg.x1, seg.y1), (301, 402));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_short_form_keeps_high_bytes() {
        let mut tek = TekParser::new();
        let mut bytes = vec![0x1D];
        bytes.extend_from_slice(&encode(512, 512));
        // only Lo-Y and Lo-X change
        bytes.push(0x60 | ((520 >> 2) & 0x1F) as u8);
        bytes.push(0x40 | ((516 >> 2) & 0x1F) as u8);
        let events = feed_all(&mut tek, &bytes);
        assert_eq!(events.len(), 1);
        assert_eq!(tek.position(), (516, 520));
    }

    #[test]
    fn test_alpha_text_advances() {
        let mut tek = TekParser::new();
        let events = feed_all(&mut tek, b"\x1fAB");
        let top = 3120 - LINE_HEIGHT;
        assert_eq!(
            events,
            vec![
                TekEvent::Text { ch: 'A', x: 0, y: top },
                TekEvent::Text { ch: 'B', x: CHAR_ADVANCE, y: top },
            ]
        );
        feed_all(&mut tek, b"\r\n");
        assert_eq!(tek.position(), (0, top - LINE_HEIGHT));
    }

    #[test]
    fn test_form_feed_clears_and_homes() {
        let mut tek = TekParser::new();
        feed_all(&mut tek, b"\x1fxyz");
        assert_eq!(tek.feed(0x0C), Some(TekEvent::Clear));
        assert_eq!(tek.position(), (0, 3120 - LINE_HEIGHT));
        assert!(!tek.is_graph_mode());
    }

    #[test]
    fn test_gs_lifts_pen() {
        let mut tek = TekParser::new();
        let mut bytes = vec![0x1D];
        bytes.extend_from_slice(&encode(10, 10));
        bytes.extend_from_slice(&encode(20, 20));
        bytes.push(0x1D);
        bytes.extend_from_slice(&encode(30, 30));
        let events = feed_all(&mut tek, &bytes);
        assert_eq!(events.len(), 1);
        assert!(tek.is_graph_mode());
    }
}
