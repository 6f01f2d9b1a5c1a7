//! ReGIS vector graphics interpreter
//!
//! The parser collects the payload between `DCS p` and ST; the interpreter
//! executes it against state that persists for the session (position, write
//! controls, macrographs, alphabets). Output is a list of canvas-space line
//! segments plus text, erase requests and reports.
//!
//! Macrographs replay through an explicit frame stack, never recursion.

use std::collections::HashMap;

use kterm_core::Rgb;

use crate::error::ParseError;
use crate::vector::{Canvas, Segment, WriteMode};

/// Deepest macrograph nesting allowed
pub const MAX_MACRO_DEPTH: usize = 16;
/// Bytes an execution may consume, macro expansion included
const MAX_STEPS: usize = 1 << 22;
const SPLINE_SEGMENTS: usize = 10;
const ARC_STEP_DEGREES: f64 = 5.0;
const CHAR_WIDTH: i32 = 9;

/// VT340 ReGIS color map
const DEFAULT_COLORS: [Rgb; 16] = [
    Rgb::new(0, 0, 0),
    Rgb::new(51, 51, 204),
    Rgb::new(204, 33, 33),
    Rgb::new(51, 204, 51),
    Rgb::new(204, 51, 204),
    Rgb::new(51, 204, 204),
    Rgb::new(204, 204, 51),
    Rgb::new(135, 135, 135),
    Rgb::new(66, 66, 66),
    Rgb::new(84, 84, 153),
    Rgb::new(153, 66, 66),
    Rgb::new(84, 153, 84),
    Rgb::new(153, 84, 153),
    Rgb::new(84, 153, 153),
    Rgb::new(153, 153, 84),
    Rgb::new(204, 204, 204),
];

/// Default writing color index
const DEFAULT_INK: usize = 7;

fn letter_color(c: u8) -> Option<Rgb> {
    let rgb = match c.to_ascii_uppercase() {
        b'D' => Rgb::new(0, 0, 0),
        b'B' => Rgb::new(0, 0, 255),
        b'R' => Rgb::new(255, 0, 0),
        b'G' => Rgb::new(0, 255, 0),
        b'M' => Rgb::new(255, 0, 255),
        b'C' => Rgb::new(0, 255, 255),
        b'Y' => Rgb::new(255, 255, 0),
        b'W' => Rgb::new(255, 255, 255),
        _ => return None,
    };
    Some(rgb)
}

/// Text drawn by the `T` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisText {
    pub x: i32,
    pub y: i32,
    pub text: String,
    pub color: Rgb,
    pub size: u8,
}

/// A loadable character set (`L` command)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alphabet {
    pub name: String,
    /// Glyph rows by character
    pub glyphs: HashMap<char, Vec<u8>>,
}

/// Result of one execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisOutput {
    pub segments: Vec<Segment>,
    pub texts: Vec<RegisText>,
    /// `S(E)` was seen: clear the graphics plane first
    pub erase: bool,
    /// Report strings for the host (`R` command)
    pub reports: Vec<String>,
    pub errors: Vec<ParseError>,
}

/// Persistent ReGIS state
#[derive(Debug, Clone)]
pub struct RegisInterpreter {
    x: i32,
    y: i32,
    colors: [Rgb; 16],
    color: Rgb,
    mode: WriteMode,
    pattern: u8,
    background: Rgb,
    text_size: u8,
    macros: HashMap<char, Vec<u8>>,
    alphabets: [Alphabet; 4],
    alphabet: usize,
    /// (x, y, bounded) pushed by `(B)` / `(S)`
    position_stack: Vec<(i32, i32, bool)>,
}

impl Default for RegisInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisInterpreter {
    pub fn new() -> Self {
        Self {
            x: 0,
            y: 0,
            colors: DEFAULT_COLORS,
            color: DEFAULT_COLORS[DEFAULT_INK],
            mode: WriteMode::Overlay,
            pattern: 0xFF,
            background: DEFAULT_COLORS[0],
            text_size: 1,
            macros: HashMap::new(),
            alphabets: Default::default(),
            alphabet: 0,
            position_stack: Vec::new(),
        }
    }

    /// Current beam position
    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn macro_body(&self, name: char) -> Option<&[u8]> {
        self.macros.get(&name.to_ascii_uppercase()).map(|v| v.as_slice())
    }

    pub fn alphabet(&self, index: usize) -> Option<&Alphabet> {
        self.alphabets.get(index)
    }

    /// Execute a payload
    pub fn execute(&mut self, data: &[u8]) -> RegisOutput {
        let mut exec = Exec::new(data);
        exec.run(self);
        exec.out
    }
}

#[derive(Debug)]
struct Frame {
    data: Vec<u8>,
    pos: usize,
}

#[derive(Debug)]
struct Curve {
    closed: bool,
    /// Points seen so far, kept for closing the loop
    head: Vec<(i32, i32)>,
    /// Sliding 4-point window
    window: Vec<(i32, i32)>,
    last: (i32, i32),
}

#[derive(Debug, Clone, PartialEq)]
enum OptValue {
    None,
    Number(i32),
    Group(Vec<u8>),
}

/// Transient state of one `execute` call
struct Exec {
    frames: Vec<Frame>,
    steps: usize,
    out: RegisOutput,
    command: Option<u8>,
    arc: Option<f64>,
    center_at_point: bool,
    curve: Option<Curve>,
    fill_pending: bool,
    fill: Option<Vec<(i32, i32)>>,
    /// Write controls to restore when the command ends
    saved_write: Option<(Rgb, WriteMode)>,
}

impl Exec {
    fn new(data: &[u8]) -> Self {
        Self {
            frames: vec![Frame {
                data: data.to_vec(),
                pos: 0,
            }],
            steps: 0,
            out: RegisOutput::default(),
            command: None,
            arc: None,
            center_at_point: false,
            curve: None,
            fill_pending: false,
            fill: None,
            saved_write: None,
        }
    }

    fn next(&mut self) -> Option<u8> {
        if self.steps >= MAX_STEPS {
            return None;
        }
        while let Some(frame) = self.frames.last_mut() {
            if let Some(&b) = frame.data.get(frame.pos) {
                frame.pos += 1;
                self.steps += 1;
                return Some(b);
            }
            self.frames.pop();
        }
        None
    }

    fn peek(&self) -> Option<u8> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.data.get(f.pos).copied())
    }

    fn run(&mut self, regis: &mut RegisInterpreter) {
        while let Some(b) = self.next() {
            match b.to_ascii_uppercase() {
                cmd @ (b'P' | b'V' | b'C' | b'T' | b'W' | b'S' | b'L' | b'R') => {
                    self.begin_command(regis, Some(cmd));
                }
                b'F' => {
                    self.begin_command(regis, Some(b'F'));
                    self.fill_pending = true;
                }
                b'@' => self.macro_op(regis),
                b'[' => {
                    let arg = self.read_delimited(b'[', b']', "coordinate");
                    self.coordinate(regis, &arg);
                }
                b'(' if self.fill_pending => {
                    self.fill_pending = false;
                    self.fill = Some(vec![(regis.x, regis.y)]);
                    self.command = None;
                }
                b'(' => {
                    let arg = self.read_delimited(b'(', b')', "option list");
                    self.options(regis, &arg);
                }
                b')' if self.fill.is_some() => self.finish_fill(regis),
                q @ (b'\'' | b'"') => {
                    let text = self.read_string(q);
                    self.string(regis, text);
                }
                d @ b'0'..=b'7' if matches!(self.command, Some(b'P' | b'V')) => {
                    self.pixel_vector(regis, d - b'0');
                }
                b';' => self.begin_command(regis, None),
                b'G' | b'H' | b'I' | b'J' | b'K' | b'M' | b'N' | b'O' | b'Q' | b'U' | b'X' | b'Y'
                | b'Z' => {
                    log::debug!("ReGIS: unsupported command {}", b as char);
                    self.out.errors.push(ParseError::UnsupportedRegis(b as char));
                    self.begin_command(regis, None);
                }
                _ => {}
            }
        }
        if self.steps >= MAX_STEPS {
            log::warn!("ReGIS: execution stopped after {} bytes", MAX_STEPS);
        }
        self.begin_command(regis, None);
        if self.fill.is_some() {
            self.out.errors.push(ParseError::Unterminated("fill"));
            self.finish_fill(regis);
        }
    }

    fn begin_command(&mut self, regis: &mut RegisInterpreter, cmd: Option<u8>) {
        if self.curve.is_some() {
            self.finish_curve(regis);
        }
        if let Some((color, mode)) = self.saved_write.take() {
            regis.color = color;
            regis.mode = mode;
        }
        self.command = cmd;
        self.arc = None;
        self.center_at_point = false;
        self.fill_pending = false;
    }

    /// Read up to the matching close, honoring nesting and quotes
    fn read_delimited(&mut self, open: u8, close: u8, what: &'static str) -> Vec<u8> {
        let mut out = Vec::new();
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;
        loop {
            let Some(b) = self.next() else {
                self.out.errors.push(ParseError::Unterminated(what));
                return out;
            };
            if let Some(q) = quote {
                if b == q {
                    quote = None;
                }
            } else if b == b'\'' || b == b'"' {
                quote = Some(b);
            } else if b == open {
                depth += 1;
            } else if b == close {
                if depth == 0 {
                    return out;
                }
                depth -= 1;
            }
            out.push(b);
        }
    }

    /// Quoted string; a doubled quote stands for itself
    fn read_string(&mut self, quote: u8) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            match self.next() {
                Some(b) if b == quote => {
                    if self.peek() == Some(quote) {
                        self.next();
                        out.push(quote);
                    } else {
                        return out;
                    }
                }
                Some(b) => out.push(b),
                None => {
                    self.out.errors.push(ParseError::Unterminated("string"));
                    return out;
                }
            }
        }
    }

    fn macro_op(&mut self, regis: &mut RegisInterpreter) {
        match self.next() {
            Some(b':') => {
                let Some(name) = self.next() else {
                    return;
                };
                let name = (name as char).to_ascii_uppercase();
                let mut body = Vec::new();
                loop {
                    match self.next() {
                        Some(b'@') if self.peek() == Some(b';') => {
                            self.next();
                            break;
                        }
                        Some(b) => body.push(b),
                        None => {
                            self.out.errors.push(ParseError::Unterminated("macrograph"));
                            break;
                        }
                    }
                }
                log::trace!("ReGIS: macrograph {} defined ({} bytes)", name, body.len());
                regis.macros.insert(name, body);
            }
            Some(b'.') => regis.macros.clear(),
            Some(b';') | None => {}
            Some(c) if c.is_ascii_alphabetic() => {
                let name = (c as char).to_ascii_uppercase();
                if self.frames.len() > MAX_MACRO_DEPTH {
                    if !self.out.errors.contains(&ParseError::MacroDepth(MAX_MACRO_DEPTH)) {
                        log::debug!("ReGIS: macrograph depth limit hit invoking {}", name);
                        self.out.errors.push(ParseError::MacroDepth(MAX_MACRO_DEPTH));
                    }
                    return;
                }
                match regis.macros.get(&name) {
                    Some(body) => self.frames.push(Frame {
                        data: body.clone(),
                        pos: 0,
                    }),
                    None => self.out.errors.push(ParseError::UndefinedMacro(name)),
                }
            }
            Some(_) => {}
        }
    }

    fn coordinate(&mut self, regis: &mut RegisInterpreter, arg: &[u8]) {
        let target = parse_coordinate(arg, (regis.x, regis.y));
        match self.command {
            Some(b'P') => self.move_to(regis, target),
            Some(b'V') => {
                if arg.iter().all(|b| b.is_ascii_whitespace()) {
                    // V[] draws a dot
                    self.line(regis, (regis.x, regis.y), (regis.x, regis.y));
                } else {
                    self.line(regis, (regis.x, regis.y), target);
                    regis.x = target.0;
                    regis.y = target.1;
                }
            }
            Some(b'C') => {
                if self.curve.is_some() {
                    self.curve_point(regis, target);
                } else {
                    self.arc(regis, target);
                }
            }
            _ => {}
        }
    }

    fn move_to(&mut self, regis: &mut RegisInterpreter, to: (i32, i32)) {
        regis.x = to.0;
        regis.y = to.1;
        if let Some(poly) = self.fill.as_mut() {
            poly.push(to);
        }
    }

    /// Emit a segment, or a polygon vertex while filling
    fn line(&mut self, regis: &RegisInterpreter, from: (i32, i32), to: (i32, i32)) {
        if let Some(poly) = self.fill.as_mut() {
            if poly.last() != Some(&from) {
                poly.push(from);
            }
            poly.push(to);
            return;
        }
        let color = if regis.mode == WriteMode::Erase {
            regis.background
        } else {
            regis.color
        };
        self.out.segments.push(Segment {
            x0: from.0,
            y0: from.1,
            x1: to.0,
            y1: to.1,
            color,
            mode: regis.mode,
        });
    }

    fn pixel_vector(&mut self, regis: &mut RegisInterpreter, dir: u8) {
        const DELTAS: [(i32, i32); 8] = [
            (1, 0),
            (1, -1),
            (0, -1),
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, 1),
            (1, 1),
        ];
        let (dx, dy) = DELTAS[dir as usize & 7];
        let target = Canvas::REGIS.clamp(regis.x + dx, regis.y + dy);
        if self.command == Some(b'V') {
            self.line(regis, (regis.x, regis.y), target);
            regis.x = target.0;
            regis.y = target.1;
        } else {
            self.move_to(regis, target);
        }
    }

    fn arc(&mut self, regis: &mut RegisInterpreter, point: (i32, i32)) {
        let here = (regis.x, regis.y);
        let (center, start) = if self.center_at_point {
            (point, here)
        } else {
            (here, point)
        };
        let dx = (start.0 - center.0) as f64;
        let dy = (start.1 - center.1) as f64;
        let radius = (dx * dx + dy * dy).sqrt();
        if radius < 0.5 {
            self.line(regis, center, center);
            return;
        }
        let sweep = self.arc.unwrap_or(360.0);
        // screen y grows downward; positive sweep is counterclockwise on screen
        let start_angle = (-dy).atan2(dx);
        let steps = ((sweep.abs() / ARC_STEP_DEGREES).ceil() as usize).max(1);
        let step = sweep.to_radians() / steps as f64;
        let mut prev = start;
        for i in 1..=steps {
            let a = start_angle + step * i as f64;
            let p = Canvas::REGIS.clamp(
                (center.0 as f64 + radius * a.cos()).round() as i32,
                (center.1 as f64 - radius * a.sin()).round() as i32,
            );
            self.line(regis, prev, p);
            prev = p;
        }
    }

    fn start_curve(&mut self, regis: &RegisInterpreter, closed: bool) {
        let here = (regis.x, regis.y);
        let window = if closed { vec![here] } else { vec![here, here] };
        self.curve = Some(Curve {
            closed,
            head: vec![here],
            window,
            last: here,
        });
    }

    fn curve_point(&mut self, regis: &mut RegisInterpreter, p: (i32, i32)) {
        if let Some(curve) = self.curve.as_mut() {
            if curve.head.len() < 3 {
                curve.head.push(p);
            }
            curve.last = p;
        }
        regis.x = p.0;
        regis.y = p.1;
        self.push_spline_point(regis, p);
    }

    fn push_spline_point(&mut self, regis: &RegisInterpreter, p: (i32, i32)) {
        let Some(curve) = self.curve.as_mut() else {
            return;
        };
        curve.window.push(p);
        if curve.window.len() < 4 {
            return;
        }
        let w = [curve.window[0], curve.window[1], curve.window[2], curve.window[3]];
        curve.window.remove(0);
        let mut prev = spline_point(&w, 0.0);
        for i in 1..=SPLINE_SEGMENTS {
            let next = spline_point(&w, i as f64 / SPLINE_SEGMENTS as f64);
            self.line(regis, prev, next);
            prev = next;
        }
    }

    fn finish_curve(&mut self, regis: &mut RegisInterpreter) {
        let Some(curve) = self.curve.as_ref() else {
            return;
        };
        let tail: Vec<(i32, i32)> = if curve.closed {
            curve.head.clone()
        } else {
            vec![curve.last]
        };
        let last = curve.last;
        for p in tail {
            self.push_spline_point(regis, p);
        }
        self.curve = None;
        regis.x = last.0;
        regis.y = last.1;
    }

    fn finish_fill(&mut self, regis: &RegisInterpreter) {
        let Some(poly) = self.fill.take() else {
            return;
        };
        self.command = None;
        if poly.len() < 3 {
            return;
        }
        let min_y = poly.iter().map(|p| p.1).min().unwrap_or(0);
        let max_y = poly.iter().map(|p| p.1).max().unwrap_or(0);
        let mut nodes: Vec<i32> = Vec::with_capacity(poly.len());
        for y in min_y..=max_y {
            nodes.clear();
            let mut j = poly.len() - 1;
            for i in 0..poly.len() {
                let (xi, yi) = poly[i];
                let (xj, yj) = poly[j];
                if (yi < y && yj >= y) || (yj < y && yi >= y) {
                    let t = (y - yi) as f64 / (yj - yi) as f64;
                    nodes.push((xi as f64 + t * (xj - xi) as f64).round() as i32);
                }
                j = i;
            }
            nodes.sort_unstable();
            for pair in nodes.chunks_exact(2) {
                self.line(regis, (pair[0], y), (pair[1], y));
            }
        }
    }

    fn options(&mut self, regis: &mut RegisInterpreter, arg: &[u8]) {
        let opts = parse_options(arg);
        match self.command {
            Some(b'W') => apply_write(regis, &opts),
            Some(b'S') => {
                for (key, value) in &opts {
                    match key {
                        b'E' => self.out.erase = true,
                        b'I' => {
                            if let Some(c) = color_value(regis, value) {
                                regis.background = c;
                            }
                        }
                        _ => log::trace!("ReGIS: ignoring screen option {}", *key as char),
                    }
                }
            }
            Some(b'C') => {
                for (key, value) in &opts {
                    match (key, value) {
                        (b'A', OptValue::Number(deg)) => self.arc = Some(*deg as f64),
                        (b'C', _) => self.center_at_point = true,
                        (b'S', _) => self.start_curve(regis, false),
                        (b'B', _) => self.start_curve(regis, true),
                        (b'E', _) => self.finish_curve(regis),
                        (b'W', OptValue::Group(g)) => self.temporary_write(regis, g),
                        _ => {}
                    }
                }
            }
            Some(cmd @ (b'V' | b'P')) => {
                for (key, value) in &opts {
                    match (key, value) {
                        (b'B', _) => regis.position_stack.push((regis.x, regis.y, true)),
                        (b'S', _) => regis.position_stack.push((regis.x, regis.y, false)),
                        (b'E', _) => {
                            if let Some((x, y, bounded)) = regis.position_stack.pop() {
                                if bounded && cmd == b'V' {
                                    self.line(regis, (regis.x, regis.y), (x, y));
                                }
                                if bounded {
                                    regis.x = x;
                                    regis.y = y;
                                }
                            }
                        }
                        (b'W', OptValue::Group(g)) => self.temporary_write(regis, g),
                        _ => {}
                    }
                }
            }
            Some(b'T') => {
                for (key, value) in &opts {
                    if let (b'S', OptValue::Number(n)) = (key, value) {
                        regis.text_size = (*n).clamp(1, 16) as u8;
                    }
                }
            }
            Some(b'L') => {
                for (key, value) in &opts {
                    match (key, value) {
                        (b'A', OptValue::Number(n)) => regis.alphabet = (*n).clamp(0, 3) as usize,
                        (b'A' | b'"', OptValue::Group(g)) => {
                            regis.alphabets[regis.alphabet].name = String::from_utf8_lossy(g).into_owned();
                        }
                        _ => {}
                    }
                }
            }
            Some(b'R') => {
                for (key, _) in &opts {
                    match key {
                        b'P' => self.out.reports.push(format!("[{},{}]\r", regis.x, regis.y)),
                        b'E' => self.out.reports.push(format!("\"{},0\"\r", self.out.errors.len())),
                        _ => {
                            log::debug!("ReGIS: unsupported report {}", *key as char);
                            self.out.errors.push(ParseError::UnsupportedRegis('R'));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn temporary_write(&mut self, regis: &mut RegisInterpreter, group: &[u8]) {
        if self.saved_write.is_none() {
            self.saved_write = Some((regis.color, regis.mode));
        }
        apply_write(regis, &parse_options(group));
    }

    fn string(&mut self, regis: &mut RegisInterpreter, text: Vec<u8>) {
        match self.command {
            Some(b'T') => {
                let text = String::from_utf8_lossy(&text).into_owned();
                let advance = text.chars().count() as i32 * CHAR_WIDTH * regis.text_size as i32;
                self.out.texts.push(RegisText {
                    x: regis.x,
                    y: regis.y,
                    text,
                    color: regis.color,
                    size: regis.text_size,
                });
                regis.x = (regis.x + advance).min(Canvas::REGIS.width as i32 - 1);
            }
            Some(b'L') => {
                let Some(ch) = String::from_utf8_lossy(&text).chars().next() else {
                    return;
                };
                // glyph rows follow as comma separated hex bytes
                let mut rows = Vec::new();
                let mut current: Option<u8> = None;
                while let Some(b) = self.peek() {
                    if let Some(d) = (b as char).to_digit(16) {
                        current = Some(current.unwrap_or(0).wrapping_mul(16).wrapping_add(d as u8));
                    } else if b == b',' {
                        rows.push(current.take().unwrap_or(0));
                    } else {
                        break;
                    }
                    self.next();
                }
                if let Some(v) = current {
                    rows.push(v);
                }
                regis.alphabets[regis.alphabet].glyphs.insert(ch, rows);
            }
            _ => {}
        }
    }
}

fn apply_write(regis: &mut RegisInterpreter, opts: &[(u8, OptValue)]) {
    for (key, value) in opts {
        match key {
            b'I' => {
                if let Some(c) = color_value(regis, value) {
                    regis.color = c;
                }
            }
            b'V' => regis.mode = WriteMode::Overlay,
            b'R' => regis.mode = WriteMode::Replace,
            b'E' => regis.mode = WriteMode::Erase,
            b'C' => regis.mode = WriteMode::Complement,
            b'P' => {
                if let OptValue::Number(n) = value {
                    regis.pattern = (*n).clamp(0, 255) as u8;
                }
            }
            _ => log::trace!("ReGIS: ignoring write option {}", *key as char),
        }
    }
}

/// `I2`, `I(2)` or `I(R)`
fn color_value(regis: &RegisInterpreter, value: &OptValue) -> Option<Rgb> {
    match value {
        OptValue::Number(n) => Some(regis.colors[(*n).rem_euclid(16) as usize]),
        OptValue::Group(g) => {
            let g: Vec<u8> = g.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
            match g.first() {
                Some(b) if b.is_ascii_digit() => std::str::from_utf8(&g)
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .map(|i| regis.colors[i % 16]),
                Some(&b) => letter_color(b),
                None => None,
            }
        }
        OptValue::None => None,
    }
}

fn parse_coordinate(arg: &[u8], current: (i32, i32)) -> (i32, i32) {
    let text = String::from_utf8_lossy(arg);
    let mut parts = text.splitn(2, ',');
    let x = resolve_axis(parts.next(), current.0);
    let y = resolve_axis(parts.next(), current.1);
    Canvas::REGIS.clamp(x, y)
}

fn resolve_axis(token: Option<&str>, current: i32) -> i32 {
    let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
        return current;
    };
    let Ok(value) = token.parse::<i32>() else {
        return current;
    };
    if token.starts_with('+') || token.starts_with('-') {
        current.saturating_add(value)
    } else {
        value
    }
}

/// Split an option list into `(letter, value)` pairs
fn parse_options(arg: &[u8]) -> Vec<(u8, OptValue)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < arg.len() {
        let b = arg[i];
        i += 1;
        if b == b'\'' || b == b'"' {
            // bare quoted text, e.g. an alphabet name
            let end = arg[i..].iter().position(|&c| c == b).map_or(arg.len(), |p| i + p);
            out.push((b'"', OptValue::Group(arg[i..end].to_vec())));
            i = (end + 1).min(arg.len());
            continue;
        }
        if !b.is_ascii_alphabetic() {
            continue;
        }
        let key = b.to_ascii_uppercase();
        while i < arg.len() && arg[i] == b' ' {
            i += 1;
        }
        let value = match arg.get(i) {
            Some(b'(') => {
                let start = i + 1;
                let mut depth = 0usize;
                let mut end = start;
                while end < arg.len() {
                    match arg[end] {
                        b'(' => depth += 1,
                        b')' if depth == 0 => break,
                        b')' => depth -= 1,
                        _ => {}
                    }
                    end += 1;
                }
                i = (end + 1).min(arg.len());
                OptValue::Group(arg[start..end.min(arg.len())].to_vec())
            }
            Some(&q @ (b'\'' | b'"')) => {
                let start = i + 1;
                let end = arg[start..]
                    .iter()
                    .position(|&c| c == q)
                    .map_or(arg.len(), |p| start + p);
                i = (end + 1).min(arg.len());
                OptValue::Group(arg[start..end].to_vec())
            }
            Some(c) if c.is_ascii_digit() || *c == b'+' || *c == b'-' => {
                let start = i;
                i += 1;
                while i < arg.len() && arg[i].is_ascii_digit() {
                    i += 1;
                }
                let n = std::str::from_utf8(&arg[start..i])
                    .ok()
                    .and_then(|s| s.parse::<i32>().ok())
                    .unwrap_or(0);
                OptValue::Number(n)
            }
            _ => OptValue::None,
        };
        out.push((key, value));
    }
    out
}

/// Uniform cubic B-spline over a 4-point window
fn spline_point(w: &[(i32, i32); 4], t: f64) -> (i32, i32) {
    let t2 = t * t;
    let t3 = t2 * t;
    let b0 = (1.0 - t).powi(3) / 6.0;
    let b1 = (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0;
    let b2 = (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0;
    let b3 = t3 / 6.0;
    let x = b0 * w[0].0 as f64 + b1 * w[1].0 as f64 + b2 * w[2].0 as f64 + b3 * w[3].0 as f64;
    let y = b0 * w[0].1 as f64 + b1 * w[1].1 as f64 + b2 * w[2].1 as f64 + b3 * w[3].1 as f64;
    Canvas::REGIS.clamp(x.round() as i32, y.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ends(out: &RegisOutput) -> Vec<((i32, i32), (i32, i32))> {
        out.segments
            .iter()
            .map(|s| ((s.x0, s.y0), (s.x1, s.y1)))
            .collect()
    }

    #[test]
    fn test_absolute_then_relative_vector() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"P[0,0]V[100,0]");
        assert_eq!(ends(&out), vec![((0, 0), (100, 0))]);

        let out = regis.execute(b"V[+50,0]");
        assert_eq!(ends(&out), vec![((100, 0), (150, 0))]);
    }

    #[test]
    fn test_coordinates_clamped() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"P[10,10]V[900,600]");
        assert_eq!(ends(&out), vec![((10, 10), (799, 479))]);
    }

    #[test]
    fn test_partial_coordinates() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"P[10,20]V[,40][30]");
        assert_eq!(ends(&out), vec![((10, 20), (10, 40)), ((10, 40), (30, 40))]);
    }

    #[test]
    fn test_macrograph_replay() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"@:AV[+10,0]@;P[0,0]@A@A");
        assert_eq!(ends(&out), vec![((0, 0), (10, 0)), ((10, 0), (20, 0))]);
        assert_eq!(regis.macro_body('a'), Some(&b"V[+10,0]"[..]));
    }

    #[test]
    fn test_self_referencing_macro_is_bounded() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"@:BV[+1,0]@B@;P[0,0]@B");
        assert!(out.errors.contains(&ParseError::MacroDepth(MAX_MACRO_DEPTH)));
        assert_eq!(out.segments.len(), MAX_MACRO_DEPTH);
    }

    #[test]
    fn test_undefined_macro() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"@Q");
        assert_eq!(out.errors, vec![ParseError::UndefinedMacro('Q')]);
    }

    #[test]
    fn test_polygon_fill_scanlines() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"P[0,0]F(V[10,0][10,10][0,10][0,0])");
        assert_eq!(out.segments.len(), 10);
        for seg in &out.segments {
            assert_eq!((seg.x0, seg.x1), (0, 10));
            assert_eq!(seg.y0, seg.y1);
        }
    }

    #[test]
    fn test_circle_steps() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"P[100,100]C[110,100]");
        assert_eq!(out.segments.len(), 72);
        let first = out.segments[0];
        assert_eq!((first.x0, first.y0), (110, 100));
        let last = out.segments[71];
        assert_eq!((last.x1, last.y1), (110, 100));
        assert_eq!(regis.position(), (100, 100));
    }

    #[test]
    fn test_arc_quarter() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"P[100,100]C(A90)[110,100]");
        assert_eq!(out.segments.len(), 18);
        let last = out.segments[17];
        // counterclockwise on screen ends above the center
        assert_eq!((last.x1, last.y1), (100, 90));
    }

    #[test]
    fn test_open_curve_ends_at_last_point() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"P[10,10]C(S)[20,0][30,10][40,0](E)");
        assert_eq!(out.segments.len() % SPLINE_SEGMENTS, 0);
        assert!(!out.segments.is_empty());
        assert_eq!(regis.position(), (40, 0));
    }

    #[test]
    fn test_write_color_and_mode() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"W(I2)P[0,0]V[1,1]W(I(G),C)V[2,2]");
        assert_eq!(out.segments[0].color, DEFAULT_COLORS[2]);
        assert_eq!(out.segments[1].color, Rgb::new(0, 255, 0));
        assert_eq!(out.segments[1].mode, WriteMode::Complement);
    }

    #[test]
    fn test_temporary_write_restored() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"P[0,0]V(W(I1))[5,0]V[10,0]");
        assert_eq!(out.segments[0].color, DEFAULT_COLORS[1]);
        assert_eq!(out.segments[1].color, DEFAULT_COLORS[DEFAULT_INK]);
    }

    #[test]
    fn test_screen_erase_text_and_report() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"S(E)P[10,20]T'Hi'R(P)");
        assert!(out.erase);
        assert_eq!(out.texts[0].text, "Hi");
        assert_eq!((out.texts[0].x, out.texts[0].y), (10, 20));
        assert_eq!(out.reports, vec![format!("[{},20]\r", 10 + 2 * CHAR_WIDTH)]);
    }

    #[test]
    fn test_load_alphabet() {
        let mut regis = RegisInterpreter::new();
        regis.execute(b"L(A1'TEST')\"a\"FF,81,FF");
        let alpha = regis.alphabet(1).cloned().unwrap_or_default();
        assert_eq!(alpha.name, "TEST");
        assert_eq!(alpha.glyphs.get(&'a'), Some(&vec![0xFF, 0x81, 0xFF]));
    }

    #[test]
    fn test_bounded_vector_closes() {
        let mut regis = RegisInterpreter::new();
        let out = regis.execute(b"P[0,0]V(B)[10,0][10,10](E)");
        assert_eq!(ends(&out).last(), Some(&((10, 10), (0, 0))));
    }
}
