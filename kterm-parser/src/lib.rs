//! kterm parser - VT52 through VT525 and xterm escape sequence parser
//!
//! This crate turns a host byte stream into semantic terminal actions.
//!
//! The parser is designed to:
//! - Handle arbitrary chunk boundaries (streaming)
//! - Be deterministic
//! - Support UTF-8 and ISO 8859-1 text
//! - Parse CSI, OSC, ESC, DCS, APC, PM and SOS sequences
//! - Decode the graphics sub-languages: sixel, ReGIS and Tektronix 4014
//!
//! Reference: https://www.x.org/docs/xterm/ctlseqs.pdf

mod action;
mod error;
mod params;
mod parser;
pub mod regis;
pub mod sixel;
pub mod tektronix;
mod utf8;
pub mod vector;

pub use action::{Action, CsiAction, EscAction, OscAction, Vt52Action};
pub use error::ParseError;
pub use params::{Params, MAX_PARAMS};
pub use parser::{Parser, ParserState, MAX_CSI_LEN, MAX_STRING_LEN};
pub use regis::{RegisInterpreter, RegisOutput, RegisText};
pub use sixel::{decode_soft_glyphs, SixelDecoder, SixelImage, SixelStrip};
pub use tektronix::{TekEvent, TekParser};
pub use utf8::{Utf8Decoder, Utf8Result};
pub use vector::{Canvas, Letterbox, Segment, VectorLine, WriteMode};
