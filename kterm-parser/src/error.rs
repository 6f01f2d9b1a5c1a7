//! Payload errors reported by the graphics decoders
//!
//! These never abort the byte stream; decoders collect them so the session
//! can count and log them.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("ReGIS macrograph nesting exceeds {0} levels")]
    MacroDepth(usize),

    #[error("ReGIS macrograph `{0}` is not defined")]
    UndefinedMacro(char),

    #[error("unsupported ReGIS command `{0}`")]
    UnsupportedRegis(char),

    #[error("unterminated ReGIS {0}")]
    Unterminated(&'static str),

    #[error("sixel image truncated at {0} strips")]
    SixelTruncated(usize),
}
