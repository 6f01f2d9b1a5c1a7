//! UTF-8 decoding for the terminal parser
//!
//! Streaming decoder with four states (expecting 0..=3 continuation bytes).
//! A broken sequence yields U+FFFD and the byte that broke it is handed back
//! so the caller can reprocess it as the start of a fresh sequence.

/// UTF-8 decoder state
#[derive(Debug, Clone, Default)]
pub struct Utf8Decoder {
    /// Codepoint bits accumulated so far
    codepoint: u32,
    /// Continuation bytes still expected
    remaining: u8,
    /// Total length of the sequence being decoded
    length: u8,
}

/// Result of feeding a byte to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf8Result {
    /// Need more bytes
    Pending,
    /// Successfully decoded a character
    Char(char),
    /// Invalid sequence; emit a replacement character
    Invalid,
    /// Sequence broken by this byte; emit a replacement and reprocess the byte
    InvalidReprocess(u8),
}

impl Utf8Decoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the decoder state
    pub fn reset(&mut self) {
        self.codepoint = 0;
        self.remaining = 0;
        self.length = 0;
    }

    /// Check if decoder is in the middle of a sequence
    pub fn is_pending(&self) -> bool {
        self.remaining > 0
    }

    /// Feed a byte to the decoder
    pub fn feed(&mut self, byte: u8) -> Utf8Result {
        if self.remaining == 0 {
            return self.start(byte);
        }

        if byte & 0b1100_0000 != 0b1000_0000 {
            self.reset();
            return Utf8Result::InvalidReprocess(byte);
        }

        self.codepoint = (self.codepoint << 6) | (byte & 0x3F) as u32;
        self.remaining -= 1;
        if self.remaining > 0 {
            return Utf8Result::Pending;
        }

        let cp = self.codepoint;
        let overlong = match self.length {
            2 => cp < 0x80,
            3 => cp < 0x800,
            _ => cp < 0x10000,
        };
        self.reset();
        if overlong {
            return Utf8Result::Invalid;
        }
        // from_u32 rejects surrogates and values above U+10FFFF
        char::from_u32(cp).map_or(Utf8Result::Invalid, Utf8Result::Char)
    }

    fn start(&mut self, byte: u8) -> Utf8Result {
        let (bits, length) = match byte {
            0x00..=0x7F => return Utf8Result::Char(byte as char),
            0xC0..=0xDF => (byte & 0x1F, 2),
            0xE0..=0xEF => (byte & 0x0F, 3),
            0xF0..=0xF7 => (byte & 0x07, 4),
            _ => return Utf8Result::Invalid,
        };
        self.codepoint = bits as u32;
        self.length = length;
        self.remaining = length - 1;
        Utf8Result::Pending
    }

    /// Get the replacement character for invalid sequences
    pub fn replacement_char() -> char {
        '\u{FFFD}'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.feed(b'A'), Utf8Result::Char('A'));
        assert_eq!(decoder.feed(b'z'), Utf8Result::Char('z'));
    }

    #[test]
    fn test_two_byte() {
        let mut decoder = Utf8Decoder::new();
        // 'é' = U+00E9 = 0xC3 0xA9
        assert_eq!(decoder.feed(0xC3), Utf8Result::Pending);
        assert_eq!(decoder.feed(0xA9), Utf8Result::Char('é'));
    }

    #[test]
    fn test_three_byte() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.feed(0xE4), Utf8Result::Pending);
        assert_eq!(decoder.feed(0xB8), Utf8Result::Pending);
        assert_eq!(decoder.feed(0xAD), Utf8Result::Char('中'));
    }

    #[test]
    fn test_four_byte() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.feed(0xF0), Utf8Result::Pending);
        assert_eq!(decoder.feed(0x9F), Utf8Result::Pending);
        assert_eq!(decoder.feed(0x98), Utf8Result::Pending);
        assert_eq!(decoder.feed(0x80), Utf8Result::Char('😀'));
    }

    #[test]
    fn test_invalid_start() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.feed(0xFF), Utf8Result::Invalid);
        assert_eq!(decoder.feed(0x80), Utf8Result::Invalid);
    }

    #[test]
    fn test_invalid_continuation_resyncs() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.feed(0xC3), Utf8Result::Pending);
        assert_eq!(decoder.feed(b'A'), Utf8Result::InvalidReprocess(b'A'));
        assert!(!decoder.is_pending());
        // broken by a new lead byte: it starts the next sequence
        assert_eq!(decoder.feed(0xE4), Utf8Result::Pending);
        assert_eq!(decoder.feed(0xC3), Utf8Result::InvalidReprocess(0xC3));
        assert_eq!(decoder.feed(0xC3), Utf8Result::Pending);
        assert_eq!(decoder.feed(0xA9), Utf8Result::Char('é'));
    }

    #[test]
    fn test_overlong_encoding() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.feed(0xC1), Utf8Result::Pending);
        assert_eq!(decoder.feed(0x81), Utf8Result::Invalid);
    }

    #[test]
    fn test_surrogate_rejected() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.feed(0xED), Utf8Result::Pending);
        assert_eq!(decoder.feed(0xA0), Utf8Result::Pending);
        assert_eq!(decoder.feed(0x80), Utf8Result::Invalid);
    }

    #[test]
    fn test_reset() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.feed(0xC3), Utf8Result::Pending);
        assert!(decoder.is_pending());
        decoder.reset();
        assert!(!decoder.is_pending());
    }
}
