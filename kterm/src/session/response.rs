//! Bounded response buffer
//!
//! Replies are built in 7-bit form and converted to 8-bit C1 controls when
//! S8C1T is active. The buffer is flushed to the host when a new reply
//! would not fit; a reply larger than the whole buffer is truncated.

use crate::diagnostics::Diagnostics;
use crate::host::TerminalHost;

#[derive(Debug, Clone)]
pub struct ResponseBuffer {
    buf: Vec<u8>,
    capacity: usize,
    eight_bit: bool,
    enabled: bool,
}

impl ResponseBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity.min(4096)),
            capacity: capacity.max(1),
            eight_bit: false,
            enabled: true,
        }
    }

    /// S7C1T / S8C1T
    pub fn set_eight_bit(&mut self, on: bool) {
        self.eight_bit = on;
    }

    pub fn eight_bit(&self) -> bool {
        self.eight_bit
    }

    /// Gateway `OUTPUT;ON|OFF`
    pub fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Queue a reply written with 7-bit escapes
    pub fn push(
        &mut self,
        reply: &[u8],
        session: usize,
        host: &mut dyn TerminalHost,
        diag: &mut Diagnostics,
    ) {
        if !self.enabled || reply.is_empty() {
            return;
        }
        let mut bytes = if self.eight_bit {
            to_eight_bit(reply)
        } else {
            reply.to_vec()
        };
        if bytes.len() > self.capacity {
            diag.overflow(format_args!(
                "response of {} bytes truncated to {}",
                bytes.len(),
                self.capacity
            ));
            bytes.truncate(self.capacity);
        }
        if self.buf.len() + bytes.len() > self.capacity {
            self.flush(session, host);
        }
        self.buf.extend_from_slice(&bytes);
    }

    pub fn flush(&mut self, session: usize, host: &mut dyn TerminalHost) {
        if !self.buf.is_empty() {
            host.response(session, &self.buf);
            self.buf.clear();
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// Replace `ESC Fe` pairs (Fe in 0x40..=0x5F) with the single C1 byte
fn to_eight_bit(reply: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(reply.len());
    let mut i = 0;
    while i < reply.len() {
        match (reply[i], reply.get(i + 1)) {
            (0x1B, Some(&next)) if (0x40..=0x5F).contains(&next) => {
                out.push(next + 0x40);
                i += 2;
            }
            (b, _) => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;

    #[test]
    fn test_eight_bit_conversion() {
        assert_eq!(to_eight_bit(b"\x1b[0n"), b"\x9b0n");
        assert_eq!(to_eight_bit(b"\x1bP1$r0m\x1b\\"), b"\x901$r0m\x9c");
        assert_eq!(to_eight_bit(b"\x1b/Z"), b"\x1b/Z");
    }

    #[test]
    fn test_flush_before_overflowing() {
        let mut host = RecordingHost::new();
        let mut diag = Diagnostics::default();
        let mut buf = ResponseBuffer::new(8);
        buf.push(b"12345", 0, &mut host, &mut diag);
        assert!(host.responses.is_empty());
        buf.push(b"6789", 0, &mut host, &mut diag);
        assert_eq!(host.responses, vec![(0, b"12345".to_vec())]);
        assert_eq!(buf.pending(), b"6789");
    }

    #[test]
    fn test_oversized_reply_is_truncated() {
        let mut host = RecordingHost::new();
        let mut diag = Diagnostics::default();
        let mut buf = ResponseBuffer::new(4);
        buf.push(b"abcdefgh", 2, &mut host, &mut diag);
        buf.flush(2, &mut host);
        assert_eq!(host.responses_for(2), b"abcd");
        assert_eq!(diag.overflow, 1);
    }

    #[test]
    fn test_disabled_output_drops_replies() {
        let mut host = RecordingHost::new();
        let mut diag = Diagnostics::default();
        let mut buf = ResponseBuffer::new(64);
        buf.set_enabled(false);
        buf.push(b"\x1b[0n", 0, &mut host, &mut diag);
        buf.flush(0, &mut host);
        assert!(host.responses.is_empty());
    }
}
