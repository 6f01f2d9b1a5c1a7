//! Sequence diagnostics
//!
//! Nothing in the byte stream is fatal. Problems are counted here and the
//! text of the last unsupported sequence is kept for inspection.

use std::fmt;

use serde::Serialize;

/// Category of a stream problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// Known syntax with no handler, or gated off by the conformance level
    Unsupported,
    /// Overflowed or otherwise broken sequence
    Malformed,
    /// Input ring, escape buffer or response buffer overflow
    Overflow,
    /// Invalid UTF-8
    Decode,
}

/// Per-session diagnostic counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub unsupported: u64,
    pub malformed: u64,
    pub overflow: u64,
    pub decode: u64,
    /// Text of the most recent unsupported or malformed sequence
    pub last_sequence: String,
    /// Log per-sequence detail at debug instead of trace
    #[serde(skip)]
    pub debug: bool,
}

const LAST_SEQUENCE_MAX: usize = 128;

impl Diagnostics {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    /// Count a problem and remember its text
    pub fn record(&mut self, kind: DiagnosticKind, what: fmt::Arguments<'_>) {
        match kind {
            DiagnosticKind::Unsupported => self.unsupported += 1,
            DiagnosticKind::Malformed => self.malformed += 1,
            DiagnosticKind::Overflow => self.overflow += 1,
            DiagnosticKind::Decode => self.decode += 1,
        }
        if matches!(kind, DiagnosticKind::Unsupported | DiagnosticKind::Malformed) {
            self.last_sequence.clear();
            fmt::write(&mut self.last_sequence, what).ok();
            if self.last_sequence.len() > LAST_SEQUENCE_MAX {
                let mut end = LAST_SEQUENCE_MAX;
                while !self.last_sequence.is_char_boundary(end) {
                    end -= 1;
                }
                self.last_sequence.truncate(end);
            }
        }
        match kind {
            DiagnosticKind::Overflow => log::warn!("{:?}: {}", kind, what),
            _ if self.debug => log::debug!("{:?}: {}", kind, what),
            _ => log::trace!("{:?}: {}", kind, what),
        }
    }

    pub fn unsupported(&mut self, what: fmt::Arguments<'_>) {
        self.record(DiagnosticKind::Unsupported, what);
    }

    pub fn malformed(&mut self, what: fmt::Arguments<'_>) {
        self.record(DiagnosticKind::Malformed, what);
    }

    pub fn overflow(&mut self, what: fmt::Arguments<'_>) {
        self.record(DiagnosticKind::Overflow, what);
    }

    /// Per-command detail, gated by the debug flag
    pub fn trace(&self, what: fmt::Arguments<'_>) {
        if self.debug {
            log::debug!("{}", what);
        } else {
            log::trace!("{}", what);
        }
    }

    pub fn total(&self) -> u64 {
        self.unsupported + self.malformed + self.overflow + self.decode
    }

    /// Zero the counters, keeping the debug flag
    pub fn reset(&mut self) {
        *self = Self::new(self.debug);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_kind() {
        let mut diag = Diagnostics::new(false);
        diag.unsupported(format_args!("CSI 99 z"));
        diag.malformed(format_args!("CSI overflow"));
        diag.overflow(format_args!("input ring full"));
        diag.record(DiagnosticKind::Decode, format_args!("bad utf-8"));
        assert_eq!(diag.unsupported, 1);
        assert_eq!(diag.malformed, 1);
        assert_eq!(diag.overflow, 1);
        assert_eq!(diag.decode, 1);
        assert_eq!(diag.total(), 4);
        assert_eq!(diag.last_sequence, "CSI overflow");
    }

    #[test]
    fn test_last_sequence_is_bounded() {
        let mut diag = Diagnostics::new(true);
        let long = "é".repeat(200);
        diag.unsupported(format_args!("{}", long));
        assert!(diag.last_sequence.len() <= LAST_SEQUENCE_MAX);
        diag.reset();
        assert_eq!(diag.total(), 0);
        assert!(diag.debug);
    }
}
