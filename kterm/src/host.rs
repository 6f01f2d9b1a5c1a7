//! Host callbacks
//!
//! Everything the engine hands back to the outside world goes through a
//! [`TerminalHost`]. Every method has a default so hosts only implement what
//! they care about.

/// Receiver for engine output
pub trait TerminalHost {
    /// Bytes to send back to the application (DSR, DA and other replies)
    fn response(&mut self, session: usize, bytes: &[u8]) {
        log::trace!("session {}: dropping {} response bytes", session, bytes.len());
    }

    /// Printer controller and media copy output
    fn print(&mut self, bytes: &[u8]) {
        log::trace!("printer: {} bytes", bytes.len());
    }

    /// Window or icon title changed
    fn title(&mut self, text: &str, is_icon: bool) {
        log::debug!("{} title: {}", if is_icon { "icon" } else { "window" }, text);
    }

    fn bell(&mut self) {}

    fn notification(&mut self, text: &str) {
        log::debug!("notification: {}", text);
    }

    /// `DCS GATE` message for a class the engine does not handle itself
    fn gateway(&mut self, class: &str, id: &str, command: &str, params: &str) {
        log::debug!("gateway {};{};{};{} not handled", class, id, command, params);
    }

    /// OSC 52 clipboard write, already base64-decoded
    fn clipboard(&mut self, selection: &str, data: &[u8]) {
        log::debug!("clipboard {}: {} bytes", selection, data.len());
    }

    /// Atlas slot for a codepoint above U+00FF
    fn allocate_glyph(&mut self, _codepoint: u32) -> Option<u32> {
        None
    }
}

/// Host that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl TerminalHost for NullHost {}

/// Host that records every callback, for tests and the headless driver
#[derive(Debug, Default, Clone)]
pub struct RecordingHost {
    pub responses: Vec<(usize, Vec<u8>)>,
    pub printed: Vec<u8>,
    pub titles: Vec<(String, bool)>,
    pub bells: usize,
    pub notifications: Vec<String>,
    pub gateway: Vec<(String, String, String, String)>,
    pub clipboard: Vec<(String, Vec<u8>)>,
    next_glyph: u32,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// All responses for one session, concatenated
    pub fn responses_for(&self, session: usize) -> Vec<u8> {
        self.responses
            .iter()
            .filter(|(s, _)| *s == session)
            .flat_map(|(_, b)| b.iter().copied())
            .collect()
    }

    /// Responses for a session as lossy text
    pub fn response_text(&self, session: usize) -> String {
        String::from_utf8_lossy(&self.responses_for(session)).into_owned()
    }

    pub fn clear(&mut self) {
        *self = Self {
            next_glyph: self.next_glyph,
            ..Self::default()
        };
    }
}

impl TerminalHost for RecordingHost {
    fn response(&mut self, session: usize, bytes: &[u8]) {
        self.responses.push((session, bytes.to_vec()));
    }

    fn print(&mut self, bytes: &[u8]) {
        self.printed.extend_from_slice(bytes);
    }

    fn title(&mut self, text: &str, is_icon: bool) {
        self.titles.push((text.to_string(), is_icon));
    }

    fn bell(&mut self) {
        self.bells += 1;
    }

    fn notification(&mut self, text: &str) {
        self.notifications.push(text.to_string());
    }

    fn gateway(&mut self, class: &str, id: &str, command: &str, params: &str) {
        self.gateway.push((
            class.to_string(),
            id.to_string(),
            command.to_string(),
            params.to_string(),
        ));
    }

    fn clipboard(&mut self, selection: &str, data: &[u8]) {
        self.clipboard.push((selection.to_string(), data.to_vec()));
    }

    fn allocate_glyph(&mut self, _codepoint: u32) -> Option<u32> {
        let slot = self.next_glyph;
        self.next_glyph += 1;
        Some(slot)
    }
}
