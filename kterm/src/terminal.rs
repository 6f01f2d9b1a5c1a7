//! Terminal: the session array, the input pipeline and split-screen compositing
//!
//! A [`Terminal`] owns up to [`MAX_SESSIONS`] sessions, each with its own
//! bounded input ring. Producers append with the `write_*` methods; an
//! external frame loop calls [`Terminal::process_pending`] once per tick.
//! Gateway routing (which session receives `KTERM` commands and graphics
//! output) is resolved here, between sessions.

use std::fmt;
use std::time::Instant;

use kterm_core::{Dimensions, RenderFrame};
use serde::Serialize;

use crate::config::{Config, MAX_SESSIONS};
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::gateway::{self, GatewayCommand, GatewayRequest, GatewayTargets};
use crate::host::{NullHost, TerminalHost};
use crate::pipeline::{FrameBudget, InputRing};
use crate::session::{GraphicsKind, Session, SessionConfig};

/// Bytes between time-budget checks
const BUDGET_CHECK_INTERVAL: usize = 16;

/// Split-screen layout: rows `0..row` from `top`, the rest from `bottom`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Split {
    pub row: usize,
    pub top: usize,
    pub bottom: usize,
}

/// Snapshot of one session for [`Terminal::status`]
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub index: usize,
    pub level: String,
    pub cols: usize,
    pub rows: usize,
    pub pending_input: usize,
    pub input_overflow: bool,
    pub dropped_input: u64,
    pub diagnostics: Diagnostics,
}

/// Snapshot of the whole terminal
#[derive(Debug, Clone, Serialize)]
pub struct TerminalStatus {
    pub active: usize,
    pub split: Option<Split>,
    pub gateway_targets: GatewayTargets,
    pub avg_ns_per_byte: f64,
    pub sessions: Vec<SessionStatus>,
}

impl TerminalStatus {
    /// Whether any input ring dropped bytes
    pub fn input_overflow(&self) -> bool {
        self.sessions.iter().any(|s| s.input_overflow)
    }
}

/// Multi-session terminal
pub struct Terminal<H: TerminalHost = NullHost> {
    sessions: Vec<Session>,
    inputs: Vec<InputRing>,
    budget: FrameBudget,
    host: H,
    /// Session that receives keyboard and locator input
    active: usize,
    split: Option<Split>,
    targets: GatewayTargets,
}

impl Terminal<NullHost> {
    /// Terminal with default settings and no host
    pub fn with_defaults() -> Self {
        Self::build(&Config::default(), NullHost)
    }
}

impl<H: TerminalHost> Terminal<H> {
    /// Create a terminal from a validated configuration
    pub fn new(config: &Config, host: H) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, host))
    }

    fn build(config: &Config, host: H) -> Self {
        let count = config.sessions.clamp(1, MAX_SESSIONS);
        let session_config = SessionConfig::from_config(config);
        let sessions = (0..count)
            .map(|i| Session::new(i, session_config.clone()))
            .collect();
        let inputs = (0..count)
            .map(|_| InputRing::new(config.pipeline.input_capacity))
            .collect();
        log::debug!(
            "terminal: {} sessions of {}x{} at {}",
            count,
            config.columns,
            config.rows,
            config.level()
        );
        Self {
            sessions,
            inputs,
            budget: FrameBudget::new(&config.pipeline),
            host,
            active: 0,
            split: None,
            targets: GatewayTargets::default(),
        }
    }

    fn check(&self, index: usize) -> Result<usize> {
        if index < self.sessions.len() {
            Ok(index)
        } else {
            Err(Error::InvalidSession(index))
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, index: usize) -> Result<&Session> {
        let index = self.check(index)?;
        Ok(&self.sessions[index])
    }

    pub fn session_mut(&mut self, index: usize) -> Result<&mut Session> {
        let index = self.check(index)?;
        Ok(&mut self.sessions[index])
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn active(&self) -> usize {
        self.active
    }

    /// Choose the session that receives keyboard and locator input
    pub fn set_active(&mut self, index: usize) -> Result<()> {
        self.active = self.check(index)?;
        Ok(())
    }

    pub fn active_session(&self) -> &Session {
        &self.sessions[self.active]
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn gateway_targets(&self) -> GatewayTargets {
        self.targets
    }

    /// Queue one byte; returns false if the ring was full and it was dropped
    pub fn write_byte(&mut self, session: usize, byte: u8) -> Result<bool> {
        Ok(self.write_bytes(session, &[byte])? == 1)
    }

    /// Queue bytes; returns how many fit in the ring
    pub fn write_bytes(&mut self, session: usize, bytes: &[u8]) -> Result<usize> {
        let index = self.check(session)?;
        let accepted = self.inputs[index].extend(bytes);
        if accepted < bytes.len() {
            self.sessions[index].diagnostics_mut().overflow(format_args!(
                "input ring full, {} bytes dropped",
                bytes.len() - accepted
            ));
        }
        Ok(accepted)
    }

    pub fn write_str(&mut self, session: usize, text: &str) -> Result<usize> {
        self.write_bytes(session, text.as_bytes())
    }

    /// Queue formatted text, e.g. `term.write_fmt(0, format_args!("\x1b[{}H", row))`
    pub fn write_fmt(&mut self, session: usize, args: fmt::Arguments<'_>) -> Result<usize> {
        match args.as_str() {
            Some(text) => self.write_str(session, text),
            None => self.write_str(session, &args.to_string()),
        }
    }

    /// Drain the input rings under the frame budget; returns bytes processed.
    ///
    /// Sessions are visited in index order. Whatever does not fit in this
    /// tick stays queued, including half-parsed sequences.
    pub fn process_pending(&mut self) -> usize {
        let tick = Instant::now();
        let mut total = 0;
        for index in 0..self.sessions.len() {
            let backlog = self.inputs[index].len();
            if backlog == 0 {
                continue;
            }
            let target = self.budget.target(backlog);
            let started = Instant::now();
            let mut done = 0;
            while done < target {
                if done % BUDGET_CHECK_INTERVAL == 0 && done > 0 && !self.budget.has_time(tick.elapsed()) {
                    log::trace!("session {}: frame budget spent after {} bytes", index, done);
                    break;
                }
                let Some(byte) = self.inputs[index].pop() else {
                    break;
                };
                self.step(index, byte);
                done += 1;
            }
            self.budget.record(done, started.elapsed());
            self.finish(index);
            total += done;
        }
        total
    }

    /// Feed bytes to a session immediately, bypassing its input ring
    pub fn process(&mut self, session: usize, bytes: &[u8]) -> Result<()> {
        let index = self.check(session)?;
        for &byte in bytes {
            self.step(index, byte);
        }
        self.finish(index);
        Ok(())
    }

    fn step(&mut self, index: usize, byte: u8) {
        self.sessions[index].process_byte(byte, &mut self.host);
        for request in self.sessions[index].take_gateway_requests() {
            self.dispatch_gateway(index, request);
        }
    }

    /// End of a batch for one session: flush replies, route graphics
    fn finish(&mut self, index: usize) {
        self.sessions[index].finish_batch(&mut self.host);
        for request in self.sessions[index].take_gateway_requests() {
            self.dispatch_gateway(index, request);
        }
        self.route_graphics(index);
    }

    fn route_graphics(&mut self, source: usize) {
        if !self.sessions[source].graphics().has_outbox() {
            return;
        }
        for kind in GraphicsKind::ALL {
            let batch = self.sessions[source].graphics_mut().take_outbox(kind);
            if batch.is_empty() {
                continue;
            }
            let target = self.targets.graphics_target(kind, source);
            log::trace!("{:?} output of session {} to session {}", kind, source, target);
            self.sessions[target].graphics_mut().layer.apply(kind, batch);
        }
    }

    /// Execute a `KTERM` gateway command issued by session `issuer`
    fn dispatch_gateway(&mut self, issuer: usize, request: GatewayRequest) {
        let command = match GatewayCommand::decode(&request) {
            Ok(command) => command,
            Err(e) => {
                self.sessions[issuer]
                    .diagnostics_mut()
                    .malformed(format_args!("gateway {}: {}", request.command, e));
                return;
            }
        };
        match command {
            GatewayCommand::SetTarget(target, index) => {
                if index < self.sessions.len() {
                    self.targets.set(target, Some(index));
                } else {
                    self.sessions[issuer]
                        .diagnostics_mut()
                        .malformed(format_args!("gateway target session {} out of range", index));
                }
            }
            GatewayCommand::ResetTarget(target) => self.targets.set(target, None),
            GatewayCommand::Init(target) => {
                self.targets.set(target, Some(issuer));
                if let Some(kind) = target.graphics() {
                    gateway::reset_graphics(&mut self.sessions[issuer], Some(kind));
                }
            }
            GatewayCommand::SetDebug(on) => {
                for session in &mut self.sessions {
                    session.set_debug(on);
                }
            }
            GatewayCommand::Resize { cols, rows } => {
                let reference = self.sessions[issuer].screen();
                let cols = cols.unwrap_or_else(|| reference.cols());
                let rows = rows.unwrap_or_else(|| reference.rows());
                self.resize(cols, rows);
            }
            command => {
                let target = self.targets.session.unwrap_or(issuer);
                if let Some(report) =
                    gateway::apply_command(&mut self.sessions[target], &request, &command)
                {
                    self.sessions[issuer].respond(report.as_bytes(), &mut self.host);
                }
            }
        }
    }

    /// Resize every session
    pub fn resize(&mut self, cols: usize, rows: usize) {
        for session in &mut self.sessions {
            session.resize(cols, rows);
        }
        if let Some(split) = self.split {
            if split.row >= rows {
                log::warn!("split row {} past new height {}, split cleared", split.row, rows);
                self.split = None;
            }
        }
    }

    /// Full reset of every session and of the gateway routing
    pub fn reset(&mut self) {
        for (session, input) in self.sessions.iter_mut().zip(&mut self.inputs) {
            session.reset();
            input.clear();
            input.clear_overflow();
        }
        self.targets = GatewayTargets::default();
    }

    /// Show `top` above row `row` and `bottom` from row `row` down
    pub fn set_split(&mut self, row: usize, top: usize, bottom: usize) -> Result<()> {
        let top = self.check(top)?;
        let bottom = self.check(bottom)?;
        let rows = self.sessions[top].screen().rows();
        if row == 0 || row >= rows {
            return Err(Error::config(
                "split.row",
                format!("must be between 1 and {}", rows.saturating_sub(1)),
            ));
        }
        self.split = Some(Split { row, top, bottom });
        Ok(())
    }

    pub fn clear_split(&mut self) {
        self.split = None;
    }

    pub fn split(&self) -> Option<Split> {
        self.split
    }

    /// The viewport: the active session, or the split composition of two
    pub fn composite(&self) -> RenderFrame {
        let Some(split) = self.split else {
            return self.sessions[self.active].render();
        };
        let top = self.sessions[split.top].render();
        let bottom = self.sessions[split.bottom].render();
        let dims = Dimensions::new(top.cols, top.rows);
        let mut frame = RenderFrame::blank(dims.cols, dims.rows);
        frame.splice_rows(&top, 0, 0, split.row);
        frame.splice_rows(&bottom, 0, split.row, dims.rows - split.row);

        frame.cursor = if self.active == split.bottom && self.active != split.top {
            let mut cursor = bottom.cursor;
            cursor.row += split.row;
            cursor.visible &= cursor.row < dims.rows && cursor.col < dims.cols;
            cursor
        } else {
            let mut cursor = top.cursor;
            cursor.visible &= cursor.row < split.row;
            cursor
        };
        frame
    }

    /// Counters and flags for every session
    pub fn status(&self) -> TerminalStatus {
        TerminalStatus {
            active: self.active,
            split: self.split,
            gateway_targets: self.targets,
            avg_ns_per_byte: self.budget.avg_ns_per_byte(),
            sessions: self
                .sessions
                .iter()
                .zip(&self.inputs)
                .map(|(session, input)| SessionStatus {
                    index: session.index(),
                    level: session.conformance().level.to_string(),
                    cols: session.screen().cols(),
                    rows: session.screen().rows(),
                    pending_input: input.len(),
                    input_overflow: input.overflowed(),
                    dropped_input: input.dropped(),
                    diagnostics: session.diagnostics().clone(),
                })
                .collect(),
        }
    }

    /// Clear the overflow flags reported by [`Terminal::status`]
    pub fn clear_overflow(&mut self) {
        for input in &mut self.inputs {
            input.clear_overflow();
        }
    }

    /// Locator motion on the active session (1-based cell coordinates)
    pub fn locator_moved(&mut self, row: usize, col: usize) {
        self.sessions[self.active].locator_moved(row, col, &mut self.host);
    }

    /// Locator button on the active session
    pub fn locator_button(&mut self, button: u8, pressed: bool) {
        self.sessions[self.active].locator_button(button, pressed, &mut self.host);
    }

    /// DECUDK string programmed for a function key on the active session
    pub fn user_defined_key(&self, key: u16) -> Option<&[u8]> {
        self.sessions[self.active].user_defined_key(key)
    }
}

impl<H: TerminalHost> fmt::Debug for Terminal<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Terminal")
            .field("sessions", &self.sessions)
            .field("active", &self.active)
            .field("split", &self.split)
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;

    fn terminal(cols: usize, rows: usize) -> Terminal<RecordingHost> {
        let config = Config {
            columns: cols,
            rows,
            ..Config::default()
        };
        Terminal::new(&config, RecordingHost::new()).expect("valid config")
    }

    #[test]
    fn test_terminal_new() {
        let term = terminal(80, 24);
        assert_eq!(term.session_count(), MAX_SESSIONS);
        assert_eq!(term.session(0).map(|s| s.screen().cols()).ok(), Some(80));
        assert!(matches!(term.session(3), Err(Error::InvalidSession(3))));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            columns: 1,
            ..Config::default()
        };
        assert!(matches!(
            Terminal::new(&config, NullHost),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_write_then_process_pending() {
        let mut term = terminal(20, 5);
        term.write_str(0, "Hello").expect("session 0");
        term.write_fmt(1, format_args!("\x1b[{};{}H{}", 2, 3, "x"))
            .expect("session 1");
        assert_eq!(term.session(0).map(|s| s.screen().row_text(0)).ok(), Some(String::new()));
        assert_eq!(term.process_pending(), 5 + 7);
        assert_eq!(term.sessions()[0].screen().row_text(0), "Hello");
        assert_eq!(term.sessions()[1].screen().grid().cell(1, 2).display_char(), 'x');
        assert!(matches!(term.write_byte(5, b'a'), Err(Error::InvalidSession(5))));
    }

    #[test]
    fn test_pending_work_is_capped_per_tick() {
        let mut config = Config {
            columns: 20,
            rows: 5,
            ..Config::default()
        };
        config.pipeline.chars_per_frame = 4;
        config.pipeline.burst_threshold = 1000;
        let mut term = Terminal::new(&config, NullHost).expect("valid config");
        term.write_str(0, "abcdef\x1b[").expect("session 0");
        assert_eq!(term.process_pending(), 4);
        assert_eq!(term.sessions()[0].screen().row_text(0), "abcd");
        assert_eq!(term.process_pending(), 4);
        term.write_str(0, "2;1HZ").expect("session 0");
        term.process_pending();
        term.process_pending();
        assert_eq!(term.sessions()[0].screen().row_text(1), "Z");
    }

    #[test]
    fn test_input_ring_overflow_is_reported() {
        let mut config = Config {
            columns: 20,
            rows: 5,
            ..Config::default()
        };
        config.pipeline.input_capacity = 256;
        let mut term = Terminal::new(&config, NullHost).expect("valid config");
        assert_eq!(term.write_bytes(0, &[b'x'; 258]).ok(), Some(256));
        let status = term.status();
        assert!(status.input_overflow());
        assert_eq!(status.sessions[0].dropped_input, 2);
        assert_eq!(status.sessions[0].diagnostics.overflow, 1);
        term.clear_overflow();
        assert!(!term.status().input_overflow());
    }

    #[test]
    fn test_responses_tagged_with_session() {
        let mut term = terminal(20, 5);
        term.process(2, b"\x1b[5n").expect("session 2");
        assert_eq!(term.host().response_text(2), "\x1b[0n");
        assert!(term.host().responses_for(0).is_empty());
    }

    #[test]
    fn test_gateway_session_target() {
        let mut term = terminal(20, 5);
        term.process(0, b"\x1bPGATE;KTERM;1;SET;SESSION;1\x1b\\")
            .expect("session 0");
        term.process(0, b"\x1bPGATE;KTERM;2;SET;ATTR;BOLD=1\x1b\\")
            .expect("session 0");
        assert!(term.sessions()[1]
            .screen()
            .cursor()
            .attrs
            .has(kterm_core::CellFlags::BOLD));
        assert!(!term.sessions()[0]
            .screen()
            .cursor()
            .attrs
            .has(kterm_core::CellFlags::BOLD));

        term.process(0, b"\x1bPGATE;KTERM;3;GET;OUTPUT\x1b\\")
            .expect("session 0");
        assert_eq!(
            term.host().response_text(0),
            "\x1bPGATE;KTERM;3;REPORT;OUTPUT=1\x1b\\"
        );

        term.process(0, b"\x1bPGATE;KTERM;4;RESET;SESSION\x1b\\")
            .expect("session 0");
        assert_eq!(term.gateway_targets().session, None);
    }

    #[test]
    fn test_gateway_out_of_range_target() {
        let mut term = terminal(20, 5);
        term.process(0, b"\x1bPGATE;KTERM;1;SET;SIXEL_SESSION;9\x1b\\")
            .expect("session 0");
        assert_eq!(term.gateway_targets().sixel, None);
        assert_eq!(term.sessions()[0].diagnostics().malformed, 1);
    }

    #[test]
    fn test_graphics_routed_to_target_session() {
        let mut term = terminal(40, 10);
        term.process(2, b"\x1bPGATE;KTERM;1;INIT;REGIS_SESSION\x1b\\")
            .expect("session 2");
        assert_eq!(term.gateway_targets().regis, Some(2));
        term.process(0, b"\x1bPpP[0,0]V[100,0]\x1b\\").expect("session 0");
        assert!(term.sessions()[0].graphics().layer.regis.is_empty());
        assert_eq!(term.sessions()[2].graphics().layer.regis.lines.len(), 1);
    }

    #[test]
    fn test_gateway_resize_applies_to_all_sessions() {
        let mut term = terminal(40, 10);
        term.process(1, b"\x1bPGATE;KTERM;1;SET;SIZE;50;12\x1b\\")
            .expect("session 1");
        for session in term.sessions() {
            assert_eq!((session.screen().cols(), session.screen().rows()), (50, 12));
        }
    }

    #[test]
    fn test_split_composite() {
        let mut term = terminal(10, 4);
        term.process(0, b"top0\r\ntop1\r\ntop2").expect("session 0");
        term.process(1, b"bot0\r\nbot1").expect("session 1");
        term.set_split(2, 0, 1).expect("valid split");
        let frame = term.composite();
        assert_eq!(frame.row_text(0), "top0");
        assert_eq!(frame.row_text(1), "top1");
        assert_eq!(frame.row_text(2), "bot0");
        assert_eq!(frame.row_text(3), "bot1");

        term.set_active(1).expect("session 1");
        let frame = term.composite();
        assert_eq!((frame.cursor.row, frame.cursor.col), (3, 4));
        assert!(frame.cursor.visible);

        term.clear_split();
        assert_eq!(term.composite().row_text(0), "bot0");
    }

    #[test]
    fn test_split_validation() {
        let mut term = terminal(10, 4);
        assert!(matches!(term.set_split(2, 0, 7), Err(Error::InvalidSession(7))));
        assert!(term.set_split(0, 0, 1).is_err());
        assert!(term.set_split(4, 0, 1).is_err());
        term.set_split(3, 0, 1).expect("valid split");
        term.resize(10, 3);
        assert_eq!(term.split(), None);
    }

    #[test]
    fn test_locator_goes_to_active_session() {
        let mut term = terminal(20, 5);
        term.set_active(1).expect("session 1");
        term.process(1, b"\x1b[1;0'z\x1b[1'{").expect("session 1");
        term.locator_moved(1, 1);
        assert!(term.host().responses_for(1).is_empty());
        term.locator_button(0, true);
        assert_eq!(term.host().response_text(1), "\x1b[2;1;1;1;1&w");
    }

    #[test]
    fn test_reset_clears_rings_and_routing() {
        let mut term = terminal(20, 5);
        term.process(0, b"\x1bPGATE;KTERM;1;SET;SESSION;2\x1b\\ok")
            .expect("session 0");
        term.write_str(1, "queued").expect("session 1");
        term.reset();
        assert_eq!(term.gateway_targets(), GatewayTargets::default());
        assert_eq!(term.process_pending(), 0);
        assert_eq!(term.sessions()[0].screen().row_text(0), "");
    }
}
