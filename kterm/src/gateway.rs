//! `DCS GATE` gateway protocol
//!
//! Payloads have the form `Class;ID;Command[;Params]`. The `KTERM` class is
//! decoded into a [`GatewayCommand`] and executed by the engine; any other
//! class is handed to [`crate::TerminalHost::gateway`] untouched.
//!
//! Commands that pick sessions (`SET;SESSION;n`, `INIT;SIXEL_SESSION`, ...)
//! only mean something inside a [`crate::Terminal`]. A standalone
//! [`Session`] executes the rest against itself.

use kterm_core::{CellFlags, Color, VtLevel};
use serde::Serialize;
use thiserror::Error;

use crate::config::MAX_DIMENSION;
use crate::session::{GraphicsKind, Session};

/// Class handled by the engine itself
pub const GATEWAY_CLASS: &str = "KTERM";

/// One `DCS GATE` message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    pub class: String,
    pub id: String,
    pub command: String,
    /// Everything after the command, `;`-separated, possibly empty
    pub params: String,
}

impl GatewayRequest {
    /// Parse the payload that follows `GATE;`
    pub fn parse(payload: &str) -> Option<Self> {
        let mut parts = payload.splitn(4, ';');
        let class = parts.next()?.trim();
        let id = parts.next()?.trim();
        let command = parts.next()?.trim();
        if class.is_empty() || command.is_empty() {
            return None;
        }
        Some(Self {
            class: class.to_string(),
            id: id.to_string(),
            command: command.to_ascii_uppercase(),
            params: parts.next().unwrap_or("").to_string(),
        })
    }

    fn args(&self) -> Vec<&str> {
        if self.params.is_empty() {
            Vec::new()
        } else {
            self.params.split(';').map(str::trim).collect()
        }
    }

    /// `DCS GATE;KTERM;id;REPORT;key=value ST`
    pub fn report(&self, key: &str, value: impl std::fmt::Display) -> String {
        format!("\x1bPGATE;{};{};REPORT;{}={}\x1b\\", GATEWAY_CLASS, self.id, key, value)
    }
}

/// Session slots a gateway command can point somewhere else
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Target {
    /// Where session-local gateway commands apply
    Session,
    Regis,
    Tektronix,
    Sixel,
}

impl Target {
    fn from_name(name: &str) -> Option<Target> {
        match name {
            "SESSION" => Some(Target::Session),
            "REGIS_SESSION" => Some(Target::Regis),
            "TEKTRONIX_SESSION" | "TEK_SESSION" => Some(Target::Tektronix),
            "SIXEL_SESSION" => Some(Target::Sixel),
            _ => None,
        }
    }

    /// Graphics whose output this slot redirects
    pub fn graphics(self) -> Option<GraphicsKind> {
        match self {
            Target::Session => None,
            Target::Regis => Some(GraphicsKind::Regis),
            Target::Tektronix => Some(GraphicsKind::Tektronix),
            Target::Sixel => Some(GraphicsKind::Sixel),
        }
    }
}

/// Current session routing; `None` means the issuing session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatewayTargets {
    pub session: Option<usize>,
    pub regis: Option<usize>,
    pub tektronix: Option<usize>,
    pub sixel: Option<usize>,
}

impl GatewayTargets {
    pub fn get(&self, target: Target) -> Option<usize> {
        match target {
            Target::Session => self.session,
            Target::Regis => self.regis,
            Target::Tektronix => self.tektronix,
            Target::Sixel => self.sixel,
        }
    }

    pub fn set(&mut self, target: Target, session: Option<usize>) {
        let slot = match target {
            Target::Session => &mut self.session,
            Target::Regis => &mut self.regis,
            Target::Tektronix => &mut self.tektronix,
            Target::Sixel => &mut self.sixel,
        };
        *slot = session;
    }

    /// Session that receives graphics of `kind` produced by `source`
    pub fn graphics_target(&self, kind: GraphicsKind, source: usize) -> usize {
        let routed = match kind {
            GraphicsKind::Regis => self.regis,
            GraphicsKind::Tektronix => self.tektronix,
            GraphicsKind::Sixel => self.sixel,
        };
        routed.unwrap_or(source)
    }
}

/// One `ATTR` assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrSetting {
    Flag(CellFlags, bool),
    Foreground(u8),
    Background(u8),
}

/// Values readable with `GET`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Level,
    Version,
    Output,
}

/// A decoded `KTERM` command
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCommand {
    SetTarget(Target, usize),
    ResetTarget(Target),
    /// Route a graphics kind to the issuing session and clear it there
    Init(Target),
    SetAttr(Vec<AttrSetting>),
    ResetAttr,
    SetLevel(VtLevel),
    SetDebug(bool),
    SetOutput(bool),
    Resize {
        cols: Option<usize>,
        rows: Option<usize>,
    },
    /// `None` resets every graphics kind
    ResetGraphics(Option<GraphicsKind>),
    ResetTabs {
        every_eight: bool,
    },
    Get(Query),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("unknown command {0}")]
    UnknownCommand(String),

    #[error("{command}: unknown subject {subject:?}")]
    UnknownSubject { command: String, subject: String },

    #[error("{key}: bad value {value:?}")]
    BadValue { key: String, value: String },
}

fn bad_value(key: &str, value: &str) -> GatewayError {
    GatewayError::BadValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, GatewayError> {
    match value.to_ascii_uppercase().as_str() {
        "ON" | "1" | "TRUE" => Ok(true),
        "OFF" | "0" | "FALSE" => Ok(false),
        _ => Err(bad_value(key, value)),
    }
}

fn parse_size(key: &str, value: &str) -> Result<usize, GatewayError> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n.min(MAX_DIMENSION)),
        _ => Err(bad_value(key, value)),
    }
}

fn parse_attr(assignment: &str) -> Result<AttrSetting, GatewayError> {
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| bad_value("ATTR", assignment))?;
    let key = key.trim().to_ascii_uppercase();
    let value = value.trim();
    let flag = match key.as_str() {
        "BOLD" => CellFlags::BOLD,
        "DIM" => CellFlags::FAINT,
        "ITALIC" => CellFlags::ITALIC,
        "UNDERLINE" => CellFlags::UNDERLINE,
        "BLINK" => CellFlags::BLINK,
        "REVERSE" => CellFlags::REVERSE,
        "HIDDEN" => CellFlags::CONCEAL,
        "STRIKE" => CellFlags::STRIKE,
        "FG" | "BG" => {
            let index = value.parse::<u8>().map_err(|_| bad_value(&key, value))?;
            return Ok(if key == "FG" {
                AttrSetting::Foreground(index)
            } else {
                AttrSetting::Background(index)
            });
        }
        _ => {
            return Err(GatewayError::UnknownSubject {
                command: "ATTR".to_string(),
                subject: key,
            })
        }
    };
    Ok(AttrSetting::Flag(flag, parse_bool(&key, value)?))
}

impl GatewayCommand {
    /// Decode a `KTERM` request
    pub fn decode(request: &GatewayRequest) -> Result<GatewayCommand, GatewayError> {
        let args = request.args();
        let subject = args.first().map(|s| s.to_ascii_uppercase()).unwrap_or_default();
        let value = args.get(1).copied().unwrap_or("");
        let unknown = || GatewayError::UnknownSubject {
            command: request.command.clone(),
            subject: subject.clone(),
        };

        match request.command.as_str() {
            "SET" => {
                if let Some(target) = Target::from_name(&subject) {
                    let index = value.parse::<usize>().map_err(|_| bad_value(&subject, value))?;
                    return Ok(GatewayCommand::SetTarget(target, index));
                }
                match subject.as_str() {
                    "ATTR" => args[1..]
                        .iter()
                        .filter(|a| !a.is_empty())
                        .map(|a| parse_attr(a))
                        .collect::<Result<Vec<_>, _>>()
                        .map(GatewayCommand::SetAttr),
                    "LEVEL" => {
                        let level = if value.eq_ignore_ascii_case("XTERM") {
                            Some(VtLevel::Xterm)
                        } else {
                            VtLevel::from_name(value)
                        };
                        level
                            .map(GatewayCommand::SetLevel)
                            .ok_or_else(|| bad_value("LEVEL", value))
                    }
                    "DEBUG" => parse_bool("DEBUG", value).map(GatewayCommand::SetDebug),
                    "OUTPUT" => parse_bool("OUTPUT", value).map(GatewayCommand::SetOutput),
                    "WIDTH" => Ok(GatewayCommand::Resize {
                        cols: Some(parse_size("WIDTH", value)?),
                        rows: None,
                    }),
                    "HEIGHT" => Ok(GatewayCommand::Resize {
                        cols: None,
                        rows: Some(parse_size("HEIGHT", value)?),
                    }),
                    "SIZE" => {
                        let rows = args.get(2).copied().unwrap_or("");
                        Ok(GatewayCommand::Resize {
                            cols: Some(parse_size("SIZE", value)?),
                            rows: Some(parse_size("SIZE", rows)?),
                        })
                    }
                    _ => Err(unknown()),
                }
            }
            "RESET" => {
                if let Some(target) = Target::from_name(&subject) {
                    return Ok(GatewayCommand::ResetTarget(target));
                }
                match subject.as_str() {
                    "GRAPHICS" | "ALL_GRAPHICS" => Ok(GatewayCommand::ResetGraphics(None)),
                    "REGIS" => Ok(GatewayCommand::ResetGraphics(Some(GraphicsKind::Regis))),
                    "TEK" | "TEKTRONIX" => {
                        Ok(GatewayCommand::ResetGraphics(Some(GraphicsKind::Tektronix)))
                    }
                    "SIXEL" => Ok(GatewayCommand::ResetGraphics(Some(GraphicsKind::Sixel))),
                    "ATTR" => Ok(GatewayCommand::ResetAttr),
                    "TABS" => Ok(GatewayCommand::ResetTabs {
                        every_eight: value.eq_ignore_ascii_case("DEFAULT8"),
                    }),
                    _ => Err(unknown()),
                }
            }
            "INIT" => match Target::from_name(&subject) {
                Some(target) if target != Target::Session => Ok(GatewayCommand::Init(target)),
                _ => Err(unknown()),
            },
            "GET" => match subject.as_str() {
                "LEVEL" => Ok(GatewayCommand::Get(Query::Level)),
                "VERSION" => Ok(GatewayCommand::Get(Query::Version)),
                "OUTPUT" => Ok(GatewayCommand::Get(Query::Output)),
                _ => Err(unknown()),
            },
            other => Err(GatewayError::UnknownCommand(other.to_string())),
        }
    }
}

/// Decode and execute a `KTERM` request against one session, returning
/// the report to send back, if any
pub fn apply_to_session(session: &mut Session, request: &GatewayRequest) -> Option<String> {
    match GatewayCommand::decode(request) {
        Ok(command) => apply_command(session, request, &command),
        Err(e) => {
            session
                .diagnostics_mut()
                .malformed(format_args!("gateway {}: {}", request.command, e));
            None
        }
    }
}

/// Execute a decoded command against one session.
///
/// Routing commands have no effect here; they are logged and dropped.
pub fn apply_command(
    session: &mut Session,
    request: &GatewayRequest,
    command: &GatewayCommand,
) -> Option<String> {
    match command {
        GatewayCommand::SetTarget(..) | GatewayCommand::ResetTarget(_) => {
            log::debug!(
                "session {}: gateway routing {:?} needs a terminal",
                session.index(),
                command
            );
        }
        GatewayCommand::Init(target) => {
            if let Some(kind) = target.graphics() {
                reset_graphics(session, Some(kind));
            }
        }
        GatewayCommand::SetAttr(settings) => {
            let attrs = &mut session.screen_mut().cursor_mut().attrs;
            for setting in settings {
                match *setting {
                    AttrSetting::Flag(flag, on) => attrs.set(flag, on),
                    AttrSetting::Foreground(index) => attrs.fg = Color::Indexed(index),
                    AttrSetting::Background(index) => attrs.bg = Color::Indexed(index),
                }
            }
        }
        GatewayCommand::ResetAttr => {
            let attrs = &mut session.screen_mut().cursor_mut().attrs;
            attrs.reset();
            attrs.fg = Color::DEFAULT_FG;
            attrs.bg = Color::DEFAULT_BG;
        }
        GatewayCommand::SetLevel(level) => session.set_level(*level),
        GatewayCommand::SetDebug(on) => session.set_debug(*on),
        GatewayCommand::SetOutput(on) => session.responses_mut().set_enabled(*on),
        GatewayCommand::Resize { cols, rows } => {
            let cols = cols.unwrap_or_else(|| session.screen().cols());
            let rows = rows.unwrap_or_else(|| session.screen().rows());
            session.resize(cols, rows);
        }
        GatewayCommand::ResetGraphics(kind) => reset_graphics(session, *kind),
        GatewayCommand::ResetTabs { every_eight } => {
            let tabs = session.screen_mut().tabs_mut();
            if *every_eight {
                tabs.reset_default(8);
            } else {
                tabs.clear_all();
            }
        }
        GatewayCommand::Get(query) => {
            return Some(match query {
                Query::Level => request.report("LEVEL", session.conformance().level.id()),
                Query::Version => request.report("VERSION", env!("CARGO_PKG_VERSION")),
                Query::Output => {
                    request.report("OUTPUT", u8::from(session.responses().enabled()))
                }
            });
        }
    }
    None
}

/// Drop displayed graphics of one kind, or all of them
pub fn reset_graphics(session: &mut Session, kind: Option<GraphicsKind>) {
    match kind {
        Some(kind) => {
            session.graphics_mut().layer.clear(kind);
            if kind == GraphicsKind::Regis {
                session.reset_regis();
            }
        }
        None => {
            session.graphics_mut().layer.clear_all();
            session.reset_regis();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;
    use crate::session::SessionConfig;

    fn request(payload: &str) -> GatewayRequest {
        GatewayRequest::parse(payload).expect("valid payload")
    }

    fn decode(payload: &str) -> Result<GatewayCommand, GatewayError> {
        GatewayCommand::decode(&request(payload))
    }

    fn run(session: &mut Session, bytes: &[u8]) -> String {
        let mut host = RecordingHost::new();
        session.process(bytes, &mut host);
        host.response_text(session.index())
    }

    #[test]
    fn test_parse_request() {
        let req = request("KTERM;42;set;ATTR;BOLD=1");
        assert_eq!(req.class, "KTERM");
        assert_eq!(req.id, "42");
        assert_eq!(req.command, "SET");
        assert_eq!(req.params, "ATTR;BOLD=1");
        assert_eq!(request("APP;1;PING").params, "");
        assert!(GatewayRequest::parse("KTERM;1").is_none());
        assert!(GatewayRequest::parse(";1;SET").is_none());
    }

    #[test]
    fn test_decode_set_commands() {
        assert_eq!(
            decode("KTERM;1;SET;SESSION;2"),
            Ok(GatewayCommand::SetTarget(Target::Session, 2))
        );
        assert_eq!(
            decode("KTERM;1;SET;LEVEL;XTERM"),
            Ok(GatewayCommand::SetLevel(VtLevel::Xterm))
        );
        assert_eq!(
            decode("KTERM;1;SET;LEVEL;220"),
            Ok(GatewayCommand::SetLevel(VtLevel::Vt220))
        );
        assert_eq!(decode("KTERM;1;SET;DEBUG;on"), Ok(GatewayCommand::SetDebug(true)));
        assert_eq!(
            decode("KTERM;1;SET;SIZE;100;5000"),
            Ok(GatewayCommand::Resize {
                cols: Some(100),
                rows: Some(MAX_DIMENSION)
            })
        );
        assert_eq!(
            decode("KTERM;1;SET;ATTR;BOLD=1;FG=3;HIDDEN=OFF"),
            Ok(GatewayCommand::SetAttr(vec![
                AttrSetting::Flag(CellFlags::BOLD, true),
                AttrSetting::Foreground(3),
                AttrSetting::Flag(CellFlags::CONCEAL, false),
            ]))
        );
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode("KTERM;1;FROB;X"),
            Err(GatewayError::UnknownCommand(_))
        ));
        assert!(matches!(
            decode("KTERM;1;SET;ATTR;GLOW=1"),
            Err(GatewayError::UnknownSubject { .. })
        ));
        assert!(matches!(
            decode("KTERM;1;SET;WIDTH;0"),
            Err(GatewayError::BadValue { .. })
        ));
        assert!(decode("KTERM;1;INIT;SESSION").is_err());
    }

    #[test]
    fn test_get_reports() {
        let mut s = Session::new(0, SessionConfig::with_size(20, 5));
        assert_eq!(
            run(&mut s, b"\x1bPGATE;KTERM;7;GET;LEVEL\x1b\\"),
            "\x1bPGATE;KTERM;7;REPORT;LEVEL=999\x1b\\"
        );
        assert_eq!(
            run(&mut s, b"\x1bPGATE;KTERM;8;GET;VERSION\x1b\\"),
            format!(
                "\x1bPGATE;KTERM;8;REPORT;VERSION={}\x1b\\",
                env!("CARGO_PKG_VERSION")
            )
        );
    }

    #[test]
    fn test_output_toggle_silences_replies() {
        let mut s = Session::new(0, SessionConfig::with_size(20, 5));
        assert_eq!(run(&mut s, b"\x1bPGATE;KTERM;1;SET;OUTPUT;OFF\x1b\\\x1b[5n"), "");
        assert!(!s.responses().enabled());
        assert_eq!(
            run(&mut s, b"\x1bPGATE;KTERM;1;SET;OUTPUT;ON\x1b\\\x1b[5n"),
            "\x1b[0n"
        );
    }

    #[test]
    fn test_attr_set_and_reset() {
        let mut s = Session::new(0, SessionConfig::with_size(20, 5));
        run(&mut s, b"\x1bPGATE;KTERM;1;SET;ATTR;BOLD=1;BG=4\x1b\\A");
        let cell = s.screen().grid().cell(0, 0);
        assert!(cell.attrs.has(CellFlags::BOLD));
        assert_eq!(cell.attrs.bg, Color::Indexed(4));

        run(&mut s, b"\x1bPGATE;KTERM;1;RESET;ATTR\x1b\\B");
        let cell = s.screen().grid().cell(0, 1);
        assert!(!cell.attrs.has(CellFlags::BOLD));
        assert_eq!(cell.attrs.fg, Color::DEFAULT_FG);
        assert_eq!(cell.attrs.bg, Color::DEFAULT_BG);
    }

    #[test]
    fn test_level_size_and_tabs() {
        let mut s = Session::new(0, SessionConfig::with_size(40, 10));
        run(&mut s, b"\x1bPGATE;KTERM;1;SET;LEVEL;420\x1b\\");
        assert_eq!(s.conformance().level, VtLevel::Vt420);

        run(&mut s, b"\x1bPGATE;KTERM;1;SET;SIZE;60;12\x1b\\");
        assert_eq!((s.screen().cols(), s.screen().rows()), (60, 12));
        run(&mut s, b"\x1bPGATE;KTERM;1;SET;HEIGHT;8\x1b\\");
        assert_eq!((s.screen().cols(), s.screen().rows()), (60, 8));

        run(&mut s, b"\x1bPGATE;KTERM;1;RESET;TABS\x1b\\");
        assert!(s.screen().tabs().list().is_empty());
        run(&mut s, b"\x1bPGATE;KTERM;1;RESET;TABS;DEFAULT8\x1b\\");
        assert_eq!(s.screen().tabs().list().first(), Some(&8));
    }

    #[test]
    fn test_bad_request_counts_malformed() {
        let mut s = Session::new(0, SessionConfig::with_size(20, 5));
        run(&mut s, b"\x1bPGATE;KTERM;1;SET;DEBUG;maybe\x1b\\");
        assert_eq!(s.diagnostics().malformed, 1);
        run(&mut s, b"\x1bPGATE;oops\x1b\\");
        assert_eq!(s.diagnostics().malformed, 2);
    }

    #[test]
    fn test_graphics_targets() {
        let mut targets = GatewayTargets::default();
        assert_eq!(targets.graphics_target(GraphicsKind::Sixel, 1), 1);
        targets.set(Target::Sixel, Some(2));
        assert_eq!(targets.graphics_target(GraphicsKind::Sixel, 1), 2);
        assert_eq!(targets.graphics_target(GraphicsKind::Regis, 1), 1);
        assert_eq!(targets.get(Target::Sixel), Some(2));
    }
}
