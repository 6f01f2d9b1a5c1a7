//! kterm - multi-session VT terminal emulation engine
//!
//! The engine consumes the byte stream a host process writes and keeps the
//! authoritative state of up to three virtual terminals: cell grids with
//! scrollback, cursor, charsets and modes, plus the Sixel, ReGIS and
//! Tektronix graphics they draw. Rendering, fonts and input devices live
//! outside; they read [`kterm_core::RenderFrame`]s and the graphics layers
//! and receive replies through a [`TerminalHost`].
//!
//! ```no_run
//! use kterm::{Config, RecordingHost, Terminal};
//!
//! let mut term = Terminal::new(&Config::default(), RecordingHost::new())?;
//! term.write_str(0, "\x1b[1mhello\x1b[0m\r\n")?;
//! term.process_pending();
//! println!("{}", term.composite().row_text(0));
//! # Ok::<(), kterm::Error>(())
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod gateway;
pub mod host;
pub mod pipeline;
pub mod session;
pub mod terminal;

pub use config::{CliArgs, Config, MAX_SESSIONS};
pub use diagnostics::{DiagnosticKind, Diagnostics};
pub use error::{Error, Result};
pub use gateway::{GatewayCommand, GatewayRequest, GatewayTargets, GATEWAY_CLASS};
pub use host::{NullHost, RecordingHost, TerminalHost};
pub use pipeline::{FrameBudget, InputRing};
pub use session::{GraphicsKind, GraphicsLayer, Session, SessionConfig};
pub use terminal::{SessionStatus, Split, Terminal, TerminalStatus};

pub use kterm_core::{RenderFrame, VtLevel};
