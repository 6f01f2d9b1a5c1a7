//! Configuration for the kterm engine
//!
//! This module provides the configuration system with:
//! - XDG-compliant config file location
//! - CLI argument overrides
//! - Environment variable support (`KTERM_*`)
//! - Config precedence: CLI > env > file > defaults
//! - Validation with the offending field named in the error

use clap::Parser;
use kterm_core::VtLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Most sessions a terminal can host
pub const MAX_SESSIONS: usize = 3;

/// Largest width or height accepted from config or the gateway
pub const MAX_DIMENSION: usize = 1000;

/// CLI arguments for the headless driver
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "kterm-headless")]
#[command(version)]
#[command(about = "Feed a byte stream through the kterm engine and dump the screen", long_about = None)]
pub struct CliArgs {
    /// Path to custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Input file (stdin when omitted)
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Screen columns
    #[arg(long, value_name = "COLS")]
    pub columns: Option<usize>,

    /// Screen rows
    #[arg(long, value_name = "ROWS")]
    pub rows: Option<usize>,

    /// Number of scrollback rows
    #[arg(long, value_name = "ROWS")]
    pub scrollback: Option<usize>,

    /// Conformance level (vt52 ... vt525, ansi.sys, xterm)
    #[arg(short = 'l', long, value_name = "LEVEL")]
    pub vt_level: Option<String>,

    /// Number of sessions (1-3)
    #[arg(long, value_name = "N")]
    pub sessions: Option<usize>,

    /// Session that receives the input
    #[arg(short, long, value_name = "INDEX", default_value_t = 0)]
    pub session: usize,

    /// Output format for the final screen (text or json)
    #[arg(short, long, value_name = "FORMAT", default_value = "text")]
    pub format: String,

    /// Raise per-sequence diagnostics to debug level
    #[arg(short, long)]
    pub debug: bool,

    /// Enable OSC 52 clipboard writes
    #[arg(long)]
    pub enable_osc52: bool,
}

/// Byte pipeline tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bytes processed per tick before burst scaling
    #[serde(default = "default_chars_per_frame")]
    pub chars_per_frame: usize,
    /// Backlog size above which the per-tick target doubles
    #[serde(default = "default_burst_threshold")]
    pub burst_threshold: usize,
    /// Time budget per tick in microseconds
    #[serde(default = "default_frame_budget_us")]
    pub frame_budget_us: u64,
    /// Input ring capacity per session
    #[serde(default = "default_input_capacity")]
    pub input_capacity: usize,
    /// Response buffer capacity per session
    #[serde(default = "default_output_capacity")]
    pub output_capacity: usize,
}

fn default_chars_per_frame() -> usize {
    200
}
fn default_burst_threshold() -> usize {
    4096
}
fn default_frame_budget_us() -> u64 {
    4000
}
fn default_input_capacity() -> usize {
    65536
}
fn default_output_capacity() -> usize {
    16384
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chars_per_frame: default_chars_per_frame(),
            burst_threshold: default_burst_threshold(),
            frame_budget_us: default_frame_budget_us(),
            input_capacity: default_input_capacity(),
            output_capacity: default_output_capacity(),
        }
    }
}

/// Graphics handoff configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphicsConfig {
    /// Width / height of the viewport vector graphics are letterboxed into
    #[serde(default = "default_viewport_aspect")]
    pub viewport_aspect: f32,
    /// Strip cap for one sixel image
    #[serde(default = "default_sixel_max_strips")]
    pub sixel_max_strips: usize,
}

fn default_viewport_aspect() -> f32 {
    800.0 / 480.0
}
fn default_sixel_max_strips() -> usize {
    kterm_parser::sixel::DEFAULT_MAX_STRIPS
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            viewport_aspect: default_viewport_aspect(),
            sixel_max_strips: default_sixel_max_strips(),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Forward OSC 52 clipboard writes to the host (off by default)
    #[serde(default)]
    pub osc52_clipboard: bool,
    /// Maximum decoded OSC 52 payload size in bytes
    #[serde(default = "default_osc52_max_size")]
    pub osc52_max_size: usize,
    /// Titles longer than this are truncated
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,
}

fn default_osc52_max_size() -> usize {
    100_000
}
fn default_max_title_len() -> usize {
    256
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            osc52_clipboard: false,
            osc52_max_size: default_osc52_max_size(),
            max_title_len: default_max_title_len(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Screen columns
    #[serde(default = "default_columns")]
    pub columns: usize,

    /// Screen rows
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// Scrollback rows kept by each primary screen
    #[serde(default = "default_scrollback_rows")]
    pub scrollback_rows: usize,

    /// Conformance level name
    #[serde(default = "default_vt_level")]
    pub vt_level: String,

    /// Reply to ENQ
    #[serde(default = "default_answerback")]
    pub answerback: String,

    /// Sessions created at startup
    #[serde(default = "default_sessions")]
    pub sessions: usize,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub graphics: GraphicsConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    /// Per-sequence diagnostics at debug instead of trace level
    #[serde(default)]
    pub debug: bool,
}

fn default_columns() -> usize {
    132
}
fn default_rows() -> usize {
    50
}
fn default_scrollback_rows() -> usize {
    1000
}
fn default_vt_level() -> String {
    "xterm".to_string()
}
fn default_answerback() -> String {
    "kterm VT420".to_string()
}
fn default_sessions() -> usize {
    MAX_SESSIONS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            rows: default_rows(),
            scrollback_rows: default_scrollback_rows(),
            vt_level: default_vt_level(),
            answerback: default_answerback(),
            sessions: default_sessions(),
            pipeline: PipelineConfig::default(),
            graphics: GraphicsConfig::default(),
            security: SecurityConfig::default(),
            debug: false,
        }
    }
}

impl Config {
    /// Load configuration with full precedence:
    /// CLI args > environment variables > config file > defaults
    pub fn load_with_args(args: &CliArgs) -> Result<Self> {
        let mut config = Config::default();

        let config_path = args.config.clone().or_else(Self::default_config_path);
        if let Some(path) = &config_path {
            if path.exists() {
                match Self::load_from_file(path) {
                    Ok(file_config) => config = file_config,
                    Err(e) if args.config.is_some() => return Err(e),
                    Err(e) => {
                        log::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        config.apply_env_vars();
        config.apply_cli_args(args);
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `KTERM_*` environment variables
    fn apply_env_vars(&mut self) {
        self.apply_env(|key| env::var(key).ok());
    }

    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, val: Option<String>) -> Option<T> {
            let val = val?;
            match val.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    log::warn!("Ignoring {}={:?}: not a number", key, val);
                    None
                }
            }
        }

        if let Some(cols) = parsed("KTERM_COLUMNS", lookup("KTERM_COLUMNS")) {
            self.columns = cols;
        }
        if let Some(rows) = parsed("KTERM_ROWS", lookup("KTERM_ROWS")) {
            self.rows = rows;
        }
        if let Some(lines) = parsed("KTERM_SCROLLBACK", lookup("KTERM_SCROLLBACK")) {
            self.scrollback_rows = lines;
        }
        if let Some(n) = parsed("KTERM_SESSIONS", lookup("KTERM_SESSIONS")) {
            self.sessions = n;
        }
        if let Some(level) = lookup("KTERM_VT_LEVEL") {
            self.vt_level = level;
        }
        if let Some(answerback) = lookup("KTERM_ANSWERBACK") {
            self.answerback = answerback;
        }
        if let Some(val) = lookup("KTERM_OSC52_CLIPBOARD") {
            self.security.osc52_clipboard = is_truthy(&val);
        }
        if let Some(val) = lookup("KTERM_DEBUG") {
            self.debug = is_truthy(&val);
        }
    }

    /// Apply CLI arguments to config
    fn apply_cli_args(&mut self, args: &CliArgs) {
        if let Some(cols) = args.columns {
            self.columns = cols;
        }
        if let Some(rows) = args.rows {
            self.rows = rows;
        }
        if let Some(scrollback) = args.scrollback {
            self.scrollback_rows = scrollback;
        }
        if let Some(level) = &args.vt_level {
            self.vt_level = level.clone();
        }
        if let Some(n) = args.sessions {
            self.sessions = n;
        }
        if args.debug {
            self.debug = true;
        }
        if args.enable_osc52 {
            self.security.osc52_clipboard = true;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.columns < 2 || self.columns > MAX_DIMENSION {
            return Err(Error::config(
                "columns",
                format!("must be between 2 and {}", MAX_DIMENSION),
            ));
        }
        if self.rows < 2 || self.rows > MAX_DIMENSION {
            return Err(Error::config(
                "rows",
                format!("must be between 2 and {}", MAX_DIMENSION),
            ));
        }
        if self.scrollback_rows > 1_000_000 {
            return Err(Error::config("scrollback_rows", "must be at most 1,000,000"));
        }
        if self.sessions == 0 || self.sessions > MAX_SESSIONS {
            return Err(Error::config(
                "sessions",
                format!("must be between 1 and {}", MAX_SESSIONS),
            ));
        }
        if let Err(e) = self.vt_level.parse::<VtLevel>() {
            return Err(Error::config("vt_level", e.to_string()));
        }
        if self.pipeline.chars_per_frame == 0 {
            return Err(Error::config("pipeline.chars_per_frame", "must be at least 1"));
        }
        if self.pipeline.input_capacity < 256 {
            return Err(Error::config("pipeline.input_capacity", "must be at least 256"));
        }
        if self.pipeline.output_capacity < 64 {
            return Err(Error::config("pipeline.output_capacity", "must be at least 64"));
        }
        if !(self.graphics.viewport_aspect.is_finite() && self.graphics.viewport_aspect > 0.0) {
            return Err(Error::config("graphics.viewport_aspect", "must be a positive number"));
        }
        Ok(())
    }

    /// Conformance level selected by `vt_level`; falls back to the VT100 baseline when unparsable
    pub fn level(&self) -> VtLevel {
        self.vt_level.parse().unwrap_or_else(|e| {
            log::warn!("{}, falling back to VT100", e);
            VtLevel::Vt100
        })
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kterm").join("config.toml"))
    }

    /// Write configuration to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config("config", e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn is_truthy(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true") || val.eq_ignore_ascii_case("on")
}
