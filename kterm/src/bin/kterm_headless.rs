//! kterm-headless
//!
//! Feeds a byte stream (a file or stdin) through the engine and prints the
//! resulting screen as text or as a JSON render frame.

use std::error::Error;
use std::fs::File;
use std::io::{self, Read, Write};

use clap::Parser;
use kterm::{CliArgs, Config, RecordingHost, Terminal};

const CHUNK: usize = 16 * 1024;

fn main() -> Result<(), Box<dyn Error>> {
    let args = CliArgs::parse();

    let default_filter = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config = match Config::load_with_args(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    log::debug!(
        "{}x{} at {}, {} sessions",
        config.columns,
        config.rows,
        config.level(),
        config.sessions
    );

    let mut term = Terminal::new(&config, RecordingHost::new())?;
    term.set_active(args.session)?;

    let mut input: Box<dyn Read> = match &args.input {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin().lock()),
    };
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        let mut rest = &buf[..n];
        while !rest.is_empty() {
            let accepted = term.write_bytes(args.session, rest)?;
            rest = &rest[accepted..];
            term.process_pending();
        }
    }
    while term.process_pending() > 0 {}

    let frame = term.composite();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.format.as_str() {
        "json" => {
            let report = serde_json::json!({
                "frame": frame,
                "status": term.status(),
                "responses": term.host().response_text(args.session),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        }
        other => {
            if other != "text" {
                log::warn!("unknown format {:?}, using text", other);
            }
            for row in 0..frame.rows {
                writeln!(out, "{}", frame.row_text(row))?;
            }
        }
    }

    let status = term.status();
    for session in &status.sessions {
        if session.diagnostics.total() > 0 {
            log::info!(
                "session {}: {} unsupported, {} malformed, {} overflow, {} decode; last: {}",
                session.index,
                session.diagnostics.unsupported,
                session.diagnostics.malformed,
                session.diagnostics.overflow,
                session.diagnostics.decode,
                session.diagnostics.last_sequence
            );
        }
    }
    Ok(())
}
