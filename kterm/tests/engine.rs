//! End-to-end tests through the multi-session terminal
//!
//! Each test writes a byte stream the way a host application would and
//! checks the resulting screens, replies and graphics layers.

use kterm::{Config, Error, RecordingHost, Session, SessionConfig, Terminal, VtLevel};
use kterm_core::CellFlags;

fn terminal(cols: usize, rows: usize) -> Terminal<RecordingHost> {
    terminal_at(cols, rows, "xterm")
}

fn terminal_at(cols: usize, rows: usize, level: &str) -> Terminal<RecordingHost> {
    let config = Config {
        columns: cols,
        rows,
        vt_level: level.to_string(),
        ..Config::default()
    };
    Terminal::new(&config, RecordingHost::new()).expect("valid config")
}

/// Run `bytes` on one session and return only the replies it produced
fn exchange(term: &mut Terminal<RecordingHost>, session: usize, bytes: &[u8]) -> String {
    term.host_mut().clear();
    term.process(session, bytes).expect("session exists");
    term.host().response_text(session)
}

#[test]
fn device_attributes_follow_configured_level() {
    let mut vt220 = terminal_at(80, 24, "vt220");
    assert_eq!(exchange(&mut vt220, 0, b"\x1b[c"), "\x1b[?62;1;2;6;7;8;9;15c");

    let mut vt420 = terminal_at(80, 24, "vt420");
    assert_eq!(
        exchange(&mut vt420, 0, b"\x1b[c"),
        "\x1b[?64;1;2;6;7;8;9;15;18;21;22;28;29c"
    );
    assert_eq!(exchange(&mut vt420, 0, b"\x1b[>c"), "\x1b[>41;10;0c");

    let mut vt100 = terminal_at(80, 24, "vt100");
    assert_eq!(exchange(&mut vt100, 0, b"\x1b[c"), "\x1b[?6c");
}

#[test]
fn unknown_level_is_rejected() {
    let config = Config {
        vt_level: "vt9000".to_string(),
        ..Config::default()
    };
    assert!(matches!(
        Terminal::new(&config, RecordingHost::new()),
        Err(Error::Config { .. })
    ));
}

#[test]
fn unknown_level_session_gets_baseline_features() {
    let config = Config {
        vt_level: "vt9000".to_string(),
        ..Config::default()
    };
    let mut session = Session::new(0, SessionConfig::from_config(&config));
    let conformance = session.conformance();
    assert_eq!(conformance.level, VtLevel::Vt100);
    assert!(!conformance.features.sixel);
    assert!(!conformance.features.rect_ops);

    let mut host = RecordingHost::new();
    session.process(b"[c", &mut host);
    assert_eq!(host.response_text(0), "[?6c");
}

#[test]
fn sgr_state_round_trips_through_decrqss() {
    let mut term = terminal(40, 5);
    term.process(0, b"\x1b[0;1;4;38;2;10;20;30;44m").expect("session 0");
    let reply = exchange(&mut term, 0, b"\x1bP$qm\x1b\\");
    assert_eq!(reply, "\x1bP1$r0;1;4;38;2;10;20;30;44m\x1b\\");

    // Replaying the reported state on another session reproduces it
    let sgr = reply
        .strip_prefix("\x1bP1$r")
        .and_then(|r| r.strip_suffix("\x1b\\"))
        .expect("DECRQSS framing");
    term.process(1, format!("\x1b[{}", sgr).as_bytes()).expect("session 1");
    assert_eq!(exchange(&mut term, 1, b"\x1bP$qm\x1b\\"), reply);
    assert_eq!(
        term.sessions()[0].screen().cursor().attrs,
        term.sessions()[1].screen().cursor().attrs
    );
}

#[test]
fn repeated_charset_designation_is_idempotent() {
    let mut term = terminal(10, 2);
    term.process(0, b"\x1b(0\x1b(0q\x1b(Bq").expect("session 0");
    assert_eq!(term.sessions()[0].screen().row_text(0), "─q");
}

#[test]
fn invalid_scroll_region_keeps_previous_margins() {
    let mut term = terminal(10, 10);
    term.process(0, b"\x1b[3;8r\x1b[8;3r\x1b[0;99r").expect("session 0");
    assert_eq!(term.sessions()[0].screen().scroll_region(), (2, 7));
}

#[test]
fn malformed_sequences_do_not_derail_the_stream() {
    let mut term = terminal(20, 3);
    let mut bytes = b"\x1b[".to_vec();
    bytes.extend(std::iter::repeat(b'9').take(kterm_parser::MAX_CSI_LEN + 1));
    bytes.extend_from_slice(b"\x1b[1;1Hok\x1b[2;1H\x1b[1mbold\x1b[0m");
    term.write_bytes(0, &bytes).expect("session 0");
    while term.process_pending() > 0 {}

    let session = &term.sessions()[0];
    assert_eq!(session.diagnostics().malformed, 1);
    assert_eq!(session.screen().row_text(0), "ok");
    assert_eq!(session.screen().row_text(1), "bold");
    assert!(session.screen().grid().cell(1, 0).attrs.has(CellFlags::BOLD));
}

#[test]
fn sessions_keep_independent_state() {
    let mut term = terminal(20, 4);
    term.write_str(0, "\x1b[?25lfirst").expect("session 0");
    term.write_str(1, "second").expect("session 1");
    while term.process_pending() > 0 {}

    assert_eq!(term.sessions()[0].screen().row_text(0), "first");
    assert_eq!(term.sessions()[1].screen().row_text(0), "second");
    assert_eq!(term.sessions()[2].screen().row_text(0), "");
    assert!(!term.sessions()[0].render().cursor.visible);
    assert!(term.sessions()[1].render().cursor.visible);
}

#[test]
fn sixel_image_lands_in_the_issuing_session() {
    let mut term = terminal(40, 10);
    term.process(0, b"\x1bPq#0;2;100;0;0~~\x1b\\").expect("session 0");
    let sixels = &term.sessions()[0].graphics().layer.sixels;
    assert_eq!(sixels.len(), 1);
    assert_eq!(sixels[0].image.width, 2);
    assert_eq!(sixels[0].image.height, 6);
}

#[test]
fn sixel_output_follows_gateway_target() {
    let mut term = terminal(40, 10);
    term.process(0, b"\x1bPGATE;KTERM;1;SET;SIXEL_SESSION;1\x1b\\")
        .expect("session 0");
    term.process(0, b"\x1bPq~\x1b\\").expect("session 0");
    assert!(term.sessions()[0].graphics().layer.sixels.is_empty());
    assert_eq!(term.sessions()[1].graphics().layer.sixels.len(), 1);

    term.process(0, b"\x1bPGATE;KTERM;2;RESET;SIXEL_SESSION\x1b\\")
        .expect("session 0");
    term.process(0, b"\x1bPq~\x1b\\").expect("session 0");
    assert_eq!(term.sessions()[0].graphics().layer.sixels.len(), 1);
}

#[test]
fn sixel_rejected_below_graphics_levels() {
    let mut term = terminal_at(40, 10, "vt220");
    term.process(0, b"\x1bPq~~\x1b\\").expect("session 0");
    assert!(term.sessions()[0].graphics().layer.sixels.is_empty());
    assert_eq!(term.sessions()[0].diagnostics().unsupported, 1);
}

#[test]
fn gateway_reports_return_to_issuer() {
    let mut term = terminal(20, 5);
    term.process(2, b"\x1bPGATE;KTERM;7;SET;SESSION;0\x1b\\")
        .expect("session 2");
    let reply = exchange(&mut term, 2, b"\x1bPGATE;KTERM;8;GET;LEVEL\x1b\\");
    assert_eq!(reply, "\x1bPGATE;KTERM;8;REPORT;LEVEL=999\x1b\\");
    assert!(term.host().responses_for(0).is_empty());
}

#[test]
fn foreign_gateway_class_goes_to_host() {
    let mut term = terminal(20, 5);
    term.process(1, b"\x1bPGATE;MAIL;3;SEND;hello\x1b\\")
        .expect("session 1");
    assert_eq!(
        term.host().gateway,
        vec![(
            "MAIL".to_string(),
            "3".to_string(),
            "SEND".to_string(),
            "hello".to_string()
        )]
    );
}

#[test]
fn titles_reach_the_host() {
    let mut term = terminal(20, 5);
    term.process(0, b"\x1b]2;build\x07").expect("session 0");
    assert_eq!(term.host().titles, vec![("build".to_string(), false)]);
}

#[test]
fn split_screen_composites_two_sessions() {
    let mut term = terminal(12, 6);
    term.write_str(0, "\x1b[2Jupper\r\nhalf").expect("session 0");
    term.write_str(2, "lower\r\nhalf").expect("session 2");
    while term.process_pending() > 0 {}

    term.set_split(3, 0, 2).expect("valid split");
    let frame = term.composite();
    assert_eq!(frame.rows, 6);
    assert_eq!(frame.row_text(0), "upper");
    assert_eq!(frame.row_text(1), "half");
    assert_eq!(frame.row_text(3), "lower");
    assert_eq!(frame.row_text(4), "half");

    let status = serde_json::to_value(term.status()).expect("status serializes");
    assert_eq!(status["split"]["row"], 3);
    assert_eq!(status["sessions"][2]["cols"], 12);
}

#[test]
fn checksum_report_matches_between_equal_screens() {
    let mut term = terminal(10, 3);
    for session in 0..2 {
        term.process(session, b"abc\r\ndef").expect("session exists");
    }
    let first = exchange(&mut term, 0, b"\x1b[1;1;1;1;3;10*y");
    let second = exchange(&mut term, 1, b"\x1b[1;1;1;1;3;10*y");
    assert!(first.starts_with("\x1bP1!~"));
    assert_eq!(first, second);

    term.process(1, b"x").expect("session 1");
    assert_ne!(exchange(&mut term, 1, b"\x1b[1;1;1;1;3;10*y"), first);
}

#[test]
fn checksum_reports_fold_rgb_cells() {
    let mut term = terminal(16, 10);
    let mut bytes = b"\x1b[38;2;255;255;255;48;2;255;255;255m".to_vec();
    bytes.extend(std::iter::repeat(b'X').take(16 * 10));
    term.process(0, &bytes).expect("session 0");

    assert_eq!(
        exchange(&mut term, 0, b"\x1b[5;1;1;1;1;2*y"),
        "\x1bP5!~04AC\x1b\\"
    );
    assert_eq!(
        exchange(&mut term, 0, b"\x1b[5;1;1;1;10;16*y"),
        "\x1bP5!~75C1\x1b\\"
    );
    assert_eq!(exchange(&mut term, 0, b"\x1b[?63;3n"), "\x1bP3!~75C1\x1b\\");
}
