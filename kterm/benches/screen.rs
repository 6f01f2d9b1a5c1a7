//! Screen and pipeline benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use kterm::{Config, NullHost, Session, SessionConfig, Terminal};

fn bench_screen_print(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    let text = "Hello, World! ".repeat(100);
    group.throughput(Throughput::Bytes(text.len() as u64));

    group.bench_function("print_chars", |b| {
        b.iter(|| {
            let mut session = Session::new(0, SessionConfig::with_size(80, 24));
            session.process(black_box(text.as_bytes()), &mut NullHost);
            black_box(session.screen().checksum())
        })
    });

    group.finish();
}

fn bench_screen_scroll(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    let mut input = String::new();
    for i in 0..1000 {
        input.push_str(&format!("Line {}: Some text content here\r\n", i));
    }
    group.throughput(Throughput::Bytes(input.len() as u64));

    // Scrolling rotates the ring buffer instead of moving rows
    group.bench_function("scroll", |b| {
        b.iter(|| {
            let mut session = Session::new(0, SessionConfig::with_size(80, 24));
            session.process(black_box(input.as_bytes()), &mut NullHost);
            black_box(session.screen().grid().scrollback_len())
        })
    });

    group.finish();
}

fn bench_screen_full_redraw(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    let mut input = String::new();
    for row in 1..=24 {
        input.push_str(&format!("\x1b[{};1H\x1b[{}m", row, 31 + row % 7));
        input.push_str(&"X".repeat(80));
    }
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function("full_redraw", |b| {
        let mut session = Session::new(0, SessionConfig::with_size(80, 24));
        b.iter(|| {
            session.process(black_box(input.as_bytes()), &mut NullHost);
            black_box(session.render())
        })
    });

    group.finish();
}

fn bench_rectangle_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("screen");

    let input = "\x1b[65;1;1;24;80$x\x1b[1;1;12;40;1;13;41;1$v\x1b[1;1;24;80;1;7$r".repeat(10);

    group.bench_function("rectangles", |b| {
        let mut session = Session::new(0, SessionConfig::with_size(80, 24));
        b.iter(|| {
            session.process(black_box(input.as_bytes()), &mut NullHost);
            black_box(session.screen().checksum())
        })
    });

    group.finish();
}

fn bench_terminal_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("terminal");

    let chunk = "\x1b[32mok\x1b[0m build step finished\r\n".repeat(200);
    group.throughput(Throughput::Bytes(chunk.len() as u64 * 3));

    group.bench_function("three_sessions", |b| {
        let config = Config {
            columns: 80,
            rows: 24,
            ..Config::default()
        };
        let Ok(mut term) = Terminal::new(&config, NullHost) else {
            return;
        };
        b.iter(|| {
            for session in 0..3 {
                let _ = term.write_str(session, &chunk);
            }
            while term.process_pending() > 0 {}
            black_box(term.composite())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_screen_print,
    bench_screen_scroll,
    bench_screen_full_redraw,
    bench_rectangle_ops,
    bench_terminal_pipeline
);

criterion_main!(benches);
