//! Structured logging sink (SPEC_FULL.md §6.3 / spec.md §6.3).
//!
//! Built on `tracing` + a custom `tracing-subscriber` `FormatEvent` that
//! renders the exact `<ISO-8601-local-ms> <level-char> <message>` line shape
//! `original_source/src/logging.cc` produces, truncated to 512 bytes
//! including the newline. `original_source`'s logger is an async, lock-free
//! linked list drained by a `uv_async_t` callback so logging calls never
//! block the event loop on I/O; this reimplements that property with an
//! `std::sync::mpsc` channel drained by one dedicated writer thread instead
//! of hand-rolled atomics, using `tracing`'s `MakeWriter` seam, exactly the
//! place the teacher's `flux-network` sibling crates would plug a sink in.

use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write};
use std::sync::mpsc::{self, Sender};
use std::thread;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;

/// Bytes per line, including the trailing newline. Matches
/// `original_source`'s `MAX_MESSAGE_SIZE` applied to the whole formatted
/// event rather than just the message body.
const MAX_LINE_BYTES: usize = 512;

/// Installs the global subscriber. Returns a guard: dropping it joins the
/// writer thread after flushing whatever's left in the channel.
pub fn init() -> LoggerGuard {
    let is_tty = io::stderr().is_terminal();
    let (tx, rx) = mpsc::channel::<Vec<u8>>();

    let handle = thread::Builder::new()
        .name("resp-log-writer".to_string())
        .spawn(move || {
            let mut stderr = io::stderr();
            while let Ok(line) = rx.recv() {
                let _ = stderr.write_all(&line);
            }
        })
        .expect("failed to spawn log writer thread");

    let subscriber = tracing_subscriber::fmt()
        .event_format(LineFormatter { colorize: is_tty })
        .with_writer(ChannelMakeWriter { tx: tx.clone() })
        .with_ansi(false) // color is applied by LineFormatter itself, on the level char only
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("global subscriber already set");

    LoggerGuard { tx: Some(tx), handle: Some(handle) }
}

pub struct LoggerGuard {
    tx: Option<Sender<Vec<u8>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        // Dropping every Sender unblocks the writer thread's `recv()`.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[derive(Clone)]
struct ChannelMakeWriter {
    tx: Sender<Vec<u8>>,
}

impl<'a> MakeWriter<'a> for ChannelMakeWriter {
    type Writer = ChannelWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ChannelWriter { tx: self.tx.clone(), buf: Vec::new() }
    }
}

struct ChannelWriter {
    tx: Sender<Vec<u8>>,
    buf: Vec<u8>,
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let _ = self.tx.send(std::mem::take(&mut self.buf));
        }
        Ok(())
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

struct LineFormatter {
    colorize: bool,
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else if self.message.is_empty() {
            self.message = format!("{}={:?}", field.name(), value);
        } else {
            self.message.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, _ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let level = *event.metadata().level();
        let cc = level_char(level);
        let cc_rendered = if self.colorize { colorize(cc, level) } else { cc.to_string() };

        let now = chrono::Local::now();
        let timestamp = now.format("%Y-%m-%dT%H:%M:%S%.3f");

        let mut line = format!("{timestamp} {cc_rendered} {}\n", visitor.message);
        if line.len() > MAX_LINE_BYTES {
            let mut cut = MAX_LINE_BYTES - 1;
            while cut > 0 && !line.is_char_boundary(cut) {
                cut -= 1;
            }
            line.truncate(cut);
            line.push('\n');
        }
        writer.write_str(&line)
    }
}

/// `.` for info/debug/trace, `*` for startup-ish (warn, here reused as the
/// "notable but not an error" tier), `#` for errors: the three tiers
/// `original_source/src/logging.cc`'s `log(char c, ...)` call sites use.
fn level_char(level: Level) -> char {
    match level {
        Level::ERROR => '#',
        Level::WARN => '*',
        _ => '.',
    }
}

fn colorize(c: char, level: Level) -> String {
    let code = match level {
        Level::ERROR => "33", // yellow, matches original's '#' -> \x1b[33m
        Level::WARN => "1",   // bold, matches original's '*' -> \x1b[1m
        _ => "35",             // magenta, matches original's '.' -> \x1b[35m
    };
    format!("\x1b[{code}m{c}\x1b[0m")
}
