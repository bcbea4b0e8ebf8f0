//! Small diagnostic-string builders available to command handlers.
//!
//! `original_source/src/client.cc` keeps these alive via a per-connection
//! `tmp_err` scratch slot that outlives the stack frame until flushed;
//! Rust's `String` makes that trick unnecessary, so these are just plain
//! formatting helpers (spec.md §4.6).

/// `"Protocol error: expected '<a>', got '<b>'"`.
pub fn expected_got(a: char, b: char) -> String {
    format!("Protocol error: expected '{a}', got '{b}'")
}

/// `"unknown command '<name>'"`. A handler-level error, not a framing
/// error, so unlike [`expected_got`] it carries no `"Protocol error: "`
/// prefix.
pub fn unknown_command(name: &[u8]) -> String {
    format!("unknown command '{}'", String::from_utf8_lossy(name))
}
