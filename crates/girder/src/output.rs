//! Output formatting for CLI commands.
//!
//! Commands print a single pretty-printed JSON document so their output can
//! be piped into other tools; diagnostics go to stderr through `tracing`.

use serde::Serialize;
use std::io::{self, Write};

/// Write `value` as pretty JSON to `writer`, followed by a newline.
///
/// # Errors
///
/// Returns an `InvalidData` error if `value` cannot be serialized and the
/// writer's error if writing fails.
pub fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Print `value` as pretty JSON on stdout.
///
/// # Errors
///
/// See [`write_json`].
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_json(&mut handle, value)
}
