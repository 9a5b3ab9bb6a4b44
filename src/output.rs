/// Output formatting for selected values.
///
/// Values are re-emitted token by token straight into a `Write` sink in
/// compact form. Only strings are re-encoded; numbers are written from the
/// raw bytes captured by the tokenizer.
use std::io::{self, Write};

/// Configuration for output formatting.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Raw string output (`-r`): a selected string is written without quotes
    /// or escaping.
    pub raw: bool,
    /// Written after every selected value (`-d`, default `"\n"`).
    pub separator: Vec<u8>,
    /// Use NUL (`\0`) instead of the separator (`-0`).
    pub null_separator: bool,
    /// Suppress the separator entirely (`-j`).
    pub join_output: bool,
    /// Flush the sink after each selected value (`-f`).
    pub unbuffered: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            raw: false,
            separator: b"\n".to_vec(),
            null_separator: false,
            join_output: false,
            unbuffered: false,
        }
    }
}

/// Terminate one selected value: write the separator and flush if asked.
///
/// NUL separation wins over join, which wins over the separator string.
pub fn finish_value<W: Write + ?Sized>(w: &mut W, config: &OutputConfig) -> io::Result<()> {
    if config.null_separator {
        w.write_all(b"\0")?;
    } else if !config.join_output {
        w.write_all(&config.separator)?;
    }
    if config.unbuffered {
        w.flush()?;
    }
    Ok(())
}

pub fn write_bool<W: Write + ?Sized>(w: &mut W, b: bool) -> io::Result<()> {
    w.write_all(if b { b"true" } else { b"false" })
}

/// Short escape for bytes that have one.
fn short_escape(b: u8) -> Option<&'static [u8]> {
    match b {
        b'"' => Some(b"\\\""),
        b'\\' => Some(b"\\\\"),
        b'\n' => Some(b"\\n"),
        b'\r' => Some(b"\\r"),
        b'\t' => Some(b"\\t"),
        0x08 => Some(b"\\b"),
        0x0c => Some(b"\\f"),
        _ => None,
    }
}

fn needs_escape(b: u8) -> bool {
    b < 0x20 || b == 0x7f || b == b'"' || b == b'\\'
}

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

/// Write a JSON-escaped string (with surrounding quotes).
///
/// Control bytes, DEL, `"` and `\` are escaped; every other byte, including
/// non-ASCII, passes through unchanged.
pub fn write_json_string<W: Write + ?Sized>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    w.write_all(b"\"")?;
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if !needs_escape(b) {
            continue;
        }
        // Flush preceding safe bytes
        if start < i {
            w.write_all(&bytes[start..i])?;
        }
        match short_escape(b) {
            Some(esc) => w.write_all(esc)?,
            None => w.write_all(&[
                b'\\',
                b'u',
                b'0',
                b'0',
                HEX_UPPER[(b >> 4) as usize],
                HEX_UPPER[(b & 0x0f) as usize],
            ])?,
        }
        start = i + 1;
    }
    // Flush remaining
    if start < bytes.len() {
        w.write_all(&bytes[start..])?;
    }
    w.write_all(b"\"")
}
