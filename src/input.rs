//! Input sources: stdin, plain files and compressed files, each exposed as a
//! buffered byte stream. Nothing is read ahead beyond the reader's buffer.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};

use crate::decompress;

/// Read buffer size for every input source.
pub const READ_BUFFER: usize = 128 * 1024;

const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Consume a UTF-8 BOM (U+FEFF, bytes EF BB BF) at the reader's position.
/// Returns the number of bytes skipped.
///
/// The mark may arrive split across reads. Input that starts like a BOM but
/// is cut short is an error, since those bytes cannot begin a JSON value.
pub fn skip_bom<R: BufRead>(reader: &mut R) -> io::Result<usize> {
    let mut matched = 0;
    while matched < BOM.len() {
        let buf = fill_buf(reader)?;
        let rest = &BOM[matched..];
        let n = buf.len().min(rest.len());
        if n == 0 || buf[..n] != rest[..n] {
            if matched == 0 {
                return Ok(0);
            }
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "truncated byte-order mark",
            ));
        }
        reader.consume(n);
        matched += n;
    }
    Ok(matched)
}

/// `fill_buf`, retrying on `Interrupted`.
pub(crate) fn fill_buf<R: BufRead>(reader: &mut R) -> io::Result<&[u8]> {
    loop {
        match reader.fill_buf() {
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    reader.fill_buf()
}

/// Display name used in diagnostics.
pub fn display_name(path: &str) -> &str {
    if path == "-" { "<stdin>" } else { path }
}

/// Open `path` as a buffered stream. `-` is stdin; `.gz`/`.zst` files are
/// decoded on the fly.
pub fn open(path: &str) -> Result<Box<dyn BufRead>> {
    if path == "-" {
        return Ok(Box::new(BufReader::with_capacity(READ_BUFFER, io::stdin())));
    }
    if decompress::is_compressed(path) {
        let decoder = decompress::open_decoder(path)?;
        return Ok(Box::new(BufReader::with_capacity(READ_BUFFER, decoder)));
    }
    let file = File::open(path).with_context(|| format!("failed to open file: {path}"))?;
    Ok(Box::new(BufReader::with_capacity(READ_BUFFER, file)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn skip_bom_present() {
        let mut r = &[0xEF, 0xBB, 0xBF, b'"', b'h', b'i', b'"'][..];
        assert_eq!(skip_bom(&mut r).unwrap(), 3);
        assert_eq!(r, b"\"hi\"");
    }

    #[test]
    fn skip_bom_absent() {
        let mut r = &b"\"hi\""[..];
        assert_eq!(skip_bom(&mut r).unwrap(), 0);
        assert_eq!(r, b"\"hi\"");
    }

    #[test]
    fn skip_bom_empty() {
        let mut r = &b""[..];
        assert_eq!(skip_bom(&mut r).unwrap(), 0);
    }

    #[test]
    fn skip_bom_only_bom() {
        let mut r = &[0xEF, 0xBB, 0xBF][..];
        assert_eq!(skip_bom(&mut r).unwrap(), 3);
        assert!(r.is_empty());
    }

    /// Fails its first read with `Interrupted`.
    struct Interrupting<'a> {
        data: &'a [u8],
        interrupted: bool,
    }

    impl Read for Interrupting<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.data.read(buf)
        }
    }

    #[test]
    fn skip_bom_across_short_reads() {
        let mut r = BufReader::with_capacity(1, &b"\xEF\xBB\xBF[1]"[..]);
        assert_eq!(skip_bom(&mut r).unwrap(), 3);
        let mut rest = String::new();
        r.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "[1]");

        let mut r = BufReader::with_capacity(2, &b"[1]"[..]);
        assert_eq!(skip_bom(&mut r).unwrap(), 0);
        assert_eq!(r.fill_buf().unwrap(), b"[1");
    }

    #[test]
    fn skip_bom_retries_interrupted_reads() {
        let reader = Interrupting {
            data: b"\xEF\xBB\xBF1",
            interrupted: false,
        };
        let mut r = BufReader::with_capacity(1, reader);
        assert_eq!(skip_bom(&mut r).unwrap(), 3);
        assert_eq!(r.fill_buf().unwrap(), b"1");
    }

    #[test]
    fn skip_bom_truncated() {
        let mut r = BufReader::with_capacity(1, &b"\xEF\xBB1"[..]);
        let err = skip_bom(&mut r).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        let mut r = &b"\xEF"[..];
        assert!(skip_bom(&mut r).is_err());
        // A mismatch on the first read consumes nothing.
        let mut r = &b"\xEFx"[..];
        assert_eq!(skip_bom(&mut r).unwrap(), 0);
        assert_eq!(r, b"\xEFx");
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name("-"), "<stdin>");
        assert_eq!(display_name("data.json"), "data.json");
    }

    #[test]
    fn open_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.json");
        std::fs::write(&path, b"{\"a\":1}").unwrap();
        let mut text = String::new();
        open(path.to_str().unwrap())
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "{\"a\":1}");
    }

    #[test]
    fn open_missing_file() {
        let err = open("/nonexistent/jpick/input.json").err().unwrap();
        assert!(err.to_string().contains("failed to open file"));
    }
}
