//! Transparent decompression for gzip and zstd compressed files.
//!
//! Detects compression by file extension (.gz → gzip, .zst/.zstd → zstd).
//! Decoders are streaming readers: the decompressed document is never held in
//! memory as a whole.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;

/// Returns true if the file path has a recognized compressed extension.
pub fn is_compressed(path: &str) -> bool {
    path.ends_with(".gz")
        || path.ends_with(".gzip")
        || path.ends_with(".zst")
        || path.ends_with(".zstd")
}

/// Open a streaming decoder for a compressed file based on its extension.
pub fn open_decoder(path: &str) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("failed to open file: {path}"))?;
    if path.ends_with(".gz") || path.ends_with(".gzip") {
        // MultiGzDecoder: concatenated gzip members are common for NDJSON logs.
        Ok(Box::new(flate2::read::MultiGzDecoder::new(file)))
    } else if path.ends_with(".zst") || path.ends_with(".zstd") {
        let decoder = zstd::Decoder::new(file)
            .with_context(|| format!("failed to initialize zstd decoder for: {path}"))?;
        Ok(Box::new(decoder))
    } else {
        anyhow::bail!("not a compressed file: {path}")
    }
}
