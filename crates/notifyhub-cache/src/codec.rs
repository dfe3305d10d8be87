//! Deflate compression helpers.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;

/// Compress bytes with raw deflate at the default level.
pub fn compress(data: &[u8]) -> AppResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| AppError::with_source(ErrorKind::Cache, "Compression failed", e))?;
    encoder
        .finish()
        .map_err(|e| AppError::with_source(ErrorKind::Cache, "Compression failed", e))
}

/// Inflate bytes produced by [`compress`].
pub fn decompress(data: &[u8]) -> AppResult<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 3);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| AppError::with_source(ErrorKind::Cache, "Decompression failed", e))?;
    Ok(out)
}
