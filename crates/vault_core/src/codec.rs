//! Storage encoding of file content.
//!
//! `Other` files are zstd-compressed before they reach the blob store;
//! `Image` files are already compressed formats and are stored verbatim.

use crate::error::{Result, VaultError};
use crate::types::FileKind;

/// Default zstd level for stored content.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Compresses bytes with zstd at the given level.
pub fn compress(data: &[u8], level: i32) -> Result<Vec<u8>> {
    zstd::encode_all(data, level).map_err(|e| VaultError::Compression(e.to_string()))
}

/// Decompresses zstd bytes.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    zstd::decode_all(data).map_err(|e| VaultError::Compression(e.to_string()))
}

/// Encodes original file bytes into their stored form.
pub fn encode(kind: FileKind, data: &[u8], level: i32) -> Result<Vec<u8>> {
    if kind.is_compressed() {
        compress(data, level)
    } else {
        Ok(data.to_vec())
    }
}

/// Decodes stored bytes back into the original file content.
pub fn decode(kind: FileKind, stored: Vec<u8>) -> Result<Vec<u8>> {
    if kind.is_compressed() {
        decompress(&stored)
    } else {
        Ok(stored)
    }
}
