//! Content hashing for deduplicated blob keys.

use crate::error::{Result, VaultError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A 32-byte BLAKE3 hash of a file's original (uncompressed) bytes.
///
/// The hash never depends on how the content is stored: an image kept
/// verbatim and a text file stored compressed are both identified by the
/// hash of what the caller uploaded. Serialized as 64 lowercase hex chars.
///
/// # Examples
///
/// ```
/// use vault_core::ContentHash;
///
/// let a = ContentHash::of(b"hello");
/// let b = ContentHash::of(b"hello");
/// assert_eq!(a, b);
/// assert_eq!(a.as_hex().len(), 64);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// The length of a hash as a hex string.
    pub const HEX_LEN: usize = 64;

    /// Hashes raw content.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Returns this hash as a lowercase hex string.
    pub fn as_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hash from a hex string.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidInput` if the string is not exactly
    /// 64 hex characters.
    pub fn from_hex(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != Self::HEX_LEN {
            return Err(VaultError::InvalidInput(format!(
                "expected {} hex chars for content hash, got {}",
                Self::HEX_LEN,
                s.len()
            )));
        }

        let bytes = hex::decode(s).map_err(|e| VaultError::InvalidInput(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| VaultError::InvalidInput("invalid hash length".to_string()))?;

        Ok(Self(arr))
    }

    /// Storage key for this content inside a codebase: `<codebase-name>/<hash>`.
    ///
    /// Identical bytes in the same codebase share one key; the same bytes in
    /// two codebases get two keys.
    pub fn storage_key(&self, codebase_name: &str) -> String {
        format!("{}/{}", codebase_name, self.as_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}...)", &self.as_hex()[..12])
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
