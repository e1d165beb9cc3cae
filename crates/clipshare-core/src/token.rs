//! Opaque clip tokens.
//!
//! A [`ClipToken`] is the public handle of a generated clip: random bytes
//! encoded with the unpadded URL-safe base64 alphabet, so it can be dropped
//! into a URL path segment as-is.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Default number of random bytes per token (128 bits).
pub const DEFAULT_TOKEN_BYTES: usize = 16;

/// Longest encoded token accepted by [`ClipToken::from_str`].
const MAX_ENCODED_LEN: usize = 128;

/// Most random bytes per token; 96 bytes encode to exactly
/// [`MAX_ENCODED_LEN`] characters, so every generated token parses back.
pub const MAX_TOKEN_BYTES: usize = MAX_ENCODED_LEN / 4 * 3;

/// Opaque, unguessable identifier for one clip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipToken(String);

impl ClipToken {
    /// Generate a token from [`DEFAULT_TOKEN_BYTES`] random bytes.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_with_len(DEFAULT_TOKEN_BYTES)
    }

    /// Generate a token from `byte_len` random bytes.
    ///
    /// Lengths are clamped to `DEFAULT_TOKEN_BYTES..=MAX_TOKEN_BYTES`.
    #[must_use]
    pub fn generate_with_len(byte_len: usize) -> Self {
        let mut bytes = vec![0u8; byte_len.clamp(DEFAULT_TOKEN_BYTES, MAX_TOKEN_BYTES)];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// The encoded token string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a string is not a well-formed token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed clip token")]
pub struct InvalidToken;

impl FromStr for ClipToken {
    type Err = InvalidToken;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let well_formed = !s.is_empty()
            && s.len() <= MAX_ENCODED_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

        if well_formed {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidToken)
        }
    }
}
