//! Share token type.
//!
//! A [`ShareToken`] is the only identifier an end user ever sees. It is the
//! storage key and the path component of every proxy URL, so parsing is
//! strict: anything that could not have come out of [`ShareToken::generate`]
//! is rejected before it reaches the store.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Number of random bytes behind a generated token.
const TOKEN_BYTES: usize = 24;

/// Shortest accepted token (older imports used 16-byte tokens).
const MIN_TOKEN_LEN: usize = 16;

/// Longest accepted token.
const MAX_TOKEN_LEN: usize = 64;

/// Opaque, high-entropy identifier of one share.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShareToken(String);

impl ShareToken {
    /// Generate a fresh random token (24 bytes, URL-safe base64, 32 chars).
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ShareToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid_len = (MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&s.len());
        let valid_chars = s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid_len && valid_chars {
            Ok(Self(s.to_string()))
        } else {
            // Malformed tokens cannot name a share.
            Err(Error::not_found(s))
        }
    }
}

impl TryFrom<String> for ShareToken {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShareToken> for String {
    fn from(token: ShareToken) -> Self {
        token.0
    }
}

impl AsRef<str> for ShareToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_shape() {
        let token = ShareToken::generate();
        assert_eq!(token.as_str().len(), 32);
        assert!(token.as_str().parse::<ShareToken>().is_ok());
    }

    #[test]
    fn test_generate_unique() {
        let tokens: HashSet<_> = (0..1000).map(|_| ShareToken::generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_parse_rejects_path_tricks() {
        assert!("../../etc/passwd".parse::<ShareToken>().is_err());
        assert!("abc".parse::<ShareToken>().is_err());
        assert!("abcdefghijklmnop/q".parse::<ShareToken>().is_err());
        assert!("a".repeat(65).parse::<ShareToken>().is_err());
    }

    #[test]
    fn test_parse_accepts_uuid_style() {
        // Tokens created by earlier tooling were hyphenated UUIDs.
        let token: ShareToken = "0f8fad5b-d9cb-469f-a165-70867728950e".parse().unwrap();
        assert_eq!(token.to_string(), "0f8fad5b-d9cb-469f-a165-70867728950e");
    }

    #[test]
    fn test_serde_transparent() {
        let token = ShareToken::generate();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{}\"", token));
        let back: ShareToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
        assert!(serde_json::from_str::<ShareToken>("\"bad/token\"").is_err());
    }
}
