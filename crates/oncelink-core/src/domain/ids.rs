//! Domain identifiers.
//!
//! # Token
//! 共有リンクに埋め込まれる不透明な識別子です。
//! - 固定長（8 文字以上）
//! - URL セーフなアルファベット（`A-Za-z0-9_-`）
//! - 生成は `ports::TokenGenerator` が担当（ここでは形式の検証のみ）

use serde::{Deserialize, Serialize};
use std::fmt;

/// URL-safe alphabet shared by the generator and the parser.
pub const TOKEN_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

pub const MIN_TOKEN_LEN: usize = 8;
pub const MAX_TOKEN_LEN: usize = 64;

/// Opaque single-use identifier.
///
/// `Debug` only shows a prefix so that tokens never end up in logs verbatim.
/// Use `as_str()` / `Display` when the full value is needed (links, storage keys).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Validate an externally supplied token.
    ///
    /// Returns `None` for anything the generator could never have produced.
    pub fn parse(raw: &str) -> Option<Self> {
        let len = raw.len();
        if !(MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&len) {
            return None;
        }
        if !raw.bytes().all(|b| TOKEN_ALPHABET.contains(&b)) {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    /// Used by generators that already guarantee the format.
    pub(crate) fn from_generated(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First four characters followed by an ellipsis.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(4).collect();
        format!("{prefix}…")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.redacted())
    }
}

/// Reference to an uploaded object (URL or storage key). Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(String);

impl MediaRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
