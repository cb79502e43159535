//! TokenGenerator port - トークン生成の抽象化
//!
//! テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **RandomTokenGenerator**: CSPRNG ベース（本番用）

use rand::Rng;
use rand::distributions::Uniform;

use crate::domain::Token;
use crate::domain::ids::{MAX_TOKEN_LEN, MIN_TOKEN_LEN, TOKEN_ALPHABET};

pub const DEFAULT_TOKEN_LEN: usize = 12;

/// TokenGenerator は推測不能な固定長トークンを生成
///
/// # 要件
/// - media_ref や時刻から導出できないこと（連番・タイムスタンプ禁止）
/// - 副作用なし
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数リクエストから共有）
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> Token;
}

/// Draws every character independently from the 64-symbol URL-safe alphabet
/// (6 bits each) using the thread-local CSPRNG.
#[derive(Debug, Clone)]
pub struct RandomTokenGenerator {
    len: usize,
}

impl RandomTokenGenerator {
    /// `len` is clamped to `MIN_TOKEN_LEN..=MAX_TOKEN_LEN`.
    pub fn new(len: usize) -> Self {
        Self {
            len: len.clamp(MIN_TOKEN_LEN, MAX_TOKEN_LEN),
        }
    }

    pub fn token_len(&self) -> usize {
        self.len
    }
}

impl Default for RandomTokenGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LEN)
    }
}

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> Token {
        let index = Uniform::from(0..TOKEN_ALPHABET.len());
        let raw: String = rand::thread_rng()
            .sample_iter(index)
            .take(self.len)
            .map(|i| TOKEN_ALPHABET[i] as char)
            .collect();
        Token::from_generated(raw)
    }
}
