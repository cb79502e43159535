//! Errors - エラー型と分類
//!
//! - `StoreError`: RecordStore の失敗
//! - `ObjectStoreError`: 外部オブジェクトストアの失敗
//! - `GrantError`: LifecycleManager が呼び出し側に返すエラー
//!
//! 「期限切れ」「存在しない」「消費済み」はエラーではなく outcome で表現します。

use thiserror::Error;

use super::Token;

/// ErrorKind は運用上の分類
///
/// - Transient: 一時的なエラー（呼び出し側で再試行可能）
/// - Permanent: 恒久的なエラー（再試行は無意味）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token already exists: {0:?}")]
    DuplicateToken(Token),

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("empty payload")]
    EmptyPayload,

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("object store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum GrantError {
    #[error("could not allocate a unique token after {attempts} attempts")]
    CreationFailed { attempts: u32 },

    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("upload failed: {0}")]
    UploadFailed(#[from] ObjectStoreError),
}

impl GrantError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GrantError::StoreUnavailable(_) | GrantError::UploadFailed(_) => ErrorKind::Transient,
            GrantError::CreationFailed { .. } => ErrorKind::Permanent,
        }
    }
}

impl From<StoreError> for GrantError {
    /// `DuplicateToken` is normally absorbed by the create retry loop; one that
    /// escapes it is reported as a failed creation.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateToken(_) => GrantError::CreationFailed { attempts: 1 },
            StoreError::Unavailable(msg) => GrantError::StoreUnavailable(msg),
        }
    }
}
