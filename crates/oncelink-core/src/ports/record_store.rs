//! RecordStore port - トークンレコードの正本（source of truth）
//!
//! RecordStore は以下を管理します：
//! - TokenRecord の永続化
//! - TTL による期限切れ（読み取り時に不可視、最終的に物理削除）
//! - Unviewed -> Consumed のアトミックな条件付き更新
//!
//! # 設計原則
//! - プロセス内メモリに権威はない（複数のステートレスなインスタンスから共有される前提）
//! - 同一トークンへの操作は `try_consume` でのみ直列化される
//! - 別トークンへの操作は互いにブロックしない
//! - `created_at` と TTL 判定は同じ Clock（`RecordStore::clock`）に従う

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ConsumeOutcome, StoreError, Token, TokenRecord};
use crate::ports::Clock;

/// Live record counts (records past their TTL are not counted).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStatus {
    pub unviewed: usize,
    pub consumed: usize,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Time source for TTL checks. New records must be stamped with it.
    fn clock(&self) -> Arc<dyn Clock>;

    /// Insert a new record. Fails with `DuplicateToken` if a live record holds the
    /// token; an expired-but-unreclaimed record may be overwritten.
    async fn put(&self, record: TokenRecord) -> Result<(), StoreError>;

    /// Pure read. `None` if absent or past its TTL.
    async fn get(&self, token: &Token) -> Result<Option<TokenRecord>, StoreError>;

    /// Single atomic compare-and-set: `state == Unviewed` -> `Consumed`.
    ///
    /// Linearizable per token: of any number of concurrent callers exactly one
    /// sees `Consumed`, the rest see `AlreadyConsumed` (or `NotFound` once the
    /// record is gone).
    async fn try_consume(&self, token: &Token) -> Result<ConsumeOutcome, StoreError>;

    /// Physically remove every record past its TTL and hand them back so their
    /// media can be released.
    async fn purge_expired(&self) -> Result<Vec<TokenRecord>, StoreError>;

    async fn status(&self) -> Result<StoreStatus, StoreError>;
}
