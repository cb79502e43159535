//! LifecycleManager - グラントの作成と消費
//!
//! # 状態遷移
//! - `create_grant`: (なし) -> Unviewed
//! - `begin_view`: 読み取りのみ（何度呼んでもよい）
//! - `finalize_view`: Unviewed -> Consumed（RecordStore::try_consume に委譲、勝者は 1 人）
//! - TTL 経過: 任意の状態 -> 不在（外部からは「存在しない」と区別できない）
//!
//! # 表示ウィンドウ
//! begin と finalize を分けることで、配信側はカウントダウン中にメディアを表示できます。
//! リトライ・重複タブ・並行リクエストがあっても Consumed への遷移は高々 1 回です。
//!
//! # メディアの寿命
//! - 勝者の finalize でオブジェクトを削除する
//! - TTL 経過後のレコードは `reclaim_expired` がオブジェクトごと回収する

use std::sync::Arc;

use crate::domain::{
    ConsumeOutcome, FinalizeOutcome, GrantError, MediaRef, ObjectStoreError, StoreError, Token,
    TokenRecord, ViewOutcome,
};
use crate::ports::{Clock, ObjectStore, RecordStore, StoreStatus, StoredObject, TokenGenerator};

/// Orchestrates grant creation and consumption over injected ports.
///
/// Holds no authoritative state of its own; cheap to clone and share.
#[derive(Clone)]
pub struct LifecycleManager {
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) objects: Arc<dyn ObjectStore>,
    pub(crate) tokens: Arc<dyn TokenGenerator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) max_create_attempts: u32,
}

impl LifecycleManager {
    /// Create a record for `media_ref` under a fresh token.
    ///
    /// Token collisions are retried with a new token up to `max_create_attempts`
    /// times; every other store failure surfaces immediately.
    pub async fn create_grant(&self, media_ref: MediaRef) -> Result<Token, GrantError> {
        for attempt in 1..=self.max_create_attempts {
            let token = self.tokens.generate();
            let record = TokenRecord::new(token.clone(), media_ref.clone(), self.clock.now());

            match self.store.put(record).await {
                Ok(()) => {
                    tracing::info!(token = %token.redacted(), attempt, "grant created");
                    return Ok(token);
                }
                Err(StoreError::DuplicateToken(_)) => {
                    tracing::warn!(attempt, "token collision, regenerating");
                }
                Err(StoreError::Unavailable(msg)) => {
                    tracing::error!(error = %msg, "grant creation failed");
                    return Err(GrantError::StoreUnavailable(msg));
                }
            }
        }

        tracing::error!(attempts = self.max_create_attempts, "no unique token found");
        Err(GrantError::CreationFailed {
            attempts: self.max_create_attempts,
        })
    }

    /// Upload `bytes` to the object store, then create a grant for the result.
    ///
    /// An upload failure aborts before any record exists.
    pub async fn publish(&self, bytes: Vec<u8>, content_type: &str) -> Result<Token, GrantError> {
        let size = bytes.len();
        let media_ref = self.objects.put(bytes, content_type).await.map_err(|e| {
            tracing::warn!(error = %e, size, "upload failed");
            GrantError::UploadFailed(e)
        })?;
        self.create_grant(media_ref).await
    }

    /// Best-effort: the grant outcome does not depend on it.
    async fn release_media(&self, media_ref: &MediaRef) {
        match self.objects.delete(media_ref).await {
            Ok(true) => tracing::debug!("media released"),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "media release failed"),
        }
    }

    /// Read-only: returns the media reference while the grant is unviewed.
    pub async fn begin_view(&self, token: &Token) -> Result<ViewOutcome, GrantError> {
        let outcome = match self.store.get(token).await? {
            Some(record) if record.state.is_viewable() => ViewOutcome::Viewable(record.media_ref),
            _ => ViewOutcome::Expired,
        };
        tracing::debug!(token = %token.redacted(), ?outcome, "begin view");
        Ok(outcome)
    }

    /// The only entry point for the viewed transition. `Finalized` is returned to
    /// exactly one caller per token; everyone else gets `AlreadyExpired`.
    pub async fn finalize_view(&self, token: &Token) -> Result<FinalizeOutcome, GrantError> {
        let outcome = self.store.try_consume(token).await?;
        match &outcome {
            ConsumeOutcome::Consumed(record) => {
                tracing::info!(token = %token.redacted(), "grant consumed");
                self.release_media(&record.media_ref).await;
            }
            ConsumeOutcome::AlreadyConsumed => {
                tracing::debug!(token = %token.redacted(), "finalize after consumption");
            }
            ConsumeOutcome::NotFound => {
                tracing::debug!(token = %token.redacted(), "finalize on absent grant");
            }
        }
        Ok(outcome.into())
    }

    /// Dereference media hosted by the injected object store.
    pub async fn fetch_media(&self, key: &str) -> Result<Option<StoredObject>, ObjectStoreError> {
        self.objects.fetch(key).await
    }

    /// Purge records past their TTL and release their media. Returns how many
    /// records were removed.
    pub async fn reclaim_expired(&self) -> Result<usize, GrantError> {
        let purged = self.store.purge_expired().await?;
        for record in &purged {
            self.release_media(&record.media_ref).await;
        }
        Ok(purged.len())
    }

    pub async fn status(&self) -> Result<StoreStatus, GrantError> {
        Ok(self.store.status().await?)
    }
}
