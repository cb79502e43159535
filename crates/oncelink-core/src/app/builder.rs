//! LifecycleBuilder - ポートのワイヤリング
//!
//! - 起動時検証（Fail-fast 設計）
//! - RecordStore と ObjectStore は必須（暗黙のグローバル状態は使わない）
//! - TokenGenerator は省略時に本番用の実装を使う
//! - Clock は RecordStore のものを使う（created_at と TTL 判定の時刻源を 1 つにする）

use std::sync::Arc;

use crate::app::LifecycleManager;
use crate::config::GrantConfig;
use crate::ports::{ObjectStore, RandomTokenGenerator, RecordStore, TokenGenerator};

/// # 使用例
/// ```ignore
/// let manager = LifecycleBuilder::new(config)
///     .record_store(store)
///     .object_store(objects)
///     .build()?;
/// ```
pub struct LifecycleBuilder {
    config: GrantConfig,
    store: Option<Arc<dyn RecordStore>>,
    objects: Option<Arc<dyn ObjectStore>>,
    tokens: Option<Arc<dyn TokenGenerator>>,
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no record store configured")]
    MissingRecordStore,

    #[error("no object store configured")]
    MissingObjectStore,

    #[error("max_create_attempts must be at least 1")]
    NoCreateAttempts,
}

impl LifecycleBuilder {
    pub fn new(config: GrantConfig) -> Self {
        Self {
            config,
            store: None,
            objects: None,
            tokens: None,
        }
    }

    pub fn record_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn object_store(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects = Some(objects);
        self
    }

    pub fn token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn build(self) -> Result<LifecycleManager, BuildError> {
        if self.config.max_create_attempts == 0 {
            return Err(BuildError::NoCreateAttempts);
        }
        let store = self.store.ok_or(BuildError::MissingRecordStore)?;
        let objects = self.objects.ok_or(BuildError::MissingObjectStore)?;
        let token_length = self.config.token_length;

        Ok(LifecycleManager {
            clock: store.clock(),
            store,
            objects,
            tokens: self
                .tokens
                .unwrap_or_else(|| Arc::new(RandomTokenGenerator::new(token_length))),
            max_create_attempts: self.config.max_create_attempts,
        })
    }
}
