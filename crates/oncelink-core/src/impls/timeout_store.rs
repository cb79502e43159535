//! TimeoutStore - RecordStore の呼び出しに上限時間を設けるデコレータ
//!
//! タイムアウトした呼び出しは `StoreError::Unavailable` になります（ハングしない）。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{ConsumeOutcome, StoreError, Token, TokenRecord};
use crate::ports::{Clock, RecordStore, StoreStatus};

pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: RecordStore> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T: Send>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout_ms = self.timeout.as_millis() as u64, "record store call timed out");
                Err(StoreError::Unavailable(format!(
                    "{op} timed out after {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for TimeoutStore<S> {
    fn clock(&self) -> Arc<dyn Clock> {
        self.inner.clock()
    }

    async fn put(&self, record: TokenRecord) -> Result<(), StoreError> {
        self.bounded("put", self.inner.put(record)).await
    }

    async fn get(&self, token: &Token) -> Result<Option<TokenRecord>, StoreError> {
        self.bounded("get", self.inner.get(token)).await
    }

    async fn try_consume(&self, token: &Token) -> Result<ConsumeOutcome, StoreError> {
        self.bounded("try_consume", self.inner.try_consume(token)).await
    }

    async fn purge_expired(&self) -> Result<Vec<TokenRecord>, StoreError> {
        self.bounded("purge_expired", self.inner.purge_expired()).await
    }

    async fn status(&self) -> Result<StoreStatus, StoreError> {
        self.bounded("status", self.inner.status()).await
    }
}
