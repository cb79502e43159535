//! InMemoryRecordStore - 開発・テスト用の RecordStore
//!
//! # 実装詳細
//! - DashMap（シャード単位のロック）で別トークン同士が競合しない
//! - `try_consume` はシャードの書き込みロック内で 1 回の比較・更新を行う
//! - 期限切れレコードは読み取り時には不可視、`purge_expired` で物理削除
//!
//! 単一プロセス用です。複数インスタンス構成では `SqliteRecordStore` を使ってください。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::config::{GrantConfig, RetentionPolicy};
use crate::domain::{ConsumeOutcome, GrantState, StoreError, Token, TokenRecord};
use crate::ports::{Clock, RecordStore, StoreStatus};

pub struct InMemoryRecordStore {
    records: DashMap<Token, TokenRecord>,
    ttl: TimeDelta,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

impl InMemoryRecordStore {
    pub fn new(config: &GrantConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            ttl: config.ttl_delta(),
            retention: config.retention,
            clock,
        }
    }

    /// Number of physically stored records, including expired ones not yet purged.
    pub fn stored_len(&self) -> usize {
        self.records.len()
    }

    fn is_live(&self, record: &TokenRecord, now: DateTime<Utc>) -> bool {
        !record.is_expired(now, self.ttl)
    }

    /// Compare-and-set inside the shard write lock.
    fn consume_in_place(&self, token: &Token, now: DateTime<Utc>) -> ConsumeOutcome {
        let Some(mut entry) = self.records.get_mut(token) else {
            return ConsumeOutcome::NotFound;
        };
        if !self.is_live(entry.value(), now) {
            return ConsumeOutcome::NotFound;
        }
        if entry.value_mut().mark_consumed() {
            ConsumeOutcome::Consumed(entry.value().clone())
        } else {
            ConsumeOutcome::AlreadyConsumed
        }
    }

    /// Conditional removal: only a live, unviewed record is taken out.
    fn consume_and_remove(&self, token: &Token, now: DateTime<Utc>) -> ConsumeOutcome {
        let removed = self
            .records
            .remove_if(token, |_, record| {
                record.state.is_viewable() && self.is_live(record, now)
            });

        match removed {
            Some((_, mut record)) => {
                record.mark_consumed();
                ConsumeOutcome::Consumed(record)
            }
            None => match self.records.get(token) {
                Some(record) if self.is_live(record.value(), now) => {
                    ConsumeOutcome::AlreadyConsumed
                }
                _ => ConsumeOutcome::NotFound,
            },
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    async fn put(&self, record: TokenRecord) -> Result<(), StoreError> {
        let now = self.clock.now();
        match self.records.entry(record.token.clone()) {
            Entry::Occupied(mut occupied) => {
                // 期限切れは「存在しない」扱いなので上書きしてよい
                if self.is_live(occupied.get(), now) {
                    return Err(StoreError::DuplicateToken(record.token));
                }
                occupied.insert(record);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record);
            }
        }
        Ok(())
    }

    async fn get(&self, token: &Token) -> Result<Option<TokenRecord>, StoreError> {
        let now = self.clock.now();
        Ok(self
            .records
            .get(token)
            .filter(|record| self.is_live(record.value(), now))
            .map(|record| record.value().clone()))
    }

    async fn try_consume(&self, token: &Token) -> Result<ConsumeOutcome, StoreError> {
        let now = self.clock.now();
        let outcome = match self.retention {
            RetentionPolicy::RetainUntilExpiry => self.consume_in_place(token, now),
            RetentionPolicy::RemoveOnConsume => self.consume_and_remove(token, now),
        };
        Ok(outcome)
    }

    async fn purge_expired(&self) -> Result<Vec<TokenRecord>, StoreError> {
        let now = self.clock.now();
        let expired: Vec<Token> = self
            .records
            .iter()
            .filter(|record| !self.is_live(record.value(), now))
            .map(|record| record.key().clone())
            .collect();

        // 走査と削除の間に put で置き換えられたレコードは残す
        Ok(expired
            .iter()
            .filter_map(|token| self.records.remove_if(token, |_, record| !self.is_live(record, now)))
            .map(|(_, record)| record)
            .collect())
    }

    async fn status(&self) -> Result<StoreStatus, StoreError> {
        let now = self.clock.now();
        let mut status = StoreStatus::default();
        for record in self.records.iter() {
            if !self.is_live(record.value(), now) {
                continue;
            }
            match record.state {
                GrantState::Unviewed => status.unviewed += 1,
                GrantState::Consumed => status.consumed += 1,
            }
        }
        Ok(status)
    }
}
