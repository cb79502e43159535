//! SqliteRecordStore - 永続化される RecordStore
//!
//! # 実装詳細
//! - 1 グラント = `grants` テーブルの 1 行（`created_at` は epoch ミリ秒）
//! - `try_consume` は 1 文の条件付き UPDATE / DELETE（`state = 'UNVIEWED'` かつ TTL 内）
//! - 期限切れは WHERE 句で不可視にし、`purge_expired` の DELETE で物理削除
//! - 同じデータベースファイルを開いた複数インスタンスが同じグラントを共有する
//!
//! WAL モード + busy_timeout で、書き込みは SQLite 側で直列化されます。

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::config::{GrantConfig, RetentionPolicy};
use crate::domain::{ConsumeOutcome, GrantState, MediaRef, StoreError, Token, TokenRecord};
use crate::ports::{Clock, RecordStore, StoreStatus};

const MAX_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS grants (
    token      TEXT PRIMARY KEY NOT NULL,
    media_ref  TEXT NOT NULL,
    state      TEXT NOT NULL,
    created_at INTEGER NOT NULL
)
"#;

const CREATED_AT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_grants_created_at ON grants (created_at)";

pub struct SqliteRecordStore {
    pool: SqlitePool,
    ttl_millis: i64,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

impl SqliteRecordStore {
    /// Open (or create) the database behind `url`, e.g. `sqlite://grants.db`.
    pub async fn connect(
        url: &str,
        config: &GrantConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(url)
            .map_err(unavailable)?
            .create_if_missing(true)
            .journal_mode(if in_memory {
                SqliteJournalMode::Memory
            } else {
                SqliteJournalMode::Wal
            })
            .busy_timeout(BUSY_TIMEOUT);

        // インメモリ DB は接続ごとに別物なので 1 本に固定して閉じない
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
        };
        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        sqlx::query(SCHEMA).execute(&pool).await.map_err(unavailable)?;
        sqlx::query(CREATED_AT_INDEX)
            .execute(&pool)
            .await
            .map_err(unavailable)?;

        tracing::info!(url, "record store opened");
        Ok(Self {
            pool,
            ttl_millis: config.ttl_delta().num_milliseconds(),
            retention: config.retention,
            clock,
        })
    }

    /// Rows with `created_at` at or below this are past their TTL.
    fn cutoff(&self) -> i64 {
        self.clock
            .now()
            .timestamp_millis()
            .saturating_sub(self.ttl_millis)
    }

    async fn consume_in_place(&self, token: &Token, cutoff: i64) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, GrantRow>(
            r#"
            UPDATE grants SET state = 'CONSUMED'
            WHERE token = ? AND state = 'UNVIEWED' AND created_at > ?
            RETURNING token, media_ref, state, created_at
            "#,
        )
        .bind(token.as_str())
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(GrantRow::into_record).transpose()
    }

    async fn consume_and_remove(&self, token: &Token, cutoff: i64) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, GrantRow>(
            r#"
            DELETE FROM grants
            WHERE token = ? AND state = 'UNVIEWED' AND created_at > ?
            RETURNING token, media_ref, state, created_at
            "#,
        )
        .bind(token.as_str())
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut record = row.into_record()?;
        record.mark_consumed();
        Ok(Some(record))
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    async fn put(&self, record: TokenRecord) -> Result<(), StoreError> {
        // 期限切れの行だけは上書きしてよい（「存在しない」扱い）
        let result = sqlx::query(
            r#"
            INSERT INTO grants (token, media_ref, state, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (token) DO UPDATE SET
                media_ref = excluded.media_ref,
                state = excluded.state,
                created_at = excluded.created_at
            WHERE grants.created_at <= ?
            "#,
        )
        .bind(record.token.as_str())
        .bind(record.media_ref.as_str())
        .bind(record.state.as_str())
        .bind(record.created_at.timestamp_millis())
        .bind(self.cutoff())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuplicateToken(record.token));
        }
        Ok(())
    }

    async fn get(&self, token: &Token) -> Result<Option<TokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, GrantRow>(
            "SELECT token, media_ref, state, created_at FROM grants WHERE token = ? AND created_at > ?",
        )
        .bind(token.as_str())
        .bind(self.cutoff())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(GrantRow::into_record).transpose()
    }

    async fn try_consume(&self, token: &Token) -> Result<ConsumeOutcome, StoreError> {
        let cutoff = self.cutoff();
        let won = match self.retention {
            RetentionPolicy::RetainUntilExpiry => self.consume_in_place(token, cutoff).await?,
            RetentionPolicy::RemoveOnConsume => self.consume_and_remove(token, cutoff).await?,
        };
        if let Some(record) = won {
            return Ok(ConsumeOutcome::Consumed(record));
        }

        // 敗者の区別は参考情報（どちらも AlreadyExpired になる）
        let live: Option<(String,)> =
            sqlx::query_as("SELECT state FROM grants WHERE token = ? AND created_at > ?")
                .bind(token.as_str())
                .bind(cutoff)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

        Ok(match live {
            Some(_) => ConsumeOutcome::AlreadyConsumed,
            None => ConsumeOutcome::NotFound,
        })
    }

    async fn purge_expired(&self) -> Result<Vec<TokenRecord>, StoreError> {
        let rows = sqlx::query_as::<_, GrantRow>(
            "DELETE FROM grants WHERE created_at <= ? RETURNING token, media_ref, state, created_at",
        )
        .bind(self.cutoff())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.into_record() {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(error = %e, "dropped unreadable grant row");
                    None
                }
            })
            .collect())
    }

    async fn status(&self) -> Result<StoreStatus, StoreError> {
        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT state, COUNT(*) FROM grants WHERE created_at > ? GROUP BY state",
        )
        .bind(self.cutoff())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let mut status = StoreStatus::default();
        for (state, count) in counts {
            let count = usize::try_from(count).unwrap_or(0);
            match GrantState::parse(&state) {
                Some(GrantState::Unviewed) => status.unviewed += count,
                Some(GrantState::Consumed) => status.consumed += count,
                None => tracing::warn!(state = %state, "unknown grant state in store"),
            }
        }
        Ok(status)
    }
}

#[derive(sqlx::FromRow)]
struct GrantRow {
    token: String,
    media_ref: String,
    state: String,
    created_at: i64,
}

impl GrantRow {
    fn into_record(self) -> Result<TokenRecord, StoreError> {
        let corrupt = |what: &str| StoreError::Unavailable(format!("corrupt grant row: {what}"));

        let token = Token::parse(&self.token).ok_or_else(|| corrupt("token"))?;
        let state = GrantState::parse(&self.state).ok_or_else(|| corrupt("state"))?;
        let created_at: DateTime<Utc> =
            DateTime::from_timestamp_millis(self.created_at).ok_or_else(|| corrupt("created_at"))?;

        Ok(TokenRecord {
            token,
            media_ref: MediaRef::new(self.media_ref),
            state,
            created_at,
        })
    }
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}
