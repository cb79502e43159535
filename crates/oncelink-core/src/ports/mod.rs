//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（レコードストア、オブジェクトストア、時刻、乱数）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - RecordStore が source of truth（正本）
//! - ObjectStore は不透明な URL を返すだけ
//! - すべての依存は LifecycleManager に明示的に注入される（グローバル状態なし）

pub mod clock;
pub mod object_store;
pub mod record_store;
pub mod token_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::object_store::{ObjectStore, StoredObject};
pub use self::record_store::{RecordStore, StoreStatus};
pub use self::token_generator::{RandomTokenGenerator, TokenGenerator};
