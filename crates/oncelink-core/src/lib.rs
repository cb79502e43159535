//! oncelink-core
//!
//! Single-use, time-limited access grants for stored media.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（Token, MediaRef, TokenRecord, GrantState, outcomes, errors）
//! - **ports**: 抽象化レイヤー（RecordStore, ObjectStore, TokenGenerator, Clock）
//! - **impls**: 実装（InMemory/SqliteRecordStore, TimeoutStore, InMemory/LocalObjectStore）
//! - **app**: アプリケーションロジック（LifecycleBuilder, LifecycleManager, SweepLoop）
//! - **config**: GrantConfig

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{LifecycleBuilder, LifecycleManager, SweepLoop};
pub use config::{GrantConfig, RetentionPolicy};
pub use domain::{FinalizeOutcome, GrantError, MediaRef, Token, ViewOutcome};
