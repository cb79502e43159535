//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryRecordStore**: 単一プロセス用の RecordStore
//! - **SqliteRecordStore**: 永続化・複数インスタンス共有用の RecordStore
//! - **TimeoutStore**: 任意の RecordStore に上限時間を付与
//! - **InMemoryObjectStore** / **LocalObjectStore**: ObjectStore

pub mod inmem_objects;
pub mod inmem_store;
pub mod local_objects;
pub mod sqlite_store;
pub mod timeout_store;

pub use self::inmem_objects::InMemoryObjectStore;
pub use self::inmem_store::InMemoryRecordStore;
pub use self::local_objects::LocalObjectStore;
pub use self::sqlite_store::SqliteRecordStore;
pub use self::timeout_store::TimeoutStore;
