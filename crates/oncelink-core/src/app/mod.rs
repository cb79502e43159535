//! App - アプリケーション層
//!
//! ports を組み合わせてグラントのライフサイクルを実装します。
//!
//! # 主要コンポーネント
//! - **LifecycleBuilder**: ポートのワイヤリングと起動時検証
//! - **LifecycleManager**: create / begin_view / finalize_view
//! - **SweepLoop**: 期限切れレコードの回収

pub mod builder;
pub mod lifecycle;
pub mod sweeper;

pub use self::builder::{BuildError, LifecycleBuilder};
pub use self::lifecycle::LifecycleManager;
pub use self::sweeper::SweepLoop;
