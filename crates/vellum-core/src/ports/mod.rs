//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（リモートワークスペース、ストレージ、時計）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod artifact_store;
pub mod clock;
pub mod gateway;

// 主要な trait を再エクスポート
pub use self::artifact_store::{ArtifactStore, StoredObject};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::gateway::{ChildrenPage, ContentGateway};
