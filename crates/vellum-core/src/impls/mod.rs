//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **LocalArtifactStore**: ディレクトリ上の artifact 保存先（本番用）
//! - **InMemoryArtifactStore**: テスト用の保存先
//! - **HttpGateway**: REST API 経由のリモートワークスペース
//! - **InMemoryGateway**: 障害注入できるテスト用ワークスペース

pub mod http_gateway;
pub mod inmem_gateway;
pub mod inmem_store;
pub mod local_store;

// 主要な型を再エクスポート
pub use self::http_gateway::HttpGateway;
pub use self::inmem_gateway::{GatewayOp, InMemoryGateway};
pub use self::inmem_store::InMemoryArtifactStore;
pub use self::local_store::LocalArtifactStore;
