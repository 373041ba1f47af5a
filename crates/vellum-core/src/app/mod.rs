//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **VaultBuilder / Vault**: ワイヤリングと外部に公開する操作
//! - **Materializer**: ブロックツリーの展開（深さ制限・ページネーション）
//! - **SnapshotStore**: capture / list / load
//! - **RetentionManager**: 件数・期間による削除
//! - **Restorer**: artifact からの復元
//! - **MutationGuard**: 変更前バックアップ
//! - **RetentionLoop**: retention の定期実行

pub mod builder;
pub mod guard;
pub mod materializer;
pub mod restorer;
pub mod retention;
pub mod retention_loop;
pub mod snapshot_store;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, Vault, VaultBuilder};
pub use self::guard::{BackupMode, BackupOutcome, MutationGuard, MutationReceipt};
pub use self::materializer::Materializer;
pub use self::restorer::Restorer;
pub use self::retention::{EvictionReport, RetentionManager};
pub use self::retention_loop::RetentionLoop;
pub use self::snapshot_store::SnapshotStore;
pub use self::status::{Inventory, PageInventory};
