//! VaultBuilder - アプリケーションの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - ports の差し替え（テストでは InMemory 実装を注入）

use std::sync::Arc;

use crate::config::VaultConfig;
use crate::domain::{
    ArtifactDescriptor, ArtifactLocation, BlockId, ContentBlock, PageId, PageSnapshot,
    Properties, RetentionPolicy, VaultError,
};
use crate::impls::LocalArtifactStore;
use crate::ports::{ArtifactStore, Clock, ContentGateway, SystemClock};

use super::guard::{BackupMode, MutationGuard, MutationReceipt};
use super::retention::{EvictionReport, RetentionManager};
use super::retention_loop::RetentionLoop;
use super::snapshot_store::SnapshotStore;
use super::status::Inventory;

/// VaultBuilder は Vault を構築
///
/// # 使用例
/// ```ignore
/// let vault = VaultBuilder::new(config)
///     .gateway(Arc::new(HttpGateway::from_env(&config.gateway)?))
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - gateway は必須（未設定なら BuildError::MissingGateway）
/// - 設定値は build() 時に検証
/// - store / clock は省略時に LocalArtifactStore / SystemClock
pub struct VaultBuilder {
    config: VaultConfig,
    gateway: Option<Arc<dyn ContentGateway>>,
    store: Option<Arc<dyn ArtifactStore>>,
    clock: Option<Arc<dyn Clock>>,
}

/// BuildError は Vault 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No content gateway configured. Call VaultBuilder::gateway() before build().")]
    MissingGateway,

    #[error(transparent)]
    InvalidConfig(VaultError),
}

impl VaultBuilder {
    pub fn new(config: VaultConfig) -> Self {
        Self {
            config,
            gateway: None,
            store: None,
            clock: None,
        }
    }

    pub fn gateway(mut self, gateway: Arc<dyn ContentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Override the artifact medium (defaults to a directory at `storage_root`).
    pub fn store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Vault, BuildError> {
        self.config.validate().map_err(BuildError::InvalidConfig)?;
        let gateway = self.gateway.ok_or(BuildError::MissingGateway)?;
        let store = self.store.unwrap_or_else(|| {
            Arc::new(LocalArtifactStore::new(self.config.storage_root.clone()))
        });
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let snapshots = SnapshotStore::new(
            Arc::clone(&gateway),
            store,
            clock,
            self.config.max_depth,
        );
        let retention = RetentionManager::new(snapshots.clone());

        let policy = self.config.retention.policy();
        let mut guard = MutationGuard::new(gateway, snapshots.clone());
        if self.config.retention.prune_after_capture {
            guard = guard.with_pruning(retention.clone(), policy);
        }

        Ok(Vault {
            config: self.config,
            snapshots,
            retention,
            guard,
        })
    }
}

/// Vault は外側のコマンド層に公開する操作の集まり
pub struct Vault {
    config: VaultConfig,
    snapshots: SnapshotStore,
    retention: RetentionManager,
    guard: MutationGuard,
}

impl Vault {
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Policy from the `[retention]` section.
    pub fn retention_policy(&self) -> RetentionPolicy {
        self.config.retention.policy()
    }

    pub async fn capture_page(&self, page_id: &PageId) -> Result<ArtifactDescriptor, VaultError> {
        let descriptor = self.snapshots.capture(page_id).await?;
        if self.config.retention.prune_after_capture {
            if let Err(e) = self.retention.run(&self.retention_policy()).await {
                tracing::warn!(error = %e, "retention after capture failed");
            }
        }
        Ok(descriptor)
    }

    pub async fn list_artifacts(
        &self,
        page_id: &PageId,
    ) -> Result<Vec<ArtifactDescriptor>, VaultError> {
        self.snapshots.list(page_id).await
    }

    pub async fn load_artifact(
        &self,
        location: &ArtifactLocation,
    ) -> Result<PageSnapshot, VaultError> {
        self.snapshots.load(location).await
    }

    /// Restore a page from an artifact; the content it replaces is captured first.
    pub async fn restore_artifact(
        &self,
        location: &ArtifactLocation,
        mode: BackupMode,
    ) -> Result<MutationReceipt, VaultError> {
        self.guard.restore(location, mode).await
    }

    /// Evicted count; `EvictionIncomplete` if any deletion failed.
    pub async fn run_retention(&self, policy: &RetentionPolicy) -> Result<usize, VaultError> {
        self.retention.run(policy).await
    }

    /// Full report, including each failed deletion.
    pub async fn evict(&self, policy: &RetentionPolicy) -> Result<EvictionReport, VaultError> {
        self.retention.evict(policy).await
    }

    pub async fn inventory(&self) -> Result<Inventory, VaultError> {
        let descriptors = self.snapshots.list_all().await?;
        Ok(Inventory::from_descriptors(&descriptors))
    }

    pub fn guard(&self) -> &MutationGuard {
        &self.guard
    }

    pub async fn update_properties(
        &self,
        page_id: &PageId,
        properties: &Properties,
        mode: BackupMode,
    ) -> Result<MutationReceipt, VaultError> {
        self.guard.update_properties(page_id, properties, mode).await
    }

    pub async fn delete_block(
        &self,
        page_id: &PageId,
        block_id: &BlockId,
        mode: BackupMode,
    ) -> Result<MutationReceipt, VaultError> {
        self.guard.delete_block(page_id, block_id, mode).await
    }

    pub async fn replace_content(
        &self,
        page_id: &PageId,
        blocks: &[ContentBlock],
        mode: BackupMode,
    ) -> Result<MutationReceipt, VaultError> {
        self.guard.replace_content(page_id, blocks, mode).await
    }

    pub async fn archive_page(
        &self,
        page_id: &PageId,
        mode: BackupMode,
    ) -> Result<MutationReceipt, VaultError> {
        self.guard.archive_page(page_id, mode).await
    }

    /// Start the periodic retention loop with the configured policy and interval.
    pub fn spawn_retention_loop(&self) -> RetentionLoop {
        RetentionLoop::spawn(
            self.retention.clone(),
            self.retention_policy(),
            self.config.retention.interval(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlockKind, ErrorKind, PageRecord};
    use crate::impls::{InMemoryArtifactStore, InMemoryGateway};
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn config() -> VaultConfig {
        let mut config = VaultConfig::default();
        config.max_depth = 3;
        config.retention.max_artifacts_per_page = 5;
        config
    }

    async fn seeded_gateway(page_id: &PageId) -> Arc<InMemoryGateway> {
        let gateway = Arc::new(InMemoryGateway::new());
        gateway
            .insert_page(
                PageRecord::new(page_id.clone())
                    .with_property("Name", json!({ "type": "title", "title": [] })),
            )
            .await;
        gateway
            .seed_children(
                &page_id.as_block_root(),
                vec![
                    ContentBlock::new(BlockKind::Paragraph, json!({ "rich_text": [] })),
                    ContentBlock::new(BlockKind::ToDo, json!({ "checked": false, "rich_text": [] }))
                        .with_children(vec![
                            ContentBlock::new(BlockKind::Paragraph, json!({ "rich_text": [] })),
                            ContentBlock::new(BlockKind::Paragraph, json!({ "rich_text": [] })),
                        ]),
                    ContentBlock::new(BlockKind::Callout, json!({ "icon": null, "rich_text": [] })),
                ],
            )
            .await
            .unwrap();
        gateway
    }

    #[test]
    fn build_requires_a_gateway() {
        let result = VaultBuilder::new(config()).build();
        assert!(matches!(result, Err(BuildError::MissingGateway)));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let mut config = config();
        config.max_depth = 0;
        let result = VaultBuilder::new(config)
            .gateway(Arc::new(InMemoryGateway::new()))
            .build();
        assert!(matches!(result, Err(BuildError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn capture_restore_round_trip_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let page_id = PageId::parse("e2e").unwrap();
        let gateway = seeded_gateway(&page_id).await;

        let mut config = config();
        config.storage_root = tmp.path().to_path_buf();
        let vault = VaultBuilder::new(config)
            .gateway(gateway.clone())
            .build()
            .unwrap();

        let descriptor = vault.capture_page(&page_id).await.unwrap();
        assert!(descriptor.location.as_str().starts_with(tmp.path().to_str().unwrap()));
        let before = gateway.page(&page_id).await.unwrap();

        vault
            .replace_content(&page_id, &[], BackupMode::Skip)
            .await
            .unwrap();
        assert!(gateway.children_of(&page_id.as_block_root()).await.is_empty());

        let receipt = vault
            .restore_artifact(&descriptor.location, BackupMode::Required)
            .await
            .unwrap();
        assert_eq!(receipt.page_id, page_id);
        let after = gateway.page(&page_id).await.unwrap();
        assert_eq!(after.properties, before.properties);
        assert_eq!(gateway.children_of(&page_id.as_block_root()).await.len(), 3);
    }

    #[tokio::test]
    async fn content_replaced_by_restore_stays_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let page_id = PageId::parse("edited").unwrap();
        let gateway = seeded_gateway(&page_id).await;
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()));

        let mut config = config();
        config.storage_root = tmp.path().to_path_buf();
        let vault = VaultBuilder::new(config)
            .gateway(gateway.clone())
            .clock(clock.clone())
            .build()
            .unwrap();

        let original = vault.capture_page(&page_id).await.unwrap();
        gateway
            .append_children(
                &page_id.as_block_root(),
                &[ContentBlock::new(
                    BlockKind::Quote,
                    json!({ "rich_text": [{ "plain_text": "new work" }] }),
                )],
            )
            .await
            .unwrap();
        clock.advance(Duration::minutes(5));

        let receipt = vault
            .restore_artifact(&original.location, BackupMode::default())
            .await
            .unwrap();

        let listed = vault.list_artifacts(&page_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        let backup = receipt.backup.descriptor().unwrap();
        assert_eq!(&listed[0], backup);

        let saved = vault.load_artifact(&backup.location).await.unwrap();
        assert!(saved.blocks.iter().any(|b| b.kind == BlockKind::Quote));
        assert!(
            gateway
                .children_of(&page_id.as_block_root())
                .await
                .iter()
                .all(|b| b.kind != BlockKind::Quote)
        );
    }

    #[tokio::test]
    async fn retention_keeps_newest_five_of_seven() {
        let page_id = PageId::parse("busy").unwrap();
        let gateway = seeded_gateway(&page_id).await;
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()));
        let vault = VaultBuilder::new(config())
            .gateway(gateway)
            .store(Arc::new(InMemoryArtifactStore::new()))
            .clock(clock.clone())
            .build()
            .unwrap();

        let mut captured = Vec::new();
        for _ in 0..7 {
            captured.push(vault.capture_page(&page_id).await.unwrap());
            clock.advance(Duration::hours(1));
        }

        let evicted = vault.run_retention(&vault.retention_policy()).await.unwrap();
        assert_eq!(evicted, 2);

        let listed = vault.list_artifacts(&page_id).await.unwrap();
        let expected: Vec<_> = captured.iter().rev().take(5).cloned().collect();
        assert_eq!(listed, expected);

        let inventory = vault.inventory().await.unwrap();
        assert_eq!(inventory.total_artifacts, 5);
        assert_eq!(inventory.page(&page_id).unwrap().newest, captured[6].captured_at);
    }

    #[tokio::test]
    async fn prune_after_capture_caps_artifacts() {
        let page_id = PageId::parse("pruned").unwrap();
        let gateway = seeded_gateway(&page_id).await;
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()));
        let store = Arc::new(InMemoryArtifactStore::new());

        let mut config = config();
        config.retention.max_artifacts_per_page = 2;
        config.retention.prune_after_capture = true;
        let vault = VaultBuilder::new(config)
            .gateway(gateway)
            .store(store.clone())
            .clock(clock.clone())
            .build()
            .unwrap();

        for _ in 0..4 {
            vault.capture_page(&page_id).await.unwrap();
            clock.advance(Duration::minutes(1));
        }
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn archive_without_backup_is_refused_by_default() {
        let page_id = PageId::parse("ghost").unwrap();
        let vault = VaultBuilder::new(config())
            .gateway(Arc::new(InMemoryGateway::new()))
            .store(Arc::new(InMemoryArtifactStore::new()))
            .build()
            .unwrap();

        let err = vault
            .archive_page(&page_id, BackupMode::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::BackupUnavailable { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
