//! MutationGuard - 変更前のバックアップ
//!
//! Every destructive operation captures the page first. What happens when
//! the capture fails is decided per call by [`BackupMode`]; the outcome is
//! always reported back in the [`MutationReceipt`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{
    ArtifactDescriptor, ArtifactLocation, BlockId, ContentBlock, PageId, Properties,
    RetentionPolicy, VaultError,
};
use crate::ports::ContentGateway;

use super::materializer::Materializer;
use super::restorer::Restorer;
use super::retention::RetentionManager;
use super::snapshot_store::SnapshotStore;

/// What to do about the pre-mutation backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupMode {
    /// Abort the mutation if the backup cannot be written.
    #[default]
    Required,
    /// Try to back up, run the mutation either way.
    BestEffort,
    /// Mutate without a backup.
    Skip,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackupOutcome {
    Captured(ArtifactDescriptor),
    Failed { reason: String },
    Skipped,
}

impl BackupOutcome {
    pub fn descriptor(&self) -> Option<&ArtifactDescriptor> {
        match self {
            Self::Captured(descriptor) => Some(descriptor),
            _ => None,
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Captured(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationReceipt {
    pub page_id: PageId,
    pub operation: &'static str,
    pub backup: BackupOutcome,
}

#[derive(Clone)]
pub struct MutationGuard {
    gateway: Arc<dyn ContentGateway>,
    snapshots: SnapshotStore,
    materializer: Materializer,
    restorer: Restorer,
    pruning: Option<(RetentionManager, RetentionPolicy)>,
}

impl MutationGuard {
    pub fn new(gateway: Arc<dyn ContentGateway>, snapshots: SnapshotStore) -> Self {
        Self {
            materializer: Materializer::new(Arc::clone(&gateway)),
            restorer: Restorer::new(Arc::clone(&gateway), snapshots.clone()),
            gateway,
            snapshots,
            pruning: None,
        }
    }

    /// Run a retention pass after every successful backup.
    pub fn with_pruning(mut self, retention: RetentionManager, policy: RetentionPolicy) -> Self {
        self.pruning = Some((retention, policy));
        self
    }

    pub async fn update_properties(
        &self,
        page_id: &PageId,
        properties: &Properties,
        mode: BackupMode,
    ) -> Result<MutationReceipt, VaultError> {
        const OPERATION: &str = "update_properties";
        let backup = self.protect(page_id, OPERATION, mode).await?;
        self.gateway.update_page_properties(page_id, properties).await?;
        Ok(self.receipt(page_id, OPERATION, backup))
    }

    /// Delete one block of `page_id` (the page is what gets backed up).
    ///
    /// The block must sit in the page's tree within the capture depth;
    /// otherwise the call fails with `NotFound` before anything is written.
    pub async fn delete_block(
        &self,
        page_id: &PageId,
        block_id: &BlockId,
        mode: BackupMode,
    ) -> Result<MutationReceipt, VaultError> {
        const OPERATION: &str = "delete_block";
        let tree = self
            .materializer
            .materialize(&page_id.as_block_root(), self.snapshots.max_depth())
            .await?;
        if !contains_block(&tree, block_id) {
            return Err(VaultError::not_found(
                "block",
                format!("{block_id} in page {page_id}"),
            ));
        }

        let backup = self.protect(page_id, OPERATION, mode).await?;
        self.gateway.delete_block(block_id).await?;
        Ok(self.receipt(page_id, OPERATION, backup))
    }

    /// Swap the page's top-level blocks for `blocks`.
    pub async fn replace_content(
        &self,
        page_id: &PageId,
        blocks: &[ContentBlock],
        mode: BackupMode,
    ) -> Result<MutationReceipt, VaultError> {
        const OPERATION: &str = "replace_content";
        let backup = self.protect(page_id, OPERATION, mode).await?;

        let root = page_id.as_block_root();
        let current = self.materializer.materialize(&root, 1).await?;
        for block_id in current.iter().filter_map(|block| block.id.as_ref()) {
            self.gateway.delete_block(block_id).await?;
        }
        let fresh: Vec<ContentBlock> = blocks.iter().map(ContentBlock::detached).collect();
        if !fresh.is_empty() {
            self.gateway.append_children(&root, &fresh).await?;
        }
        Ok(self.receipt(page_id, OPERATION, backup))
    }

    /// Logical delete of the page.
    pub async fn archive_page(
        &self,
        page_id: &PageId,
        mode: BackupMode,
    ) -> Result<MutationReceipt, VaultError> {
        const OPERATION: &str = "archive";
        let backup = self.protect(page_id, OPERATION, mode).await?;
        self.gateway.archive_page(page_id).await?;
        Ok(self.receipt(page_id, OPERATION, backup))
    }

    /// Replay an artifact onto its page after backing up what it replaces.
    ///
    /// The artifact is read first so the backup targets the page it names.
    pub async fn restore(
        &self,
        location: &ArtifactLocation,
        mode: BackupMode,
    ) -> Result<MutationReceipt, VaultError> {
        const OPERATION: &str = "restore";
        let snapshot = self.restorer.load(location).await?;
        let page_id = snapshot.page.id.clone();
        let backup = self.protect(&page_id, OPERATION, mode).await?;
        self.restorer.apply(&snapshot, location).await?;
        Ok(self.receipt(&page_id, OPERATION, backup))
    }

    async fn protect(
        &self,
        page_id: &PageId,
        operation: &'static str,
        mode: BackupMode,
    ) -> Result<BackupOutcome, VaultError> {
        if mode == BackupMode::Skip {
            warn!(page_id = %page_id, operation, "mutating without a backup (skipped by caller)");
            return Ok(BackupOutcome::Skipped);
        }

        match self.snapshots.capture(page_id).await {
            Ok(descriptor) => {
                self.prune().await;
                Ok(BackupOutcome::Captured(descriptor))
            }
            Err(source) if mode == BackupMode::Required => Err(VaultError::BackupUnavailable {
                page_id: page_id.to_string(),
                operation,
                source: Box::new(source),
            }),
            Err(source) => {
                warn!(
                    page_id = %page_id,
                    operation,
                    error = %source,
                    "backup failed, mutating unprotected"
                );
                Ok(BackupOutcome::Failed {
                    reason: source.to_string(),
                })
            }
        }
    }

    async fn prune(&self) {
        let Some((retention, policy)) = &self.pruning else {
            return;
        };
        // the backup is already written; a failed pass is only reported
        if let Err(e) = retention.run(policy).await {
            warn!(error = %e, "retention after capture failed");
        }
    }

    fn receipt(
        &self,
        page_id: &PageId,
        operation: &'static str,
        backup: BackupOutcome,
    ) -> MutationReceipt {
        info!(
            page_id = %page_id,
            operation,
            protected = backup.is_protected(),
            "mutation applied"
        );
        MutationReceipt {
            page_id: page_id.clone(),
            operation,
            backup,
        }
    }
}

fn contains_block(blocks: &[ContentBlock], block_id: &BlockId) -> bool {
    blocks.iter().any(|block| {
        block.id.as_ref() == Some(block_id)
            || block
                .children
                .as_deref()
                .is_some_and(|children| contains_block(children, block_id))
    })
}
