//! Restorer - artifact からページを復元
//!
//! Two-phase replacement: the live top-level blocks are deleted first, then
//! the artifact's top-level blocks are appended with fresh ids. A failure
//! between the phases leaves the page partially restored; the error names
//! the failing step so the caller can judge the damage.
//!
//! Only the top level is recreated. Nested children stored in the artifact
//! are not replayed below the first level.

use std::sync::Arc;

use tracing::info;

use crate::domain::{
    ArtifactLocation, ContentBlock, PageId, PageSnapshot, RestoreStep, VaultError,
    parse_artifact_name,
};
use crate::ports::ContentGateway;

use super::materializer::Materializer;
use super::snapshot_store::{SnapshotStore, file_name};

#[derive(Clone)]
pub struct Restorer {
    gateway: Arc<dyn ContentGateway>,
    snapshots: SnapshotStore,
    materializer: Materializer,
}

impl Restorer {
    pub fn new(gateway: Arc<dyn ContentGateway>, snapshots: SnapshotStore) -> Self {
        Self {
            materializer: Materializer::new(Arc::clone(&gateway)),
            gateway,
            snapshots,
        }
    }

    /// Replay the artifact at `location` onto its page. Returns the page id.
    ///
    /// Nothing is backed up here; [`MutationGuard::restore`] captures the
    /// page's current state first.
    ///
    /// [`MutationGuard::restore`]: super::guard::MutationGuard::restore
    pub async fn restore(&self, location: &ArtifactLocation) -> Result<PageId, VaultError> {
        let snapshot = self.load(location).await?;
        self.apply(&snapshot, location).await
    }

    /// Read the artifact; failures are reported as the `load` step.
    pub async fn load(&self, location: &ArtifactLocation) -> Result<PageSnapshot, VaultError> {
        self.snapshots.load(location).await.map_err(|source| {
            // the body was never read; name the page from the artifact name if possible
            let page_id = parse_artifact_name(file_name(location))
                .map(|(page_id, _)| page_id.to_string())
                .unwrap_or_else(|| location.to_string());
            failed(&page_id, RestoreStep::Load, false)(source)
        })
    }

    /// Write a loaded snapshot back onto the live page.
    pub async fn apply(
        &self,
        snapshot: &PageSnapshot,
        location: &ArtifactLocation,
    ) -> Result<PageId, VaultError> {
        let page_id = snapshot.page.id.clone();
        let page_key = page_id.to_string();
        let root = page_id.as_block_root();
        // set once any write has reached the live page
        let mut modified = false;

        if !snapshot.page.properties.is_empty() {
            self.gateway
                .update_page_properties(&page_id, &snapshot.page.properties)
                .await
                .map_err(failed(&page_key, RestoreStep::UpdateProperties, modified))?;
            modified = true;
        }

        let current = self
            .materializer
            .materialize(&root, 1)
            .await
            .map_err(failed(&page_key, RestoreStep::ListChildren, modified))?;

        for block in &current {
            let Some(block_id) = &block.id else {
                continue;
            };
            self.gateway
                .delete_block(block_id)
                .await
                .map_err(failed(&page_key, RestoreStep::ClearBlocks, modified))?;
            modified = true;
        }

        let replacements: Vec<ContentBlock> =
            snapshot.blocks.iter().map(ContentBlock::detached).collect();
        if !replacements.is_empty() {
            self.gateway
                .append_children(&root, &replacements)
                .await
                .map_err(failed(&page_key, RestoreStep::RecreateBlocks, modified))?;
        }

        info!(
            page_id = %page_id,
            location = %location,
            removed = current.len(),
            recreated = replacements.len(),
            "page restored"
        );
        Ok(page_id)
    }
}

fn failed(
    page_id: &str,
    step: RestoreStep,
    modified: bool,
) -> impl FnOnce(VaultError) -> VaultError + '_ {
    move |source| VaultError::RestoreFailed {
        page_id: page_id.to_string(),
        step,
        modified,
        source: Box::new(source),
    }
}
