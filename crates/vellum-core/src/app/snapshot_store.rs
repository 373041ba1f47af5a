//! SnapshotStore - ページのスナップショット保存
//!
//! # 学習ポイント
//! - ports（Gateway / ArtifactStore / Clock）を Arc<dyn Trait> で受け取る
//! - 名前だけから ArtifactDescriptor を復元する（本体は読まない）
//!
//! Capture order: page properties, then the block tree, then one atomic
//! `put`. Nothing becomes visible to `list` unless every step succeeded.

use std::io;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::domain::artifact::{ARTIFACT_PREFIX, normalize_capture_time, page_prefix};
use crate::domain::{
    ArtifactDescriptor, ArtifactLocation, PageId, PageSnapshot, VaultError, artifact_name,
    parse_artifact_name,
};
use crate::ports::{ArtifactStore, Clock, ContentGateway, StoredObject};

use super::materializer::Materializer;

/// Attempts at a fresh name when the capture time collides with an existing artifact.
const NAME_ATTEMPTS: usize = 8;

#[derive(Clone)]
pub struct SnapshotStore {
    gateway: Arc<dyn ContentGateway>,
    store: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    materializer: Materializer,
    max_depth: usize,
}

impl SnapshotStore {
    pub fn new(
        gateway: Arc<dyn ContentGateway>,
        store: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
        max_depth: usize,
    ) -> Self {
        Self {
            materializer: Materializer::new(Arc::clone(&gateway)),
            gateway,
            store,
            clock,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Fetch the page and its block tree and persist them as a new artifact.
    pub async fn capture(&self, page_id: &PageId) -> Result<ArtifactDescriptor, VaultError> {
        let page = self.gateway.get_page(page_id).await?;
        let blocks = self
            .materializer
            .materialize(&page_id.as_block_root(), self.max_depth)
            .await?;

        let mut snapshot = PageSnapshot {
            page,
            captured_at: None,
            blocks,
        };
        let mut captured_at = normalize_capture_time(self.clock.now());

        for _ in 0..NAME_ATTEMPTS {
            snapshot.captured_at = Some(captured_at);
            let bytes = serde_json::to_vec_pretty(&snapshot).map_err(io::Error::from)?;
            let size_bytes = bytes.len() as u64;
            let name = artifact_name(page_id, captured_at);

            match self.store.put(&name, bytes).await {
                Ok(location) => {
                    info!(
                        page_id = %page_id,
                        location = %location,
                        blocks = snapshot.block_count(),
                        size_bytes,
                        "page captured"
                    );
                    return Ok(ArtifactDescriptor {
                        page_id: page_id.clone(),
                        captured_at,
                        location,
                        size_bytes,
                    });
                }
                Err(VaultError::Storage(e)) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(page_id = %page_id, name, "artifact name taken, shifting capture time");
                    captured_at += Duration::microseconds(1);
                }
                Err(e) => return Err(e),
            }
        }

        Err(VaultError::Storage(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free artifact name for page {page_id}"),
        )))
    }

    /// Artifacts of one page, newest first. Unparseable names are skipped.
    pub async fn list(&self, page_id: &PageId) -> Result<Vec<ArtifactDescriptor>, VaultError> {
        let objects = self.store.list(&page_prefix(page_id)).await?;
        // the prefix of "a" also matches page "a_b"; compare parsed ids
        let mut descriptors: Vec<_> = objects
            .into_iter()
            .filter_map(describe)
            .filter(|d| &d.page_id == page_id)
            .collect();
        sort_newest_first(&mut descriptors);
        Ok(descriptors)
    }

    /// Artifacts of every page, newest first.
    pub async fn list_all(&self) -> Result<Vec<ArtifactDescriptor>, VaultError> {
        let objects = self.store.list(ARTIFACT_PREFIX).await?;
        let mut descriptors: Vec<_> = objects.into_iter().filter_map(describe).collect();
        sort_newest_first(&mut descriptors);
        Ok(descriptors)
    }

    /// Read and decode one artifact.
    ///
    /// Bodies written without `captured_at` get it back from the artifact name.
    pub async fn load(&self, location: &ArtifactLocation) -> Result<PageSnapshot, VaultError> {
        let bytes = self.store.get(location).await?;
        let mut snapshot: PageSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| VaultError::malformed(location.as_str(), e.to_string()))?;

        if snapshot.captured_at.is_none() {
            snapshot.captured_at =
                parse_artifact_name(file_name(location)).map(|(_, captured_at)| captured_at);
        }
        Ok(snapshot)
    }

    pub async fn delete(&self, location: &ArtifactLocation) -> Result<(), VaultError> {
        self.store.delete(location).await
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

fn describe(object: StoredObject) -> Option<ArtifactDescriptor> {
    let (page_id, captured_at) = parse_artifact_name(&object.name)?;
    Some(ArtifactDescriptor {
        page_id,
        captured_at,
        location: object.location,
        size_bytes: object.size_bytes,
    })
}

fn sort_newest_first(descriptors: &mut [ArtifactDescriptor]) {
    descriptors.sort_by(|a, b| {
        b.captured_at
            .cmp(&a.captured_at)
            .then_with(|| a.location.as_str().cmp(b.location.as_str()))
    });
}

/// Last segment of a path-like or `scheme://` location.
pub(crate) fn file_name(location: &ArtifactLocation) -> &str {
    location
        .as_str()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(location.as_str())
}
