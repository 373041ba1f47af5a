//! RetentionManager - artifact の削除（世代管理）
//!
//! # フロー
//! 1. 全 artifact の descriptor を名前から列挙（本体は読まない）
//! 2. RetentionPolicy::select_evictions で削除対象を決定
//! 3. 1件ずつ削除。失敗しても残りは続行し、失敗は全件報告する

use tracing::{info, warn};

use crate::domain::{ArtifactDescriptor, EvictionFailure, RetentionPolicy, VaultError};

use super::snapshot_store::SnapshotStore;

/// Outcome of one eviction pass.
#[derive(Debug, Default)]
pub struct EvictionReport {
    pub evicted: Vec<ArtifactDescriptor>,
    pub failures: Vec<EvictionFailure>,
}

impl EvictionReport {
    pub fn evicted_count(&self) -> usize {
        self.evicted.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse into a count, or `EvictionIncomplete` when any deletion failed.
    pub fn into_result(self) -> Result<usize, VaultError> {
        if self.failures.is_empty() {
            Ok(self.evicted.len())
        } else {
            Err(VaultError::EvictionIncomplete {
                evicted: self.evicted.len(),
                failures: self.failures,
            })
        }
    }
}

#[derive(Clone)]
pub struct RetentionManager {
    snapshots: SnapshotStore,
}

impl RetentionManager {
    pub fn new(snapshots: SnapshotStore) -> Self {
        Self { snapshots }
    }

    /// Apply `policy` across every page. Only the listing can fail the call;
    /// individual deletions are collected into the report.
    pub async fn evict(&self, policy: &RetentionPolicy) -> Result<EvictionReport, VaultError> {
        let descriptors = self.snapshots.list_all().await?;
        let now = self.snapshots.now();
        let marked = policy.select_evictions(&descriptors, now);

        let mut report = EvictionReport::default();
        let mut descriptors: Vec<Option<ArtifactDescriptor>> =
            descriptors.into_iter().map(Some).collect();

        for idx in marked {
            let Some(descriptor) = descriptors.get_mut(idx).and_then(Option::take) else {
                continue;
            };
            match self.snapshots.delete(&descriptor.location).await {
                Ok(()) => report.evicted.push(descriptor),
                Err(error) => {
                    warn!(
                        page_id = %descriptor.page_id,
                        location = %descriptor.location,
                        error = %error,
                        "artifact eviction failed"
                    );
                    report.failures.push(EvictionFailure { descriptor, error });
                }
            }
        }

        if !report.evicted.is_empty() || !report.failures.is_empty() {
            info!(
                evicted = report.evicted.len(),
                failed = report.failures.len(),
                "retention pass finished"
            );
        }
        Ok(report)
    }

    /// `evict` reduced to the evicted count; partial failure is an error.
    pub async fn run(&self, policy: &RetentionPolicy) -> Result<usize, VaultError> {
        self.evict(policy).await?.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ArtifactLocation, ErrorKind, PageId, artifact_name};
    use crate::impls::{InMemoryArtifactStore, InMemoryGateway};
    use crate::ports::{ArtifactStore, FixedClock, StoredObject};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn manager(store: Arc<dyn ArtifactStore>) -> RetentionManager {
        let snapshots = SnapshotStore::new(
            Arc::new(InMemoryGateway::new()),
            store,
            Arc::new(FixedClock::new(now())),
            3,
        );
        RetentionManager::new(snapshots)
    }

    async fn seed(store: &InMemoryArtifactStore, page: &str, days_ago: &[i64]) {
        let page_id = PageId::parse(page).unwrap();
        for days in days_ago {
            let name = artifact_name(&page_id, now() - Duration::days(*days));
            store.insert_raw(&name, b"{}".to_vec()).await;
        }
    }

    #[tokio::test]
    async fn seven_artifacts_keep_five() {
        let store = Arc::new(InMemoryArtifactStore::new());
        seed(&store, "p", &[1, 2, 3, 4, 5, 6, 7]).await;
        let manager = manager(store.clone());

        let report = manager.evict(&RetentionPolicy::keep_latest(5)).await.unwrap();

        assert_eq!(report.evicted_count(), 2);
        let mut gone: Vec<_> = report.evicted.iter().map(|d| d.captured_at).collect();
        gone.sort();
        assert_eq!(gone, vec![now() - Duration::days(7), now() - Duration::days(6)]);

        let remaining = manager
            .snapshots
            .list(&PageId::parse("p").unwrap())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 5);
        assert_eq!(remaining[0].captured_at, now() - Duration::days(1));
    }

    #[tokio::test]
    async fn age_limit_spans_all_pages() {
        let store = Arc::new(InMemoryArtifactStore::new());
        seed(&store, "a", &[1, 40]).await;
        seed(&store, "b", &[31, 2]).await;
        let manager = manager(store.clone());

        let evicted = manager.run(&RetentionPolicy::max_age(30)).await.unwrap();
        assert_eq!(evicted, 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn nothing_to_do_is_zero() {
        let store = Arc::new(InMemoryArtifactStore::new());
        seed(&store, "a", &[1]).await;
        assert_eq!(manager(store).run(&RetentionPolicy::new(5, 30)).await.unwrap(), 0);
    }

    /// Refuses to delete one specific artifact.
    struct StickyStore {
        inner: InMemoryArtifactStore,
        sticky: String,
    }

    #[async_trait]
    impl ArtifactStore for StickyStore {
        async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<ArtifactLocation, VaultError> {
            self.inner.put(name, bytes).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, VaultError> {
            self.inner.list(prefix).await
        }

        async fn get(&self, location: &ArtifactLocation) -> Result<Vec<u8>, VaultError> {
            self.inner.get(location).await
        }

        async fn delete(&self, location: &ArtifactLocation) -> Result<(), VaultError> {
            if location.as_str().contains(&self.sticky) {
                return Err(VaultError::Storage(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only",
                )));
            }
            self.inner.delete(location).await
        }
    }

    #[tokio::test]
    async fn one_failed_deletion_does_not_stop_the_rest() {
        let inner = InMemoryArtifactStore::new();
        seed(&inner, "p", &[10, 20, 30, 40]).await;
        let sticky = artifact_name(&PageId::parse("p").unwrap(), now() - Duration::days(30));
        let store = Arc::new(StickyStore { inner, sticky });
        let manager = manager(store.clone());

        let report = manager.evict(&RetentionPolicy::keep_latest(1)).await.unwrap();
        assert_eq!(report.evicted_count(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.is_complete());

        let err = report.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PartialFailure);
        assert!(matches!(err, VaultError::EvictionIncomplete { evicted: 2, .. }));
        assert_eq!(store.inner.len().await, 2);
    }
}
