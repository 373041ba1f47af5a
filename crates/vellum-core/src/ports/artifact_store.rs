//! ArtifactStore port - スナップショットの保存先（Local / InMemory）
//!
//! The storage medium only knows named byte blobs. Naming, parsing and
//! serialization belong to `app::SnapshotStore`.
//!
//! # 設計原則
//! - `put` is all-or-nothing: a failed or in-flight write is never returned by `list`
//! - `list` tolerates concurrent writers; new objects may or may not appear
//! - missing objects are `VaultError::NotFound`, never an empty read

use async_trait::async_trait;

use crate::domain::{ArtifactLocation, VaultError};

/// A complete object on the medium, as seen by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub name: String,
    pub location: ArtifactLocation,
    pub size_bytes: u64,
}

/// ArtifactStore は名前付きの blob を保存
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write a new object. Fails if `name` already exists.
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<ArtifactLocation, VaultError>;

    /// Complete objects whose name starts with `prefix`, in no particular order.
    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, VaultError>;

    async fn get(&self, location: &ArtifactLocation) -> Result<Vec<u8>, VaultError>;

    async fn delete(&self, location: &ArtifactLocation) -> Result<(), VaultError>;
}
