//! InMemoryArtifactStore - 開発・テスト用の保存先
//!
//! Locations are `mem://<name>`. Objects live only as long as the store.

use std::collections::BTreeMap;
use std::io;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ArtifactLocation, VaultError};
use crate::ports::{ArtifactStore, StoredObject};

const SCHEME: &str = "mem://";

#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }

    /// Store raw bytes under `name`, bypassing the existence check.
    pub async fn insert_raw(&self, name: &str, bytes: Vec<u8>) -> ArtifactLocation {
        self.objects.lock().await.insert(name.to_string(), bytes);
        location_for(name)
    }

    fn name_of(location: &ArtifactLocation) -> &str {
        location
            .as_str()
            .strip_prefix(SCHEME)
            .unwrap_or(location.as_str())
    }
}

fn location_for(name: &str) -> ArtifactLocation {
    ArtifactLocation::new(format!("{SCHEME}{name}"))
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<ArtifactLocation, VaultError> {
        let mut objects = self.objects.lock().await;
        if objects.contains_key(name) {
            return Err(VaultError::Storage(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("artifact `{name}` already exists"),
            )));
        }
        objects.insert(name.to_string(), bytes);
        Ok(location_for(name))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, VaultError> {
        let objects = self.objects.lock().await;
        Ok(objects
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, bytes)| StoredObject {
                name: name.clone(),
                location: location_for(name),
                size_bytes: bytes.len() as u64,
            })
            .collect())
    }

    async fn get(&self, location: &ArtifactLocation) -> Result<Vec<u8>, VaultError> {
        self.objects
            .lock()
            .await
            .get(Self::name_of(location))
            .cloned()
            .ok_or_else(|| VaultError::not_found("artifact", location.as_str()))
    }

    async fn delete(&self, location: &ArtifactLocation) -> Result<(), VaultError> {
        self.objects
            .lock()
            .await
            .remove(Self::name_of(location))
            .map(|_| ())
            .ok_or_else(|| VaultError::not_found("artifact", location.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn behaves_like_a_flat_namespace() {
        let store = InMemoryArtifactStore::new();
        let a = store.put("page_a_1.json", b"1".to_vec()).await.unwrap();
        store.put("page_b_1.json", b"22".to_vec()).await.unwrap();

        assert!(store.put("page_a_1.json", Vec::new()).await.is_err());

        let listed = store.list("page_b_").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size_bytes, 2);

        assert_eq!(store.get(&a).await.unwrap(), b"1".to_vec());
        store.delete(&a).await.unwrap();
        assert!(store.get(&a).await.is_err());
        assert_eq!(store.len().await, 1);
    }
}
