//! LocalArtifactStore - ディレクトリに artifact を保存
//!
//! Objects are plain files under one root directory. Writes go to a hidden
//! temp file first and are hard-linked into place, so a crash or a concurrent
//! `list` never observes a half-written artifact. Linking fails when the name
//! is taken, so an artifact is never replaced once written.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use ulid::Ulid;

use crate::domain::{ArtifactLocation, VaultError};
use crate::ports::{ArtifactStore, StoredObject};

#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    /// The directory is created lazily on the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A location is a path; a bare file name is taken relative to the root.
    fn resolve(&self, location: &ArtifactLocation) -> PathBuf {
        let path = Path::new(location.as_str());
        if path.is_relative() && path.components().count() == 1 {
            self.root.join(path)
        } else {
            path.to_path_buf()
        }
    }

    fn temp_path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!(".{name}.{}.tmp", Ulid::new()))
    }

    async fn write_atomically(&self, tmp_path: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(tmp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        // unlike rename, link refuses an existing target
        fs::hard_link(tmp_path, target).await
    }
}

fn not_found_or<T>(result: io::Result<T>, location: &ArtifactLocation) -> Result<T, VaultError> {
    result.map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => VaultError::not_found("artifact", location.as_str()),
        _ => VaultError::Storage(e),
    })
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> Result<ArtifactLocation, VaultError> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(VaultError::Storage(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsafe artifact name {name:?}"),
            )));
        }

        fs::create_dir_all(&self.root).await?;
        let target = self.root.join(name);
        let tmp_path = self.temp_path_for(name);
        let written = self.write_atomically(&tmp_path, &target, &bytes).await;
        // the temp file is hidden from `list`; removing it only saves disk space
        let _ = fs::remove_file(&tmp_path).await;
        match written {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(VaultError::Storage(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("artifact `{}` already exists", target.display()),
                )));
            }
            Err(e) => return Err(e.into()),
        }

        debug!(path = %target.display(), size_bytes = bytes.len(), "artifact written");
        Ok(ArtifactLocation::new(target.to_string_lossy()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, VaultError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with('.') || !name.starts_with(prefix) {
                continue;
            }
            // deleted between read_dir and stat
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_file() {
                continue;
            }
            objects.push(StoredObject {
                name: name.to_string(),
                location: ArtifactLocation::new(entry.path().to_string_lossy()),
                size_bytes: metadata.len(),
            });
        }
        Ok(objects)
    }

    async fn get(&self, location: &ArtifactLocation) -> Result<Vec<u8>, VaultError> {
        not_found_or(fs::read(self.resolve(location)).await, location)
    }

    async fn delete(&self, location: &ArtifactLocation) -> Result<(), VaultError> {
        not_found_or(fs::remove_file(self.resolve(location)).await, location)?;
        debug!(location = %location, "artifact deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn put_list_get_delete() {
        let tmp = tempdir().unwrap();
        let store = LocalArtifactStore::new(tmp.path().join("backups"));

        let location = store.put("page_a_1.json", b"{}".to_vec()).await.unwrap();
        store.put("page_b_1.json", b"{}".to_vec()).await.unwrap();

        let listed = store.list("page_a_").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "page_a_1.json");
        assert_eq!(listed[0].location, location);
        assert_eq!(listed[0].size_bytes, 2);

        assert_eq!(store.get(&location).await.unwrap(), b"{}".to_vec());

        store.delete(&location).await.unwrap();
        assert!(store.list("page_a_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_a_missing_root_is_empty() {
        let tmp = tempdir().unwrap();
        let store = LocalArtifactStore::new(tmp.path().join("never-created"));
        assert!(store.list("page_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn existing_names_are_not_overwritten() {
        let tmp = tempdir().unwrap();
        let store = LocalArtifactStore::new(tmp.path());

        let location = store.put("page_a_1.json", b"first".to_vec()).await.unwrap();
        let err = store.put("page_a_1.json", b"second".to_vec()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(store.get(&location).await.unwrap(), b"first".to_vec());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_of_one_name_keep_a_single_winner() {
        let tmp = tempdir().unwrap();
        let store = LocalArtifactStore::new(tmp.path());

        for round in 0..50 {
            let name = format!("page_a_{round}.json");
            let (first, second) = tokio::join!(
                store.put(&name, b"first".to_vec()),
                store.put(&name, b"second-writer".to_vec()),
            );

            let expected = match (first, second) {
                (Ok(_), Err(e)) => {
                    assert_eq!(e.kind(), ErrorKind::Storage);
                    b"first".to_vec()
                }
                (Err(e), Ok(_)) => {
                    assert_eq!(e.kind(), ErrorKind::Storage);
                    b"second-writer".to_vec()
                }
                (first, second) => panic!(
                    "round {round}: exactly one put may succeed, got {:?} / {:?}",
                    first.is_ok(),
                    second.is_ok()
                ),
            };
            let stored = store.get(&ArtifactLocation::new(name.as_str())).await.unwrap();
            assert_eq!(stored, expected, "round {round}: the winner's bytes were replaced");
        }

        let temp_files = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with('.')
            })
            .count();
        assert_eq!(temp_files, 0);
    }

    #[tokio::test]
    async fn temp_files_are_invisible() {
        let tmp = tempdir().unwrap();
        let store = LocalArtifactStore::new(tmp.path());
        std::fs::write(tmp.path().join(".page_a_1.json.01HX.tmp"), b"partial").unwrap();
        std::fs::create_dir(tmp.path().join("page_a_dir")).unwrap();

        assert!(store.list("page_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_artifacts_are_not_found() {
        let tmp = tempdir().unwrap();
        let store = LocalArtifactStore::new(tmp.path());
        let location = ArtifactLocation::new("page_a_1.json");

        assert_eq!(store.get(&location).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.delete(&location).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn bare_names_resolve_under_root() {
        let tmp = tempdir().unwrap();
        let store = LocalArtifactStore::new(tmp.path());
        store.put("page_a_1.json", b"x".to_vec()).await.unwrap();

        let bytes = store.get(&ArtifactLocation::new("page_a_1.json")).await.unwrap();
        assert_eq!(bytes, b"x".to_vec());
    }

    #[tokio::test]
    async fn rejects_path_like_names() {
        let tmp = tempdir().unwrap();
        let store = LocalArtifactStore::new(tmp.path());
        assert!(store.put("../escape.json", Vec::new()).await.is_err());
        assert!(store.put(".hidden.json", Vec::new()).await.is_err());
    }
}
