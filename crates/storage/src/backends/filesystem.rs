//! Local filesystem storage backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ObjectStore, StreamingUpload};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Local filesystem object store.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Get the full path for a key, with path traversal protection.
    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "path traversal not allowed: {key}"
            )));
        }

        // Validate all path components are normal (no .., ., root, etc.)
        for component in Path::new(key).components() {
            match component {
                std::path::Component::Normal(_) => {}
                _ => {
                    return Err(StorageError::InvalidKey(format!(
                        "contains unsafe path component: {key}"
                    )));
                }
            }
        }

        Ok(self.root.join(key))
    }

    /// Ensure parent directory exists.
    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn temp_path_for(path: &Path) -> PathBuf {
        // UUID suffix avoids conflicts during concurrent writes to the same key
        let temp_name = format!(".tmp.{}", Uuid::new_v4());
        path.with_file_name(
            path.file_name()
                .map(|n| format!("{}{}", n.to_string_lossy(), temp_name))
                .unwrap_or_else(|| temp_name.clone()),
        )
    }
}

#[async_trait]
impl ObjectStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_path(key)?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_path(key)?;
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.key_path(key)?;
        self.ensure_parent(&path).await?;

        // Write to temp file, fsync, then rename for atomicity and durability
        let temp_path = Self::temp_path_for(&path);
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &path).await?;

        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn put_stream(&self, key: &str) -> StorageResult<Box<dyn StreamingUpload>> {
        let path = self.key_path(key)?;
        self.ensure_parent(&path).await?;

        let temp_path = Self::temp_path_for(&path);
        let file = fs::File::create(&temp_path).await?;

        Ok(Box::new(FilesystemUpload {
            file,
            temp_path,
            final_path: path,
            bytes_written: 0,
        }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key)?;
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let base_path = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.key_path(prefix)?
        };
        let mut results = Vec::new();

        match fs::try_exists(&base_path).await {
            Ok(false) => return Ok(results),
            Ok(true) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(results),
            Err(e) => return Err(StorageError::Io(e)),
        }

        let mut stack = vec![base_path];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                // Use file_type() instead of path.is_dir() to avoid following
                // symlinks outside the storage root.
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file()
                    && let Ok(rel) = path.strip_prefix(&self.root)
                {
                    results.push(rel.to_string_lossy().to_string());
                }
            }
        }

        Ok(results)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

/// Streaming upload into a temp file, renamed on finish.
struct FilesystemUpload {
    file: fs::File,
    temp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
}

#[async_trait]
impl StreamingUpload for FilesystemUpload {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.file.write_all(&data).await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        self.file.sync_all().await?;
        fs::rename(&self.temp_path, &self.final_path).await?;
        Ok(self.bytes_written)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        drop(self.file);
        match fs::remove_file(&self.temp_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> (tempfile::TempDir, FilesystemBackend) {
        let temp = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(temp.path().join("storage"))
            .await
            .unwrap();
        (temp, backend)
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let (_temp, backend) = backend().await;
        let key = "testapp/nightly/universalPlatform/universalArch/testapp-0.0.1.137.dmg";

        backend.put(key, Bytes::from_static(b"payload")).await.unwrap();
        assert!(backend.exists(key).await.unwrap());
        assert_eq!(backend.get(key).await.unwrap(), Bytes::from_static(b"payload"));

        backend.delete(key).await.unwrap();
        assert!(!backend.exists(key).await.unwrap());
        assert!(matches!(
            backend.delete(key).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn streaming_upload_writes_on_finish_only() {
        let (_temp, backend) = backend().await;
        let key = "testapp/testapp-0.0.1.137.pkg";

        let mut upload = backend.put_stream(key).await.unwrap();
        upload.write(Bytes::from_static(b"part1")).await.unwrap();
        upload.write(Bytes::from_static(b"part2")).await.unwrap();
        assert!(!backend.exists(key).await.unwrap());

        let written = upload.finish().await.unwrap();
        assert_eq!(written, 10);
        assert_eq!(
            backend.get(key).await.unwrap(),
            Bytes::from_static(b"part1part2")
        );
    }

    #[tokio::test]
    async fn aborted_upload_leaves_nothing() {
        let (_temp, backend) = backend().await;
        let key = "testapp/testapp-0.0.1.137.dmg";

        let mut upload = backend.put_stream(key).await.unwrap();
        upload.write(Bytes::from_static(b"junk")).await.unwrap();
        upload.abort().await.unwrap();

        assert!(!backend.exists(key).await.unwrap());
        assert!(backend.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let (_temp, backend) = backend().await;
        assert!(matches!(
            backend.get("../escape").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            backend.put("/absolute", Bytes::new()).await,
            Err(StorageError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn list_by_prefix() {
        let (_temp, backend) = backend().await;
        backend
            .put("testapp/a.dmg", Bytes::from_static(b"a"))
            .await
            .unwrap();
        backend
            .put("testapp/b.pkg", Bytes::from_static(b"b"))
            .await
            .unwrap();
        backend
            .put("otherapp/c.dmg", Bytes::from_static(b"c"))
            .await
            .unwrap();

        let mut keys = backend.list("testapp").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["testapp/a.dmg", "testapp/b.pkg"]);
        assert!(backend.list("missing").await.unwrap().is_empty());
    }
}
