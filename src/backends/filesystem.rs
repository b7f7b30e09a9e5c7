//! Local filesystem backend: a directory tree under a configured root.

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

use crate::backends::{RawEntry, StorageBackend, WriteBody};
use crate::config::BackendKind;
use crate::errors::{StoreError, StoreResult};

pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Byte bodies go through a temp file and a rename so a torn write never
    /// leaves a half-written artifact under its final name.
    async fn write_bytes(&self, target: &Path, bytes: &Bytes) -> StoreResult<()> {
        let parent = target
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(target.display().to_string()))?;
        fs::create_dir_all(parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = file.write_all(bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        if let Err(err) = fs::rename(&tmp_path, target).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(target).await?;
                fs::rename(&tmp_path, target).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err.into());
            }
        }
        Ok(())
    }

    async fn copy_file(&self, source: &Path, target: &Path) -> StoreResult<()> {
        let parent = target
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(target.display().to_string()))?;
        fs::create_dir_all(parent).await?;
        fs::copy(source, target).await?;
        Ok(())
    }

    /// Names of immediate subdirectories. A missing directory is zero
    /// entries, not an error.
    async fn subdir_names(&self, dir: &Path) -> StoreResult<Vec<String>> {
        let mut reader = match fs::read_dir(dir).await {
            Ok(reader) => reader,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Filesystem
    }

    async fn write(&self, key: &str, body: WriteBody, _content_type: &str) -> StoreResult<()> {
        let target = self.path_for(key);
        match body {
            WriteBody::Bytes(bytes) => self.write_bytes(&target, &bytes).await?,
            WriteBody::File(source) => self.copy_file(&source, &target).await?,
        }
        debug!("wrote {}", target.display());
        Ok(())
    }

    async fn read(&self, key: &str) -> StoreResult<Bytes> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(StoreError::ObjectNotFound {
                key: key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    async fn list_prefixes(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.subdir_names(&self.path_for(prefix)).await
    }

    async fn list_entries(&self, prefix: &str) -> StoreResult<Vec<RawEntry>> {
        let dir = self.path_for(prefix);
        let mut reader = match fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    entries.push(RawEntry {
                        name: name.to_string(),
                        key: format!("{prefix}/{name}"),
                    });
                }
            }
        }
        Ok(entries)
    }

    fn public_link(&self, key: &str) -> String {
        format!("/files/{key}")
    }

    fn locator(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }
}
