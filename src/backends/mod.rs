//! Storage substrates.
//!
//! Both backends realize the same logical key scheme; callers never branch
//! on the backend kind beyond constructing one of the two implementations.

pub mod filesystem;
pub mod object_store;

pub use filesystem::FilesystemBackend;
pub use object_store::ObjectStoreBackend;

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;

use crate::config::BackendKind;
use crate::errors::StoreResult;

/// One entry under a session prefix: bare filename plus its full key.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub name: String,
    pub key: String,
}

/// Payload of a write. File bodies are copied (never moved) into place so
/// the caller-owned temp file survives a failed write.
#[derive(Debug, Clone)]
pub enum WriteBody {
    Bytes(Bytes),
    File(PathBuf),
}

impl From<Bytes> for WriteBody {
    fn from(bytes: Bytes) -> Self {
        WriteBody::Bytes(bytes)
    }
}

/// Capability set every substrate provides: write, read, list.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn write(&self, key: &str, body: WriteBody, content_type: &str) -> StoreResult<()>;

    /// Whole-object read. `ObjectNotFound` when the key is absent.
    async fn read(&self, key: &str) -> StoreResult<Bytes>;

    /// Immediate child names one level below `prefix` (candidate ids or
    /// session ids). A missing root or prefix lists as empty, never an error;
    /// any other fault propagates on both backends.
    async fn list_prefixes(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Every entry directly under `prefix`.
    async fn list_entries(&self, prefix: &str) -> StoreResult<Vec<RawEntry>>;

    /// Deterministic public link for a stored key. No signing, no expiry.
    fn public_link(&self, key: &str) -> String;

    /// Backend-specific locator: absolute path or object key.
    fn locator(&self, key: &str) -> String;
}
