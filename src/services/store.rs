//! The storage facade — the only entry point the rest of the system calls.

use bytes::Bytes;
use chrono::Utc;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backends::{FilesystemBackend, ObjectStoreBackend, StorageBackend, WriteBody};
use crate::config::{BackendKind, StoreConfig};
use crate::errors::{StoreError, StoreResult};
use crate::keys;
use crate::models::{ArtifactKind, CandidateRecord, ProfileSummary, SessionRecord, StorageResult};
use crate::services::{materializer, roster};

/// An uploaded audio file, as handed over by the upload boundary: a local
/// temp path plus whatever the client said about it. The file is copied into
/// the session, never moved.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    pub source_path: PathBuf,
    pub original_filename: Option<String>,
    pub mime_type: Option<String>,
}

impl UploadedAudio {
    fn content_type(&self) -> String {
        if let Some(mime) = &self.mime_type {
            return mime.clone();
        }
        self.original_filename
            .as_deref()
            .and_then(|name| mime_guess::from_path(name).first_raw())
            .unwrap_or(ArtifactKind::Audio.content_type())
            .to_string()
    }
}

/// Rendered profile documents, produced by the rendering boundary as opaque
/// byte buffers. Either may be available at save time or attached later.
#[derive(Debug, Clone, Default)]
pub struct GeneratedArtifacts {
    pub html: Option<Bytes>,
    pub pdf: Option<Bytes>,
}

/// Facade over the configured backend. Construct once with an injected
/// config, share by reference; holds no mutable state.
pub struct CandidateStore {
    config: StoreConfig,
    backend: Arc<dyn StorageBackend>,
}

impl CandidateStore {
    /// Select the backend once at construction. An unsupported kind has
    /// already failed during config parsing; this cannot re-branch later.
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        let backend: Arc<dyn StorageBackend> = match config.backend {
            BackendKind::Filesystem => Arc::new(FilesystemBackend::new(config.data_root.clone())),
            BackendKind::ObjectStore => Arc::new(ObjectStoreBackend::new(&config)?),
        };
        Ok(Self { config, backend })
    }

    /// Test-double constructor: any backend implementation.
    pub fn with_backend(config: StoreConfig, backend: Arc<dyn StorageBackend>) -> Self {
        Self { config, backend }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Persist one processed session. The three required documents plus any
    /// optional artifacts are dispatched concurrently; the call returns once
    /// every write has settled and surfaces the first failure as the overall
    /// failure. Artifacts flushed by sibling writes are not retracted.
    pub async fn save_candidate_data(
        &self,
        candidate_id: &str,
        transcript: &str,
        profile: &serde_json::Value,
        metadata: &serde_json::Value,
        generated: Option<GeneratedArtifacts>,
        audio: Option<UploadedAudio>,
    ) -> StoreResult<StorageResult> {
        keys::ensure_candidate_id_safe(candidate_id)?;

        let now = Utc::now();
        let timestamp = keys::zone_timestamp(&self.config.zone, now);
        let session_id = keys::session_id(&self.config.zone, now);
        let base_key = keys::session_key(candidate_id, &session_id);

        let candidate_name = serde_json::from_value::<ProfileSummary>(profile.clone())
            .ok()
            .and_then(|p| p.name);

        let mut writes: Vec<(ArtifactKind, String, WriteBody, String)> = vec![
            (
                ArtifactKind::Transcript,
                keys::artifact_key(&base_key, keys::TRANSCRIPT_FILENAME),
                WriteBody::Bytes(Bytes::from(transcript.to_owned())),
                ArtifactKind::Transcript.content_type().to_string(),
            ),
            (
                ArtifactKind::Profile,
                keys::artifact_key(&base_key, keys::PROFILE_FILENAME),
                WriteBody::Bytes(Bytes::from(serde_json::to_vec_pretty(profile)?)),
                ArtifactKind::Profile.content_type().to_string(),
            ),
            (
                ArtifactKind::Metadata,
                keys::artifact_key(&base_key, keys::METADATA_FILENAME),
                WriteBody::Bytes(Bytes::from(serde_json::to_vec_pretty(metadata)?)),
                ArtifactKind::Metadata.content_type().to_string(),
            ),
        ];

        if let Some(audio) = &audio {
            let filename = keys::audio_filename(&session_id, audio.original_filename.as_deref());
            writes.push((
                ArtifactKind::Audio,
                keys::artifact_key(&base_key, &filename),
                WriteBody::File(audio.source_path.clone()),
                audio.content_type(),
            ));
        }
        if let Some(generated) = generated {
            writes.extend(self.rendered_writes(
                &base_key,
                candidate_name.as_deref(),
                &timestamp,
                generated,
            ));
        }

        let result = self
            .dispatch_writes(candidate_id, &session_id, writes)
            .await?;
        debug!("saved session {session_id} for candidate {candidate_id}");
        Ok(result)
    }

    /// The aggregated, sorted roster. Recomputed from listings on every call.
    pub async fn list_candidates(&self) -> StoreResult<Vec<CandidateRecord>> {
        roster::build_roster(self.backend.as_ref()).await
    }

    /// All sessions for one candidate, newest first.
    pub async fn list_candidate_sessions(
        &self,
        candidate_id: &str,
    ) -> StoreResult<Vec<SessionRecord>> {
        keys::ensure_candidate_id_safe(candidate_id)?;
        materializer::list_candidate_sessions(self.backend.as_ref(), candidate_id).await
    }

    /// Raw byte upload to an arbitrary key. Object-store backend only.
    pub async fn upload_raw(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<()> {
        if self.backend.kind() == BackendKind::Filesystem {
            return Err(StoreError::UnsupportedOperation(
                "upload_raw is only available on the object-store backend",
            ));
        }
        keys::ensure_key_safe(key)?;
        self.backend.write(key, WriteBody::Bytes(bytes), content_type).await
    }

    /// Attach rendered HTML/PDF profiles to an existing session once the
    /// renderer has produced them. The filename stem is recovered from the
    /// stored profile document; an unreadable profile falls back to the
    /// literal `candidate` stem.
    pub async fn attach_generated(
        &self,
        candidate_id: &str,
        session_id: &str,
        generated: GeneratedArtifacts,
    ) -> StoreResult<StorageResult> {
        keys::ensure_candidate_id_safe(candidate_id)?;
        if session_id.contains('/') {
            return Err(StoreError::InvalidKey(session_id.to_string()));
        }
        keys::ensure_key_safe(session_id)?;

        let base_key = keys::session_key(candidate_id, session_id);
        let candidate_name = self.stored_candidate_name(&base_key).await;
        let timestamp = keys::zone_timestamp(&self.config.zone, Utc::now());

        let writes = self.rendered_writes(
            &base_key,
            candidate_name.as_deref(),
            &timestamp,
            generated,
        );
        self.dispatch_writes(candidate_id, session_id, writes).await
    }

    fn rendered_writes(
        &self,
        base_key: &str,
        candidate_name: Option<&str>,
        timestamp: &str,
        generated: GeneratedArtifacts,
    ) -> Vec<(ArtifactKind, String, WriteBody, String)> {
        let mut writes = Vec::new();
        if let Some(html) = generated.html {
            let filename = keys::rendered_filename(candidate_name, timestamp, ArtifactKind::Html);
            writes.push((
                ArtifactKind::Html,
                keys::artifact_key(base_key, &filename),
                WriteBody::Bytes(html),
                ArtifactKind::Html.content_type().to_string(),
            ));
        }
        if let Some(pdf) = generated.pdf {
            let filename = keys::rendered_filename(candidate_name, timestamp, ArtifactKind::Pdf);
            writes.push((
                ArtifactKind::Pdf,
                keys::artifact_key(base_key, &filename),
                WriteBody::Bytes(pdf),
                ArtifactKind::Pdf.content_type().to_string(),
            ));
        }
        writes
    }

    async fn stored_candidate_name(&self, base_key: &str) -> Option<String> {
        let key = keys::artifact_key(base_key, keys::PROFILE_FILENAME);
        match self.backend.read(&key).await {
            Ok(bytes) => serde_json::from_slice::<ProfileSummary>(&bytes)
                .map_err(|err| warn!("could not parse {key}: {err}"))
                .ok()
                .and_then(|p| p.name),
            Err(err) => {
                warn!("could not read {key}: {err}");
                None
            }
        }
    }

    /// Issue every write concurrently, wait for all of them to settle, then
    /// surface the first failure.
    async fn dispatch_writes(
        &self,
        candidate_id: &str,
        session_id: &str,
        writes: Vec<(ArtifactKind, String, WriteBody, String)>,
    ) -> StoreResult<StorageResult> {
        let mut locators = BTreeMap::new();
        let mut links = BTreeMap::new();
        let mut tasks: Vec<BoxFuture<'_, (ArtifactKind, StoreResult<()>)>> = Vec::new();

        for (kind, key, body, content_type) in writes {
            locators.insert(kind, self.backend.locator(&key));
            links.insert(kind, self.backend.public_link(&key));
            let backend = &self.backend;
            tasks.push(Box::pin(async move {
                (kind, backend.write(&key, body, &content_type).await)
            }));
        }

        let mut failure: Option<(ArtifactKind, StoreError)> = None;
        for (kind, outcome) in futures::future::join_all(tasks).await {
            if let Err(err) = outcome {
                warn!("write of {kind:?} artifact failed: {err}");
                failure.get_or_insert((kind, err));
            }
        }
        if let Some((_, err)) = failure {
            return Err(err);
        }

        Ok(StorageResult {
            backend: self.backend.kind(),
            candidate_id: candidate_id.to_string(),
            session_id: session_id.to_string(),
            locators,
            links,
            bucket: match self.backend.kind() {
                BackendKind::ObjectStore => Some(self.config.bucket.clone()),
                BackendKind::Filesystem => None,
            },
        })
    }
}
