//! Candidate data storage abstraction.
//!
//! Persists and retrieves hierarchical records (candidate → session →
//! artifact files) behind one facade, backed interchangeably by a local
//! filesystem tree or an S3-compatible object store. Both backends realize
//! the same logical key scheme:
//!
//! ```text
//! candidate-data/<candidateId>/<sessionId>/transcript.txt
//! candidate-data/<candidateId>/<sessionId>/candidate_profile.json
//! candidate-data/<candidateId>/<sessionId>/metadata.json
//! candidate-data/<candidateId>/<sessionId>/audio_<sessionId>.<ext>
//! candidate-data/<candidateId>/<sessionId>/<name>_profile_<ts>.{html,pdf}
//! ```
//!
//! Reads classify listed filenames back into typed artifact slots and
//! aggregate them into session and roster records; nothing is cached or
//! indexed on the side.

pub mod backends;
pub mod config;
pub mod errors;
pub mod keys;
pub mod models;
pub mod services;

pub use config::{BackendKind, StoreConfig, ZoneSpec};
pub use errors::{StoreError, StoreResult};
pub use models::{
    ArtifactKind, ArtifactRef, CandidateRecord, ProfileSummary, SessionMetadata, SessionRecord,
    StorageResult,
};
pub use services::{CandidateStore, GeneratedArtifacts, UploadedAudio};
