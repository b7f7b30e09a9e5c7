//! Data models for the candidate data store.
//!
//! These entities represent the logical structure of candidates, sessions
//! and their artifacts. They are projections over whatever the backend
//! listing returns — nothing here is a persisted index.

pub mod artifact;
pub mod candidate;
pub mod session;

pub use artifact::{ArtifactKind, ArtifactRef};
pub use candidate::{CandidateRecord, StorageResult};
pub use session::{ProfileSummary, SessionMetadata, SessionRecord};
