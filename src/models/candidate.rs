//! Candidate-level records: roster rows and write results.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::BackendKind;
use crate::models::artifact::ArtifactKind;

/// One roster row. Summary fields come from the candidate's newest session;
/// recomputed on every listing, no persisted index.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateRecord {
    pub candidate_id: String,
    pub session_count: usize,
    /// `created_at` of the newest session, when it carries one.
    pub last_activity: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub years_experience: Option<f64>,
}

/// Returned from a write: where every artifact landed.
#[derive(Debug, Clone, Serialize)]
pub struct StorageResult {
    pub backend: BackendKind,
    pub candidate_id: String,
    pub session_id: String,
    /// Backend locator per artifact kind (absolute path or object key).
    pub locators: BTreeMap<ArtifactKind, String>,
    /// Public link per artifact kind.
    pub links: BTreeMap<ArtifactKind, String>,
    /// Set on the object-store backend only.
    pub bucket: Option<String>,
}
