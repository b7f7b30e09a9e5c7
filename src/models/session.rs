//! Session-level records: the materialized view of one processing run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::config::BackendKind;
use crate::models::artifact::{ArtifactKind, ArtifactRef};

/// Projection of `metadata.json`. Tolerant reader: both snake_case and
/// camelCase spellings are accepted, unknown fields are carried along so a
/// rewrite of the document stays lossless.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default, alias = "processedAt")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "originalFilename")]
    pub original_filename: Option<String>,
    #[serde(default, alias = "mimeType")]
    pub mime_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Projection of `candidate_profile.json` — only the summary fields the
/// roster displays. The full document is never interpreted beyond these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileSummary {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(
        default,
        alias = "yearsExperience",
        deserialize_with = "lenient_years"
    )]
    pub years_experience: Option<f64>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Accept `5`, `5.5` or `"5"` for years of experience; anything else reads
/// as absent rather than failing the whole document.
fn lenient_years<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }))
}

/// One materialized session: classified artifacts plus the two parsed
/// documents. Constructed fresh on every read, never cached.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub candidate_id: String,
    pub session_id: String,
    pub backend: BackendKind,
    pub artifacts: BTreeMap<ArtifactKind, ArtifactRef>,
    pub metadata: Option<SessionMetadata>,
    pub profile: Option<ProfileSummary>,
    /// Taken exclusively from `metadata.processed_at`; sessions without it
    /// sort with "no preference" against timestamped siblings.
    pub created_at: Option<DateTime<Utc>>,
    pub original_filename: Option<String>,
}

impl SessionRecord {
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&ArtifactRef> {
        self.artifacts.get(&kind)
    }
}
