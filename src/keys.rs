//! Logical key scheme shared by both backends.
//!
//! Every artifact lives under `candidate-data/<candidateId>/<sessionId>/`.
//! Filenames are either fixed (`transcript.txt`, `candidate_profile.json`,
//! `metadata.json`) or patterned (`audio_<sessionId><ext>`,
//! `<name>_profile_<ts>.html|pdf`), and classification is the exact inverse
//! of naming: an ordered rule set over the bare filename.

use chrono::{DateTime, Utc};

use crate::config::ZoneSpec;
use crate::errors::{StoreError, StoreResult};
use crate::models::ArtifactKind;

/// Top-level prefix both backends mirror.
pub const DATA_PREFIX: &str = "candidate-data";

pub const TRANSCRIPT_FILENAME: &str = "transcript.txt";
pub const PROFILE_FILENAME: &str = "candidate_profile.json";
pub const METADATA_FILENAME: &str = "metadata.json";

const DEFAULT_AUDIO_EXT: &str = ".mp3";
const FALLBACK_NAME_STEM: &str = "candidate";

/// Reject ids that could escape the candidate-data tree. Candidate ids are
/// caller-supplied and become a path segment verbatim.
pub fn ensure_candidate_id_safe(id: &str) -> StoreResult<()> {
    let reason = if id.is_empty() {
        Some("must not be empty")
    } else if id.starts_with('/') {
        Some("must not start with `/`")
    } else if id.contains("..") {
        Some("must not contain `..`")
    } else if id.contains('/') {
        Some("must not contain `/`")
    } else if id.bytes().any(|b| b.is_ascii_control() || b == b'\\') {
        Some("must not contain control characters or `\\`")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StoreError::InvalidCandidateId {
            id: id.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Same traversal rules for free-form object keys (`upload_raw`).
pub fn ensure_key_safe(key: &str) -> StoreResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains("..")
        || key.bytes().any(|b| b.is_ascii_control() || b == b'\\')
    {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Second-resolution timestamp in the configured zone, `YYYYMMDD-HHmmss`.
pub fn zone_timestamp(zone: &ZoneSpec, now: DateTime<Utc>) -> String {
    now.with_timezone(&zone.offset)
        .format("%Y%m%d-%H%M%S")
        .to_string()
}

/// Session ids are `<timestamp>-<zoneSuffix>`. Two sessions minted for the
/// same candidate within one second collide and overwrite per artifact.
pub fn session_id(zone: &ZoneSpec, now: DateTime<Utc>) -> String {
    format!("{}-{}", zone_timestamp(zone, now), zone.suffix)
}

pub fn candidate_key(candidate_id: &str) -> String {
    format!("{DATA_PREFIX}/{candidate_id}")
}

pub fn session_key(candidate_id: &str, session_id: &str) -> String {
    format!("{DATA_PREFIX}/{candidate_id}/{session_id}")
}

pub fn artifact_key(base_key: &str, filename: &str) -> String {
    format!("{base_key}/{filename}")
}

/// Audio filename: `audio_<sessionId><ext>`, extension taken from the
/// uploaded original filename when present.
pub fn audio_filename(session_id: &str, original_filename: Option<&str>) -> String {
    let ext = original_filename
        .and_then(|name| name.rfind('.').map(|idx| &name[idx..]))
        .filter(|ext| ext.len() > 1)
        .unwrap_or(DEFAULT_AUDIO_EXT);
    format!("audio_{session_id}{ext}")
}

/// Filename stem for rendered profiles: every character outside
/// `[A-Za-z0-9_]` becomes `_`; a missing or empty name falls back to the
/// literal `candidate`.
pub fn sanitize_name(name: Option<&str>) -> String {
    match name {
        Some(name) if !name.is_empty() => name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect(),
        _ => FALLBACK_NAME_STEM.to_string(),
    }
}

/// Rendered profile filename: `<sanitized>_profile_<ts>.<ext>`.
pub fn rendered_filename(name: Option<&str>, timestamp: &str, kind: ArtifactKind) -> String {
    let ext = match kind {
        ArtifactKind::Pdf => "pdf",
        _ => "html",
    };
    format!("{}_profile_{}.{}", sanitize_name(name), timestamp, ext)
}

/// Recover the artifact kind from a bare filename. Rules are evaluated in
/// order, first match wins; unrecognized names classify as `None` and are
/// ignored by callers.
pub fn classify(filename: &str) -> Option<ArtifactKind> {
    const RULES: [(fn(&str) -> bool, ArtifactKind); 6] = [
        (
            |n| n.starts_with("audio_") && n.ends_with(".mp3"),
            ArtifactKind::Audio,
        ),
        (|n| n == TRANSCRIPT_FILENAME, ArtifactKind::Transcript),
        (|n| n == PROFILE_FILENAME, ArtifactKind::Profile),
        (|n| n == METADATA_FILENAME, ArtifactKind::Metadata),
        (|n| n.ends_with(".html"), ArtifactKind::Html),
        (|n| n.ends_with(".pdf"), ArtifactKind::Pdf),
    ];
    RULES
        .iter()
        .find(|(matches, _)| matches(filename))
        .map(|(_, kind)| *kind)
}

/// Serving-boundary check: only paths inside the candidate-data tree may be
/// handed out, and never with traversal sequences.
pub fn served_path_allowed(path: &str) -> bool {
    let path = path.trim_start_matches('/');
    path.starts_with("candidate-data/") && ensure_key_safe(path).is_ok()
}
