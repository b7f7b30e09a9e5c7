//! Session materialization: raw backend entries → one `SessionRecord`.

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::warn;

use crate::backends::StorageBackend;
use crate::errors::StoreResult;
use crate::keys;
use crate::models::{ArtifactKind, ArtifactRef, ProfileSummary, SessionMetadata, SessionRecord};

/// List, classify and load one session. Entry order from the backend does
/// not matter: entries are sorted by name first, classification is total and
/// idempotent, and unrecognized names are skipped without complaint.
pub async fn materialize_session(
    backend: &dyn StorageBackend,
    candidate_id: &str,
    session_id: &str,
) -> StoreResult<SessionRecord> {
    let base_key = keys::session_key(candidate_id, session_id);
    let mut entries = backend.list_entries(&base_key).await?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let mut artifacts: BTreeMap<ArtifactKind, ArtifactRef> = BTreeMap::new();
    for entry in &entries {
        if let Some(kind) = keys::classify(&entry.name) {
            artifacts.insert(
                kind,
                ArtifactRef {
                    locator: backend.locator(&entry.key),
                    link: backend.public_link(&entry.key),
                },
            );
        }
    }

    let metadata: Option<SessionMetadata> = if artifacts.contains_key(&ArtifactKind::Metadata) {
        load_document(backend, &keys::artifact_key(&base_key, keys::METADATA_FILENAME)).await
    } else {
        None
    };
    let profile: Option<ProfileSummary> = if artifacts.contains_key(&ArtifactKind::Profile) {
        load_document(backend, &keys::artifact_key(&base_key, keys::PROFILE_FILENAME)).await
    } else {
        None
    };

    let created_at = metadata.as_ref().and_then(|m| m.processed_at);
    let original_filename = metadata.as_ref().and_then(|m| m.original_filename.clone());

    Ok(SessionRecord {
        candidate_id: candidate_id.to_string(),
        session_id: session_id.to_string(),
        backend: backend.kind(),
        artifacts,
        metadata,
        profile,
        created_at,
        original_filename,
    })
}

/// All sessions of one candidate, materialized and sorted newest-first.
/// Session ids are listed lexicographically (they are timestamps, so that is
/// chronological) before the stable activity sort, keeping the "no
/// preference" rule deterministic on both backends.
pub async fn list_candidate_sessions(
    backend: &dyn StorageBackend,
    candidate_id: &str,
) -> StoreResult<Vec<SessionRecord>> {
    let mut session_ids = backend
        .list_prefixes(&keys::candidate_key(candidate_id))
        .await?;
    session_ids.sort();

    let mut sessions = Vec::with_capacity(session_ids.len());
    for session_id in &session_ids {
        sessions.push(materialize_session(backend, candidate_id, session_id).await?);
    }
    sort_newest_first(&mut sessions);
    Ok(sessions)
}

/// Newest-first sort with "no preference" for missing timestamps: rows
/// without `created_at` are not repositioned at all, and timestamped rows
/// sort descending among themselves in the remaining slots. (A comparator
/// returning Equal for null pairs is not a consistent total order, so this
/// is done by slot assignment rather than `sort_by`.)
pub fn sort_newest_first(sessions: &mut [SessionRecord]) {
    reorder_timestamped_desc(sessions, |s| s.created_at);
}

/// Shared by the session sort and the roster activity sort.
pub(crate) fn reorder_timestamped_desc<T, F>(items: &mut [T], timestamp: F)
where
    T: Clone,
    F: Fn(&T) -> Option<chrono::DateTime<chrono::Utc>>,
{
    let slots: Vec<usize> = items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| timestamp(item).map(|_| i))
        .collect();
    let mut stamped: Vec<T> = slots.iter().map(|&i| items[i].clone()).collect();
    stamped.sort_by_key(|item| std::cmp::Reverse(timestamp(item)));
    for (slot, item) in slots.into_iter().zip(stamped) {
        items[slot] = item;
    }
}

/// A document that is missing, unreadable or malformed yields `None` with a
/// warning; the session is still listed (PartialReadFailure tolerance).
async fn load_document<T: DeserializeOwned>(backend: &dyn StorageBackend, key: &str) -> Option<T> {
    let bytes = match backend.read(key).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("could not read {key}: {err}");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(doc) => Some(doc),
        Err(err) => {
            warn!("could not parse {key}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(session_id: &str, created_at: Option<chrono::DateTime<Utc>>) -> SessionRecord {
        SessionRecord {
            candidate_id: "c".into(),
            session_id: session_id.into(),
            backend: crate::config::BackendKind::Filesystem,
            artifacts: BTreeMap::new(),
            metadata: None,
            profile: None,
            created_at,
            original_filename: None,
        }
    }

    fn ts(day: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn sorts_newest_first() {
        let mut sessions = vec![
            record("a", Some(ts(1))),
            record("b", Some(ts(3))),
            record("c", Some(ts(2))),
        ];
        sort_newest_first(&mut sessions);
        let order: Vec<_> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn untimestamped_sessions_hold_position() {
        let mut sessions = vec![
            record("a", None),
            record("b", Some(ts(3))),
            record("c", None),
            record("d", Some(ts(5))),
        ];
        sort_newest_first(&mut sessions);
        let order: Vec<_> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        // null rows keep their slots; timestamped rows reorder among
        // themselves, forced to neither end
        assert_eq!(order, vec!["a", "d", "c", "b"]);
    }
}
