//! Roster aggregation: one summary row per candidate.

use crate::backends::StorageBackend;
use crate::errors::StoreResult;
use crate::keys;
use crate::models::{CandidateRecord, SessionRecord};
use crate::services::materializer::{self, reorder_timestamped_desc};

/// Build the full roster. Candidates come from the backend's top-level
/// listing (sorted lexicographically so both backends feed the activity
/// sort the same baseline order); each row is projected from that
/// candidate's newest session.
pub async fn build_roster(backend: &dyn StorageBackend) -> StoreResult<Vec<CandidateRecord>> {
    let mut candidate_ids = backend.list_prefixes(keys::DATA_PREFIX).await?;
    candidate_ids.sort();

    let mut roster = Vec::with_capacity(candidate_ids.len());
    for candidate_id in &candidate_ids {
        let sessions = materializer::list_candidate_sessions(backend, candidate_id).await?;
        roster.push(project_candidate(candidate_id, &sessions));
    }

    reorder_timestamped_desc(&mut roster, |record| record.last_activity);
    Ok(roster)
}

/// The newest session (head of the pre-sorted list) is authoritative for
/// the roster row's summary fields.
fn project_candidate(candidate_id: &str, sessions: &[SessionRecord]) -> CandidateRecord {
    let newest = sessions.first();
    let profile = newest.and_then(|s| s.profile.as_ref());
    CandidateRecord {
        candidate_id: candidate_id.to_string(),
        session_count: sessions.len(),
        last_activity: newest.and_then(|s| s.created_at),
        name: profile.and_then(|p| p.name.clone()),
        location: profile.and_then(|p| p.location.clone()),
        years_experience: profile.and_then(|p| p.years_experience),
    }
}
