//! Object-store backend tests against a wiremock S3-compatible server.

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use candidate_store::backends::{ObjectStoreBackend, StorageBackend};
use candidate_store::{ArtifactKind, BackendKind, CandidateStore, StoreConfig, StoreError, UploadedAudio};

fn config(server: &MockServer) -> StoreConfig {
    StoreConfig {
        backend: BackendKind::ObjectStore,
        bucket: "interviews".into(),
        region: "local".into(),
        endpoint: Some(server.uri()),
        ..StoreConfig::default()
    }
}

fn list_xml(contents: &[&str], common_prefixes: &[&str], next_token: Option<&str>) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#,
    );
    xml.push_str(&format!(
        "<IsTruncated>{}</IsTruncated>",
        next_token.is_some()
    ));
    if let Some(token) = next_token {
        xml.push_str(&format!(
            "<NextContinuationToken>{token}</NextContinuationToken>"
        ));
    }
    for key in contents {
        xml.push_str(&format!("<Contents><Key>{key}</Key><Size>1</Size></Contents>"));
    }
    for prefix in common_prefixes {
        xml.push_str(&format!(
            "<CommonPrefixes><Prefix>{prefix}</Prefix></CommonPrefixes>"
        ));
    }
    xml.push_str("</ListBucketResult>");
    xml
}

#[tokio::test]
async fn save_puts_every_artifact_with_its_content_type() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path_regex(r"^/interviews/candidate-data/bob/[^/]+/transcript\.txt$"))
        .and(header("content-type", "text/plain"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/interviews/candidate-data/bob/[^/]+/candidate_profile\.json$"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(r"^/interviews/candidate-data/bob/[^/]+/metadata\.json$"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    // extension and mime type follow the uploaded file
    Mock::given(method("PUT"))
        .and(path_regex(r"^/interviews/candidate-data/bob/[^/]+/audio_[^/]+\.ogg$"))
        .and(header("content-type", "audio/ogg"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let upload = tmp.path().join("take.ogg");
    tokio::fs::write(&upload, b"ogg-bytes").await.unwrap();

    let store = CandidateStore::new(config(&server)).unwrap();
    let result = store
        .save_candidate_data(
            "bob",
            "transcript text",
            &json!({"name": "Bob"}),
            &json!({"processed_at": "2024-04-01T00:00:00Z"}),
            None,
            Some(UploadedAudio {
                source_path: upload,
                original_filename: Some("take.ogg".into()),
                mime_type: None,
            }),
        )
        .await
        .unwrap();

    assert_eq!(result.backend, BackendKind::ObjectStore);
    assert_eq!(result.bucket.as_deref(), Some("interviews"));
    let link = result.links.get(&ArtifactKind::Transcript).unwrap();
    assert!(link.starts_with(&server.uri()), "got {link}");
    let locator = result.locators.get(&ArtifactKind::Transcript).unwrap();
    assert!(locator.starts_with("candidate-data/bob/"), "got {locator}");
}

#[tokio::test]
async fn roster_walks_prefixes_and_tolerates_missing_documents() {
    let server = MockServer::start().await;
    let sid = "20240101-000000-IST";
    let base = format!("candidate-data/alice/{sid}");

    Mock::given(method("GET"))
        .and(path("/interviews"))
        .and(query_param("prefix", "candidate-data/"))
        .and(query_param("delimiter", "/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(list_xml(&[], &["candidate-data/alice/"], None)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/interviews"))
        .and(query_param("prefix", "candidate-data/alice/"))
        .and(query_param("delimiter", "/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(list_xml(&[], &[&format!("candidate-data/alice/{sid}/")], None)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/interviews"))
        .and(query_param("prefix", format!("{base}/")))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_xml(
            &[
                &format!("{base}/transcript.txt"),
                &format!("{base}/candidate_profile.json"),
                &format!("{base}/metadata.json"),
                &format!("{base}/audio_{sid}.mp3"),
            ],
            &[],
            None,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/interviews/{base}/metadata.json")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "processed_at": "2024-01-01T00:00:00Z",
            "original_filename": "interview.mp3"
        })))
        .mount(&server)
        .await;
    // candidate_profile.json is listed but its GET 404s: the session must
    // still appear, with an empty profile

    let store = CandidateStore::new(config(&server)).unwrap();

    let sessions = store.list_candidate_sessions("alice").await.unwrap();
    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert_eq!(session.session_id, sid);
    assert_eq!(session.artifacts.len(), 4);
    assert!(session.profile.is_none());
    assert_eq!(
        session.created_at,
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    );
    let audio_link = &session.artifact(ArtifactKind::Audio).unwrap().link;
    assert_eq!(
        audio_link,
        &format!("{}/interviews/{base}/audio_{sid}.mp3", server.uri())
    );

    let roster = store.list_candidates().await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].candidate_id, "alice");
    assert_eq!(roster[0].session_count, 1);
    assert!(roster[0].name.is_none());
    assert_eq!(
        roster[0].last_activity,
        Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn entry_listing_follows_continuation_tokens() {
    let server = MockServer::start().await;
    // mount the token page first so the tokenless request falls through to
    // the first-page mock below
    Mock::given(method("GET"))
        .and(path("/interviews"))
        .and(query_param("prefix", "candidate-data/paged/s1/"))
        .and(query_param("continuation-token", "tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_xml(
            &["candidate-data/paged/s1/metadata.json"],
            &[],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/interviews"))
        .and(query_param("prefix", "candidate-data/paged/s1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_xml(
            &[
                "candidate-data/paged/s1/transcript.txt",
                "candidate-data/paged/s1/candidate_profile.json",
            ],
            &[],
            Some("tok-2"),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let backend = ObjectStoreBackend::new(&config(&server)).unwrap();
    let entries = backend.list_entries("candidate-data/paged/s1").await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["transcript.txt", "candidate_profile.json", "metadata.json"]
    );
}

#[tokio::test]
async fn missing_bucket_lists_as_empty() {
    let server = MockServer::start().await;
    // no mocks: every request 404s, the backend treats that as a missing root
    let store = CandidateStore::new(config(&server)).unwrap();
    assert!(store.list_candidates().await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_faults_propagate_as_typed_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/interviews"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let store = CandidateStore::new(config(&server)).unwrap();
    let err = store.list_candidates().await.unwrap_err();
    match err {
        StoreError::UnexpectedStatus { status, .. } => assert_eq!(status, 500),
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn read_maps_missing_objects_to_not_found() {
    let server = MockServer::start().await;
    let backend = ObjectStoreBackend::new(&config(&server)).unwrap();
    let err = backend.read("candidate-data/ghost/s/metadata.json").await.unwrap_err();
    assert!(matches!(err, StoreError::ObjectNotFound { .. }));
}

#[tokio::test]
async fn upload_raw_puts_to_the_given_key() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/interviews/exports/roster.csv"))
        .and(header("content-type", "text/csv"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = CandidateStore::new(config(&server)).unwrap();
    store
        .upload_raw("exports/roster.csv", Bytes::from_static(b"a,b\n"), "text/csv")
        .await
        .unwrap();

    let err = store
        .upload_raw("../escape", Bytes::from_static(b"x"), "text/plain")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidKey(_)));
}
