//! S3-compatible object store backend.
//!
//! Speaks the anonymous subset of the S3 REST protocol: PUT / GET per object
//! and ListObjectsV2 with prefix + delimiter to emulate directories. Works
//! against AWS-style virtual-hosted buckets or any S3-compatible server via
//! the endpoint override (path-style URLs).

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, header};
use std::time::Duration;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::backends::{RawEntry, StorageBackend, WriteBody};
use crate::config::{BackendKind, StoreConfig};
use crate::errors::{StoreError, StoreResult};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const ERROR_BODY_EXCERPT: usize = 200;

pub struct ObjectStoreBackend {
    client: reqwest::Client,
    bucket: String,
    region: String,
    /// Set for S3-compatible servers; switches URL building to path-style.
    endpoint: Option<String>,
}

impl ObjectStoreBackend {
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|source| StoreError::Http {
                endpoint: config.bucket.clone(),
                source,
            })?;
        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint: config
                .endpoint
                .as_ref()
                .map(|e| e.trim_end_matches('/').to_string()),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn bucket_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}", endpoint, self.bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.bucket_url(), key)
    }

    async fn check_status(endpoint: String, resp: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
        Err(StoreError::UnexpectedStatus {
            endpoint,
            status: status.as_u16(),
            body: excerpt,
        })
    }

    /// One ListObjectsV2 page. `delimiter` groups one level of "directories"
    /// into CommonPrefixes the same way the protocol defines it.
    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> StoreResult<Option<ListPage>> {
        let url = self.bucket_url();
        let mut query: Vec<(&str, &str)> = vec![("list-type", "2"), ("prefix", prefix)];
        if let Some(delim) = delimiter {
            query.push(("delimiter", delim));
        }
        if let Some(token) = continuation_token {
            query.push(("continuation-token", token));
        }

        let resp = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|source| StoreError::Http {
                endpoint: url.clone(),
                source,
            })?;

        // A missing bucket is the object-store equivalent of a missing root
        // directory: zero results, not a fault.
        if resp.status() == StatusCode::NOT_FOUND {
            warn!("bucket `{}` not found while listing `{}`", self.bucket, prefix);
            return Ok(None);
        }

        let resp = Self::check_status(url, resp).await?;
        let xml = resp.text().await.map_err(|source| StoreError::Http {
            endpoint: self.bucket_url(),
            source,
        })?;
        Ok(Some(parse_list_page(&xml)))
    }

    /// Run ListObjectsV2 to exhaustion, following continuation tokens.
    async fn list_all(&self, prefix: &str, delimiter: Option<&str>) -> StoreResult<ListPage> {
        let mut merged = ListPage::default();
        let mut token: Option<String> = None;
        loop {
            let page = match self.list_page(prefix, delimiter, token.as_deref()).await? {
                Some(page) => page,
                None => return Ok(ListPage::default()),
            };
            merged.keys.extend(page.keys);
            merged.common_prefixes.extend(page.common_prefixes);
            match (page.is_truncated, page.next_token) {
                (true, Some(next)) => token = Some(next),
                _ => break,
            }
        }
        Ok(merged)
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    async fn write(&self, key: &str, body: WriteBody, content_type: &str) -> StoreResult<()> {
        let url = self.object_url(key);
        let request = self
            .client
            .put(&url)
            .header(header::CONTENT_TYPE, content_type);
        let request = match body {
            WriteBody::Bytes(bytes) => request.body(bytes),
            WriteBody::File(path) => {
                let file = File::open(&path).await?;
                request.body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            }
        };
        let resp = request.send().await.map_err(|source| StoreError::Http {
            endpoint: url.clone(),
            source,
        })?;
        Self::check_status(url, resp).await?;
        debug!("put {} ({})", key, content_type);
        Ok(())
    }

    async fn read(&self, key: &str) -> StoreResult<Bytes> {
        let url = self.object_url(key);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| StoreError::Http {
                endpoint: url.clone(),
                source,
            })?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::ObjectNotFound {
                key: key.to_string(),
            });
        }
        let resp = Self::check_status(url.clone(), resp).await?;
        resp.bytes()
            .await
            .map_err(|source| StoreError::Http { endpoint: url, source })
    }

    async fn list_prefixes(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let search = format!("{prefix}/");
        let page = self.list_all(&search, Some("/")).await?;
        let names = page
            .common_prefixes
            .iter()
            .filter_map(|p| {
                p.strip_prefix(&search)
                    .map(|rest| rest.trim_end_matches('/').to_string())
            })
            .filter(|name| !name.is_empty())
            .collect();
        Ok(names)
    }

    async fn list_entries(&self, prefix: &str) -> StoreResult<Vec<RawEntry>> {
        let search = format!("{prefix}/");
        let page = self.list_all(&search, None).await?;
        let entries = page
            .keys
            .into_iter()
            .filter_map(|key| {
                let name = key.rsplit('/').next().unwrap_or(&key).to_string();
                // the prefix itself may be listed as a zero-byte key
                if name.is_empty() { None } else { Some(RawEntry { name, key }) }
            })
            .collect();
        Ok(entries)
    }

    fn public_link(&self, key: &str) -> String {
        self.object_url(key)
    }

    fn locator(&self, key: &str) -> String {
        key.to_string()
    }
}

#[derive(Debug, Default)]
struct ListPage {
    keys: Vec<String>,
    common_prefixes: Vec<String>,
    is_truncated: bool,
    next_token: Option<String>,
}

/// Pull the fields we need out of a ListBucketResult document. The protocol
/// nests `<Key>` only inside `<Contents>` and the grouped `<Prefix>` only
/// inside `<CommonPrefixes>`; the top-level `<Prefix>` echo is skipped by
/// scanning the wrapper blocks first.
fn parse_list_page(xml: &str) -> ListPage {
    let keys = tag_values(xml, "Key");
    let common_prefixes = tag_blocks(xml, "CommonPrefixes")
        .into_iter()
        .flat_map(|block| tag_values(block, "Prefix"))
        .collect();
    let is_truncated = first_tag_value(xml, "IsTruncated")
        .map(|v| v == "true")
        .unwrap_or(false);
    let next_token = first_tag_value(xml, "NextContinuationToken");
    ListPage {
        keys,
        common_prefixes,
        is_truncated,
        next_token,
    }
}

/// Raw inner text of every `<tag>...</tag>` occurrence, in document order.
fn tag_blocks<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let mut blocks = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        match after.find(&close) {
            Some(end) => {
                blocks.push(&after[..end]);
                rest = &after[end + close.len()..];
            }
            None => break,
        }
    }
    blocks
}

fn tag_values(xml: &str, tag: &str) -> Vec<String> {
    tag_blocks(xml, tag)
        .into_iter()
        .map(xml_unescape)
        .collect()
}

fn first_tag_value(xml: &str, tag: &str) -> Option<String> {
    tag_values(xml, tag).into_iter().next()
}

/// Inverse of the escaping ListBucketResult producers apply.
fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(endpoint: Option<&str>) -> ObjectStoreBackend {
        let config = StoreConfig {
            backend: BackendKind::ObjectStore,
            bucket: "interviews".into(),
            region: "eu-west-1".into(),
            endpoint: endpoint.map(String::from),
            ..StoreConfig::default()
        };
        ObjectStoreBackend::new(&config).unwrap()
    }

    #[test]
    fn virtual_hosted_urls_by_default() {
        let b = backend(None);
        assert_eq!(
            b.object_url("candidate-data/alice/s1/transcript.txt"),
            "https://interviews.s3.eu-west-1.amazonaws.com/candidate-data/alice/s1/transcript.txt"
        );
        assert_eq!(b.public_link("k"), "https://interviews.s3.eu-west-1.amazonaws.com/k");
    }

    #[test]
    fn endpoint_override_switches_to_path_style() {
        let b = backend(Some("http://localhost:9000/"));
        assert_eq!(b.bucket_url(), "http://localhost:9000/interviews");
        assert_eq!(b.object_url("a/b"), "http://localhost:9000/interviews/a/b");
    }

    #[test]
    fn list_page_parsing_separates_keys_and_prefixes() {
        let xml = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#,
            "<Name>interviews</Name>",
            "<Prefix>candidate-data/</Prefix>",
            "<KeyCount>3</KeyCount>",
            "<IsTruncated>false</IsTruncated>",
            "<Contents><Key>candidate-data/alice/s1/transcript.txt</Key><Size>12</Size></Contents>",
            "<Contents><Key>candidate-data/alice/s1/metadata.json</Key><Size>40</Size></Contents>",
            "<CommonPrefixes><Prefix>candidate-data/alice/</Prefix></CommonPrefixes>",
            "<CommonPrefixes><Prefix>candidate-data/bob&amp;co/</Prefix></CommonPrefixes>",
            "</ListBucketResult>",
        );
        let page = parse_list_page(xml);
        assert_eq!(
            page.keys,
            vec![
                "candidate-data/alice/s1/transcript.txt",
                "candidate-data/alice/s1/metadata.json"
            ]
        );
        // top-level <Prefix> echo is not a common prefix
        assert_eq!(
            page.common_prefixes,
            vec!["candidate-data/alice/", "candidate-data/bob&co/"]
        );
        assert!(!page.is_truncated);
        assert_eq!(page.next_token, None);
    }

    #[test]
    fn list_page_parsing_reads_pagination() {
        let xml = concat!(
            "<ListBucketResult>",
            "<IsTruncated>true</IsTruncated>",
            "<NextContinuationToken>token-2</NextContinuationToken>",
            "<Contents><Key>a</Key></Contents>",
            "</ListBucketResult>",
        );
        let page = parse_list_page(xml);
        assert!(page.is_truncated);
        assert_eq!(page.next_token.as_deref(), Some("token-2"));
    }
}
