use anyhow::{Context, Result};
use chrono::FixedOffset;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf, str::FromStr};

use crate::errors::StoreError;

/// Which storage substrate backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Filesystem,
    ObjectStore,
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "filesystem" | "fs" | "local" => Ok(BackendKind::Filesystem),
            "s3" | "object-store" | "object_store" => Ok(BackendKind::ObjectStore),
            other => Err(StoreError::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Time zone used when minting session ids: a fixed UTC offset plus the
/// suffix label embedded in the id (`20240101-000000-IST`).
#[derive(Debug, Clone)]
pub struct ZoneSpec {
    pub offset: FixedOffset,
    pub suffix: String,
}

impl Default for ZoneSpec {
    fn default() -> Self {
        // east_opt only fails outside ±24h
        Self {
            offset: FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap(),
            suffix: "IST".to_string(),
        }
    }
}

impl ZoneSpec {
    /// Parse an offset of the form `+05:30` / `-0800` / `+02`.
    pub fn parse(offset: &str, suffix: &str) -> Result<Self> {
        let raw = offset.trim();
        let (sign, digits) = if let Some(rest) = raw.strip_prefix('+') {
            (1i32, rest)
        } else if let Some(rest) = raw.strip_prefix('-') {
            (-1i32, rest)
        } else {
            (1i32, raw)
        };
        let digits: String = digits.chars().filter(|c| *c != ':').collect();
        let (hours, minutes) = match digits.len() {
            2 => (digits.parse::<i32>()?, 0),
            4 => (digits[..2].parse::<i32>()?, digits[2..].parse::<i32>()?),
            _ => anyhow::bail!("unrecognized zone offset `{offset}`"),
        };
        let secs = sign * (hours * 3600 + minutes * 60);
        let offset = FixedOffset::east_opt(secs)
            .with_context(|| format!("zone offset `{offset}` out of range"))?;
        Ok(Self {
            offset,
            suffix: suffix.to_string(),
        })
    }
}

/// Centralized store configuration.
/// Combines environment variables and CLI arguments; CLI wins.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// Filesystem backend: directory the `candidate-data/` tree lives under.
    pub data_root: PathBuf,
    /// Object-store backend: target bucket.
    pub bucket: String,
    /// Object-store backend: region used for virtual-hosted URLs.
    pub region: String,
    /// Optional endpoint override for S3-compatible servers (path-style URLs).
    pub endpoint: Option<String>,
    pub zone: ZoneSpec,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Filesystem,
            data_root: PathBuf::from("./data"),
            bucket: "candidate-data".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            zone: ZoneSpec::default(),
        }
    }
}

/// Subcommands exposed by the `candidate-store` binary.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Print the candidate roster as JSON
    ListCandidates,
    /// Print all sessions for one candidate as JSON
    ListSessions { candidate_id: String },
    /// Persist one processed session for a candidate
    Save {
        candidate_id: String,
        /// Path to the transcript text file
        #[arg(long)]
        transcript: PathBuf,
        /// Path to the candidate profile JSON document
        #[arg(long)]
        profile: PathBuf,
        /// Path to the session metadata JSON document
        #[arg(long)]
        metadata: PathBuf,
        /// Uploaded audio file to copy into the session
        #[arg(long)]
        audio: Option<PathBuf>,
        /// Rendered HTML profile to attach
        #[arg(long)]
        html: Option<PathBuf>,
        /// Rendered PDF profile to attach
        #[arg(long)]
        pdf: Option<PathBuf>,
    },
    /// Upload raw bytes to an arbitrary key (object-store backend only)
    UploadRaw {
        key: String,
        file: PathBuf,
        #[arg(long, default_value = "application/octet-stream")]
        content_type: String,
    },
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Candidate data storage tool")]
pub struct Args {
    /// Storage backend, `filesystem` or `s3` (overrides CANDIDATE_STORE_BACKEND)
    #[arg(long)]
    pub backend: Option<String>,

    /// Root directory for filesystem storage (overrides CANDIDATE_STORE_DATA_ROOT)
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Bucket for object storage (overrides CANDIDATE_STORE_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Bucket region (overrides CANDIDATE_STORE_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Endpoint override for S3-compatible servers (overrides CANDIDATE_STORE_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl StoreConfig {
    /// Parse environment variables + CLI args. Returns the config together
    /// with the requested subcommand.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let args = Args::parse();
        let cfg = Self::from_env_with(args.backend, args.data_root, args.bucket, args.region, args.endpoint)?;
        Ok((cfg, args.command))
    }

    fn from_env_with(
        backend: Option<String>,
        data_root: Option<PathBuf>,
        bucket: Option<String>,
        region: Option<String>,
        endpoint: Option<String>,
    ) -> Result<Self> {
        let defaults = Self::default();

        let backend_raw = backend
            .or_else(|| env::var("CANDIDATE_STORE_BACKEND").ok())
            .unwrap_or_else(|| "filesystem".into());
        let backend = backend_raw
            .parse::<BackendKind>()
            .context("reading storage backend kind")?;

        let data_root = data_root
            .or_else(|| env::var("CANDIDATE_STORE_DATA_ROOT").ok().map(PathBuf::from))
            .unwrap_or(defaults.data_root);
        let bucket = bucket
            .or_else(|| env::var("CANDIDATE_STORE_BUCKET").ok())
            .unwrap_or(defaults.bucket);
        let region = region
            .or_else(|| env::var("CANDIDATE_STORE_REGION").ok())
            .unwrap_or(defaults.region);
        let endpoint = endpoint.or_else(|| env::var("CANDIDATE_STORE_ENDPOINT").ok());

        let zone = match (
            env::var("CANDIDATE_STORE_ZONE_OFFSET").ok(),
            env::var("CANDIDATE_STORE_ZONE_SUFFIX").ok(),
        ) {
            (Some(offset), Some(suffix)) => ZoneSpec::parse(&offset, &suffix)?,
            (Some(offset), None) => ZoneSpec::parse(&offset, &ZoneSpec::default().suffix)?,
            _ => ZoneSpec::default(),
        };

        Ok(Self {
            backend,
            data_root,
            bucket,
            region,
            endpoint,
            zone,
        })
    }
}
