use anyhow::{Context, Result};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use candidate_store::config::Command;
use candidate_store::{CandidateStore, GeneratedArtifacts, StoreConfig, UploadedAudio};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (cfg, command) = StoreConfig::from_env_and_args()?;
    tracing::debug!("starting candidate-store with config: {:?}", cfg);

    let store = CandidateStore::new(cfg).context("constructing storage facade")?;

    match command {
        Command::ListCandidates => {
            let roster = store.list_candidates().await?;
            println!("{}", serde_json::to_string_pretty(&roster)?);
        }
        Command::ListSessions { candidate_id } => {
            let sessions = store.list_candidate_sessions(&candidate_id).await?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        Command::Save {
            candidate_id,
            transcript,
            profile,
            metadata,
            audio,
            html,
            pdf,
        } => {
            let transcript = tokio::fs::read_to_string(&transcript)
                .await
                .with_context(|| format!("reading transcript {}", transcript.display()))?;
            let profile = read_json(&profile).await?;
            let metadata = read_json(&metadata).await?;

            let audio = audio.map(|path| UploadedAudio {
                original_filename: path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string),
                mime_type: None,
                source_path: path,
            });
            let generated = read_generated(html, pdf).await?;

            let result = store
                .save_candidate_data(&candidate_id, &transcript, &profile, &metadata, generated, audio)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::UploadRaw {
            key,
            file,
            content_type,
        } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let len = bytes.len();
            store.upload_raw(&key, Bytes::from(bytes), &content_type).await?;
            tracing::info!("uploaded {len} byte(s) to {key}");
        }
    }

    Ok(())
}

async fn read_json(path: &Path) -> Result<serde_json::Value> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn read_generated(
    html: Option<PathBuf>,
    pdf: Option<PathBuf>,
) -> Result<Option<GeneratedArtifacts>> {
    if html.is_none() && pdf.is_none() {
        return Ok(None);
    }
    let mut generated = GeneratedArtifacts::default();
    if let Some(path) = html {
        let raw = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        generated.html = Some(Bytes::from(raw));
    }
    if let Some(path) = pdf {
        let raw = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        generated.pdf = Some(Bytes::from(raw));
    }
    Ok(Some(generated))
}
