//! Model download functionality using hf-hub
//!
//! The fetcher is an opaque collaborator: it is called for its side effect of
//! populating the cache root, and whatever it returns is discarded.

use super::registry::Artifact;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hf_hub::api::tokio::{Api, ApiBuilder};
use std::path::PathBuf;

/// Source of artifact files
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Confirm the fetcher can reach its backend at all
    async fn ready(&self) -> Result<()> {
        Ok(())
    }

    /// Populate the cache with every required file of an artifact, fresh from
    /// the backend even when a cached copy exists
    async fn fetch(&self, artifact: &Artifact) -> Result<()>;

    /// Lightweight existence check without downloading file contents
    async fn probe(&self, artifact: &Artifact) -> Result<()>;
}

/// Fetches artifacts from the HuggingFace Hub into a fixed cache directory
///
/// Files land in the standard hub layout
/// (`models--{org}--{name}/snapshots/{revision}/`).
pub struct HfHubFetcher {
    cache_dir: PathBuf,
}

impl HfHubFetcher {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn api(&self) -> Result<Api> {
        ApiBuilder::new()
            .with_cache_dir(self.cache_dir.clone())
            .with_progress(true)
            .build()
            .context("Failed to create HF API client")
    }
}

#[async_trait]
impl ArtifactFetcher for HfHubFetcher {
    async fn ready(&self) -> Result<()> {
        self.api().map(|_| ())
    }

    async fn fetch(&self, artifact: &Artifact) -> Result<()> {
        tracing::info!(
            model_id = %artifact.id,
            cache_dir = ?self.cache_dir,
            "Starting model download via hf-hub"
        );

        let repo = self.api()?.model(artifact.id.clone());

        for file in &artifact.required_files {
            tracing::debug!(model_id = %artifact.id, file = %file, "Downloading file");
            // `get` would return a cached copy; a fetch always goes to the hub
            repo.download(file)
                .await
                .with_context(|| format!("Failed to download {}", file))?;
        }

        Ok(())
    }

    async fn probe(&self, artifact: &Artifact) -> Result<()> {
        let info = self
            .api()?
            .model(artifact.id.clone())
            .info()
            .await
            .with_context(|| format!("Failed to query {}", artifact.id))?;

        let published: Vec<&str> = info.siblings.iter().map(|s| s.rfilename.as_str()).collect();
        if let Some(missing) = artifact
            .required_files
            .iter()
            .find(|f| !published.contains(&f.as_str()))
        {
            anyhow::bail!("{} no longer publishes {}", artifact.id, missing);
        }

        tracing::debug!(model_id = %artifact.id, sha = %info.sha, "Remote model reachable");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArtifactRegistry;

    #[tokio::test]
    async fn test_ready_with_cache_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let fetcher = HfHubFetcher::new(temp_dir.path().to_path_buf());
        assert!(fetcher.ready().await.is_ok());
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_probe_zonos_hybrid() {
        let temp_dir = tempfile::tempdir().unwrap();
        let fetcher = HfHubFetcher::new(temp_dir.path().to_path_buf());
        let registry = ArtifactRegistry::zonos();
        let artifact = registry.get("Zyphra/Zonos-v0.1-hybrid").unwrap();
        let result = fetcher.probe(artifact).await;
        assert!(result.is_ok(), "Probe failed: {:?}", result.err());
    }
}
