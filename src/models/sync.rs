//! Skip-or-download orchestration over the artifact registry

use super::cache::{effective_root, resolve_cache_path};
use super::download::ArtifactFetcher;
use super::registry::{Artifact, ArtifactRegistry};
use super::verify::{hash_required_files, to_hash_map, verify_artifact};
use crate::error::{ManagerError, ManagerResult};
use crate::ownership::OwnershipEnforcer;
use crate::state::{VerificationDocument, VerificationRecord, VerificationStore};
use std::path::PathBuf;
use std::sync::Arc;

/// What a sync pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Artifacts fetched during this pass, in registry order
    pub downloaded: Vec<String>,
    /// Artifacts already verified when the pass reached them
    pub skipped: Vec<String>,
}

/// Downloads every artifact that does not verify, one at a time
pub struct SyncOrchestrator {
    registry: Arc<ArtifactRegistry>,
    cache_root: PathBuf,
    store: Arc<VerificationStore>,
    fetcher: Arc<dyn ArtifactFetcher>,
    ownership: Arc<dyn OwnershipEnforcer>,
}

impl SyncOrchestrator {
    pub fn new(
        registry: Arc<ArtifactRegistry>,
        cache_root: PathBuf,
        store: Arc<VerificationStore>,
        fetcher: Arc<dyn ArtifactFetcher>,
        ownership: Arc<dyn OwnershipEnforcer>,
    ) -> Self {
        Self {
            registry,
            cache_root,
            store,
            fetcher,
            ownership,
        }
    }

    /// Run one pass over the registry
    ///
    /// A fetch failure aborts the whole pass; artifacts already downloaded in
    /// this pass keep their records.
    pub async fn sync(&self) -> ManagerResult<SyncOutcome> {
        self.ownership.apply_dir(&self.cache_root);
        tracing::info!(cache_root = ?self.cache_root, "Models will be downloaded to cache root");

        let mut document = self.store.load().await;
        let mut outcome = SyncOutcome::default();

        for artifact in self.registry.iter() {
            tracing::info!(
                model_id = %artifact.id,
                name = %artifact.display_name,
                "Checking model"
            );

            if verify_artifact(artifact, &self.cache_root, &document) {
                tracing::info!(
                    name = %artifact.display_name,
                    "Model is already downloaded and verified, skipping"
                );
                outcome.skipped.push(artifact.id.clone());
                continue;
            }

            self.download(artifact, &mut document).await?;
            outcome.downloaded.push(artifact.id.clone());
        }

        if outcome.downloaded.is_empty() {
            tracing::info!("All models were already present and verified");
        } else {
            tracing::info!(
                count = outcome.downloaded.len(),
                models = ?outcome.downloaded,
                "Downloaded new models"
            );
        }

        Ok(outcome)
    }

    async fn download(
        &self,
        artifact: &Artifact,
        document: &mut VerificationDocument,
    ) -> ManagerResult<()> {
        tracing::info!(model_id = %artifact.id, name = %artifact.display_name, "Downloading model");

        let fetch_error = |message: String| ManagerError::Fetch {
            artifact: artifact.id.clone(),
            message,
        };

        self.discard_stale_files(artifact).map_err(|e| fetch_error(format!("{:#}", e)))?;

        if let Err(e) = self.fetcher.fetch(artifact).await {
            let message = format!("{:#}", e);
            tracing::error!(model_id = %artifact.id, error = %message, "Failed to download model");
            return Err(fetch_error(message));
        }

        let location = resolve_cache_path(&artifact.id, &self.cache_root).ok_or_else(|| {
            fetch_error("download finished but no cache directory was found".to_string())
        })?;

        let root = effective_root(&location);
        let hashes = to_hash_map(hash_required_files(artifact, &root));
        if let Some(missing) = artifact
            .required_files
            .iter()
            .find(|f| !hashes.contains_key(*f))
        {
            return Err(fetch_error(format!(
                "download finished but {} is missing from {:?}",
                missing, root
            )));
        }

        tracing::info!(name = %artifact.display_name, location = ?location, "Model downloaded successfully");

        document.insert(
            artifact.key.clone(),
            VerificationRecord::new(&artifact.id, hashes, location.clone()),
        );
        if let Err(e) = self.store.save(document).await {
            // The files are good; the next run re-verifies and re-downloads
            tracing::warn!(error = %e, "Could not save verification data");
        }

        self.ownership.apply(&location);
        Ok(())
    }

    /// Remove local copies of the required files before fetching
    ///
    /// A fetcher that serves cached files would otherwise hand back the same
    /// bytes that just failed verification.
    fn discard_stale_files(&self, artifact: &Artifact) -> std::io::Result<()> {
        let Some(location) = resolve_cache_path(&artifact.id, &self.cache_root) else {
            return Ok(());
        };

        let root = effective_root(&location);
        for file in &artifact.required_files {
            let path = root.join(file);
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(model_id = %artifact.id, path = ?path, "Removed stale file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::error!(path = ?path, error = %e, "Could not remove stale file");
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::UnixOwnership;
    use crate::state::mocks::MockStorage;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes artifacts in hub layout; can be told to fail, to skip a file or
    /// to serve files already in the cache the way a hub cache lookup does
    struct FakeFetcher {
        cache_root: PathBuf,
        calls: Mutex<Vec<String>>,
        fail_on: Option<String>,
        omit_file: Option<String>,
        keep_existing: bool,
    }

    impl FakeFetcher {
        fn new(cache_root: &Path) -> Self {
            Self {
                cache_root: cache_root.to_path_buf(),
                calls: Mutex::new(Vec::new()),
                fail_on: None,
                omit_file: None,
                keep_existing: false,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ArtifactFetcher for FakeFetcher {
        async fn fetch(&self, artifact: &Artifact) -> Result<()> {
            self.calls.lock().unwrap().push(artifact.id.clone());
            if self.fail_on.as_deref() == Some(artifact.id.as_str()) {
                anyhow::bail!("connection reset by peer");
            }
            let snapshot = self
                .cache_root
                .join(format!("models--{}", artifact.id.replace('/', "--")))
                .join("snapshots/0123abcd");
            std::fs::create_dir_all(&snapshot)?;
            for file in &artifact.required_files {
                if self.omit_file.as_deref() == Some(file.as_str()) {
                    continue;
                }
                if self.keep_existing && snapshot.join(file).exists() {
                    continue;
                }
                std::fs::write(snapshot.join(file), format!("{}:{}", artifact.id, file))?;
            }
            Ok(())
        }

        async fn probe(&self, _artifact: &Artifact) -> Result<()> {
            Ok(())
        }
    }

    fn orchestrator(
        cache_root: &Path,
        fetcher: Arc<FakeFetcher>,
    ) -> (SyncOrchestrator, Arc<VerificationStore>) {
        let ownership = Arc::new(UnixOwnership::current());
        let store = Arc::new(VerificationStore::new_with_storage(
            cache_root.join("model_verification.json"),
            Arc::new(MockStorage::new()),
            ownership.clone(),
        ));
        let orchestrator = SyncOrchestrator::new(
            Arc::new(ArtifactRegistry::zonos()),
            cache_root.to_path_buf(),
            store.clone(),
            fetcher,
            ownership,
        );
        (orchestrator, store)
    }

    #[tokio::test]
    async fn test_first_sync_downloads_everything() {
        let temp = TempDir::new().unwrap();
        let cache_root = temp.path().join("zonos_download_models");
        let fetcher = Arc::new(FakeFetcher::new(&cache_root));
        let (orchestrator, store) = orchestrator(&cache_root, fetcher.clone());

        let outcome = orchestrator.sync().await.unwrap();

        assert!(cache_root.is_dir());
        assert_eq!(
            outcome.downloaded,
            vec!["Zyphra/Zonos-v0.1-hybrid", "Zyphra/Zonos-v0.1-transformer"]
        );
        assert!(outcome.skipped.is_empty());

        let document = store.load().await;
        assert_eq!(document.len(), 2);
        let record = &document["hybrid_model"];
        assert_eq!(record.model_name, "Zyphra/Zonos-v0.1-hybrid");
        assert_eq!(record.hashes.len(), 2);
        assert_eq!(
            record.cache_path,
            cache_root.join("models--Zyphra--Zonos-v0.1-hybrid")
        );
    }

    #[tokio::test]
    async fn test_second_sync_downloads_nothing() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new(temp.path()));
        let (orchestrator, _) = orchestrator(temp.path(), fetcher.clone());

        orchestrator.sync().await.unwrap();
        let second = orchestrator.sync().await.unwrap();

        assert!(second.downloaded.is_empty());
        assert_eq!(second.skipped.len(), 2);
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_without_record() {
        let temp = TempDir::new().unwrap();
        let mut fetcher = FakeFetcher::new(temp.path());
        fetcher.fail_on = Some("Zyphra/Zonos-v0.1-hybrid".to_string());
        let fetcher = Arc::new(fetcher);
        let (orchestrator, store) = orchestrator(temp.path(), fetcher.clone());

        let err = orchestrator.sync().await.unwrap_err();

        assert!(matches!(err, ManagerError::Fetch { ref artifact, .. } if artifact == "Zyphra/Zonos-v0.1-hybrid"));
        // The run stops at the first failure
        assert_eq!(fetcher.calls(), vec!["Zyphra/Zonos-v0.1-hybrid"]);
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_records() {
        let temp = TempDir::new().unwrap();
        let mut fetcher = FakeFetcher::new(temp.path());
        fetcher.fail_on = Some("Zyphra/Zonos-v0.1-transformer".to_string());
        let (orchestrator, store) = orchestrator(temp.path(), Arc::new(fetcher));

        assert!(orchestrator.sync().await.is_err());

        let document = store.load().await;
        assert!(document.contains_key("hybrid_model"));
        assert!(!document.contains_key("transformer_model"));
    }

    #[tokio::test]
    async fn test_incomplete_download_is_not_recorded() {
        let temp = TempDir::new().unwrap();
        let mut fetcher = FakeFetcher::new(temp.path());
        fetcher.omit_file = Some("model.safetensors".to_string());
        let (orchestrator, store) = orchestrator(temp.path(), Arc::new(fetcher));

        let err = orchestrator.sync().await.unwrap_err();
        assert!(err.to_string().contains("model.safetensors"));
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_tampered_artifact_is_redownloaded_alone() {
        let temp = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new(temp.path()));
        let (orchestrator, _) = orchestrator(temp.path(), fetcher.clone());
        orchestrator.sync().await.unwrap();

        let weights = temp
            .path()
            .join("models--Zyphra--Zonos-v0.1-transformer/snapshots/0123abcd/model.safetensors");
        std::fs::write(&weights, "tampered").unwrap();

        let outcome = orchestrator.sync().await.unwrap();
        assert_eq!(outcome.downloaded, vec!["Zyphra/Zonos-v0.1-transformer"]);
        assert_eq!(outcome.skipped, vec!["Zyphra/Zonos-v0.1-hybrid"]);
    }

    #[tokio::test]
    async fn test_tampered_file_is_not_served_from_cache() {
        let temp = TempDir::new().unwrap();
        let mut fetcher = FakeFetcher::new(temp.path());
        fetcher.keep_existing = true;
        let (orchestrator, store) = orchestrator(temp.path(), Arc::new(fetcher));
        orchestrator.sync().await.unwrap();

        let weights = temp
            .path()
            .join("models--Zyphra--Zonos-v0.1-hybrid/snapshots/0123abcd/model.safetensors");
        std::fs::write(&weights, "bad!").unwrap();
        let tampered = crate::models::hash_file(&weights).unwrap();

        let outcome = orchestrator.sync().await.unwrap();
        assert_eq!(outcome.downloaded, vec!["Zyphra/Zonos-v0.1-hybrid"]);

        assert_eq!(
            std::fs::read_to_string(&weights).unwrap(),
            "Zyphra/Zonos-v0.1-hybrid:model.safetensors"
        );
        let document = store.load().await;
        let recorded = &document["hybrid_model"].hashes["model.safetensors"];
        assert_ne!(recorded, &tampered);
        assert_eq!(recorded, &crate::models::hash_file(&weights).unwrap());
    }

    #[tokio::test]
    async fn test_save_failure_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let ownership = Arc::new(UnixOwnership::current());
        let storage = Arc::new(MockStorage::new());
        storage.set_save_error("disk full");
        let store = Arc::new(VerificationStore::new_with_storage(
            temp.path().join("model_verification.json"),
            storage,
            ownership.clone(),
        ));
        let orchestrator = SyncOrchestrator::new(
            Arc::new(ArtifactRegistry::zonos()),
            temp.path().to_path_buf(),
            store,
            Arc::new(FakeFetcher::new(temp.path())),
            ownership,
        );

        let outcome = orchestrator.sync().await.unwrap();
        assert_eq!(outcome.downloaded.len(), 2);
    }
}
