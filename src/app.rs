//! Command implementations wired from a single configuration
//!
//! Every component receives its paths from [`ManagerConfig`] at construction;
//! nothing is read from process-wide state afterwards.

use crate::config::ManagerConfig;
use crate::error::{ManagerError, ManagerResult};
use crate::launch::{discover_interfaces, launch, select_interface};
use crate::models::{
    ArtifactFetcher, ArtifactRegistry, HfHubFetcher, SyncOrchestrator, SyncOutcome,
    VerificationReport, verify_all,
};
use crate::ownership::{OwnershipEnforcer, UnixOwnership};
use crate::prompt::Prompter;
use crate::state::VerificationStore;
use crate::uninstall::{UninstallSummary, confirm, removal_targets, uninstall};
use crate::update::{Refresher, UpdateChecker, UpdateReport, run_update};
use crate::uv::UvRunner;
use crate::vcs::{GitCli, VersionControl, command_exists};
use anyhow::Result;
use std::sync::Arc;

/// Executable the repository commands depend on
pub const GIT_BINARY: &str = "git";

pub struct App {
    config: ManagerConfig,
    registry: Arc<ArtifactRegistry>,
    store: Arc<VerificationStore>,
    fetcher: Arc<dyn ArtifactFetcher>,
    ownership: Arc<dyn OwnershipEnforcer>,
    vcs: Arc<dyn VersionControl>,
}

impl App {
    /// Production wiring: hub downloads, git and the current user's ownership
    pub fn new(config: ManagerConfig) -> Self {
        let fetcher = Arc::new(HfHubFetcher::new(config.cache_root()));
        let vcs = Arc::new(GitCli::new(config.repo_path(), &config.remote));
        Self::with_collaborators(config, fetcher, vcs, Arc::new(UnixOwnership::current()))
    }

    pub fn with_collaborators(
        config: ManagerConfig,
        fetcher: Arc<dyn ArtifactFetcher>,
        vcs: Arc<dyn VersionControl>,
        ownership: Arc<dyn OwnershipEnforcer>,
    ) -> Self {
        let store = Arc::new(VerificationStore::new(
            config.verification_path(),
            ownership.clone(),
        ));
        Self {
            config,
            registry: Arc::new(ArtifactRegistry::zonos()),
            store,
            fetcher,
            ownership,
            vcs,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn store(&self) -> &VerificationStore {
        &self.store
    }

    fn orchestrator(&self) -> SyncOrchestrator {
        SyncOrchestrator::new(
            self.registry.clone(),
            self.config.cache_root(),
            self.store.clone(),
            self.fetcher.clone(),
            self.ownership.clone(),
        )
    }

    fn uv(&self) -> UvRunner {
        UvRunner::new(self.config.uv_path(), self.config.repo_path())
    }

    fn require_repository(&self) -> ManagerResult<()> {
        if !self.config.repo_path().is_dir() {
            return Err(ManagerError::Precondition(format!(
                "Zonos repository not found at {}. Please install it first",
                self.config.repo_path().display()
            )));
        }
        Ok(())
    }

    /// Fail unless the external tools the manager drives are available
    pub fn check_env(&self) -> ManagerResult<()> {
        if !command_exists(GIT_BINARY) {
            return Err(ManagerError::Precondition(
                "git is not installed or not on PATH".to_string(),
            ));
        }
        tracing::info!("Environment check passed");
        Ok(())
    }

    /// Download every artifact that does not verify
    pub async fn download_models(&self) -> ManagerResult<SyncOutcome> {
        self.require_repository()?;
        tracing::info!("Starting model download process");
        self.orchestrator().sync().await
    }

    /// Report-only verification; `None` when no verification data exists
    pub async fn verify_models(&self) -> ManagerResult<Option<VerificationReport>> {
        let cache_root = self.config.cache_root();
        match std::fs::metadata(&cache_root) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(ManagerError::Precondition(format!(
                    "{} is not a directory",
                    cache_root.display()
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManagerError::Precondition(
                    "Models directory not found. Please download models first".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Starting model verification process");
        let document = self.store.load().await;
        if document.is_empty() {
            tracing::warn!("No verification data found. Models may need to be re-downloaded");
            return Ok(None);
        }

        let report = verify_all(&self.registry, &cache_root, &document);
        if report.all_verified() {
            tracing::info!("All models verified successfully");
        } else {
            let failed: Vec<_> = report.failed().map(|e| e.display_name.as_str()).collect();
            tracing::warn!(failed = ?failed, "Some models failed verification, consider re-downloading");
        }
        Ok(Some(report))
    }

    pub fn checker(&self) -> UpdateChecker {
        UpdateChecker::new(
            self.config.repo_path(),
            self.config.branch.clone(),
            self.config.cache_root(),
            self.registry.clone(),
            self.store.clone(),
            self.vcs.clone(),
            self.fetcher.clone(),
        )
    }

    pub fn refresher(&self) -> Refresher {
        Refresher::new(
            self.config.branch.clone(),
            self.config.repo_path(),
            self.config.cache_root(),
            self.vcs.clone(),
            self.uv(),
            self.store.clone(),
            self.orchestrator(),
            self.ownership.clone(),
        )
    }

    /// Check both domains and apply what the operator picks
    pub async fn update(&self, prompter: &mut dyn Prompter) -> Result<Option<UpdateReport>> {
        self.check_env()?;
        let refresher = self.refresher();
        run_update(&self.checker(), prompter, &refresher).await
    }

    /// Remove the installation after double confirmation; `None` when cancelled
    pub fn uninstall(
        &self,
        prompter: &mut dyn Prompter,
        shared_cache: bool,
    ) -> Result<Option<UninstallSummary>> {
        let targets = removal_targets(&self.config, shared_cache);
        if !confirm(prompter, &targets)? {
            return Ok(None);
        }
        Ok(Some(uninstall(&targets)))
    }

    /// Launch an interface and return its exit code
    pub async fn run(&self, interface: Option<&str>, prompter: &mut dyn Prompter) -> Result<i32> {
        self.require_repository()?;

        let interfaces = discover_interfaces(&self.config.interfaces_path());
        if interfaces.is_empty() {
            return Err(ManagerError::Precondition(format!(
                "No interfaces found under {}",
                self.config.interfaces_path().display()
            ))
            .into());
        }

        let selected = select_interface(&interfaces, interface, prompter)?;
        launch(&self.uv(), selected).await
    }
}
