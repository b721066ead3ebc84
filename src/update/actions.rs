//! Side effects the update flow applies once the operator has chosen

use crate::models::SyncOrchestrator;
use crate::ownership::OwnershipEnforcer;
use crate::state::VerificationStore;
use crate::uv::UvRunner;
use crate::vcs::VersionControl;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Extra dependency group installed after the base sync
pub const COMPILE_EXTRA: &str = "compile";

#[async_trait]
pub trait UpdateActions: Send + Sync {
    /// Bring the working tree to the remote branch tip and reinstall dependencies
    async fn refresh_repository(&self) -> Result<()>;

    /// Discard verification records and run a full artifact sync
    async fn refresh_models(&self) -> Result<()>;
}

/// Production update actions
pub struct Refresher {
    branch: String,
    repo_path: PathBuf,
    cache_root: PathBuf,
    vcs: Arc<dyn VersionControl>,
    uv: UvRunner,
    store: Arc<VerificationStore>,
    orchestrator: SyncOrchestrator,
    ownership: Arc<dyn OwnershipEnforcer>,
}

impl Refresher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        branch: String,
        repo_path: PathBuf,
        cache_root: PathBuf,
        vcs: Arc<dyn VersionControl>,
        uv: UvRunner,
        store: Arc<VerificationStore>,
        orchestrator: SyncOrchestrator,
        ownership: Arc<dyn OwnershipEnforcer>,
    ) -> Self {
        Self {
            branch,
            repo_path,
            cache_root,
            vcs,
            uv,
            store,
            orchestrator,
            ownership,
        }
    }
}

#[async_trait]
impl UpdateActions for Refresher {
    async fn refresh_repository(&self) -> Result<()> {
        tracing::info!(repo = ?self.repo_path, branch = %self.branch, "Updating repository");

        if let Err(e) = self.vcs.stash() {
            tracing::warn!(error = %e, "Could not stash local changes");
        }
        self.vcs
            .pull(&self.branch)
            .context("Failed to pull latest changes")?;

        // Dependency installs are best effort; the pulled code is already in place
        for extra in [None, Some(COMPILE_EXTRA)] {
            if let Err(e) = self.uv.sync(extra).await {
                tracing::warn!(extra = ?extra, error = %e, "Dependency sync failed");
            }
        }

        self.ownership.apply(&self.repo_path);
        tracing::info!("Repository updated successfully");
        Ok(())
    }

    async fn refresh_models(&self) -> Result<()> {
        tracing::info!(cache_root = ?self.cache_root, "Updating models");

        self.store
            .remove()
            .await
            .context("Failed to clear verification data")?;
        self.orchestrator.sync().await?;

        self.ownership.apply(&self.cache_root);
        tracing::info!("Models updated successfully");
        Ok(())
    }
}
