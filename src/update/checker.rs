//! Independent freshness reports for the repository and the model artifacts

use crate::models::{ArtifactFetcher, ArtifactRegistry, verify_artifact};
use crate::state::VerificationStore;
use crate::vcs::VersionControl;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Length of abbreviated commit ids in reports
const SHORT_REF_LEN: usize = 8;

/// State of the cloned repository relative to its remote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RepositoryStatus {
    NotInstalled,
    UpToDate {
        commit: String,
    },
    UpdateAvailable {
        current_commit: String,
        remote_commit: String,
        commits_behind: u64,
        latest_message: String,
    },
    Error {
        message: String,
    },
}

impl RepositoryStatus {
    pub fn needs_update(&self) -> bool {
        matches!(self, Self::UpdateAvailable { .. })
    }
}

/// Why an artifact was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueReason {
    VerificationFailed,
    CheckFailed,
}

impl std::fmt::Display for IssueReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VerificationFailed => write!(f, "verification failed"),
            Self::CheckFailed => write!(f, "check failed"),
        }
    }
}

/// An artifact that may need refreshing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelIssue {
    pub model_id: String,
    pub display_name: String,
    pub reason: IssueReason,
}

/// State of the model artifacts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelStatus {
    NotDownloaded,
    /// Cache root exists but no verification records do
    NoVerification,
    UpToDate,
    UpdatesAvailable {
        models: Vec<ModelIssue>,
    },
    CannotCheck {
        message: String,
    },
    Error {
        message: String,
    },
}

impl ModelStatus {
    /// Unverified artifacts are offered a refresh as well as flagged ones
    pub fn needs_update(&self) -> bool {
        matches!(self, Self::UpdatesAvailable { .. } | Self::NoVerification)
    }
}

fn short(reference: &str) -> String {
    reference.chars().take(SHORT_REF_LEN).collect()
}

/// Produces repository and model reports; neither check affects the other
pub struct UpdateChecker {
    repo_path: PathBuf,
    branch: String,
    cache_root: PathBuf,
    registry: Arc<ArtifactRegistry>,
    store: Arc<VerificationStore>,
    vcs: Arc<dyn VersionControl>,
    fetcher: Arc<dyn ArtifactFetcher>,
}

impl UpdateChecker {
    pub fn new(
        repo_path: PathBuf,
        branch: String,
        cache_root: PathBuf,
        registry: Arc<ArtifactRegistry>,
        store: Arc<VerificationStore>,
        vcs: Arc<dyn VersionControl>,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> Self {
        Self {
            repo_path,
            branch,
            cache_root,
            registry,
            store,
            vcs,
            fetcher,
        }
    }

    /// Compare the checked-out commit with the remote branch tip
    pub fn check_repository(&self) -> RepositoryStatus {
        if !self.repo_path.exists() {
            return RepositoryStatus::NotInstalled;
        }

        tracing::info!(repo = ?self.repo_path, "Checking for repository updates");
        if let Err(e) = self.vcs.fetch_remote() {
            tracing::error!(error = %e, "Failed to fetch from remote");
        }

        let current = self.vcs.current_ref();
        let remote = self.vcs.remote_ref(&self.branch);
        let (current, remote) = match (current, remote) {
            (Ok(current), Ok(remote)) if !current.is_empty() && !remote.is_empty() => {
                (current, remote)
            }
            (current, remote) => {
                for e in [current.err(), remote.err()].into_iter().flatten() {
                    tracing::error!(error = %e, "Could not resolve commit");
                }
                return RepositoryStatus::Error {
                    message: "Could not determine commit status".to_string(),
                };
            }
        };

        if current == remote {
            return RepositoryStatus::UpToDate {
                commit: short(&current),
            };
        }

        let commits_behind = self
            .vcs
            .commits_between(&current, &remote)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Could not count commits behind");
                0
            });
        let latest_message = self.vcs.latest_message(&remote).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Could not read latest commit message");
            "No message".to_string()
        });

        RepositoryStatus::UpdateAvailable {
            current_commit: short(&current),
            remote_commit: short(&remote),
            commits_behind,
            latest_message,
        }
    }

    /// Re-validate every artifact against the remote and the stored hashes
    pub async fn check_models(&self) -> ModelStatus {
        if !self.cache_root.exists() {
            return ModelStatus::NotDownloaded;
        }
        if !self.cache_root.is_dir() {
            return ModelStatus::Error {
                message: format!("{:?} is not a directory", self.cache_root),
            };
        }

        let document = self.store.load().await;
        if document.is_empty() {
            return ModelStatus::NoVerification;
        }

        if let Err(e) = self.fetcher.ready().await {
            return ModelStatus::CannotCheck {
                message: format!("{:#}", e),
            };
        }

        let mut models = Vec::new();
        for artifact in self.registry.iter() {
            tracing::info!(name = %artifact.display_name, "Checking for model updates");

            let reason = match self.fetcher.probe(artifact).await {
                Err(e) => {
                    tracing::warn!(model_id = %artifact.id, error = %e, "Could not check updates");
                    Some(IssueReason::CheckFailed)
                }
                Ok(()) if !verify_artifact(artifact, &self.cache_root, &document) => {
                    Some(IssueReason::VerificationFailed)
                }
                Ok(()) => None,
            };

            if let Some(reason) = reason {
                models.push(ModelIssue {
                    model_id: artifact.id.clone(),
                    display_name: artifact.display_name.clone(),
                    reason,
                });
            }
        }

        if models.is_empty() {
            ModelStatus::UpToDate
        } else {
            ModelStatus::UpdatesAvailable { models }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::MockVcs;
    use super::*;
    use crate::models::Artifact;
    use crate::models::verify::{hash_required_files, to_hash_map};
    use crate::ownership::UnixOwnership;
    use crate::state::{VerificationDocument, VerificationRecord};
    use anyhow::Result;
    use async_trait::async_trait;
    use tempfile::TempDir;

    const HEAD: &str = "0123456789abcdef0123456789abcdef01234567";
    const TIP: &str = "fedcba9876543210fedcba9876543210fedcba98";

    struct ProbeFetcher {
        unreachable: Option<String>,
        not_ready: bool,
    }

    #[async_trait]
    impl ArtifactFetcher for ProbeFetcher {
        async fn ready(&self) -> Result<()> {
            if self.not_ready {
                anyhow::bail!("hub client unavailable");
            }
            Ok(())
        }
        async fn fetch(&self, _artifact: &Artifact) -> Result<()> {
            anyhow::bail!("checker never downloads")
        }
        async fn probe(&self, artifact: &Artifact) -> Result<()> {
            if self.unreachable.as_deref() == Some(artifact.id.as_str()) {
                anyhow::bail!("404");
            }
            Ok(())
        }
    }

    fn checker(temp: &TempDir, vcs: MockVcs, fetcher: ProbeFetcher) -> UpdateChecker {
        let cache_root = temp.path().join("zonos_download_models");
        let store = Arc::new(VerificationStore::new(
            cache_root.join("model_verification.json"),
            Arc::new(UnixOwnership::current()),
        ));
        UpdateChecker::new(
            temp.path().join("Zonos"),
            "main".to_string(),
            cache_root,
            Arc::new(ArtifactRegistry::zonos()),
            store,
            Arc::new(vcs),
            Arc::new(fetcher),
        )
    }

    fn reachable() -> ProbeFetcher {
        ProbeFetcher {
            unreachable: None,
            not_ready: false,
        }
    }

    /// Install both artifacts and record them; returns the cache root
    async fn install_models(temp: &TempDir) -> PathBuf {
        let cache_root = temp.path().join("zonos_download_models");
        let mut document = VerificationDocument::new();
        for artifact in ArtifactRegistry::zonos().iter() {
            let location = cache_root.join(format!("models--{}", artifact.id.replace('/', "--")));
            std::fs::create_dir_all(&location).unwrap();
            for file in &artifact.required_files {
                std::fs::write(location.join(file), file.as_bytes()).unwrap();
            }
            let hashes = to_hash_map(hash_required_files(artifact, &location));
            document.insert(
                artifact.key.clone(),
                VerificationRecord::new(&artifact.id, hashes, location),
            );
        }
        let store = VerificationStore::new(
            cache_root.join("model_verification.json"),
            Arc::new(UnixOwnership::current()),
        );
        store.save(&document).await.unwrap();
        cache_root
    }

    #[test]
    fn test_repository_not_installed() {
        let temp = TempDir::new().unwrap();
        let checker = checker(&temp, MockVcs::at(HEAD, HEAD), reachable());
        assert_eq!(checker.check_repository(), RepositoryStatus::NotInstalled);
    }

    #[test]
    fn test_repository_up_to_date() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("Zonos")).unwrap();
        let checker = checker(&temp, MockVcs::at(HEAD, HEAD), reachable());

        assert_eq!(
            checker.check_repository(),
            RepositoryStatus::UpToDate {
                commit: "01234567".to_string()
            }
        );
    }

    #[test]
    fn test_repository_update_available() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("Zonos")).unwrap();
        let checker = checker(&temp, MockVcs::at(HEAD, TIP), reachable());

        let status = checker.check_repository();
        assert!(status.needs_update());
        assert_eq!(
            status,
            RepositoryStatus::UpdateAvailable {
                current_commit: "01234567".to_string(),
                remote_commit: "fedcba98".to_string(),
                commits_behind: 3,
                latest_message: "Fix sampling".to_string(),
            }
        );
    }

    #[test]
    fn test_repository_partial_failures_degrade() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("Zonos")).unwrap();
        let vcs = MockVcs {
            behind: None,
            message: None,
            ..MockVcs::at(HEAD, TIP)
        };
        let checker = checker(&temp, vcs, reachable());

        match checker.check_repository() {
            RepositoryStatus::UpdateAvailable {
                commits_behind,
                latest_message,
                ..
            } => {
                assert_eq!(commits_behind, 0);
                assert_eq!(latest_message, "No message");
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[test]
    fn test_repository_error_preserves_message() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("Zonos")).unwrap();
        let vcs = MockVcs {
            remote: None,
            ..MockVcs::at(HEAD, TIP)
        };
        let checker = checker(&temp, vcs, reachable());

        let status = checker.check_repository();
        assert!(!status.needs_update());
        assert_eq!(
            status,
            RepositoryStatus::Error {
                message: "Could not determine commit status".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_models_not_downloaded() {
        let temp = TempDir::new().unwrap();
        let checker = checker(&temp, MockVcs::default(), reachable());
        assert_eq!(checker.check_models().await, ModelStatus::NotDownloaded);
    }

    #[tokio::test]
    async fn test_models_present_without_records() {
        let temp = TempDir::new().unwrap();
        let location = temp
            .path()
            .join("zonos_download_models/models--Zyphra--Zonos-v0.1-hybrid");
        std::fs::create_dir_all(&location).unwrap();
        std::fs::write(location.join("config.json"), "{}").unwrap();

        let checker = checker(&temp, MockVcs::default(), reachable());
        let status = checker.check_models().await;
        assert_eq!(status, ModelStatus::NoVerification);
        assert!(status.needs_update());
    }

    #[tokio::test]
    async fn test_models_up_to_date() {
        let temp = TempDir::new().unwrap();
        install_models(&temp).await;
        let checker = checker(&temp, MockVcs::default(), reachable());
        assert_eq!(checker.check_models().await, ModelStatus::UpToDate);
    }

    #[tokio::test]
    async fn test_models_issues_accumulate() {
        let temp = TempDir::new().unwrap();
        let cache_root = install_models(&temp).await;
        std::fs::write(
            cache_root.join("models--Zyphra--Zonos-v0.1-hybrid/model.safetensors"),
            "changed",
        )
        .unwrap();

        let fetcher = ProbeFetcher {
            unreachable: Some("Zyphra/Zonos-v0.1-transformer".to_string()),
            not_ready: false,
        };
        let checker = checker(&temp, MockVcs::default(), fetcher);

        let status = checker.check_models().await;
        assert!(status.needs_update());
        match status {
            ModelStatus::UpdatesAvailable { models } => {
                let reasons: Vec<_> = models.iter().map(|m| (m.model_id.as_str(), m.reason)).collect();
                assert_eq!(
                    reasons,
                    vec![
                        ("Zyphra/Zonos-v0.1-hybrid", IssueReason::VerificationFailed),
                        ("Zyphra/Zonos-v0.1-transformer", IssueReason::CheckFailed),
                    ]
                );
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_models_cannot_check() {
        let temp = TempDir::new().unwrap();
        install_models(&temp).await;
        let fetcher = ProbeFetcher {
            unreachable: None,
            not_ready: true,
        };
        let checker = checker(&temp, MockVcs::default(), fetcher);

        assert!(matches!(
            checker.check_models().await,
            ModelStatus::CannotCheck { .. }
        ));
    }

    #[tokio::test]
    async fn test_cache_root_is_a_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("zonos_download_models"), "oops").unwrap();
        let checker = checker(&temp, MockVcs::default(), reachable());
        assert!(matches!(checker.check_models().await, ModelStatus::Error { .. }));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(RepositoryStatus::NotInstalled).unwrap();
        assert_eq!(json["status"], "not_installed");

        let json = serde_json::to_value(ModelStatus::UpdatesAvailable {
            models: vec![ModelIssue {
                model_id: "a/b".to_string(),
                display_name: "B".to_string(),
                reason: IssueReason::CheckFailed,
            }],
        })
        .unwrap();
        assert_eq!(json["status"], "updates_available");
        assert_eq!(json["models"][0]["reason"], "check_failed");
    }
}
