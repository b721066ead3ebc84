//! Removal of everything the manager installed

use crate::config::ManagerConfig;
use crate::prompt::Prompter;
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

/// Answer required at the first confirmation
pub const FIRST_CONFIRMATION: &str = "yes";
/// Answer required at the second confirmation
pub const SECOND_CONFIRMATION: &str = "DELETE";

/// Leftover directories that ML libraries create next to the install
const LEFTOVER_DIRS: [&str; 3] = ["transformers", "datasets", ".cache"];

/// One path scheduled for removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalTarget {
    pub label: String,
    pub path: PathBuf,
}

impl RemovalTarget {
    fn new(label: &str, path: PathBuf) -> Self {
        Self {
            label: label.to_string(),
            path,
        }
    }
}

/// Paths removed by an uninstall, in removal order
///
/// `shared_cache` adds the per-user transformers cache under the home directory.
pub fn removal_targets(config: &ManagerConfig, shared_cache: bool) -> Vec<RemovalTarget> {
    let mut targets = vec![
        RemovalTarget::new("Repository", config.repo_path()),
        RemovalTarget::new("Models directory", config.cache_root()),
    ];
    for dir in LEFTOVER_DIRS {
        targets.push(RemovalTarget::new("Cache", config.install_dir.join(dir)));
    }
    if shared_cache && let Some(home) = dirs::home_dir() {
        targets.push(RemovalTarget::new(
            "Cache",
            home.join(".cache").join("huggingface").join("transformers"),
        ));
    }
    targets
}

/// Ask twice; anything but the exact expected answers cancels
pub fn confirm(prompter: &mut dyn Prompter, targets: &[RemovalTarget]) -> Result<bool> {
    println!("\nThe following will be permanently removed:");
    for target in targets {
        println!("  - {}: {}", target.label, target.path.display());
    }

    let first = prompter.ask(&format!(
        "Are you sure you want to uninstall Zonos? Type '{}' to continue",
        FIRST_CONFIRMATION
    ))?;
    if first.trim().to_lowercase() != FIRST_CONFIRMATION {
        tracing::info!("Uninstallation cancelled by user");
        return Ok(false);
    }

    let second = prompter.ask(&format!(
        "This cannot be undone. Type '{}' to confirm",
        SECOND_CONFIRMATION
    ))?;
    if second.trim() != SECOND_CONFIRMATION {
        tracing::info!("Uninstallation cancelled by user");
        return Ok(false);
    }
    Ok(true)
}

/// Result of an uninstall pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UninstallSummary {
    pub removed: Vec<PathBuf>,
    /// Targets that did not exist
    pub absent: Vec<PathBuf>,
    /// One entry per target that could not be removed
    pub errors: Vec<String>,
}

impl UninstallSummary {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Remove every target; a failure is recorded and the pass continues
pub fn uninstall(targets: &[RemovalTarget]) -> UninstallSummary {
    tracing::info!(targets = targets.len(), "Starting uninstallation");
    let mut summary = UninstallSummary::default();

    for target in targets {
        let path = &target.path;
        let metadata = match std::fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(_) => {
                tracing::info!(label = %target.label, path = ?path, "Not found, already removed");
                summary.absent.push(path.clone());
                continue;
            }
        };

        let result = if metadata.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };

        match result {
            Ok(()) => {
                tracing::info!(label = %target.label, path = ?path, "Removed");
                summary.removed.push(path.clone());
            }
            Err(e) => {
                tracing::error!(label = %target.label, path = ?path, error = %e, "Failed to remove");
                summary
                    .errors
                    .push(format!("{} {}: {}", target.label, path.display(), e));
            }
        }
    }

    if summary.is_clean() {
        tracing::info!("Uninstallation completed successfully");
    } else {
        tracing::warn!(errors = summary.errors.len(), "Uninstallation completed with errors");
    }
    summary
}
