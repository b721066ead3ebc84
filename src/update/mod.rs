//! Update checking and interactive refresh
//!
//! The checker produces independent repository and model reports, the
//! coordinator turns them into at most one operator question, and the
//! actions apply whatever was chosen.

pub mod actions;
pub mod checker;
pub mod coordinator;

pub use actions::{Refresher, UpdateActions};
pub use checker::{IssueReason, ModelIssue, ModelStatus, RepositoryStatus, UpdateChecker};
pub use coordinator::{CoordinatorState, Domain, UpdateChoice, UpdateCoordinator, UpdateReport};

use crate::prompt::Prompter;
use anyhow::Result;
use serde::Serialize;
use std::io::Write;

const RULE: &str = "============================================================";

/// Both reports from one check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateStatus {
    pub repository: RepositoryStatus,
    pub models: ModelStatus,
}

impl UpdateStatus {
    pub async fn check(checker: &UpdateChecker) -> Self {
        Self {
            repository: checker.check_repository(),
            models: checker.check_models().await,
        }
    }

    pub fn nothing_to_do(&self) -> bool {
        !self.repository.needs_update() && !self.models.needs_update()
    }
}

/// Human-readable status report
pub fn render_status<W: Write>(out: &mut W, status: &UpdateStatus) -> std::io::Result<()> {
    writeln!(out, "\n{}", RULE)?;
    writeln!(out, "ZONOS UPDATE CHECK")?;
    writeln!(out, "{}", RULE)?;

    writeln!(out, "\nREPOSITORY STATUS:")?;
    match &status.repository {
        RepositoryStatus::NotInstalled => writeln!(out, "  Repository not installed")?,
        RepositoryStatus::UpToDate { commit } => {
            writeln!(out, "  Repository is up to date (commit: {})", commit)?
        }
        RepositoryStatus::UpdateAvailable {
            current_commit,
            remote_commit,
            commits_behind,
            latest_message,
        } => {
            writeln!(out, "  Updates available!")?;
            writeln!(out, "     Current: {}", current_commit)?;
            writeln!(out, "     Latest:  {}", remote_commit)?;
            writeln!(out, "     Behind by: {} commits", commits_behind)?;
            writeln!(out, "     Latest change: {}", latest_message)?;
        }
        RepositoryStatus::Error { message } => {
            writeln!(out, "  Error checking repository: {}", message)?
        }
    }

    // The repository report alone decides whether models are worth showing
    if status.repository == RepositoryStatus::NotInstalled {
        return Ok(());
    }

    writeln!(out, "\nMODELS STATUS:")?;
    match &status.models {
        ModelStatus::NotDownloaded => writeln!(out, "  Models not downloaded")?,
        ModelStatus::NoVerification => {
            writeln!(out, "  Model files present but unverified")?
        }
        ModelStatus::UpToDate => writeln!(out, "  All models are current")?,
        ModelStatus::UpdatesAvailable { models } => {
            writeln!(out, "  Model updates may be available:")?;
            for model in models {
                writeln!(out, "     - {} ({})", model.display_name, model.reason)?;
            }
        }
        ModelStatus::CannotCheck { message } => {
            writeln!(out, "  Cannot check models: {}", message)?
        }
        ModelStatus::Error { message } => writeln!(out, "  Error checking models: {}", message)?,
    }

    if status.nothing_to_do() {
        writeln!(out, "\nEverything is up to date!")?;
    }
    Ok(())
}

/// Check both domains, print the report and let the operator choose
///
/// Returns `None` when the repository is not installed; nothing is asked then.
pub async fn run_update(
    checker: &UpdateChecker,
    prompter: &mut dyn Prompter,
    actions: &dyn UpdateActions,
) -> Result<Option<UpdateReport>> {
    tracing::info!("Checking for Zonos updates");
    let status = UpdateStatus::check(checker).await;

    let mut stdout = std::io::stdout().lock();
    render_status(&mut stdout, &status)?;
    drop(stdout);

    if status.repository == RepositoryStatus::NotInstalled {
        return Ok(None);
    }

    let report = UpdateCoordinator::new(prompter, actions)
        .run(status.repository.needs_update(), status.models.needs_update())
        .await?;

    tracing::info!(choice = ?report.choice, "Update check completed");
    Ok(Some(report))
}
