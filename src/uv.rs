//! Thin wrapper around the `uv` project tool

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Runs `uv` inside a project directory
#[derive(Debug, Clone)]
pub struct UvRunner {
    binary: PathBuf,
    project_dir: PathBuf,
}

impl UvRunner {
    pub fn new(binary: PathBuf, project_dir: PathBuf) -> Self {
        Self {
            binary,
            project_dir,
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.current_dir(&self.project_dir);
        cmd
    }

    /// Install project dependencies, optionally with an extra group
    pub async fn sync(&self, extra: Option<&str>) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("sync");
        if let Some(extra) = extra {
            cmd.arg("--extra").arg(extra);
        }
        tracing::info!(binary = ?self.binary, extra = ?extra, "Syncing dependencies");

        let status = cmd
            .status()
            .await
            .with_context(|| format!("Failed to run {:?} sync", self.binary))?;
        if !status.success() {
            anyhow::bail!("{:?} sync exited with {}", self.binary, status);
        }
        Ok(())
    }

    /// Run a script to completion with inherited stdio and return its exit code
    ///
    /// A child killed by a signal reports 1.
    pub async fn run_script(&self, script: &Path) -> Result<i32> {
        tracing::info!(script = ?script, "Launching");

        let status = self
            .command()
            .arg("run")
            .arg(script)
            .status()
            .await
            .with_context(|| format!("Failed to run {:?} run {:?}", self.binary, script))?;

        Ok(status.code().unwrap_or(1))
    }
}
