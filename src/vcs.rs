//! Version control client for the cloned repository
//!
//! Drives the `git` CLI as a subprocess. Every call is independent: a failing
//! command is reported to the caller and never poisons later calls.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Operations the update subsystem needs from a repository
pub trait VersionControl: Send + Sync {
    /// Update remote-tracking refs
    fn fetch_remote(&self) -> Result<()>;

    /// Commit currently checked out
    fn current_ref(&self) -> Result<String>;

    /// Commit at the tip of the remote branch
    fn remote_ref(&self, branch: &str) -> Result<String>;

    /// Number of commits reachable from `to` but not from `from`
    fn commits_between(&self, from: &str, to: &str) -> Result<u64>;

    /// Subject line of the latest commit at `reference`
    fn latest_message(&self, reference: &str) -> Result<String>;

    /// Shelve local modifications
    fn stash(&self) -> Result<()>;

    /// Pull the remote branch into the working tree
    fn pull(&self, branch: &str) -> Result<()>;
}

/// `git` subprocess implementation
pub struct GitCli {
    repo_path: PathBuf,
    remote: String,
    binary: String,
}

impl GitCli {
    pub fn new(repo_path: PathBuf, remote: &str) -> Self {
        Self {
            repo_path,
            remote: remote.to_string(),
            binary: "git".to_string(),
        }
    }

    /// Use a specific git executable
    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn remote_branch(&self, branch: &str) -> String {
        format!("{}/{}", self.remote, branch)
    }

    /// Run git in the repository and return trimmed stdout
    fn run(&self, args: &[&str]) -> Result<String> {
        tracing::debug!(binary = %self.binary, args = ?args, "Executing command");

        let output = Command::new(&self.binary)
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| format!("Failed to run {} {}", self.binary, args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} {} exited with {}: {}",
                self.binary,
                args.join(" "),
                output.status,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl VersionControl for GitCli {
    fn fetch_remote(&self) -> Result<()> {
        self.run(&["fetch", &self.remote]).map(|_| ())
    }

    fn current_ref(&self) -> Result<String> {
        self.run(&["rev-parse", "HEAD"])
    }

    fn remote_ref(&self, branch: &str) -> Result<String> {
        self.run(&["rev-parse", &self.remote_branch(branch)])
    }

    fn commits_between(&self, from: &str, to: &str) -> Result<u64> {
        let range = format!("{}..{}", from, to);
        let count = self.run(&["rev-list", "--count", &range])?;
        count
            .parse()
            .with_context(|| format!("Unexpected rev-list output: {}", count))
    }

    fn latest_message(&self, reference: &str) -> Result<String> {
        self.run(&["log", "-1", "--pretty=format:%s", reference])
    }

    fn stash(&self) -> Result<()> {
        self.run(&["stash"]).map(|_| ())
    }

    fn pull(&self, branch: &str) -> Result<()> {
        self.run(&["pull", &self.remote, branch]).map(|_| ())
    }
}

/// Check whether an executable is reachable through PATH
pub fn command_exists(command: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(command).is_file())
}
