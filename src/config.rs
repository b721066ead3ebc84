//! Configuration structures and loading logic

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main manager configuration
///
/// Replaces process-wide globals: every component receives the paths it needs
/// from this struct at construction time.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    /// Directory holding the cloned repository and the models directory
    pub install_dir: PathBuf,
    pub repo_name: String,
    pub repo_url: String,
    pub remote: String,
    pub branch: String,
    /// Models directory name, relative to `install_dir`
    pub models_dir_name: String,
    /// Verification document file name, relative to the models directory
    pub verification_file: String,
    /// Interface discovery directory, relative to the repository
    pub interfaces_dir: String,

    #[serde(default = "default_uv_binary")]
    pub uv_binary: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            install_dir: default_install_dir(),
            repo_name: default_repo_name(),
            repo_url: default_repo_url(),
            remote: default_remote(),
            branch: default_branch(),
            models_dir_name: default_models_dir_name(),
            verification_file: default_verification_file(),
            interfaces_dir: default_interfaces_dir(),
            uv_binary: default_uv_binary(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content).context("Failed to parse TOML config")?
        } else {
            Self::default()
        };

        // Environment variable overrides
        if let Ok(install_dir) = std::env::var("ZONOS_MANAGER_INSTALL_DIR") {
            config.install_dir = PathBuf::from(install_dir);
        }
        if let Ok(models_dir) = std::env::var("ZONOS_MANAGER_MODELS_DIR") {
            config.models_dir_name = models_dir;
        }
        if let Ok(branch) = std::env::var("ZONOS_MANAGER_BRANCH") {
            config.branch = branch;
        }
        if let Ok(repo_url) = std::env::var("ZONOS_MANAGER_REPO_URL") {
            config.repo_url = repo_url;
        }

        Ok(config)
    }

    /// Per-user config file consulted when no `--config` is given
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("zonos-manager").join("config.toml"))
            .filter(|path| path.is_file())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("repo_name", &self.repo_name),
            ("models_dir_name", &self.models_dir_name),
            ("verification_file", &self.verification_file),
        ] {
            if value.is_empty() {
                anyhow::bail!("{} cannot be empty", field);
            }
            if value.contains('/') || value.contains('\\') {
                anyhow::bail!("{} '{}' cannot contain path separators", field, value);
            }
        }

        if self.branch.is_empty() || self.remote.is_empty() {
            anyhow::bail!("remote and branch must both be set");
        }

        Ok(())
    }

    /// Path of the cloned repository
    pub fn repo_path(&self) -> PathBuf {
        self.install_dir.join(&self.repo_name)
    }

    /// Cache root under which all artifacts live
    pub fn cache_root(&self) -> PathBuf {
        self.install_dir.join(&self.models_dir_name)
    }

    /// Path of the persisted verification document
    pub fn verification_path(&self) -> PathBuf {
        self.cache_root().join(&self.verification_file)
    }

    /// Directory scanned for launchable interfaces
    pub fn interfaces_path(&self) -> PathBuf {
        self.repo_path().join(&self.interfaces_dir)
    }

    /// `uv` executable; relative paths resolve against the repository, bare names go through PATH
    pub fn uv_path(&self) -> PathBuf {
        let binary = PathBuf::from(&self.uv_binary);
        if binary.is_relative() && binary.components().count() > 1 {
            self.repo_path().join(binary)
        } else {
            binary
        }
    }
}

// Default functions
fn default_install_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_repo_name() -> String {
    "Zonos".to_string()
}
fn default_repo_url() -> String {
    "https://github.com/Zyphra/Zonos.git".to_string()
}
fn default_remote() -> String {
    "origin".to_string()
}
fn default_branch() -> String {
    "main".to_string()
}
fn default_models_dir_name() -> String {
    "zonos_download_models".to_string()
}
fn default_verification_file() -> String {
    "model_verification.json".to_string()
}
fn default_interfaces_dir() -> String {
    "Gradio_InterfacePY_Types".to_string()
}
fn default_uv_binary() -> String {
    "./bin/uv".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.branch, "main");
        assert_eq!(config.remote, "origin");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_paths() {
        let config = ManagerConfig {
            install_dir: PathBuf::from("/opt/tts"),
            ..Default::default()
        };
        assert_eq!(config.repo_path(), PathBuf::from("/opt/tts/Zonos"));
        assert_eq!(
            config.cache_root(),
            PathBuf::from("/opt/tts/zonos_download_models")
        );
        assert_eq!(
            config.verification_path(),
            PathBuf::from("/opt/tts/zonos_download_models/model_verification.json")
        );
        assert_eq!(
            config.interfaces_path(),
            PathBuf::from("/opt/tts/Zonos/Gradio_InterfacePY_Types")
        );
    }

    #[test]
    fn test_uv_path_resolution() {
        let mut config = ManagerConfig {
            install_dir: PathBuf::from("/opt/zonos"),
            ..Default::default()
        };
        assert_eq!(config.uv_path(), PathBuf::from("/opt/zonos/Zonos/bin/uv"));

        config.uv_binary = "uv".to_string();
        assert_eq!(config.uv_path(), PathBuf::from("uv"));

        config.uv_binary = "/usr/local/bin/uv".to_string();
        assert_eq!(config.uv_path(), PathBuf::from("/usr/local/bin/uv"));
    }

    #[test]
    fn test_name_validation() {
        let config = ManagerConfig {
            models_dir_name: "models/nested".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ManagerConfig {
            repo_name: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manager.toml");
        std::fs::write(
            &path,
            "install_dir = \"/srv/zonos\"\nbranch = \"dev\"\n",
        )
        .unwrap();

        let config = ManagerConfig::load(Some(path)).unwrap();
        assert_eq!(config.install_dir, PathBuf::from("/srv/zonos"));
        assert_eq!(config.branch, "dev");
        // Unspecified fields fall back to defaults
        assert_eq!(config.repo_name, "Zonos");
        assert_eq!(config.uv_binary, "./bin/uv");
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        unsafe {
            std::env::set_var("ZONOS_MANAGER_INSTALL_DIR", "/tmp/zonos-env");
            std::env::set_var("ZONOS_MANAGER_BRANCH", "release");
        }

        let config = ManagerConfig::load(None).unwrap();

        unsafe {
            std::env::remove_var("ZONOS_MANAGER_INSTALL_DIR");
            std::env::remove_var("ZONOS_MANAGER_BRANCH");
        }

        assert_eq!(config.install_dir, PathBuf::from("/tmp/zonos-env"));
        assert_eq!(config.branch, "release");
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = ManagerConfig::load(Some(PathBuf::from("/nonexistent/manager.toml")));
        assert!(result.is_err());
    }
}
