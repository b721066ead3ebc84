//! Static table of known model artifacts and the files each must provide

use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;

/// Files every Zonos checkpoint publishes on the hub
const ZONOS_REQUIRED_FILES: [&str; 2] = ["config.json", "model.safetensors"];

/// A named, verifiable unit of downloaded model data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Hub identity (e.g., "Zyphra/Zonos-v0.1-hybrid")
    pub id: String,
    /// Stable key under which the verification record is stored
    pub key: String,
    /// Human-readable name used in reports
    pub display_name: String,
    /// Files that must be present, in check order, without duplicates
    pub required_files: Vec<String>,
}

impl Artifact {
    /// Create a new artifact, dropping repeated file names while keeping order
    pub fn new(id: &str, key: &str, display_name: &str, required_files: &[&str]) -> Self {
        let mut seen = HashSet::new();
        let required_files = required_files
            .iter()
            .filter(|f| seen.insert(**f))
            .map(|f| f.to_string())
            .collect();

        Self {
            id: id.to_string(),
            key: key.to_string(),
            display_name: display_name.to_string(),
            required_files,
        }
    }

    /// Last path segment of the identity ("Org/Name" -> "Name")
    pub fn name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }
}

/// Ordered, immutable registry of artifacts
#[derive(Debug, Clone)]
pub struct ArtifactRegistry {
    artifacts: Vec<Artifact>,
}

impl ArtifactRegistry {
    /// Build a registry, rejecting duplicate ids/keys and artifacts with no files
    pub fn new(artifacts: Vec<Artifact>) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut keys = HashSet::new();

        for artifact in &artifacts {
            if artifact.id.is_empty() || artifact.key.is_empty() {
                anyhow::bail!("Artifact id and key cannot be empty");
            }
            if artifact.required_files.is_empty() {
                anyhow::bail!("Artifact '{}' has no required files", artifact.id);
            }
            if !ids.insert(artifact.id.as_str()) {
                anyhow::bail!("Duplicate artifact id: {}", artifact.id);
            }
            if !keys.insert(artifact.key.as_str()) {
                anyhow::bail!("Duplicate artifact key: {}", artifact.key);
            }
        }

        Ok(Self { artifacts })
    }

    /// The Zonos v0.1 checkpoints
    pub fn zonos() -> Self {
        Self {
            artifacts: vec![
                Artifact::new(
                    "Zyphra/Zonos-v0.1-hybrid",
                    "hybrid_model",
                    "Zonos v0.1 Hybrid Model",
                    &ZONOS_REQUIRED_FILES,
                ),
                Artifact::new(
                    "Zyphra/Zonos-v0.1-transformer",
                    "transformer_model",
                    "Zonos v0.1 Transformer Model",
                    &ZONOS_REQUIRED_FILES,
                ),
            ],
        }
    }

    /// Iterate artifacts in registry order
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    /// Look up an artifact by hub identity
    pub fn get(&self, id: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.id == id)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl Default for ArtifactRegistry {
    fn default() -> Self {
        Self::zonos()
    }
}
