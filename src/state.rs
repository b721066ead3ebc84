//! Persistence of model verification records

use crate::ownership::OwnershipEnforcer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

// ============================================================================
// Trait Definitions
// ============================================================================

/// Trait for storage backend operations
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Save content to a file path atomically
    async fn save(&self, path: &Path, content: &str) -> Result<()>;

    /// Load content from a file path
    /// Returns None if file doesn't exist
    async fn load(&self, path: &Path) -> Result<Option<String>>;

    /// Remove a file; missing files are not an error
    async fn remove(&self, path: &Path) -> Result<()>;
}

// ============================================================================
// Production Implementation
// ============================================================================

/// Production storage backend using tokio::fs
pub struct FileSystemStorage;

impl FileSystemStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FileSystemStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for FileSystemStorage {
    async fn save(&self, path: &Path, content: &str) -> Result<()> {
        // Atomic write: write to temp file, then rename
        let temp_file = path.with_extension("tmp");

        let mut file = fs::File::create(&temp_file)
            .await
            .context("Failed to create temp verification file")?;
        file.write_all(content.as_bytes())
            .await
            .context("Failed to write verification file")?;
        file.sync_all()
            .await
            .context("Failed to sync verification file")?;

        fs::rename(&temp_file, path)
            .await
            .context("Failed to rename temp verification file")?;

        Ok(())
    }

    async fn load(&self, path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read verification file: {:?}", path))?;

        Ok(Some(content))
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove verification file: {:?}", path))
            }
        }
    }
}

// ============================================================================
// Records
// ============================================================================

const DOWNLOAD_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Hash manifest proving an artifact matched at its last successful sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// filename -> lowercase hex SHA-256
    pub hashes: BTreeMap<String, String>,
    /// Hub identity of the artifact
    pub model_name: String,
    /// Local time of the download, ISO-8601
    ///
    /// Kept as written; other writers may add an offset and verification
    /// never reads it.
    pub download_time: String,
    /// Location the artifact resolved to when recorded
    pub cache_path: PathBuf,
}

impl VerificationRecord {
    pub fn new(model_name: &str, hashes: BTreeMap<String, String>, cache_path: PathBuf) -> Self {
        Self {
            hashes,
            model_name: model_name.to_string(),
            download_time: chrono::Local::now()
                .naive_local()
                .format(DOWNLOAD_TIME_FORMAT)
                .to_string(),
            cache_path,
        }
    }
}

/// Artifact key -> record. Loaded and written as a single document.
pub type VerificationDocument = BTreeMap<String, VerificationRecord>;

/// Parse a document, keeping every well-formed record
///
/// Entries missing required fields are dropped so the artifact reads as
/// unverified. Non-object documents yield an empty mapping.
pub fn parse_document(content: &str) -> Result<VerificationDocument> {
    let raw: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(content).context("Verification document is not a JSON object")?;

    let mut document = VerificationDocument::new();
    for (key, value) in raw {
        match serde_json::from_value::<VerificationRecord>(value) {
            Ok(record) => {
                document.insert(key, record);
            }
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Ignoring malformed verification record");
            }
        }
    }

    Ok(document)
}

// ============================================================================
// Verification Store with Dependency Injection
// ============================================================================

/// Persisted artifact -> verification record mapping
pub struct VerificationStore {
    path: PathBuf,
    storage: Arc<dyn StorageBackend>,
    ownership: Arc<dyn OwnershipEnforcer>,
}

impl VerificationStore {
    /// Create a new store with custom storage backend
    pub fn new_with_storage(
        path: PathBuf,
        storage: Arc<dyn StorageBackend>,
        ownership: Arc<dyn OwnershipEnforcer>,
    ) -> Self {
        Self {
            path,
            storage,
            ownership,
        }
    }

    /// Create a new store with default filesystem storage
    pub fn new(path: PathBuf, ownership: Arc<dyn OwnershipEnforcer>) -> Self {
        Self::new_with_storage(path, Arc::new(FileSystemStorage::new()), ownership)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document
    ///
    /// Never fails: a missing, empty, unreadable or malformed document is
    /// treated as holding no records.
    pub async fn load(&self) -> VerificationDocument {
        let content = match self.storage.load(&self.path).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                tracing::debug!(path = ?self.path, "No verification file found");
                return VerificationDocument::new();
            }
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Could not read verification data");
                return VerificationDocument::new();
            }
        };

        if content.trim().is_empty() {
            tracing::warn!(path = ?self.path, "Verification file is empty");
            return VerificationDocument::new();
        }

        match parse_document(&content) {
            Ok(document) => {
                tracing::debug!(
                    path = ?self.path,
                    records = document.len(),
                    "Verification data loaded"
                );
                document
            }
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Could not load verification data");
                VerificationDocument::new()
            }
        }
    }

    /// Replace the full document, then normalize its ownership
    pub async fn save(&self, document: &VerificationDocument) -> Result<()> {
        let content = serde_json::to_string_pretty(document)
            .context("Failed to serialize verification data")?;

        self.storage.save(&self.path, &content).await?;
        self.ownership.apply_file(&self.path);

        tracing::debug!(path = ?self.path, records = document.len(), "Verification data saved");
        Ok(())
    }

    /// Delete the document so every artifact reads as unverified
    pub async fn remove(&self) -> Result<()> {
        self.storage.remove(&self.path).await?;
        tracing::info!(path = ?self.path, "Removed verification data");
        Ok(())
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================
