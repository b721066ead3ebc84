//! Hash-based integrity verification of cached artifacts

use super::cache::{dir_size, effective_root, resolve_cache_path};
use super::registry::{Artifact, ArtifactRegistry};
use crate::state::VerificationDocument;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Read buffer for streaming hashes; memory use is bounded by this, not file size
const HASH_BUFFER_SIZE: usize = 8 * 1024;

/// Digest of one required file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHash {
    pub filename: String,
    pub digest: String,
}

/// Why an artifact did not verify
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum VerifyFailure {
    /// No directory for the artifact under the cache root
    NotFound,
    /// Files exist but nothing was ever recorded for them
    NoRecord,
    MissingFile(String),
    Unreadable(String),
    HashMismatch(String),
}

impl std::fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not downloaded"),
            Self::NoRecord => write!(f, "no verification record"),
            Self::MissingFile(name) => write!(f, "required file missing: {}", name),
            Self::Unreadable(name) => write!(f, "could not hash: {}", name),
            Self::HashMismatch(name) => write!(f, "hash mismatch: {}", name),
        }
    }
}

/// Compute the SHA-256 of a file as lowercase hex, streaming in fixed chunks
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash every required file present under `root`
///
/// Missing or unreadable files are left out; callers decide whether a partial
/// result is acceptable.
pub fn hash_required_files(artifact: &Artifact, root: &Path) -> Vec<FileHash> {
    artifact
        .required_files
        .iter()
        .filter_map(|name| {
            let path = root.join(name);
            match hash_file(&path) {
                Ok(digest) => Some(FileHash {
                    filename: name.clone(),
                    digest,
                }),
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Could not hash file");
                    None
                }
            }
        })
        .collect()
}

/// Collect file hashes into the map stored in a verification record
pub fn to_hash_map(hashes: Vec<FileHash>) -> BTreeMap<String, String> {
    hashes.into_iter().map(|h| (h.filename, h.digest)).collect()
}

/// Check an artifact against its stored record, reporting the first failure
pub fn check_artifact(
    artifact: &Artifact,
    cache_root: &Path,
    document: &VerificationDocument,
) -> Result<PathBuf, VerifyFailure> {
    let location = resolve_cache_path(&artifact.id, cache_root).ok_or(VerifyFailure::NotFound)?;
    let record = document.get(&artifact.key).ok_or(VerifyFailure::NoRecord)?;
    let root = effective_root(&location);

    for name in &artifact.required_files {
        let path = root.join(name);
        if !path.is_file() {
            return Err(VerifyFailure::MissingFile(name.clone()));
        }

        let current = hash_file(&path).map_err(|e| {
            tracing::debug!(path = ?path, error = %e, "Could not calculate hash");
            VerifyFailure::Unreadable(name.clone())
        })?;

        if record.hashes.get(name) != Some(&current) {
            return Err(VerifyFailure::HashMismatch(name.clone()));
        }
    }

    Ok(location)
}

/// True iff a record exists and every required file is present and matches it
pub fn verify_artifact(
    artifact: &Artifact,
    cache_root: &Path,
    document: &VerificationDocument,
) -> bool {
    match check_artifact(artifact, cache_root, document) {
        Ok(_) => {
            tracing::debug!(model_id = %artifact.id, "Model verification successful");
            true
        }
        Err(failure) => {
            tracing::debug!(model_id = %artifact.id, reason = %failure, "Model verification failed");
            false
        }
    }
}

/// Per-artifact outcome of a batch verification
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactVerification {
    pub model_id: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<VerifyFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl ArtifactVerification {
    pub fn is_verified(&self) -> bool {
        self.failure.is_none()
    }

    /// Files are on disk, but could not be verified
    pub fn is_unverified(&self) -> bool {
        matches!(&self.failure, Some(f) if *f != VerifyFailure::NotFound)
    }
}

/// Report-only verification of every artifact, no downloads
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub entries: Vec<ArtifactVerification>,
}

impl VerificationReport {
    pub fn all_verified(&self) -> bool {
        self.entries.iter().all(|e| e.is_verified())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ArtifactVerification> {
        self.entries.iter().filter(|e| !e.is_verified())
    }
}

/// Verify every registered artifact and collect the results
pub fn verify_all(
    registry: &ArtifactRegistry,
    cache_root: &Path,
    document: &VerificationDocument,
) -> VerificationReport {
    let entries = registry
        .iter()
        .map(|artifact| {
            tracing::info!(
                model_id = %artifact.id,
                name = %artifact.display_name,
                "Verifying model"
            );
            let result = check_artifact(artifact, cache_root, document);
            match &result {
                Ok(_) => tracing::info!(name = %artifact.display_name, "Verification successful"),
                Err(failure) => tracing::error!(
                    name = %artifact.display_name,
                    reason = %failure,
                    "Verification failed"
                ),
            }
            ArtifactVerification {
                model_id: artifact.id.clone(),
                display_name: artifact.display_name.clone(),
                size_bytes: result.as_ref().ok().map(|p| dir_size(p)),
                failure: result.err(),
            }
        })
        .collect();

    VerificationReport { entries }
}
