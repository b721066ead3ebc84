//! Cache path resolution for downloaded model artifacts
//!
//! Artifacts may land in the cache root under several naming conventions,
//! depending on which tool downloaded them:
//! ```text
//! zonos_download_models/
//! ├── models--Zyphra--Zonos-v0.1-hybrid/     (hub layout)
//! │   ├── blobs/
//! │   ├── refs/main
//! │   └── snapshots/
//! │       └── {revision}/
//! │           ├── config.json
//! │           └── model.safetensors
//! ├── Zyphra--Zonos-v0.1-transformer/        (flattened)
//! ├── Zonos-v0.1-hybrid/                     (last segment only)
//! └── model_verification.json
//! ```

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Convert a model ID to hub cache directory name
///
/// e.g., "Zyphra/Zonos-v0.1-hybrid" -> "models--Zyphra--Zonos-v0.1-hybrid"
fn model_id_to_cache_name(model_id: &str) -> String {
    format!("models--{}", model_id.replace('/', "--"))
}

/// Convert a model ID to its flattened form
///
/// e.g., "Zyphra/Zonos-v0.1-hybrid" -> "Zyphra--Zonos-v0.1-hybrid"
fn model_id_to_flat_name(model_id: &str) -> String {
    model_id.replace('/', "--")
}

fn last_segment(model_id: &str) -> &str {
    model_id.rsplit('/').next().unwrap_or(model_id)
}

/// Candidate directory names, in lookup order
pub fn candidate_names(model_id: &str) -> [String; 3] {
    [
        model_id_to_cache_name(model_id),
        model_id_to_flat_name(model_id),
        last_segment(model_id).to_string(),
    ]
}

/// Resolve the on-disk directory holding an artifact
///
/// Tries the namespaced, flattened and last-segment forms in that order. If
/// none exist, falls back to the first immediate subdirectory (by name) whose
/// name contains the last segment of the identity.
pub fn resolve_cache_path(model_id: &str, cache_root: &Path) -> Option<PathBuf> {
    for name in candidate_names(model_id) {
        let path = cache_root.join(&name);
        if path.exists() {
            return Some(path);
        }
    }

    let needle = last_segment(model_id);
    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(cache_root)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();

    subdirs.into_iter().find(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().contains(needle))
            .unwrap_or(false)
    })
}

/// Directory that actually holds an artifact's files
///
/// Hub downloads keep files under `snapshots/{revision}/`; the most recently
/// modified snapshot is taken as current. Locations without snapshots are
/// returned unchanged.
pub fn effective_root(location: &Path) -> PathBuf {
    latest_snapshot(&location.join("snapshots")).unwrap_or_else(|| location.to_path_buf())
}

/// Pick the most recently modified subdirectory of a snapshots directory
fn latest_snapshot(snapshots_dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(snapshots_dir).ok()?;

    let mut candidates: Vec<(SystemTime, PathBuf)> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .map(|path| {
            let modified = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect();

    if candidates.len() > 1 {
        tracing::warn!(
            snapshots = candidates.len(),
            dir = ?snapshots_dir,
            "Multiple snapshots found, using the most recently modified"
        );
    }

    // Ties on mtime resolve by path so repeated calls agree
    candidates.sort();
    candidates.pop().map(|(_, path)| path)
}

/// Total size of the regular files under a directory
///
/// Symlinks are not followed, so hub snapshot links are not counted on top
/// of the blobs they point at.
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}
