//! Model artifact management
//!
//! Provides functionality for:
//! - The static registry of required model artifacts
//! - Locating artifacts under a cache root with ambiguous layouts
//! - Downloading artifacts from the HuggingFace Hub
//! - SHA-256 verification against persisted records
//! - Idempotent skip-or-download synchronization

pub mod cache;
pub mod download;
pub mod registry;
pub mod sync;
pub mod verify;

pub use cache::{dir_size, effective_root, resolve_cache_path};
pub use download::{ArtifactFetcher, HfHubFetcher};
pub use registry::{Artifact, ArtifactRegistry};
pub use sync::{SyncOrchestrator, SyncOutcome};
pub use verify::{
    ArtifactVerification, FileHash, VerificationReport, VerifyFailure, check_artifact, hash_file,
    verify_all, verify_artifact,
};
