//! Zonos Manager - model and repository manager for Zonos installations
//!
//! Downloads the model artifacts a Zonos checkout needs, proves their
//! integrity with persisted SHA-256 records, and reconciles the cloned
//! repository and the artifacts with their upstream sources.

pub mod app;
pub mod config;
pub mod error;
pub mod launch;
pub mod models;
pub mod ownership;
pub mod prompt;
pub mod state;
pub mod uninstall;
pub mod update;
pub mod uv;
pub mod vcs;

pub use app::App;
pub use config::ManagerConfig;
pub use error::{ManagerError, ManagerResult};
pub use models::{Artifact, ArtifactRegistry, SyncOrchestrator, SyncOutcome};
pub use state::{VerificationDocument, VerificationRecord, VerificationStore};
pub use update::{ModelStatus, RepositoryStatus, UpdateChecker, UpdateCoordinator};
