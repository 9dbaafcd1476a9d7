//! Character library: records, seeds, manifest and the runtime registry

mod manifest;
mod record;
mod registry;
mod runtime;
mod seed;
mod store;

pub use manifest::{AssetManifest, ManifestEntry};
pub use record::{AssetRef, Category, CharacterRecord, Phase};
pub use registry::{missing_seeds, reconcile, ReconcileMode, Registry, CUSTOM_COLOR};
pub use runtime::{ImageLocation, RuntimeCharacter};
pub use seed::{builtin_seeds, manifest_seeds, SeedSource};
pub use store::CharacterStore;

use crate::db::DbError;

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] DbError),

    #[error("Character not found: {0}")]
    NotFound(String),

    #[error("Failed to read asset {path}: {source}")]
    Asset {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type LibraryResult<T> = Result<T, LibraryError>;
