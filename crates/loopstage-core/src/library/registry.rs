//! In-memory character list reconciled against the persistent store
//!
//! The registry is the single source of truth for which characters exist.
//! Every mutation goes through the store first (or, for edits, right after
//! the runtime update) and keeps the decoded clip cache in step.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::manifest::AssetManifest;
use super::record::{AssetRef, Category, CharacterRecord, Phase};
use super::runtime::{materialize_image, ImageLocation, RuntimeCharacter};
use super::store::CharacterStore;
use super::{LibraryError, LibraryResult};
use crate::clip::{ClipSource, ClipStore};
use crate::db::DbError;

/// Display color of user-created characters
pub const CUSTOM_COLOR: &str = "#3b82f6";

/// How seeds are merged into the persisted library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Insert only seeds whose id is not stored yet
    Merge,
    /// Clear the store first, then insert every seed
    Reset,
}

/// Seeds whose id does not appear in `persisted`, in seed order
pub fn missing_seeds<'a>(
    seeds: &'a [CharacterRecord],
    persisted: &[CharacterRecord],
) -> Vec<&'a CharacterRecord> {
    let known: HashSet<&str> = persisted.iter().map(|r| r.id.as_str()).collect();
    seeds
        .iter()
        .filter(|seed| !known.contains(seed.id.as_str()))
        .collect()
}

/// Merge `seeds` into the store and return the full persisted list
pub async fn reconcile(
    store: &Arc<dyn CharacterStore>,
    seeds: Vec<CharacterRecord>,
    mode: ReconcileMode,
) -> LibraryResult<Vec<CharacterRecord>> {
    run_blocking(store, move |store| {
        if mode == ReconcileMode::Reset {
            log::info!("reconcile: reset requested, clearing stored characters");
            store.clear()?;
        }

        let persisted = store.load_all()?;
        let missing = missing_seeds(&seeds, &persisted);
        log::info!(
            "reconcile: {} stored, {} seeds, inserting {}",
            persisted.len(),
            seeds.len(),
            missing.len()
        );

        for seed in missing {
            let mut record = seed.clone();
            record.is_default = true;
            store.save(&record)?;
        }

        store.load_all()
    })
    .await
}

/// Run a store call on the blocking pool
async fn run_blocking<T, F>(store: &Arc<dyn CharacterStore>, f: F) -> LibraryResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn CharacterStore) -> Result<T, DbError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| LibraryError::Task(e.to_string()))?
        .map_err(LibraryError::from)
}

async fn read_asset(asset_root: &Path, path: &str) -> LibraryResult<Vec<u8>> {
    tokio::fs::read(asset_root.join(path))
        .await
        .map_err(|source| LibraryError::Asset {
            path: path.to_string(),
            source,
        })
}

/// The runtime character list and its clip cache
pub struct Registry {
    store: Arc<dyn CharacterStore>,
    clips: ClipStore,
    characters: Vec<RuntimeCharacter>,
    /// Where uploaded images are materialized
    image_dir: PathBuf,
}

impl Registry {
    pub fn new(store: Arc<dyn CharacterStore>, clips: ClipStore) -> Self {
        Self {
            store,
            clips,
            characters: Vec::new(),
            image_dir: std::env::temp_dir(),
        }
    }

    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = dir.into();
        self
    }

    pub fn clips(&self) -> &ClipStore {
        &self.clips
    }

    pub fn store(&self) -> &Arc<dyn CharacterStore> {
        &self.store
    }

    /// All characters in persisted order
    pub fn characters(&self) -> &[RuntimeCharacter] {
        &self.characters
    }

    pub fn get(&self, id: &str) -> Option<&RuntimeCharacter> {
        self.characters.iter().find(|c| c.id() == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Characters of one phase, in persisted order
    pub fn by_phase(&self, phase: Phase) -> impl Iterator<Item = &RuntimeCharacter> {
        self.characters
            .iter()
            .filter(move |c| c.record.phase == phase)
    }

    /// Reconcile the store with `seeds` and rebuild the runtime list
    ///
    /// Every character's clip is decoded before this returns.
    pub async fn load(
        &mut self,
        seeds: Vec<CharacterRecord>,
        mode: ReconcileMode,
    ) -> LibraryResult<usize> {
        let records = reconcile(&self.store, seeds, mode).await?;

        let mut characters = Vec::with_capacity(records.len());
        for record in records {
            characters.push(self.to_runtime(record).await);
        }
        self.characters = characters;

        log::info!("Registry::load: {} characters ready", self.characters.len());
        Ok(self.characters.len())
    }

    /// Materialize a persisted record and load its clip
    pub async fn to_runtime(&mut self, record: CharacterRecord) -> RuntimeCharacter {
        let image = self.materialize(&record.id, record.image.clone()).await;

        match &record.audio {
            Some(AssetRef::Path(path)) => {
                self.clips
                    .load(&record.id, ClipSource::Path(path.clone()))
                    .await;
            }
            Some(AssetRef::Data(bytes)) => {
                self.clips
                    .load(&record.id, ClipSource::Data(bytes.clone()))
                    .await;
            }
            None => log::warn!("Registry::to_runtime: {} has no audio", record.id),
        }

        RuntimeCharacter { record, image }
    }

    async fn materialize(&self, id: &str, image: Option<AssetRef>) -> Option<ImageLocation> {
        let dir = self.image_dir.clone();
        match tokio::task::spawn_blocking(move || materialize_image(&image, &dir)).await {
            Ok(Ok(location)) => location,
            Ok(Err(e)) => {
                log::error!("Registry: failed to write image for {}: {}", id, e);
                None
            }
            Err(e) => {
                log::error!("Registry: image task for {} failed: {}", id, e);
                None
            }
        }
    }

    /// Create a user character from uploaded image and audio bytes
    pub async fn add_custom(
        &mut self,
        name: &str,
        image: Vec<u8>,
        audio: Vec<u8>,
        phase: Phase,
    ) -> LibraryResult<&RuntimeCharacter> {
        self.insert_custom(name, image, audio, phase, Category::Voice, CUSTOM_COLOR)
            .await
    }

    /// Create a user character from a manifest entry's files
    ///
    /// Unlike startup loading, a missing or unreadable file is an error here.
    pub async fn add_from_library(
        &mut self,
        manifest: &AssetManifest,
        phase: Phase,
        name: &str,
    ) -> LibraryResult<&RuntimeCharacter> {
        let entry = manifest.find(phase, name).cloned().ok_or_else(|| {
            LibraryError::NotFound(format!("library entry '{}' in phase {}", name, phase))
        })?;

        let image = read_asset(self.clips.asset_root(), &entry.image).await?;
        let audio = read_asset(self.clips.asset_root(), &entry.sound).await?;

        self.insert_custom(
            &entry.name,
            image,
            audio,
            phase,
            entry.category.unwrap_or_default(),
            &entry.color,
        )
        .await
    }

    async fn insert_custom(
        &mut self,
        name: &str,
        image: Vec<u8>,
        audio: Vec<u8>,
        phase: Phase,
        category: Category,
        color: &str,
    ) -> LibraryResult<&RuntimeCharacter> {
        let record = CharacterRecord {
            id: self.unique_custom_id(chrono::Utc::now().timestamp_millis()),
            name: name.to_string(),
            category,
            color: color.to_string(),
            phase,
            image: Some(AssetRef::Data(image)),
            audio: Some(AssetRef::Data(audio)),
            is_default: false,
        };

        let to_save = record.clone();
        run_blocking(&self.store, move |store| store.save(&to_save)).await?;
        log::info!("Registry::add_custom: created {} ('{}')", record.id, record.name);

        let character = self.to_runtime(record).await;
        let index = self.characters.len();
        self.characters.push(character);
        Ok(&self.characters[index])
    }

    fn unique_custom_id(&self, millis: i64) -> String {
        let base = format!("custom_{}", millis);
        if !self.contains(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !self.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Rename a character and optionally replace its image and/or audio
    ///
    /// `None` keeps the current asset, both at runtime and in the store. The
    /// runtime copy is updated first; the stored copy follows and its
    /// failure is returned.
    pub async fn edit(
        &mut self,
        id: &str,
        name: &str,
        image: Option<Vec<u8>>,
        audio: Option<Vec<u8>>,
    ) -> LibraryResult<()> {
        let index = self
            .characters
            .iter()
            .position(|c| c.id() == id)
            .ok_or_else(|| LibraryError::NotFound(id.to_string()))?;

        let mut updated = self.characters[index].record.clone();
        updated.name = name.to_string();

        if let Some(bytes) = image {
            match self.materialize(id, Some(AssetRef::Data(bytes.clone()))).await {
                Some(location) => self.characters[index].image = Some(location),
                None => log::warn!("Registry::edit: keeping previous image for {}", id),
            }
            updated.image = Some(AssetRef::Data(bytes));
        }

        if let Some(bytes) = audio {
            self.clips.load(id, ClipSource::Data(bytes.clone())).await;
            updated.audio = Some(AssetRef::Data(bytes));
        }

        self.characters[index].record = updated.clone();

        run_blocking(&self.store, move |store| store.save(&updated)).await?;
        log::info!("Registry::edit: updated {}", id);
        Ok(())
    }
}
