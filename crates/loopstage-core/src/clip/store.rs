//! Process-wide cache of decoded clips keyed by character id

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use basedrop::Shared;

use super::{decode_clip, placeholder_tone, AudioClip, ClipError};
use crate::engine::gc_handle;

/// Where a clip's bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipSource {
    /// Path reference, resolved against the store's asset root
    Path(String),
    /// In-memory file contents (user upload)
    Data(Vec<u8>),
}

/// Outcome of `ClipStore::load`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipLoad {
    Decoded,
    Placeholder,
    AlreadyLoaded,
}

/// Cache of decoded clips
///
/// Entries are never evicted; they live as long as the store.
pub struct ClipStore {
    clips: HashMap<String, Shared<AudioClip>>,
    asset_root: PathBuf,
    sample_rate: u32,
}

impl ClipStore {
    /// Create a store that decodes everything to `sample_rate`
    pub fn new(asset_root: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self {
            clips: HashMap::new(),
            asset_root: asset_root.into(),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    /// Load and cache the clip for `id`
    ///
    /// Path sources are skipped when `id` is already cached; data sources
    /// always replace the cached clip. Any read or decode failure caches the
    /// placeholder tone instead, so a clip is always available afterwards.
    pub async fn load(&mut self, id: &str, source: ClipSource) -> ClipLoad {
        let (bytes, extension) = match source {
            ClipSource::Path(path) => {
                if self.clips.contains_key(id) {
                    log::debug!("ClipStore::load: {} already loaded", id);
                    return ClipLoad::AlreadyLoaded;
                }
                let resolved = self.asset_root.join(&path);
                let extension = resolved
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_ascii_lowercase());
                match tokio::fs::read(&resolved).await {
                    Ok(bytes) => (bytes, extension),
                    Err(e) => {
                        let err = ClipError::Io { path, source: e };
                        log::error!("ClipStore::load: error loading {}: {}", id, err);
                        return self.insert_placeholder(id);
                    }
                }
            }
            ClipSource::Data(bytes) => (bytes, None),
        };

        let sample_rate = self.sample_rate;
        let decoded = tokio::task::spawn_blocking(move || {
            decode_clip(bytes, extension.as_deref(), sample_rate)
        })
        .await;

        match decoded {
            Ok(Ok(clip)) => {
                log::info!(
                    "ClipStore::load: loaded {} ({:.2}s)",
                    id,
                    clip.duration()
                );
                self.clips
                    .insert(id.to_string(), Shared::new(&gc_handle(), clip));
                ClipLoad::Decoded
            }
            Ok(Err(e)) => {
                log::error!("ClipStore::load: error decoding {}: {}", id, e);
                self.insert_placeholder(id)
            }
            Err(e) => {
                log::error!("ClipStore::load: decode task for {} failed: {}", id, e);
                self.insert_placeholder(id)
            }
        }
    }

    fn insert_placeholder(&mut self, id: &str) -> ClipLoad {
        let clip = placeholder_tone(id, self.sample_rate);
        self.clips
            .insert(id.to_string(), Shared::new(&gc_handle(), clip));
        log::info!("ClipStore::load: generated placeholder tone for {}", id);
        ClipLoad::Placeholder
    }

    /// Cached clip for `id`, if loaded
    pub fn get(&self, id: &str) -> Option<&Shared<AudioClip>> {
        self.clips.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clips.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}
