//! Soundboard: startup wiring and the operations a UI host calls
//!
//! Owns the registry (characters and their clips), the stage (slots and the
//! sync engine) and, when started against a device, the audio output.
//! Hosts drive it through plain method calls and observe it through
//! `subscribe()`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use crossbeam::channel::Receiver;

use crate::audio::{start_output, OutputHandle};
use crate::clip::ClipStore;
use crate::config::SoundboardConfig;
use crate::db::CharacterDb;
use crate::engine::{command_channel, AudioClock, CommandSender, SampleClock, SyncEngine, SyncState};
use crate::library::{
    builtin_seeds, manifest_seeds, AssetManifest, CharacterRecord, CharacterStore, LibraryError,
    LibraryResult, ManifestEntry, Phase, ReconcileMode, Registry, RuntimeCharacter, SeedSource,
};
use crate::stage::{Stage, StageError, StageEvent};

pub struct Soundboard<C: AudioClock> {
    config: SoundboardConfig,
    manifest: AssetManifest,
    registry: Registry,
    stage: Stage<C>,
    /// Present when started against a real device
    output: Option<OutputHandle>,
}

impl Soundboard<SampleClock> {
    /// Open the database and the audio device, then load every character
    ///
    /// Failing to open either is fatal. The device's sample rate drives the
    /// clip cache and the engine clock.
    pub async fn start(config: SoundboardConfig) -> anyhow::Result<Self> {
        let config = config.sanitized();

        let data_dir = config.data_dir.clone();
        let db = tokio::task::spawn_blocking(move || CharacterDb::open(data_dir))
            .await
            .context("Database open task failed")?
            .with_context(|| format!("Failed to open character database in {:?}", config.data_dir))?;

        let (commands, consumer) = command_channel();
        let output = start_output(&config.audio, consumer).context("Failed to start audio output")?;
        let clock = output.clock();

        let mut board = Self::with_parts(config, db, clock, commands).await?;
        board.output = Some(output);
        Ok(board)
    }
}

impl<C: AudioClock> Soundboard<C> {
    /// Start against an already opened store and an externally driven clock
    ///
    /// `commands` must feed whatever renders the audio (a `LoopMixer`).
    pub async fn with_parts(
        config: SoundboardConfig,
        store: Arc<dyn CharacterStore>,
        clock: C,
        commands: CommandSender,
    ) -> anyhow::Result<Self> {
        let config = config.sanitized();

        let manifest = match &config.manifest_path {
            Some(path) => AssetManifest::load(path)?,
            None => AssetManifest::builtin(),
        };

        let (seeds, fingerprint) = seeds_for(config.seed_source, &manifest);
        let marker_path = config.seed_marker_path();
        let stored = read_marker(&marker_path).await?;

        let mode = choose_reconcile_mode(stored.as_deref(), &fingerprint);
        log::info!(
            "Soundboard: {} seeds from {:?}, reconcile mode {:?}",
            seeds.len(),
            config.seed_source,
            mode
        );

        let clips = ClipStore::new(&config.asset_root, clock.sample_rate());
        let mut registry = Registry::new(store, clips);
        registry
            .load(seeds, mode)
            .await
            .context("Failed to load characters")?;

        write_marker(&marker_path, &fingerprint).await?;

        let mut engine = SyncEngine::with_timing(
            clock,
            commands,
            config.loop_period,
            config.safety_margin,
        );
        engine.set_volume(config.audio.master_volume);

        Ok(Self {
            config,
            manifest,
            registry,
            stage: Stage::new(engine),
            output: None,
        })
    }

    pub fn config(&self) -> &SoundboardConfig {
        &self.config
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    pub fn output(&self) -> Option<&OutputHandle> {
        self.output.as_ref()
    }

    pub fn sync_state(&self) -> &SyncState {
        self.stage.engine().state()
    }

    pub fn subscribe(&mut self) -> Receiver<StageEvent> {
        self.stage.subscribe()
    }

    // Stage

    /// Put a known character in `slot` and start its loop on the next bar
    pub fn assign(&mut self, slot: usize, id: &str) -> Result<Option<f64>, StageError> {
        if !self.registry.contains(id) {
            return Err(StageError::UnknownCharacter(id.to_string()));
        }
        self.stage.assign(slot, id, self.registry.clips())
    }

    pub fn remove(&mut self, slot: usize) -> Result<Option<String>, StageError> {
        self.stage.remove(slot)
    }

    pub fn stop_all(&mut self) {
        self.stage.stop_all();
    }

    pub fn is_assigned(&self, id: &str) -> bool {
        self.stage.is_assigned(id)
    }

    pub fn slots(&self) -> &[Option<String>] {
        self.stage.slots()
    }

    pub fn phase(&self) -> Phase {
        self.stage.phase()
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.stage.set_phase(phase);
    }

    pub fn toggle_phase(&mut self) -> Phase {
        self.stage.toggle_phase()
    }

    // Library

    /// Characters of the current phase, in library order
    pub fn picker(&self) -> Vec<&RuntimeCharacter> {
        self.registry.by_phase(self.stage.phase()).collect()
    }

    pub fn characters(&self) -> &[RuntimeCharacter] {
        self.registry.characters()
    }

    pub fn character(&self, id: &str) -> Option<&RuntimeCharacter> {
        self.registry.get(id)
    }

    /// Manifest entries offered for the current phase
    pub fn library(&self) -> &[ManifestEntry] {
        self.manifest.library_characters(self.stage.phase())
    }

    pub async fn add_custom(
        &mut self,
        name: &str,
        image: Vec<u8>,
        audio: Vec<u8>,
        phase: Phase,
    ) -> LibraryResult<&RuntimeCharacter> {
        let id = self
            .registry
            .add_custom(name, image, audio, phase)
            .await?
            .id()
            .to_string();
        self.added(id)
    }

    /// Copy a manifest entry into a new custom character
    pub async fn add_from_library(
        &mut self,
        phase: Phase,
        name: &str,
    ) -> LibraryResult<&RuntimeCharacter> {
        let id = self
            .registry
            .add_from_library(&self.manifest, phase, name)
            .await?
            .id()
            .to_string();
        self.added(id)
    }

    fn added(&mut self, id: String) -> LibraryResult<&RuntimeCharacter> {
        self.stage.publish(StageEvent::CharacterAdded(id.clone()));
        self.registry
            .get(&id)
            .ok_or(LibraryError::NotFound(id))
    }

    /// Rename a character and optionally replace its image and/or audio
    ///
    /// New audio silences the old loop first; if the character is on stage
    /// it comes back on the next bar with the new clip.
    pub async fn edit(
        &mut self,
        id: &str,
        name: &str,
        image: Option<Vec<u8>>,
        audio: Option<Vec<u8>>,
    ) -> LibraryResult<()> {
        if !self.registry.contains(id) {
            return Err(LibraryError::NotFound(id.to_string()));
        }

        let new_audio = audio.is_some();
        if new_audio {
            self.stage.silence(id);
        }

        let result = self.registry.edit(id, name, image, audio).await;

        if new_audio {
            self.stage.resume(id, self.registry.clips());
        }
        self.stage
            .publish(StageEvent::CharacterUpdated(id.to_string()));
        result
    }

    /// Tell subscribers a host wants to edit `id`
    pub fn request_edit(&mut self, id: &str) -> Result<(), StageError> {
        let record: &CharacterRecord = self
            .registry
            .get(id)
            .map(|c| &c.record)
            .ok_or_else(|| StageError::UnknownCharacter(id.to_string()))?;

        let event = StageEvent::EditRequested {
            id: record.id.clone(),
            name: record.name.clone(),
            phase: record.phase,
        };
        self.stage.publish(event);
        Ok(())
    }
}

/// Seed records for `source` and the fingerprint identifying that seed set
fn seeds_for(source: SeedSource, manifest: &AssetManifest) -> (Vec<CharacterRecord>, String) {
    match source {
        SeedSource::Manifest => (
            manifest_seeds(manifest),
            format!("manifest:{}", manifest.fingerprint()),
        ),
        SeedSource::Builtin => (builtin_seeds(), "builtin".to_string()),
    }
}

/// Reset only when the seed set changed since the last run
///
/// Without a marker there is nothing to compare against, so existing
/// records (custom characters included) are kept and seeds merged in.
fn choose_reconcile_mode(stored: Option<&str>, current: &str) -> ReconcileMode {
    match stored {
        Some(previous) if previous != current => ReconcileMode::Reset,
        _ => ReconcileMode::Merge,
    }
}

async fn read_marker(path: &Path) -> anyhow::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read seed marker {:?}", path)),
    }
}

/// Startup fails rather than run without a marker the next start can trust
async fn write_marker(path: &Path, fingerprint: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    tokio::fs::write(path, fingerprint)
        .await
        .with_context(|| format!("Failed to write seed marker {:?}", path))
}
