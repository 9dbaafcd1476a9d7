//! Static asset manifest: the library of characters shipped per phase
//!
//! The manifest is read once at startup. It seeds the registry and backs
//! "pick from library" requests; it is never mutated at runtime.
//!
//! YAML form (phase numbers as keys):
//!
//! ```yaml
//! 1:
//!   - name: Oren
//!     image: personagens/1/Oren.png
//!     sound: personagens/1/Oren_Kick.wav
//!     color: "#f97316"
//!     category: beat
//! 2: []
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::record::{Category, Phase};

/// One library entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    /// Image path relative to the asset root
    pub image: String,
    /// Audio path relative to the asset root
    pub sound: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl ManifestEntry {
    fn new(name: &str, image: &str, sound: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            sound: sound.to_string(),
            color: color.to_string(),
            category: None,
        }
    }
}

/// Phase number → library entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest {
    phases: BTreeMap<u8, Vec<ManifestEntry>>,
}

impl AssetManifest {
    pub fn new(phases: BTreeMap<u8, Vec<ManifestEntry>>) -> Self {
        Self { phases }
    }

    /// The library that ships with the application
    pub fn builtin() -> Self {
        let phase_one = vec![
            ManifestEntry::new("Black", "personagens/1/Black.png", "personagens/1/Black.wav", "#1f2937"),
            ManifestEntry::new("Clukr", "personagens/1/Clukr.png", "personagens/1/Clukr.wav", "#94a3b8"),
            ManifestEntry::new("Garnold", "personagens/1/Garnold.png", "personagens/1/Garnold.wav", "#eab308"),
            ManifestEntry::new("Grey", "personagens/1/Grey.png", "personagens/1/Grey.wav", "#475569"),
            ManifestEntry::new("Lario", "personagens/1/Lario.png", "personagens/1/Lario.wav", "#ef4444"),
            ManifestEntry::new(
                "Mr Fun Computer",
                "personagens/1/Mr_Fun_Computer.png",
                "personagens/1/Mr_Fun_Computer.wav",
                "#3b82f6",
            ),
            ManifestEntry::new("Oren", "personagens/1/Oren.png", "personagens/1/Oren_Kick.wav", "#f97316"),
            ManifestEntry::new(
                "Qipqqtppsgskkskk",
                "personagens/1/Qipqqtppsgskkskk.png",
                "personagens/1/Qipqqtppsgskkskk.wav",
                "#8b5cf6",
            ),
            ManifestEntry::new("Sky", "personagens/1/Sky.png", "personagens/1/Sky.wav", "#0ea5e9"),
            ManifestEntry::new("Rebel", "personagens/1/rebel.png", "personagens/1/rebel.wav", "#dc2626"),
        ];
        let phase_two = vec![
            ManifestEntry::new(
                "Clukr (Phase 2)",
                "personagens/2/Clukr_fase2.png",
                "personagens/2/Cluckr_fase2.wav",
                "#334155",
            ),
            ManifestEntry::new("Dr Theodore", "personagens/2/Dr_Theodore.png", "personagens/2/Dr_Theodore.wav", "#1e1b4b"),
            ManifestEntry::new("El Cool P", "personagens/2/El_Cool_P.png", "personagens/2/El_Cool_P.wav", "#1e293b"),
            ManifestEntry::new("Executive", "personagens/2/Executive.png", "personagens/2/Executive.wav", "#581c87"),
            ManifestEntry::new(
                "Grey (Phase 2)",
                "personagens/2/Grey_fase2.png",
                "personagens/2/Gray_fase2.wav",
                "#4c1d95",
            ),
            ManifestEntry::new("Lobotomy Man", "personagens/2/Lobotomy_Man.png", "personagens/2/Lobotomy_Man.wav", "#b91c1c"),
        ];

        let mut phases = BTreeMap::new();
        phases.insert(1, phase_one);
        phases.insert(2, phase_two);
        Self { phases }
    }

    /// Load a manifest from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {:?}", path))?;
        let manifest: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse manifest: {:?}", path))?;
        log::info!(
            "AssetManifest::load: {} entries from {:?}",
            manifest.phases.values().map(Vec::len).sum::<usize>(),
            path
        );
        Ok(manifest)
    }

    /// Entries available for `phase` (empty when the phase has none)
    pub fn library_characters(&self, phase: Phase) -> &[ManifestEntry] {
        self.phases
            .get(&phase.number())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entry with exactly `name` in `phase`
    pub fn find(&self, phase: Phase, name: &str) -> Option<&ManifestEntry> {
        self.library_characters(phase).iter().find(|e| e.name == name)
    }

    /// Every (phase, entry) pair in phase order; unknown phase keys are skipped
    pub fn entries(&self) -> impl Iterator<Item = (Phase, &ManifestEntry)> {
        self.phases.iter().filter_map(|(number, entries)| {
            Phase::try_from(*number)
                .ok()
                .map(|phase| entries.iter().map(move |e| (phase, e)))
        })
        .flatten()
    }

    /// SHA-256 over the manifest content, in phase then entry order
    ///
    /// Persisted across runs to notice that the shipped library changed
    /// shape, so it must not depend on the toolchain.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (phase, entries) in &self.phases {
            hasher.update(format!("phase {}\n", phase).as_bytes());
            for entry in entries {
                for field in [&entry.name, &entry.image, &entry.sound, &entry.color] {
                    hasher.update(field.as_bytes());
                    hasher.update(b"\t");
                }
                hasher.update(entry.category.map_or("", |c| c.as_str()).as_bytes());
                hasher.update(b"\n");
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_library_sizes() {
        let manifest = AssetManifest::builtin();
        assert_eq!(manifest.library_characters(Phase::One).len(), 10);
        assert_eq!(manifest.library_characters(Phase::Two).len(), 6);
        assert_eq!(manifest.entries().count(), 16);
    }

    #[test]
    fn test_find_by_exact_name() {
        let manifest = AssetManifest::builtin();
        let entry = manifest.find(Phase::One, "Oren").unwrap();
        assert_eq!(entry.sound, "personagens/1/Oren_Kick.wav");
        assert!(manifest.find(Phase::Two, "Oren").is_none());
        assert!(manifest.find(Phase::One, "oren").is_none());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = AssetManifest::builtin();
        let mut phases = a.phases.clone();
        phases.get_mut(&2).unwrap().pop();
        let b = AssetManifest::new(phases);

        assert_eq!(a.fingerprint(), AssetManifest::builtin().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_is_a_fixed_digest() {
        // Pinned so a marker written by one build still matches the next
        let empty = AssetManifest::new(BTreeMap::new());
        assert_eq!(
            empty.fingerprint(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        let mut phases = BTreeMap::new();
        phases.insert(1, Vec::new());
        let one = AssetManifest::new(phases);
        let expected = format!("{:x}", Sha256::digest(b"phase 1\n"));
        assert_eq!(one.fingerprint(), expected);
        assert_eq!(one.fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_sees_category_change() {
        let a = AssetManifest::builtin();
        let mut phases = a.phases.clone();
        let entry = &mut phases.get_mut(&1).unwrap()[0];
        entry.category = match entry.category {
            Some(Category::Beat) => Some(Category::Voice),
            _ => Some(Category::Beat),
        };
        assert_ne!(a.fingerprint(), AssetManifest::new(phases).fingerprint());
    }

    #[test]
    fn test_load_yaml() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("manifest.yaml");
        std::fs::write(
            &path,
            r##"
1:
  - name: Oren
    image: personagens/1/Oren.png
    sound: personagens/1/Oren_Kick.wav
    color: "#f97316"
    category: beat
2: []
"##,
        )
        .unwrap();

        let manifest = AssetManifest::load(&path).unwrap();
        let entry = manifest.find(Phase::One, "Oren").unwrap();
        assert_eq!(entry.category, Some(Category::Beat));
        assert!(manifest.library_characters(Phase::Two).is_empty());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let temp = tempfile::tempdir().unwrap();
        assert!(AssetManifest::load(&temp.path().join("nope.yaml")).is_err());
    }
}
