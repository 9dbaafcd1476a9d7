//! Default characters written into an empty (or reset) library

use super::manifest::AssetManifest;
use super::record::{Category, CharacterRecord, Phase};

/// Where the default character set comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedSource {
    /// One default per asset manifest entry
    #[default]
    Manifest,
    /// The fixed built-in cast
    Builtin,
}

/// The built-in cast: seven phase 1 characters and their phase 2 variants
pub fn builtin_seeds() -> Vec<CharacterRecord> {
    use Category::*;
    use Phase::*;

    let img = |name: &str| format!("assets/images/{}_placeholder.png", name);
    let snd = |file: &str| format!("assets/audio/{}.mp3", file);

    vec![
        CharacterRecord::seeded("oren", "Oren", Beat, One, "#f97316", img("oren"), snd("oren_beat")),
        CharacterRecord::seeded("clukr", "Clukr", Beat, One, "#94a3b8", img("clukr"), snd("clukr_beat")),
        CharacterRecord::seeded("gray", "Gray", Effect, One, "#475569", img("gray"), snd("gray_bass")),
        CharacterRecord::seeded("sky", "Sky", Melody, One, "#0ea5e9", img("sky"), snd("sky_melody")),
        CharacterRecord::seeded("lime", "Lime", Melody, One, "#84cc16", img("lime"), snd("lime_melody")),
        CharacterRecord::seeded("garnold", "Garnold", Effect, One, "#eab308", img("garnold"), snd("garnold_effect")),
        CharacterRecord::seeded("owakcx", "Owakcx", Voice, One, "#8b5cf6", img("owakcx"), snd("owakcx_voice")),
        CharacterRecord::seeded("skel_oren", "Skel-OREN", Beat, Two, "#cbd5e1", img("oren"), snd("oren_beat")),
        CharacterRecord::seeded("skel_clukr", "Ghoul-Clukr", Beat, Two, "#334155", img("clukr"), snd("clukr_beat")),
        CharacterRecord::seeded("skel_gray", "Grim Gray", Effect, Two, "#7e22ce", img("gray"), snd("gray_bass")),
        CharacterRecord::seeded("skel_sky", "Spirit Sky", Melody, Two, "#ef4444", img("sky"), snd("sky_melody")),
        CharacterRecord::seeded("skel_owakcx", "Phantom Owakcx", Voice, Two, "#18181b", img("owakcx"), snd("owakcx_voice")),
    ]
}

/// One default record per manifest entry, with ids `p<phase>_<slug>`
pub fn manifest_seeds(manifest: &AssetManifest) -> Vec<CharacterRecord> {
    manifest
        .entries()
        .map(|(phase, entry)| {
            CharacterRecord::seeded(
                format!("p{}_{}", phase.number(), slug(&entry.name)),
                entry.name.clone(),
                entry.category.unwrap_or_default(),
                phase,
                entry.color.clone(),
                entry.image.clone(),
                entry.sound.clone(),
            )
        })
        .collect()
}

/// Lowercase ASCII alphanumerics, runs of anything else become one `_`
pub(crate) fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_cast() {
        let seeds = builtin_seeds();
        assert_eq!(seeds.len(), 12);
        assert_eq!(seeds.iter().filter(|s| s.phase == Phase::Two).count(), 5);
        assert!(seeds.iter().all(|s| s.is_default));
        assert_eq!(seeds[7].id, "skel_oren");
        assert_eq!(seeds[7].audio, seeds[0].audio);
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Mr Fun Computer"), "mr_fun_computer");
        assert_eq!(slug("Clukr (Phase 2)"), "clukr_phase_2");
        assert_eq!(slug("  Oren!"), "oren");
    }

    #[test]
    fn test_manifest_seeds_have_unique_ids() {
        let seeds = manifest_seeds(&AssetManifest::builtin());
        assert_eq!(seeds.len(), 16);
        let ids: HashSet<&str> = seeds.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), 16);
        assert!(ids.contains("p1_mr_fun_computer"));
        assert!(ids.contains("p2_grey_phase_2"));
        assert!(seeds.iter().all(|s| s.category == Category::Voice));
    }
}
