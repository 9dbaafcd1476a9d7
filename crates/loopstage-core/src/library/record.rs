//! Character records as stored and as used at runtime

use serde::{Deserialize, Serialize};

/// Visual grouping of a character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Beat,
    Effect,
    Melody,
    #[default]
    Voice,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Beat => "beat",
            Category::Effect => "effect",
            Category::Melody => "melody",
            Category::Voice => "voice",
        }
    }

    /// Parse the stored form; anything unrecognized is a voice
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "beat" => Category::Beat,
            "effect" => Category::Effect,
            "melody" => Category::Melody,
            _ => Category::Voice,
        }
    }
}

/// Which of the two character sets a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Phase {
    #[default]
    One,
    Two,
}

impl Phase {
    pub fn number(&self) -> u8 {
        match self {
            Phase::One => 1,
            Phase::Two => 2,
        }
    }

    /// Records without a phase, or with an out-of-range one, are phase 1
    pub fn from_stored(value: Option<i64>) -> Self {
        match value {
            Some(2) => Phase::Two,
            _ => Phase::One,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            Phase::One => Phase::Two,
            Phase::Two => Phase::One,
        }
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Phase::One),
            2 => Ok(Phase::Two),
            other => Err(format!("invalid phase {}, expected 1 or 2", other)),
        }
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> u8 {
        phase.number()
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Image or audio reference: a path relative to the asset root, or raw bytes
#[derive(Clone, PartialEq, Eq)]
pub enum AssetRef {
    Path(String),
    Data(Vec<u8>),
}

impl AssetRef {
    pub fn as_path(&self) -> Option<&str> {
        match self {
            AssetRef::Path(p) => Some(p),
            AssetRef::Data(_) => None,
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            AssetRef::Path(_) => None,
            AssetRef::Data(d) => Some(d),
        }
    }
}

// Binary payloads can be megabytes; only print their size
impl std::fmt::Debug for AssetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetRef::Path(p) => f.debug_tuple("Path").field(p).finish(),
            AssetRef::Data(d) => write!(f, "Data({} bytes)", d.len()),
        }
    }
}

/// A character as persisted
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRecord {
    /// Unique, stable across sessions
    pub id: String,
    pub name: String,
    pub category: Category,
    /// Display hint, e.g. "#f97316"
    pub color: String,
    pub phase: Phase,
    pub image: Option<AssetRef>,
    pub audio: Option<AssetRef>,
    /// Seeded rather than user-created
    pub is_default: bool,
}

impl CharacterRecord {
    /// Default (seeded) record with path references
    pub fn seeded(
        id: impl Into<String>,
        name: impl Into<String>,
        category: Category,
        phase: Phase,
        color: impl Into<String>,
        image: impl Into<String>,
        audio: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            color: color.into(),
            phase,
            image: Some(AssetRef::Path(image.into())),
            audio: Some(AssetRef::Path(audio.into())),
            is_default: true,
        }
    }
}
