//! Runtime view of a persisted character

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempPath;

use super::record::{AssetRef, CharacterRecord};

/// Where a host can find a character's image right now
#[derive(Debug, Clone)]
pub enum ImageLocation {
    /// Stored path reference, unchanged (relative to the asset root)
    Asset(String),
    /// Uploaded bytes written to a temp file, removed when the last clone drops
    Temp(Arc<TempPath>),
}

impl ImageLocation {
    pub fn path(&self) -> &Path {
        match self {
            ImageLocation::Asset(p) => Path::new(p),
            ImageLocation::Temp(t) => t,
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, ImageLocation::Temp(_))
    }
}

/// A character ready for the stage and picker
#[derive(Debug, Clone)]
pub struct RuntimeCharacter {
    pub record: CharacterRecord,
    pub image: Option<ImageLocation>,
}

impl RuntimeCharacter {
    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }
}

/// Resolve a record's image into a location (blocking: may write a file in `dir`)
pub(crate) fn materialize_image(
    asset: &Option<AssetRef>,
    dir: &Path,
) -> std::io::Result<Option<ImageLocation>> {
    match asset {
        None => Ok(None),
        Some(AssetRef::Path(p)) => Ok(Some(ImageLocation::Asset(p.clone()))),
        Some(AssetRef::Data(bytes)) => {
            let mut file = tempfile::Builder::new()
                .prefix("loopstage-image-")
                .tempfile_in(dir)?;
            file.write_all(bytes)?;
            file.flush()?;
            Ok(Some(ImageLocation::Temp(Arc::new(file.into_temp_path()))))
        }
    }
}
