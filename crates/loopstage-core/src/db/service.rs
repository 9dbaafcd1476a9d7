//! Thread-safe character store backed by `LoopstageDb`
//!
//! ```ignore
//! use loopstage_core::db::CharacterDb;
//!
//! let store = CharacterDb::open("~/.local/share/loopstage")?;
//! let characters = store.load_all()?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::queries::CharacterQuery;
use super::schema::CharacterRow;
use super::{DbError, LoopstageDb};
use crate::library::{AssetRef, Category, CharacterRecord, CharacterStore, Phase};

/// Database file name inside the data directory
pub const DB_FILE_NAME: &str = "loopstage.db";

/// Character store shared across threads via `Arc`
pub struct CharacterDb {
    db: LoopstageDb,
    /// Serializes the read-seq-then-put sequence of `save`
    write_lock: Mutex<()>,
    data_dir: Option<PathBuf>,
}

impl CharacterDb {
    /// Open (or create) the store at `data_dir/loopstage.db`
    ///
    /// Schema is initialized idempotently.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Arc<Self>, DbError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let db_path = data_dir.join(DB_FILE_NAME);

        std::fs::create_dir_all(&data_dir)
            .map_err(|e| DbError::Open(format!("Failed to create directory: {}", e)))?;

        log::info!("Opening character database at {:?}", db_path);
        let db = LoopstageDb::open(&db_path)?;

        Ok(Arc::new(Self {
            db,
            write_lock: Mutex::new(()),
            data_dir: Some(data_dir),
        }))
    }

    /// In-memory store (for testing)
    pub fn in_memory() -> Result<Arc<Self>, DbError> {
        Ok(Arc::new(Self {
            db: LoopstageDb::in_memory()?,
            write_lock: Mutex::new(()),
            data_dir: None,
        }))
    }

    /// Directory holding the database file, `None` when in memory
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn count(&self) -> Result<usize, DbError> {
        CharacterQuery::count(&self.db)
    }

    pub fn get(&self, id: &str) -> Result<Option<CharacterRecord>, DbError> {
        Ok(CharacterQuery::get_by_id(&self.db, id)?.map(row_to_record))
    }
}

impl CharacterStore for CharacterDb {
    fn save(&self, record: &CharacterRecord) -> Result<(), DbError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| DbError::Query("character write lock poisoned".to_string()))?;

        let seq = match CharacterQuery::seq_of(&self.db, &record.id)? {
            Some(seq) => seq,
            None => CharacterQuery::next_seq(&self.db)?,
        };

        let result = CharacterQuery::upsert(&self.db, &record_to_row(record, seq));
        match &result {
            Ok(()) => log::debug!("CharacterDb::save: saved {} (seq {})", record.id, seq),
            Err(e) => log::error!("CharacterDb::save: FAILED {} error={}", record.id, e),
        }
        result
    }

    fn load_all(&self) -> Result<Vec<CharacterRecord>, DbError> {
        let rows = CharacterQuery::get_all(&self.db)?;
        log::debug!("CharacterDb::load_all: {} records", rows.len());
        Ok(rows.into_iter().map(row_to_record).collect())
    }

    fn delete(&self, id: &str) -> Result<(), DbError> {
        CharacterQuery::delete(&self.db, id)
    }

    fn clear(&self) -> Result<(), DbError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| DbError::Query("character write lock poisoned".to_string()))?;
        log::info!("CharacterDb::clear: deleting all characters");
        CharacterQuery::delete_all(&self.db)
    }
}

fn split_asset(asset: &Option<AssetRef>) -> (Option<String>, Option<Vec<u8>>) {
    match asset {
        Some(AssetRef::Path(p)) => (Some(p.clone()), None),
        Some(AssetRef::Data(d)) => (None, Some(d.clone())),
        None => (None, None),
    }
}

fn join_asset(path: Option<String>, data: Option<Vec<u8>>) -> Option<AssetRef> {
    // Binary payload wins if a row somehow carries both
    match (data, path) {
        (Some(data), _) => Some(AssetRef::Data(data)),
        (None, Some(path)) => Some(AssetRef::Path(path)),
        (None, None) => None,
    }
}

fn record_to_row(record: &CharacterRecord, seq: i64) -> CharacterRow {
    let (image_path, image_data) = split_asset(&record.image);
    let (audio_path, audio_data) = split_asset(&record.audio);
    CharacterRow {
        id: record.id.clone(),
        seq,
        name: record.name.clone(),
        category: record.category.as_str().to_string(),
        color: record.color.clone(),
        phase: Some(record.phase.number() as i64),
        image_path,
        image_data,
        audio_path,
        audio_data,
        is_default: record.is_default,
    }
}

fn row_to_record(row: CharacterRow) -> CharacterRecord {
    CharacterRecord {
        id: row.id,
        name: row.name,
        category: Category::parse(&row.category),
        color: row.color,
        phase: Phase::from_stored(row.phase),
        image: join_asset(row.image_path, row.image_data),
        audio: join_asset(row.audio_path, row.audio_data),
        is_default: row.is_default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn custom(id: &str) -> CharacterRecord {
        CharacterRecord {
            id: id.to_string(),
            name: "Custom".to_string(),
            category: Category::Voice,
            color: "#3b82f6".to_string(),
            phase: Phase::Two,
            image: Some(AssetRef::Data(vec![0x89, 0x50, 0x4e, 0x47])),
            audio: Some(AssetRef::Data(vec![1, 2, 3])),
            is_default: false,
        }
    }

    #[test]
    fn test_service_creation() {
        let temp = TempDir::new().unwrap();
        let store = CharacterDb::open(temp.path()).unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(temp.path().join(DB_FILE_NAME).exists());
    }

    #[test]
    fn test_save_and_load_binary_record() {
        let store = CharacterDb::in_memory().unwrap();
        let record = custom("custom_1");
        store.save(&record).unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all, vec![record]);
    }

    #[test]
    fn test_upsert_keeps_insertion_order() {
        let store = CharacterDb::in_memory().unwrap();
        store.save(&custom("b")).unwrap();
        store.save(&custom("a")).unwrap();
        store.save(&custom("c")).unwrap();

        let mut renamed = custom("b");
        renamed.name = "Renamed".to_string();
        store.save(&renamed).unwrap();

        let all = store.load_all().unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(all[0].name, "Renamed");
    }

    #[test]
    fn test_clear_and_delete() {
        let store = CharacterDb::in_memory().unwrap();
        store.save(&custom("a")).unwrap();
        store.save(&custom("b")).unwrap();

        store.delete("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert_eq!(store.count().unwrap(), 1);

        store.clear().unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let store = CharacterDb::open(temp.path()).unwrap();
            store
                .save(&CharacterRecord::seeded(
                    "oren",
                    "Oren",
                    Category::Beat,
                    Phase::One,
                    "#f97316",
                    "assets/images/oren_placeholder.png",
                    "assets/audio/oren_beat.mp3",
                ))
                .unwrap();
        }
        let store = CharacterDb::open(temp.path()).unwrap();
        let oren = store.get("oren").unwrap().unwrap();
        assert!(oren.is_default);
        assert_eq!(oren.audio, Some(AssetRef::Path("assets/audio/oren_beat.mp3".into())));
    }

    #[test]
    fn test_legacy_row_reads_as_phase_one() {
        let store = CharacterDb::in_memory().unwrap();
        let mut row = record_to_row(&custom("legacy"), 0);
        row.phase = None;
        CharacterQuery::upsert(&store.db, &row).unwrap();

        assert_eq!(store.get("legacy").unwrap().unwrap().phase, Phase::One);
    }
}
