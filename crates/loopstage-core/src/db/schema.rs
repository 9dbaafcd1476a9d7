//! CozoDB schema for the character library

use cozo::DbInstance;
use std::collections::HashSet;

use super::DbError;

/// Raw database row of a character
///
/// Use `CharacterRecord` from the library module for the public API; the
/// row keeps the flattened asset columns and the insertion sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRow {
    pub id: String,
    /// Insertion order, assigned on first save
    pub seq: i64,
    pub name: String,
    pub category: String,
    pub color: String,
    /// `None` for records written before phases existed
    pub phase: Option<i64>,
    pub image_path: Option<String>,
    pub image_data: Option<Vec<u8>>,
    pub audio_path: Option<String>,
    pub audio_data: Option<Vec<u8>>,
    pub is_default: bool,
}

fn get_existing_relations(db: &DbInstance) -> Result<HashSet<String>, DbError> {
    let result = db
        .run_script("::relations", Default::default(), cozo::ScriptMutability::Immutable)
        .map_err(|e| DbError::Schema(e.to_string()))?;

    // Columns are [name, arity, access_level, ...]
    let mut relations = HashSet::new();
    for row in result.rows {
        if let Some(name) = row.first().and_then(|v| v.get_str()) {
            relations.insert(name.to_string());
        }
    }
    Ok(relations)
}

/// Create missing relations (idempotent)
pub fn create_all_relations(db: &DbInstance) -> Result<(), DbError> {
    let existing = get_existing_relations(db)?;
    log::debug!("Existing relations: {:?}", existing);

    if !existing.contains("characters") {
        log::debug!("Creating 'characters' relation");
        create_characters_relation(db)?;
    }

    Ok(())
}

fn run_schema(db: &DbInstance, script: &str) -> Result<(), DbError> {
    db.run_script(script, Default::default(), cozo::ScriptMutability::Mutable)
        .map_err(|e| DbError::Schema(e.to_string()))?;
    Ok(())
}

fn create_characters_relation(db: &DbInstance) -> Result<(), DbError> {
    run_schema(
        db,
        r#"
        {:create characters {
            id: String =>
            seq: Int,
            name: String,
            category: String,
            color: String,
            phase: Int?,
            image_path: String?,
            image_data: Bytes?,
            audio_path: String?,
            audio_data: Bytes?,
            is_default: Bool default false
        }}
    "#,
    )
}
