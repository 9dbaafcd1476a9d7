//! Character persistence on CozoDB
//!
//! Records live in a single `characters` relation. The SQLite backend is
//! used on disk, the `mem` backend in tests. All queries go through typed
//! helpers in `queries` that generate CozoScript internally.

mod queries;
mod schema;
mod service;

pub use queries::CharacterQuery;
pub use schema::CharacterRow;
pub use service::CharacterDb;

use cozo::{DataValue, DbInstance, NamedRows};
use std::collections::BTreeMap;
use std::path::Path;

/// Database connection wrapper
pub struct LoopstageDb {
    db: DbInstance,
}

impl LoopstageDb {
    /// Open or create a SQLite-backed database at `path`
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let db = DbInstance::new("sqlite", path, "").map_err(|e| DbError::Open(e.to_string()))?;

        let stage_db = Self { db };
        stage_db.ensure_schema()?;

        Ok(stage_db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self, DbError> {
        let db = DbInstance::new("mem", "", "").map_err(|e| DbError::Open(e.to_string()))?;

        let stage_db = Self { db };
        stage_db.ensure_schema()?;

        Ok(stage_db)
    }

    fn ensure_schema(&self) -> Result<(), DbError> {
        schema::create_all_relations(&self.db)
    }

    /// Run a mutating CozoScript query
    pub fn run_script(
        &self,
        script: &str,
        params: BTreeMap<String, DataValue>,
    ) -> Result<NamedRows, DbError> {
        self.db
            .run_script(script, params, cozo::ScriptMutability::Mutable)
            .map_err(|e| DbError::Query(e.to_string()))
    }

    /// Run a read-only query
    pub fn run_query(
        &self,
        script: &str,
        params: BTreeMap<String, DataValue>,
    ) -> Result<NamedRows, DbError> {
        self.db
            .run_script(script, params, cozo::ScriptMutability::Immutable)
            .map_err(|e| DbError::Query(e.to_string()))
    }
}

/// Database errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Helper macro for creating parameter maps
#[macro_export]
macro_rules! params {
    () => {
        std::collections::BTreeMap::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = std::collections::BTreeMap::new();
        $(
            map.insert($key.to_string(), cozo::DataValue::from($value));
        )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = LoopstageDb::in_memory().unwrap();
        let result = db.run_query("?[x] := x = 1", params!()).unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn test_open_on_disk_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("loopstage.db");
        drop(LoopstageDb::open(&path).unwrap());
        // Second open must not try to recreate the relation
        let db = LoopstageDb::open(&path).unwrap();
        assert_eq!(CharacterQuery::count(&db).unwrap(), 0);
    }
}
