//! Persistence contract for character records

use super::CharacterRecord;
use crate::db::DbError;

/// Key-value store of character records keyed by id
///
/// Implementations are synchronous; the registry calls them off the control
/// flow through `tokio::task::spawn_blocking`.
pub trait CharacterStore: Send + Sync {
    /// Insert or replace the record with `record.id`
    fn save(&self, record: &CharacterRecord) -> Result<(), DbError>;

    /// Every record, in first-insertion order
    fn load_all(&self) -> Result<Vec<CharacterRecord>, DbError>;

    fn delete(&self, id: &str) -> Result<(), DbError>;

    /// Delete every record
    fn clear(&self) -> Result<(), DbError>;
}
