//! Typed queries over the `characters` relation

use cozo::{DataValue, NamedRows};
use std::collections::BTreeMap;

use super::schema::CharacterRow;
use super::{DbError, LoopstageDb};

/// Query builder for characters
pub struct CharacterQuery;

impl CharacterQuery {
    /// All characters in insertion order
    pub fn get_all(db: &LoopstageDb) -> Result<Vec<CharacterRow>, DbError> {
        let result = db.run_query(
            r#"
            ?[id, seq, name, category, color, phase,
              image_path, image_data, audio_path, audio_data, is_default] :=
                *characters{id, seq, name, category, color, phase,
                            image_path, image_data, audio_path, audio_data, is_default}
            :order seq
        "#,
            BTreeMap::new(),
        )?;

        Ok(rows_to_characters(&result))
    }

    pub fn get_by_id(db: &LoopstageDb, id: &str) -> Result<Option<CharacterRow>, DbError> {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), DataValue::Str(id.into()));

        let result = db.run_query(
            r#"
            ?[id, seq, name, category, color, phase,
              image_path, image_data, audio_path, audio_data, is_default] :=
                *characters{id, seq, name, category, color, phase,
                            image_path, image_data, audio_path, audio_data, is_default},
                id = $id
        "#,
            params,
        )?;

        Ok(rows_to_characters(&result).into_iter().next())
    }

    /// Sequence number already assigned to `id`, if stored
    pub fn seq_of(db: &LoopstageDb, id: &str) -> Result<Option<i64>, DbError> {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), DataValue::Str(id.into()));

        let result = db.run_query(
            r#"
            ?[seq] := *characters{id, seq}, id = $id
        "#,
            params,
        )?;

        Ok(result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.get_int()))
    }

    /// Next free insertion sequence number
    pub fn next_seq(db: &LoopstageDb) -> Result<i64, DbError> {
        let result = db.run_query(
            r#"
            ?[max(seq)] := *characters{seq}
        "#,
            BTreeMap::new(),
        )?;

        let max = result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.get_int())
            .unwrap_or(-1);

        Ok(max + 1)
    }

    /// Insert or replace a row (the caller supplies `seq`)
    pub fn upsert(db: &LoopstageDb, row: &CharacterRow) -> Result<(), DbError> {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), DataValue::Str(row.id.clone().into()));
        params.insert("seq".to_string(), DataValue::from(row.seq));
        params.insert("name".to_string(), DataValue::Str(row.name.clone().into()));
        params.insert("category".to_string(), DataValue::Str(row.category.clone().into()));
        params.insert("color".to_string(), DataValue::Str(row.color.clone().into()));
        params.insert("phase".to_string(), row.phase.map(DataValue::from).unwrap_or(DataValue::Null));
        params.insert("image_path".to_string(), opt_str(&row.image_path));
        params.insert("image_data".to_string(), opt_bytes(&row.image_data));
        params.insert("audio_path".to_string(), opt_str(&row.audio_path));
        params.insert("audio_data".to_string(), opt_bytes(&row.audio_data));
        params.insert("is_default".to_string(), DataValue::Bool(row.is_default));

        db.run_script(
            r#"
            ?[id, seq, name, category, color, phase,
              image_path, image_data, audio_path, audio_data, is_default] <- [[
                $id, $seq, $name, $category, $color, $phase,
                $image_path, $image_data, $audio_path, $audio_data, $is_default
            ]]
            :put characters {id => seq, name, category, color, phase,
                             image_path, image_data, audio_path, audio_data, is_default}
        "#,
            params,
        )?;

        Ok(())
    }

    pub fn delete(db: &LoopstageDb, id: &str) -> Result<(), DbError> {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), DataValue::Str(id.into()));

        db.run_script(
            r#"
            ?[id] <- [[$id]]
            :rm characters {id}
        "#,
            params,
        )?;

        Ok(())
    }

    pub fn delete_all(db: &LoopstageDb) -> Result<(), DbError> {
        db.run_script(
            r#"
            ?[id] := *characters{id}
            :rm characters {id}
        "#,
            BTreeMap::new(),
        )?;

        Ok(())
    }

    pub fn count(db: &LoopstageDb) -> Result<usize, DbError> {
        let result = db.run_query(
            r#"
            ?[count(id)] := *characters{id}
        "#,
            BTreeMap::new(),
        )?;

        Ok(result
            .rows
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.get_int())
            .unwrap_or(0) as usize)
    }
}

fn opt_str(value: &Option<String>) -> DataValue {
    value
        .as_ref()
        .map(|s| DataValue::Str(s.clone().into()))
        .unwrap_or(DataValue::Null)
}

fn opt_bytes(value: &Option<Vec<u8>>) -> DataValue {
    value
        .as_ref()
        .map(|b| DataValue::Bytes(b.clone()))
        .unwrap_or(DataValue::Null)
}

fn get_bytes(value: &DataValue) -> Option<Vec<u8>> {
    match value {
        DataValue::Bytes(b) => Some(b.clone()),
        _ => None,
    }
}

fn get_bool(value: &DataValue) -> Option<bool> {
    match value {
        DataValue::Bool(b) => Some(*b),
        _ => None,
    }
}

fn rows_to_characters(result: &NamedRows) -> Vec<CharacterRow> {
    result
        .rows
        .iter()
        .filter_map(|row| {
            Some(CharacterRow {
                id: row.get(0)?.get_str()?.to_string(),
                seq: row.get(1)?.get_int()?,
                name: row.get(2)?.get_str()?.to_string(),
                category: row.get(3)?.get_str().unwrap_or_default().to_string(),
                color: row.get(4)?.get_str().unwrap_or_default().to_string(),
                phase: row.get(5)?.get_int(),
                image_path: row.get(6)?.get_str().map(|s| s.to_string()),
                image_data: get_bytes(row.get(7)?),
                audio_path: row.get(8)?.get_str().map(|s| s.to_string()),
                audio_data: get_bytes(row.get(9)?),
                is_default: get_bool(row.get(10)?).unwrap_or(false),
            })
        })
        .collect()
}
