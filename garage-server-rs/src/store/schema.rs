//! Per-collection write-path rules.
//!
//! Records are otherwise schema-free: a collection only declares which fields
//! must be present and which must be unique across the collection.

use super::{Record, StoreError, ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub unique: Vec<String>,
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: Vec::new(),
            unique: Vec::new(),
        }
    }

    pub fn required(mut self, fields: &[&str]) -> Self {
        self.required = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn unique(mut self, fields: &[&str]) -> Self {
        self.unique = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Checks a record against the collection rules and returns it with its
    /// identity. A record without `_id` gets a freshly generated one.
    pub fn prepare(&self, record: &Record) -> Result<(String, Record), StoreError> {
        let mut record = record.clone();
        let id = match record.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            None | Some(Value::Null) => {
                let id = Uuid::new_v4().simple().to_string();
                record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
            Some(other) => {
                return Err(StoreError::InvalidRecord {
                    collection: self.name.clone(),
                    reason: format!("`{ID_FIELD}` must be a non-empty string, got {other}"),
                })
            }
        };

        for field in &self.required {
            let missing = match record.get(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if missing {
                return Err(StoreError::MissingField {
                    collection: self.name.clone(),
                    field: field.clone(),
                });
            }
        }

        Ok((id, record))
    }
}

/// Collection names become archive entry names, so they are restricted to a
/// filesystem-safe alphabet.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Unique keys seen during one bulk insert: the identity field plus every
/// field the schema marks unique. Missing and null values are not indexed.
pub struct UniqueIndex<'a> {
    schema: &'a CollectionSchema,
    seen: HashSet<(String, String)>,
}

impl<'a> UniqueIndex<'a> {
    pub fn new(schema: &'a CollectionSchema) -> Self {
        Self {
            schema,
            seen: HashSet::new(),
        }
    }

    fn keys(&self, record: &Record) -> Vec<(String, String)> {
        std::iter::once(ID_FIELD)
            .chain(self.schema.unique.iter().map(String::as_str))
            .filter_map(|field| match record.get(field) {
                None | Some(Value::Null) => None,
                Some(value) => Some((field.to_string(), value.to_string())),
            })
            .collect()
    }

    /// Indexes a record that is already stored.
    pub fn observe(&mut self, record: &Record) {
        for key in self.keys(record) {
            self.seen.insert(key);
        }
    }

    /// Indexes a record about to be stored, rejecting it if any of its unique
    /// keys was seen before.
    pub fn admit(&mut self, record: &Record) -> Result<(), StoreError> {
        let keys = self.keys(record);
        if let Some((field, value)) = keys.iter().find(|k| self.seen.contains(*k)) {
            return Err(StoreError::Duplicate {
                collection: self.schema.name.clone(),
                field: field.clone(),
                value: value.clone(),
            });
        }
        self.seen.extend(keys);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_prepare_keeps_existing_id() {
        let schema = CollectionSchema::new("customers");
        let (id, rec) = schema
            .prepare(&record(json!({"_id": "64f1c0", "name": "Wanjiku"})))
            .unwrap();
        assert_eq!(id, "64f1c0");
        assert_eq!(rec["_id"], json!("64f1c0"));
    }

    #[test]
    fn test_prepare_assigns_missing_id() {
        let schema = CollectionSchema::new("services");
        let (id, rec) = schema.prepare(&record(json!({"title": "Oil Change"}))).unwrap();
        assert_eq!(id.len(), 32);
        assert_eq!(rec["_id"], json!(id));
    }

    #[test]
    fn test_prepare_rejects_non_string_id() {
        let schema = CollectionSchema::new("services");
        let err = schema
            .prepare(&record(json!({"_id": {"$oid": "abc"}})))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
    }

    #[test]
    fn test_prepare_enforces_required_fields() {
        let schema = CollectionSchema::new("customers").required(&["name", "mobile"]);
        let err = schema
            .prepare(&record(json!({"name": "Otieno", "mobile": ""})))
            .unwrap_err();
        match err {
            StoreError::MissingField { field, .. } => assert_eq!(field, "mobile"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(schema
            .prepare(&record(json!({"name": "Otieno", "mobile": "0712345678"})))
            .is_ok());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("laborentries").is_ok());
        assert!(validate_name("job_cards-2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../etc").is_err());
        assert!(validate_name("a b").is_err());
    }

    #[test]
    fn test_unique_index_rejects_duplicates() {
        let schema = CollectionSchema::new("users").unique(&["username"]);
        let mut index = UniqueIndex::new(&schema);
        index.observe(&record(json!({"_id": "1", "username": "admin"})));

        let err = index
            .admit(&record(json!({"_id": "2", "username": "admin"})))
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field, .. } if field == "username"));

        let err = index.admit(&record(json!({"_id": "1"}))).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref field, .. } if field == "_id"));

        index
            .admit(&record(json!({"_id": "3", "username": "mechanic"})))
            .unwrap();
        // Missing unique values are sparse.
        index.admit(&record(json!({"_id": "4"}))).unwrap();
        index.admit(&record(json!({"_id": "5"}))).unwrap();
    }
}
