//! Document store abstraction.
//!
//! Collections hold schema-free JSON records keyed by their `_id` field. The
//! backup subsystem only talks to the traits defined here, so the same
//! snapshot/restore code runs against SQLite in production and against the
//! in-memory store in tests.

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use schema::CollectionSchema;
pub use sqlite::SqliteStore;

use serde_json::{Map, Value};

/// A single stored document.
pub type Record = Map<String, Value>;

/// Identity field carried by every record.
pub const ID_FIELD: &str = "_id";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Invalid collection name: {0:?}")]
    InvalidName(String),

    #[error("Invalid record in {collection}: {reason}")]
    InvalidRecord { collection: String, reason: String },

    #[error("{collection} validation failed: path `{field}` is required")]
    MissingField { collection: String, field: String },

    #[error("{collection} validation failed: duplicate value {value} for unique field `{field}`")]
    Duplicate {
        collection: String,
        field: String,
        value: String,
    },
}

/// Handle to one live collection.
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// All records in natural (insertion) order.
    fn find_all(&self) -> Result<Vec<Record>, StoreError>;

    fn count(&self) -> Result<u64, StoreError>;

    /// Removes every record, returning how many were removed.
    fn delete_all(&self) -> Result<u64, StoreError>;

    /// Inserts the whole batch or nothing. Records keep their `_id` when they
    /// carry one.
    fn insert_many(&self, records: &[Record]) -> Result<usize, StoreError>;
}

/// One collection's replacement contents for [`DocumentStore::replace_all_atomic`].
#[derive(Debug, Clone)]
pub struct ReplaceBatch {
    pub collection: String,
    pub records: Vec<Record>,
}

pub trait DocumentStore: Send + Sync {
    /// Registers a collection, or updates its schema if it already exists.
    fn register(&self, schema: &CollectionSchema) -> Result<(), StoreError>;

    /// Enumerates the collections registered at call time, in registration order.
    fn collections(&self) -> Result<CollectionSet, StoreError>;

    /// Deletes and reloads every batch as a single unit: either all batches
    /// apply or the store is left exactly as it was.
    fn replace_all_atomic(&self, batches: &[ReplaceBatch]) -> Result<(), StoreError>;
}

/// Ordered snapshot of live collection handles.
pub struct CollectionSet {
    handles: Vec<Box<dyn Collection>>,
}

impl CollectionSet {
    pub fn new(handles: Vec<Box<dyn Collection>>) -> Self {
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Collection> {
        self.handles.iter().map(|c| &**c)
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|c| c.name().to_string()).collect()
    }

    /// Case-insensitive exact-name lookup. When several collections differ
    /// only by case, the first one in enumeration order is returned.
    pub fn resolve(&self, name: &str) -> Option<&dyn Collection> {
        let wanted = name.to_lowercase();
        self.iter().find(|c| c.name().to_lowercase() == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> CollectionSet {
        let store = MemoryStore::new();
        for name in names {
            store.register(&CollectionSchema::new(*name)).unwrap();
        }
        store.collections().unwrap()
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let live = set(&["customers", "services"]);
        assert_eq!(live.resolve("Customers").map(|c| c.name()), Some("customers"));
        assert_eq!(live.resolve("SERVICES").map(|c| c.name()), Some("services"));
        assert!(live.resolve("orders").is_none());
    }

    #[test]
    fn test_resolve_prefers_first_registered_on_case_collision() {
        let live = set(&["Customer", "customer"]);
        assert_eq!(live.resolve("CUSTOMER").map(|c| c.name()), Some("Customer"));
        assert_eq!(live.len(), 2);
    }

    #[test]
    fn test_resolve_requires_exact_name() {
        let live = set(&["customers"]);
        assert!(live.resolve("customer").is_none());
        assert!(live.resolve("customers ").is_none());
    }
}
