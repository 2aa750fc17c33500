//! In-memory document store.
//!
//! Used wherever a throwaway store is needed (tests, dry runs). Atomic
//! replacement is implemented by staging a full copy of the data and swapping
//! it in only after every batch has loaded.

use super::schema::{validate_name, UniqueIndex};
use super::{
    Collection, CollectionSchema, CollectionSet, DocumentStore, Record, ReplaceBatch, StoreError,
};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredCollection {
    schema: CollectionSchema,
    records: Vec<Record>,
}

type Collections = Arc<RwLock<Vec<StoredCollection>>>;

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Collections,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn find<'a>(
    collections: &'a [StoredCollection],
    name: &str,
) -> Result<&'a StoredCollection, StoreError> {
    collections
        .iter()
        .find(|c| c.schema.name == name)
        .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
}

fn find_mut<'a>(
    collections: &'a mut [StoredCollection],
    name: &str,
) -> Result<&'a mut StoredCollection, StoreError> {
    collections
        .iter_mut()
        .find(|c| c.schema.name == name)
        .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
}

/// Validates a batch against a collection's schema and its current contents.
fn admit_batch(
    existing: &StoredCollection,
    records: &[Record],
) -> Result<Vec<Record>, StoreError> {
    let mut index = UniqueIndex::new(&existing.schema);
    for record in &existing.records {
        index.observe(record);
    }
    records
        .iter()
        .map(|record| {
            let (_, record) = existing.schema.prepare(record)?;
            index.admit(&record)?;
            Ok(record)
        })
        .collect()
}

impl DocumentStore for MemoryStore {
    fn register(&self, schema: &CollectionSchema) -> Result<(), StoreError> {
        validate_name(&schema.name)?;
        let mut collections = self.inner.write();
        match collections.iter_mut().find(|c| c.schema.name == schema.name) {
            Some(existing) => existing.schema = schema.clone(),
            None => collections.push(StoredCollection {
                schema: schema.clone(),
                records: Vec::new(),
            }),
        }
        Ok(())
    }

    fn collections(&self) -> Result<CollectionSet, StoreError> {
        let handles = self
            .inner
            .read()
            .iter()
            .map(|c| {
                Box::new(MemoryCollection {
                    inner: self.inner.clone(),
                    name: c.schema.name.clone(),
                }) as Box<dyn Collection>
            })
            .collect();
        Ok(CollectionSet::new(handles))
    }

    fn replace_all_atomic(&self, batches: &[ReplaceBatch]) -> Result<(), StoreError> {
        let mut collections = self.inner.write();
        let mut staged = collections.clone();
        for batch in batches {
            let target = find_mut(&mut staged, &batch.collection)?;
            target.records.clear();
            let loaded = admit_batch(target, &batch.records)?;
            target.records = loaded;
        }
        *collections = staged;
        Ok(())
    }
}

struct MemoryCollection {
    inner: Collections,
    name: String,
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_all(&self) -> Result<Vec<Record>, StoreError> {
        let collections = self.inner.read();
        Ok(find(&collections, &self.name)?.records.clone())
    }

    fn count(&self) -> Result<u64, StoreError> {
        let collections = self.inner.read();
        Ok(find(&collections, &self.name)?.records.len() as u64)
    }

    fn delete_all(&self) -> Result<u64, StoreError> {
        let mut collections = self.inner.write();
        let target = find_mut(&mut collections, &self.name)?;
        let removed = target.records.len() as u64;
        target.records.clear();
        Ok(removed)
    }

    fn insert_many(&self, records: &[Record]) -> Result<usize, StoreError> {
        let mut collections = self.inner.write();
        let target = find_mut(&mut collections, &self.name)?;
        let loaded = admit_batch(target, records)?;
        let inserted = loaded.len();
        target.records.extend(loaded);
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .register(&CollectionSchema::new("customers").required(&["name"]))
            .unwrap();
        store.register(&CollectionSchema::new("services")).unwrap();
        store
    }

    #[test]
    fn test_enumeration_follows_registration_order() {
        let store = store();
        assert_eq!(store.collections().unwrap().names(), vec!["customers", "services"]);

        store.register(&CollectionSchema::new("inventories")).unwrap();
        assert_eq!(
            store.collections().unwrap().names(),
            vec!["customers", "services", "inventories"]
        );
    }

    #[test]
    fn test_register_rejects_unsafe_names() {
        let store = MemoryStore::new();
        assert!(store.register(&CollectionSchema::new("../x")).is_err());
    }

    #[test]
    fn test_insert_many_is_all_or_nothing() {
        let store = store();
        let live = store.collections().unwrap();
        let customers = live.resolve("customers").unwrap();

        let err = customers
            .insert_many(&[
                record(json!({"_id": "c1", "name": "Akinyi"})),
                record(json!({"_id": "c2"})),
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingField { .. }));
        assert_eq!(customers.count().unwrap(), 0);

        customers
            .insert_many(&[record(json!({"_id": "c1", "name": "Akinyi"}))])
            .unwrap();
        let dup = customers.insert_many(&[record(json!({"_id": "c1", "name": "Other"}))]);
        assert!(matches!(dup, Err(StoreError::Duplicate { .. })));
        assert_eq!(customers.find_all().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_all_reports_removed() {
        let store = store();
        let live = store.collections().unwrap();
        let services = live.resolve("services").unwrap();
        services
            .insert_many(&[record(json!({"title": "A"})), record(json!({"title": "B"}))])
            .unwrap();
        assert_eq!(services.delete_all().unwrap(), 2);
        assert_eq!(services.count().unwrap(), 0);
    }

    #[test]
    fn test_replace_all_atomic_leaves_store_untouched_on_failure() {
        let store = store();
        let live = store.collections().unwrap();
        live.resolve("customers")
            .unwrap()
            .insert_many(&[record(json!({"_id": "c1", "name": "Kamau"}))])
            .unwrap();
        live.resolve("services")
            .unwrap()
            .insert_many(&[record(json!({"_id": "s1", "title": "Oil Check"}))])
            .unwrap();

        let result = store.replace_all_atomic(&[
            ReplaceBatch {
                collection: "services".into(),
                records: vec![record(json!({"_id": "s2", "title": "Lubrication"}))],
            },
            ReplaceBatch {
                collection: "customers".into(),
                records: vec![record(json!({"_id": "c9"}))],
            },
        ]);
        assert!(result.is_err());

        let services = live.resolve("services").unwrap().find_all().unwrap();
        assert_eq!(services[0]["_id"], json!("s1"));
        assert_eq!(live.resolve("customers").unwrap().count().unwrap(), 1);
    }
}
