//! Collection enumeration and serialization.

use super::{BackupError, ENTRY_SUFFIX};
use crate::store::{Collection, DocumentStore};

/// One serialized collection, ready to be packed into an archive.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub collection: String,
    pub entry_name: String,
    pub records: usize,
    pub json: String,
}

/// Reads every record of a collection and renders them as a pretty-printed
/// JSON array.
pub fn serialize_collection(collection: &dyn Collection) -> Result<SnapshotEntry, BackupError> {
    let records = collection.find_all()?;
    let json = serde_json::to_string_pretty(&records)?;
    Ok(SnapshotEntry {
        collection: collection.name().to_string(),
        entry_name: format!("{}{}", collection.name(), ENTRY_SUFFIX),
        records: records.len(),
        json,
    })
}

/// Serializes every collection registered at call time, in enumeration order.
pub fn snapshot(store: &dyn DocumentStore) -> Result<Vec<SnapshotEntry>, BackupError> {
    let live = store.collections()?;
    let mut entries = Vec::with_capacity(live.len());
    for collection in live.iter() {
        let entry = serialize_collection(collection)?;
        tracing::debug!(
            collection = %entry.collection,
            records = entry.records,
            "[Backup] Collection serialized"
        );
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionSchema, MemoryStore, Record};
    use serde_json::{json, Value};

    #[test]
    fn test_snapshot_covers_collections_registered_up_to_call_time() {
        let store = MemoryStore::new();
        store.register(&CollectionSchema::new("customers")).unwrap();
        assert_eq!(snapshot(&store).unwrap().len(), 1);

        store.register(&CollectionSchema::new("suppliers")).unwrap();
        let entries = snapshot(&store).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.entry_name.as_str()).collect();
        assert_eq!(names, vec!["customers.json", "suppliers.json"]);
    }

    #[test]
    fn test_serialized_entry_is_pretty_json_array() {
        let store = MemoryStore::new();
        store.register(&CollectionSchema::new("inventories")).unwrap();
        let live = store.collections().unwrap();
        let inventories = live.resolve("inventories").unwrap();
        let item: Record = json!({"_id": "i1", "name": "Brake pads", "quantity": 4})
            .as_object()
            .cloned()
            .unwrap();
        inventories.insert_many(&[item]).unwrap();

        let entry = serialize_collection(inventories).unwrap();
        assert_eq!(entry.records, 1);
        assert!(entry.json.contains("\n  {"));
        let parsed: Value = serde_json::from_str(&entry.json).unwrap();
        assert_eq!(parsed[0]["name"], "Brake pads");
    }

    #[test]
    fn test_empty_collection_serializes_to_empty_array() {
        let store = MemoryStore::new();
        store.register(&CollectionSchema::new("jobcards")).unwrap();
        let entries = snapshot(&store).unwrap();
        assert_eq!(entries[0].json, "[]");
        assert_eq!(entries[0].records, 0);
    }
}
