//! Replace-all restore of archive entries into live collections.

use super::archive::{read_archive, ArchiveEntry};
use super::BackupError;
use crate::store::{Collection, DocumentStore, ReplaceBatch};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// How a restore applies its collection replacements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestoreStrategy {
    /// Delete-then-insert one collection at a time. A failure leaves earlier
    /// collections replaced and the failing one empty.
    #[default]
    Sequential,
    /// All replacements succeed together or none are applied.
    Atomic,
}

impl FromStr for RestoreStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "atomic" => Ok(Self::Atomic),
            other => Err(format!("unknown restore strategy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredCollection {
    pub collection: String,
    pub entry: String,
    pub records: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub restored: Vec<RestoredCollection>,
    /// Entries with no matching live collection.
    pub skipped: Vec<String>,
    /// Entries holding an empty array; their collections were left as they were.
    pub empty: Vec<String>,
}

pub fn restore_archive(
    store: &dyn DocumentStore,
    path: &Path,
    strategy: RestoreStrategy,
) -> Result<RestoreReport, BackupError> {
    let entries = read_archive(path)?;
    restore_entries(store, entries, strategy)
}

/// Applies parsed archive entries to the collections that match them.
pub fn restore_entries(
    store: &dyn DocumentStore,
    entries: Vec<ArchiveEntry>,
    strategy: RestoreStrategy,
) -> Result<RestoreReport, BackupError> {
    let live = store.collections()?;
    let mut report = RestoreReport::default();
    let mut plan: Vec<(&dyn Collection, ArchiveEntry)> = Vec::new();

    for entry in entries {
        let Some(collection) = live.resolve(&entry.name) else {
            tracing::warn!(entry = %entry.file_name, "[Restore] No collection matches archive entry, skipping");
            report.skipped.push(entry.file_name);
            continue;
        };
        if entry.records.is_empty() {
            tracing::info!(
                entry = %entry.file_name,
                collection = %collection.name(),
                "[Restore] Entry is empty, leaving collection untouched"
            );
            report.empty.push(entry.file_name);
            continue;
        }
        plan.push((collection, entry));
    }

    match strategy {
        RestoreStrategy::Sequential => {
            for (collection, entry) in plan {
                let loaded = collection.delete_all().and_then(|removed| {
                    let inserted = collection.insert_many(&entry.records)?;
                    Ok((removed, inserted))
                });
                match loaded {
                    Ok((removed, inserted)) => {
                        tracing::info!(
                            collection = %collection.name(),
                            removed,
                            inserted,
                            "[Restore] Collection replaced"
                        );
                        report.restored.push(RestoredCollection {
                            collection: collection.name().to_string(),
                            entry: entry.file_name,
                            records: inserted,
                        });
                    }
                    Err(source) => {
                        let replaced = report
                            .restored
                            .iter()
                            .map(|r| r.collection.clone())
                            .collect();
                        return Err(BackupError::RestoreFailed {
                            collection: collection.name().to_string(),
                            replaced,
                            source,
                        });
                    }
                }
            }
        }
        RestoreStrategy::Atomic => {
            let mut batches = Vec::with_capacity(plan.len());
            let mut restored = Vec::with_capacity(plan.len());
            for (collection, entry) in plan {
                restored.push(RestoredCollection {
                    collection: collection.name().to_string(),
                    entry: entry.file_name,
                    records: entry.records.len(),
                });
                batches.push(ReplaceBatch {
                    collection: collection.name().to_string(),
                    records: entry.records,
                });
            }
            store.replace_all_atomic(&batches)?;
            tracing::info!(collections = restored.len(), "[Restore] Collections replaced atomically");
            report.restored = restored;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionSchema, MemoryStore, Record, StoreError};
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn entry(name: &str, records: Vec<Record>) -> ArchiveEntry {
        ArchiveEntry {
            name: name.to_string(),
            file_name: format!("{name}.json"),
            records,
        }
    }

    fn ids(store: &MemoryStore, collection: &str) -> Vec<String> {
        let live = store.collections().unwrap();
        let records = live.resolve(collection).unwrap().find_all().unwrap();
        records
            .iter()
            .map(|r| r["_id"].as_str().unwrap().to_string())
            .collect()
    }

    /// customers(c1, c2), suppliers(p1) and services(s1, s2, s3); suppliers
    /// requires `name`.
    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.register(&CollectionSchema::new("customers")).unwrap();
        store
            .register(&CollectionSchema::new("suppliers").required(&["name"]))
            .unwrap();
        store.register(&CollectionSchema::new("services")).unwrap();
        let live = store.collections().unwrap();
        live.resolve("customers")
            .unwrap()
            .insert_many(&[record(json!({"_id": "c1"})), record(json!({"_id": "c2"}))])
            .unwrap();
        live.resolve("suppliers")
            .unwrap()
            .insert_many(&[record(json!({"_id": "p1", "name": "Autoparts Ltd"}))])
            .unwrap();
        live.resolve("services")
            .unwrap()
            .insert_many(&[
                record(json!({"_id": "s1"})),
                record(json!({"_id": "s2"})),
                record(json!({"_id": "s3"})),
            ])
            .unwrap();
        store
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("Atomic".parse::<RestoreStrategy>(), Ok(RestoreStrategy::Atomic));
        assert_eq!(" sequential ".parse::<RestoreStrategy>(), Ok(RestoreStrategy::Sequential));
        assert!("two-phase".parse::<RestoreStrategy>().is_err());
    }

    #[test]
    fn test_restore_replaces_and_keeps_ids() {
        let store = seeded();
        let report = restore_entries(
            &store,
            vec![entry("customers", vec![record(json!({"_id": "c9", "name": "Chebet"}))])],
            RestoreStrategy::Sequential,
        )
        .unwrap();

        assert_eq!(ids(&store, "customers"), vec!["c9"]);
        assert_eq!(
            report.restored,
            vec![RestoredCollection {
                collection: "customers".into(),
                entry: "customers.json".into(),
                records: 1,
            }]
        );
    }

    #[test]
    fn test_entries_only_touch_their_collections() {
        let store = seeded();
        restore_entries(
            &store,
            vec![entry(
                "customers",
                vec![record(json!({"_id": "c1"})), record(json!({"_id": "c2"}))],
            )],
            RestoreStrategy::Sequential,
        )
        .unwrap();
        assert_eq!(ids(&store, "customers"), vec!["c1", "c2"]);
        assert_eq!(ids(&store, "services"), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_empty_entry_does_not_wipe_collection() {
        let store = seeded();
        let report = restore_entries(
            &store,
            vec![entry("services", vec![])],
            RestoreStrategy::Sequential,
        )
        .unwrap();
        assert_eq!(ids(&store, "services"), vec!["s1", "s2", "s3"]);
        assert_eq!(report.empty, vec!["services.json"]);
        assert!(report.restored.is_empty());
    }

    #[test]
    fn test_unmatched_entry_is_skipped_and_reported() {
        let store = seeded();
        let report = restore_entries(
            &store,
            vec![entry("orders", vec![record(json!({"_id": "o1"}))])],
            RestoreStrategy::Sequential,
        )
        .unwrap();
        assert_eq!(report.skipped, vec!["orders.json"]);
        assert_eq!(ids(&store, "customers"), vec!["c1", "c2"]);
        assert_eq!(ids(&store, "services"), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_entry_names_match_case_insensitively() {
        let store = seeded();
        restore_entries(
            &store,
            vec![entry("Customers", vec![record(json!({"_id": "c7"}))])],
            RestoreStrategy::Sequential,
        )
        .unwrap();
        assert_eq!(ids(&store, "customers"), vec!["c7"]);

        let upper = MemoryStore::new();
        upper.register(&CollectionSchema::new("Services")).unwrap();
        restore_entries(
            &upper,
            vec![entry("services", vec![record(json!({"_id": "s7"}))])],
            RestoreStrategy::Sequential,
        )
        .unwrap();
        assert_eq!(ids(&upper, "Services"), vec!["s7"]);
    }

    #[test]
    fn test_sequential_failure_leaves_partial_state() {
        let store = seeded();
        let err = restore_entries(
            &store,
            vec![
                entry("customers", vec![record(json!({"_id": "c5"}))]),
                // Missing the required `name`.
                entry("suppliers", vec![record(json!({"_id": "p5"}))]),
                entry("services", vec![record(json!({"_id": "s5"}))]),
            ],
            RestoreStrategy::Sequential,
        )
        .unwrap_err();

        match err {
            BackupError::RestoreFailed {
                collection,
                replaced,
                source,
            } => {
                assert_eq!(collection, "suppliers");
                assert_eq!(replaced, vec!["customers"]);
                assert!(matches!(source, StoreError::MissingField { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(ids(&store, "customers"), vec!["c5"]);
        assert!(ids(&store, "suppliers").is_empty());
        assert_eq!(ids(&store, "services"), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_atomic_failure_changes_nothing() {
        let store = seeded();
        let result = restore_entries(
            &store,
            vec![
                entry("customers", vec![record(json!({"_id": "c5"}))]),
                entry("suppliers", vec![record(json!({"_id": "p5"}))]),
                entry("services", vec![record(json!({"_id": "s5"}))]),
            ],
            RestoreStrategy::Atomic,
        );
        assert!(matches!(result, Err(BackupError::Store(StoreError::MissingField { .. }))));

        assert_eq!(ids(&store, "customers"), vec!["c1", "c2"]);
        assert_eq!(ids(&store, "suppliers"), vec!["p1"]);
        assert_eq!(ids(&store, "services"), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_atomic_success_reports_every_collection() {
        let store = seeded();
        let report = restore_entries(
            &store,
            vec![
                entry("services", vec![record(json!({"_id": "s8"}))]),
                entry("customers", vec![]),
                entry("vehicles", vec![record(json!({"_id": "v1"}))]),
            ],
            RestoreStrategy::Atomic,
        )
        .unwrap();
        assert_eq!(ids(&store, "services"), vec!["s8"]);
        assert_eq!(ids(&store, "customers"), vec!["c1", "c2"]);
        assert_eq!(report.restored.len(), 1);
        assert_eq!(report.empty, vec!["customers.json"]);
        assert_eq!(report.skipped, vec!["vehicles.json"]);
    }

    #[test]
    fn test_later_duplicate_entry_wins() {
        let store = seeded();
        restore_entries(
            &store,
            vec![
                entry("customers", vec![record(json!({"_id": "first"}))]),
                entry("CUSTOMERS", vec![record(json!({"_id": "second"}))]),
            ],
            RestoreStrategy::Sequential,
        )
        .unwrap();
        assert_eq!(ids(&store, "customers"), vec!["second"]);
    }
}
