//! Garage collection registrations and first-run data.

use crate::store::{CollectionSchema, DocumentStore, Record, StoreError};
use serde_json::{json, Value};

/// Collections the garage application keeps, with their write-path rules.
pub fn garage_collections() -> Vec<CollectionSchema> {
    vec![
        CollectionSchema::new("customers").required(&["name", "mobile", "vehicles"]),
        CollectionSchema::new("jobcards"),
        CollectionSchema::new("laborentries").required(&[
            "technician",
            "vehicleMake",
            "vehicleModel",
            "vehicleReg",
            "workType",
            "hours",
        ]),
        CollectionSchema::new("inventories")
            .required(&["name", "quantity", "unit", "price", "supplier"]),
        CollectionSchema::new("suppliers")
            .required(&["name", "contact"])
            .unique(&["contact"]),
        CollectionSchema::new("users")
            .required(&["username"])
            .unique(&["username"]),
        CollectionSchema::new("services").required(&["title"]),
    ]
}

const SERVICE_CATALOGUE: &[(&str, &str)] = &[
    ("Interior Upholstery / Seat Cushioning", "Seat repairs, new cushioning and fabric upgrades."),
    ("Maintenance", "Regular checkups, part replacements and preventive care."),
    ("Service and Repair", "Routine servicing and general mechanical repairs."),
    ("Oil Change", "Engine oil and filter replacement."),
    ("Lubrication", "Full-system lubrication of moving parts."),
    ("Transmission Repair", "Transmission diagnostics and repairs."),
    ("Oil Check", "Oil level and condition inspection."),
    ("Engine Check", "Engine inspection and fault finding."),
    ("Air Conditioning", "A/C recharge, leak repair and filter replacement."),
    ("Heating Check", "Cabin heater inspection and repair."),
    ("Computerized Diagnostics", "Electronic scan of all major vehicle systems."),
    ("Bodyworks (Restorations / Modifications)", "Dent repair, respraying and body modifications."),
    ("Vehicle Tinting", "Window tinting."),
    ("Heavy Diesels", "Maintenance and repair of heavy-duty diesel engines."),
];

pub fn register_garage_collections(store: &dyn DocumentStore) -> Result<(), StoreError> {
    for schema in garage_collections() {
        store.register(&schema)?;
    }
    Ok(())
}

/// Loads the default service catalogue when the services collection is empty.
/// Returns how many services were inserted.
pub fn seed_services(store: &dyn DocumentStore) -> Result<usize, StoreError> {
    let live = store.collections()?;
    let services = live
        .resolve("services")
        .ok_or_else(|| StoreError::UnknownCollection("services".into()))?;
    if services.count()? > 0 {
        return Ok(0);
    }

    let created_at = chrono::Utc::now().to_rfc3339();
    let records: Vec<Record> = SERVICE_CATALOGUE
        .iter()
        .filter_map(|(title, description)| {
            match json!({ "title": title, "description": description, "createdAt": created_at }) {
                Value::Object(record) => Some(record),
                _ => None,
            }
        })
        .collect();
    let inserted = services.insert_many(&records)?;
    tracing::info!(inserted, "[Seed] Loaded default service catalogue");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_registers_every_garage_collection() {
        let store = MemoryStore::new();
        register_garage_collections(&store).unwrap();
        register_garage_collections(&store).unwrap();
        assert_eq!(
            store.collections().unwrap().names(),
            vec![
                "customers",
                "jobcards",
                "laborentries",
                "inventories",
                "suppliers",
                "users",
                "services"
            ]
        );
    }

    #[test]
    fn test_seed_services_only_when_empty() {
        let store = MemoryStore::new();
        register_garage_collections(&store).unwrap();

        assert_eq!(seed_services(&store).unwrap(), SERVICE_CATALOGUE.len());
        assert_eq!(seed_services(&store).unwrap(), 0);

        let live = store.collections().unwrap();
        let services = live.resolve("services").unwrap().find_all().unwrap();
        assert_eq!(services[3]["title"], "Oil Change");
        assert!(services.iter().all(|s| s["_id"].is_string()));
    }
}
