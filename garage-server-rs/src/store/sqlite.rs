//! SQLite-backed document store.
//!
//! Collections are rows in the `collections` registry table; records live in
//! `documents` as JSON text, ordered by their insertion sequence.

use super::schema::{validate_name, UniqueIndex};
use super::{
    Collection, CollectionSchema, CollectionSet, DocumentStore, Record, ReplaceBatch, StoreError,
};
use crate::db::connection::DbPool;
use rusqlite::{params, Connection};

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_fields(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn load_schemas(conn: &Connection) -> Result<Vec<CollectionSchema>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT name, required_fields, unique_fields FROM collections ORDER BY rowid")?;
    let rows = stmt.query_map([], |row| {
        Ok(CollectionSchema {
            name: row.get(0)?,
            required: parse_fields(&row.get::<_, String>(1)?),
            unique: parse_fields(&row.get::<_, String>(2)?),
        })
    })?;
    let mut schemas = Vec::new();
    for schema in rows {
        schemas.push(schema?);
    }
    Ok(schemas)
}

fn load_schema(conn: &Connection, name: &str) -> Result<CollectionSchema, StoreError> {
    load_schemas(conn)?
        .into_iter()
        .find(|s| s.name == name)
        .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
}

fn find_all(conn: &Connection, collection: &str) -> Result<Vec<Record>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT body FROM documents WHERE collection = ? ORDER BY seq")?;
    let rows = stmt.query_map(params![collection], |row| row.get::<_, String>(0))?;
    let mut records = Vec::new();
    for body in rows {
        records.push(serde_json::from_str(&body?)?);
    }
    Ok(records)
}

fn delete_all(conn: &Connection, collection: &str) -> Result<u64, StoreError> {
    let removed = conn.execute(
        "DELETE FROM documents WHERE collection = ?",
        params![collection],
    )?;
    Ok(removed as u64)
}

/// Inserts a batch on the given connection. Callers wrap this in a
/// transaction so a rejected record leaves nothing behind.
fn insert_batch(
    conn: &Connection,
    schema: &CollectionSchema,
    records: &[Record],
) -> Result<usize, StoreError> {
    let mut index = UniqueIndex::new(schema);
    if !schema.unique.is_empty() {
        for existing in find_all(conn, &schema.name)? {
            index.observe(&existing);
        }
    }

    let mut stmt =
        conn.prepare("INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)")?;
    for record in records {
        let (id, record) = schema.prepare(record)?;
        index.admit(&record)?;
        let body = serde_json::to_string(&record)?;
        stmt.execute(params![schema.name, id, body])?;
    }
    Ok(records.len())
}

impl DocumentStore for SqliteStore {
    fn register(&self, schema: &CollectionSchema) -> Result<(), StoreError> {
        validate_name(&schema.name)?;
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO collections (name, required_fields, unique_fields) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
               required_fields = excluded.required_fields,
               unique_fields = excluded.unique_fields",
            params![
                schema.name,
                serde_json::to_string(&schema.required)?,
                serde_json::to_string(&schema.unique)?
            ],
        )?;
        Ok(())
    }

    fn collections(&self) -> Result<CollectionSet, StoreError> {
        let conn = self.pool.get()?;
        let handles = load_schemas(&conn)?
            .into_iter()
            .map(|schema| {
                Box::new(SqliteCollection {
                    pool: self.pool.clone(),
                    name: schema.name,
                }) as Box<dyn Collection>
            })
            .collect();
        Ok(CollectionSet::new(handles))
    }

    fn replace_all_atomic(&self, batches: &[ReplaceBatch]) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let schemas = load_schemas(&tx)?;
        for batch in batches {
            let schema = schemas
                .iter()
                .find(|s| s.name == batch.collection)
                .ok_or_else(|| StoreError::UnknownCollection(batch.collection.clone()))?;
            let removed = delete_all(&tx, &schema.name)?;
            let inserted = insert_batch(&tx, schema, &batch.records)?;
            tracing::debug!(collection = %schema.name, removed, inserted, "Staged collection replacement");
        }
        tx.commit()?;
        Ok(())
    }
}

struct SqliteCollection {
    pool: DbPool,
    name: String,
}

impl Collection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_all(&self) -> Result<Vec<Record>, StoreError> {
        let conn = self.pool.get()?;
        find_all(&conn, &self.name)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?",
            params![self.name],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn delete_all(&self) -> Result<u64, StoreError> {
        let conn = self.pool.get()?;
        delete_all(&conn, &self.name)
    }

    fn insert_many(&self, records: &[Record]) -> Result<usize, StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let schema = load_schema(&tx, &self.name)?;
        let inserted = insert_batch(&tx, &schema, records)?;
        tx.commit()?;
        Ok(inserted)
    }
}
