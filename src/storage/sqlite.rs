//! SQLite storage implementation

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use uuid::Uuid;

use super::{EntityStore, ListQuery, RelationshipStore, Storage, StoreTx, TxMode, schema};
use crate::entity::{EntityRecord, EntityReference};
use crate::paging::PagePosition;
use crate::relationship::{EntityRelationship, Relationship};
use crate::{Error, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ENTITY_COLUMNS: &str = "id, entity_type, name, version, document";

const RELATIONSHIP_COLUMNS: &str = "from_id, from_entity, to_id, to_entity, relation";

/// SQLite-backed storage for catalog entities and relationships
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        for stmt in schema::all_schema_statements() {
            conn.execute(stmt, [])?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;

        let mut stmt = conn.prepare(
            "SELECT entity_type, COUNT(*) FROM entities GROUP BY entity_type ORDER BY entity_type",
        )?;
        let entities = stmt
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                Ok((row.get::<_, String>(0)?, count as usize))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let relationships: i64 =
            conn.query_row("SELECT COUNT(*) FROM entity_relationships", [], |row| row.get(0))?;

        Ok(DbStats {
            entities,
            relationships: relationships as usize,
        })
    }
}

impl Storage for SqliteStore {
    fn transaction<T>(
        &self,
        mode: TxMode,
        f: impl FnOnce(&dyn StoreTx) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let behavior = match mode {
            TxMode::Read => TransactionBehavior::Deferred,
            TxMode::Write => TransactionBehavior::Immediate,
        };

        // Dropping an uncommitted rusqlite transaction rolls it back
        let scope = SqliteTx {
            tx: conn.transaction_with_behavior(behavior)?,
        };
        let value = f(&scope)?;
        scope.tx.commit()?;
        Ok(value)
    }
}

/// An open transaction implementing both stores
pub struct SqliteTx<'conn> {
    tx: rusqlite::Transaction<'conn>,
}

impl SqliteTx<'_> {
    fn query_records(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<EntityRecord>> {
        let mut stmt = self.tx.prepare(sql)?;
        let records = stmt
            .query_map(params, row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn query_relationships(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<EntityRelationship>> {
        let mut stmt = self.tx.prepare(sql)?;
        let edges = stmt
            .query_map(params, row_to_relationship)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    fn stored_version(&self, entity_type: &str, id: Uuid) -> Result<Option<u64>> {
        let version: Option<i64> = self
            .tx
            .query_row(
                "SELECT version FROM entities WHERE entity_type = ?1 AND id = ?2",
                params![entity_type, id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.map(|v| v as u64))
    }
}

// ========== Entity Operations ==========

impl EntityStore for SqliteTx<'_> {
    fn find_by_id(&self, entity_type: &str, id: Uuid) -> Result<EntityRecord> {
        self.tx
            .query_row(
                &format!(
                    "SELECT {} FROM entities WHERE entity_type = ?1 AND id = ?2",
                    ENTITY_COLUMNS
                ),
                params![entity_type, id.to_string()],
                row_to_record,
            )
            .optional()?
            .ok_or_else(|| Error::not_found(entity_type, id.to_string()))
    }

    fn find_by_name(&self, entity_type: &str, name: &str) -> Result<EntityRecord> {
        self.tx
            .query_row(
                &format!(
                    "SELECT {} FROM entities WHERE entity_type = ?1 AND name = ?2",
                    ENTITY_COLUMNS
                ),
                params![entity_type, name],
                row_to_record,
            )
            .optional()?
            .ok_or_else(|| Error::not_found(entity_type, name))
    }

    fn list(&self, entity_type: &str, query: &ListQuery) -> Result<Vec<EntityRecord>> {
        let prefix = query.name_prefix.as_deref();
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let filter = "entity_type = ?1 AND (?2 IS NULL OR substr(name, 1, length(?2)) = ?2)";

        match &query.position {
            PagePosition::First => self.query_records(
                &format!(
                    "SELECT {} FROM entities WHERE {} ORDER BY name ASC LIMIT ?3",
                    ENTITY_COLUMNS, filter
                ),
                params![entity_type, prefix, limit],
            ),
            PagePosition::After(name) => self.query_records(
                &format!(
                    "SELECT {} FROM entities WHERE {} AND name > ?3 ORDER BY name ASC LIMIT ?4",
                    ENTITY_COLUMNS, filter
                ),
                params![entity_type, prefix, name, limit],
            ),
            PagePosition::Before(name) => self.query_records(
                &format!(
                    "SELECT {} FROM entities WHERE {} AND name < ?3 ORDER BY name DESC LIMIT ?4",
                    ENTITY_COLUMNS, filter
                ),
                params![entity_type, prefix, name, limit],
            ),
        }
    }

    fn count(&self, entity_type: &str, name_prefix: Option<&str>) -> Result<usize> {
        let count: i64 = self.tx.query_row(
            "SELECT COUNT(*) FROM entities
             WHERE entity_type = ?1 AND (?2 IS NULL OR substr(name, 1, length(?2)) = ?2)",
            params![entity_type, name_prefix],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn insert(&self, record: &EntityRecord) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO entities (id, entity_type, name, version, document)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id.to_string(),
                    record.entity_type,
                    record.name,
                    record.version as i64,
                    record.document,
                ],
            )
            .map_err(|e| conflict_or(e, record))?;
        Ok(())
    }

    fn update(&self, record: &EntityRecord, expected_version: u64) -> Result<()> {
        let changed = self
            .tx
            .execute(
                "UPDATE entities SET name = ?3, version = ?4, document = ?5
                 WHERE entity_type = ?1 AND id = ?2 AND version = ?6",
                params![
                    record.entity_type,
                    record.id.to_string(),
                    record.name,
                    record.version as i64,
                    record.document,
                    expected_version as i64,
                ],
            )
            .map_err(|e| conflict_or(e, record))?;

        if changed > 0 {
            return Ok(());
        }
        match self.stored_version(&record.entity_type, record.id)? {
            None => Err(Error::not_found(&record.entity_type, record.id.to_string())),
            Some(stored) => Err(Error::Conflict(format!(
                "{} {} was modified concurrently: stored version {}, expected {}",
                record.entity_type, record.id, stored, expected_version
            ))),
        }
    }

    fn delete(&self, entity_type: &str, id: Uuid) -> Result<usize> {
        let removed = self.tx.execute(
            "DELETE FROM entities WHERE entity_type = ?1 AND id = ?2",
            params![entity_type, id.to_string()],
        )?;
        Ok(removed)
    }
}

// ========== Relationship Operations ==========

impl RelationshipStore for SqliteTx<'_> {
    fn insert_relationship(&self, edge: &EntityRelationship) -> Result<()> {
        self.tx.execute(
            r#"
            INSERT OR IGNORE INTO entity_relationships (from_id, from_entity, to_id, to_entity, relation)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                edge.from_id.to_string(),
                edge.from_entity,
                edge.to_id.to_string(),
                edge.to_entity,
                edge.relation.as_str(),
            ],
        )?;
        Ok(())
    }

    fn find_to(
        &self,
        from: &EntityReference,
        relation: Relationship,
        to_entity: Option<&str>,
    ) -> Result<Vec<EntityReference>> {
        let edges = self.query_relationships(
            &format!(
                "SELECT {} FROM entity_relationships
                 WHERE from_id = ?1 AND from_entity = ?2 AND relation = ?3
                   AND (?4 IS NULL OR to_entity = ?4)
                 ORDER BY to_id",
                RELATIONSHIP_COLUMNS
            ),
            params![from.id.to_string(), from.entity_type, relation.as_str(), to_entity],
        )?;
        Ok(edges.iter().map(EntityRelationship::to_ref).collect())
    }

    fn find_from(
        &self,
        to: &EntityReference,
        relation: Relationship,
        from_entity: Option<&str>,
    ) -> Result<Vec<EntityReference>> {
        let edges = self.query_relationships(
            &format!(
                "SELECT {} FROM entity_relationships
                 WHERE to_id = ?1 AND to_entity = ?2 AND relation = ?3
                   AND (?4 IS NULL OR from_entity = ?4)
                 ORDER BY from_id",
                RELATIONSHIP_COLUMNS
            ),
            params![to.id.to_string(), to.entity_type, relation.as_str(), from_entity],
        )?;
        Ok(edges.iter().map(EntityRelationship::from_ref).collect())
    }

    fn relationships_of(&self, entity: &EntityReference) -> Result<Vec<EntityRelationship>> {
        self.query_relationships(
            &format!(
                "SELECT {} FROM entity_relationships
                 WHERE (from_id = ?1 AND from_entity = ?2) OR (to_id = ?1 AND to_entity = ?2)
                 ORDER BY relation, from_id, to_id",
                RELATIONSHIP_COLUMNS
            ),
            params![entity.id.to_string(), entity.entity_type],
        )
    }

    fn delete_relationship(
        &self,
        from: &EntityReference,
        to: &EntityReference,
        relation: Relationship,
    ) -> Result<usize> {
        let removed = self.tx.execute(
            "DELETE FROM entity_relationships
             WHERE from_id = ?1 AND from_entity = ?2 AND to_id = ?3 AND to_entity = ?4
               AND relation = ?5",
            params![
                from.id.to_string(),
                from.entity_type,
                to.id.to_string(),
                to.entity_type,
                relation.as_str(),
            ],
        )?;
        Ok(removed)
    }

    fn delete_all(&self, entity: &EntityReference) -> Result<usize> {
        let removed = self.tx.execute(
            "DELETE FROM entity_relationships
             WHERE (from_id = ?1 AND from_entity = ?2) OR (to_id = ?1 AND to_entity = ?2)",
            params![entity.id.to_string(), entity.entity_type],
        )?;
        Ok(removed)
    }

    fn count_relationships(&self) -> Result<usize> {
        let count: i64 =
            self.tx
                .query_row("SELECT COUNT(*) FROM entity_relationships", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Unique-constraint failures become `Conflict`, everything else stays a storage error
fn conflict_or(err: rusqlite::Error, record: &EntityRecord) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Conflict(format!(
                "{} with id {} or name '{}' already exists",
                record.entity_type, record.id, record.name
            ))
        }
        _ => err.into(),
    }
}

fn parse_uuid(idx: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Helper to convert a row to an EntityRecord
fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<EntityRecord> {
    let id_str: String = row.get(0)?;
    let version: i64 = row.get(3)?;

    Ok(EntityRecord {
        id: parse_uuid(0, &id_str)?,
        entity_type: row.get(1)?,
        name: row.get(2)?,
        version: u64::try_from(version)
            .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(3, version))?,
        document: row.get(4)?,
    })
}

/// Helper to convert a row to an EntityRelationship
fn row_to_relationship(row: &rusqlite::Row) -> rusqlite::Result<EntityRelationship> {
    let from_str: String = row.get(0)?;
    let to_str: String = row.get(2)?;
    let relation_str: String = row.get(4)?;

    let relation: Relationship = relation_str.parse().map_err(|e: Error| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(EntityRelationship {
        from_id: parse_uuid(0, &from_str)?,
        from_entity: row.get(1)?,
        to_id: parse_uuid(2, &to_str)?,
        to_entity: row.get(3)?,
        relation,
    })
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    /// Entity count per entity type
    pub entities: Vec<(String, usize)>,
    pub relationships: usize,
}

impl DbStats {
    pub fn total_entities(&self) -> usize {
        self.entities.iter().map(|(_, count)| count).sum()
    }
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Catalog Statistics:")?;
        writeln!(f, "  Entities: {}", self.total_entities())?;
        for (entity_type, count) in &self.entities {
            writeln!(f, "    {}: {}", entity_type, count)?;
        }
        writeln!(f, "  Relationships: {}", self.relationships)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(name: &str) -> EntityRecord {
        EntityRecord {
            id: Uuid::new_v4(),
            entity_type: "messagingService".to_string(),
            name: name.to_string(),
            version: 1,
            document: format!(r#"{{"name":"{}"}}"#, name),
        }
    }

    fn first_page(limit: usize) -> ListQuery {
        ListQuery {
            name_prefix: None,
            position: PagePosition::First,
            limit,
        }
    }

    #[test]
    fn test_entity_crud() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = sample_record("kafka-prod");

        store.transaction(TxMode::Write, |tx| tx.insert(&record)).unwrap();

        let by_id = store
            .transaction(TxMode::Read, |tx| tx.find_by_id("messagingService", record.id))
            .unwrap();
        assert_eq!(by_id, record);

        let by_name = store
            .transaction(TxMode::Read, |tx| tx.find_by_name("messagingService", "kafka-prod"))
            .unwrap();
        assert_eq!(by_name.id, record.id);

        let removed = store
            .transaction(TxMode::Write, |tx| tx.delete("messagingService", record.id))
            .unwrap();
        assert_eq!(removed, 1);

        let err = store
            .transaction(TxMode::Read, |tx| tx.find_by_id("messagingService", record.id))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_ids_and_names_are_scoped_by_type() {
        let store = SqliteStore::open_in_memory().unwrap();
        let service = sample_record("shared");
        let topic = EntityRecord {
            entity_type: "topic".to_string(),
            id: service.id,
            ..sample_record("shared")
        };

        store.transaction(TxMode::Write, |tx| tx.insert(&service)).unwrap();
        store.transaction(TxMode::Write, |tx| tx.insert(&topic)).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_entities(), 2);
    }

    #[test]
    fn test_insert_conflict() {
        let store = SqliteStore::open_in_memory().unwrap();
        let original = sample_record("kafka-prod");
        store.transaction(TxMode::Write, |tx| tx.insert(&original)).unwrap();

        let same_name = sample_record("kafka-prod");
        let err = store.transaction(TxMode::Write, |tx| tx.insert(&same_name)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let same_id = EntityRecord {
            id: original.id,
            ..sample_record("other")
        };
        let err = store.transaction(TxMode::Write, |tx| tx.insert(&same_id)).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_update_checks_version() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut record = sample_record("kafka-prod");
        store.transaction(TxMode::Write, |tx| tx.insert(&record)).unwrap();

        record.version = 2;
        record.document = r#"{"name":"kafka-prod","v":2}"#.to_string();
        store.transaction(TxMode::Write, |tx| tx.update(&record, 1)).unwrap();

        // Stale writer still thinks version 1 is current
        let stale = EntityRecord {
            version: 2,
            document: "{}".to_string(),
            ..record.clone()
        };
        let err = store.transaction(TxMode::Write, |tx| tx.update(&stale, 1)).unwrap_err();
        assert!(matches!(err, Error::Conflict(msg) if msg.contains("stored version 2")));

        let missing = sample_record("ghost");
        let err = store.transaction(TxMode::Write, |tx| tx.update(&missing, 1)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_list_ordering_and_prefix() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .transaction(TxMode::Write, |tx| {
                for name in ["pulsar-a", "kafka-c", "kafka-a", "kafka-b"] {
                    tx.insert(&sample_record(name))?;
                }
                Ok(())
            })
            .unwrap();

        let all = store
            .transaction(TxMode::Read, |tx| tx.list("messagingService", &first_page(10)))
            .unwrap();
        let names: Vec<_> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["kafka-a", "kafka-b", "kafka-c", "pulsar-a"]);

        let query = ListQuery {
            name_prefix: Some("kafka".to_string()),
            position: PagePosition::Before("kafka-c".to_string()),
            limit: 10,
        };
        let before = store
            .transaction(TxMode::Read, |tx| tx.list("messagingService", &query))
            .unwrap();
        let names: Vec<_> = before.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["kafka-b", "kafka-a"]);

        let count = store
            .transaction(TxMode::Read, |tx| tx.count("messagingService", Some("kafka")))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_relationship_cleanup_both_directions() {
        let store = SqliteStore::open_in_memory().unwrap();
        let service = EntityReference::new(Uuid::new_v4(), "messagingService");
        let topic = EntityReference::new(Uuid::new_v4(), "topic");
        let team = EntityReference::new(Uuid::new_v4(), "team");
        let other = EntityReference::new(Uuid::new_v4(), "topic");

        store
            .transaction(TxMode::Write, |tx| {
                tx.insert_relationship(&EntityRelationship::new(&service, &topic, Relationship::Contains))?;
                tx.insert_relationship(&EntityRelationship::new(&team, &service, Relationship::Owns))?;
                tx.insert_relationship(&EntityRelationship::new(&team, &other, Relationship::Owns))?;
                // Duplicate is ignored
                tx.insert_relationship(&EntityRelationship::new(&team, &other, Relationship::Owns))
            })
            .unwrap();

        let (topics, owners) = store
            .transaction(TxMode::Read, |tx| {
                Ok((
                    tx.find_to(&service, Relationship::Contains, Some("topic"))?,
                    tx.find_from(&service, Relationship::Owns, None)?,
                ))
            })
            .unwrap();
        assert_eq!(topics, vec![topic.clone()]);
        assert_eq!(owners, vec![team.clone()]);

        let removed = store.transaction(TxMode::Write, |tx| tx.delete_all(&service)).unwrap();
        assert_eq!(removed, 2);

        let (remaining, total) = store
            .transaction(TxMode::Read, |tx| {
                Ok((tx.relationships_of(&service)?, tx.count_relationships()?))
            })
            .unwrap();
        assert!(remaining.is_empty());
        assert_eq!(total, 1);
    }

    #[test]
    fn test_relationships_scoped_by_endpoint_type() {
        let store = SqliteStore::open_in_memory().unwrap();
        let shared_id = Uuid::new_v4();
        let service = EntityReference::new(shared_id, "messagingService");
        let topic = EntityReference::new(shared_id, "topic");
        let team = EntityReference::new(Uuid::new_v4(), "team");

        store
            .transaction(TxMode::Write, |tx| {
                tx.insert_relationship(&EntityRelationship::new(&team, &topic, Relationship::Owns))?;
                tx.insert_relationship(&EntityRelationship::new(&service, &topic, Relationship::Contains))
            })
            .unwrap();

        let owners = store
            .transaction(TxMode::Read, |tx| tx.find_from(&service, Relationship::Owns, None))
            .unwrap();
        assert!(owners.is_empty());

        let removed = store.transaction(TxMode::Write, |tx| tx.delete_all(&service)).unwrap();
        assert_eq!(removed, 1);

        let left = store
            .transaction(TxMode::Read, |tx| tx.relationships_of(&topic))
            .unwrap();
        assert_eq!(left, vec![EntityRelationship::new(&team, &topic, Relationship::Owns)]);

        let removed = store
            .transaction(TxMode::Write, |tx| {
                tx.delete_relationship(&team, &service, Relationship::Owns)
            })
            .unwrap();
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = sample_record("kafka-prod");

        let result: Result<()> = store.transaction(TxMode::Write, |tx| {
            tx.insert(&first)?;
            Err(Error::InvalidInput("abort".to_string()))
        });
        assert!(result.is_err());

        let count = store
            .transaction(TxMode::Read, |tx| tx.count("messagingService", None))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_reopen_persists() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("catalog.db");
        let record = sample_record("kafka-prod");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.transaction(TxMode::Write, |tx| tx.insert(&record)).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store
            .transaction(TxMode::Read, |tx| tx.find_by_name("messagingService", "kafka-prod"))
            .unwrap();
        assert_eq!(loaded, record);
    }
}
