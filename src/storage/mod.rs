//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - entities(entity_type, id, name, version, document)
//! - entity_relationships(from_id, from_entity, to_id, to_entity, relation)
//!
//! Every access runs inside [`Storage::transaction`], which hands out a
//! handle implementing both [`EntityStore`] and [`RelationshipStore`] so a
//! repository operation touching both tables commits or rolls back as one.

pub mod schema;
pub mod sqlite;

pub use sqlite::{DbStats, SqliteStore, SqliteTx};

use uuid::Uuid;

use crate::Result;
use crate::entity::{EntityRecord, EntityReference};
use crate::paging::PagePosition;
use crate::relationship::{EntityRelationship, Relationship};

/// Filter and window for listing entities of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub name_prefix: Option<String>,
    pub position: PagePosition,
    /// Rows to fetch; callers ask for one more than the page size
    pub limit: usize,
}

/// Row-level access to the entity table.
pub trait EntityStore {
    fn find_by_id(&self, entity_type: &str, id: Uuid) -> Result<EntityRecord>;

    fn find_by_name(&self, entity_type: &str, name: &str) -> Result<EntityRecord>;

    /// Entities ordered by name ascending, or descending for `Before` positions
    fn list(&self, entity_type: &str, query: &ListQuery) -> Result<Vec<EntityRecord>>;

    fn count(&self, entity_type: &str, name_prefix: Option<&str>) -> Result<usize>;

    /// Fails with `Conflict` when the id or name is taken
    fn insert(&self, record: &EntityRecord) -> Result<()>;

    /// Full replace, applied only if the stored version equals `expected_version`
    fn update(&self, record: &EntityRecord, expected_version: u64) -> Result<()>;

    /// Number of rows removed (0 or 1)
    fn delete(&self, entity_type: &str, id: Uuid) -> Result<usize>;
}

/// Access to the relationship table.
///
/// Ids are only unique per entity type, so every endpoint is matched on its
/// full reference: id and type.
pub trait RelationshipStore {
    /// Idempotent: an existing identical edge is left as is
    fn insert_relationship(&self, edge: &EntityRelationship) -> Result<()>;

    /// Targets of `relation` edges leaving `from`
    fn find_to(
        &self,
        from: &EntityReference,
        relation: Relationship,
        to_entity: Option<&str>,
    ) -> Result<Vec<EntityReference>>;

    /// Sources of `relation` edges arriving at `to`
    fn find_from(
        &self,
        to: &EntityReference,
        relation: Relationship,
        from_entity: Option<&str>,
    ) -> Result<Vec<EntityReference>>;

    /// Edges with `entity` at either end
    fn relationships_of(&self, entity: &EntityReference) -> Result<Vec<EntityRelationship>>;

    fn delete_relationship(
        &self,
        from: &EntityReference,
        to: &EntityReference,
        relation: Relationship,
    ) -> Result<usize>;

    /// Remove every edge with `entity` as source or target
    fn delete_all(&self, entity: &EntityReference) -> Result<usize>;

    fn count_relationships(&self) -> Result<usize>;
}

/// Both stores, bound to one open transaction.
pub trait StoreTx: EntityStore + RelationshipStore {}

impl<T: EntityStore + RelationshipStore> StoreTx for T {}

/// Locking intent of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    Read,
    Write,
}

/// Source of transaction scopes.
pub trait Storage {
    /// Run `f` inside one transaction.
    ///
    /// Commits when `f` returns `Ok`; every other exit rolls back.
    fn transaction<T>(&self, mode: TxMode, f: impl FnOnce(&dyn StoreTx) -> Result<T>)
    -> Result<T>;
}
