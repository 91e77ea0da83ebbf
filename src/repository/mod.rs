//! Generic entity repository
//!
//! [`EntityRepository`] owns the transaction boundaries: every create, update
//! and delete touches the entity table and the relationship table inside one
//! write transaction. Per-type behaviour comes from an [`EntityHandler`].

pub mod messaging;

pub use messaging::{MessagingServiceHandler, MessagingServiceRepository, MessagingServiceUpdate};

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::entity::{CatalogEntity, EntityRecord, EntityReference, Fields};
use crate::paging::{PageRequest, ResultList, page_bounds};
use crate::storage::{ListQuery, Storage, StoreTx, TxMode};
use crate::{Error, Result};

/// Version assigned by `create`
pub const INITIAL_VERSION: u64 = 1;

/// Upper bound on page sizes unless configured otherwise
pub const DEFAULT_MAX_LIMIT: usize = 1000;

/// Per-type behaviour plugged into the generic repository.
///
/// Every method is required; there is no fallback behaviour for an entity
/// type that forgets one.
pub trait EntityHandler {
    type Entity: CatalogEntity;

    /// Field-level changes accepted by `update`
    type Update;

    /// Relationship-derived fields callers may request
    fn allowed_fields(&self) -> &'static [&'static str];

    fn fully_qualified_name(&self, entity: &Self::Entity) -> String;

    /// Reject an entity before anything is written
    fn validate(&self, entity: &Self::Entity) -> Result<()>;

    fn apply_update(&self, entity: &mut Self::Entity, update: Self::Update);

    /// Write the edges implied by `entity`.
    ///
    /// `previous` is the fully loaded stored state on update, `None` on create.
    fn store_relationships(
        &self,
        tx: &dyn StoreTx,
        entity: &Self::Entity,
        previous: Option<&Self::Entity>,
    ) -> Result<()>;

    /// Populate the requested relationship-derived fields
    fn set_fields(
        &self,
        tx: &dyn StoreTx,
        entity: Self::Entity,
        fields: &Fields,
    ) -> Result<Self::Entity>;

    fn result_list(
        &self,
        entities: Vec<Self::Entity>,
        before: Option<String>,
        after: Option<String>,
        total: usize,
    ) -> ResultList<Self::Entity>;
}

/// Filter applied to `list`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub name_prefix: Option<String>,
}

impl ListFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_name_prefix(prefix: impl Into<String>) -> Self {
        Self {
            name_prefix: Some(prefix.into()),
        }
    }
}

/// Transactional repository for one entity type.
pub struct EntityRepository<S, H> {
    storage: Arc<S>,
    handler: H,
    max_limit: usize,
}

impl<S: Storage, H: EntityHandler> EntityRepository<S, H> {
    pub fn new(storage: Arc<S>, handler: H) -> Self {
        Self {
            storage,
            handler,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }

    pub fn with_max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Parse a comma separated field list against this type's allowed fields
    pub fn fields(&self, param: Option<&str>) -> Result<Fields> {
        Fields::parse(self.handler.allowed_fields(), param)
    }

    pub fn get(&self, id: Uuid, fields: &Fields) -> Result<H::Entity> {
        let entity_type = <H::Entity as CatalogEntity>::ENTITY_TYPE;
        tracing::debug!(entity_type, %id, "get entity");

        self.storage.transaction(TxMode::Read, |tx| {
            let entity = tx.find_by_id(entity_type, id)?.decode()?;
            self.handler.set_fields(tx, entity, fields)
        })
    }

    pub fn get_by_name(&self, name: &str, fields: &Fields) -> Result<H::Entity> {
        let entity_type = <H::Entity as CatalogEntity>::ENTITY_TYPE;
        tracing::debug!(entity_type, name, "get entity by name");

        self.storage.transaction(TxMode::Read, |tx| {
            let entity = tx.find_by_name(entity_type, name)?.decode()?;
            self.handler.set_fields(tx, entity, fields)
        })
    }

    /// One page of entities ordered by name, with the unpaginated total
    pub fn list(
        &self,
        filter: &ListFilter,
        fields: &Fields,
        page: &PageRequest,
    ) -> Result<ResultList<H::Entity>> {
        let entity_type = <H::Entity as CatalogEntity>::ENTITY_TYPE;
        let position = page.position(self.max_limit)?;
        let query = ListQuery {
            name_prefix: filter.name_prefix.clone(),
            position,
            limit: page.limit + 1,
        };
        tracing::debug!(entity_type, limit = page.limit, position = ?query.position, "list entities");

        self.storage.transaction(TxMode::Read, |tx| {
            let total = tx.count(entity_type, filter.name_prefix.as_deref())?;
            let records = tx.list(entity_type, &query)?;
            let (records, before, after) =
                page_bounds(records, &query.position, page.limit, |r| r.name.as_str());

            let mut entities = Vec::with_capacity(records.len());
            for record in &records {
                let entity = record.decode()?;
                entities.push(self.handler.set_fields(tx, entity, fields)?);
            }
            Ok(self.handler.result_list(entities, before, after, total))
        })
    }

    /// Persist a new entity and its relationships.
    ///
    /// Returns the entity as stored: fully qualified name, version and
    /// timestamp assigned here, and every relationship field read back from
    /// the relationship table.
    pub fn create(&self, entity: H::Entity) -> Result<H::Entity> {
        let entity_type = <H::Entity as CatalogEntity>::ENTITY_TYPE;
        if let Err(e) = self.handler.validate(&entity) {
            tracing::warn!(entity_type, name = entity.name(), error = %e, "rejected create");
            return Err(e);
        }

        let mut entity = entity;
        let fqn = self.handler.fully_qualified_name(&entity);
        entity.set_fully_qualified_name(fqn);
        entity.set_version(INITIAL_VERSION);
        entity.set_updated_at(Utc::now());
        let record = EntityRecord::from_entity(&entity)?;

        let all_fields = Fields::all(self.handler.allowed_fields());
        let created = self.storage.transaction(TxMode::Write, |tx| {
            tx.insert(&record)?;
            self.handler.store_relationships(tx, &entity, None)?;
            self.handler
                .set_fields(tx, entity.without_relationships(), &all_fields)
        })?;

        tracing::info!(
            entity_type,
            id = %created.id(),
            name = created.name(),
            version = INITIAL_VERSION,
            "created entity"
        );
        Ok(created)
    }

    /// Apply `update` to the current stored version
    pub fn update(&self, id: Uuid, update: H::Update) -> Result<H::Entity> {
        self.update_entity(id, None, update)
    }

    /// Apply `update` only if the stored version is still `expected_version`
    pub fn update_if_version(
        &self,
        id: Uuid,
        expected_version: u64,
        update: H::Update,
    ) -> Result<H::Entity> {
        self.update_entity(id, Some(expected_version), update)
    }

    fn update_entity(
        &self,
        id: Uuid,
        expected_version: Option<u64>,
        update: H::Update,
    ) -> Result<H::Entity> {
        let entity_type = <H::Entity as CatalogEntity>::ENTITY_TYPE;
        let all_fields = Fields::all(self.handler.allowed_fields());

        let updated = self.storage.transaction(TxMode::Write, |tx| {
            let stored: H::Entity = tx.find_by_id(entity_type, id)?.decode()?;
            let current = stored.version();
            if let Some(expected) = expected_version {
                if expected != current {
                    return Err(Error::Conflict(format!(
                        "{} {} is at version {}, expected {}",
                        entity_type, id, current, expected
                    )));
                }
            }

            let previous = self.handler.set_fields(tx, stored, &all_fields)?;
            let mut updated = previous.clone();
            self.handler.apply_update(&mut updated, update);
            if let Err(e) = self.handler.validate(&updated) {
                tracing::warn!(entity_type, %id, error = %e, "rejected update");
                return Err(e);
            }

            let fqn = self.handler.fully_qualified_name(&updated);
            updated.set_fully_qualified_name(fqn);
            updated.set_version(current + 1);
            updated.set_updated_at(Utc::now());

            tx.update(&EntityRecord::from_entity(&updated)?, current)?;
            self.handler.store_relationships(tx, &updated, Some(&previous))?;
            self.handler
                .set_fields(tx, updated.without_relationships(), &all_fields)
        })?;

        tracing::info!(
            entity_type,
            %id,
            name = updated.name(),
            version = updated.version(),
            "updated entity"
        );
        Ok(updated)
    }

    /// Delete an entity and every relationship touching it
    pub fn delete(&self, id: Uuid) -> Result<()> {
        let entity_type = <H::Entity as CatalogEntity>::ENTITY_TYPE;

        let edges = self.storage.transaction(TxMode::Write, |tx| {
            if tx.delete(entity_type, id)? == 0 {
                return Err(Error::not_found(entity_type, id.to_string()));
            }
            tx.delete_all(&EntityReference::new(id, entity_type))
        })?;

        tracing::info!(entity_type, %id, relationships = edges, "deleted entity");
        Ok(())
    }
}
