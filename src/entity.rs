//! Entity types shared by every catalog entity
//!
//! An entity is persisted as one [`EntityRecord`]: identity columns plus the
//! JSON document. Fields derived from relationships (owners, children) are
//! never part of the document; they are loaded on request through [`Fields`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Capabilities the generic repository needs from a catalog entity.
pub trait CatalogEntity: Serialize + DeserializeOwned + Clone {
    /// Type tag, also the namespace in which `id` and `name` are unique.
    const ENTITY_TYPE: &'static str;

    fn id(&self) -> Uuid;
    fn name(&self) -> &str;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
    fn set_updated_at(&mut self, updated_at: DateTime<Utc>);
    fn set_fully_qualified_name(&mut self, fqn: String);

    /// Copy of the entity with relationship-derived fields cleared.
    fn without_relationships(&self) -> Self;

    fn entity_reference(&self) -> EntityReference {
        EntityReference::new(self.id(), Self::ENTITY_TYPE)
    }
}

/// Lightweight pointer to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityReference {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub entity_type: String,
}

impl EntityReference {
    pub fn new(id: Uuid, entity_type: impl Into<String>) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
        }
    }
}

/// Row of the entity table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    pub id: Uuid,
    pub entity_type: String,
    pub name: String,
    pub version: u64,
    pub document: String,
}

impl EntityRecord {
    /// Serialize an entity into a storable record
    pub fn from_entity<E: CatalogEntity>(entity: &E) -> Result<Self> {
        let document = serde_json::to_string(&entity.without_relationships())?;
        Ok(Self {
            id: entity.id(),
            entity_type: E::ENTITY_TYPE.to_string(),
            name: entity.name().to_string(),
            version: entity.version(),
            document,
        })
    }

    /// Deserialize the document back into its entity type
    pub fn decode<E: CatalogEntity>(&self) -> Result<E> {
        if self.entity_type != E::ENTITY_TYPE {
            return Err(Error::InvalidInput(format!(
                "record {} is a {}, not a {}",
                self.id,
                self.entity_type,
                E::ENTITY_TYPE
            )));
        }
        let mut entity: E = serde_json::from_str(&self.document)?;
        entity.set_version(self.version);
        Ok(entity)
    }
}

/// Relationship-derived fields requested by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    names: BTreeSet<String>,
}

impl Fields {
    /// No relationship fields
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every field in `allowed`
    pub fn all(allowed: &[&str]) -> Self {
        Self {
            names: allowed.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Parse a comma separated field list, rejecting names outside `allowed`.
    ///
    /// `None` and blank input yield no fields; `*` selects all of them.
    pub fn parse(allowed: &[&str], param: Option<&str>) -> Result<Self> {
        let Some(param) = param.map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(Self::empty());
        };
        if param == "*" {
            return Ok(Self::all(allowed));
        }

        let mut names = BTreeSet::new();
        for field in param.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            if !allowed.contains(&field) {
                return Err(Error::InvalidInput(format!("Invalid field name {}", field)));
            }
            names.insert(field.to_string());
        }
        Ok(Self { names })
    }

    pub fn contains(&self, field: &str) -> bool {
        self.names.contains(field)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
