//! Relationship types - directed edges between catalog entities
//!
//! Catalog topology reduces to a small set of relation kinds:
//! - `Contains`: service → topic, database → table
//! - `Owns`: user/team → entity
//! - `Uses`, `Upstream`, `JoinedWith`: lineage between data assets
//! - `Follows`, `Created`, `Has`, `ParentOf`, `AppliedTo`: bookkeeping

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::entity::EntityReference;

/// Relation kinds stored in the relationship table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relationship {
    /// Container holds an entity (service → topic)
    Contains,
    /// User created an entity
    Created,
    /// Entity uses another entity (pipeline → service)
    Uses,
    /// User or team owns an entity
    Owns,
    /// Hierarchy between entities of the same type (team → team)
    ParentOf,
    /// Entity has another entity attached (user → role)
    Has,
    /// User follows an entity
    Follows,
    /// Tables joined with each other
    JoinedWith,
    /// Lineage: source is upstream of target
    Upstream,
    /// Policy or tag applied to an entity
    AppliedTo,
}

impl Relationship {
    /// Get the string representation stored in the relationship table
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Contains => "contains",
            Relationship::Created => "created",
            Relationship::Uses => "uses",
            Relationship::Owns => "owns",
            Relationship::ParentOf => "parentOf",
            Relationship::Has => "has",
            Relationship::Follows => "follows",
            Relationship::JoinedWith => "joinedWith",
            Relationship::Upstream => "upstream",
            Relationship::AppliedTo => "appliedTo",
        }
    }

    /// Get all relation kinds
    pub fn all() -> &'static [Relationship] {
        &[
            Relationship::Contains,
            Relationship::Created,
            Relationship::Uses,
            Relationship::Owns,
            Relationship::ParentOf,
            Relationship::Has,
            Relationship::Follows,
            Relationship::JoinedWith,
            Relationship::Upstream,
            Relationship::AppliedTo,
        ]
    }
}

impl FromStr for Relationship {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(Relationship::Contains),
            "created" => Ok(Relationship::Created),
            "uses" => Ok(Relationship::Uses),
            "owns" => Ok(Relationship::Owns),
            "parentof" | "parent_of" => Ok(Relationship::ParentOf),
            "has" => Ok(Relationship::Has),
            "follows" => Ok(Relationship::Follows),
            "joinedwith" | "joined_with" => Ok(Relationship::JoinedWith),
            "upstream" => Ok(Relationship::Upstream),
            "appliedto" | "applied_to" => Ok(Relationship::AppliedTo),
            _ => Err(crate::Error::InvalidInput(format!("Unknown relationship: {}", s))),
        }
    }
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed edge between two catalog entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRelationship {
    pub from_id: Uuid,
    pub from_entity: String,
    pub to_id: Uuid,
    pub to_entity: String,
    pub relation: Relationship,
}

impl EntityRelationship {
    pub fn new(from: &EntityReference, to: &EntityReference, relation: Relationship) -> Self {
        Self {
            from_id: from.id,
            from_entity: from.entity_type.clone(),
            to_id: to.id,
            to_entity: to.entity_type.clone(),
            relation,
        }
    }

    /// Reference to the source entity
    pub fn from_ref(&self) -> EntityReference {
        EntityReference::new(self.from_id, &self.from_entity)
    }

    /// Reference to the target entity
    pub fn to_ref(&self) -> EntityReference {
        EntityReference::new(self.to_id, &self.to_entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_roundtrip() {
        for relation in Relationship::all() {
            let parsed: Relationship = relation.as_str().parse().unwrap();
            assert_eq!(*relation, parsed);
        }
    }

    #[test]
    fn test_relationship_aliases() {
        assert_eq!(Relationship::from_str("parent_of").unwrap(), Relationship::ParentOf);
        assert_eq!(Relationship::from_str("JoinedWith").unwrap(), Relationship::JoinedWith);
        assert!(Relationship::from_str("likes").is_err());
    }

    #[test]
    fn test_edge_endpoints() {
        let team = EntityReference::new(Uuid::new_v4(), "team");
        let service = EntityReference::new(Uuid::new_v4(), "messagingService");
        let edge = EntityRelationship::new(&team, &service, Relationship::Owns);

        assert_eq!(edge.from_ref(), team);
        assert_eq!(edge.to_ref(), service);
    }
}
