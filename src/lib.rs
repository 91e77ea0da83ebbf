//! # Metacat - Metadata catalog entity store
//!
//! Versioned JSON entities and the relationships between them.
//!
//! Metacat provides:
//! - An entity store keeping one versioned document per entity id and name
//! - A relationship store of directed edges between entity ids
//! - A generic repository that runs create/update/delete as single transactions
//! - Sparse field loading and cursor-based pagination
//! - Messaging services (Kafka, Pulsar) as the first concrete entity type

pub mod config;
pub mod entity;
pub mod messaging;
pub mod paging;
pub mod relationship;
pub mod repository;
pub mod schedule;
pub mod storage;
pub mod ui;

// Re-exports for convenient access
pub use entity::{CatalogEntity, EntityRecord, EntityReference, Fields};
pub use messaging::{MessagingService, MessagingServiceType};
pub use paging::{PageRequest, Paging, ResultList};
pub use relationship::{EntityRelationship, Relationship};
pub use repository::{
    EntityHandler, EntityRepository, ListFilter, MessagingServiceRepository, MessagingServiceUpdate,
};
pub use schedule::Schedule;
pub use storage::{SqliteStore, Storage, TxMode};

/// Result type alias for Metacat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Metacat operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{entity_type} instance for {key} not found")]
    NotFound { entity_type: String, key: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Storage connection lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(entity_type: &str, key: impl Into<String>) -> Self {
        Error::NotFound {
            entity_type: entity_type.to_string(),
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
