//! Messaging service entity
//!
//! A messaging service is a Kafka or Pulsar cluster registered in the
//! catalog. Topics discovered by ingestion hang off the service through
//! `contains` edges; ownership is an incoming `owns` edge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::entity::{CatalogEntity, EntityReference};
use crate::schedule::Schedule;
use crate::{Error, Result};

/// Entity type tag for messaging services
pub const MESSAGING_SERVICE: &str = "messagingService";

/// Entity type tag for topics served by a messaging service
pub const TOPIC: &str = "topic";

/// Supported messaging platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessagingServiceType {
    Kafka,
    Pulsar,
}

impl MessagingServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessagingServiceType::Kafka => "Kafka",
            MessagingServiceType::Pulsar => "Pulsar",
        }
    }
}

impl FromStr for MessagingServiceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kafka" => Ok(MessagingServiceType::Kafka),
            "pulsar" => Ok(MessagingServiceType::Pulsar),
            _ => Err(Error::InvalidInput(format!("Unknown messaging service type: {}", s))),
        }
    }
}

impl std::fmt::Display for MessagingServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A messaging service registered in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagingService {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,
    pub service_type: MessagingServiceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Bootstrap brokers as `host:port`
    #[serde(default)]
    pub brokers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_registry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_schedule: Option<Schedule>,
    #[serde(default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    // Relationship-derived, never stored in the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<EntityReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<EntityReference>>,
}

impl MessagingService {
    /// Create a new, not yet persisted service with a fresh id
    pub fn new(name: impl Into<String>, service_type: MessagingServiceType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            fully_qualified_name: None,
            service_type,
            description: None,
            brokers: Vec::new(),
            schema_registry: None,
            ingestion_schedule: None,
            version: 0,
            updated_at: None,
            owner: None,
            topics: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_brokers<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.brokers = brokers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_schema_registry(mut self, url: impl Into<String>) -> Self {
        self.schema_registry = Some(url.into());
        self
    }

    pub fn with_ingestion_schedule(mut self, schedule: Schedule) -> Self {
        self.ingestion_schedule = Some(schedule);
        self
    }

    pub fn with_owner(mut self, owner: EntityReference) -> Self {
        self.owner = Some(owner);
        self
    }
}

impl CatalogEntity for MessagingService {
    const ENTITY_TYPE: &'static str = MESSAGING_SERVICE;

    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn set_updated_at(&mut self, updated_at: DateTime<Utc>) {
        self.updated_at = Some(updated_at);
    }

    fn set_fully_qualified_name(&mut self, fqn: String) {
        self.fully_qualified_name = Some(fqn);
    }

    fn without_relationships(&self) -> Self {
        Self {
            owner: None,
            topics: None,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type_parse() {
        assert_eq!(MessagingServiceType::from_str("kafka").unwrap(), MessagingServiceType::Kafka);
        assert_eq!(MessagingServiceType::from_str("Pulsar").unwrap(), MessagingServiceType::Pulsar);
        assert!(MessagingServiceType::from_str("rabbitmq").is_err());
    }

    #[test]
    fn test_document_omits_relationship_fields() {
        let service = MessagingService::new("kafka-prod", MessagingServiceType::Kafka)
            .with_brokers(["b1:9092"])
            .with_owner(EntityReference::new(Uuid::new_v4(), "team"));

        let stored = serde_json::to_value(service.without_relationships()).unwrap();
        assert!(stored.get("owner").is_none());
        assert_eq!(stored["serviceType"], "Kafka");
        assert_eq!(stored["brokers"][0], "b1:9092");
    }

    #[test]
    fn test_builder() {
        let service = MessagingService::new("pulsar-dev", MessagingServiceType::Pulsar)
            .with_description("dev cluster")
            .with_schema_registry("http://registry:8081")
            .with_ingestion_schedule(Schedule::new("0 * * * *"));

        assert_eq!(service.description.as_deref(), Some("dev cluster"));
        assert_eq!(service.ingestion_schedule.unwrap().repeat_frequency, "0 * * * *");
        assert_eq!(service.version, 0);
    }
}
