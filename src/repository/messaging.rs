//! Repository handler for messaging services

use serde::{Deserialize, Serialize};

use super::{EntityHandler, EntityRepository};
use crate::entity::{CatalogEntity, EntityReference, Fields};
use crate::messaging::{MessagingService, TOPIC};
use crate::paging::ResultList;
use crate::relationship::{EntityRelationship, Relationship};
use crate::schedule::{Schedule, SchedulePolicy};
use crate::storage::StoreTx;
use crate::{Error, Result};

pub const FIELD_OWNER: &str = "owner";
pub const FIELD_TOPICS: &str = "topics";

const ALLOWED_FIELDS: &[&str] = &[FIELD_OWNER, FIELD_TOPICS];

/// Entity types that may own a service
const OWNER_TYPES: &[&str] = &["user", "team"];

const MAX_NAME_LEN: usize = 128;

/// Repository for messaging services
pub type MessagingServiceRepository<S> = EntityRepository<S, MessagingServiceHandler>;

/// Field-level update of a messaging service; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagingServiceUpdate {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub brokers: Option<Vec<String>>,
    #[serde(default)]
    pub schema_registry: Option<String>,
    #[serde(default)]
    pub ingestion_schedule: Option<Schedule>,
    #[serde(default)]
    pub owner: Option<EntityReference>,
}

impl MessagingServiceUpdate {
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_brokers<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.brokers = Some(brokers.into_iter().map(Into::into).collect());
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

#[derive(Debug, Clone, Default)]
pub struct MessagingServiceHandler {
    schedule_policy: SchedulePolicy,
}

impl MessagingServiceHandler {
    pub fn new(schedule_policy: SchedulePolicy) -> Self {
        Self { schedule_policy }
    }
}

impl EntityHandler for MessagingServiceHandler {
    type Entity = MessagingService;
    type Update = MessagingServiceUpdate;

    fn allowed_fields(&self) -> &'static [&'static str] {
        ALLOWED_FIELDS
    }

    // Services are top level, so the name is already fully qualified
    fn fully_qualified_name(&self, service: &MessagingService) -> String {
        service.name.clone()
    }

    fn validate(&self, service: &MessagingService) -> Result<()> {
        validate_name(&service.name)?;

        if service.brokers.is_empty() {
            return Err(Error::InvalidInput(format!(
                "messaging service {} must list at least one broker",
                service.name
            )));
        }
        for broker in &service.brokers {
            validate_host_port(broker).map_err(|reason| {
                Error::InvalidInput(format!("invalid broker '{}': {}", broker, reason))
            })?;
        }

        if let Some(url) = &service.schema_registry {
            validate_http_url(url).map_err(|reason| {
                Error::InvalidInput(format!("invalid schema registry '{}': {}", url, reason))
            })?;
        }

        self.schedule_policy
            .validate(service.ingestion_schedule.as_ref())?;

        if let Some(owner) = &service.owner {
            if !OWNER_TYPES.contains(&owner.entity_type.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "owner must be a user or team, got {}",
                    owner.entity_type
                )));
            }
        }
        Ok(())
    }

    fn apply_update(&self, service: &mut MessagingService, update: MessagingServiceUpdate) {
        if let Some(description) = update.description {
            service.description = Some(description);
        }
        if let Some(brokers) = update.brokers {
            service.brokers = brokers;
        }
        if let Some(url) = update.schema_registry {
            service.schema_registry = Some(url);
        }
        if let Some(schedule) = update.ingestion_schedule {
            service.ingestion_schedule = Some(schedule);
        }
        if let Some(owner) = update.owner {
            service.owner = Some(owner);
        }
    }

    fn store_relationships(
        &self,
        tx: &dyn StoreTx,
        service: &MessagingService,
        previous: Option<&MessagingService>,
    ) -> Result<()> {
        let previous_owner = previous.and_then(|p| p.owner.as_ref());
        if previous_owner == service.owner.as_ref() {
            return Ok(());
        }

        let service_ref = service.entity_reference();
        if let Some(old) = previous_owner {
            tx.delete_relationship(old, &service_ref, Relationship::Owns)?;
        }
        if let Some(owner) = &service.owner {
            tx.insert_relationship(&EntityRelationship::new(owner, &service_ref, Relationship::Owns))?;
        }
        Ok(())
    }

    fn set_fields(
        &self,
        tx: &dyn StoreTx,
        mut service: MessagingService,
        fields: &Fields,
    ) -> Result<MessagingService> {
        let service_ref = service.entity_reference();
        if fields.contains(FIELD_OWNER) {
            service.owner = tx
                .find_from(&service_ref, Relationship::Owns, None)?
                .into_iter()
                .find(|r| OWNER_TYPES.contains(&r.entity_type.as_str()));
        }
        if fields.contains(FIELD_TOPICS) {
            service.topics = Some(tx.find_to(&service_ref, Relationship::Contains, Some(TOPIC))?);
        }
        Ok(service)
    }

    fn result_list(
        &self,
        services: Vec<MessagingService>,
        before: Option<String>,
        after: Option<String>,
        total: usize,
    ) -> ResultList<MessagingService> {
        ResultList::new(services, before, after, total)
    }
}

fn validate_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "name must be between 1 and {} characters",
            MAX_NAME_LEN
        )));
    }
    if name.contains('.') {
        return Err(Error::InvalidInput(format!(
            "name {} must not contain '.'",
            name
        )));
    }
    Ok(())
}

/// `host:port` with a DNS-style host or IPv4 address and a port in 1..=65535
fn validate_host_port(value: &str) -> std::result::Result<(), String> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| "expected host:port".to_string())?;

    if !is_valid_host(host) {
        return Err(format!("bad host '{}'", host));
    }
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(()),
        _ => Err(format!("port must be between 1 and 65535, got '{}'", port)),
    }
}

fn validate_http_url(url: &str) -> std::result::Result<(), String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| "expected an http or https URL".to_string())?;

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if authority.contains(':') {
        validate_host_port(authority)
    } else if is_valid_host(authority) {
        Ok(())
    } else {
        Err(format!("bad host '{}'", authority))
    }
}

fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 253
        && host.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::messaging::MessagingServiceType;
    use crate::storage::{SqliteStore, Storage, TxMode};

    fn repo() -> MessagingServiceRepository<SqliteStore> {
        let storage = Arc::new(SqliteStore::open_in_memory().unwrap());
        EntityRepository::new(storage, MessagingServiceHandler::default())
    }

    fn kafka_prod() -> MessagingService {
        MessagingService::new("kafka-prod", MessagingServiceType::Kafka)
            .with_brokers(["b1:9092"])
    }

    #[test]
    fn test_kafka_prod_lifecycle() {
        let repo = repo();
        let all = repo.fields(Some("*")).unwrap();
        let platform = EntityReference::new(Uuid::new_v4(), "team");

        let service = kafka_prod()
            .with_ingestion_schedule(Schedule::new("0 * * * *"))
            .with_owner(platform.clone());
        let created = repo.create(service).unwrap();
        assert_eq!(created.version, 1);

        let loaded = repo.get_by_name("kafka-prod", &all).unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.owner, Some(platform));

        let update = MessagingServiceUpdate::default()
            .with_ingestion_schedule(Schedule::new("*/5 * * * *"));
        let updated = repo.update(created.id, update).unwrap();
        assert_eq!(updated.version, 2);

        let loaded = repo.get(created.id, &all).unwrap();
        assert_eq!(loaded, updated);
        assert_eq!(loaded.brokers, vec!["b1:9092".to_string()]);
        assert_eq!(
            loaded.ingestion_schedule.map(|s| s.repeat_frequency),
            Some("*/5 * * * *".to_string())
        );

        repo.delete(created.id).unwrap();
        assert!(repo.get(created.id, &all).unwrap_err().is_not_found());

        let (edges, total) = repo
            .storage()
            .transaction(TxMode::Read, |tx| {
                Ok((tx.relationships_of(&created.entity_reference())?, tx.count_relationships()?))
            })
            .unwrap();
        assert!(edges.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn test_malformed_schedule_inserts_nothing() {
        let repo = repo();
        for expr in ["", "not a cron", "61 * * * *"] {
            let service = kafka_prod().with_ingestion_schedule(Schedule::new(expr));
            let err = repo.create(service).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{expr:?} accepted");
        }
        assert!(repo.get_by_name("kafka-prod", &Fields::empty()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_min_interval_policy() {
        let storage = Arc::new(SqliteStore::open_in_memory().unwrap());
        let repo = EntityRepository::new(
            storage,
            MessagingServiceHandler::new(SchedulePolicy::with_min_interval_minutes(60)),
        );

        let every_five = kafka_prod().with_ingestion_schedule(Schedule::new("*/5 * * * *"));
        assert!(matches!(repo.create(every_five), Err(Error::InvalidInput(_))));

        let hourly = kafka_prod().with_ingestion_schedule(Schedule::new("0 * * * *"));
        assert!(repo.create(hourly).is_ok());
    }

    #[test]
    fn test_rejected_update_keeps_stored_state() {
        let repo = repo();
        let created = repo.create(kafka_prod()).unwrap();

        let bad = MessagingServiceUpdate::default().with_brokers(["no-port"]);
        assert!(matches!(repo.update(created.id, bad), Err(Error::InvalidInput(_))));

        let loaded = repo.get(created.id, &Fields::empty()).unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.brokers, vec!["b1:9092".to_string()]);
    }

    #[test]
    fn test_owner_field_follows_updates() {
        let repo = repo();
        let alice = EntityReference::new(Uuid::new_v4(), "user");
        let platform = EntityReference::new(Uuid::new_v4(), "team");
        let owner_only = repo.fields(Some("owner")).unwrap();

        let created = repo.create(kafka_prod().with_owner(alice.clone())).unwrap();
        assert_eq!(repo.get(created.id, &owner_only).unwrap().owner, created.owner);

        // Not requested, so not loaded
        let bare = repo.get(created.id, &Fields::empty()).unwrap();
        assert_eq!(bare.owner, None);

        let updated = repo
            .update(created.id, MessagingServiceUpdate::default().with_owner(platform.clone()))
            .unwrap();
        assert_eq!(updated.owner, Some(platform.clone()));

        let loaded = repo.get(created.id, &owner_only).unwrap();
        assert_eq!(loaded.owner, Some(platform));

        let owned_by_alice = repo
            .storage()
            .transaction(TxMode::Read, |tx| tx.find_to(&alice, Relationship::Owns, None))
            .unwrap();
        assert!(owned_by_alice.is_empty());
    }

    #[test]
    fn test_topics_field() {
        let repo = repo();
        let created = repo.create(kafka_prod()).unwrap();
        let orders = EntityReference::new(Uuid::new_v4(), TOPIC);

        repo.storage()
            .transaction(TxMode::Write, |tx| {
                tx.insert_relationship(&EntityRelationship::new(
                    &created.entity_reference(),
                    &orders,
                    Relationship::Contains,
                ))
            })
            .unwrap();

        let fields = repo.fields(Some("*")).unwrap();
        let loaded = repo.get(created.id, &fields).unwrap();
        assert_eq!(loaded.topics, Some(vec![orders]));
        assert_eq!(loaded.owner, None);
    }

    #[test]
    fn test_validation_rules() {
        let handler = MessagingServiceHandler::default();
        let ok = kafka_prod();
        assert!(handler.validate(&ok).is_ok());

        let cases = vec![
            MessagingService { name: String::new(), ..ok.clone() },
            MessagingService { name: "a".repeat(129), ..ok.clone() },
            MessagingService { name: "kafka.prod".to_string(), ..ok.clone() },
            MessagingService { brokers: Vec::new(), ..ok.clone() },
            MessagingService { brokers: vec!["b1:0".to_string()], ..ok.clone() },
            MessagingService { brokers: vec!["b1:65536".to_string()], ..ok.clone() },
            MessagingService { brokers: vec![":9092".to_string()], ..ok.clone() },
            ok.clone().with_schema_registry("ftp://registry:8081"),
            ok.clone().with_owner(EntityReference::new(Uuid::new_v4(), "topic")),
        ];
        for service in cases {
            assert!(
                matches!(handler.validate(&service), Err(Error::InvalidInput(_))),
                "accepted {:?}",
                service
            );
        }

        let full = ok
            .with_brokers(["10.0.0.1:9092", "b2.internal:9093"])
            .with_schema_registry("https://registry.internal:8081/api")
            .with_owner(EntityReference::new(Uuid::new_v4(), "team"));
        assert!(handler.validate(&full).is_ok());
    }

    #[test]
    fn test_update_deserializes_partial_json() {
        let update: MessagingServiceUpdate =
            serde_json::from_str(r#"{"ingestionSchedule":{"repeatFrequency":"0 * * * *"}}"#)
                .unwrap();
        assert!(update.brokers.is_none());
        assert_eq!(
            update.ingestion_schedule.map(|s| s.repeat_frequency),
            Some("0 * * * *".to_string())
        );
    }
}
