use tabled::{Table, Tabled, settings::Style};

use crate::entity::EntityReference;
use crate::messaging::MessagingService;
use crate::relationship::EntityRelationship;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    service_type: String,
    #[tabled(rename = "Brokers")]
    brokers: String,
    #[tabled(rename = "Schedule")]
    schedule: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Version")]
    version: u64,
}

impl From<&MessagingService> for ServiceRow {
    fn from(service: &MessagingService) -> Self {
        Self {
            name: service.name.clone(),
            service_type: service.service_type.to_string(),
            brokers: service.brokers.join(", "),
            schedule: service
                .ingestion_schedule
                .as_ref()
                .map(|s| s.repeat_frequency.clone())
                .unwrap_or_else(|| "-".to_string()),
            owner: service.owner.as_ref().map(reference_label).unwrap_or_else(|| "-".to_string()),
            version: service.version,
        }
    }
}

/// Table of services, one row each
pub fn service_table(services: &[MessagingService]) -> String {
    if services.is_empty() {
        return String::new();
    }
    let rows: Vec<ServiceRow> = services.iter().map(ServiceRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct RelationshipRow {
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "Relation")]
    relation: String,
    #[tabled(rename = "To")]
    to: String,
}

pub fn relationship_table(edges: &[EntityRelationship]) -> String {
    if edges.is_empty() {
        return String::new();
    }
    let rows: Vec<RelationshipRow> = edges
        .iter()
        .map(|edge| RelationshipRow {
            from: reference_label(&edge.from_ref()),
            relation: edge.relation.to_string(),
            to: reference_label(&edge.to_ref()),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// `type:id`, the same form the CLI accepts
pub fn reference_label(reference: &EntityReference) -> String {
    format!("{}:{}", reference.entity_type, reference.id)
}
