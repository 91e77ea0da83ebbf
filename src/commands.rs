use std::sync::Arc;

use crate::{Context, OutputMode, emit_success};
use metacat::config::{self, MetacatConfig};
use metacat::repository::{ListFilter, MessagingServiceHandler};
use metacat::storage::{SqliteStore, Storage, TxMode};
use metacat::ui::{self, Icons};
use metacat::{
    EntityReference, EntityRelationship, EntityRepository, MessagingService,
    MessagingServiceRepository, MessagingServiceType, MessagingServiceUpdate, PageRequest,
    Relationship, Schedule,
};

pub struct CreateArgs {
    pub name: String,
    pub service_type: MessagingServiceType,
    pub brokers: Vec<String>,
    pub description: Option<String>,
    pub schema_registry: Option<String>,
    pub schedule: Option<String>,
    pub owner: Option<EntityReference>,
}

pub struct ListArgs {
    pub prefix: Option<String>,
    pub limit: Option<usize>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub fields: Option<String>,
}

pub struct UpdateArgs {
    pub name: String,
    pub description: Option<String>,
    pub brokers: Vec<String>,
    pub schema_registry: Option<String>,
    pub schedule: Option<String>,
    pub owner: Option<EntityReference>,
    pub expected_version: Option<u64>,
}

fn open_store(ctx: &Context) -> anyhow::Result<Arc<SqliteStore>> {
    let path = ctx.database_path();
    config::ensure_db_dir(path)?;
    tracing::debug!("Opening catalog database {}", path.display());
    Ok(Arc::new(SqliteStore::open(path)?))
}

fn service_repository(ctx: &Context) -> anyhow::Result<MessagingServiceRepository<SqliteStore>> {
    let handler = MessagingServiceHandler::new(ctx.config.ingestion.schedule_policy());
    Ok(EntityRepository::new(open_store(ctx)?, handler)
        .with_max_limit(ctx.config.pagination.max_limit))
}

fn print_service(service: &MessagingService) {
    ui::section(&service.name);
    ui::summary_row("id", &service.id.to_string());
    ui::summary_row("type", service.service_type.as_str());
    ui::summary_row("brokers", &service.brokers.join(", "));
    if let Some(description) = &service.description {
        ui::summary_row("description", description);
    }
    if let Some(url) = &service.schema_registry {
        ui::summary_row("schema registry", url);
    }
    if let Some(schedule) = &service.ingestion_schedule {
        ui::summary_row("schedule", &schedule.repeat_frequency);
    }
    if let Some(owner) = &service.owner {
        ui::summary_row("owner", &ui::table::reference_label(owner));
    }
    if let Some(topics) = &service.topics {
        let ids: Vec<String> = topics.iter().map(|t| t.id.to_string()).collect();
        if ids.is_empty() {
            ui::summary_row("topics", "-");
        } else {
            ui::summary_row("topics", &ids.join(", "));
        }
    }
    ui::summary_row("version", &service.version.to_string());
    if let Some(updated_at) = service.updated_at {
        ui::summary_row("updated", &ui::muted(&updated_at.to_rfc3339()));
    }
}

pub fn run_init(ctx: &Context, force: bool) -> anyhow::Result<()> {
    let config = MetacatConfig::default();
    config::write_config(&ctx.config_path, &config, force)?;

    let database = ctx.database_path();
    config::ensure_db_dir(database)?;
    SqliteStore::open(database)?;

    if ctx.output_mode.is_human() {
        ui::success("Catalog initialized");
        ui::status(Icons::GEAR, "Config", &ctx.config_path.display().to_string());
        ui::status(Icons::DATABASE, "Database", &database.display().to_string());
    }
    emit_success(
        ctx.output_mode,
        "init",
        serde_json::json!({
            "config": ctx.config_path.display().to_string(),
            "database": database.display().to_string(),
        }),
    )
}

pub fn run_create(ctx: &Context, args: CreateArgs) -> anyhow::Result<()> {
    let repo = service_repository(ctx)?;

    let mut service = MessagingService::new(args.name, args.service_type).with_brokers(args.brokers);
    service.description = args.description;
    service.schema_registry = args.schema_registry;
    service.ingestion_schedule = args.schedule.map(Schedule::new);
    service.owner = args.owner;

    let created = repo.create(service)?;
    if ctx.output_mode.is_human() {
        ui::entity_saved(Icons::NEW, &created.name, created.version);
        ui::summary_row("id", &created.id.to_string());
    }
    emit_success(ctx.output_mode, "create", serde_json::to_value(&created)?)
}

pub fn run_get(ctx: &Context, name: &str, fields: Option<&str>) -> anyhow::Result<()> {
    let repo = service_repository(ctx)?;
    let fields = repo.fields(fields)?;
    let service = repo.get_by_name(name, &fields)?;

    if ctx.output_mode.is_human() {
        print_service(&service);
    }
    emit_success(ctx.output_mode, "get", serde_json::to_value(&service)?)
}

pub fn run_list(ctx: &Context, args: ListArgs) -> anyhow::Result<()> {
    let repo = service_repository(ctx)?;
    let fields = repo.fields(args.fields.as_deref())?;
    let filter = ListFilter {
        name_prefix: args.prefix,
    };
    let page = PageRequest {
        limit: args.limit.unwrap_or(ctx.config.pagination.default_limit),
        before: args.before,
        after: args.after,
    };

    let result = repo.list(&filter, &fields, &page)?;
    if ctx.output_mode.is_human() {
        if result.is_empty() {
            println!("{} No messaging services found.", Icons::EMPTY);
        } else {
            println!("{}", ui::service_table(&result.data));
        }
        ui::summary_row("total", &result.paging.total.to_string());
        if let Some(before) = &result.paging.before {
            ui::summary_row("before", before);
        }
        if let Some(after) = &result.paging.after {
            ui::summary_row("after", after);
        }
    }
    emit_success(ctx.output_mode, "list", serde_json::to_value(&result)?)
}

pub fn run_update(ctx: &Context, args: UpdateArgs) -> anyhow::Result<()> {
    let repo = service_repository(ctx)?;
    let all = repo.fields(Some("*"))?;
    let current = repo.get_by_name(&args.name, &all)?;

    let update = MessagingServiceUpdate {
        description: args.description,
        brokers: (!args.brokers.is_empty()).then_some(args.brokers),
        schema_registry: args.schema_registry,
        ingestion_schedule: args.schedule.map(Schedule::new),
        owner: args.owner,
    };

    let updated = match args.expected_version {
        Some(expected) => repo.update_if_version(current.id, expected, update)?,
        None => repo.update(current.id, update)?,
    };

    if ctx.output_mode.is_human() {
        ui::entity_saved(Icons::MOD, &updated.name, updated.version);
        print_changes(&current, &updated);
    }
    emit_success(ctx.output_mode, "update", serde_json::to_value(&updated)?)
}

fn print_changes(before: &MessagingService, after: &MessagingService) {
    let show = |value: Option<&str>| value.unwrap_or("-").to_string();

    if before.description != after.description {
        ui::change(
            "description",
            &show(before.description.as_deref()),
            &show(after.description.as_deref()),
        );
    }
    if before.brokers != after.brokers {
        ui::change("brokers", &before.brokers.join(", "), &after.brokers.join(", "));
    }
    if before.schema_registry != after.schema_registry {
        ui::change(
            "schema registry",
            &show(before.schema_registry.as_deref()),
            &show(after.schema_registry.as_deref()),
        );
    }
    if before.ingestion_schedule != after.ingestion_schedule {
        let cron = |s: &MessagingService| {
            show(s.ingestion_schedule.as_ref().map(|s| s.repeat_frequency.as_str()))
        };
        ui::change("schedule", &cron(before), &cron(after));
    }
    if before.owner != after.owner {
        let owner = |s: &MessagingService| {
            s.owner
                .as_ref()
                .map(ui::table::reference_label)
                .unwrap_or_else(|| "-".to_string())
        };
        ui::change("owner", &owner(before), &owner(after));
    }
}

pub fn run_delete(ctx: &Context, name: &str) -> anyhow::Result<()> {
    let repo = service_repository(ctx)?;
    let service = repo.get_by_name(name, &repo.fields(None)?)?;
    repo.delete(service.id)?;

    if ctx.output_mode.is_human() {
        ui::entity_deleted(&service.name);
    }
    emit_success(
        ctx.output_mode,
        "delete",
        serde_json::json!({ "id": service.id, "name": service.name }),
    )
}

pub fn run_relate(
    ctx: &Context,
    from: &EntityReference,
    to: &EntityReference,
    relation: Relationship,
    remove: bool,
) -> anyhow::Result<()> {
    let store = open_store(ctx)?;
    let edge = EntityRelationship::new(from, to, relation);

    let changed = store.transaction(TxMode::Write, |tx| {
        if remove {
            tx.delete_relationship(from, to, relation)
        } else {
            tx.insert_relationship(&edge)?;
            Ok(1)
        }
    })?;

    if ctx.output_mode.is_human() {
        let line = ui::relationship_table(std::slice::from_ref(&edge));
        if remove && changed == 0 {
            ui::warn("No such relationship");
        } else {
            let verb = if remove { "Removed" } else { "Linked" };
            ui::status(Icons::LINK, verb, relation.as_str());
        }
        println!("{}", line);
    }
    emit_success(
        ctx.output_mode,
        "relate",
        serde_json::json!({ "relationship": edge, "removed": remove, "changed": changed }),
    )
}

pub fn run_stats(ctx: &Context) -> anyhow::Result<()> {
    let store = open_store(ctx)?;
    let stats = store.stats()?;

    match ctx.output_mode {
        OutputMode::Text => {
            ui::header("Catalog Statistics");
            let total = stats.total_entities().to_string();
            let relationships = stats.relationships.to_string();
            let per_type: Vec<(String, String)> = stats
                .entities
                .iter()
                .map(|(entity_type, count)| (format!("  {}", entity_type), count.to_string()))
                .collect();

            let mut rows: Vec<(&str, &str)> = vec![("Entities", total.as_str())];
            rows.extend(per_type.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            rows.push(("Relationships", relationships.as_str()));
            println!("{}", ui::stats_table(&rows));
            ui::status(Icons::DATABASE, "Database", &ctx.database_path().display().to_string());
            Ok(())
        }
        OutputMode::Json => emit_success(ctx.output_mode, "stats", serde_json::to_value(&stats)?),
    }
}
