//! Metacat CLI - Command-line interface for the metadata catalog entity store

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uuid::Uuid;

use metacat::config::{self, MetacatConfig};
use metacat::{EntityReference, MessagingServiceType, Relationship};

#[derive(Parser)]
#[command(name = "metacat")]
#[command(version)]
#[command(about = "Metadata catalog entity store - versioned entities and relationships on SQLite")]
#[command(long_about = r#"
Metacat keeps catalog entities as versioned JSON documents, with directed
relationships between them, in a single SQLite database.

Example usage:
  metacat init
  metacat create kafka-prod --type kafka --broker b1:9092
  metacat update kafka-prod --schedule "0 * * * *"
  metacat get kafka-prod --fields owner,topics
  metacat list --limit 20
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./metacat.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputMode::Text)]
    format: OutputMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Text
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the database
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Register a messaging service
    Create {
        /// Service name
        name: String,

        /// Service type (kafka, pulsar)
        #[arg(short = 't', long = "type", value_parser = parse_service_type)]
        service_type: MessagingServiceType,

        /// Bootstrap broker as host:port (repeatable)
        #[arg(short, long = "broker", required = true)]
        brokers: Vec<String>,

        #[arg(long)]
        description: Option<String>,

        /// Schema registry URL
        #[arg(long)]
        schema_registry: Option<String>,

        /// Ingestion schedule as a cron expression
        #[arg(long)]
        schedule: Option<String>,

        /// Owner as type:uuid (user or team)
        #[arg(long, value_parser = parse_reference)]
        owner: Option<EntityReference>,
    },

    /// Show one messaging service
    Get {
        name: String,

        /// Relationship fields to load (owner, topics, or *)
        #[arg(long)]
        fields: Option<String>,
    },

    /// List messaging services ordered by name
    List {
        /// Only names starting with this prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Page size (defaults to the config)
        #[arg(short, long)]
        limit: Option<usize>,

        /// Cursor of the page to continue after
        #[arg(long, conflicts_with = "before")]
        after: Option<String>,

        /// Cursor of the page to continue before
        #[arg(long)]
        before: Option<String>,

        #[arg(long)]
        fields: Option<String>,
    },

    /// Change fields of a messaging service
    Update {
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Replace the broker list (repeatable)
        #[arg(short, long = "broker")]
        brokers: Vec<String>,

        #[arg(long)]
        schema_registry: Option<String>,

        #[arg(long)]
        schedule: Option<String>,

        #[arg(long, value_parser = parse_reference)]
        owner: Option<EntityReference>,

        /// Fail unless the stored version still matches
        #[arg(long)]
        expected_version: Option<u64>,
    },

    /// Delete a messaging service and its relationships
    Delete { name: String },

    /// Add or remove a relationship between two entities
    Relate {
        /// Source as type:uuid
        #[arg(long, value_parser = parse_reference)]
        from: EntityReference,

        /// Target as type:uuid
        #[arg(long, value_parser = parse_reference)]
        to: EntityReference,

        /// Relation kind (contains, owns, uses, ...)
        #[arg(short, long, value_parser = parse_relationship)]
        relation: Relationship,

        /// Remove the relationship instead of adding it
        #[arg(long)]
        remove: bool,
    },

    /// Show statistics about the catalog
    Stats,
}

fn parse_service_type(value: &str) -> Result<MessagingServiceType, String> {
    MessagingServiceType::from_str(value).map_err(|e| e.to_string())
}

fn parse_relationship(value: &str) -> Result<Relationship, String> {
    Relationship::from_str(value).map_err(|e| {
        let known: Vec<&str> = Relationship::all().iter().map(|r| r.as_str()).collect();
        format!("{} (expected one of: {})", e, known.join(", "))
    })
}

fn parse_reference(value: &str) -> Result<EntityReference, String> {
    let (entity_type, id) = value
        .split_once(':')
        .ok_or_else(|| format!("expected type:uuid, got '{}'", value))?;
    if entity_type.is_empty() {
        return Err(format!("missing entity type in '{}'", value));
    }
    let id = Uuid::parse_str(id).map_err(|e| format!("invalid id in '{}': {}", value, e))?;
    Ok(EntityReference::new(id, entity_type))
}

/// Settings resolved from the config file and global flags
pub struct Context {
    pub config: MetacatConfig,
    pub config_path: PathBuf,
    pub database: PathBuf,
    pub output_mode: OutputMode,
}

impl Context {
    fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
        let config = config::load_config(Some(&config_path))?.unwrap_or_default();
        let database = cli
            .database
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.database.path));

        Ok(Self {
            config,
            config_path,
            database,
            output_mode: cli.format,
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.database
    }
}

/// Print a command result as a JSON envelope
pub fn emit_success(
    output_mode: OutputMode,
    command: &str,
    data: serde_json::Value,
) -> anyhow::Result<()> {
    if output_mode.is_human() {
        return Ok(());
    }
    let envelope = serde_json::json!({
        "status": "ok",
        "command": command,
        "data": data,
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn emit_error(output_mode: OutputMode, err: &anyhow::Error) {
    if output_mode.is_human() {
        metacat::ui::error(&format!("{:#}", err));
        return;
    }
    let envelope = serde_json::json!({
        "status": "error",
        "message": format!("{:#}", err),
    });
    println!("{}", envelope);
}

fn init_logging(verbose: bool, level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli, ctx: &Context) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init { force } => commands::run_init(ctx, force),
        Commands::Create {
            name,
            service_type,
            brokers,
            description,
            schema_registry,
            schedule,
            owner,
        } => commands::run_create(
            ctx,
            commands::CreateArgs {
                name,
                service_type,
                brokers,
                description,
                schema_registry,
                schedule,
                owner,
            },
        ),
        Commands::Get { name, fields } => commands::run_get(ctx, &name, fields.as_deref()),
        Commands::List {
            prefix,
            limit,
            after,
            before,
            fields,
        } => commands::run_list(
            ctx,
            commands::ListArgs {
                prefix,
                limit,
                after,
                before,
                fields,
            },
        ),
        Commands::Update {
            name,
            description,
            brokers,
            schema_registry,
            schedule,
            owner,
            expected_version,
        } => commands::run_update(
            ctx,
            commands::UpdateArgs {
                name,
                description,
                brokers,
                schema_registry,
                schedule,
                owner,
                expected_version,
            },
        ),
        Commands::Delete { name } => commands::run_delete(ctx, &name),
        Commands::Relate {
            from,
            to,
            relation,
            remove,
        } => commands::run_relate(ctx, &from, &to, relation, remove),
        Commands::Stats => commands::run_stats(ctx),
    }
}

fn main() {
    let cli = Cli::parse();
    let output_mode = cli.format;

    let ctx = match Context::resolve(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            init_logging(cli.verbose, "info");
            emit_error(output_mode, &e);
            std::process::exit(2);
        }
    };
    init_logging(cli.verbose, &ctx.config.logging.level);

    if let Err(e) = run(cli, &ctx) {
        tracing::debug!("command failed: {:?}", e);
        emit_error(output_mode, &e);
        std::process::exit(1);
    }
}
