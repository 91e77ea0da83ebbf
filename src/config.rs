use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::repository::DEFAULT_MAX_LIMIT;
use crate::schedule::SchedulePolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MetacatConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".metacat/catalog.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginationConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionConfig {
    /// Shortest allowed gap between two scheduled ingestion runs
    pub min_interval_minutes: u32,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            min_interval_minutes: 1,
        }
    }
}

impl IngestionConfig {
    pub fn schedule_policy(&self) -> SchedulePolicy {
        SchedulePolicy::with_min_interval_minutes(self.min_interval_minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `metacat=debug`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl MetacatConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let pagination = &self.pagination;
        if pagination.max_limit == 0 {
            anyhow::bail!("pagination.max_limit must be at least 1");
        }
        if pagination.default_limit == 0 || pagination.default_limit > pagination.max_limit {
            anyhow::bail!(
                "pagination.default_limit must be between 1 and {}, got {}",
                pagination.max_limit,
                pagination.default_limit
            );
        }
        if self.ingestion.min_interval_minutes == 0 {
            anyhow::bail!("ingestion.min_interval_minutes must be at least 1");
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("metacat.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join(".metacat").join("catalog.db")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<MetacatConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: MetacatConfig = toml::from_str(&contents)?;
    config.validate()?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &MetacatConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = load_config(Some(&dir.path().join("metacat.toml"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metacat.toml");
        let mut config = MetacatConfig::default();
        config.pagination.default_limit = 25;

        write_config(&path, &config, false).unwrap();
        assert_eq!(load_config(Some(&path)).unwrap(), Some(config.clone()));

        assert!(write_config(&path, &config, false).is_err());
        write_config(&path, &config, true).unwrap();
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metacat.toml");
        std::fs::write(&path, "[ingestion]\nmin_interval_minutes = 15\n").unwrap();

        let config = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(config.ingestion.min_interval_minutes, 15);
        assert_eq!(config.database.path, ".metacat/catalog.db");
        assert_eq!(config.pagination.max_limit, 1000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("metacat.toml");
        std::fs::write(&path, "[pagination]\ndefault_limit = 50\nmax_limit = 10\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_ensure_db_dir() {
        let dir = TempDir::new().unwrap();
        let db_path = default_database_path_in(dir.path());
        ensure_db_dir(&db_path).unwrap();
        assert!(dir.path().join(".metacat").is_dir());
    }
}
