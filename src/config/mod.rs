mod file_config;

pub use file_config::{CategoriesConfig, FileConfig};

use crate::category::{DeleteMode, ServiceSettings};
use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use tracing_subscriber::filter::LevelFilter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn level_filter(&self) -> LevelFilter {
        match self {
            LoggingLevel::Error => LevelFilter::ERROR,
            LoggingLevel::Warn => LevelFilter::WARN,
            LoggingLevel::Info => LevelFilter::INFO,
            LoggingLevel::Debug => LevelFilter::DEBUG,
            LoggingLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub max_depth: Option<u32>,
    pub default_delete_mode: DeleteMode,
    pub logging_level: LoggingLevel,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub logging_level: LoggingLevel,
    pub max_depth: Option<u32>,
    pub default_delete_mode: DeleteMode,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let categories = file.categories.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| anyhow!("db_path must be specified via --db-path or in config file"))?;

        // The db file itself is created on first open, its directory is not
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }
        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }

        let logging_level = match file.logging_level {
            Some(s) => parse_logging_level(&s)
                .ok_or_else(|| anyhow!("Invalid logging_level in config file: {}", s))?,
            None => cli.logging_level,
        };

        let max_depth = categories.max_depth.or(cli.max_depth);
        if max_depth == Some(0) {
            bail!("max_depth must be at least 1");
        }

        let default_delete_mode = match categories.default_delete_mode {
            Some(s) => s
                .parse::<DeleteMode>()
                .map_err(|e| anyhow!("Invalid default_delete_mode in config file: {}", e))?,
            None => cli.default_delete_mode,
        };

        Ok(Self {
            db_path,
            logging_level,
            max_depth,
            default_delete_mode,
        })
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            max_depth: self.max_depth,
        }
    }
}

/// Parses a logging level string into LoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<LoggingLevel> {
    LoggingLevel::from_str(s, true).ok()
}
