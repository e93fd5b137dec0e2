// Configuration management for ip-discover
// Supports CLI arguments, config file (TOML), and environment variables

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

use crate::routes::TableId;

/// this program discovers IP address of a given Network range
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "ip-discover")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Network CIDR to monitor the creation and existence of IP addresses
    #[arg(short, long, env = "IP_DISCOVER_NETWORK")]
    pub network: Option<String>,

    /// Logging level (error, warn, info, debug, trace) [default: warn]
    #[arg(short, long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Path to configuration file
    #[arg(short, long, env = "IP_DISCOVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Routing table to examine (local, main, default or a number); repeat to set the order
    #[arg(short, long = "table")]
    pub tables: Vec<TableId>,

    /// Give up waiting for the network after this many seconds
    #[arg(long, env = "IP_DISCOVER_TIMEOUT")]
    pub timeout: Option<u64>,
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Network CIDR to watch
    #[serde(default)]
    pub network: Option<String>,

    /// Routing tables to examine, in order
    #[serde(default = "TableId::defaults")]
    pub tables: Vec<TableId>,

    /// Optional wait limit in seconds
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            network: None,
            tables: TableId::defaults(),
            timeout_seconds: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub network: String,
    pub log_level: Level,
    pub tables: Vec<TableId>,
    pub timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from all sources (CLI args, config file, defaults)
    /// Priority: CLI args > Environment variables > Config file > Defaults
    pub fn load() -> anyhow::Result<Self> {
        let cli_args = CliArgs::parse();

        let config_file = match &cli_args.config {
            Some(config_path) => read_config_file(config_path)?,
            None => {
                // Try loading from default locations
                let default_paths = [PathBuf::from("ip-discover.toml"), PathBuf::from("config.toml")];

                match default_paths.iter().find(|path| path.exists()) {
                    Some(path) => read_config_file(path)?,
                    None => ConfigFile::default(),
                }
            }
        };

        Self::merge(cli_args, config_file)
    }

    /// Merge CLI arguments over a config file
    pub fn merge(cli_args: CliArgs, config_file: ConfigFile) -> anyhow::Result<Self> {
        let network = cli_args
            .network
            .or(config_file.discovery.network)
            .ok_or_else(|| anyhow::anyhow!("No network given, use --network or set discovery.network"))?;

        let log_level = parse_log_level(cli_args.log_level.as_deref().unwrap_or(&config_file.logging.level))?;

        let tables = if cli_args.tables.is_empty() {
            config_file.discovery.tables
        } else {
            cli_args.tables
        };

        let timeout = cli_args
            .timeout
            .or(config_file.discovery.timeout_seconds)
            .map(Duration::from_secs);

        Ok(Config {
            network,
            log_level,
            tables,
            timeout,
        })
    }
}

fn read_config_file(path: &Path) -> anyhow::Result<ConfigFile> {
    // Logging is not set up yet at this point
    let config_content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    Ok(toml::from_str::<ConfigFile>(&config_content)?)
}

fn parse_log_level(level_str: &str) -> anyhow::Result<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" | "warning" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(anyhow::anyhow!("Invalid log level: {}", level_str)),
    }
}
