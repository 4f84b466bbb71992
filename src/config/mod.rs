//! Configuration module for the user directory backend.
//!
//! Settings come from a TOML file, overridden by `BE_`-prefixed environment variables.
//! Nested keys use `__` as separator: `BE_LOG__CONFIG__LEVEL=info`.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use toml::{Table, Value};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "BE_";

const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d::%H:%M:%S";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file '{0}' does not exist or is not a file")]
    Missing(PathBuf),

    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("Environment override '{0}' conflicts with a non-table value")]
    Override(String),

    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

/// Log verbosity accepted in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARNING" | "WARN" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            "CRITICAL" | "EXCEPTION" => Some(LogLevel::Critical),
            _ => None,
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

/// Output encoding of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

// ==================== RAW (FILE) SCHEMA ====================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    #[serde(default)]
    debug: bool,
    data: RawData,
    db: RawDatabase,
    log: RawLog,
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    populate: RawPopulate,
    #[serde(default)]
    benchmark: RawBenchmark,
    #[serde(default)]
    cache: RawCache,
}

#[derive(Debug, Deserialize)]
struct RawData {
    dir: String,
}

#[derive(Debug, Deserialize)]
struct RawDatabase {
    name: String,
    fl_name_template: String,
    engine_template: String,
    #[serde(default)]
    log_sql: bool,
    #[serde(default = "default_max_connections")]
    max_connections: u32,
}

#[derive(Debug, Deserialize)]
struct RawLog {
    dir: String,
    name: String,
    #[serde(default)]
    config: RawLogSetup,
}

#[derive(Debug, Deserialize)]
struct RawLogSetup {
    #[serde(default = "default_level")]
    level: String,
    #[serde(default = "default_timestamp_format")]
    timestamp_format: String,
    #[serde(default = "default_log_format")]
    log_format: String,
    #[serde(default = "default_true")]
    coloring: bool,
    #[serde(default = "default_true")]
    use_stdout: bool,
}

impl Default for RawLogSetup {
    fn default() -> Self {
        Self {
            level: default_level(),
            timestamp_format: default_timestamp_format(),
            log_format: default_log_format(),
            coloring: true,
            use_stdout: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawServer {
    #[serde(default = "default_bind_addr")]
    bind_addr: String,
    #[serde(default = "default_seed_users")]
    seed_users: usize,
}

impl Default for RawServer {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            seed_users: default_seed_users(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPopulate {
    #[serde(default = "default_populate_count")]
    count: usize,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
}

impl Default for RawPopulate {
    fn default() -> Self {
        Self {
            count: default_populate_count(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawBenchmark {
    #[serde(default = "default_execution_count")]
    execution_count: usize,
}

impl Default for RawBenchmark {
    fn default() -> Self {
        Self {
            execution_count: default_execution_count(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCache {
    #[serde(default = "default_cache_size")]
    max_size: usize,
    #[serde(default = "default_cache_expires")]
    expires_secs: u64,
}

impl Default for RawCache {
    fn default() -> Self {
        Self {
            max_size: default_cache_size(),
            expires_secs: default_cache_expires(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    5
}

fn default_level() -> String {
    "DEBUG".to_string()
}

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_seed_users() -> usize {
    100
}

fn default_populate_count() -> usize {
    10_000
}

fn default_batch_size() -> usize {
    100
}

fn default_execution_count() -> usize {
    100
}

fn default_cache_size() -> usize {
    128
}

fn default_cache_expires() -> u64 {
    200
}

// ==================== RESOLVED SETTINGS ====================

/// Data directory settings.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub absolute_dir: PathBuf,
}

/// Database settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub db_name: String,
    pub absolute_db_path: PathBuf,
    /// Connection string, informational
    pub uri: String,
    pub log_sql: bool,
    pub max_connections: u32,
}

/// Logger output settings.
#[derive(Debug, Clone)]
pub struct LoggerSetup {
    pub level: LogLevel,
    pub timestamp_format: String,
    pub log_format: LogFormat,
    pub coloring: bool,
    pub use_stdout: bool,
}

/// Logger settings.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub absolute_dir: PathBuf,
    pub file: PathBuf,
    pub config: LoggerSetup,
}

impl LoggerConfig {
    /// Logger used until the configuration file has been read.
    pub fn bootstrap(base_dir: &Path) -> Self {
        let absolute_dir = base_dir.join("logs");
        Self {
            file: absolute_dir.join("application.log"),
            absolute_dir,
            config: LoggerSetup {
                level: LogLevel::Debug,
                timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
                log_format: LogFormat::Text,
                coloring: true,
                use_stdout: true,
            },
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub seed_users: usize,
}

/// User population defaults.
#[derive(Debug, Clone)]
pub struct PopulateConfig {
    pub count: usize,
    pub batch_size: usize,
}

/// Benchmark defaults.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub execution_count: usize,
}

/// Filter expression cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_size: usize,
    pub expires_secs: u64,
}

/// Application settings with all paths resolved.
#[derive(Debug, Clone)]
pub struct Settings {
    pub debug: bool,
    pub base_dir: PathBuf,
    pub data: DataConfig,
    pub db: DatabaseConfig,
    pub logger: LoggerConfig,
    pub server: ServerConfig,
    pub populate: PopulateConfig,
    pub benchmark: BenchmarkConfig,
    pub cache: CacheConfig,
}

impl Settings {
    /// Load settings from `path`, applying `.env` and `BE_*` overrides.
    ///
    /// Relative paths in the file are resolved against the current directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let base_dir = env::current_dir()
            .and_then(|p| p.canonicalize())
            .map_err(|source| ConfigError::Read {
                path: PathBuf::from("."),
                source,
            })?;

        if !path.is_file() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let overrides = env::vars().filter(|(k, _)| k.to_uppercase().starts_with(ENV_PREFIX));
        Self::from_toml_str(&contents, overrides, &base_dir)
    }

    /// Build settings from TOML text and explicit overrides.
    pub fn from_toml_str<I>(contents: &str, overrides: I, base_dir: &Path) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut table: Table = contents.parse()?;
        apply_env_overrides(&mut table, overrides)?;
        let raw: RawSettings = Value::Table(table).try_into()?;
        Self::resolve(raw, base_dir)
    }

    fn resolve(raw: RawSettings, base_dir: &Path) -> Result<Self, ConfigError> {
        let data = DataConfig {
            absolute_dir: base_dir.join(&raw.data.dir),
        };

        let db_name = raw.db.fl_name_template.replace("{}", &raw.db.name);
        let absolute_db_path = data.absolute_dir.join(&db_name);
        let uri = raw
            .db
            .engine_template
            .replace("{}", &absolute_db_path.display().to_string());
        if raw.db.max_connections == 0 {
            return Err(invalid("db.max_connections", "must be at least 1"));
        }
        let db = DatabaseConfig {
            db_name,
            absolute_db_path,
            uri,
            log_sql: raw.db.log_sql,
            max_connections: raw.db.max_connections,
        };

        let setup = raw.log.config;
        let level = LogLevel::parse(&setup.level).ok_or_else(|| {
            invalid(
                "log.config.level",
                &format!(
                    "'{}' is not one of DEBUG, INFO, WARNING, WARN, ERROR, CRITICAL, EXCEPTION",
                    setup.level
                ),
            )
        })?;
        let log_format = LogFormat::parse(&setup.log_format).ok_or_else(|| {
            invalid(
                "log.config.log_format",
                &format!("'{}' is not one of text, json", setup.log_format),
            )
        })?;
        let log_dir = base_dir.join(&raw.log.dir);
        let logger = LoggerConfig {
            file: log_dir.join(format!("{}.log", raw.log.name)),
            absolute_dir: log_dir,
            config: LoggerSetup {
                level,
                timestamp_format: setup.timestamp_format,
                log_format,
                coloring: setup.coloring,
                use_stdout: setup.use_stdout,
            },
        };

        let bind_addr = raw
            .server
            .bind_addr
            .parse()
            .map_err(|_| invalid("server.bind_addr", &raw.server.bind_addr))?;

        Ok(Self {
            debug: raw.debug,
            base_dir: base_dir.to_path_buf(),
            data,
            db,
            logger,
            server: ServerConfig {
                bind_addr,
                seed_users: raw.server.seed_users,
            },
            populate: PopulateConfig {
                count: raw.populate.count,
                batch_size: raw.populate.batch_size,
            },
            benchmark: BenchmarkConfig {
                execution_count: raw.benchmark.execution_count,
            },
            cache: CacheConfig {
                max_size: raw.cache.max_size,
                expires_secs: raw.cache.expires_secs,
            },
        })
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Merge `BE_`-prefixed variables into the parsed TOML table.
fn apply_env_overrides<I>(table: &mut Table, vars: I) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let upper = key.to_uppercase();
        let Some(stripped) = upper.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        // BE_CONFIG selects the file, it is not a setting
        if stripped == "CONFIG" {
            continue;
        }
        let path: Vec<String> = stripped.to_lowercase().split("__").map(String::from).collect();
        let Some((last, parents)) = path.split_last() else {
            continue;
        };

        let mut current = &mut *table;
        for part in parents {
            let entry = current
                .entry(part.clone())
                .or_insert(Value::Table(Table::new()));
            current = match entry {
                Value::Table(t) => t,
                _ => return Err(ConfigError::Override(key.clone())),
            };
        }
        let keep_string = matches!(current.get(last.as_str()), Some(Value::String(_)))
            || STRING_KEYS.contains(&path.join(".").as_str());
        let parsed = if keep_string {
            Value::String(value)
        } else {
            parse_override(&value)
        };
        current.insert(last.clone(), parsed);
    }
    Ok(())
}

/// Settings that stay strings even when an override looks numeric.
const STRING_KEYS: &[&str] = &[
    "data.dir",
    "db.name",
    "db.fl_name_template",
    "db.engine_template",
    "log.dir",
    "log.name",
    "log.config.level",
    "log.config.timestamp_format",
    "log.config.log_format",
    "server.bind_addr",
];

fn parse_override(value: &str) -> Value {
    let trimmed = value.trim();
    if let Ok(b) = trimmed.parse::<bool>() {
        return Value::Boolean(b);
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::Float(f);
    }
    Value::String(value.to_string())
}
