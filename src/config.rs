//! Configuration management for the bookstore server

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

/// Runtime mode selected by the `RUN_MODE` environment variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Normal,
    Test,
}

impl RunMode {
    /// `test` selects the test database, anything else is a normal run
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("test") => RunMode::Test,
            _ => RunMode::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Normal => "development",
            RunMode::Test => "test",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Server part of the connection string, without database name
    pub base_url: String,
    /// Database name; the test database is `{name}-test`
    pub name: String,
    /// Full connection string override (`DATABASE_URL`), ignored in test mode
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl DatabaseConfig {
    /// Connection string for the given run mode
    pub fn connection_url(&self, mode: RunMode) -> String {
        let base = self.base_url.trim_end_matches('/');
        match mode {
            RunMode::Test => format!("{}/{}-test", base, self.name),
            RunMode::Normal => self
                .url
                .clone()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| format!("{}/{}", base, self.name)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip)]
    pub run_mode: RunMode,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = RunMode::from_env_value(env::var("RUN_MODE").ok().as_deref());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            // Layer on the environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode.as_str())).required(false))
            // Environment variables, e.g. BOOKSTORE_SERVER__PORT=8080
            .add_source(
                Environment::with_prefix("BOOKSTORE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            // Override database URL from DATABASE_URL env var if present
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .build()?;

        let mut app_config: AppConfig = config.try_deserialize()?;
        app_config.run_mode = run_mode;
        Ok(app_config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            base_url: "postgresql://127.0.0.1:5432".to_string(),
            name: "books".to_string(),
            url: None,
            max_connections: 10,
            min_connections: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
