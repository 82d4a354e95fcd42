//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml` and from `WALLET__*` environment variables,
//! e.g. `WALLET__APP__LEVEL=debug` or `WALLET__DATABASE__SQLITE=./wallet.db`.
use config::{Config, ConfigError, Environment, File};
use engine::{BulkSenderPolicy, DEFAULT_CURRENCY_SYMBOL, DEFAULT_REFERENCE_ATTEMPTS};
use serde::Deserialize;

pub const DEFAULT_SETTINGS_PATH: &str = "settings";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
    pub currency_symbol: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Database::Sqlite("wallet.db".to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Ledger {
    pub reference_attempts: u32,
    pub bulk_sender_policy: BulkSenderPolicy,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            reference_attempts: DEFAULT_REFERENCE_ATTEMPTS,
            bulk_sender_policy: BulkSenderPolicy::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub ledger: Ledger,
}

impl Settings {
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path.unwrap_or(DEFAULT_SETTINGS_PATH)).required(false))
            .add_source(
                Environment::with_prefix("WALLET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
