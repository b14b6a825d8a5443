//! Application settings loaded from `config.toml`.
//!
//! Every field has a default, so an absent file or an empty one yields a
//! working configuration: a remote store with no endpoint, which makes the
//! repository run on the built-in reference data.

use std::{path::Path, sync::Arc};

use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    config::database,
    core::tally::{DEFAULT_DRINK_UNIT_RATE, TallyCalculator},
    errors::{Error, Result},
    models::{to_decimal, to_f64},
    store::{StoreBackend, fallback::OfflineStore, remote::RemoteStore, sqlite::SqliteStore},
    summary::SummaryClient,
};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Which backend holds the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// HTTP endpoint
    #[default]
    Remote,
    /// Local `SQLite` file
    Sqlite,
}

/// `[store]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend kind
    pub kind: StoreKind,
    /// Remote endpoint URL
    pub endpoint: Option<String>,
    /// `SQLite` URL, overridden by `DATABASE_URL`
    pub database_url: Option<String>,
}

/// `[summary]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Text-generation endpoint URL
    pub endpoint: Option<String>,
}

/// The whole `config.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Company cost per counted drink head in the daily tally
    pub drink_unit_rate: f64,
    /// Store backend
    pub store: StoreConfig,
    /// Summary endpoint
    pub summary: SummaryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            drink_unit_rate: to_f64(DEFAULT_DRINK_UNIT_RATE),
            store: StoreConfig::default(),
            summary: SummaryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Tally calculator at the configured drink rate.
    #[must_use]
    pub fn tally_calculator(&self) -> TallyCalculator {
        TallyCalculator::new(to_decimal(self.drink_unit_rate))
    }

    /// Builds the configured store backend. A remote store without an
    /// endpoint becomes [`OfflineStore`].
    pub async fn build_backend(&self) -> Result<Arc<dyn StoreBackend>> {
        match self.store.kind {
            StoreKind::Remote => match &self.store.endpoint {
                Some(endpoint) => {
                    info!("Using remote store at {endpoint}");
                    Ok(Arc::new(RemoteStore::new(endpoint.clone())?))
                }
                None => {
                    info!("No store endpoint configured, running offline");
                    Ok(Arc::new(OfflineStore))
                }
            },
            StoreKind::Sqlite => {
                let url = database::get_database_url(self.store.database_url.as_deref());
                let db = database::create_connection(&url).await?;
                Ok(Arc::new(SqliteStore::new(db)))
            }
        }
    }

    /// Summary client for the configured endpoint, authenticated with
    /// `SUMMARY_API_KEY` when set.
    pub fn summary_client(&self) -> Result<SummaryClient> {
        SummaryClient::new(
            self.summary.endpoint.clone(),
            std::env::var("SUMMARY_API_KEY").ok(),
        )
    }
}

/// Parses settings from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    if !config.drink_unit_rate.is_finite() || config.drink_unit_rate < 0.0 {
        return Err(Error::Config {
            message: format!(
                "drink_unit_rate must be a non-negative number, got {}",
                config.drink_unit_rate
            ),
        });
    }
    Ok(config)
}

/// Loads settings from a TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads settings from `TEA_LEDGER_CONFIG`, or `./config.toml`. A missing
/// file yields the defaults.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path =
        std::env::var("TEA_LEDGER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if Path::new(&path).exists() {
        debug!("Loading configuration from {path}");
        load_config(&path)
    } else {
        info!("No configuration at {path}, using defaults");
        Ok(AppConfig::default())
    }
}
