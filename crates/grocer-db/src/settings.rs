//! # Settings
//!
//! Database location and business rules for a process hosting the ledger.
//!
//! ## Load Order (later overrides earlier)
//! 1. Default values
//! 2. TOML file named by `GROCER_CONFIG`, if set
//! 3. Environment variables
//!
//! ```toml
//! [database]
//! path = "data/grocer.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [rules]
//! vat_rate = 1800              # basis points
//! minimum_cart_value = 1000    # cents
//! max_delivery_lead_hours = 48
//! cancellation_window_hours = 24
//!
//! [rules.loyalty]
//! min_orders_for_discount = 5
//! discount_percent = 1000      # basis points
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pool::DbConfig;
use grocer_core::{BusinessRules, Money, Rate, ValidationError};

pub const CONFIG_PATH_VAR: &str = "GROCER_CONFIG";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid settings: {0}")]
    Invalid(#[from] ValidationError),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: PathBuf::from("grocer.db"),
            max_connections: 5,
            busy_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub rules: BusinessRules,
}

impl Settings {
    /// Loads settings from defaults, the optional file and the environment.
    pub fn load() -> SettingsResult<Self> {
        let mut settings = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                debug!("{} not set, using default settings", CONFIG_PATH_VAR);
                Self::default()
            }
        };

        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> SettingsResult<Self> {
        info!(path = %path.display(), "Loading settings file");
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> SettingsResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `GROCER_*` overrides read through `get`.
    ///
    /// Values that do not parse are logged and ignored.
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(path) = get("GROCER_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }
        if let Some(bps) = parse_var::<u32>(&get, "GROCER_VAT_BPS") {
            self.rules.vat_rate = Rate::from_bps(bps);
        }
        if let Some(cents) = parse_var::<i64>(&get, "GROCER_MIN_CART_CENTS") {
            self.rules.minimum_cart_value = Money::from_cents(cents);
        }
        if let Some(hours) = parse_var::<i64>(&get, "GROCER_MAX_DELIVERY_HOURS") {
            self.rules.max_delivery_lead_hours = hours;
        }
        if let Some(hours) = parse_var::<i64>(&get, "GROCER_CANCEL_WINDOW_HOURS") {
            self.rules.cancellation_window_hours = hours;
        }
    }

    pub fn validate(&self) -> SettingsResult<()> {
        if self.database.max_connections == 0 {
            return Err(ValidationError::MustBePositive {
                field: "database.max_connections".to_string(),
            }
            .into());
        }
        self.rules.validate()?;
        Ok(())
    }

    /// Pool configuration for [`Database::new`](crate::Database::new).
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_secs(self.database.busy_timeout_secs))
    }
}

fn parse_var<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.trim().parse() {
        Ok(value) => {
            debug!(key, value = %raw, "Overriding setting from environment");
            Some(value)
        }
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
