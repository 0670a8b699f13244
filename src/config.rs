//! Server configuration, read from environment variables with defaults
//! suitable for running a single local deployment.

use std::path::PathBuf;

use crate::error::{InventoryError, Result};
use crate::profile::Profile;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_DATA_DIR: &str = "database";

/// Where worksheets live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Gzip files under the data directory.
    Local,
    /// A Google spreadsheet for stock and another for the audit log.
    Sheets {
        spreadsheet_id: String,
        log_spreadsheet_id: String,
        token: String,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub profile_path: Option<PathBuf>,
    pub backend: Backend,
    pub data_dir: PathBuf,
    pub webhook_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match get("INVENTORIA_BACKEND").as_deref().unwrap_or("local") {
            "local" => Backend::Local,
            "sheets" => {
                let require = |key: &str| {
                    get(key).ok_or_else(|| {
                        InventoryError::Config(format!("{} is required for the sheets backend", key))
                    })
                };
                let spreadsheet_id = require("INVENTORIA_SPREADSHEET_ID")?;
                Backend::Sheets {
                    log_spreadsheet_id: get("INVENTORIA_LOG_SPREADSHEET_ID")
                        .unwrap_or_else(|| spreadsheet_id.clone()),
                    token: require("INVENTORIA_SHEETS_TOKEN")?,
                    spreadsheet_id,
                }
            }
            other => {
                return Err(InventoryError::Config(format!(
                    "unknown backend '{}', expected 'local' or 'sheets'",
                    other
                )));
            }
        };

        Ok(AppConfig {
            bind: get("INVENTORIA_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            profile_path: get("INVENTORIA_PROFILE").map(PathBuf::from),
            backend,
            data_dir: get("INVENTORIA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            webhook_url: get("INVENTORIA_WEBHOOK_URL"),
        })
    }

    /// The configured profile, or the built-in single-warehouse one.
    pub fn profile(&self) -> Result<Profile> {
        match &self.profile_path {
            Some(path) => Profile::load(path),
            None => Ok(Profile::default()),
        }
    }

    pub fn stock_file(&self) -> PathBuf {
        self.data_dir.join("stock.bin.gz")
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("audit.bin.gz")
    }
}
