// 🔧 Runtime configuration - Paths and bind address from the environment

use std::env;
use std::path::PathBuf;

pub const ENV_DATA_DIR: &str = "EXPENSES_DATA_DIR";
pub const ENV_DB: &str = "EXPENSES_DB";
pub const ENV_JSON: &str = "EXPENSES_JSON";
pub const ENV_SETTINGS: &str = "EXPENSES_SETTINGS";
pub const ENV_BIND: &str = "EXPENSES_BIND";

pub const DEFAULT_BIND: &str = "127.0.0.1:5500";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub json_path: PathBuf,
    pub settings_path: PathBuf,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or empty keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = get(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        AppConfig {
            db_path: get(ENV_DB)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("expenses.db")),
            json_path: get(ENV_JSON)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("expenses.json")),
            settings_path: get(ENV_SETTINGS)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("settings.json")),
            bind_addr: get(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string()),
            data_dir,
        }
    }
}

/// Platform data directory, or `./.expense-ledger` when there is none
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("expense-ledger"))
        .unwrap_or_else(|| PathBuf::from(".expense-ledger"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_derive_from_data_dir() {
        let vars: HashMap<&str, &str> = [(ENV_DATA_DIR, "/tmp/ledger")].into_iter().collect();
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.db_path, PathBuf::from("/tmp/ledger/expenses.db"));
        assert_eq!(config.json_path, PathBuf::from("/tmp/ledger/expenses.json"));
        assert_eq!(config.settings_path, PathBuf::from("/tmp/ledger/settings.json"));
        assert_eq!(config.bind_addr, DEFAULT_BIND);
    }

    #[test]
    fn test_explicit_values_win() {
        let vars: HashMap<&str, &str> = [
            (ENV_DATA_DIR, "/tmp/ledger"),
            (ENV_DB, "/var/db/e.db"),
            (ENV_BIND, "0.0.0.0:3000"),
            (ENV_JSON, "  "),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.db_path, PathBuf::from("/var/db/e.db"));
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.json_path, PathBuf::from("/tmp/ledger/expenses.json"));
    }
}
