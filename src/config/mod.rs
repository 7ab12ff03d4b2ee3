use chrono::{Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    errors::{MoneyError, Result},
    utils::persistence::{
        default_data_dir, ensure_dir, list_backup_files, unused_backup_name, write_atomic,
    },
};

const CONFIG_FILE: &str = "config.json";
const BACKUP_PREFIX: &str = "config";

/// User preferences. Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub locale: String,
    pub currency: String,
    /// Start of the "Week" statistics window.
    pub first_day_of_week: Weekday,
    /// Progress ratio at which a budget alert fires.
    pub budget_alert_threshold: f64,
    pub recent_transactions_limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            locale: "en-US".into(),
            currency: "USD".into(),
            first_day_of_week: Weekday::Mon,
            budget_alert_threshold: 0.8,
            recent_transactions_limit: 5,
            data_dir: None,
        }
    }
}

impl Config {
    /// Configured directory, else `MONEY_MANAGER_HOME`, else `~/.money_manager`.
    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.budget_alert_threshold > 0.0 && self.budget_alert_threshold <= 1.0) {
            return Err(MoneyError::Config(format!(
                "budget_alert_threshold must be in (0, 1], got {}",
                self.budget_alert_threshold
            )));
        }
        if self.currency.trim().is_empty() {
            return Err(MoneyError::Config("currency must not be empty".into()));
        }
        Ok(())
    }
}

pub struct ConfigManager {
    path: PathBuf,
    backups_dir: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::with_base_dir(default_data_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self> {
        ensure_dir(&base)?;
        let backups_dir = base.join("backups").join("config");
        ensure_dir(&backups_dir)?;
        Ok(Self {
            path: base.join(CONFIG_FILE),
            backups_dir,
        })
    }

    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        read_config(&self.path)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&self.path, &json)?;
        tracing::debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }

    pub fn backup(&self, config: &Config, note: Option<&str>) -> Result<String> {
        let name = unused_backup_name(&self.backups_dir, BACKUP_PREFIX, Utc::now(), note);
        let json = serde_json::to_string_pretty(config)?;
        write_atomic(&self.backups_dir.join(&name), &json)?;
        Ok(name)
    }

    pub fn restore(&self, backup_name: &str) -> Result<Config> {
        let path = self.backups_dir.join(backup_name);
        if !path.exists() {
            return Err(MoneyError::Config(format!(
                "configuration backup `{}` not found",
                backup_name
            )));
        }
        let config = read_config(&path)?;
        self.save(&config)?;
        Ok(config)
    }

    pub fn list_backups(&self) -> Result<Vec<String>> {
        list_backup_files(&self.backups_dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data)
        .map_err(|err| MoneyError::Config(format!("{}: {}", path.display(), err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager() -> (ConfigManager, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let manager = ConfigManager::with_base_dir(temp.path().to_path_buf()).expect("manager");
        (manager, temp)
    }

    #[test]
    fn missing_file_yields_defaults() {
        let (manager, _guard) = manager();
        let config = manager.load().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.first_day_of_week, Weekday::Mon);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let (manager, _guard) = manager();
        fs::write(manager.path(), r#"{ "currency": "EUR" }"#).unwrap();
        let config = manager.load().unwrap();
        assert_eq!(config.currency, "EUR");
        assert_eq!(config.recent_transactions_limit, 5);
    }

    #[test]
    fn garbage_is_a_config_error() {
        let (manager, _guard) = manager();
        fs::write(manager.path(), "not json").unwrap();
        assert!(matches!(manager.load(), Err(MoneyError::Config(_))));
    }

    #[test]
    fn save_rejects_out_of_range_threshold() {
        let (manager, _guard) = manager();
        let config = Config {
            budget_alert_threshold: 1.5,
            ..Config::default()
        };
        assert!(manager.save(&config).is_err());
        assert!(!manager.path().exists());
    }

    #[test]
    fn backup_then_restore_overwrites_active_config() {
        let (manager, _guard) = manager();
        let original = Config {
            first_day_of_week: Weekday::Sun,
            ..Config::default()
        };
        manager.save(&original).unwrap();
        let name = manager.backup(&original, Some("sunday start")).unwrap();

        manager.save(&Config::default()).unwrap();
        let restored = manager.restore(&name).unwrap();
        assert_eq!(restored.first_day_of_week, Weekday::Sun);
        assert_eq!(manager.load().unwrap(), original);
        assert_eq!(manager.list_backups().unwrap(), vec![name]);
    }

    #[test]
    fn configured_data_dir_wins() {
        let config = Config {
            data_dir: Some(PathBuf::from("/tmp/mm")),
            ..Config::default()
        };
        assert_eq!(config.resolve_data_dir(), PathBuf::from("/tmp/mm"));
    }
}
