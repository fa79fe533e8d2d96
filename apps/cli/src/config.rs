use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use metering_app::{AppConfig, RetryPolicy, parse_timezone};
use metering_core::PricingRate;
use serde::{Deserialize, Serialize};

use crate::dirs::DB_FILE_NAME;

const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_PORT: u16 = 3846;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub port: u16,
    pub data_dir: Option<PathBuf>,
    pub aggregation_timezone: String,
    /// Seconds between scheduled aggregation runs; 0 disables the schedule.
    pub aggregation_interval_secs: u64,
    pub admin_token: Option<String>,
    pub max_retries: u32,
    pub retry_backoff_max_secs: u64,
    pub pricing: Vec<PricingRate>,
}

impl Default for CliConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            port: DEFAULT_PORT,
            data_dir: None,
            aggregation_timezone: "UTC".to_string(),
            aggregation_interval_secs: 3600,
            admin_token: None,
            max_retries: retry.max_retries,
            retry_backoff_max_secs: retry.backoff_max.as_secs(),
            pricing: Vec::new(),
        }
    }
}

impl CliConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_max: Duration::from_secs(self.retry_backoff_max_secs),
        }
    }

    pub fn app_config(&self, data_dir: &Path) -> Result<AppConfig> {
        let mut config = AppConfig::new(data_dir.join(DB_FILE_NAME));
        config.aggregation_timezone = parse_timezone(&self.aggregation_timezone)
            .context("invalid aggregation_timezone")?;
        config.retry = self.retry_policy();
        config.pricing = self.pricing.clone();
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: CliConfig,
    pub file: PathBuf,
    pub created: bool,
}

pub fn load_or_create(file: &Path, make_token: impl FnOnce() -> String) -> Result<ConfigLoad> {
    if file.exists() {
        let contents =
            fs::read_to_string(file).with_context(|| format!("read config {}", file.display()))?;
        let config: CliConfig = toml::from_str(&contents)
            .with_context(|| format!("parse config {}", file.display()))?;
        return Ok(ConfigLoad {
            config,
            file: file.to_path_buf(),
            created: false,
        });
    }

    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("create config dir {}", dir.display()))?;
    }
    let config = CliConfig {
        admin_token: Some(make_token()),
        ..CliConfig::default()
    };
    let contents = toml::to_string_pretty(&config).context("serialize config")?;
    fs::write(file, contents).with_context(|| format!("write config {}", file.display()))?;

    Ok(ConfigLoad {
        config,
        file: file.to_path_buf(),
        created: true,
    })
}

pub fn default_config_file(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_default_config_with_token() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let load = load_or_create(&file, || "secret".to_string()).expect("load");

        assert!(load.created);
        assert!(file.exists());
        assert_eq!(load.config.port, DEFAULT_PORT);
        assert_eq!(load.config.admin_token.as_deref(), Some("secret"));

        let again = load_or_create(&file, || "other".to_string()).expect("reload");
        assert!(!again.created);
        assert_eq!(again.config.admin_token.as_deref(), Some("secret"));
    }

    #[test]
    fn reads_partial_config_with_pricing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &file,
            r#"
aggregation_timezone = "Asia/Shanghai"
max_retries = 5

[[pricing]]
model_pattern = "gpt-4o*"
input_per_1m = "2.50"
output_per_1m = "10"
"#,
        )
        .expect("write");

        let load = load_or_create(&file, || unreachable!()).expect("load");
        let app_config = load.config.app_config(dir.path()).expect("app config");

        assert_eq!(load.config.port, DEFAULT_PORT);
        assert_eq!(app_config.aggregation_timezone.name(), "Asia/Shanghai");
        assert_eq!(app_config.retry.max_retries, 5);
        assert_eq!(app_config.retry.backoff_max, Duration::from_secs(600));
        assert_eq!(app_config.db_path, dir.path().join(DB_FILE_NAME));
        assert_eq!(app_config.pricing.len(), 1);
        assert_eq!(app_config.pricing[0].input_per_1m.to_string(), "2.50");
        assert!(app_config.pricing[0].cached_input_per_1m.is_zero());
    }

    #[test]
    fn rejects_unknown_timezone() {
        let config = CliConfig {
            aggregation_timezone: "Mars/Olympus".to_string(),
            ..CliConfig::default()
        };
        assert!(config.app_config(Path::new("/tmp")).is_err());
    }
}
