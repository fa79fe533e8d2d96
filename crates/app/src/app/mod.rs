use std::path::PathBuf;
use std::sync::Arc;

use chrono_tz::Tz;
use metering_core::PricingRate;
use metering_db::Db;

use crate::error::{AppError, Result};
use crate::scheduler::RetryPolicy;
use crate::services::{AppServices, CostEstimator, PatternPricing};

/// Immutable settings built once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// Decides what "yesterday" and "last month" mean for default job ranges.
    pub aggregation_timezone: Tz,
    pub retry: RetryPolicy,
    pub pricing: Vec<PricingRate>,
}

impl AppConfig {
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            db_path,
            aggregation_timezone: chrono_tz::UTC,
            retry: RetryPolicy::default(),
            pricing: Vec::new(),
        }
    }
}

/// Application state shared by the HTTP server and the CLI.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: AppServices,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let estimator = Arc::new(PatternPricing::new(config.pricing.clone()));
        Self::with_estimator(config, estimator)
    }

    pub fn with_estimator(config: AppConfig, estimator: Arc<dyn CostEstimator>) -> Self {
        let config = Arc::new(config);
        let services = AppServices::new(config.clone(), estimator);
        Self { config, services }
    }

    pub fn setup_db(&self) -> Result<()> {
        setup_db(&self.config.db_path)
    }

    pub fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.setup_db()
            .map_err(|err| AppError::Message(format!("initialize db: {}", err)))
    }

    pub fn open_db(&self) -> Result<Db> {
        Ok(Db::open(&self.config.db_path)?)
    }
}

pub fn setup_db(path: &std::path::Path) -> Result<()> {
    let mut db = Db::open(path)?;
    db.migrate()?;
    Ok(())
}
