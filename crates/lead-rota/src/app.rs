//! Wiring from configuration to store, registry and engine.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use rota_config::RotaConfig;
use rota_registry::TenantRegistry;
use rota_scheduler::{DistributionEngine, ScheduleTrigger, TriggerSettings};
use rota_store::{DocumentStore, FileStore};

pub(crate) struct App {
    pub config: RotaConfig,
    pub registry: TenantRegistry,
    pub engine: DistributionEngine,
}

impl App {
    pub(crate) fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = RotaConfig::load(config_path).context("Failed to load config")?;
        Ok(Self::from_config(config))
    }

    pub(crate) fn from_config(config: RotaConfig) -> Self {
        let store: Arc<dyn DocumentStore> = Arc::new(FileStore::new(config.data_dir()));
        let registry = TenantRegistry::new(Arc::clone(&store));
        let engine = DistributionEngine::from_config(store, &config);
        Self {
            config,
            registry,
            engine,
        }
    }

    pub(crate) fn trigger(&self) -> Result<ScheduleTrigger> {
        let settings = TriggerSettings::from_config(&self.config)?;
        Ok(ScheduleTrigger::new(
            self.registry.clone(),
            self.engine.clone(),
            settings,
        ))
    }
}
