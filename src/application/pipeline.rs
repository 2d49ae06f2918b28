//! Provisioning pipeline
//!
//! Runs the datasource, transaction and session provisioners in order over
//! one shared registry.

use super::builder_registry::BuilderRegistry;
use super::datasource_provisioner::DatasourceProvisioner;
use super::registry::Registry;
use super::session_provisioner::SessionProvisioner;
use super::transaction_provisioner::TransactionProvisioner;
use crate::config::AppConfig;
use crate::domain::entities::ResourceSpec;
use crate::domain::error::ProvisionError;
use crate::domain::naming::{DEFAULT_MAPPER_ROOT, DEFAULT_PROPERTY_BASE};
use crate::infrastructure::session::ExecutorKind;
use crate::infrastructure::transaction::TransactionSettings;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub property_base: String,
    pub mapper_root: PathBuf,
    pub executor: ExecutorKind,
    pub transaction: TransactionSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            property_base: DEFAULT_PROPERTY_BASE.to_string(),
            mapper_root: PathBuf::from(DEFAULT_MAPPER_ROOT),
            executor: ExecutorKind::default(),
            transaction: TransactionSettings::default(),
        }
    }
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            property_base: config.property_base.clone(),
            mapper_root: config.mapper_root.clone(),
            executor: config.executor,
            transaction: TransactionSettings {
                behavior: config.tx_behavior,
            },
        }
    }
}

pub struct ProvisioningPipeline {
    registry: Arc<Registry>,
    specs: Vec<ResourceSpec>,
    datasources: DatasourceProvisioner,
    transactions: TransactionProvisioner,
    sessions: SessionProvisioner,
}

impl ProvisioningPipeline {
    pub fn new(specs: Vec<ResourceSpec>, builders: BuilderRegistry, settings: PipelineSettings) -> Self {
        let registry = Arc::new(Registry::new());

        let datasources = DatasourceProvisioner::new(registry.clone(), builders)
            .with_property_base(settings.property_base);
        let transactions = TransactionProvisioner::new(registry.clone(), settings.transaction);
        let sessions = SessionProvisioner::new(registry.clone())
            .with_mapper_root(settings.mapper_root)
            .with_executor(settings.executor);

        Self {
            registry,
            specs,
            datasources,
            transactions,
            sessions,
        }
    }

    /// Provision everything. Safe to call repeatedly and concurrently;
    /// each stage runs once.
    pub fn run(&self) -> Result<(), ProvisionError> {
        self.datasources.provision(&self.specs)?;
        self.transactions.provision_all()?;
        self.sessions.provision_all()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn specs(&self) -> &[ResourceSpec] {
        &self.specs
    }
}
