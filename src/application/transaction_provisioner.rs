//! Transaction Provisioner
//!
//! Registers one transaction coordinator per pool present when it runs.

use super::registry::Registry;
use crate::domain::error::ProvisionError;
use crate::domain::naming::coordinator_name;
use crate::infrastructure::transaction::{TransactionCoordinator, TransactionSettings};
use once_cell::sync::OnceCell;
use std::sync::Arc;

pub struct TransactionProvisioner {
    registry: Arc<Registry>,
    settings: TransactionSettings,
    outcome: OnceCell<Result<(), ProvisionError>>,
}

impl TransactionProvisioner {
    pub fn new(registry: Arc<Registry>, settings: TransactionSettings) -> Self {
        Self {
            registry,
            settings,
            outcome: OnceCell::new(),
        }
    }

    /// Create a coordinator for every registered pool that lacks one.
    /// Pools registered after the first call are not picked up.
    pub fn provision_all(&self) -> Result<(), ProvisionError> {
        self.outcome.get_or_init(|| self.provision_once()).clone()
    }

    fn provision_once(&self) -> Result<(), ProvisionError> {
        let mut created = 0;

        for (name, pool) in self.registry.pools_snapshot() {
            let registered = coordinator_name(&name);
            let coordinator = Arc::new(TransactionCoordinator::new(name.as_str(), pool, self.settings));

            if self.registry.add_coordinator(&registered, coordinator) {
                tracing::info!(
                    "registered transaction coordinator `{}` ({})",
                    registered,
                    self.settings.behavior
                );
                created += 1;
            } else {
                tracing::debug!("transaction coordinator `{}` already present", registered);
            }
        }

        tracing::debug!("provisioned {} transaction coordinator(s)", created);
        Ok(())
    }
}
