//! Datasource Provisioner
//!
//! Builds one pool per data-source spec and registers it under the spec's
//! name together with its property prefix. Runs at most once.

use super::builder_registry::BuilderRegistry;
use super::registry::Registry;
use crate::config::validate_specs;
use crate::domain::entities::ResourceSpec;
use crate::domain::error::ProvisionError;
use crate::domain::naming::{property_prefix, DEFAULT_PROPERTY_BASE};
use crate::domain::value_objects::ResourceKind;
use once_cell::sync::OnceCell;
use std::sync::Arc;

pub struct DatasourceProvisioner {
    registry: Arc<Registry>,
    builders: BuilderRegistry,
    property_base: String,
    outcome: OnceCell<Result<(), ProvisionError>>,
}

impl DatasourceProvisioner {
    pub fn new(registry: Arc<Registry>, builders: BuilderRegistry) -> Self {
        Self {
            registry,
            builders,
            property_base: DEFAULT_PROPERTY_BASE.to_string(),
            outcome: OnceCell::new(),
        }
    }

    /// Base used for `<base>[<index>].<kind>` property prefixes.
    pub fn with_property_base(mut self, base: impl Into<String>) -> Self {
        self.property_base = base.into();
        self
    }

    /// Build and register a pool for every spec.
    ///
    /// The first call does the work; concurrent callers block until it
    /// finishes and every caller observes the same outcome.
    pub fn provision(&self, specs: &[ResourceSpec]) -> Result<(), ProvisionError> {
        self.outcome
            .get_or_init(|| self.provision_once(specs))
            .clone()
    }

    pub fn is_provisioned(&self) -> bool {
        matches!(self.outcome.get(), Some(Ok(())))
    }

    fn provision_once(&self, specs: &[ResourceSpec]) -> Result<(), ProvisionError> {
        if let Err(e) = validate_specs(specs) {
            tracing::error!("data-source configuration rejected: {}", e);
            return Err(e.into());
        }

        for (index, spec) in specs.iter().enumerate() {
            if self.registry.contains(ResourceKind::Pool, &spec.name) {
                let err = ProvisionError::DuplicateName {
                    name: spec.name.clone(),
                    entry: spec.describe(index),
                };
                tracing::error!("{}", err);
                return Err(err);
            }

            let builder = self.builders.resolve(spec).inspect_err(|e| {
                tracing::error!("{}", e);
            })?;
            let kind = builder.kind();

            let pool = builder.build(spec).map_err(|source| {
                let err = ProvisionError::Provisioning {
                    name: spec.name.clone(),
                    kind: ResourceKind::Pool,
                    source,
                };
                tracing::error!("{} ({})", err, spec.describe(index));
                err
            })?;

            let prefix = property_prefix(&self.property_base, index, kind);
            if !self.registry.add_pool_with_prefix(&spec.name, pool, prefix.clone()) {
                let err = ProvisionError::DuplicateName {
                    name: spec.name.clone(),
                    entry: spec.describe(index),
                };
                tracing::error!("{}", err);
                return Err(err);
            }

            tracing::info!(
                "registered {} pool `{}` (properties under {})",
                kind,
                spec.name,
                prefix
            );
        }

        tracing::info!("provisioned {} data source(s)", specs.len());
        Ok(())
    }
}
