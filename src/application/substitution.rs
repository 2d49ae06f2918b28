//! Default-Substitution Layer
//!
//! Typed factory consumers go through to obtain resources by name. Names
//! owned by the registry always resolve to the registry's instance; the
//! reserved default names resolve to the caller's own instance, which is
//! then marked as the default for its kind.

use super::pipeline::ProvisioningPipeline;
use super::registry::{Registry, Resource};
use crate::domain::entities::ResourceSpec;
use crate::domain::error::ProvisionError;
use crate::domain::naming::{resource_name, DEFAULT_RESOURCE_NAME};
use crate::domain::ports::{PropertySource, SharedPool};
use crate::domain::value_objects::{ResourceKind, ResourceState};
use crate::infrastructure::property_binder::bind_from_source;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

type Key = (ResourceKind, String);

pub struct Substitution {
    registry: Arc<Registry>,
    properties: Arc<dyn PropertySource>,
    pipeline: Option<Arc<ProvisioningPipeline>>,
    default_name: String,
    /// Every (kind, name) the specs promise the registry will hold
    expected: HashSet<Key>,
    /// Registry instances handed out so far
    substituted: DashMap<Key, Resource>,
    /// Caller-built instances returned by `resolve`
    passthrough: DashMap<Key, Resource>,
    defaults: DashMap<ResourceKind, Resource>,
}

impl Substitution {
    pub fn new(
        registry: Arc<Registry>,
        properties: Arc<dyn PropertySource>,
        specs: &[ResourceSpec],
    ) -> Self {
        let expected = specs
            .iter()
            .flat_map(|spec| {
                ResourceKind::ALL
                    .into_iter()
                    .map(move |kind| (kind, resource_name(kind, &spec.name)))
            })
            .collect();

        Self {
            registry,
            properties,
            pipeline: None,
            default_name: DEFAULT_RESOURCE_NAME.to_string(),
            expected,
            substituted: DashMap::new(),
            passthrough: DashMap::new(),
            defaults: DashMap::new(),
        }
    }

    /// Substitution that runs `pipeline` before answering registry lookups.
    pub fn for_pipeline(pipeline: Arc<ProvisioningPipeline>, properties: Arc<dyn PropertySource>) -> Self {
        let mut substitution = Self::new(pipeline.registry().clone(), properties, pipeline.specs());
        substitution.pipeline = Some(pipeline);
        substitution
    }

    pub fn with_default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = name.into();
        self
    }

    /// Reserved name of the caller's own default resource of `kind`.
    pub fn reserved_name(&self, kind: ResourceKind) -> String {
        resource_name(kind, &self.default_name)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Decide which instance a consumer gets for `name`.
    ///
    /// 1. A reserved default name keeps `instance` and marks it as the
    ///    default for its kind (first one wins).
    /// 2. A name the registry owns, or is expected to own, resolves to the
    ///    registry's instance. Pools get late property binding first.
    /// 3. Anything else passes through.
    pub fn intercept(&self, name: &str, instance: Resource) -> Result<Resource, ProvisionError> {
        let kind = instance.kind();

        if name == self.reserved_name(kind) {
            self.mark_default(kind, name, &instance);
            return Ok(instance);
        }

        self.ensure_provisioned()?;
        if self.is_owned(kind, name) {
            return self.substitute(kind, name);
        }

        Ok(instance)
    }

    /// Typed factory: registry-owned names never call `fallback`; other
    /// names build the caller's instance once and run it through
    /// [`Self::intercept`].
    pub fn resolve<F>(&self, kind: ResourceKind, name: &str, fallback: F) -> Result<Resource, ProvisionError>
    where
        F: FnOnce() -> Resource,
    {
        let key = (kind, name.to_string());
        if let Some(existing) = self.substituted.get(&key) {
            return Ok(existing.value().clone());
        }
        if let Some(existing) = self.passthrough.get(&key) {
            return Ok(existing.value().clone());
        }

        if name != self.reserved_name(kind) {
            self.ensure_provisioned()?;
            if self.is_owned(kind, name) {
                return self.substitute(kind, name);
            }
        }

        // Racing callers may each build; the first stored instance wins.
        let resolved = self.intercept(name, fallback())?;
        Ok(self.passthrough.entry(key).or_insert(resolved).value().clone())
    }

    /// The instance marked as default for `kind`, if any.
    pub fn default_of(&self, kind: ResourceKind) -> Option<Resource> {
        self.defaults.get(&kind).map(|e| e.value().clone())
    }

    pub fn state(&self, kind: ResourceKind, name: &str) -> ResourceState {
        if self.substituted.contains_key(&(kind, name.to_string())) {
            ResourceState::Substituted
        } else if self.registry.contains(kind, name) {
            ResourceState::Provisioned
        } else {
            ResourceState::Unseen
        }
    }

    fn is_owned(&self, kind: ResourceKind, name: &str) -> bool {
        self.expected.contains(&(kind, name.to_string())) || self.registry.contains(kind, name)
    }

    fn ensure_provisioned(&self) -> Result<(), ProvisionError> {
        match &self.pipeline {
            Some(pipeline) => pipeline.run(),
            None => Ok(()),
        }
    }

    fn mark_default(&self, kind: ResourceKind, name: &str, instance: &Resource) {
        match self.defaults.entry(kind) {
            Entry::Vacant(slot) => {
                slot.insert(instance.clone());
                tracing::info!("`{}` is the default {}", name, kind);
            }
            Entry::Occupied(existing) => {
                if !existing.get().ptr_eq(instance) {
                    tracing::debug!("default {} already marked, keeping the first", kind);
                }
            }
        }
    }

    fn substitute(&self, kind: ResourceKind, name: &str) -> Result<Resource, ProvisionError> {
        match self.substituted.entry((kind, name.to_string())) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(slot) => {
                let resource = self.registry.get(kind, name).ok_or_else(|| {
                    let err = ProvisionError::MissingProvisionedResource {
                        kind,
                        name: name.to_string(),
                    };
                    tracing::error!("{}", err);
                    err
                })?;

                if let Resource::Pool(pool) = &resource {
                    self.bind_late(name, pool)?;
                }

                tracing::debug!("substituted registry {} `{}`", kind, name);
                slot.insert(resource.clone());
                Ok(resource)
            }
        }
    }

    /// Apply ambient properties under the pool's prefix.
    fn bind_late(&self, name: &str, pool: &SharedPool) -> Result<(), ProvisionError> {
        let Some(prefix) = self.registry.property_prefix(name) else {
            tracing::debug!("pool `{}` has no property prefix, skipping late binding", name);
            return Ok(());
        };

        let binding_error = |message: String| ProvisionError::PropertyBinding {
            name: name.to_string(),
            prefix: prefix.clone(),
            message,
        };

        let overrides = bind_from_source(self.properties.as_ref(), &prefix)
            .map_err(|e| binding_error(e.to_string()))?;
        if overrides.is_empty() {
            return Ok(());
        }

        pool.retune(&overrides)
            .map_err(|e| binding_error(e.to_string()))?;
        tracing::info!("bound late properties for pool `{}` from {}", name, prefix);
        Ok(())
    }
}
