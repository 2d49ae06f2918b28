//! Builder Registry
//!
//! Selects the pool builder for a data source: the explicit `kind` when one
//! is given, otherwise the first registered builder in probe order.

use crate::adapters::outbound::NativePoolBuilder;
#[cfg(feature = "r2d2")]
use crate::adapters::outbound::R2d2PoolBuilder;
use crate::domain::entities::ResourceSpec;
use crate::domain::error::ProvisionError;
use crate::domain::ports::PoolBuilder;
use crate::domain::value_objects::PoolKind;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct BuilderRegistry {
    builders: Vec<Arc<dyn PoolBuilder>>,
}

impl BuilderRegistry {
    /// A registry with no builders.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every builder compiled into this binary.
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        #[cfg(feature = "r2d2")]
        let registry = registry.register(Arc::new(R2d2PoolBuilder));
        registry.register(Arc::new(NativePoolBuilder))
    }

    /// Add a builder, replacing any builder of the same kind.
    pub fn register(mut self, builder: Arc<dyn PoolBuilder>) -> Self {
        let kind = builder.kind();
        self.builders.retain(|b| b.kind() != kind);
        self.builders.push(builder);
        self
    }

    /// Registered kinds in probe order.
    pub fn kinds(&self) -> Vec<PoolKind> {
        PoolKind::PROBE_ORDER
            .into_iter()
            .filter(|kind| self.get(*kind).is_some())
            .collect()
    }

    pub fn get(&self, kind: PoolKind) -> Option<Arc<dyn PoolBuilder>> {
        self.builders.iter().find(|b| b.kind() == kind).cloned()
    }

    /// Pick the builder for `spec`.
    pub fn resolve(&self, spec: &ResourceSpec) -> Result<Arc<dyn PoolBuilder>, ProvisionError> {
        match spec.kind.as_deref() {
            Some(tag) => PoolKind::from_tag(tag)
                .and_then(|kind| self.get(kind))
                .ok_or_else(|| ProvisionError::UnsupportedKind {
                    name: spec.name.clone(),
                    kind: tag.to_string(),
                    available: join_kinds(&self.kinds()),
                }),
            None => PoolKind::PROBE_ORDER
                .into_iter()
                .find_map(|kind| self.get(kind))
                .ok_or_else(|| ProvisionError::NoBuilderAvailable {
                    name: spec.name.clone(),
                    probed: join_kinds(&PoolKind::PROBE_ORDER),
                }),
        }
    }
}

fn join_kinds(kinds: &[PoolKind]) -> String {
    if kinds.is_empty() {
        return "none".to_string();
    }
    kinds
        .iter()
        .map(PoolKind::short_name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::error::Cause;
    use crate::domain::ports::SharedPool;

    /// Builder that records its kind and always fails.
    struct FailingBuilder(PoolKind);

    impl PoolBuilder for FailingBuilder {
        fn kind(&self) -> PoolKind {
            self.0
        }

        fn build(&self, _spec: &ResourceSpec) -> Result<SharedPool, Cause> {
            Err(crate::domain::error::cause(std::io::Error::other("unreachable")))
        }
    }

    #[test]
    fn test_explicit_kind() {
        let registry = BuilderRegistry::with_defaults();
        let spec = ResourceSpec::new("orders", ":memory:").kind("native");
        assert_eq!(registry.resolve(&spec).unwrap().kind(), PoolKind::Native);
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let registry = BuilderRegistry::with_defaults();
        let spec = ResourceSpec::new("orders", ":memory:").kind("hikari");

        let err = registry.resolve(&spec).err().unwrap();
        assert!(matches!(err, ProvisionError::UnsupportedKind { ref kind, .. } if kind == "hikari"));
        assert!(err.to_string().contains("native"));
    }

    #[test]
    fn test_known_but_unregistered_kind_is_unsupported() {
        let registry = BuilderRegistry::empty().register(Arc::new(NativePoolBuilder));
        let spec = ResourceSpec::new("orders", ":memory:").kind("r2d2");

        let err = registry.resolve(&spec).err().unwrap();
        assert!(matches!(err, ProvisionError::UnsupportedKind { ref available, .. } if available == "native"));
    }

    #[test]
    fn test_probe_falls_back_to_native() {
        let registry = BuilderRegistry::empty().register(Arc::new(NativePoolBuilder));
        let spec = ResourceSpec::new("orders", ":memory:");
        assert_eq!(registry.resolve(&spec).unwrap().kind(), PoolKind::Native);
    }

    #[cfg(feature = "r2d2")]
    #[test]
    fn test_probe_prefers_r2d2() {
        let registry = BuilderRegistry::with_defaults();
        let spec = ResourceSpec::new("orders", ":memory:");
        assert_eq!(registry.resolve(&spec).unwrap().kind(), PoolKind::R2d2);
        assert_eq!(registry.kinds(), vec![PoolKind::R2d2, PoolKind::Native]);
    }

    #[test]
    fn test_probe_with_no_builders() {
        let spec = ResourceSpec::new("orders", ":memory:");
        let err = BuilderRegistry::empty().resolve(&spec).err().unwrap();
        assert!(matches!(err, ProvisionError::NoBuilderAvailable { .. }));
        assert!(err.to_string().contains("r2d2, native"));
    }

    #[test]
    fn test_register_replaces_same_kind() {
        let registry = BuilderRegistry::empty()
            .register(Arc::new(NativePoolBuilder))
            .register(Arc::new(FailingBuilder(PoolKind::Native)));

        assert_eq!(registry.kinds(), vec![PoolKind::Native]);
        let builder = registry.get(PoolKind::Native).unwrap();
        assert!(builder
            .build(&ResourceSpec::new("orders", ":memory:"))
            .is_err());
    }
}
