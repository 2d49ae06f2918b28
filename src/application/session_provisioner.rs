//! Session Provisioner
//!
//! Registers a session factory and a session handle per pool, loading the
//! mapper files found under `<mapper-root>/<name>/*`.

use super::registry::Registry;
use crate::domain::error::ProvisionError;
use crate::domain::naming::{
    mapper_pattern, session_factory_name, session_handle_name, DEFAULT_MAPPER_ROOT,
};
use crate::domain::ports::SharedPool;
use crate::domain::value_objects::ResourceKind;
use crate::infrastructure::session::{
    load_mappers, resolve_mapper_files, ExecutorKind, SessionFactory, SessionHandle,
};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;

pub struct SessionProvisioner {
    registry: Arc<Registry>,
    mapper_root: PathBuf,
    executor: ExecutorKind,
    outcome: OnceCell<Result<(), ProvisionError>>,
}

impl SessionProvisioner {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            mapper_root: PathBuf::from(DEFAULT_MAPPER_ROOT),
            executor: ExecutorKind::default(),
            outcome: OnceCell::new(),
        }
    }

    pub fn with_mapper_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.mapper_root = root.into();
        self
    }

    pub fn with_executor(mut self, executor: ExecutorKind) -> Self {
        self.executor = executor;
        self
    }

    /// Create a factory and handle for every registered pool. Runs once.
    pub fn provision_all(&self) -> Result<(), ProvisionError> {
        self.outcome.get_or_init(|| self.provision_once()).clone()
    }

    fn provision_once(&self) -> Result<(), ProvisionError> {
        for (name, pool) in self.registry.pools_snapshot() {
            let factory = match self.registry.session_factory(&session_factory_name(&name)) {
                Some(existing) => {
                    tracing::debug!("session factory for `{}` already present", name);
                    existing
                }
                None => self.build_factory(&name, pool)?,
            };

            let handle_name = session_handle_name(&name);
            if !self.registry.contains(ResourceKind::SessionHandle, &handle_name) {
                self.registry
                    .add_session_handle(&handle_name, Arc::new(SessionHandle::new(factory)));
                tracing::info!("registered session handle `{}`", handle_name);
            }
        }
        Ok(())
    }

    fn build_factory(&self, name: &str, pool: SharedPool) -> Result<Arc<SessionFactory>, ProvisionError> {
        let fail = |e: ProvisionError| {
            tracing::error!("{}", e);
            e
        };

        let pattern = mapper_pattern(&self.mapper_root, name);
        let files = resolve_mapper_files(&pattern)
            .map_err(|e| fail(ProvisionError::provisioning(ResourceKind::SessionFactory, name, e)))?;
        if files.is_empty() {
            tracing::debug!("no mapper files match {}", pattern);
        }

        let statements = load_mappers(&files)
            .map_err(|e| fail(ProvisionError::provisioning(ResourceKind::SessionFactory, name, e)))?;

        let factory = SessionFactory::new(name, pool, statements, self.executor);
        factory
            .verify()
            .map_err(|e| fail(ProvisionError::provisioning(ResourceKind::SessionFactory, name, e)))?;

        let factory = Arc::new(factory);
        let registered = session_factory_name(name);
        self.registry.add_session_factory(&registered, factory.clone());
        tracing::info!(
            "registered session factory `{}` ({} mapper file(s), {} statement(s))",
            registered,
            factory.mapper_count(),
            factory.statement_ids().len()
        );
        Ok(factory)
    }
}
