//! Resource Registry
//!
//! Process-wide, name-keyed store of every provisioned resource. Maps are
//! `DashMap`s so provisioners and consumers can read and insert
//! concurrently. Entries are never replaced or removed once inserted.

use crate::domain::ports::SharedPool;
use crate::domain::value_objects::ResourceKind;
use crate::infrastructure::session::{SessionFactory, SessionHandle};
use crate::infrastructure::transaction::TransactionCoordinator;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Any registry resource.
#[derive(Clone)]
pub enum Resource {
    Pool(SharedPool),
    Coordinator(Arc<TransactionCoordinator>),
    SessionFactory(Arc<SessionFactory>),
    SessionHandle(Arc<SessionHandle>),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Pool(_) => ResourceKind::Pool,
            Self::Coordinator(_) => ResourceKind::Coordinator,
            Self::SessionFactory(_) => ResourceKind::SessionFactory,
            Self::SessionHandle(_) => ResourceKind::SessionHandle,
        }
    }

    pub fn as_pool(&self) -> Option<&SharedPool> {
        match self {
            Self::Pool(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn as_coordinator(&self) -> Option<&Arc<TransactionCoordinator>> {
        match self {
            Self::Coordinator(coordinator) => Some(coordinator),
            _ => None,
        }
    }

    pub fn as_session_factory(&self) -> Option<&Arc<SessionFactory>> {
        match self {
            Self::SessionFactory(factory) => Some(factory),
            _ => None,
        }
    }

    pub fn as_session_handle(&self) -> Option<&Arc<SessionHandle>> {
        match self {
            Self::SessionHandle(handle) => Some(handle),
            _ => None,
        }
    }

    /// Same underlying instance.
    pub fn ptr_eq(&self, other: &Resource) -> bool {
        match (self, other) {
            (Self::Pool(a), Self::Pool(b)) => Arc::ptr_eq(a, b),
            (Self::Coordinator(a), Self::Coordinator(b)) => Arc::ptr_eq(a, b),
            (Self::SessionFactory(a), Self::SessionFactory(b)) => Arc::ptr_eq(a, b),
            (Self::SessionHandle(a), Self::SessionHandle(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pool(pool) => f
                .debug_struct("Pool")
                .field("name", &pool.name())
                .field("kind", &pool.kind())
                .finish(),
            Self::Coordinator(c) => std::fmt::Debug::fmt(c, f),
            Self::SessionFactory(sf) => std::fmt::Debug::fmt(sf, f),
            Self::SessionHandle(h) => f
                .debug_struct("SessionHandle")
                .field("resource", &h.resource_name())
                .finish(),
        }
    }
}

/// Name-keyed store of pools and their derived resources.
#[derive(Default)]
pub struct Registry {
    pools: DashMap<String, SharedPool>,
    coordinators: DashMap<String, Arc<TransactionCoordinator>>,
    session_factories: DashMap<String, Arc<SessionFactory>>,
    session_handles: DashMap<String, Arc<SessionHandle>>,
    /// Resource name -> property prefix
    prefixes: DashMap<String, String>,
}

fn insert_new<V>(map: &DashMap<String, V>, name: &str, value: V) -> bool {
    if name.is_empty() {
        return false;
    }
    match map.entry(name.to_string()) {
        Entry::Occupied(_) => false,
        Entry::Vacant(slot) => {
            slot.insert(value);
            true
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pool. Returns `false` (and inserts nothing) for an empty
    /// name or a name already taken.
    pub fn add_pool(&self, name: &str, pool: SharedPool) -> bool {
        insert_new(&self.pools, name, pool)
    }

    /// Insert a pool together with its property prefix. The prefix is
    /// stored before the pool becomes visible, so a reader that finds the
    /// pool always finds its prefix. A rejected insert leaves any existing
    /// prefix untouched.
    pub fn add_pool_with_prefix(&self, name: &str, pool: SharedPool, prefix: impl Into<String>) -> bool {
        if name.is_empty() {
            return false;
        }
        match self.pools.entry(name.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                self.prefixes.insert(name.to_string(), prefix.into());
                slot.insert(pool);
                true
            }
        }
    }

    pub fn add_coordinator(&self, name: &str, coordinator: Arc<TransactionCoordinator>) -> bool {
        insert_new(&self.coordinators, name, coordinator)
    }

    pub fn add_session_factory(&self, name: &str, factory: Arc<SessionFactory>) -> bool {
        insert_new(&self.session_factories, name, factory)
    }

    pub fn add_session_handle(&self, name: &str, handle: Arc<SessionHandle>) -> bool {
        insert_new(&self.session_handles, name, handle)
    }

    pub fn set_property_prefix(&self, name: &str, prefix: impl Into<String>) {
        self.prefixes.insert(name.to_string(), prefix.into());
    }

    pub fn property_prefix(&self, name: &str) -> Option<String> {
        self.prefixes.get(name).map(|e| e.value().clone())
    }

    pub fn pool(&self, name: &str) -> Option<SharedPool> {
        self.pools.get(name).map(|e| e.value().clone())
    }

    pub fn coordinator(&self, name: &str) -> Option<Arc<TransactionCoordinator>> {
        self.coordinators.get(name).map(|e| e.value().clone())
    }

    pub fn session_factory(&self, name: &str) -> Option<Arc<SessionFactory>> {
        self.session_factories.get(name).map(|e| e.value().clone())
    }

    pub fn session_handle(&self, name: &str) -> Option<Arc<SessionHandle>> {
        self.session_handles.get(name).map(|e| e.value().clone())
    }

    /// Look up a resource of any kind.
    pub fn get(&self, kind: ResourceKind, name: &str) -> Option<Resource> {
        match kind {
            ResourceKind::Pool => self.pool(name).map(Resource::Pool),
            ResourceKind::Coordinator => self.coordinator(name).map(Resource::Coordinator),
            ResourceKind::SessionFactory => {
                self.session_factory(name).map(Resource::SessionFactory)
            }
            ResourceKind::SessionHandle => self.session_handle(name).map(Resource::SessionHandle),
        }
    }

    pub fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        match kind {
            ResourceKind::Pool => self.pools.contains_key(name),
            ResourceKind::Coordinator => self.coordinators.contains_key(name),
            ResourceKind::SessionFactory => self.session_factories.contains_key(name),
            ResourceKind::SessionHandle => self.session_handles.contains_key(name),
        }
    }

    /// Current pools, sorted by name.
    pub fn pools_snapshot(&self) -> Vec<(String, SharedPool)> {
        let mut pools: Vec<_> = self
            .pools
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        pools.sort_by(|a, b| a.0.cmp(&b.0));
        pools
    }

    /// Registered names of one kind, sorted.
    pub fn names(&self, kind: ResourceKind) -> Vec<String> {
        let mut names: Vec<String> = match kind {
            ResourceKind::Pool => self.pools.iter().map(|e| e.key().clone()).collect(),
            ResourceKind::Coordinator => {
                self.coordinators.iter().map(|e| e.key().clone()).collect()
            }
            ResourceKind::SessionFactory => self
                .session_factories
                .iter()
                .map(|e| e.key().clone())
                .collect(),
            ResourceKind::SessionHandle => self
                .session_handles
                .iter()
                .map(|e| e.key().clone())
                .collect(),
        };
        names.sort();
        names
    }

    pub fn len(&self, kind: ResourceKind) -> usize {
        match kind {
            ResourceKind::Pool => self.pools.len(),
            ResourceKind::Coordinator => self.coordinators.len(),
            ResourceKind::SessionFactory => self.session_factories.len(),
            ResourceKind::SessionHandle => self.session_handles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        ResourceKind::ALL.iter().all(|kind| self.len(*kind) == 0)
    }
}
