//! Per-type pool of reusable building instances.
//!
//! Placing and removing buildings would otherwise construct and destroy
//! instances constantly. The pool parks released instances and hands them
//! back out on the next placement of the same type.
//!
//! The pool only deactivates and parks instances. Resetting per-run state
//! (health, alive flag) is the caller's job, see
//! [`EntityStore::reset_for_reuse`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::catalog::BuildingTypeId;
use crate::entity::{EntityId, EntityStore};

/// Constructs a fresh instance of the given type in the store.
///
/// Factories must tag the instance with the type they are given.
pub type InstanceFactory = Box<dyn FnMut(&mut EntityStore, BuildingTypeId) -> EntityId>;

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Idle instances constructed on registration.
    #[serde(default = "default_prewarm")]
    pub prewarm: usize,
    /// Maximum idle instances kept per type.
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,
}

const fn default_prewarm() -> usize {
    3
}

const fn default_max_idle() -> usize {
    10
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            prewarm: default_prewarm(),
            max_idle: default_max_idle(),
        }
    }
}

/// What happened to a released instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Deactivated and parked for reuse.
    Parked,
    /// Destroyed because the pool was full or the type is unknown.
    Destroyed,
    /// Already parked or already gone; nothing changed.
    Ignored,
}

struct PoolEntry {
    idle: Vec<EntityId>,
    /// Instances handed out and not yet released.
    outstanding: usize,
    factory: InstanceFactory,
}

impl fmt::Debug for PoolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolEntry")
            .field("idle", &self.idle)
            .field("outstanding", &self.outstanding)
            .finish_non_exhaustive()
    }
}

/// Pool of inactive building instances, one idle list per type.
#[derive(Debug, Default)]
pub struct InstancePool {
    config: PoolConfig,
    entries: BTreeMap<BuildingTypeId, PoolEntry>,
}

impl InstancePool {
    /// Create an empty pool.
    #[must_use]
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
        }
    }

    /// Pool sizing in use.
    #[must_use]
    pub const fn config(&self) -> PoolConfig {
        self.config
    }

    /// Associate a type with its factory and pre-warm idle instances.
    ///
    /// Idempotent: registering a known type again keeps the first factory
    /// and returns `false`.
    pub fn register(
        &mut self,
        type_id: BuildingTypeId,
        factory: InstanceFactory,
        store: &mut EntityStore,
    ) -> bool {
        if self.entries.contains_key(&type_id) {
            return false;
        }
        self.entries.insert(
            type_id,
            PoolEntry {
                idle: Vec::new(),
                outstanding: 0,
                factory,
            },
        );
        self.prewarm(type_id, store);
        true
    }

    /// Top a type's idle list up to the configured pre-warm count.
    pub fn prewarm(&mut self, type_id: BuildingTypeId, store: &mut EntityStore) {
        let target = self.config.prewarm.min(self.config.max_idle);
        let Some(entry) = self.entries.get_mut(&type_id) else {
            return;
        };
        while entry.idle.len() < target {
            let id = (entry.factory)(store, type_id);
            store.park(id);
            entry.idle.push(id);
        }
        tracing::debug!(type_id = type_id.0, idle = entry.idle.len(), "Pool pre-warmed");
    }

    /// Whether a type has been registered.
    #[must_use]
    pub fn is_registered(&self, type_id: BuildingTypeId) -> bool {
        self.entries.contains_key(&type_id)
    }

    /// Take an instance of a type, constructing one if none is idle.
    ///
    /// Returns `None` only for unregistered types. The caller activates the
    /// instance.
    pub fn acquire(&mut self, type_id: BuildingTypeId, store: &mut EntityStore) -> Option<EntityId> {
        let entry = self.entries.get_mut(&type_id)?;

        let reused = loop {
            match entry.idle.pop() {
                // Idle instances destroyed behind the pool's back are skipped
                Some(id) if store.contains(id) => break Some(id),
                Some(_) => continue,
                None => break None,
            }
        };

        let id = reused.unwrap_or_else(|| {
            tracing::debug!(type_id = type_id.0, "Pool empty, constructing instance");
            (entry.factory)(store, type_id)
        });
        entry.outstanding += 1;
        Some(id)
    }

    /// Return an instance to its type's idle list.
    ///
    /// The type comes from the instance itself. Instances of unregistered
    /// types, or released into a full pool, are destroyed instead of parked.
    pub fn release(&mut self, id: EntityId, store: &mut EntityStore) -> ReleaseOutcome {
        let Some(type_id) = store.type_of(id) else {
            return ReleaseOutcome::Ignored;
        };
        let max_idle = self.config.max_idle;

        let Some(entry) = self.entries.get_mut(&type_id) else {
            tracing::warn!(id, type_id = type_id.0, "Released instance of unpooled type");
            store.despawn(id);
            return ReleaseOutcome::Destroyed;
        };

        if entry.idle.contains(&id) {
            return ReleaseOutcome::Ignored;
        }
        entry.outstanding = entry.outstanding.saturating_sub(1);

        if entry.idle.len() >= max_idle {
            store.despawn(id);
            return ReleaseOutcome::Destroyed;
        }

        store.park(id);
        entry.idle.push(id);
        ReleaseOutcome::Parked
    }

    /// Destroy every idle instance. Registrations are kept.
    pub fn clear(&mut self, store: &mut EntityStore) {
        for entry in self.entries.values_mut() {
            for id in entry.idle.drain(..) {
                store.despawn(id);
            }
            entry.outstanding = 0;
        }
    }

    /// Idle instances of a type.
    #[must_use]
    pub fn idle_count(&self, type_id: BuildingTypeId) -> usize {
        self.entries.get(&type_id).map_or(0, |e| e.idle.len())
    }

    /// Instances of a type currently handed out.
    #[must_use]
    pub fn outstanding_count(&self, type_id: BuildingTypeId) -> usize {
        self.entries.get(&type_id).map_or(0, |e| e.outstanding)
    }

    /// Whether an instance is sitting in any idle list.
    #[must_use]
    pub fn is_idle(&self, id: EntityId) -> bool {
        self.entries.values().any(|e| e.idle.contains(&id))
    }

    /// Registered types in id order.
    pub fn registered_types(&self) -> impl Iterator<Item = BuildingTypeId> + '_ {
        self.entries.keys().copied()
    }
}
