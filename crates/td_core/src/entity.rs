//! Scene-side building instances.
//!
//! The store owns every building instance, whether placed, parked in the
//! pool or killed but not yet collected. Each instance carries its
//! [`BuildingTypeId`], so pooling never has to guess a type from a name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::BuildingTypeId;
use crate::grid::OccupantLookup;
use crate::math::Vec2Fixed;

/// Unique identifier for entities.
pub type EntityId = u64;

/// A building instance in the scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Unique identifier.
    pub id: EntityId,
    /// Building type this instance was built for.
    pub type_id: BuildingTypeId,
    /// World position.
    pub position: Vec2Fixed,
    /// Active instances take part in the game; parked ones do not.
    pub active: bool,
    /// Cleared when the instance dies outside the placement engine.
    pub alive: bool,
    /// Current health.
    pub health: i32,
    /// Maximum health.
    pub max_health: i32,
}

/// Owner of all building instances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStore {
    next_id: EntityId,
    instances: BTreeMap<EntityId, Instance>,
}

impl EntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            instances: BTreeMap::new(),
        }
    }

    /// Construct a fresh, inactive instance.
    pub fn spawn(&mut self, type_id: BuildingTypeId, max_health: i32) -> EntityId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.instances.insert(
            id,
            Instance {
                id,
                type_id,
                position: Vec2Fixed::ZERO,
                active: false,
                alive: true,
                health: max_health,
                max_health,
            },
        );
        id
    }

    /// Destroy an instance outright.
    pub fn despawn(&mut self, id: EntityId) -> Option<Instance> {
        self.instances.remove(&id)
    }

    /// Look up an instance.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    /// Check whether an instance exists (alive or not).
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.instances.contains_key(&id)
    }

    /// Building type of an instance.
    #[must_use]
    pub fn type_of(&self, id: EntityId) -> Option<BuildingTypeId> {
        self.instances.get(&id).map(|i| i.type_id)
    }

    /// Move an instance. Returns `false` if it does not exist.
    pub fn set_position(&mut self, id: EntityId, position: Vec2Fixed) -> bool {
        match self.instances.get_mut(&id) {
            Some(instance) => {
                instance.position = position;
                true
            }
            None => false,
        }
    }

    /// Activate an instance at a position.
    pub fn activate(&mut self, id: EntityId, position: Vec2Fixed) -> bool {
        match self.instances.get_mut(&id) {
            Some(instance) => {
                instance.active = true;
                instance.position = position;
                true
            }
            None => false,
        }
    }

    /// Deactivate an instance and move it to the parking position.
    pub fn park(&mut self, id: EntityId) -> bool {
        match self.instances.get_mut(&id) {
            Some(instance) => {
                instance.active = false;
                instance.position = Vec2Fixed::ZERO;
                true
            }
            None => false,
        }
    }

    /// Restore per-run state before an instance goes back to the pool.
    pub fn reset_for_reuse(&mut self, id: EntityId) -> bool {
        match self.instances.get_mut(&id) {
            Some(instance) => {
                instance.alive = true;
                instance.health = instance.max_health;
                instance.position = Vec2Fixed::ZERO;
                true
            }
            None => false,
        }
    }

    /// Mark an instance dead without touching any grid.
    pub fn kill(&mut self, id: EntityId) -> bool {
        match self.instances.get_mut(&id) {
            Some(instance) => {
                instance.alive = false;
                instance.health = 0;
                true
            }
            None => false,
        }
    }

    /// Move an instance from outside the placement engine, e.g. knockback.
    ///
    /// Grids are not told; cells the instance held reconcile on next query.
    pub fn displace(&mut self, id: EntityId, by: Vec2Fixed) -> bool {
        match self.instances.get_mut(&id) {
            Some(instance) => {
                instance.position = instance.position + by;
                true
            }
            None => false,
        }
    }

    /// Apply damage; returns remaining health. Reaching zero kills the instance.
    pub fn damage(&mut self, id: EntityId, amount: i32) -> Option<i32> {
        let instance = self.instances.get_mut(&id)?;
        if !instance.alive {
            return Some(0);
        }
        instance.health = instance.health.saturating_sub(amount.max(0)).max(0);
        if instance.health == 0 {
            instance.alive = false;
        }
        Some(instance.health)
    }

    /// Number of instances of a type, in any state.
    #[must_use]
    pub fn count_of_type(&self, type_id: BuildingTypeId) -> usize {
        self.instances
            .values()
            .filter(|i| i.type_id == type_id)
            .count()
    }

    /// All instances in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    /// Total number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl OccupantLookup for EntityStore {
    fn is_alive(&self, id: EntityId) -> bool {
        self.instances
            .get(&id)
            .is_some_and(|i| i.alive && i.active)
    }

    fn position_of(&self, id: EntityId) -> Option<Vec2Fixed> {
        self.instances.get(&id).map(|i| i.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALL: BuildingTypeId = BuildingTypeId::new(2);

    #[test]
    fn test_spawn_assigns_unique_ids() {
        let mut store = EntityStore::new();
        let a = store.spawn(WALL, 50);
        let b = store.spawn(WALL, 50);
        assert_ne!(a, b);
        assert_eq!(store.count_of_type(WALL), 2);
        assert_eq!(store.type_of(a), Some(WALL));
    }

    #[test]
    fn test_default_store_never_hands_out_zero() {
        let mut store = EntityStore::default();
        assert_eq!(store.spawn(WALL, 50), 1);
    }

    #[test]
    fn test_spawned_instances_are_inactive() {
        let mut store = EntityStore::new();
        let id = store.spawn(WALL, 50);
        assert!(!store.is_alive(id));
        store.activate(id, Vec2Fixed::from_units(3, 4));
        assert!(store.is_alive(id));
        assert_eq!(store.position_of(id), Some(Vec2Fixed::from_units(3, 4)));
    }

    #[test]
    fn test_damage_kills_at_zero() {
        let mut store = EntityStore::new();
        let id = store.spawn(WALL, 50);
        store.activate(id, Vec2Fixed::ZERO);
        assert_eq!(store.damage(id, 20), Some(30));
        assert_eq!(store.damage(id, 100), Some(0));
        assert!(!store.is_alive(id));
        assert_eq!(store.damage(999, 1), None);
    }

    #[test]
    fn test_reset_for_reuse_restores_health() {
        let mut store = EntityStore::new();
        let id = store.spawn(WALL, 50);
        store.activate(id, Vec2Fixed::from_units(10, 10));
        store.kill(id);
        store.reset_for_reuse(id);
        let instance = store.get(id).unwrap();
        assert!(instance.alive);
        assert_eq!(instance.health, 50);
        assert_eq!(instance.position, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_park_deactivates() {
        let mut store = EntityStore::new();
        let id = store.spawn(WALL, 50);
        store.activate(id, Vec2Fixed::from_units(10, 10));
        assert!(store.park(id));
        assert!(!store.is_alive(id));
        assert!(store.contains(id));
        assert!(store.despawn(id).is_some());
        assert!(!store.park(id));
    }
}
