//! The placement board: both grids, the instance pool and every placed building.
//!
//! Controllers never touch grids or the pool directly; they go through the
//! board, which keeps [`PlacedBuilding`] records, grid cells and instance
//! state consistent with each other.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::catalog::{BuildingCatalog, BuildingClass, BuildingType, BuildingTypeId};
use crate::collaborators::{Collaborators, PlacementEvent, UnitInfo};
use crate::config::BoardConfig;
use crate::entity::{EntityId, EntityStore};
use crate::error::{ConfigError, PlacementError, Result};
use crate::grid::{CellCoord, Footprint, FootprintCheck, GridKind, OccupancyGrid, OccupantLookup};
use crate::math::{Fixed, Vec2Fixed};
use crate::pool::{InstanceFactory, InstancePool};

/// Why a building left the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalCause {
    /// Health reached zero.
    Destroyed,
    /// The player sold it.
    Sold,
    /// Removed by game logic, e.g. a scripted event.
    Removed,
}

/// Record of a building on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedBuilding {
    /// Building instance.
    pub entity: EntityId,
    /// Building type.
    pub type_id: BuildingTypeId,
    /// Placement category.
    pub class: BuildingClass,
    /// Cells covered.
    pub footprint: Footprint,
    /// Grid the building belongs to.
    pub grid: GridKind,
    /// Lowest footprint cell. `None` while lifted by a drag or resting off-grid.
    pub anchor: Option<CellCoord>,
    /// Cleared when the building's death has been reported but not yet collected.
    pub alive: bool,
}

impl PlacedBuilding {
    /// Whether the building currently holds grid cells.
    #[must_use]
    pub const fn is_on_grid(&self) -> bool {
        self.anchor.is_some()
    }
}

/// Both grids, the pool, the entity store and the placed-building records.
#[derive(Debug)]
pub struct Board {
    config: BoardConfig,
    general: OccupancyGrid,
    dense: OccupancyGrid,
    catalog: BuildingCatalog,
    pool: InstancePool,
    entities: EntityStore,
    placed: BTreeMap<EntityId, PlacedBuilding>,
}

impl Board {
    /// Build a board and register every catalog type with the pool.
    pub fn new(config: BoardConfig, catalog: BuildingCatalog) -> std::result::Result<Self, ConfigError> {
        config.validate()?;

        let general = OccupancyGrid::new(
            GridKind::General,
            config.general_grid.to_geometry(GridKind::General)?,
        )
        .with_occupant_tolerance(config.occupant_tolerance_cells);
        let dense = OccupancyGrid::new(GridKind::Dense, config.dense_grid.to_geometry(GridKind::Dense)?)
            .with_occupant_tolerance(config.occupant_tolerance_cells);

        let mut board = Self {
            pool: InstancePool::new(config.pool),
            config,
            general,
            dense,
            catalog: BuildingCatalog::new(),
            entities: EntityStore::new(),
            placed: BTreeMap::new(),
        };

        for building in catalog.iter() {
            board.register_type(building.clone())?;
        }

        tracing::info!(
            types = board.catalog.len(),
            general = ?(board.general.width(), board.general.height()),
            dense = ?(board.dense.width(), board.dense.height()),
            "Board ready"
        );
        Ok(board)
    }

    /// Register a building type with a factory that spawns plain instances.
    pub fn register_type(&mut self, building: BuildingType) -> std::result::Result<bool, ConfigError> {
        let health = building.health;
        let factory: InstanceFactory =
            Box::new(move |store: &mut EntityStore, type_id| store.spawn(type_id, health));
        self.register_type_with(building, factory)
    }

    /// Register a building type with a custom instance factory.
    ///
    /// Returns `Ok(false)` if the type was already registered. Fails if the
    /// footprint cannot fit on its grid at all.
    pub fn register_type_with(
        &mut self,
        building: BuildingType,
        factory: InstanceFactory,
    ) -> std::result::Result<bool, ConfigError> {
        let grid = self.grid(building.grid());
        if building.footprint.width > grid.width() || building.footprint.height > grid.height() {
            return Err(ConfigError::InvalidBuilding {
                id: building.id.0,
                message: format!("footprint larger than the {} grid", grid.kind().name()),
            });
        }

        let type_id = building.id;
        if !self.catalog.register(building) {
            return Ok(false);
        }
        self.pool.register(type_id, factory, &mut self.entities);
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Configuration the board was built from.
    #[must_use]
    pub const fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Registered building types.
    #[must_use]
    pub const fn catalog(&self) -> &BuildingCatalog {
        &self.catalog
    }

    /// One of the two grids.
    #[must_use]
    pub const fn grid(&self, kind: GridKind) -> &OccupancyGrid {
        match kind {
            GridKind::General => &self.general,
            GridKind::Dense => &self.dense,
        }
    }

    /// A grid together with the scene lookup its queries need.
    pub fn grid_with_lookup(&mut self, kind: GridKind) -> (&mut OccupancyGrid, &EntityStore) {
        let grid = match kind {
            GridKind::General => &mut self.general,
            GridKind::Dense => &mut self.dense,
        };
        (grid, &self.entities)
    }

    /// The instance pool.
    #[must_use]
    pub const fn pool(&self) -> &InstancePool {
        &self.pool
    }

    /// Every building instance, placed or parked.
    #[must_use]
    pub const fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// Mutable instance access for game logic outside placement.
    ///
    /// Changes made here (deaths, knockback) are not reported to the grids;
    /// grid queries reconcile them lazily.
    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    /// Record of a placed building.
    #[must_use]
    pub fn placed(&self, entity: EntityId) -> Option<&PlacedBuilding> {
        self.placed.get(&entity)
    }

    /// All placed buildings in id order.
    pub fn placed_buildings(&self) -> impl Iterator<Item = &PlacedBuilding> {
        self.placed.values()
    }

    /// Number of placed buildings, on or off the grid.
    #[must_use]
    pub fn placed_count(&self) -> usize {
        self.placed.len()
    }

    /// Current world position of an instance.
    #[must_use]
    pub fn position_of(&self, entity: EntityId) -> Option<Vec2Fixed> {
        self.entities.get(entity).map(|i| i.position)
    }

    /// What the selection panel shows for a building.
    #[must_use]
    pub fn unit_info(&self, entity: EntityId) -> Option<UnitInfo> {
        let instance = self.entities.get(entity)?;
        let name = self
            .catalog
            .get(instance.type_id)
            .map(|t| t.name.clone())
            .unwrap_or_default();
        Some(UnitInfo {
            entity,
            type_id: instance.type_id,
            name,
            health: instance.health,
            max_health: instance.max_health,
        })
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Self-healing occupancy query.
    pub fn is_occupied(&mut self, kind: GridKind, cell: CellCoord) -> bool {
        let (grid, lookup) = self.grid_with_lookup(kind);
        grid.is_occupied(cell, lookup)
    }

    /// Check a footprint on a grid, ignoring cells held by `excluding`.
    pub fn check_footprint(
        &mut self,
        kind: GridKind,
        anchor: CellCoord,
        footprint: Footprint,
        excluding: Option<EntityId>,
    ) -> FootprintCheck {
        let (grid, lookup) = self.grid_with_lookup(kind);
        grid.check_footprint(anchor, footprint, excluding, lookup)
    }

    /// Nearest anchor from `from` where the whole footprint is free.
    pub fn find_nearest_free_anchor(
        &mut self,
        kind: GridKind,
        from: Vec2Fixed,
        footprint: Footprint,
        excluding: Option<EntityId>,
    ) -> Option<CellCoord> {
        let (grid, lookup) = self.grid_with_lookup(kind);
        grid.find_nearest_free_anchor(from, footprint, excluding, lookup)
    }

    /// Live, grid-resident building under a world position.
    ///
    /// Resolved through cell data, dense grid first since it sits on top.
    /// Off-grid walls and lifted buildings are never hit.
    pub fn building_at(&mut self, pos: Vec2Fixed) -> Option<EntityId> {
        for kind in [GridKind::Dense, GridKind::General] {
            let (grid, lookup) = self.grid_with_lookup(kind);
            let Some(cell) = grid.world_to_cell(pos) else {
                continue;
            };
            if !grid.is_occupied(cell, lookup) {
                continue;
            }
            let Some(entity) = grid.occupant_at(cell) else {
                continue;
            };
            if self
                .placed
                .get(&entity)
                .is_some_and(|p| p.alive && p.is_on_grid())
            {
                return Some(entity);
            }
        }
        None
    }

    /// Closest live building of `class` to `pos`, with its distance.
    #[must_use]
    pub fn nearest_same_class(
        &self,
        class: BuildingClass,
        pos: Vec2Fixed,
        excluding: Option<EntityId>,
    ) -> Option<(EntityId, Fixed)> {
        self.placed
            .values()
            .filter(|p| p.class == class && p.alive && Some(p.entity) != excluding)
            .filter_map(|p| {
                let instance = self.entities.get(p.entity)?;
                instance
                    .alive
                    .then(|| (p.entity, instance.position.distance_squared(pos)))
            })
            .min_by_key(|(id, d)| (*d, *id))
            .map(|(id, d)| (id, crate::math::fixed_sqrt(d)))
    }

    // ------------------------------------------------------------------------
    // Placement and movement
    // ------------------------------------------------------------------------

    /// Take an instance from the pool and put it on the grid.
    ///
    /// Either the whole footprint is occupied and a record created, or
    /// nothing changes and the instance goes back to the pool. Economy is not
    /// touched.
    pub fn spawn_building(&mut self, type_id: BuildingTypeId, anchor: CellCoord) -> Result<EntityId> {
        let building = self
            .catalog
            .get(type_id)
            .ok_or(PlacementError::UnknownBuildingType(type_id))?;
        let (class, footprint, kind) = (building.class, building.footprint, building.grid());

        let center = self
            .grid(kind)
            .footprint_center(anchor, footprint)
            .ok_or(PlacementError::OutOfBounds)?;
        let entity = self
            .pool
            .acquire(type_id, &mut self.entities)
            .ok_or(PlacementError::UnknownBuildingType(type_id))?;
        self.entities.reset_for_reuse(entity);
        self.entities.activate(entity, center);

        let (grid, lookup) = self.grid_with_lookup(kind);
        if !grid.occupy_footprint(anchor, footprint, entity, lookup) {
            let error = match grid.check_footprint(anchor, footprint, Some(entity), lookup) {
                FootprintCheck::Blocked { cell, occupant } => PlacementError::Occupied {
                    cell,
                    occupant: Some(occupant),
                },
                _ => PlacementError::OutOfBounds,
            };
            self.pool.release(entity, &mut self.entities);
            return Err(error);
        }

        self.placed.insert(
            entity,
            PlacedBuilding {
                entity,
                type_id,
                class,
                footprint,
                grid: kind,
                anchor: Some(anchor),
                alive: true,
            },
        );
        self.debug_check_invariants();
        Ok(entity)
    }

    /// Release the cells a building holds and mark it lifted.
    ///
    /// Returns the anchor it was lifted from. Cells already taken over by
    /// another occupant are left alone.
    pub fn lift(&mut self, entity: EntityId) -> Option<CellCoord> {
        let record = self.placed.get_mut(&entity)?;
        let anchor = record.anchor.take()?;
        let (kind, footprint) = (record.grid, record.footprint);
        self.release_cells_held_by(kind, anchor, footprint, entity);
        tracing::debug!(entity, x = anchor.x, y = anchor.y, "Building lifted");
        Some(anchor)
    }

    /// Put a lifted building down at `anchor`, moving it to the footprint centre.
    ///
    /// Fails without side effects if the footprint is not free or the
    /// building has died.
    pub fn settle(&mut self, entity: EntityId, anchor: CellCoord) -> bool {
        let Some(record) = self.placed.get(&entity) else {
            return false;
        };
        if !record.alive || !self.entities.is_alive(entity) {
            return false;
        }
        let (kind, footprint) = (record.grid, record.footprint);
        let Some(center) = self.grid(kind).footprint_center(anchor, footprint) else {
            return false;
        };

        let (grid, lookup) = self.grid_with_lookup(kind);
        if !grid.occupy_footprint(anchor, footprint, entity, lookup) {
            return false;
        }
        self.entities.set_position(entity, center);
        if let Some(record) = self.placed.get_mut(&entity) {
            record.anchor = Some(anchor);
        }
        self.debug_check_invariants();
        true
    }

    /// Leave a lifted building at a raw world position with no cells held.
    pub fn rest_off_grid(&mut self, entity: EntityId, position: Vec2Fixed) -> bool {
        let Some(record) = self.placed.get_mut(&entity) else {
            return false;
        };
        record.anchor = None;
        self.entities.set_position(entity, position)
    }

    /// Move an instance without touching any grid, e.g. while dragged.
    pub fn set_position(&mut self, entity: EntityId, position: Vec2Fixed) -> bool {
        self.entities.set_position(entity, position)
    }

    /// Trade places between a lifted building and a grid-resident one.
    ///
    /// `dragged` goes to `other`'s anchor and `other` goes to
    /// `dragged_origin`. If either footprint does not fit, everything is
    /// rolled back, `other` keeps its cells and `dragged` stays lifted.
    pub fn swap(&mut self, dragged: EntityId, dragged_origin: CellCoord, other: EntityId) -> bool {
        let (Some(dragged_record), Some(other_record)) =
            (self.placed.get(&dragged), self.placed.get(&other))
        else {
            return false;
        };
        if dragged == other || dragged_record.grid != other_record.grid {
            return false;
        }
        let Some(other_anchor) = other_record.anchor else {
            return false;
        };

        let Some(lifted) = self.lift(other) else {
            return false;
        };
        debug_assert_eq!(lifted, other_anchor);

        if self.settle(dragged, other_anchor) {
            if self.settle(other, dragged_origin) {
                return true;
            }
            self.lift(dragged);
        }

        if !self.settle(other, other_anchor) {
            tracing::warn!(other, "Swap rollback could not restore building");
        }
        false
    }

    // ------------------------------------------------------------------------
    // Removal and death
    // ------------------------------------------------------------------------

    /// Take a building off the board and return its instance to the pool.
    ///
    /// Releases its cells, returns tower population, clears a selection
    /// pointing at it and reports [`PlacementEvent::BuildingRemoved`].
    pub fn remove_building(
        &mut self,
        entity: EntityId,
        cause: RemovalCause,
        collab: &mut Collaborators<'_>,
    ) -> bool {
        let Some(record) = self.placed.remove(&entity) else {
            return false;
        };
        if let Some(anchor) = record.anchor {
            self.release_cells_held_by(record.grid, anchor, record.footprint, entity);
        }

        if record.class.uses_population() {
            if let Some(building) = self.catalog.get(record.type_id) {
                collab.economy.remove_population(building.population_cost);
            }
        }
        if collab.selection.is_unit_selected(entity) {
            collab.selection.clear_selection();
        }

        self.entities.reset_for_reuse(entity);
        let outcome = self.pool.release(entity, &mut self.entities);

        tracing::info!(entity, type_id = record.type_id.0, ?cause, ?outcome, "Building removed");
        collab.notifier.notify(PlacementEvent::BuildingRemoved {
            entity,
            type_id: record.type_id,
            cause,
        });
        self.debug_check_invariants();
        true
    }

    /// Damage a building; a building reduced to zero health is removed.
    ///
    /// Returns the remaining health, or `None` for unknown instances.
    pub fn apply_damage(
        &mut self,
        entity: EntityId,
        amount: i32,
        collab: &mut Collaborators<'_>,
    ) -> Option<i32> {
        let remaining = self.entities.damage(entity, amount)?;
        if remaining == 0 && self.placed.contains_key(&entity) {
            self.remove_building(entity, RemovalCause::Destroyed, collab);
        }
        Some(remaining)
    }

    /// Report a death without going through the grids.
    ///
    /// The record stays until [`Self::sweep_destroyed`]; its cells read as
    /// free immediately through reconciliation.
    pub fn kill(&mut self, entity: EntityId) -> bool {
        if !self.entities.kill(entity) {
            return false;
        }
        if let Some(record) = self.placed.get_mut(&entity) {
            record.alive = false;
        }
        true
    }

    /// Sell a building for part of its base cost.
    ///
    /// Returns the refunded amount.
    pub fn sell(&mut self, entity: EntityId, collab: &mut Collaborators<'_>) -> Option<i32> {
        let record = self.placed.get(&entity)?;
        if !record.alive {
            return None;
        }
        let base_cost = self.catalog.get(record.type_id).map_or(0, |t| t.base_cost);
        let percent = i64::from(self.config.sell_refund_percent);
        let refund = i32::try_from(i64::from(base_cost) * percent / 100).unwrap_or(0);

        if !self.remove_building(entity, RemovalCause::Sold, collab) {
            return None;
        }
        collab.economy.refund(refund);
        Some(refund)
    }

    /// Remove every placed building whose instance died or vanished.
    pub fn sweep_destroyed(&mut self, collab: &mut Collaborators<'_>) -> Vec<EntityId> {
        let dead: Vec<EntityId> = self
            .placed
            .values()
            .filter(|p| !p.alive || !self.entities.get(p.entity).is_some_and(|i| i.alive))
            .map(|p| p.entity)
            .collect();
        for &entity in &dead {
            self.remove_building(entity, RemovalCause::Destroyed, collab);
        }
        dead
    }

    /// Clear both grids, destroy every placed instance and re-prewarm the pool.
    ///
    /// Economy state is the caller's to reset.
    pub fn reset(&mut self) {
        self.general.reset();
        self.dense.reset();
        for entity in std::mem::take(&mut self.placed).into_keys() {
            self.entities.despawn(entity);
        }
        self.pool.clear(&mut self.entities);
        let types: Vec<BuildingTypeId> = self.pool.registered_types().collect();
        for type_id in types {
            self.pool.prewarm(type_id, &mut self.entities);
        }
        tracing::info!("Board reset");
    }

    /// Deterministic hash over both grids and all placed buildings.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.general.hash_into(&mut hasher);
        self.dense.hash_into(&mut hasher);

        self.placed.len().hash(&mut hasher);
        for (id, record) in &self.placed {
            id.hash(&mut hasher);
            record.type_id.hash(&mut hasher);
            record.grid.hash(&mut hasher);
            record.anchor.hash(&mut hasher);
            record.alive.hash(&mut hasher);
            if let Some(instance) = self.entities.get(*id) {
                instance.position.x.to_bits().hash(&mut hasher);
                instance.position.y.to_bits().hash(&mut hasher);
                instance.health.hash(&mut hasher);
            }
        }

        hasher.finish()
    }

    fn release_cells_held_by(
        &mut self,
        kind: GridKind,
        anchor: CellCoord,
        footprint: Footprint,
        entity: EntityId,
    ) {
        let (grid, _) = self.grid_with_lookup(kind);
        for cell in footprint.cells(anchor) {
            if grid.occupant_at(cell) == Some(entity) {
                grid.release(cell);
            }
        }
    }

    #[cfg(feature = "debug-validation")]
    fn debug_check_invariants(&self) {
        for record in self.placed.values() {
            let Some(anchor) = record.anchor else {
                continue;
            };
            let grid = self.grid(record.grid);
            for cell in record.footprint.cells(anchor) {
                debug_assert_eq!(
                    grid.occupant_at(cell),
                    Some(record.entity),
                    "building {} does not hold its footprint",
                    record.entity
                );
            }
        }
        for (kind, grid) in [(GridKind::General, &self.general), (GridKind::Dense, &self.dense)] {
            for (cell, occupant) in grid.occupied_cells() {
                let owned = self.placed.get(&occupant).is_some_and(|p| {
                    p.grid == kind && p.anchor.is_some_and(|a| p.footprint.cells(a).any(|c| c == cell))
                });
                debug_assert!(owned, "cell {cell:?} held by unknown occupant {occupant}");
            }
        }
    }

    #[cfg(not(feature = "debug-validation"))]
    #[allow(clippy::unused_self)]
    fn debug_check_invariants(&self) {}
}

// ============================================================================
// Tests
// ============================================================================
