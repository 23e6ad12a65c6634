//! Seams to the rest of the game.
//!
//! The placement engine consults the economy, keeps selection state
//! consistent and reports outcomes, but owns none of those concerns. Each is
//! a trait; the controllers receive a [`Collaborators`] bundle per call
//! instead of looking anything up globally.
//!
//! [`Treasury`], [`SelectionSet`] and [`EventLog`] are plain in-memory
//! implementations used by the headless driver and the tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::RemovalCause;
use crate::catalog::BuildingTypeId;
use crate::entity::EntityId;
use crate::grid::{CellCoord, GridKind};
use crate::math::Vec2Fixed;

// ============================================================================
// Traits
// ============================================================================

/// Currency and population bookkeeping.
pub trait Economy {
    /// Whether the player can pay `cost`.
    fn can_afford(&self, cost: i32) -> bool;

    /// Deduct `cost`. Only called after [`Self::can_afford`] returned true.
    fn spend(&mut self, cost: i32);

    /// Whether `amount` more population fits under the cap.
    fn can_add_population(&self, amount: u32) -> bool;

    /// Reserve population.
    fn add_population(&mut self, amount: u32);

    /// Return population.
    fn remove_population(&mut self, amount: u32);

    /// Credit currency back, e.g. when a building is sold.
    fn refund(&mut self, amount: i32);
}

/// What a selection panel shows about a tapped building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    /// Building instance.
    pub entity: EntityId,
    /// Building type.
    pub type_id: BuildingTypeId,
    /// Display name of the type.
    pub name: String,
    /// Current health.
    pub health: i32,
    /// Maximum health.
    pub max_health: i32,
}

/// Unit selection and info panels.
pub trait Selection {
    /// Deselect everything and hide selection highlights.
    fn clear_selection(&mut self);

    /// Whether `entity` is currently selected.
    fn is_unit_selected(&self, entity: EntityId) -> bool;

    /// Select `entity` and show its info.
    fn select_unit(&mut self, entity: EntityId, info: UnitInfo);
}

/// Outcome reported by the placement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlacementEvent {
    /// A new building was committed.
    BuildingPlaced {
        /// New instance.
        entity: EntityId,
        /// Its type.
        type_id: BuildingTypeId,
        /// Grid it was placed on.
        grid: GridKind,
        /// Anchor cell.
        cell: CellCoord,
    },
    /// A placement attempt failed validation.
    PlacementRejected {
        /// Type the player tried to place.
        type_id: BuildingTypeId,
        /// Machine-readable reason, see [`crate::error::PlacementError::code`].
        reason: String,
    },
    /// Build mode was left without placing anything.
    BuildModeCancelled {
        /// Type that was selected.
        type_id: BuildingTypeId,
    },
    /// A long press picked a building up.
    DragStarted {
        /// Dragged building.
        entity: EntityId,
        /// Anchor it was lifted from.
        origin: CellCoord,
    },
    /// A dragged building was dropped on a free cell.
    BuildingMoved {
        /// Moved building.
        entity: EntityId,
        /// Previous anchor.
        from: CellCoord,
        /// New anchor.
        to: CellCoord,
    },
    /// A dragged building traded places with another.
    BuildingsSwapped {
        /// Dragged building, now at `to`.
        dragged: EntityId,
        /// Displaced building, now at `from`.
        other: EntityId,
        /// Dragged building's former anchor.
        from: CellCoord,
        /// Displaced building's former anchor.
        to: CellCoord,
    },
    /// A wall was dropped outside the grid and is no longer tracked.
    MovedOffGrid {
        /// Dropped wall.
        entity: EntityId,
        /// Raw drop position.
        position: Vec2Fixed,
    },
    /// A drag ended with the building back where it came from.
    RelocationReverted {
        /// Dragged building.
        entity: EntityId,
        /// Anchor it now holds, if any could be re-occupied.
        cell: Option<CellCoord>,
    },
    /// A placed building left the board.
    BuildingRemoved {
        /// Removed building.
        entity: EntityId,
        /// Its type.
        type_id: BuildingTypeId,
        /// Why it was removed.
        cause: RemovalCause,
    },
    /// A building was tapped rather than picked up.
    BuildingTapped {
        /// Tapped building.
        entity: EntityId,
    },
}

/// Receiver of [`PlacementEvent`]s, typically a toast/popup layer.
pub trait Notifier {
    /// Deliver one event.
    fn notify(&mut self, event: PlacementEvent);
}

/// Mutable borrows of every collaborator, handed to controllers per call.
pub struct Collaborators<'a> {
    /// Currency and population.
    pub economy: &'a mut dyn Economy,
    /// Selection panels.
    pub selection: &'a mut dyn Selection,
    /// Event sink.
    pub notifier: &'a mut dyn Notifier,
}

impl<'a> Collaborators<'a> {
    /// Bundle collaborators.
    pub fn new(
        economy: &'a mut dyn Economy,
        selection: &'a mut dyn Selection,
        notifier: &'a mut dyn Notifier,
    ) -> Self {
        Self {
            economy,
            selection,
            notifier,
        }
    }
}

// ============================================================================
// Reference implementations
// ============================================================================

/// In-memory currency and population pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    /// Available currency.
    pub currency: i32,
    /// Population in use.
    pub population: u32,
    /// Maximum population.
    pub population_cap: u32,
}

impl Treasury {
    /// Create a treasury with starting currency and a population cap.
    #[must_use]
    pub const fn new(currency: i32, population_cap: u32) -> Self {
        Self {
            currency,
            population: 0,
            population_cap,
        }
    }

    /// Free population slots.
    #[must_use]
    pub const fn free_population(&self) -> u32 {
        self.population_cap.saturating_sub(self.population)
    }

    /// Add currency, e.g. from a sale.
    pub fn deposit(&mut self, amount: i32) {
        self.currency = self.currency.saturating_add(amount.max(0));
    }
}

impl Default for Treasury {
    fn default() -> Self {
        Self::new(500, 10)
    }
}

impl Economy for Treasury {
    fn can_afford(&self, cost: i32) -> bool {
        self.currency >= cost
    }

    fn spend(&mut self, cost: i32) {
        if self.currency >= cost {
            self.currency -= cost;
        } else {
            tracing::warn!(cost, currency = self.currency, "Spend without funds ignored");
        }
    }

    fn can_add_population(&self, amount: u32) -> bool {
        self.free_population() >= amount
    }

    fn add_population(&mut self, amount: u32) {
        self.population = self.population.saturating_add(amount);
    }

    fn remove_population(&mut self, amount: u32) {
        self.population = self.population.saturating_sub(amount);
    }

    fn refund(&mut self, amount: i32) {
        self.deposit(amount);
    }
}

/// In-memory selection state.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    selected: BTreeMap<EntityId, UnitInfo>,
    /// Number of times selection was cleared.
    pub clear_count: u32,
}

impl SelectionSet {
    /// Create an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Info for a selected entity.
    #[must_use]
    pub fn info(&self, entity: EntityId) -> Option<&UnitInfo> {
        self.selected.get(&entity)
    }

    /// Selected entities in id order.
    pub fn selected(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.selected.keys().copied()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

impl Selection for SelectionSet {
    fn clear_selection(&mut self) {
        self.selected.clear();
        self.clear_count += 1;
    }

    fn is_unit_selected(&self, entity: EntityId) -> bool {
        self.selected.contains_key(&entity)
    }

    fn select_unit(&mut self, entity: EntityId, info: UnitInfo) {
        self.selected.insert(entity, info);
    }
}

/// Notifier that keeps every event in order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<PlacementEvent>,
}

impl EventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far.
    #[must_use]
    pub fn events(&self) -> &[PlacementEvent] {
        &self.events
    }

    /// Take every event, leaving the log empty.
    pub fn drain(&mut self) -> Vec<PlacementEvent> {
        std::mem::take(&mut self.events)
    }

    /// Most recent event.
    #[must_use]
    pub fn last(&self) -> Option<&PlacementEvent> {
        self.events.last()
    }
}

impl Notifier for EventLog {
    fn notify(&mut self, event: PlacementEvent) {
        self.events.push(event);
    }
}
