//! Build mode: choosing a building type, previewing it under the pointer and
//! committing it to the board.
//!
//! ```text
//! Idle -> Selecting(type) -> Previewing(preview) -> Idle
//!                  \________________\_____ cancel
//! ```
//!
//! Every release ends build mode, whether the placement was committed or
//! rejected. A rejected placement leaves the board and the economy exactly
//! as they were.

use crate::board::Board;
use crate::catalog::BuildingTypeId;
use crate::collaborators::{Collaborators, Economy, PlacementEvent};
use crate::entity::EntityId;
use crate::error::{PlacementError, Result};
use crate::grid::{CellCoord, FootprintCheck, GridKind};
use crate::math::Vec2Fixed;

/// Where the pending building would go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preview {
    /// Selected building type.
    pub type_id: BuildingTypeId,
    /// Grid the type is placed on.
    pub grid: GridKind,
    /// Where to draw the preview: the snapped footprint centre, or the raw
    /// pointer when off-grid.
    pub position: Vec2Fixed,
    /// Candidate anchor cell under the pointer.
    pub cell: Option<CellCoord>,
    /// Whether the footprint at `cell` is in bounds and free.
    pub valid: bool,
    /// Nearest free anchor when `cell` is blocked.
    pub suggestion: Option<CellCoord>,
}

/// Build-mode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementState {
    /// Not building.
    #[default]
    Idle,
    /// A type is chosen; the pointer has not been seen yet.
    Selecting {
        /// Selected building type.
        type_id: BuildingTypeId,
    },
    /// Preview follows the pointer.
    Previewing(Preview),
}

/// Drives build mode for new buildings.
#[derive(Debug, Clone, Default)]
pub struct PlacementController {
    state: PlacementState,
}

impl PlacementController {
    /// Create an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &PlacementState {
        &self.state
    }

    /// Whether build mode is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self.state, PlacementState::Idle)
    }

    /// Selected building type, if any.
    #[must_use]
    pub const fn selected_type(&self) -> Option<BuildingTypeId> {
        match self.state {
            PlacementState::Idle => None,
            PlacementState::Selecting { type_id } => Some(type_id),
            PlacementState::Previewing(preview) => Some(preview.type_id),
        }
    }

    /// Current preview, if the pointer has been seen.
    #[must_use]
    pub const fn preview(&self) -> Option<&Preview> {
        match &self.state {
            PlacementState::Previewing(preview) => Some(preview),
            _ => None,
        }
    }

    /// Enter build mode for a type. Replaces any earlier selection.
    pub fn select(&mut self, board: &Board, type_id: BuildingTypeId) -> Result<()> {
        if board.catalog().get(type_id).is_none() {
            return Err(PlacementError::UnknownBuildingType(type_id));
        }
        tracing::debug!(type_id = type_id.0, "Build mode entered");
        self.state = PlacementState::Selecting { type_id };
        Ok(())
    }

    /// Move the preview to follow the pointer.
    ///
    /// Does nothing outside build mode.
    pub fn pointer_moved(&mut self, board: &mut Board, pos: Vec2Fixed) -> Option<&Preview> {
        let type_id = self.selected_type()?;
        let building = board.catalog().get(type_id)?;
        let (kind, footprint) = (building.grid(), building.footprint);

        let grid = board.grid(kind);
        let preview = match grid.world_to_cell(pos) {
            Some(cell) => {
                let snapped = grid
                    .footprint_center(cell, footprint)
                    .or_else(|| grid.cell_to_world(cell))
                    .unwrap_or(pos);
                let check = board.check_footprint(kind, cell, footprint, None);
                let suggestion = match check {
                    FootprintCheck::Free => None,
                    _ => board.find_nearest_free_anchor(kind, pos, footprint, None),
                };
                Preview {
                    type_id,
                    grid: kind,
                    position: snapped,
                    cell: Some(cell),
                    valid: check.is_free(),
                    suggestion,
                }
            }
            None => Preview {
                type_id,
                grid: kind,
                position: pos,
                cell: None,
                valid: false,
                suggestion: None,
            },
        };

        if self.preview().map(|p| p.cell) != Some(preview.cell) {
            tracing::debug!(type_id = type_id.0, cell = ?preview.cell, valid = preview.valid, "Preview moved");
        }
        self.state = PlacementState::Previewing(preview);
        self.preview()
    }

    /// Commit or reject the pending building and leave build mode.
    pub fn pointer_released(&mut self, board: &mut Board, collab: &mut Collaborators<'_>) -> Result<EntityId> {
        let state = std::mem::take(&mut self.state);
        let (type_id, cell) = match state {
            PlacementState::Idle => return Err(PlacementError::NotActive),
            PlacementState::Selecting { type_id } => (type_id, None),
            PlacementState::Previewing(preview) => (preview.type_id, preview.cell),
        };

        commit(board, type_id, cell, collab).map_err(|error| {
            tracing::debug!(type_id = type_id.0, %error, "Placement rejected");
            collab.notifier.notify(PlacementEvent::PlacementRejected {
                type_id,
                reason: error.code().to_string(),
            });
            error
        })
    }

    /// Leave build mode without placing anything.
    ///
    /// Returns `false` if build mode was not active.
    pub fn cancel(&mut self, collab: &mut Collaborators<'_>) -> bool {
        let Some(type_id) = self.selected_type() else {
            return false;
        };
        self.state = PlacementState::Idle;
        tracing::debug!(type_id = type_id.0, "Build mode cancelled");
        collab
            .notifier
            .notify(PlacementEvent::BuildModeCancelled { type_id });
        true
    }

    /// Select, point and release in one call.
    pub fn place_at(
        &mut self,
        board: &mut Board,
        type_id: BuildingTypeId,
        pos: Vec2Fixed,
        collab: &mut Collaborators<'_>,
    ) -> Result<EntityId> {
        self.select(board, type_id)?;
        self.pointer_moved(board, pos);
        self.pointer_released(board, collab)
    }
}

/// Check whether a building of `type_id` may go at `anchor`.
///
/// Rules run in order and the first failure wins: affordability, population
/// headroom (towers only), bounds, occupancy, same-class separation
/// (production only). Stale cells may be reconciled; nothing else changes.
pub fn validate_placement(
    board: &mut Board,
    economy: &dyn Economy,
    type_id: BuildingTypeId,
    anchor: CellCoord,
) -> Result<()> {
    let building = board
        .catalog()
        .get(type_id)
        .ok_or(PlacementError::UnknownBuildingType(type_id))?;
    let (class, footprint, kind) = (building.class, building.footprint, building.grid());
    let (cost, population) = (building.base_cost, building.population_cost);

    if !economy.can_afford(cost) {
        return Err(PlacementError::InsufficientFunds { required: cost });
    }
    if class.uses_population() && !economy.can_add_population(population) {
        return Err(PlacementError::PopulationFull {
            required: population,
        });
    }

    match board.check_footprint(kind, anchor, footprint, None) {
        FootprintCheck::Free => {}
        FootprintCheck::OutOfBounds => return Err(PlacementError::OutOfBounds),
        FootprintCheck::Blocked { cell, occupant } => {
            return Err(PlacementError::Occupied {
                cell,
                occupant: Some(occupant),
            })
        }
    }

    if let Some(minimum) = board.config().separation_for(class) {
        let center = board
            .grid(kind)
            .footprint_center(anchor, footprint)
            .ok_or(PlacementError::OutOfBounds)?;
        if let Some((other, distance)) = board.nearest_same_class(class, center, None) {
            if distance < minimum {
                return Err(PlacementError::TooClose {
                    other,
                    distance,
                    minimum,
                });
            }
        }
    }

    Ok(())
}

fn commit(
    board: &mut Board,
    type_id: BuildingTypeId,
    cell: Option<CellCoord>,
    collab: &mut Collaborators<'_>,
) -> Result<EntityId> {
    let anchor = cell.ok_or(PlacementError::NoCandidate)?;
    validate_placement(board, &*collab.economy, type_id, anchor)?;

    let entity = board.spawn_building(type_id, anchor)?;

    let building = board
        .catalog()
        .get(type_id)
        .ok_or(PlacementError::UnknownBuildingType(type_id))?;
    collab.economy.spend(building.base_cost);
    if building.class.uses_population() {
        collab.economy.add_population(building.population_cost);
    }

    let grid = building.grid();
    tracing::info!(entity, type_id = type_id.0, x = anchor.x, y = anchor.y, grid = grid.name(), "Building placed");
    collab.notifier.notify(PlacementEvent::BuildingPlaced {
        entity,
        type_id,
        grid,
        cell: anchor,
    });
    Ok(entity)
}

// ============================================================================
// Tests
// ============================================================================
