//! Picking up, dragging and dropping buildings that are already placed.
//!
//! ```text
//! Idle -> Pressing(target, elapsed) -> Dragging(target) -> Idle
//!            |  moved too far / released early      |  moved, swapped,
//!            v                                      v  off-grid or reverted
//!          Idle                                   Idle
//! ```
//!
//! A press only becomes a drag after it has been held for the threshold
//! without moving. Short presses are reported as taps so an info panel can
//! open. Time advances through [`RelocationController::tick`], once per
//! frame.

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::catalog::{BuildingClass, BuildingTypeId};
use crate::collaborators::{Collaborators, PlacementEvent};
use crate::entity::EntityId;
use crate::grid::{CellCoord, Footprint, GridKind, OccupantLookup};
use crate::math::{Fixed, Vec2Fixed};

// ============================================================================
// Configuration
// ============================================================================

/// Long-press gesture tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongPressConfig {
    /// Hold time before a press turns into a drag.
    #[serde(default = "default_threshold_ms")]
    pub threshold_ms: u32,
    /// Movement that cancels a press, in world units.
    #[serde(default = "default_move_tolerance")]
    pub move_tolerance: i32,
    /// Maximum movement for an early release to count as a tap.
    #[serde(default = "default_tap_tolerance")]
    pub tap_tolerance: i32,
}

const fn default_threshold_ms() -> u32 {
    500
}

const fn default_move_tolerance() -> i32 {
    10
}

const fn default_tap_tolerance() -> i32 {
    4
}

impl Default for LongPressConfig {
    fn default() -> Self {
        Self {
            threshold_ms: default_threshold_ms(),
            move_tolerance: default_move_tolerance(),
            tap_tolerance: default_tap_tolerance(),
        }
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// A press held on a building that has not become a drag yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongPress {
    /// Pressed building.
    pub target: EntityId,
    /// Time held so far.
    pub elapsed_ms: u32,
    /// Pointer position at press start.
    pub start_pos: Vec2Fixed,
    /// Latest pointer position.
    pub last_pos: Vec2Fixed,
}

impl LongPress {
    /// Fill level of the progress ring, in `[0, 1]`.
    #[must_use]
    pub fn progress(&self, threshold_ms: u32) -> Fixed {
        if threshold_ms == 0 || self.elapsed_ms >= threshold_ms {
            return Fixed::ONE;
        }
        Fixed::from_num(self.elapsed_ms) / Fixed::from_num(threshold_ms)
    }
}

/// Progress ring shown while a press is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressIndicator {
    /// Pressed building.
    pub entity: EntityId,
    /// Where to draw the ring.
    pub position: Vec2Fixed,
    /// Fill level in `[0, 1]`.
    #[serde(with = "crate::math::fixed_serde")]
    pub progress: Fixed,
}

/// Cell highlight shown under a dragged building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    /// Grid the highlight is drawn on.
    pub grid: GridKind,
    /// Candidate anchor.
    pub cell: CellCoord,
    /// Whether the dragged building fits there without a swap.
    pub available: bool,
}

/// A building being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragSession {
    /// Dragged building.
    pub target: EntityId,
    /// Its type.
    pub type_id: BuildingTypeId,
    /// Its class.
    pub class: BuildingClass,
    /// Its grid.
    pub grid: GridKind,
    /// Its footprint.
    pub footprint: Footprint,
    /// Anchor it was lifted from.
    pub origin: CellCoord,
    /// World position it was lifted from.
    pub origin_position: Vec2Fixed,
    /// Latest pointer position.
    pub pointer: Vec2Fixed,
    /// Current cell highlight, if the pointer is over the grid.
    pub highlight: Option<Highlight>,
}

/// Relocation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelocationState {
    /// No gesture.
    #[default]
    Idle,
    /// Press held, not yet a drag.
    Pressing(LongPress),
    /// Building lifted and following the pointer.
    Dragging(DragSession),
}

/// How a relocation gesture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RelocationOutcome {
    /// Dropped on a free cell.
    Moved {
        /// Moved building.
        entity: EntityId,
        /// Previous anchor.
        from: CellCoord,
        /// New anchor.
        to: CellCoord,
    },
    /// Traded places with the building under the drop point.
    Swapped {
        /// Dragged building, now at `to`.
        dragged: EntityId,
        /// Displaced building, now at `from`.
        other: EntityId,
        /// Dragged building's former anchor.
        from: CellCoord,
        /// Displaced building's former anchor.
        to: CellCoord,
    },
    /// Wall left outside the grid.
    OffGrid {
        /// Dropped wall.
        entity: EntityId,
        /// Raw drop position.
        position: Vec2Fixed,
    },
    /// Put back where it came from.
    Reverted {
        /// Dragged building.
        entity: EntityId,
        /// Anchor re-occupied, if any.
        cell: Option<CellCoord>,
    },
    /// Short press and release.
    Tap {
        /// Tapped building.
        entity: EntityId,
    },
    /// Press cancelled before becoming a drag.
    Aborted {
        /// Pressed building.
        entity: EntityId,
    },
}

impl RelocationOutcome {
    /// Notification for a finished drag. Taps and aborted presses have none.
    #[must_use]
    pub fn event(&self) -> Option<PlacementEvent> {
        match *self {
            Self::Moved { entity, from, to } => Some(PlacementEvent::BuildingMoved { entity, from, to }),
            Self::Swapped {
                dragged,
                other,
                from,
                to,
            } => Some(PlacementEvent::BuildingsSwapped {
                dragged,
                other,
                from,
                to,
            }),
            Self::OffGrid { entity, position } => Some(PlacementEvent::MovedOffGrid { entity, position }),
            Self::Reverted { entity, cell } => Some(PlacementEvent::RelocationReverted { entity, cell }),
            Self::Tap { .. } | Self::Aborted { .. } => None,
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Drives long-press relocation of placed buildings.
#[derive(Debug, Clone, Default)]
pub struct RelocationController {
    config: LongPressConfig,
    state: RelocationState,
}

impl RelocationController {
    /// Create an idle controller.
    #[must_use]
    pub fn new(config: LongPressConfig) -> Self {
        Self {
            config,
            state: RelocationState::Idle,
        }
    }

    /// Gesture tuning in use.
    #[must_use]
    pub const fn config(&self) -> &LongPressConfig {
        &self.config
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &RelocationState {
        &self.state
    }

    /// Whether a press or drag is in progress.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self.state, RelocationState::Idle)
    }

    /// Building being dragged.
    #[must_use]
    pub const fn dragged(&self) -> Option<EntityId> {
        match &self.state {
            RelocationState::Dragging(session) => Some(session.target),
            _ => None,
        }
    }

    /// Progress ring while pressing.
    #[must_use]
    pub fn indicator(&self) -> Option<PressIndicator> {
        match &self.state {
            RelocationState::Pressing(press) => Some(PressIndicator {
                entity: press.target,
                position: press.start_pos,
                progress: press.progress(self.config.threshold_ms),
            }),
            _ => None,
        }
    }

    /// Cell highlight while dragging over the grid.
    #[must_use]
    pub const fn highlight(&self) -> Option<Highlight> {
        match &self.state {
            RelocationState::Dragging(session) => session.highlight,
            _ => None,
        }
    }

    /// Start pressing the building under `pos`.
    ///
    /// Returns the pressed building, or `None` if nothing pickable is there
    /// or a gesture is already running.
    pub fn pointer_down(&mut self, board: &mut Board, pos: Vec2Fixed) -> Option<EntityId> {
        if self.is_active() {
            return None;
        }
        let target = board.building_at(pos)?;
        tracing::debug!(entity = target, "Press started");
        self.state = RelocationState::Pressing(LongPress {
            target,
            elapsed_ms: 0,
            start_pos: pos,
            last_pos: pos,
        });
        Some(target)
    }

    /// Track the pointer.
    ///
    /// A press that strays past the move tolerance ends as
    /// [`RelocationOutcome::Aborted`]. A drag moves the building to the
    /// hovered cell, or to the raw pointer outside the grid.
    pub fn pointer_moved(&mut self, board: &mut Board, pos: Vec2Fixed) -> Option<RelocationOutcome> {
        match &mut self.state {
            RelocationState::Idle => None,
            RelocationState::Pressing(press) => {
                let tolerance = Fixed::from_num(self.config.move_tolerance);
                if press.start_pos.within(pos, tolerance) {
                    press.last_pos = pos;
                    return None;
                }
                let entity = press.target;
                tracing::debug!(entity, "Press moved too far");
                self.state = RelocationState::Idle;
                Some(RelocationOutcome::Aborted { entity })
            }
            RelocationState::Dragging(session) => {
                session.pointer = pos;
                let grid = board.grid(session.grid);
                let Some(cell) = grid.world_to_cell(pos) else {
                    session.highlight = None;
                    board.set_position(session.target, pos);
                    return None;
                };

                let snapped = grid
                    .footprint_center(cell, session.footprint)
                    .or_else(|| grid.cell_to_world(cell))
                    .unwrap_or(pos);
                let available = board
                    .check_footprint(session.grid, cell, session.footprint, Some(session.target))
                    .is_free();
                board.set_position(session.target, snapped);
                session.highlight = Some(Highlight {
                    grid: session.grid,
                    cell,
                    available,
                });
                None
            }
        }
    }

    /// Advance the press timer.
    ///
    /// Returns the building that was just picked up when the press crosses
    /// the threshold. Picking up releases its cells and clears unit
    /// selection.
    pub fn tick(&mut self, board: &mut Board, dt_ms: u32, collab: &mut Collaborators<'_>) -> Option<EntityId> {
        let RelocationState::Pressing(press) = &mut self.state else {
            return None;
        };
        press.elapsed_ms = press.elapsed_ms.saturating_add(dt_ms);
        let press = *press;

        if !board.entities().is_alive(press.target) {
            tracing::debug!(entity = press.target, "Pressed building died");
            self.state = RelocationState::Idle;
            return None;
        }
        if press.elapsed_ms < self.config.threshold_ms {
            return None;
        }

        let entity = press.target;
        let Some(record) = board.placed(entity).cloned() else {
            self.state = RelocationState::Idle;
            return None;
        };
        let origin_position = board.position_of(entity).unwrap_or(press.start_pos);
        let Some(origin) = board.lift(entity) else {
            self.state = RelocationState::Idle;
            return None;
        };

        collab.selection.clear_selection();
        tracing::debug!(entity, x = origin.x, y = origin.y, "Drag started");
        collab
            .notifier
            .notify(PlacementEvent::DragStarted { entity, origin });

        self.state = RelocationState::Dragging(DragSession {
            target: entity,
            type_id: record.type_id,
            class: record.class,
            grid: record.grid,
            footprint: record.footprint,
            origin,
            origin_position,
            pointer: press.last_pos,
            highlight: None,
        });
        Some(entity)
    }

    /// Finish the gesture at `pos`.
    pub fn pointer_up(
        &mut self,
        board: &mut Board,
        pos: Vec2Fixed,
        collab: &mut Collaborators<'_>,
    ) -> Option<RelocationOutcome> {
        match std::mem::take(&mut self.state) {
            RelocationState::Idle => None,
            RelocationState::Pressing(press) => {
                let tolerance = Fixed::from_num(self.config.tap_tolerance);
                let entity = press.target;
                if press.start_pos.within(pos, tolerance) {
                    Some(RelocationOutcome::Tap { entity })
                } else {
                    Some(RelocationOutcome::Aborted { entity })
                }
            }
            RelocationState::Dragging(session) => {
                let outcome = resolve_drop(board, &session, pos);
                Some(finish(outcome, collab))
            }
        }
    }

    /// Force the gesture to end, reverting any drag.
    pub fn abort(&mut self, board: &mut Board, collab: &mut Collaborators<'_>) -> Option<RelocationOutcome> {
        match std::mem::take(&mut self.state) {
            RelocationState::Idle => None,
            RelocationState::Pressing(press) => Some(RelocationOutcome::Aborted {
                entity: press.target,
            }),
            RelocationState::Dragging(session) => {
                let outcome = revert(board, &session);
                Some(finish(outcome, collab))
            }
        }
    }
}

fn finish(outcome: RelocationOutcome, collab: &mut Collaborators<'_>) -> RelocationOutcome {
    collab.selection.clear_selection();
    if let Some(event) = outcome.event() {
        collab.notifier.notify(event);
    }
    outcome
}

/// Work out where a dropped building ends up.
fn resolve_drop(board: &mut Board, session: &DragSession, pos: Vec2Fixed) -> RelocationOutcome {
    let entity = session.target;
    let kind = session.grid;

    if !still_standing(board, entity) {
        return revert(board, session);
    }

    let Some(target) = board.grid(kind).world_to_cell(pos) else {
        if session.class.may_rest_off_grid() && board.rest_off_grid(entity, pos) {
            tracing::info!(entity, "Wall dropped off-grid");
            return RelocationOutcome::OffGrid {
                entity,
                position: pos,
            };
        }
        return revert(board, session);
    };

    // Swap partners come from raw cell data, never from a search
    let grid = board.grid(kind);
    let raw = session
        .footprint
        .cells(target)
        .filter(|&cell| grid.in_bounds(cell))
        .find_map(|cell| grid.occupant_at(cell).filter(|&o| o != entity).map(|o| (cell, o)));

    let Some((cell, other)) = raw else {
        if board.settle(entity, target) {
            tracing::info!(entity, from = ?session.origin, to = ?target, "Building moved");
            return RelocationOutcome::Moved {
                entity,
                from: session.origin,
                to: target,
            };
        }
        return revert(board, session);
    };

    let other_live = board.is_occupied(kind, cell)
        && board
            .placed(other)
            .is_some_and(|p| p.alive && p.is_on_grid());
    if !other_live {
        tracing::debug!(entity, other, "Drop target held by a stale occupant");
        return revert(board, session);
    }

    let Some(other_anchor) = board.placed(other).and_then(|p| p.anchor) else {
        return revert(board, session);
    };
    if board.swap(entity, session.origin, other) {
        tracing::info!(dragged = entity, other, "Buildings swapped");
        return RelocationOutcome::Swapped {
            dragged: entity,
            other,
            from: session.origin,
            to: other_anchor,
        };
    }
    revert(board, session)
}

/// Whether a lifted building is still alive and still on the board.
fn still_standing(board: &Board, entity: EntityId) -> bool {
    board.entities().is_alive(entity) && board.placed(entity).is_some_and(|p| p.alive)
}

/// Put a dragged building back on its origin anchor.
fn revert(board: &mut Board, session: &DragSession) -> RelocationOutcome {
    let entity = session.target;
    if !still_standing(board, entity) {
        // Left for the removal path; no cells are claimed for the dead.
        tracing::debug!(entity, "Dragged building destroyed mid-drag");
        board.rest_off_grid(entity, session.origin_position);
        return RelocationOutcome::Reverted { entity, cell: None };
    }
    if board.settle(entity, session.origin) {
        tracing::debug!(entity, "Relocation reverted");
        return RelocationOutcome::Reverted {
            entity,
            cell: Some(session.origin),
        };
    }

    tracing::warn!(entity, origin = ?session.origin, "Origin no longer free, searching nearby");
    let fallback = board.find_nearest_free_anchor(
        session.grid,
        session.origin_position,
        session.footprint,
        Some(entity),
    );
    if let Some(anchor) = fallback {
        if board.settle(entity, anchor) {
            return RelocationOutcome::Reverted {
                entity,
                cell: Some(anchor),
            };
        }
    }

    tracing::warn!(entity, "No free cell to revert to, leaving building off-grid");
    board.rest_off_grid(entity, session.origin_position);
    RelocationOutcome::Reverted { entity, cell: None }
}

// ============================================================================
// Tests
// ============================================================================
