//! Pointer routing between build mode and relocation.
//!
//! Only one gesture owns the pointer at a time. An open build mode claims
//! every pointer event until it resolves; otherwise a pointer-down on a
//! building starts a relocation press. Leaving the playing phase aborts
//! whatever is running.

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::catalog::BuildingTypeId;
use crate::collaborators::{Collaborators, PlacementEvent};
use crate::entity::EntityId;
use crate::error::{PlacementError, Result};
use crate::math::Vec2Fixed;
use crate::placement::{PlacementController, Preview};
use crate::relocation::{Highlight, LongPressConfig, PressIndicator, RelocationController, RelocationOutcome};

/// Coarse game state gating all interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Normal play; gestures allowed.
    #[default]
    Playing,
    /// Paused; gestures aborted and refused.
    Paused,
    /// Game over; gestures aborted and refused.
    GameOver,
}

/// What a routed pointer event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    /// The event was ignored.
    Nothing,
    /// The build preview moved.
    PreviewMoved(Preview),
    /// A new building was placed.
    Placed(EntityId),
    /// Build mode was cancelled.
    BuildCancelled,
    /// A press started on a building.
    PressStarted(EntityId),
    /// A press turned into a drag.
    DragStarted(EntityId),
    /// A relocation gesture ended.
    Relocation(RelocationOutcome),
}

/// Owns both controllers and decides which one sees each event.
#[derive(Debug, Clone, Default)]
pub struct InteractionRouter {
    phase: GamePhase,
    placement: PlacementController,
    relocation: RelocationController,
}

impl InteractionRouter {
    /// Create a router in the playing phase.
    #[must_use]
    pub fn new(long_press: LongPressConfig) -> Self {
        Self {
            phase: GamePhase::Playing,
            placement: PlacementController::new(),
            relocation: RelocationController::new(long_press),
        }
    }

    /// Create a router using the board's gesture tuning.
    #[must_use]
    pub fn for_board(board: &Board) -> Self {
        Self::new(board.config().long_press)
    }

    /// Current game phase.
    #[must_use]
    pub const fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Build-mode controller.
    #[must_use]
    pub const fn placement(&self) -> &PlacementController {
        &self.placement
    }

    /// Relocation controller.
    #[must_use]
    pub const fn relocation(&self) -> &RelocationController {
        &self.relocation
    }

    /// Build preview, if any.
    #[must_use]
    pub const fn preview(&self) -> Option<&Preview> {
        self.placement.preview()
    }

    /// Press progress ring, if any.
    #[must_use]
    pub fn indicator(&self) -> Option<PressIndicator> {
        self.relocation.indicator()
    }

    /// Drag highlight, if any.
    #[must_use]
    pub const fn highlight(&self) -> Option<Highlight> {
        self.relocation.highlight()
    }

    fn ensure_playing(&self) -> Result<()> {
        if self.phase == GamePhase::Playing {
            Ok(())
        } else {
            Err(PlacementError::NotPlaying)
        }
    }

    /// Enter build mode. Refused while a relocation owns the pointer.
    pub fn select_building(&mut self, board: &Board, type_id: BuildingTypeId) -> Result<()> {
        self.ensure_playing()?;
        if self.relocation.is_active() {
            return Err(PlacementError::GestureInProgress);
        }
        self.placement.select(board, type_id)
    }

    /// Leave build mode.
    pub fn cancel_build(&mut self, collab: &mut Collaborators<'_>) -> bool {
        self.placement.cancel(collab)
    }

    /// Route a pointer-down.
    pub fn pointer_down(&mut self, board: &mut Board, pos: Vec2Fixed) -> Result<InteractionOutcome> {
        self.ensure_playing()?;
        if self.placement.is_active() {
            return Ok(self
                .placement
                .pointer_moved(board, pos)
                .map_or(InteractionOutcome::Nothing, |p| InteractionOutcome::PreviewMoved(*p)));
        }
        if self.relocation.is_active() {
            return Err(PlacementError::GestureInProgress);
        }
        Ok(self
            .relocation
            .pointer_down(board, pos)
            .map_or(InteractionOutcome::Nothing, InteractionOutcome::PressStarted))
    }

    /// Route a pointer move.
    pub fn pointer_move(&mut self, board: &mut Board, pos: Vec2Fixed) -> InteractionOutcome {
        if self.phase != GamePhase::Playing {
            return InteractionOutcome::Nothing;
        }
        if self.placement.is_active() {
            return self
                .placement
                .pointer_moved(board, pos)
                .map_or(InteractionOutcome::Nothing, |p| InteractionOutcome::PreviewMoved(*p));
        }
        self.relocation
            .pointer_moved(board, pos)
            .map_or(InteractionOutcome::Nothing, InteractionOutcome::Relocation)
    }

    /// Route a pointer-up.
    ///
    /// In build mode this commits or rejects the placement. A tap selects the
    /// tapped building.
    pub fn pointer_up(
        &mut self,
        board: &mut Board,
        pos: Vec2Fixed,
        collab: &mut Collaborators<'_>,
    ) -> Result<InteractionOutcome> {
        self.ensure_playing()?;
        if self.placement.is_active() {
            self.placement.pointer_moved(board, pos);
            return self
                .placement
                .pointer_released(board, collab)
                .map(InteractionOutcome::Placed);
        }

        let Some(outcome) = self.relocation.pointer_up(board, pos, collab) else {
            return Ok(InteractionOutcome::Nothing);
        };
        if let RelocationOutcome::Tap { entity } = outcome {
            if let Some(info) = board.unit_info(entity) {
                collab.selection.select_unit(entity, info);
            }
            collab
                .notifier
                .notify(PlacementEvent::BuildingTapped { entity });
        }
        Ok(InteractionOutcome::Relocation(outcome))
    }

    /// Advance gesture timers by one frame.
    pub fn tick(&mut self, board: &mut Board, dt_ms: u32, collab: &mut Collaborators<'_>) -> InteractionOutcome {
        if self.phase != GamePhase::Playing {
            return InteractionOutcome::Nothing;
        }
        self.relocation
            .tick(board, dt_ms, collab)
            .map_or(InteractionOutcome::Nothing, InteractionOutcome::DragStarted)
    }

    /// Abort every gesture: revert drags and close build mode.
    pub fn abort_all(&mut self, board: &mut Board, collab: &mut Collaborators<'_>) -> Vec<InteractionOutcome> {
        let mut outcomes = Vec::new();
        if let Some(outcome) = self.relocation.abort(board, collab) {
            outcomes.push(InteractionOutcome::Relocation(outcome));
        }
        if self.placement.cancel(collab) {
            outcomes.push(InteractionOutcome::BuildCancelled);
        }
        outcomes
    }

    /// Change the game phase. Leaving [`GamePhase::Playing`] aborts everything.
    pub fn set_phase(
        &mut self,
        board: &mut Board,
        phase: GamePhase,
        collab: &mut Collaborators<'_>,
    ) -> Vec<InteractionOutcome> {
        if phase == self.phase {
            return Vec::new();
        }
        tracing::info!(from = ?self.phase, to = ?phase, "Game phase changed");
        self.phase = phase;
        if phase == GamePhase::Playing {
            return Vec::new();
        }
        self.abort_all(board, collab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BuildingCatalog, BuildingClass, BuildingType};
    use crate::collaborators::{EventLog, Selection, SelectionSet, Treasury};
    use crate::config::{BoardConfig, GridConfig};
    use crate::grid::{CellCoord, GridKind};

    const FARM: BuildingTypeId = BuildingTypeId::new(1);

    fn vec2(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_units(x, y)
    }

    fn cell(x: u32, y: u32) -> CellCoord {
        CellCoord::new(x, y)
    }

    fn board() -> Board {
        let mut catalog = BuildingCatalog::new();
        catalog.register(BuildingType::new(FARM, "Farm", BuildingClass::Production, 50));
        let config = BoardConfig {
            general_grid: GridConfig {
                width: 4,
                height: 4,
                cell_size: 100,
                cell_spacing: 0,
                center: (0, 0),
            },
            dense_grid: GridConfig {
                center: (1000, 0),
                ..GridConfig::dense_default()
            },
            ..BoardConfig::default()
        };
        Board::new(config, catalog).unwrap()
    }

    fn center(board: &Board, x: u32, y: u32) -> Vec2Fixed {
        board.grid(GridKind::General).cell_to_world(cell(x, y)).unwrap()
    }

    struct Doubles {
        treasury: Treasury,
        selection: SelectionSet,
        log: EventLog,
    }

    impl Doubles {
        fn new() -> Self {
            Self {
                treasury: Treasury::new(1000, 10),
                selection: SelectionSet::new(),
                log: EventLog::new(),
            }
        }

        fn collab(&mut self) -> Collaborators<'_> {
            Collaborators::new(&mut self.treasury, &mut self.selection, &mut self.log)
        }
    }

    #[test]
    fn test_build_flow_through_router() {
        let mut board = board();
        let mut doubles = Doubles::new();
        let mut router = InteractionRouter::for_board(&board);

        router.select_building(&board, FARM).unwrap();
        let moved = router.pointer_move(&mut board, vec2(0, 0));
        assert!(matches!(moved, InteractionOutcome::PreviewMoved(p) if p.valid));
        let placed = router
            .pointer_up(&mut board, vec2(0, 0), &mut doubles.collab())
            .unwrap();
        assert!(matches!(placed, InteractionOutcome::Placed(_)));
        assert_eq!(board.placed_count(), 1);
    }

    #[test]
    fn test_build_mode_owns_pointer_down() {
        let mut board = board();
        board.spawn_building(FARM, cell(1, 1)).unwrap();
        let mut router = InteractionRouter::for_board(&board);

        router.select_building(&board, FARM).unwrap();
        let hoisted = center(&board, 1, 1);
        let outcome = router.pointer_down(&mut board, hoisted).unwrap();
        assert!(matches!(outcome, InteractionOutcome::PreviewMoved(_)));
        assert!(!router.relocation().is_active());
    }

    #[test]
    fn test_relocation_blocks_build_mode() {
        let mut board = board();
        board.spawn_building(FARM, cell(1, 1)).unwrap();
        let mut router = InteractionRouter::for_board(&board);

        let hoisted = center(&board, 1, 1);
        let outcome = router.pointer_down(&mut board, hoisted).unwrap();
        assert!(matches!(outcome, InteractionOutcome::PressStarted(_)));
        assert_eq!(
            router.select_building(&board, FARM),
            Err(PlacementError::GestureInProgress)
        );
    }

    #[test]
    fn test_tap_selects_building() {
        let mut board = board();
        let mut doubles = Doubles::new();
        let farm = board.spawn_building(FARM, cell(1, 1)).unwrap();
        let mut router = InteractionRouter::for_board(&board);
        let pos = center(&board, 1, 1);

        router.pointer_down(&mut board, pos).unwrap();
        router.tick(&mut board, 100, &mut doubles.collab());
        let outcome = router.pointer_up(&mut board, pos, &mut doubles.collab()).unwrap();

        assert_eq!(
            outcome,
            InteractionOutcome::Relocation(RelocationOutcome::Tap { entity: farm })
        );
        assert!(doubles.selection.is_unit_selected(farm));
        assert_eq!(doubles.selection.info(farm).unwrap().name, "Farm");
        assert_eq!(
            doubles.log.last(),
            Some(&PlacementEvent::BuildingTapped { entity: farm })
        );
    }

    #[test]
    fn test_pause_reverts_active_drag() {
        let mut board = board();
        let mut doubles = Doubles::new();
        let farm = board.spawn_building(FARM, cell(1, 1)).unwrap();
        let before = board.state_hash();
        let mut router = InteractionRouter::for_board(&board);

        let hoisted = center(&board, 1, 1);
        router.pointer_down(&mut board, hoisted).unwrap();
        assert_eq!(
            router.tick(&mut board, 500, &mut doubles.collab()),
            InteractionOutcome::DragStarted(farm)
        );
        let hoisted = center(&board, 3, 3);
        router.pointer_move(&mut board, hoisted);

        let outcomes = router.set_phase(&mut board, GamePhase::Paused, &mut doubles.collab());
        assert_eq!(
            outcomes,
            vec![InteractionOutcome::Relocation(RelocationOutcome::Reverted {
                entity: farm,
                cell: Some(cell(1, 1))
            })]
        );
        assert_eq!(board.state_hash(), before);
        assert!(router.highlight().is_none());
    }

    #[test]
    fn test_game_over_closes_build_mode() {
        let mut board = board();
        let mut doubles = Doubles::new();
        let mut router = InteractionRouter::for_board(&board);
        router.select_building(&board, FARM).unwrap();
        router.pointer_move(&mut board, vec2(0, 0));

        let outcomes = router.set_phase(&mut board, GamePhase::GameOver, &mut doubles.collab());
        assert_eq!(outcomes, vec![InteractionOutcome::BuildCancelled]);
        assert!(router.preview().is_none());
    }

    #[test]
    fn test_not_playing_refuses_gestures() {
        let mut board = board();
        let mut doubles = Doubles::new();
        board.spawn_building(FARM, cell(1, 1)).unwrap();
        let mut router = InteractionRouter::for_board(&board);
        router.set_phase(&mut board, GamePhase::Paused, &mut doubles.collab());

        assert_eq!(
            router.select_building(&board, FARM),
            Err(PlacementError::NotPlaying)
        );
        let hoisted = center(&board, 1, 1);
        assert_eq!(
            router.pointer_down(&mut board, hoisted),
            Err(PlacementError::NotPlaying)
        );
        assert_eq!(
            router.tick(&mut board, 1000, &mut doubles.collab()),
            InteractionOutcome::Nothing
        );

        router.set_phase(&mut board, GamePhase::Playing, &mut doubles.collab());
        assert!(router.select_building(&board, FARM).is_ok());
    }
}
