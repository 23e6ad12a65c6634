//! Test fixtures and helpers.
//!
//! Pre-built boards, catalogs and collaborator doubles for consistent
//! testing, plus drivers that run whole gestures in one call.

use fixed::types::I32F32;
use td_core::board::Board;
use td_core::catalog::{BuildingCatalog, BuildingClass, BuildingType, BuildingTypeId};
use td_core::collaborators::{Collaborators, EventLog, SelectionSet, Treasury};
use td_core::config::{BoardConfig, GridConfig};
use td_core::entity::EntityId;
use td_core::error::PlacementError;
use td_core::grid::{CellCoord, GridKind};
use td_core::math::Vec2Fixed;
use td_core::placement::PlacementController;
use td_core::relocation::{RelocationController, RelocationOutcome};

/// 1×1 production building on the general grid.
pub const FARM: BuildingTypeId = BuildingTypeId::new(1);
/// 1×1 wall on the dense grid.
pub const WALL: BuildingTypeId = BuildingTypeId::new(2);
/// 1×2 tower on the dense grid, costs one population.
pub const TOWER: BuildingTypeId = BuildingTypeId::new(3);

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a world position from integer units.
#[must_use]
pub fn vec2(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_units(x, y)
}

/// Shorthand cell constructor.
#[must_use]
pub const fn cell(x: u32, y: u32) -> CellCoord {
    CellCoord::new(x, y)
}

/// Farm, wall and tower.
#[must_use]
pub fn standard_catalog() -> BuildingCatalog {
    let mut catalog = BuildingCatalog::new();
    catalog.register(BuildingType::new(FARM, "Farm", BuildingClass::Production, 50).with_health(100));
    catalog.register(BuildingType::new(WALL, "Wall", BuildingClass::Wall, 10).with_health(200));
    catalog.register(
        BuildingType::new(TOWER, "Tower", BuildingClass::Tower, 80)
            .with_population(1)
            .with_health(150),
    );
    catalog
}

/// General grid 4×4 of 100 units at the origin, dense grid 15×10 of 10
/// units centred at `(1000, 0)` so the two never overlap.
#[must_use]
pub fn standard_config() -> BoardConfig {
    BoardConfig {
        general_grid: GridConfig {
            width: 4,
            height: 4,
            cell_size: 100,
            cell_spacing: 0,
            center: (0, 0),
        },
        dense_grid: GridConfig {
            width: 15,
            height: 10,
            cell_size: 10,
            cell_spacing: 0,
            center: (1000, 0),
        },
        ..BoardConfig::default()
    }
}

/// Board built from [`standard_config`] and [`standard_catalog`].
///
/// # Panics
///
/// Panics if the fixture config is rejected, which would be a bug in the
/// fixture itself.
#[must_use]
pub fn standard_board() -> Board {
    Board::new(standard_config(), standard_catalog()).expect("standard fixture config is valid")
}

/// Board using the stock grid sizes: general 10×8 of 100 units and dense
/// 15×10 of 48 units, both centred at the origin so the dense grid lies on
/// top of the general one.
///
/// # Panics
///
/// Panics if the default config is rejected.
#[must_use]
pub fn dense_board() -> Board {
    Board::new(BoardConfig::default(), standard_catalog()).expect("default config is valid")
}

/// World centre of `cell` on one of the board's grids.
///
/// # Panics
///
/// Panics if `cell` is outside that grid.
#[must_use]
pub fn cell_center(board: &Board, kind: GridKind, cell: CellCoord) -> Vec2Fixed {
    board
        .grid(kind)
        .cell_to_world(cell)
        .unwrap_or_else(|| panic!("cell {cell:?} outside {} grid", kind.name()))
}

/// Treasury, selection set and event log that can lend themselves out as a
/// [`Collaborators`] bundle.
#[derive(Debug, Clone, Default)]
pub struct Doubles {
    /// Currency and population.
    pub treasury: Treasury,
    /// Selection state.
    pub selection: SelectionSet,
    /// Every notification, in order.
    pub log: EventLog,
}

impl Doubles {
    /// Doubles with the given starting currency and population cap.
    #[must_use]
    pub fn new(currency: i32, population_cap: u32) -> Self {
        Self {
            treasury: Treasury::new(currency, population_cap),
            selection: SelectionSet::new(),
            log: EventLog::new(),
        }
    }

    /// Doubles with plenty of funds and population.
    #[must_use]
    pub fn rich() -> Self {
        Self::new(100_000, 100)
    }

    /// Borrow all three as collaborators.
    pub fn collab(&mut self) -> Collaborators<'_> {
        Collaborators::new(&mut self.treasury, &mut self.selection, &mut self.log)
    }
}

/// Place a building through build mode at a cell of its own grid.
///
/// # Errors
///
/// Returns whatever validation rejected.
pub fn place(
    board: &mut Board,
    doubles: &mut Doubles,
    type_id: BuildingTypeId,
    at: CellCoord,
) -> Result<EntityId, PlacementError> {
    let kind = board
        .catalog()
        .get(type_id)
        .ok_or(PlacementError::UnknownBuildingType(type_id))?
        .grid();
    let pos = board
        .grid(kind)
        .cell_to_world(at)
        .ok_or(PlacementError::OutOfBounds)?;
    PlacementController::new().place_at(board, type_id, pos, &mut doubles.collab())
}

/// Long-press the building at `from`, drag it to `to` and release.
///
/// Returns `None` if nothing was pickable at `from`.
pub fn drag_building(
    board: &mut Board,
    controller: &mut RelocationController,
    from: Vec2Fixed,
    to: Vec2Fixed,
    collab: &mut Collaborators<'_>,
) -> Option<RelocationOutcome> {
    controller.pointer_down(board, from)?;
    let threshold = controller.config().threshold_ms;
    controller.tick(board, threshold, collab)?;
    controller.pointer_moved(board, to);
    controller.pointer_up(board, to, collab)
}
