//! Proptest strategies for boards built by [`crate::fixtures::standard_board`].

use proptest::prelude::*;
use td_core::catalog::BuildingTypeId;
use td_core::grid::{CellCoord, GridKind};

use crate::determinism::BoardOp;
use crate::fixtures::{FARM, TOWER, WALL};

/// Any cell of a `width` × `height` grid.
pub fn arb_cell(width: u32, height: u32) -> impl Strategy<Value = CellCoord> {
    (0..width, 0..height).prop_map(|(x, y)| CellCoord::new(x, y))
}

/// Any cell of the standard 4×4 general grid.
pub fn arb_general_cell() -> impl Strategy<Value = CellCoord> {
    arb_cell(4, 4)
}

/// Any cell of the standard 15×10 dense grid.
pub fn arb_dense_cell() -> impl Strategy<Value = CellCoord> {
    arb_cell(15, 10)
}

/// One of the standard building types.
pub fn arb_building_type() -> impl Strategy<Value = BuildingTypeId> {
    prop_oneof![Just(FARM), Just(WALL), Just(TOWER)]
}

/// A grid and one of its cells.
pub fn arb_grid_cell() -> impl Strategy<Value = (GridKind, CellCoord)> {
    prop_oneof![
        arb_general_cell().prop_map(|c| (GridKind::General, c)),
        arb_dense_cell().prop_map(|c| (GridKind::Dense, c)),
    ]
}

/// A placement with an anchor on the type's own grid.
pub fn arb_place_op() -> impl Strategy<Value = BoardOp> {
    prop_oneof![
        arb_general_cell().prop_map(|cell| BoardOp::Place { type_id: FARM, cell }),
        arb_dense_cell().prop_map(|cell| BoardOp::Place { type_id: WALL, cell }),
        arb_dense_cell().prop_map(|cell| BoardOp::Place { type_id: TOWER, cell }),
    ]
}

/// A drag between two cells of the same grid.
pub fn arb_drag_op() -> impl Strategy<Value = BoardOp> {
    prop_oneof![
        (arb_general_cell(), arb_general_cell()).prop_map(|(from, to)| BoardOp::Drag {
            grid: GridKind::General,
            from,
            to
        }),
        (arb_dense_cell(), arb_dense_cell()).prop_map(|(from, to)| BoardOp::Drag {
            grid: GridKind::Dense,
            from,
            to
        }),
    ]
}

/// Any board op, weighted towards placements and drags.
pub fn arb_board_op() -> impl Strategy<Value = BoardOp> {
    prop_oneof![
        4 => arb_place_op(),
        3 => arb_drag_op(),
        1 => arb_grid_cell().prop_map(|(grid, cell)| BoardOp::Kill { grid, cell }),
        1 => arb_grid_cell().prop_map(|(grid, cell)| BoardOp::Sell { grid, cell }),
        1 => Just(BoardOp::Sweep),
    ]
}

/// A script of up to `max_len` ops.
pub fn arb_op_sequence(max_len: usize) -> impl Strategy<Value = Vec<BoardOp>> {
    proptest::collection::vec(arb_board_op(), 0..max_len)
}
