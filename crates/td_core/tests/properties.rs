//! Property tests for grid geometry, occupancy, relocation and pooling.

use td_core::grid::GridGeometry;
use td_core::prelude::*;
use td_test_utils::determinism::apply_op;
use td_test_utils::fixtures::{cell, cell_center, drag_building, place, standard_board, Doubles, FARM, TOWER, WALL};
use td_test_utils::proptest::prelude::*;
use td_test_utils::strategies::{arb_cell, arb_general_cell, arb_op_sequence};

fn arb_geometry() -> impl Strategy<Value = GridGeometry> {
    (1u32..30, 1u32..30, 1i32..200, 0i32..20, -1000i32..1000, -1000i32..1000).prop_map(
        |(width, height, size, spacing, cx, cy)| {
            GridGeometry::new(width, height, Fixed::from_num(size))
                .with_spacing(Fixed::from_num(spacing))
                .with_center(Vec2Fixed::from_units(cx, cy))
        },
    )
}

fn pool_is_conserved(board: &Board) -> bool {
    [FARM, WALL, TOWER].into_iter().all(|type_id| {
        let pool = board.pool();
        let tracked = pool.idle_count(type_id) + pool.outstanding_count(type_id);
        let alive = board
            .entities()
            .iter()
            .filter(|i| i.type_id == type_id && i.alive)
            .count();
        board.entities().count_of_type(type_id) == tracked && alive <= tracked
    })
}

proptest! {
    #[test]
    fn cell_world_round_trip(
        (geometry, target) in arb_geometry()
            .prop_flat_map(|g| (Just(g), arb_cell(g.width, g.height)))
    ) {
        let grid = OccupancyGrid::new(GridKind::General, geometry);
        let world = grid.cell_to_world(target).unwrap();
        prop_assert_eq!(grid.world_to_cell(world), Some(target));
    }

    #[test]
    fn occupied_cell_rejects_other_occupants(target in arb_cell(15, 10)) {
        let geometry = GridGeometry::new(15, 10, Fixed::from_num(48));
        let mut grid = OccupancyGrid::new(GridKind::Dense, geometry);
        let mut store = EntityStore::new();
        let center = grid.cell_to_world(target).unwrap();
        let a = store.spawn(FARM, 10);
        let b = store.spawn(FARM, 10);
        store.activate(a, center);
        store.activate(b, center);

        prop_assert!(grid.occupy(target, a, &store));
        prop_assert!(!grid.occupy(target, b, &store));
        prop_assert_eq!(grid.occupant_at(target), Some(a));

        store.kill(a);
        prop_assert!(grid.occupy(target, b, &store));
        prop_assert_eq!(grid.occupant_at(target), Some(b));
    }

    #[test]
    fn swap_exchanges_occupants(p in arb_general_cell(), q in arb_general_cell()) {
        prop_assume!(p != q);
        let mut board = standard_board();
        let mut doubles = Doubles::rich();
        let a = place(&mut board, &mut doubles, FARM, p).unwrap();
        let b = place(&mut board, &mut doubles, FARM, q).unwrap();
        let mut controller = RelocationController::new(board.config().long_press);

        let from = cell_center(&board, GridKind::General, p);
        let to = cell_center(&board, GridKind::General, q);
        drag_building(&mut board, &mut controller, from, to, &mut doubles.collab());

        let general = board.grid(GridKind::General);
        prop_assert_eq!(general.occupant_at(q), Some(a));
        prop_assert_eq!(general.occupant_at(p), Some(b));
        prop_assert_eq!(general.occupied_cells().count(), 2);
    }

    #[test]
    fn aborted_drag_restores_board(
        origin in arb_general_cell(),
        others in proptest::collection::vec(arb_general_cell(), 0..6),
        path in proptest::collection::vec(arb_general_cell(), 0..6),
    ) {
        let mut board = standard_board();
        let mut doubles = Doubles::rich();
        let dragged = place(&mut board, &mut doubles, FARM, origin).unwrap();
        for other in others {
            place(&mut board, &mut doubles, FARM, other).ok();
        }
        let before = board.state_hash();
        let mut controller = RelocationController::new(board.config().long_press);

        let start = cell_center(&board, GridKind::General, origin);
        prop_assert_eq!(controller.pointer_down(&mut board, start), Some(dragged));
        prop_assert_eq!(controller.tick(&mut board, 500, &mut doubles.collab()), Some(dragged));
        for step in path {
            let pos = cell_center(&board, GridKind::General, step);
            controller.pointer_moved(&mut board, pos);
        }
        let outcome = controller.abort(&mut board, &mut doubles.collab());

        prop_assert_eq!(
            outcome,
            Some(RelocationOutcome::Reverted { entity: dragged, cell: Some(origin) })
        );
        prop_assert_eq!(board.state_hash(), before);
    }

    #[test]
    fn pool_tracks_every_instance(ops in arb_op_sequence(40)) {
        let mut board = standard_board();
        let mut doubles = Doubles::rich();
        prop_assert!(pool_is_conserved(&board));
        for op in ops {
            apply_op(&mut board, &mut doubles, op);
            prop_assert!(pool_is_conserved(&board));
        }
    }

    #[test]
    fn acquire_then_release_restores_idle_count(prewarm in 0usize..6, max_idle in 0usize..6) {
        let mut store = EntityStore::new();
        let mut pool = InstancePool::new(td_core::pool::PoolConfig { prewarm, max_idle });
        pool.register(FARM, Box::new(|store, type_id| store.spawn(type_id, 10)), &mut store);
        let idle = pool.idle_count(FARM);
        prop_assert_eq!(idle, prewarm.min(max_idle));

        let id = pool.acquire(FARM, &mut store).unwrap();
        pool.release(id, &mut store);

        prop_assert_eq!(pool.idle_count(FARM), (idle.max(1)).min(max_idle));
        prop_assert_eq!(pool.outstanding_count(FARM), 0);
    }
}

#[test]
fn every_placed_building_holds_its_footprint() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let tower = place(&mut board, &mut doubles, TOWER, cell(7, 2)).unwrap();
    let record = board.placed(tower).unwrap().clone();
    let anchor = record.anchor.unwrap();
    for covered in record.footprint.cells(anchor) {
        assert_eq!(board.grid(GridKind::Dense).occupant_at(covered), Some(tower));
    }
}
