//! End-to-end placement and relocation scenarios on the standard fixture board.

use std::cell::Cell;
use std::rc::Rc;

use td_core::prelude::*;
use td_test_utils::fixtures::{
    cell, cell_center, dense_board, drag_building, place, standard_board, standard_catalog, vec2,
    Doubles, FARM, TOWER, WALL,
};

#[test]
fn placing_at_world_origin_occupies_center_cell() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let mut controller = PlacementController::new();

    let farm = controller
        .place_at(&mut board, FARM, vec2(0, 0), &mut doubles.collab())
        .unwrap();
    assert_eq!(board.grid(GridKind::General).occupant_at(cell(2, 2)), Some(farm));

    let second = controller.place_at(&mut board, FARM, vec2(0, 0), &mut doubles.collab());
    assert!(matches!(second, Err(PlacementError::Occupied { .. })));
    assert_eq!(board.placed_count(), 1);
    assert!(matches!(
        doubles.log.last(),
        Some(PlacementEvent::PlacementRejected { reason, .. }) if reason == "occupied"
    ));
}

#[test]
fn tower_blocks_its_second_cell() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();

    let tower = place(&mut board, &mut doubles, TOWER, cell(5, 3)).unwrap();
    let dense = board.grid(GridKind::Dense);
    assert_eq!(dense.occupant_at(cell(5, 3)), Some(tower));
    assert_eq!(dense.occupant_at(cell(5, 4)), Some(tower));

    let blocked = place(&mut board, &mut doubles, TOWER, cell(5, 4));
    assert_eq!(
        blocked,
        Err(PlacementError::Occupied {
            cell: cell(5, 4),
            occupant: Some(tower)
        })
    );
    assert_eq!(doubles.treasury.population, 1);
}

#[test]
fn tower_commit_is_all_or_nothing() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let wall = place(&mut board, &mut doubles, WALL, cell(5, 4)).unwrap();
    let before = board.state_hash();
    let currency = doubles.treasury.currency;

    assert!(place(&mut board, &mut doubles, TOWER, cell(5, 3)).is_err());
    assert_eq!(board.grid(GridKind::Dense).occupant_at(cell(5, 3)), None);
    assert_eq!(board.grid(GridKind::Dense).occupant_at(cell(5, 4)), Some(wall));

    // Top row: the second cell is off the grid.
    assert_eq!(
        place(&mut board, &mut doubles, TOWER, cell(2, 9)),
        Err(PlacementError::OutOfBounds)
    );
    assert_eq!(board.grid(GridKind::Dense).occupant_at(cell(2, 9)), None);

    assert_eq!(board.state_hash(), before);
    assert_eq!(doubles.treasury.currency, currency);
    assert_eq!(doubles.treasury.population, 0);
}

#[test]
fn drag_to_empty_cell_moves_building() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let farm = place(&mut board, &mut doubles, FARM, cell(1, 1)).unwrap();
    let mut controller = RelocationController::new(board.config().long_press);

    let from = cell_center(&board, GridKind::General, cell(1, 1));
    let to = cell_center(&board, GridKind::General, cell(2, 2));
    let outcome = drag_building(&mut board, &mut controller, from, to, &mut doubles.collab());

    assert_eq!(
        outcome,
        Some(RelocationOutcome::Moved {
            entity: farm,
            from: cell(1, 1),
            to: cell(2, 2)
        })
    );
    let general = board.grid(GridKind::General);
    assert_eq!(general.occupant_at(cell(1, 1)), None);
    assert_eq!(general.occupant_at(cell(2, 2)), Some(farm));
    assert_eq!(board.position_of(farm), Some(to));
}

#[test]
fn drag_onto_building_swaps_them() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let a = place(&mut board, &mut doubles, FARM, cell(1, 1)).unwrap();
    let b = place(&mut board, &mut doubles, FARM, cell(3, 3)).unwrap();
    let mut controller = RelocationController::new(board.config().long_press);

    let from = cell_center(&board, GridKind::General, cell(1, 1));
    let to = cell_center(&board, GridKind::General, cell(3, 3));
    let outcome = drag_building(&mut board, &mut controller, from, to, &mut doubles.collab());

    assert_eq!(
        outcome,
        Some(RelocationOutcome::Swapped {
            dragged: a,
            other: b,
            from: cell(1, 1),
            to: cell(3, 3)
        })
    );
    let general = board.grid(GridKind::General);
    assert_eq!(general.occupant_at(cell(1, 1)), Some(b));
    assert_eq!(general.occupant_at(cell(3, 3)), Some(a));
    assert_eq!(general.occupied_cells().count(), 2);
    assert_eq!(board.position_of(b), Some(from));
}

#[test]
fn press_that_moves_too_far_aborts() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let farm = place(&mut board, &mut doubles, FARM, cell(1, 1)).unwrap();
    let before = board.state_hash();
    let mut controller = RelocationController::new(board.config().long_press);
    let start = cell_center(&board, GridKind::General, cell(1, 1));

    assert_eq!(controller.pointer_down(&mut board, start), Some(farm));
    assert_eq!(controller.tick(&mut board, 200, &mut doubles.collab()), None);
    let moved = controller.pointer_moved(&mut board, start + vec2(15, 0));
    assert_eq!(moved, Some(RelocationOutcome::Aborted { entity: farm }));

    assert!(!controller.is_active());
    assert_eq!(controller.tick(&mut board, 1000, &mut doubles.collab()), None);
    assert_eq!(board.state_hash(), before);
    assert_eq!(board.grid(GridKind::General).occupant_at(cell(1, 1)), Some(farm));
}

#[test]
fn pool_prewarms_and_reuses_without_factory() {
    let mut store = EntityStore::new();
    let mut pool = InstancePool::new(td_core::pool::PoolConfig {
        prewarm: 2,
        max_idle: 4,
    });
    assert_eq!(pool.acquire(FARM, &mut store), None);

    let built = Rc::new(Cell::new(0));
    let counter = Rc::clone(&built);
    pool.register(
        FARM,
        Box::new(move |store, type_id| {
            counter.set(counter.get() + 1);
            store.spawn(type_id, 100)
        }),
        &mut store,
    );
    assert_eq!(built.get(), 2);

    let first = pool.acquire(FARM, &mut store).unwrap();
    assert_eq!(built.get(), 2);
    assert_eq!(store.type_of(first), Some(FARM));
    assert_eq!(pool.idle_count(FARM), 1);
}

#[test]
fn killed_occupant_frees_its_cell() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let farm = place(&mut board, &mut doubles, FARM, cell(1, 1)).unwrap();

    board.entities_mut().kill(farm);
    assert!(!board.is_occupied(GridKind::General, cell(1, 1)));
    let replacement = place(&mut board, &mut doubles, FARM, cell(1, 1)).unwrap();
    assert_ne!(replacement, farm);
}

#[test]
fn displaced_occupant_is_treated_as_stale() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let farm = place(&mut board, &mut doubles, FARM, cell(0, 0)).unwrap();

    board.entities_mut().displace(farm, vec2(1000, 1000));
    assert!(!board.is_occupied(GridKind::General, cell(0, 0)));
    assert_eq!(board.grid(GridKind::General).occupant_at(cell(0, 0)), None);
}

#[test]
fn destroyed_tower_returns_population_and_instance() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let tower = place(&mut board, &mut doubles, TOWER, cell(0, 0)).unwrap();
    let idle = board.pool().idle_count(TOWER);
    assert_eq!(doubles.treasury.population, 1);

    assert_eq!(board.apply_damage(tower, 1000, &mut doubles.collab()), Some(0));

    assert_eq!(doubles.treasury.population, 0);
    assert!(board.placed(tower).is_none());
    assert_eq!(board.grid(GridKind::Dense).occupied_cells().count(), 0);
    assert_eq!(board.pool().idle_count(TOWER), idle + 1);
    assert_eq!(
        doubles.log.last(),
        Some(&PlacementEvent::BuildingRemoved {
            entity: tower,
            type_id: TOWER,
            cause: RemovalCause::Destroyed
        })
    );
}

#[test]
fn off_grid_wall_stays_where_dropped() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let wall = place(&mut board, &mut doubles, WALL, cell(3, 3)).unwrap();
    let mut controller = RelocationController::new(board.config().long_press);

    let from = cell_center(&board, GridKind::Dense, cell(3, 3));
    let outside = vec2(500, 500);
    let outcome = drag_building(&mut board, &mut controller, from, outside, &mut doubles.collab());

    assert_eq!(
        outcome,
        Some(RelocationOutcome::OffGrid {
            entity: wall,
            position: outside
        })
    );
    assert_eq!(board.grid(GridKind::Dense).occupied_cells().count(), 0);
    assert_eq!(board.position_of(wall), Some(outside));
    assert_eq!(board.building_at(outside), None);
}

#[test]
fn off_grid_farm_reverts() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let farm = place(&mut board, &mut doubles, FARM, cell(0, 3)).unwrap();
    let before = board.state_hash();
    let mut controller = RelocationController::new(board.config().long_press);

    let from = cell_center(&board, GridKind::General, cell(0, 3));
    let outcome = drag_building(&mut board, &mut controller, from, vec2(-900, 0), &mut doubles.collab());

    assert_eq!(
        outcome,
        Some(RelocationOutcome::Reverted {
            entity: farm,
            cell: Some(cell(0, 3))
        })
    );
    assert_eq!(board.state_hash(), before);
}

#[test]
fn router_pause_mid_drag_restores_board() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let farm = place(&mut board, &mut doubles, FARM, cell(2, 1)).unwrap();
    let before = board.state_hash();
    let mut router = InteractionRouter::for_board(&board);

    let start = cell_center(&board, GridKind::General, cell(2, 1));
    router.pointer_down(&mut board, start).unwrap();
    router.tick(&mut board, 600, &mut doubles.collab());
    let target = cell_center(&board, GridKind::General, cell(0, 0));
    router.pointer_move(&mut board, target);
    assert!(router.highlight().is_some_and(|h| h.available));

    router.set_phase(&mut board, GamePhase::Paused, &mut doubles.collab());
    assert_eq!(board.state_hash(), before);
    assert_eq!(board.placed(farm).unwrap().anchor, Some(cell(2, 1)));
}

#[test]
fn sell_refunds_half_cost() {
    let mut board = standard_board();
    let mut doubles = Doubles::new(100, 0);
    let farm = place(&mut board, &mut doubles, FARM, cell(0, 0)).unwrap();
    assert_eq!(doubles.treasury.currency, 50);

    assert_eq!(board.sell(farm, &mut doubles.collab()), Some(25));
    assert_eq!(doubles.treasury.currency, 75);
    assert_eq!(board.placed_count(), 0);
}

#[test]
fn reset_clears_everything() {
    let mut board = standard_board();
    let mut doubles = Doubles::rich();
    let empty = board.state_hash();
    place(&mut board, &mut doubles, FARM, cell(0, 0)).unwrap();
    place(&mut board, &mut doubles, TOWER, cell(4, 4)).unwrap();

    board.reset();
    assert_eq!(board.placed_count(), 0);
    assert_eq!(board.grid(GridKind::General).occupied_cells().count(), 0);
    assert_eq!(board.grid(GridKind::Dense).occupied_cells().count(), 0);
    assert_eq!(board.state_hash(), empty);
}

#[test]
fn large_footprint_holds_every_cell() {
    const KEEP: BuildingTypeId = BuildingTypeId::new(6);
    let mut catalog = standard_catalog();
    assert!(catalog.register(
        BuildingType::new(KEEP, "Keep", BuildingClass::Production, 300)
            .with_footprint(Footprint::new(4, 4))
            .with_health(900),
    ));
    let mut board = Board::new(BoardConfig::default(), catalog).unwrap();
    let mut doubles = Doubles::rich();

    let keep = place(&mut board, &mut doubles, KEEP, cell(0, 0)).unwrap();
    for corner in [cell(0, 0), cell(3, 0), cell(0, 3), cell(3, 3)] {
        assert!(board.is_occupied(GridKind::General, corner));
        assert_eq!(
            place(&mut board, &mut doubles, FARM, corner),
            Err(PlacementError::Occupied {
                cell: corner,
                occupant: Some(keep)
            })
        );
    }
    assert_eq!(board.grid(GridKind::General).occupied_cells().count(), 16);
    assert_eq!(board.placed_count(), 1);
}

#[test]
fn overlapping_grids_hit_test_dense_first() {
    let mut board = dense_board();
    let mut doubles = Doubles::rich();

    // The wall's centre also lies inside a general grid cell
    let point = cell_center(&board, GridKind::Dense, cell(8, 6));
    let under = board.grid(GridKind::General).world_to_cell(point).unwrap();
    assert_eq!(under, cell(5, 4));

    let farm = place(&mut board, &mut doubles, FARM, under).unwrap();
    let wall = place(&mut board, &mut doubles, WALL, cell(8, 6)).unwrap();
    assert_eq!(board.building_at(point), Some(wall));

    assert!(board.sell(wall, &mut doubles.collab()).is_some());
    assert_eq!(board.building_at(point), Some(farm));
}
