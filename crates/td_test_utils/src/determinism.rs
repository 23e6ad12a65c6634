//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the placement engine produces
//! identical boards given identical input.
//!
//! # Testing Strategy
//!
//! Placement results feed lockstep-style replays and headless comparisons,
//! so they must be bit-for-bit reproducible. Sources of non-determinism
//! include:
//!
//! - **Floating-point math**: world positions use [`td_core::math::Fixed`].
//! - **HashMap iteration order**: the board iterates `BTreeMap`s in entity
//!   id order.
//! - **Pool reuse order**: recycled instances are handed out newest first,
//!   so ids depend only on the operation sequence.

use td_core::board::Board;
use td_core::catalog::BuildingTypeId;
use td_core::grid::{CellCoord, GridKind};
use td_core::relocation::RelocationController;

use crate::fixtures::{self, Doubles};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps applied per run.
    pub steps: usize,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic board).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Board replay is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine multiple times and compare the final hashes.
///
/// * `runs` - Number of independent runs
/// * `steps` - Number of steps per run
/// * `setup` - Creates the initial state
/// * `step` - Advances the state; receives the step index
/// * `hash` - Hashes the final state
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: usize,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, usize),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();
        for index in 0..steps {
            step(&mut state, index);
        }
        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        steps,
    }
}

/// One scripted player or world action against a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardOp {
    /// Place a building of `type_id` with its anchor at `cell`.
    Place {
        /// Type to place.
        type_id: BuildingTypeId,
        /// Anchor cell on the type's grid.
        cell: CellCoord,
    },
    /// Long-press the building at `from` and drop it at `to`.
    Drag {
        /// Grid both cells refer to.
        grid: GridKind,
        /// Pickup cell.
        from: CellCoord,
        /// Drop cell.
        to: CellCoord,
    },
    /// Kill whatever the grid records at `cell`, without telling the grid.
    Kill {
        /// Grid the cell refers to.
        grid: GridKind,
        /// Cell to look at.
        cell: CellCoord,
    },
    /// Sell whatever the grid records at `cell`.
    Sell {
        /// Grid the cell refers to.
        grid: GridKind,
        /// Cell to look at.
        cell: CellCoord,
    },
    /// Remove every dead building.
    Sweep,
}

/// Apply one op. Rejections are part of the script and are ignored.
pub fn apply_op(board: &mut Board, doubles: &mut Doubles, op: BoardOp) {
    match op {
        BoardOp::Place { type_id, cell } => {
            fixtures::place(board, doubles, type_id, cell).ok();
        }
        BoardOp::Drag { grid, from, to } => {
            let geometry = board.grid(grid);
            let (Some(from), Some(to)) = (geometry.cell_to_world(from), geometry.cell_to_world(to)) else {
                return;
            };
            let mut controller = RelocationController::new(board.config().long_press);
            fixtures::drag_building(board, &mut controller, from, to, &mut doubles.collab());
        }
        BoardOp::Kill { grid, cell } => {
            if let Some(entity) = board.grid(grid).occupant_at(cell) {
                board.kill(entity);
            }
        }
        BoardOp::Sell { grid, cell } => {
            if let Some(entity) = board.grid(grid).occupant_at(cell) {
                board.sell(entity, &mut doubles.collab());
            }
        }
        BoardOp::Sweep => {
            board.sweep_destroyed(&mut doubles.collab());
        }
    }
}

/// Replay `ops` on fresh boards `runs` times and compare state hashes.
pub fn verify_replay_determinism<Setup>(runs: usize, setup: Setup, ops: &[BoardOp]) -> DeterminismResult
where
    Setup: Fn() -> Board,
{
    verify_determinism(
        runs,
        ops.len(),
        || (setup(), Doubles::rich()),
        |(board, doubles), index| apply_op(board, doubles, ops[index]),
        |(board, _)| board.state_hash(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{cell, standard_board, FARM, TOWER, WALL};
    use crate::strategies::arb_op_sequence;
    use proptest::prelude::*;

    fn script() -> Vec<BoardOp> {
        vec![
            BoardOp::Place {
                type_id: FARM,
                cell: cell(0, 0),
            },
            BoardOp::Place {
                type_id: FARM,
                cell: cell(2, 2),
            },
            BoardOp::Place {
                type_id: TOWER,
                cell: cell(5, 3),
            },
            BoardOp::Place {
                type_id: WALL,
                cell: cell(1, 1),
            },
            BoardOp::Drag {
                grid: GridKind::General,
                from: cell(0, 0),
                to: cell(2, 2),
            },
            BoardOp::Kill {
                grid: GridKind::Dense,
                cell: cell(5, 4),
            },
            BoardOp::Sweep,
            BoardOp::Place {
                type_id: TOWER,
                cell: cell(5, 3),
            },
        ]
    }

    #[test]
    fn test_scripted_replay_is_deterministic() {
        let result = verify_replay_determinism(3, standard_board, &script());
        result.assert_deterministic();
        assert_eq!(result.steps, 8);
    }

    #[test]
    fn test_different_scripts_differ() {
        let a = verify_replay_determinism(1, standard_board, &script()[..1]);
        let b = verify_replay_determinism(1, standard_board, &script()[..2]);
        assert_ne!(a.hashes, b.hashes);
    }

    #[test]
    fn test_unique_hashes() {
        let result = DeterminismResult {
            is_deterministic: false,
            hashes: vec![3, 1, 3],
            steps: 0,
        };
        assert_eq!(result.unique_hashes(), vec![1, 3]);
    }

    proptest! {
        #[test]
        fn prop_random_scripts_replay_identically(ops in arb_op_sequence(24)) {
            let result = verify_replay_determinism(2, standard_board, &ops);
            prop_assert!(result.is_deterministic);
        }
    }
}
