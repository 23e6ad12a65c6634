//! Headless session runner.
//!
//! Owns a [`Board`], an [`InteractionRouter`] and in-memory collaborators,
//! and turns protocol commands into calls on them.

use std::io::{self, BufRead, Write};

use td_core::board::Board;
use td_core::catalog::BuildingTypeId;
use td_core::collaborators::{Collaborators, EventLog, SelectionSet, Treasury};
use td_core::error::PlacementError;
use td_core::grid::CellCoord;
use td_core::interaction::InteractionRouter;
use td_core::math::Vec2Fixed;

use crate::protocol::{
    BuildingState, Command, EconomyState, HighlightState, IndicatorState, PreviewState, Response,
    StateSnapshot,
};
use crate::scenario::{Scenario, ScenarioError};

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Output state after every command that changed something.
    pub auto_state_output: bool,
}

/// Runner for one scripted placement session.
pub struct HeadlessRunner {
    config: HeadlessConfig,
    scenario: Scenario,
    board: Board,
    router: InteractionRouter,
    treasury: Treasury,
    selection: SelectionSet,
    log: EventLog,
    finished: bool,
}

fn world(x: f64, y: f64) -> Vec2Fixed {
    Vec2Fixed::from_f64(x, y)
}

fn pair(cell: CellCoord) -> (u32, u32) {
    (cell.x, cell.y)
}

impl HeadlessRunner {
    /// Create a runner for a scenario.
    pub fn new(scenario: Scenario) -> Result<Self, ScenarioError> {
        Self::with_config(scenario, HeadlessConfig::default())
    }

    /// Create a runner with custom configuration.
    pub fn with_config(scenario: Scenario, config: HeadlessConfig) -> Result<Self, ScenarioError> {
        let board = scenario.build_board()?;
        let router = InteractionRouter::for_board(&board);
        Ok(Self {
            config,
            treasury: scenario.treasury(),
            scenario,
            board,
            router,
            selection: SelectionSet::new(),
            log: EventLog::new(),
            finished: false,
        })
    }

    /// The board being driven.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Current economy.
    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    /// Whether `quit` has been received.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Greeting sent before the first command.
    pub fn ready(&self) -> Response {
        Response::ready(&self.scenario.name)
    }

    fn split(&mut self) -> (&mut Board, &mut InteractionRouter, Collaborators<'_>) {
        (
            &mut self.board,
            &mut self.router,
            Collaborators::new(&mut self.treasury, &mut self.selection, &mut self.log),
        )
    }

    /// Execute one command.
    pub fn handle(&mut self, command: Command) -> Response {
        let name = command.name();
        let result: Result<(), PlacementError> = match command {
            Command::SelectBuilding { type_id } => self
                .router
                .select_building(&self.board, BuildingTypeId::new(type_id)),
            Command::CancelBuild => {
                let (_, router, mut collab) = self.split();
                router.cancel_build(&mut collab);
                Ok(())
            }
            Command::PointerDown { x, y } => self
                .router
                .pointer_down(&mut self.board, world(x, y))
                .map(drop),
            Command::PointerMove { x, y } => {
                self.router.pointer_move(&mut self.board, world(x, y));
                Ok(())
            }
            Command::PointerUp { x, y } => {
                let (board, router, mut collab) = self.split();
                router.pointer_up(board, world(x, y), &mut collab).map(drop)
            }
            Command::Tick { dt_ms, count } => {
                let (board, router, mut collab) = self.split();
                for _ in 0..count {
                    router.tick(board, dt_ms, &mut collab);
                    board.sweep_destroyed(&mut collab);
                }
                Ok(())
            }
            Command::Damage { entity_id, amount } => {
                let (board, _, mut collab) = self.split();
                if board.apply_damage(entity_id, amount, &mut collab).is_none() {
                    return Response::error(format!("Unknown entity {entity_id}"), Some(name));
                }
                Ok(())
            }
            Command::Kill { entity_id } => {
                if !self.board.kill(entity_id) {
                    return Response::error(format!("Unknown entity {entity_id}"), Some(name));
                }
                Ok(())
            }
            Command::Sell { entity_id } => {
                let (board, _, mut collab) = self.split();
                if board.sell(entity_id, &mut collab).is_none() {
                    return Response::error(format!("Entity {entity_id} cannot be sold"), Some(name));
                }
                Ok(())
            }
            Command::SetPhase { phase } => {
                let (board, router, mut collab) = self.split();
                router.set_phase(board, phase, &mut collab);
                Ok(())
            }
            Command::Reset => return self.reset(),
            Command::Query => return Response::State(Box::new(self.snapshot())),
            Command::Hash => {
                return Response::StateHash {
                    hash: self.board.state_hash(),
                }
            }
            Command::Quit => {
                self.finished = true;
                return Response::Bye;
            }
        };

        let events = self.log.drain();
        match result {
            Ok(()) => Response::events(name, events),
            Err(error) => {
                tracing::debug!(cmd = name, %error, "Command rejected");
                Response::rejected(&error, name)
            }
        }
    }

    fn reset(&mut self) -> Response {
        let (board, router, mut collab) = self.split();
        router.abort_all(board, &mut collab);
        self.board.reset();
        self.treasury = self.scenario.treasury();
        self.selection = SelectionSet::new();
        self.log.drain();
        match self.scenario.place_prebuilt(&mut self.board) {
            Ok(()) => Response::ack("reset"),
            Err(error) => Response::error(error.to_string(), Some("reset")),
        }
    }

    /// Parse and execute one input line. Blank lines yield nothing.
    pub fn handle_line(&mut self, line: &str) -> Option<Response> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(match Command::from_json(line) {
            Ok(command) => {
                tracing::debug!(cmd = command.name(), "Command received");
                self.handle(command)
            }
            Err(e) => Response::error(format!("Parse error: {}", e), None),
        })
    }

    /// Full observable state.
    pub fn snapshot(&self) -> StateSnapshot {
        let buildings = self
            .board
            .placed_buildings()
            .map(|record| {
                let instance = self.board.entities().get(record.entity);
                let (x, y) = instance.map_or((0.0, 0.0), |i| i.position.to_f64());
                BuildingState {
                    id: record.entity,
                    type_id: record.type_id.0,
                    name: self
                        .board
                        .catalog()
                        .get(record.type_id)
                        .map(|t| t.name.clone())
                        .unwrap_or_default(),
                    grid: record.grid.name().to_string(),
                    cell: record.anchor.map(pair),
                    x,
                    y,
                    health: instance.map_or(0, |i| i.health),
                    max_health: instance.map_or(0, |i| i.max_health),
                    alive: record.alive,
                }
            })
            .collect();

        let preview = self.router.preview().map(|p| {
            let (x, y) = p.position.to_f64();
            PreviewState {
                type_id: p.type_id.0,
                x,
                y,
                cell: p.cell.map(pair),
                valid: p.valid,
                suggestion: p.suggestion.map(pair),
            }
        });
        let highlight = self.router.highlight().map(|h| HighlightState {
            grid: h.grid.name().to_string(),
            cell: pair(h.cell),
            available: h.available,
        });
        let indicator = self.router.indicator().map(|i| {
            let (x, y) = i.position.to_f64();
            IndicatorState {
                entity_id: i.entity,
                x,
                y,
                progress: i.progress.to_num::<f64>(),
            }
        });

        StateSnapshot {
            phase: self.router.phase(),
            economy: EconomyState {
                currency: self.treasury.currency,
                population: self.treasury.population,
                population_cap: self.treasury.population_cap,
            },
            buildings,
            preview,
            highlight,
            indicator,
            selected: self.selection.selected().collect(),
            hash: self.board.state_hash(),
        }
    }

    /// Run the session loop until `quit` or end of input.
    ///
    /// Reads JSON commands from `input`, writes responses to `output`.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        output.write_all(self.ready().to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let Some(response) = self.handle_line(&line) else {
                continue;
            };
            output.write_all(response.to_json_line().as_bytes())?;
            if self.config.auto_state_output && matches!(response, Response::Ack { .. } | Response::Events { .. }) {
                let state = Response::State(Box::new(self.snapshot()));
                output.write_all(state.to_json_line().as_bytes())?;
            }
            output.flush()?;
            if self.finished {
                break;
            }
        }

        if !self.finished {
            tracing::info!("Input closed");
        }
        Ok(())
    }
}

/// Result of replaying one command script several times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Final state hash of each run.
    pub hashes: Vec<u64>,
}

impl VerifyReport {
    /// Whether every run ended in the same state.
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }
}

/// Replay `commands` on fresh runners `runs` times and collect final hashes.
pub fn verify_script(scenario: &Scenario, commands: &[Command], runs: usize) -> Result<VerifyReport, ScenarioError> {
    let mut hashes = Vec::with_capacity(runs);
    for run in 0..runs {
        let mut runner = HeadlessRunner::new(scenario.clone())?;
        for command in commands {
            runner.handle(command.clone());
            if runner.is_finished() {
                break;
            }
        }
        let hash = runner.board().state_hash();
        tracing::debug!(run, hash, "Verification run finished");
        hashes.push(hash);
    }
    Ok(VerifyReport { hashes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use td_core::collaborators::PlacementEvent;
    use td_core::interaction::GamePhase;

    const OUTPOST: &str = r#"
Scenario(
    name: "Outpost",
    board: BoardConfig(
        general_grid: GridConfig(width: 4, height: 4, cell_size: 100),
        dense_grid: GridConfig(width: 15, height: 10, cell_size: 10, center: (1000, 0)),
    ),
    buildings: [
        BuildingData(id: 1, name: "Farm", class: production, cost: 50),
        BuildingData(id: 2, name: "Wall", class: wall, cost: 10, health: 30),
    ],
    starting_currency: 100,
)
"#;

    fn runner() -> HeadlessRunner {
        HeadlessRunner::new(Scenario::from_ron_str(OUTPOST).unwrap()).unwrap()
    }

    fn placed_entity(response: &Response) -> u64 {
        match response {
            Response::Events { events, .. } => events
                .iter()
                .find_map(|e| match e {
                    PlacementEvent::BuildingPlaced { entity, .. } => Some(*entity),
                    _ => None,
                })
                .unwrap(),
            other => panic!("expected events, got {other:?}"),
        }
    }

    #[test]
    fn test_place_through_commands() {
        let mut runner = runner();
        assert_eq!(
            runner.handle(Command::SelectBuilding { type_id: 1 }),
            Response::ack("select_building")
        );
        runner.handle(Command::PointerMove { x: 0.0, y: 0.0 });
        let placed = runner.handle(Command::PointerUp { x: 0.0, y: 0.0 });
        let farm = placed_entity(&placed);

        assert_eq!(runner.treasury().currency, 50);
        let state = runner.snapshot();
        assert_eq!(state.buildings.len(), 1);
        assert_eq!(state.buildings[0].id, farm);
        assert_eq!(state.buildings[0].cell, Some((2, 2)));
    }

    #[test]
    fn test_rejection_reports_code() {
        let mut runner = runner();
        runner.handle(Command::SelectBuilding { type_id: 1 });
        let response = runner.handle(Command::PointerUp { x: 900.0, y: 900.0 });
        assert!(matches!(
            response,
            Response::Error { code: Some(ref code), .. } if code == "no_valid_location"
        ));
    }

    #[test]
    fn test_long_press_drag_via_ticks() {
        let mut runner = runner();
        runner.handle(Command::SelectBuilding { type_id: 1 });
        runner.handle(Command::PointerUp { x: -150.0, y: -150.0 });

        runner.handle(Command::PointerDown { x: -150.0, y: -150.0 });
        let picked = runner.handle(Command::Tick { dt_ms: 100, count: 5 });
        assert!(matches!(
            picked,
            Response::Events { ref events, .. } if matches!(events[0], PlacementEvent::DragStarted { .. })
        ));
        runner.handle(Command::PointerMove { x: 150.0, y: 150.0 });
        let dropped = runner.handle(Command::PointerUp { x: 150.0, y: 150.0 });
        assert!(matches!(
            dropped,
            Response::Events { ref events, .. } if matches!(events[0], PlacementEvent::BuildingMoved { .. })
        ));
        assert_eq!(runner.snapshot().buildings[0].cell, Some((3, 3)));
    }

    #[test]
    fn test_damage_sweeps_destroyed_wall() {
        let mut runner = runner();
        runner.handle(Command::SelectBuilding { type_id: 2 });
        let wall = placed_entity(&runner.handle(Command::PointerUp { x: 1000.0, y: 0.0 }));

        let response = runner.handle(Command::Damage {
            entity_id: wall,
            amount: 50,
        });
        assert!(matches!(response, Response::Events { .. }));
        assert!(runner.snapshot().buildings.is_empty());

        let unknown = runner.handle(Command::Damage {
            entity_id: 999,
            amount: 1,
        });
        assert!(matches!(unknown, Response::Error { .. }));
    }

    #[test]
    fn test_paused_runner_refuses_gestures() {
        let mut runner = runner();
        runner.handle(Command::SetPhase {
            phase: GamePhase::Paused,
        });
        let response = runner.handle(Command::SelectBuilding { type_id: 1 });
        assert!(matches!(
            response,
            Response::Error { code: Some(ref code), .. } if code == "not_playing"
        ));
    }

    #[test]
    fn test_reset_restores_economy() {
        let mut runner = runner();
        let empty = runner.board().state_hash();
        runner.handle(Command::SelectBuilding { type_id: 1 });
        runner.handle(Command::PointerUp { x: 0.0, y: 0.0 });

        assert_eq!(runner.handle(Command::Reset), Response::ack("reset"));
        assert_eq!(runner.treasury().currency, 100);
        assert_eq!(runner.board().state_hash(), empty);
    }

    #[test]
    fn test_run_loop_over_json_lines() {
        let mut runner = runner();
        let input = "\
{\"cmd\":\"select_building\",\"type_id\":1}

{\"cmd\":\"pointer_up\",\"x\":0.0,\"y\":0.0}
not json
{\"cmd\":\"quit\"}
{\"cmd\":\"hash\"}
";
        let mut output = Vec::new();
        runner.run(input.as_bytes(), &mut output).unwrap();

        let lines: Vec<&str> = std::str::from_utf8(&output).unwrap().lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains(r#""type":"ready""#));
        assert!(lines[2].contains("building_placed"));
        assert!(lines[3].contains("Parse error"));
        assert_eq!(lines[4], r#"{"type":"bye"}"#);
        assert!(runner.is_finished());
    }

    #[test]
    fn test_auto_state_output() {
        let scenario = Scenario::from_ron_str(OUTPOST).unwrap();
        let config = HeadlessConfig {
            auto_state_output: true,
        };
        let mut runner = HeadlessRunner::with_config(scenario, config).unwrap();
        let mut output = Vec::new();
        runner
            .run("{\"cmd\":\"cancel_build\"}\n".as_bytes(), &mut output)
            .unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains(r#""type":"state""#));
    }

    #[test]
    fn test_verify_script_is_deterministic() {
        let scenario = Scenario::from_ron_str(OUTPOST).unwrap();
        let commands = vec![
            Command::SelectBuilding { type_id: 1 },
            Command::PointerUp { x: 0.0, y: 0.0 },
            Command::SelectBuilding { type_id: 2 },
            Command::PointerUp { x: 1000.0, y: 0.0 },
            Command::PointerDown { x: 50.0, y: 50.0 },
            Command::Tick { dt_ms: 16, count: 40 },
            Command::PointerUp { x: -150.0, y: 150.0 },
        ];
        let report = verify_script(&scenario, &commands, 3).unwrap();
        assert_eq!(report.hashes.len(), 3);
        assert!(report.is_deterministic());
    }
}
