//! Scenario loading and configuration.
//!
//! Scenarios define the starting state of a headless session: board
//! geometry, the building catalog, the starting economy and any buildings
//! already standing when the session opens.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use td_core::board::Board;
use td_core::catalog::{BuildingCatalog, BuildingClass, BuildingData, BuildingTypeId};
use td_core::collaborators::Treasury;
use td_core::config::BoardConfig;
use td_core::error::{ConfigError, PlacementError};
use td_core::grid::CellCoord;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Board config or catalog rejected.
    #[error("Invalid scenario data: {0}")]
    Config(#[from] ConfigError),
    /// A prebuilt building could not be placed.
    #[error("Prebuilt building {type_id} at ({x}, {y}) could not be placed: {source}")]
    Prebuilt {
        /// Type of the building.
        type_id: u32,
        /// Anchor x.
        x: u32,
        /// Anchor y.
        y: u32,
        /// Why placement failed.
        source: PlacementError,
    },
}

/// A building standing on the board when the session starts.
///
/// Prebuilt buildings are free and skip economy checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prebuilt {
    /// Building type id.
    pub type_id: u32,
    /// Anchor cell on the type's grid.
    pub cell: (u32, u32),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Grids, gesture tuning and pool sizing.
    #[serde(default)]
    pub board: BoardConfig,
    /// Placeable building types.
    pub buildings: Vec<BuildingData>,
    /// Currency at the start.
    #[serde(default = "default_currency")]
    pub starting_currency: i32,
    /// Population cap.
    #[serde(default = "default_population_cap")]
    pub population_cap: u32,
    /// Buildings already standing.
    #[serde(default)]
    pub prebuilt: Vec<Prebuilt>,
}

const fn default_currency() -> i32 {
    500
}

const fn default_population_cap() -> u32 {
    10
}

impl Default for Scenario {
    fn default() -> Self {
        Self::meadow()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Default grids with a farm, a wall and a tower.
    #[must_use]
    pub fn meadow() -> Self {
        let building = |id: u32, name: &str, class: BuildingClass, cost: i32, population: u32| BuildingData {
            id,
            name: name.to_string(),
            class,
            footprint: None,
            cost,
            population,
            health: 100,
        };
        Self {
            name: "Meadow".to_string(),
            description: "Stock grids with one building of each class".to_string(),
            board: BoardConfig::default(),
            buildings: vec![
                building(1, "Farm", BuildingClass::Production, 50, 0),
                building(2, "Wall", BuildingClass::Wall, 10, 0),
                building(3, "Arrow Tower", BuildingClass::Tower, 120, 1),
            ],
            starting_currency: default_currency(),
            population_cap: default_population_cap(),
            prebuilt: Vec::new(),
        }
    }

    /// Validate the catalog.
    pub fn catalog(&self) -> Result<BuildingCatalog, ScenarioError> {
        Ok(BuildingCatalog::from_data(self.buildings.clone())?)
    }

    /// Starting economy.
    #[must_use]
    pub fn treasury(&self) -> Treasury {
        Treasury::new(self.starting_currency, self.population_cap)
    }

    /// Build the board and place every prebuilt building.
    pub fn build_board(&self) -> Result<Board, ScenarioError> {
        let mut board = Board::new(self.board.clone(), self.catalog()?)?;
        self.place_prebuilt(&mut board)?;
        tracing::info!(
            scenario = %self.name,
            buildings = board.placed_count(),
            "Scenario board built"
        );
        Ok(board)
    }

    /// Place every prebuilt building on `board`.
    pub fn place_prebuilt(&self, board: &mut Board) -> Result<(), ScenarioError> {
        for prebuilt in &self.prebuilt {
            let (x, y) = prebuilt.cell;
            board
                .spawn_building(BuildingTypeId::new(prebuilt.type_id), CellCoord::new(x, y))
                .map_err(|source| ScenarioError::Prebuilt {
                    type_id: prebuilt.type_id,
                    x,
                    y,
                    source,
                })?;
        }
        Ok(())
    }
}
