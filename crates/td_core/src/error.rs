//! Error types for placement and configuration.
//!
//! Every [`PlacementError`] is recoverable: the attempted operation leaves
//! grids, pools and the economy untouched, and the caller decides what to
//! show the player.

use thiserror::Error;

use crate::catalog::BuildingTypeId;
use crate::entity::EntityId;
use crate::grid::CellCoord;
use crate::math::Fixed;

/// Result type alias using [`PlacementError`].
pub type Result<T> = std::result::Result<T, PlacementError>;

/// Why a placement attempt was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// Building type was never registered.
    #[error("Unknown building type: {0:?}")]
    UnknownBuildingType(BuildingTypeId),

    /// Player cannot pay the base cost.
    #[error("Insufficient funds: need {required}")]
    InsufficientFunds {
        /// Cost of the building.
        required: i32,
    },

    /// Tower-class building would exceed the population cap.
    #[error("Population full: need {required} free slots")]
    PopulationFull {
        /// Population the building consumes.
        required: u32,
    },

    /// Footprint leaves the grid.
    #[error("Target is outside the grid")]
    OutOfBounds,

    /// A footprint cell is taken by another live building.
    #[error("Cell ({}, {}) is occupied", .cell.x, .cell.y)]
    Occupied {
        /// First blocking cell.
        cell: CellCoord,
        /// Entity holding the cell.
        occupant: Option<EntityId>,
    },

    /// Too close to another building of the same class.
    #[error("Too close to building {other}: {distance} < {minimum}")]
    TooClose {
        /// Nearest conflicting building.
        other: EntityId,
        /// Distance between the two centres.
        distance: Fixed,
        /// Required separation.
        minimum: Fixed,
    },

    /// Pointer was released without a candidate cell.
    #[error("No valid location")]
    NoCandidate,

    /// Build mode is not active.
    #[error("Build mode is not active")]
    NotActive,

    /// Another gesture owns the pointer.
    #[error("Another interaction is in progress")]
    GestureInProgress,

    /// The game is paused or over.
    #[error("Game is not in the playing phase")]
    NotPlaying,
}

impl PlacementError {
    /// Short machine-readable reason code for UI message lookup.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownBuildingType(_) => "unknown_type",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::PopulationFull { .. } => "population_full",
            Self::OutOfBounds => "out_of_bounds",
            Self::Occupied { .. } => "occupied",
            Self::TooClose { .. } => "too_close",
            Self::NoCandidate => "no_valid_location",
            Self::NotActive => "not_active",
            Self::GestureInProgress => "busy",
            Self::NotPlaying => "not_playing",
        }
    }
}

/// Errors raised while loading or validating configuration data.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// RON text failed to parse.
    #[error("Failed to parse RON: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Grid geometry is unusable.
    #[error("Invalid grid '{grid}': {message}")]
    InvalidGrid {
        /// Grid name.
        grid: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// A building definition is unusable.
    #[error("Invalid building '{id}': {message}")]
    InvalidBuilding {
        /// Building id.
        id: u32,
        /// What is wrong with it.
        message: String,
    },

    /// Two building definitions share an id.
    #[error("Duplicate building id: {0}")]
    DuplicateBuilding(u32),
}
