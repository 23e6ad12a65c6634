//! # TD Core
//!
//! Deterministic building placement core for the tower-defense client.
//!
//! This crate contains **only** placement and occupancy logic:
//! - No rendering
//! - No IO (RON parsing works on strings handed in by the caller)
//! - No floating-point math (uses fixed-point)
//!
//! Presentation layers read the state exposed here (previews, highlights,
//! press indicators) and feed pointer events and frame ticks back in.
//!
//! ## Crate Structure
//!
//! - [`grid`] - Occupancy grids, cell coordinates and footprints
//! - [`catalog`] - Building type descriptors and the type registry
//! - [`entity`] - Scene-side building instances
//! - [`pool`] - Per-type instance reuse pool
//! - [`board`] - The two grids, the pool and all placed buildings
//! - [`placement`] - Build mode for new buildings
//! - [`relocation`] - Long-press pick up, drag, drop and swap
//! - [`interaction`] - Gesture ownership and game-phase cancellation
//! - [`collaborators`] - Economy, selection and notification seams
//! - [`config`] - RON configuration
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod board;
pub mod catalog;
pub mod collaborators;
pub mod config;
pub mod entity;
pub mod error;
pub mod grid;
pub mod interaction;
pub mod math;
pub mod placement;
pub mod pool;
pub mod relocation;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::board::{Board, PlacedBuilding, RemovalCause};
    pub use crate::catalog::{BuildingCatalog, BuildingClass, BuildingType, BuildingTypeId};
    pub use crate::collaborators::{
        Collaborators, Economy, EventLog, Notifier, PlacementEvent, Selection, SelectionSet,
        Treasury, UnitInfo,
    };
    pub use crate::config::{BoardConfig, GridConfig};
    pub use crate::entity::{EntityId, EntityStore};
    pub use crate::error::{ConfigError, PlacementError};
    pub use crate::grid::{CellCoord, Footprint, GridKind, OccupancyGrid};
    pub use crate::interaction::{GamePhase, InteractionOutcome, InteractionRouter};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::placement::{PlacementController, Preview};
    pub use crate::pool::InstancePool;
    pub use crate::relocation::{RelocationController, RelocationOutcome};
}
