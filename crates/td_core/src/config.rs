//! Board configuration loaded from RON.
//!
//! Config files carry whole world units; they are converted to fixed-point
//! when the board is built.
//!
//! # Example RON
//!
//! ```ron
//! BoardConfig(
//!     general_grid: GridConfig(width: 10, height: 8, cell_size: 100),
//!     dense_grid: GridConfig(width: 15, height: 10, cell_size: 48, cell_spacing: 2),
//!     long_press: LongPressConfig(threshold_ms: 500, move_tolerance: 10, tap_tolerance: 4),
//!     separation: [(production, 60)],
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::catalog::BuildingClass;
use crate::error::ConfigError;
use crate::grid::{GridGeometry, GridKind, DEFAULT_OCCUPANT_TOLERANCE_CELLS};
use crate::math::{Fixed, Vec2Fixed};
use crate::pool::PoolConfig;
use crate::relocation::LongPressConfig;

/// Geometry of one grid in world units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
    /// Cell edge length.
    pub cell_size: i32,
    /// Gap between cells.
    #[serde(default)]
    pub cell_spacing: i32,
    /// World position of the grid centre.
    #[serde(default)]
    pub center: (i32, i32),
}

impl GridConfig {
    /// Default general grid: 10×8 cells of 100 units.
    #[must_use]
    pub const fn general_default() -> Self {
        Self {
            width: 10,
            height: 8,
            cell_size: 100,
            cell_spacing: 0,
            center: (0, 0),
        }
    }

    /// Default dense grid: 15×10 cells of 48 units.
    #[must_use]
    pub const fn dense_default() -> Self {
        Self {
            width: 15,
            height: 10,
            cell_size: 48,
            cell_spacing: 0,
            center: (0, 0),
        }
    }

    /// Validate and convert to fixed-point geometry.
    pub fn to_geometry(&self, kind: GridKind) -> Result<GridGeometry, ConfigError> {
        let invalid = |message: &str| ConfigError::InvalidGrid {
            grid: kind.name(),
            message: message.to_string(),
        };

        if self.width == 0 || self.height == 0 {
            return Err(invalid("grid must have at least one cell"));
        }
        if self.cell_size <= 0 {
            return Err(invalid("cell_size must be positive"));
        }
        if self.cell_spacing < 0 {
            return Err(invalid("cell_spacing must not be negative"));
        }
        // Keep the whole grid well inside the fixed-point range
        let step = i64::from(self.cell_size) + i64::from(self.cell_spacing);
        let extent = step * i64::from(self.width.max(self.height));
        if extent > i64::from(i32::MAX) / 4 {
            return Err(invalid("grid extent is too large"));
        }

        Ok(GridGeometry::new(self.width, self.height, Fixed::from_num(self.cell_size))
            .with_spacing(Fixed::from_num(self.cell_spacing))
            .with_center(Vec2Fixed::from_units(self.center.0, self.center.1)))
    }
}

/// Everything needed to build a [`crate::board::Board`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Grid for production buildings.
    #[serde(default = "GridConfig::general_default")]
    pub general_grid: GridConfig,
    /// Grid for walls and towers.
    #[serde(default = "GridConfig::dense_default")]
    pub dense_grid: GridConfig,
    /// Long-press gesture tuning.
    #[serde(default)]
    pub long_press: LongPressConfig,
    /// Instance pool sizing.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Minimum centre distance between two buildings of the same class.
    #[serde(default = "default_separation")]
    pub separation: Vec<(BuildingClass, i32)>,
    /// How far, in cells, an occupant may stray before its cell is freed.
    #[serde(default = "default_occupant_tolerance")]
    pub occupant_tolerance_cells: u32,
    /// Share of the base cost returned on sale, in percent.
    #[serde(default = "default_sell_refund")]
    pub sell_refund_percent: u32,
}

fn default_separation() -> Vec<(BuildingClass, i32)> {
    vec![(BuildingClass::Production, 60)]
}

const fn default_occupant_tolerance() -> u32 {
    DEFAULT_OCCUPANT_TOLERANCE_CELLS
}

const fn default_sell_refund() -> u32 {
    50
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            general_grid: GridConfig::general_default(),
            dense_grid: GridConfig::dense_default(),
            long_press: LongPressConfig::default(),
            pool: PoolConfig::default(),
            separation: default_separation(),
            occupant_tolerance_cells: default_occupant_tolerance(),
            sell_refund_percent: default_sell_refund(),
        }
    }
}

impl BoardConfig {
    /// Parse from RON text and validate.
    pub fn from_ron_str(ron: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(ron)?;
        config.validate()?;
        Ok(config)
    }

    /// Check both grids and the separation table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general_grid.to_geometry(GridKind::General)?;
        self.dense_grid.to_geometry(GridKind::Dense)?;
        if let Some((class, _)) = self.separation.iter().find(|(_, d)| *d < 0) {
            return Err(ConfigError::InvalidGrid {
                grid: class.grid().name(),
                message: format!("negative separation for {class:?}"),
            });
        }
        if self.sell_refund_percent > 100 {
            return Err(ConfigError::InvalidGrid {
                grid: GridKind::General.name(),
                message: "sell_refund_percent must not exceed 100".to_string(),
            });
        }
        Ok(())
    }

    /// Config for one grid.
    #[must_use]
    pub const fn grid(&self, kind: GridKind) -> &GridConfig {
        match kind {
            GridKind::General => &self.general_grid,
            GridKind::Dense => &self.dense_grid,
        }
    }

    /// Separation distance for a class, if one is configured.
    ///
    /// Only classes that use separation are ever checked.
    #[must_use]
    pub fn separation_for(&self, class: BuildingClass) -> Option<Fixed> {
        if !class.uses_separation() {
            return None;
        }
        self.separation
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, d)| Fixed::from_num(*d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BoardConfig::default();
        assert_eq!(config.general_grid.width, 10);
        assert_eq!(config.dense_grid.cell_size, 48);
        assert_eq!(config.long_press.threshold_ms, 500);
        assert_eq!(config.pool.prewarm, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = BoardConfig::from_ron_str(
            "BoardConfig(general_grid: GridConfig(width: 4, height: 4, cell_size: 100))",
        )
        .unwrap();
        assert_eq!(config.general_grid.width, 4);
        assert_eq!(config.dense_grid, GridConfig::dense_default());
        assert_eq!(config.occupant_tolerance_cells, 2);
    }

    #[test]
    fn test_zero_sized_grid_rejected() {
        let result = BoardConfig::from_ron_str(
            "BoardConfig(dense_grid: GridConfig(width: 0, height: 4, cell_size: 10))",
        );
        assert!(matches!(
            result,
            Err(ConfigError::InvalidGrid { grid: "dense", .. })
        ));
    }

    #[test]
    fn test_bad_cell_size_rejected() {
        let grid = GridConfig {
            cell_size: 0,
            ..GridConfig::general_default()
        };
        assert!(grid.to_geometry(GridKind::General).is_err());
    }

    #[test]
    fn test_geometry_conversion() {
        let grid = GridConfig {
            width: 4,
            height: 2,
            cell_size: 10,
            cell_spacing: 2,
            center: (100, -50),
        };
        let geometry = grid.to_geometry(GridKind::Dense).unwrap();
        assert_eq!(geometry.cell_spacing, Fixed::from_num(2));
        assert_eq!(geometry.center, Vec2Fixed::from_units(100, -50));
    }

    #[test]
    fn test_separation_only_for_production() {
        let config = BoardConfig {
            separation: vec![(BuildingClass::Production, 80), (BuildingClass::Wall, 30)],
            ..BoardConfig::default()
        };
        assert_eq!(
            config.separation_for(BuildingClass::Production),
            Some(Fixed::from_num(80))
        );
        assert_eq!(config.separation_for(BuildingClass::Wall), None);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            BoardConfig::from_ron_str("BoardConfig(("),
            Err(ConfigError::Parse(_))
        ));
    }
}
