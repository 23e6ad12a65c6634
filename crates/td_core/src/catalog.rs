//! Building type descriptors and the building-type registry.
//!
//! Types are loaded once at startup, usually from RON, and never change
//! afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::grid::{Footprint, GridKind};

/// Unique identifier for building types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildingTypeId(pub u32);

impl BuildingTypeId {
    /// Create a new building type ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Broad category of a building, deciding grid and placement rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingClass {
    /// Economy and production buildings on the general grid.
    Production,
    /// Single-cell walls on the dense grid. May rest off-grid.
    Wall,
    /// Two-cell towers on the dense grid. Consume population.
    Tower,
}

impl BuildingClass {
    /// Grid this class is placed on.
    #[must_use]
    pub const fn grid(self) -> GridKind {
        match self {
            Self::Production => GridKind::General,
            Self::Wall | Self::Tower => GridKind::Dense,
        }
    }

    /// Footprint used when the data does not specify one.
    #[must_use]
    pub const fn default_footprint(self) -> Footprint {
        match self {
            Self::Production | Self::Wall => Footprint::SINGLE,
            Self::Tower => Footprint::TOWER,
        }
    }

    /// Whether placement must check population headroom.
    #[must_use]
    pub const fn uses_population(self) -> bool {
        matches!(self, Self::Tower)
    }

    /// Whether the same-class separation rule applies.
    #[must_use]
    pub const fn uses_separation(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Whether a dragged building of this class may be dropped off the grid.
    #[must_use]
    pub const fn may_rest_off_grid(self) -> bool {
        matches!(self, Self::Wall)
    }
}

/// Static descriptor of a building type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingType {
    /// Unique identifier for this building type.
    pub id: BuildingTypeId,
    /// Display name.
    pub name: String,
    /// Placement category.
    pub class: BuildingClass,
    /// Cells covered, anchored at the lowest cell.
    pub footprint: Footprint,
    /// Currency cost to place.
    pub base_cost: i32,
    /// Population consumed (tower-class only).
    pub population_cost: u32,
    /// Maximum health of a fresh instance.
    pub health: i32,
}

impl BuildingType {
    /// Create a building type with the class's default footprint.
    #[must_use]
    pub fn new(id: BuildingTypeId, name: impl Into<String>, class: BuildingClass, base_cost: i32) -> Self {
        Self {
            id,
            name: name.into(),
            class,
            footprint: class.default_footprint(),
            base_cost,
            population_cost: 0,
            health: 100,
        }
    }

    /// Override the footprint.
    #[must_use]
    pub fn with_footprint(mut self, footprint: Footprint) -> Self {
        self.footprint = footprint;
        self
    }

    /// Set the population cost.
    #[must_use]
    pub fn with_population(mut self, population_cost: u32) -> Self {
        self.population_cost = population_cost;
        self
    }

    /// Set the maximum health.
    #[must_use]
    pub fn with_health(mut self, health: i32) -> Self {
        self.health = health;
        self
    }

    /// Grid this building is placed on.
    #[must_use]
    pub const fn grid(&self) -> GridKind {
        self.class.grid()
    }
}

/// Data-driven building definition.
///
/// # Example RON
///
/// ```ron
/// BuildingData(
///     id: 3,
///     name: "Arrow Tower",
///     class: tower,
///     cost: 120,
///     population: 1,
///     health: 400,
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingData {
    /// Unique numeric identifier.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Placement category.
    pub class: BuildingClass,
    /// Footprint as (width, height) in cells.
    #[serde(default)]
    pub footprint: Option<(u32, u32)>,
    /// Currency cost.
    pub cost: i32,
    /// Population consumed.
    #[serde(default)]
    pub population: u32,
    /// Maximum health.
    #[serde(default = "default_health")]
    pub health: i32,
}

/// Default health for buildings without explicit health.
const fn default_health() -> i32 {
    100
}

impl BuildingData {
    /// Validate and convert into a [`BuildingType`].
    pub fn into_building_type(self) -> Result<BuildingType, ConfigError> {
        let footprint = self
            .footprint
            .map_or(self.class.default_footprint(), |(w, h)| Footprint::new(w, h));

        let invalid = |message: &str| ConfigError::InvalidBuilding {
            id: self.id,
            message: message.to_string(),
        };

        if footprint.width == 0 || footprint.height == 0 {
            return Err(invalid("footprint must cover at least one cell"));
        }
        if self.class == BuildingClass::Tower && footprint != Footprint::TOWER {
            return Err(invalid("towers occupy exactly two vertically adjacent cells"));
        }
        if self.class == BuildingClass::Wall && footprint != Footprint::SINGLE {
            return Err(invalid("walls occupy exactly one cell"));
        }
        if self.cost < 0 {
            return Err(invalid("cost must not be negative"));
        }
        if self.health <= 0 {
            return Err(invalid("health must be positive"));
        }

        Ok(BuildingType {
            id: BuildingTypeId::new(self.id),
            name: self.name,
            class: self.class,
            footprint,
            base_cost: self.cost,
            population_cost: self.population,
            health: self.health,
        })
    }
}

/// Registry of every placeable building type.
#[derive(Debug, Clone, Default)]
pub struct BuildingCatalog {
    types: BTreeMap<BuildingTypeId, BuildingType>,
}

impl BuildingCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a building type.
    ///
    /// Idempotent: a second registration of the same id is ignored and
    /// returns `false`.
    pub fn register(&mut self, building: BuildingType) -> bool {
        if self.types.contains_key(&building.id) {
            tracing::debug!(id = building.id.0, "Building type already registered");
            return false;
        }
        self.types.insert(building.id, building);
        true
    }

    /// Look up a building type.
    #[must_use]
    pub fn get(&self, id: BuildingTypeId) -> Option<&BuildingType> {
        self.types.get(&id)
    }

    /// Look up a building type by display name (case-insensitive).
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&BuildingType> {
        self.types
            .values()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// All building types in id order.
    pub fn iter(&self) -> impl Iterator<Item = &BuildingType> {
        self.types.values()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Build a catalog from data definitions.
    ///
    /// Unlike [`Self::register`], duplicate ids here are a data error.
    pub fn from_data(data: Vec<BuildingData>) -> Result<Self, ConfigError> {
        let mut catalog = Self::new();
        for entry in data {
            let id = entry.id;
            if !catalog.register(entry.into_building_type()?) {
                return Err(ConfigError::DuplicateBuilding(id));
            }
        }
        Ok(catalog)
    }

    /// Parse a RON list of [`BuildingData`].
    pub fn from_ron_str(ron: &str) -> Result<Self, ConfigError> {
        let data: Vec<BuildingData> = ron::from_str(ron)?;
        Self::from_data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tower_data() -> BuildingData {
        BuildingData {
            id: 3,
            name: "Arrow Tower".to_string(),
            class: BuildingClass::Tower,
            footprint: None,
            cost: 120,
            population: 1,
            health: 400,
        }
    }

    #[test]
    fn test_class_rules() {
        assert_eq!(BuildingClass::Production.grid(), GridKind::General);
        assert_eq!(BuildingClass::Wall.grid(), GridKind::Dense);
        assert_eq!(BuildingClass::Tower.grid(), GridKind::Dense);
        assert!(BuildingClass::Tower.uses_population());
        assert!(!BuildingClass::Wall.uses_population());
        assert!(BuildingClass::Production.uses_separation());
        assert!(!BuildingClass::Tower.uses_separation());
        assert!(BuildingClass::Wall.may_rest_off_grid());
        assert!(!BuildingClass::Tower.may_rest_off_grid());
    }

    #[test]
    fn test_tower_defaults_to_two_cells() {
        let building = tower_data().into_building_type().unwrap();
        assert_eq!(building.footprint, Footprint::TOWER);
        assert_eq!(building.population_cost, 1);
    }

    #[test]
    fn test_tower_with_wrong_footprint_rejected() {
        let mut data = tower_data();
        data.footprint = Some((2, 2));
        assert!(matches!(
            data.into_building_type(),
            Err(ConfigError::InvalidBuilding { id: 3, .. })
        ));
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut catalog = BuildingCatalog::new();
        let first = BuildingType::new(BuildingTypeId::new(1), "Farm", BuildingClass::Production, 50);
        let second = BuildingType::new(BuildingTypeId::new(1), "Mill", BuildingClass::Production, 80);
        assert!(catalog.register(first));
        assert!(!catalog.register(second));
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(BuildingTypeId::new(1)).unwrap().name, "Farm");
    }

    #[test]
    fn test_from_ron_str() {
        let ron = r#"[
            BuildingData(id: 1, name: "Barracks", class: production, footprint: Some((2, 2)), cost: 150),
            BuildingData(id: 2, name: "Stone Wall", class: wall, cost: 10),
            BuildingData(id: 3, name: "Arrow Tower", class: tower, cost: 120, population: 1),
        ]"#;
        let catalog = BuildingCatalog::from_ron_str(ron).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.get(BuildingTypeId::new(1)).unwrap().footprint,
            Footprint::new(2, 2)
        );
        assert_eq!(catalog.find_by_name("stone wall").unwrap().id, BuildingTypeId::new(2));
    }

    #[test]
    fn test_duplicate_ids_in_data_rejected() {
        let result = BuildingCatalog::from_data(vec![tower_data(), tower_data()]);
        assert!(matches!(result, Err(ConfigError::DuplicateBuilding(3))));
    }
}
