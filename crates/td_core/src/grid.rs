//! Occupancy grids.
//!
//! Two grids coexist at runtime: a general grid for production buildings and
//! a denser grid for walls and towers. Both are instances of
//! [`OccupancyGrid`], differing only in [`GridGeometry`].
//!
//! Occupants can die or be moved without going through the grid, so every
//! occupancy query reconciles the stored cell against the live scene via an
//! [`OccupantLookup`] and clears cells whose occupant is gone.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::math::{Fixed, Vec2Fixed};

// ============================================================================
// Coordinates and Footprints
// ============================================================================

/// Integer cell coordinates within a grid.
///
/// `y` grows "upward": the cell above `(x, y)` is `(x, y + 1)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct CellCoord {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl CellCoord {
    /// Create a new cell coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Offset by a signed delta, returning `None` on underflow/overflow.
    #[must_use]
    pub fn offset(self, dx: i64, dy: i64) -> Option<Self> {
        let x = u32::try_from(i64::from(self.x) + dx).ok()?;
        let y = u32::try_from(i64::from(self.y) + dy).ok()?;
        Some(Self { x, y })
    }
}

/// Size of a building in grid cells, anchored at its lowest cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    /// Width in cells.
    pub width: u32,
    /// Height in cells.
    pub height: u32,
}

impl Footprint {
    /// Create a new footprint.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A single cell.
    pub const SINGLE: Self = Self::new(1, 1);

    /// Two vertically adjacent cells, used by tower-class buildings.
    pub const TOWER: Self = Self::new(1, 2);

    /// Total number of cells covered.
    #[must_use]
    pub const fn cell_count(&self) -> u32 {
        self.width * self.height
    }

    /// Cells covered when anchored at `anchor`, anchor first.
    ///
    /// Cells that would overflow `u32` are skipped; bounds checks against a
    /// concrete grid happen in [`OccupancyGrid`].
    pub fn cells(self, anchor: CellCoord) -> impl Iterator<Item = CellCoord> {
        (0..self.height).flat_map(move |dy| {
            (0..self.width).filter_map(move |dx| {
                Some(CellCoord::new(
                    anchor.x.checked_add(dx)?,
                    anchor.y.checked_add(dy)?,
                ))
            })
        })
    }
}

impl Default for Footprint {
    fn default() -> Self {
        Self::SINGLE
    }
}

/// Which of the two runtime grids a building lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    /// Coarse grid for production buildings.
    General,
    /// Dense grid reserved for walls and towers.
    Dense,
}

impl GridKind {
    /// Human-readable name used in logs and config errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Dense => "dense",
        }
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Size and world placement of a grid.
///
/// The grid is centred on `center`; its lower-left corner sits at
/// `center - total_size / 2` where
/// `total_size = (cell_size + cell_spacing) * count - cell_spacing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridGeometry {
    /// Grid width in cells.
    pub width: u32,
    /// Grid height in cells.
    pub height: u32,
    /// Edge length of one cell in world units.
    #[serde(with = "crate::math::fixed_serde")]
    pub cell_size: Fixed,
    /// Gap between neighbouring cells in world units.
    #[serde(with = "crate::math::fixed_serde")]
    pub cell_spacing: Fixed,
    /// World position of the grid's centre.
    pub center: Vec2Fixed,
}

impl GridGeometry {
    /// Create geometry centred on the world origin with no spacing.
    #[must_use]
    pub fn new(width: u32, height: u32, cell_size: Fixed) -> Self {
        Self {
            width,
            height,
            cell_size,
            cell_spacing: Fixed::ZERO,
            center: Vec2Fixed::ZERO,
        }
    }

    /// Set the gap between cells.
    #[must_use]
    pub fn with_spacing(mut self, cell_spacing: Fixed) -> Self {
        self.cell_spacing = cell_spacing;
        self
    }

    /// Set the world position of the grid centre.
    #[must_use]
    pub fn with_center(mut self, center: Vec2Fixed) -> Self {
        self.center = center;
        self
    }

    /// Distance between the origins of neighbouring cells.
    #[must_use]
    pub fn step(&self) -> Fixed {
        self.cell_size + self.cell_spacing
    }

    /// Total extent of the grid in world units.
    #[must_use]
    pub fn total_size(&self) -> Vec2Fixed {
        let step = self.step();
        Vec2Fixed::new(
            step * Fixed::from_num(self.width) - self.cell_spacing,
            step * Fixed::from_num(self.height) - self.cell_spacing,
        )
    }

    /// World position of the grid's lower-left corner.
    #[must_use]
    pub fn origin(&self) -> Vec2Fixed {
        let total = self.total_size();
        let two = Fixed::from_num(2);
        Vec2Fixed::new(self.center.x - total.x / two, self.center.y - total.y / two)
    }
}

// ============================================================================
// Cells
// ============================================================================

/// State of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OccupancyCell {
    /// Nothing stands here.
    #[default]
    Free,
    /// Held by a building instance.
    Occupied(EntityId),
}

impl OccupancyCell {
    /// The stored occupant, if any.
    #[must_use]
    pub const fn occupant(self) -> Option<EntityId> {
        match self {
            Self::Free => None,
            Self::Occupied(id) => Some(id),
        }
    }
}

/// Read access to the live scene used to reconcile stale cells.
pub trait OccupantLookup {
    /// Whether the entity still exists, is alive and is active in the scene.
    fn is_alive(&self, id: EntityId) -> bool;

    /// Current world position of the entity.
    fn position_of(&self, id: EntityId) -> Option<Vec2Fixed>;
}

/// Result of checking a footprint against a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootprintCheck {
    /// Every cell is in bounds and free.
    Free,
    /// At least one cell lies outside the grid.
    OutOfBounds,
    /// A cell is held by a live occupant.
    Blocked {
        /// First blocking cell, in anchor-first order.
        cell: CellCoord,
        /// The occupant as recorded in the cell.
        occupant: EntityId,
    },
}

impl FootprintCheck {
    /// Whether the footprint can be occupied.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self, Self::Free)
    }
}

// ============================================================================
// Occupancy Grid
// ============================================================================

/// Default plausible distance, in cells, between an occupant and a cell it holds.
pub const DEFAULT_OCCUPANT_TOLERANCE_CELLS: u32 = 2;

/// Rectangular occupancy grid over a fixed world area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccupancyGrid {
    kind: GridKind,
    geometry: GridGeometry,
    /// Cell data stored in row-major order.
    cells: Vec<OccupancyCell>,
    /// Maximum occupant distance from a cell centre before the cell is stale.
    #[serde(with = "crate::math::fixed_serde")]
    occupant_tolerance: Fixed,
}

impl OccupancyGrid {
    /// Create a grid with all cells free.
    ///
    /// # Panics
    ///
    /// Panics if the grid has no cells or `cell_size` is not positive.
    /// [`crate::config::GridConfig::to_geometry`] rejects such geometry first.
    #[must_use]
    pub fn new(kind: GridKind, geometry: GridGeometry) -> Self {
        assert!(geometry.width > 0, "OccupancyGrid width must be positive");
        assert!(geometry.height > 0, "OccupancyGrid height must be positive");
        assert!(
            geometry.cell_size > Fixed::ZERO,
            "OccupancyGrid cell_size must be positive"
        );

        let cell_count = (geometry.width as usize) * (geometry.height as usize);
        let occupant_tolerance = geometry.step() * Fixed::from_num(DEFAULT_OCCUPANT_TOLERANCE_CELLS);
        Self {
            kind,
            geometry,
            cells: vec![OccupancyCell::Free; cell_count],
            occupant_tolerance,
        }
    }

    /// Set the plausible occupant distance, measured in cells.
    #[must_use]
    pub fn with_occupant_tolerance(mut self, cells: u32) -> Self {
        self.occupant_tolerance = self.geometry.step() * Fixed::from_num(cells.max(1));
        self
    }

    /// Which runtime grid this is.
    #[must_use]
    pub const fn kind(&self) -> GridKind {
        self.kind
    }

    /// Geometry of this grid.
    #[must_use]
    pub const fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.geometry.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.geometry.height
    }

    #[inline]
    fn index(&self, cell: CellCoord) -> Option<usize> {
        self.in_bounds(cell)
            .then(|| (cell.y as usize) * (self.geometry.width as usize) + (cell.x as usize))
    }

    /// Check if coordinates are within grid bounds.
    #[must_use]
    pub const fn in_bounds(&self, cell: CellCoord) -> bool {
        cell.x < self.geometry.width && cell.y < self.geometry.height
    }

    /// Check if every cell of a footprint is within grid bounds.
    #[must_use]
    pub fn footprint_in_bounds(&self, anchor: CellCoord, footprint: Footprint) -> bool {
        let right = u64::from(anchor.x) + u64::from(footprint.width);
        let top = u64::from(anchor.y) + u64::from(footprint.height);
        footprint.width > 0
            && footprint.height > 0
            && right <= u64::from(self.geometry.width)
            && top <= u64::from(self.geometry.height)
    }

    /// Convert a world position to cell coordinates.
    ///
    /// Returns `None` if the position is outside the grid.
    #[must_use]
    pub fn world_to_cell(&self, pos: Vec2Fixed) -> Option<CellCoord> {
        let origin = self.geometry.origin();
        let step = self.geometry.step();

        let x = (pos.x.saturating_sub(origin.x) / step).floor().to_num::<i64>();
        let y = (pos.y.saturating_sub(origin.y) / step).floor().to_num::<i64>();

        let cell = CellCoord::new(u32::try_from(x).ok()?, u32::try_from(y).ok()?);
        self.in_bounds(cell).then_some(cell)
    }

    /// World position of a cell's centre.
    ///
    /// Returns `None` if the cell is outside the grid.
    #[must_use]
    pub fn cell_to_world(&self, cell: CellCoord) -> Option<Vec2Fixed> {
        if !self.in_bounds(cell) {
            return None;
        }
        let origin = self.geometry.origin();
        let step = self.geometry.step();
        let half = self.geometry.cell_size / Fixed::from_num(2);
        Some(Vec2Fixed::new(
            origin.x + step * Fixed::from_num(cell.x) + half,
            origin.y + step * Fixed::from_num(cell.y) + half,
        ))
    }

    /// World position of the centre of a whole footprint.
    ///
    /// Returns `None` if any part of the footprint is outside the grid.
    #[must_use]
    pub fn footprint_center(&self, anchor: CellCoord, footprint: Footprint) -> Option<Vec2Fixed> {
        if !self.footprint_in_bounds(anchor, footprint) {
            return None;
        }
        let last = CellCoord::new(
            anchor.x + footprint.width - 1,
            anchor.y + footprint.height - 1,
        );
        Some(self.cell_to_world(anchor)?.midpoint(self.cell_to_world(last)?))
    }

    /// Raw stored occupant of a cell, without reconciliation.
    ///
    /// Out-of-range coordinates return `None`.
    #[must_use]
    pub fn occupant_at(&self, cell: CellCoord) -> Option<EntityId> {
        self.index(cell).and_then(|i| self.cells[i].occupant())
    }

    /// Opposite corners of the rectangle of cells `occupant` holds around `cell`.
    ///
    /// Footprints are committed whole, so the row and column runs through any
    /// held cell span the full footprint.
    fn held_extent(&self, cell: CellCoord, occupant: EntityId) -> (CellCoord, CellCoord) {
        let holds = |x: u32, y: u32| self.occupant_at(CellCoord::new(x, y)) == Some(occupant);
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (cell.x, cell.x, cell.y, cell.y);
        while min_x > 0 && holds(min_x - 1, cell.y) {
            min_x -= 1;
        }
        while holds(max_x + 1, cell.y) {
            max_x += 1;
        }
        while min_y > 0 && holds(cell.x, min_y - 1) {
            min_y -= 1;
        }
        while holds(cell.x, max_y + 1) {
            max_y += 1;
        }
        (CellCoord::new(min_x, min_y), CellCoord::new(max_x, max_y))
    }

    /// Whether a stored occupant still plausibly holds `cell`.
    ///
    /// Distance is measured from the centre of the footprint the occupant
    /// holds, not from `cell`, so corner cells of large buildings stay held.
    fn occupant_holds<L: OccupantLookup + ?Sized>(
        &self,
        cell: CellCoord,
        occupant: EntityId,
        lookup: &L,
    ) -> bool {
        if !lookup.is_alive(occupant) {
            return false;
        }
        let (first, last) = self.held_extent(cell, occupant);
        let home = self
            .cell_to_world(first)
            .zip(self.cell_to_world(last))
            .map(|(a, b)| a.midpoint(b));
        match (lookup.position_of(occupant), home) {
            (Some(position), Some(center)) => position.within(center, self.occupant_tolerance),
            _ => false,
        }
    }

    /// Check whether a cell is occupied by a live occupant.
    ///
    /// Out-of-range coordinates count as occupied. A cell whose occupant has
    /// died or wandered away is cleared and reported free.
    pub fn is_occupied<L: OccupantLookup + ?Sized>(&mut self, cell: CellCoord, lookup: &L) -> bool {
        let Some(index) = self.index(cell) else {
            return true;
        };
        let OccupancyCell::Occupied(occupant) = self.cells[index] else {
            return false;
        };
        if self.occupant_holds(cell, occupant, lookup) {
            return true;
        }

        tracing::debug!(
            grid = self.kind.name(),
            x = cell.x,
            y = cell.y,
            occupant,
            "Clearing stale cell"
        );
        self.cells[index] = OccupancyCell::Free;
        false
    }

    /// Like [`Self::is_occupied`], but a cell held by `excluding` reports free.
    pub fn is_occupied_by_other<L: OccupantLookup + ?Sized>(
        &mut self,
        cell: CellCoord,
        excluding: EntityId,
        lookup: &L,
    ) -> bool {
        if self.in_bounds(cell) && self.occupant_at(cell) == Some(excluding) {
            return false;
        }
        self.is_occupied(cell, lookup)
    }

    /// Mark a cell as held by `occupant`.
    ///
    /// Fails if the cell is out of range or held by a different live occupant.
    pub fn occupy<L: OccupantLookup + ?Sized>(
        &mut self,
        cell: CellCoord,
        occupant: EntityId,
        lookup: &L,
    ) -> bool {
        if self.is_occupied_by_other(cell, occupant, lookup) {
            return false;
        }
        match self.index(cell) {
            Some(index) => {
                self.cells[index] = OccupancyCell::Occupied(occupant);
                true
            }
            None => false,
        }
    }

    /// Clear a cell unconditionally. Out-of-range coordinates are ignored.
    pub fn release(&mut self, cell: CellCoord) {
        if let Some(index) = self.index(cell) {
            self.cells[index] = OccupancyCell::Free;
        }
    }

    /// Check a footprint against the grid, ignoring cells held by `excluding`.
    pub fn check_footprint<L: OccupantLookup + ?Sized>(
        &mut self,
        anchor: CellCoord,
        footprint: Footprint,
        excluding: Option<EntityId>,
        lookup: &L,
    ) -> FootprintCheck {
        if !self.footprint_in_bounds(anchor, footprint) {
            return FootprintCheck::OutOfBounds;
        }
        for cell in footprint.cells(anchor) {
            let blocked = match excluding {
                Some(id) => self.is_occupied_by_other(cell, id, lookup),
                None => self.is_occupied(cell, lookup),
            };
            if blocked {
                if let Some(occupant) = self.occupant_at(cell) {
                    return FootprintCheck::Blocked { cell, occupant };
                }
                return FootprintCheck::OutOfBounds;
            }
        }
        FootprintCheck::Free
    }

    /// Occupy every cell of a footprint, or none of them.
    pub fn occupy_footprint<L: OccupantLookup + ?Sized>(
        &mut self,
        anchor: CellCoord,
        footprint: Footprint,
        occupant: EntityId,
        lookup: &L,
    ) -> bool {
        if !self
            .check_footprint(anchor, footprint, Some(occupant), lookup)
            .is_free()
        {
            return false;
        }

        let mut claimed = Vec::with_capacity(footprint.cell_count() as usize);
        for cell in footprint.cells(anchor) {
            if !self.occupy(cell, occupant, lookup) {
                for done in claimed {
                    self.release(done);
                }
                return false;
            }
            claimed.push(cell);
        }
        true
    }

    /// Clear every cell of a footprint that is in range.
    pub fn release_footprint(&mut self, anchor: CellCoord, footprint: Footprint) {
        for cell in footprint.cells(anchor) {
            self.release(cell);
        }
    }

    /// Breadth-first search for the nearest free cell.
    ///
    /// Starts at the cell under `from` and expands over 4-directional
    /// neighbours. Returns `None` if `from` is outside the grid or every
    /// reachable cell is taken.
    pub fn find_nearest_unoccupied_cell<L: OccupantLookup + ?Sized>(
        &mut self,
        from: Vec2Fixed,
        lookup: &L,
    ) -> Option<CellCoord> {
        self.find_nearest_free_anchor(from, Footprint::SINGLE, None, lookup)
    }

    /// Breadth-first search for the nearest anchor whose whole footprint is free.
    pub fn find_nearest_free_anchor<L: OccupantLookup + ?Sized>(
        &mut self,
        from: Vec2Fixed,
        footprint: Footprint,
        excluding: Option<EntityId>,
        lookup: &L,
    ) -> Option<CellCoord> {
        const NEIGHBOURS: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

        let start = self.world_to_cell(from)?;
        let mut visited = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();

        if let Some(index) = self.index(start) {
            visited[index] = true;
            queue.push_back(start);
        }

        while let Some(cell) = queue.pop_front() {
            if self
                .check_footprint(cell, footprint, excluding, lookup)
                .is_free()
            {
                return Some(cell);
            }
            for (dx, dy) in NEIGHBOURS {
                let Some(next) = cell.offset(dx, dy) else {
                    continue;
                };
                if let Some(index) = self.index(next) {
                    if !visited[index] {
                        visited[index] = true;
                        queue.push_back(next);
                    }
                }
            }
        }

        None
    }

    /// Reinitialise every cell to free.
    pub fn reset(&mut self) {
        self.cells.fill(OccupancyCell::Free);
    }

    /// Raw occupied cells in row-major order.
    pub fn occupied_cells(&self) -> impl Iterator<Item = (CellCoord, EntityId)> + '_ {
        let width = self.geometry.width;
        self.cells.iter().enumerate().filter_map(move |(i, cell)| {
            let occupant = cell.occupant()?;
            let i = u32::try_from(i).ok()?;
            Some((CellCoord::new(i % width, i / width), occupant))
        })
    }

    /// Feed the grid contents into a hasher in deterministic order.
    pub fn hash_into<H: Hasher>(&self, hasher: &mut H) {
        self.kind.hash(hasher);
        self.geometry.width.hash(hasher);
        self.geometry.height.hash(hasher);
        self.cells.hash(hasher);
    }
}

// ============================================================================
// Tests
// ============================================================================
