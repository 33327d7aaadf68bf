//! Common types and traits for the integer cargo grid.
//!
//! All packing happens on a lattice of unit cells: positions, dimensions and
//! boxes are integers, so comparisons are exact and need no tolerances.

use std::fmt;

use crate::error::ValidationError;

/// A cell of the cargo lattice.
///
/// Used both for the minimum corner of a placement (its origin) and for
/// individual occupied cells.
///
/// # Examples
/// ```
/// use load_planner::types::Cell;
///
/// let origin = Cell::new(2, 0, 1);
/// assert_eq!(origin.as_tuple(), (2, 0, 1));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Cell {
    /// Creates a new cell.
    ///
    /// # Parameters
    /// * `x` - position along the length axis
    /// * `y` - position along the width axis
    /// * `z` - position along the height axis
    #[inline]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// The floor corner of the cargo.
    #[inline]
    pub const fn origin() -> Self {
        Self::new(0, 0, 0)
    }

    /// Converts to tuple format for serialization.
    #[inline]
    pub const fn as_tuple(&self) -> (u32, u32, u32) {
        (self.x, self.y, self.z)
    }
}

impl From<(u32, u32, u32)> for Cell {
    #[inline]
    fn from(tuple: (u32, u32, u32)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }
}

impl From<Cell> for (u32, u32, u32) {
    #[inline]
    fn from(cell: Cell) -> Self {
        cell.as_tuple()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Extent along the three axes, counted in grid cells.
///
/// Orientation is fixed: `length` runs along x, `width` along y and
/// `height` along z.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dims {
    pub length: u32,
    pub width: u32,
    pub height: u32,
}

impl Dims {
    #[inline]
    pub const fn new(length: u32, width: u32, height: u32) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    /// Number of cells enclosed.
    #[inline]
    pub fn volume(&self) -> u64 {
        u64::from(self.length) * u64::from(self.width) * u64::from(self.height)
    }

    /// Number of cells in the base layer.
    #[inline]
    pub fn base_area(&self) -> u64 {
        u64::from(self.length) * u64::from(self.width)
    }

    /// Checks every axis individually against a container's extent.
    #[inline]
    pub fn fits_within(&self, container: &Self) -> bool {
        self.length <= container.length
            && self.width <= container.width
            && self.height <= container.height
    }

    /// True when no axis is zero.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.length > 0 && self.width > 0 && self.height > 0
    }

    #[inline]
    pub const fn as_tuple(&self) -> (u32, u32, u32) {
        (self.length, self.width, self.height)
    }
}

impl From<(u32, u32, u32)> for Dims {
    #[inline]
    fn from(tuple: (u32, u32, u32)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }
}

impl fmt::Display for Dims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.length, self.width, self.height)
    }
}

/// Trait for objects with a fixed 3D extent.
pub trait Dimensional {
    /// Returns the dimensions of the object.
    fn dimensions(&self) -> Dims;

    /// Calculates the volume in cells.
    fn volume(&self) -> u64 {
        self.dimensions().volume()
    }

    /// Checks if this object fits a container of the given dimensions on every axis.
    fn fits_in(&self, container: &Dims) -> bool {
        self.dimensions().fits_within(container)
    }
}

/// Trait for objects that may have been given a position in the cargo grid.
pub trait Positioned {
    /// Returns the minimum corner, or `None` while unplaced.
    fn position(&self) -> Option<Cell>;
}

/// Axis-aligned box on the grid: the half-open cell range
/// `[min.x, min.x + length) × [min.y, min.y + width) × [min.z, min.z + height)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridBox {
    pub min: Cell,
    pub dims: Dims,
}

impl GridBox {
    #[inline]
    pub const fn new(min: Cell, dims: Dims) -> Self {
        Self { min, dims }
    }

    /// Exclusive upper bound on x.
    #[inline]
    pub fn end_x(&self) -> u32 {
        self.min.x + self.dims.length
    }

    /// Exclusive upper bound on y.
    #[inline]
    pub fn end_y(&self) -> u32 {
        self.min.y + self.dims.width
    }

    /// First z layer above the box.
    #[inline]
    pub fn top_z(&self) -> u32 {
        self.min.z + self.dims.height
    }

    /// Checks whether the two boxes share at least one cell.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.footprint_intersects(other)
            && self.min.z < other.top_z()
            && other.min.z < self.top_z()
    }

    /// Checks whether the horizontal projections share at least one cell.
    #[inline]
    pub fn footprint_intersects(&self, other: &Self) -> bool {
        self.min.x < other.end_x()
            && other.min.x < self.end_x()
            && self.min.y < other.end_y()
            && other.min.y < self.end_y()
    }

    /// Checks whether this box's horizontal projection covers the other's completely.
    #[inline]
    pub fn footprint_contains(&self, other: &Self) -> bool {
        self.min.x <= other.min.x
            && other.end_x() <= self.end_x()
            && self.min.y <= other.min.y
            && other.end_y() <= self.end_y()
    }

    /// Checks whether a single cell lies inside the box.
    #[inline]
    pub fn contains_cell(&self, cell: &Cell) -> bool {
        cell.x >= self.min.x
            && cell.x < self.end_x()
            && cell.y >= self.min.y
            && cell.y < self.end_y()
            && cell.z >= self.min.z
            && cell.z < self.top_z()
    }

    /// Checks whether the box stays inside `[0, bounds)` on all axes.
    #[inline]
    pub fn within(&self, bounds: &Dims) -> bool {
        self.end_x() <= bounds.length
            && self.end_y() <= bounds.width
            && self.top_z() <= bounds.height
    }

    /// Iterates every cell covered by the box.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        let (x0, y0, z0) = self.min.as_tuple();
        (x0..self.end_x()).flat_map(move |x| {
            (y0..self.end_y()).flat_map(move |y| (z0..self.top_z()).map(move |z| Cell::new(x, y, z)))
        })
    }
}

/// Validation functions shared by the model and the request layer.
pub mod validation {
    use super::*;

    /// Validates a single grid dimension.
    ///
    /// # Parameters
    /// * `value` - The value to validate
    /// * `name` - Name of the dimension for error messages
    pub fn validate_dimension(value: u32, name: &str) -> Result<(), ValidationError> {
        if value == 0 {
            return Err(ValidationError::InvalidDimension(format!(
                "{} must be at least one cell",
                name
            )));
        }
        Ok(())
    }

    /// Validates all three axes.
    pub fn validate_dims(dims: Dims, owner: &str) -> Result<(), ValidationError> {
        validate_dimension(dims.length, &format!("{owner} length"))?;
        validate_dimension(dims.width, &format!("{owner} width"))?;
        validate_dimension(dims.height, &format!("{owner} height"))?;
        Ok(())
    }

    /// Validates a weight.
    pub fn validate_weight(value: f64, owner: &str) -> Result<(), ValidationError> {
        if value <= 0.0 || value.is_nan() || value.is_infinite() {
            return Err(ValidationError::InvalidWeight(format!(
                "{owner} weight must be positive, got: {value}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gbox(min: (u32, u32, u32), dims: (u32, u32, u32)) -> GridBox {
        GridBox::new(Cell::from(min), Dims::from(dims))
    }

    #[test]
    fn test_dims_volume_and_area() {
        let dims = Dims::new(10, 5, 4);
        assert_eq!(dims.volume(), 200);
        assert_eq!(dims.base_area(), 50);
    }

    #[test]
    fn test_dims_fits_within_checks_each_axis() {
        let cargo = Dims::new(10, 5, 5);
        assert!(Dims::new(10, 5, 5).fits_within(&cargo));
        assert!(!Dims::new(2, 6, 1).fits_within(&cargo));
        assert!(!Dims::new(11, 1, 1).fits_within(&cargo));
    }

    #[test]
    fn test_grid_boxes_touching_faces_do_not_intersect() {
        let a = gbox((0, 0, 0), (2, 2, 2));
        let b = gbox((2, 0, 0), (2, 2, 2));
        let c = gbox((0, 0, 2), (2, 2, 2));
        let d = gbox((1, 1, 1), (2, 2, 2));

        assert!(!a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&d));
        assert!(a.footprint_intersects(&c));
    }

    #[test]
    fn test_footprint_contains() {
        let base = gbox((0, 0, 0), (4, 3, 1));
        assert!(base.footprint_contains(&gbox((1, 1, 1), (3, 2, 5))));
        assert!(!base.footprint_contains(&gbox((2, 0, 1), (3, 2, 1))));
    }

    #[test]
    fn test_cells_enumerates_volume() {
        let b = gbox((1, 2, 3), (2, 3, 2));
        let cells: Vec<Cell> = b.cells().collect();
        assert_eq!(cells.len() as u64, b.dims.volume());
        assert!(cells.iter().all(|c| b.contains_cell(c)));
        assert!(!b.contains_cell(&Cell::new(3, 2, 3)));
    }

    #[test]
    fn test_within_bounds() {
        let bounds = Dims::new(4, 4, 4);
        assert!(gbox((1, 1, 1), (3, 3, 3)).within(&bounds));
        assert!(!gbox((2, 0, 0), (3, 3, 3)).within(&bounds));
    }

    #[test]
    fn test_validation_dimension() {
        assert!(validation::validate_dimension(1, "Length").is_ok());
        assert!(validation::validate_dimension(0, "Length").is_err());
        assert!(validation::validate_dims(Dims::new(1, 0, 1), "Item 7").is_err());
    }

    #[test]
    fn test_validation_weight() {
        assert!(validation::validate_weight(10.0, "Item").is_ok());
        assert!(validation::validate_weight(0.0, "Item").is_err());
        assert!(validation::validate_weight(f64::NAN, "Item").is_err());
        assert!(validation::validate_weight(f64::INFINITY, "Item").is_err());
    }
}
