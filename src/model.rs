//! Data model of a planning run.
//!
//! This module defines the entities the planner works on:
//! - `ItemSpec`: a catalog entry (SKU) with dimensions and handling flags
//! - `ItemUnit`: one physical unit of a catalog item, identified by `UnitKey`
//! - `CargoVolume` and `Truck`: the loadable grid and the vehicle owning it
//! - `Supplier`, `Warehouse`, `Order`: the supply and demand side
//! - `Assignment`: the output of the supply-assignment model
//!
//! Everything here lives for a single planning run; nothing is persisted.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{Cell, Dimensional, Dims, GridBox, Positioned, validation};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(
    /// Catalog identity of an item (a SKU), shared by all of its physical units.
    ItemId
);
string_id!(SupplierId);
string_id!(WarehouseId);
string_id!(TruckId);

/// Identity of one physical unit: the catalog item plus a per-item unit number.
///
/// Two units of the same catalog item differ only in `unit_id`, so the pair is
/// always compared as a whole.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub item_id: ItemId,
    pub unit_id: u32,
}

impl UnitKey {
    pub fn new(item_id: ItemId, unit_id: u32) -> Self {
        Self { item_id, unit_id }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.item_id, self.unit_id)
    }
}

/// Geographic coordinate in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Creates a coordinate after range-checking both components.
    pub fn new(lat: f64, lon: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::InvalidCoordinate(format!(
                "latitude must be within [-90, 90], got: {lat}"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(ValidationError::InvalidCoordinate(format!(
                "longitude must be within [-180, 180], got: {lon}"
            )));
        }
        Ok(Self { lat, lon })
    }
}

/// Catalog entry from which units are expanded.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemSpec {
    pub item_id: ItemId,
    pub dims: Dims,
    pub weight: f64,
    pub stackable: bool,
    pub fragile: bool,
}

impl ItemSpec {
    /// Creates a catalog entry with validation.
    ///
    /// # Examples
    /// ```
    /// use load_planner::model::{ItemId, ItemSpec};
    /// use load_planner::types::Dims;
    ///
    /// let ok = ItemSpec::new(ItemId::new("A"), Dims::new(2, 2, 2), 5.0, true, false);
    /// assert!(ok.is_ok());
    ///
    /// let flat = ItemSpec::new(ItemId::new("B"), Dims::new(2, 0, 2), 5.0, true, false);
    /// assert!(flat.is_err());
    /// ```
    pub fn new(
        item_id: ItemId,
        dims: Dims,
        weight: f64,
        stackable: bool,
        fragile: bool,
    ) -> Result<Self, ValidationError> {
        let owner = format!("Item {item_id}");
        validation::validate_dims(dims, &owner)?;
        validation::validate_weight(weight, &owner)?;
        Ok(Self {
            item_id,
            dims,
            weight,
            stackable,
            fragile,
        })
    }

    /// Creates the `unit_id`-th physical unit of this item.
    pub fn unit(&self, unit_id: u32) -> ItemUnit {
        ItemUnit {
            key: UnitKey::new(self.item_id.clone(), unit_id),
            dims: self.dims,
            weight: self.weight,
            stackable: self.stackable,
            fragile: self.fragile,
            supplier_id: None,
            warehouse_id: None,
            position: None,
        }
    }
}

/// One physical, placeable unit.
///
/// `supplier_id`/`warehouse_id` are filled in by the assignment model,
/// `position` by the packing model. A unit without a position is unplaced.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemUnit {
    pub key: UnitKey,
    pub dims: Dims,
    pub weight: f64,
    pub stackable: bool,
    pub fragile: bool,
    pub supplier_id: Option<SupplierId>,
    pub warehouse_id: Option<WarehouseId>,
    pub position: Option<Cell>,
}

impl ItemUnit {
    pub fn item_id(&self) -> &ItemId {
        &self.key.item_id
    }

    /// Box the unit would occupy with `origin` as its minimum corner.
    #[inline]
    pub fn footprint_at(&self, origin: Cell) -> GridBox {
        GridBox::new(origin, self.dims)
    }

    /// Box the unit occupies, if placed.
    #[inline]
    pub fn placed_box(&self) -> Option<GridBox> {
        self.position.map(|origin| self.footprint_at(origin))
    }
}

impl Dimensional for ItemUnit {
    fn dimensions(&self) -> Dims {
        self.dims
    }
}

impl Positioned for ItemUnit {
    fn position(&self) -> Option<Cell> {
        self.position
    }
}

/// The loadable grid `[0, L) × [0, W) × [0, H)` and the units placed in it.
#[derive(Clone, Debug, PartialEq)]
pub struct CargoVolume {
    pub dims: Dims,
    pub placed: Vec<ItemUnit>,
}

impl CargoVolume {
    /// Creates an empty cargo volume with validation.
    pub fn new(dims: Dims) -> Result<Self, ValidationError> {
        validation::validate_dims(dims, "Cargo")?;
        Ok(Self {
            dims,
            placed: Vec::new(),
        })
    }

    /// Total number of cells.
    pub fn total_volume(&self) -> u64 {
        self.dims.volume()
    }

    /// Cells occupied by placed units.
    pub fn used_volume(&self) -> u64 {
        self.placed.iter().map(|u| u.volume()).sum()
    }

    /// Volume usage in percent (0.0 to 100.0).
    pub fn utilization_percent(&self) -> f64 {
        let total = self.total_volume();
        if total == 0 {
            return 0.0;
        }
        (self.used_volume() as f64 / total as f64) * 100.0
    }

    /// Sum of the weights of all placed units.
    pub fn total_weight(&self) -> f64 {
        self.placed.iter().map(|u| u.weight).sum()
    }
}

impl Dimensional for CargoVolume {
    fn dimensions(&self) -> Dims {
        self.dims
    }
}

/// A vehicle with one cargo volume and the units routed to it.
///
/// `assigned` holds units handed to the truck by the planner and not yet
/// packed; after packing, placed units live in `cargo.placed` and the rest in
/// `unplaced`.
#[derive(Clone, Debug, PartialEq)]
pub struct Truck {
    pub id: TruckId,
    pub name: String,
    pub cargo: CargoVolume,
    pub assigned: Vec<ItemUnit>,
    pub unplaced: Vec<ItemUnit>,
}

impl Truck {
    pub fn new(id: TruckId, name: impl Into<String>, cargo_dims: Dims) -> Result<Self, ValidationError> {
        Ok(Self {
            id,
            name: name.into(),
            cargo: CargoVolume::new(cargo_dims)?,
            assigned: Vec::new(),
            unplaced: Vec::new(),
        })
    }

    /// Whether the truck carries or is about to carry anything.
    pub fn is_loaded(&self) -> bool {
        !self.assigned.is_empty() || !self.cargo.placed.is_empty()
    }
}

/// A source of item units with finite inventory.
#[derive(Clone, Debug, PartialEq)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub location: GeoPoint,
    pub inventory: BTreeMap<ItemId, u32>,
}

impl Supplier {
    /// Quantity still available for an item (0 for items not stocked).
    pub fn available(&self, item: &ItemId) -> u32 {
        self.inventory.get(item).copied().unwrap_or(0)
    }

    /// Removes committed units from inventory.
    ///
    /// Fails without changing anything if the commitment exceeds stock.
    pub fn commit(&mut self, item: &ItemId, quantity: u32) -> Result<(), ValidationError> {
        let available = self.available(item);
        if quantity > available {
            return Err(ValidationError::InvalidQuantity(format!(
                "supplier {} cannot commit {} of item {} (only {} in stock)",
                self.id, quantity, item, available
            )));
        }
        if quantity > 0 {
            self.inventory.insert(item.clone(), available - quantity);
        }
        Ok(())
    }
}

/// A destination whose demand is derived from the active orders.
#[derive(Clone, Debug, PartialEq)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub location: GeoPoint,
    pub demand: BTreeMap<ItemId, u32>,
}

impl Warehouse {
    pub fn new(id: WarehouseId, name: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            demand: BTreeMap::new(),
        }
    }

    /// Replaces the demand with the sum of all order lines targeting this warehouse.
    pub fn rebuild_demand(&mut self, orders: &[Order]) {
        self.demand.clear();
        for order in orders.iter().filter(|o| o.warehouse_id == self.id) {
            for line in &order.lines {
                *self.demand.entry(line.item_id.clone()).or_insert(0) += line.quantity;
            }
        }
        self.demand.retain(|_, qty| *qty > 0);
    }

    pub fn required(&self, item: &ItemId) -> u32 {
        self.demand.get(item).copied().unwrap_or(0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderLine {
    pub item_id: ItemId,
    pub quantity: u32,
}

/// A warehouse target together with the item quantities it needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub name: Option<String>,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<OrderLine>,
}

/// Output of the assignment model: one per assigned unit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Assignment {
    pub supplier_id: SupplierId,
    pub warehouse_id: WarehouseId,
    pub unit: UnitKey,
}

impl Assignment {
    pub fn item_id(&self) -> &ItemId {
        &self.unit.item_id
    }
}
