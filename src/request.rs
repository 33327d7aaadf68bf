//! JSON request and response documents.
//!
//! Field names follow the planning service's wire format (`truckId`,
//! `dim: {l, b, h}`, `long`, `_id`, ...). Ids may arrive as strings or
//! numbers and are normalized to strings.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::model::{
    GeoPoint, ItemId, ItemSpec, ItemUnit, Order, OrderLine, Supplier, SupplierId, Truck, TruckId,
    Warehouse, WarehouseId,
};
use crate::planner::{PlanOutcome, expand_orders};
use crate::types::Dims;

/// An id given as a JSON string or number.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(i64),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Text(text) => f.write_str(text),
            RawId::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct DimDto {
    pub l: u32,
    pub b: u32,
    pub h: u32,
}

impl From<DimDto> for Dims {
    fn from(dim: DimDto) -> Self {
        Dims::new(dim.l, dim.b, dim.h)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TruckDto {
    pub truck_id: RawId,
    #[serde(default)]
    pub name: String,
    pub dim: DimDto,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OrderLineDto {
    pub item: RawId,
    pub qty: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OrderDto {
    #[serde(rename = "_id", default)]
    pub id: Option<RawId>,
    pub warehouse: RawId,
    pub items: Vec<OrderLineDto>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDto {
    pub item_id: RawId,
    pub qty: i64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplierDto {
    pub supplier_id: RawId,
    #[serde(default)]
    pub name: String,
    pub lat: f64,
    #[serde(rename = "long")]
    pub lon: f64,
    #[serde(default)]
    pub inventories: Vec<InventoryDto>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseDto {
    pub warehouse_id: RawId,
    #[serde(default)]
    pub name: String,
    pub lat: f64,
    #[serde(rename = "long")]
    pub lon: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDto {
    pub item_id: RawId,
    pub dim: DimDto,
    pub weight: f64,
    pub stackable: bool,
    pub fragile: bool,
}

/// Planning request as received.
#[derive(Clone, Debug, Deserialize)]
pub struct PlanRequest {
    pub trucks: Vec<TruckDto>,
    #[serde(default)]
    pub orders: Vec<OrderDto>,
    #[serde(default)]
    pub suppliers: Vec<SupplierDto>,
    #[serde(default)]
    pub warehouses: Vec<WarehouseDto>,
    #[serde(default)]
    pub items: Vec<ItemDto>,
}

/// A request converted into domain objects and checked for consistency.
#[derive(Clone, Debug)]
pub struct ValidatedRequest {
    pub trucks: Vec<Truck>,
    pub orders: Vec<Order>,
    pub suppliers: Vec<Supplier>,
    pub warehouses: Vec<Warehouse>,
    pub catalog: BTreeMap<ItemId, ItemSpec>,
}

impl ValidatedRequest {
    /// Expands the orders into units.
    pub fn units(&self) -> Result<Vec<ItemUnit>, ValidationError> {
        expand_orders(&self.orders, &self.catalog)
    }
}

fn ensure_unique(seen: &mut HashSet<String>, id: &str, kind: &str) -> Result<(), ValidationError> {
    if !seen.insert(id.to_string()) {
        return Err(ValidationError::DuplicateId(format!("{kind} {id}")));
    }
    Ok(())
}

fn quantity(raw: i64, context: impl FnOnce() -> String) -> Result<u32, ValidationError> {
    u32::try_from(raw).map_err(|_| {
        ValidationError::InvalidQuantity(format!("{} has invalid quantity {raw}", context()))
    })
}

impl PlanRequest {
    /// Converts and validates the request.
    ///
    /// Requires at least one truck, unique ids per collection, positive
    /// dimensions and weights, valid coordinates, positive order quantities,
    /// and orders that reference known warehouses and items.
    pub fn into_validated(self) -> Result<ValidatedRequest, ValidationError> {
        if self.trucks.is_empty() {
            return Err(ValidationError::InvalidConfiguration(
                "at least one truck is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut trucks = Vec::with_capacity(self.trucks.len());
        for dto in self.trucks {
            let id = dto.truck_id.to_string();
            ensure_unique(&mut seen, &id, "truck")?;
            trucks.push(Truck::new(TruckId::new(id), dto.name, dto.dim.into())?);
        }

        let mut catalog = BTreeMap::new();
        for dto in self.items {
            let id = ItemId::new(dto.item_id.to_string());
            if catalog.contains_key(&id) {
                return Err(ValidationError::DuplicateId(format!("item {id}")));
            }
            let spec = ItemSpec::new(id.clone(), dto.dim.into(), dto.weight, dto.stackable, dto.fragile)?;
            catalog.insert(id, spec);
        }

        let mut seen = HashSet::new();
        let mut warehouses = Vec::with_capacity(self.warehouses.len());
        for dto in self.warehouses {
            let id = dto.warehouse_id.to_string();
            ensure_unique(&mut seen, &id, "warehouse")?;
            let location = GeoPoint::new(dto.lat, dto.lon)?;
            warehouses.push(Warehouse::new(WarehouseId::new(id), dto.name, location));
        }

        let mut seen = HashSet::new();
        let mut suppliers = Vec::with_capacity(self.suppliers.len());
        for dto in self.suppliers {
            let id = dto.supplier_id.to_string();
            ensure_unique(&mut seen, &id, "supplier")?;
            let mut inventory: BTreeMap<ItemId, u32> = BTreeMap::new();
            for entry in dto.inventories {
                let item = ItemId::new(entry.item_id.to_string());
                let qty = quantity(entry.qty, || format!("inventory of supplier {id} for item {item}"))?;
                let slot = inventory.entry(item).or_insert(0);
                *slot = slot.saturating_add(qty);
            }
            suppliers.push(Supplier {
                id: SupplierId::new(id),
                name: dto.name,
                location: GeoPoint::new(dto.lat, dto.lon)?,
                inventory,
            });
        }

        let mut orders = Vec::with_capacity(self.orders.len());
        for dto in self.orders {
            let warehouse_id = WarehouseId::new(dto.warehouse.to_string());
            if !warehouses.iter().any(|w| w.id == warehouse_id) {
                return Err(ValidationError::UnknownReference(format!(
                    "order references unknown warehouse {warehouse_id}"
                )));
            }
            let mut lines = Vec::with_capacity(dto.items.len());
            for line in dto.items {
                let item_id = ItemId::new(line.item.to_string());
                if !catalog.contains_key(&item_id) {
                    return Err(ValidationError::UnknownReference(format!(
                        "order for warehouse {warehouse_id} references unknown item {item_id}"
                    )));
                }
                let qty = quantity(line.qty, || format!("order line for item {item_id}"))?;
                if qty == 0 {
                    return Err(ValidationError::InvalidQuantity(format!(
                        "order line for item {item_id} must request at least one unit"
                    )));
                }
                lines.push(OrderLine {
                    item_id,
                    quantity: qty,
                });
            }
            orders.push(Order {
                name: dto.id.map(|id| format!("Order {id}")),
                warehouse_id,
                lines,
            });
        }

        Ok(ValidatedRequest {
            trucks,
            orders,
            suppliers,
            warehouses,
            catalog,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedItemDto {
    pub item_id: ItemId,
    pub unit_id: u32,
    pub position: [u32; 3],
    pub dimensions: [u32; 3],
    pub supplier: Option<SupplierId>,
    pub warehouse: Option<WarehouseId>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TruckLoadDto {
    pub truck_id: TruckId,
    pub utilization: f64,
    pub items: Vec<PlacedItemDto>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRefDto {
    pub item_id: ItemId,
    pub unit_id: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnplacedDto {
    pub truck_id: TruckId,
    pub item_id: ItemId,
    pub unit_id: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignableDto {
    pub supplier_id: SupplierId,
    pub units: Vec<UnitRefDto>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmetDemandDto {
    pub warehouse_id: WarehouseId,
    pub item_id: ItemId,
    pub missing: u32,
}

/// Planning response as sent.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub trucks: Vec<TruckLoadDto>,
    pub unplaced: Vec<UnplacedDto>,
    pub unassignable: Vec<UnassignableDto>,
    pub unmet_demand: Vec<UnmetDemandDto>,
    /// Units the assignment could not route to any supplier
    pub unassigned: Vec<UnitRefDto>,
}

impl PlanResponse {
    pub fn from_outcome(outcome: &PlanOutcome) -> Self {
        let trucks = outcome
            .trucks
            .iter()
            .map(|truck| TruckLoadDto {
                truck_id: truck.id.clone(),
                utilization: (truck.cargo.utilization_percent() * 100.0).round() / 100.0,
                items: truck
                    .cargo
                    .placed
                    .iter()
                    .filter_map(|unit| {
                        unit.position.map(|pos| PlacedItemDto {
                            item_id: unit.item_id().clone(),
                            unit_id: unit.key.unit_id,
                            position: [pos.x, pos.y, pos.z],
                            dimensions: [unit.dims.length, unit.dims.width, unit.dims.height],
                            supplier: unit.supplier_id.clone(),
                            warehouse: unit.warehouse_id.clone(),
                        })
                    })
                    .collect(),
            })
            .collect();

        let unplaced = outcome
            .trucks
            .iter()
            .flat_map(|truck| {
                truck.unplaced.iter().map(|unit| UnplacedDto {
                    truck_id: truck.id.clone(),
                    item_id: unit.item_id().clone(),
                    unit_id: unit.key.unit_id,
                })
            })
            .collect();

        let unassignable = outcome
            .unassignable
            .iter()
            .map(|group| UnassignableDto {
                supplier_id: group.supplier_id.clone(),
                units: group
                    .units
                    .iter()
                    .map(|unit| UnitRefDto {
                        item_id: unit.item_id().clone(),
                        unit_id: unit.key.unit_id,
                    })
                    .collect(),
            })
            .collect();

        let unmet_demand = outcome
            .unmet
            .iter()
            .map(|unmet| UnmetDemandDto {
                warehouse_id: unmet.warehouse_id.clone(),
                item_id: unmet.item_id.clone(),
                missing: unmet.missing,
            })
            .collect();

        let unassigned = outcome
            .unassigned
            .iter()
            .map(|key| UnitRefDto {
                item_id: key.item_id.clone(),
                unit_id: key.unit_id,
            })
            .collect();

        Self {
            trucks,
            unplaced,
            unassignable,
            unmet_demand,
            unassigned,
        }
    }
}
