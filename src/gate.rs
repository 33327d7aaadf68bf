//! Truck feasibility gate.
//!
//! A cheap necessary condition checked before a packing solve: the units'
//! total volume must fit the cargo volume and every unit must fit each cargo
//! axis on its own. Passing the gate does not guarantee a packing exists;
//! failing it guarantees none does.

use std::fmt;

use crate::model::{ItemUnit, Truck, UnitKey};
use crate::types::{Dimensional, Dims};

/// Outcome of a gate check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateVerdict {
    Fits,
    VolumeExceeded { required: u64, available: u64 },
    OversizedUnit(UnitKey),
}

impl GateVerdict {
    pub fn passes(&self) -> bool {
        matches!(self, GateVerdict::Fits)
    }
}

impl fmt::Display for GateVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateVerdict::Fits => write!(f, "fits"),
            GateVerdict::VolumeExceeded {
                required,
                available,
            } => write!(f, "needs {required} cells, cargo holds {available}"),
            GateVerdict::OversizedUnit(unit) => {
                write!(f, "unit {unit} exceeds a cargo dimension")
            }
        }
    }
}

/// Checks a unit set against cargo dimensions.
///
/// # Parameters
/// * `cargo` - Cargo dimensions
/// * `units` - Units that would share the cargo
pub fn check<'a>(cargo: Dims, units: impl IntoIterator<Item = &'a ItemUnit>) -> GateVerdict {
    let mut required: u64 = 0;
    for unit in units {
        if !unit.fits_in(&cargo) {
            return GateVerdict::OversizedUnit(unit.key.clone());
        }
        required += unit.volume();
    }

    let available = cargo.volume();
    if required > available {
        return GateVerdict::VolumeExceeded {
            required,
            available,
        };
    }
    GateVerdict::Fits
}

/// Whether `truck` could possibly carry `units`.
///
/// Pure function of the cargo dimensions and the unit list.
pub fn can_carry(truck: &Truck, units: &[ItemUnit]) -> bool {
    check(truck.cargo.dims, units).passes()
}
