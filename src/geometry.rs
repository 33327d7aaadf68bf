//! Geometric predicates over placed units and the post-solve layout audit.
//!
//! The packing model encodes the loading rules as linear constraints; this
//! module checks the same rules directly on the resulting positions, so a
//! defective model or solver answer is caught before it reaches a loading dock.

use std::fmt;

use crate::model::{ItemUnit, UnitKey};
use crate::types::{Dims, GridBox};

/// Checks whether two placed units share a cell.
///
/// Unplaced units never intersect anything.
pub fn intersects(a: &ItemUnit, b: &ItemUnit) -> bool {
    match (a.placed_box(), b.placed_box()) {
        (Some(a), Some(b)) => a.intersects(&b),
        _ => false,
    }
}

/// Finds a placed unit whose top face lies directly under `unit` and covers its
/// whole footprint.
pub fn full_supporter<'a>(unit: &ItemUnit, placed: &'a [ItemUnit]) -> Option<&'a ItemUnit> {
    let target = unit.placed_box()?;
    placed.iter().find(|other| {
        other.key != unit.key
            && other.placed_box().is_some_and(|below| {
                below.top_z() == target.min.z && below.footprint_contains(&target)
            })
    })
}

/// A loading rule broken by a concrete placement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutViolation {
    OutOfBounds(UnitKey),
    Overlap(UnitKey, UnitKey),
    Unsupported(UnitKey),
    StackedNonStackable(UnitKey),
    LoadOnFragile { fragile: UnitKey, above: UnitKey },
}

impl fmt::Display for LayoutViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutViolation::OutOfBounds(unit) => write!(f, "unit {unit} leaves the cargo volume"),
            LayoutViolation::Overlap(a, b) => write!(f, "units {a} and {b} overlap"),
            LayoutViolation::Unsupported(unit) => {
                write!(f, "unit {unit} is not fully supported by a single unit below")
            }
            LayoutViolation::StackedNonStackable(unit) => {
                write!(f, "non-stackable unit {unit} is not on the floor")
            }
            LayoutViolation::LoadOnFragile { fragile, above } => {
                write!(f, "unit {above} sits above fragile unit {fragile}")
            }
        }
    }
}

/// Checks every placed unit against the loading rules.
///
/// Units without a position are ignored. Returns an empty vector for a
/// valid layout.
pub fn audit_layout(bounds: Dims, placed: &[ItemUnit]) -> Vec<LayoutViolation> {
    let boxes: Vec<(&ItemUnit, GridBox)> = placed
        .iter()
        .filter_map(|u| u.placed_box().map(|b| (u, b)))
        .collect();
    let mut violations = Vec::new();

    for (idx, (unit, bx)) in boxes.iter().enumerate() {
        if !bx.within(&bounds) {
            violations.push(LayoutViolation::OutOfBounds(unit.key.clone()));
        }

        for (other, other_box) in &boxes[idx + 1..] {
            if bx.intersects(other_box) {
                violations.push(LayoutViolation::Overlap(
                    unit.key.clone(),
                    other.key.clone(),
                ));
            }
        }

        if bx.min.z > 0 {
            if !unit.stackable {
                violations.push(LayoutViolation::StackedNonStackable(unit.key.clone()));
            }
            if full_supporter(unit, placed).is_none() {
                violations.push(LayoutViolation::Unsupported(unit.key.clone()));
            }
        }

        if unit.fragile {
            for (other, other_box) in &boxes {
                if other.key != unit.key
                    && other_box.min.z >= bx.top_z()
                    && bx.footprint_intersects(other_box)
                {
                    violations.push(LayoutViolation::LoadOnFragile {
                        fragile: unit.key.clone(),
                        above: other.key.clone(),
                    });
                }
            }
        }
    }

    violations
}
