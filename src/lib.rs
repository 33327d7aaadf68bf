//! Joint supply assignment and truck loading.
//!
//! A planning run routes ordered units from suppliers to warehouses at
//! minimum travel cost, distributes each supplier's units over the fleet and
//! computes 3-D cargo placements with a mixed-integer model.

pub mod assignment;
pub mod config;
pub mod error;
pub mod gate;
pub mod geometry;
pub mod logging;
pub mod model;
pub mod oracle;
pub mod packing;
pub mod planner;
pub mod request;
pub mod solver;
pub mod types;

pub use error::{PlanError, Result, ValidationError};
pub use packing::{PackingConfig, pack_units};
pub use planner::{LoadPlanner, PlanOutcome};
