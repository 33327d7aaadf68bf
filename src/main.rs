use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use load_planner::config::AppConfig;
use load_planner::logging;
use load_planner::planner::LoadPlanner;
use load_planner::request::{PlanRequest, PlanResponse};
use tracing::{error, info};

fn read_request(path: Option<&str>) -> Result<PlanRequest, Box<dyn std::error::Error>> {
    let raw = match path {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    Ok(serde_json::from_str(&raw)?)
}

fn run(path: Option<&str>) -> Result<PlanResponse, Box<dyn std::error::Error>> {
    let request = read_request(path)?.into_validated()?;
    let units = request.units()?;
    let (mut suppliers, mut warehouses) = (request.suppliers, request.warehouses);

    let config = AppConfig::from_env();
    let planner = LoadPlanner::from_config(&config);
    let outcome = planner.plan(
        &mut suppliers,
        &mut warehouses,
        request.trucks,
        &request.orders,
        units,
    )?;

    info!(
        placed = outcome.placed_count(),
        unplaced = outcome.unplaced_count(),
        unassignable = outcome.unassignable.len(),
        unmet = outcome.unmet.len(),
        "planning run finished"
    );
    Ok(PlanResponse::from_outcome(&outcome))
}

fn main() -> ExitCode {
    if let Err(err) = dotenvy::dotenv() {
        if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == io::ErrorKind::NotFound)
        {
            eprintln!("Could not load .env: {}", err);
        }
    }
    logging::init();

    let path = std::env::args().nth(1);
    match run(path.as_deref()) {
        Ok(response) => match serde_json::to_string_pretty(&response) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                error!(error = %err, "could not serialize the plan");
                ExitCode::FAILURE
            }
        },
        Err(err) => {
            error!(error = %err, "planning failed");
            ExitCode::FAILURE
        }
    }
}
