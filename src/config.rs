use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::packing::PackingConfig;

const PREFIX: &str = "LOAD_PLANNER_";

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub packing: PackingConfig,
    pub assignment: AssignmentConfig,
    pub oracle: OracleConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self::from_source(&env_string)
    }

    /// Creates a configuration from an arbitrary variable lookup.
    ///
    /// # Parameters
    /// * `source` - Returns the trimmed, non-empty value of a variable
    pub fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            packing: packing_from(source),
            assignment: AssignmentConfig::from_source(source),
            oracle: OracleConfig::from_source(source),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_source(&|_: &str| None)
    }
}

fn packing_from(source: &dyn Fn(&str) -> Option<String>) -> PackingConfig {
    let time_limit = load_time_limit(
        source,
        "PACKING_TIME_LIMIT_SECS",
        PackingConfig::DEFAULT_TIME_LIMIT_SECS,
    );

    let length_bonus = load_f64_with_warning(
        source,
        "PACKING_LENGTH_BONUS",
        PackingConfig::DEFAULT_LENGTH_BONUS,
        |value| (0.0..=PackingConfig::MAX_LENGTH_BONUS).contains(&value),
        "must be between 0 and 0.01",
        "Adjusted length bonus changes the loading order along the cargo",
    );

    PackingConfig::builder()
        .time_limit(time_limit)
        .length_bonus(length_bonus)
        .build()
}

/// Configuration for the supply-assignment model.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignmentConfig {
    pub time_limit: Option<Duration>,
}

impl AssignmentConfig {
    pub const DEFAULT_TIME_LIMIT_SECS: u64 = 300;

    fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            time_limit: load_time_limit(
                source,
                "ASSIGNMENT_TIME_LIMIT_SECS",
                Self::DEFAULT_TIME_LIMIT_SECS,
            ),
        }
    }
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            time_limit: Some(Duration::from_secs(Self::DEFAULT_TIME_LIMIT_SECS)),
        }
    }
}

/// Configuration for the distance oracle.
#[derive(Clone, Debug, PartialEq)]
pub struct OracleConfig {
    /// Base URL of an OSRM-compatible routing service; `None` = geodesic only
    pub routing_url: Option<String>,
    pub routing_timeout: Duration,
    pub cache_path: PathBuf,
    /// Whether (A, B) and (B, A) share a cache entry
    pub symmetric: bool,
}

impl OracleConfig {
    pub const DEFAULT_ROUTING_TIMEOUT_SECS: u64 = 10;
    pub const DEFAULT_CACHE_PATH: &'static str = "distance_cache.json";

    fn from_source(source: &dyn Fn(&str) -> Option<String>) -> Self {
        let routing_url = lookup(source, "ROUTING_URL");
        if let Some(url) = routing_url.as_deref() {
            info!(url, "routing service configured");
        }

        let routing_timeout = Duration::from_secs(load_positive_secs(
            source,
            "ROUTING_TIMEOUT_SECS",
            Self::DEFAULT_ROUTING_TIMEOUT_SECS,
        ));

        let cache_path = lookup(source, "DISTANCE_CACHE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CACHE_PATH));

        let symmetric_var = format!("{PREFIX}SYMMETRIC_DISTANCES");
        let symmetric = source(&symmetric_var)
            .and_then(|raw| parse_bool(&raw, &symmetric_var))
            .unwrap_or(true);

        Self {
            routing_url,
            routing_timeout,
            cache_path,
            symmetric,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            routing_url: None,
            routing_timeout: Duration::from_secs(Self::DEFAULT_ROUTING_TIMEOUT_SECS),
            cache_path: PathBuf::from(Self::DEFAULT_CACHE_PATH),
            symmetric: true,
        }
    }
}

fn lookup(source: &dyn Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    source(&format!("{PREFIX}{name}"))
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

/// Reads a budget in whole seconds; `0` disables the budget.
fn load_time_limit(
    source: &dyn Fn(&str) -> Option<String>,
    name: &str,
    default_secs: u64,
) -> Option<Duration> {
    let var_name = format!("{PREFIX}{name}");
    match source(&var_name) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(0) => {
                info!("{} = 0, solve budget disabled.", var_name);
                None
            }
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}') as seconds: {}. Using {}.",
                    var_name, raw, err, default_secs
                );
                Some(Duration::from_secs(default_secs))
            }
        },
        None => Some(Duration::from_secs(default_secs)),
    }
}

fn load_positive_secs(
    source: &dyn Fn(&str) -> Option<String>,
    name: &str,
    default_secs: u64,
) -> u64 {
    let var_name = format!("{PREFIX}{name}");
    match source(&var_name) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) if value != 0 => value,
            Ok(_) => {
                warn!("{} must not be 0. Using {}.", var_name, default_secs);
                default_secs
            }
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}') as seconds: {}. Using {}.",
                    var_name, raw, err, default_secs
                );
                default_secs
            }
        },
        None => default_secs,
    }
}

fn load_f64_with_warning(
    source: &dyn Fn(&str) -> Option<String>,
    name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    let var_name = format!("{PREFIX}{name}");
    match source(&var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                if !validator(value) {
                    warn!(
                        "{} contains invalid value '{}': {}. Using {}.",
                        var_name, raw, invalid_hint, default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        warn!("{} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}
