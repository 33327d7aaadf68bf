//! Persistent coordinate-pair → distance cache.
//!
//! Stored as a flat JSON object. Every insert rewrites the file through a
//! temporary file in the same directory, so a crash never leaves a
//! half-written cache behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::model::GeoPoint;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("cache file is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),

    #[error("could not replace cache file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Cache key for a coordinate pair.
///
/// Coordinates are rounded to six decimals (about 0.1 m). With `symmetric`
/// the pair is ordered first, so (A, B) and (B, A) share one entry.
pub fn cache_key(from: GeoPoint, to: GeoPoint, symmetric: bool) -> String {
    let a = format!("{:.6},{:.6}", from.lat, from.lon);
    let b = format!("{:.6},{:.6}", to.lat, to.lon);
    if symmetric && b < a {
        format!("{b}|{a}")
    } else {
        format!("{a}|{b}")
    }
}

#[derive(Debug, Default)]
pub struct DistanceCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, f64>,
}

impl DistanceCache {
    /// A cache that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a cache file; a missing file starts an empty cache.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "distance cache loaded");
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores a value and writes the cache file, if there is one.
    ///
    /// The value stays cached in memory even when writing fails.
    pub fn insert(&mut self, key: String, distance: f64) -> Result<(), CacheError> {
        self.entries.insert(key, distance);
        self.save()
    }

    fn save(&self) -> Result<(), CacheError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &self.entries)?;
            writer.flush()?;
        }
        tmp.persist(path)?;
        Ok(())
    }
}
