//! # Forecast Batches
//!
//! A [`ForecastBatch`] bundles the surface, static and atmospheric fields the
//! forecasting model consumes, plus the metadata that locates them in space and
//! time. Batches are built once from a fixed history window of the input files
//! and are never modified afterwards; model outputs come back in the same shape.
//!
//! Array layouts:
//! - surface: `[history, lat, lon]`
//! - static: `[lat, lon]`
//! - atmospheric: `[history, level, lat, lon]`

use crate::dataset::{DatasetError, Era5Datasets};
use crate::grid::{GridError, GriddedField};
use chrono::{DateTime, Utc};
use log::{debug, info};
use ndarray::{ArrayD, Axis, Ix2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use thiserror::Error;

/// Surface variables: model name → file variable name.
pub const SURFACE_VARIABLES: [(&str, &str); 4] =
    [("2t", "t2m"), ("10u", "u10"), ("10v", "v10"), ("msl", "msl")];

/// Static variables: model name → file variable name.
pub const STATIC_VARIABLES: [(&str, &str); 2] = [("z", "z"), ("lsm", "lsm")];

/// Atmospheric variables: model name → file variable name.
pub const ATMOSPHERIC_VARIABLES: [(&str, &str); 5] =
    [("t", "t"), ("u", "u"), ("v", "v"), ("q", "q"), ("z", "z")];

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Input files do not have the expected timestep layout: {0}")]
    TimeLayout(String),

    #[error("Shape mismatch: {0}")]
    Shape(String),

    #[error("Field '{0}' not present in batch")]
    MissingField(String),

    #[error(transparent)]
    Grid(#[from] GridError),
}

pub type BatchResult<T> = Result<T, BatchError>;

/// Which timesteps of the input files feed the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchWindow {
    /// First history index in the surface and atmospheric files.
    pub start: usize,
    /// Number of history steps.
    pub len: usize,
    /// Timestep of the static file.
    pub static_index: usize,
}

impl Default for BatchWindow {
    /// Steps 2 and 3 (12:00 and 18:00 of the file's day) plus the first static step.
    fn default() -> Self {
        BatchWindow {
            start: 2,
            len: 2,
            static_index: 0,
        }
    }
}

impl BatchWindow {
    pub fn history_range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    /// Index of the step whose time stamps the batch (the last history step).
    pub fn timestamp_index(&self) -> usize {
        self.start + self.len - 1
    }

    pub fn required_timesteps(&self) -> usize {
        self.start + self.len
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub time: DateTime<Utc>,
    pub atmos_levels: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastBatch {
    pub surf_vars: BTreeMap<String, ArrayD<f32>>,
    pub static_vars: BTreeMap<String, ArrayD<f32>>,
    pub atmos_vars: BTreeMap<String, ArrayD<f32>>,
    pub metadata: Metadata,
}

impl ForecastBatch {
    /// Number of history steps carried by the surface fields.
    pub fn history_len(&self) -> usize {
        self.surf_vars
            .values()
            .next()
            .map(|a| a.shape()[0])
            .unwrap_or(0)
    }

    /// Checks every array against the metadata axes.
    pub fn validate(&self) -> BatchResult<()> {
        let (nlat, nlon) = (self.metadata.lat.len(), self.metadata.lon.len());
        let nlev = self.metadata.atmos_levels.len();
        let history = self.history_len();

        for (name, array) in &self.surf_vars {
            expect_shape(name, array.shape(), &[history, nlat, nlon])?;
        }
        for (name, array) in &self.static_vars {
            expect_shape(name, array.shape(), &[nlat, nlon])?;
        }
        for (name, array) in &self.atmos_vars {
            expect_shape(name, array.shape(), &[history, nlev, nlat, nlon])?;
        }
        Ok(())
    }

    /// Latest history step of a surface variable as a gridded field.
    pub fn surface_field(&self, name: &str) -> BatchResult<GriddedField> {
        let array = self
            .surf_vars
            .get(name)
            .ok_or_else(|| BatchError::MissingField(name.to_string()))?;
        let last = array.shape()[0].checked_sub(1).ok_or_else(|| {
            BatchError::Shape(format!("surface variable '{}' has no history steps", name))
        })?;
        let slice = array
            .index_axis(Axis(0), last)
            .into_dimensionality::<Ix2>()
            .map_err(|e| BatchError::Shape(format!("{}: {}", name, e)))?
            .to_owned();
        Ok(GriddedField::new(slice, self.metadata.lat.clone(), self.metadata.lon.clone())?)
    }

    /// Latest history step of an atmospheric variable at one pressure level.
    pub fn atmospheric_field(&self, name: &str, level: i64) -> BatchResult<GriddedField> {
        let array = self
            .atmos_vars
            .get(name)
            .ok_or_else(|| BatchError::MissingField(name.to_string()))?;
        let level_index = self
            .metadata
            .atmos_levels
            .iter()
            .position(|&l| l == level)
            .ok_or_else(|| BatchError::MissingField(format!("{}@{}hPa", name, level)))?;
        let last = array.shape()[0].checked_sub(1).ok_or_else(|| {
            BatchError::Shape(format!("atmospheric variable '{}' has no history steps", name))
        })?;
        let slice = array
            .index_axis(Axis(0), last)
            .index_axis(Axis(0), level_index)
            .into_dimensionality::<Ix2>()
            .map_err(|e| BatchError::Shape(format!("{}: {}", name, e)))?
            .to_owned();
        Ok(GriddedField::new(slice, self.metadata.lat.clone(), self.metadata.lon.clone())?)
    }
}

fn expect_shape(name: &str, found: &[usize], expected: &[usize]) -> BatchResult<()> {
    if found != expected {
        return Err(BatchError::Shape(format!(
            "'{}' has shape {:?}, expected {:?}",
            name, found, expected
        )));
    }
    Ok(())
}

/// Builds the model input batch from the loaded datasets.
///
/// The time axes are validated before anything is sliced: both the surface and
/// atmospheric files must cover the window and agree on its timestamps.
pub fn create_batch(datasets: &Era5Datasets, window: &BatchWindow) -> BatchResult<ForecastBatch> {
    if window.len == 0 {
        return Err(BatchError::TimeLayout("history window is empty".to_string()));
    }

    let surface_times = datasets.surface.times()?;
    let atmos_times = datasets.atmospheric.times()?;
    let required = window.required_timesteps();
    for (label, times) in [("surface", &surface_times), ("atmospheric", &atmos_times)] {
        if times.len() < required {
            return Err(BatchError::TimeLayout(format!(
                "{} file has {} timesteps, at least {} required",
                label,
                times.len(),
                required
            )));
        }
    }
    let range = window.history_range();
    if surface_times[range.clone()] != atmos_times[range.clone()] {
        return Err(BatchError::TimeLayout(format!(
            "surface and atmospheric times differ in window {:?}",
            range
        )));
    }

    let lat = datasets.surface.latitudes()?;
    let lon = datasets.surface.longitudes()?;
    if datasets.atmospheric.latitudes()?.len() != lat.len()
        || datasets.atmospheric.longitudes()?.len() != lon.len()
    {
        return Err(BatchError::Shape("surface and atmospheric grids differ".to_string()));
    }
    let atmos_levels = datasets.atmospheric.levels()?;
    let time = surface_times[window.timestamp_index()];
    debug!("Batch window {:?}, stamped {}", range, time);

    let mut surf_vars = BTreeMap::new();
    for (key, file_name) in SURFACE_VARIABLES {
        let window = datasets.surface.read_surface_window(file_name, range.clone())?;
        surf_vars.insert(key.to_string(), window);
    }

    let mut static_vars = BTreeMap::new();
    for (key, file_name) in STATIC_VARIABLES {
        static_vars.insert(
            key.to_string(),
            datasets.static_vars.read_static_field(file_name, window.static_index)?,
        );
    }

    let mut atmos_vars = BTreeMap::new();
    for (key, file_name) in ATMOSPHERIC_VARIABLES {
        atmos_vars.insert(
            key.to_string(),
            datasets.atmospheric.read_atmospheric_window(file_name, range.clone())?,
        );
    }

    let batch = ForecastBatch {
        surf_vars,
        static_vars,
        atmos_vars,
        metadata: Metadata {
            lat,
            lon,
            time,
            atmos_levels,
        },
    };
    batch.validate()?;
    info!(
        "Built batch: {} lat x {} lon, {} levels, time {}",
        batch.metadata.lat.len(),
        batch.metadata.lon.len(),
        batch.metadata.atmos_levels.len(),
        batch.metadata.time
    );
    Ok(batch)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;
    use ndarray::IxDyn;

    /// A small in-memory batch with one-hour-spaced history.
    pub fn small_batch(nlat: usize, nlon: usize) -> ForecastBatch {
        let lat: Vec<f64> = (0..nlat).map(|i| i as f64).collect();
        let lon: Vec<f64> = (0..nlon).map(|j| 72.0 + j as f64).collect();
        let levels = vec![1000, 850, 500];

        let surface = |offset: f32| {
            ArrayD::from_shape_fn(IxDyn(&[2, nlat, nlon]), |ix| {
                offset + ix[0] as f32 * 100.0 + (ix[1] * nlon + ix[2]) as f32
            })
        };
        let mut surf_vars = BTreeMap::new();
        for (i, (key, _)) in SURFACE_VARIABLES.iter().enumerate() {
            surf_vars.insert(key.to_string(), surface(i as f32 * 1000.0));
        }
        let mut static_vars = BTreeMap::new();
        for (key, _) in STATIC_VARIABLES {
            static_vars.insert(key.to_string(), ArrayD::zeros(IxDyn(&[nlat, nlon])));
        }
        let mut atmos_vars = BTreeMap::new();
        for (key, _) in ATMOSPHERIC_VARIABLES {
            atmos_vars.insert(
                key.to_string(),
                ArrayD::from_shape_fn(IxDyn(&[2, levels.len(), nlat, nlon]), |ix| ix[1] as f32),
            );
        }

        ForecastBatch {
            surf_vars,
            static_vars,
            atmos_vars,
            metadata: Metadata {
                lat,
                lon,
                time: Utc.with_ymd_and_hms(2025, 5, 5, 18, 0, 0).unwrap(),
                atmos_levels: levels,
            },
        }
    }
}
