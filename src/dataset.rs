//! # ERA5 Dataset Loading
//!
//! Opens the three reanalysis files the forecast needs (static, surface-level,
//! atmospheric) and reads coordinate axes and time windows out of them.
//!
//! Files stay open for the lifetime of an [`Era5Datasets`] value; variable data
//! is only read when a batch is built, one time window at a time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::debug;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while opening or reading a reanalysis file.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to open NetCDF file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: netcdf::Error,
    },

    #[error("Variable '{name}' not found in {path}")]
    MissingVariable { path: PathBuf, name: String },

    #[error("Failed to read '{name}' from {path}: {source}")]
    Read {
        path: PathBuf,
        name: String,
        #[source]
        source: netcdf::Error,
    },

    #[error("Variable '{name}' in {path} has dimensions {found:?}, expected {expected:?}")]
    UnexpectedDimensions {
        path: PathBuf,
        name: String,
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("Invalid time units '{0}'")]
    InvalidTimeUnits(String),

    #[error("Unexpected time layout: {0}")]
    TimeLayout(String),

    #[error("Failed to build array: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Result type for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Names of the coordinate variables in the input files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinateNames {
    pub time: String,
    pub latitude: String,
    pub longitude: String,
    pub level: String,
}

impl Default for CoordinateNames {
    fn default() -> Self {
        CoordinateNames {
            time: "valid_time".to_string(),
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
            level: "pressure_level".to_string(),
        }
    }
}

/// Locations of the three input files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataPaths {
    pub static_path: PathBuf,
    pub surface_path: PathBuf,
    pub atmospheric_path: PathBuf,
}

impl DataPaths {
    /// The standard file names inside `dir` for the given date stamp.
    pub fn in_dir(dir: &Path, date: &str) -> Self {
        DataPaths {
            static_path: dir.join("static.nc"),
            surface_path: dir.join(format!("{}-surface-level.nc", date)),
            atmospheric_path: dir.join(format!("{}-atmospheric.nc", date)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        [&self.static_path, &self.surface_path, &self.atmospheric_path].into_iter()
    }
}

/// Units of a CF time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Convert the time unit to a multiplier for seconds
    pub fn to_seconds_multiplier(&self) -> f64 {
        match self {
            TimeUnit::Seconds => 1.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Hours => 3600.0,
            TimeUnit::Days => 86400.0,
        }
    }
}

/// Parses CF time units such as `"seconds since 1970-01-01"`.
pub fn parse_time_units(units: &str) -> DatasetResult<(TimeUnit, DateTime<Utc>)> {
    let invalid = || DatasetError::InvalidTimeUnits(units.to_string());
    let (unit, base) = units.split_once(" since ").ok_or_else(invalid)?;

    let unit = match unit.trim().to_ascii_lowercase().as_str() {
        "seconds" | "second" | "s" => TimeUnit::Seconds,
        "minutes" | "minute" => TimeUnit::Minutes,
        "hours" | "hour" | "h" => TimeUnit::Hours,
        "days" | "day" | "d" => TimeUnit::Days,
        _ => return Err(invalid()),
    };

    let base = base.trim().trim_end_matches(" UTC").trim_end_matches('Z');
    let naive = NaiveDateTime::parse_from_str(base, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(base, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(base, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(base, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(invalid)?;

    Ok((unit, naive.and_utc()))
}

/// Converts raw offsets into timestamps.
pub fn decode_times(
    values: &[f64],
    unit: TimeUnit,
    base: DateTime<Utc>,
) -> DatasetResult<Vec<DateTime<Utc>>> {
    values
        .iter()
        .map(|v| {
            let seconds = v * unit.to_seconds_multiplier();
            let delta = chrono::Duration::milliseconds((seconds * 1000.0).round() as i64);
            base.checked_add_signed(delta)
                .ok_or_else(|| DatasetError::TimeLayout(format!("time offset {} out of range", v)))
        })
        .collect()
}

/// CF packing and masking attributes of a variable.
///
/// Raw values equal to `_FillValue` or `missing_value` become NaN; the rest
/// are unpacked as `raw * scale_factor + add_offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CfEncoding {
    pub scale_factor: f64,
    pub add_offset: f64,
    pub fill_value: Option<f64>,
    pub missing_value: Option<f64>,
}

impl Default for CfEncoding {
    fn default() -> Self {
        CfEncoding {
            scale_factor: 1.0,
            add_offset: 0.0,
            fill_value: None,
            missing_value: None,
        }
    }
}

fn f64_attr(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !var.attributes().any(|attr| attr.name() == name) {
        return None;
    }
    let value = var.attribute_value(name)?.ok()?;
    f64::try_from(value).ok()
}

impl CfEncoding {
    pub fn from_variable(var: &netcdf::Variable) -> Self {
        CfEncoding {
            scale_factor: f64_attr(var, "scale_factor").unwrap_or(1.0),
            add_offset: f64_attr(var, "add_offset").unwrap_or(0.0),
            fill_value: f64_attr(var, "_FillValue"),
            missing_value: f64_attr(var, "missing_value"),
        }
    }

    fn is_masked(&self, raw: f64) -> bool {
        raw.is_nan() || self.fill_value == Some(raw) || self.missing_value == Some(raw)
    }

    pub fn decode(&self, raw: &[f64]) -> Vec<f32> {
        raw.iter()
            .map(|&v| {
                if self.is_masked(v) {
                    f32::NAN
                } else {
                    (v * self.scale_factor + self.add_offset) as f32
                }
            })
            .collect()
    }
}

/// One open NetCDF file.
pub struct Dataset {
    path: PathBuf,
    file: netcdf::File,
    names: CoordinateNames,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset").field("path", &self.path).finish()
    }
}

impl Dataset {
    pub fn open<P: AsRef<Path>>(path: P, names: &CoordinateNames) -> DatasetResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(DatasetError::NotFound(path));
        }
        debug!("Opening NetCDF file: {}", path.display());
        let file = netcdf::open(&path).map_err(|source| DatasetError::Open {
            path: path.clone(),
            source,
        })?;
        Ok(Dataset {
            path,
            file,
            names: names.clone(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn names(&self) -> &CoordinateNames {
        &self.names
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.file.variable(name).is_some()
    }

    fn variable(&self, name: &str) -> DatasetResult<netcdf::Variable<'_>> {
        self.file.variable(name).ok_or_else(|| DatasetError::MissingVariable {
            path: self.path.clone(),
            name: name.to_string(),
        })
    }

    fn read_err(&self, name: &str) -> impl FnOnce(netcdf::Error) -> DatasetError + '_ {
        let name = name.to_string();
        move |source| DatasetError::Read {
            path: self.path.clone(),
            name,
            source,
        }
    }

    /// Reads a hyperslab and applies the variable's CF encoding.
    fn read_decoded<E>(&self, name: &str, extents: E) -> DatasetResult<Vec<f32>>
    where
        E: TryInto<netcdf::Extents>,
        E::Error: Into<netcdf::Error>,
    {
        let var = self.variable(name)?;
        let raw = var.get_values::<f64, _>(extents).map_err(self.read_err(name))?;
        Ok(CfEncoding::from_variable(&var).decode(&raw))
    }

    /// Reads a whole 1-D coordinate variable.
    pub fn coordinate(&self, name: &str) -> DatasetResult<Vec<f64>> {
        let var = self.variable(name)?;
        var.get_values::<f64, _>(..).map_err(self.read_err(name))
    }

    pub fn latitudes(&self) -> DatasetResult<Vec<f64>> {
        self.coordinate(&self.names.latitude)
    }

    pub fn longitudes(&self) -> DatasetResult<Vec<f64>> {
        self.coordinate(&self.names.longitude)
    }

    /// Pressure levels as integers, in file order.
    pub fn levels(&self) -> DatasetResult<Vec<i64>> {
        Ok(self
            .coordinate(&self.names.level)?
            .into_iter()
            .map(|l| l.round() as i64)
            .collect())
    }

    /// Decoded time axis.
    pub fn times(&self) -> DatasetResult<Vec<DateTime<Utc>>> {
        let name = &self.names.time;
        let var = self.variable(name)?;
        let units = match var.attribute("units") {
            Some(attr) => match attr.value().map_err(self.read_err(name))? {
                netcdf::AttributeValue::Str(s) => s,
                other => return Err(DatasetError::InvalidTimeUnits(format!("{:?}", other))),
            },
            None => return Err(DatasetError::InvalidTimeUnits(String::new())),
        };
        let (unit, base) = parse_time_units(&units)?;
        let raw = self.coordinate(name)?;
        decode_times(&raw, unit, base)
    }

    /// Dimension names of a variable.
    pub fn dimension_names(&self, name: &str) -> DatasetResult<Vec<String>> {
        let var = self.variable(name)?;
        Ok(var.dimensions().iter().map(|d| d.name().to_string()).collect())
    }

    fn expect_dimensions(&self, name: &str, expected: &[&String]) -> DatasetResult<Vec<usize>> {
        let var = self.variable(name)?;
        let found: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
        let matches =
            found.len() == expected.len() && found.iter().zip(expected).all(|(f, e)| f == *e);
        if !matches {
            return Err(DatasetError::UnexpectedDimensions {
                path: self.path.clone(),
                name: name.to_string(),
                found,
                expected: expected.iter().map(|e| e.to_string()).collect(),
            });
        }
        Ok(var.dimensions().iter().map(|d| d.len()).collect())
    }

    /// Reads `time_range` of a `(time, lat, lon)` variable as `[t, lat, lon]`.
    pub fn read_surface_window(
        &self,
        name: &str,
        time_range: Range<usize>,
    ) -> DatasetResult<ArrayD<f32>> {
        let n = &self.names;
        let shape = self.expect_dimensions(name, &[&n.time, &n.latitude, &n.longitude])?;
        self.check_window(name, &time_range, shape[0])?;

        let values = self.read_decoded(name, (time_range.clone(), 0..shape[1], 0..shape[2]))?;
        Ok(ArrayD::from_shape_vec(vec![time_range.len(), shape[1], shape[2]], values)?)
    }

    /// Reads `time_range` of a `(time, level, lat, lon)` variable as `[t, level, lat, lon]`.
    pub fn read_atmospheric_window(
        &self,
        name: &str,
        time_range: Range<usize>,
    ) -> DatasetResult<ArrayD<f32>> {
        let n = &self.names;
        let shape = self.expect_dimensions(name, &[&n.time, &n.level, &n.latitude, &n.longitude])?;
        self.check_window(name, &time_range, shape[0])?;

        let extents = (time_range.clone(), 0..shape[1], 0..shape[2], 0..shape[3]);
        let values = self.read_decoded(name, extents)?;
        Ok(ArrayD::from_shape_vec(
            vec![time_range.len(), shape[1], shape[2], shape[3]],
            values,
        )?)
    }

    /// Reads one timestep of a static `(time, lat, lon)` or `(lat, lon)` variable as `[lat, lon]`.
    pub fn read_static_field(&self, name: &str, time_index: usize) -> DatasetResult<ArrayD<f32>> {
        let n = &self.names;
        let rank = self.variable(name)?.dimensions().len();

        if rank == 2 {
            let shape = self.expect_dimensions(name, &[&n.latitude, &n.longitude])?;
            let values = self.read_decoded(name, ..)?;
            return Ok(ArrayD::from_shape_vec(shape, values)?);
        }

        let shape = self.expect_dimensions(name, &[&n.time, &n.latitude, &n.longitude])?;
        let window = time_index..time_index + 1;
        self.check_window(name, &window, shape[0])?;
        let values = self.read_decoded(name, (window, 0..shape[1], 0..shape[2]))?;
        Ok(ArrayD::from_shape_vec(vec![shape[1], shape[2]], values)?)
    }

    fn check_window(&self, name: &str, window: &Range<usize>, len: usize) -> DatasetResult<()> {
        if window.end > len || window.is_empty() {
            return Err(DatasetError::TimeLayout(format!(
                "'{}' in {} has {} timesteps, window {:?} requested",
                name,
                self.path.display(),
                len,
                window
            )));
        }
        Ok(())
    }
}

/// The three reanalysis inputs of a forecast.
#[derive(Debug)]
pub struct Era5Datasets {
    pub static_vars: Dataset,
    pub surface: Dataset,
    pub atmospheric: Dataset,
}

/// Opens the static, surface-level and atmospheric files.
pub fn load_era5_data(paths: &DataPaths, names: &CoordinateNames) -> DatasetResult<Era5Datasets> {
    Ok(Era5Datasets {
        static_vars: Dataset::open(&paths.static_path, names)?,
        surface: Dataset::open(&paths.surface_path, names)?,
        atmospheric: Dataset::open(&paths.atmospheric_path, names)?,
    })
}
