//! # Model Interchange Files
//!
//! The external forecasting model runs in its own process. Batches are handed
//! to it as a NetCDF file and predictions come back the same way.
//!
//! Batch file layout:
//! - dimensions `history`, `level`, `latitude`, `longitude`
//! - coordinate variables `latitude`, `longitude`, `level`
//! - `surf_<name>(history, latitude, longitude)`, `static_<name>(latitude, longitude)`,
//!   `atmos_<name>(history, level, latitude, longitude)`
//! - global attribute `time` (RFC 3339)
//!
//! Prediction file layout: the same variables with `step` in place of
//! `history`, static variables omitted, and an optional `time(step)` variable
//! with CF units.

use crate::batch::{ForecastBatch, Metadata};
use crate::dataset::{decode_times, parse_time_units};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InterchangeError {
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("Variable '{0}' missing from interchange file")]
    MissingVariable(String),

    #[error("Interchange layout error: {0}")]
    Layout(String),

    #[error("Failed to build array: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

pub type InterchangeResult<T> = Result<T, InterchangeError>;

const SURF_PREFIX: &str = "surf_";
const STATIC_PREFIX: &str = "static_";
const ATMOS_PREFIX: &str = "atmos_";

fn flat(array: &ArrayD<f32>) -> Vec<f32> {
    array.iter().copied().collect()
}

/// The last history step of `array`; an error when it has none.
fn last_step<'a>(name: &str, array: &'a ArrayD<f32>) -> InterchangeResult<ArrayViewD<'a, f32>> {
    let last = array
        .shape()
        .first()
        .and_then(|len| len.checked_sub(1))
        .ok_or_else(|| InterchangeError::Layout(format!("'{}' has no history steps", name)))?;
    Ok(array.index_axis(Axis(0), last))
}

/// Writes `batch` to a new NetCDF file at `path`.
pub fn write_batch(batch: &ForecastBatch, path: &Path) -> InterchangeResult<()> {
    debug!("Writing batch interchange file: {}", path.display());
    let meta = &batch.metadata;
    let mut file = netcdf::create(path)?;

    file.add_dimension("history", batch.history_len())?;
    file.add_dimension("level", meta.atmos_levels.len())?;
    file.add_dimension("latitude", meta.lat.len())?;
    file.add_dimension("longitude", meta.lon.len())?;
    file.add_attribute("time", meta.time.to_rfc3339())?;

    write_coordinates(&mut file, meta)?;

    for (name, array) in &batch.surf_vars {
        let mut var = file.add_variable::<f32>(
            &format!("{}{}", SURF_PREFIX, name),
            &["history", "latitude", "longitude"],
        )?;
        var.put_values(&flat(array), ..)?;
    }
    for (name, array) in &batch.static_vars {
        let var_name = format!("{}{}", STATIC_PREFIX, name);
        let mut var = file.add_variable::<f32>(&var_name, &["latitude", "longitude"])?;
        var.put_values(&flat(array), ..)?;
    }
    for (name, array) in &batch.atmos_vars {
        let mut var = file.add_variable::<f32>(
            &format!("{}{}", ATMOS_PREFIX, name),
            &["history", "level", "latitude", "longitude"],
        )?;
        var.put_values(&flat(array), ..)?;
    }

    file.close()?;
    Ok(())
}

fn write_coordinates(file: &mut netcdf::FileMut, meta: &Metadata) -> InterchangeResult<()> {
    {
        let mut lat = file.add_variable::<f64>("latitude", &["latitude"])?;
        lat.put_attribute("units", "degrees_north")?;
        lat.put_values(&meta.lat, ..)?;
    }
    {
        let mut lon = file.add_variable::<f64>("longitude", &["longitude"])?;
        lon.put_attribute("units", "degrees_east")?;
        lon.put_values(&meta.lon, ..)?;
    }
    {
        let levels: Vec<f64> = meta.atmos_levels.iter().map(|&l| l as f64).collect();
        let mut level = file.add_variable::<f64>("level", &["level"])?;
        level.put_attribute("units", "hPa")?;
        level.put_values(&levels, ..)?;
    }
    Ok(())
}

/// Writes a prediction sequence. Used by tests and by stand-in model programs.
pub fn write_predictions(predictions: &[ForecastBatch], path: &Path) -> InterchangeResult<()> {
    let first = predictions
        .first()
        .ok_or_else(|| InterchangeError::Layout("no predictions to write".to_string()))?;
    let meta = &first.metadata;
    let mut file = netcdf::create(path)?;

    file.add_dimension("step", predictions.len())?;
    file.add_dimension("level", meta.atmos_levels.len())?;
    file.add_dimension("latitude", meta.lat.len())?;
    file.add_dimension("longitude", meta.lon.len())?;
    write_coordinates(&mut file, meta)?;

    {
        let seconds: Vec<f64> =
            predictions.iter().map(|p| p.metadata.time.timestamp() as f64).collect();
        let mut time = file.add_variable::<f64>("time", &["step"])?;
        time.put_attribute("units", "seconds since 1970-01-01 00:00:00")?;
        time.put_values(&seconds, ..)?;
    }

    for name in first.surf_vars.keys() {
        let mut values = Vec::new();
        for prediction in predictions {
            let array = prediction
                .surf_vars
                .get(name)
                .ok_or_else(|| InterchangeError::MissingVariable(name.clone()))?;
            values.extend(last_step(name, array)?.iter().copied());
        }
        let mut var = file.add_variable::<f32>(
            &format!("{}{}", SURF_PREFIX, name),
            &["step", "latitude", "longitude"],
        )?;
        var.put_values(&values, ..)?;
    }
    for name in first.atmos_vars.keys() {
        let mut values = Vec::new();
        for prediction in predictions {
            let array = prediction
                .atmos_vars
                .get(name)
                .ok_or_else(|| InterchangeError::MissingVariable(name.clone()))?;
            values.extend(last_step(name, array)?.iter().copied());
        }
        let mut var = file.add_variable::<f32>(
            &format!("{}{}", ATMOS_PREFIX, name),
            &["step", "level", "latitude", "longitude"],
        )?;
        var.put_values(&values, ..)?;
    }

    file.close()?;
    Ok(())
}

/// Reads predictions written by the external model.
///
/// Each returned batch carries a single history step, the static fields of
/// `input`, and the input grid metadata.
pub fn read_predictions(
    path: &Path,
    input: &ForecastBatch,
    steps: usize,
) -> InterchangeResult<Vec<ForecastBatch>> {
    debug!("Reading prediction interchange file: {}", path.display());
    let file = netcdf::open(path)?;
    let meta = &input.metadata;
    let (nlat, nlon, nlev) = (meta.lat.len(), meta.lon.len(), meta.atmos_levels.len());

    let found_steps = file
        .dimension("step")
        .map(|d| d.len())
        .ok_or_else(|| InterchangeError::MissingVariable("step".to_string()))?;
    if found_steps != steps {
        return Err(InterchangeError::Layout(format!(
            "expected {} prediction steps, found {}",
            steps, found_steps
        )));
    }

    let times = read_times(&file, meta.time, steps)?;

    let mut surf: BTreeMap<String, ArrayD<f32>> = BTreeMap::new();
    for name in input.surf_vars.keys() {
        let var_name = format!("{}{}", SURF_PREFIX, name);
        let var = file
            .variable(&var_name)
            .ok_or_else(|| InterchangeError::MissingVariable(var_name.clone()))?;
        let values = var.get_values::<f32, _>(..)?;
        surf.insert(name.clone(), ArrayD::from_shape_vec(IxDyn(&[steps, nlat, nlon]), values)?);
    }

    let mut atmos: BTreeMap<String, ArrayD<f32>> = BTreeMap::new();
    for name in input.atmos_vars.keys() {
        let var_name = format!("{}{}", ATMOS_PREFIX, name);
        let var = file
            .variable(&var_name)
            .ok_or_else(|| InterchangeError::MissingVariable(var_name.clone()))?;
        let values = var.get_values::<f32, _>(..)?;
        atmos.insert(
            name.clone(),
            ArrayD::from_shape_vec(IxDyn(&[steps, nlev, nlat, nlon]), values)?,
        );
    }

    let predictions = (0..steps)
        .map(|step| ForecastBatch {
            surf_vars: at_step(&surf, step),
            static_vars: input.static_vars.clone(),
            atmos_vars: at_step(&atmos, step),
            metadata: Metadata {
                time: times[step],
                ..meta.clone()
            },
        })
        .collect();
    Ok(predictions)
}

/// Step `step` of each variable as a single-history array.
fn at_step(vars: &BTreeMap<String, ArrayD<f32>>, step: usize) -> BTreeMap<String, ArrayD<f32>> {
    vars.iter()
        .map(|(k, a)| (k.clone(), a.index_axis(Axis(0), step).insert_axis(Axis(0)).to_owned()))
        .collect()
}

fn read_times(
    file: &netcdf::File,
    start: DateTime<Utc>,
    steps: usize,
) -> InterchangeResult<Vec<DateTime<Utc>>> {
    let Some(var) = file.variable("time") else {
        return Ok((1..=steps as i64).map(|i| start + Duration::hours(6 * i)).collect());
    };
    let units = match var.attribute("units").map(|a| a.value()).transpose()? {
        Some(netcdf::AttributeValue::Str(s)) => s,
        _ => {
            return Err(InterchangeError::Layout(
                "time variable has no string units".to_string(),
            ));
        }
    };
    let (unit, base) =
        parse_time_units(&units).map_err(|e| InterchangeError::Layout(e.to_string()))?;
    let raw = var.get_values::<f64, _>(..)?;
    if raw.len() != steps {
        return Err(InterchangeError::Layout(format!(
            "time variable has {} entries, expected {}",
            raw.len(),
            steps
        )));
    }
    decode_times(&raw, unit, base).map_err(|e| InterchangeError::Layout(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::fixtures::small_batch;
    use tempfile::tempdir;

    #[test]
    fn test_batch_file_layout() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("batch.nc");
        let batch = small_batch(3, 4);
        write_batch(&batch, &path)?;

        let file = netcdf::open(&path)?;
        assert_eq!(file.dimension("history").map(|d| d.len()), Some(2));
        assert_eq!(file.dimension("level").map(|d| d.len()), Some(3));
        assert!(file.variable("surf_2t").is_some());
        assert!(file.variable("static_lsm").is_some());
        assert!(file.variable("atmos_z").is_some());

        let msl = file.variable("surf_msl").unwrap().get_values::<f32, _>(..)?;
        assert_eq!(msl, flat(&batch.surf_vars["msl"]));
        Ok(())
    }

    #[test]
    fn test_predictions_read_back() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("preds.nc");
        let input = small_batch(2, 3);

        let mut outputs = Vec::new();
        for step in 1..=3 {
            let mut pred = input.clone();
            for array in pred.surf_vars.values_mut() {
                array.mapv_inplace(|v| v + step as f32);
            }
            pred.metadata.time = input.metadata.time + Duration::hours(6 * step);
            outputs.push(pred);
        }
        write_predictions(&outputs, &path)?;

        let preds = read_predictions(&path, &input, 3)?;
        assert_eq!(preds.len(), 3);
        assert_eq!(preds[2].metadata.time, input.metadata.time + Duration::hours(18));
        assert_eq!(preds[0].surf_vars["2t"].shape(), &[1, 2, 3]);
        let expected = input.surface_field("2t")?.data()[[1, 2]] + 2.0;
        assert_eq!(preds[1].surface_field("2t")?.data()[[1, 2]], expected);
        assert_eq!(preds[0].static_vars, input.static_vars);
        assert!(preds.iter().all(|p| p.validate().is_ok()));
        Ok(())
    }

    #[test]
    fn test_step_count_mismatch() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("preds.nc");
        let input = small_batch(2, 2);
        write_predictions(&[input.clone(), input.clone()], &path)?;

        let err = read_predictions(&path, &input, 6).unwrap_err();
        assert!(matches!(err, InterchangeError::Layout(_)));
        Ok(())
    }

    #[test]
    fn test_missing_atmospheric_prediction_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("preds.nc");
        let input = small_batch(2, 2);
        let mut partial = input.clone();
        partial.atmos_vars.remove("q");
        write_predictions(&[partial.clone(), partial], &path)?;

        let err = read_predictions(&path, &input, 2).unwrap_err();
        assert!(matches!(err, InterchangeError::MissingVariable(ref name) if name == "atmos_q"));
        Ok(())
    }

    #[test]
    fn test_prediction_without_history_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("preds.nc");
        let mut empty = small_batch(2, 2);
        for array in empty.surf_vars.values_mut() {
            *array = ArrayD::zeros(IxDyn(&[0, 2, 2]));
        }

        let err = write_predictions(&[empty], &path).unwrap_err();
        assert!(matches!(err, InterchangeError::Layout(ref m) if m.contains("no history steps")));
        Ok(())
    }
}
