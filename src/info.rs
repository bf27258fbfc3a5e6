//! # NetCDF File Information Module
//!
//! Extracts and displays information about NetCDF files: dimensions,
//! variables, attributes and, when the file carries ERA5-style coordinates,
//! the decoded time axis, pressure levels and grid extent.

use crate::dataset::{CoordinateNames, Dataset};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Information about a NetCDF dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetCdfDimensionInfo {
    pub name: String,
    pub length: usize,
    pub is_unlimited: bool,
}

/// Information about a NetCDF variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetCdfVariableInfo {
    pub name: String,
    pub data_type: String,
    pub dimensions: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub shape: Vec<usize>,
}

/// Coordinates decoded from an ERA5 file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GridSummary {
    pub times: Vec<String>,
    pub pressure_levels: Vec<i64>,
    pub latitude_range: Option<(f64, f64)>,
    pub longitude_range: Option<(f64, f64)>,
    pub grid_shape: Option<(usize, usize)>,
}

/// Complete information about a NetCDF file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetCdfInfo {
    pub path: String,
    pub dimensions: Vec<NetCdfDimensionInfo>,
    pub variables: Vec<NetCdfVariableInfo>,
    pub global_attributes: BTreeMap<String, String>,
    pub file_size: Option<u64>,
    pub total_variables: usize,
    pub total_dimensions: usize,
    pub grid: Option<GridSummary>,
}

/// Extract comprehensive information from a NetCDF file
pub async fn get_netcdf_info(
    file_path: &Path,
    variable: Option<&str>,
    detailed: bool,
) -> Result<NetCdfInfo> {
    debug!("Opening NetCDF file: {}", file_path.display());
    let file = netcdf::open(file_path)
        .with_context(|| format!("Failed to open NetCDF file: {}", file_path.display()))?;

    let file_size = tokio::fs::metadata(file_path).await.ok().map(|metadata| metadata.len());

    let dimensions: Vec<NetCdfDimensionInfo> = file
        .dimensions()
        .map(|dim| NetCdfDimensionInfo {
            name: dim.name().to_string(),
            length: dim.len(),
            is_unlimited: dim.is_unlimited(),
        })
        .collect();

    let mut variables = Vec::new();
    for var in file.variables() {
        if let Some(var_name) = variable
            && var.name() != var_name
        {
            continue;
        }

        let mut attributes = BTreeMap::new();
        for attr in var.attributes() {
            if let Ok(value) = attr.value() {
                attributes.insert(attr.name().to_string(), format_attribute_value(&value));
            }
        }

        variables.push(NetCdfVariableInfo {
            name: var.name().to_string(),
            data_type: format_variable_type(&var.vartype()),
            dimensions: var.dimensions().iter().map(|d| d.name().to_string()).collect(),
            attributes,
            shape: var.dimensions().iter().map(|d| d.len()).collect(),
        });
    }

    if let Some(var_name) = variable
        && variables.is_empty()
    {
        anyhow::bail!("Variable '{}' not found in {}", var_name, file_path.display());
    }

    let mut global_attributes = BTreeMap::new();
    if detailed {
        for attr in file.attributes() {
            if let Ok(value) = attr.value() {
                global_attributes.insert(attr.name().to_string(), format_attribute_value(&value));
            }
        }
    }

    file.close().context("Failed to close NetCDF file")?;

    let grid = summarize_grid(file_path, &CoordinateNames::default());

    Ok(NetCdfInfo {
        path: file_path.display().to_string(),
        total_dimensions: dimensions.len(),
        total_variables: variables.len(),
        dimensions,
        variables,
        global_attributes,
        file_size,
        grid,
    })
}

/// Decodes whichever ERA5 coordinates the file has; `None` when it has none.
pub fn summarize_grid(path: &Path, names: &CoordinateNames) -> Option<GridSummary> {
    let dataset = Dataset::open(path, names).ok()?;
    let mut summary = GridSummary::default();
    let mut found = false;

    if dataset.has_variable(&names.time) {
        match dataset.times() {
            Ok(times) => {
                summary.times =
                    times.iter().map(|t| t.format("%Y-%m-%d %H:%M").to_string()).collect();
                found = true;
            }
            Err(e) => debug!("Time axis of {} not decoded: {}", path.display(), e),
        }
    }
    if dataset.has_variable(&names.level)
        && let Ok(levels) = dataset.levels()
    {
        summary.pressure_levels = levels;
        found = true;
    }
    let lats = dataset.latitudes().ok();
    let lons = dataset.longitudes().ok();
    if let Some(lats) = &lats {
        summary.latitude_range = extent(lats);
        found = true;
    }
    if let Some(lons) = &lons {
        summary.longitude_range = extent(lons);
        found = true;
    }
    if let (Some(lats), Some(lons)) = (&lats, &lons) {
        summary.grid_shape = Some((lats.len(), lons.len()));
    }

    found.then_some(summary)
}

fn extent(values: &[f64]) -> Option<(f64, f64)> {
    let min = values.iter().copied().reduce(f64::min)?;
    let max = values.iter().copied().reduce(f64::max)?;
    Some((min, max))
}

/// Format netcdf attribute value for display
fn format_attribute_value(value: &netcdf::AttributeValue) -> String {
    match value {
        netcdf::AttributeValue::Str(s) => s.clone(),
        other => format!("{:?}", other),
    }
}

/// Format netcdf variable type for display
fn format_variable_type(var_type: &netcdf::types::NcVariableType) -> String {
    format!("{:?}", var_type)
}

/// Print NetCDF info in human-readable format
pub fn print_file_info_human(info: &NetCdfInfo) {
    println!("NetCDF File Information:");
    println!("  Path: {}", info.path);
    if let Some(size) = info.file_size {
        println!("  File Size: {:.2} MB", size as f64 / 1_048_576.0);
    }
    println!("  Dimensions: {} total", info.total_dimensions);
    for dim in &info.dimensions {
        println!(
            "    {} ({}{})",
            dim.name,
            dim.length,
            if dim.is_unlimited { ", unlimited" } else { "" }
        );
    }
    println!("  Variables: {} total", info.total_variables);
    for var in &info.variables {
        println!(
            "    {} ({}) - dimensions: [{}]",
            var.name,
            var.data_type,
            var.dimensions.join(", ")
        );
        for (name, value) in &var.attributes {
            println!("      @{}: {}", name, value);
        }
    }
    if let Some(grid) = &info.grid {
        println!("  Grid:");
        if let (Some(first), Some(last)) = (grid.times.first(), grid.times.last()) {
            println!("    Times: {} steps, {} to {}", grid.times.len(), first, last);
        }
        if !grid.pressure_levels.is_empty() {
            let levels: Vec<String> = grid.pressure_levels.iter().map(|l| l.to_string()).collect();
            println!("    Pressure levels: {} hPa", levels.join(", "));
        }
        if let Some((min, max)) = grid.latitude_range {
            println!("    Latitude: {} to {}", min, max);
        }
        if let Some((min, max)) = grid.longitude_range {
            println!("    Longitude: {} to {}", min, max);
        }
    }
    if !info.global_attributes.is_empty() {
        println!("  Global Attributes:");
        for (name, value) in &info.global_attributes {
            println!("    @{}: {}", name, value);
        }
    }
}

/// Print NetCDF info in JSON format
pub fn print_file_info_json(info: &NetCdfInfo) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(info)?);
    Ok(())
}

/// Print NetCDF info in YAML format
pub fn print_file_info_yaml(info: &NetCdfInfo) -> Result<()> {
    let yaml = serde_yaml::to_string(info).context("Failed to serialize NetCDF info to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// Variables as CSV rows.
pub fn file_info_csv(info: &NetCdfInfo) -> String {
    let mut csv = String::from("variable_name,data_type,dimensions,shape,attributes_count\n");
    for var in &info.variables {
        let shape: Vec<String> = var.shape.iter().map(|s| s.to_string()).collect();
        csv.push_str(&format!(
            "{},{},\"{}\",\"{}\",{}\n",
            var.name,
            var.data_type,
            var.dimensions.join(";"),
            shape.join(";"),
            var.attributes.len()
        ));
    }
    csv
}

/// Print NetCDF info in CSV format (variables only)
pub fn print_file_info_csv(info: &NetCdfInfo) -> Result<()> {
    print!("{}", file_info_csv(info));
    Ok(())
}
