//! # Pressure-Level Splitter
//!
//! Partitions a large atmospheric NetCDF file into smaller files along its
//! pressure-level axis. Every variable carrying the level dimension is sliced;
//! everything else is copied whole, together with all attributes.
//!
//! Each part reads only its own level hyperslab from the source. When the file
//! has fewer levels than parts, the trailing parts are written with a
//! zero-length level dimension so a split always yields `parts` files.
//!
//! The source file is only removed once every part has been written and
//! re-opened with the expected number of levels. If any part fails, the parts
//! written so far are removed and the source is left untouched.

use log::{debug, info, warn};
use netcdf::types::{FloatType, IntType, NcVariableType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of part files produced by default.
pub const DEFAULT_PARTS: usize = 5;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Source file not found: {0}")]
    NotFound(PathBuf),

    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    #[error("Dimension '{name}' not found in {path}")]
    MissingLevelDimension { path: PathBuf, name: String },

    #[error("Variable '{name}' has unsupported type {kind}")]
    UnsupportedType { name: String, kind: String },

    #[error("Part count must be at least 1, got {0}")]
    InvalidPartCount(usize),

    #[error("Verification of {path} failed: {message}")]
    Verification { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SplitResult<T> = Result<T, SplitError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitOptions {
    pub parts: usize,
    pub level_dimension: String,
    /// Directory for the part files; defaults to the source's directory.
    pub output_dir: Option<PathBuf>,
    pub keep_source: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        SplitOptions {
            parts: DEFAULT_PARTS,
            level_dimension: "pressure_level".to_string(),
            output_dir: None,
            keep_source: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPart {
    pub path: PathBuf,
    pub levels: Vec<f64>,
    pub size_bytes: u64,
}

impl SplitPart {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / 1_048_576.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitReport {
    pub source: PathBuf,
    pub parts: Vec<SplitPart>,
    pub source_deleted: bool,
}

/// Contiguous index ranges for `n` items in `parts` groups.
///
/// Each group has `n / parts` items and the first `n % parts` groups get one
/// more. Groups are empty only when `n < parts`.
pub fn partition_ranges(n: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }
    let base = n / parts;
    let remainder = n % parts;
    let mut start = 0;
    (0..parts)
        .map(|i| {
            let size = base + usize::from(i < remainder);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

/// Groups `levels` in order into `parts` contiguous partitions.
pub fn partition_levels<T: Clone>(levels: &[T], parts: usize) -> Vec<Vec<T>> {
    partition_ranges(levels.len(), parts)
        .into_iter()
        .map(|range| levels[range].to_vec())
        .collect()
}

/// `<dir>/<stem>-part<index>.nc` with a 1-based index.
pub fn part_path(source: &Path, output_dir: Option<&Path>, index: usize) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "split".to_string());
    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| source.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{}-part{}.nc", stem, index))
}

/// One part of a split before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPart {
    /// 1-based.
    pub index: usize,
    pub path: PathBuf,
    pub range: Range<usize>,
    pub levels: Vec<f64>,
}

fn read_plan(
    file: &netcdf::File,
    source: &Path,
    options: &SplitOptions,
) -> SplitResult<Vec<PlannedPart>> {
    let level_count = file
        .dimension(&options.level_dimension)
        .map(|d| d.len())
        .ok_or_else(|| SplitError::MissingLevelDimension {
            path: source.to_path_buf(),
            name: options.level_dimension.clone(),
        })?;
    let level_values = match file.variable(&options.level_dimension) {
        Some(var) => var.get_values::<f64, _>(..)?,
        None => (0..level_count).map(|i| i as f64).collect(),
    };
    Ok(partition_ranges(level_count, options.parts)
        .into_iter()
        .enumerate()
        .map(|(i, range)| PlannedPart {
            index: i + 1,
            path: part_path(source, options.output_dir.as_deref(), i + 1),
            levels: level_values[range.clone()].to_vec(),
            range,
        })
        .collect())
}

/// The parts a split would produce, without writing anything.
pub fn plan_split(source: &Path, options: &SplitOptions) -> SplitResult<Vec<PlannedPart>> {
    if options.parts == 0 {
        return Err(SplitError::InvalidPartCount(options.parts));
    }
    if !source.exists() {
        return Err(SplitError::NotFound(source.to_path_buf()));
    }
    let file = netcdf::open(source)?;
    read_plan(&file, source, options)
}

/// Splits `source` along its pressure-level dimension.
pub fn split_by_pressure_level(source: &Path, options: &SplitOptions) -> SplitResult<SplitReport> {
    if options.parts == 0 {
        return Err(SplitError::InvalidPartCount(options.parts));
    }
    if !source.exists() {
        return Err(SplitError::NotFound(source.to_path_buf()));
    }

    let parts = {
        let file = netcdf::open(source)?;
        let plan = read_plan(&file, source, options)?;
        if let Some(dir) = &options.output_dir {
            fs::create_dir_all(dir)?;
        }
        info!(
            "Splitting {} ({} levels) into {} parts",
            source.display(),
            plan.iter().map(|p| p.range.len()).sum::<usize>(),
            options.parts
        );
        for planned in &plan {
            info!(
                "  Part {}: {} levels {:?}",
                planned.index,
                planned.range.len(),
                planned.levels
            );
            if planned.range.is_empty() {
                warn!("Part {} has no levels and will be written empty", planned.index);
            }
        }

        let level_dim = options.level_dimension.as_str();
        let mut written: Vec<SplitPart> = Vec::new();
        for planned in plan {
            let outcome = write_part(&file, level_dim, &planned.range, &planned.path)
                .and_then(|_| verify_part(&file, level_dim, planned.range.len(), &planned.path));
            if let Err(e) = outcome {
                warn!("Failed to write {}: {}", planned.path.display(), e);
                remove_parts(
                    written
                        .iter()
                        .map(|p| p.path.as_path())
                        .chain(std::iter::once(planned.path.as_path())),
                );
                return Err(e);
            }

            let size_bytes = fs::metadata(&planned.path)?.len();
            let part = SplitPart {
                path: planned.path,
                levels: planned.levels,
                size_bytes,
            };
            info!("Created {} ({:.2} MB)", part.path.display(), part.size_mb());
            written.push(part);
        }
        written
    };

    let source_deleted = if options.keep_source {
        info!("Keeping source file {}", source.display());
        false
    } else {
        fs::remove_file(source)?;
        info!("Deleted source file {}", source.display());
        true
    };

    Ok(SplitReport {
        source: source.to_path_buf(),
        parts,
        source_deleted,
    })
}

fn remove_parts<'a>(paths: impl Iterator<Item = &'a Path>) {
    for path in paths {
        if path.exists() {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed partial output {}", path.display()),
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}

fn write_part(
    source: &netcdf::File,
    level_dim: &str,
    range: &Range<usize>,
    path: &Path,
) -> SplitResult<()> {
    debug!("Writing {} with level indices {:?}", path.display(), range);
    let mut target = netcdf::create(path)?;

    for attr in source.attributes() {
        target.add_attribute(attr.name(), attr.value()?)?;
    }
    for dim in source.dimensions() {
        let name = dim.name().to_string();
        let len = if name == level_dim { range.len() } else { dim.len() };
        target.add_dimension(&name, len)?;
    }
    for var in source.variables() {
        copy_variable(&var, &mut target, level_dim, range)?;
    }

    target.close()?;
    Ok(())
}

fn copy_attributes(source: &netcdf::Variable, target: &mut netcdf::VariableMut) -> SplitResult<()> {
    for attr in source.attributes() {
        target.put_attribute(attr.name(), attr.value()?)?;
    }
    Ok(())
}

/// Per-axis index ranges selecting `range` on `axis` and everything elsewhere.
///
/// `None` when the variable has no level axis and can be read whole.
fn level_hyperslab(
    shape: &[usize],
    axis: Option<usize>,
    range: &Range<usize>,
) -> Option<Vec<Range<usize>>> {
    let axis = axis?;
    Some(
        shape
            .iter()
            .enumerate()
            .map(|(i, &len)| if i == axis { range.clone() } else { 0..len })
            .collect(),
    )
}

fn copy_variable(
    source: &netcdf::Variable,
    target: &mut netcdf::FileMut,
    level_dim: &str,
    range: &Range<usize>,
) -> SplitResult<()> {
    let name = source.name().to_string();
    let dim_names: Vec<String> =
        source.dimensions().iter().map(|d| d.name().to_string()).collect();
    let dims: Vec<&str> = dim_names.iter().map(String::as_str).collect();
    let shape: Vec<usize> = source.dimensions().iter().map(|d| d.len()).collect();
    let level_axis = dim_names.iter().position(|d| d == level_dim);
    let hyperslab = level_hyperslab(&shape, level_axis, range);
    let empty = shape.contains(&0) || (level_axis.is_some() && range.is_empty());

    macro_rules! copy_numeric {
        ($t:ty) => {{
            let mut var = target.add_variable::<$t>(&name, &dims)?;
            copy_attributes(source, &mut var)?;
            if !empty {
                let values = match &hyperslab {
                    Some(ranges) => source.get_values::<$t, _>(ranges.as_slice())?,
                    None => source.get_values::<$t, _>(..)?,
                };
                var.put_values(&values, ..)?;
            }
        }};
    }

    match source.vartype() {
        NcVariableType::Float(FloatType::F32) => copy_numeric!(f32),
        NcVariableType::Float(FloatType::F64) => copy_numeric!(f64),
        NcVariableType::Int(IntType::I8) => copy_numeric!(i8),
        NcVariableType::Int(IntType::U8) => copy_numeric!(u8),
        NcVariableType::Int(IntType::I16) => copy_numeric!(i16),
        NcVariableType::Int(IntType::U16) => copy_numeric!(u16),
        NcVariableType::Int(IntType::I32) => copy_numeric!(i32),
        NcVariableType::Int(IntType::U32) => copy_numeric!(u32),
        NcVariableType::Int(IntType::I64) => copy_numeric!(i64),
        NcVariableType::Int(IntType::U64) => copy_numeric!(u64),
        NcVariableType::String if shape.len() == 1 => {
            let mut var = target.add_string_variable(&name, &dims)?;
            copy_attributes(source, &mut var)?;
            let indices = if level_axis.is_some() { range.clone() } else { 0..shape[0] };
            for (out_index, in_index) in indices.enumerate() {
                let value = source.get_string([in_index])?;
                var.put_string(&value, [out_index])?;
            }
        }
        other => {
            return Err(SplitError::UnsupportedType {
                name,
                kind: format!("{:?}", other),
            });
        }
    }
    Ok(())
}

fn verify_part(
    source: &netcdf::File,
    level_dim: &str,
    expected_levels: usize,
    path: &Path,
) -> SplitResult<()> {
    let fail = |message: String| SplitError::Verification {
        path: path.to_path_buf(),
        message,
    };
    let part = netcdf::open(path).map_err(|e| fail(e.to_string()))?;
    let found = part
        .dimension(level_dim)
        .map(|d| d.len())
        .ok_or_else(|| fail(format!("dimension '{}' missing", level_dim)))?;
    if found != expected_levels {
        return Err(fail(format!("expected {} levels, found {}", expected_levels, found)));
    }
    for var in source.variables() {
        let name = var.name().to_string();
        if part.variable(&name).is_none() {
            return Err(fail(format!("variable '{}' missing", name)));
        }
    }
    Ok(())
}
