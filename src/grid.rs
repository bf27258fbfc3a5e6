//! # Gridded Fields
//!
//! A [`GriddedField`] is a 2-D array indexed by latitude and longitude together
//! with the 1-D coordinate arrays of both axes. Fields are produced by the
//! dataset loader or by a forecast step and are read-only afterwards.

use ndarray::{Array2, ArrayView2};
use thiserror::Error;

/// Errors raised when a field and its axes disagree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("field shape {actual:?} does not match axes (lat: {lat_len}, lon: {lon_len})")]
    ShapeMismatch {
        actual: (usize, usize),
        lat_len: usize,
        lon_len: usize,
    },

    #[error("cannot build a {rows}x{cols} field from {len} values")]
    InvalidLength { rows: usize, cols: usize, len: usize },
}

/// A 2-D field on a regular latitude/longitude grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedField {
    data: Array2<f32>,
    lats: Vec<f64>,
    lons: Vec<f64>,
}

impl GriddedField {
    /// Creates a field, checking that `data` is shaped `(lats.len(), lons.len())`.
    pub fn new(data: Array2<f32>, lats: Vec<f64>, lons: Vec<f64>) -> Result<Self, GridError> {
        let (rows, cols) = data.dim();
        if rows != lats.len() || cols != lons.len() {
            return Err(GridError::ShapeMismatch {
                actual: (rows, cols),
                lat_len: lats.len(),
                lon_len: lons.len(),
            });
        }
        Ok(GriddedField { data, lats, lons })
    }

    /// Creates a field from row-major values.
    pub fn from_values(
        values: Vec<f32>,
        lats: Vec<f64>,
        lons: Vec<f64>,
    ) -> Result<Self, GridError> {
        let (rows, cols) = (lats.len(), lons.len());
        let len = values.len();
        let data = Array2::from_shape_vec((rows, cols), values)
            .map_err(|_| GridError::InvalidLength { rows, cols, len })?;
        GriddedField::new(data, lats, lons)
    }

    /// A field of zeros over the given axes.
    pub fn zeros(lats: Vec<f64>, lons: Vec<f64>) -> Self {
        let data = Array2::zeros((lats.len(), lons.len()));
        GriddedField { data, lats, lons }
    }

    pub fn data(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    pub fn lats(&self) -> &[f64] {
        &self.lats
    }

    pub fn lons(&self) -> &[f64] {
        &self.lons
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Minimum and maximum of the field, skipping NaN. `None` when every value is NaN.
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Arithmetic mean of a coordinate axis; `0.0` for an empty axis.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_mismatched_axes() {
        let data = Array2::<f32>::zeros((3, 4));
        let err = GriddedField::new(data, vec![0.0, 1.0, 2.0], vec![0.0, 1.0]).unwrap_err();
        assert_eq!(
            err,
            GridError::ShapeMismatch {
                actual: (3, 4),
                lat_len: 3,
                lon_len: 2
            }
        );
    }

    #[test]
    fn test_from_values_row_major() {
        let field = GriddedField::from_values(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![0.0, 1.0],
            vec![10.0, 11.0, 12.0],
        )
        .unwrap();
        assert_eq!(field.shape(), (2, 3));
        assert_eq!(field.data()[[1, 0]], 4.0);
        assert!(
            GriddedField::from_values(vec![1.0; 5], vec![0.0, 1.0], vec![0.0, 1.0, 2.0]).is_err()
        );
    }

    #[test]
    fn test_finite_range_skips_nan() {
        let field = GriddedField::from_values(
            vec![f32::NAN, 2.5, -1.0, f32::NAN],
            vec![0.0, 1.0],
            vec![0.0, 1.0],
        )
        .unwrap();
        assert_eq!(field.finite_range(), Some((-1.0, 2.5)));

        let all_nan =
            GriddedField::from_values(vec![f32::NAN; 4], vec![0.0, 1.0], vec![0.0, 1.0]).unwrap();
        assert_eq!(all_nan.finite_range(), None);
    }

    #[test]
    fn test_linspace_endpoints() {
        let values = linspace(2.2, 4.2, 8);
        assert_eq!(values.len(), 8);
        assert!((values[0] - 2.2).abs() < 1e-12);
        assert!((values[7] - 4.2).abs() < 1e-12);
        assert_eq!(linspace(1.0, 5.0, 1), vec![1.0]);
        assert!(linspace(1.0, 5.0, 0).is_empty());
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(mean(&[]), 0.0);
    }
}
