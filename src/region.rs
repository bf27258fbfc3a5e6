//! # Region Cropping
//!
//! Crops a [`GriddedField`] to a latitude/longitude bounding box.
//!
//! Each axis is tested independently with an inclusive range. The crop keeps
//! the contiguous index span from the first to the last matching index on each
//! axis (a *bounding envelope*), so points inside that span are kept even when
//! their own coordinate falls outside the box. When either axis has no match
//! the crop is [`CropResult::Empty`], which callers treat as "nothing to
//! render" rather than as a failure.

use crate::grid::GriddedField;
use ndarray::s;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Inclusive range on a single coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    pub min_value: f64,
    pub max_value: f64,
}

impl AxisRange {
    pub fn new(min_value: f64, max_value: f64) -> Self {
        AxisRange {
            min_value,
            max_value,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min_value && value <= self.max_value
    }

    /// Indices of `values` that fall inside the range.
    pub fn matching_indices(&self, values: &[f64]) -> Vec<usize> {
        values
            .iter()
            .enumerate()
            .filter(|(_, val)| self.contains(**val))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Index span `first..last + 1` covering every matching value, if any.
    pub fn envelope(&self, values: &[f64]) -> Option<Range<usize>> {
        let first = values.iter().position(|&v| self.contains(v))?;
        let last = values.iter().rposition(|&v| self.contains(v))?;
        Some(first..last + 1)
    }
}

/// A latitude/longitude bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat: AxisRange,
    pub lon: AxisRange,
}

impl BoundingBox {
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        BoundingBox {
            lat: AxisRange::new(lat_min, lat_max),
            lon: AxisRange::new(lon_min, lon_max),
        }
    }

    /// The Maldives with a small buffer around the atolls.
    pub fn maldives() -> Self {
        BoundingBox::new(-1.0, 8.0, 72.0, 74.0)
    }

    /// Parses `lat_min:lat_max:lon_min:lon_max`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 4 {
            return Err("Region must be in format 'lat_min:lat_max:lon_min:lon_max'".to_string());
        }
        let values: Result<Vec<f64>, _> = parts.iter().map(|p| p.trim().parse::<f64>()).collect();
        let values = values.map_err(|_| "Invalid numeric value in region")?;
        if values[0] > values[1] {
            return Err("Minimum latitude must not exceed maximum latitude".to_string());
        }
        if values[2] > values[3] {
            return Err("Minimum longitude must not exceed maximum longitude".to_string());
        }
        Ok(BoundingBox::new(values[0], values[1], values[2], values[3]))
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        BoundingBox::maldives()
    }
}

/// Outcome of cropping a field to a region.
#[derive(Debug, Clone, PartialEq)]
pub enum CropResult {
    Cropped(GriddedField),
    Empty,
}

impl CropResult {
    pub fn as_field(&self) -> Option<&GriddedField> {
        match self {
            CropResult::Cropped(field) => Some(field),
            CropResult::Empty => None,
        }
    }

    pub fn into_field(self) -> Option<GriddedField> {
        match self {
            CropResult::Cropped(field) => Some(field),
            CropResult::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CropResult::Empty)
    }
}

/// Crops `field` to the bounding envelope of `bbox` on each axis.
pub fn crop_to_region(field: &GriddedField, bbox: &BoundingBox) -> CropResult {
    let lat_span = bbox.lat.envelope(field.lats());
    let lon_span = bbox.lon.envelope(field.lons());
    let (Some(lat_span), Some(lon_span)) = (lat_span, lon_span) else {
        return CropResult::Empty;
    };

    let data = field
        .data()
        .slice(s![lat_span.clone(), lon_span.clone()])
        .to_owned();
    let lats = field.lats()[lat_span].to_vec();
    let lons = field.lons()[lon_span].to_vec();

    match GriddedField::new(data, lats, lons) {
        Ok(cropped) => CropResult::Cropped(cropped),
        // Spans come from the field's own axes, so shapes always agree.
        Err(_) => CropResult::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn grid_10x10() -> GriddedField {
        let lats: Vec<f64> = (0..10).map(|v| v as f64).collect();
        let lons: Vec<f64> = (70..80).map(|v| v as f64).collect();
        let data = Array2::from_shape_fn((10, 10), |(i, j)| (i * 10 + j) as f32);
        GriddedField::new(data, lats, lons).unwrap()
    }

    #[test]
    fn test_axis_range_is_inclusive() {
        let range = AxisRange::new(1.0, 3.0);
        assert!(range.contains(1.0));
        assert!(range.contains(3.0));
        assert!(!range.contains(3.0001));
        assert_eq!(range.matching_indices(&[0.0, 1.0, 2.0, 3.0, 4.0]), vec![1, 2, 3]);
    }

    #[test]
    fn test_envelope_spans_interior_outliers() {
        // Non-monotonic axis: index 2 is outside the range but between matches.
        let values = [5.0, 1.0, 9.0, 2.0, 7.0];
        let range = AxisRange::new(0.0, 3.0);
        assert_eq!(range.matching_indices(&values), vec![1, 3]);
        assert_eq!(range.envelope(&values), Some(1..4));
        assert_eq!(AxisRange::new(20.0, 30.0).envelope(&values), None);
    }

    #[test]
    fn test_crop_10x10_to_9x3() {
        let field = grid_10x10();
        let bbox = BoundingBox::new(-1.0, 8.0, 72.0, 74.0);
        let cropped = crop_to_region(&field, &bbox).into_field().unwrap();

        assert_eq!(cropped.shape(), (9, 3));
        assert_eq!(cropped.lats(), &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(cropped.lons(), &[72.0, 73.0, 74.0]);
        assert_eq!(cropped.data()[[0, 0]], 2.0);
        assert_eq!(cropped.data()[[8, 2]], 84.0);
    }

    #[test]
    fn test_crop_keeps_envelope_not_strict_filter() {
        let lats = vec![0.0, 10.0, 1.0];
        let lons = vec![0.0, 1.0];
        let field =
            GriddedField::from_values(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], lats, lons).unwrap();
        let bbox = BoundingBox::new(0.0, 2.0, 0.0, 1.0);

        let cropped = crop_to_region(&field, &bbox).into_field().unwrap();
        assert_eq!(cropped.lats(), &[0.0, 10.0, 1.0]);
        assert_eq!(cropped.shape(), (3, 2));
    }

    #[test]
    fn test_crop_outside_grid_is_empty() {
        let field = grid_10x10();
        assert!(crop_to_region(&field, &BoundingBox::new(20.0, 30.0, 72.0, 74.0)).is_empty());
        assert!(crop_to_region(&field, &BoundingBox::new(0.0, 5.0, 100.0, 110.0)).is_empty());
        assert_eq!(
            crop_to_region(&field, &BoundingBox::new(20.0, 30.0, 100.0, 110.0)),
            CropResult::Empty
        );
    }

    #[test]
    fn test_crop_does_not_mutate_input() {
        let field = grid_10x10();
        let before = field.clone();
        let _ = crop_to_region(&field, &BoundingBox::maldives());
        assert_eq!(field, before);
    }

    #[test]
    fn test_crop_ranges_are_contiguous_for_many_boxes() {
        let field = grid_10x10();
        for lat_min in -2..10 {
            for width in 0..4 {
                let bbox = BoundingBox::new(
                    lat_min as f64,
                    (lat_min + width) as f64,
                    71.5,
                    75.5,
                );
                if let CropResult::Cropped(cropped) = crop_to_region(&field, &bbox) {
                    for pair in cropped.lats().windows(2) {
                        assert_eq!(pair[1] - pair[0], 1.0);
                    }
                    assert_eq!(cropped.lons(), &[72.0, 73.0, 74.0, 75.0]);
                } else {
                    assert!(lat_min + width < 0);
                }
            }
        }
    }

    #[test]
    fn test_parse_region() {
        let bbox = BoundingBox::parse("-1:8:72:74").unwrap();
        assert_eq!(bbox, BoundingBox::maldives());
        assert!(BoundingBox::parse("-1:8:72").is_err());
        assert!(BoundingBox::parse("8:-1:72:74").is_err());
        assert!(BoundingBox::parse("a:8:72:74").is_err());
    }
}
