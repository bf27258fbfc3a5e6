//! # Interactive Map Figures
//!
//! Builds Plotly `scattermapbox` figure descriptions from gridded fields. The
//! figures are plain serde structures; [`crate::html`] embeds them in a page
//! where plotly.js draws them.
//!
//! Colour bounds are computed once from the data (NaN ignored) and written into
//! the marker as `cmin`/`cmax`, so the legend and point colours stay fixed when
//! the user pans or zooms.

use crate::grid::{GriddedField, mean};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Zoom used by the panels of the mockup grid.
pub const MOCKUP_ZOOM: f64 = 6.0;

/// Zoom used by the forecast detail maps.
pub const DETAIL_ZOOM: f64 = 8.0;

const MAP_STYLE: &str = "open-street-map";
const MAP_HEIGHT: u32 = 450;
const OVERVIEW_HEIGHT: u32 = 350;
const OVERVIEW_ZOOM: f64 = 1.2;

/// Named colour scales, serialised as explicit Plotly colour stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorScale {
    #[default]
    #[serde(rename = "RdYlBu_r")]
    RdYlBuReversed,
    #[serde(rename = "RdBu_r")]
    RdBuReversed,
    #[serde(rename = "viridis")]
    Viridis,
}

const RD_YL_BU: [&str; 11] = [
    "#a50026", "#d73027", "#f46d43", "#fdae61", "#fee090", "#ffffbf", "#e0f3f8", "#abd9e9",
    "#74add1", "#4575b4", "#313695",
];

const RD_BU: [&str; 11] = [
    "#67001f", "#b2182b", "#d6604d", "#f4a582", "#fddbc7", "#f7f7f7", "#d1e5f0", "#92c5de",
    "#4393c3", "#2166ac", "#053061",
];

const VIRIDIS: [&str; 10] = [
    "#440154", "#482878", "#3e4989", "#31688e", "#26828e", "#1f9e89", "#35b779", "#6ece58",
    "#b5de2b", "#fde725",
];

impl ColorScale {
    pub fn name(&self) -> &'static str {
        match self {
            ColorScale::RdYlBuReversed => "RdYlBu_r",
            ColorScale::RdBuReversed => "RdBu_r",
            ColorScale::Viridis => "viridis",
        }
    }

    /// Evenly spaced `(position, colour)` stops from 0.0 to 1.0.
    pub fn stops(&self) -> Vec<(f64, String)> {
        let colors: Vec<&str> = match self {
            ColorScale::RdYlBuReversed => RD_YL_BU.iter().rev().copied().collect(),
            ColorScale::RdBuReversed => RD_BU.iter().rev().copied().collect(),
            ColorScale::Viridis => VIRIDIS.to_vec(),
        };
        let last = (colors.len() - 1) as f64;
        colors
            .into_iter()
            .enumerate()
            .map(|(i, c)| (i as f64 / last, c.to_string()))
            .collect()
    }
}

impl fmt::Display for ColorScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rdylbu_r" => Ok(ColorScale::RdYlBuReversed),
            "rdbu_r" => Ok(ColorScale::RdBuReversed),
            "viridis" => Ok(ColorScale::Viridis),
            _ => Err(format!("Unknown color scale: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorBarTitle {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorBar {
    pub title: ColorBarTitle,
}

/// Marker colour: one value per point, or a single CSS colour.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MarkerColor {
    Values(Vec<f32>),
    Fixed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub size: f64,
    pub color: MarkerColor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorscale: Option<Vec<(f64, String)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub showscale: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmin: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmax: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorbar: Option<ColorBar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterMapbox {
    #[serde(rename = "type")]
    pub trace_type: &'static str,
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub mode: String,
    pub marker: Marker,
    pub text: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub textposition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hovertemplate: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mapbox {
    pub style: String,
    pub center: LatLon,
    pub zoom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Margin {
    pub r: u32,
    pub t: u32,
    pub l: u32,
    pub b: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayout {
    pub mapbox: Mapbox,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    pub height: u32,
    pub margin: Margin,
}

/// A complete Plotly figure: traces plus layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapFigure {
    pub data: Vec<ScatterMapbox>,
    pub layout: MapLayout,
}

impl MapFigure {
    /// The fixed `(cmin, cmax)` of the first trace, if it has one.
    pub fn color_bounds(&self) -> Option<(f32, f32)> {
        let marker = &self.data.first()?.marker;
        Some((marker.cmin?, marker.cmax?))
    }

    pub fn center(&self) -> LatLon {
        self.layout.mapbox.center
    }

    pub fn zoom(&self) -> f64 {
        self.layout.mapbox.zoom
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Hover template shown for each grid point.
pub fn hover_template(title: &str, unit: &str) -> String {
    format!(
        "<b>Latitude: %{{lat:.2f}}°</b><br><b>Longitude: %{{lon:.2f}}°</b><br>\
         <b>{}: %{{text}} {}</b><extra></extra>",
        title, unit
    )
}

/// Builds a scatter map of `field` with colour bounds pinned to its data range.
pub fn create_interactive_map(
    field: &GriddedField,
    title: &str,
    unit: &str,
    colorscale: ColorScale,
    zoom: f64,
) -> MapFigure {
    let (rows, cols) = field.shape();
    let mut lat = Vec::with_capacity(rows * cols);
    let mut lon = Vec::with_capacity(rows * cols);
    for &la in field.lats() {
        for &lo in field.lons() {
            lat.push(la);
            lon.push(lo);
        }
    }

    let values: Vec<f32> = field.data().iter().copied().collect();
    let text = values.iter().map(|v| format!("{:.2}", v)).collect();
    let bounds = field.finite_range();

    let trace = ScatterMapbox {
        trace_type: "scattermapbox",
        lat,
        lon,
        mode: "markers".to_string(),
        marker: Marker {
            size: 8.0,
            color: MarkerColor::Values(values),
            colorscale: Some(colorscale.stops()),
            showscale: Some(true),
            cmin: bounds.map(|(lo, _)| lo),
            cmax: bounds.map(|(_, hi)| hi),
            colorbar: Some(ColorBar {
                title: ColorBarTitle {
                    text: unit.to_string(),
                },
            }),
            opacity: Some(0.8),
        },
        text,
        textposition: None,
        hovertemplate: Some(hover_template(title, unit)),
    };

    MapFigure {
        data: vec![trace],
        layout: MapLayout {
            mapbox: Mapbox {
                style: MAP_STYLE.to_string(),
                center: LatLon {
                    lat: mean(field.lats()),
                    lon: mean(field.lons()),
                },
                zoom,
            },
            title: Some(Title {
                text: title.to_string(),
            }),
            height: MAP_HEIGHT,
            margin: Margin { r: 0, t: 30, l: 0, b: 0 },
        },
    }
}

/// World overview with a labelled red marker per named location.
pub fn create_overview_map(locations: &[(&str, f64, f64)]) -> MapFigure {
    let trace = ScatterMapbox {
        trace_type: "scattermapbox",
        lat: locations.iter().map(|(_, lat, _)| *lat).collect(),
        lon: locations.iter().map(|(_, _, lon)| *lon).collect(),
        mode: "markers+text".to_string(),
        marker: Marker {
            size: 12.0,
            color: MarkerColor::Fixed("red".to_string()),
            colorscale: None,
            showscale: None,
            cmin: None,
            cmax: None,
            colorbar: None,
            opacity: None,
        },
        text: locations.iter().map(|(name, _, _)| name.to_string()).collect(),
        textposition: Some("top right".to_string()),
        hovertemplate: None,
    };

    MapFigure {
        data: vec![trace],
        layout: MapLayout {
            mapbox: Mapbox {
                style: MAP_STYLE.to_string(),
                center: LatLon { lat: 0.0, lon: 0.0 },
                zoom: OVERVIEW_ZOOM,
            },
            title: None,
            height: OVERVIEW_HEIGHT,
            margin: Margin { r: 0, t: 0, l: 0, b: 0 },
        },
    }
}
