//! # Dashboard Views
//!
//! Two views are provided: the mockup dashboard (placeholder maps for a set of
//! Indian Ocean locations) and the forecast dashboard (model predictions
//! cropped to a region).
//!
//! View state is an explicit value. Input handlers (`select_*`) are the only
//! mutators, and rendering is a pure function of state and data that returns
//! a [`Page`].

use crate::batch::{BatchError, ForecastBatch};
use crate::grid::{GriddedField, linspace};
use crate::map::{
    ColorScale, DETAIL_ZOOM, MOCKUP_ZOOM, MapFigure, create_interactive_map, create_overview_map,
};
use crate::pipeline::{PipelineError, failure_checklist};
use crate::region::{BoundingBox, CropResult, crop_to_region};
use crate::timeslot::DisplayTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Unknown location '{0}'")]
    UnknownLocation(String),

    #[error("Tab must be between 1 and 4, got {0}")]
    InvalidTab(usize),

    #[error("{0}")]
    InvalidTime(String),

    #[error("Prediction step {index} not available ({available} steps)")]
    MissingStep { index: usize, available: usize },

    #[error(transparent)]
    Batch(#[from] BatchError),
}

pub type DashboardResult<T> = Result<T, DashboardError>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

pub const LOCATIONS: [Location; 9] = [
    Location { name: "Malé", lat: 3.2, lon: 73.2 },
    Location { name: "Port Louis", lat: -20.16, lon: 57.50 },
    Location { name: "Chennai", lat: 13.08, lon: 80.27 },
    Location { name: "Dar es Salaam", lat: -6.8, lon: 39.28 },
    Location { name: "Perth", lat: -31.95, lon: 115.86 },
    Location { name: "Muscat", lat: 23.61, lon: 58.59 },
    Location { name: "Maputo", lat: -25.97, lon: 32.58 },
    Location { name: "Jakarta", lat: -6.21, lon: 106.85 },
    Location { name: "Phuket", lat: 7.88, lon: 98.39 },
];

pub fn find_location(name: &str) -> Option<&'static Location> {
    let wanted = name.trim().to_lowercase();
    LOCATIONS.iter().find(|l| l.name.to_lowercase() == wanted)
}

pub const TAB_COUNT: usize = 4;
pub const VARIABLES_PER_TAB: usize = 9;

const MOCKUP_GRID_POINTS: usize = 8;
const MOCKUP_HALF_SPAN: f64 = 1.0;

/// Placeholder variable names "Variable 1" .. "Variable 36".
pub fn mockup_variables() -> Vec<String> {
    (1..=TAB_COUNT * VARIABLES_PER_TAB).map(|i| format!("Variable {}", i)).collect()
}

/// The nine variables shown on a 1-based tab.
pub fn variables_for_tab(tab: usize) -> DashboardResult<Vec<String>> {
    if !(1..=TAB_COUNT).contains(&tab) {
        return Err(DashboardError::InvalidTab(tab));
    }
    let start = (tab - 1) * VARIABLES_PER_TAB;
    Ok(mockup_variables()[start..start + VARIABLES_PER_TAB].to_vec())
}

/// A surface variable rendered by the forecast view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastVariable {
    pub key: &'static str,
    pub title: &'static str,
    pub unit: &'static str,
    pub colorscale: ColorScale,
}

pub const FORECAST_VARIABLES: [ForecastVariable; 4] = [
    ForecastVariable {
        key: "2t",
        title: "2m Temperature",
        unit: "K",
        colorscale: ColorScale::RdYlBuReversed,
    },
    ForecastVariable {
        key: "10u",
        title: "10m Eastward Wind",
        unit: "m/s",
        colorscale: ColorScale::RdBuReversed,
    },
    ForecastVariable {
        key: "10v",
        title: "10m Southward Wind",
        unit: "m/s",
        colorscale: ColorScale::RdBuReversed,
    },
    ForecastVariable {
        key: "msl",
        title: "Mean Sea Level Pressure",
        unit: "Pa",
        colorscale: ColorScale::Viridis,
    },
];

/// Variable indices per forecast column.
const FORECAST_COLUMNS: [[usize; 2]; 2] = [[0, 2], [1, 3]];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Panel {
    Map { figure: MapFigure },
    Warning { message: String },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub heading: Option<String>,
    pub columns: Vec<Vec<Panel>>,
}

/// A rendered view: sections of panels laid out in columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub title: String,
    pub subheading: Option<String>,
    pub sections: Vec<Section>,
    pub errors: Vec<String>,
    pub notes: Vec<String>,
}

impl Page {
    /// All map figures in section and column order.
    pub fn figures(&self) -> impl Iterator<Item = &MapFigure> {
        self.panels().filter_map(|p| match p {
            Panel::Map { figure } => Some(figure),
            _ => None,
        })
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.panels().filter_map(|p| match p {
            Panel::Warning { message } => Some(message.as_str()),
            _ => None,
        })
    }

    fn panels(&self) -> impl Iterator<Item = &Panel> {
        self.sections.iter().flat_map(|s| s.columns.iter().flatten())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockupState {
    pub location: String,
    /// 1-based.
    pub tab: usize,
}

impl Default for MockupState {
    fn default() -> Self {
        MockupState {
            location: LOCATIONS[0].name.to_string(),
            tab: 1,
        }
    }
}

impl MockupState {
    pub fn select_location(&mut self, name: &str) -> DashboardResult<()> {
        let location = find_location(name)
            .ok_or_else(|| DashboardError::UnknownLocation(name.to_string()))?;
        self.location = location.name.to_string();
        Ok(())
    }

    pub fn select_tab(&mut self, tab: usize) -> DashboardResult<()> {
        if !(1..=TAB_COUNT).contains(&tab) {
            return Err(DashboardError::InvalidTab(tab));
        }
        self.tab = tab;
        Ok(())
    }
}

pub fn mockup_heading(location: &str, tab: usize) -> String {
    let first = (tab - 1) * VARIABLES_PER_TAB + 1;
    format!(
        "3x3 Grid of Maps for {} (Variables {}-{})",
        location,
        first,
        first + VARIABLES_PER_TAB - 1
    )
}

pub fn render_mockup_page(state: &MockupState) -> DashboardResult<Page> {
    let location = find_location(&state.location)
        .ok_or_else(|| DashboardError::UnknownLocation(state.location.clone()))?;
    let variables = variables_for_tab(state.tab)?;

    let overview: Vec<(&str, f64, f64)> =
        LOCATIONS.iter().map(|l| (l.name, l.lat, l.lon)).collect();
    let options: Vec<&str> = LOCATIONS.iter().map(|l| l.name).collect();
    let tabs: Vec<String> = (1..=TAB_COUNT)
        .map(|t| if t == state.tab { format!("[Tab {}]", t) } else { format!("Tab {}", t) })
        .collect();

    let header = Section {
        heading: None,
        columns: vec![
            vec![
                Panel::Text {
                    text: "World Map".to_string(),
                },
                Panel::Map {
                    figure: create_overview_map(&overview),
                },
            ],
            vec![
                Panel::Text {
                    text: "Location Selector".to_string(),
                },
                Panel::Text {
                    text: format!("Selected: {} (options: {})", location.name, options.join(", ")),
                },
            ],
        ],
    };
    let tab_bar = Section {
        heading: None,
        columns: tabs.into_iter().map(|text| vec![Panel::Text { text }]).collect(),
    };

    let around = |center: f64| {
        linspace(center - MOCKUP_HALF_SPAN, center + MOCKUP_HALF_SPAN, MOCKUP_GRID_POINTS)
    };
    let lats = around(location.lat);
    let lons = around(location.lon);
    let field = GriddedField::zeros(lats, lons);

    // Row-major 3x3 grid: column j holds variables j, j+3, j+6.
    let mut columns: Vec<Vec<Panel>> = vec![Vec::new(), Vec::new(), Vec::new()];
    for (index, variable) in variables.iter().enumerate() {
        let scale = ColorScale::RdYlBuReversed;
        let figure = create_interactive_map(&field, variable, "unit", scale, MOCKUP_ZOOM);
        columns[index % 3].push(Panel::Map { figure });
    }
    let grid = Section {
        heading: Some(mockup_heading(location.name, state.tab)),
        columns,
    };

    Ok(Page {
        title: "Aurora Design Mockup".to_string(),
        subheading: None,
        sections: vec![header, tab_bar, grid],
        errors: Vec::new(),
        notes: Vec::new(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastViewState {
    pub time: DisplayTime,
    pub region: BoundingBox,
    pub region_name: String,
}

impl Default for ForecastViewState {
    fn default() -> Self {
        ForecastViewState {
            time: DisplayTime::default(),
            region: BoundingBox::maldives(),
            region_name: "Maldives".to_string(),
        }
    }
}

impl ForecastViewState {
    pub fn select_time(&mut self, label: &str) -> DashboardResult<()> {
        self.time = label.parse().map_err(DashboardError::InvalidTime)?;
        Ok(())
    }
}

fn forecast_title(region_name: &str) -> String {
    format!("Aurora Weather Predictions - {}", region_name)
}

/// One map per forecast variable, or a warning when the crop is empty.
fn forecast_panel(
    prediction: &ForecastBatch,
    variable: &ForecastVariable,
    state: &ForecastViewState,
) -> DashboardResult<Panel> {
    let field = prediction.surface_field(variable.key)?;
    Ok(match crop_to_region(&field, &state.region) {
        CropResult::Cropped(cropped) => Panel::Map {
            figure: create_interactive_map(
                &cropped,
                variable.title,
                variable.unit,
                variable.colorscale,
                DETAIL_ZOOM,
            ),
        },
        CropResult::Empty => Panel::Warning {
            message: format!(
                "No data available for {} in {} region",
                variable.title, state.region_name
            ),
        },
    })
}

pub fn render_forecast_page(
    predictions: &[ForecastBatch],
    state: &ForecastViewState,
) -> DashboardResult<Page> {
    let index = state.time.step_index();
    let prediction = predictions.get(index).ok_or(DashboardError::MissingStep {
        index,
        available: predictions.len(),
    })?;
    // Labels refer to the day of the first forecast step.
    let date = predictions[0].metadata.time.format("%B %-d, %Y").to_string();

    let mut columns = Vec::with_capacity(FORECAST_COLUMNS.len());
    for indices in FORECAST_COLUMNS {
        let mut column = Vec::with_capacity(indices.len());
        for i in indices {
            column.push(forecast_panel(prediction, &FORECAST_VARIABLES[i], state)?);
        }
        columns.push(column);
    }

    Ok(Page {
        title: forecast_title(&state.region_name),
        subheading: Some(format!("Visualize weather predictions for {}", date)),
        sections: vec![Section {
            heading: Some(format!("Weather Predictions for {} at {}", date, state.time)),
            columns,
        }],
        errors: Vec::new(),
        notes: vec!["Hover over any point on the maps to see exact values".to_string()],
    })
}

/// The page shown when the forecast pipeline fails.
pub fn render_failure_page(error: &PipelineError, state: &ForecastViewState) -> Page {
    let mut notes = vec!["Please make sure:".to_string()];
    notes.extend(
        failure_checklist()
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {}", i + 1, item)),
    );
    Page {
        title: forecast_title(&state.region_name),
        subheading: None,
        sections: Vec::new(),
        errors: vec![error.to_string()],
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::fixtures::small_batch;
    use crate::dataset::DatasetError;
    use chrono::Duration;
    use std::path::PathBuf;

    fn predictions() -> Vec<ForecastBatch> {
        let base = small_batch(10, 4);
        (1..=6)
            .map(|step| {
                let mut p = base.clone();
                p.metadata.time = base.metadata.time + Duration::hours(6 * step);
                p
            })
            .collect()
    }

    #[test]
    fn test_tabs_hold_nine_variables() {
        assert_eq!(mockup_variables().len(), 36);
        let tab3 = variables_for_tab(3).unwrap();
        assert_eq!(tab3.first().map(String::as_str), Some("Variable 19"));
        assert_eq!(tab3.last().map(String::as_str), Some("Variable 27"));
        assert!(variables_for_tab(0).is_err());
        assert!(variables_for_tab(5).is_err());
    }

    #[test]
    fn test_mockup_state_handlers() {
        let mut state = MockupState::default();
        assert_eq!(state.location, "Malé");
        state.select_location("perth").unwrap();
        assert_eq!(state.location, "Perth");
        assert!(state.select_location("Atlantis").is_err());
        assert_eq!(state.location, "Perth");

        state.select_tab(4).unwrap();
        assert!(matches!(state.select_tab(9), Err(DashboardError::InvalidTab(9))));
        assert_eq!(state.tab, 4);
    }

    #[test]
    fn test_mockup_page() {
        let state = MockupState {
            location: "Chennai".to_string(),
            tab: 2,
        };
        let page = render_mockup_page(&state).unwrap();
        let grid = page.sections.last().unwrap();
        assert_eq!(
            grid.heading.as_deref(),
            Some("3x3 Grid of Maps for Chennai (Variables 10-18)")
        );
        assert_eq!(grid.columns.len(), 3);

        // overview + 9 grid panels
        let figures: Vec<&MapFigure> = page.figures().collect();
        assert_eq!(figures.len(), 10);
        let first = figures[1];
        assert_eq!(first.zoom(), 6.0);
        assert!((first.center().lat - 13.08).abs() < 1e-9);
        assert_eq!(first.data[0].lat.len(), 64);
        assert_eq!(first.color_bounds(), Some((0.0, 0.0)));

        // column 0 holds the first variable of each row
        let Panel::Map { figure } = &grid.columns[0][1] else {
            panic!("expected a map panel");
        };
        assert_eq!(figure.layout.title.as_ref().map(|t| t.text.as_str()), Some("Variable 13"));
    }

    #[test]
    fn test_forecast_page_layout() {
        let preds = predictions();
        let page = render_forecast_page(&preds, &ForecastViewState::default()).unwrap();
        assert_eq!(page.title, "Aurora Weather Predictions - Maldives");

        let section = &page.sections[0];
        assert_eq!(
            section.heading.as_deref(),
            Some("Weather Predictions for May 6, 2025 at 00:00")
        );
        let titles: Vec<Vec<String>> = section
            .columns
            .iter()
            .map(|c| {
                c.iter()
                    .filter_map(|p| match p {
                        Panel::Map { figure } => {
                            figure.layout.title.as_ref().map(|t| t.text.clone())
                        }
                        _ => None,
                    })
                    .collect()
            })
            .collect();
        assert_eq!(
            titles,
            vec![
                vec!["2m Temperature".to_string(), "10m Southward Wind".to_string()],
                vec!["10m Eastward Wind".to_string(), "Mean Sea Level Pressure".to_string()],
            ]
        );
        let figure = page.figures().next().unwrap();
        assert_eq!(figure.zoom(), 8.0);
        // lat 0..=8 of 0..10, lon 72..=74 of 72..76
        assert_eq!(figure.data[0].lat.len(), 9 * 3);
    }

    #[test]
    fn test_forecast_page_time_selection() {
        let preds = predictions();
        let mut state = ForecastViewState::default();
        state.select_time("18:00").unwrap();
        let page = render_forecast_page(&preds, &state).unwrap();
        assert_eq!(
            page.sections[0].heading.as_deref(),
            Some("Weather Predictions for May 6, 2025 at 18:00")
        );
        assert!(state.select_time("09:00").is_err());
        assert_eq!(state.time, DisplayTime::Evening);
    }

    #[test]
    fn test_forecast_page_warns_on_empty_region() {
        let preds = predictions();
        let state = ForecastViewState {
            region: BoundingBox::new(40.0, 50.0, 0.0, 10.0),
            region_name: "Alps".to_string(),
            ..ForecastViewState::default()
        };
        let page = render_forecast_page(&preds, &state).unwrap();
        assert_eq!(page.figures().count(), 0);
        let warnings: Vec<&str> = page.warnings().collect();
        assert_eq!(warnings.len(), 4);
        assert_eq!(warnings[0], "No data available for 2m Temperature in Alps region");
    }

    #[test]
    fn test_forecast_page_missing_step() {
        let preds = predictions();
        let state = ForecastViewState {
            time: DisplayTime::Evening,
            ..ForecastViewState::default()
        };
        let err = render_forecast_page(&preds[..3], &state).unwrap_err();
        assert!(matches!(err, DashboardError::MissingStep { index: 5, available: 3 }));
    }

    #[test]
    fn test_failure_page_lists_checklist() {
        let err = PipelineError::LoadData(DatasetError::NotFound(PathBuf::from("static.nc")));
        let page = render_failure_page(&err, &ForecastViewState::default());
        assert_eq!(page.errors.len(), 1);
        assert!(page.errors[0].contains("static.nc"));
        assert_eq!(page.notes.len(), 6);
        assert!(page.notes[4].starts_with("4. "));
    }
}
