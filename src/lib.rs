//! # aurora-maps
//!
//! Forecast maps from ERA5 reanalysis data and a pretrained weather model.
//!
//! ## Features
//!
//! - **Forecast pipeline**: load the ERA5 inputs, build a model batch, run a
//!   six-step rollout; every stage is memoised by its inputs
//! - **Region cropping**: bounding-envelope crop of gridded fields to a box
//! - **Interactive maps**: plotly scattermapbox figures with data-driven color
//!   bounds, rendered to a standalone HTML page or JSON/YAML
//! - **Pressure-level splitting**: partition a large NetCDF file into parts,
//!   deleting the source only after every part verifies
//! - **Mockup dashboard**: placeholder maps for a set of Indian Ocean locations
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aurora_maps::config::DashboardConfig;
//! use aurora_maps::dashboard::{ForecastViewState, render_forecast_page};
//! use aurora_maps::pipeline::{ForecastPipeline, stage_progress_bar};
//!
//! let config = DashboardConfig::from_file("aurora.yaml")?;
//! let pipeline = ForecastPipeline::new();
//! let forecast = pipeline.run(&config.forecast_request(), &stage_progress_bar(true))?;
//! let page = render_forecast_page(&forecast.predictions, &ForecastViewState::default())?;
//! println!("{}", aurora_maps::html::render_html(&page)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Splitting
//!
//! ```rust,no_run
//! use aurora_maps::split::{SplitOptions, split_by_pressure_level};
//!
//! let source = std::path::Path::new("2025-05-05-atmospheric.nc");
//! let report = split_by_pressure_level(source, &SplitOptions::default())?;
//! assert_eq!(report.parts.len(), 5);
//! # Ok::<(), aurora_maps::split::SplitError>(())
//! ```

pub mod batch;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod dataset;
pub mod grid;
pub mod html;
pub mod info;
pub mod interchange;
pub mod log;
pub mod map;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod region;
pub mod split;
pub mod timeslot;


#[cfg(test)]
mod cli_tests;

pub use config::DashboardConfig;
pub use pipeline::{Forecast, ForecastPipeline, ForecastRequest, PipelineError};
pub use region::{BoundingBox, CropResult, crop_to_region};
pub use split::{SplitOptions, SplitReport, split_by_pressure_level};
