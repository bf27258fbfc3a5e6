//! # Forecast Pipeline
//!
//! Sequences the four forecast stages:
//!
//! 1. load the static, surface and atmospheric datasets
//! 2. load the model
//! 3. build the input batch
//! 4. run the rollout
//!
//! Every stage is memoised by its inputs for the lifetime of the
//! [`ForecastPipeline`], so rendering a different tab or time slot reuses the
//! materialised predictions. The first failing stage aborts the run and is
//! reported through [`PipelineError::stage`].

use crate::batch::{BatchError, BatchWindow, ForecastBatch, create_batch};
use crate::cache::MemoCache;
use crate::dataset::{CoordinateNames, DataPaths, DatasetError, Era5Datasets, load_era5_data};
use crate::model::{ForecastModel, ModelConfig, ModelError, load_model, rollout};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Number of autoregressive steps in a forecast.
pub const ROLLOUT_STEPS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    LoadData,
    LoadModel,
    BuildBatch,
    Rollout,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineStage::LoadData => "loading data",
            PipelineStage::LoadModel => "loading model",
            PipelineStage::BuildBatch => "building batch",
            PipelineStage::Rollout => "running forecast",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Error loading data: {0}")]
    LoadData(#[source] DatasetError),

    #[error("Error loading model: {0}")]
    LoadModel(#[source] ModelError),

    #[error("Error building batch: {0}")]
    BuildBatch(#[source] BatchError),

    #[error("Error running forecast: {0}")]
    Rollout(#[source] ModelError),
}

impl PipelineError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::LoadData(_) => PipelineStage::LoadData,
            PipelineError::LoadModel(_) => PipelineStage::LoadModel,
            PipelineError::BuildBatch(_) => PipelineStage::BuildBatch,
            PipelineError::Rollout(_) => PipelineStage::Rollout,
        }
    }
}

/// Likely causes shown to the user next to a pipeline failure.
pub fn failure_checklist() -> Vec<&'static str> {
    vec![
        "All data files are present in the data directory",
        "The model checkpoint is available",
        "The model runner and its packages are installed",
        "At least 2GB of free disk space",
        "Internet connectivity for the model download",
    ]
}

/// Everything the stages depend on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub paths: DataPaths,
    pub names: CoordinateNames,
    pub window: BatchWindow,
    pub model: ModelConfig,
    pub steps: usize,
}

impl ForecastRequest {
    pub fn new(paths: DataPaths, model: ModelConfig) -> Self {
        ForecastRequest {
            paths,
            names: CoordinateNames::default(),
            window: BatchWindow::default(),
            model,
            steps: ROLLOUT_STEPS,
        }
    }
}

/// The materialised result of a pipeline run.
#[derive(Debug, Clone)]
pub struct Forecast {
    pub batch: Arc<ForecastBatch>,
    pub predictions: Arc<Vec<ForecastBatch>>,
    pub timings: Vec<(PipelineStage, Duration)>,
}

impl Forecast {
    /// The prediction at `index`, if the rollout produced it.
    pub fn step(&self, index: usize) -> Option<&ForecastBatch> {
        self.predictions.get(index)
    }
}

/// Runs the stages, memoising each one on its own inputs.
///
/// Keep one pipeline alive across requests to reuse loaded data and models.
pub struct ForecastPipeline {
    data: MemoCache<(DataPaths, CoordinateNames), Era5Datasets>,
    models: MemoCache<ModelConfig, Box<dyn ForecastModel>>,
    batches: MemoCache<(DataPaths, CoordinateNames, BatchWindow), ForecastBatch>,
    predictions: MemoCache<ForecastRequest, Vec<ForecastBatch>>,
}

impl Default for ForecastPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastPipeline {
    pub fn new() -> Self {
        ForecastPipeline {
            data: MemoCache::new("data"),
            models: MemoCache::new("model"),
            batches: MemoCache::new("batch"),
            predictions: MemoCache::new("predictions"),
        }
    }

    /// Runs all stages, reporting progress on `progress`.
    pub fn run(
        &self,
        request: &ForecastRequest,
        progress: &ProgressBar,
    ) -> Result<Forecast, PipelineError> {
        let mut timings = Vec::with_capacity(4);

        progress.set_position(5);
        progress.set_message("Loading ERA5 data...");
        let started = Instant::now();
        let data_key = (request.paths.clone(), request.names.clone());
        let datasets = self
            .data
            .get_or_try_insert_with(&data_key, || load_era5_data(&request.paths, &request.names))
            .map_err(PipelineError::LoadData)?;
        timings.push((PipelineStage::LoadData, started.elapsed()));

        progress.set_position(15);
        progress.set_message("Loading model...");
        let started = Instant::now();
        let model = self
            .models
            .get_or_try_insert_with(&request.model, || load_model(&request.model))
            .map_err(PipelineError::LoadModel)?;
        timings.push((PipelineStage::LoadModel, started.elapsed()));

        progress.set_position(70);
        progress.set_message("Creating batch...");
        let started = Instant::now();
        let batch_key = (request.paths.clone(), request.names.clone(), request.window);
        let batch = self
            .batches
            .get_or_try_insert_with(&batch_key, || create_batch(&datasets, &request.window))
            .map_err(PipelineError::BuildBatch)?;
        timings.push((PipelineStage::BuildBatch, started.elapsed()));

        progress.set_position(75);
        progress.set_message("Running forecast...");
        let started = Instant::now();
        let predictions = self
            .predictions
            .get_or_try_insert_with(request, || rollout(&**model, &batch, request.steps))
            .map_err(PipelineError::Rollout)?;
        timings.push((PipelineStage::Rollout, started.elapsed()));

        progress.set_position(100);
        progress.set_message("Complete!");

        for (stage, elapsed) in &timings {
            debug!("Stage '{}' took {:.2}s", stage, elapsed.as_secs_f64());
        }
        info!("Forecast ready: {} steps from {}", predictions.len(), batch.metadata.time);

        Ok(Forecast {
            batch,
            predictions,
            timings,
        })
    }

    /// Hit and miss counts per stage cache, in stage order.
    pub fn cache_stats(&self) -> [(u64, u64); 4] {
        [
            (self.data.hits(), self.data.misses()),
            (self.models.hits(), self.models.misses()),
            (self.batches.hits(), self.batches.misses()),
            (self.predictions.hits(), self.predictions.misses()),
        ]
    }
}

/// A percentage bar for the stage progress, hidden in quiet mode.
pub fn stage_progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:40}] {pos:>3}% {msg}") {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}
