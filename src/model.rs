//! # Forecasting Models
//!
//! The pretrained network is an external collaborator. This module defines the
//! [`ForecastModel`] seam the pipeline talks to, plus two backends:
//!
//! - [`ExternalModel`]: runs a configured program that loads the checkpoint,
//!   reads the batch from a NetCDF interchange file and writes the whole
//!   rollout back (see [`crate::interchange`]).
//! - [`PersistenceModel`]: a built-in baseline that carries the latest state
//!   forward unchanged, advancing the clock by one step each time.

use crate::batch::{BatchError, ForecastBatch};
use crate::interchange::{self, InterchangeError};
use chrono::Duration;
use log::{debug, info};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model configuration error: {0}")]
    Config(String),

    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Interchange(#[from] InterchangeError),

    #[error("Model process exited with {status}: {stderr}")]
    Process { status: String, stderr: String },

    #[error("Model output invalid: {0}")]
    Output(String),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// How the model is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    #[default]
    External,
    Persistence,
}

/// Identifies a pretrained model and how to run it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hub-style model name, e.g. `microsoft/aurora`.
    pub name: String,
    /// Checkpoint file name inside the model's cache directory.
    pub checkpoint: String,
    pub backend: ModelBackend,
    /// Directory holding `<name>/<checkpoint>`.
    pub cache_dir: PathBuf,
    /// Program and leading arguments for the external backend.
    pub command: Vec<String>,
    pub use_lora: bool,
    /// Hours advanced per rollout step.
    pub step_hours: i64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            name: "microsoft/aurora".to_string(),
            checkpoint: "aurora-0.25-pretrained.ckpt".to_string(),
            backend: ModelBackend::External,
            cache_dir: PathBuf::from("models"),
            command: vec!["aurora-rollout".to_string()],
            use_lora: false,
            step_hours: 6,
        }
    }
}

impl ModelConfig {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.cache_dir.join(&self.name).join(&self.checkpoint)
    }
}

/// A forecasting model that can roll a batch forward.
pub trait ForecastModel {
    fn name(&self) -> &str;

    /// Runs `steps` autoregressive steps, returning one prediction per step.
    fn rollout(&self, batch: &ForecastBatch, steps: usize) -> ModelResult<Vec<ForecastBatch>>;
}

/// Repeats the most recent state; each step advances the timestamp.
#[derive(Debug, Clone)]
pub struct PersistenceModel {
    step: Duration,
}

impl PersistenceModel {
    pub fn new(step_hours: i64) -> Self {
        PersistenceModel {
            step: Duration::hours(step_hours),
        }
    }

    fn step(&self, batch: &ForecastBatch) -> ForecastBatch {
        let latest = |array: &ndarray::ArrayD<f32>| {
            let last = array.shape()[0] - 1;
            array.index_axis(Axis(0), last).insert_axis(Axis(0)).to_owned()
        };
        let mut next = batch.clone();
        next.surf_vars = batch.surf_vars.iter().map(|(k, a)| (k.clone(), latest(a))).collect();
        next.atmos_vars = batch.atmos_vars.iter().map(|(k, a)| (k.clone(), latest(a))).collect();
        next.metadata.time = batch.metadata.time + self.step;
        next
    }
}

impl ForecastModel for PersistenceModel {
    fn name(&self) -> &str {
        "persistence"
    }

    fn rollout(&self, batch: &ForecastBatch, steps: usize) -> ModelResult<Vec<ForecastBatch>> {
        if batch.history_len() == 0 {
            return Err(ModelError::Output("batch has no history steps".to_string()));
        }
        let mut predictions: Vec<ForecastBatch> = Vec::with_capacity(steps);
        for _ in 0..steps {
            let previous = predictions.last().unwrap_or(batch);
            let next = self.step(previous);
            predictions.push(next);
        }
        Ok(predictions)
    }
}

/// Runs the pretrained network in a separate process.
///
/// The program is invoked as
///
/// ```text
/// <command...> --checkpoint <ckpt> --input <batch.nc> --output <preds.nc> --steps <n> [--use-lora]
/// ```
#[derive(Debug, Clone)]
pub struct ExternalModel {
    name: String,
    command: Vec<String>,
    checkpoint: PathBuf,
    use_lora: bool,
}

impl ExternalModel {
    pub fn new(
        name: &str,
        command: Vec<String>,
        checkpoint: PathBuf,
        use_lora: bool,
    ) -> ModelResult<Self> {
        if command.is_empty() || command[0].trim().is_empty() {
            return Err(ModelError::Config("external model command is empty".to_string()));
        }
        Ok(ExternalModel {
            name: name.to_string(),
            command,
            checkpoint,
            use_lora,
        })
    }

    pub fn checkpoint(&self) -> &Path {
        &self.checkpoint
    }

    fn build_command(&self, input: &Path, output: &Path, steps: usize) -> Command {
        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..])
            .arg("--checkpoint")
            .arg(&self.checkpoint)
            .arg("--input")
            .arg(input)
            .arg("--output")
            .arg(output)
            .arg("--steps")
            .arg(steps.to_string());
        if self.use_lora {
            cmd.arg("--use-lora");
        }
        cmd
    }
}

impl ForecastModel for ExternalModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn rollout(&self, batch: &ForecastBatch, steps: usize) -> ModelResult<Vec<ForecastBatch>> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("batch.nc");
        let output = workdir.path().join("predictions.nc");
        interchange::write_batch(batch, &input)?;

        let mut cmd = self.build_command(&input, &output, steps);
        debug!("Running model command: {:?}", cmd);
        let result = cmd.output()?;
        if !result.status.success() {
            return Err(ModelError::Process {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        if !output.exists() {
            return Err(ModelError::Output(format!(
                "model did not write {}",
                output.display()
            )));
        }

        Ok(interchange::read_predictions(&output, batch, steps)?)
    }
}

/// Resolves and initialises the configured model.
pub fn load_model(config: &ModelConfig) -> ModelResult<Box<dyn ForecastModel>> {
    match config.backend {
        ModelBackend::Persistence => {
            info!("Using persistence baseline ({}h steps)", config.step_hours);
            Ok(Box::new(PersistenceModel::new(config.step_hours)))
        }
        ModelBackend::External => {
            let checkpoint = config.checkpoint_path();
            if !checkpoint.exists() {
                return Err(ModelError::CheckpointNotFound(checkpoint));
            }
            info!("Using model {} with checkpoint {}", config.name, checkpoint.display());
            Ok(Box::new(ExternalModel::new(
                &config.name,
                config.command.clone(),
                checkpoint,
                config.use_lora,
            )?))
        }
    }
}

/// Runs the model for `steps` steps and checks the materialised sequence.
pub fn rollout(
    model: &dyn ForecastModel,
    batch: &ForecastBatch,
    steps: usize,
) -> ModelResult<Vec<ForecastBatch>> {
    let predictions = model.rollout(batch, steps)?;
    if predictions.len() != steps {
        return Err(ModelError::Output(format!(
            "{} returned {} steps, expected {}",
            model.name(),
            predictions.len(),
            steps
        )));
    }
    for (i, prediction) in predictions.iter().enumerate() {
        prediction
            .validate()
            .map_err(|e| ModelError::Output(format!("step {}: {}", i + 1, e)))?;
        if prediction.metadata.lat != batch.metadata.lat
            || prediction.metadata.lon != batch.metadata.lon
        {
            return Err(ModelError::Output(format!("step {} changed the grid", i + 1)));
        }
    }
    Ok(predictions)
}
