use crate::config::DashboardConfig;
use crate::pipeline::{Forecast, PipelineError, failure_checklist};
use crate::split::SplitReport;
use std::io::{self, Write};
use std::time::Duration;

/// Run banners. The CLI writes them to stderr so stdout carries only the page.
pub fn show_greeting(out: &mut impl Write, command: &str) -> io::Result<()> {
    writeln!(out, "=== Aurora Maps ===")?;
    writeln!(out, "Running: {}", command)
}

pub fn config_echo(out: &mut impl Write, config: &DashboardConfig) -> io::Result<()> {
    writeln!(out, "\nConfiguration:")?;
    writeln!(out, "  Data directory: {}", config.data_dir.display())?;
    writeln!(out, "  Date: {}", config.date)?;
    writeln!(
        out,
        "  Region: {} (lat {} to {}, lon {} to {})",
        config.region_name,
        config.region.lat.min_value,
        config.region.lat.max_value,
        config.region.lon.min_value,
        config.region.lon.max_value
    )?;
    writeln!(
        out,
        "  Model: {} / {} ({:?})",
        config.model.name, config.model.checkpoint, config.model.backend
    )?;
    writeln!(out, "  Forecast steps: {}", config.steps)
}

pub fn show_forecast_summary(out: &mut impl Write, forecast: &Forecast) -> io::Result<()> {
    writeln!(out, "\nForecast:")?;
    writeln!(out, "  Initial time: {}", forecast.batch.metadata.time)?;
    writeln!(
        out,
        "  Grid: {} x {}, {} pressure levels",
        forecast.batch.metadata.lat.len(),
        forecast.batch.metadata.lon.len(),
        forecast.batch.metadata.atmos_levels.len()
    )?;
    for (i, prediction) in forecast.predictions.iter().enumerate() {
        writeln!(out, "    Step {}: {}", i + 1, prediction.metadata.time)?;
    }
    for (stage, elapsed) in &forecast.timings {
        writeln!(out, "  {} took {:.1} seconds", stage, elapsed.as_secs_f64())?;
    }
    Ok(())
}

pub fn show_pipeline_failure(error: &PipelineError) {
    eprintln!("\nError {}: {}", error.stage(), error);
    eprintln!("Please make sure:");
    for (i, item) in failure_checklist().iter().enumerate() {
        eprintln!("  {}. {}", i + 1, item);
    }
}

pub fn show_split_report(out: &mut impl Write, report: &SplitReport) -> io::Result<()> {
    writeln!(out, "\nSplit Results:")?;
    for part in &report.parts {
        writeln!(
            out,
            "  {} ({} levels, {:.2} MB)",
            part.path.display(),
            part.levels.len(),
            part.size_mb()
        )?;
    }
    if report.source_deleted {
        writeln!(out, "  Deleted source file: {}", report.source.display())
    } else {
        writeln!(out, "  Kept source file: {}", report.source.display())
    }
}

pub fn show_farewell_with_timing(out: &mut impl Write, elapsed: Duration) -> io::Result<()> {
    writeln!(out, "\n=== Completed in {:.2} seconds ===", elapsed.as_secs_f64())
}
