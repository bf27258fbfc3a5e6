//! # CLI Module
//!
//! This module provides the command-line interface for aurora-maps, including:
//! - Argument parsing with clap
//! - Configuration file loading (JSON/YAML)
//! - Environment variable support with the AURORA_MAPS_ prefix
//! - Subcommands for the dashboards, the file splitter and file inspection
//!
//! The dashboard widgets of an interactive app map onto flags here: the
//! location dropdown is `--location`, the tab buttons are `--tab` and the time
//! dropdown is `--time`. Each invocation renders the selected view.

use crate::config::DashboardConfig;
use crate::model::ModelBackend;
use crate::output::PageFormat;
use crate::region::BoundingBox;
use crate::split::SplitOptions;
use crate::timeslot::DisplayTime;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Weather forecast maps from ERA5 data and a pretrained model
#[derive(Parser, Debug)]
#[command(name = "aurora-maps")]
#[command(about = "Render forecast maps from ERA5 data and split pressure-level files")]
#[command(version)]
#[command(long_about = "
aurora-maps builds interactive forecast maps from ERA5 reanalysis data.

It loads the static, surface-level and atmospheric files, runs a pretrained
forecasting model for six steps, crops the predictions to a region and writes
the maps as a standalone HTML page (or JSON/YAML for scripting). A second tool
splits large atmospheric files into smaller files by pressure level.

EXAMPLES:
  # Placeholder dashboard for Chennai, second tab
  aurora-maps mockup --location Chennai --tab 2 -o mockup.html

  # Forecast for 12:00 using the offline baseline model
  aurora-maps forecast --time 12:00 --backend persistence -o forecast.html

  # Split an atmospheric file into five parts by pressure level
  aurora-maps split ~/downloads/2025-05-05-atmospheric.nc

  # File inspection
  aurora-maps info ~/downloads/static.nc --detailed

  # Generate a config template
  aurora-maps template basic --format yaml > aurora.yaml
")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format for structured data
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Configuration file path (JSON or YAML)
    #[arg(short, long, global = true, env = "AURORA_MAPS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the placeholder dashboard
    #[command(long_about = "
Render the design mockup: a world map of the Indian Ocean locations and a
3x3 grid of placeholder maps around the selected location. Each of the four
tabs shows nine of the 36 placeholder variables.

EXAMPLES:
  aurora-maps mockup
  aurora-maps mockup --location Perth --tab 4 -o perth.html
  aurora-maps mockup --format json
")]
    Mockup {
        /// Location to center the grid on
        #[arg(short, long, env = "AURORA_MAPS_LOCATION", default_value = "Malé")]
        location: String,

        /// Tab to show (1-4)
        #[arg(short, long, env = "AURORA_MAPS_TAB", default_value_t = 1,
              value_parser = clap::value_parser!(u8).range(1..=4))]
        tab: u8,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Run the forecast and render the region maps
    #[command(long_about = "
Load the ERA5 inputs, run the forecast model for six steps and render the
four surface variables cropped to the configured region for the selected
time of day.

EXAMPLES:
  aurora-maps forecast --time 18:00 -o evening.html
  aurora-maps forecast --data-dir /data/era5 --date 2025-05-05
  aurora-maps forecast --backend external --model-command 'python run_aurora.py'
  aurora-maps forecast --region -8:-4:70:73 --region-name Chagos
")]
    Forecast(ForecastArgs),

    /// Split a NetCDF file into parts by pressure level
    #[command(long_about = "
Partition a NetCDF file along its pressure-level dimension into several files
named <stem>-part<i>.nc. Levels are split into contiguous groups; when they do
not divide evenly the first groups get one extra level.

Each part is re-opened and checked before the source is removed. If any part
fails, the parts already written are removed and the source is kept.

EXAMPLES:
  aurora-maps split 2025-05-05-atmospheric.nc
  aurora-maps split big.nc --parts 3 --keep-source --output-dir parts/
  aurora-maps split big.nc --dry-run
")]
    Split(SplitArgs),

    /// Show information about a NetCDF file
    #[command(long_about = "
Inspect a NetCDF file: dimensions, variables, attributes and, for ERA5 files,
the decoded time axis, pressure levels and grid extent.

EXAMPLES:
  aurora-maps info static.nc
  aurora-maps info 2025-05-05-atmospheric.nc --detailed
  aurora-maps info 2025-05-05-surface-level.nc -n t2m --format json
")]
    Info {
        /// NetCDF file path
        file: PathBuf,

        /// Show detailed variable information
        #[arg(long)]
        detailed: bool,

        /// Show only specific variable info
        #[arg(short = 'n', long)]
        variable: Option<String>,

        /// Output format for file information
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Validate a configuration file
    #[command(long_about = "
Validate a configuration file without running anything: syntax, value
ranges, model settings and optionally the presence of the input files and the
model checkpoint.

EXAMPLES:
  aurora-maps validate aurora.yaml
  aurora-maps validate --config aurora.json --check-files
")]
    Validate {
        /// Configuration file to validate
        config_file: Option<PathBuf>,

        /// Show the resolved configuration
        #[arg(long)]
        detailed: bool,

        /// Also check that input files and checkpoint exist
        #[arg(long)]
        check_files: bool,
    },

    /// Generate configuration templates
    #[command(long_about = "
Generate a starter configuration file.

Available templates:
- basic: defaults with the external model runner
- offline: the built-in persistence model, no checkpoint needed
- custom-region: a different region and data location

EXAMPLES:
  aurora-maps template basic
  aurora-maps template offline --format yaml -o aurora.yaml
")]
    Template {
        /// Template type to generate
        #[arg(value_enum)]
        template_type: TemplateType,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Json)]
        format: ConfigFormat,
    },

    /// Generate shell completions
    #[command(long_about = "
Generate shell completion scripts for bash, zsh, fish and PowerShell.

EXAMPLES:
  aurora-maps completions bash > ~/.bash_completion.d/aurora-maps
  aurora-maps completions zsh -o _aurora-maps
")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Where and how a rendered page is written.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct PageArgs {
    /// Output file (default: stdout)
    #[arg(short, long, env = "AURORA_MAPS_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Page format (default: from the output extension, else html)
    #[arg(long, value_enum)]
    pub format: Option<PageFormat>,

    /// Overwrite an existing output file
    #[arg(long, env = "AURORA_MAPS_FORCE")]
    pub force: bool,
}

impl PageArgs {
    pub fn resolved_format(&self) -> PageFormat {
        self.format
            .or_else(|| self.output.as_deref().map(PageFormat::from_path))
            .unwrap_or_default()
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ForecastArgs {
    /// Time of day to display
    #[arg(
        short,
        long,
        env = "AURORA_MAPS_TIME",
        default_value = "00:00",
        value_parser = parse_display_time
    )]
    pub time: DisplayTime,

    /// Directory with static.nc and the dated input files
    #[arg(long, env = "AURORA_MAPS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Date stamp of the input files, e.g. 2025-05-05
    #[arg(long, env = "AURORA_MAPS_DATE")]
    pub date: Option<String>,

    /// Region as lat_min:lat_max:lon_min:lon_max
    #[arg(
        long,
        env = "AURORA_MAPS_REGION",
        value_parser = BoundingBox::parse,
        allow_hyphen_values = true
    )]
    pub region: Option<BoundingBox>,

    /// Region name used in headings and warnings
    #[arg(long, env = "AURORA_MAPS_REGION_NAME")]
    pub region_name: Option<String>,

    /// Model backend
    #[arg(long, env = "AURORA_MAPS_BACKEND", value_parser = parse_backend)]
    pub backend: Option<ModelBackend>,

    /// Directory holding <model name>/<checkpoint>
    #[arg(long, env = "AURORA_MAPS_MODEL_CACHE")]
    pub model_cache: Option<PathBuf>,

    /// Command running the external model (split on whitespace)
    #[arg(long, env = "AURORA_MAPS_MODEL_COMMAND")]
    pub model_command: Option<String>,

    #[command(flatten)]
    pub page: PageArgs,
}

impl ForecastArgs {
    /// Applies the flags on top of a loaded configuration.
    pub fn apply(&self, config: &mut DashboardConfig) {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(date) = &self.date {
            config.date = date.clone();
        }
        if let Some(region) = self.region {
            config.region = region;
        }
        if let Some(name) = &self.region_name {
            config.region_name = name.clone();
        }
        if let Some(backend) = self.backend {
            config.model.backend = backend;
        }
        if let Some(cache) = &self.model_cache {
            config.model.cache_dir = cache.clone();
        }
        if let Some(command) = &self.model_command {
            config.model.command = command.split_whitespace().map(str::to_string).collect();
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SplitArgs {
    /// NetCDF file to split
    pub file: PathBuf,

    /// Number of part files
    #[arg(short = 'k', long, env = "AURORA_MAPS_SPLIT_PARTS")]
    pub parts: Option<usize>,

    /// Name of the pressure-level dimension
    #[arg(long, env = "AURORA_MAPS_LEVEL_DIMENSION")]
    pub level_dimension: Option<String>,

    /// Directory for the part files (default: next to the source)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Keep the source file after splitting
    #[arg(long)]
    pub keep_source: bool,

    /// Show the partition plan without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

impl SplitArgs {
    pub fn options(&self, base: &SplitOptions) -> SplitOptions {
        SplitOptions {
            parts: self.parts.unwrap_or(base.parts),
            level_dimension: self
                .level_dimension
                .clone()
                .unwrap_or_else(|| base.level_dimension.clone()),
            output_dir: self.output_dir.clone().or_else(|| base.output_dir.clone()),
            keep_source: self.keep_source || base.keep_source,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON structured output
    Json,
    /// YAML structured output
    Yaml,
    /// CSV output (where applicable)
    Csv,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum TemplateType {
    /// Defaults with the external model runner
    Basic,
    /// Built-in persistence model
    Offline,
    /// Custom region and data directory
    CustomRegion,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON configuration format
    Json,
    /// YAML configuration format
    Yaml,
}

fn parse_display_time(s: &str) -> Result<DisplayTime, String> {
    s.parse()
}

fn parse_backend(s: &str) -> Result<ModelBackend, String> {
    match s.to_ascii_lowercase().as_str() {
        "external" => Ok(ModelBackend::External),
        "persistence" => Ok(ModelBackend::Persistence),
        _ => Err(format!("Unknown backend '{}'. Valid backends: external, persistence", s)),
    }
}

/// Builds the configuration emitted by `template`.
pub fn template_config(template_type: &TemplateType) -> DashboardConfig {
    let mut config = DashboardConfig::default();
    match template_type {
        TemplateType::Basic => {}
        TemplateType::Offline => {
            config.model.backend = ModelBackend::Persistence;
        }
        TemplateType::CustomRegion => {
            config.data_dir = PathBuf::from("/data/era5");
            config.region = BoundingBox::new(-8.0, -4.0, 70.0, 73.0);
            config.region_name = "Chagos".to_string();
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display_time() {
        assert_eq!(parse_display_time("06:00"), Ok(DisplayTime::Morning));
        assert!(parse_display_time("07:00").is_err());
    }

    #[test]
    fn test_parse_backend() {
        assert_eq!(parse_backend("Persistence"), Ok(ModelBackend::Persistence));
        assert_eq!(parse_backend("external"), Ok(ModelBackend::External));
        assert!(parse_backend("gpu").is_err());
    }

    #[test]
    fn test_forecast_args_apply() {
        let args = ForecastArgs {
            time: DisplayTime::Noon,
            data_dir: Some(PathBuf::from("/data")),
            date: None,
            region: Some(BoundingBox::new(0.0, 1.0, 2.0, 3.0)),
            region_name: None,
            backend: Some(ModelBackend::Persistence),
            model_cache: None,
            model_command: Some("python  run.py --cpu".to_string()),
            page: PageArgs {
                output: None,
                format: None,
                force: false,
            },
        };
        let mut config = DashboardConfig::default();
        args.apply(&mut config);

        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.date, "2025-05-05");
        assert_eq!(config.region, BoundingBox::new(0.0, 1.0, 2.0, 3.0));
        assert_eq!(config.region_name, "Maldives");
        assert_eq!(config.model.backend, ModelBackend::Persistence);
        assert_eq!(config.model.command, vec!["python", "run.py", "--cpu"]);
    }

    #[test]
    fn test_split_args_options() {
        let args = SplitArgs {
            file: PathBuf::from("a.nc"),
            parts: Some(3),
            level_dimension: None,
            output_dir: None,
            keep_source: true,
            dry_run: false,
        };
        let options = args.options(&SplitOptions::default());
        assert_eq!(options.parts, 3);
        assert_eq!(options.level_dimension, "pressure_level");
        assert!(options.keep_source);
    }

    #[test]
    fn test_page_format_resolution() {
        let mut page = PageArgs {
            output: Some(PathBuf::from("maps.json")),
            format: None,
            force: false,
        };
        assert_eq!(page.resolved_format(), PageFormat::Json);
        page.format = Some(PageFormat::Yaml);
        assert_eq!(page.resolved_format(), PageFormat::Yaml);
        page.output = None;
        page.format = None;
        assert_eq!(page.resolved_format(), PageFormat::Html);
    }

    #[test]
    fn test_templates() {
        assert_eq!(template_config(&TemplateType::Basic), DashboardConfig::default());
        assert_eq!(
            template_config(&TemplateType::Offline).model.backend,
            ModelBackend::Persistence
        );
        let custom = template_config(&TemplateType::CustomRegion);
        assert_eq!(custom.region_name, "Chagos");
        assert!(custom.validate().is_ok());
    }
}
