use anyhow::{Context, Result, anyhow, bail};
use aurora_maps::cli::{
    Cli, Commands, ConfigFormat, ForecastArgs, OutputFormat, PageArgs, SplitArgs, template_config,
};
use aurora_maps::config::DashboardConfig;
use aurora_maps::dashboard::{
    ForecastViewState, MockupState, Page, render_failure_page, render_forecast_page,
    render_mockup_page,
};
use aurora_maps::info::{
    get_netcdf_info, print_file_info_csv, print_file_info_human, print_file_info_json,
    print_file_info_yaml,
};
use aurora_maps::log::{
    config_echo, show_farewell_with_timing, show_forecast_summary, show_greeting,
    show_pipeline_failure, show_split_report,
};
use aurora_maps::model::ModelBackend;
use aurora_maps::output::{render_page, write_output};
use aurora_maps::pipeline::{ForecastPipeline, stage_progress_bar};
use aurora_maps::split::{plan_split, split_by_pressure_level};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&cli, &config);

    let start_time = Instant::now();
    run(cli, config, start_time).await
}

fn load_config(path: Option<&Path>) -> Result<DashboardConfig> {
    match path {
        Some(path) => DashboardConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(DashboardConfig::default()),
    }
}

fn init_logging(cli: &Cli, config: &DashboardConfig) {
    let level = if cli.verbose {
        "debug".to_string()
    } else if cli.quiet {
        "error".to_string()
    } else if let Ok(level) = std::env::var("AURORA_MAPS_LOG") {
        level
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    let _ = env_logger::Builder::new().parse_filters(&level).try_init();
}

async fn run(cli: Cli, mut config: DashboardConfig, start_time: Instant) -> Result<()> {
    let quiet = cli.quiet;
    match cli.command {
        Commands::Mockup { location, tab, page } => {
            let mut state = MockupState::default();
            state.select_location(&location)?;
            state.select_tab(usize::from(tab))?;
            let rendered = render_mockup_page(&state)?;
            emit_page(&rendered, &page).await?;
        }
        Commands::Forecast(args) => {
            run_forecast(&args, &mut config, quiet).await?;
            if !quiet {
                show_farewell_with_timing(&mut std::io::stderr(), start_time.elapsed())?;
            }
        }
        Commands::Split(args) => {
            run_split(&args, &config, quiet)?;
            if !quiet {
                show_farewell_with_timing(&mut std::io::stderr(), start_time.elapsed())?;
            }
        }
        Commands::Info {
            file,
            detailed,
            variable,
            format,
        } => {
            let info = get_netcdf_info(&file, variable.as_deref(), detailed).await?;
            match format.unwrap_or(cli.output_format) {
                OutputFormat::Human => print_file_info_human(&info),
                OutputFormat::Json => print_file_info_json(&info)?,
                OutputFormat::Yaml => print_file_info_yaml(&info)?,
                OutputFormat::Csv => print_file_info_csv(&info)?,
            }
        }
        Commands::Validate {
            config_file,
            detailed,
            check_files,
        } => {
            let path = config_file
                .or(cli.config)
                .ok_or_else(|| anyhow!("No configuration file given (pass a path or --config)"))?;
            validate_config(&path, detailed, check_files, cli.output_format)?;
        }
        Commands::Template {
            template_type,
            output,
            format,
        } => {
            let template = template_config(&template_type);
            let contents = match format {
                ConfigFormat::Json => template.to_json()?,
                ConfigFormat::Yaml => template.to_yaml()?,
            };
            match output {
                Some(path) => {
                    write_output(&path, &contents, false).await?;
                    info!("Template written to {}", path.display());
                }
                None => println!("{}", contents),
            }
        }
        Commands::Completions { shell, output } => {
            let mut command = Cli::command();
            match output {
                Some(path) => {
                    let mut file = std::fs::File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    clap_complete::generate(shell, &mut command, "aurora-maps", &mut file);
                }
                None => {
                    let mut stdout = std::io::stdout();
                    clap_complete::generate(shell, &mut command, "aurora-maps", &mut stdout);
                }
            }
        }
    }
    Ok(())
}

async fn emit_page(page: &Page, args: &PageArgs) -> Result<()> {
    let contents = render_page(page, args.resolved_format())?;
    match &args.output {
        Some(path) => {
            write_output(path, &contents, args.force).await?;
            info!("Page written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(contents.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

async fn run_forecast(
    args: &ForecastArgs,
    config: &mut DashboardConfig,
    quiet: bool,
) -> Result<()> {
    args.apply(config);
    config.validate()?;
    let mut banner = std::io::stderr();
    if !quiet {
        show_greeting(&mut banner, "forecast")?;
        config_echo(&mut banner, config)?;
    }

    let state = ForecastViewState {
        time: args.time,
        region: config.region,
        region_name: config.region_name.clone(),
    };
    let request = config.forecast_request();
    let pipeline = ForecastPipeline::new();
    let progress = stage_progress_bar(quiet);

    let outcome = tokio::task::block_in_place(|| pipeline.run(&request, &progress));
    match outcome {
        Ok(forecast) => {
            progress.finish_and_clear();
            if !quiet {
                show_forecast_summary(&mut banner, &forecast)?;
            }
            debug!("Cache hits/misses per stage: {:?}", pipeline.cache_stats());
            let page = render_forecast_page(&forecast.predictions, &state)?;
            emit_page(&page, &args.page).await
        }
        Err(e) => {
            progress.abandon();
            show_pipeline_failure(&e);
            let page = render_failure_page(&e, &state);
            emit_page(&page, &args.page).await?;
            Err(e.into())
        }
    }
}

fn run_split(args: &SplitArgs, config: &DashboardConfig, quiet: bool) -> Result<()> {
    let options = args.options(&config.split);
    if args.dry_run {
        let plan = plan_split(&args.file, &options)?;
        println!("Split plan for {}:", args.file.display());
        for part in &plan {
            println!(
                "  {} <- {} levels {:?}",
                part.path.display(),
                part.range.len(),
                part.levels
            );
        }
        return Ok(());
    }

    if !quiet {
        show_greeting(&mut std::io::stderr(), "split")?;
    }
    let report = tokio::task::block_in_place(|| split_by_pressure_level(&args.file, &options))
        .with_context(|| format!("Failed to split {}", args.file.display()))?;
    if !quiet {
        show_split_report(&mut std::io::stderr(), &report)?;
    }
    Ok(())
}

fn validate_config(
    path: &Path,
    detailed: bool,
    check_files: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = DashboardConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.validate()?;

    if check_files {
        for data_path in config.data_paths().iter() {
            if !data_path.exists() {
                bail!("Input file not found: {}", data_path.display());
            }
        }
        let checkpoint = config.forecast_request().model.checkpoint_path();
        if config.model.backend == ModelBackend::External && !checkpoint.exists() {
            bail!("Model checkpoint not found: {}", checkpoint.display());
        }
    }

    println!("Configuration is valid: {}", path.display());
    if detailed {
        match format {
            OutputFormat::Yaml => println!("{}", config.to_yaml()?),
            OutputFormat::Json | OutputFormat::Csv => println!("{}", config.to_json()?),
            OutputFormat::Human => config_echo(&mut std::io::stdout(), &config)?,
        }
    }
    Ok(())
}
