//! # CLI Integration Tests
//!
//! Argument parsing for every subcommand, flag conflicts and environment
//! variable fallbacks.

#[cfg(test)]
mod tests {
    use clap::Parser;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use crate::cli::{Cli, Commands, ConfigFormat, OutputFormat, TemplateType};
    use crate::model::ModelBackend;
    use crate::output::PageFormat;
    use crate::region::BoundingBox;
    use crate::timeslot::DisplayTime;

    // Tests that read or write AURORA_MAPS_* variables run one at a time.
    static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_cli_help() {
        let result = Cli::try_parse_from(["aurora-maps", "--help"]);
        assert!(result.is_err());

        let error = result.unwrap_err();
        assert!(error.to_string().contains("forecast maps from ERA5"));
    }

    #[test]
    fn test_cli_version() {
        let result = Cli::try_parse_from(["aurora-maps", "--version"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "aurora-maps",
            "--verbose",
            "--output-format",
            "json",
            "--config",
            "/path/to/config.yaml",
            "template",
            "basic",
        ]);

        assert!(cli.verbose);
        assert_eq!(cli.output_format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yaml")));
    }

    #[test]
    fn test_mockup_command() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        let cli = Cli::parse_from([
            "aurora-maps",
            "mockup",
            "--location",
            "Chennai",
            "--tab",
            "3",
            "-o",
            "mockup.json",
            "--force",
        ]);

        if let Commands::Mockup { location, tab, page } = &cli.command {
            assert_eq!(location, "Chennai");
            assert_eq!(*tab, 3);
            assert_eq!(page.output, Some(PathBuf::from("mockup.json")));
            assert!(page.force);
            assert_eq!(page.resolved_format(), PageFormat::Json);
        } else {
            panic!("Expected Mockup command");
        }
    }

    #[test]
    fn test_mockup_defaults() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        let cli = Cli::parse_from(["aurora-maps", "mockup"]);

        if let Commands::Mockup { location, tab, page } = &cli.command {
            assert_eq!(location, "Malé");
            assert_eq!(*tab, 1);
            assert_eq!(page.output, None);
            assert_eq!(page.resolved_format(), PageFormat::Html);
        } else {
            panic!("Expected Mockup command");
        }
    }

    #[test]
    fn test_mockup_tab_out_of_range() {
        assert!(Cli::try_parse_from(["aurora-maps", "mockup", "--tab", "0"]).is_err());
        assert!(Cli::try_parse_from(["aurora-maps", "mockup", "--tab", "5"]).is_err());
    }

    #[test]
    fn test_forecast_command() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        let cli = Cli::parse_from([
            "aurora-maps",
            "forecast",
            "--time",
            "18:00",
            "--data-dir",
            "/data/era5",
            "--date",
            "2025-06-01",
            "--region",
            "-8:-4:70:73",
            "--region-name",
            "Chagos",
            "--backend",
            "persistence",
            "--format",
            "yaml",
        ]);

        if let Commands::Forecast(args) = &cli.command {
            assert_eq!(args.time, DisplayTime::Evening);
            assert_eq!(args.time.step_index(), 5);
            assert_eq!(args.data_dir, Some(PathBuf::from("/data/era5")));
            assert_eq!(args.date.as_deref(), Some("2025-06-01"));
            assert_eq!(args.region, Some(BoundingBox::new(-8.0, -4.0, 70.0, 73.0)));
            assert_eq!(args.region_name.as_deref(), Some("Chagos"));
            assert_eq!(args.backend, Some(ModelBackend::Persistence));
            assert_eq!(args.page.resolved_format(), PageFormat::Yaml);
        } else {
            panic!("Expected Forecast command");
        }
    }

    #[test]
    fn test_forecast_defaults_to_midnight() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        let cli = Cli::parse_from(["aurora-maps", "forecast"]);

        if let Commands::Forecast(args) = &cli.command {
            assert_eq!(args.time, DisplayTime::Midnight);
            assert_eq!(args.time.step_index(), 2);
            assert_eq!(args.region, None);
            assert_eq!(args.backend, None);
        } else {
            panic!("Expected Forecast command");
        }
    }

    #[test]
    fn test_invalid_forecast_values() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();
        assert!(Cli::try_parse_from(["aurora-maps", "forecast", "--time", "09:00"]).is_err());
        assert!(Cli::try_parse_from(["aurora-maps", "forecast", "--region", "1:2:3"]).is_err());
        assert!(Cli::try_parse_from(["aurora-maps", "forecast", "--backend", "gpu"]).is_err());
    }

    #[test]
    fn test_split_command() {
        let cli = Cli::parse_from([
            "aurora-maps",
            "split",
            "2025-05-05-atmospheric.nc",
            "-k",
            "3",
            "--output-dir",
            "parts",
            "--keep-source",
            "--dry-run",
        ]);

        if let Commands::Split(args) = &cli.command {
            assert_eq!(args.file, PathBuf::from("2025-05-05-atmospheric.nc"));
            assert_eq!(args.parts, Some(3));
            assert_eq!(args.output_dir, Some(PathBuf::from("parts")));
            assert!(args.keep_source);
            assert!(args.dry_run);
        } else {
            panic!("Expected Split command");
        }
    }

    #[test]
    fn test_split_requires_file() {
        assert!(Cli::try_parse_from(["aurora-maps", "split"]).is_err());
    }

    #[test]
    fn test_info_command() {
        let cli = Cli::parse_from([
            "aurora-maps",
            "info",
            "static.nc",
            "--detailed",
            "-n",
            "z",
            "--format",
            "csv",
        ]);

        if let Commands::Info {
            file,
            detailed,
            variable,
            format,
        } = &cli.command
        {
            assert_eq!(file, &PathBuf::from("static.nc"));
            assert!(*detailed);
            assert_eq!(variable.as_deref(), Some("z"));
            assert_eq!(format, &Some(OutputFormat::Csv));
        } else {
            panic!("Expected Info command");
        }
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from([
            "aurora-maps",
            "validate",
            "aurora.yaml",
            "--detailed",
            "--check-files",
        ]);

        if let Commands::Validate {
            config_file,
            detailed,
            check_files,
        } = &cli.command
        {
            assert_eq!(config_file, &Some(PathBuf::from("aurora.yaml")));
            assert!(*detailed);
            assert!(*check_files);
        } else {
            panic!("Expected Validate command");
        }
    }

    #[test]
    fn test_template_command() {
        let cli = Cli::parse_from([
            "aurora-maps",
            "template",
            "offline",
            "--format",
            "yaml",
            "-o",
            "aurora.yaml",
        ]);

        if let Commands::Template {
            template_type,
            output,
            format,
        } = &cli.command
        {
            assert_eq!(template_type, &TemplateType::Offline);
            assert_eq!(output, &Some(PathBuf::from("aurora.yaml")));
            assert_eq!(format, &ConfigFormat::Yaml);
        } else {
            panic!("Expected Template command");
        }
    }

    #[test]
    fn test_template_types() {
        let templates = [
            ("basic", TemplateType::Basic),
            ("offline", TemplateType::Offline),
            ("custom-region", TemplateType::CustomRegion),
        ];

        for (name, expected) in templates {
            let cli = Cli::parse_from(["aurora-maps", "template", name]);
            if let Commands::Template { template_type, .. } = &cli.command {
                assert_eq!(template_type, &expected);
            } else {
                panic!("Expected Template command");
            }
        }
    }

    #[test]
    fn test_output_format_values() {
        let formats = [
            ("human", OutputFormat::Human),
            ("json", OutputFormat::Json),
            ("yaml", OutputFormat::Yaml),
            ("csv", OutputFormat::Csv),
        ];

        for (name, expected) in formats {
            let cli =
                Cli::parse_from(["aurora-maps", "--output-format", name, "template", "basic"]);
            assert_eq!(cli.output_format, expected);
        }
    }

    #[test]
    fn test_verbose_quiet_conflict() {
        let result =
            Cli::try_parse_from(["aurora-maps", "--verbose", "--quiet", "info", "test.nc"]);
        assert!(result.is_err());

        let cli_quiet = Cli::parse_from(["aurora-maps", "--quiet", "info", "test.nc"]);
        assert!(!cli_quiet.verbose);
        assert!(cli_quiet.quiet);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["aurora-maps", "split", "a.nc", "--quiet"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_environment_variables() {
        let _guard = ENV_TEST_MUTEX.lock().unwrap();

        unsafe {
            std::env::set_var("AURORA_MAPS_TIME", "12:00");
            std::env::set_var("AURORA_MAPS_REGION_NAME", "Seychelles");
            std::env::set_var("AURORA_MAPS_LOCATION", "Perth");
        }

        let forecast = Cli::try_parse_from(["aurora-maps", "forecast"]);
        let overridden = Cli::try_parse_from(["aurora-maps", "forecast", "--time", "06:00"]);
        let mockup = Cli::try_parse_from(["aurora-maps", "mockup"]);

        unsafe {
            std::env::remove_var("AURORA_MAPS_TIME");
            std::env::remove_var("AURORA_MAPS_REGION_NAME");
            std::env::remove_var("AURORA_MAPS_LOCATION");
        }

        if let Commands::Forecast(args) = &forecast.unwrap().command {
            assert_eq!(args.time, DisplayTime::Noon);
            assert_eq!(args.region_name.as_deref(), Some("Seychelles"));
        } else {
            panic!("Expected Forecast command");
        }
        if let Commands::Forecast(args) = &overridden.unwrap().command {
            assert_eq!(args.time, DisplayTime::Morning);
        } else {
            panic!("Expected Forecast command");
        }
        if let Commands::Mockup { location, .. } = &mockup.unwrap().command {
            assert_eq!(location, "Perth");
        } else {
            panic!("Expected Mockup command");
        }
    }

    #[test]
    fn test_completions_command() {
        let cli = Cli::parse_from(["aurora-maps", "completions", "zsh"]);
        assert!(matches!(cli.command, Commands::Completions { .. }));
    }
}
