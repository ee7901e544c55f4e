//! Benchmark CLI for the partitioned raster engine.

use clap::{Parser, Subcommand};
use raster_bench::{BenchRunner, ResultsReport, ScenarioConfig, Workload};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "raster-bench")]
#[command(about = "Benchmark tool for partitioned raster operations", long_about = None)]
struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark from a scenario file
    Run {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override the number of iterations
        #[arg(short, long)]
        iterations: Option<usize>,

        /// Override the number of localities
        #[arg(short, long)]
        localities: Option<usize>,

        /// Output format: table (default), json, csv
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Run a quick benchmark without a scenario file
    Quick {
        /// Workload: focal_mean, accu_threshold, kinematic_wave, zonal_sum
        #[arg(short, long, default_value = "focal_mean")]
        workload: String,

        /// Number of rows and columns of the array
        #[arg(short, long, default_value = "512")]
        size: usize,

        /// Number of rows and columns of each partition
        #[arg(short, long, default_value = "128")]
        partition_size: usize,

        /// Number of iterations
        #[arg(short, long, default_value = "10")]
        iterations: usize,
    },

    /// List available scenarios
    List {
        /// Scenarios directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    if cli.json_logs {
        fmt().with_env_filter(filter).with_target(true).json().init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }

    match cli.command {
        Commands::Run {
            scenario,
            iterations,
            localities,
            output,
        } => {
            println!("Loading scenario: {}", scenario.display());

            let mut config = ScenarioConfig::from_file(&scenario)?;
            if let Some(i) = iterations {
                config.iterations = i;
            }
            if let Some(l) = localities {
                config.localities = l;
            }
            config.validate()?;

            println!("✓ Configuration loaded successfully");
            println!("  Name: {}", config.name);
            println!("  Description: {}", config.description);
            println!("  Workload: {}", config.workload.name());
            println!("  Iterations: {}", config.iterations);
            println!();

            let results = BenchRunner::new(config).run().await?;

            match output.as_str() {
                "json" => {
                    println!("{}", ResultsReport::format_json(&results)?);
                }
                "csv" => {
                    println!("{}", ResultsReport::csv_header());
                    println!("{}", ResultsReport::format_csv(&results));
                }
                _ => {
                    println!("{}", ResultsReport::format_table(&results));
                }
            }

            Ok(())
        }
        Commands::Quick {
            workload,
            size,
            partition_size,
            iterations,
        } => {
            println!("Running quick benchmark:");
            println!("  Workload: {}", workload);
            println!("  Array: {size}x{size}, partitions: {partition_size}x{partition_size}");
            println!();

            let config = ScenarioConfig {
                name: "quick".to_string(),
                description: "Quick benchmark".to_string(),
                shape: [size, size],
                partition_shape: [partition_size, partition_size],
                localities: 1,
                iterations,
                max_in_flight: 2,
                warmup_iterations: 1,
                seed: None,
                workload: Workload::from_name(&workload)?,
            };

            let results = BenchRunner::new(config).run().await?;
            println!("{}", ResultsReport::format_table(&results));

            Ok(())
        }
        Commands::List { dir } => {
            println!("Available scenarios in {}:", dir.display());
            println!();

            match std::fs::read_dir(&dir) {
                Ok(entries) => {
                    let mut scenarios = Vec::new();

                    for entry in entries.flatten() {
                        let path = entry.path();
                        if path.extension().and_then(|s| s.to_str()) != Some("yaml") {
                            continue;
                        }
                        if let Ok(config) = ScenarioConfig::from_file(&path) {
                            let file_name = entry.file_name().to_string_lossy().to_string();
                            scenarios.push((file_name, config));
                        }
                    }

                    scenarios.sort_by(|a, b| a.0.cmp(&b.0));

                    if scenarios.is_empty() {
                        println!("No scenario files found");
                    } else {
                        for (filename, config) in scenarios {
                            println!("  {} - {} ({})", filename, config.name, config.workload.name());
                            println!("    {}", config.description);
                            println!();
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Error reading directory: {}", e);
                    eprintln!("Make sure the directory exists and is readable");
                }
            }

            Ok(())
        }
    }
}
