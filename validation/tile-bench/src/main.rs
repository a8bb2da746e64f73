//! Tile benchmark CLI.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use tile_bench::{BenchConfig, BenchmarkRunner, ResultsReport, Selection};

#[derive(Parser)]
#[command(name = "tile-bench")]
#[command(about = "Viewport tile benchmark for XYZ tile servers", long_about = None)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info", env = "TILE_BENCH_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark from a scenario file
    Run {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Only run these sources (repeatable)
        #[arg(long = "source")]
        sources: Vec<String>,

        /// Only run these zoom levels (repeatable)
        #[arg(short, long = "zoom")]
        zooms: Vec<u32>,

        /// Override recorded rounds per case
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Override warm-up trials per case
        #[arg(short, long)]
        warmup: Option<u32>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,

        /// Also write the JSON report to this path
        #[arg(long)]
        save: Option<PathBuf>,

        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Print the tiles of one viewport without fetching them
    Tiles {
        /// Path to scenario YAML file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Zoom level
        #[arg(short, long)]
        zoom: u32,

        /// Source to expand URLs for (defaults to the first)
        #[arg(long)]
        source: Option<String>,
    },

    /// List available scenarios
    List {
        /// Scenarios directory
        #[arg(short, long, default_value = "scenarios")]
        dir: PathBuf,
    },
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    match cli.command {
        Commands::Run {
            scenario,
            sources,
            zooms,
            rounds,
            warmup,
            output,
            save,
            no_progress,
        } => {
            let mut config = BenchConfig::from_file(&scenario)
                .with_context(|| format!("loading scenario {}", scenario.display()))?;

            if let Some(r) = rounds {
                config.rounds = r;
            }
            if let Some(w) = warmup {
                config.warmup_iterations = w;
            }

            info!(
                name = %config.name,
                sources = config.sources.len(),
                zooms = ?config.zooms,
                viewport = %format!("{}x{}", config.viewport.width, config.viewport.height),
                "Scenario loaded"
            );

            let runner = BenchmarkRunner::with_http(config)?.show_progress(!no_progress);
            let report = runner.run(&Selection { sources, zooms }).await?;

            if let Some(path) = save {
                std::fs::write(&path, ResultsReport::format_json(&report)?)
                    .with_context(|| format!("writing report {}", path.display()))?;
                info!(path = %path.display(), "Report saved");
            }

            match output {
                OutputFormat::Json => println!("{}", ResultsReport::format_json(&report)?),
                OutputFormat::Csv => {
                    println!("{}", ResultsReport::csv_header());
                    println!("{}", ResultsReport::format_csv(&report));
                }
                OutputFormat::Table => println!("{}", ResultsReport::format_table(&report)),
            }

            Ok(())
        }
        Commands::Tiles {
            scenario,
            zoom,
            source,
        } => {
            let config = BenchConfig::from_file(&scenario)
                .with_context(|| format!("loading scenario {}", scenario.display()))?;
            let source = match source {
                Some(name) => name,
                None => config
                    .sources
                    .first()
                    .map(|s| s.name.clone())
                    .context("scenario has no sources")?,
            };
            let query = config.source(&source)?.query(&config.base_params);

            let runner = BenchmarkRunner::with_http(config)?;
            let (center, urls) = runner.viewport_urls(&source, zoom)?;
            let bounds = tile_common::tile::tile_to_latlon_bounds(&center);

            println!("Source: {}", source);
            println!(
                "Center: {} (lng {:.4}..{:.4}, lat {:.4}..{:.4})",
                center, bounds.west, bounds.east, bounds.south, bounds.north
            );
            println!("Tiles: {}", urls.len());
            if !query.is_empty() {
                let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                println!("Query: {}", pairs.join("&"));
            }
            for url in urls {
                println!("  {}", url);
            }

            Ok(())
        }
        Commands::List { dir } => {
            let entries = std::fs::read_dir(&dir)
                .with_context(|| format!("reading scenarios directory {}", dir.display()))?;

            let mut scenarios = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if !matches!(
                    path.extension().and_then(|s| s.to_str()),
                    Some("yaml") | Some("yml")
                ) {
                    continue;
                }
                match BenchConfig::from_file(&path) {
                    Ok(config) => {
                        let file = entry.file_name().to_string_lossy().to_string();
                        scenarios.push((file, config));
                    }
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping scenario"),
                }
            }
            scenarios.sort_by(|a, b| a.0.cmp(&b.0));

            println!("Available scenarios in {}:", dir.display());
            println!();
            if scenarios.is_empty() {
                println!("No scenario files found");
            }
            for (file, config) in scenarios {
                println!("  {} - {}", file, config.name);
                if !config.description.is_empty() {
                    println!("    {}", config.description);
                }
                let names: Vec<&str> = config.sources.iter().map(|s| s.name.as_str()).collect();
                println!("    sources: {}  zooms: {:?}", names.join(", "), config.zooms);
                println!();
            }

            Ok(())
        }
    }
}
