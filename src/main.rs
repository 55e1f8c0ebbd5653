use clap::{Parser, Subcommand};
use fidelity_gate::config::{self, ConfigSource, GateConfig, ThresholdOverrides};
use fidelity_gate::verify::{self, VerifyInput, VerifyOptions};
use fidelity_gate::{batch, output, scan};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status for a rejected candidate, or a batch with an unresolved job.
const EXIT_REJECTED: u8 = 2;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

/// Flags for commands that verify candidates.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the verdict cache and verify every candidate again
    #[arg(long)]
    no_cache: bool,
}

/// Threshold overrides, applied after config.toml and the environment.
#[derive(clap::Args, Clone, Copy)]
struct ThresholdArgs {
    /// Minimum PSNR in dB inside the mask
    #[arg(long, global = true)]
    min_psnr: Option<f64>,

    /// Maximum mean squared error inside the mask
    #[arg(long, global = true)]
    max_mse: Option<f64>,

    /// Maximum mean color delta inside the mask
    #[arg(long, global = true)]
    max_color_delta: Option<f64>,
}

impl From<ThresholdArgs> for ThresholdOverrides {
    fn from(args: ThresholdArgs) -> Self {
        Self {
            min_psnr: args.min_psnr,
            max_mse: args.max_mse,
            max_color_delta: args.max_color_delta,
        }
    }
}

#[derive(clap::Args, Clone)]
struct CheckArgs {
    /// Unedited photo
    #[arg(long)]
    original: PathBuf,

    /// Region mask (white = compared)
    #[arg(long)]
    mask: PathBuf,

    /// Edited photo to verify
    #[arg(long)]
    candidate: PathBuf,

    /// Print the full verification report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
#[command(name = "fidelity-gate")]
#[command(about = "Verify that edited product photos preserve the product")]
#[command(long_about = "\
Verify that edited product photos preserve the product

Compares a candidate edit against the original inside a binary mask and
accepts it only if PSNR, MSE and mean color delta are all within tolerance.

Batch structure:

  jobs/
  ├── config.toml                  # Thresholds and normalization (optional)
  ├── 010-red-sneaker/             # Job (numbered = processed in order)
  │   ├── original.jpg             # Unedited photo
  │   ├── mask.png                 # White = product region
  │   ├── 001-studio.png           # Candidates, tried in number order
  │   └── 002-beach.png
  └── 020-Lamps/                   # Grouping directory
      └── 010-desk-lamp/           # Nested job

The first accepted candidate of each job is selected.

Exit status: 0 accepted, 2 rejected (check) or some job unresolved (batch).

Run 'fidelity-gate gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Batch root directory
    #[arg(long, default_value = "jobs", global = true)]
    source: PathBuf,

    /// Output directory for report.json and the verdict cache
    #[arg(long, default_value = "gate-report", global = true)]
    output: PathBuf,

    /// Config file to use instead of <source>/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    thresholds: ThresholdArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify one candidate against its original and mask
    Check(CheckArgs),
    /// List the jobs and candidates in the batch root
    Scan,
    /// Verify every job and write report.json
    Batch(CacheArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Command::Check(args) => {
            let config_source = match &cli.config {
                Some(path) => ConfigSource::explicit(path)?,
                None => ConfigSource::Stock,
            };
            let gate = resolve_config(&cli, &config_source)?;
            let options = VerifyOptions::from_gate_config(&gate);
            let original = std::fs::read(&args.original)?;
            let mask = std::fs::read(&args.mask)?;
            let candidate = std::fs::read(&args.candidate)?;
            let report = verify::verify(
                VerifyInput {
                    original: &original,
                    mask: &mask,
                    candidate: &candidate,
                },
                &options,
            )?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_verdict(&report, &options.thresholds);
            }
            if !report.verdict.accepted {
                return Ok(ExitCode::from(EXIT_REJECTED));
            }
        }
        Command::Scan => {
            let config_source = batch_config_source(&cli)?;
            let gate = resolve_config(&cli, &config_source)?;
            let manifest = scan::scan_with_config(&cli.source, gate, Some(&cli.output))?;
            output::print_scan_output(&manifest, &cli.source, &config_source);
        }
        Command::Batch(cache_args) => {
            println!("==> Scanning {}", cli.source.display());
            let config_source = batch_config_source(&cli)?;
            let gate = resolve_config(&cli, &config_source)?;
            let manifest = scan::scan_with_config(&cli.source, gate, Some(&cli.output))?;
            output::print_scan_output(&manifest, &cli.source, &config_source);

            println!("==> Verifying candidates");
            init_thread_pool(&manifest.config.processing);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_batch_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = batch::process(
                &manifest,
                &cli.source,
                &cli.output,
                !cache_args.no_cache,
                Some(tx),
            )?;
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;

            let report_path = cli.output.join("report.json");
            let json = serde_json::to_string_pretty(&result.report)?;
            std::fs::write(&report_path, json)?;
            output::print_batch_summary(&result.report);
            println!("Cache: {}", result.cache_stats);
            println!("==> Report: {}", report_path.display());

            if result.report.accepted_jobs() < result.report.jobs.len() {
                return Ok(ExitCode::from(EXIT_REJECTED));
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Diagnostics go to stderr; stdout carries command output only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// `--config` if given, otherwise `<source>/config.toml` when present.
fn batch_config_source(cli: &Cli) -> Result<ConfigSource, config::ConfigError> {
    match &cli.config {
        Some(path) => ConfigSource::explicit(path),
        None => Ok(ConfigSource::discover(&cli.source)),
    }
}

/// Load the file layer, then apply environment and threshold flags.
fn resolve_config(
    cli: &Cli,
    config_source: &ConfigSource,
) -> Result<GateConfig, config::ConfigError> {
    let base = config_source.load()?;
    let with_env = config::apply_env_overrides(base, |key| std::env::var(key).ok())?;
    ThresholdOverrides::from(cli.thresholds).apply(with_env)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down,
/// not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
