//! faultsense - equipment fault analysis CLI
//!
//! Usage:
//!   faultsense analyze plant.csv -o rules.csv         # Mine fault rules
//!   faultsense train plant.csv rules.csv -o model.fsbn
//!   faultsense predict model.fsbn --temp 98 ...       # Classify one record
//!   faultsense evaluate model.fsbn batch.csv          # Batch accuracy
//!   faultsense faults plant.csv EQ-007                # Fault history of a device
//!   faultsense inspect model.fsbn                     # Model contents

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod output;

use commands::{analyze, evaluate, faults, inspect, predict, train};
use faultsense::data::Readings;

/// faultsense - equipment fault analysis
///
/// Mines association rules between sensor categories and fault types,
/// trains a Bayesian network from them and predicts faults.
#[derive(Parser)]
#[command(name = "faultsense")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// TOML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Discretize sensor data and mine fault rules
    Analyze {
        /// Sensor CSV
        #[arg(value_name = "CSV")]
        data: PathBuf,

        /// Rules file to write
        #[arg(short, long, default_value = "rules.csv")]
        output: PathBuf,

        /// Bins per feature
        #[arg(long)]
        bins: Option<usize>,

        /// Fixed strategy (equal_width, equal_freq, kmeans, quantile,
        /// std_based, decision_tree); disables the strategy search
        #[arg(long)]
        strategy: Option<String>,

        #[arg(long)]
        min_support: Option<f64>,

        #[arg(long)]
        min_confidence: Option<f64>,

        #[arg(long)]
        min_lift: Option<f64>,

        /// Longest itemset mined
        #[arg(long)]
        max_len: Option<usize>,
    },

    /// Train the fault network from data and a rules file
    Train {
        /// Sensor CSV
        #[arg(value_name = "CSV")]
        data: PathBuf,

        /// Rules file written by `analyze`
        #[arg(value_name = "RULES")]
        rules: PathBuf,

        /// Model file to write
        #[arg(short, long, default_value = "model.fsbn")]
        output: PathBuf,

        /// CPT estimator (bdeu or mle)
        #[arg(long)]
        estimator: Option<String>,

        /// Validate on the training rows instead of a holdout split
        #[arg(long)]
        in_sample: bool,
    },

    /// Predict the fault of one record
    Predict {
        /// Model file
        #[arg(value_name = "MODEL")]
        model: PathBuf,

        #[arg(long, default_value = "")]
        department: String,

        #[arg(long)]
        temp: f64,

        #[arg(long)]
        vibration: f64,

        #[arg(long)]
        oil_pressure: f64,

        #[arg(long)]
        voltage: f64,

        #[arg(long)]
        rpm: f64,

        /// Derive extreme limits from the model's bins, widened by this
        /// share of each feature's range
        #[arg(long)]
        extreme_margin: Option<f64>,
    },

    /// Score a labeled CSV in batch and report accuracy
    Evaluate {
        /// Model file
        #[arg(value_name = "MODEL")]
        model: PathBuf,

        /// Labeled sensor CSV
        #[arg(value_name = "CSV")]
        data: PathBuf,

        /// Print every prediction
        #[arg(long)]
        rows: bool,
    },

    /// List the fault records of one device, newest first
    Faults {
        /// Sensor CSV
        #[arg(value_name = "CSV")]
        data: PathBuf,

        /// Device id
        device: String,

        /// Records to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show what a model file contains
    Inspect {
        /// Model file
        #[arg(value_name = "MODEL")]
        model: PathBuf,

        /// Show bin boundaries
        #[arg(long)]
        bins: bool,
    },
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // a second init (tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn execute(cli: Cli) -> error::Result<()> {
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            data,
            output,
            bins,
            strategy,
            min_support,
            min_confidence,
            min_lift,
            max_len,
        } => {
            let overrides = analyze::Overrides {
                num_bins: bins,
                strategy,
                min_support,
                min_confidence,
                min_lift,
                max_len,
            };
            analyze::run(&data, &output, config, &overrides, cli.json, cli.quiet)
        }

        Commands::Train {
            data,
            rules,
            output,
            estimator,
            in_sample,
        } => train::run(
            &data,
            &rules,
            &output,
            config,
            estimator.as_deref(),
            in_sample,
            cli.json,
            cli.quiet,
        ),

        Commands::Predict {
            model,
            department,
            temp,
            vibration,
            oil_pressure,
            voltage,
            rpm,
            extreme_margin,
        } => {
            let record = predict::RecordArgs {
                department,
                readings: Readings {
                    temp,
                    vibration,
                    oil_pressure,
                    voltage,
                    rpm,
                },
            };
            predict::run(&model, record, &config, extreme_margin, cli.json)
        }

        Commands::Evaluate { model, data, rows } => evaluate::run(&model, &data, rows, cli.json),

        Commands::Faults {
            data,
            device,
            limit,
        } => faults::run(&data, &device, limit, cli.json),

        Commands::Inspect { model, bins } => inspect::run(&model, bins, cli.json),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            e.exit_code()
        }
    }
}
