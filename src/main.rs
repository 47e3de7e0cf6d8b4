//! pidrecord - turn JSON documents into linked PID records
//!
//! Loads record designs, applies them to the input files, infers backlinks and
//! registers the resulting graph (or writes it out offline).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{error, info};

use pidrecord_core::config::{Config, InputDistribution};
use pidrecord_core::core::rules::MergePolicy;
use pidrecord_core::executor::{Executor, RegistrationOutcome};
use pidrecord_core::input::FileInputProvider;
use pidrecord_core::mapping::generator::load_designs;
use pidrecord_core::registration::{HttpRegistrar, OfflineRegistrar, Registrar};
use pidrecord_core::telemetry::init_tracing;

#[derive(Parser)]
#[command(name = "pidrecord")]
#[command(about = "Build linked PID records from JSON documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Design file (.json or .toon), repeatable; designs run in the order given
    #[arg(short, long = "design", required = true)]
    designs: Vec<PathBuf>,

    /// Configuration file (.json or .toon)
    #[arg(short, long, env = "PIDRECORD_CONFIG")]
    config: Option<PathBuf>,

    /// Registration service base URL
    #[arg(long, env = "PIDRECORD_HOST")]
    host: Option<String>,

    /// Ask the service to validate without creating identifiers
    #[arg(long)]
    dry_run: bool,

    /// Do not contact the registration service
    #[arg(long)]
    offline: bool,

    /// Directory for records.json, mappings.json and api_response.json
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// last-write-wins, reject-on-conflict or multi-valued
    #[arg(long)]
    merge_policy: Option<MergePolicy>,

    /// drain or broadcast
    #[arg(long)]
    distribution: Option<InputDistribution>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Input JSON files or directories holding them
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(host) = &self.host {
            config.registration.host = host.clone();
        }
        config.registration.dryrun |= self.dry_run;
        config.registration.offline |= self.offline;
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(policy) = self.merge_policy {
            config.merge_policy = policy;
        }
        if let Some(distribution) = self.distribution {
            config.input_distribution = distribution;
        }
        Ok(config)
    }
}

/// Directories contribute their `.json` files in name order.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            let entries = fs::read_dir(input)
                .with_context(|| format!("reading input directory {}", input.display()))?;
            for entry in entries {
                let path = entry
                    .with_context(|| format!("reading an entry of input directory {}", input.display()))?
                    .path();
                if path.is_file() && is_json(&path) {
                    found.push(path);
                }
            }
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    if files.is_empty() {
        bail!("no input files found");
    }
    Ok(files)
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

fn run(cli: &Cli) -> Result<bool> {
    let config = cli.config()?;

    let mut executor = Executor::new(config.clone());
    for path in &cli.designs {
        let designs = load_designs(path).with_context(|| format!("loading designs from {}", path.display()))?;
        executor.add_designs(designs);
    }

    let mut input = FileInputProvider::new(expand_inputs(&cli.inputs)?);
    let registrar: Box<dyn Registrar> = if config.registration.offline {
        Box::new(OfflineRegistrar)
    } else {
        Box::new(HttpRegistrar::new(&config.registration)?)
    };

    let report = executor.execute(&mut input, registrar.as_ref())?;
    info!(records = report.records, path = %report.batch_path.display(), "record graph written");
    Ok(match report.outcome {
        RegistrationOutcome::Registered { mapped } => {
            info!(mapped, "registration finished");
            true
        }
        RegistrationOutcome::NoMapping => true,
        RegistrationOutcome::Failed(_) => false,
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
