use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ratekeeper::config::{LoggingSettings, RatekeeperConfig};
use ratekeeper::replay::Replayer;
use ratekeeper::simulate::{simulate, SimulationParams};
use ratekeeper::{Algorithm, LimiterOptions};

/// Replay or simulate request traffic against in-process rate limiters.
#[derive(Debug, Parser)]
#[command(name = "ratekeeper", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured algorithm
    #[arg(long, global = true, value_enum)]
    algorithm: Option<Algorithm>,

    /// Override the window length in milliseconds
    #[arg(long, global = true)]
    window_ms: Option<u64>,

    /// Override the requests admitted per window
    #[arg(long, global = true)]
    max_requests: Option<u64>,

    /// Bound the number of tracked keys
    #[arg(long, global = true)]
    max_keys: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Feed a `<timestamp_ms> <key>` trace through the limiter, printing one
    /// JSON decision per request
    Replay {
        /// Trace file; reads stdin when omitted
        file: Option<PathBuf>,
    },
    /// Run every algorithm over the same random traffic and print a summary
    Simulate {
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 10)]
        keys: usize,
        #[arg(long, default_value_t = 10_000)]
        requests: usize,
        #[arg(long, default_value_t = 60_000)]
        duration_ms: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = RatekeeperConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    init_tracing(&config.logging);
    let options = config.limiter.options()?;
    log_startup(cli.config.as_deref(), &config, &options);

    match cli.command {
        Command::Replay { file } => {
            let replayer = Replayer::new(config.limiter.algorithm, options);
            let stdout = io::stdout().lock();
            match file {
                Some(path) => {
                    info!(path = %path.display(), "Replaying trace file");
                    replayer.run(BufReader::new(File::open(&path)?), stdout)?;
                }
                None => {
                    info!("Replaying trace from stdin");
                    replayer.run(io::stdin().lock(), stdout)?;
                }
            }
        }
        Command::Simulate {
            seed,
            keys,
            requests,
            duration_ms,
        } => {
            let params = SimulationParams {
                keys,
                requests,
                duration_ms,
                seed,
            };
            let reports = simulate(&params, options)?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
    }

    Ok(())
}

impl Cli {
    /// Command-line flags win over file and environment settings.
    fn apply_overrides(&self, config: &mut RatekeeperConfig) {
        if let Some(algorithm) = self.algorithm {
            config.limiter.algorithm = algorithm;
        }
        if let Some(window_ms) = self.window_ms {
            config.limiter.window_size_ms = window_ms;
        }
        if let Some(max_requests) = self.max_requests {
            config.limiter.max_requests = max_requests;
        }
        if self.max_keys.is_some() {
            config.limiter.max_keys = self.max_keys;
        }
    }
}

fn log_startup(config_path: Option<&Path>, config: &RatekeeperConfig, options: &LimiterOptions) {
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = config_path {
        info!(path = %path.display(), "Loaded configuration file");
    }
    info!(
        algorithm = %config.limiter.algorithm,
        window_size_ms = options.window_size_ms(),
        max_requests = options.max_requests(),
        max_keys = ?options.max_keys(),
        "Configuration loaded"
    );
}

/// Install the global subscriber. Logs go to stderr so stdout stays machine-readable.
fn init_tracing(logging: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
