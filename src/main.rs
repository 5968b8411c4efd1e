mod config;
mod discover;
mod extract;
mod ingest;
mod persist;
mod report;
mod run;
mod schema;
mod stats;
mod table;

use clap::Parser;
use config::{ReportConfig, DEFAULT_CONFIG_FILE};
use std::error::Error;
use std::path::PathBuf;

/// Summarize robustness-bound experiment logs: pull the per-sample
/// `[DEBUG][L1]` records out of each log, group them by model, target
/// selection and norm, and print LaTeX-ready tables of the results.
#[derive(Parser, Debug)]
#[command(name = "bound-report", version, about)]
pub struct Cli {
    /// Log file(s) or directories of `*.log` files
    #[arg(value_name = "PATH", required_unless_present = "inspect", num_args = 1..)]
    paths: Vec<PathBuf>,

    /// Describe previously saved group artifacts instead of processing logs
    #[arg(long, value_name = "ARTIFACT", num_args = 1.., conflicts_with_all = ["paths", "save_pickle"])]
    inspect: Vec<PathBuf>,

    /// Save every group's samples as a `pickle_{model}_{strategy}_norm{norm}` artifact
    #[arg(long = "save_pickle", alias = "save-pickle")]
    save_pickle: bool,

    /// Directory for saved artifacts (overrides config)
    #[arg(long)]
    save_dir: Option<PathBuf>,

    /// Index of the model tag in `_`-separated file names (overrides config)
    #[arg(long)]
    tag_offset: Option<usize>,

    /// Config file path [default: bound-report.toml, if present]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra logging (per-file and per-group details)
    #[arg(short, long)]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Load the config file and apply command-line overrides.
    fn resolve_config(&self) -> Result<ReportConfig, config::ConfigError> {
        let mut cfg = match &self.config {
            Some(path) => ReportConfig::load(path, true)?,
            None => ReportConfig::load(&PathBuf::from(DEFAULT_CONFIG_FILE), false)?,
        };
        if self.save_pickle {
            cfg.persist.enabled = true;
        }
        if let Some(dir) = &self.save_dir {
            cfg.persist.dir = dir.clone();
        }
        if let Some(offset) = self.tag_offset {
            cfg.models.tag_offset = offset;
        }
        Ok(cfg)
    }

    fn log_filter(&self) -> &'static str {
        if self.verbose {
            "bound_report=debug"
        } else if self.quiet {
            "bound_report=warn"
        } else {
            "bound_report=info"
        }
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_filter())),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let cfg = match cli.resolve_config() {
        Ok(cfg) => cfg,
        Err(e) => exit_with(&e),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = if cli.inspect.is_empty() {
        run::run(&cli.paths, &cfg, &mut out).map(|_| ())
    } else {
        run::inspect(&cli.inspect, &mut out)
    };
    if let Err(e) = outcome {
        exit_with(&e);
    }
}

fn exit_with(err: &dyn Error) -> ! {
    eprintln!("Error: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
    std::process::exit(1);
}
