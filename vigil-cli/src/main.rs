//! Vigil CLI: runs the training pipeline or its validation gate.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Vigil: batch training with a schema and drift gate
#[derive(Parser, Debug)]
#[command(name = "vigil", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./vigil.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory for the per-run JSON log files
    #[arg(long, default_value = "logs", global = true)]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run ingestion, validation, transformation and training
    Run,

    /// Validate an existing train/test pair against the schema
    Validate {
        /// Reference (train) CSV file
        #[arg(long)]
        train: PathBuf,
        /// Candidate (test) CSV file
        #[arg(long)]
        test: PathBuf,
        /// Schema YAML (overrides pipeline.schema_path)
        #[arg(long)]
        schema: Option<PathBuf>,
        /// Artifact root for the validated files and drift report
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Load a CSV file into the document store
    Push {
        /// CSV file to insert, one document per row
        csv: PathBuf,
        /// Target database (defaults to ingestion.database)
        #[arg(long)]
        database: Option<String>,
        /// Target collection (defaults to ingestion.collection)
        #[arg(long)]
        collection: Option<String>,
    },

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration to the config path
    Init,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let started = chrono::Local::now();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // One JSON log file per invocation
    let _ = std::fs::create_dir_all(&cli.log_dir);
    let file_name = format!("{}.log", started.format("%d_%m_%Y_%H_%M_%S"));
    let file_appender = tracing_appender::rolling::never(&cli.log_dir, file_name);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(commands::handle_command(
        cli.command,
        cli.config.as_deref(),
        started,
    ));
    // A timed-out job may still be running until its next checkpoint; don't join it.
    runtime.shutdown_background();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from([
            "vigil", "-vv", "validate", "--train", "a.csv", "--test", "b.csv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Validate {
                train, test, schema, ..
            } => {
                assert_eq!(train, PathBuf::from("a.csv"));
                assert_eq!(test, PathBuf::from("b.csv"));
                assert!(schema.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["vigil", "run", "--config", "custom.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Run));
    }

    #[test]
    fn test_validate_requires_both_tables() {
        assert!(Cli::try_parse_from(["vigil", "validate", "--train", "a.csv"]).is_err());
    }
}
