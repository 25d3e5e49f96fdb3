//! churn-serve CLI - HTTP prediction server for tabular churn models
//!
//! # Commands
//!
//! - `serve` - Start the prediction server
//! - `inspect` - Load the model and report its shape and schema agreement

use clap::{Parser, Subcommand};
use churn_serve::{
    cli,
    config::{ModelArgs, ServeConfig},
};
use tracing_subscriber::{fmt, EnvFilter};

/// churn-serve - prediction API for a trained churn classifier
#[derive(Parser)]
#[command(name = "churn-serve")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the prediction server
    ///
    /// Examples:
    ///   churn-serve serve
    ///   churn-serve serve --port 8080 --model ./models/rf_model.json
    Serve {
        #[command(flatten)]
        config: ServeConfig,
    },
    /// Load the model and report arity, feature order and schema drift
    ///
    /// Exits with status 1 if the model cannot be loaded.
    Inspect {
        #[command(flatten)]
        model: ModelArgs,
    },
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_logging(args.verbose);

    let outcome = match args.command {
        Commands::Serve { config } => cli::serve(config).await.map(|()| true),
        Commands::Inspect { model } => cli::inspect(&model),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
