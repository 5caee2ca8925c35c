//! Command-line interface for modelgate.

use clap::{ArgGroup, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// modelgate - readiness-gated text classification serving and model promotion.
#[derive(Parser)]
#[command(name = "modelgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MODELGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MODELGATE_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Serve predictions from the baked-in model artifact
    Serve {
        /// Bind address for the prediction service
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Serialized model to load at startup
        #[arg(long)]
        model_path: Option<PathBuf>,

        /// Version marker read alongside the model
        #[arg(long)]
        version_path: Option<PathBuf>,

        /// Emit logs as JSON
        #[arg(long)]
        json_logs: bool,
    },

    /// Promote a run's model into the serving artifact layout
    #[command(group(
        ArgGroup::new("selection")
            .required(true)
            .args(["run_id", "experiment_name"])
    ))]
    Promote {
        /// Promote this run directly
        #[arg(long)]
        run_id: Option<String>,

        /// Promote the best run of this experiment
        #[arg(long)]
        experiment_name: Option<String>,

        /// Metric used to rank runs
        #[arg(long)]
        metric: Option<String>,

        /// Prefer the lowest metric value instead of the highest
        #[arg(long)]
        minimize: bool,

        /// Artifact path the model was logged under in the run
        #[arg(long = "model-path")]
        model_artifact_path: Option<String>,

        /// Destination of the promoted artifact
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Tracking server URI
        #[arg(long, env = "MLFLOW_TRACKING_URI")]
        tracking_uri: Option<String>,
    },

    /// Show version information
    Version,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
