//! modelgate CLI - Main entry point.

use modelgate::cli::{Cli, Commands};
use modelgate::config::GateConfig;
use modelgate::registry::RunOrder;
use modelgate::RunSelection;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let mut config = match &cli.config {
        Some(path) => GateConfig::from_file(path)?,
        None => GateConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    match cli.command {
        Commands::Serve {
            bind,
            model_path,
            version_path,
            json_logs,
        } => {
            if let Some(bind) = bind {
                config.server.bind_addr = bind;
            }
            if let Some(path) = model_path {
                config.artifact.model_path = path;
            }
            if let Some(path) = version_path {
                config.artifact.version_path = path;
            }
            config.observability.json_logs |= json_logs;
            config.validate()?;

            modelgate::observability::init(&config.observability)?;
            modelgate::serve(config).await?;
        }

        Commands::Promote {
            run_id,
            experiment_name,
            metric,
            minimize,
            model_artifact_path,
            out,
            tracking_uri,
        } => {
            if let Some(metric) = metric {
                config.promotion.metric = metric;
            }
            if minimize {
                config.promotion.maximize = false;
            }
            if let Some(path) = model_artifact_path {
                config.promotion.model_artifact_path = path;
            }
            if let Some(out) = out {
                config.promotion.out_path = out;
            }
            // Falls back to the config file, then to the local default.
            if let Some(uri) = tracking_uri {
                config.registry.tracking_uri = uri;
            }
            config.validate()?;

            let selection = match (run_id, experiment_name) {
                (Some(run_id), _) => RunSelection::RunId(run_id),
                (None, Some(experiment_name)) => RunSelection::Best {
                    experiment_name,
                    order: RunOrder {
                        metric: config.promotion.metric.clone(),
                        maximize: config.promotion.maximize,
                    },
                },
                (None, None) => anyhow::bail!("either --run-id or --experiment-name is required"),
            };

            modelgate::observability::init(&config.observability)?;

            match modelgate::promote(&config, selection).await {
                Ok(outcome) => {
                    println!(
                        "Promoted run {} to {}",
                        outcome.run_id,
                        outcome.artifact_path.display()
                    );
                    println!("Provenance: {}", outcome.provenance_path.display());
                }
                Err(e) => {
                    eprintln!("Promotion failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("modelgate v{}", env!("CARGO_PKG_VERSION"));
            println!("Readiness-gated text classification serving with metric-ranked model promotion");
        }
    }

    Ok(())
}
