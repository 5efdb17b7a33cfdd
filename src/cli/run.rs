use crate::config::parse::load_config;
use crate::pipeline::Pipeline;
use std::future::pending;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/logflow/config.yml");
            eprintln!("  /etc/logflow/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'logflow config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_pipeline(&config_path).await.map_err(|e| e.into())
}

async fn run_pipeline(config_path: &Path) -> Result<(), RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;
    let run_for = config.pipeline.run_for;

    let pipeline = Pipeline::new(config)?;
    let shutdown = CancellationToken::new();
    let handle = pipeline.start(shutdown.clone()).await?;

    match run_for {
        Some(limit) => info!(run_for = ?limit, "Pipeline started, stopping after the configured duration"),
        None => info!("Pipeline started, press Ctrl+C to shutdown"),
    }

    // Trigger shutdown on Ctrl+C or when the run limit elapses
    let trigger = shutdown.clone();
    let watcher = tokio::spawn(async move {
        let lifetime = async {
            match run_for {
                Some(limit) => tokio::time::sleep(limit).await,
                None => pending::<()>().await,
            }
        };
        tokio::pin!(lifetime);

        tokio::select! {
            _ = trigger.cancelled() => return,
            result = signal::ctrl_c() => match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                    (&mut lifetime).await;
                    info!("Run duration elapsed");
                }
            },
            _ = &mut lifetime => info!("Run duration elapsed"),
        }
        trigger.cancel();
    });

    let result = handle.wait().await;

    // The pipeline can end on its own when the tailer fails
    shutdown.cancel();
    watcher.abort();

    result?;
    Ok(())
}
