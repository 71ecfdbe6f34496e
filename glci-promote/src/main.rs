use anyhow::Result;
use clap::Parser;
use glci_promote::cli::{run, Cli};
use glci_promote::logging;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(&cli.log_level);
    tracing::info!("glci-promote starting");

    match run(cli).await {
        Ok(_) => {
            tracing::info!("glci-promote completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "glci-promote exited with error");
            Err(e)
        }
    }
}
