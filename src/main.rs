mod auth;
mod cli;
mod config;
mod error;
mod indicator;
mod monitor;
mod output;
mod providers;
mod schedule;
mod status;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("buildlight=info"))
        .init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting buildlight - Azure DevOps build traffic light");
    cli.execute().await?;

    Ok(())
}
