// ABOUTME: Main entry point for the relay binary
// ABOUTME: Parses the CLI, initializes logging and configuration, then runs the subcommand

use anyhow::Result;
use clap::Parser;
use relay::{
    app,
    cli::{Cli, Command},
    config::Config,
    logging,
};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.log_format);
    let config = Config::load(cli.config.as_deref())?;

    match cli.command() {
        Command::Start => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting relay");
            app::start(config).await
        }
        Command::Jobs => {
            print!("{}", app::list_jobs(&config).await?);
            Ok(())
        }
        Command::CheckConfig => {
            println!("{}", app::check_config(&config)?);
            Ok(())
        }
    }
}
