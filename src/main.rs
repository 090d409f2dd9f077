//! Taskboard server binary.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use taskboard::Server;

mod cli;

use cli::Cli;

fn setup_logging() -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    match std::env::var_os("LOG_FILE") {
        Some(log_file) => {
            let target = Box::new(
                fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&log_file)
                    .context("Failed to open log file")?,
            );
            builder.target(env_logger::Target::Pipe(target)).init();
            info!("Logging initialized, writing to: {}", log_file.to_string_lossy());
        }
        None => {
            builder.target(env_logger::Target::Stderr).init();
        }
    }

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.server_config().context("Invalid configuration")?;

    println!(
        "{} Starting taskboard on {} (database: {})",
        "→".blue(),
        config.bind_address().cyan(),
        config.database.to_string().dimmed()
    );

    let server = Server::new(config).context("Failed to create server")?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    rt.block_on(server.run()).context("Server error")?;

    println!("{} Server stopped", "✓".green());
    Ok(())
}

fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
