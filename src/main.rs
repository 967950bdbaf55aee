//! confstore - inspect persisted option files

use clap::Parser;
use confstore::{
    cli::{CliExecutor, ConfstoreCli},
    logging::{init_logging, LogConfig, LogLevel},
    PersistenceConfig, Result,
};
use tracing::error;

fn main() -> Result<()> {
    let cli = ConfstoreCli::parse();

    let mut log_config = LogConfig::from_env();
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let executor = CliExecutor::new(PersistenceConfig::from_env(), cli.config, cli.json);
    if let Err(e) = executor.execute(cli.command) {
        error!("Command failed: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
