//! registry-config - inspect and watch registry-backed configuration.

use std::{error::Error, process};

use clap::Parser;
use registry_config::{
    cli::{self, Cli, formatting::format_error},
    tracing_config,
};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let _log_guard = match &cli.log_dir {
        Some(log_dir) => Some(tracing_config::init_with_file(log_dir)?),
        None => {
            tracing_config::init()?;
            None
        }
    };
    debug!(command = ?cli.command, "Running command");

    match cli::run(cli).await {
        Ok(output) => {
            if !output.trim().is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format_error(&e.to_string()));
            process::exit(1);
        }
    }
}
