use anyhow::Result;
use remark_core::Command;
use tracing::{debug, warn};

mod args;
mod cmd;
mod config;
mod logger;

use config::RemarkConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let invocation = match args::parse(std::env::args()) {
        Ok(invocation) => invocation,
        Err(e) => e.exit(),
    };

    logger::init_logger(invocation.verbose(), invocation.quiet());

    for flag in &invocation.unknown {
        args::print_help();
        warn!("Unknown option {flag}, skipping");
    }

    if invocation.command == Command::Help {
        cmd::help::execute();
        return Ok(());
    }

    let config = RemarkConfig::load(&invocation)?;
    debug!(command = %config.command, ?config, "resolved configuration");

    match config.command {
        Command::Dev => cmd::dev::execute(&config).await,
        Command::Build => cmd::build::execute(&config).await,
        Command::Help => Ok(()),
    }
}
