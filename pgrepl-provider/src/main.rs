use clap::Parser;
use pgrepl_telemetry::tracing::init_tracing;
use tracing::error;

use crate::cli::{Args, Command};
use crate::core::run_command;

mod cli;
mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr or to files, stdout only carries the command output.
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args.command))?;

    Ok(())
}

async fn async_main(command: Command) -> anyhow::Result<()> {
    let output = match run_command(command).await {
        Ok(output) => output,
        Err(err) => {
            error!("an error occurred in the provider: {err}");

            return Err(err);
        }
    };

    println!("{output}");

    Ok(())
}
