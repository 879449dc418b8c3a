use anyhow::{bail, Result};
use clap::Parser;
use mussh::cli::{describe, Cli, Commands};
use mussh::config;
use mussh::console::{Markers, Terminal};
use mussh::queue::SerialQueue;
use mussh::run::client::libssh2::Ssh2Connector;
use mussh::Runner;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let inventory = config::load(cli.config.as_deref())?;
    let targets = inventory.matching(&cli.command.selection().query());

    if let Commands::List(_) = cli.command {
        for target in &targets {
            println!("{}", describe(target));
        }
        return Ok(());
    }

    let commands = cli.command.to_run();
    if commands.is_empty() {
        bail!("nothing to run: give at least one COMMAND or --script");
    }
    if targets.is_empty() {
        warn!("no servers matched");
        return Ok(());
    }

    let markers = match cli.no_color {
        true => Markers::plain(),
        false => Markers::detect(),
    };
    let runner = Runner::new(
        Ssh2Connector::new(),
        SerialQueue::new(),
        Arc::new(Terminal),
        markers,
    );

    // Each session logs its own failure. A failed session is not a failed run.
    let outcomes = runner.run_all(targets, &commands).await;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!("{} sessions finished, {failed} failed", outcomes.len());
    Ok(())
}

// Logs go to stderr so they never mix with remote output on stdout.
fn init_logging(verbose: u8) -> Result<()> {
    let default = match verbose {
        0 => "mussh=warn",
        1 => "mussh=info",
        2 => "mussh=debug",
        _ => "mussh=trace",
    };
    let filter = EnvFilter::try_from_env("MUSSH_LOG").or_else(|_| EnvFilter::try_new(default))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    Ok(())
}
