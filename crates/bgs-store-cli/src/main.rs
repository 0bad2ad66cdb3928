mod cli;
mod commands;

use bgs_logging::ServiceContextGuard;
use clap::Parser;

use crate::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _log_guard = cli.global.subscriber().init()?;
    let _service = ServiceContextGuard::new("bgs-store");

    let config = commands::resolve_config(&cli.global)?;
    let store = commands::open_store(&cli.command, &config)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::run(&cli.command, &store, &config, &mut out)
}
