// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, set up logging, dispatch the
//   chosen scenario.
// - Returns `anyhow::Result`, so the first failing step prints its
//   message and the process exits non-zero.

use anyhow::Result;
use clap::Parser;

use wbmove_cli::cli::{Cli, Command};
use wbmove_cli::commands;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::MoveToProject(args) => commands::move_to_project(args)?,
        Command::MoveToServer(args) => commands::move_to_server(args)?,
        Command::MoveToSite(args) => commands::move_to_site(args)?,
    }
    Ok(())
}

/// Log to stderr at info by default, debug with `--verbose`; an explicit
/// `RUST_LOG` still takes precedence.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
