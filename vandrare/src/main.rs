use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

mod config;
mod logging;
mod run;

/// Zero-config SSH gateway: reverse tunnels and a jump host behind one
/// process-private certificate authority.
#[derive(Parser)]
#[command(name = "vandrare", version)]
struct Cli {
    /// Path to a YAML config file. Every field is also settable through a
    /// `VANDRARE_`-prefixed environment variable.
    #[arg(long, short = 'c', env = "VANDRARE_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-d, -dd).
    #[arg(long, short = 'd', action = clap::ArgAction::Count)]
    debug: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.debug)?;

    let config = config::load_config(cli.config.as_deref())?;
    run::run(config).await
}
