mod api;
mod cli;
mod logging;
mod model;
mod orchestrator;
mod session;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_headless = args.is_headless();

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit with code 0 in headless modes; abandoned requests must not keep us alive.
            if is_headless {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            if is_headless {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
            Err(e)
        }
    }
}
