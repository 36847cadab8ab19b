mod cli;
mod dialog;
mod logging;
mod model;
mod orchestrator;
mod store;
mod table;
#[cfg(test)]
mod test_support;
mod text_summary;
mod ticker;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = args.is_non_tui();

    let log_path = args.log_file.clone().unwrap_or_else(logging::default_log_path);
    let target = if is_non_tui || cfg!(not(feature = "tui")) {
        logging::LogTarget::Stderr
    } else {
        logging::LogTarget::File(&log_path)
    };
    logging::init(target, args.verbose)?;

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit with code 0 on success, especially for non-TUI modes
            if is_non_tui {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "exiting with error");
            if is_non_tui {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
            Err(e)
        }
    }
}
