// drivetunes - terminal media dashboard for shared Google Drive folders
// Browse folders, stream a track, watch the spectrum.

use anyhow::{Context, Result};
use clap::Parser;
use drivetunes::{config::Config, logging, ui::App};
use std::path::PathBuf;
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(name = "drivetunes")]
#[command(about = "Browse Google Drive folders and play audio with a live spectrum")]
struct Args {
    /// Config file to use instead of the one in the platform config dir
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable developer logging (stderr + debug output)
    #[arg(long)]
    dev: bool,

    /// Open the file explorer instead of the dashboard
    #[arg(long)]
    explorer: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load config - writes defaults on first run
    let config_path = match args.config {
        Some(path) => path,
        None => Config::config_path()?,
    };
    let config = Config::load_from(&config_path).context("Failed to load configuration")?;

    let _log_guard = logging::init_logging(&config.log_dir, args.dev)?;
    info!("drivetunes starting up");

    config.validate(&config_path)?;

    // Only redirect stderr if NOT in dev mode (dev mode needs stderr for debug output)
    if !args.dev {
        debug!("Redirecting stderr to suppress audio backend noise");
        logging::redirect_stderr_to_null()?;
    }

    // stderr may be gone by now, so failures also go to the log file
    let mut app = App::new(config, args.explorer).inspect_err(|e| error!("Startup failed: {:#}", e))?;
    app.run().await.inspect_err(|e| error!("Exited with error: {:#}", e))?;

    Ok(())
}
