use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use feedcourier::app::App;
use feedcourier::Config;

/// Poll feeds, extract articles and deliver them to Telegram.
#[derive(Debug, Parser)]
#[command(name = "feedcourier", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "FEEDCOURIER_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Run one cycle per source and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load_with_env(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = feedcourier::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        feedcourier::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    info!("feedcourier {}", env!("CARGO_PKG_VERSION"));

    let app = match App::new(config).await {
        Ok(app) => app,
        Err(e) => {
            error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.once {
        return match app.run_once().await {
            Ok(0) => ExitCode::SUCCESS,
            Ok(failed) => {
                error!("{} cycle(s) failed", failed);
                ExitCode::FAILURE
            }
            Err(e) => {
                error!("Run failed: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    match app.run(shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
