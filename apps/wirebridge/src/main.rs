//! # wirebridge - Command Bridge Server
//!
//! ## Usage
//!
//! ```bash
//! # Start the server on $TMPDIR/wirebridge.sock
//! wirebridge serve
//!
//! # Talk to it
//! wirebridge send 'add "Number Slider" 100 100' 'add Panel 200 100' 'wire n1 n2'
//! echo 'assert_count 2' | wirebridge send
//!
//! # Run a script without a server
//! wirebridge run smoke.wb
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wirebridge::cli;
use wirebridge::config::LogFormat;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Resolve settings before logging so the log format can come from them
    let settings = cli.settings();
    let log_format = settings
        .as_ref()
        .map(|config| config.log_format)
        .unwrap_or_default();
    init_tracing(log_format);

    let config = match settings {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    if let Err(e) = cli::execute(cli, config).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing on stderr. `json` enables machine-parseable output.
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wirebridge=info".into());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
