//! # wikiforge
//!
//! The command line binary for the wikiforge corpus builder.
//!
//! ## Usage
//!
//! ```bash
//! # Build every artifact for a snapshot from a local mirror
//! wikiforge run 20240601 20240603 --mirror-url /srv/dumps --workers 8
//!
//! # Resume, reusing every stage whose outputs exist
//! wikiforge run 20240601 20240603 --mirror-url /srv/dumps --skip-completed
//!
//! # What is already on disk
//! wikiforge status 20240601 20240603
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wikiforge::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // WIKIFORGE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("WIKIFORGE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wikiforge=info,wikiforge_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        let stage = e.failed_stage().unwrap_or("-").to_string();
        tracing::error!(
            stage = %stage,
            incomplete_chunks = ?e.incomplete_chunks(),
            "{}",
            e
        );
        std::process::exit(1);
    }
}
