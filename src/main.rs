//! GNArchive - skateboard magazine archive and entity extraction system.
//!
//! A tool for cataloging scanned skateboard magazines, rasterizing their
//! pages, and extracting the skaters, spots, tricks, brands, and events
//! that appear in them.

use gnarchive::cli;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if cli::is_verbose() {
        "gnarchive=info"
    } else {
        "gnarchive=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    cli::run().await
}
