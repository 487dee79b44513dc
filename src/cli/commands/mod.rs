//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod catalog;
mod check;
mod duplicates;
mod extract;
mod helpers;
mod import;
mod init;
mod review;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};
use crate::dedupe::DEFAULT_THRESHOLD;

#[derive(Parser)]
#[command(name = "gnar")]
#[command(about = "Skateboard magazine archive and entity extraction")]
#[command(version)]
pub struct Cli {
    /// Data directory holding the database and rendered pages (overrides config file)
    #[arg(long, short = 'd', global = true)]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Register a magazine PDF in the catalog
    Import {
        /// Path to the PDF scan
        pdf: PathBuf,
        /// Magazine title, e.g. "Thrasher"
        #[arg(long)]
        title: String,
        /// Volume designator as printed on the issue
        #[arg(long)]
        volume: Option<String>,
        /// Issue number
        #[arg(long)]
        issue: Option<i32>,
        /// Cover year
        #[arg(long)]
        year: Option<i32>,
        /// Cover month (1-12)
        #[arg(long)]
        month: Option<i32>,
    },

    /// List magazines in the catalog
    Ls {
        /// Filter by status (pending, processing, review, published)
        #[arg(short, long)]
        status: Option<String>,
        /// Limit number of results (0 = unlimited)
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },

    /// Show magazine metadata and extraction counts
    Info {
        /// Magazine ID
        magazine_id: String,
    },

    /// Run the extraction pipeline for a magazine (render, OCR, LLM, persist)
    Extract {
        /// Magazine ID
        magazine_id: String,
        /// Limit number of logical pages to process
        #[arg(long)]
        max_pages: Option<usize>,
        /// Send page images to the vision model instead of OCR text
        #[arg(long)]
        vision: bool,
        /// Pages per parallel LLM batch (default from config)
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// LLM API endpoint (e.g., http://localhost:11434)
        #[arg(long)]
        endpoint: Option<String>,
        /// LLM model name (e.g., llama3.1:8b)
        #[arg(long)]
        model: Option<String>,
    },

    /// Review extracted appearances
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },

    /// Find and merge duplicate entities
    Duplicates {
        #[command(subcommand)]
        command: DuplicatesCommands,
    },

    /// Check external tool and LLM availability
    Check,
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// List appearances extracted from a magazine
    List {
        /// Magazine ID
        magazine_id: String,
    },
    /// Mark appearances as human-verified
    Verify {
        /// Appearance IDs (from 'review list')
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Transition a magazine from review to published
    Publish {
        /// Magazine ID
        magazine_id: String,
    },
}

#[derive(Subcommand)]
enum DuplicatesCommands {
    /// Scan entity names for likely duplicates
    Scan {
        /// Entity kind to scan (skater, spot, photographer, brand, trick, event, location)
        #[arg(short, long)]
        kind: Option<String>,
        /// Similarity threshold (0.0 - 1.0)
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
    },
    /// Merge duplicate entities into one surviving entity
    Merge {
        /// Entity kind
        kind: String,
        /// Entity ID that survives the merge
        winner_id: i64,
        /// Entity IDs to fold into the winner
        #[arg(required = true)]
        loser_ids: Vec<i64>,
        /// Actually perform the merge (dry run without it)
        #[arg(long)]
        confirm: bool,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data: cli.data,
    };
    let (settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Import {
            pdf,
            title,
            volume,
            issue,
            year,
            month,
        } => import::cmd_import(&settings, &pdf, &title, volume, issue, year, month).await,
        Commands::Ls { status, limit } => {
            catalog::cmd_ls(&settings, status.as_deref(), limit).await
        }
        Commands::Info { magazine_id } => catalog::cmd_info(&settings, &magazine_id).await,
        Commands::Extract {
            magazine_id,
            max_pages,
            vision,
            batch_size,
            endpoint,
            model,
        } => {
            extract::cmd_extract(
                &settings,
                &config,
                &magazine_id,
                max_pages,
                vision,
                batch_size,
                endpoint,
                model,
            )
            .await
        }
        Commands::Review { command } => match command {
            ReviewCommands::List { magazine_id } => {
                review::cmd_review_list(&settings, &magazine_id).await
            }
            ReviewCommands::Verify { ids } => review::cmd_review_verify(&settings, &ids).await,
            ReviewCommands::Publish { magazine_id } => {
                review::cmd_review_publish(&settings, &magazine_id).await
            }
        },
        Commands::Duplicates { command } => match command {
            DuplicatesCommands::Scan { kind, threshold } => {
                duplicates::cmd_duplicates_scan(&settings, kind.as_deref(), threshold).await
            }
            DuplicatesCommands::Merge {
                kind,
                winner_id,
                loser_ids,
                confirm,
            } => {
                duplicates::cmd_duplicates_merge(&settings, &kind, winner_id, &loser_ids, confirm)
                    .await
            }
        },
        Commands::Check => check::cmd_check(&settings, &config).await,
    }
}
