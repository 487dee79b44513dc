//! Catalog listing and inspection commands.

use console::style;

use crate::config::Settings;
use crate::models::MagazineStatus;

use super::helpers::{format_bytes, truncate};

/// List magazines in the catalog.
pub async fn cmd_ls(settings: &Settings, status: Option<&str>, limit: i64) -> anyhow::Result<()> {
    let ctx = settings.create_db_context();
    let magazines = ctx.magazines();

    let status_filter = match status {
        Some(s) => match MagazineStatus::from_str(s) {
            Some(parsed) => Some(parsed),
            None => {
                println!(
                    "{} Unknown status '{}'. Expected pending, processing, review, or published.",
                    style("✗").red(),
                    s
                );
                return Ok(());
            }
        },
        None => None,
    };

    let rows = magazines
        .list(status_filter, (limit > 0).then_some(limit))
        .await?;

    if rows.is_empty() {
        println!(
            "{} No magazines found. Run 'gnar import <pdf>' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Magazines").bold());
    println!("{}", "-".repeat(84));
    println!("{:<38} {:<24} {:<12} Pages", "ID", "Issue", "Status");
    println!("{}", "-".repeat(84));

    for mag in &rows {
        let pages = mag
            .page_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<38} {:<24} {:<12} {}",
            mag.id,
            truncate(&mag.label(), 23),
            mag.status.as_str(),
            pages
        );
    }

    let total = magazines.count().await?;
    if (rows.len() as u64) < total {
        println!("\n  Showing {} of {} magazines", rows.len(), total);
    }

    Ok(())
}

/// Show magazine metadata and extraction counts.
pub async fn cmd_info(settings: &Settings, magazine_id: &str) -> anyhow::Result<()> {
    let ctx = settings.create_db_context();
    let magazines = ctx.magazines();

    let Some(mag) = magazines.get(magazine_id).await? else {
        println!(
            "{} Magazine '{}' not found",
            style("✗").red(),
            magazine_id
        );
        return Ok(());
    };

    println!("\n{}", style(mag.label()).bold());
    println!("{}", "-".repeat(48));
    println!("{:<16} {}", "ID:", mag.id);
    println!("{:<16} {}", "Status:", mag.status.as_str());
    println!("{:<16} {}", "Completeness:", mag.completeness.as_str());
    if let Some(ref volume) = mag.volume {
        println!("{:<16} {}", "Volume:", volume);
    }
    if let Some(month) = mag.month {
        println!("{:<16} {}", "Month:", month);
    }
    println!("{:<16} {}", "PDF:", mag.pdf_path.display());
    if let Ok(meta) = std::fs::metadata(&mag.pdf_path) {
        println!("{:<16} {}", "PDF size:", format_bytes(meta.len()));
    }
    println!("{:<16} {}", "SHA-256:", mag.pdf_sha256);
    if let Some(n) = mag.page_count {
        println!("{:<16} {}", "Logical pages:", n);
    }
    if let Some(ref cover) = mag.cover_image_path {
        println!("{:<16} {}", "Cover:", cover);
    }
    println!(
        "{:<16} {}",
        "Imported:",
        mag.created_at.format("%Y-%m-%d %H:%M")
    );

    let stored = magazines.count_pages(&mag.id).await?;
    println!("{:<16} {}", "Pages stored:", stored);

    let entities = ctx.entities();
    let counts = entities.appearance_counts(&mag.id).await?;
    if !counts.is_empty() {
        println!("\n{}", style("Extracted entities").bold());
        println!("{}", "-".repeat(48));
        for (kind, count) in &counts {
            println!("{:<16} {}", format!("{}:", kind.plural()), count);
        }
        let mentions = entities.mentions_for_magazine(&mag.id).await?;
        if !mentions.is_empty() {
            println!("{:<16} {}", "trick mentions:", mentions.len());
        }
    } else if mag.status == MagazineStatus::Pending {
        println!(
            "\n  {} Run 'gnar extract {}' to process pages",
            style("→").dim(),
            mag.id
        );
    }

    Ok(())
}
