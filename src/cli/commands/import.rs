//! Magazine import command.

use std::path::Path;

use console::style;

use crate::config::Settings;
use crate::models::Magazine;
use crate::storage;

use super::helpers::format_bytes;

/// Register a magazine PDF in the catalog.
///
/// The PDF stays where it is; only its path and content hash are stored.
pub async fn cmd_import(
    settings: &Settings,
    pdf: &Path,
    title: &str,
    volume: Option<String>,
    issue: Option<i32>,
    year: Option<i32>,
    month: Option<i32>,
) -> anyhow::Result<()> {
    if !pdf.is_file() {
        println!("{} File not found: {}", style("✗").red(), pdf.display());
        return Ok(());
    }

    let ctx = settings.create_db_context();
    let magazines = ctx.magazines();

    println!("{} Hashing {}", style("→").cyan(), pdf.display());
    let sha256 = storage::hash_pdf_file(pdf)?;

    // Same scan content under a different filename is still a duplicate
    if let Some(existing) = magazines.get_by_sha256(&sha256).await? {
        println!(
            "{} Already imported as {} ({})",
            style("!").yellow(),
            existing.id,
            existing.label()
        );
        return Ok(());
    }

    let pdf_path = pdf.canonicalize().unwrap_or_else(|_| pdf.to_path_buf());
    let mut magazine = Magazine::new(
        uuid::Uuid::new_v4().to_string(),
        title.to_string(),
        pdf_path,
        sha256,
    );
    magazine.volume = volume;
    magazine.issue_number = issue;
    magazine.year = year;
    magazine.month = month;

    magazines.save(&magazine).await?;

    let size = std::fs::metadata(pdf).map(|m| m.len()).unwrap_or(0);
    println!(
        "{} Imported {} ({})",
        style("✓").green(),
        magazine.label(),
        format_bytes(size)
    );
    println!("  ID: {}", magazine.id);
    println!(
        "  {} Run 'gnar extract {}' to process pages",
        style("→").dim(),
        magazine.id
    );

    Ok(())
}
