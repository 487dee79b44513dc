//! Appearance review commands.

use console::style;

use crate::config::Settings;
use crate::models::MagazineStatus;

use super::helpers::truncate;

/// List appearances extracted from a magazine.
pub async fn cmd_review_list(settings: &Settings, magazine_id: &str) -> anyhow::Result<()> {
    let ctx = settings.create_db_context();
    let magazines = ctx.magazines();
    let entities = ctx.entities();

    let Some(mag) = magazines.get(magazine_id).await? else {
        println!(
            "{} Magazine '{}' not found",
            style("✗").red(),
            magazine_id
        );
        return Ok(());
    };

    let appearances = entities.appearances_for_magazine(magazine_id).await?;

    if appearances.is_empty() {
        println!(
            "{} No appearances for {}. Run 'gnar extract {}' first.",
            style("!").yellow(),
            mag.label(),
            magazine_id
        );
        return Ok(());
    }

    println!(
        "\n{}",
        style(format!("Appearances: {}", mag.label())).bold()
    );
    println!("{}", "-".repeat(90));
    println!(
        "{:<6} {:<13} {:<26} {:<16} {:<16} {:<5} Ok",
        "ID", "Kind", "Name", "Context", "Pages", "Conf"
    );
    println!("{}", "-".repeat(90));

    for app in &appearances {
        let name = match entities.get(app.entity_type, app.entity_id).await? {
            Some(row) => row.name,
            None => format!("#{}", app.entity_id),
        };
        let pages = app
            .page_numbers
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let verified = if app.verified {
            style("✓").green().to_string()
        } else {
            String::new()
        };
        println!(
            "{:<6} {:<13} {:<26} {:<16} {:<16} {:<5.2} {}",
            app.id,
            app.entity_type.as_str(),
            truncate(&name, 25),
            app.context.as_str(),
            truncate(&pages, 15),
            app.confidence,
            verified
        );
    }

    println!(
        "\n  {} Verify rows with 'gnar review verify <id>...'",
        style("→").dim()
    );

    Ok(())
}

/// Mark appearances as human-verified.
pub async fn cmd_review_verify(settings: &Settings, ids: &[i64]) -> anyhow::Result<()> {
    let ctx = settings.create_db_context();
    let entities = ctx.entities();

    let updated = entities.verify_appearances(ids).await?;

    if updated == 0 {
        println!("{} No matching appearances", style("!").yellow());
    } else {
        println!(
            "{} Verified {} of {} appearances",
            style("✓").green(),
            updated,
            ids.len()
        );
    }

    Ok(())
}

/// Transition a magazine from review to published.
pub async fn cmd_review_publish(settings: &Settings, magazine_id: &str) -> anyhow::Result<()> {
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

    if mag.status != MagazineStatus::Review {
        println!(
            "{} {} is '{}', not 'review'. Only reviewed magazines can be published.",
            style("✗").red(),
            mag.label(),
            mag.status.as_str()
        );
        return Ok(());
    }

    magazines
        .update_status(magazine_id, MagazineStatus::Published)
        .await?;

    println!("{} Published {}", style("✓").green(), mag.label());

    Ok(())
}
