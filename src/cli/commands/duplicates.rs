//! Duplicate entity detection and merge commands.

use console::style;

use crate::config::Settings;
use crate::dedupe::find_duplicates;
use crate::models::EntityKind;

/// Scan entity names for likely duplicates.
pub async fn cmd_duplicates_scan(
    settings: &Settings,
    kind: Option<&str>,
    threshold: f64,
) -> anyhow::Result<()> {
    let ctx = settings.create_db_context();
    let entities = ctx.entities();

    let kinds: Vec<EntityKind> = match kind {
        Some(k) => match EntityKind::from_str(k) {
            Some(parsed) => vec![parsed],
            None => {
                println!("{} Unknown entity kind '{}'", style("✗").red(), k);
                println!(
                    "  Expected one of: skater, spot, photographer, brand, trick, event, location"
                );
                return Ok(());
            }
        },
        None => EntityKind::ALL.to_vec(),
    };

    let mut total_groups = 0usize;

    for kind in kinds {
        let rows = entities.list(kind).await?;
        let groups = find_duplicates(kind, &rows, threshold);

        if groups.is_empty() {
            continue;
        }

        println!(
            "\n{}",
            style(format!("Possible duplicate {}", kind.plural())).bold()
        );
        println!("{}", "-".repeat(64));

        for group in &groups {
            total_groups += 1;
            let names = group
                .members
                .iter()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>()
                .join(" / ");
            let ids = group
                .members
                .iter()
                .map(|m| m.id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "  {} {} (score {:.2}, ids {})",
                style("→").cyan(),
                names,
                group.score,
                ids
            );
        }
    }

    if total_groups == 0 {
        println!(
            "{} No duplicates found at threshold {:.2}",
            style("✓").green(),
            threshold
        );
    } else {
        println!(
            "\n  {} Merge with 'gnar duplicates merge <kind> <winner-id> <loser-id>...'",
            style("→").dim()
        );
    }

    Ok(())
}

/// Merge duplicate entities into one surviving entity.
pub async fn cmd_duplicates_merge(
    settings: &Settings,
    kind: &str,
    winner_id: i64,
    loser_ids: &[i64],
    confirm: bool,
) -> anyhow::Result<()> {
    let ctx = settings.create_db_context();
    let entities = ctx.entities();

    let Some(kind) = EntityKind::from_str(kind) else {
        println!("{} Unknown entity kind '{}'", style("✗").red(), kind);
        println!(
            "  Expected one of: skater, spot, photographer, brand, trick, event, location"
        );
        return Ok(());
    };

    if loser_ids.contains(&winner_id) {
        println!(
            "{} Winner {} is among the losers",
            style("✗").red(),
            winner_id
        );
        return Ok(());
    }

    let Some(winner) = entities.get(kind, winner_id).await? else {
        println!(
            "{} No {} with id {}",
            style("✗").red(),
            kind.as_str(),
            winner_id
        );
        return Ok(());
    };

    println!(
        "\n{} Merge into {} '{}' (id {})",
        style("→").cyan(),
        kind.as_str(),
        style(&winner.name).green(),
        winner.id
    );
    for loser_id in loser_ids {
        match entities.get(kind, *loser_id).await? {
            Some(loser) => {
                println!("  {} '{}' (id {})", style("✗").red(), loser.name, loser.id)
            }
            None => {
                println!(
                    "{} No {} with id {}",
                    style("✗").red(),
                    kind.as_str(),
                    loser_id
                );
                return Ok(());
            }
        }
    }

    if !confirm {
        println!(
            "\n{} Dry run only. Re-run with --confirm to merge.",
            style("!").yellow()
        );
        return Ok(());
    }

    let outcome = entities.merge_entities(kind, winner_id, loser_ids).await?;

    println!(
        "\n{} Merged {} entities into '{}'",
        style("✓").green(),
        outcome.losers_deleted,
        winner.name
    );
    println!("  Appearances moved:  {}", outcome.appearances_moved);
    println!("  Appearances folded: {}", outcome.appearances_folded);
    println!("  Mentions rewritten: {}", outcome.mentions_rewritten);
    if outcome.spots_relinked > 0 {
        println!("  Spots relinked:     {}", outcome.spots_relinked);
    }

    Ok(())
}
