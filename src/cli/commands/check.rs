//! Environment check command.

use console::style;

use crate::config::{Config, Settings};
use crate::llm::LlmClient;
use crate::ocr::OcrEngine;

/// Check external tool and LLM availability.
pub async fn cmd_check(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    println!("\n{}", style("External tools").bold());
    println!("{}", "-".repeat(48));

    let mut missing = 0;
    for (tool, available) in OcrEngine::check_tools() {
        if available {
            println!("  {} {}", style("✓").green(), tool);
        } else {
            missing += 1;
            println!("  {} {} (not found in PATH)", style("✗").red(), tool);
        }
    }
    if missing > 0 {
        println!("  Install poppler-utils and tesseract-ocr to render and OCR pages");
    }

    println!("\n{}", style("LLM endpoint").bold());
    println!("{}", "-".repeat(48));

    let client = LlmClient::new(config.llm.clone());
    if client.is_available().await {
        println!(
            "  {} {} (model: {})",
            style("✓").green(),
            config.llm.endpoint,
            config.llm.model
        );
    } else {
        println!("  {} {} unreachable", style("✗").red(), config.llm.endpoint);
        println!("  Make sure Ollama is running: ollama serve");
    }

    println!("\n{}", style("Database").bold());
    println!("{}", "-".repeat(48));

    if settings.database_exists() {
        let ctx = settings.create_db_context();
        match ctx.get_schema_version().await {
            Ok(Some(version)) => {
                let count = ctx.magazines().count().await?;
                println!(
                    "  {} {} (schema v{}, {} magazines)",
                    style("✓").green(),
                    settings.database_url(),
                    version,
                    count
                );
            }
            Ok(None) | Err(_) => {
                println!(
                    "  {} {} exists but has no schema. Run 'gnar init'.",
                    style("!").yellow(),
                    settings.database_url()
                );
            }
        }
    } else {
        println!(
            "  {} No database at {}. Run 'gnar init'.",
            style("!").yellow(),
            settings.database_path().display()
        );
    }

    Ok(())
}
