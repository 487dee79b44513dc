//! Extraction pipeline command.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use crate::config::{Config, Settings};
use crate::extract::{ExtractEvent, ExtractOptions, ExtractionService};

use super::helpers::truncate;

/// Run the extraction pipeline for a magazine.
#[allow(clippy::too_many_arguments)]
pub async fn cmd_extract(
    settings: &Settings,
    config: &Config,
    magazine_id: &str,
    max_pages: Option<usize>,
    vision: bool,
    batch_size: Option<usize>,
    endpoint: Option<String>,
    model: Option<String>,
) -> anyhow::Result<()> {
    let ctx = settings.create_db_context();

    let mut llm_config = config.llm.clone();
    if let Some(ref ep) = endpoint {
        llm_config.endpoint = ep.clone();
    }
    if let Some(ref m) = model {
        if vision {
            llm_config.vision_model = m.clone();
        } else {
            llm_config.model = m.clone();
        }
    }

    let service = ExtractionService::new(ctx, llm_config.clone(), config.extract.clone());

    // Check if LLM service is available
    if !service.is_available().await {
        println!(
            "{} LLM service not available at {}",
            style("✗").red(),
            llm_config.endpoint
        );
        println!("  Make sure Ollama is running: ollama serve");
        return Ok(());
    }

    let model_name = if vision {
        &llm_config.vision_model
    } else {
        &llm_config.model
    };
    println!(
        "{} Connected to LLM at {} (model: {})",
        style("✓").green(),
        llm_config.endpoint,
        model_name
    );

    let options = ExtractOptions {
        max_pages,
        vision,
        batch_size,
    };

    // Create event channel for progress tracking
    let (event_tx, mut event_rx) = mpsc::channel::<ExtractEvent>(100);

    // State for progress bar
    let pb = Arc::new(tokio::sync::Mutex::new(None::<ProgressBar>));
    let pb_clone = pb.clone();

    // Spawn event handler for UI
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                ExtractEvent::RenderStarted => {
                    let spinner = ProgressBar::new_spinner();
                    spinner.set_style(
                        ProgressStyle::default_spinner()
                            .template("{spinner:.green} {msg}")
                            .unwrap(),
                    );
                    spinner.enable_steady_tick(Duration::from_millis(100));
                    spinner.set_message("Rasterizing pages...");
                    *pb_clone.lock().await = Some(spinner);
                }
                ExtractEvent::RenderCompleted { logical_pages } => {
                    if let Some(progress) = pb_clone.lock().await.take() {
                        progress.finish_and_clear();
                    }
                    println!(
                        "{} Rendered {} logical pages",
                        style("✓").green(),
                        logical_pages
                    );
                }
                ExtractEvent::OcrStarted { total_pages } => {
                    let progress = ProgressBar::new(total_pages as u64);
                    progress.set_style(
                        ProgressStyle::default_bar()
                            .template(
                                "{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}",
                            )
                            .unwrap()
                            .progress_chars("█▓░"),
                    );
                    progress.set_message("Running OCR...");
                    *pb_clone.lock().await = Some(progress);
                }
                ExtractEvent::OcrPage { page_number } => {
                    if let Some(ref progress) = *pb_clone.lock().await {
                        progress.set_message(format!("OCR page {}", page_number));
                        progress.inc(1);
                    }
                }
                ExtractEvent::LlmStarted { total_pages } => {
                    if let Some(progress) = pb_clone.lock().await.take() {
                        progress.finish_and_clear();
                    }
                    println!("{} OCR complete", style("✓").green());
                    let progress = ProgressBar::new(total_pages as u64);
                    progress.set_style(
                        ProgressStyle::default_bar()
                            .template(
                                "{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}",
                            )
                            .unwrap()
                            .progress_chars("█▓░"),
                    );
                    progress.set_message("Extracting entities...");
                    *pb_clone.lock().await = Some(progress);
                }
                ExtractEvent::LlmPage {
                    page_number,
                    entities,
                } => {
                    if let Some(ref progress) = *pb_clone.lock().await {
                        progress.set_message(format!(
                            "Page {} ({} entities)",
                            page_number, entities
                        ));
                        progress.inc(1);
                    }
                }
                ExtractEvent::LlmPageFailed { page_number, error } => {
                    if let Some(ref progress) = *pb_clone.lock().await {
                        progress.println(format!(
                            "{} Page {}: {}",
                            style("✗").red(),
                            page_number,
                            truncate(&error, 70)
                        ));
                    }
                }
                ExtractEvent::PersistStarted { total_entities } => {
                    if let Some(progress) = pb_clone.lock().await.take() {
                        progress.finish_and_clear();
                    }
                    println!(
                        "{} Writing {} entities to the catalog...",
                        style("→").cyan(),
                        total_entities
                    );
                }
                ExtractEvent::Complete { entities, mentions } => {
                    if let Some(progress) = pb_clone.lock().await.take() {
                        progress.finish_and_clear();
                    }
                    println!(
                        "{} Extraction complete: {} entities, {} trick mentions",
                        style("✓").green(),
                        entities,
                        mentions
                    );
                }
            }
        }
    });

    // Run the pipeline
    let summary = service.run(magazine_id, &options, event_tx).await?;

    // Wait for event handler to finish
    let _ = event_handler.await;

    println!("\n{}", style("Entities by kind").bold());
    println!("{}", "-".repeat(32));
    for (kind, count) in &summary.entity_counts {
        if *count > 0 {
            println!("{:<16} {}", kind.plural(), count);
        }
    }
    println!("{}", "-".repeat(32));
    println!("{:<16} {}", "total", summary.total_entities());

    println!(
        "\n  {} Review with 'gnar review list {}'",
        style("→").dim(),
        magazine_id
    );

    Ok(())
}
