//! Magazine extraction pipeline.
//!
//! Render, OCR, LLM extraction, merge, persist. Runs once per magazine
//! and is separated from UI concerns - emits events for progress tracking.

pub mod merge;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::ExtractConfig;
use crate::llm::{LlmClient, LlmConfig, LlmError, PageExtraction};
use crate::models::{EntityAttrs, EntityKind, Magazine, MagazineStatus, Page};
use crate::ocr::OcrEngine;
use crate::pdf::PageRasterizer;
use crate::repository::{AppearanceDraft, DbContext, TrickMentionDraft};
use crate::storage;

pub use merge::{EntityAccumulator, MergedEntity, TrickSighting};

/// Events emitted during extraction processing.
/// Fields are populated when events are created, even if consumers don't read all of them.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum ExtractEvent {
    /// Rasterization started.
    RenderStarted,
    /// All logical pages written to disk.
    RenderCompleted { logical_pages: usize },
    /// OCR started.
    OcrStarted { total_pages: usize },
    /// One page OCRed.
    OcrPage { page_number: i32 },
    /// LLM extraction started.
    LlmStarted { total_pages: usize },
    /// One page extracted.
    LlmPage { page_number: i32, entities: usize },
    /// One page degraded to an empty extraction.
    LlmPageFailed { page_number: i32, error: String },
    /// Writing merged entities to the database.
    PersistStarted { total_entities: usize },
    /// Extraction complete.
    Complete { entities: usize, mentions: usize },
}

/// Options for one extraction run.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Cap on logical pages processed.
    pub max_pages: Option<usize>,
    /// Send page images to the vision model instead of OCR text.
    pub vision: bool,
    /// Override the configured LLM batch size.
    pub batch_size: Option<usize>,
}

/// What one extraction run produced.
#[derive(Debug, Clone, Default)]
pub struct ExtractionSummary {
    pub pages: usize,
    pub entity_counts: Vec<(EntityKind, usize)>,
    pub trick_mentions: usize,
}

impl ExtractionSummary {
    pub fn total_entities(&self) -> usize {
        self.entity_counts.iter().map(|(_, n)| n).sum()
    }
}

/// Service running the extraction pipeline for one magazine.
pub struct ExtractionService {
    ctx: DbContext,
    llm: LlmClient,
    extract: ExtractConfig,
}

impl ExtractionService {
    /// Create a new extraction service.
    pub fn new(ctx: DbContext, llm_config: LlmConfig, extract: ExtractConfig) -> Self {
        Self {
            ctx,
            llm: LlmClient::new(llm_config),
            extract,
        }
    }

    /// Check if the LLM endpoint is reachable.
    pub async fn is_available(&self) -> bool {
        self.llm.is_available().await
    }

    /// Run the full pipeline for one magazine.
    ///
    /// On success the magazine lands in `review`. On a fatal error the
    /// status reverts to `pending` so the run can be retried; the next run
    /// reprocesses all pages from scratch.
    pub async fn run(
        &self,
        magazine_id: &str,
        options: &ExtractOptions,
        event_tx: mpsc::Sender<ExtractEvent>,
    ) -> anyhow::Result<ExtractionSummary> {
        let magazines = self.ctx.magazines();
        let magazine = magazines
            .get(magazine_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Magazine not found: {}", magazine_id))?;

        magazines
            .update_status(magazine_id, MagazineStatus::Processing)
            .await?;

        match self.run_pipeline(&magazine, options, &event_tx).await {
            Ok(summary) => {
                magazines
                    .update_status(magazine_id, MagazineStatus::Review)
                    .await?;
                info!(
                    "Extracted {} entities from {} pages of {}",
                    summary.total_entities(),
                    summary.pages,
                    magazine.label()
                );
                Ok(summary)
            }
            Err(e) => {
                if let Err(revert) = magazines
                    .update_status(magazine_id, MagazineStatus::Pending)
                    .await
                {
                    warn!("Failed to revert status for {}: {}", magazine_id, revert);
                }
                Err(e)
            }
        }
    }

    async fn run_pipeline(
        &self,
        magazine: &Magazine,
        options: &ExtractOptions,
        event_tx: &mpsc::Sender<ExtractEvent>,
    ) -> anyhow::Result<ExtractionSummary> {
        let magazines = self.ctx.magazines();

        // Stage 1: rasterize and spread-split. Blocking external tools run
        // off the async runtime.
        let _ = event_tx.send(ExtractEvent::RenderStarted).await;

        let pdf_path = magazine.pdf_path.clone();
        let pages_root = self.ctx.pages_dir().to_path_buf();
        let magazine_id = magazine.id.clone();
        let max_pages = options.max_pages;
        let dpi = self.extract.render_dpi;
        let rendered = tokio::task::spawn_blocking(move || {
            PageRasterizer::new(dpi).render_magazine(&pdf_path, &pages_root, &magazine_id, max_pages)
        })
        .await??;

        let _ = event_tx
            .send(ExtractEvent::RenderCompleted {
                logical_pages: rendered.len(),
            })
            .await;

        // Stage 2: persist the page set and catalog facts.
        magazines.replace_pages(&magazine.id, &rendered).await?;
        magazines
            .set_page_count(&magazine.id, rendered.len() as i32)
            .await?;
        if magazine.cover_image_path.is_none() {
            if let Some(first) = rendered.first() {
                magazines
                    .set_cover_image(&magazine.id, &first.rel_path)
                    .await?;
            }
        }

        let pages = magazines.get_pages(&magazine.id).await?;

        // Stage 3: OCR sequentially. Any tesseract failure is fatal.
        let _ = event_tx
            .send(ExtractEvent::OcrStarted {
                total_pages: pages.len(),
            })
            .await;

        let ocr = Arc::new(OcrEngine::new(&self.extract.ocr_lang));
        for page in &pages {
            let image = storage::page_image_abs_path(self.ctx.pages_dir(), &page.image_path);
            let engine = ocr.clone();
            let text = tokio::task::spawn_blocking(move || engine.ocr_image(&image)).await??;
            magazines.set_page_ocr_text(page.id, &text).await?;
            let _ = event_tx
                .send(ExtractEvent::OcrPage {
                    page_number: page.page_number,
                })
                .await;
        }

        // Stage 4: LLM extraction in fixed-size parallel batches. Per-page
        // failures degrade to empty extractions and never abort the run.
        let pages = magazines.get_pages(&magazine.id).await?;
        let batch_size = options.batch_size.unwrap_or(self.extract.batch_size).max(1);

        let _ = event_tx
            .send(ExtractEvent::LlmStarted {
                total_pages: pages.len(),
            })
            .await;

        let mut accumulator = EntityAccumulator::default();
        for window in pages.chunks(batch_size) {
            let results = futures::future::join_all(
                window.iter().map(|page| self.extract_page(page, options.vision)),
            )
            .await;

            // Stage 5: merge as results arrive, keyed by normalized name.
            for (page, result) in window.iter().zip(results) {
                let extraction = match result {
                    Ok(extraction) => extraction,
                    Err(e) => {
                        warn!("Extraction failed for page {}: {}", page.page_number, e);
                        let _ = event_tx
                            .send(ExtractEvent::LlmPageFailed {
                                page_number: page.page_number,
                                error: e.to_string(),
                            })
                            .await;
                        PageExtraction::default()
                    }
                };

                let _ = event_tx
                    .send(ExtractEvent::LlmPage {
                        page_number: page.page_number,
                        entities: extraction.len(),
                    })
                    .await;
                accumulator.add_page(page.page_number, &extraction);
            }
        }

        // Stage 6: persist sequentially after all parallel work is done.
        let entities = self.ctx.entities();
        let confidence = if options.vision {
            self.extract.vision_confidence
        } else {
            self.extract.text_confidence
        };

        let _ = event_tx
            .send(ExtractEvent::PersistStarted {
                total_entities: accumulator.total(),
            })
            .await;

        let mut drafts = Vec::with_capacity(accumulator.total());
        for kind in EntityKind::ALL {
            for entity in accumulator.entities(kind) {
                let id = entities.get_or_create(kind, &entity.name, &entity.attrs).await?;
                drafts.push(AppearanceDraft {
                    entity_type: kind,
                    entity_id: id,
                    page_numbers: entity.pages.iter().copied().collect(),
                    context: entity.context,
                    confidence,
                });
            }
        }
        entities.replace_appearances(&magazine.id, &drafts).await?;

        let mut mentions = Vec::with_capacity(accumulator.sightings().len());
        for sighting in accumulator.sightings() {
            let trick_id = entities
                .get_or_create(EntityKind::Trick, &sighting.trick, &EntityAttrs::default())
                .await?;
            let skater_id = match &sighting.performed_by {
                Some(name) => Some(
                    entities
                        .get_or_create(EntityKind::Skater, name, &EntityAttrs::default())
                        .await?,
                ),
                None => None,
            };
            let spot_id = match &sighting.location {
                Some(name) => Some(
                    entities
                        .get_or_create(EntityKind::Spot, name, &EntityAttrs::default())
                        .await?,
                ),
                None => None,
            };
            mentions.push(TrickMentionDraft {
                trick_id,
                skater_id,
                spot_id,
                page_number: sighting.page_number,
            });
        }
        entities.replace_trick_mentions(&magazine.id, &mentions).await?;

        let summary = ExtractionSummary {
            pages: pages.len(),
            entity_counts: EntityKind::ALL
                .iter()
                .map(|&kind| (kind, accumulator.count(kind)))
                .collect(),
            trick_mentions: mentions.len(),
        };

        let _ = event_tx
            .send(ExtractEvent::Complete {
                entities: summary.total_entities(),
                mentions: summary.trick_mentions,
            })
            .await;

        Ok(summary)
    }

    /// Extract one page, choosing the text or vision path.
    ///
    /// An unreadable page image degrades to an empty extraction; network
    /// and parse failures surface to the caller for per-page handling.
    async fn extract_page(&self, page: &Page, vision: bool) -> Result<PageExtraction, LlmError> {
        if vision {
            let image_path = storage::page_image_abs_path(self.ctx.pages_dir(), &page.image_path);
            let png = match std::fs::read(&image_path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(
                        "Page {} image unreadable ({}); extracting nothing",
                        page.page_number, e
                    );
                    return Ok(PageExtraction::default());
                }
            };
            self.llm.extract_page_vision(&png).await
        } else {
            self.llm
                .extract_page(page.ocr_text.as_deref().unwrap_or(""))
                .await
        }
    }
}
