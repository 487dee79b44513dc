//! GNArchive - skateboard magazine archive and entity extraction.
//!
//! Catalogs scanned skateboard magazines, rasterizes their pages, and
//! extracts skaters, spots, tricks, and other entities with OCR and LLM
//! assistance.

pub mod cli;
pub mod config;
pub mod dedupe;
pub mod extract;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod repository;
pub mod schema;
pub mod storage;
