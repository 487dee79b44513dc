//! Logical page model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logical page of a magazine.
///
/// Page numbers are assigned after spread splitting, so a double-page
/// spread in the scan contributes two consecutive logical pages. Numbers
/// start at 1 and are contiguous per magazine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Database row ID.
    pub id: i64,
    /// Owning magazine.
    pub magazine_id: String,
    /// 1-based logical page number.
    pub page_number: i32,
    /// PNG path relative to the pages root.
    pub image_path: String,
    /// Stored image width in pixels.
    pub image_width: i32,
    /// Stored image height in pixels.
    pub image_height: i32,
    /// Raw OCR output, once the OCR stage has run.
    pub ocr_text: Option<String>,
    /// When the page row was written.
    pub created_at: DateTime<Utc>,
}
