//! Magazine models for the scanned-issue archive.
//!
//! A magazine row is created at import time from a source PDF and moves
//! through the extraction lifecycle: pending -> processing -> review ->
//! published. Page rows and entity appearances hang off it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Extraction lifecycle status of a magazine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagazineStatus {
    Pending,
    Processing,
    Review,
    Published,
}

impl MagazineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Review => "review",
            Self::Published => "published",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "review" => Some(Self::Review),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

/// How much of the issue has been captured.
///
/// `Metadata` means only the catalog row exists; `Full` means pages were
/// rasterized and the issue went through extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completeness {
    Metadata,
    Full,
}

impl Completeness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Full => "full",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "metadata" => Some(Self::Metadata),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// A scanned magazine issue.
///
/// The source PDF is identified by SHA-256 so re-importing the same scan
/// is detected regardless of filename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Magazine {
    /// Unique identifier for this issue.
    pub id: String,
    /// Magazine title, e.g. "Thrasher".
    pub title: String,
    /// Volume designator, if printed on the issue.
    pub volume: Option<String>,
    /// Issue number within the volume or year.
    pub issue_number: Option<i32>,
    /// Cover year.
    pub year: Option<i32>,
    /// Cover month (1-12).
    pub month: Option<i32>,
    /// Current extraction lifecycle status.
    pub status: MagazineStatus,
    /// Whether pages have been captured or only catalog metadata.
    pub completeness: Completeness,
    /// Path to the source PDF scan.
    pub pdf_path: PathBuf,
    /// SHA-256 hash of the PDF content.
    pub pdf_sha256: String,
    /// Path to the cover image, relative to the pages root.
    pub cover_image_path: Option<String>,
    /// Logical page count after spread splitting.
    pub page_count: Option<i32>,
    /// When the issue was imported.
    pub created_at: DateTime<Utc>,
    /// When the issue was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Magazine {
    /// Compute SHA-256 hash of PDF content.
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    /// Create a new magazine at import time.
    pub fn new(id: String, title: String, pdf_path: PathBuf, pdf_sha256: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            volume: None,
            issue_number: None,
            year: None,
            month: None,
            status: MagazineStatus::Pending,
            completeness: Completeness::Metadata,
            pdf_path,
            pdf_sha256,
            cover_image_path: None,
            page_count: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Short display label: "Thrasher #4 (1987)" or whatever is known.
    pub fn label(&self) -> String {
        let mut label = self.title.clone();
        if let Some(n) = self.issue_number {
            label.push_str(&format!(" #{}", n));
        }
        if let Some(y) = self.year {
            label.push_str(&format!(" ({})", y));
        }
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash() {
        let hash = Magazine::compute_hash(b"%PDF-1.4 fake");
        assert_eq!(hash.len(), 64); // SHA-256 produces 64 hex chars
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            MagazineStatus::Pending,
            MagazineStatus::Processing,
            MagazineStatus::Review,
            MagazineStatus::Published,
        ] {
            assert_eq!(MagazineStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(MagazineStatus::from_str("archived"), None);
    }

    #[test]
    fn test_label() {
        let mut mag = Magazine::new(
            "m1".to_string(),
            "Thrasher".to_string(),
            PathBuf::from("/scans/thrasher.pdf"),
            "abc".to_string(),
        );
        assert_eq!(mag.label(), "Thrasher");
        mag.issue_number = Some(4);
        mag.year = Some(1987);
        assert_eq!(mag.label(), "Thrasher #4 (1987)");
    }
}
