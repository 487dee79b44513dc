//! Storage helpers for page images on disk.
//!
//! Rendered pages live under `{pages_dir}/{magazine_id}/page-NNN.png` and
//! are referenced from the database by the path relative to `pages_dir`,
//! so the data directory can be relocated wholesale.

use std::path::{Path, PathBuf};

use crate::models::Magazine;

/// Relative storage path for a logical page image.
pub fn page_image_rel_path(magazine_id: &str, page_number: i32) -> String {
    format!("{}/page-{:03}.png", magazine_id, page_number)
}

/// Absolute path for a page image from its stored relative path.
pub fn page_image_abs_path(pages_dir: &Path, rel_path: &str) -> PathBuf {
    pages_dir.join(rel_path)
}

/// Directory holding a magazine's page images.
pub fn magazine_pages_dir(pages_dir: &Path, magazine_id: &str) -> PathBuf {
    pages_dir.join(magazine_id)
}

/// Hash a source PDF for duplicate detection at import time.
pub fn hash_pdf_file(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    Ok(Magazine::compute_hash(&content))
}

/// Remove a magazine's rendered pages, if any.
///
/// Used when re-running extraction from scratch. Missing directory is
/// not an error.
pub fn clear_magazine_pages(pages_dir: &Path, magazine_id: &str) -> std::io::Result<()> {
    let dir = magazine_pages_dir(pages_dir, magazine_id);
    match std::fs::remove_dir_all(&dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_page_image_rel_path() {
        assert_eq!(
            page_image_rel_path("mag-1", 7),
            "mag-1/page-007.png".to_string()
        );
        assert_eq!(
            page_image_rel_path("mag-1", 120),
            "mag-1/page-120.png".to_string()
        );
    }

    #[test]
    fn test_page_image_abs_path() {
        let path = page_image_abs_path(Path::new("/data/pages"), "mag-1/page-001.png");
        assert_eq!(path, PathBuf::from("/data/pages/mag-1/page-001.png"));
    }

    #[test]
    fn test_clear_magazine_pages_missing_dir_ok() {
        let dir = tempdir().unwrap();
        assert!(clear_magazine_pages(dir.path(), "nope").is_ok());
    }

    #[test]
    fn test_clear_magazine_pages_removes_dir() {
        let dir = tempdir().unwrap();
        let mag_dir = magazine_pages_dir(dir.path(), "mag-1");
        std::fs::create_dir_all(&mag_dir).unwrap();
        std::fs::write(mag_dir.join("page-001.png"), b"png").unwrap();

        clear_magazine_pages(dir.path(), "mag-1").unwrap();
        assert!(!mag_dir.exists());
    }
}
