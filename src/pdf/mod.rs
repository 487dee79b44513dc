//! PDF rasterization and spread splitting using poppler tools.
//!
//! Magazine scans are commonly digitized two printed pages per PDF page.
//! After rendering with pdftoppm, any bitmap wider than it is tall (by
//! more than the spread threshold) is cut vertically into left and right
//! logical pages, and all logical pages are renumbered sequentially.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::{DynamicImage, GenericImageView};
use tempfile::TempDir;
use thiserror::Error;

use crate::storage;

/// Aspect ratio (width/height) above which a bitmap is treated as a
/// two-page spread. Exactly 1.2 does not split.
pub const SPREAD_ASPECT_THRESHOLD: f64 = 1.2;

/// Errors that can occur while rendering a PDF into page images.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Render failed: {0}")]
    RenderFailed(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check command status, returning appropriate error on failure.
fn check_cmd_status(
    result: std::io::Result<std::process::ExitStatus>,
    tool_name: &str,
    error_msg: &str,
) -> Result<(), PdfError> {
    match result {
        Ok(s) if s.success() => Ok(()),
        Ok(_) => Err(PdfError::RenderFailed(error_msg.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(PdfError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(PdfError::Io(e)),
    }
}

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A logical page written to the pages directory.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 1-based logical page number, spread-aware.
    pub page_number: i32,
    /// Path relative to the pages root.
    pub rel_path: String,
    pub width: u32,
    pub height: u32,
}

/// Outcome of spread detection on one physical page bitmap.
pub enum SplitOutcome {
    /// Not a spread; the bitmap is one logical page.
    Single(DynamicImage),
    /// A spread, cut into left and right logical pages.
    Spread(DynamicImage, DynamicImage),
}

/// Detect whether a bitmap of the given dimensions is a two-page spread.
pub fn is_spread(width: u32, height: u32) -> bool {
    if height == 0 {
        return false;
    }
    (width as f64) / (height as f64) > SPREAD_ASPECT_THRESHOLD
}

/// Split a physical page bitmap into logical pages.
///
/// The left half gets `width / 2` columns and the right half the
/// remainder, so the two widths always sum to the original width.
pub fn split_spread(img: DynamicImage) -> SplitOutcome {
    let (width, height) = img.dimensions();
    if !is_spread(width, height) {
        return SplitOutcome::Single(img);
    }

    let half = width / 2;
    let left = img.crop_imm(0, 0, half, height);
    let right = img.crop_imm(half, 0, width - half, height);
    SplitOutcome::Spread(left, right)
}

/// Rasterizer for magazine PDFs.
pub struct PageRasterizer {
    /// Render resolution in DPI.
    dpi: u32,
}

impl Default for PageRasterizer {
    fn default() -> Self {
        Self { dpi: 300 }
    }
}

impl PageRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    /// Get the physical page count of a PDF via pdfinfo.
    pub fn page_count(&self, pdf_path: &Path) -> Result<u32, PdfError> {
        let output = Command::new("pdfinfo").arg(pdf_path).output();
        let output = match output {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PdfError::ToolNotFound(
                    "pdfinfo (install poppler-utils)".to_string(),
                ))
            }
            Err(e) => return Err(PdfError::Io(e)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PdfError::RenderFailed(format!("pdfinfo failed: {}", stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            if line.starts_with("Pages:") {
                if let Some(n) = line.split_whitespace().nth(1).and_then(|s| s.parse().ok()) {
                    return Ok(n);
                }
            }
        }
        Err(PdfError::RenderFailed(
            "pdfinfo output missing page count".to_string(),
        ))
    }

    /// Render a PDF and write spread-split logical pages as PNGs.
    ///
    /// Pages land under `{pages_root}/{magazine_id}/page-NNN.png`. Any
    /// previous render for the magazine is removed first, so a re-run
    /// starts from a clean directory. `max_pages` caps the number of
    /// logical pages produced.
    pub fn render_magazine(
        &self,
        pdf_path: &Path,
        pages_root: &Path,
        magazine_id: &str,
        max_pages: Option<usize>,
    ) -> Result<Vec<RenderedPage>, PdfError> {
        let physical_count = self.page_count(pdf_path)?;
        if physical_count == 0 {
            return Err(PdfError::RenderFailed("PDF has no pages".to_string()));
        }

        // Each physical page yields at least one logical page, so the
        // physical render can be capped at max_pages too.
        let physical_limit = match max_pages {
            Some(max) => (physical_count as usize).min(max) as u32,
            None => physical_count,
        };

        let temp_dir = TempDir::new()?;
        let images = self.render_to_temp(pdf_path, temp_dir.path(), physical_limit)?;
        if images.is_empty() {
            return Err(PdfError::RenderFailed(
                "No images generated from PDF".to_string(),
            ));
        }

        storage::clear_magazine_pages(pages_root, magazine_id)?;
        let out_dir = storage::magazine_pages_dir(pages_root, magazine_id);
        std::fs::create_dir_all(&out_dir)?;

        write_logical_pages(&images, pages_root, magazine_id, max_pages)
    }

    /// Run pdftoppm into a temp directory, returning sorted image paths.
    fn render_to_temp(
        &self,
        pdf_path: &Path,
        temp_path: &Path,
        last_page: u32,
    ) -> Result<Vec<PathBuf>, PdfError> {
        let dpi = self.dpi.to_string();
        let last = last_page.to_string();
        let status = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi, "-f", "1", "-l", &last])
            .arg(pdf_path)
            .arg(temp_path.join("page"))
            .status();

        check_cmd_status(
            status,
            "pdftoppm (install poppler-utils)",
            "pdftoppm failed to convert PDF",
        )?;

        let mut images: Vec<_> = std::fs::read_dir(temp_path)?
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "png")
                    .unwrap_or(false)
            })
            .map(|e| e.path())
            .collect();

        // pdftoppm zero-pads page numbers, so lexicographic order is
        // page order.
        images.sort();
        Ok(images)
    }
}

/// Split physical page bitmaps into logical pages and write them out.
///
/// Numbering starts at 1 and is contiguous; a spread contributes its
/// left half before its right. The output directory must already exist.
fn write_logical_pages(
    images: &[PathBuf],
    pages_root: &Path,
    magazine_id: &str,
    max_pages: Option<usize>,
) -> Result<Vec<RenderedPage>, PdfError> {
    let mut pages = Vec::new();
    let mut next_number: i32 = 1;

    'physical: for image_path in images {
        let img = image::open(image_path)?;
        let halves = match split_spread(img) {
            SplitOutcome::Single(whole) => vec![whole],
            SplitOutcome::Spread(left, right) => vec![left, right],
        };

        for half in halves {
            if let Some(max) = max_pages {
                if pages.len() >= max {
                    break 'physical;
                }
            }

            let (width, height) = half.dimensions();
            let rel_path = storage::page_image_rel_path(magazine_id, next_number);
            let abs_path = storage::page_image_abs_path(pages_root, &rel_path);
            half.save_with_format(&abs_path, image::ImageFormat::Png)?;

            pages.push(RenderedPage {
                page_number: next_number,
                rel_path,
                width,
                height,
            });
            next_number += 1;
        }
    }

    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use tempfile::tempdir;

    fn blank(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::new(width, height))
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        blank(width, height)
            .save_with_format(&path, image::ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn test_is_spread_wide_image() {
        assert!(is_spread(3000, 2000)); // 1.5 ratio
        assert!(is_spread(2563, 2134)); // just over 1.2
    }

    #[test]
    fn test_is_spread_portrait_and_threshold() {
        assert!(!is_spread(2000, 3000));
        assert!(!is_spread(2400, 2000)); // exactly 1.2 does not split
        assert!(!is_spread(100, 0));
    }

    #[test]
    fn test_split_spread_widths_sum() {
        let img = blank(3001, 2000);
        match split_spread(img) {
            SplitOutcome::Spread(left, right) => {
                let (lw, lh) = left.dimensions();
                let (rw, rh) = right.dimensions();
                assert_eq!(lw + rw, 3001);
                assert_eq!(lh, 2000);
                assert_eq!(rh, 2000);
                // Halving an odd width differs by at most one pixel
                assert!(lw.abs_diff(rw) <= 1);
            }
            SplitOutcome::Single(_) => panic!("expected a spread"),
        }
    }

    #[test]
    fn test_split_spread_passthrough() {
        let img = blank(2000, 3000);
        match split_spread(img) {
            SplitOutcome::Single(whole) => {
                assert_eq!(whole.dimensions(), (2000, 3000));
            }
            SplitOutcome::Spread(_, _) => panic!("portrait page must not split"),
        }
    }

    #[test]
    fn test_write_logical_pages_numbers_spreads_contiguously() {
        let scratch = tempdir().unwrap();
        let pages_root = tempdir().unwrap();
        std::fs::create_dir_all(pages_root.path().join("mag-1")).unwrap();

        // Portrait cover, then a spread, then another portrait
        let images = vec![
            write_png(scratch.path(), "page-1.png", 800, 1200),
            write_png(scratch.path(), "page-2.png", 3000, 2000),
            write_png(scratch.path(), "page-3.png", 800, 1200),
        ];

        let pages = write_logical_pages(&images, pages_root.path(), "mag-1", None).unwrap();

        assert_eq!(
            pages.iter().map(|p| p.page_number).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(pages[0].width, 800);
        // Spread halves take numbers 2 and 3, left half first
        assert_eq!(pages[1].width + pages[2].width, 3000);
        assert_eq!(pages[3].width, 800);

        for page in &pages {
            assert_eq!(
                page.rel_path,
                format!("mag-1/page-{:03}.png", page.page_number)
            );
            assert!(pages_root.path().join(&page.rel_path).is_file());
        }
    }

    #[test]
    fn test_write_logical_pages_caps_mid_spread() {
        let scratch = tempdir().unwrap();
        let pages_root = tempdir().unwrap();
        std::fs::create_dir_all(pages_root.path().join("mag-1")).unwrap();

        let images = vec![
            write_png(scratch.path(), "page-1.png", 800, 1200),
            write_png(scratch.path(), "page-2.png", 3000, 2000),
        ];

        let pages = write_logical_pages(&images, pages_root.path(), "mag-1", Some(2)).unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(
            pages.iter().map(|p| p.page_number).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }
}
