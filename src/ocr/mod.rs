//! Page OCR using the system Tesseract binary.

use std::path::Path;
use std::process::Command;

use thiserror::Error;

use crate::pdf::check_binary;

/// Errors that can occur during OCR.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle command output, extracting stdout on success or returning appropriate error.
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
    error_prefix: &str,
) -> Result<String, OcrError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(OcrError::OcrFailed(format!("{}: {}", error_prefix, stderr)))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(OcrError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(OcrError::Io(e)),
    }
}

/// OCR engine wrapping the system tesseract binary.
///
/// Magazine scans produce noisy text; downstream consumers treat the
/// output as raw material, never display copy.
pub struct OcrEngine {
    /// Tesseract language setting.
    lang: String,
}

impl Default for OcrEngine {
    fn default() -> Self {
        Self {
            lang: "eng".to_string(),
        }
    }
}

impl OcrEngine {
    pub fn new(lang: &str) -> Self {
        Self {
            lang: lang.to_string(),
        }
    }

    /// Run Tesseract OCR on a page image.
    pub fn ocr_image(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.lang])
            .output();

        handle_cmd_output(output, "tesseract (install tesseract-ocr)", "tesseract failed")
    }

    /// Check if required external tools are available.
    pub fn check_tools() -> Vec<(String, bool)> {
        ["pdftoppm", "pdfinfo", "tesseract"]
            .iter()
            .map(|tool| (tool.to_string(), check_binary(tool)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_tools_lists_all() {
        let tools = OcrEngine::check_tools();
        let names: Vec<_> = tools.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["pdftoppm", "pdfinfo", "tesseract"]);
    }
}
