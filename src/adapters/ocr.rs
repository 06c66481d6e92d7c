//! Tesseract-backed OCR engines.
//!
//! `TesseractCli` shells out to the `tesseract` executable and needs no
//! native libraries at build time. With the `leptess` feature the engine
//! can instead link libtesseract in-process.

use crate::config::{OcrEngineKind, OcrSettings};
use crate::domain::ports::OcrEngine;
use crate::utils::error::{Result, TicketError};
use image::{GrayImage, ImageFormat};
use std::process::Command;
use std::sync::Arc;

pub struct TesseractCli {
    binary: String,
    language: String,
    page_segmentation_mode: u32,
}

impl TesseractCli {
    pub fn new(settings: &OcrSettings) -> Self {
        Self {
            binary: settings.tesseract_path.clone(),
            language: settings.language.clone(),
            page_segmentation_mode: settings.page_segmentation_mode,
        }
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &str {
        "tesseract-cli"
    }

    fn recognize(&self, image: &GrayImage) -> Result<String> {
        let input = tempfile::Builder::new()
            .prefix("ticket-ocr-")
            .suffix(".png")
            .tempfile()?;
        image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| TicketError::OcrError {
                message: format!("Failed to write OCR input image: {}", e),
            })?;

        let output = Command::new(&self.binary)
            .arg(input.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .args(["--psm", &self.page_segmentation_mode.to_string()])
            .output()
            .map_err(|e| TicketError::OcrError {
                message: format!("Failed to run '{}': {}", self.binary, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TicketError::OcrError {
                message: format!("{} exited with {}: {}", self.binary, output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(feature = "leptess")]
pub struct LeptessEngine {
    language: String,
    page_segmentation_mode: u32,
}

#[cfg(feature = "leptess")]
impl LeptessEngine {
    /// Fails early when the language data cannot be loaded.
    pub fn new(settings: &OcrSettings) -> Result<Self> {
        leptess::LepTess::new(None, &settings.language).map_err(|e| TicketError::OcrError {
            message: format!(
                "Failed to initialize Tesseract with language '{}': {}",
                settings.language, e
            ),
        })?;

        Ok(Self {
            language: settings.language.clone(),
            page_segmentation_mode: settings.page_segmentation_mode,
        })
    }
}

#[cfg(feature = "leptess")]
impl OcrEngine for LeptessEngine {
    fn name(&self) -> &str {
        "leptess"
    }

    fn recognize(&self, image: &GrayImage) -> Result<String> {
        use leptess::{LepTess, Variable};

        // LepTess is not Send, so each call gets its own instance.
        let mut lt = LepTess::new(None, &self.language).map_err(|e| TicketError::OcrError {
            message: format!("Failed to initialize Tesseract: {}", e),
        })?;
        lt.set_variable(
            Variable::TesseditPagesegMode,
            &self.page_segmentation_mode.to_string(),
        )
        .map_err(|e| TicketError::OcrError {
            message: format!("Failed to set PSM: {}", e),
        })?;

        let mut png_buf = std::io::Cursor::new(Vec::new());
        image
            .write_to(&mut png_buf, ImageFormat::Png)
            .map_err(|e| TicketError::OcrError {
                message: format!("Failed to encode image to PNG: {}", e),
            })?;

        lt.set_image_from_mem(png_buf.get_ref())
            .map_err(|e| TicketError::OcrError {
                message: format!("Failed to set image from memory: {}", e),
            })?;

        lt.get_utf8_text().map_err(|e| TicketError::OcrError {
            message: format!("Failed to extract text: {}", e),
        })
    }
}

/// Builds the engine selected in the configuration.
pub fn build_engine(settings: &OcrSettings) -> Result<Arc<dyn OcrEngine>> {
    match settings.engine {
        OcrEngineKind::TesseractCli => Ok(Arc::new(TesseractCli::new(settings))),
        #[cfg(feature = "leptess")]
        OcrEngineKind::Leptess => Ok(Arc::new(LeptessEngine::new(settings)?)),
        #[cfg(not(feature = "leptess"))]
        OcrEngineKind::Leptess => Err(TicketError::ConfigError {
            message: "the leptess OCR engine is not compiled in; rebuild with --features leptess"
                .to_string(),
        }),
    }
}
