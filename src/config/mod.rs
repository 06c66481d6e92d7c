#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::utils::error::{Result, TicketError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_MODEL: &str = "OLLAMA_MODEL";
pub const ENV_TIMEOUT: &str = "OLLAMA_TIMEOUT";
pub const ENV_LLM_URL: &str = "OLLAMA_URL";
pub const ENV_UPLOAD_DIR: &str = "TICKET_UPLOAD_DIR";
pub const ENV_BIND_ADDR: &str = "TICKET_BIND_ADDR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum OcrEngineKind {
    /// Runs the `tesseract` executable per image
    TesseractCli,
    /// Links libtesseract in-process (requires the `leptess` feature)
    Leptess,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub engine: OcrEngineKind,
    pub language: String,
    pub page_segmentation_mode: u32,
    pub tesseract_path: String,
    pub upscale: u32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            engine: OcrEngineKind::TesseractCli,
            language: "eng".to_string(),
            page_segmentation_mode: 6, // single uniform block of text
            tesseract_path: "tesseract".to_string(),
            upscale: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub url: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_attempts: u32,
    pub backoff_base: f64,
    pub backoff_unit_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/generate".to_string(),
            model: "mistral".to_string(),
            timeout_seconds: 120,
            max_attempts: 2,
            backoff_base: 2.0,
            backoff_unit_ms: 1000,
        }
    }
}

impl LlmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub upload_dir: String,
    pub save_by_default: bool,
    pub max_upload_bytes: usize,
    pub monitor: bool,
    pub ocr: OcrSettings,
    pub llm: LlmSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            upload_dir: "static".to_string(),
            save_by_default: false,
            max_upload_bytes: 10 * 1024 * 1024,
            monitor: false,
            ocr: OcrSettings::default(),
            llm: LlmSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Applies environment overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides using `lookup` as the environment.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup(ENV_MODEL) {
            self.llm.model = model;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            self.llm.timeout_seconds =
                raw.trim()
                    .parse()
                    .map_err(|_| TicketError::InvalidConfigValueError {
                        field: ENV_TIMEOUT.to_string(),
                        value: raw.clone(),
                        reason: "Expected a whole number of seconds".to_string(),
                    })?;
        }
        if let Some(url) = lookup(ENV_LLM_URL) {
            self.llm.url = url;
        }
        if let Some(dir) = lookup(ENV_UPLOAD_DIR) {
            self.upload_dir = dir;
        }
        if let Some(addr) = lookup(ENV_BIND_ADDR) {
            self.bind_addr = addr;
        }
        Ok(())
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_socket_addr("bind_addr", &self.bind_addr)?;
        validation::validate_path("upload_dir", &self.upload_dir)?;
        validation::validate_range("max_upload_bytes", self.max_upload_bytes, 1024, usize::MAX)?;

        validation::validate_non_empty_string("ocr.language", &self.ocr.language)?;
        validation::validate_range("ocr.page_segmentation_mode", self.ocr.page_segmentation_mode, 0, 13)?;
        validation::validate_path("ocr.tesseract_path", &self.ocr.tesseract_path)?;
        validation::validate_range("ocr.upscale", self.ocr.upscale, 1, 8)?;
        if self.ocr.engine == OcrEngineKind::Leptess && !cfg!(feature = "leptess") {
            return Err(TicketError::ConfigValidationError {
                field: "ocr.engine".to_string(),
                message: "the leptess engine needs a build with the 'leptess' feature".to_string(),
            });
        }

        validation::validate_url("llm.url", &self.llm.url)?;
        validation::validate_non_empty_string("llm.model", &self.llm.model)?;
        validation::validate_range("llm.timeout_seconds", self.llm.timeout_seconds, 1, 3600)?;
        validation::validate_range("llm.max_attempts", self.llm.max_attempts, 1, 10)?;
        validation::validate_range("llm.backoff_base", self.llm.backoff_base, 1.0, 10.0)?;
        Ok(())
    }
}
