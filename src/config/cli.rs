use crate::config::{OcrEngineKind, ServerConfig};
use crate::utils::error::Result;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "ticket-validator")]
#[command(about = "Ticket photo OCR and field extraction backend")]
pub struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Address to listen on
    #[arg(long)]
    pub bind: Option<String>,

    /// Directory for saved uploads
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Save uploads when the request does not say otherwise
    #[arg(long)]
    pub save_by_default: bool,

    /// LLM model name
    #[arg(long)]
    pub model: Option<String>,

    /// LLM generation endpoint
    #[arg(long)]
    pub llm_url: Option<String>,

    /// LLM request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(long, value_enum)]
    pub ocr_engine: Option<OcrEngineKind>,

    /// Tesseract language codes, e.g. "eng" or "eng+hin"
    #[arg(long)]
    pub lang: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log process CPU and memory usage per request")]
    pub monitor: bool,
}

impl CliArgs {
    /// Resolves the effective configuration: defaults, then the TOML file,
    /// then environment variables, then flags.
    pub fn resolve(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_toml_file(path)?,
            None => ServerConfig::default(),
        };
        config.apply_env()?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(bind) = &self.bind {
            config.bind_addr = bind.clone();
        }
        if let Some(dir) = &self.upload_dir {
            config.upload_dir = dir.clone();
        }
        if self.save_by_default {
            config.save_by_default = true;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(url) = &self.llm_url {
            config.llm.url = url.clone();
        }
        if let Some(timeout) = self.timeout {
            config.llm.timeout_seconds = timeout;
        }
        if let Some(engine) = self.ocr_engine {
            config.ocr.engine = engine;
        }
        if let Some(lang) = &self.lang {
            config.ocr.language = lang.clone();
        }
        if self.monitor {
            config.monitor = true;
        }
    }
}
