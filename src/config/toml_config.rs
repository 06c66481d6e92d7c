use crate::config::ServerConfig;
use crate::utils::error::{Result, TicketError};
use regex::Regex;
use std::path::Path;

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys keep their defaults.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(TicketError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| TicketError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }
}

/// Replaces `${VAR}` references with environment values. Unknown variables
/// are left untouched.
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| TicketError::ConfigError {
        message: format!("invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OcrEngineKind;
    use crate::utils::validation::Validate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
bind_addr = "127.0.0.1:9000"
save_by_default = true

[ocr]
language = "eng+hin"
upscale = 3

[llm]
model = "llama3"
max_attempts = 3
"#;

        let config = ServerConfig::from_toml_str(toml_content).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert!(config.save_by_default);
        assert_eq!(config.ocr.language, "eng+hin");
        assert_eq!(config.ocr.upscale, 3);
        assert_eq!(config.ocr.engine, OcrEngineKind::TesseractCli);
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.max_attempts, 3);
        assert_eq!(config.llm.timeout_seconds, 120);
        assert_eq!(config.upload_dir, "static");
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TICKET_TEST_LLM_HOST", "http://gpu-box:11434");

        let toml_content = r#"
[llm]
url = "${TICKET_TEST_LLM_HOST}/api/generate"
model = "${TICKET_TEST_UNSET_MODEL}"
"#;

        let config = ServerConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.llm.url, "http://gpu-box:11434/api/generate");
        assert_eq!(config.llm.model, "${TICKET_TEST_UNSET_MODEL}");

        std::env::remove_var("TICKET_TEST_LLM_HOST");
    }

    #[test]
    fn test_engine_names_are_kebab_case() {
        let config = ServerConfig::from_toml_str("[ocr]\nengine = \"tesseract-cli\"\n").unwrap();
        assert_eq!(config.ocr.engine, OcrEngineKind::TesseractCli);

        assert!(ServerConfig::from_toml_str("[ocr]\nengine = \"easyocr\"\n").is_err());
    }

    #[test]
    fn test_config_validation() {
        let config = ServerConfig::from_toml_str("[llm]\nurl = \"invalid-url\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_backoff_is_rejected() {
        for raw in ["nan", "inf", "-nan"] {
            let config =
                ServerConfig::from_toml_str(&format!("[llm]\nbackoff_base = {}\n", raw)).unwrap();
            assert!(config.validate().is_err(), "backoff_base = {raw} passed validation");
        }
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"upload_dir = \"./uploads\"\n[llm]\ntimeout_seconds = 45\n")
            .unwrap();

        let config = ServerConfig::from_toml_file(temp_file.path()).unwrap();
        assert_eq!(config.upload_dir, "./uploads");
        assert_eq!(config.llm.timeout_seconds, 45);
    }
}
