use thiserror::Error;

#[derive(Error, Debug)]
pub enum TicketError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Only JPEG or PNG images allowed")]
    UnsupportedMediaType { content_type: Option<String> },

    #[error("Uploaded file is not a valid image: {message}")]
    InvalidImage { message: String },

    #[error("Invalid upload: {message}")]
    InvalidUpload { message: String },

    #[error("OCR failed: {message}")]
    OcrError { message: String },

    #[error("Background task failed: {message}")]
    TaskError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Client,
    Network,
    Processing,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl TicketError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TicketError::UnsupportedMediaType { .. }
            | TicketError::InvalidImage { .. }
            | TicketError::InvalidUpload { .. } => ErrorCategory::Client,
            TicketError::HttpError(_) => ErrorCategory::Network,
            TicketError::SerializationError(_) | TicketError::OcrError { .. } => {
                ErrorCategory::Processing
            }
            TicketError::ConfigError { .. }
            | TicketError::InvalidConfigValueError { .. }
            | TicketError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            TicketError::IoError(_) | TicketError::TaskError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Client => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Processing | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// HTTP status used when the error reaches the upload endpoint.
    pub fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::Client => 400,
            ErrorCategory::Network => 502,
            _ => 500,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            TicketError::UnsupportedMediaType { .. } => "Upload the ticket as a JPEG or PNG photo",
            TicketError::InvalidImage { .. } => "Check that the file is not truncated or corrupted",
            TicketError::InvalidUpload { .. } => {
                "Send a multipart/form-data request with a 'file' field"
            }
            TicketError::HttpError(_) => "Check that the LLM server is running and reachable",
            TicketError::OcrError { .. } => {
                "Make sure Tesseract and its language data are installed"
            }
            TicketError::IoError(_) => "Check permissions and free space of the upload directory",
            TicketError::SerializationError(_) | TicketError::TaskError { .. } => {
                "Retry the request; report the issue if it persists"
            }
            TicketError::ConfigError { .. }
            | TicketError::InvalidConfigValueError { .. }
            | TicketError::ConfigValidationError { .. } => {
                "Review the configuration file, environment variables and CLI flags"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Client => self.to_string(),
            ErrorCategory::Network => format!("Could not reach a remote service: {}", self),
            ErrorCategory::Processing => format!("Ticket processing failed: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

impl From<image::ImageError> for TicketError {
    fn from(err: image::ImageError) -> Self {
        TicketError::InvalidImage {
            message: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for TicketError {
    fn from(err: tokio::task::JoinError) -> Self {
        TicketError::TaskError {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TicketError>;
