use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Longest model reply echoed back in a failure payload, in characters.
pub const RAW_REPLY_LIMIT: usize = 2000;

/// Image formats accepted by the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Maps a declared MIME type to an accepted format. Parameters such as
    /// `; charset=...` are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            _ => None,
        }
    }
}

/// A file received on `POST /upload`.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadOptions {
    pub save: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub extracted_text: String,
    pub parsed_fields: ParsedFields,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmFailureKind {
    ModelNoJson,
    Timeout,
    RequestFailed,
    JsonDecodeFailed,
    UnknownError,
    FailedAfterRetries,
}

impl LlmFailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LlmFailureKind::ModelNoJson => "model_no_json",
            LlmFailureKind::Timeout => "timeout",
            LlmFailureKind::RequestFailed => "request_failed",
            LlmFailureKind::JsonDecodeFailed => "json_decode_failed",
            LlmFailureKind::UnknownError => "unknown_error",
            LlmFailureKind::FailedAfterRetries => "failed_after_retries",
        }
    }
}

impl std::fmt::Display for LlmFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error-tagged payload returned inline in place of ticket fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmFailure {
    pub error: LlmFailureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_reply: Option<String>,
}

impl LlmFailure {
    pub fn with_detail(error: LlmFailureKind, detail: impl Into<String>) -> Self {
        Self {
            error,
            detail: Some(detail.into()),
            raw_reply: None,
        }
    }

    pub fn with_raw_reply(error: LlmFailureKind, raw_reply: &str) -> Self {
        Self {
            error,
            detail: None,
            raw_reply: Some(raw_reply.chars().take(RAW_REPLY_LIMIT).collect()),
        }
    }
}

/// Outcome of asking the model for ticket fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedFields {
    Fields(Map<String, Value>),
    Failure(LlmFailure),
}

impl ParsedFields {
    /// Wraps any JSON value: objects pass through, anything else lands under `result`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => ParsedFields::Fields(map),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                ParsedFields::Fields(map)
            }
        }
    }

    pub fn failure_kind(&self) -> Option<LlmFailureKind> {
        match self {
            ParsedFields::Failure(failure) => Some(failure.error),
            ParsedFields::Fields(_) => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            ParsedFields::Fields(map) => map.get(key),
            ParsedFields::Failure(_) => None,
        }
    }
}

impl From<LlmFailure> for ParsedFields {
    fn from(failure: LlmFailure) -> Self {
        ParsedFields::Failure(failure)
    }
}
