use crate::adapters::storage::saved_filename;
use crate::core::preprocess::preprocess;
use crate::core::prompt::TICKET_KEYS;
use crate::core::text::clean_ocr_text;
use crate::domain::model::{ImageKind, UploadOptions, UploadResponse, UploadedImage};
use crate::domain::ports::{OcrEngine, Storage, TicketParser};
use crate::utils::error::{Result, TicketError};
use crate::utils::monitor::SystemMonitor;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;

/// Upload → OCR → LLM pipeline behind `POST /upload`.
pub struct TicketPipeline<S: Storage, P: TicketParser> {
    storage: S,
    ocr: Arc<dyn OcrEngine>,
    parser: P,
    upscale: u32,
    monitor: Arc<SystemMonitor>,
}

impl<S: Storage, P: TicketParser> TicketPipeline<S, P> {
    pub fn new(storage: S, ocr: Arc<dyn OcrEngine>, parser: P, upscale: u32) -> Self {
        Self {
            storage,
            ocr,
            parser,
            upscale,
            monitor: Arc::new(SystemMonitor::new(false)),
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<SystemMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub async fn process(
        &self,
        upload: UploadedImage,
        options: UploadOptions,
    ) -> Result<UploadResponse> {
        let kind = check_content_type(upload.content_type.as_deref())?;
        tracing::info!(
            filename = %upload.filename,
            ?kind,
            bytes = upload.bytes.len(),
            save = options.save,
            "Processing ticket upload"
        );

        let (image, bytes) = decode_image(upload.bytes).await?;
        tracing::debug!("Decoded image {}x{}", image.width(), image.height());

        let filename = if options.save {
            let name = saved_filename(chrono::Local::now().naive_local(), &upload.filename);
            self.storage.write_file(&name, &bytes).await?;
            tracing::info!("💾 Saved upload as {}", name);
            Some(name)
        } else {
            None
        };

        let started = Instant::now();
        let engine = Arc::clone(&self.ocr);
        let upscale = self.upscale;
        let raw_text = tokio::task::spawn_blocking(move || {
            let prepared = preprocess(&image, upscale);
            engine.recognize(&prepared)
        })
        .await??;

        let extracted_text = clean_ocr_text(&raw_text);
        tracing::info!(
            engine = self.ocr.name(),
            chars = extracted_text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "OCR finished"
        );
        if extracted_text.is_empty() {
            tracing::warn!("OCR produced no usable text");
        }
        self.log_resources("ocr").await;

        let started = Instant::now();
        let parsed_fields = self.parser.parse_ticket(&extracted_text).await;
        match parsed_fields.failure_kind() {
            Some(kind) => tracing::warn!("Field extraction failed: {}", kind),
            None => {
                let missing: Vec<&str> = TICKET_KEYS
                    .iter()
                    .copied()
                    .filter(|key| parsed_fields.get(key).is_none())
                    .collect();
                if !missing.is_empty() {
                    tracing::debug!("Model omitted keys: {}", missing.join(", "));
                }
            }
        }
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Field extraction finished"
        );
        self.log_resources("llm").await;

        Ok(UploadResponse {
            filename,
            extracted_text,
            parsed_fields,
        })
    }

    /// sysinfo refreshes block, so sampling runs on the blocking pool.
    async fn log_resources(&self, phase: &'static str) {
        if !self.monitor.is_enabled() {
            return;
        }
        let monitor = Arc::clone(&self.monitor);
        if let Err(e) = tokio::task::spawn_blocking(move || monitor.log_stats(phase)).await {
            tracing::warn!("Resource sampling failed: {}", e);
        }
    }
}

fn check_content_type(content_type: Option<&str>) -> Result<ImageKind> {
    content_type
        .and_then(ImageKind::from_content_type)
        .ok_or_else(|| TicketError::UnsupportedMediaType {
            content_type: content_type.map(str::to_string),
        })
}

/// Decodes on the blocking pool and hands the bytes back for saving.
async fn decode_image(bytes: Vec<u8>) -> Result<(DynamicImage, Vec<u8>)> {
    tokio::task::spawn_blocking(move || -> Result<(DynamicImage, Vec<u8>)> {
        let image = image::load_from_memory(&bytes)?;
        Ok((image, bytes))
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{LlmFailure, LlmFailureKind, ParsedFields};
    use async_trait::async_trait;
    use image::{GrayImage, Rgb, RgbImage};
    use serde_json::json;
    use std::collections::HashMap;
    use std::io::Cursor;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        async fn names(&self) -> Vec<String> {
            self.files.lock().await.keys().cloned().collect()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                TicketError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct FixedOcr(&'static str);

    impl OcrEngine for FixedOcr {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _image: &GrayImage) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingOcr;

    impl OcrEngine for FailingOcr {
        fn name(&self) -> &str {
            "failing"
        }

        fn recognize(&self, _image: &GrayImage) -> Result<String> {
            Err(TicketError::OcrError {
                message: "engine crashed".to_string(),
            })
        }
    }

    /// Records the text it was given and answers with a canned result.
    struct RecordingParser {
        seen: Mutex<Vec<String>>,
        answer: ParsedFields,
    }

    impl RecordingParser {
        fn answering(answer: ParsedFields) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                answer,
            }
        }
    }

    #[async_trait]
    impl TicketParser for RecordingParser {
        async fn parse_ticket(&self, ocr_text: &str) -> ParsedFields {
            self.seen.lock().await.push(ocr_text.to_string());
            self.answer.clone()
        }
    }

    fn png_bytes() -> Vec<u8> {
        let image = RgbImage::from_pixel(16, 8, Rgb([250, 250, 250]));
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn upload(content_type: &str, bytes: Vec<u8>) -> UploadedImage {
        UploadedImage {
            filename: "ticket.png".to_string(),
            content_type: Some(content_type.to_string()),
            bytes,
        }
    }

    fn pipeline_with(
        storage: MockStorage,
        ocr: Arc<dyn OcrEngine>,
        parser: RecordingParser,
    ) -> TicketPipeline<MockStorage, RecordingParser> {
        TicketPipeline::new(storage, ocr, parser, 2)
    }

    #[tokio::test]
    async fn test_process_returns_text_and_fields() {
        let storage = MockStorage::default();
        let parser = RecordingParser::answering(ParsedFields::from_value(
            json!({"origin": "DADAR", "destination": "THANE"}),
        ));
        let pipeline = pipeline_with(
            storage.clone(),
            Arc::new(FixedOcr("FROM: DADAR ~~\n\nTO: THANE |")),
            parser,
        );

        let response = pipeline
            .process(upload("image/png", png_bytes()), UploadOptions::default())
            .await
            .unwrap();

        assert_eq!(response.filename, None);
        assert_eq!(response.extracted_text, "FROM: DADAR\nTO: THANE");
        assert_eq!(response.parsed_fields.get("origin"), Some(&json!("DADAR")));
        assert_eq!(
            pipeline.parser.seen.lock().await.as_slice(),
            ["FROM: DADAR\nTO: THANE".to_string()]
        );
        assert!(storage.names().await.is_empty());
    }

    #[tokio::test]
    async fn test_process_saves_when_requested() {
        let storage = MockStorage::default();
        let pipeline = pipeline_with(
            storage.clone(),
            Arc::new(FixedOcr("Class II")),
            RecordingParser::answering(ParsedFields::from_value(json!({}))),
        );

        let bytes = png_bytes();
        let response = pipeline
            .process(upload("image/png", bytes.clone()), UploadOptions { save: true })
            .await
            .unwrap();

        let filename = response.filename.unwrap();
        assert!(filename.ends_with("_ticket.png"));
        assert_eq!(storage.read_file(&filename).await.unwrap(), bytes);
    }

    #[tokio::test]
    async fn test_process_rejects_other_mime_types() {
        let pipeline = pipeline_with(
            MockStorage::default(),
            Arc::new(FixedOcr("")),
            RecordingParser::answering(ParsedFields::from_value(json!({}))),
        );

        for content_type in ["application/pdf", "image/gif", "text/plain"] {
            let result = pipeline
                .process(upload(content_type, png_bytes()), UploadOptions::default())
                .await;
            assert!(matches!(result, Err(TicketError::UnsupportedMediaType { .. })));
        }

        let mut missing_type = upload("image/png", png_bytes());
        missing_type.content_type = None;
        let result = pipeline.process(missing_type, UploadOptions::default()).await;
        assert!(matches!(result, Err(TicketError::UnsupportedMediaType { .. })));
    }

    #[tokio::test]
    async fn test_corrupt_image_is_not_saved() {
        let storage = MockStorage::default();
        let pipeline = pipeline_with(
            storage.clone(),
            Arc::new(FixedOcr("")),
            RecordingParser::answering(ParsedFields::from_value(json!({}))),
        );

        let result = pipeline
            .process(
                upload("image/jpeg", b"\xFF\xD8\xFFnot really a jpeg".to_vec()),
                UploadOptions { save: true },
            )
            .await;

        match result {
            Err(err @ TicketError::InvalidImage { .. }) => {
                assert!(err.to_string().contains("not a valid image"))
            }
            other => panic!("expected invalid image, got {:?}", other.map(|_| ())),
        }
        assert!(storage.names().await.is_empty());
    }

    #[tokio::test]
    async fn test_ocr_failure_propagates() {
        let pipeline = pipeline_with(
            MockStorage::default(),
            Arc::new(FailingOcr),
            RecordingParser::answering(ParsedFields::from_value(json!({}))),
        );

        let result = pipeline
            .process(upload("image/png", png_bytes()), UploadOptions::default())
            .await;
        assert!(matches!(result, Err(TicketError::OcrError { .. })));
        assert!(pipeline.parser.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_process_with_monitor_enabled() {
        let pipeline = pipeline_with(
            MockStorage::default(),
            Arc::new(FixedOcr("From DADAR")),
            RecordingParser::answering(ParsedFields::from_value(json!({"origin": "DADAR"}))),
        )
        .with_monitor(Arc::new(SystemMonitor::new(true)));

        let response = pipeline
            .process(upload("image/png", png_bytes()), UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(response.parsed_fields.get("origin"), Some(&json!("DADAR")));
    }

    #[tokio::test]
    async fn test_llm_failures_are_returned_inline() {
        let pipeline = pipeline_with(
            MockStorage::default(),
            Arc::new(FixedOcr("From DADAR")),
            RecordingParser::answering(
                LlmFailure::with_raw_reply(LlmFailureKind::ModelNoJson, "sorry").into(),
            ),
        );

        let response = pipeline
            .process(upload("image/png", png_bytes()), UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(
            response.parsed_fields.failure_kind(),
            Some(LlmFailureKind::ModelNoJson)
        );
    }
}
