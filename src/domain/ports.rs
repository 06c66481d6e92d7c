use crate::domain::model::ParsedFields;
use crate::utils::error::Result;
use async_trait::async_trait;
use image::GrayImage;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Text recognition over a preprocessed grayscale image.
///
/// Implementations are CPU bound and are called from the blocking pool.
pub trait OcrEngine: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn recognize(&self, image: &GrayImage) -> Result<String>;
}

/// Turns cleaned OCR text into ticket fields.
///
/// Failures are reported inside [`ParsedFields`] rather than as errors.
#[async_trait]
pub trait TicketParser: Send + Sync {
    async fn parse_ticket(&self, ocr_text: &str) -> ParsedFields;
}
