pub mod pipeline;
pub mod preprocess;
pub mod prompt;
pub mod text;

pub use crate::domain::model::{ParsedFields, UploadOptions, UploadResponse, UploadedImage};
pub use crate::domain::ports::{OcrEngine, Storage, TicketParser};
pub use crate::utils::error::Result;
