// Adapters layer: concrete implementations for external systems (storage, OCR engines, LLM server, http)

pub mod http;
pub mod llm;
pub mod ocr;
pub mod storage;
