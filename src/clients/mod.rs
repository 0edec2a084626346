pub mod ocr_client;

pub use ocr_client::{is_ocr_supported, OcrApiClient, TextExtractor, SUPPORTED_OCR_TYPES};
