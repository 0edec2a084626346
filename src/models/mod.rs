pub mod progress;
pub mod stored_file;

pub use progress::{OcrProgress, ProgressStage};
pub use stored_file::{guess_mime_type, to_data_url, OcrOutcome, StoredFileRecord, UploadedFile};
