use serde::{Deserialize, Serialize};

/// 进度事件所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProgressStage {
    Starting,
    FileStarted,
    FileCompleted,
    FileFailed,
    Finished,
    Failed,
}

/// OCR 批处理进度事件
///
/// 只作为通知流发出，不会被持久化。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrProgress {
    pub current_file: String,
    pub current_index: usize,
    pub total_files: usize,
    /// 0 到 1 之间的完成比例
    pub progress: f64,
    pub status: String,
    pub stage: ProgressStage,
}

impl OcrProgress {
    pub fn starting(total_files: usize) -> Self {
        Self {
            current_file: String::new(),
            current_index: 0,
            total_files,
            progress: 0.0,
            status: "Starting OCR processing...".to_string(),
            stage: ProgressStage::Starting,
        }
    }

    pub fn finished(total_files: usize) -> Self {
        Self {
            current_file: String::new(),
            current_index: total_files,
            total_files,
            progress: 1.0,
            status: "OCR processing complete!".to_string(),
            stage: ProgressStage::Finished,
        }
    }

    pub fn failed(total_files: usize) -> Self {
        Self {
            current_file: String::new(),
            current_index: 0,
            total_files,
            progress: 0.0,
            status: "OCR processing failed".to_string(),
            stage: ProgressStage::Failed,
        }
    }
}
