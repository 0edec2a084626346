use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::OcrError;

/// 持久化的文件记录
///
/// 字段名与扩展存储中的 JSON 结构保持一致（camelCase）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFileRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
    /// base64 data URL（`data:<mime>;base64,<payload>`）
    pub data_url: String,
    pub upload_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_text: Option<String>,
    #[serde(default)]
    pub ocr_processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_error: Option<String>,
}

impl StoredFileRecord {
    /// 解码 data URL 中的二进制内容
    pub fn decode_content(&self) -> Result<Vec<u8>, OcrError> {
        let (_, payload) = self
            .data_url
            .split_once(',')
            .ok_or_else(|| OcrError::InvalidContent(format!("{} 不是合法的 data URL", self.name)))?;
        STANDARD
            .decode(payload)
            .map_err(|e| OcrError::InvalidContent(format!("{}: {}", self.name, e)))
    }

    /// 写入 OCR 结果，文字与错误二者只保留一个
    pub fn apply_ocr(&mut self, text: Option<String>, error: Option<String>) {
        self.ocr_text = text;
        self.ocr_error = error;
        self.ocr_processed = true;
    }
}

/// 编码为 data URL
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    let mime = if mime_type.is_empty() {
        "application/octet-stream"
    } else {
        mime_type
    };
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// 待上传的文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// 从磁盘读取文件，根据扩展名推断媒体类型
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mime_type = guess_mime_type(&name).to_string();
        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// 根据文件扩展名推断媒体类型
pub fn guess_mime_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// 单个文件的 OCR 结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OcrOutcome {
    Text(String),
    Error(String),
}

impl OcrOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            OcrOutcome::Text(text) => Some(text),
            OcrOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            OcrOutcome::Text(_) => None,
            OcrOutcome::Error(message) => Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OcrOutcome::Text(_))
    }
}
