//! 错误类型
//!
//! 单元级别的失败（一个字段、一个文件）会被吸收进计数或结果中，
//! 只有跨越整个操作的失败才会以这里的错误类型向上传播。

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 存储相关错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// OCR 服务错误
    #[error("OCR错误: {0}")]
    Ocr(#[from] OcrError),
    /// 消息通道错误
    #[error("消息通道错误: {0}")]
    Channel(#[from] ChannelError),
    /// 批处理在文件级别之外失败
    #[error("批处理失败: {0}")]
    Batch(String),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// 超出存储配额
    #[error("Storage quota exceeded in {storage}. Please remove some files and try again.")]
    QuotaExceeded { storage: String },
    /// 读写存储文件失败
    #[error("读写存储失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 序列化失败
    #[error("存储数据序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 存储不可用
    #[error("存储不可用: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// 远程文字提取错误
#[derive(Debug, Error)]
pub enum OcrError {
    /// 认证失败
    #[error("Authentication failed. Check API credentials.")]
    Unauthorized,
    /// 文件过大
    #[error("File too large. Maximum size is {} MB.", .limit / (1024 * 1024))]
    PayloadTooLarge { limit: u64 },
    /// 请求超时
    #[error("Request timeout: OCR processing took too long. Please try with a smaller file or fewer pages.")]
    Timeout,
    /// 无法连接服务
    #[error("Cannot connect to OCR service. Make sure the backend server is running on {base_url}")]
    NetworkUnreachable { base_url: String },
    /// 服务端返回错误
    #[error("API request failed ({status}): {message}")]
    Server { status: u16, message: String },
    /// 文件内容无法解码
    #[error("无法解码文件内容: {0}")]
    InvalidContent(String),
    /// 不支持的文件类型
    #[error("不支持的文件类型: {mime}")]
    UnsupportedType { mime: String },
    /// 响应体无法解析
    #[error("无法解析 OCR 响应: {0}")]
    InvalidResponse(String),
}

/// 消息通道错误
#[derive(Debug, Error)]
pub enum ChannelError {
    /// 接收端已关闭
    #[error("接收端已关闭，消息无法送达")]
    Closed,
    /// 接收端未回复就丢弃了请求
    #[error("接收端没有回复")]
    NoResponse,
    /// 消息编码/解码失败
    #[error("消息编解码失败: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Other(err.to_string())
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_error_is_detected() {
        let err = StorageError::QuotaExceeded {
            storage: "memory".to_string(),
        };
        assert!(err.is_quota_exceeded());
        assert!(err.to_string().contains("Storage quota exceeded"));
    }

    #[test]
    fn payload_limit_is_reported_in_megabytes() {
        let err = OcrError::PayloadTooLarge {
            limit: 20 * 1024 * 1024,
        };
        assert_eq!(err.to_string(), "File too large. Maximum size is 20 MB.");
    }
}
