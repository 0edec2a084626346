/// OCR API 客户端
///
/// 封装所有与 OCR 后端相关的调用逻辑：上传文件、返回识别出的文字
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::OcrError;

/// OCR 后端支持的媒体类型（PDF 由后端先转成图片再识别）
pub const SUPPORTED_OCR_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "application/pdf"];

/// 判断文件类型是否支持 OCR
pub fn is_ocr_supported(mime_type: &str) -> bool {
    let mime = mime_type.to_ascii_lowercase();
    SUPPORTED_OCR_TYPES.contains(&mime.as_str())
}

/// 远程文字提取能力
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// 从文件内容中提取文字
    ///
    /// # 参数
    /// - `content`: 文件的二进制内容
    /// - `file_name`: 文件名
    /// - `mime_type`: 媒体类型
    async fn extract(&self, content: Vec<u8>, file_name: &str, mime_type: &str) -> Result<String, OcrError>;
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    text: String,
}

/// OCR API 客户端
#[derive(Debug, Clone)]
pub struct OcrApiClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    max_file_size: u64,
}

impl OcrApiClient {
    /// 创建新的 OCR 客户端
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        let http = reqwest::Client::builder()
            .timeout(config.ocr_request_timeout())
            .build()
            .map_err(|e| OcrError::InvalidResponse(format!("无法创建 HTTP 客户端: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.ocr_api_base_url.trim_end_matches('/').to_string(),
            username: config.ocr_api_username.clone(),
            password: config.ocr_api_password.clone(),
            max_file_size: config.ocr_max_file_size,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 检查 OCR 服务是否可达
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/status", self.base_url);
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("OCR 服务健康检查失败: {}", e);
                false
            }
        }
    }

    fn map_transport_error(&self, err: reqwest::Error) -> OcrError {
        if err.is_timeout() {
            OcrError::Timeout
        } else if err.is_connect() {
            OcrError::NetworkUnreachable {
                base_url: self.base_url.clone(),
            }
        } else {
            OcrError::InvalidResponse(err.to_string())
        }
    }
}

/// 将非 2xx 状态码映射为错误
pub fn classify_status(status: StatusCode, body: String, max_file_size: u64) -> OcrError {
    match status {
        StatusCode::UNAUTHORIZED => OcrError::Unauthorized,
        StatusCode::PAYLOAD_TOO_LARGE => OcrError::PayloadTooLarge { limit: max_file_size },
        other => OcrError::Server {
            status: other.as_u16(),
            message: if body.trim().is_empty() {
                "Unknown error".to_string()
            } else {
                body.trim().to_string()
            },
        },
    }
}

#[async_trait]
impl TextExtractor for OcrApiClient {
    async fn extract(&self, content: Vec<u8>, file_name: &str, mime_type: &str) -> Result<String, OcrError> {
        if content.len() as u64 > self.max_file_size {
            return Err(OcrError::PayloadTooLarge {
                limit: self.max_file_size,
            });
        }

        debug!("正在上传 {} ({} 字节) 到 OCR 服务", file_name, content.len());

        let part = Part::bytes(content)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|_| OcrError::UnsupportedType {
                mime: mime_type.to_string(),
            })?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/api/ocr", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_status(status, body, self.max_file_size);
            error!("OCR 请求失败 ({}): {}", file_name, err);
            return Err(err);
        }

        let body: OcrResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        info!("✓ {} 识别完成，{} 个字符", file_name, body.text.chars().count());
        Ok(body.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_types_are_case_insensitive() {
        assert!(is_ocr_supported("image/PNG"));
        assert!(is_ocr_supported("application/pdf"));
        assert!(is_ocr_supported("image/jpg"));
        assert!(!is_ocr_supported("video/mp4"));
        assert!(!is_ocr_supported(""));
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, String::new(), 1),
            OcrError::Unauthorized
        ));
        assert!(matches!(
            classify_status(StatusCode::PAYLOAD_TOO_LARGE, String::new(), 1),
            OcrError::PayloadTooLarge { limit: 1 }
        ));
        match classify_status(StatusCode::INTERNAL_SERVER_ERROR, "boom\n".to_string(), 1) {
            OcrError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn oversized_files_are_rejected_before_upload() {
        let config = Config {
            ocr_max_file_size: 4,
            ..Config::default()
        };
        let client = OcrApiClient::new(&config).unwrap();
        let err = client
            .extract(vec![0; 5], "big.png", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::PayloadTooLarge { limit: 4 }));
    }

    #[tokio::test]
    async fn unreachable_server_is_reported_as_network_error() {
        let config = Config {
            ocr_api_base_url: "http://127.0.0.1:1".to_string(),
            ..Config::default()
        };
        let client = OcrApiClient::new(&config).unwrap();
        let err = client
            .extract(vec![1, 2, 3], "a.png", "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::NetworkUnreachable { .. }));
        assert!(!client.health_check().await);
    }
}
