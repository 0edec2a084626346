use std::time::Duration;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- OCR API 配置 ---
    pub ocr_api_base_url: String,
    pub ocr_api_username: String,
    pub ocr_api_password: String,
    /// 单次 OCR 请求的超时时间（秒）
    pub ocr_request_timeout_secs: u64,
    /// 允许上传到 OCR 服务的最大文件大小（字节）
    pub ocr_max_file_size: u64,
    /// 同时进行的 OCR 请求数量
    pub max_concurrent_ocr: usize,
    // --- 存储配置 ---
    /// 文件记录的 JSON 存储路径
    pub storage_path: String,
    /// 存储配额（字节），None 表示不限制
    pub storage_quota_bytes: Option<u64>,
    // --- 浏览器配置 ---
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 目标URL
    pub target_url: Option<String>,
    /// 目标页面标题
    pub target_title: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ocr_api_base_url: "http://localhost:3233".to_string(),
            ocr_api_username: "admin".to_string(),
            ocr_api_password: "pa55word".to_string(),
            ocr_request_timeout_secs: 120,
            ocr_max_file_size: 20 * 1024 * 1024,
            max_concurrent_ocr: 3,
            storage_path: "extension-files.json".to_string(),
            storage_quota_bytes: None,
            browser_debug_port: 9222,
            target_url: None,
            target_title: None,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            ocr_api_base_url: std::env::var("OCR_API_BASE_URL").unwrap_or(default.ocr_api_base_url),
            ocr_api_username: std::env::var("OCR_API_USERNAME").unwrap_or(default.ocr_api_username),
            ocr_api_password: std::env::var("OCR_API_PASSWORD").unwrap_or(default.ocr_api_password),
            ocr_request_timeout_secs: std::env::var("OCR_REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.ocr_request_timeout_secs),
            ocr_max_file_size: std::env::var("OCR_MAX_FILE_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.ocr_max_file_size),
            max_concurrent_ocr: std::env::var("MAX_CONCURRENT_OCR").ok().and_then(|v| v.parse().ok()).filter(|n: &usize| *n > 0).unwrap_or(default.max_concurrent_ocr),
            storage_path: std::env::var("STORAGE_PATH").unwrap_or(default.storage_path),
            storage_quota_bytes: std::env::var("STORAGE_QUOTA_BYTES").ok().and_then(|v| v.parse().ok()).or(default.storage_quota_bytes),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_debug_port),
            target_url: std::env::var("TARGET_URL").ok().or(default.target_url),
            target_title: std::env::var("TARGET_TITLE").ok().or(default.target_title),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// OCR 请求超时
    pub fn ocr_request_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_request_timeout_secs)
    }
}
