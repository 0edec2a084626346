//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：打开存储、创建 OCR 客户端、加载文件列表
//! 2. **命令分发**：文件管理、OCR、表单读取与填写
//! 3. **资源管理**：浏览器只在表单命令中打开，命令结束即释放
//!
//! 表单命令和 UI 一样，只通过 [`MessageClient`] 与内容脚本通信。

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chromiumoxide::{Browser, Page};
use tracing::{info, warn};

use crate::browser;
use crate::cli::Command;
use crate::clients::OcrApiClient;
use crate::config::Config;
use crate::content_script::{self, FieldAssignment, FieldFillEngine, FillRequest, FillResponse, MessageClient};
use crate::infrastructure::{CdpDocument, JsExecutor};
use crate::models::{OcrOutcome, OcrProgress, UploadedFile};
use crate::orchestrator::file_store::FileStore;
use crate::orchestrator::ocr_batch::ProgressSink;
use crate::storage::{format_file_size, FileRepository, FileStorage, JsonFileStorage};

/// 应用主结构
pub struct App {
    config: Config,
    ocr_client: OcrApiClient,
    store: FileStore,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let storage: Arc<dyn FileStorage> = Arc::new(
            JsonFileStorage::new(&config.storage_path).with_quota(config.storage_quota_bytes),
        );
        let repository = FileRepository::new(storage);

        let ocr_client = OcrApiClient::new(&config).context("创建 OCR 客户端失败")?;
        let store = FileStore::new(repository, Arc::new(ocr_client.clone()), config.max_concurrent_ocr);
        store.initialize().await.context("加载文件列表失败")?;

        Ok(Self {
            config,
            ocr_client,
            store,
        })
    }

    /// 执行一条命令
    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Upload { paths } => {
                let mut files = Vec::with_capacity(paths.len());
                for path in &paths {
                    let file = UploadedFile::from_path(path)
                        .await
                        .with_context(|| format!("无法读取文件: {}", path.display()))?;
                    files.push(file);
                }

                let result = self.store.add_files(&files).await;
                for file in &result.saved_files {
                    info!("📄 {} ({}) -> {}", file.name, format_file_size(file.size_bytes), file.id);
                }
                if let Some(error) = result.error {
                    warn!("⚠️ {}", error);
                }
            }
            Command::List => self.list_files().await?,
            Command::Remove { id } => {
                if self.store.remove_file(&id).await {
                    info!("🗑️ 已删除文件: {}", id);
                } else {
                    warn!("⚠️ 删除文件失败: {}", id);
                }
            }
            Command::Clear => {
                if self.store.clear_all().await {
                    info!("🗑️ 已清空所有文件");
                } else {
                    warn!("⚠️ 清空文件失败");
                }
            }
            Command::Ocr { ids } => self.run_ocr(ids).await?,
            Command::Health => {
                if self.ocr_client.health_check().await {
                    info!("✅ OCR 服务可用: {}", self.ocr_client.base_url());
                } else {
                    bail!("OCR 服务不可用: {}", self.ocr_client.base_url());
                }
            }
            Command::FormHtml { headless } => {
                let (_browser, page) = self.open_page(headless.as_deref()).await?;
                let client = start_content_script(page);

                match client.send(&FillRequest::ReadForm).await? {
                    FillResponse::FormMarkup { html } => println!("{}", html),
                    other => bail!(other.error().unwrap_or("意外的响应").to_string()),
                }
            }
            Command::Fill { json, headless } => {
                let fields: Vec<FieldAssignment> =
                    serde_json::from_str(&json).context("无法解析字段 JSON")?;

                let (_browser, page) = self.open_page(headless.as_deref()).await?;
                let client = start_content_script(page);

                match client.send(&FillRequest::FillFields { fields }).await? {
                    FillResponse::FillResult { filled, failed, .. } => {
                        info!("✅ 已填写 {} 个字段，失败 {} 个", filled, failed);
                    }
                    other => bail!(other.error().unwrap_or("意外的响应").to_string()),
                }
            }
        }

        Ok(())
    }

    async fn list_files(&self) -> Result<()> {
        let files = self.store.files().snapshot();
        if files.is_empty() {
            info!("📁 没有已保存的文件");
            return Ok(());
        }

        for file in &files {
            let ocr_state = match (&file.ocr_text, &file.ocr_error) {
                (_, Some(error)) => format!("OCR 失败: {}", error),
                (Some(_), None) => "已识别".to_string(),
                (None, None) => "未识别".to_string(),
            };
            info!(
                "{}  {}  {}  {}  {}",
                file.id,
                file.name,
                file.mime_type,
                format_file_size(file.size_bytes),
                ocr_state
            );
        }

        let repository = self.store.repository();
        let total = repository.total_storage_size().await?;
        let storage = repository.storage_info();
        info!(
            "共 {} 个文件，占用 {}（{}{}）",
            files.len(),
            format_file_size(total),
            storage.kind.label(),
            if storage.has_unlimited_storage { "，无限制" } else { "" }
        );
        Ok(())
    }

    async fn run_ocr(&self, ids: Vec<String>) -> Result<()> {
        let sink: ProgressSink = Arc::new(|progress: OcrProgress| {
            info!(
                "[{:>3.0}%] {}",
                progress.progress * 100.0,
                progress.status
            );
        });

        let report = if ids.is_empty() {
            self.store.run_ocr_on_all(sink).await?
        } else {
            self.store.run_ocr_on_specific(ids, sink).await?
        };

        if report.is_empty() {
            info!("没有需要 OCR 的文件");
            return Ok(());
        }

        for (id, outcome) in &report.outcomes {
            if let OcrOutcome::Error(error) = outcome {
                warn!("❌ {}: {}", id, error);
            }
        }
        if report.persisted < report.outcomes.len() {
            warn!("⚠️ 只有 {}/{} 个结果写回了存储", report.persisted, report.outcomes.len());
        }
        Ok(())
    }

    /// 打开要操作的页面
    async fn open_page(&self, headless: Option<&str>) -> Result<(Browser, Page)> {
        match headless {
            Some(url) => browser::launch_headless_browser(url, None).await,
            None => browser::connect_to_browser_and_page(
                self.config.browser_debug_port,
                self.config.target_url.as_deref(),
                self.config.target_title.as_deref(),
            )
            .await
            .map_err(|e| anyhow!("{}（请确认浏览器已用 --remote-debugging-port={} 启动）", e, self.config.browser_debug_port)),
        }
    }
}

/// 在页面上启动内容脚本，返回 UI 侧的发送端
fn start_content_script(page: Page) -> MessageClient {
    let document = CdpDocument::new(JsExecutor::new(page));
    let engine = Arc::new(FieldFillEngine::new(document));
    let (client, listener) = content_script::channel(8);
    content_script::spawn_content_script(listener, engine);
    client
}

fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动");
    info!("📂 存储文件: {}", config.storage_path);
    info!("🌐 OCR 服务: {}", config.ocr_api_base_url);
    info!("📊 最大并发数: {}", config.max_concurrent_ocr);
    info!("{}", "=".repeat(60));
}
