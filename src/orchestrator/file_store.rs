//! 文件状态门面
//!
//! 把存储、OCR 编排以及可观察的文件列表组合在一起，供 CLI/UI 使用。

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clients::TextExtractor;
use crate::error::{AppError, StorageError};
use crate::models::{StoredFileRecord, UploadedFile};
use crate::orchestrator::observable::{FileList, OcrStatus};
use crate::orchestrator::ocr_batch::{BatchReport, FileSelector, OcrOrchestrator, ProgressSink};
use crate::storage::FileRepository;

/// 添加文件的结果
#[derive(Debug, Clone, Default)]
pub struct AddFilesResult {
    pub saved_files: Vec<StoredFileRecord>,
    /// 部分或全部保存失败时的提示
    pub error: Option<String>,
}

pub struct FileStore {
    repository: FileRepository,
    files: FileList,
    orchestrator: OcrOrchestrator,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl FileStore {
    pub fn new(repository: FileRepository, extractor: Arc<dyn TextExtractor>, max_concurrent: usize) -> Self {
        let files = FileList::new();
        let orchestrator = OcrOrchestrator::new(repository.clone(), extractor, files.clone(), max_concurrent);
        Self {
            repository,
            files,
            orchestrator,
            listener: Mutex::new(None),
        }
    }

    pub fn files(&self) -> &FileList {
        &self.files
    }

    pub fn ocr_status(&self) -> &OcrStatus {
        self.orchestrator.status()
    }

    pub fn repository(&self) -> &FileRepository {
        &self.repository
    }

    /// 首次加载文件列表
    pub async fn initialize(&self) -> Result<(), StorageError> {
        let files = self.repository.get_all().await?;
        debug!("已加载 {} 个文件", files.len());
        self.files.set(files);
        Ok(())
    }

    /// 监听存储变更，把新值同步到文件列表
    ///
    /// 重复调用会替换掉之前的监听任务。
    pub fn attach_listener(&self) {
        let mut rx = self.repository.subscribe();
        let files = self.files.clone();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => files.set(change.new_value),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("⚠️ 存储变更通知积压，跳过 {} 条", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        if let Ok(mut guard) = self.listener.lock() {
            if let Some(old) = guard.replace(handle) {
                old.abort();
            }
        }
    }

    /// 停止监听存储变更
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.listener.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }

    /// 保存一批新文件
    ///
    /// # 返回
    /// 已保存的文件；只保存了一部分时附带配额提示
    pub async fn add_files(&self, new_files: &[UploadedFile]) -> AddFilesResult {
        match self.repository.save_files(new_files).await {
            Ok(saved_files) => {
                if let Err(e) = self.refresh().await {
                    error!("刷新文件列表失败: {}", e);
                }

                let error = if saved_files.len() < new_files.len() {
                    Some(format!(
                        "Only {} of {} files were saved. Storage quota may be exceeded.",
                        saved_files.len(),
                        new_files.len()
                    ))
                } else {
                    None
                };
                info!("✅ 已保存 {}/{} 个文件", saved_files.len(), new_files.len());

                AddFilesResult { saved_files, error }
            }
            Err(e) => {
                error!("❌ 保存文件失败: {}", e);
                AddFilesResult {
                    saved_files: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn remove_file(&self, id: &str) -> bool {
        let removed = self.repository.delete_file(id).await;
        if removed {
            if let Err(e) = self.refresh().await {
                error!("刷新文件列表失败: {}", e);
            }
        }
        removed
    }

    pub async fn clear_all(&self) -> bool {
        let cleared = self.repository.delete_all_files().await;
        if cleared {
            self.files.set(Vec::new());
        }
        cleared
    }

    /// 重新从存储读取文件列表
    pub async fn refresh(&self) -> Result<(), StorageError> {
        let files = self.repository.get_all().await?;
        self.files.set(files);
        Ok(())
    }

    pub async fn run_ocr_on_all(&self, sink: ProgressSink) -> Result<BatchReport, AppError> {
        self.orchestrator.run_batch(FileSelector::All, sink).await
    }

    /// 对指定文件运行 OCR，id 列表为空时什么也不做
    pub async fn run_ocr_on_specific(&self, ids: Vec<String>, sink: ProgressSink) -> Result<BatchReport, AppError> {
        if ids.is_empty() {
            return Ok(BatchReport::default());
        }
        self.orchestrator.run_batch(FileSelector::Ids(ids), sink).await
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
