//! 可观察状态
//!
//! UI 一侧通过订阅这些 `watch` 通道获得最新状态，不依赖任何全局单例。

use std::sync::Arc;
use tokio::sync::watch;

use crate::models::{OcrProgress, StoredFileRecord};

/// 文件列表
///
/// 在首次加载完成之前为空。
#[derive(Debug, Clone)]
pub struct FileList {
    tx: Arc<watch::Sender<Vec<StoredFileRecord>>>,
}

impl FileList {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, files: Vec<StoredFileRecord>) {
        self.tx.send_replace(files);
    }

    /// 当前文件列表的副本
    pub fn snapshot(&self) -> Vec<StoredFileRecord> {
        self.tx.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<StoredFileRecord>> {
        self.tx.subscribe()
    }
}

impl Default for FileList {
    fn default() -> Self {
        Self::new()
    }
}

/// OCR 运行状态：是否正在运行、最近一次进度
#[derive(Debug, Clone)]
pub struct OcrStatus {
    running: Arc<watch::Sender<bool>>,
    progress: Arc<watch::Sender<Option<OcrProgress>>>,
}

impl OcrStatus {
    pub fn new() -> Self {
        let (running, _) = watch::channel(false);
        let (progress, _) = watch::channel(None);
        Self {
            running: Arc::new(running),
            progress: Arc::new(progress),
        }
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    pub fn latest_progress(&self) -> Option<OcrProgress> {
        self.progress.borrow().clone()
    }

    pub fn subscribe_running(&self) -> watch::Receiver<bool> {
        self.running.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<Option<OcrProgress>> {
        self.progress.subscribe()
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.send_replace(running);
    }

    pub(crate) fn publish(&self, progress: OcrProgress) {
        self.progress.send_replace(Some(progress));
    }
}

impl Default for OcrStatus {
    fn default() -> Self {
        Self::new()
    }
}
