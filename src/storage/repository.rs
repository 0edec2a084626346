//! 文件记录仓库 - 业务能力层
//!
//! 在任意 [`FileStorage`] 后端之上实现保存、查询、更新 OCR 结果与删除。

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::{FileStorage, StorageChange, StorageKind};
use crate::error::StorageError;
use crate::models::{to_data_url, StoredFileRecord, UploadedFile};

/// 存储信息（用于展示）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageInfo {
    pub kind: StorageKind,
    pub has_unlimited_storage: bool,
}

/// 文件记录仓库
///
/// 克隆开销很小，所有克隆共享同一个后端。
#[derive(Clone)]
pub struct FileRepository {
    storage: Arc<dyn FileStorage>,
    // 读-改-写必须串行，否则并发上传会丢记录
    mutation_lock: Arc<Mutex<()>>,
}

impl FileRepository {
    pub fn new(storage: Arc<dyn FileStorage>) -> Self {
        Self {
            storage,
            mutation_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 订阅后端的变更通知
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.storage.subscribe()
    }

    /// 获取所有文件记录
    pub async fn get_all(&self) -> Result<Vec<StoredFileRecord>, StorageError> {
        self.storage.get_all().await
    }

    /// 按 ID 获取单个文件
    pub async fn get_file(&self, id: &str) -> Option<StoredFileRecord> {
        match self.storage.get_all().await {
            Ok(files) => files.into_iter().find(|f| f.id == id),
            Err(e) => {
                error!("读取文件失败: {}", e);
                None
            }
        }
    }

    /// 整体覆盖文件记录
    pub async fn set_all(&self, files: Vec<StoredFileRecord>) -> Result<(), StorageError> {
        let _guard = self.mutation_lock.lock().await;
        self.storage.set_all(files).await
    }

    /// 保存单个文件
    ///
    /// # 返回
    /// 返回新建的文件记录；超出配额时返回 [`StorageError::QuotaExceeded`]
    pub async fn save_file(&self, file: &UploadedFile) -> Result<StoredFileRecord, StorageError> {
        let record = StoredFileRecord {
            id: generate_file_id(),
            name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes: file.size(),
            data_url: to_data_url(&file.mime_type, &file.bytes),
            upload_date: Utc::now(),
            ocr_text: None,
            ocr_processed: false,
            ocr_error: None,
        };

        let _guard = self.mutation_lock.lock().await;
        let mut files = self.storage.get_all().await?;
        files.push(record.clone());
        self.storage.set_all(files).await?;

        debug!("已保存文件 {} ({})", record.name, record.id);
        Ok(record)
    }

    /// 依次保存多个文件
    ///
    /// 遇到配额错误时停止；只有一个都没保存成功时才返回错误。
    /// 调用方通过比较返回数量和输入数量发现部分保存。
    pub async fn save_files(&self, files: &[UploadedFile]) -> Result<Vec<StoredFileRecord>, StorageError> {
        let mut saved = Vec::with_capacity(files.len());
        let mut first_error = None;

        for file in files {
            match self.save_file(file).await {
                Ok(record) => saved.push(record),
                Err(e) => {
                    warn!("保存文件 {} 失败: {}", file.name, e);
                    let quota = e.is_quota_exceeded();
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                    if quota {
                        break;
                    }
                }
            }
        }

        match first_error {
            Some(e) if saved.is_empty() => Err(e),
            _ => Ok(saved),
        }
    }

    /// 写入文件的 OCR 结果
    ///
    /// # 返回
    /// 文件不存在或写入失败时返回 false
    pub async fn update_file_ocr(&self, id: &str, text: Option<String>, error: Option<String>) -> bool {
        let _guard = self.mutation_lock.lock().await;
        let mut files = match self.storage.get_all().await {
            Ok(files) => files,
            Err(e) => {
                error!("更新 OCR 结果失败: {}", e);
                return false;
            }
        };

        let Some(file) = files.iter_mut().find(|f| f.id == id) else {
            error!("文件不存在: {}", id);
            return false;
        };
        file.apply_ocr(text, error);

        match self.storage.set_all(files).await {
            Ok(()) => true,
            Err(e) => {
                error!("更新 OCR 结果失败: {}", e);
                false
            }
        }
    }

    /// 删除单个文件
    pub async fn delete_file(&self, id: &str) -> bool {
        let _guard = self.mutation_lock.lock().await;
        let result = async {
            let files = self.storage.get_all().await?;
            let remaining: Vec<_> = files.into_iter().filter(|f| f.id != id).collect();
            self.storage.set_all(remaining).await
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                error!("删除文件失败: {}", e);
                false
            }
        }
    }

    /// 删除所有文件
    pub async fn delete_all_files(&self) -> bool {
        let _guard = self.mutation_lock.lock().await;
        match self.storage.remove_all().await {
            Ok(()) => true,
            Err(e) => {
                error!("删除所有文件失败: {}", e);
                false
            }
        }
    }

    /// 所有文件的总大小（字节）
    pub async fn total_storage_size(&self) -> Result<u64, StorageError> {
        let files = self.storage.get_all().await?;
        Ok(files.iter().map(|f| f.size_bytes).sum())
    }

    pub fn storage_info(&self) -> StorageInfo {
        StorageInfo {
            kind: self.storage.kind(),
            has_unlimited_storage: self.storage.quota().is_none(),
        }
    }
}

/// 生成文件 ID：毫秒时间戳加随机片段
fn generate_file_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().timestamp_millis(), &random[..12])
}

/// 将字节数格式化为易读的大小
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;

    format!("{} {}", rounded, UNITS[exponent])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn repository() -> FileRepository {
        FileRepository::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn formats_sizes_like_the_dashboard() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(20 * 1024 * 1024), "20 MB");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = generate_file_id();
        let b = generate_file_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn concurrent_saves_keep_every_record() {
        let repo = repository();
        let uploads: Vec<_> = (0..8)
            .map(|i| UploadedFile::new(format!("{}.png", i), "image/png", vec![i as u8; 4]))
            .collect();

        let handles: Vec<_> = uploads
            .into_iter()
            .map(|file| {
                let repo = repo.clone();
                tokio::spawn(async move { repo.save_file(&file).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let files = repo.get_all().await.unwrap();
        assert_eq!(files.len(), 8);
        let mut ids: Vec<_> = files.iter().map(|f| f.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }

    #[tokio::test]
    async fn update_unknown_file_returns_false() {
        let repo = repository();
        assert!(!repo.update_file_ocr("missing", Some("x".to_string()), None).await);
    }

    #[tokio::test]
    async fn delete_file_removes_only_that_record() {
        let repo = repository();
        let a = repo
            .save_file(&UploadedFile::new("a.png", "image/png", vec![1]))
            .await
            .unwrap();
        let b = repo
            .save_file(&UploadedFile::new("b.png", "image/png", vec![2]))
            .await
            .unwrap();

        assert!(repo.delete_file(&a.id).await);
        let files = repo.get_all().await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, b.id);
        assert_eq!(repo.total_storage_size().await.unwrap(), 1);
    }
}
