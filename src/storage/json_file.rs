use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use super::{check_quota, ChangeNotifier, FileStorage, StorageChange, StorageKind};
use crate::error::StorageError;
use crate::models::StoredFileRecord;

/// 磁盘存储：整个集合保存为一个 JSON 文档
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    quota: Option<u64>,
    // 串行化读-改-写，避免两个写入互相覆盖
    write_lock: Mutex<()>,
    notifier: ChangeNotifier,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            quota: None,
            write_lock: Mutex::new(()),
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn with_quota(mut self, quota: Option<u64>) -> Self {
        self.quota = quota;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl FileStorage for JsonFileStorage {
    async fn get_all(&self) -> Result<Vec<StoredFileRecord>, StorageError> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if content.is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&content)?)
    }

    async fn set_all(&self, files: Vec<StoredFileRecord>) -> Result<(), StorageError> {
        let encoded = check_quota(&files, self.quota, self.kind())?;
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| self.io_error(e))?;
        }

        // 先写临时文件再重命名，中途失败不会留下半个文档
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, &encoded)
            .await
            .map_err(|e| self.io_error(e))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!("已写入 {} 个文件记录到 {}", files.len(), self.path.display());
        self.notifier.notify(&files);
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(self.io_error(e)),
        }
        self.notifier.notify(&[]);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.notifier.subscribe()
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Disk
    }

    fn quota(&self) -> Option<u64> {
        self.quota
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str) -> StoredFileRecord {
        StoredFileRecord {
            id: id.to_string(),
            name: format!("{}.png", id),
            mime_type: "image/png".to_string(),
            size_bytes: 4,
            data_url: "data:image/png;base64,AAAA".to_string(),
            upload_date: Utc::now(),
            ocr_text: None,
            ocr_processed: false,
            ocr_error: None,
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("files.json"));
        assert!(storage.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_all_persists_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested/files.json"));
        let mut changes = storage.subscribe();

        storage.set_all(vec![record("a"), record("b")]).await.unwrap();

        let reopened = JsonFileStorage::new(storage.path().to_path_buf());
        let files = reopened.get_all().await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].id, "b");
        assert_eq!(changes.recv().await.unwrap().new_value.len(), 2);
    }

    #[tokio::test]
    async fn quota_rejects_oversized_collection() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("files.json")).with_quota(Some(10));
        let err = storage.set_all(vec![record("a")]).await.unwrap_err();
        assert!(err.is_quota_exceeded());
        assert!(storage.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("files.json"));
        storage.set_all(vec![record("a")]).await.unwrap();
        storage.remove_all().await.unwrap();
        storage.remove_all().await.unwrap();
        assert!(storage.get_all().await.unwrap().is_empty());
    }
}
