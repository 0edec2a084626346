use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};

use super::{check_quota, ChangeNotifier, FileStorage, StorageChange, StorageKind};
use crate::error::StorageError;
use crate::models::StoredFileRecord;

/// 内存存储，主要用于测试和一次性运行
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<Vec<StoredFileRecord>>,
    quota: Option<u64>,
    notifier: ChangeNotifier,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 带配额的内存存储，超出配额的写入会失败
    pub fn with_quota(quota: u64) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn get_all(&self) -> Result<Vec<StoredFileRecord>, StorageError> {
        Ok(self.files.read().await.clone())
    }

    async fn set_all(&self, files: Vec<StoredFileRecord>) -> Result<(), StorageError> {
        check_quota(&files, self.quota, self.kind())?;
        let mut guard = self.files.write().await;
        *guard = files;
        self.notifier.notify(&guard);
        Ok(())
    }

    async fn remove_all(&self) -> Result<(), StorageError> {
        let mut guard = self.files.write().await;
        guard.clear();
        self.notifier.notify(&guard);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.notifier.subscribe()
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Memory
    }

    fn quota(&self) -> Option<u64> {
        self.quota
    }
}
