//! 存储层 - 基础设施层
//!
//! 持有文件记录集合（唯一的共享可变资源），只暴露读写整个集合的能力。
//! 业务操作（保存、更新 OCR、删除）由 [`FileRepository`] 在此之上实现。

pub mod json_file;
pub mod memory;
pub mod repository;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::StorageError;
use crate::models::StoredFileRecord;

pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;
pub use repository::{format_file_size, FileRepository, StorageInfo};

/// 存储内容发生变化时发出的通知
#[derive(Debug, Clone)]
pub struct StorageChange {
    pub new_value: Vec<StoredFileRecord>,
}

/// 存储后端的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Disk,
}

impl StorageKind {
    pub fn label(&self) -> &'static str {
        match self {
            StorageKind::Memory => "memory storage",
            StorageKind::Disk => "disk storage",
        }
    }
}

/// 键值存储后端
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// 读取全部文件记录，没有数据时返回空列表
    async fn get_all(&self) -> Result<Vec<StoredFileRecord>, StorageError>;

    /// 整体覆盖文件记录
    async fn set_all(&self, files: Vec<StoredFileRecord>) -> Result<(), StorageError>;

    /// 删除整个集合
    async fn remove_all(&self) -> Result<(), StorageError>;

    /// 订阅变更通知
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;

    fn kind(&self) -> StorageKind;

    /// 配额（字节），None 表示不限制
    fn quota(&self) -> Option<u64> {
        None
    }
}

/// 变更通知的发送端，由各个存储后端持有
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<StorageChange>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    pub fn notify(&self, files: &[StoredFileRecord]) {
        // 没有订阅者时发送失败，忽略即可
        let _ = self.sender.send(StorageChange {
            new_value: files.to_vec(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.sender.subscribe()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

/// 检查序列化后的集合是否超出配额
pub(crate) fn check_quota(
    files: &[StoredFileRecord],
    quota: Option<u64>,
    kind: StorageKind,
) -> Result<Vec<u8>, StorageError> {
    let encoded = serde_json::to_vec(files)?;
    if let Some(limit) = quota {
        if encoded.len() as u64 > limit {
            return Err(StorageError::QuotaExceeded {
                storage: kind.label().to_string(),
            });
        }
    }
    Ok(encoded)
}
