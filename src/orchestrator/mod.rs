//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `ocr_batch` - OCR 批处理器
//! - 解析要处理的文件，过滤不支持的类型
//! - 控制并发数量（Semaphore）
//! - 发出进度事件，汇总并写回结果
//!
//! ### `file_store` - 文件状态门面
//! - 维护可观察的文件列表，同步存储变更
//! - 添加、删除、清空文件
//! - 触发 OCR
//!
//! ### `app` - 应用入口
//! - 初始化存储与 OCR 客户端
//! - 分发命令行命令，管理浏览器资源
//!
//! ## 层次关系
//!
//! ```text
//! app (命令分发)
//!     ↓
//! file_store (文件列表 + OCR 状态)
//!     ↓
//! ocr_batch (处理 Vec<StoredFileRecord>)
//!     ↓
//! storage / clients (能力层：FileRepository / TextExtractor)
//! ```

pub mod app;
pub mod file_store;
pub mod observable;
pub mod ocr_batch;

// 重新导出主要类型
pub use app::App;
pub use file_store::{AddFilesResult, FileStore};
pub use observable::{FileList, OcrStatus};
pub use ocr_batch::{noop_sink, process_files, BatchReport, FileSelector, OcrOrchestrator, ProgressSink};
