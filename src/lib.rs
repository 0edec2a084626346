//! # Autofill OCR
//!
//! 表单自动填写与文件 OCR 的 Rust 实现
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `CdpDocument` - 基于 JsExecutor 的页面文档
//! - `storage/` - 文件记录的持久化后端（内存 / JSON 文件）
//!
//! ### ② 业务能力层（Capabilities）
//! - `dom/` - 文档抽象与内存实现
//! - `clients/` - OCR 服务客户端（`TextExtractor`）
//! - `FileRepository` - 保存、更新 OCR 结果、删除文件
//!
//! ### ③ 流程层（Content Script）
//! - `content_script/` - 消息协议、字段填写状态机、一次性回复的消息通道
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/ocr_batch` - 有界并发的 OCR 批处理
//! - `orchestrator/file_store` - 可观察的文件列表与 OCR 状态
//! - `orchestrator/app` - 命令行应用入口
//!
//! ## 模块结构

pub mod browser;
pub mod cli;
pub mod clients;
pub mod config;
pub mod content_script;
pub mod dom;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod storage;
pub mod utils;

// 重新导出常用类型
pub use browser::connect_to_browser_and_page;
pub use clients::{OcrApiClient, TextExtractor};
pub use config::Config;
pub use content_script::{FieldAssignment, FieldFillEngine, FillRequest, FillResponse};
pub use dom::{Document, MemoryDocument};
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{OcrOutcome, OcrProgress, StoredFileRecord, UploadedFile};
pub use orchestrator::{App, BatchReport, FileSelector, FileStore, OcrOrchestrator};
pub use storage::{FileRepository, JsonFileStorage, MemoryStorage};
