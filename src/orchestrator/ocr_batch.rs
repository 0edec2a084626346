//! OCR 批处理器 - 编排层
//!
//! ## 职责
//!
//! 对一组已保存的文件执行 OCR，并把结果写回存储。
//!
//! ## 流程
//!
//! 1. **解析选择**：全部文件或指定 id 的文件
//! 2. **过滤类型**：只处理 OCR 支持的类型，其余静默跳过
//! 3. **并发处理**：Semaphore 限制同时在途的请求数，每个文件一个 tokio 任务
//! 4. **进度通知**：每个文件开始、结束时各发出一次进度
//! 5. **写回结果**：逐个写回存储，再刷新文件列表
//! 6. **汇总输出**：记录本次处理的结果
//!
//! 单个文件失败只会记录在该文件的结果中，不会中断整批。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::clients::{is_ocr_supported, TextExtractor};
use crate::error::AppError;
use crate::models::{OcrOutcome, OcrProgress, ProgressStage, StoredFileRecord};
use crate::orchestrator::observable::{FileList, OcrStatus};
use crate::storage::FileRepository;
use crate::utils::logging;

/// 进度回调
pub type ProgressSink = Arc<dyn Fn(OcrProgress) + Send + Sync>;

/// 不关心进度时使用的空回调
pub fn noop_sink() -> ProgressSink {
    Arc::new(|_| {})
}

/// 要处理哪些文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSelector {
    All,
    Ids(Vec<String>),
}

/// 一次批处理的结果
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// 实际送去识别的文件数
    pub total: usize,
    /// 文件 id → 识别结果
    pub outcomes: HashMap<String, OcrOutcome>,
    /// 成功写回存储的条数
    pub persisted: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// 没有任何文件被处理
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// 进度汇报器
///
/// 完成计数和发出事件在同一把锁内完成，保证进度单调不减。
struct ProgressReporter {
    total: usize,
    completed: Mutex<usize>,
    sink: ProgressSink,
}

impl ProgressReporter {
    fn new(total: usize, sink: ProgressSink) -> Self {
        Self {
            total,
            completed: Mutex::new(0),
            sink,
        }
    }

    fn fraction(&self, completed: usize) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            completed as f64 / self.total as f64
        }
    }

    fn file_started(&self, name: &str, index: usize) {
        let completed = self.completed.lock().unwrap_or_else(|e| e.into_inner());
        (self.sink)(OcrProgress {
            current_file: name.to_string(),
            current_index: index,
            total_files: self.total,
            progress: self.fraction(*completed),
            status: format!("Processing {}...", name),
            stage: ProgressStage::FileStarted,
        });
    }

    fn file_settled(&self, name: &str, index: usize, success: bool) {
        let mut completed = self.completed.lock().unwrap_or_else(|e| e.into_inner());
        *completed += 1;
        let (status, stage) = if success {
            (format!("Completed {}", name), ProgressStage::FileCompleted)
        } else {
            (format!("Failed: {}", name), ProgressStage::FileFailed)
        };
        (self.sink)(OcrProgress {
            current_file: name.to_string(),
            current_index: index + 1,
            total_files: self.total,
            progress: self.fraction(*completed),
            status,
            stage,
        });
    }
}

/// 并发识别一组文件
///
/// # 参数
/// - `files`: 待处理文件，不支持的类型会被过滤掉
/// - `extractor`: 文字提取服务
/// - `sink`: 进度回调
/// - `max_concurrent`: 同时在途的最大请求数
///
/// # 返回
/// 文件 id → 识别结果；单个任务异常退出只记为该文件失败，只有并发控制本身失效时才返回错误
pub async fn process_files(
    files: Vec<StoredFileRecord>,
    extractor: Arc<dyn TextExtractor>,
    sink: ProgressSink,
    max_concurrent: usize,
) -> Result<HashMap<String, OcrOutcome>, AppError> {
    let processable: Vec<StoredFileRecord> = files
        .into_iter()
        .filter(|f| is_ocr_supported(&f.mime_type))
        .collect();

    if processable.is_empty() {
        return Ok(HashMap::new());
    }

    let total = processable.len();
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let reporter = Arc::new(ProgressReporter::new(total, sink));
    let mut handles: Vec<(String, String, usize, tokio::task::JoinHandle<OcrOutcome>)> =
        Vec::with_capacity(total);

    for (index, file) in processable.into_iter().enumerate() {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                for (_, _, _, handle) in &handles {
                    handle.abort();
                }
                return Err(AppError::Batch(e.to_string()));
            }
        };

        let extractor = extractor.clone();
        let task_reporter = reporter.clone();
        let id = file.id.clone();
        let name = file.name.clone();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            process_file(extractor.as_ref(), &file, index, &task_reporter).await
        });
        handles.push((id, name, index, handle));
    }

    // 任务异常退出（panic 或被取消）只记为该文件的失败，其余结果照常保留
    let mut outcomes = HashMap::with_capacity(total);
    for (id, name, index, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("OCR task for {} aborted: {}", name, e);
                reporter.file_settled(&name, index, false);
                OcrOutcome::Error(format!("OCR task aborted: {}", e))
            }
        };
        outcomes.insert(id, outcome);
    }

    Ok(outcomes)
}

/// 处理单个文件，失败会被转成 `OcrOutcome::Error`
async fn process_file(
    extractor: &dyn TextExtractor,
    file: &StoredFileRecord,
    index: usize,
    reporter: &ProgressReporter,
) -> OcrOutcome {
    reporter.file_started(&file.name, index);
    debug!("[{}/{}] 开始识别: {}", index + 1, reporter.total, file.name);

    let result = match file.decode_content() {
        Ok(content) => extractor.extract(content, &file.name, &file.mime_type).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(text) => {
            debug!(
                "[{}/{}] ✓ {}: {}",
                index + 1,
                reporter.total,
                file.name,
                logging::truncate_text(&text, 40)
            );
            reporter.file_settled(&file.name, index, true);
            OcrOutcome::Text(text)
        }
        Err(e) => {
            error!("OCR failed for {}: {}", file.name, e);
            reporter.file_settled(&file.name, index, false);
            OcrOutcome::Error(e.to_string())
        }
    }
}

/// OCR 编排器
///
/// 持有存储、识别服务以及对外可观察的状态。
#[derive(Clone)]
pub struct OcrOrchestrator {
    repository: FileRepository,
    extractor: Arc<dyn TextExtractor>,
    files: FileList,
    status: OcrStatus,
    max_concurrent: usize,
}

impl OcrOrchestrator {
    pub fn new(
        repository: FileRepository,
        extractor: Arc<dyn TextExtractor>,
        files: FileList,
        max_concurrent: usize,
    ) -> Self {
        Self {
            repository,
            extractor,
            files,
            status: OcrStatus::new(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn status(&self) -> &OcrStatus {
        &self.status
    }

    /// 运行一次批处理
    ///
    /// # 参数
    /// - `selector`: 要处理的文件
    /// - `sink`: 进度回调
    ///
    /// # 返回
    /// 本次批处理的结果。没有可处理的文件时返回空结果，且不发出任何进度。
    pub async fn run_batch(&self, selector: FileSelector, sink: ProgressSink) -> Result<BatchReport, AppError> {
        if let FileSelector::Ids(ids) = &selector {
            if ids.is_empty() {
                debug!("未指定任何文件，跳过 OCR");
                return Ok(BatchReport::default());
            }
        }

        let all_files = self.repository.get_all().await?;
        let selected: Vec<StoredFileRecord> = match &selector {
            FileSelector::All => all_files,
            FileSelector::Ids(ids) => all_files.into_iter().filter(|f| ids.contains(&f.id)).collect(),
        };

        let (processable, skipped): (Vec<_>, Vec<_>) = selected
            .into_iter()
            .partition(|f| is_ocr_supported(&f.mime_type));

        if !skipped.is_empty() {
            debug!("跳过 {} 个不支持 OCR 的文件", skipped.len());
        }
        if processable.is_empty() {
            info!("没有需要 OCR 的文件");
            return Ok(BatchReport::default());
        }

        let total = processable.len();
        let status = self.status.clone();
        let sink: ProgressSink = Arc::new(move |progress: OcrProgress| {
            status.publish(progress.clone());
            sink(progress);
        });

        self.status.set_running(true);
        sink(OcrProgress::starting(total));

        let result = self.process_and_persist(processable, sink.clone()).await;
        match &result {
            Ok(_) => sink(OcrProgress::finished(total)),
            Err(e) => {
                error!("❌ OCR processing error: {}", e);
                sink(OcrProgress::failed(total));
            }
        }

        self.status.set_running(false);
        result
    }

    async fn process_and_persist(
        &self,
        files: Vec<StoredFileRecord>,
        sink: ProgressSink,
    ) -> Result<BatchReport, AppError> {
        let total = files.len();
        logging::log_batch_start(total, self.max_concurrent);

        let outcomes = process_files(files, self.extractor.clone(), sink, self.max_concurrent).await?;

        let mut persisted = 0;
        for (id, outcome) in &outcomes {
            let saved = self
                .repository
                .update_file_ocr(
                    id,
                    outcome.text().map(str::to_string),
                    outcome.error().map(str::to_string),
                )
                .await;
            if saved {
                persisted += 1;
            } else {
                warn!("⚠️ 文件 {} 的 OCR 结果未能保存", id);
            }
        }

        let updated = self.repository.get_all().await?;
        logging::log_ocr_report(&updated, &outcomes);
        self.files.set(updated);

        let report = BatchReport {
            total,
            outcomes,
            persisted,
        };
        logging::log_batch_complete(report.succeeded(), report.failed(), total);

        Ok(report)
    }
}
