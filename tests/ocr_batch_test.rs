use async_trait::async_trait;
use autofill_ocr::clients::TextExtractor;
use autofill_ocr::error::{AppError, OcrError, StorageError};
use autofill_ocr::models::{OcrOutcome, OcrProgress, ProgressStage, StoredFileRecord, UploadedFile};
use autofill_ocr::orchestrator::{noop_sink, FileList, FileSelector, OcrOrchestrator, ProgressSink};
use autofill_ocr::storage::{FileRepository, FileStorage, MemoryStorage, StorageChange, StorageKind};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// 假的文字提取服务：返回文件内容本身，指定文件名超时
#[derive(Default)]
struct FakeExtractor {
    delay: Duration,
    timeouts: HashSet<String>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeExtractor {
    fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn timing_out_on(mut self, name: &str) -> Self {
        self.timeouts.insert(name.to_string());
        self
    }
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, content: Vec<u8>, file_name: &str, _mime_type: &str) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.timeouts.contains(file_name) {
            return Err(OcrError::Timeout);
        }
        Ok(String::from_utf8_lossy(&content).into_owned())
    }
}

fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<OcrProgress>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let sink: ProgressSink = Arc::new(move |p: OcrProgress| captured.lock().unwrap().push(p));
    (sink, events)
}

async fn repository_with(files: &[(&str, &str)]) -> (FileRepository, Vec<StoredFileRecord>) {
    let repository = FileRepository::new(Arc::new(MemoryStorage::new()));
    let uploads: Vec<UploadedFile> = files
        .iter()
        .map(|(name, mime)| UploadedFile::new(*name, *mime, format!("text in {}", name).into_bytes()))
        .collect();
    let saved = repository.save_files(&uploads).await.unwrap();
    (repository, saved)
}

fn orchestrator(repository: &FileRepository, extractor: Arc<FakeExtractor>) -> OcrOrchestrator {
    OcrOrchestrator::new(repository.clone(), extractor, FileList::new(), 3)
}

fn count_stage(events: &[OcrProgress], stage: ProgressStage) -> usize {
    events.iter().filter(|e| e.stage == stage).count()
}

#[tokio::test]
async fn five_supported_files_all_succeed() {
    let (repository, saved) = repository_with(&[
        ("a.png", "image/png"),
        ("b.jpg", "image/jpeg"),
        ("c.pdf", "application/pdf"),
        ("d.png", "image/png"),
        ("e.jpg", "image/jpg"),
    ])
    .await;
    let extractor = Arc::new(FakeExtractor::default());
    let (sink, events) = recording_sink();

    let report = orchestrator(&repository, extractor.clone())
        .run_batch(FileSelector::All, sink)
        .await
        .unwrap();

    assert_eq!(report.total, 5);
    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.succeeded(), 5);
    assert_eq!(report.failed(), 0);
    assert_eq!(report.persisted, 5);

    let events = events.lock().unwrap();
    assert_eq!(count_stage(&events, ProgressStage::FileStarted), 5);
    assert_eq!(count_stage(&events, ProgressStage::FileCompleted), 5);
    let last = events.last().unwrap();
    assert_eq!(last.stage, ProgressStage::Finished);
    assert_eq!(last.progress, 1.0);

    for record in repository.get_all().await.unwrap() {
        assert!(record.ocr_processed);
        assert_eq!(record.ocr_text, Some(format!("text in {}", record.name)));
        assert_eq!(record.ocr_error, None);
    }
    assert_eq!(saved.len(), 5);
}

#[tokio::test]
async fn timeout_on_one_file_does_not_abort_batch() {
    let (repository, saved) = repository_with(&[
        ("1.png", "image/png"),
        ("2.png", "image/png"),
        ("3.png", "image/png"),
        ("4.png", "image/png"),
    ])
    .await;
    let extractor = Arc::new(FakeExtractor::default().timing_out_on("2.png"));
    let (sink, events) = recording_sink();

    let report = orchestrator(&repository, extractor)
        .run_batch(FileSelector::All, sink)
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 1);
    let second = &saved[1];
    assert_eq!(
        report.outcomes.get(&second.id),
        Some(&OcrOutcome::Error(OcrError::Timeout.to_string()))
    );

    let events = events.lock().unwrap();
    assert_eq!(count_stage(&events, ProgressStage::FileFailed), 1);
    assert_eq!(events.last().unwrap().progress, 1.0);

    let stored = repository.get_file(&second.id).await.unwrap();
    assert!(stored.ocr_processed);
    assert_eq!(stored.ocr_text, None);
    assert!(stored.ocr_error.unwrap().contains("timeout"));
}

#[tokio::test]
async fn unsupported_files_are_excluded_entirely() {
    let (repository, saved) = repository_with(&[("scan.png", "image/png"), ("clip.mp4", "video/mp4")]).await;
    let ids: Vec<String> = saved.iter().map(|f| f.id.clone()).collect();
    let extractor = Arc::new(FakeExtractor::default());
    let (sink, events) = recording_sink();

    let report = orchestrator(&repository, extractor.clone())
        .run_batch(FileSelector::Ids(ids), sink)
        .await
        .unwrap();

    assert_eq!(report.total, 1);
    assert_eq!(report.outcomes.len(), 1);
    assert!(!report.outcomes.contains_key(&saved[1].id));
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);

    let events = events.lock().unwrap();
    assert!(events.iter().all(|e| e.current_file != "clip.mp4"));
    assert!(events.iter().all(|e| e.total_files == 1));

    let video = repository.get_file(&saved[1].id).await.unwrap();
    assert!(!video.ocr_processed);
}

#[tokio::test]
async fn never_more_than_three_extractions_in_flight() {
    let names: Vec<String> = (0..8).map(|i| format!("page-{}.png", i)).collect();
    let files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "image/png")).collect();
    let (repository, _) = repository_with(&files).await;
    let extractor = Arc::new(FakeExtractor::with_delay(Duration::from_millis(20)));

    let report = orchestrator(&repository, extractor.clone())
        .run_batch(FileSelector::All, noop_sink())
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 8);
    assert_eq!(extractor.max_in_flight.load(Ordering::SeqCst), 3);
    assert_eq!(extractor.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn progress_never_decreases_and_ends_at_one() {
    let names: Vec<String> = (0..7).map(|i| format!("{}.jpg", i)).collect();
    let files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "image/jpeg")).collect();
    let (repository, _) = repository_with(&files).await;
    let extractor = Arc::new(FakeExtractor::with_delay(Duration::from_millis(5)).timing_out_on("3.jpg"));
    let (sink, events) = recording_sink();

    orchestrator(&repository, extractor)
        .run_batch(FileSelector::All, sink)
        .await
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.first().unwrap().stage, ProgressStage::Starting);
    for pair in events.windows(2) {
        assert!(pair[1].progress >= pair[0].progress, "{:?} -> {:?}", pair[0], pair[1]);
    }
    assert!(events.iter().all(|e| (0.0..=1.0).contains(&e.progress)));
    assert_eq!(events.last().unwrap().progress, 1.0);
}

#[tokio::test]
async fn empty_selection_is_a_silent_no_op() {
    let (repository, _) = repository_with(&[]).await;
    let extractor = Arc::new(FakeExtractor::default());
    let orchestrator = orchestrator(&repository, extractor.clone());

    for selector in [
        FileSelector::All,
        FileSelector::Ids(Vec::new()),
        FileSelector::Ids(vec!["does-not-exist".to_string()]),
    ] {
        let (sink, events) = recording_sink();
        let report = orchestrator.run_batch(selector, sink).await.unwrap();
        assert!(report.is_empty());
        assert!(events.lock().unwrap().is_empty());
    }
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert!(!orchestrator.status().is_running());
}

#[tokio::test]
async fn only_unsupported_files_is_a_no_op() {
    let (repository, _) = repository_with(&[("notes.txt", "text/plain")]).await;
    let (sink, events) = recording_sink();

    let report = orchestrator(&repository, Arc::new(FakeExtractor::default()))
        .run_batch(FileSelector::All, sink)
        .await
        .unwrap();

    assert!(report.is_empty());
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn undecodable_content_is_a_per_file_failure() {
    let (repository, saved) = repository_with(&[("ok.png", "image/png"), ("bad.png", "image/png")]).await;
    let mut files = repository.get_all().await.unwrap();
    files[1].data_url = "not a data url".to_string();
    repository.set_all(files).await.unwrap();

    let extractor = Arc::new(FakeExtractor::default());
    let report = orchestrator(&repository, extractor.clone())
        .run_batch(FileSelector::All, noop_sink())
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 1);
    assert!(report.outcomes.get(&saved[1].id).unwrap().error().is_some());
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rerun_overwrites_previous_error() {
    let (repository, saved) = repository_with(&[("retry.png", "image/png")]).await;

    orchestrator(&repository, Arc::new(FakeExtractor::default().timing_out_on("retry.png")))
        .run_batch(FileSelector::All, noop_sink())
        .await
        .unwrap();
    let failed = repository.get_file(&saved[0].id).await.unwrap();
    assert!(failed.ocr_error.is_some());

    orchestrator(&repository, Arc::new(FakeExtractor::default()))
        .run_batch(FileSelector::Ids(vec![saved[0].id.clone()]), noop_sink())
        .await
        .unwrap();
    let fixed = repository.get_file(&saved[0].id).await.unwrap();
    assert!(fixed.ocr_processed);
    assert_eq!(fixed.ocr_text.as_deref(), Some("text in retry.png"));
    assert_eq!(fixed.ocr_error, None);
}

#[tokio::test]
async fn status_and_file_list_reflect_the_finished_batch() {
    let (repository, _) = repository_with(&[("a.png", "image/png"), ("b.png", "image/png")]).await;
    let files = FileList::new();
    let orchestrator = OcrOrchestrator::new(repository.clone(), Arc::new(FakeExtractor::default()), files.clone(), 3);

    orchestrator.run_batch(FileSelector::All, noop_sink()).await.unwrap();

    assert!(!orchestrator.status().is_running());
    let last = orchestrator.status().latest_progress().unwrap();
    assert_eq!(last.stage, ProgressStage::Finished);
    assert_eq!(files.len(), 2);
    assert!(files.snapshot().iter().all(|f| f.ocr_processed));
}

/// 指定文件名时直接 panic 的提取服务
struct CrashingExtractor {
    crash_on: &'static str,
}

#[async_trait]
impl TextExtractor for CrashingExtractor {
    async fn extract(&self, content: Vec<u8>, file_name: &str, _mime_type: &str) -> Result<String, OcrError> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if file_name == self.crash_on {
            panic!("extractor crashed on {}", file_name);
        }
        Ok(String::from_utf8_lossy(&content).into_owned())
    }
}

#[tokio::test]
async fn crashed_task_is_a_per_file_failure() {
    let names: Vec<String> = (0..6).map(|i| format!("{}.png", i)).collect();
    let files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "image/png")).collect();
    let (repository, saved) = repository_with(&files).await;
    let (sink, events) = recording_sink();

    let report = OcrOrchestrator::new(
        repository.clone(),
        Arc::new(CrashingExtractor { crash_on: "0.png" }),
        FileList::new(),
        3,
    )
    .run_batch(FileSelector::All, sink)
    .await
    .unwrap();

    assert_eq!(report.outcomes.len(), 6);
    assert_eq!(report.succeeded(), 5);
    assert!(report.outcomes[&saved[0].id].error().unwrap().contains("aborted"));
    assert_eq!(report.persisted, 6);

    let events = events.lock().unwrap();
    assert_eq!(count_stage(&events, ProgressStage::FileFailed), 1);
    assert_eq!(count_stage(&events, ProgressStage::FileCompleted), 5);
    assert_eq!(events.last().unwrap().stage, ProgressStage::Finished);

    let stored = repository.get_all().await.unwrap();
    assert!(stored.iter().all(|f| f.ocr_processed));
    assert_eq!(stored.iter().filter(|f| f.ocr_text.is_some()).count(), 5);
}

/// 前 `healthy_reads` 次读取正常，之后读取全部失败的存储
struct FailingReadsStorage {
    inner: MemoryStorage,
    reads: AtomicUsize,
    healthy_reads: usize,
}

#[async_trait]
impl FileStorage for FailingReadsStorage {
    async fn get_all(&self) -> Result<Vec<StoredFileRecord>, StorageError> {
        if self.reads.fetch_add(1, Ordering::SeqCst) >= self.healthy_reads {
            return Err(StorageError::Unavailable("disk detached".to_string()));
        }
        self.inner.get_all().await
    }

    async fn set_all(&self, files: Vec<StoredFileRecord>) -> Result<(), StorageError> {
        self.inner.set_all(files).await
    }

    async fn remove_all(&self) -> Result<(), StorageError> {
        self.inner.remove_all().await
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.subscribe()
    }

    fn kind(&self) -> StorageKind {
        self.inner.kind()
    }
}

#[tokio::test]
async fn storage_failure_mid_batch_reports_failed_state() {
    let (seed, _) = repository_with(&[("a.png", "image/png"), ("b.png", "image/png")]).await;
    let inner = MemoryStorage::new();
    inner.set_all(seed.get_all().await.unwrap()).await.unwrap();
    let repository = FileRepository::new(Arc::new(FailingReadsStorage {
        inner,
        reads: AtomicUsize::new(0),
        healthy_reads: 1,
    }));

    let orchestrator = OcrOrchestrator::new(repository, Arc::new(FakeExtractor::default()), FileList::new(), 3);
    let (sink, events) = recording_sink();

    let result = orchestrator.run_batch(FileSelector::All, sink).await;

    assert!(matches!(result, Err(AppError::Storage(StorageError::Unavailable(_)))));
    let events = events.lock().unwrap();
    let last = events.last().unwrap();
    assert_eq!(last.stage, ProgressStage::Failed);
    assert_eq!(last.progress, 0.0);
    assert!(!orchestrator.status().is_running());
    assert_eq!(orchestrator.status().latest_progress().unwrap().stage, ProgressStage::Failed);
}
