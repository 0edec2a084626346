/// 日志工具模块
///
/// 提供日志初始化以及批处理日志的格式化输出
use std::collections::HashMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::{OcrOutcome, StoredFileRecord};

/// 初始化日志
///
/// `RUST_LOG` 优先；否则 verbose 时为 debug，默认 info。重复调用无副作用。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录批处理开始信息
///
/// # 参数
/// - `total`: 待处理文件数
/// - `max_concurrent`: 最大并发数
pub fn log_batch_start(total: usize, max_concurrent: usize) {
    info!("{}", "=".repeat(60));
    info!("📦 开始 OCR 处理: 共 {} 个文件", total);
    info!("📊 最大并发数: {}", max_concurrent);
    info!("{}", "=".repeat(60));
}

/// 记录批处理完成信息
pub fn log_batch_complete(success: usize, failed: usize, total: usize) {
    info!("{}", "─".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    info!("{}", "─".repeat(60));
}

/// 输出汇总的 OCR 结果
///
/// # 参数
/// - `files`: 写回后的最新文件列表
/// - `outcomes`: 本次处理的结果（只输出本次处理过的文件）
pub fn log_ocr_report(files: &[StoredFileRecord], outcomes: &HashMap<String, OcrOutcome>) {
    info!("=== OCR Processing Complete ===");
    info!("Processed {} files", outcomes.len());

    for file in files
        .iter()
        .filter(|f| f.ocr_processed && outcomes.contains_key(&f.id))
    {
        info!("--- {} ---", file.name);
        if let Some(error) = &file.ocr_error {
            info!("Error: {}", error);
        } else if let Some(text) = file.ocr_text.as_deref().filter(|t| !t.is_empty()) {
            info!("{}", text);
        } else {
            info!("No text extracted");
        }
    }

    info!("=== End of OCR Results ===");
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_text("护照号码 E12345678", 4), "护照号码...");
        assert_eq!(truncate_text("short", 10), "short");
    }
}
