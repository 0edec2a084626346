use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info};

/// 启动无头浏览器并打开指定 URL（例如本地保存的表单页面）
pub async fn launch_headless_browser(url: &str, executable: Option<&Path>) -> Result<(Browser, Page)> {
    info!("🚀 启动无头浏览器...");
    debug!("目标 URL: {}", url);

    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--disable-gpu",
        "--no-sandbox",
        "--disable-dev-shm-usage",
    ]);
    if let Some(path) = executable {
        builder = builder.chrome_executable(path);
    }
    let config = builder
        .build()
        .map_err(|e| anyhow!("配置无头浏览器失败: {}", e))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .context("启动无头浏览器失败")?;

    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = browser.new_page(url).await.context("创建页面失败")?;
    info!("✅ 无头浏览器已打开: {}", url);

    Ok((browser, page))
}
