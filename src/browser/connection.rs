use anyhow::{Context, Result};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// 连接到已打开调试端口的浏览器，并找到要操作的页面
///
/// 查找顺序：标题包含 `target_title` 的页面 → 打开 `target_url` 的新页面
/// → 第一个已有页面 → 空白页。
pub async fn connect_to_browser_and_page(
    port: u16,
    target_url: Option<&str>,
    target_title: Option<&str>,
) -> Result<(Browser, Page)> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);
    debug!("目标 URL: {:?}, 目标标题: {:?}", target_url, target_title);

    let (browser, mut handler) = Browser::connect(&browser_url)
        .await
        .with_context(|| format!("无法连接到浏览器 (端口: {})", port))?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await.context("无法获取页面列表")?;
    debug!("获取到 {} 个页面", pages.len());

    if let Some(title) = target_title {
        for p in pages.iter() {
            if let Ok(Some(page_title)) = p.get_title().await {
                if page_title.contains(title) {
                    info!("✓ 找到目标页面: {}", page_title);
                    return Ok((browser, p.clone()));
                }
            }
        }
        warn!("⚠️ 未找到标题包含 '{}' 的页面", title);
    }

    if let Some(url) = target_url {
        let page = browser
            .new_page(url)
            .await
            .with_context(|| format!("导航到 {} 失败", url))?;
        info!("已导航到: {}", url);
        return Ok((browser, page));
    }

    if let Some(page) = pages.into_iter().next() {
        debug!("使用第一个已有页面");
        return Ok((browser, page));
    }

    let page = browser
        .new_page("about:blank")
        .await
        .context("创建空白页面失败")?;
    Ok((browser, page))
}
