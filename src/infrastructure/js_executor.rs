//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力

use anyhow::{Context, Result};
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;

/// JS 执行器
///
/// 职责：
/// - 持有 Page 资源
/// - 暴露 eval() 能力
/// - 不认识表单字段 / 文件
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 表达式并返回 JSON 结果
    ///
    /// 表达式必须返回可序列化的值；返回 undefined 视为 null。
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let script = js_code.into();
        debug!("执行脚本: {} 字节", script.len());
        let result = self
            .page
            .evaluate(script)
            .await
            .context("页面脚本执行失败")?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    /// 执行 JS 表达式并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).context("脚本返回值格式不符合预期")
    }
}
