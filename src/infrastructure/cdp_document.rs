//! 浏览器页面文档
//!
//! 通过 [`JsExecutor`] 在真实页面中执行小段脚本，实现 [`Document`]。
//! 所有字符串都经过 JSON 编码后再拼进脚本，避免注入。

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;

use super::JsExecutor;
use crate::dom::{Document, DomEvent, ElementInfo, ElementTag};

/// 页面元素定位方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdpHandle {
    ById(String),
    Radio { group: String, value: String },
}

impl CdpHandle {
    /// 生成定位元素的 JS 表达式
    fn locate_js(&self) -> String {
        match self {
            CdpHandle::ById(id) => format!("document.getElementById({})", js_string(id)),
            CdpHandle::Radio { group, value } => format!(
                "Array.from(document.querySelectorAll('input[type=\"radio\"]')).find(el => (el.getAttribute('name') || '') === {} && el.value === {}) || null",
                js_string(group),
                js_string(value)
            ),
        }
    }
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawElement {
    tag: String,
    input_type: Option<String>,
    name: Option<String>,
}

/// 基于 CDP 的页面文档
#[derive(Clone)]
pub struct CdpDocument {
    executor: JsExecutor,
}

impl CdpDocument {
    pub fn new(executor: JsExecutor) -> Self {
        Self { executor }
    }

    /// 对定位到的元素执行一段语句，元素不存在时报错
    async fn with_element(&self, handle: &CdpHandle, body: &str) -> Result<()> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; {}; return true; }})()",
            handle.locate_js(),
            body
        );
        let found: bool = self.executor.eval_as(script).await?;
        if !found {
            bail!("页面元素已不存在: {:?}", handle);
        }
        Ok(())
    }
}

#[async_trait]
impl Document for CdpDocument {
    type Handle = CdpHandle;

    async fn first_form_html(&self) -> Result<Option<String>> {
        self.executor
            .eval_as("(() => { const form = document.querySelector('form'); return form ? form.outerHTML : null; })()")
            .await
    }

    async fn element_by_id(&self, id: &str) -> Result<Option<ElementInfo<CdpHandle>>> {
        let handle = CdpHandle::ById(id.to_string());
        let script = format!(
            "(() => {{ const el = {}; if (!el) return null; return {{ tag: el.tagName.toLowerCase(), inputType: el instanceof HTMLInputElement ? (el.type || 'text').toLowerCase() : null, name: el.getAttribute('name') }}; }})()",
            handle.locate_js()
        );
        let raw: Option<RawElement> = self.executor.eval_as(script).await?;

        Ok(raw.map(|raw| ElementInfo {
            handle,
            tag: ElementTag::from_name(&raw.tag),
            input_type: raw.input_type,
            name: raw.name,
        }))
    }

    async fn find_radio(&self, group: &str, value: &str) -> Result<Option<CdpHandle>> {
        let handle = CdpHandle::Radio {
            group: group.to_string(),
            value: value.to_string(),
        };
        let found: bool = self
            .executor
            .eval_as(format!("(() => !!({}))()", handle.locate_js()))
            .await?;
        Ok(found.then_some(handle))
    }

    async fn set_value(&self, handle: &CdpHandle, value: &str) -> Result<()> {
        self.with_element(handle, &format!("el.value = {}", js_string(value)))
            .await
    }

    async fn set_checked(&self, handle: &CdpHandle) -> Result<()> {
        self.with_element(handle, "el.checked = true").await
    }

    async fn dispatch_event(&self, handle: &CdpHandle, event: DomEvent) -> Result<()> {
        self.with_element(
            handle,
            &format!("el.dispatchEvent(new Event({}, {{ bubbles: true }}))", js_string(event.name())),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_scripts_escape_user_values() {
        let handle = CdpHandle::ById("a\"); alert(1); (\"".to_string());
        let js = handle.locate_js();
        assert_eq!(js, r#"document.getElementById("a\"); alert(1); (\"")"#);

        let radio = CdpHandle::Radio {
            group: "gender".to_string(),
            value: "01".to_string(),
        };
        let js = radio.locate_js();
        assert!(js.contains(r#"=== "gender""#));
        assert!(js.contains(r#"el.value === "01""#));
    }
}
