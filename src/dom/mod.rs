//! 页面文档抽象
//!
//! 字段填充引擎只通过 [`Document`] 操作页面：内存实现用于测试和离线表单，
//! `infrastructure::CdpDocument` 则驱动真实的浏览器页面。

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

pub use memory::{MemoryDocument, NodeId};

/// 元素标签种类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementTag {
    Input,
    Select,
    TextArea,
    Other(String),
}

impl ElementTag {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "input" => ElementTag::Input,
            "select" => ElementTag::Select,
            "textarea" => ElementTag::TextArea,
            other => ElementTag::Other(other.to_string()),
        }
    }
}

/// 按 ID 查到的元素信息
#[derive(Debug, Clone)]
pub struct ElementInfo<H> {
    pub handle: H,
    pub tag: ElementTag,
    /// input 的 type 属性（小写，缺省为 "text"）
    pub input_type: Option<String>,
    /// name 属性
    pub name: Option<String>,
}

/// 填充后派发给页面的通知事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEvent {
    Input,
    Change,
    Blur,
}

impl DomEvent {
    /// 响应式框架检测变更所需的事件顺序
    pub const FILL_SEQUENCE: [DomEvent; 3] = [DomEvent::Input, DomEvent::Change, DomEvent::Blur];

    pub fn name(&self) -> &'static str {
        match self {
            DomEvent::Input => "input",
            DomEvent::Change => "change",
            DomEvent::Blur => "blur",
        }
    }
}

impl fmt::Display for DomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 页面文档
#[async_trait]
pub trait Document: Send + Sync {
    /// 元素句柄
    type Handle: Clone + Send + Sync + fmt::Debug;

    /// 第一个 form 元素的 outer HTML，没有表单时返回 None
    async fn first_form_html(&self) -> Result<Option<String>>;

    /// 按 id 属性查找元素
    async fn element_by_id(&self, id: &str) -> Result<Option<ElementInfo<Self::Handle>>>;

    /// 查找同组（name 相同）中 value 匹配的单选按钮
    async fn find_radio(&self, group: &str, value: &str) -> Result<Option<Self::Handle>>;

    /// 直接赋值
    async fn set_value(&self, handle: &Self::Handle, value: &str) -> Result<()>;

    /// 选中单选按钮
    async fn set_checked(&self, handle: &Self::Handle) -> Result<()>;

    /// 派发一个冒泡事件
    async fn dispatch_event(&self, handle: &Self::Handle, event: DomEvent) -> Result<()>;
}
