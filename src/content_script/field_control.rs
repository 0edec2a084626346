//! 字段控件分类与赋值策略

use anyhow::Result;

use crate::dom::{Document, ElementInfo, ElementTag};

/// 按能力划分的表单控件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldControl<H> {
    /// 文本类 input（text / number / date / checkbox ...）与 textarea
    TextLike(H),
    /// 下拉框
    Selectable(H),
    /// 单选按钮：按组名定位同组中 value 匹配的选项
    Checkable { group: String },
    /// 其他元素
    Unsupported { tag: String },
}

/// 赋值结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome<H> {
    /// 已赋值，句柄指向需要派发事件的元素
    Applied(H),
    /// 无法赋值
    Rejected(String),
}

impl<H: Clone> FieldControl<H> {
    pub fn classify(info: ElementInfo<H>) -> Self {
        match info.tag {
            ElementTag::Input if info.input_type.as_deref() == Some("radio") => FieldControl::Checkable {
                group: info.name.unwrap_or_default(),
            },
            ElementTag::Input | ElementTag::TextArea => FieldControl::TextLike(info.handle),
            ElementTag::Select => FieldControl::Selectable(info.handle),
            ElementTag::Other(tag) => FieldControl::Unsupported { tag },
        }
    }

    /// 把值写入控件
    pub async fn apply_value<D>(&self, document: &D, value: &str) -> Result<ApplyOutcome<H>>
    where
        D: Document<Handle = H> + ?Sized,
    {
        match self {
            FieldControl::TextLike(handle) | FieldControl::Selectable(handle) => {
                document.set_value(handle, value).await?;
                Ok(ApplyOutcome::Applied(handle.clone()))
            }
            FieldControl::Checkable { group } => match document.find_radio(group, value).await? {
                Some(radio) => {
                    document.set_checked(&radio).await?;
                    Ok(ApplyOutcome::Applied(radio))
                }
                None => Ok(ApplyOutcome::Rejected(format!(
                    "Radio button not found: name={}, value={}",
                    group, value
                ))),
            },
            FieldControl::Unsupported { tag } => Ok(ApplyOutcome::Rejected(format!(
                "Unsupported element type: <{}>",
                tag
            ))),
        }
    }
}
