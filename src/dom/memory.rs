//! 内存文档
//!
//! 用 `scraper` 解析 HTML，再转存为可修改的节点数组。赋值、选中等修改
//! 直接反映到属性上，所以序列化出的 outer HTML 包含当前的表单状态。

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Node};
use std::sync::{Mutex, MutexGuard};

use super::{Document, DomEvent, ElementInfo, ElementTag};

/// 节点句柄（节点数组下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
struct DomNode {
    kind: NodeKind,
    children: Vec<usize>,
}

#[derive(Debug, Default)]
struct DomState {
    nodes: Vec<DomNode>,
    events: Vec<(NodeId, DomEvent)>,
}

/// 内容按原样输出、不做实体转义的元素
const RAW_TEXT_ELEMENTS: [&str; 2] = ["script", "style"];

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// 内存中的可修改文档
#[derive(Debug, Default)]
pub struct MemoryDocument {
    state: Mutex<DomState>,
}

impl MemoryDocument {
    /// 解析 HTML 文本
    pub fn parse(source: &str) -> Self {
        let html = Html::parse_document(source);
        let mut state = DomState::default();
        import_element(&mut state.nodes, html.root_element());
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, DomState>> {
        self.state.lock().map_err(|_| anyhow!("文档状态已损坏"))
    }

    /// 已派发的全部事件（按派发顺序）
    pub fn events(&self) -> Vec<(NodeId, DomEvent)> {
        self.lock().map(|s| s.events.clone()).unwrap_or_default()
    }

    /// 某个元素收到的事件
    pub fn events_for(&self, handle: NodeId) -> Vec<DomEvent> {
        self.events()
            .into_iter()
            .filter(|(id, _)| *id == handle)
            .map(|(_, event)| event)
            .collect()
    }

    /// 按 id 查找元素句柄
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        let state = self.lock().ok()?;
        find_element(&state, |_, attrs| attr(attrs, "id") == Some(id)).map(NodeId)
    }

    /// 读取属性
    pub fn attribute(&self, handle: NodeId, name: &str) -> Option<String> {
        let state = self.lock().ok()?;
        match &state.nodes.get(handle.0)?.kind {
            NodeKind::Element { attrs, .. } => attr(attrs, name).map(str::to_string),
            _ => None,
        }
    }

    /// 单选按钮 / 复选框是否被选中
    pub fn is_checked(&self, handle: NodeId) -> bool {
        self.attribute(handle, "checked").is_some()
    }

    /// 按 id 读取表单控件的当前值
    pub fn value_of(&self, id: &str) -> Option<String> {
        let handle = self.find_by_id(id)?;
        let state = self.lock().ok()?;
        let NodeKind::Element { tag, attrs } = &state.nodes.get(handle.0)?.kind else {
            return None;
        };
        match ElementTag::from_name(tag) {
            ElementTag::TextArea => Some(text_content(&state, handle.0)),
            ElementTag::Select => descendants(&state, handle.0)
                .into_iter()
                .find(|&i| is_tag(&state, i, "option") && element_attr(&state, i, "selected").is_some())
                .map(|i| option_value(&state, i)),
            _ => attr(attrs, "value").map(str::to_string),
        }
    }

    /// 序列化元素的 outer HTML
    pub fn outer_html(&self, handle: NodeId) -> Option<String> {
        let state = self.lock().ok()?;
        state.nodes.get(handle.0)?;
        let mut out = String::new();
        write_node(&state, handle.0, &mut out);
        Some(out)
    }
}

fn import_element(nodes: &mut Vec<DomNode>, element: ElementRef<'_>) -> usize {
    let index = nodes.len();
    nodes.push(DomNode {
        kind: NodeKind::Element {
            tag: element.value().name().to_string(),
            attrs: element
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        },
        children: Vec::new(),
    });

    for child in element.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    let child_index = import_element(nodes, child_element);
                    nodes[index].children.push(child_index);
                }
            }
            Node::Text(text) => {
                let child_index = nodes.len();
                nodes.push(DomNode {
                    kind: NodeKind::Text(text.to_string()),
                    children: Vec::new(),
                });
                nodes[index].children.push(child_index);
            }
            Node::Comment(comment) => {
                let child_index = nodes.len();
                nodes.push(DomNode {
                    kind: NodeKind::Comment(comment.comment.to_string()),
                    children: Vec::new(),
                });
                nodes[index].children.push(child_index);
            }
            _ => {}
        }
    }

    index
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn set_attr(attrs: &mut Vec<(String, String)>, name: &str, value: &str) {
    match attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
        Some(slot) => slot.1 = value.to_string(),
        None => attrs.push((name.to_string(), value.to_string())),
    }
}

fn remove_attr(attrs: &mut Vec<(String, String)>, name: &str) {
    attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
}

fn element_attr<'a>(state: &'a DomState, index: usize, name: &str) -> Option<&'a str> {
    match &state.nodes[index].kind {
        NodeKind::Element { attrs, .. } => attr(attrs, name),
        _ => None,
    }
}

fn is_tag(state: &DomState, index: usize, name: &str) -> bool {
    matches!(&state.nodes[index].kind, NodeKind::Element { tag, .. } if tag.eq_ignore_ascii_case(name))
}

/// 按文档顺序查找第一个满足条件的元素（数组顺序即先序遍历顺序）
fn find_element(state: &DomState, predicate: impl Fn(&str, &[(String, String)]) -> bool) -> Option<usize> {
    state.nodes.iter().position(|node| match &node.kind {
        NodeKind::Element { tag, attrs } => predicate(tag, attrs),
        _ => false,
    })
}

fn descendants(state: &DomState, index: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut stack: Vec<usize> = state.nodes[index].children.iter().rev().copied().collect();
    while let Some(current) = stack.pop() {
        out.push(current);
        stack.extend(state.nodes[current].children.iter().rev().copied());
    }
    out
}

fn text_content(state: &DomState, index: usize) -> String {
    descendants(state, index)
        .into_iter()
        .filter_map(|i| match &state.nodes[i].kind {
            NodeKind::Text(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

fn option_value(state: &DomState, index: usize) -> String {
    element_attr(state, index, "value")
        .map(str::to_string)
        .unwrap_or_else(|| text_content(state, index).trim().to_string())
}

fn is_radio(tag: &str, attrs: &[(String, String)]) -> bool {
    tag.eq_ignore_ascii_case("input")
        && attr(attrs, "type").is_some_and(|t| t.eq_ignore_ascii_case("radio"))
}

/// 单选按钮所属的组名，没有 name 的按钮同属空组
fn radio_group(attrs: &[(String, String)]) -> &str {
    attr(attrs, "name").unwrap_or_default()
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn write_node(state: &DomState, index: usize, out: &mut String) {
    let node = &state.nodes[index];
    match &node.kind {
        NodeKind::Text(text) => out.push_str(&escape_text(text)),
        NodeKind::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        NodeKind::Element { tag, attrs } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                return;
            }
            let raw_text = RAW_TEXT_ELEMENTS.iter().any(|raw| tag.eq_ignore_ascii_case(raw));
            for &child in &node.children {
                match &state.nodes[child].kind {
                    NodeKind::Text(text) if raw_text => out.push_str(text),
                    _ => write_node(state, child, out),
                }
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn checked_element(state: &DomState, handle: NodeId) -> Result<usize> {
    match state.nodes.get(handle.0) {
        Some(DomNode {
            kind: NodeKind::Element { .. },
            ..
        }) => Ok(handle.0),
        _ => bail!("无效的元素句柄: {:?}", handle),
    }
}

#[async_trait]
impl Document for MemoryDocument {
    type Handle = NodeId;

    async fn first_form_html(&self) -> Result<Option<String>> {
        let state = self.lock()?;
        Ok(find_element(&state, |tag, _| tag.eq_ignore_ascii_case("form")).map(|index| {
            let mut out = String::new();
            write_node(&state, index, &mut out);
            out
        }))
    }

    async fn element_by_id(&self, id: &str) -> Result<Option<ElementInfo<NodeId>>> {
        let state = self.lock()?;
        let Some(index) = find_element(&state, |_, attrs| attr(attrs, "id") == Some(id)) else {
            return Ok(None);
        };
        let NodeKind::Element { tag, attrs } = &state.nodes[index].kind else {
            return Ok(None);
        };

        let tag = ElementTag::from_name(tag);
        let input_type = match tag {
            ElementTag::Input => Some(
                attr(attrs, "type")
                    .map(str::to_ascii_lowercase)
                    .unwrap_or_else(|| "text".to_string()),
            ),
            _ => None,
        };

        Ok(Some(ElementInfo {
            handle: NodeId(index),
            tag,
            input_type,
            name: attr(attrs, "name").map(str::to_string),
        }))
    }

    async fn find_radio(&self, group: &str, value: &str) -> Result<Option<NodeId>> {
        let state = self.lock()?;
        Ok(find_element(&state, |tag, attrs| {
            is_radio(tag, attrs)
                && radio_group(attrs) == group
                && attr(attrs, "value") == Some(value)
        })
        .map(NodeId))
    }

    async fn set_value(&self, handle: &NodeId, value: &str) -> Result<()> {
        let mut state = self.lock()?;
        let index = checked_element(&state, *handle)?;

        if is_tag(&state, index, "textarea") {
            let text_index = state.nodes.len();
            state.nodes.push(DomNode {
                kind: NodeKind::Text(value.to_string()),
                children: Vec::new(),
            });
            state.nodes[index].children = vec![text_index];
        } else if is_tag(&state, index, "select") {
            // 没有匹配的 option 时浏览器会清空选择，这里保持一致
            for option in descendants(&state, index) {
                if !is_tag(&state, option, "option") {
                    continue;
                }
                let matched = option_value(&state, option) == value;
                if let NodeKind::Element { attrs, .. } = &mut state.nodes[option].kind {
                    if matched {
                        set_attr(attrs, "selected", "");
                    } else {
                        remove_attr(attrs, "selected");
                    }
                }
            }
        } else if let NodeKind::Element { attrs, .. } = &mut state.nodes[index].kind {
            set_attr(attrs, "value", value);
        }

        Ok(())
    }

    async fn set_checked(&self, handle: &NodeId) -> Result<()> {
        let mut state = self.lock()?;
        let index = checked_element(&state, *handle)?;

        let group = match &state.nodes[index].kind {
            NodeKind::Element { tag, attrs } if is_radio(tag, attrs) => Some(radio_group(attrs).to_string()),
            _ => None,
        };

        // 同组的其他单选按钮取消选中
        if let Some(group) = group {
            for node in state.nodes.iter_mut() {
                if let NodeKind::Element { tag, attrs } = &mut node.kind {
                    if is_radio(tag, attrs) && radio_group(attrs) == group {
                        remove_attr(attrs, "checked");
                    }
                }
            }
        }

        if let NodeKind::Element { attrs, .. } = &mut state.nodes[index].kind {
            set_attr(attrs, "checked", "");
        }
        Ok(())
    }

    async fn dispatch_event(&self, handle: &NodeId, event: DomEvent) -> Result<()> {
        let mut state = self.lock()?;
        checked_element(&state, *handle)?;
        state.events.push((*handle, event));
        Ok(())
    }
}
