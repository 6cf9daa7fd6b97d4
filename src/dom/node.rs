//! DOM 节点辅助函数
//!
//! 基于 `markup5ever_rcdom` 的 `Handle`。父节点指针是 `Cell<Option<Weak<Node>>>`，
//! 读取时必须取出再放回。

use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tree_builder;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

use crate::error::{EngineError, EngineResult};

/// 不参与可见文本的元素
const NON_TEXT_TAGS: &[&str] = &["script", "style", "template", "noscript", "head"];

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> EngineResult<RcDom> {
    let decoded = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => encoding.decode(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    };

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut decoded.as_bytes())
        .map_err(|e| EngineError::Parse(format!("cannot parse document: {}", e)))
}

/// 解析 UTF-8 HTML 文本
pub fn parse_html(html: &str) -> EngineResult<RcDom> {
    html_to_dom(html.as_bytes(), "utf-8")
}

/// 获取节点名称（小写）
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

pub fn is_tag(node: &Handle, tag: &str) -> bool {
    get_node_name(node).is_some_and(|name| name.eq_ignore_ascii_case(tag))
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == attr_name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

pub fn has_node_attr(node: &Handle, attr_name: &str) -> bool {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            attrs.borrow().iter().any(|attr| &*attr.name.local == attr_name)
        }
        _ => false,
    }
}

/// 设置节点属性；`None` 表示删除该属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<&str>) {
    let NodeData::Element { attrs, .. } = &node.data else {
        return;
    };
    let mut attrs = attrs.borrow_mut();
    let position = attrs.iter().position(|attr| &*attr.name.local == attr_name);

    match (position, attr_value) {
        (Some(i), Some(value)) => {
            if &*attrs[i].value != value {
                attrs[i].value = StrTendril::from_slice(value);
            }
        }
        (Some(i), None) => {
            attrs.remove(i);
        }
        (None, Some(value)) => attrs.push(Attribute {
            name: QualName::new(None, ns!(), LocalName::from(attr_name)),
            value: StrTendril::from_slice(value),
        }),
        (None, None) => {}
    }
}

pub fn remove_node_attr(node: &Handle, attr_name: &str) {
    set_node_attr(node, attr_name, None);
}

/// `class` 属性拆分后的类名
pub fn class_list(node: &Handle) -> Vec<String> {
    get_node_attr(node, "class")
        .map(|class| class.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// 获取父节点（可能是 Document 节点）
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    child.parent.set(weak);
    parent
}

/// 获取父元素，Document 节点不算元素
pub fn parent_element(node: &Handle) -> Option<Handle> {
    get_parent_node(node).filter(is_element)
}

/// 祖先元素，从近到远，不含自身
pub fn ancestors(node: &Handle) -> Vec<Handle> {
    let mut found = Vec::new();
    let mut current = parent_element(node);
    while let Some(parent) = current {
        current = parent_element(&parent);
        found.push(parent);
    }
    found
}

/// 节点是否仍挂在某个文档上
pub fn is_attached(node: &Handle) -> bool {
    let mut current = node.clone();
    loop {
        if matches!(current.data, NodeData::Document) {
            return true;
        }
        match get_parent_node(&current) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// 直接子元素
pub fn child_elements(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|child| is_element(child))
        .cloned()
        .collect()
}

pub fn child_element_count(node: &Handle) -> usize {
    node.children.borrow().iter().filter(|c| is_element(c)).count()
}

/// 所有后代元素，按文档顺序，不含自身
pub fn descendants(node: &Handle) -> Vec<Handle> {
    let mut found = Vec::new();
    collect_descendants(node, &mut found);
    found
}

fn collect_descendants(node: &Handle, found: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if is_element(child) {
            found.push(child.clone());
        }
        collect_descendants(child, found);
    }
}

/// 可见文本（近似 innerText），首尾空白已去除
pub fn inner_text(node: &Handle) -> String {
    let mut text = String::new();
    collect_text(node, &mut text);
    text.trim().to_string()
}

fn collect_text(node: &Handle, text: &mut String) {
    match &node.data {
        NodeData::Text { contents } => text.push_str(&contents.borrow()),
        NodeData::Element { name, .. } => {
            let tag = name.local.as_ref();
            if NON_TEXT_TAGS.contains(&tag) {
                return;
            }
            if tag == "br" {
                text.push('\n');
                return;
            }
            for child in node.children.borrow().iter() {
                collect_text(child, text);
            }
        }
        NodeData::Document => {
            for child in node.children.borrow().iter() {
                collect_text(child, text);
            }
        }
        _ => {}
    }
}

/// 创建游离元素
pub fn create_element(tag: &str, attrs: &[(&str, &str)]) -> Handle {
    let sink = RcDom::default();
    tree_builder::create_element(
        &sink,
        QualName::new(None, ns!(html), LocalName::from(tag)),
        attrs
            .iter()
            .map(|(name, value)| Attribute {
                name: QualName::new(None, ns!(), LocalName::from(*name)),
                value: StrTendril::from_slice(value),
            })
            .collect(),
    )
}

/// 创建文本节点
pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: std::cell::RefCell::new(StrTendril::from_slice(text)),
    })
}

/// 从原父节点移除
pub fn detach(node: &Handle) {
    if let Some(parent) = get_parent_node(node) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    node.parent.set(None);
}

/// 追加子节点（先从原位置移除）
pub fn append_child(parent: &Handle, child: &Handle) {
    detach(child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

/// 用单个文本节点替换全部子节点
pub fn set_text_content(node: &Handle, text: &str) {
    let old: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
    for child in old {
        child.parent.set(None);
    }
    append_child(node, &create_text(text));
}

/// 首个文本子节点，用于模拟字符数据变更
pub fn first_text_child(node: &Handle) -> Option<Handle> {
    node.children
        .borrow()
        .iter()
        .find(|child| matches!(child.data, NodeData::Text { .. }))
        .cloned()
}

/// 就地修改文本节点内容
pub fn set_text_data(text_node: &Handle, text: &str) {
    if let NodeData::Text { contents } = &text_node.data {
        *contents.borrow_mut() = StrTendril::from_slice(text);
    }
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    parent
        .children
        .borrow()
        .iter()
        .find(|child| is_tag(child, node_name))
        .cloned()
}

/// 文档的 `<html>` 元素
pub fn document_element(document: &Handle) -> Option<Handle> {
    get_child_node_by_name(document, "html")
}

pub fn head_element(document: &Handle) -> Option<Handle> {
    document_element(document).and_then(|html| get_child_node_by_name(&html, "head"))
}

pub fn body_element(document: &Handle) -> Option<Handle> {
    document_element(document).and_then(|html| get_child_node_by_name(&html, "body"))
}

/// 按 id 查找元素
pub fn find_by_id(root: &Handle, id: &str) -> Option<Handle> {
    descendants(root)
        .into_iter()
        .find(|node| get_node_attr(node, "id").as_deref() == Some(id))
}
