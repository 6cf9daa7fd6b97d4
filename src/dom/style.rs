//! 内联样式读写
//!
//! 只处理 `style` 属性中的 `name: value [!important]` 声明列表。更新已有属性时保持原位置，
//! 因此重复写入同样的值不会改变属性文本。

use markup5ever_rcdom::Handle;

use super::node::{get_node_attr, set_node_attr};

/// 单条样式声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// 解析 `style` 属性文本
pub fn parse_declarations(style: &str) -> Vec<Declaration> {
    style
        .split(';')
        .filter_map(|chunk| {
            let (name, value) = chunk.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            let value = value.trim();
            let (value, important) = match value.to_ascii_lowercase().rfind("!important") {
                Some(at) => (value[..at].trim_end(), true),
                None => (value, false),
            };
            Some(Declaration {
                name,
                value: value.to_string(),
                important,
            })
        })
        .collect()
}

/// 序列化声明列表
pub fn serialize_declarations(declarations: &[Declaration]) -> String {
    declarations
        .iter()
        .map(|d| {
            if d.important {
                format!("{}: {} !important;", d.name, d.value)
            } else {
                format!("{}: {};", d.name, d.value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn read(node: &Handle) -> Vec<Declaration> {
    get_node_attr(node, "style")
        .map(|style| parse_declarations(&style))
        .unwrap_or_default()
}

fn write(node: &Handle, declarations: &[Declaration]) {
    if declarations.is_empty() {
        set_node_attr(node, "style", None);
    } else {
        set_node_attr(node, "style", Some(&serialize_declarations(declarations)));
    }
}

/// 读取内联样式属性值
pub fn get_style_property(node: &Handle, name: &str) -> Option<String> {
    read(node)
        .into_iter()
        .find(|d| d.name.eq_ignore_ascii_case(name))
        .map(|d| d.value)
}

/// 设置内联样式属性
pub fn set_style_property(node: &Handle, name: &str, value: &str, important: bool) {
    let mut declarations = read(node);
    match declarations
        .iter_mut()
        .find(|d| d.name.eq_ignore_ascii_case(name))
    {
        Some(existing) => {
            if existing.value == value && existing.important == important {
                return;
            }
            existing.value = value.to_string();
            existing.important = important;
        }
        None => declarations.push(Declaration {
            name: name.to_ascii_lowercase(),
            value: value.to_string(),
            important,
        }),
    }
    write(node, &declarations);
}

/// 删除内联样式属性；最后一条被删除时整个 `style` 属性一起删除
pub fn remove_style_property(node: &Handle, name: &str) {
    let mut declarations = read(node);
    let before = declarations.len();
    declarations.retain(|d| !d.name.eq_ignore_ascii_case(name));
    if declarations.len() != before {
        write(node, &declarations);
    }
}

/// 批量删除
pub fn remove_style_properties(node: &Handle, names: &[&str]) {
    let mut declarations = read(node);
    let before = declarations.len();
    declarations.retain(|d| !names.iter().any(|n| d.name.eq_ignore_ascii_case(n)));
    if declarations.len() != before {
        write(node, &declarations);
    }
}
