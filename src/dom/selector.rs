//! 类型化选择器
//!
//! 引擎用到的选择器都是固定的，用一个小的枚举表达即可，不需要通用 CSS 选择器引擎。
//! `AttrContains`/`ClassContains` 对应 `[attr*=value i]`，大小写不敏感。

use markup5ever_rcdom::Handle;

use super::node::{ancestors, class_list, descendants, get_node_attr, get_node_name, is_element};

/// 单个简单选择器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// 标签名
    Tag(&'static str),
    /// 完整类名（`.name`）
    Class(&'static str),
    /// `class` 属性包含子串（`[class*=x i]`）
    ClassContains(&'static str),
    /// `#id`
    Id(&'static str),
    /// `id` 属性包含子串
    IdContains(&'static str),
    /// `[attr]`
    Attr(&'static str),
    /// `[attr=value]`
    AttrEq(&'static str, &'static str),
    /// `[attr*=value i]`
    AttrContains(&'static str, &'static str),
    /// 复合选择器，全部满足
    All(&'static [Selector]),
    /// 满足任意一个
    Any(&'static [Selector]),
}

impl Selector {
    /// 元素是否匹配
    pub fn matches(&self, node: &Handle) -> bool {
        if !is_element(node) {
            return false;
        }
        match self {
            Selector::Tag(tag) => get_node_name(node).is_some_and(|n| n.eq_ignore_ascii_case(tag)),
            Selector::Class(class) => class_list(node).iter().any(|c| c == class),
            Selector::ClassContains(part) => attr_contains(node, "class", part),
            Selector::Id(id) => get_node_attr(node, "id").as_deref() == Some(*id),
            Selector::IdContains(part) => attr_contains(node, "id", part),
            Selector::Attr(name) => get_node_attr(node, name).is_some(),
            Selector::AttrEq(name, value) => get_node_attr(node, name).as_deref() == Some(*value),
            Selector::AttrContains(name, part) => attr_contains(node, name, part),
            Selector::All(parts) => parts.iter().all(|s| s.matches(node)),
            Selector::Any(parts) => parts.iter().any(|s| s.matches(node)),
        }
    }
}

fn attr_contains(node: &Handle, name: &str, part: &str) -> bool {
    get_node_attr(node, name)
        .is_some_and(|value| value.to_lowercase().contains(&part.to_lowercase()))
}

/// 匹配列表中任意一个选择器
pub fn matches_any(node: &Handle, selectors: &[Selector]) -> bool {
    selectors.iter().any(|s| s.matches(node))
}

/// 最近的匹配元素，包含自身（同 DOM `closest`）
pub fn closest(node: &Handle, selectors: &[Selector]) -> Option<Handle> {
    if matches_any(node, selectors) {
        return Some(node.clone());
    }
    ancestors(node)
        .into_iter()
        .find(|ancestor| matches_any(ancestor, selectors))
}

/// 某个祖先（不含自身）匹配
pub fn has_ancestor(node: &Handle, selectors: &[Selector]) -> bool {
    ancestors(node)
        .iter()
        .any(|ancestor| matches_any(ancestor, selectors))
}

/// 所有匹配的后代元素，按文档顺序，不含根（同 `querySelectorAll`）
pub fn query_all(root: &Handle, selectors: &[Selector]) -> Vec<Handle> {
    descendants(root)
        .into_iter()
        .filter(|node| matches_any(node, selectors))
        .collect()
}

/// 是否存在匹配的后代
pub fn contains_match(root: &Handle, selectors: &[Selector]) -> bool {
    descendants(root).iter().any(|node| matches_any(node, selectors))
}

/// 承载文本的常见标签
pub const TEXT_BEARING: &[Selector] = &[
    Selector::Tag("p"),
    Selector::Tag("span"),
    Selector::Tag("h1"),
    Selector::Tag("h2"),
    Selector::Tag("h3"),
    Selector::Tag("h4"),
    Selector::Tag("h5"),
    Selector::Tag("h6"),
    Selector::Tag("li"),
    Selector::Tag("td"),
    Selector::Tag("th"),
    Selector::Tag("div"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::{find_by_id, parse_html};

    const COPY_BUTTON: Selector = Selector::All(&[
        Selector::Tag("button"),
        Selector::AttrContains("aria-label", "copy"),
    ]);

    #[test]
    fn test_simple_selectors() {
        let dom = parse_html(
            r#"<div id="app-root" class="Chat-Message hljs" data-testid="Composer-Box" role="textbox">x</div>"#,
        )
        .unwrap();
        let div = find_by_id(&dom.document, "app-root").unwrap();

        assert!(Selector::Tag("DIV").matches(&div));
        assert!(Selector::Class("hljs").matches(&div));
        assert!(!Selector::Class("chat").matches(&div));
        assert!(Selector::ClassContains("chat-message").matches(&div));
        assert!(Selector::IdContains("root").matches(&div));
        assert!(Selector::AttrEq("role", "textbox").matches(&div));
        assert!(Selector::AttrContains("data-testid", "composer").matches(&div));
        assert!(!Selector::Attr("contenteditable").matches(&div));
    }

    #[test]
    fn test_closest_and_query() {
        let dom = parse_html(
            r#"<pre><code id="c"><span id="s">x</span></code></pre>
               <div id="d"><button aria-label="Copy code">c</button></div>"#,
        )
        .unwrap();
        let span = find_by_id(&dom.document, "s").unwrap();
        let code = closest(&span, &[Selector::Tag("code")]).unwrap();
        assert_eq!(get_node_attr(&code, "id").as_deref(), Some("c"));
        assert!(closest(&span, &[Selector::Tag("span")]).is_some(), "closest 包含自身");
        assert!(has_ancestor(&span, &[Selector::Tag("pre")]));

        let div = find_by_id(&dom.document, "d").unwrap();
        assert!(contains_match(&div, &[COPY_BUTTON]));
        assert_eq!(query_all(&dom.document, &[Selector::Tag("button")]).len(), 1);
    }
}
