//! 安全过滤
//!
//! 每次分类和每次静态标记之前都要经过这里。被拒绝的元素保持原样：
//!
//! - 结构性标签和已完整处理的元素
//! - 代码区域（代码块、高亮容器、带复制按钮的块）
//! - 输入编辑器内部（由输入处理负责）
//! - 非 `div` 的布局容器
//! - 站点侧栏导航，以及正文区域之外的元素（仅限开启此规则的站点）
//!
//! 元素已脱离文档时返回 DOM 错误，而不是拒绝。

use std::fmt;

use markup5ever_rcdom::Handle;

use super::context::PageContext;
use super::site::{PERPLEXITY_MAIN, SITE_CHROME};
use crate::dom::{
    child_elements, closest, contains_match, get_node_attr, get_node_name, has_ancestor,
    inner_text, is_attached, is_element, matches_any, Selector,
};
use crate::error::{helpers, EngineResult};

const STRUCTURAL_TAGS: &[&str] = &[
    "html", "body", "head", "script", "style", "meta", "link", "title", "base", "noscript",
];

const CODE_TAGS: &[Selector] = &[
    Selector::Tag("code"),
    Selector::Tag("pre"),
    Selector::Tag("script"),
    Selector::Tag("style"),
];

const CODE_CLASS_HINTS: &[&str] = &[
    "highlight", "language-", "hljs", "prism", "code-", "monaco", "syntax",
];

const COPY_CONTROLS: &[Selector] = &[
    Selector::All(&[Selector::Tag("button"), Selector::AttrContains("title", "copy")]),
    Selector::All(&[Selector::Tag("button"), Selector::AttrContains("aria-label", "copy")]),
    Selector::ClassContains("copy-button"),
];

/// 输入编辑器区域
pub const COMPOSER_REGIONS: &[Selector] = &[
    Selector::Tag("textarea"),
    Selector::AttrEq("contenteditable", "true"),
    Selector::AttrEq("role", "textbox"),
    Selector::Class("ql-editor"),
    Selector::Class("ProseMirror"),
    Selector::Class("lexical-editor"),
    Selector::AttrContains("data-testid", "textbox"),
    Selector::AttrContains("data-testid", "editor"),
    Selector::AttrContains("data-testid", "composer"),
];

const LAYOUT_CLASS_HINTS: &[&str] = &[
    "container", "wrapper", "layout", "main-content", "page-content", "app", "header", "footer",
    "nav", "sidebar", "toolbar", "menu",
];

const LAYOUT_ID_HINTS: &[&str] = &["root", "app", "main", "wrapper"];

const RTL_SAFE_TAGS: &[&str] = &[
    "p", "span", "h1", "h2", "h3", "h4", "h5", "h6", "li", "td", "th", "blockquote", "div",
];

const BLOCK_TAGS: &[&str] = &["div", "p", "h1", "h2", "h3", "h4", "h5", "h6"];

/// 拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotElement,
    Structural,
    AlreadyProcessed,
    CodeRegion,
    InsideComposer,
    LayoutContainer,
    SiteChrome,
    OutsideMainContent,
    EmptyText,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::NotElement => "not an element",
            Rejection::Structural => "structural element",
            Rejection::AlreadyProcessed => "already processed",
            Rejection::CodeRegion => "inside a code region",
            Rejection::InsideComposer => "inside an editable composer",
            Rejection::LayoutContainer => "layout container",
            Rejection::SiteChrome => "site navigation",
            Rejection::OutsideMainContent => "outside the main content",
            Rejection::EmptyText => "no text",
        };
        f.write_str(reason)
    }
}

/// 过滤结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// 可以处理，附带元素的可见文本
    Eligible(String),
    Rejected(Rejection),
}

/// 检查元素能否被处理
pub fn check(ctx: &PageContext, element: &Handle) -> EngineResult<Verdict> {
    let Some(tag) = get_node_name(element) else {
        return Ok(Verdict::Rejected(Rejection::NotElement));
    };
    if STRUCTURAL_TAGS.contains(&tag) {
        return Ok(Verdict::Rejected(Rejection::Structural));
    }
    if !is_attached(element) {
        return Err(helpers::detached(tag));
    }

    let text = inner_text(element);
    if ctx.processed.is_fully_processed(element, &text) {
        return Ok(Verdict::Rejected(Rejection::AlreadyProcessed));
    }
    if is_code_related(element) {
        return Ok(Verdict::Rejected(Rejection::CodeRegion));
    }
    if is_inside_composer(element) {
        return Ok(Verdict::Rejected(Rejection::InsideComposer));
    }
    if tag != "div" && is_layout_container(ctx, element)? {
        return Ok(Verdict::Rejected(Rejection::LayoutContainer));
    }
    if ctx.site.restrict_to_main {
        if closest(element, SITE_CHROME).is_some() {
            return Ok(Verdict::Rejected(Rejection::SiteChrome));
        }
        if closest(element, PERPLEXITY_MAIN).is_none() {
            return Ok(Verdict::Rejected(Rejection::OutsideMainContent));
        }
    }
    if text.is_empty() {
        return Ok(Verdict::Rejected(Rejection::EmptyText));
    }

    Ok(Verdict::Eligible(text))
}

/// 代码块、代码高亮容器或带复制按钮的块
pub fn is_code_related(element: &Handle) -> bool {
    if matches_any(element, CODE_TAGS) || has_ancestor(element, CODE_TAGS) {
        return true;
    }
    let class_name = get_node_attr(element, "class")
        .unwrap_or_default()
        .to_lowercase();
    if CODE_CLASS_HINTS.iter().any(|hint| class_name.contains(hint)) {
        return true;
    }
    contains_match(element, COPY_CONTROLS)
}

/// 自身或祖先是输入编辑器
pub fn is_inside_composer(element: &Handle) -> bool {
    closest(element, COMPOSER_REGIONS).is_some()
}

/// 代码区域、输入编辑器或站点界面框架内的元素，任何路径都不能改动它的标记和样式
pub fn is_off_limits(ctx: &PageContext, element: &Handle) -> bool {
    if is_code_related(element) || is_inside_composer(element) {
        return true;
    }
    ctx.site.restrict_to_main
        && (closest(element, SITE_CHROME).is_some() || closest(element, PERPLEXITY_MAIN).is_none())
}

/// 页面布局容器
pub fn is_layout_container(ctx: &PageContext, element: &Handle) -> EngineResult<bool> {
    if get_node_name(element) == Some("div") {
        let rect = ctx.layout.rect(element)?;
        let viewport = ctx.layout.viewport();
        if rect.width > viewport.width * 0.9 || rect.height > viewport.height * 0.7 {
            return Ok(true);
        }
        if child_elements(element).len() > 15 {
            return Ok(true);
        }
    }

    let class_name = get_node_attr(element, "class")
        .unwrap_or_default()
        .to_lowercase();
    if LAYOUT_CLASS_HINTS.iter().any(|hint| class_name.contains(hint)) {
        return Ok(true);
    }

    let id = get_node_attr(element, "id").unwrap_or_default().to_lowercase();
    Ok(LAYOUT_ID_HINTS.iter().any(|hint| id.contains(hint)))
}

/// 施加波斯语标记前的附加检查
pub fn is_safe_for_rtl(ctx: &PageContext, element: &Handle) -> EngineResult<bool> {
    let Some(tag) = get_node_name(element) else {
        return Ok(false);
    };
    if !RTL_SAFE_TAGS.contains(&tag) {
        return Ok(false);
    }

    let children = child_elements(element);
    if tag == "div" {
        let rect = ctx.layout.rect(element)?;
        let viewport = ctx.layout.viewport();
        let width = viewport.width.max(1.0);
        let height = viewport.height.max(1.0);
        if rect.width > width * 0.8 || rect.height > height * 0.6 {
            return Ok(false);
        }
    }
    if children.len() > 8 {
        return Ok(false);
    }

    let block_children = children
        .iter()
        .filter(|child| get_node_name(child).is_some_and(|name| BLOCK_TAGS.contains(&name)))
        .count();
    if block_children > 4 {
        return Ok(false);
    }

    Ok(!is_layout_container(ctx, element)?)
}

/// 可作为文本候选的元素（供扫描预先筛选）
pub fn is_candidate(element: &Handle) -> bool {
    is_element(element) && !is_code_related(element) && !is_inside_composer(element)
}
