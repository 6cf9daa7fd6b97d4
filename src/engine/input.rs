//! 输入框方向
//!
//! 输入框和可编辑区域随用户输入实时切换方向，不经过静态标记流程，也不读写任何缓存。
//!
//! - 每个输入框只注册一次（`data-rtl-handled-ai-studio`），注册时立即评估
//! - 宿主转发的输入事件触发重新评估；粘贴延迟 10ms
//! - 外层编辑器包装同步方向样式，并去掉静态文本标记

use std::collections::HashSet;
use std::fmt;

use markup5ever_rcdom::Handle;
use tracing::{debug, trace};

use super::context::PageContext;
use super::safety;
use super::site::SiteKind;
use super::tagger::{
    self, Direction, ENGLISH_INPUT_MARKER, ENGLISH_MARKER, INPUT_HANDLED, PERSIAN_INPUT_MARKER,
    PERSIAN_MARKER, WRAPPER_MARK,
};
use crate::config::{constants, Sensitivity};
use crate::detection::{classify, has_english, has_persian, Language};
use crate::dom::{
    closest, get_node_attr, get_node_name, has_node_attr, inner_text, is_attached, is_tag,
    matches_any, parent_element, query_all, remove_node_attr, set_node_attr, set_style_property,
    NodeKey, Selector, WeakNodeSet,
};
use crate::error::{helpers, EngineResult};

// ============================================================================
// 选择器
// ============================================================================

const INPUT_TARGETS: &[Selector] = &[
    Selector::Tag("textarea"),
    Selector::Tag("input"),
    Selector::AttrEq("contenteditable", "true"),
    Selector::AttrEq("role", "textbox"),
    Selector::Class("ql-editor"),
    Selector::Class("ProseMirror"),
    Selector::Class("lexical-editor"),
];

/// 真正接收输入的元素
const EDITABLE_LEAVES: &[Selector] = &[
    Selector::Tag("textarea"),
    Selector::Tag("input"),
    Selector::AttrEq("contenteditable", "true"),
    Selector::AttrEq("role", "textbox"),
];

const TEXT_INPUT_TYPES: &[&str] = &["text", "search", "email", "url", "tel"];

const RICH_EDITORS: &[Selector] = &[
    Selector::Class("ql-editor"),
    Selector::Class("ProseMirror"),
    Selector::Class("lexical-editor"),
];

const COMPOSER_CONTAINERS: &[Selector] = &[
    Selector::AttrContains("data-testid", "composer"),
    Selector::ClassContains("composer"),
    Selector::ClassContains("query-box"),
    Selector::AttrContains("data-cplx-component", "query-box"),
    Selector::AttrContains("data-testid", "query"),
];

pub const CHATGPT_INPUT_PARENTS: &[Selector] = &[
    Selector::ClassContains("composer"),
    Selector::ClassContains("textarea"),
    Selector::ClassContains("input"),
];

/// 输入框事件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEventKind {
    Input,
    KeyUp,
    KeyDown,
    Paste,
    Focus,
    Blur,
    Change,
    CompositionStart,
    CompositionUpdate,
    CompositionEnd,
}

impl InputEventKind {
    /// 按 DOM 事件名解析
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "input" => InputEventKind::Input,
            "keyup" => InputEventKind::KeyUp,
            "keydown" => InputEventKind::KeyDown,
            "paste" => InputEventKind::Paste,
            "focus" => InputEventKind::Focus,
            "blur" => InputEventKind::Blur,
            "change" => InputEventKind::Change,
            "compositionstart" => InputEventKind::CompositionStart,
            "compositionupdate" => InputEventKind::CompositionUpdate,
            "compositionend" => InputEventKind::CompositionEnd,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            InputEventKind::Input => "input",
            InputEventKind::KeyUp => "keyup",
            InputEventKind::KeyDown => "keydown",
            InputEventKind::Paste => "paste",
            InputEventKind::Focus => "focus",
            InputEventKind::Blur => "blur",
            InputEventKind::Change => "change",
            InputEventKind::CompositionStart => "compositionstart",
            InputEventKind::CompositionUpdate => "compositionupdate",
            InputEventKind::CompositionEnd => "compositionend",
        }
    }
}

impl fmt::Display for InputEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 事件处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Evaluated(Language),
    /// 粘贴，等待延迟评估
    PasteQueued,
    Ignored,
}

/// 输入框处理器
#[derive(Default)]
pub struct InputDirector {
    pending_pastes: WeakNodeSet,
}

impl InputDirector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.pending_pastes.clear();
    }

    pub fn has_pending_pastes(&self) -> bool {
        !self.pending_pastes.is_empty()
    }

    /// 扫描 `root` 下的输入框并注册新出现的；返回新注册数量
    pub fn scan(&mut self, ctx: &mut PageContext, root: &Handle) -> usize {
        if !ctx.is_active() {
            return 0;
        }
        let mut seen = HashSet::new();
        let mut leaves = Vec::new();
        let mut matched = query_all(root, INPUT_TARGETS);
        matched.extend(query_all(root, ctx.site.extra_inputs));
        if matches_any(root, INPUT_TARGETS) {
            matched.insert(0, root.clone());
        }
        for element in matched {
            let leaf = find_editable_leaf(&element);
            if seen.insert(NodeKey::of(&leaf)) {
                leaves.push(leaf);
            }
        }

        let mut registered = 0;
        for leaf in leaves {
            match self.register(ctx, &leaf) {
                Ok(true) => registered += 1,
                Ok(false) => {}
                Err(e) => ctx.record_error(&e),
            }
        }
        if registered > 0 {
            debug!("注册 {} 个输入框", registered);
        }
        registered
    }

    /// 注册并立即评估；已注册或不适合时返回 false
    pub fn register(&mut self, ctx: &mut PageContext, input: &Handle) -> EngineResult<bool> {
        if has_node_attr(input, INPUT_HANDLED) || !is_eligible(input) {
            return Ok(false);
        }
        if !is_attached(input) {
            return Err(helpers::detached("input"));
        }
        set_node_attr(input, INPUT_HANDLED, Some("true"));
        ctx.stats.input_elements += 1;
        evaluate(ctx, input)?;
        Ok(true)
    }

    /// 宿主转发的输入事件
    pub fn handle_event(
        &mut self,
        ctx: &mut PageContext,
        target: &Handle,
        kind: InputEventKind,
    ) -> EngineResult<InputAction> {
        if !ctx.is_active() {
            return Ok(InputAction::Ignored);
        }
        let input = find_editable_leaf(target);
        if !has_node_attr(&input, INPUT_HANDLED) {
            let is_input = matches_any(&input, INPUT_TARGETS)
                || matches_any(&input, ctx.site.extra_inputs);
            // 尚未被扫描发现的输入框在第一次事件时注册
            if !is_input || !self.register(ctx, &input)? {
                return Ok(InputAction::Ignored);
            }
        }
        if kind == InputEventKind::Paste {
            self.pending_pastes.insert(&input);
            return Ok(InputAction::PasteQueued);
        }
        trace!("输入事件 {}", kind);
        evaluate(ctx, &input).map(InputAction::Evaluated)
    }

    /// 粘贴延迟到期，评估排队的输入框
    pub fn flush_pastes(&mut self, ctx: &mut PageContext) -> usize {
        let pending = self.pending_pastes.nodes();
        self.pending_pastes.clear();
        let mut evaluated = 0;
        for input in pending {
            match evaluate(ctx, &input) {
                Ok(_) => evaluated += 1,
                Err(e) => ctx.record_error(&e),
            }
        }
        evaluated
    }
}

/// 输入框的快速规则：有波斯字符且（没有英文字母或分类器无法判断）即为波斯语
pub fn input_language(text: &str, sensitivity: Sensitivity) -> Language {
    let classified = classify(text, sensitivity);
    if has_persian(text) && (!has_english(text) || classified == Language::Unknown) {
        Language::Persian
    } else {
        classified
    }
}

/// 文本输入类的元素，且不在代码区域内
fn is_eligible(element: &Handle) -> bool {
    let Some(tag) = get_node_name(element) else {
        return false;
    };
    if tag == "input" {
        let kind = get_node_attr(element, "type")
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !kind.is_empty() && !TEXT_INPUT_TYPES.contains(&kind.as_str()) {
            return false;
        }
    }
    !safety::is_code_related(element)
}

/// 包装元素对应的实际可编辑元素
pub fn find_editable_leaf(element: &Handle) -> Handle {
    if matches_any(element, EDITABLE_LEAVES) {
        return element.clone();
    }
    query_all(element, EDITABLE_LEAVES)
        .into_iter()
        .next()
        .unwrap_or_else(|| element.clone())
}

/// 原生输入框读 `value` 属性，其它元素读可见文本
pub fn live_value(input: &Handle) -> String {
    if is_tag(input, "input") {
        get_node_attr(input, "value")
            .unwrap_or_default()
            .trim()
            .to_string()
    } else {
        inner_text(input)
    }
}

/// 重新读取内容并设置方向
pub fn evaluate(ctx: &mut PageContext, input: &Handle) -> EngineResult<Language> {
    if !is_attached(input) {
        return Err(helpers::detached("input"));
    }
    let text = live_value(input);
    let persian = has_persian(&text);
    let language = input_language(&text, ctx.settings.detection_sensitivity);
    let profile = ctx.style_profile();

    let direction = match language {
        Language::Persian => {
            set_node_attr(input, PERSIAN_INPUT_MARKER, Some("true"));
            remove_node_attr(input, ENGLISH_INPUT_MARKER);
            tagger::set_direction_styles(input, Direction::Rtl, profile, true);
            Direction::Rtl
        }
        Language::English => {
            set_node_attr(input, ENGLISH_INPUT_MARKER, Some("true"));
            remove_node_attr(input, PERSIAN_INPUT_MARKER);
            tagger::set_direction_styles(input, Direction::Ltr, profile, false);
            Direction::Ltr
        }
        Language::Unknown => {
            remove_node_attr(input, PERSIAN_INPUT_MARKER);
            remove_node_attr(input, ENGLISH_INPUT_MARKER);
            let direction = if persian { Direction::Rtl } else { Direction::Ltr };
            tagger::set_direction_styles(input, direction, profile, false);
            direction
        }
    };

    if ctx.site.kind == SiteKind::ChatGpt {
        apply_chatgpt_fixes(input, direction);
    }
    for wrapper in composer_wrappers(input) {
        style_wrapper(&wrapper, language, direction, ctx);
    }
    Ok(language)
}

/// 输入框外层的编辑器包装：最近的文本框、富文本编辑器根、可编辑区域、输入区容器，
/// 再加第一个包装的父级和祖父级
pub fn composer_wrappers(input: &Handle) -> Vec<Handle> {
    let mut wrappers: Vec<Handle> = Vec::new();
    let mut seen = HashSet::new();
    seen.insert(NodeKey::of(input));
    let mut push = |node: Option<Handle>, wrappers: &mut Vec<Handle>| {
        if let Some(node) = node {
            if !is_tag(&node, "body") && !is_tag(&node, "html") && seen.insert(NodeKey::of(&node)) {
                wrappers.push(node);
            }
        }
    };

    let Some(start) = parent_element(input) else {
        return wrappers;
    };
    push(closest(&start, &[Selector::AttrEq("role", "textbox")]), &mut wrappers);
    push(closest(&start, RICH_EDITORS), &mut wrappers);
    push(
        closest(&start, &[Selector::AttrEq("contenteditable", "true")]),
        &mut wrappers,
    );
    push(closest(&start, COMPOSER_CONTAINERS), &mut wrappers);

    if let Some(first) = wrappers.first().cloned() {
        let mut layer = first;
        for _ in 0..constants::WRAPPER_LAYERS {
            match parent_element(&layer) {
                Some(parent) => {
                    push(Some(parent.clone()), &mut wrappers);
                    layer = parent;
                }
                None => break,
            }
        }
    }
    wrappers
}

fn style_wrapper(wrapper: &Handle, language: Language, direction: Direction, ctx: &PageContext) {
    remove_node_attr(wrapper, PERSIAN_MARKER);
    remove_node_attr(wrapper, ENGLISH_MARKER);
    set_node_attr(wrapper, WRAPPER_MARK, Some("true"));
    match language {
        Language::Persian => {
            tagger::set_direction_styles(wrapper, direction, ctx.style_profile(), true)
        }
        Language::English => {
            tagger::set_direction_styles(wrapper, direction, ctx.style_profile(), false)
        }
        Language::Unknown => {
            set_style_property(wrapper, "direction", direction.as_str(), true);
            set_style_property(wrapper, "text-align", direction.text_align(), true);
            set_style_property(wrapper, "unicode-bidi", "isolate", true);
        }
    }
}

/// ChatGPT 的输入框需要 `dir` 属性，可编辑区域还要固定横排
fn apply_chatgpt_fixes(input: &Handle, direction: Direction) {
    set_node_attr(input, "dir", Some(direction.as_str()));
    if let Some(parent) = parent_element(input).and_then(|p| closest(&p, CHATGPT_INPUT_PARENTS)) {
        set_style_property(&parent, "direction", direction.as_str(), true);
    }
    if get_node_attr(input, "contenteditable").as_deref() == Some("true") {
        set_style_property(input, "writing-mode", "horizontal-tb", true);
    }
}
