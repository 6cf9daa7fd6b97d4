//! 对话导出
//!
//! 按站点结构收集对话消息，生成一个独立的 HTML 文档，每条消息按语言带 `rtl`/`ltr` 类，
//! 可直接交给宿主打印成 PDF。没有识别出对话结构时退回到已标记的文本元素。

use std::collections::HashSet;
use std::fmt::Write as _;

use chrono::{SecondsFormat, Utc};
use markup5ever_rcdom::Handle;
use serde::Serialize;
use tracing::debug;

use crate::config::Sensitivity;
use crate::detection::{classify, Language};
use crate::dom::{
    ancestors, body_element, closest, detach, get_node_attr, inner_html, inner_text, matches_any,
    parse_html, query_all, NodeKey, Selector,
};
use crate::engine::context::PageContext;
use crate::engine::site::{SiteKind, SITE_CHROME};
use crate::engine::tagger::{ENGLISH_MARKER, PERSIAN_MARKER};
use crate::error::EngineResult;

// ============================================================================
// 站点结构
// ============================================================================

const AI_STUDIO_USER: &[Selector] = &[Selector::Class("user-prompt-container")];
const AI_STUDIO_MODEL: &[Selector] = &[Selector::Class("model-response")];
const AI_STUDIO_TURN: &[Selector] = &[Selector::Class("chat-turn-container")];

const PERPLEXITY_USER: &[Selector] = &[Selector::Class("group/query")];
const PERPLEXITY_ANSWER: &[Selector] = &[Selector::Class("prose")];

const CHATGPT_TURN: &[Selector] = &[Selector::Attr("data-message-author-role")];
const CHATGPT_CONTENT: &[Selector] = &[
    Selector::Class("markdown"),
    Selector::Class("prose"),
    Selector::AttrEq("data-testid", "markdown"),
];

const TAGGED: &[Selector] = &[Selector::Attr(PERSIAN_MARKER), Selector::Attr(ENGLISH_MARKER)];

const PAGE_CSS: &str = "@page { size: A4 portrait; margin: 15mm; }
* { -webkit-print-color-adjust: exact !important; print-color-adjust: exact !important; }
h1 { font-size: 18px; margin: 0 0 12px; }
.msg { break-inside: avoid; margin: 10px 0 14px; padding: 10px 12px; border-radius: 8px; border: 1px solid #e9ecef; background: #fff; }
.msg.user { background: #eef7ff; border-color: #cfe8ff; }
.msg.assistant { background: #fffdf2; border-color: #f7ecb5; }
.meta { font-size: 11px; color: #6c757d; margin-bottom: 6px; }
.content { white-space: pre-wrap; word-wrap: break-word; }
.rtl { direction: rtl; text-align: right; unicode-bidi: isolate; }
.ltr { direction: ltr; text-align: left; unicode-bidi: isolate; }
code, pre { direction: ltr !important; text-align: left !important; font-family: Consolas, Monaco, 'Courier New', monospace !important; }
";

/// 消息作者
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
        }
    }

    fn class(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// 一条导出的消息
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportMessage {
    pub role: Role,
    pub language: Language,
    pub html: String,
}

impl ExportMessage {
    /// 未知语言按从右到左排版
    pub fn direction_class(&self) -> &'static str {
        match self.language {
            Language::English => "ltr",
            Language::Persian | Language::Unknown => "rtl",
        }
    }
}

/// 导出结果
#[derive(Debug, Clone)]
pub struct ExportDocument {
    pub html: String,
    pub messages: usize,
}

// ============================================================================
// 收集
// ============================================================================

/// 按站点收集对话消息，没有结构时退回已标记的元素
pub fn collect_messages(ctx: &PageContext) -> EngineResult<Vec<ExportMessage>> {
    let root = ctx.root();
    let sensitivity = ctx.settings.detection_sensitivity;
    let blocks = match ctx.site.kind {
        SiteKind::AiStudio => ai_studio_blocks(&root),
        SiteKind::Perplexity => perplexity_blocks(&root),
        SiteKind::ChatGpt => chatgpt_blocks(&root),
        SiteKind::Generic => Vec::new(),
    };
    let blocks = if blocks.is_empty() {
        outermost(query_all(&root, TAGGED))
            .into_iter()
            .map(|element| (Role::Assistant, element))
            .collect()
    } else {
        blocks
    };

    let mut messages = Vec::new();
    for (role, content) in blocks {
        if let Some(message) = to_message(role, &content, sensitivity)? {
            messages.push(message);
        }
    }
    debug!("导出收集到 {} 条消息", messages.len());
    Ok(messages)
}

fn ai_studio_blocks(root: &Handle) -> Vec<(Role, Handle)> {
    let mut blocks = Vec::new();
    for turn in query_all(root, &[Selector::Any(AI_STUDIO_TURN), Selector::Any(AI_STUDIO_USER), Selector::Any(AI_STUDIO_MODEL)]) {
        if matches_any(&turn, AI_STUDIO_USER) {
            blocks.push((Role::User, turn));
        } else if matches_any(&turn, AI_STUDIO_MODEL) {
            blocks.push((Role::Assistant, turn));
        } else if query_all(&turn, AI_STUDIO_USER).is_empty()
            && query_all(&turn, AI_STUDIO_MODEL).is_empty()
        {
            // 没有内层结构的轮次按类名判断作者
            let class_name = get_node_attr(&turn, "class").unwrap_or_default().to_lowercase();
            let is_user = ["user", "sent"].iter().any(|hint| class_name.contains(hint))
                || !query_all(&turn, &[Selector::AttrEq("data-author", "user")]).is_empty();
            let role = if is_user { Role::User } else { Role::Assistant };
            blocks.push((role, turn));
        }
    }
    blocks
}

fn perplexity_blocks(root: &Handle) -> Vec<(Role, Handle)> {
    let candidates = query_all(
        root,
        &[Selector::Any(PERPLEXITY_USER), Selector::Any(PERPLEXITY_ANSWER)],
    );
    outermost(candidates)
        .into_iter()
        .filter(|block| closest(block, SITE_CHROME).is_none())
        .map(|block| {
            let role = if matches_any(&block, PERPLEXITY_USER) {
                Role::User
            } else {
                Role::Assistant
            };
            (role, block)
        })
        .collect()
}

fn chatgpt_blocks(root: &Handle) -> Vec<(Role, Handle)> {
    outermost(query_all(root, CHATGPT_TURN))
        .into_iter()
        .map(|turn| {
            let role = match get_node_attr(&turn, "data-message-author-role").as_deref() {
                Some("user") => Role::User,
                _ => Role::Assistant,
            };
            let content = query_all(&turn, CHATGPT_CONTENT)
                .into_iter()
                .next()
                .unwrap_or(turn);
            (role, content)
        })
        .collect()
}

/// 只保留没有被其它候选包含的元素，保持文档顺序
fn outermost(elements: Vec<Handle>) -> Vec<Handle> {
    let mut kept: HashSet<NodeKey> = HashSet::new();
    let mut result = Vec::new();
    for element in elements {
        if ancestors(&element)
            .iter()
            .any(|ancestor| kept.contains(&NodeKey::of(ancestor)))
        {
            continue;
        }
        kept.insert(NodeKey::of(&element));
        result.push(element);
    }
    result
}

fn to_message(
    role: Role,
    content: &Handle,
    sensitivity: Sensitivity,
) -> EngineResult<Option<ExportMessage>> {
    let text = inner_text(content);
    if text.is_empty() {
        return Ok(None);
    }
    let html = strip_scripts(&inner_html(content)?)?;
    Ok(Some(ExportMessage {
        role,
        language: classify(&text, sensitivity),
        html,
    }))
}

/// 在重新解析出的副本上删除脚本节点，页面本身不受影响
fn strip_scripts(html: &str) -> EngineResult<String> {
    // 显式的 body 让开头的 style 之类留在正文里
    let copy = parse_html(&format!("<body>{html}"))?;
    let Some(body) = body_element(&copy.document) else {
        return Ok(String::new());
    };
    for script in query_all(&body, &[Selector::Tag("script")]) {
        detach(&script);
    }
    inner_html(&body)
}

// ============================================================================
// 文档
// ============================================================================

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// 生成导出文档
pub fn build_document(
    messages: &[ExportMessage],
    font_family: Option<&str>,
    font_css: &str,
    page_url: &str,
) -> String {
    let datetime = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut items = String::new();
    for message in messages {
        let _ = write!(
            items,
            "<div class=\"msg {} {}\">\n<div class=\"meta\">{}</div>\n<div class=\"content\">{}</div>\n</div>\n",
            message.role.class(),
            message.direction_class(),
            escape_html(message.role.label()),
            message.html
        );
    }

    format!(
        "<!doctype html>\n<html lang=\"fa\" dir=\"rtl\">\n<head>\n<meta charset=\"utf-8\">\n\
         <!-- Exported from {} at {} using {} v{} -->\n<title>Chat Export</title>\n\
         <style>\n{}</style>\n<style>\n{}body {{ font-family: {}; line-height: 1.7; }}\n</style>\n\
         </head>\n<body>\n<h1>Chat Export</h1>\n{}</body>\n</html>\n",
        escape_html(page_url),
        datetime,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        font_css,
        PAGE_CSS,
        font_family.unwrap_or("Tahoma, Arial, sans-serif"),
        items
    )
}

/// 收集并生成导出文档
pub fn export(ctx: &PageContext) -> EngineResult<ExportDocument> {
    let messages = collect_messages(ctx)?;
    let font_css = crate::engine::stylesheet::build_css(ctx.style_profile(), &ctx.options.font_base_url);
    let html = build_document(
        &messages,
        ctx.style_profile().font_family,
        &font_css,
        &ctx.page_url,
    );
    Ok(ExportDocument {
        html,
        messages: messages.len(),
    })
}
