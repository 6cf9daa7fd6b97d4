//! 站点识别与站点配置
//!
//! 三个聊天站点（AI Studio、Perplexity、ChatGPT）的内容是虚拟化/流式渲染的，
//! 需要更密集的监控和专用选择器；其它站点使用通用配置。

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::dom::Selector;

/// 站点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SiteKind {
    #[serde(rename = "AI Studio")]
    AiStudio,
    Perplexity,
    #[serde(rename = "ChatGPT")]
    ChatGpt,
    #[serde(rename = "Other")]
    Generic,
}

impl SiteKind {
    /// 根据主机名识别
    pub fn detect(host: &str) -> Self {
        let host = host.to_ascii_lowercase();
        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));

        if matches("aistudio.google.com") || matches("makersuite.google.com") {
            SiteKind::AiStudio
        } else if matches("perplexity.ai") {
            SiteKind::Perplexity
        } else if matches("chatgpt.com") || matches("chat.openai.com") {
            SiteKind::ChatGpt
        } else {
            SiteKind::Generic
        }
    }

    pub fn is_chat(&self) -> bool {
        !matches!(self, SiteKind::Generic)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SiteKind::AiStudio => "AI Studio",
            SiteKind::Perplexity => "Perplexity",
            SiteKind::ChatGpt => "ChatGPT",
            SiteKind::Generic => "Other",
        }
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 从页面 URL 取主机名
pub fn host_from_url(page_url: &str) -> Option<String> {
    Url::parse(page_url)
        .ok()
        .and_then(|url| url.host_str().map(|host| host.to_ascii_lowercase()))
}

// ============================================================================
// 选择器
// ============================================================================

/// 文本变更只在这些容器内才相关
pub const CHAT_TEXT_CONTAINERS: &[Selector] = &[
    Selector::Class("conversation-container"),
    Selector::Class("chat-message"),
    Selector::Class("model-response"),
    Selector::Class("message-content"),
    Selector::Class("prose"),
    Selector::Class("answer"),
    Selector::AttrEq("data-testid", "answer"),
    Selector::AttrEq("data-cplx-component", "message-block-answer"),
    Selector::Class("max-w-threadContentWidth"),
    Selector::Class("group/query"),
    Selector::AttrEq("data-testid", "conversation-turn"),
    Selector::Attr("data-message-author-role"),
    Selector::Class("markdown"),
    Selector::AttrEq("data-testid", "markdown"),
    Selector::AttrEq("role", "main"),
    Selector::Tag("main"),
];

/// 文本变更时额外处理的最近消息祖先
pub const CHAT_MESSAGE_ANCESTORS: &[Selector] = &[
    Selector::Class("chat-message"),
    Selector::Class("model-response"),
    Selector::Class("message-content"),
    Selector::Class("prose"),
    Selector::Class("answer"),
    Selector::AttrEq("data-testid", "answer"),
];

/// 聊天站点内部的滚动容器
pub const CHAT_SCROLL_CONTAINERS: &[Selector] = &[
    Selector::Class("conversation-container"),
    Selector::Class("max-w-threadContentWidth"),
    Selector::AttrEq("data-testid", "conversation-panel"),
    Selector::Tag("main"),
    Selector::AttrEq("role", "main"),
];

/// Perplexity 的正文区域
pub const PERPLEXITY_MAIN: &[Selector] = &[
    Selector::Class("prose"),
    Selector::Class("answer"),
    Selector::AttrEq("data-testid", "answer"),
    Selector::AttrEq("data-cplx-component", "message-block-answer"),
    Selector::Class("markdown"),
    Selector::Class("markdown-content"),
    Selector::Class("group/query"),
    Selector::Class("max-w-threadContentWidth"),
];

/// Perplexity 中"倾向波斯语"规则适用的回答区域
pub const PERPLEXITY_ANSWER: &[Selector] = &[
    Selector::Class("prose"),
    Selector::Class("answer"),
    Selector::AttrEq("data-testid", "answer"),
];

/// 侧栏和导航
pub const SITE_CHROME: &[Selector] = &[
    Selector::Tag("aside"),
    Selector::AttrEq("data-testid", "sidebar"),
    Selector::ClassContains("sidebar"),
    Selector::Tag("nav"),
    Selector::Tag("header"),
    Selector::Tag("footer"),
];

const AI_STUDIO_MESSAGES: &[Selector] = &[
    Selector::Class("conversation-container"),
    Selector::Class("chat-message"),
    Selector::Class("message-content"),
    Selector::Class("model-response"),
];

const PERPLEXITY_MESSAGES: &[Selector] = &[
    Selector::Class("prose"),
    Selector::Class("answer"),
    Selector::AttrEq("data-testid", "answer"),
    Selector::AttrEq("data-cplx-component", "message-block-answer"),
    Selector::Class("max-w-threadContentWidth"),
    Selector::Class("group/query"),
];

const CHATGPT_MESSAGES: &[Selector] = &[
    Selector::AttrEq("data-testid", "conversation-turn"),
    Selector::Attr("data-message-author-role"),
    Selector::Class("markdown"),
];

const BLOCK_TEXT_TARGETS: &[Selector] = &[
    Selector::Tag("p"),
    Selector::Tag("span"),
    Selector::Tag("div"),
];

const INLINE_TEXT_TARGETS: &[Selector] = &[Selector::Tag("p"), Selector::Tag("span")];

const CHATGPT_INPUTS: &[Selector] = &[
    Selector::AttrEq("data-testid", "chat-input"),
    Selector::AttrEq("data-testid", "prompt-textarea"),
    Selector::Id("prompt-textarea"),
    Selector::All(&[
        Selector::Tag("div"),
        Selector::AttrEq("contenteditable", "true"),
        Selector::Id("prompt-textarea"),
    ]),
];

// ============================================================================
// 站点配置
// ============================================================================

/// 站点相关参数
#[derive(Debug, Clone, PartialEq)]
pub struct SiteProfile {
    pub kind: SiteKind,
    /// 站点监控周期
    pub monitor_interval: Option<Duration>,
    /// 激进复查周期
    pub aggressive_interval: Option<Duration>,
    pub input_scan_interval: Duration,
    /// 站点监控每轮复查上限
    pub recheck_limit: usize,
    /// 覆盖全页扫描冷却时间
    pub full_scan_cooldown: Option<Duration>,
    pub message_containers: &'static [Selector],
    pub special_targets: &'static [Selector],
    pub extra_inputs: &'static [Selector],
    /// 是否排除侧栏导航并要求元素位于正文区域
    pub restrict_to_main: bool,
}

impl SiteProfile {
    pub fn for_kind(kind: SiteKind) -> Self {
        match kind {
            SiteKind::AiStudio => Self {
                kind,
                monitor_interval: Some(Duration::from_millis(200)),
                aggressive_interval: Some(Duration::from_millis(2000)),
                input_scan_interval: Duration::from_millis(300),
                recheck_limit: 50,
                full_scan_cooldown: None,
                message_containers: AI_STUDIO_MESSAGES,
                special_targets: BLOCK_TEXT_TARGETS,
                extra_inputs: &[],
                restrict_to_main: false,
            },
            SiteKind::Perplexity => Self {
                kind,
                monitor_interval: Some(Duration::from_millis(300)),
                aggressive_interval: Some(Duration::from_millis(2500)),
                input_scan_interval: Duration::from_millis(450),
                recheck_limit: 60,
                full_scan_cooldown: Some(Duration::from_secs(20)),
                message_containers: PERPLEXITY_MESSAGES,
                special_targets: INLINE_TEXT_TARGETS,
                extra_inputs: &[],
                restrict_to_main: true,
            },
            SiteKind::ChatGpt => Self {
                kind,
                monitor_interval: Some(Duration::from_millis(350)),
                aggressive_interval: Some(Duration::from_millis(3000)),
                input_scan_interval: Duration::from_millis(400),
                recheck_limit: 70,
                full_scan_cooldown: None,
                message_containers: CHATGPT_MESSAGES,
                special_targets: BLOCK_TEXT_TARGETS,
                extra_inputs: CHATGPT_INPUTS,
                restrict_to_main: false,
            },
            SiteKind::Generic => Self {
                kind,
                monitor_interval: None,
                aggressive_interval: None,
                input_scan_interval: Duration::from_millis(500),
                recheck_limit: 0,
                full_scan_cooldown: None,
                message_containers: &[],
                special_targets: &[],
                extra_inputs: &[],
                restrict_to_main: false,
            },
        }
    }

    pub fn for_host(host: &str) -> Self {
        Self::for_kind(SiteKind::detect(host))
    }

    pub fn is_chat(&self) -> bool {
        self.kind.is_chat()
    }
}
