//! 离线标注
//!
//! 把一份静态 HTML 交给引擎：挂载、启动、把时钟推进到稳定时刻，然后序列化被标注的文档。
//! 命令行工具和集成测试都通过这里使用引擎。

use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use markup5ever_rcdom::{Handle, NodeData};
use tracing::{debug, info};
use url::Url;

use crate::config::{constants, EngineOptions, Settings};
use crate::dom::{
    document_element, get_node_attr, html_to_dom, query_all, remove_node_attr,
    serialize_document, Selector, StaticLayout,
};
use crate::engine::stats::StatsSnapshot;
use crate::engine::tagger::ENGINE_GUARD;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::messaging::NullOutbound;

/// 标注参数
#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    /// 页面地址，决定站点配置；本地文件默认使用 `file://` 地址
    pub page_url: Option<String>,
    /// 输入编码，缺省时读取文档声明，再退回 UTF-8
    pub encoding: Option<String>,
    pub settings: Settings,
    pub options: EngineOptions,
    /// 时钟推进到的时刻
    pub settle_horizon: Duration,
}

impl Default for AnnotateOptions {
    fn default() -> Self {
        Self {
            page_url: None,
            encoding: None,
            settings: Settings::default(),
            options: EngineOptions::default(),
            settle_horizon: constants::SETTLE_HORIZON,
        }
    }
}

/// 标注结果
#[derive(Debug, Clone)]
pub struct AnnotatedDocument {
    pub html: Vec<u8>,
    pub title: Option<String>,
    pub stats: StatsSnapshot,
}

/// 标注一份 HTML 数据
pub fn annotate_document(
    input_data: &[u8],
    annotate: &AnnotateOptions,
) -> EngineResult<AnnotatedDocument> {
    let page_url = annotate
        .page_url
        .clone()
        .unwrap_or_else(|| "file:///document.html".to_string());
    Url::parse(&page_url)
        .map_err(|e| EngineError::Config(format!("invalid page url '{}': {}", page_url, e)))?;

    // 先按 UTF-8 解析一次读出声明的编码
    let mut encoding = annotate.encoding.clone().unwrap_or_else(|| "utf-8".to_string());
    let mut dom = html_to_dom(input_data, &encoding)?;
    if annotate.encoding.is_none() {
        if let Some(charset) = get_charset(&dom.document) {
            if !charset.eq_ignore_ascii_case(&encoding) {
                debug!("文档声明编码 {}", charset);
                dom = html_to_dom(input_data, &charset)?;
                encoding = charset;
            }
        }
    }

    let mut engine = Engine::attach(
        dom.document.clone(),
        &page_url,
        annotate.settings.clone(),
        annotate.options.clone(),
        Rc::new(StaticLayout::new()),
        Box::new(NullOutbound),
    )?;
    engine.start()?;
    let tasks = engine.advance_to(annotate.settle_horizon);
    let stats = engine.stats();
    info!(
        "标注完成: {} 个文本元素, {} 个输入框, 执行 {} 个任务",
        stats.counters.processed_elements, stats.counters.input_elements, tasks
    );

    // 输出保留标记，只去掉挂载标记
    if let Some(html) = document_element(engine.document()) {
        remove_node_attr(&html, ENGINE_GUARD);
    }
    let title = get_title(engine.document());
    let html = serialize_document(engine.document(), &encoding)?;
    Ok(AnnotatedDocument { html, title, stats })
}

/// 读取并标注本地文件
pub fn annotate_file(path: &Path, annotate: &AnnotateOptions) -> EngineResult<AnnotatedDocument> {
    let data = fs::read(path)
        .map_err(|e| EngineError::Internal(format!("cannot read {}: {}", path.display(), e)))?;
    let mut annotate = annotate.clone();
    if annotate.page_url.is_none() {
        annotate.page_url = fs::canonicalize(path)
            .ok()
            .and_then(|canonical| Url::from_file_path(canonical).ok())
            .map(|url| url.to_string());
    }
    annotate_document(&data, &annotate)
}

/// `<title>` 的文本
pub fn get_title(document: &Handle) -> Option<String> {
    let title = query_all(document, &[Selector::Tag("title")]).into_iter().next()?;
    let text: String = title
        .children
        .borrow()
        .iter()
        .filter_map(|child| match child.data {
            NodeData::Text { ref contents } => Some(contents.borrow().to_string()),
            _ => None,
        })
        .collect();
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// `<meta charset>` 或 `http-equiv=content-type` 声明的编码
pub fn get_charset(document: &Handle) -> Option<String> {
    for meta in query_all(document, &[Selector::Tag("meta")]) {
        if let Some(charset) = get_node_attr(&meta, "charset") {
            return Some(charset.trim().to_string());
        }
        let is_content_type = get_node_attr(&meta, "http-equiv")
            .unwrap_or_default()
            .eq_ignore_ascii_case("content-type");
        if is_content_type {
            let content = get_node_attr(&meta, "content").unwrap_or_default();
            let charset = content
                .split(';')
                .map(str::trim)
                .find_map(|part| part.strip_prefix("charset="))
                .map(|value| value.trim_matches('"').to_string());
            if charset.is_some() {
                return charset;
            }
        }
    }
    None
}

/// 输出路径模板：`%timestamp%`、`%title%`
pub fn format_output_path(path: &str, document_title: Option<&str>) -> String {
    let datetime: &str = &Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let title = document_title.unwrap_or("");

    path.replace("%timestamp%", &datetime.replace(':', "_")).replace(
        "%title%",
        title
            .replace(['/', '\\'], "_")
            .replace('<', "[")
            .replace('>', "]")
            .replace(':', " - ")
            .replace('\"', "")
            .replace('|', "-")
            .replace('?', "")
            .trim_start_matches('.'),
    )
}
