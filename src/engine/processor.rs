//! 单个元素的处理流程
//!
//! 安全过滤 -> 签名缓存 -> 分类 -> 标记。所有扫描路径最终都调用 `process_element`，
//! 批处理时逐元素捕获错误，一个元素失败不影响其它元素。

use markup5ever_rcdom::Handle;
use tracing::{debug, trace};

use super::context::PageContext;
use super::safety::{self, Rejection, Verdict};
use super::site::{SiteKind, PERPLEXITY_ANSWER};
use super::tagger;
use crate::detection::{element_signature, has_persian, Language};
use crate::dom::{closest, get_node_name};
use crate::error::EngineResult;

const PERPLEXITY_OVERRIDE_TAGS: &[&str] = &["p", "span", "div", "li", "h1", "h2", "h3"];

/// 处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 新分类并标记
    Tagged(Language),
    /// 从签名缓存恢复标记
    Restored(Language),
    /// 签名缓存命中且标记仍在
    Cached,
    /// 分类为未知，标记已清除
    Cleared,
    /// 波斯语但未通过 RTL 检查，保持原样
    Deferred,
    Rejected(Rejection),
    /// 引擎在当前站点未启用
    Inactive,
}

impl Outcome {
    /// 本次调用是否在元素上留下了语言标记
    pub fn is_tagged(&self) -> bool {
        matches!(self, Outcome::Tagged(_) | Outcome::Restored(_))
    }
}

/// 批处理汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub visited: usize,
    pub tagged: usize,
    pub restored: usize,
    pub errors: usize,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.visited += other.visited;
        self.tagged += other.tagged;
        self.restored += other.restored;
        self.errors += other.errors;
    }

    /// 新标记与恢复之和
    pub fn changed(&self) -> usize {
        self.tagged + self.restored
    }
}

/// 处理单个元素
pub fn process_element(ctx: &mut PageContext, element: &Handle) -> EngineResult<Outcome> {
    if !ctx.is_active() {
        return Ok(Outcome::Inactive);
    }

    let text = match safety::check(ctx, element)? {
        Verdict::Eligible(text) => text,
        Verdict::Rejected(rejection) => {
            trace!("跳过元素: {}", rejection);
            return Ok(Outcome::Rejected(rejection));
        }
    };

    let signature = element_signature(element, &text);
    if let Some(cached) = signature.as_deref().and_then(|sig| ctx.signatures.get(sig)) {
        let language = cached.language;
        if tagger::has_marker(element) {
            return Ok(Outcome::Cached);
        }
        tagger::apply(element, language, ctx.style_profile());
        ctx.processed.record(element, language, &text);
        ctx.stats.processed_elements += 1;
        ctx.stats.restored_from_cache += 1;
        return Ok(Outcome::Restored(language));
    }

    let mut language = ctx
        .languages
        .classify(&text, ctx.settings.detection_sensitivity);
    if prefers_persian(ctx, element, &text) {
        language = Language::Persian;
    }

    match language {
        Language::Persian => {
            if !safety::is_safe_for_rtl(ctx, element)? {
                return Ok(Outcome::Deferred);
            }
        }
        Language::English => {}
        Language::Unknown => {
            tagger::clear(element);
            ctx.processed.record(element, Language::Unknown, &text);
            return Ok(Outcome::Cleared);
        }
    }

    tagger::apply(element, language, ctx.style_profile());
    ctx.processed.record(element, language, &text);
    if let Some(signature) = signature {
        ctx.signatures.insert(signature, language, ctx.now);
    }
    ctx.stats.processed_elements += 1;
    Ok(Outcome::Tagged(language))
}

/// Perplexity 回答区域内含波斯字符的文本元素一律按波斯语处理
fn prefers_persian(ctx: &PageContext, element: &Handle, text: &str) -> bool {
    ctx.site.kind == SiteKind::Perplexity
        && get_node_name(element).is_some_and(|tag| PERPLEXITY_OVERRIDE_TAGS.contains(&tag))
        && has_persian(text)
        && closest(element, PERPLEXITY_ANSWER).is_some()
}

/// 依次处理一批元素，错误计数后跳过
pub fn process_batch(ctx: &mut PageContext, elements: &[Handle]) -> BatchReport {
    let mut report = BatchReport::default();
    for element in elements {
        report.visited += 1;
        match process_element(ctx, element) {
            Ok(Outcome::Tagged(_)) => report.tagged += 1,
            Ok(Outcome::Restored(_)) => report.restored += 1,
            Ok(_) => {}
            Err(e) => {
                report.errors += 1;
                ctx.record_error(&e);
            }
        }
    }
    if report.visited > 0 {
        debug!(
            "批处理 {} 个元素: 标记 {}, 恢复 {}, 错误 {}",
            report.visited, report.tagged, report.restored, report.errors
        );
    }
    report
}
