//! 视口扫描
//!
//! 变更管道之外的几条补充路径，都以"元素含波斯字符且尚未处理"为准：
//!
//! - **可见性**：未标记的候选登记到观察集合，进入视口（外扩 200px）时处理并移除
//! - **滚动**：防抖到期后处理视口附近的元素；聊天站点之后安排激进复查并考虑全页扫描
//! - **全页扫描**：长页面分批处理全部未标记元素，批次之间让出
//! - **激进复查**：已标记元素检查样式漂移，未标记元素恢复或处理
//! - **强制处理 / 兜底扫描 / 站点监控**：周期性地补漏
//!
//! 本模块只做一次扫描的工作，何时扫描由编排器通过调度器决定。

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use markup5ever_rcdom::Handle;
use tracing::{debug, trace};

use super::context::PageContext;
use super::processor::{self, BatchReport};
use super::safety::{self, Verdict};
use super::tagger::{self, SWEEP_MARK};
use crate::config::constants;
use crate::detection::{element_signature, has_persian, Language};
use crate::dom::{
    has_node_attr, inner_text, is_attached, query_all, set_node_attr, NodeKey, Selector,
    WeakNodeSet, TEXT_BEARING,
};
use crate::error::EngineResult;

// ============================================================================
// 选择器
// ============================================================================

const OBSERVE_TARGETS: &[Selector] = &[
    Selector::Tag("p"),
    Selector::Tag("span"),
    Selector::Tag("h1"),
    Selector::Tag("h2"),
    Selector::Tag("h3"),
    Selector::Tag("li"),
    Selector::Tag("div"),
];

const FORCE_TARGETS: &[Selector] = &[
    Selector::Tag("p"),
    Selector::Tag("span"),
    Selector::Tag("h1"),
    Selector::Tag("h2"),
    Selector::Tag("h3"),
    Selector::Tag("li"),
    Selector::Tag("td"),
    Selector::Tag("th"),
    Selector::AttrEq("role", "text"),
    Selector::AttrContains("data-testid", "message"),
    Selector::Class("message"),
];

const CHAT_FORCE_TARGETS: &[Selector] = &[
    Selector::Class("prose"),
    Selector::Class("markdown"),
    Selector::Class("chat-message"),
    Selector::Class("message-content"),
    Selector::AttrEq("data-testid", "message-content"),
    Selector::Class("assistant-message"),
    Selector::Class("user-message"),
];

const RECHECK_TARGETS: &[Selector] = &[
    Selector::Tag("p"),
    Selector::Tag("span"),
    Selector::All(&[Selector::Tag("div"), Selector::ClassContains("text")]),
    Selector::All(&[Selector::Tag("div"), Selector::ClassContains("content")]),
    Selector::All(&[Selector::Tag("div"), Selector::ClassContains("message")]),
    Selector::Tag("h1"),
    Selector::Tag("h2"),
    Selector::Tag("h3"),
    Selector::Tag("h4"),
    Selector::Tag("h5"),
    Selector::Tag("h6"),
    Selector::Tag("li"),
    Selector::Tag("td"),
    Selector::Tag("th"),
];

const IMMEDIATE_TARGETS: &[Selector] = &[
    Selector::Tag("p"),
    Selector::Tag("span"),
    Selector::Tag("h1"),
    Selector::Tag("h2"),
    Selector::Tag("h3"),
    Selector::Tag("h4"),
    Selector::Tag("li"),
    Selector::Tag("td"),
    Selector::Tag("th"),
    Selector::Tag("blockquote"),
    Selector::Tag("div"),
];

/// 激进复查的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecheckReport {
    pub batch: BatchReport,
    /// 重设了漂移样式的元素数
    pub restyled: usize,
}

/// 视口扫描状态
#[derive(Default)]
pub struct ViewportSweep {
    watched: WeakNodeSet,
    /// 站点监控已稳定处理的元素
    stable: WeakNodeSet,
    expanded: bool,
    last_full_scan: Option<Duration>,
    full_scan_queue: VecDeque<Handle>,
}

impl ViewportSweep {
    pub fn new() -> Self {
        Self::default()
    }

    /// 丢弃全部扫描状态（重载、卸载）
    pub fn reset(&mut self) {
        self.watched.clear();
        self.stable.clear();
        self.full_scan_queue.clear();
        self.last_full_scan = None;
    }

    /// 滚动扫描使用 1000px 外扩
    pub fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn watched_len(&self) -> usize {
        self.watched.len()
    }

    pub fn last_full_scan(&self) -> Option<Duration> {
        self.last_full_scan
    }

    // ========================================================================
    // 可见性
    // ========================================================================

    /// 登记未标记的候选，至多 `observe_existing_limit` 个新条目
    pub fn observe_existing(&mut self, ctx: &mut PageContext) -> usize {
        self.watched.purge();
        let limit = ctx.options.observe_existing_limit;
        let mut registered = 0;
        for element in query_all(&ctx.root(), OBSERVE_TARGETS) {
            if registered >= limit {
                break;
            }
            if tagger::has_marker(&element) || self.watched.contains(&element) {
                continue;
            }
            match persian_text(ctx, &element) {
                Ok(Some(_)) => {
                    self.watched.insert(&element);
                    registered += 1;
                }
                Ok(None) => {}
                Err(e) => ctx.record_error(&e),
            }
        }
        if registered > 0 {
            debug!("登记 {} 个待观察元素", registered);
        }
        registered
    }

    /// 登记单个元素
    pub fn watch(&mut self, element: &Handle) -> bool {
        self.watched.insert(element)
    }

    /// 按布局探针检查观察集合，处理进入视口的元素
    pub fn poll_intersections(&mut self, ctx: &mut PageContext) -> BatchReport {
        if self.watched.is_empty() {
            return BatchReport::default();
        }
        let viewport = ctx.layout.viewport();
        let mut entering = Vec::new();
        for element in self.watched.nodes() {
            if !is_attached(&element) {
                self.watched.remove(&element);
                continue;
            }
            match ctx.layout.rect(&element) {
                Ok(rect) if rect.is_near_viewport(&viewport, constants::INTERSECTION_MARGIN) => {
                    entering.push(element)
                }
                Ok(_) => {}
                Err(e) => {
                    self.watched.remove(&element);
                    ctx.record_error(&e);
                }
            }
        }
        self.handle_intersections(ctx, entering)
    }

    /// 宿主报告的进入视口的元素
    pub fn handle_intersections(&mut self, ctx: &mut PageContext, entries: Vec<Handle>) -> BatchReport {
        for element in &entries {
            self.watched.remove(element);
        }
        processor::process_batch(ctx, &entries)
    }

    // ========================================================================
    // 滚动
    // ========================================================================

    /// 滚动防抖到期：处理视口附近未处理且含波斯字符的元素
    pub fn process_scroll(&mut self, ctx: &mut PageContext) -> BatchReport {
        let margin = if self.expanded {
            constants::VIEWPORT_MARGIN_EXPANDED
        } else {
            constants::VIEWPORT_MARGIN
        };
        let viewport = ctx.layout.viewport();
        let chat = ctx.site.is_chat();

        let mut targets = Vec::new();
        for element in query_all(&ctx.root(), TEXT_BEARING) {
            let near = match ctx.layout.rect(&element) {
                Ok(rect) => rect.is_near_viewport(&viewport, margin),
                Err(e) => {
                    ctx.record_error(&e);
                    continue;
                }
            };
            if !near {
                continue;
            }
            match safety::check(ctx, &element) {
                Ok(Verdict::Eligible(text)) => {
                    // 聊天站点上标记被剥掉的英文元素也从签名恢复
                    let restorable =
                        chat && !tagger::has_marker(&element) && is_cached(ctx, &element, &text);
                    if has_persian(&text) || restorable {
                        targets.push(element);
                    }
                }
                Ok(Verdict::Rejected(_)) => {}
                Err(e) => ctx.record_error(&e),
            }
        }

        let report = processor::process_batch(ctx, &targets);
        if report.changed() > 0 {
            ctx.stats.reprocessing_count += 1;
        }
        report
    }

    // ========================================================================
    // 全页扫描
    // ========================================================================

    /// 聊天站点、页面足够长且已过冷却时间
    pub fn should_full_scan(&self, ctx: &PageContext) -> bool {
        if !ctx.site.is_chat() || self.is_full_scan_running() {
            return false;
        }
        let viewport = ctx.layout.viewport();
        if viewport.scroll_height <= viewport.height * constants::FULL_SCAN_HEIGHT_FACTOR {
            return false;
        }
        let cooldown = ctx
            .site
            .full_scan_cooldown
            .unwrap_or_else(|| ctx.options.full_scan_cooldown());
        match self.last_full_scan {
            Some(last) => ctx.now.saturating_sub(last) > cooldown,
            None => true,
        }
    }

    pub fn is_full_scan_running(&self) -> bool {
        !self.full_scan_queue.is_empty()
    }

    /// 收集全部未标记元素；返回排队数量
    pub fn begin_full_scan(&mut self, ctx: &mut PageContext) -> usize {
        self.full_scan_queue = query_all(&ctx.root(), TEXT_BEARING)
            .into_iter()
            .filter(|element| !tagger::has_marker(element))
            .collect();
        self.last_full_scan = Some(ctx.now);
        ctx.stats.full_scans += 1;
        debug!("全页扫描开始: {} 个元素排队", self.full_scan_queue.len());
        self.full_scan_queue.len()
    }

    /// 处理下一批；第二个返回值表示是否还有剩余批次
    pub fn continue_full_scan(&mut self, ctx: &mut PageContext) -> (BatchReport, bool) {
        let take = ctx.options.full_scan_batch.min(self.full_scan_queue.len());
        let batch: Vec<Handle> = self.full_scan_queue.drain(..take).collect();

        let mut targets = Vec::with_capacity(batch.len());
        for element in batch {
            // 排队期间被移除的元素直接跳过
            if !is_attached(&element) || tagger::has_marker(&element) {
                continue;
            }
            match persian_text(ctx, &element) {
                Ok(Some(_)) => targets.push(element),
                Ok(None) => {}
                Err(e) => ctx.record_error(&e),
            }
        }
        let report = processor::process_batch(ctx, &targets);

        let more = !self.full_scan_queue.is_empty();
        if !more {
            ctx.stats.reprocessing_count += 1;
            debug!("全页扫描完成");
        }
        (report, more)
    }

    // ========================================================================
    // 复查与补漏
    // ========================================================================

    /// 视口附近（外扩 500px）含波斯字符的元素：未标记的恢复或处理，已标记的检查样式漂移
    pub fn aggressive_recheck(&mut self, ctx: &mut PageContext) -> RecheckReport {
        let viewport = ctx.layout.viewport();
        let limit = ctx.options.recheck_limit;
        let profile = ctx.style_profile();
        let mut report = RecheckReport::default();
        let mut targets = Vec::new();
        let mut visited = 0;

        for element in query_all(&ctx.root(), RECHECK_TARGETS) {
            if visited >= limit {
                break;
            }
            match ctx.layout.rect(&element) {
                Ok(rect) if rect.is_near_viewport(&viewport, constants::RECHECK_MARGIN) => {}
                Ok(_) => continue,
                Err(e) => {
                    ctx.record_error(&e);
                    continue;
                }
            }
            let text = inner_text(&element);
            if !has_persian(&text) || safety::is_off_limits(ctx, &element) {
                continue;
            }
            visited += 1;

            if tagger::marker_of(&element) == Some(Language::Persian) {
                let layout = ctx.layout.clone();
                let drifted =
                    tagger::drifted_properties(profile, |property| layout.computed_style(&element, property));
                if !drifted.is_empty() {
                    trace!("重设漂移样式: {:?}", drifted);
                    tagger::restyle(&element, &drifted, profile);
                    report.restyled += 1;
                }
            } else {
                targets.push(element);
            }
        }

        report.batch = processor::process_batch(ctx, &targets);
        if report.batch.changed() + report.restyled > 0 {
            debug!(
                "激进复查: 处理 {}, 恢复 {}, 重设样式 {}",
                report.batch.tagged, report.batch.restored, report.restyled
            );
        }
        report
    }

    /// 强制处理未标记的常见文本元素，聊天站点额外处理消息容器
    pub fn force_processing(&mut self, ctx: &mut PageContext) -> BatchReport {
        let root = ctx.root();
        let unmarked: Vec<Handle> = query_all(&root, FORCE_TARGETS)
            .into_iter()
            .filter(|element| !tagger::has_marker(element))
            .collect();
        let targets = collect_persian(ctx, unmarked, constants::FORCE_BATCH);
        let mut report = processor::process_batch(ctx, &targets);

        if ctx.site.is_chat() {
            let messages = query_all(&root, CHAT_FORCE_TARGETS);
            let targets = collect_persian(ctx, messages, constants::FORCE_CHAT_LIMIT);
            report.merge(processor::process_batch(ctx, &targets));
        }
        report
    }

    /// 兜底/立即扫描：每个元素评估一次并打上 `data-ai-rtl-processed`
    pub fn immediate_pass(&mut self, ctx: &mut PageContext) -> BatchReport {
        let pending: Vec<Handle> = query_all(&ctx.root(), IMMEDIATE_TARGETS)
            .into_iter()
            .filter(|element| !has_node_attr(element, SWEEP_MARK))
            .collect();

        let mut report = BatchReport::default();
        for chunk in pending.chunks(ctx.options.immediate_batch) {
            report.merge(processor::process_batch(ctx, chunk));
            for element in chunk {
                set_node_attr(element, SWEEP_MARK, Some("true"));
            }
        }
        ctx.stats.immediate_processing += 1;
        report
    }

    /// 聊天站点监控：消息容器内的目标元素，然后复查未标记元素
    pub fn site_monitor(&mut self, ctx: &mut PageContext) -> BatchReport {
        if !ctx.site.is_chat() || !ctx.is_active() {
            return BatchReport::default();
        }
        self.stable.purge();
        let root = ctx.root();
        let mut report = BatchReport::default();

        let mut seen = HashSet::new();
        let mut specials = Vec::new();
        for container in query_all(&root, ctx.site.message_containers) {
            for element in query_all(&container, ctx.site.special_targets) {
                if seen.insert(NodeKey::of(&element))
                    && !tagger::has_marker(&element)
                    && !self.stable.contains(&element)
                {
                    specials.push(element);
                }
            }
        }
        for element in specials {
            report.visited += 1;
            match processor::process_element(ctx, &element) {
                Ok(outcome) if outcome.is_tagged() => {
                    if matches!(outcome, processor::Outcome::Restored(_)) {
                        report.restored += 1;
                    } else {
                        report.tagged += 1;
                    }
                    self.stable.insert(&element);
                }
                Ok(_) => {}
                Err(e) => {
                    report.errors += 1;
                    ctx.record_error(&e);
                }
            }
        }

        let limit = ctx.site.recheck_limit;
        let mut rechecked = Vec::new();
        for element in query_all(&root, TEXT_BEARING) {
            if rechecked.len() >= limit {
                break;
            }
            if tagger::has_marker(&element) {
                continue;
            }
            match safety::check(ctx, &element) {
                Ok(Verdict::Eligible(text)) => {
                    if has_persian(&text) || is_cached(ctx, &element, &text) {
                        rechecked.push(element);
                    }
                }
                Ok(Verdict::Rejected(_)) => {}
                Err(e) => ctx.record_error(&e),
            }
        }
        report.merge(processor::process_batch(ctx, &rechecked));
        report
    }
}

/// 通过安全检查且含波斯字符时返回文本
fn persian_text(ctx: &PageContext, element: &Handle) -> EngineResult<Option<String>> {
    match safety::check(ctx, element)? {
        Verdict::Eligible(text) if has_persian(&text) => Ok(Some(text)),
        _ => Ok(None),
    }
}

fn collect_persian(ctx: &mut PageContext, elements: Vec<Handle>, limit: usize) -> Vec<Handle> {
    let mut targets = Vec::new();
    for element in elements {
        if targets.len() >= limit {
            break;
        }
        match persian_text(ctx, &element) {
            Ok(Some(_)) => targets.push(element),
            Ok(None) => {}
            Err(e) => ctx.record_error(&e),
        }
    }
    targets
}

fn is_cached(ctx: &PageContext, element: &Handle, text: &str) -> bool {
    element_signature(element, text).is_some_and(|signature| ctx.signatures.contains(&signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineOptions, Settings};
    use crate::dom::{
        find_by_id, get_style_property, parse_html, remove_node_attr, set_style_property,
        Rect, StaticLayout, Viewport,
    };
    use std::rc::Rc;

    fn context(html: &str, url: &str) -> (PageContext, Rc<StaticLayout>) {
        let dom = parse_html(html).unwrap();
        let layout = Rc::new(StaticLayout::new());
        let ctx = PageContext::new(
            dom.document.clone(),
            url,
            Settings::default(),
            EngineOptions::default(),
            layout.clone(),
        );
        (ctx, layout)
    }

    fn element(ctx: &PageContext, id: &str) -> Handle {
        find_by_id(&ctx.document, id).unwrap()
    }

    #[test]
    fn test_intersection_processes_entering_elements() {
        let (mut ctx, layout) = context(
            "<p id='near'>سلام دنیا</p><p id='far'>خداحافظ دوست</p><p id='en'>Hello</p>",
            "https://example.com",
        );
        let far = element(&ctx, "far");
        layout.set_rect(&far, Rect::new(5000.0, 0.0, 100.0, 20.0));

        let mut sweep = ViewportSweep::new();
        assert_eq!(sweep.observe_existing(&mut ctx), 2, "英文元素不登记");

        let report = sweep.poll_intersections(&mut ctx);
        assert_eq!(report.tagged, 1);
        assert!(tagger::has_marker(&element(&ctx, "near")));
        assert_eq!(sweep.watched_len(), 1);

        layout.set_rect(&far, Rect::new(900.0, 0.0, 100.0, 20.0));
        assert_eq!(sweep.poll_intersections(&mut ctx).tagged, 1);
        assert_eq!(sweep.watched_len(), 0);
    }

    #[test]
    fn test_scroll_respects_margin_and_expanded_mode() {
        let (mut ctx, layout) = context(
            "<p id='a'>سلام دنیا</p><p id='b'>کتاب خوب</p>",
            "https://example.com",
        );
        let b = element(&ctx, "b");
        layout.set_rect(&b, Rect::new(1500.0, 0.0, 100.0, 20.0));

        let mut sweep = ViewportSweep::new();
        let report = sweep.process_scroll(&mut ctx);
        assert_eq!(report.tagged, 1);
        assert!(!tagger::has_marker(&b));
        assert_eq!(ctx.stats.reprocessing_count, 1);

        sweep.set_expanded(true);
        assert_eq!(sweep.process_scroll(&mut ctx).tagged, 1);
        assert!(tagger::has_marker(&b));

        // 没有变化时不计数
        sweep.process_scroll(&mut ctx);
        assert_eq!(ctx.stats.reprocessing_count, 2);
    }

    #[test]
    fn test_full_scan_gating_and_batches() {
        let paragraphs: String = (0..120)
            .map(|i| format!("<p>پاراگراف شماره {}</p>", i))
            .collect();
        let (mut ctx, layout) = context(
            &paragraphs,
            "https://aistudio.google.com/prompts/1",
        );
        let mut sweep = ViewportSweep::new();
        assert!(!sweep.should_full_scan(&ctx), "短页面不扫描");

        layout.set_viewport(Viewport {
            width: 1280.0,
            height: 800.0,
            scroll_height: 5000.0,
        });
        assert!(sweep.should_full_scan(&ctx));

        sweep.begin_full_scan(&mut ctx);
        assert_eq!(ctx.stats.full_scans, 1);
        let (first, more) = sweep.continue_full_scan(&mut ctx);
        assert_eq!(first.tagged, 50);
        assert!(more);
        let (_, more) = sweep.continue_full_scan(&mut ctx);
        assert!(more);
        let (last, more) = sweep.continue_full_scan(&mut ctx);
        assert_eq!(last.tagged, 20);
        assert!(!more);
        assert_eq!(ctx.stats.reprocessing_count, 1);

        // 冷却时间内不再扫描
        ctx.now = Duration::from_secs(10);
        assert!(!sweep.should_full_scan(&ctx));
        ctx.now = Duration::from_secs(16);
        assert!(sweep.should_full_scan(&ctx));
    }

    #[test]
    fn test_full_scan_skipped_on_generic_sites() {
        let (ctx, layout) = context("<p>سلام</p>", "https://example.com");
        layout.set_viewport(Viewport {
            width: 1280.0,
            height: 800.0,
            scroll_height: 9000.0,
        });
        assert!(!ViewportSweep::new().should_full_scan(&ctx));
    }

    #[test]
    fn test_aggressive_recheck_restyles_drift_and_restores() {
        let (mut ctx, layout) = context(
            "<p id='drift'>سلام دنیا</p><p id='lost'>کتاب خوب است</p>",
            "https://aistudio.google.com/prompts/1",
        );
        let drift = element(&ctx, "drift");
        let lost = element(&ctx, "lost");
        processor::process_batch(&mut ctx, &[drift.clone(), lost.clone()]);

        // 页面改掉了方向，另一个元素丢了标记
        set_style_property(&drift, "direction", "ltr", false);
        remove_node_attr(&lost, tagger::PERSIAN_MARKER);
        layout.set_rect(&lost, Rect::new(100.0, 0.0, 200.0, 20.0));

        let report = ViewportSweep::new().aggressive_recheck(&mut ctx);
        assert_eq!(report.restyled, 1);
        assert_eq!(report.batch.restored, 1);
        assert_eq!(get_style_property(&drift, "direction").as_deref(), Some("rtl"));
        assert!(tagger::has_marker(&lost));
    }

    #[test]
    fn test_aggressive_recheck_leaves_editors_alone() {
        let (mut ctx, _) = context(
            "<p id='moved'>سلام دنیا</p><div id='editor' contenteditable='true'></div>",
            "https://aistudio.google.com/prompts/1",
        );
        let moved = element(&ctx, "moved");
        processor::process_batch(&mut ctx, &[moved.clone()]);
        assert_eq!(tagger::marker_of(&moved), Some(Language::Persian));

        // 已标记的段落被编辑器接管，样式随之被改掉
        crate::dom::detach(&moved);
        crate::dom::append_child(&element(&ctx, "editor"), &moved);
        set_style_property(&moved, "direction", "ltr", false);

        let report = ViewportSweep::new().aggressive_recheck(&mut ctx);
        assert_eq!(report.restyled, 0);
        assert_eq!(report.batch.visited, 0);
        assert_eq!(get_style_property(&moved, "direction").as_deref(), Some("ltr"));
    }

    #[test]
    fn test_aggressive_recheck_skips_perplexity_chrome() {
        let (mut ctx, _) = context(
            "<aside><div class='prose'><p id='side'>سلام دنیا</p></div></aside>",
            "https://www.perplexity.ai/search/1",
        );
        let side = element(&ctx, "side");
        tagger::apply(&side, Language::Persian, ctx.style_profile());
        set_style_property(&side, "direction", "ltr", false);

        let report = ViewportSweep::new().aggressive_recheck(&mut ctx);
        assert_eq!(report.restyled, 0);
        assert_eq!(get_style_property(&side, "direction").as_deref(), Some("ltr"));
    }

    #[test]
    fn test_force_processing_only_touches_persian() {
        let (mut ctx, _) = context(
            "<p id='fa'>سلام</p><p id='en'>Hello world</p><div class='message' id='msg'>درود</div>",
            "https://example.com",
        );
        let report = ViewportSweep::new().force_processing(&mut ctx);
        assert_eq!(report.tagged, 2);
        assert!(!tagger::has_marker(&element(&ctx, "en")));
        assert!(tagger::has_marker(&element(&ctx, "msg")));
    }

    #[test]
    fn test_immediate_pass_marks_each_element_once() {
        let (mut ctx, _) = context(
            "<p id='fa'>سلام</p><p id='en'>Hello</p><pre><code>کد</code></pre>",
            "https://example.com",
        );
        let mut sweep = ViewportSweep::new();
        let report = sweep.immediate_pass(&mut ctx);
        assert_eq!(report.tagged, 2);
        assert!(has_node_attr(&element(&ctx, "en"), SWEEP_MARK));
        assert_eq!(ctx.stats.immediate_processing, 1);

        let again = sweep.immediate_pass(&mut ctx);
        assert_eq!(again.visited, 0, "已评估的元素不再扫描");
        assert_eq!(ctx.stats.immediate_processing, 2);
    }

    #[test]
    fn test_site_monitor_processes_message_containers() {
        let (mut ctx, _) = context(
            "<div class='chat-message'><p id='m'>سلام دنیا</p></div><p id='loose'>درود بر شما</p>",
            "https://aistudio.google.com/prompts/1",
        );
        let mut sweep = ViewportSweep::new();
        let report = sweep.site_monitor(&mut ctx);
        // 复查阶段也会处理消息容器本身
        assert_eq!(report.tagged, 3);
        assert!(tagger::has_marker(&element(&ctx, "m")));
        assert!(tagger::has_marker(&element(&ctx, "loose")));

        let (mut generic, _) = context("<p>سلام</p>", "https://example.com");
        assert_eq!(sweep.site_monitor(&mut generic).visited, 0);
    }
}
