//! 引擎编排
//!
//! `Engine` 持有页面上下文、调度器、变更管道、视口扫描和输入处理，负责：
//!
//! - 生命周期：`attach` -> `start` -> (`full_reload` | `smooth_reprocess`)* -> `teardown` -> `detach`
//! - 把宿主事件和到期任务分派给各组件
//! - 处理入站命令与设置变更
//! - 定期发送心跳
//!
//! 所有等待都是调度器上的命名任务，宿主通过 `tick(now)` 推进时钟。

use std::rc::Rc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use markup5ever_rcdom::Handle;
use tracing::{debug, info, trace, warn};

use super::context::PageContext;
use super::events::{self, EngineEvent, EventReceiver, EventSender};
use super::input::{InputAction, InputDirector, CHATGPT_INPUT_PARENTS};
use super::mutation::MutationPipeline;
use super::safety::{self, COMPOSER_REGIONS};
use super::scheduler::{Scheduler, TaskName};
use super::site::{SiteKind, CHAT_SCROLL_CONTAINERS};
use super::stats::StatsSnapshot;
use super::stylesheet;
use super::sweep::ViewportSweep;
use super::tagger::{
    StyleProfile, ALL_MARKERS, ENGINE_GUARD, INPUT_HANDLED, PERSIAN_INPUT_MARKER,
    PERSIAN_MARKER,
};
use crate::config::{constants, EngineOptions, Settings, SettingsPatch};
use crate::dom::{
    closest, descendants, document_element, has_node_attr, is_element, parent_element,
    query_all, remove_node_attr, remove_style_properties, remove_style_property, set_node_attr,
    set_style_property, LayoutProbe, Selector,
};
use crate::error::{EngineError, EngineResult};
use crate::export;
use crate::messaging::{Command, Outbound, OutboundMessage, Response};

/// 卸载时清除的内联样式
const ENGINE_STYLE_PROPERTIES: &[&str] = &[
    "direction",
    "text-align",
    "unicode-bidi",
    "font-family",
    "font-size",
    "writing-mode",
];

/// 引擎
pub struct Engine {
    ctx: PageContext,
    scheduler: Scheduler,
    pipeline: MutationPipeline,
    sweep: ViewportSweep,
    inputs: InputDirector,
    outbound: Box<dyn Outbound>,
    sender: EventSender,
    receiver: EventReceiver,
    running: bool,
}

impl Engine {
    // ========================================================================
    // 生命周期
    // ========================================================================

    /// 挂载到文档；`<html>` 上已有引擎标记时返回 `AlreadyAttached`
    pub fn attach(
        document: Handle,
        page_url: &str,
        settings: Settings,
        options: EngineOptions,
        layout: Rc<dyn LayoutProbe>,
        outbound: Box<dyn Outbound>,
    ) -> EngineResult<Self> {
        options.validate()?;
        let html = document_element(&document)
            .ok_or_else(|| EngineError::Dom("document has no <html> element".to_string()))?;
        if has_node_attr(&html, ENGINE_GUARD) {
            return Err(EngineError::AlreadyAttached);
        }
        set_node_attr(&html, ENGINE_GUARD, Some(env!("CARGO_PKG_VERSION")));

        let ctx = PageContext::new(document, page_url, settings, options, layout);
        info!(
            "引擎已挂载: {} ({})",
            if ctx.host.is_empty() { "<no host>" } else { ctx.host.as_str() },
            ctx.site.kind.label()
        );
        let (sender, receiver) = events::channel();
        Ok(Self {
            ctx,
            scheduler: Scheduler::new(),
            pipeline: MutationPipeline::new(),
            sweep: ViewportSweep::new(),
            inputs: InputDirector::new(),
            outbound,
            sender,
            receiver,
            running: false,
        })
    }

    /// 启动；当前站点未启用时只等待命令
    pub fn start(&mut self) -> EngineResult<()> {
        if !self.ctx.is_active() {
            info!("当前站点未启用，引擎保持空闲: {}", self.ctx.host);
            return Ok(());
        }
        self.activate(constants::START_PASS_DELAYS_MS)
    }

    /// 注入样式表、启动观察和周期任务，按给定延迟安排立即扫描
    fn activate(&mut self, pass_delays_ms: &[u64]) -> EngineResult<()> {
        let now = self.ctx.now;
        stylesheet::inject(
            &self.ctx.document,
            self.ctx.style_profile(),
            &self.ctx.options.font_base_url,
        )?;
        self.pipeline.start(self.ctx.site.is_chat());
        self.sweep.set_expanded(false);

        let site = self.ctx.site.clone();
        let options = self.ctx.options.clone();
        self.scheduler.schedule_every(
            TaskName::ObserveExisting,
            constants::OBSERVE_EXISTING_INTERVAL,
            now,
        );
        self.scheduler.schedule_every(
            TaskName::ForceProcessing,
            options.force_interval(),
            now + options.force_interval(),
        );
        self.scheduler.schedule_every(
            TaskName::BackstopScan,
            options.backstop_interval(),
            now + options.backstop_interval(),
        );
        self.scheduler
            .schedule_every(TaskName::InputScan, site.input_scan_interval, now);
        self.scheduler.schedule_every(
            TaskName::ComposerSweep,
            constants::COMPOSER_SWEEP_INTERVAL,
            now + constants::COMPOSER_SWEEP_INTERVAL,
        );
        self.scheduler.schedule_every(
            TaskName::Heartbeat,
            options.heartbeat_interval(),
            now + options.heartbeat_interval(),
        );
        if let Some(period) = site.aggressive_interval {
            self.scheduler
                .schedule_every(TaskName::AggressiveRecheck, period, now + period);
        }
        if let Some(period) = site.monitor_interval {
            self.scheduler.schedule_every(TaskName::SiteMonitor, period, now + period);
        }

        for (index, delay) in pass_delays_ms.iter().enumerate() {
            self.scheduler.schedule_once(
                TaskName::ImmediatePass(index as u8),
                now + Duration::from_millis(*delay),
            );
        }

        self.running = true;
        info!("引擎已启动: {} 个任务", self.scheduler.len());
        Ok(())
    }

    /// 停止一切并清除页面上的全部标记、样式和缓存；引擎仍挂载，可以重新加载
    pub fn teardown(&mut self) {
        self.pipeline.stop();
        self.scheduler.clear();
        self.sweep.reset();
        self.inputs.reset();
        let stripped = strip_document(&self.ctx);
        stylesheet::remove(&self.ctx.document);
        self.ctx.processed.clear();
        // 缓存的结果依赖当时的灵敏度，重新加载后必须重新分类
        self.ctx.signatures.clear();
        self.ctx.languages.clear();
        self.running = false;
        info!("引擎已卸载: 清除 {} 个元素", stripped);
    }

    /// 卸载并移除挂载标记
    pub fn detach(mut self) {
        self.teardown();
        if let Some(html) = document_element(&self.ctx.document) {
            remove_node_attr(&html, ENGINE_GUARD);
        }
        debug!("引擎已分离");
    }

    /// 卸载后重新启动全部组件，并在 1 秒后做一次全页扫描
    pub fn full_reload(&mut self) -> EngineResult<()> {
        self.teardown();
        if !self.ctx.is_active() {
            return Ok(());
        }
        self.activate(constants::RELOAD_PASS_DELAYS_MS)?;
        self.scheduler.schedule_once(
            TaskName::DeferredFullScan,
            self.ctx.now + constants::RELOAD_FULL_SCAN_DELAY,
        );
        info!("完全重新加载");
        Ok(())
    }

    /// 清除标记和缓存后重新处理，观察保持不变
    pub fn smooth_reprocess(&mut self) {
        if !self.running {
            return;
        }
        let stripped = strip_document(&self.ctx);
        self.ctx.processed.clear();
        self.ctx.signatures.clear();
        self.ctx.languages.clear();
        let now = self.ctx.now;
        for (index, delay) in constants::REPROCESS_PASS_DELAYS_MS.iter().enumerate() {
            self.scheduler.schedule_once(
                TaskName::ImmediatePass(index as u8),
                now + Duration::from_millis(*delay),
            );
        }
        info!("平滑重新处理: 清除 {} 个元素", stripped);
    }

    // ========================================================================
    // 时钟与事件
    // ========================================================================

    /// 宿主事件的发送端
    pub fn event_sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// 推进时钟到 `now`：先处理排队的事件，再依次执行到期任务；返回执行的任务数
    pub fn tick(&mut self, now: Duration) -> usize {
        self.ctx.now = self.ctx.now.max(now);
        for event in events::drain(&mut self.receiver) {
            self.handle_event(event);
        }
        if self.running
            && self.sweep.watched_len() > 0
            && !self.scheduler.is_scheduled(TaskName::IntersectionPoll)
        {
            self.scheduler
                .schedule_once(TaskName::IntersectionPoll, self.ctx.now);
        }

        let mut ran = 0;
        while let Some(task) = self.scheduler.pop_due(self.ctx.now) {
            self.run_task(task);
            ran += 1;
        }
        ran
    }

    /// 逐个到期时间推进，直到 `target`；返回执行的任务数
    pub fn advance_to(&mut self, target: Duration) -> usize {
        let mut ran = self.tick(self.ctx.now);
        while let Some(due) = self.scheduler.next_due() {
            if due > target {
                break;
            }
            ran += self.tick(due);
        }
        self.ctx.now = self.ctx.now.max(target);
        ran
    }

    /// 最早的待执行任务时间
    pub fn next_due(&self) -> Option<Duration> {
        self.scheduler.next_due()
    }

    pub fn now(&self) -> Duration {
        self.ctx.now
    }

    fn handle_event(&mut self, event: EngineEvent) {
        let now = self.ctx.now;
        match event {
            EngineEvent::Mutations(records) => {
                if self.pipeline.accept(&self.ctx, records) {
                    self.scheduler.schedule_once(
                        TaskName::MutationFlush,
                        now + self.ctx.options.mutation_debounce(),
                    );
                }
            }
            EngineEvent::Scroll { target } => {
                if !self.running {
                    return;
                }
                if let Some(target) = target {
                    // 只关心聊天滚动容器，其它元素的滚动忽略
                    if closest(&target, CHAT_SCROLL_CONTAINERS).is_none() {
                        return;
                    }
                    self.sweep.set_expanded(true);
                }
                self.scheduler.schedule_once(
                    TaskName::ScrollSettle,
                    now + self.ctx.options.scroll_debounce(),
                );
            }
            EngineEvent::Input { target, kind } => {
                if !self.running {
                    return;
                }
                match self.inputs.handle_event(&mut self.ctx, &target, kind) {
                    Ok(InputAction::PasteQueued) => self
                        .scheduler
                        .schedule_once(TaskName::PasteFlush, now + constants::PASTE_DELAY),
                    Ok(_) => {}
                    Err(e) => self.ctx.record_error(&e),
                }
            }
            EngineEvent::Intersection(entries) => {
                if self.running {
                    self.sweep.handle_intersections(&mut self.ctx, entries);
                }
            }
            EngineEvent::UrlChanged(page_url) => {
                if page_url == self.ctx.page_url {
                    return;
                }
                info!("页面地址变化: {}", page_url);
                self.ctx.set_page_url(&page_url);
                if let Err(e) = self.full_reload() {
                    self.ctx.record_error(&e);
                }
            }
        }
    }

    fn run_task(&mut self, task: TaskName) {
        trace!("执行任务 {:?}", task);
        let now = self.ctx.now;
        match task {
            TaskName::MutationFlush => {
                let report = self.pipeline.flush(&mut self.ctx);
                for root in &report.added_roots {
                    self.inputs.scan(&mut self.ctx, root);
                }
                // 按候选数判断，其它路径可能已经先标记了这些元素
                if report.candidates > self.ctx.options.large_swap_candidates {
                    debug!("大量内容替换 ({} 个候选)，安排全页扫描", report.candidates);
                    self.scheduler.schedule_once(
                        TaskName::DeferredFullScan,
                        now + constants::LARGE_SWAP_SCAN_DELAY,
                    );
                }
            }
            TaskName::ScrollSettle => {
                self.sweep.process_scroll(&mut self.ctx);
                if self.ctx.site.is_chat() {
                    self.scheduler.schedule_once(
                        TaskName::ScrollRecheck,
                        now + constants::SCROLL_RECHECK_DELAY,
                    );
                    if self.sweep.should_full_scan(&self.ctx) {
                        self.scheduler.schedule_once(
                            TaskName::DeferredFullScan,
                            now + constants::FULL_SCAN_START_DELAY,
                        );
                    }
                }
            }
            TaskName::ScrollRecheck | TaskName::AggressiveRecheck => {
                self.sweep.aggressive_recheck(&mut self.ctx);
            }
            TaskName::DeferredFullScan => {
                if !self.sweep.is_full_scan_running() && self.sweep.begin_full_scan(&mut self.ctx) > 0
                {
                    self.scheduler.schedule_once(TaskName::FullScanBatch, now);
                }
            }
            TaskName::FullScanBatch => {
                let (_, more) = self.sweep.continue_full_scan(&mut self.ctx);
                if more {
                    self.scheduler.schedule_once(
                        TaskName::FullScanBatch,
                        now + self.ctx.options.full_scan_yield(),
                    );
                }
            }
            TaskName::ImmediatePass(_) | TaskName::BackstopScan => {
                self.sweep.immediate_pass(&mut self.ctx);
                let root = self.ctx.root();
                self.inputs.scan(&mut self.ctx, &root);
            }
            TaskName::PasteFlush => {
                self.inputs.flush_pastes(&mut self.ctx);
            }
            TaskName::FontRefresh => {
                let refreshed = refresh_fonts(&self.ctx);
                debug!("字体刷新: {} 个元素", refreshed);
            }
            TaskName::IntersectionPoll => {
                self.sweep.poll_intersections(&mut self.ctx);
            }
            TaskName::ObserveExisting => {
                self.sweep.observe_existing(&mut self.ctx);
                self.ctx.processed.purge();
            }
            TaskName::ForceProcessing => {
                self.sweep.force_processing(&mut self.ctx);
            }
            TaskName::SiteMonitor => {
                self.sweep.site_monitor(&mut self.ctx);
                let root = self.ctx.root();
                self.inputs.scan(&mut self.ctx, &root);
            }
            TaskName::InputScan => {
                let root = self.ctx.root();
                self.inputs.scan(&mut self.ctx, &root);
            }
            TaskName::ComposerSweep => {
                for region in query_all(&self.ctx.root(), COMPOSER_REGIONS) {
                    self.inputs.scan(&mut self.ctx, &region);
                }
            }
            TaskName::Heartbeat => self.heartbeat(),
        }
    }

    fn heartbeat(&mut self) {
        let message = OutboundMessage::Heartbeat {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            domain: self.ctx.host.clone(),
            stats: Box::new(self.stats()),
        };
        match self.outbound.send(&message) {
            Ok(()) => self.ctx.stats.heartbeat_count += 1,
            Err(e) => {
                warn!("心跳发送失败");
                self.ctx.record_error(&e);
            }
        }
    }

    // ========================================================================
    // 命令
    // ========================================================================

    /// 处理 JSON 命令；解析失败也返回一个失败响应
    pub fn handle_message(&mut self, json: &str) -> Response {
        match Command::parse(json) {
            Ok(command) => self.handle_command(command),
            Err(e) => {
                warn!("无法解析命令: {}", e);
                Response::from(e)
            }
        }
    }

    pub fn handle_command(&mut self, command: Command) -> Response {
        debug!("处理命令 {}", command.action());
        let result = match command {
            Command::Ping => return Response::alive(self.stats()),
            Command::GetStats => return Response::Stats(Box::new(self.stats())),
            Command::ToggleRtl { enabled } => self.update_settings(&SettingsPatch {
                enabled: Some(enabled),
                ..SettingsPatch::default()
            }),
            Command::UpdateSettings(envelope) => self.update_settings(&envelope.patch()),
            Command::SmoothReprocess(envelope) => {
                self.ctx.settings.apply(&envelope.patch());
                self.smooth_reprocess();
                Ok(())
            }
            Command::FullReload(envelope) => {
                self.ctx.settings.apply(&envelope.patch());
                self.full_reload()
            }
            Command::ExportPdf => {
                return match export::export(&self.ctx) {
                    Ok(document) => Response::Export {
                        success: true,
                        messages: document.messages,
                        html: document.html,
                    },
                    Err(e) => Response::from(e),
                }
            }
        };
        match result {
            Ok(()) => Response::ok(),
            Err(e) => {
                self.ctx.record_error(&e);
                Response::from(e)
            }
        }
    }

    /// 合并设置并执行对应的动作
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> EngineResult<()> {
        let was_active = self.ctx.is_active();
        let change = self.ctx.settings.apply(patch);
        let is_active = self.ctx.is_active();
        debug!("设置变更: {:?}", change);

        if was_active != is_active {
            return if is_active {
                self.full_reload()
            } else {
                self.teardown();
                Ok(())
            };
        }
        if !is_active || !self.running {
            return Ok(());
        }
        if change.font {
            stylesheet::inject(
                &self.ctx.document,
                self.ctx.style_profile(),
                &self.ctx.options.font_base_url,
            )?;
            self.scheduler.schedule_once(
                TaskName::FontRefresh,
                self.ctx.now + constants::FONT_REFRESH_DELAY,
            );
        }
        if change.sensitivity {
            self.smooth_reprocess();
        }
        Ok(())
    }

    // ========================================================================
    // 查询
    // ========================================================================

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot::new(
            &self.ctx.stats,
            self.ctx.site.kind,
            &self.ctx.host,
            &self.ctx.settings,
            (self.ctx.signatures.len(), self.ctx.languages.len()),
        )
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn context(&self) -> &PageContext {
        &self.ctx
    }

    pub fn document(&self) -> &Handle {
        &self.ctx.document
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn pipeline(&self) -> &MutationPipeline {
        &self.pipeline
    }
}

/// 清除所有引擎属性和内联样式；返回被清除的元素数
fn strip_document(ctx: &PageContext) -> usize {
    let chatgpt = ctx.site.kind == SiteKind::ChatGpt;
    let mut stripped = 0;
    for element in descendants(&ctx.document).iter().filter(|node| is_element(node)) {
        if !ALL_MARKERS.iter().any(|marker| has_node_attr(element, marker)) {
            continue;
        }
        if chatgpt && has_node_attr(element, INPUT_HANDLED) {
            remove_node_attr(element, "dir");
            if let Some(parent) = parent_element(element)
                .and_then(|parent| closest(&parent, CHATGPT_INPUT_PARENTS))
            {
                remove_style_property(&parent, "direction");
            }
        }
        for marker in ALL_MARKERS {
            remove_node_attr(element, marker);
        }
        remove_style_properties(element, ENGINE_STYLE_PROPERTIES);
        stripped += 1;
    }
    stripped
}

/// 字体变更后刷新波斯语元素、输入框以及波斯语元素内非代码子元素的字体
fn refresh_fonts(ctx: &PageContext) -> usize {
    let profile = ctx.style_profile();
    let mut refreshed = 0;
    let root = ctx.root();
    for element in query_all(
        &root,
        &[Selector::Attr(PERSIAN_MARKER), Selector::Attr(PERSIAN_INPUT_MARKER)],
    ) {
        set_fonts(&element, profile);
        refreshed += 1;
        if !has_node_attr(&element, PERSIAN_MARKER) {
            continue;
        }
        for child in descendants(&element).iter().filter(|node| is_element(node)) {
            if safety::is_code_related(child) {
                continue;
            }
            set_fonts(child, profile);
        }
    }
    refreshed
}

fn set_fonts(element: &Handle, profile: StyleProfile) {
    match profile.font_family {
        Some(family) => set_style_property(element, "font-family", family, true),
        None => remove_style_property(element, "font-family"),
    }
    match profile.font_size {
        Some(size) => set_style_property(element, "font-size", size, true),
        None => remove_style_property(element, "font-size"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FontChoice, Sensitivity};
    use crate::detection::Language;
    use crate::dom::{find_by_id, get_style_property, parse_html, StaticLayout};
    use crate::engine::mutation::{MutationRecord, PipelineState};
    use crate::engine::tagger;
    use crate::messaging::NullOutbound;

    fn engine(html: &str, url: &str) -> Engine {
        let dom = parse_html(html).unwrap();
        Engine::attach(
            dom.document.clone(),
            url,
            Settings::default(),
            EngineOptions::default(),
            Rc::new(StaticLayout::new()),
            Box::new(NullOutbound),
        )
        .unwrap()
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_start_runs_immediate_passes() {
        let mut engine = engine(
            "<html><head></head><body><p id='fa'>سلام دنیا</p><p id='en'>Hello World</p></body></html>",
            "https://example.com/",
        );
        engine.start().unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.pipeline().state(), PipelineState::Observing);

        engine.advance_to(ms(600));
        let fa = find_by_id(engine.document(), "fa").unwrap();
        let en = find_by_id(engine.document(), "en").unwrap();
        assert_eq!(tagger::marker_of(&fa), Some(Language::Persian));
        assert_eq!(get_style_property(&fa, "direction").as_deref(), Some("rtl"));
        assert_eq!(tagger::marker_of(&en), Some(Language::English));
        assert!(engine.stats().counters.immediate_processing >= 1);
    }

    #[test]
    fn test_disabled_host_stays_idle() {
        let dom = parse_html("<p id='fa'>سلام</p>").unwrap();
        let settings = Settings {
            enabled_domains: vec!["chatgpt.com".into()],
            ..Settings::default()
        };
        let mut engine = Engine::attach(
            dom.document.clone(),
            "https://example.com/",
            settings,
            EngineOptions::default(),
            Rc::new(StaticLayout::new()),
            Box::new(NullOutbound),
        )
        .unwrap();
        engine.start().unwrap();
        assert!(!engine.is_running());
        assert!(engine.scheduler().is_empty());
    }

    #[test]
    fn test_mutation_debounce_coalesces() {
        let mut engine = engine("<div id='feed'></div>", "https://example.com/");
        engine.start().unwrap();
        let feed = find_by_id(engine.document(), "feed").unwrap();
        let sender = engine.event_sender();

        for (at, text) in [(0, "سلام"), (30, "دنیا")] {
            let p = crate::dom::create_element("p", &[]);
            crate::dom::set_text_content(&p, text);
            crate::dom::append_child(&feed, &p);
            sender
                .send(EngineEvent::Mutations(vec![MutationRecord::ChildList {
                    target: feed.clone(),
                    added: vec![p],
                }]))
                .unwrap();
            engine.tick(ms(at));
        }
        assert_eq!(engine.scheduler().due_at(TaskName::MutationFlush), Some(ms(80)));
        let second = crate::dom::child_elements(&feed)[1].clone();
        engine.tick(ms(79));
        assert_eq!(engine.pipeline().state(), PipelineState::DebouncedPending);
        assert!(!tagger::has_marker(&second), "防抖期间不处理");
        engine.tick(ms(80));
        assert_eq!(engine.pipeline().state(), PipelineState::Observing);
        assert_eq!(tagger::marker_of(&second), Some(Language::Persian));
        assert!(!engine.scheduler().is_scheduled(TaskName::MutationFlush));
    }

    #[test]
    fn test_large_swap_schedules_full_scan() {
        let mut engine = engine("<div id='feed'></div>", "https://example.com/");
        engine.start().unwrap();
        let feed = find_by_id(engine.document(), "feed").unwrap();
        let mut added = Vec::new();
        for _ in 0..11 {
            let p = crate::dom::create_element("p", &[]);
            crate::dom::set_text_content(&p, "سلام دنیا");
            crate::dom::append_child(&feed, &p);
            added.push(p);
        }
        engine
            .event_sender()
            .send(EngineEvent::Mutations(vec![MutationRecord::ChildList {
                target: feed,
                added,
            }]))
            .unwrap();
        engine.tick(ms(10));
        engine.tick(ms(60));
        assert_eq!(
            engine.scheduler().due_at(TaskName::DeferredFullScan),
            Some(ms(60) + constants::LARGE_SWAP_SCAN_DELAY)
        );
    }

    #[test]
    fn test_teardown_strips_everything() {
        let mut engine = engine(
            "<html><head></head><body><p id='fa'>سلام دنیا</p><textarea id='t'>سلام</textarea></body></html>",
            "https://example.com/",
        );
        engine.start().unwrap();
        engine.advance_to(ms(600));
        let fa = find_by_id(engine.document(), "fa").unwrap();
        let textarea = find_by_id(engine.document(), "t").unwrap();
        assert!(tagger::has_marker(&fa));
        assert!(has_node_attr(&textarea, INPUT_HANDLED));

        engine.teardown();
        assert!(!engine.is_running());
        assert!(engine.scheduler().is_empty());
        for element in [&fa, &textarea] {
            assert!(!ALL_MARKERS.iter().any(|m| has_node_attr(element, m)));
            assert!(get_style_property(element, "direction").is_none());
        }
        assert!(find_by_id(engine.document(), constants::STYLESHEET_ID).is_none());
    }

    #[test]
    fn test_attach_guard() {
        let dom = parse_html("<p>x</p>").unwrap();
        let attach = || {
            Engine::attach(
                dom.document.clone(),
                "https://example.com/",
                Settings::default(),
                EngineOptions::default(),
                Rc::new(StaticLayout::new()),
                Box::new(NullOutbound),
            )
        };
        let first = attach().unwrap();
        assert!(matches!(attach(), Err(EngineError::AlreadyAttached)));
        first.detach();
        assert!(attach().is_ok(), "分离后可以重新挂载");
    }

    #[test]
    fn test_toggle_off_and_on() {
        let mut engine = engine("<p id='fa'>سلام دنیا</p>", "https://example.com/");
        engine.start().unwrap();
        engine.advance_to(ms(600));

        let response = engine.handle_message(r#"{"action":"toggleRTL","isEnabled":false}"#);
        assert!(response.is_success());
        assert!(!engine.is_running());
        let fa = find_by_id(engine.document(), "fa").unwrap();
        assert!(!tagger::has_marker(&fa));

        engine.handle_message(r#"{"action":"toggleRTL","isEnabled":true}"#);
        assert!(engine.is_running());
        engine.tick(engine.now());
        assert_eq!(tagger::marker_of(&fa), Some(Language::Persian));
    }

    #[test]
    fn test_sensitivity_change_reprocesses() {
        let mut engine = engine("<p id='p'>سلام</p>", "https://example.com/");
        engine.start().unwrap();
        engine.advance_to(ms(600));
        let p = find_by_id(engine.document(), "p").unwrap();
        assert!(has_node_attr(&p, tagger::SWEEP_MARK));

        engine.handle_message(r#"{"action":"updateSettings","settings":{"detectionMode":"high"}}"#);
        assert_eq!(engine.context().settings.detection_sensitivity, Sensitivity::High);
        assert!(!has_node_attr(&p, tagger::SWEEP_MARK), "重新处理前清除扫描标记");
        assert!(engine.context().signatures.is_empty());

        engine.tick(engine.now());
        assert_eq!(tagger::marker_of(&p), Some(Language::Persian));
    }

    #[test]
    fn test_reload_with_new_sensitivity_reclassifies() {
        let mut engine = engine("<p id='p'>س abc</p>", "https://example.com/");
        engine.start().unwrap();
        engine.advance_to(ms(600));
        let p = find_by_id(engine.document(), "p").unwrap();
        assert_eq!(tagger::marker_of(&p), Some(Language::English));

        engine.handle_message(
            r#"{"action":"fullReload","settings":{"detectionSensitivity":"high"}}"#,
        );
        assert!(engine.context().signatures.is_empty(), "卸载时清空签名缓存");
        assert!(engine.context().languages.is_empty(), "卸载时清空语言缓存");

        engine.advance_to(engine.now() + ms(3000));
        assert_eq!(tagger::marker_of(&p), Some(Language::Persian));
        assert_eq!(engine.stats().counters.restored_from_cache, 0);
    }

    #[test]
    fn test_font_change_refreshes_styles() {
        let mut engine = engine("<p id='p'>سلام دنیا <b id='b'>خوب</b></p>", "https://example.com/");
        engine.start().unwrap();
        engine.advance_to(ms(600));

        engine.handle_message(r#"{"action":"updateSettings","selectedFont":"shabnam"}"#);
        assert_eq!(engine.context().settings.font, FontChoice::Shabnam);
        let due = engine.scheduler().due_at(TaskName::FontRefresh).unwrap();
        engine.tick(due);

        let b = find_by_id(engine.document(), "b").unwrap();
        let family = get_style_property(&b, "font-family").unwrap();
        assert!(family.contains("Shabnam"));
    }

    #[test]
    fn test_unknown_action_and_stats() {
        let mut engine = engine("<p>x</p>", "https://chatgpt.com/c/1");
        let failure = engine.handle_message(r#"{"action":"explode"}"#);
        assert_eq!(
            failure.to_json().unwrap(),
            r#"{"success":false,"error":"Unknown action"}"#
        );

        let stats = engine.handle_message(r#"{"action":"getStats"}"#);
        let json: serde_json::Value = serde_json::from_str(&stats.to_json().unwrap()).unwrap();
        assert_eq!(json["siteType"], "ChatGPT");
        assert_eq!(json["currentDomain"], "chatgpt.com");
    }

    #[test]
    fn test_url_change_reloads_with_new_profile() {
        let mut engine = engine("<p>سلام</p>", "https://example.com/");
        engine.start().unwrap();
        engine
            .event_sender()
            .send(EngineEvent::UrlChanged("https://aistudio.google.com/prompts/1".into()))
            .unwrap();
        engine.tick(ms(10));
        assert_eq!(engine.context().site.kind, SiteKind::AiStudio);
        assert!(engine.scheduler().is_scheduled(TaskName::SiteMonitor));
        assert!(engine.scheduler().is_scheduled(TaskName::DeferredFullScan));
    }
}
