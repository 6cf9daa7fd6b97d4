// 集成测试公共模块
//
// 提供文档构建、引擎构建和断言辅助

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use markup5ever_rcdom::{Handle, RcDom};

use ai_rtl::config::{EngineOptions, Settings};
use ai_rtl::dom::{
    append_child, create_element, descendants, find_by_id, get_style_property, has_node_attr,
    is_element, parse_html, set_text_content, StaticLayout,
};
use ai_rtl::engine::tagger::{self, ALL_MARKERS};
use ai_rtl::engine::{Engine, MutationRecord};
use ai_rtl::messaging::{Outbound, OutboundMessage};
use ai_rtl::{EngineError, EngineResult};

/// 记录所有出站消息；`fail` 为真时模拟宿主不可达
#[derive(Clone, Default)]
pub struct RecordingOutbound {
    pub sent: Rc<RefCell<Vec<OutboundMessage>>>,
    pub fail: Rc<RefCell<bool>>,
}

impl RecordingOutbound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sent.borrow().len()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.borrow_mut() = fail;
    }
}

impl Outbound for RecordingOutbound {
    fn send(&mut self, message: &OutboundMessage) -> EngineResult<()> {
        if *self.fail.borrow() {
            return Err(EngineError::Messaging("extension context invalidated".into()));
        }
        self.sent.borrow_mut().push(message.clone());
        Ok(())
    }
}

/// HTML 测试辅助
pub struct HtmlTestHelper;

impl HtmlTestHelper {
    pub fn create_test_dom(html: &str) -> RcDom {
        parse_html(html).expect("测试文档应能解析")
    }

    /// 包一层完整的页面结构
    pub fn page(body: &str) -> String {
        format!(
            "<!DOCTYPE html><html><head><title>test</title></head><body>{}</body></html>",
            body
        )
    }

    pub fn by_id(document: &Handle, id: &str) -> Handle {
        find_by_id(document, id).unwrap_or_else(|| panic!("缺少元素 #{}", id))
    }

    /// 在 `parent` 下追加段落并返回对应的变更记录
    pub fn append_paragraph(parent: &Handle, text: &str) -> (Handle, MutationRecord) {
        let p = create_element("p", &[]);
        set_text_content(&p, text);
        append_child(parent, &p);
        let record = MutationRecord::ChildList {
            target: parent.clone(),
            added: vec![p.clone()],
        };
        (p, record)
    }
}

/// 测试引擎构建器
pub struct TestEngineBuilder {
    html: String,
    url: String,
    settings: Settings,
    options: EngineOptions,
    layout: Rc<StaticLayout>,
    outbound: RecordingOutbound,
}

impl TestEngineBuilder {
    pub fn new(body: &str) -> Self {
        Self {
            html: HtmlTestHelper::page(body),
            url: "https://example.com/".to_string(),
            settings: Settings::default(),
            options: EngineOptions::default(),
            layout: Rc::new(StaticLayout::new()),
            outbound: RecordingOutbound::new(),
        }
    }

    pub fn url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> TestEnvironment {
        let dom = HtmlTestHelper::create_test_dom(&self.html);
        let engine = Engine::attach(
            dom.document.clone(),
            &self.url,
            self.settings,
            self.options,
            self.layout.clone(),
            Box::new(self.outbound.clone()),
        )
        .expect("引擎应能挂载");
        TestEnvironment {
            dom,
            engine,
            layout: self.layout,
            outbound: self.outbound,
        }
    }
}

/// 一个挂载了引擎的测试页面
pub struct TestEnvironment {
    pub dom: RcDom,
    pub engine: Engine,
    pub layout: Rc<StaticLayout>,
    pub outbound: RecordingOutbound,
}

impl TestEnvironment {
    pub fn started(body: &str) -> Self {
        let mut env = TestEngineBuilder::new(body).build();
        env.engine.start().expect("引擎应能启动");
        env
    }

    pub fn by_id(&self, id: &str) -> Handle {
        HtmlTestHelper::by_id(&self.dom.document, id)
    }

    /// 把时钟推进到启动后的稳定时刻
    pub fn settle(&mut self) {
        let target = self.engine.now() + Duration::from_secs(4);
        self.engine.advance_to(target);
    }

    pub fn advance_ms(&mut self, millis: u64) {
        let target = self.engine.now() + Duration::from_millis(millis);
        self.engine.advance_to(target);
    }
}

/// 断言辅助
pub struct AssertionHelper;

impl AssertionHelper {
    pub fn assert_persian(element: &Handle) {
        assert_eq!(tagger::marker_of(element), Some(ai_rtl::Language::Persian));
        assert_eq!(get_style_property(element, "direction").as_deref(), Some("rtl"));
        assert_eq!(get_style_property(element, "text-align").as_deref(), Some("right"));
    }

    pub fn assert_english(element: &Handle) {
        assert_eq!(tagger::marker_of(element), Some(ai_rtl::Language::English));
        assert_eq!(get_style_property(element, "direction").as_deref(), Some("ltr"));
    }

    pub fn assert_untouched(element: &Handle) {
        assert!(!tagger::has_marker(element));
        assert!(get_style_property(element, "direction").is_none());
    }

    /// 文档中没有任何引擎留下的标记或方向样式
    pub fn assert_clean(document: &Handle) {
        for node in descendants(document).iter().filter(|node| is_element(node)) {
            for marker in ALL_MARKERS {
                assert!(!has_node_attr(node, marker), "残留标记 {}", marker);
            }
            assert!(get_style_property(node, "direction").is_none(), "残留方向样式");
        }
    }
}
