//! 引擎生命周期、消息和心跳集成测试

mod common;

use std::time::Duration;

use ai_rtl::config::{FontChoice, Settings};
use ai_rtl::dom::{get_style_property, has_node_attr, parse_html, StaticLayout};
use ai_rtl::engine::input::InputEventKind;
use ai_rtl::engine::tagger::{self, INPUT_HANDLED, PERSIAN_INPUT_MARKER, WRAPPER_MARK};
use ai_rtl::engine::{Engine, EngineEvent, SiteKind, TaskName};
use ai_rtl::messaging::{NullOutbound, OutboundMessage};
use ai_rtl::{EngineError, EngineOptions, Language};

use common::{AssertionHelper, HtmlTestHelper, TestEngineBuilder, TestEnvironment};

#[test]
fn test_duplicate_attach_is_rejected() {
    let dom = parse_html(&HtmlTestHelper::page("<p>سلام</p>")).unwrap();
    let attach = || {
        Engine::attach(
            dom.document.clone(),
            "https://example.com/",
            Settings::default(),
            EngineOptions::default(),
            std::rc::Rc::new(StaticLayout::new()),
            Box::new(NullOutbound),
        )
    };
    let engine = attach().unwrap();
    assert_eq!(attach().err(), Some(EngineError::AlreadyAttached));

    engine.detach();
    assert!(attach().is_ok());
}

#[test]
fn test_heartbeat_is_sent_and_counted() {
    let mut env = TestEnvironment::started("<p>سلام دنیا</p>");
    env.advance_ms(30_000);

    assert_eq!(env.outbound.len(), 1);
    assert_eq!(env.engine.stats().counters.heartbeat_count, 1);
    let sent = env.outbound.sent.borrow();
    let OutboundMessage::Heartbeat { domain, stats, .. } = &sent[0];
    assert_eq!(domain, "example.com");
    assert!(stats.counters.processed_elements >= 1);
}

#[test]
fn test_heartbeat_failure_is_counted_not_retried() {
    let mut env = TestEnvironment::started("<p>سلام دنیا</p>");
    env.outbound.set_failing(true);
    let errors_before = env.engine.stats().counters.errors;

    env.advance_ms(30_000);
    assert_eq!(env.outbound.len(), 0);
    assert_eq!(env.engine.stats().counters.heartbeat_count, 0);
    assert_eq!(env.engine.stats().counters.errors, errors_before + 1);
    assert_eq!(
        env.engine.scheduler().due_at(TaskName::Heartbeat),
        Some(Duration::from_secs(60)),
        "失败后按原周期继续，不立即重试"
    );
}

#[test]
fn test_ping_and_stats_messages() {
    let mut env = TestEnvironment::started("<p>سلام دنیا</p>");
    env.settle();

    let ping = env.engine.handle_message(r#"{"action":"ping"}"#);
    let json: serde_json::Value = serde_json::from_str(&ping.to_json().unwrap()).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "alive");
    assert_eq!(json["stats"]["siteType"], "Other");

    let stats = env.engine.handle_message(r#"{"action":"getStats"}"#);
    let json: serde_json::Value = serde_json::from_str(&stats.to_json().unwrap()).unwrap();
    assert!(json["processedElements"].as_u64().unwrap() >= 1);
    assert_eq!(json["isActive"], true);
    assert_eq!(json["isSiteEnabled"], true);
    assert_eq!(json["config"]["font"], "vazir");
}

#[test]
fn test_domain_list_change_tears_down() {
    let mut env = TestEnvironment::started("<p id='p'>سلام دنیا</p>");
    env.settle();
    AssertionHelper::assert_persian(&env.by_id("p"));

    let response = env
        .engine
        .handle_message(r#"{"action":"updateSettings","enabledSites":["chatgpt.com"]}"#);
    assert!(response.is_success());
    assert!(!env.engine.is_running());
    AssertionHelper::assert_clean(&env.dom.document);

    env.engine
        .handle_message(r#"{"action":"updateSettings","enabledSites":["example.com"]}"#);
    assert!(env.engine.is_running());
    env.advance_ms(10);
    AssertionHelper::assert_persian(&env.by_id("p"));
}

#[test]
fn test_teardown_clears_caches() {
    let mut env = TestEnvironment::started("<p id='p'>سلام دنیا</p><p>Hello World</p>");
    env.settle();
    assert!(!env.engine.context().signatures.is_empty());
    assert!(!env.engine.context().languages.is_empty());

    env.engine.teardown();
    assert!(env.engine.context().signatures.is_empty());
    assert!(env.engine.context().languages.is_empty());
    assert_eq!(env.engine.stats().signature_cache_size, 0);
}

#[test]
fn test_enable_with_new_sensitivity_reclassifies() {
    let mut env = TestEnvironment::started("<p id='p'>س abc</p>");
    env.settle();
    let p = env.by_id("p");
    AssertionHelper::assert_english(&p);

    env.engine
        .handle_message(r#"{"action":"updateSettings","isEnabled":false}"#);
    AssertionHelper::assert_untouched(&p);

    // 启用和灵敏度在同一个补丁里
    let response = env.engine.handle_message(
        r#"{"action":"updateSettings","settings":{"isEnabled":true,"detectionMode":"high"}}"#,
    );
    assert!(response.is_success());
    env.advance_ms(10);
    AssertionHelper::assert_persian(&p);
    assert_eq!(env.engine.stats().counters.restored_from_cache, 0);
}

#[test]
fn test_full_reload_with_new_sensitivity_reclassifies() {
    let mut env = TestEnvironment::started("<p id='p'>س abc</p>");
    env.settle();
    AssertionHelper::assert_english(&env.by_id("p"));

    env.engine
        .handle_message(r#"{"action":"fullReload","settings":{"detectionSensitivity":"high"}}"#);
    env.advance_ms(3000);
    AssertionHelper::assert_persian(&env.by_id("p"));
}

#[test]
fn test_full_reload_schedules_passes_and_full_scan() {
    let mut env = TestEnvironment::started("<p id='p'>سلام دنیا</p>");
    env.settle();
    let now = env.engine.now();

    let response = env
        .engine
        .handle_message(r#"{"action":"fullReload","settings":{"selectedFont":"shabnam"}}"#);
    assert!(response.is_success());
    assert_eq!(env.engine.context().settings.font, FontChoice::Shabnam);
    for (index, delay) in [0u64, 200, 1000, 2000].iter().enumerate() {
        assert_eq!(
            env.engine.scheduler().due_at(TaskName::ImmediatePass(index as u8)),
            Some(now + Duration::from_millis(*delay))
        );
    }
    assert_eq!(
        env.engine.scheduler().due_at(TaskName::DeferredFullScan),
        Some(now + Duration::from_secs(1))
    );

    env.advance_ms(10);
    let p = env.by_id("p");
    AssertionHelper::assert_persian(&p);
    assert!(get_style_property(&p, "font-family").unwrap().contains("Shabnam"));
}

#[test]
fn test_smooth_reprocess_keeps_observers() {
    let mut env = TestEnvironment::started("<div id='feed'><p id='p'>سلام دنیا</p></div>");
    env.settle();

    env.engine.handle_message(r#"{"action":"smoothReprocess"}"#);
    assert!(env.engine.is_running());
    assert!(!tagger::has_marker(&env.by_id("p")));
    assert!(env.engine.context().signatures.is_empty());

    env.advance_ms(600);
    AssertionHelper::assert_persian(&env.by_id("p"));

    // 观察仍在进行
    let (p, record) = HtmlTestHelper::append_paragraph(&env.by_id("feed"), "متن تازه");
    env.engine
        .event_sender()
        .send(EngineEvent::Mutations(vec![record]))
        .unwrap();
    env.advance_ms(60);
    AssertionHelper::assert_persian(&p);
}

#[test]
fn test_mutation_storm_triggers_full_scan() {
    let mut env = TestEnvironment::started("<div id='feed'></div>");
    env.settle();
    let feed = env.by_id("feed");
    let records = (0..12)
        .map(|i| HtmlTestHelper::append_paragraph(&feed, &format!("پیام شماره {}", i)).1)
        .collect();
    env.engine
        .event_sender()
        .send(EngineEvent::Mutations(records))
        .unwrap();
    let full_scans = env.engine.stats().counters.full_scans;

    env.advance_ms(60);
    assert!(env.engine.scheduler().is_scheduled(TaskName::DeferredFullScan));
    env.advance_ms(2100);
    assert_eq!(env.engine.stats().counters.full_scans, full_scans + 1);
}

#[test]
fn test_input_events_follow_text() {
    let mut env = TestEnvironment::started(
        "<div class='composer' id='composer'><textarea id='t'></textarea></div>",
    );
    env.settle();
    let textarea = env.by_id("t");
    assert!(has_node_attr(&textarea, INPUT_HANDLED));

    ai_rtl::dom::set_text_content(&textarea, "سلام");
    env.engine
        .event_sender()
        .send(EngineEvent::Input {
            target: textarea.clone(),
            kind: InputEventKind::Input,
        })
        .unwrap();
    env.advance_ms(1);
    assert!(has_node_attr(&textarea, PERSIAN_INPUT_MARKER));
    assert_eq!(get_style_property(&textarea, "direction").as_deref(), Some("rtl"));
    let composer = env.by_id("composer");
    assert!(has_node_attr(&composer, WRAPPER_MARK));
    assert_eq!(get_style_property(&composer, "direction").as_deref(), Some("rtl"));

    // 粘贴延迟 10ms 评估
    ai_rtl::dom::set_text_content(&textarea, "pasted english text");
    env.engine
        .event_sender()
        .send(EngineEvent::Input {
            target: textarea.clone(),
            kind: InputEventKind::Paste,
        })
        .unwrap();
    env.advance_ms(1);
    assert!(has_node_attr(&textarea, PERSIAN_INPUT_MARKER), "粘贴后尚未评估");
    env.advance_ms(10);
    assert_eq!(get_style_property(&textarea, "direction").as_deref(), Some("ltr"));

}

#[test]
fn test_url_change_switches_site_profile() {
    let mut env = TestEngineBuilder::new("<div class='prose'><p id='p'>سلام دنیا</p></div>")
        .url("https://example.com/")
        .build();
    env.engine.start().unwrap();
    env.engine
        .event_sender()
        .send(EngineEvent::UrlChanged("https://www.perplexity.ai/search/1".into()))
        .unwrap();
    env.advance_ms(1);
    assert_eq!(env.engine.context().site.kind, SiteKind::Perplexity);
    assert!(env.engine.scheduler().is_scheduled(TaskName::SiteMonitor));
}

#[test]
fn test_export_command_builds_document() {
    let mut env = TestEngineBuilder::new(
        "<div data-message-author-role='user' id='u'>سلام</div>\
         <div data-message-author-role='assistant'><div class='markdown'>Hi there, how can I help?</div></div>",
    )
    .url("https://chatgpt.com/c/abc")
    .build();
    env.engine.start().unwrap();
    env.settle();

    let response = env.engine.handle_message(r#"{"action":"exportPdf"}"#);
    let json: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["messages"], 2);
    let html = json["html"].as_str().unwrap();
    assert!(html.contains("msg user rtl"));
    assert!(html.contains("msg assistant ltr"));
    assert!(html.contains("<div class=\"meta\">You</div>"));
}

#[test]
fn test_unknown_action_is_reported() {
    let mut env = TestEnvironment::started("<p>x</p>");
    let response = env.engine.handle_message(r#"{"action":"selfDestruct"}"#);
    assert!(!response.is_success());
    assert_eq!(
        response.to_json().unwrap(),
        r#"{"success":false,"error":"Unknown action"}"#
    );
    let malformed = env.engine.handle_message("{not json");
    assert!(!malformed.is_success());
}

#[test]
fn test_language_is_reexported() {
    assert_eq!(ai_rtl::classify("Hello World", Default::default()), Language::English);
}
