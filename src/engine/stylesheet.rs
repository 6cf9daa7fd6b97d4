//! 页面样式表
//!
//! `<head>` 中的 `<style id="ai-rtl-fonts">`：字体声明、标记规则、输入框规则，以及让波斯语元素内的代码
//! 保持从左到右的规则。重新配置时整块替换，卸载时删除。

use std::fmt::Write as _;

use markup5ever_rcdom::Handle;
use tracing::debug;

use super::tagger::{
    ENGLISH_INPUT_MARKER, ENGLISH_MARKER, PERSIAN_INPUT_MARKER, PERSIAN_MARKER, StyleProfile,
};
use crate::config::constants;
use crate::dom::{
    append_child, create_element, detach, document_element, find_by_id, head_element,
    set_text_content,
};
use crate::error::{EngineError, EngineResult};

const TEXT_TAGS: &[&str] = &[
    "p", "span", "h1", "h2", "h3", "h4", "h5", "h6", "li", "td", "th", "blockquote", "div",
];

const INPUT_TARGETS: &[&str] = &[
    "input",
    "textarea",
    "[contenteditable=\"true\"]",
    "[role=\"textbox\"]",
];

const ANSWER_SCOPES: &[&str] = &[
    ".prose",
    "[data-testid=\"answer\"]",
    ".answer",
    "[data-cplx-component=\"message-block-answer\"]",
    ".max-w-threadContentWidth",
    ".group\\/query",
];

fn selector_list(targets: &[&str], marker: &str) -> String {
    targets
        .iter()
        .map(|target| format!("{}[{}=\"true\"]", target, marker))
        .collect::<Vec<_>>()
        .join(",\n")
}

fn font_declarations(profile: StyleProfile) -> String {
    let mut css = String::new();
    if let Some(family) = profile.font_family {
        let _ = writeln!(css, "  font-family: {} !important;", family);
    }
    if let Some(size) = profile.font_size {
        let _ = writeln!(css, "  font-size: {} !important;", size);
    }
    css
}

/// 生成样式表文本
pub fn build_css(profile: StyleProfile, font_base_url: &str) -> String {
    let fonts = font_declarations(profile);
    let rtl = format!(
        "  direction: rtl !important;\n  text-align: right !important;\n{}  unicode-bidi: isolate !important;\n",
        fonts
    );
    let ltr = "  direction: ltr !important;\n  text-align: left !important;\n  unicode-bidi: isolate !important;\n";

    let answer_targets: Vec<String> = ANSWER_SCOPES
        .iter()
        .flat_map(|scope| {
            ["p", "span", "h1", "h2", "h3"]
                .iter()
                .map(move |tag| format!("{} {}[{}=\"true\"]", scope, tag, PERSIAN_MARKER))
        })
        .collect();

    let mut css = String::new();
    for (family, file) in [("VazirAIStudio", "vazir.woff2"), ("ShabnamAIStudio", "shabnam.woff2")] {
        let _ = writeln!(
            css,
            "@font-face {{\n  font-family: '{}';\n  src: url('{}{}') format('woff2');\n  font-display: swap;\n  font-weight: normal;\n  font-style: normal;\n}}",
            family, font_base_url, file
        );
    }
    let _ = writeln!(css, "{} {{\n{}}}", selector_list(TEXT_TAGS, PERSIAN_MARKER), rtl);
    let _ = writeln!(
        css,
        "[{}=\"true\"] *:not(code):not(pre):not([class*=\"language-\"]) {{\n{}}}",
        PERSIAN_MARKER, fonts
    );
    let _ = writeln!(css, "{} {{\n{}}}", selector_list(TEXT_TAGS, ENGLISH_MARKER), ltr);
    let _ = writeln!(css, "{} {{\n{}}}", selector_list(INPUT_TARGETS, PERSIAN_INPUT_MARKER), rtl);
    let _ = writeln!(css, "{} {{\n{}}}", selector_list(INPUT_TARGETS, ENGLISH_INPUT_MARKER), ltr);
    let _ = writeln!(
        css,
        "[{m}=\"true\"] code,\n[{m}=\"true\"] pre,\n[{m}=\"true\"] .hljs,\n[{m}=\"true\"] .highlight,\n[{m}=\"true\"] [class*=\"language-\"] {{\n  direction: ltr !important;\n  text-align: left !important;\n  font-family: 'Consolas', 'Monaco', 'Courier New', monospace !important;\n  unicode-bidi: normal !important;\n}}",
        m = PERSIAN_MARKER
    );
    let _ = writeln!(css, "{} {{\n{}}}", answer_targets.join(",\n"), rtl);
    css
}

/// 插入或整块替换样式表
pub fn inject(document: &Handle, profile: StyleProfile, font_base_url: &str) -> EngineResult<()> {
    remove(document);

    let parent = head_element(document)
        .or_else(|| document_element(document))
        .ok_or_else(|| EngineError::Dom("document has no <html> element".to_string()))?;

    let style = create_element("style", &[("id", constants::STYLESHEET_ID)]);
    set_text_content(&style, &build_css(profile, font_base_url));
    append_child(&parent, &style);
    debug!("样式表已注入");
    Ok(())
}

/// 删除样式表；返回是否存在
pub fn remove(document: &Handle) -> bool {
    match find_by_id(document, constants::STYLESHEET_ID) {
        Some(existing) => {
            detach(&existing);
            true
        }
        None => false,
    }
}
