//! 元素标记器
//!
//! 设置/清除语言标记属性和内联方向样式，全部带 `!important`。已有属性原地更新，
//! 同一元素重复标记得到逐字节相同的结果。

use markup5ever_rcdom::Handle;

use crate::config::Settings;
use crate::detection::Language;
use crate::dom::{
    has_node_attr, remove_node_attr, remove_style_properties, remove_style_property,
    set_node_attr, set_style_property,
};

// ============================================================================
// 标记属性
// ============================================================================

pub const PERSIAN_MARKER: &str = "data-ai-rtl-persian-text";
pub const ENGLISH_MARKER: &str = "data-ai-rtl-english-text";
pub const PERSIAN_INPUT_MARKER: &str = "data-ai-rtl-persian-input";
pub const ENGLISH_INPUT_MARKER: &str = "data-ai-rtl-english-input";
/// 已注册的输入框
pub const INPUT_HANDLED: &str = "data-rtl-handled-ai-studio";
/// 兜底扫描已评估过的元素
pub const SWEEP_MARK: &str = "data-ai-rtl-processed";
/// 输入框外层包装
pub const WRAPPER_MARK: &str = "data-ai-rtl-styled";
/// 挂载标记，位于 `<html>`
pub const ENGINE_GUARD: &str = "data-ai-rtl-engine";

/// 引擎写入的全部属性（卸载时清除）
pub const ALL_MARKERS: &[&str] = &[
    PERSIAN_MARKER,
    ENGLISH_MARKER,
    PERSIAN_INPUT_MARKER,
    ENGLISH_INPUT_MARKER,
    INPUT_HANDLED,
    SWEEP_MARK,
    WRAPPER_MARK,
];

/// 方向相关的内联样式属性
pub const DIRECTIONAL_PROPERTIES: &[&str] = &[
    "direction",
    "text-align",
    "unicode-bidi",
    "font-family",
    "font-size",
];

const FONT_PROPERTIES: &[&str] = &["font-family", "font-size"];

// ============================================================================
// 样式参数
// ============================================================================

/// 当前设置下波斯语元素的字体与字号
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StyleProfile {
    pub font_family: Option<&'static str>,
    pub font_size: Option<&'static str>,
}

impl StyleProfile {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            font_family: settings.font.family(),
            font_size: settings.font_size.css(),
        }
    }
}

/// 书写方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rtl,
    Ltr,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Rtl => "rtl",
            Direction::Ltr => "ltr",
        }
    }

    pub fn text_align(&self) -> &'static str {
        match self {
            Direction::Rtl => "right",
            Direction::Ltr => "left",
        }
    }
}

/// 写入方向、对齐和 bidi 隔离；`fonts` 为真时按参数写入或删除字体，否则删除字体
pub fn set_direction_styles(
    element: &Handle,
    direction: Direction,
    profile: StyleProfile,
    fonts: bool,
) {
    set_style_property(element, "direction", direction.as_str(), true);
    set_style_property(element, "text-align", direction.text_align(), true);
    set_style_property(element, "unicode-bidi", "isolate", true);

    if !fonts {
        remove_style_properties(element, FONT_PROPERTIES);
        return;
    }
    match profile.font_family {
        Some(family) => set_style_property(element, "font-family", family, true),
        None => remove_style_property(element, "font-family"),
    }
    match profile.font_size {
        Some(size) => set_style_property(element, "font-size", size, true),
        None => remove_style_property(element, "font-size"),
    }
}

// ============================================================================
// 静态文本标记
// ============================================================================

/// 按分类结果标记元素
pub fn apply(element: &Handle, language: Language, profile: StyleProfile) {
    match language {
        Language::Persian => {
            set_node_attr(element, PERSIAN_MARKER, Some("true"));
            remove_node_attr(element, ENGLISH_MARKER);
            set_direction_styles(element, Direction::Rtl, profile, true);
        }
        Language::English => {
            set_node_attr(element, ENGLISH_MARKER, Some("true"));
            remove_node_attr(element, PERSIAN_MARKER);
            set_direction_styles(element, Direction::Ltr, profile, false);
        }
        Language::Unknown => clear(element),
    }
}

/// 清除文本标记和方向样式
pub fn clear(element: &Handle) {
    remove_node_attr(element, PERSIAN_MARKER);
    remove_node_attr(element, ENGLISH_MARKER);
    remove_style_properties(element, DIRECTIONAL_PROPERTIES);
}

/// 元素当前的文本标记
pub fn marker_of(element: &Handle) -> Option<Language> {
    if has_node_attr(element, PERSIAN_MARKER) {
        Some(Language::Persian)
    } else if has_node_attr(element, ENGLISH_MARKER) {
        Some(Language::English)
    } else {
        None
    }
}

pub fn has_marker(element: &Handle) -> bool {
    marker_of(element).is_some()
}

/// 波斯语元素的内联样式是否被页面改掉；返回需要重设的属性
pub fn drifted_properties(
    profile: StyleProfile,
    computed: impl Fn(&str) -> Option<String>,
) -> Vec<&'static str> {
    let mut drifted = Vec::new();
    if computed("direction").as_deref() != Some("rtl") {
        drifted.push("direction");
    }
    if computed("text-align").as_deref() != Some("right") {
        drifted.push("text-align");
    }
    if computed("unicode-bidi").as_deref() != Some("isolate") {
        drifted.push("unicode-bidi");
    }
    if profile.font_family.is_some() {
        let family = computed("font-family").unwrap_or_default();
        if !family.contains("Vazir") && !family.contains("Shabnam") {
            drifted.push("font-family");
        }
    }
    if let Some(size) = profile.font_size {
        if computed("font-size").as_deref() != Some(size) {
            drifted.push("font-size");
        }
    }
    drifted
}

/// 重设漂移的属性
pub fn restyle(element: &Handle, properties: &[&str], profile: StyleProfile) {
    for property in properties {
        match *property {
            "direction" => set_style_property(element, "direction", "rtl", true),
            "text-align" => set_style_property(element, "text-align", "right", true),
            "unicode-bidi" => set_style_property(element, "unicode-bidi", "isolate", true),
            "font-family" => {
                if let Some(family) = profile.font_family {
                    set_style_property(element, "font-family", family, true);
                }
            }
            "font-size" => {
                if let Some(size) = profile.font_size {
                    set_style_property(element, "font-size", size, true);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FontChoice, FontSize};
    use crate::dom::{find_by_id, get_node_attr, get_style_property, parse_html};

    fn vazir() -> StyleProfile {
        StyleProfile::from_settings(&Settings::default())
    }

    #[test]
    fn test_persian_tagging() {
        let dom = parse_html("<p id='p'>سلام</p>").unwrap();
        let p = find_by_id(&dom.document, "p").unwrap();
        apply(&p, Language::Persian, vazir());

        assert_eq!(marker_of(&p), Some(Language::Persian));
        assert_eq!(get_style_property(&p, "direction").as_deref(), Some("rtl"));
        assert_eq!(get_style_property(&p, "text-align").as_deref(), Some("right"));
        assert_eq!(get_style_property(&p, "unicode-bidi").as_deref(), Some("isolate"));
        assert!(get_style_property(&p, "font-family").unwrap().contains("VazirAIStudio"));
        assert_eq!(get_style_property(&p, "font-size"), None);
    }

    #[test]
    fn test_markers_are_mutually_exclusive() {
        let dom = parse_html("<p id='p'>x</p>").unwrap();
        let p = find_by_id(&dom.document, "p").unwrap();

        apply(&p, Language::Persian, vazir());
        apply(&p, Language::English, vazir());
        assert!(has_node_attr(&p, ENGLISH_MARKER));
        assert!(!has_node_attr(&p, PERSIAN_MARKER), "两种标记不能同时存在");
        assert_eq!(get_style_property(&p, "font-family"), None);
        assert_eq!(get_style_property(&p, "direction").as_deref(), Some("ltr"));

        apply(&p, Language::Unknown, vazir());
        assert_eq!(marker_of(&p), None);
        assert_eq!(get_node_attr(&p, "style"), None);
    }

    #[test]
    fn test_idempotent() {
        let dom = parse_html("<p id='p' style='color: red'>سلام</p>").unwrap();
        let p = find_by_id(&dom.document, "p").unwrap();
        let profile = StyleProfile::from_settings(&Settings {
            font: FontChoice::Shabnam,
            font_size: FontSize::Large,
            ..Settings::default()
        });

        apply(&p, Language::Persian, profile);
        let first = get_node_attr(&p, "style");
        apply(&p, Language::Persian, profile);
        assert_eq!(get_node_attr(&p, "style"), first);
        assert!(first.unwrap().starts_with("color: red;"));
    }

    #[test]
    fn test_default_font_removes_overrides() {
        let dom = parse_html("<p id='p'>سلام</p>").unwrap();
        let p = find_by_id(&dom.document, "p").unwrap();
        apply(&p, Language::Persian, vazir());

        let plain = StyleProfile::from_settings(&Settings {
            font: FontChoice::Default,
            ..Settings::default()
        });
        apply(&p, Language::Persian, plain);
        assert_eq!(get_style_property(&p, "font-family"), None);
    }

    #[test]
    fn test_drift_detection() {
        let dom = parse_html("<p id='p'>سلام</p>").unwrap();
        let p = find_by_id(&dom.document, "p").unwrap();
        let profile = vazir();
        apply(&p, Language::Persian, profile);

        let inline = |name: &str| get_style_property(&p, name);
        assert!(drifted_properties(profile, inline).is_empty());

        set_style_property(&p, "text-align", "left", false);
        let drifted = drifted_properties(profile, |name| get_style_property(&p, name));
        assert_eq!(drifted, vec!["text-align"]);

        restyle(&p, &drifted, profile);
        assert_eq!(get_style_property(&p, "text-align").as_deref(), Some("right"));
    }
}
