//! 布局探针
//!
//! 引擎本身不做排版。宿主通过 `LayoutProbe` 报告视口、元素矩形和计算样式；
//! `StaticLayout` 是无排版环境（命令行、测试）下的实现：所有挂在文档上的元素默认位于视口顶部、尺寸为零，
//! 计算样式回退到内联样式。

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use markup5ever_rcdom::Handle;

use super::node::is_attached;
use super::style::get_style_property;
use super::weak::WeakNodeMap;
use crate::error::{helpers, EngineResult};

/// 元素矩形，坐标相对视口（同 `getBoundingClientRect`）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// 是否落在上下各扩展 `margin` 的视口内
    pub fn is_near_viewport(&self, viewport: &Viewport, margin: f64) -> bool {
        self.top < viewport.height + margin && self.bottom() >= -margin
    }
}

/// 视口尺寸与文档滚动高度
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            scroll_height: 800.0,
        }
    }
}

/// 宿主布局接口
pub trait LayoutProbe {
    fn viewport(&self) -> Viewport;

    /// 元素矩形；已脱离文档的元素返回 DOM 错误
    fn rect(&self, node: &Handle) -> EngineResult<Rect>;

    /// 计算样式属性值
    fn computed_style(&self, node: &Handle, property: &str) -> Option<String>;
}

/// 无排版环境下的布局
#[derive(Default)]
pub struct StaticLayout {
    viewport: Cell<Viewport>,
    rects: RefCell<WeakNodeMap<Rect>>,
    styles: RefCell<WeakNodeMap<HashMap<String, String>>>,
}

impl StaticLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_viewport(viewport: Viewport) -> Self {
        let layout = Self::default();
        layout.viewport.set(viewport);
        layout
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.viewport.set(viewport);
    }

    /// 为元素指定矩形
    pub fn set_rect(&self, node: &Handle, rect: Rect) {
        self.rects.borrow_mut().insert(node, rect);
    }

    /// 模拟页面样式表对计算样式的影响
    pub fn set_computed_style(&self, node: &Handle, property: &str, value: &str) {
        let mut styles = self.styles.borrow_mut();
        let mut current = styles.get(node).cloned().unwrap_or_default();
        current.insert(property.to_ascii_lowercase(), value.to_string());
        styles.insert(node, current);
    }
}

impl LayoutProbe for StaticLayout {
    fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    fn rect(&self, node: &Handle) -> EngineResult<Rect> {
        if !is_attached(node) {
            return Err(helpers::detached("element"));
        }
        Ok(self.rects.borrow().get(node).copied().unwrap_or_default())
    }

    fn computed_style(&self, node: &Handle, property: &str) -> Option<String> {
        // 内联 !important 优先于页面样式表
        let inline = get_style_property(node, property);
        if inline.is_some() {
            return inline;
        }
        self.styles
            .borrow()
            .get(node)
            .and_then(|styles| styles.get(&property.to_ascii_lowercase()).cloned())
    }
}
