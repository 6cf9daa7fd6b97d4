//! DOM 模块
//!
//! - `node` - 节点遍历与属性读写
//! - `style` - 内联样式声明
//! - `selector` - 引擎使用的固定选择器
//! - `layout` - 宿主布局探针
//! - `weak` - 弱引用节点表
//! - `serializer` - 文档序列化

pub mod layout;
pub mod node;
pub mod selector;
pub mod serializer;
pub mod style;
pub mod weak;

// ============================================================================
// 重新导出
// ============================================================================

pub use layout::{LayoutProbe, Rect, StaticLayout, Viewport};
pub use node::{
    ancestors, append_child, body_element, child_element_count, child_elements, class_list,
    create_element, create_text, descendants, detach, document_element, find_by_id,
    first_text_child, get_child_node_by_name, get_node_attr, get_node_name, get_parent_node,
    has_node_attr, head_element, html_to_dom, inner_text, is_attached, is_element, is_tag,
    parent_element, parse_html, remove_node_attr, set_node_attr, set_text_content, set_text_data,
};
pub use selector::{
    closest, contains_match, has_ancestor, matches_any, query_all, Selector, TEXT_BEARING,
};
pub use serializer::{inner_html, serialize_document};
pub use style::{get_style_property, remove_style_properties, remove_style_property, set_style_property};
pub use weak::{NodeKey, WeakNodeMap, WeakNodeSet};
