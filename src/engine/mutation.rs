//! 变更管道
//!
//! 状态机：`Idle -> Observing -> DebouncedPending -> Processing -> Observing`。
//!
//! - 只有相关的变更记录才会（重新）开始防抖计时
//! - 防抖到期后展开候选元素、去重，逐个交给处理流程
//! - `Idle` 状态下收到的记录直接丢弃

use std::collections::HashSet;

use markup5ever_rcdom::{Handle, NodeData};
use tracing::{debug, trace};

use super::context::PageContext;
use super::processor::{self, BatchReport};
use super::site::{CHAT_MESSAGE_ANCESTORS, CHAT_TEXT_CONTAINERS};
use crate::dom::{closest, is_element, parent_element, query_all, NodeKey, TEXT_BEARING};

/// 一条 DOM 变更记录
#[derive(Debug, Clone)]
pub enum MutationRecord {
    /// 子节点增加
    ChildList { target: Handle, added: Vec<Handle> },
    /// 文本内容变化；目标可以是文本节点或元素
    CharacterData { target: Handle },
    /// 属性变化，始终不相关
    Attributes { target: Handle, name: String },
}

/// 管道状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Observing,
    DebouncedPending,
    Processing,
}

/// 一次刷新的结果
#[derive(Debug, Clone, Default)]
pub struct FlushReport {
    pub candidates: usize,
    pub batch: BatchReport,
    /// 新增节点的根，之后交给输入处理扫描
    pub added_roots: Vec<Handle>,
}

/// 变更管道
pub struct MutationPipeline {
    state: PipelineState,
    observe_text: bool,
    pending: Vec<MutationRecord>,
    dropped: u64,
}

impl Default for MutationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationPipeline {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            observe_text: false,
            pending: Vec::new(),
            dropped: 0,
        }
    }

    /// 开始观察；只有聊天站点观察文本变化
    pub fn start(&mut self, observe_text: bool) {
        self.state = PipelineState::Observing;
        self.observe_text = observe_text;
        self.pending.clear();
    }

    pub fn stop(&mut self) {
        self.state = PipelineState::Idle;
        self.pending.clear();
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn observes_text(&self) -> bool {
        self.observe_text
    }

    /// 被丢弃的记录数
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// 接收一批记录；返回值为真表示需要（重新）开始防抖计时
    pub fn accept(&mut self, ctx: &PageContext, records: Vec<MutationRecord>) -> bool {
        if self.state == PipelineState::Idle {
            self.dropped += records.len() as u64;
            return false;
        }

        let before = self.pending.len();
        for record in records {
            if is_relevant(ctx, &record, self.observe_text) {
                self.pending.push(record);
            } else {
                self.dropped += 1;
            }
        }
        if self.pending.len() == before {
            return false;
        }

        self.state = PipelineState::DebouncedPending;
        true
    }

    /// 防抖到期：展开候选并处理
    pub fn flush(&mut self, ctx: &mut PageContext) -> FlushReport {
        if self.state != PipelineState::DebouncedPending {
            return FlushReport::default();
        }
        self.state = PipelineState::Processing;

        let records = std::mem::take(&mut self.pending);
        let (candidates, added_roots) = expand_candidates(&records);
        let batch = processor::process_batch(ctx, &candidates);
        debug!(
            "变更刷新: {} 条记录, {} 个候选, 标记 {}",
            records.len(),
            candidates.len(),
            batch.changed()
        );

        self.state = PipelineState::Observing;
        FlushReport {
            candidates: candidates.len(),
            batch,
            added_roots,
        }
    }
}

/// 记录是否值得处理
pub fn is_relevant(ctx: &PageContext, record: &MutationRecord, observe_text: bool) -> bool {
    match record {
        MutationRecord::ChildList { target, added } => {
            if !added.iter().any(is_element) {
                return false;
            }
            if !ctx.site.is_chat() && is_scroll_container(ctx, target) {
                trace!("忽略滚动容器内的新增节点");
                return false;
            }
            true
        }
        MutationRecord::CharacterData { target } => {
            if !observe_text {
                return false;
            }
            nearest_element(target).is_some_and(|el| closest(&el, CHAT_TEXT_CONTAINERS).is_some())
        }
        MutationRecord::Attributes { .. } => false,
    }
}

/// 计算样式的 overflow 为 scroll/auto
pub fn is_scroll_container(ctx: &PageContext, element: &Handle) -> bool {
    ["overflow-y", "overflow-x"].iter().any(|property| {
        ctx.layout
            .computed_style(element, property)
            .is_some_and(|value| value == "scroll" || value == "auto")
    })
}

fn nearest_element(node: &Handle) -> Option<Handle> {
    match node.data {
        NodeData::Text { .. } => parent_element(node),
        NodeData::Element { .. } => Some(node.clone()),
        _ => None,
    }
}

/// 展开并去重候选元素，保持首次出现的顺序
fn expand_candidates(records: &[MutationRecord]) -> (Vec<Handle>, Vec<Handle>) {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    let mut roots = Vec::new();
    let mut push = |node: Handle, candidates: &mut Vec<Handle>| {
        if seen.insert(NodeKey::of(&node)) {
            candidates.push(node);
        }
    };

    for record in records {
        match record {
            MutationRecord::ChildList { added, .. } => {
                for node in added.iter().filter(|node| is_element(node)) {
                    roots.push(node.clone());
                    push(node.clone(), &mut candidates);
                    for child in query_all(node, TEXT_BEARING) {
                        push(child, &mut candidates);
                    }
                }
            }
            MutationRecord::CharacterData { target } => {
                if let Some(element) = nearest_element(target) {
                    if let Some(message) = closest(&element, CHAT_MESSAGE_ANCESTORS) {
                        push(element, &mut candidates);
                        push(message, &mut candidates);
                    } else {
                        push(element, &mut candidates);
                    }
                }
            }
            MutationRecord::Attributes { .. } => {}
        }
    }
    (candidates, roots)
}
