//! 宿主事件
//!
//! 宿主把 DOM 变更、滚动、输入事件、可见性变化和地址变化作为 `EngineEvent` 发进通道，
//! 引擎在每次 `tick` 开始时一次取完。

use markup5ever_rcdom::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::input::InputEventKind;
use super::mutation::MutationRecord;

/// 宿主事件
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// 一批 DOM 变更记录
    Mutations(Vec<MutationRecord>),
    /// 滚动；`None` 表示窗口滚动
    Scroll { target: Option<Handle> },
    /// 输入框事件
    Input { target: Handle, kind: InputEventKind },
    /// 宿主报告进入视口的元素
    Intersection(Vec<Handle>),
    /// 单页应用地址变化
    UrlChanged(String),
}

pub type EventSender = UnboundedSender<EngineEvent>;
pub type EventReceiver = UnboundedReceiver<EngineEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// 取出通道里当前的全部事件
pub fn drain(receiver: &mut EventReceiver) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
