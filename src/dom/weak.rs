//! 弱引用节点表
//!
//! 以节点地址为键、同时保存 `Weak<Node>`。节点被释放后对应条目自动失效，
//! 地址被复用时通过 `Weak::upgrade` + `Rc::ptr_eq` 排除误命中。`purge` 清理失效条目。

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};

/// 节点标识（地址）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(usize);

impl NodeKey {
    pub fn of(node: &Handle) -> Self {
        NodeKey(Rc::as_ptr(node) as usize)
    }
}

struct Slot<V> {
    node: Weak<Node>,
    value: V,
}

/// 弱键映射
pub struct WeakNodeMap<V> {
    slots: HashMap<NodeKey, Slot<V>>,
}

impl<V> Default for WeakNodeMap<V> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<V> WeakNodeMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_slot(&self, node: &Handle) -> Option<&Slot<V>> {
        self.slots.get(&NodeKey::of(node)).filter(|slot| {
            slot.node
                .upgrade()
                .is_some_and(|alive| Rc::ptr_eq(&alive, node))
        })
    }

    pub fn get(&self, node: &Handle) -> Option<&V> {
        self.live_slot(node).map(|slot| &slot.value)
    }

    pub fn contains(&self, node: &Handle) -> bool {
        self.live_slot(node).is_some()
    }

    pub fn insert(&mut self, node: &Handle, value: V) -> Option<V> {
        let previous = self.remove(node);
        self.slots.insert(
            NodeKey::of(node),
            Slot {
                node: Rc::downgrade(node),
                value,
            },
        );
        previous
    }

    pub fn remove(&mut self, node: &Handle) -> Option<V> {
        let key = NodeKey::of(node);
        let live = self.contains(node);
        let slot = self.slots.remove(&key)?;
        live.then_some(slot.value)
    }

    /// 清理已释放节点的条目，返回清理数量
    pub fn purge(&mut self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| slot.node.strong_count() > 0);
        before - self.slots.len()
    }

    /// 仍存活的节点
    pub fn nodes(&self) -> Vec<Handle> {
        self.slots
            .values()
            .filter_map(|slot| slot.node.upgrade())
            .collect()
    }

    /// 条目数（可能包含尚未清理的失效条目）
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// 弱引用节点集合
#[derive(Default)]
pub struct WeakNodeSet {
    inner: WeakNodeMap<()>,
}

impl WeakNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入，已存在时返回 false
    pub fn insert(&mut self, node: &Handle) -> bool {
        self.inner.insert(node, ()).is_none()
    }

    pub fn contains(&self, node: &Handle) -> bool {
        self.inner.contains(node)
    }

    pub fn remove(&mut self, node: &Handle) -> bool {
        self.inner.remove(node).is_some()
    }

    pub fn purge(&mut self) -> usize {
        self.inner.purge()
    }

    pub fn nodes(&self) -> Vec<Handle> {
        self.inner.nodes()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}
