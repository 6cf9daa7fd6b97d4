//! 命名任务调度器
//!
//! 所有等待都表示为虚拟时钟上的任务。每个名字最多一个条目，重新调度同名任务会替换旧条目，
//! 防抖就是"不断替换同一个一次性任务"。到期任务按（优先级，到期时间，登记顺序）依次弹出。

use std::collections::HashMap;
use std::time::Duration;

/// 任务优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    Critical = 0,
    High = 1,
    Normal = 2,
    Low = 3,
}

/// 任务名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskName {
    /// 变更防抖到期
    MutationFlush,
    /// 滚动防抖到期
    ScrollSettle,
    /// 滚动后的激进复查
    ScrollRecheck,
    /// 延迟的全页扫描
    DeferredFullScan,
    /// 全页扫描的下一批
    FullScanBatch,
    /// 立即处理（启动/重载/重处理各轮）
    ImmediatePass(u8),
    /// 粘贴后的输入框评估
    PasteFlush,
    /// 字体变更后刷新已标记元素
    FontRefresh,
    IntersectionPoll,
    ObserveExisting,
    AggressiveRecheck,
    ForceProcessing,
    BackstopScan,
    SiteMonitor,
    InputScan,
    ComposerSweep,
    Heartbeat,
}

impl TaskName {
    pub fn priority(&self) -> TaskPriority {
        match self {
            TaskName::PasteFlush | TaskName::MutationFlush => TaskPriority::Critical,
            TaskName::ScrollSettle
            | TaskName::ImmediatePass(_)
            | TaskName::FontRefresh
            | TaskName::IntersectionPoll => TaskPriority::High,
            TaskName::ScrollRecheck
            | TaskName::FullScanBatch
            | TaskName::DeferredFullScan
            | TaskName::SiteMonitor
            | TaskName::InputScan
            | TaskName::ComposerSweep
            | TaskName::AggressiveRecheck => TaskPriority::Normal,
            TaskName::ObserveExisting
            | TaskName::ForceProcessing
            | TaskName::BackstopScan
            | TaskName::Heartbeat => TaskPriority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    due: Duration,
    period: Option<Duration>,
    seq: u64,
}

/// 调度器
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: HashMap<TaskName, Entry>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, name: TaskName, due: Duration, period: Option<Duration>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.insert(name, Entry { due, period, seq });
    }

    /// 一次性任务；替换同名条目
    pub fn schedule_once(&mut self, name: TaskName, due: Duration) {
        self.insert(name, due, None);
    }

    /// 周期任务，首次在 `first_due` 执行；替换同名条目
    pub fn schedule_every(&mut self, name: TaskName, period: Duration, first_due: Duration) {
        let period = period.max(Duration::from_millis(1));
        self.insert(name, first_due, Some(period));
    }

    pub fn cancel(&mut self, name: TaskName) -> bool {
        self.tasks.remove(&name).is_some()
    }

    pub fn is_scheduled(&self, name: TaskName) -> bool {
        self.tasks.contains_key(&name)
    }

    pub fn due_at(&self, name: TaskName) -> Option<Duration> {
        self.tasks.get(&name).map(|entry| entry.due)
    }

    /// 最早的到期时间
    pub fn next_due(&self) -> Option<Duration> {
        self.tasks.values().map(|entry| entry.due).min()
    }

    /// 弹出一个到期任务；周期任务重新排到下一周期（错过的周期不补）
    pub fn pop_due(&mut self, now: Duration) -> Option<TaskName> {
        let (name, entry) = self
            .tasks
            .iter()
            .filter(|(_, entry)| entry.due <= now)
            .min_by_key(|(name, entry)| (name.priority(), entry.due, entry.seq))
            .map(|(name, entry)| (*name, *entry))?;

        match entry.period {
            Some(period) => {
                let mut next = entry.due + period;
                if next <= now {
                    next = now + period;
                }
                if let Some(slot) = self.tasks.get_mut(&name) {
                    slot.due = next;
                }
            }
            None => {
                self.tasks.remove(&name);
            }
        }
        Some(name)
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
