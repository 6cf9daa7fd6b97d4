//! 分类与样式引擎
//!
//! - `context` - 页面级共享状态
//! - `site` - 站点识别与站点参数
//! - `safety` - 元素资格过滤
//! - `tagger` - 标记与内联样式
//! - `processor` - 单元素处理流程
//! - `mutation` - 变更管道
//! - `sweep` - 视口扫描、全页扫描与补漏
//! - `input` - 输入框方向
//! - `scheduler` - 命名任务调度
//! - `events` - 宿主事件通道
//! - `stylesheet` - 页面样式表
//! - `stats` - 运行统计
//! - `orchestrator` - 生命周期与命令

pub mod context;
pub mod events;
pub mod input;
pub mod mutation;
pub mod orchestrator;
pub mod processor;
pub mod safety;
pub mod scheduler;
pub mod site;
pub mod stats;
pub mod stylesheet;
pub mod sweep;
pub mod tagger;

// ============================================================================
// 重新导出
// ============================================================================

pub use context::{PageContext, ProcessedSet};
pub use events::{EngineEvent, EventReceiver, EventSender};
pub use input::{InputAction, InputDirector, InputEventKind};
pub use mutation::{MutationPipeline, MutationRecord, PipelineState};
pub use orchestrator::Engine;
pub use processor::{process_batch, process_element, BatchReport, Outcome};
pub use scheduler::{Scheduler, TaskName, TaskPriority};
pub use site::{SiteKind, SiteProfile};
pub use stats::{EngineStats, StatsSnapshot};
pub use sweep::ViewportSweep;
pub use tagger::{Direction, StyleProfile};
