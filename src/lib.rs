//! # ai-rtl
//!
//! 在持续变化的 HTML 文档里识别波斯语文本并施加从右到左的样式，英文和代码保持从左到右。
//!
//! ## 模块组织
//!
//! - `detection` - 语言分类器与缓存
//! - `dom` - DOM 辅助、选择器、布局探针
//! - `engine` - 变更管道、视口扫描、输入处理与引擎编排
//! - `config` - 设置、引擎参数与常量
//! - `messaging` - 入站命令与出站心跳
//! - `export` - 对话导出
//! - `core` - 离线标注
//! - `driver` - tokio 实时驱动（可选）

pub mod config;
pub mod core;
pub mod detection;
pub mod dom;
#[cfg(feature = "runtime")]
pub mod driver;
pub mod engine;
pub mod env;
pub mod error;
pub mod export;
pub mod messaging;

// Re-export commonly used items for convenience
pub use config::{EngineOptions, Settings, SettingsPatch};
pub use detection::{classify, Language};
pub use engine::{Engine, EngineEvent};
pub use error::{EngineError, EngineResult};
pub use messaging::{Command, Outbound, OutboundMessage, Response};

/// 初始化日志：`RUST_LOG` 优先，其次 `level`
#[cfg(feature = "cli")]
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ai_rtl={},warn", level)));
    // 重复初始化（例如测试里）时静默忽略
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
