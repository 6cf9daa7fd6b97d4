//! 引擎配置模块
//!
//! - `settings` - 外部设置存储提供的只读快照（字体、字号、灵敏度、启用域名）
//! - `options` - 引擎内部的时间与数量参数，支持 TOML 文件和环境变量覆盖
//! - `constants` - 所有默认值

pub mod options;
pub mod settings;

// 重新导出主要类型
pub use options::EngineOptions;
pub use settings::{FontChoice, FontSize, Sensitivity, Settings, SettingsChange, SettingsPatch};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 语言检测
    pub const THRESHOLD_HIGH: f64 = 0.25;
    pub const THRESHOLD_MEDIUM: f64 = 0.4;
    pub const THRESHOLD_LOW: f64 = 0.6;
    pub const SHORT_TEXT_CHARS: usize = 10;
    pub const KEYWORD_TEXT_CHARS: usize = 20;

    // 缓存容量
    pub const SIGNATURE_CACHE_CAPACITY: usize = 1000;
    pub const LANGUAGE_CACHE_CAPACITY: usize = 200;
    pub const SIGNATURE_PREFIX_CHARS: usize = 50;

    // 变更管道
    pub const MUTATION_DEBOUNCE: Duration = Duration::from_millis(50);
    pub const LARGE_SWAP_CANDIDATES: usize = 10;
    pub const LARGE_SWAP_SCAN_DELAY: Duration = Duration::from_secs(2);

    // 视口扫描
    pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(200);
    pub const SCROLL_RECHECK_DELAY: Duration = Duration::from_millis(500);
    pub const VIEWPORT_MARGIN: f64 = 400.0;
    pub const VIEWPORT_MARGIN_EXPANDED: f64 = 1000.0;
    pub const RECHECK_MARGIN: f64 = 500.0;
    pub const INTERSECTION_MARGIN: f64 = 200.0;
    pub const OBSERVE_EXISTING_INTERVAL: Duration = Duration::from_secs(10);
    pub const OBSERVE_EXISTING_LIMIT: usize = 200;
    pub const FULL_SCAN_BATCH: usize = 50;
    pub const FULL_SCAN_YIELD: Duration = Duration::from_millis(10);
    pub const FULL_SCAN_COOLDOWN: Duration = Duration::from_secs(15);
    pub const FULL_SCAN_HEIGHT_FACTOR: f64 = 3.0;
    pub const FULL_SCAN_START_DELAY: Duration = Duration::from_secs(1);
    pub const RECHECK_LIMIT: usize = 100;
    pub const FORCE_INTERVAL: Duration = Duration::from_secs(2);
    pub const FORCE_BATCH: usize = 50;
    pub const FORCE_CHAT_LIMIT: usize = 20;
    pub const IMMEDIATE_BATCH: usize = 100;
    pub const BACKSTOP_INTERVAL: Duration = Duration::from_secs(5);

    // 输入框
    pub const COMPOSER_SWEEP_INTERVAL: Duration = Duration::from_millis(1500);
    pub const PASTE_DELAY: Duration = Duration::from_millis(10);
    pub const WRAPPER_LAYERS: usize = 2;

    // 生命周期
    pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
    pub const FONT_REFRESH_DELAY: Duration = Duration::from_millis(50);
    pub const START_PASS_DELAYS_MS: &[u64] = &[500, 1500, 3000];
    pub const RELOAD_PASS_DELAYS_MS: &[u64] = &[0, 200, 1000, 2000];
    pub const REPROCESS_PASS_DELAYS_MS: &[u64] = &[0, 100, 500];
    pub const RELOAD_FULL_SCAN_DELAY: Duration = Duration::from_secs(1);
    pub const SETTLE_HORIZON: Duration = Duration::from_secs(4);

    // 样式
    pub const DEFAULT_FONT_BASE_URL: &str = "fonts/";
    pub const STYLESHEET_ID: &str = "ai-rtl-fonts";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &["ai-rtl.toml", ".ai-rtl.toml"];
}
