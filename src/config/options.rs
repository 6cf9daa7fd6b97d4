//! 引擎运行参数
//!
//! 提供统一的参数接口，支持 TOML 文件、环境变量和默认值。时间参数在文件里以毫秒/秒整数表示。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::error::{EngineError, EngineResult};

/// 引擎运行参数
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineOptions {
    // 变更管道
    pub mutation_debounce_ms: u64,
    pub large_swap_candidates: usize,

    // 视口扫描
    pub scroll_debounce_ms: u64,
    pub full_scan_batch: usize,
    pub full_scan_yield_ms: u64,
    pub full_scan_cooldown_secs: u64,
    pub force_interval_ms: u64,
    pub backstop_interval_ms: u64,
    pub immediate_batch: usize,
    pub recheck_limit: usize,
    pub observe_existing_limit: usize,

    // 缓存
    pub signature_cache_capacity: usize,
    pub language_cache_capacity: usize,

    // 生命周期
    pub heartbeat_interval_secs: u64,

    // 样式
    pub font_base_url: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            mutation_debounce_ms: constants::MUTATION_DEBOUNCE.as_millis() as u64,
            large_swap_candidates: constants::LARGE_SWAP_CANDIDATES,

            scroll_debounce_ms: constants::SCROLL_DEBOUNCE.as_millis() as u64,
            full_scan_batch: constants::FULL_SCAN_BATCH,
            full_scan_yield_ms: constants::FULL_SCAN_YIELD.as_millis() as u64,
            full_scan_cooldown_secs: constants::FULL_SCAN_COOLDOWN.as_secs(),
            force_interval_ms: constants::FORCE_INTERVAL.as_millis() as u64,
            backstop_interval_ms: constants::BACKSTOP_INTERVAL.as_millis() as u64,
            immediate_batch: constants::IMMEDIATE_BATCH,
            recheck_limit: constants::RECHECK_LIMIT,
            observe_existing_limit: constants::OBSERVE_EXISTING_LIMIT,

            signature_cache_capacity: constants::SIGNATURE_CACHE_CAPACITY,
            language_cache_capacity: constants::LANGUAGE_CACHE_CAPACITY,

            heartbeat_interval_secs: constants::HEARTBEAT_INTERVAL.as_secs(),

            font_base_url: constants::DEFAULT_FONT_BASE_URL.to_string(),
        }
    }
}

impl EngineOptions {
    /// 从 TOML 文本加载
    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        let options: EngineOptions = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// 从文件加载
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content).map_err(|e| e.with_context(path.display()))
    }

    /// 按优先级加载：显式路径 > `AI_RTL_CONFIG` > 搜索路径 > 默认值，最后应用环境变量覆盖
    pub fn load(explicit: Option<&Path>) -> EngineResult<Self> {
        use crate::env::{core::ConfigPath, EnvVar};

        let mut options = if let Some(path) = explicit {
            Self::from_file(path)?
        } else if let Ok(Some(path)) = ConfigPath::try_get() {
            Self::from_file(path)?
        } else if let Some(path) = constants::CONFIG_PATHS
            .iter()
            .map(Path::new)
            .find(|path| path.is_file())
        {
            tracing::debug!("using engine options from {}", path.display());
            Self::from_file(path)?
        } else {
            Self::default()
        };

        options.apply_env_overrides();
        options.validate()?;
        Ok(options)
    }

    /// 验证参数
    pub fn validate(&self) -> EngineResult<()> {
        if self.mutation_debounce_ms == 0 {
            return Err(EngineError::Config(
                "mutation_debounce_ms must be greater than 0".to_string(),
            ));
        }
        if self.full_scan_batch == 0 || self.immediate_batch == 0 {
            return Err(EngineError::Config(
                "scan batch sizes must be greater than 0".to_string(),
            ));
        }
        if self.signature_cache_capacity == 0 || self.language_cache_capacity == 0 {
            return Err(EngineError::Config(
                "cache capacities must be greater than 0".to_string(),
            ));
        }
        if self.force_interval_ms == 0 || self.backstop_interval_ms == 0 {
            return Err(EngineError::Config(
                "periodic intervals must be greater than 0".to_string(),
            ));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(EngineError::Config(
                "heartbeat_interval_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 应用环境变量覆盖（只覆盖显式设置的变量）
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{engine, EnvVar};

        match engine::MutationDebounce::try_get() {
            Ok(Some(debounce)) => self.mutation_debounce_ms = debounce.as_millis() as u64,
            Ok(None) => {}
            Err(e) => tracing::warn!("{}", e),
        }

        match engine::FullScanCooldown::try_get() {
            Ok(Some(cooldown)) => self.full_scan_cooldown_secs = cooldown.as_secs(),
            Ok(None) => {}
            Err(e) => tracing::warn!("{}", e),
        }

        match engine::FontBaseUrl::try_get() {
            Ok(Some(url)) => {
                tracing::info!("环境变量覆盖字体 URL: {}", url);
                self.font_base_url = url;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("{}", e),
        }
    }

    pub fn mutation_debounce(&self) -> Duration {
        Duration::from_millis(self.mutation_debounce_ms)
    }

    pub fn scroll_debounce(&self) -> Duration {
        Duration::from_millis(self.scroll_debounce_ms)
    }

    pub fn full_scan_yield(&self) -> Duration {
        Duration::from_millis(self.full_scan_yield_ms)
    }

    pub fn full_scan_cooldown(&self) -> Duration {
        Duration::from_secs(self.full_scan_cooldown_secs)
    }

    pub fn force_interval(&self) -> Duration {
        Duration::from_millis(self.force_interval_ms)
    }

    pub fn backstop_interval(&self) -> Duration {
        Duration::from_millis(self.backstop_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}
