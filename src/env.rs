//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。所有变量以 `AI_RTL_` 为前缀。

use std::env;
use std::fmt;
use std::time::Duration;

use crate::config::{FontChoice, Sensitivity};

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 读取变量，未设置时回退到默认值
    fn get() -> EnvResult<T> {
        match Self::try_get()? {
            Some(value) => Ok(value),
            None => Self::DEFAULT.ok_or_else(|| EnvError {
                variable: Self::NAME.to_string(),
                message: "Required environment variable not set".to_string(),
            }),
        }
    }

    /// 仅在变量被显式设置时返回值，用于覆盖配置文件
    fn try_get() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) if !value.trim().is_empty() => Self::parse(&value).map(Some),
            _ => Ok(None),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

fn invalid(name: &str, message: impl Into<String>) -> EnvError {
    EnvError {
        variable: name.to_string(),
        message: message.into(),
    }
}

fn parse_millis(value: &str, name: &str, min: u64, max: u64) -> EnvResult<Duration> {
    let millis: u64 = value
        .trim()
        .parse()
        .map_err(|_| invalid(name, "Must be a valid number of milliseconds"))?;
    if millis < min || millis > max {
        return Err(invalid(
            name,
            format!("Value out of range ({}..={} ms)", min, max),
        ));
    }
    Ok(Duration::from_millis(millis))
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "AI_RTL_LOG_LEVEL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn get() -> EnvResult<String> {
            Ok(Self::try_get()?.unwrap_or_else(|| "info".to_string()))
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.trim().to_lowercase().as_str() {
                level @ ("trace" | "debug" | "info" | "warn" | "error") => Ok(level.to_string()),
                _ => Err(invalid(
                    Self::NAME,
                    format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                )),
            }
        }
    }

    /// 配置文件路径
    pub struct ConfigPath;
    impl EnvVar<String> for ConfigPath {
        const NAME: &'static str = "AI_RTL_CONFIG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Path to an engine options TOML file";

        fn parse(value: &str) -> EnvResult<String> {
            Ok(value.trim().to_string())
        }
    }
}

/// 引擎相关环境变量
pub mod engine {
    use super::*;

    /// 默认检测灵敏度
    pub struct DetectionSensitivity;
    impl EnvVar<Sensitivity> for DetectionSensitivity {
        const NAME: &'static str = "AI_RTL_SENSITIVITY";
        const DEFAULT: Option<Sensitivity> = Some(Sensitivity::Medium);
        const DESCRIPTION: &'static str = "Detection sensitivity: high, medium, low";

        fn parse(value: &str) -> EnvResult<Sensitivity> {
            value
                .parse()
                .map_err(|e: crate::error::EngineError| invalid(Self::NAME, e.to_string()))
        }
    }

    /// 默认字体
    pub struct Font;
    impl EnvVar<FontChoice> for Font {
        const NAME: &'static str = "AI_RTL_FONT";
        const DEFAULT: Option<FontChoice> = Some(FontChoice::Vazir);
        const DESCRIPTION: &'static str = "Font for Persian text: vazir, shabnam, default";

        fn parse(value: &str) -> EnvResult<FontChoice> {
            value
                .parse()
                .map_err(|e: crate::error::EngineError| invalid(Self::NAME, e.to_string()))
        }
    }

    /// 字体文件的基础 URL
    pub struct FontBaseUrl;
    impl EnvVar<String> for FontBaseUrl {
        const NAME: &'static str = "AI_RTL_FONT_BASE_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Base URL that vazir.woff2 and shabnam.woff2 are served from";

        fn parse(value: &str) -> EnvResult<String> {
            let url = value.trim();
            if url.contains(['"', '\'', '(', ')']) {
                return Err(invalid(Self::NAME, "URL must not contain quotes or parentheses"));
            }
            Ok(url.to_string())
        }
    }

    /// 变更防抖时间
    pub struct MutationDebounce;
    impl EnvVar<Duration> for MutationDebounce {
        const NAME: &'static str = "AI_RTL_DEBOUNCE_MS";
        const DEFAULT: Option<Duration> = Some(Duration::from_millis(50));
        const DESCRIPTION: &'static str = "Mutation debounce in milliseconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            parse_millis(value, Self::NAME, 1, 5_000)
        }
    }

    /// 全页扫描冷却时间
    pub struct FullScanCooldown;
    impl EnvVar<Duration> for FullScanCooldown {
        const NAME: &'static str = "AI_RTL_FULL_SCAN_COOLDOWN_SECS";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(15));
        const DESCRIPTION: &'static str = "Minimum seconds between two full page scans";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds: u64 = value
                .trim()
                .parse()
                .map_err(|_| invalid(Self::NAME, "Must be a valid number of seconds"))?;
            if seconds == 0 || seconds > 600 {
                return Err(invalid(Self::NAME, "Cooldown must be within 1..=600 seconds"));
            }
            Ok(Duration::from_secs(seconds))
        }
    }
}

/// 列出所有已知变量，供 `--help` 之类的输出使用
pub fn describe_all() -> Vec<(&'static str, &'static str)> {
    vec![
        (core::LogLevel::NAME, core::LogLevel::DESCRIPTION),
        (core::ConfigPath::NAME, core::ConfigPath::DESCRIPTION),
        (
            engine::DetectionSensitivity::NAME,
            engine::DetectionSensitivity::DESCRIPTION,
        ),
        (engine::Font::NAME, engine::Font::DESCRIPTION),
        (engine::FontBaseUrl::NAME, engine::FontBaseUrl::DESCRIPTION),
        (
            engine::MutationDebounce::NAME,
            engine::MutationDebounce::DESCRIPTION,
        ),
        (
            engine::FullScanCooldown::NAME,
            engine::FullScanCooldown::DESCRIPTION,
        ),
    ]
}
