//! 引擎统一错误处理
//!
//! 除消息通道故障外，任何错误都不会中止引擎：DOM 瞬时错误在使用点被捕获、计数并跳过该元素，
//! 批处理循环逐元素捕获错误。消息错误返回给调用方，由调用方决定重试策略。

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// DOM 错误（节点已脱离文档、缺少必要结构）
    #[error("DOM error: {0}")]
    Dom(String),

    /// 配置错误
    #[error("configuration error: {0}")]
    Config(String),

    /// 解析错误
    #[error("parse error: {0}")]
    Parse(String),

    /// 外部消息层不可达
    #[error("messaging error: {0}")]
    Messaging(String),

    /// 序列化错误
    #[error("serialization error: {0}")]
    Serialization(String),

    /// 同一文档重复挂载引擎
    #[error("an engine is already attached to this document")]
    AlreadyAttached,

    /// 内部错误
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Dom(_) => true,
            EngineError::Config(_) => false,
            EngineError::Parse(_) => false,
            // 消息错误交给调用方处理，引擎内部不重试
            EngineError::Messaging(_) => false,
            EngineError::Serialization(_) => false,
            EngineError::AlreadyAttached => false,
            EngineError::Internal(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EngineError::Dom(_) => ErrorSeverity::Info,
            EngineError::Config(_) => ErrorSeverity::Critical,
            EngineError::Parse(_) => ErrorSeverity::Error,
            EngineError::Messaging(_) => ErrorSeverity::Warning,
            EngineError::Serialization(_) => ErrorSeverity::Error,
            EngineError::AlreadyAttached => ErrorSeverity::Warning,
            EngineError::Internal(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::Dom(_) => ErrorCategory::Dom,
            EngineError::Config(_) => ErrorCategory::Configuration,
            EngineError::Parse(_) => ErrorCategory::Parsing,
            EngineError::Messaging(_) => ErrorCategory::Messaging,
            EngineError::Serialization(_) => ErrorCategory::Serialization,
            EngineError::AlreadyAttached => ErrorCategory::Lifecycle,
            EngineError::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(self, context: T) -> Self {
        let wrap = |msg: String| format!("{} ({})", msg, context);
        match self {
            EngineError::Dom(msg) => EngineError::Dom(wrap(msg)),
            EngineError::Config(msg) => EngineError::Config(wrap(msg)),
            EngineError::Parse(msg) => EngineError::Parse(wrap(msg)),
            EngineError::Messaging(msg) => EngineError::Messaging(wrap(msg)),
            EngineError::Serialization(msg) => EngineError::Serialization(wrap(msg)),
            EngineError::Internal(msg) => EngineError::Internal(wrap(msg)),
            EngineError::AlreadyAttached => EngineError::AlreadyAttached,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Dom,
    Configuration,
    Parsing,
    Messaging,
    Serialization,
    Lifecycle,
    Internal,
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        if error.is_data() || error.is_syntax() || error.is_eof() {
            EngineError::Parse(error.to_string())
        } else {
            EngineError::Serialization(error.to_string())
        }
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(error: toml::de::Error) -> Self {
        EngineError::Config(error.to_string())
    }
}

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        EngineError::Internal(format!("I/O: {}", error))
    }
}

/// 引擎结果类型
pub type EngineResult<T> = Result<T, EngineError>;

/// 错误统计
#[derive(Debug, Default, Clone)]
pub struct ErrorStats {
    pub total_errors: u64,
    pub by_category: HashMap<ErrorCategory, u64>,
    pub by_severity: HashMap<ErrorSeverity, u64>,
    pub last_error: Option<String>,
}

impl ErrorStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个错误
    pub fn record(&mut self, error: &EngineError) {
        self.total_errors += 1;
        *self.by_category.entry(error.category()).or_insert(0) += 1;
        *self.by_severity.entry(error.severity()).or_insert(0) += 1;
        self.last_error = Some(error.to_string());
    }

    pub fn count(&self, category: ErrorCategory) -> u64 {
        self.by_category.get(&category).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 错误处理辅助
pub mod helpers {
    use super::*;

    /// 节点已脱离文档
    pub fn detached(what: &str) -> EngineError {
        EngineError::Dom(format!("{} is detached from the document", what))
    }

    /// 按严重程度记录日志
    pub fn log_error(error: &EngineError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::debug!("{}", error),
            ErrorSeverity::Warning => tracing::warn!("{}", error),
            ErrorSeverity::Error | ErrorSeverity::Critical => tracing::error!("{}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let dom = EngineError::Dom("gone".to_string());
        assert!(dom.is_retryable());
        assert_eq!(dom.category(), ErrorCategory::Dom);
        assert_eq!(dom.severity(), ErrorSeverity::Info);

        let messaging = EngineError::Messaging("port closed".to_string());
        assert!(!messaging.is_retryable(), "消息错误不应在内部重试");
        assert_eq!(messaging.category(), ErrorCategory::Messaging);
    }

    #[test]
    fn test_with_context() {
        let error = EngineError::Config("bad value".to_string()).with_context("debounce_ms");
        assert_eq!(
            error.to_string(),
            "configuration error: bad value (debounce_ms)"
        );
        assert_eq!(
            EngineError::AlreadyAttached.with_context("x"),
            EngineError::AlreadyAttached
        );
    }

    #[test]
    fn test_error_stats() {
        let mut stats = ErrorStats::new();
        stats.record(&helpers::detached("span"));
        stats.record(&helpers::detached("p"));
        stats.record(&EngineError::Parse("eof".to_string()));

        assert_eq!(stats.total_errors, 3);
        assert_eq!(stats.count(ErrorCategory::Dom), 2);
        assert_eq!(stats.count(ErrorCategory::Parsing), 1);
        assert_eq!(stats.last_error.as_deref(), Some("parse error: eof"));

        stats.reset();
        assert_eq!(stats.total_errors, 0);
    }

    #[test]
    fn test_json_errors_become_parse_errors() {
        let err: EngineError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.category(), ErrorCategory::Parsing);
    }
}
